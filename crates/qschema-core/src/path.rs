//! # Instance Paths
//!
//! An [`InstancePath`] locates a value inside a document as the ordered
//! sequence of member names and array indexes leading to it from the root.
//! It renders as an RFC 6901 JSON Pointer (`/spec/containers/0/image`), with
//! the root rendering as the empty string.

use std::fmt;

use serde::{Serialize, Serializer};

/// One step of an [`InstancePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathToken {
    /// A mapping member name.
    Key(String),
    /// A sequence index.
    Index(usize),
}

impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathToken::Key(key) => {
                // RFC 6901: '~' becomes "~0", '/' becomes "~1".
                for c in key.chars() {
                    match c {
                        '~' => f.write_str("~0")?,
                        '/' => f.write_str("~1")?,
                        other => write!(f, "{other}")?,
                    }
                }
                Ok(())
            }
            PathToken::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Path from the document root to a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InstancePath {
    tokens: Vec<PathToken>,
}

impl InstancePath {
    /// The path of the document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Append a member name.
    pub fn push_key(&mut self, key: impl Into<String>) {
        self.tokens.push(PathToken::Key(key.into()));
    }

    /// Append a sequence index.
    pub fn push_index(&mut self, index: usize) {
        self.tokens.push(PathToken::Index(index));
    }

    /// Remove the last token, if any.
    pub fn pop(&mut self) -> Option<PathToken> {
        self.tokens.pop()
    }

    /// Number of tokens; the root has depth zero.
    pub fn depth(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{token}")?;
        }
        Ok(())
    }
}

impl Serialize for InstancePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
