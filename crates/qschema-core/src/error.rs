//! # Error Types
//!
//! Errors raised by the foundational layer. All errors use `thiserror` for
//! derive-based `Display` and `Error` implementations.
//!
//! Every error that concerns a position in a document carries the
//! [`InstancePath`] of that position so callers can report it without
//! re-walking the tree.

use thiserror::Error;

use crate::path::InstancePath;

/// A quantity string could not be parsed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantityError {
    /// The input was empty.
    #[error("empty quantity")]
    Empty,

    /// The numeric part is missing or malformed (no digits, several dots, stray characters).
    #[error("invalid quantity '{0}': expected a number with an optional suffix")]
    InvalidNumber(String),

    /// The suffix after the number is not a known scale.
    #[error("invalid quantity '{input}': unknown suffix '{suffix}'")]
    UnknownSuffix {
        /// The full input text.
        input: String,
        /// The unrecognized suffix.
        suffix: String,
    },

    /// The magnitude does not fit the canonical representation.
    #[error("quantity '{0}' is out of range")]
    OutOfRange(String),

    /// A native floating-point value was NaN or infinite.
    #[error("quantity {0} is not a finite number")]
    NotFinite(f64),
}

/// A decoded document could not be rewritten into string-keyed form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    /// A mapping key at `path` is not a string.
    #[error("found non-string key ({key}) at '{path}'")]
    NonStringKey {
        /// Path of the mapping that holds the key.
        path: InstancePath,
        /// Short description of the offending key.
        key: String,
    },

    /// Two keys of one mapping name the same member, e.g. `cpu` and the
    /// tagged `!t cpu`.
    #[error("duplicate key '{key}' at '{path}'")]
    DuplicateKey {
        /// Path of the mapping that holds the keys.
        path: InstancePath,
        /// The repeated member name.
        key: String,
    },

    /// A floating-point scalar has no JSON representation (NaN or infinity).
    #[error("number at '{path}' cannot be represented in JSON: {value}")]
    UnrepresentableNumber {
        /// Path of the scalar.
        path: InstancePath,
        /// Rendering of the number.
        value: String,
    },

    /// The document nests deeper than the configured limit.
    #[error("document nesting exceeds the maximum depth of {max_depth} at '{path}'")]
    DepthExceeded {
        /// Path at which the limit was crossed.
        path: InstancePath,
        /// The configured limit.
        max_depth: usize,
    },
}

/// Input text could not be decoded.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The text is not well-formed YAML (JSON is accepted as YAML).
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
