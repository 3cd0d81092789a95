//! # Extension Keyword Registry
//!
//! Keywords outside the core schema language are declared here as
//! `(name, meta-schema, factory)` entries. When the compiler meets a
//! registered keyword it checks the keyword's value against the meta-schema
//! and hands it to the factory, which returns a bound [`Keyword`] that the
//! evaluator runs against instance values.
//!
//! The registry is an explicit value passed to [`crate::compile`]. It is
//! mutated through `&mut self` while keywords are registered and only read
//! through `&self` while compiling, so the two phases cannot overlap.
//!
//! ## Built-in keywords
//!
//! - `minimumQuantity`: instance quantity must be `>=` the bound.
//! - `maximumQuantity`: instance quantity must be `<=` the bound.
//!
//! Both accept the bound as a quantity string (`"500m"`, `"2Gi"`) or a
//! number. The bound is parsed when the schema is compiled, so a malformed
//! bound is a compile error rather than a validation failure.

use std::collections::BTreeMap;
use std::fmt;

use jsonschema::{Draft, Validator};
use qschema_core::{QuantityError, QuantityInput, QuantityValue};
use serde_json::{json, Value};
use thiserror::Error;

use crate::compile::is_core_keyword;

/// Name of the lower-bound quantity keyword.
pub const MINIMUM_QUANTITY: &str = "minimumQuantity";
/// Name of the upper-bound quantity keyword.
pub const MAXIMUM_QUANTITY: &str = "maximumQuantity";

/// Boxed error returned by keyword factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type KeywordFactory = Box<dyn Fn(&Value) -> Result<Box<dyn Keyword>, BoxError> + Send + Sync>;

/// Result of running a bound keyword against one instance value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordOutcome {
    /// The constraint holds, or does not apply to this kind of value.
    Satisfied,
    /// The constraint is violated; the message explains how.
    Violated(String),
    /// The constraint could not be decided; treated as satisfied and
    /// reported as a warning.
    Inconclusive(String),
}

/// A keyword bound to its schema value, ready to validate instances.
pub trait Keyword: fmt::Debug + Send + Sync {
    /// Check one instance value.
    fn validate(&self, instance: &Value) -> KeywordOutcome;
}

/// Errors raised while registering keywords.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A keyword with this name is already registered.
    #[error("keyword '{0}' is already registered")]
    Duplicate(String),

    /// The name belongs to the core schema language.
    #[error("keyword '{0}' is reserved by the core schema language")]
    Reserved(String),

    /// The keyword's meta-schema is not a valid JSON Schema.
    #[error("meta-schema for keyword '{keyword}' is invalid: {reason}")]
    InvalidMetaSchema {
        /// Keyword name.
        keyword: String,
        /// Why the meta-schema was rejected.
        reason: String,
    },
}

/// Why a keyword value could not be bound.
#[derive(Error, Debug)]
pub enum BindError {
    /// The value does not match the keyword's meta-schema.
    #[error("value does not match the keyword meta-schema: {0}")]
    MetaSchema(String),

    /// The factory rejected the value.
    #[error("{0}")]
    Factory(BoxError),
}

/// One registered keyword.
pub struct KeywordDefinition {
    name: String,
    meta_schema: Value,
    meta_validator: Validator,
    factory: KeywordFactory,
}

impl KeywordDefinition {
    /// The keyword name as it appears in schemas.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The meta-schema the keyword's value must satisfy.
    pub fn meta_schema(&self) -> &Value {
        &self.meta_schema
    }

    /// Check `value` against the meta-schema, then build the bound keyword.
    pub fn bind(&self, value: &Value) -> Result<Box<dyn Keyword>, BindError> {
        let problems: Vec<String> = self
            .meta_validator
            .iter_errors(value)
            .map(|e| e.to_string())
            .collect();
        if !problems.is_empty() {
            return Err(BindError::MetaSchema(problems.join("; ")));
        }
        (self.factory)(value).map_err(BindError::Factory)
    }
}

impl fmt::Debug for KeywordDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeywordDefinition")
            .field("name", &self.name)
            .field("meta_schema", &self.meta_schema)
            .finish_non_exhaustive()
    }
}

/// Table of extension keywords available to the compiler.
#[derive(Debug, Default)]
pub struct Registry {
    keywords: BTreeMap<String, KeywordDefinition>,
}

impl Registry {
    /// An empty registry: only core keywords compile.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `minimumQuantity` and `maximumQuantity`.
    ///
    /// # Errors
    ///
    /// Propagates [`RegistryError`] from registration; the built-in
    /// meta-schemas are static, so this only fails if the `jsonschema`
    /// backend rejects them.
    pub fn with_quantity_keywords() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        register_quantity_keywords(&mut registry)?;
        Ok(registry)
    }

    /// Register a keyword.
    ///
    /// The meta-schema is compiled (JSON Schema draft 2020-12) once, here.
    /// The factory runs once per schema node that uses the keyword.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Reserved`] if `name` is a core keyword.
    /// - [`RegistryError::Duplicate`] if `name` is already registered.
    /// - [`RegistryError::InvalidMetaSchema`] if the meta-schema does not compile.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        meta_schema: Value,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Value) -> Result<Box<dyn Keyword>, BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        if is_core_keyword(&name) {
            return Err(RegistryError::Reserved(name));
        }
        if self.keywords.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        let meta_validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&meta_schema)
            .map_err(|e| RegistryError::InvalidMetaSchema {
                keyword: name.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(keyword = %name, "registered extension keyword");
        self.keywords.insert(
            name.clone(),
            KeywordDefinition {
                name,
                meta_schema,
                meta_validator,
                factory: Box::new(factory),
            },
        );
        Ok(())
    }

    /// Look up a keyword by name.
    pub fn get(&self, name: &str) -> Option<&KeywordDefinition> {
        self.keywords.get(name)
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.keywords.contains_key(name)
    }

    /// Registered keyword names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.keywords.keys().map(String::as_str).collect()
    }

    /// Number of registered keywords.
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

/// Add `minimumQuantity` and `maximumQuantity` to a registry.
pub fn register_quantity_keywords(registry: &mut Registry) -> Result<(), RegistryError> {
    let meta_schema = json!({"type": ["string", "number"]});
    registry.register(MINIMUM_QUANTITY, meta_schema.clone(), |value| {
        Ok(Box::new(QuantityBound::new(BoundKind::Minimum, value)?) as Box<dyn Keyword>)
    })?;
    registry.register(MAXIMUM_QUANTITY, meta_schema, |value| {
        Ok(Box::new(QuantityBound::new(BoundKind::Maximum, value)?) as Box<dyn Keyword>)
    })
}

/// Direction of a quantity bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    /// Instance must not be below the bound.
    Minimum,
    /// Instance must not be above the bound.
    Maximum,
}

impl BoundKind {
    /// The keyword implementing this bound.
    pub fn keyword(self) -> &'static str {
        match self {
            BoundKind::Minimum => MINIMUM_QUANTITY,
            BoundKind::Maximum => MAXIMUM_QUANTITY,
        }
    }
}

/// An inclusive quantity bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityBound {
    kind: BoundKind,
    bound: QuantityValue,
}

impl QuantityBound {
    /// Parse the bound literal from a schema value (string or number).
    ///
    /// # Errors
    ///
    /// Returns the [`QuantityError`] if the literal is not a valid quantity.
    pub fn new(kind: BoundKind, value: &Value) -> Result<Self, QuantityError> {
        let input = QuantityInput::from_json(value)
            .ok_or_else(|| QuantityError::InvalidNumber(value.to_string()))?;
        Ok(Self {
            kind,
            bound: input.parse()?,
        })
    }

    /// The canonical bound.
    pub fn bound(&self) -> &QuantityValue {
        &self.bound
    }
}

impl Keyword for QuantityBound {
    fn validate(&self, instance: &Value) -> KeywordOutcome {
        let Some(input) = QuantityInput::from_json(instance) else {
            return KeywordOutcome::Satisfied;
        };
        let value = match input.parse() {
            Ok(value) => value,
            Err(e) => {
                return KeywordOutcome::Inconclusive(format!(
                    "cannot compare {instance} against {} {}: {e}",
                    self.kind.keyword(),
                    self.bound
                ))
            }
        };
        match self.kind {
            BoundKind::Minimum if value < self.bound => KeywordOutcome::Violated(format!(
                "{value} is lower than {MINIMUM_QUANTITY} {}",
                self.bound
            )),
            BoundKind::Maximum if value > self.bound => KeywordOutcome::Violated(format!(
                "{value} is greater than {MAXIMUM_QUANTITY} {}",
                self.bound
            )),
            _ => KeywordOutcome::Satisfied,
        }
    }
}
