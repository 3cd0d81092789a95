//! # Validation Facade
//!
//! The end-to-end pipeline: decode the document, normalize it, compile the
//! schema against the registry, evaluate, reduce. [`SchemaValidator`] holds
//! the registry and the [`ValidationOptions`]; each call compiles the schema
//! fresh and returns a [`Report`].
//!
//! Decode, normalize, compile and depth failures abort the call with a
//! [`ValidateError`]. Violated constraints are data: they come back inside
//! `Ok(Report)`.

use std::fmt;

use qschema_core::{decode_yaml, decode_yaml_stream, normalize_with_limit};
use qschema_core::{DecodeError, NormalizationError};
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;
use thiserror::Error;

use crate::compile::{compile, CompileError, CompiledSchema};
use crate::evaluate::{EvaluateError, Evaluator, ValidationError, Warning};
use crate::reduce::{reduce, reduce_all_branches};
use crate::registry::{Registry, RegistryError};

/// Errors that abort a validation call.
#[derive(Error, Debug)]
pub enum ValidateError {
    /// The document text could not be decoded.
    #[error("document could not be decoded: {0}")]
    Decode(#[from] DecodeError),

    /// The document has a non-string key, an unrepresentable number, or is
    /// nested too deeply.
    #[error("document could not be normalized: {0}")]
    Normalize(#[from] NormalizationError),

    /// The schema did not compile.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Evaluation crossed the configured depth limit.
    #[error(transparent)]
    Evaluate(#[from] EvaluateError),

    /// The keyword registry could not be built.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The options file is malformed.
    #[error("invalid validation options: {0}")]
    Options(#[source] serde_yaml::Error),
}

/// How the raw error tree is narrowed before reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReductionStrategy {
    /// Follow the first entry down to its first childless level.
    #[default]
    FirstBranch,
    /// Report the leaves of every failing branch.
    AllBranches,
}

impl ReductionStrategy {
    /// Reduce a raw error tree.
    pub fn apply(self, errors: Vec<ValidationError>) -> Vec<ValidationError> {
        match self {
            Self::FirstBranch => reduce(errors),
            Self::AllBranches => reduce_all_branches(errors),
        }
    }
}

/// Per-validator options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ValidationOptions {
    /// Maximum container nesting below the document root. `None` disables
    /// the guard.
    pub max_depth: Option<usize>,
    /// Error-tree reduction.
    pub reduction: ReductionStrategy,
}

impl ValidationOptions {
    /// Parse options from YAML (or JSON) text. Missing fields take defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ValidateError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(ValidateError::Options)
    }
}

/// Outcome of validating one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    /// Reduced validation errors; empty when the document is valid.
    pub errors: Vec<ValidationError>,
    /// Constraints that could not be checked.
    pub warnings: Vec<Warning>,
}

impl Report {
    /// Returns true if no constraint was violated.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self
            .errors
            .iter()
            .map(ToString::to_string)
            .chain(self.warnings.iter().map(|w| format!("warning: {w}")));
        for (i, line) in lines.enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Validates documents against schemas using one keyword registry.
#[derive(Debug)]
pub struct SchemaValidator {
    registry: Registry,
    options: ValidationOptions,
}

impl SchemaValidator {
    /// Validator over an explicit registry.
    pub fn new(registry: Registry, options: ValidationOptions) -> Self {
        Self { registry, options }
    }

    /// Validator with `minimumQuantity` and `maximumQuantity` registered.
    pub fn with_quantity_keywords(options: ValidationOptions) -> Result<Self, ValidateError> {
        Ok(Self::new(Registry::with_quantity_keywords()?, options))
    }

    /// The keyword registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The options in effect.
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Compile schema text against this validator's registry.
    pub fn compile(&self, schema_text: &str) -> Result<CompiledSchema, ValidateError> {
        Ok(compile(schema_text, &self.registry)?)
    }

    /// Normalize, evaluate and reduce one decoded document.
    pub fn validate_value(
        &self,
        schema: &CompiledSchema,
        document: &YamlValue,
    ) -> Result<Report, ValidateError> {
        let max_depth = self.options.max_depth;
        let instance = normalize_with_limit(document, max_depth)?;
        let evaluation = Evaluator::new(schema)
            .with_max_depth(max_depth)
            .evaluate(&instance)?;
        Ok(Report {
            errors: self.options.reduction.apply(evaluation.errors),
            warnings: evaluation.warnings,
        })
    }

    /// Full pipeline on one document.
    ///
    /// # Errors
    ///
    /// Schema errors are reported before the document is looked at.
    pub fn validate_text(
        &self,
        schema_text: &str,
        document_text: &str,
    ) -> Result<Report, ValidateError> {
        let schema = self.compile(schema_text)?;
        let document = decode_yaml(document_text)?;
        self.validate_value(&schema, &document)
    }

    /// Full pipeline on every document of a `---`-separated stream. The
    /// schema is compiled once for the call.
    pub fn validate_stream(
        &self,
        schema_text: &str,
        stream_text: &str,
    ) -> Result<Vec<Report>, ValidateError> {
        let schema = self.compile(schema_text)?;
        let documents = decode_yaml_stream(stream_text)?;
        tracing::debug!(documents = documents.len(), "validating document stream");
        documents
            .iter()
            .map(|document| self.validate_value(&schema, document))
            .collect()
    }
}
