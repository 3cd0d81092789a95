//! # Evaluation
//!
//! Walks a normalized document against a [`CompiledSchema`] and records every
//! violated constraint as a tree of [`ValidationError`]s.
//!
//! Evaluation never short-circuits: every core assertion, every applicator
//! and every bound extension keyword of a node runs, and all of their
//! failures become siblings under that node's single wrapper entry. A node
//! whose constraints all hold contributes nothing.
//!
//! Tree shape:
//!
//! - The root, when violated, yields one wrapper keyed `schema`.
//! - A sub-schema reached through an applicator (`properties`, `items`,
//!   `$ref`, `then`, ...) yields one wrapper keyed by that applicator, at the
//!   instance path the sub-schema was applied to.
//! - `allOf`, `anyOf` and `oneOf` failures are entries keyed by the applicator
//!   whose children are the failing branches' wrappers.
//! - Everything else is a leaf.
//!
//! An extension keyword that cannot compare an instance value (an
//! unparsable quantity, say) reports [`KeywordOutcome::Inconclusive`]. That
//! becomes a [`Warning`] and is logged; the constraint counts as satisfied.

use std::fmt;

use qschema_core::InstancePath;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::compile::{CompiledSchema, JsonType, NodeId, SchemaNode};
use crate::registry::KeywordOutcome;

/// One violated constraint, with the violations that explain it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// The keyword that failed (or the applicator that led here).
    pub keyword: String,
    /// Where in the document.
    pub instance_path: InstancePath,
    /// Schema location of the node that produced the entry.
    pub schema_location: String,
    /// Human-readable description.
    pub message: String,
    /// Nested violations; empty for leaves.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ValidationError>,
}

impl ValidationError {
    /// Returns true if the entry has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_root() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// A non-fatal diagnostic: a constraint that could not be checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    /// The keyword that could not be checked.
    pub keyword: String,
    /// Where in the document.
    pub instance_path: InstancePath,
    /// Why.
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_root() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// Result of evaluating one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    /// Raw error tree (at most one root entry).
    pub errors: Vec<ValidationError>,
    /// Constraints that could not be checked.
    pub warnings: Vec<Warning>,
}

impl Evaluation {
    /// Returns true if no constraint was violated.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Errors that abort an evaluation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluateError {
    /// The document nests deeper than the configured limit.
    #[error("document exceeds maximum evaluation depth {max_depth} at '{path}'")]
    DepthExceeded {
        /// Path at which the limit was crossed.
        path: InstancePath,
        /// The configured limit.
        max_depth: usize,
    },
}

/// Evaluate `instance` against `schema` with no depth limit.
pub fn evaluate(schema: &CompiledSchema, instance: &Value) -> Result<Evaluation, EvaluateError> {
    Evaluator::new(schema).evaluate(instance)
}

/// Runs one compiled schema against documents.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'s> {
    schema: &'s CompiledSchema,
    max_depth: Option<usize>,
}

impl<'s> Evaluator<'s> {
    /// Evaluator with no depth limit.
    pub fn new(schema: &'s CompiledSchema) -> Self {
        Self {
            schema,
            max_depth: None,
        }
    }

    /// Limit how many containers below the root evaluation descends.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Evaluate one normalized document.
    ///
    /// # Errors
    ///
    /// [`EvaluateError::DepthExceeded`] when a depth limit is set and crossed.
    pub fn evaluate(&self, instance: &Value) -> Result<Evaluation, EvaluateError> {
        let mut walk = Walk {
            schema: self.schema,
            max_depth: self.max_depth,
            path: InstancePath::root(),
            warnings: Vec::new(),
        };
        let root = walk.apply(self.schema.root(), "schema", instance)?;
        let evaluation = Evaluation {
            errors: root.into_iter().collect(),
            warnings: walk.warnings,
        };
        tracing::debug!(
            valid = evaluation.is_valid(),
            warnings = evaluation.warnings.len(),
            "evaluated document"
        );
        Ok(evaluation)
    }
}

struct Walk<'s> {
    schema: &'s CompiledSchema,
    max_depth: Option<usize>,
    path: InstancePath,
    warnings: Vec<Warning>,
}

impl<'s> Walk<'s> {
    /// Apply one node to `instance` at the current path; the wrapper entry
    /// (keyed `via`) if anything failed.
    fn apply(
        &mut self,
        id: NodeId,
        via: &str,
        instance: &Value,
    ) -> Result<Option<ValidationError>, EvaluateError> {
        if let Some(max_depth) = self.max_depth {
            if self.path.depth() > max_depth {
                return Err(EvaluateError::DepthExceeded {
                    path: self.path.clone(),
                    max_depth,
                });
            }
        }

        let schema = self.schema;
        let node = schema.at(id);
        let mut failures = Vec::new();
        self.check_node(node, instance, &mut failures)?;
        if failures.is_empty() {
            return Ok(None);
        }
        Ok(Some(ValidationError {
            keyword: via.to_string(),
            instance_path: self.path.clone(),
            schema_location: node.location.clone(),
            message: format!("does not match schema at {}", node.location),
            children: failures,
        }))
    }

    /// Apply a node one step below the current path.
    fn apply_below(
        &mut self,
        id: NodeId,
        via: &str,
        token: Step<'_>,
        instance: &Value,
    ) -> Result<Option<ValidationError>, EvaluateError> {
        match token {
            Step::Key(key) => self.path.push_key(key),
            Step::Index(index) => self.path.push_index(index),
        }
        let result = self.apply(id, via, instance);
        self.path.pop();
        result
    }

    fn leaf(&self, node: &SchemaNode, keyword: &str, message: String) -> ValidationError {
        ValidationError {
            keyword: keyword.to_string(),
            instance_path: self.path.clone(),
            schema_location: node.location.clone(),
            message,
            children: Vec::new(),
        }
    }

    fn check_node(
        &mut self,
        node: &'s SchemaNode,
        instance: &Value,
        failures: &mut Vec<ValidationError>,
    ) -> Result<(), EvaluateError> {
        if node.reject_all {
            failures.push(self.leaf(node, "false", format!("{instance} is not allowed here")));
            return Ok(());
        }

        self.check_generic(node, instance, failures);
        match instance {
            Value::Number(number) => {
                if let Some(n) = number.as_f64() {
                    self.check_number(node, n, instance, failures);
                }
            }
            Value::String(s) => self.check_string(node, s, instance, failures),
            Value::Array(items) => self.check_array(node, items, instance, failures)?,
            Value::Object(object) => self.check_object(node, object, failures)?,
            Value::Null | Value::Bool(_) => {}
        }
        self.check_applicators(node, instance, failures)?;
        self.check_extensions(node, instance, failures);
        Ok(())
    }

    fn check_generic(
        &self,
        node: &SchemaNode,
        instance: &Value,
        failures: &mut Vec<ValidationError>,
    ) {
        if !node.types.is_empty() && !node.types.iter().any(|t| t.matches(instance)) {
            let expected: Vec<&str> = node.types.iter().map(|t| t.name()).collect();
            failures.push(self.leaf(
                node,
                "type",
                format!(
                    "{instance} is of type {}, expected {}",
                    JsonType::name_of(instance),
                    expected.join(" or ")
                ),
            ));
        }
        if let Some(allowed) = &node.enum_values {
            if !allowed.iter().any(|v| values_equal(v, instance)) {
                let allowed = Value::Array(allowed.clone());
                failures.push(self.leaf(
                    node,
                    "enum",
                    format!("{instance} is not one of {allowed}"),
                ));
            }
        }
        if let Some(expected) = &node.const_value {
            if !values_equal(expected, instance) {
                failures.push(self.leaf(
                    node,
                    "const",
                    format!("{instance} does not equal {expected}"),
                ));
            }
        }
    }

    fn check_number(
        &self,
        node: &SchemaNode,
        n: f64,
        instance: &Value,
        failures: &mut Vec<ValidationError>,
    ) {
        if let Some(minimum) = node.minimum {
            if n < minimum {
                failures.push(self.leaf(
                    node,
                    "minimum",
                    format!("{instance} is less than the minimum of {minimum}"),
                ));
            }
        }
        if let Some(maximum) = node.maximum {
            if n > maximum {
                failures.push(self.leaf(
                    node,
                    "maximum",
                    format!("{instance} is greater than the maximum of {maximum}"),
                ));
            }
        }
        if let Some(limit) = node.exclusive_minimum {
            if n <= limit {
                failures.push(self.leaf(
                    node,
                    "exclusiveMinimum",
                    format!("{instance} is less than or equal to the exclusive minimum of {limit}"),
                ));
            }
        }
        if let Some(limit) = node.exclusive_maximum {
            if n >= limit {
                failures.push(self.leaf(
                    node,
                    "exclusiveMaximum",
                    format!(
                        "{instance} is greater than or equal to the exclusive maximum of {limit}"
                    ),
                ));
            }
        }
        if let Some(divisor) = node.multiple_of {
            if !is_multiple_of(n, divisor) {
                failures.push(self.leaf(
                    node,
                    "multipleOf",
                    format!("{instance} is not a multiple of {divisor}"),
                ));
            }
        }
    }

    fn check_string(
        &self,
        node: &SchemaNode,
        s: &str,
        instance: &Value,
        failures: &mut Vec<ValidationError>,
    ) {
        let length = s.chars().count() as u64;
        if let Some(min) = node.min_length {
            if length < min {
                failures.push(self.leaf(
                    node,
                    "minLength",
                    format!("{instance} is shorter than {min} characters"),
                ));
            }
        }
        if let Some(max) = node.max_length {
            if length > max {
                failures.push(self.leaf(
                    node,
                    "maxLength",
                    format!("{instance} is longer than {max} characters"),
                ));
            }
        }
        if let Some(pattern) = &node.pattern {
            if !pattern.is_match(s) {
                failures.push(self.leaf(
                    node,
                    "pattern",
                    format!("{instance} does not match '{}'", pattern.as_str()),
                ));
            }
        }
    }

    fn check_array(
        &mut self,
        node: &'s SchemaNode,
        items: &[Value],
        instance: &Value,
        failures: &mut Vec<ValidationError>,
    ) -> Result<(), EvaluateError> {
        let count = items.len() as u64;
        if let Some(min) = node.min_items {
            if count < min {
                failures.push(self.leaf(
                    node,
                    "minItems",
                    format!("{instance} has fewer than {min} items"),
                ));
            }
        }
        if let Some(max) = node.max_items {
            if count > max {
                failures.push(self.leaf(
                    node,
                    "maxItems",
                    format!("{instance} has more than {max} items"),
                ));
            }
        }
        if node.unique_items && has_duplicates(items) {
            failures.push(self.leaf(
                node,
                "uniqueItems",
                format!("{instance} has non-unique elements"),
            ));
        }
        if let Some(item_schema) = node.items {
            for (index, item) in items.iter().enumerate() {
                let step = Step::Index(index);
                if let Some(entry) = self.apply_below(item_schema, "items", step, item)? {
                    failures.push(entry);
                }
            }
        }
        Ok(())
    }

    fn check_object(
        &mut self,
        node: &'s SchemaNode,
        object: &serde_json::Map<String, Value>,
        failures: &mut Vec<ValidationError>,
    ) -> Result<(), EvaluateError> {
        for name in &node.required {
            if !object.contains_key(name) {
                failures.push(self.leaf(
                    node,
                    "required",
                    format!("'{name}' is a required property"),
                ));
            }
        }
        let count = object.len() as u64;
        if let Some(min) = node.min_properties {
            if count < min {
                failures.push(self.leaf(
                    node,
                    "minProperties",
                    format!("object has fewer than {min} properties"),
                ));
            }
        }
        if let Some(max) = node.max_properties {
            if count > max {
                failures.push(self.leaf(
                    node,
                    "maxProperties",
                    format!("object has more than {max} properties"),
                ));
            }
        }

        for (name, property_schema) in &node.properties {
            if let Some(value) = object.get(name) {
                if let Some(entry) =
                    self.apply_below(*property_schema, "properties", Step::Key(name), value)?
                {
                    failures.push(entry);
                }
            }
        }

        let mut unexpected = Vec::new();
        for (name, value) in object {
            let mut matched = node.properties.iter().any(|(known, _)| known == name);
            for (pattern, pattern_schema) in &node.pattern_properties {
                if pattern.is_match(name) {
                    matched = true;
                    if let Some(entry) = self.apply_below(
                        *pattern_schema,
                        "patternProperties",
                        Step::Key(name),
                        value,
                    )? {
                        failures.push(entry);
                    }
                }
            }
            if !matched {
                unexpected.push((name, value));
            }
        }

        if let Some(additional) = node.additional_properties {
            if self.schema.at(additional).reject_all {
                if !unexpected.is_empty() {
                    let names: Vec<String> =
                        unexpected.iter().map(|(name, _)| format!("'{name}'")).collect();
                    failures.push(self.leaf(
                        node,
                        "additionalProperties",
                        format!(
                            "additional properties are not allowed ({} unexpected)",
                            names.join(", ")
                        ),
                    ));
                }
            } else {
                for (name, value) in unexpected {
                    if let Some(entry) = self.apply_below(
                        additional,
                        "additionalProperties",
                        Step::Key(name),
                        value,
                    )? {
                        failures.push(entry);
                    }
                }
            }
        }
        Ok(())
    }

    fn check_applicators(
        &mut self,
        node: &'s SchemaNode,
        instance: &Value,
        failures: &mut Vec<ValidationError>,
    ) -> Result<(), EvaluateError> {
        if let Some(target) = node.reference {
            if let Some(entry) = self.apply(target, "$ref", instance)? {
                failures.push(entry);
            }
        }

        if !node.all_of.is_empty() {
            let failed = self.apply_branches(&node.all_of, "allOf", instance)?;
            if !failed.is_empty() {
                failures.push(ValidationError {
                    children: failed,
                    ..self.leaf(
                        node,
                        "allOf",
                        format!("{instance} does not match every schema in allOf"),
                    )
                });
            }
        }

        if !node.any_of.is_empty() {
            let failed = self.apply_branches(&node.any_of, "anyOf", instance)?;
            if failed.len() == node.any_of.len() {
                failures.push(ValidationError {
                    children: failed,
                    ..self.leaf(
                        node,
                        "anyOf",
                        format!("{instance} is not valid under any of the given schemas"),
                    )
                });
            }
        }

        if !node.one_of.is_empty() {
            let failed = self.apply_branches(&node.one_of, "oneOf", instance)?;
            let passed = node.one_of.len() - failed.len();
            if passed == 0 {
                failures.push(ValidationError {
                    children: failed,
                    ..self.leaf(
                        node,
                        "oneOf",
                        format!("{instance} is not valid under any of the given schemas"),
                    )
                });
            } else if passed > 1 {
                failures.push(self.leaf(
                    node,
                    "oneOf",
                    format!(
                        "{instance} is valid under {passed} of the given schemas, \
                         expected exactly one"
                    ),
                ));
            }
        }

        if let Some(negated) = node.not {
            if self.apply(negated, "not", instance)?.is_none() {
                let location = &self.schema.at(negated).location;
                failures.push(self.leaf(
                    node,
                    "not",
                    format!("{instance} should not be valid under {location}"),
                ));
            }
        }

        if let Some(condition) = node.condition {
            let holds = self.apply(condition.if_schema, "if", instance)?.is_none();
            let (branch, via) = if holds {
                (condition.then_schema, "then")
            } else {
                (condition.else_schema, "else")
            };
            if let Some(branch) = branch {
                if let Some(entry) = self.apply(branch, via, instance)? {
                    failures.push(entry);
                }
            }
        }
        Ok(())
    }

    /// Apply every branch; the wrappers of those that failed, in order.
    fn apply_branches(
        &mut self,
        branches: &[NodeId],
        via: &str,
        instance: &Value,
    ) -> Result<Vec<ValidationError>, EvaluateError> {
        let mut failed = Vec::new();
        for branch in branches {
            if let Some(entry) = self.apply(*branch, via, instance)? {
                failed.push(entry);
            }
        }
        Ok(failed)
    }

    fn check_extensions(
        &mut self,
        node: &SchemaNode,
        instance: &Value,
        failures: &mut Vec<ValidationError>,
    ) {
        for extension in &node.extensions {
            match extension.validator().validate(instance) {
                KeywordOutcome::Satisfied => {}
                KeywordOutcome::Violated(message) => {
                    failures.push(self.leaf(node, extension.keyword(), message));
                }
                KeywordOutcome::Inconclusive(reason) => {
                    tracing::warn!(
                        keyword = extension.keyword(),
                        path = %self.path,
                        reason = %reason,
                        "constraint could not be checked"
                    );
                    self.warnings.push(Warning {
                        keyword: extension.keyword().to_string(),
                        instance_path: self.path.clone(),
                        message: reason,
                    });
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Step<'k> {
    Key(&'k str),
    Index(usize),
}

/// JSON equality where numbers compare by value (`1` equals `1.0`).
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn has_duplicates(items: &[Value]) -> bool {
    items
        .iter()
        .enumerate()
        .any(|(i, a)| items[i + 1..].iter().any(|b| values_equal(a, b)))
}

fn is_multiple_of(n: f64, divisor: f64) -> bool {
    let quotient = n / divisor;
    if !quotient.is_finite() {
        return false;
    }
    (quotient - quotient.round()).abs() <= 4.0 * f64::EPSILON * quotient.abs().max(1.0)
}
