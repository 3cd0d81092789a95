//! # Schema Compilation
//!
//! Turns schema text (YAML or JSON) into an immutable [`CompiledSchema`]:
//! an arena of [`SchemaNode`]s addressed by [`NodeId`]. Every keyword is
//! resolved at compile time. Core keywords become typed fields on the node.
//! Annotations are dropped. Registered extension keywords are bound through
//! the [`Registry`]. Anything else is a [`CompileError::UnknownKeyword`].
//!
//! ## References
//!
//! Local `$ref`s (`#`, `#/definitions/x`, `#/$defs/x`, any JSON Pointer into
//! the schema document) are compiled on demand. Nodes are memoized by their
//! JSON Pointer, so recursive schemas compile to a finite graph. A cycle that
//! never descends into the instance (`{"$ref": "#"}` at the root, or two
//! definitions that `allOf` each other) is rejected, since evaluating it
//! could not terminate.
//!
//! ## Determinism
//!
//! Keywords and members are visited in the order of the normalized schema
//! object, so the same text and the same registry always produce the same
//! node graph. Compilation performs no I/O.

use std::collections::HashMap;

use qschema_core::{decode_yaml, normalize, DecodeError, NormalizationError};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::registry::{Keyword, Registry};

/// Keywords implemented by the compiler and evaluator.
const CORE_KEYWORDS: &[&str] = &[
    "type",
    "enum",
    "const",
    "required",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minProperties",
    "maxProperties",
    "properties",
    "patternProperties",
    "additionalProperties",
    "items",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
    "if",
    "then",
    "else",
    "$ref",
];

/// Keywords accepted and ignored.
const ANNOTATION_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "$comment",
    "title",
    "description",
    "default",
    "examples",
    "format",
    "deprecated",
    "readOnly",
    "writeOnly",
    "definitions",
    "$defs",
];

/// Returns true if `name` belongs to the core schema language and therefore
/// cannot be registered as an extension.
pub(crate) fn is_core_keyword(name: &str) -> bool {
    CORE_KEYWORDS.contains(&name) || ANNOTATION_KEYWORDS.contains(&name)
}

/// Errors raised while compiling a schema.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The schema text is not valid YAML or JSON.
    #[error("schema text could not be decoded: {0}")]
    Decode(#[from] DecodeError),

    /// The schema document has a non-string key or an unrepresentable number.
    #[error("schema document could not be normalized: {0}")]
    Normalize(#[from] NormalizationError),

    /// A schema position holds something other than an object or a boolean.
    #[error("schema at '{location}' must be an object or a boolean")]
    InvalidSchema {
        /// Schema location (`#/properties/x`).
        location: String,
    },

    /// A keyword is neither core, an annotation, nor registered.
    #[error("unknown keyword '{keyword}' at '{location}'")]
    UnknownKeyword {
        /// The keyword.
        keyword: String,
        /// Schema location of the object holding it.
        location: String,
    },

    /// A keyword's value is malformed, or an extension rejected it.
    #[error("invalid value for '{keyword}' at '{location}': {reason}")]
    InvalidKeywordValue {
        /// The keyword.
        keyword: String,
        /// Schema location of the object holding it.
        location: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// A `$ref` does not point at a schema in this document.
    #[error("cannot resolve reference '{reference}' at '{location}': {reason}")]
    UnresolvedReference {
        /// The reference text.
        reference: String,
        /// Schema location holding the `$ref`.
        location: String,
        /// Why it could not be resolved.
        reason: String,
    },

    /// A chain of references and in-place applicators leads back to itself.
    #[error("reference cycle through '{location}' never descends into the instance")]
    ReferenceCycle {
        /// A schema location on the cycle.
        location: String,
    },
}

/// Index of a node inside a [`CompiledSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// JSON value kinds named by the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    /// `null`
    Null,
    /// `boolean`
    Boolean,
    /// `object`
    Object,
    /// `array`
    Array,
    /// `number` (integers included)
    Number,
    /// `integer` (numbers with no fractional part)
    Integer,
    /// `string`
    String,
}

impl JsonType {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(Self::Null),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    /// The name used in schemas.
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
        }
    }

    /// Returns true if `value` is of this type.
    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Null, Value::Null)
            | (Self::Boolean, Value::Bool(_))
            | (Self::Object, Value::Object(_))
            | (Self::Array, Value::Array(_))
            | (Self::Number, Value::Number(_))
            | (Self::String, Value::String(_)) => true,
            (Self::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        }
    }

    /// The most specific type name of `value`.
    pub fn name_of(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
        }
    }
}

/// An extension keyword bound to one schema node.
#[derive(Debug)]
pub struct ExtensionConstraint {
    keyword: String,
    literal: String,
    validator: Box<dyn Keyword>,
}

impl ExtensionConstraint {
    /// The keyword name.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// The keyword's value as written in the schema.
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// The bound validator.
    pub fn validator(&self) -> &dyn Keyword {
        self.validator.as_ref()
    }
}

/// `if` / `then` / `else` on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conditional {
    pub(crate) if_schema: NodeId,
    pub(crate) then_schema: Option<NodeId>,
    pub(crate) else_schema: Option<NodeId>,
}

/// One compiled schema object (or boolean schema).
#[derive(Debug, Default)]
pub struct SchemaNode {
    pub(crate) location: String,
    pub(crate) reject_all: bool,
    pub(crate) types: Vec<JsonType>,
    pub(crate) enum_values: Option<Vec<Value>>,
    pub(crate) const_value: Option<Value>,
    pub(crate) required: Vec<String>,
    pub(crate) minimum: Option<f64>,
    pub(crate) maximum: Option<f64>,
    pub(crate) exclusive_minimum: Option<f64>,
    pub(crate) exclusive_maximum: Option<f64>,
    pub(crate) multiple_of: Option<f64>,
    pub(crate) min_length: Option<u64>,
    pub(crate) max_length: Option<u64>,
    pub(crate) pattern: Option<Regex>,
    pub(crate) min_items: Option<u64>,
    pub(crate) max_items: Option<u64>,
    pub(crate) unique_items: bool,
    pub(crate) min_properties: Option<u64>,
    pub(crate) max_properties: Option<u64>,
    pub(crate) properties: Vec<(String, NodeId)>,
    pub(crate) pattern_properties: Vec<(Regex, NodeId)>,
    pub(crate) additional_properties: Option<NodeId>,
    pub(crate) items: Option<NodeId>,
    pub(crate) all_of: Vec<NodeId>,
    pub(crate) any_of: Vec<NodeId>,
    pub(crate) one_of: Vec<NodeId>,
    pub(crate) not: Option<NodeId>,
    pub(crate) condition: Option<Conditional>,
    pub(crate) reference: Option<NodeId>,
    pub(crate) extensions: Vec<ExtensionConstraint>,
}

impl SchemaNode {
    /// Schema location of this node, e.g. `#/properties/spec`.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns true for the `false` schema.
    pub fn rejects_all(&self) -> bool {
        self.reject_all
    }

    /// Extension keywords bound to this node, in schema order.
    pub fn extensions(&self) -> &[ExtensionConstraint] {
        &self.extensions
    }

    /// Nodes evaluated against the same instance as this one.
    fn in_place_children(&self) -> impl Iterator<Item = NodeId> + '_ {
        let condition = self.condition.iter().flat_map(|c| {
            std::iter::once(c.if_schema)
                .chain(c.then_schema)
                .chain(c.else_schema)
        });
        self.reference
            .iter()
            .copied()
            .chain(self.all_of.iter().copied())
            .chain(self.any_of.iter().copied())
            .chain(self.one_of.iter().copied())
            .chain(self.not)
            .chain(condition)
    }
}

/// A compiled schema: a node arena and its root.
#[derive(Debug)]
pub struct CompiledSchema {
    nodes: Vec<SchemaNode>,
    root: NodeId,
}

impl CompiledSchema {
    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node. Returns `None` for an id that belongs to a different,
    /// larger schema.
    pub fn node(&self, id: NodeId) -> Option<&SchemaNode> {
        self.nodes.get(id.0)
    }

    /// Node lookup for ids handed out by this arena.
    pub(crate) fn at(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// Number of compiled nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no node was compiled (never the case for a compiled schema).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of extension constraints across all nodes.
    pub fn extension_count(&self) -> usize {
        self.nodes.iter().map(|n| n.extensions.len()).sum()
    }

    fn check_reference_cycles(&self) -> Result<(), CompileError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        fn visit(
            schema: &CompiledSchema,
            id: NodeId,
            marks: &mut [Mark],
        ) -> Result<(), CompileError> {
            match marks[id.0] {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    return Err(CompileError::ReferenceCycle {
                        location: schema.at(id).location.clone(),
                    })
                }
                Mark::Unvisited => {}
            }
            marks[id.0] = Mark::Active;
            for child in schema.at(id).in_place_children() {
                visit(schema, child, marks)?;
            }
            marks[id.0] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        for index in 0..self.nodes.len() {
            visit(self, NodeId(index), &mut marks)?;
        }
        Ok(())
    }
}

/// Compile schema text (YAML or JSON) against a registry.
///
/// # Errors
///
/// Any [`CompileError`]; no partial schema is returned.
pub fn compile(schema_text: &str, registry: &Registry) -> Result<CompiledSchema, CompileError> {
    let decoded = decode_yaml(schema_text)?;
    let document = normalize(&decoded)?;
    compile_value(&document, registry)
}

/// Compile an already normalized schema document.
pub fn compile_value(
    document: &Value,
    registry: &Registry,
) -> Result<CompiledSchema, CompileError> {
    let mut compiler = Compiler {
        document,
        registry,
        nodes: Vec::new(),
        by_pointer: HashMap::new(),
    };
    let root = compiler.compile_at(String::new(), document)?;
    let schema = CompiledSchema {
        nodes: compiler.nodes,
        root,
    };
    schema.check_reference_cycles()?;
    tracing::debug!(
        nodes = schema.len(),
        extensions = schema.extension_count(),
        "compiled schema"
    );
    Ok(schema)
}

/// Escape one JSON Pointer token.
fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

struct Compiler<'a> {
    document: &'a Value,
    registry: &'a Registry,
    nodes: Vec<SchemaNode>,
    by_pointer: HashMap<String, NodeId>,
}

impl<'a> Compiler<'a> {
    fn compile_at(&mut self, pointer: String, schema: &'a Value) -> Result<NodeId, CompileError> {
        if let Some(&id) = self.by_pointer.get(&pointer) {
            return Ok(id);
        }
        let id = NodeId(self.nodes.len());
        // Reserve the slot first so recursive references resolve to it.
        self.nodes.push(SchemaNode::default());
        self.by_pointer.insert(pointer.clone(), id);
        let node = self.build_node(&pointer, schema)?;
        self.nodes[id.0] = node;
        Ok(id)
    }

    fn build_node(&mut self, pointer: &str, schema: &'a Value) -> Result<SchemaNode, CompileError> {
        let location = format!("#{pointer}");
        let object = match schema {
            Value::Bool(accept) => {
                return Ok(SchemaNode {
                    location,
                    reject_all: !accept,
                    ..SchemaNode::default()
                })
            }
            Value::Object(object) => object,
            _ => return Err(CompileError::InvalidSchema { location }),
        };

        let mut node = SchemaNode {
            location: location.clone(),
            ..SchemaNode::default()
        };
        let mut if_schema = None;
        let mut then_schema = None;
        let mut else_schema = None;

        for (keyword, value) in object {
            let arg = KeywordValue {
                keyword,
                location: &location,
                value,
            };
            let here = format!("{pointer}/{}", escape_token(keyword));
            match keyword.as_str() {
                "type" => node.types = arg.types()?,
                "enum" => node.enum_values = Some(arg.array()?.clone()),
                "const" => node.const_value = Some(value.clone()),
                "required" => node.required = arg.string_array()?,
                "minimum" => node.minimum = Some(arg.number()?),
                "maximum" => node.maximum = Some(arg.number()?),
                "exclusiveMinimum" => node.exclusive_minimum = Some(arg.number()?),
                "exclusiveMaximum" => node.exclusive_maximum = Some(arg.number()?),
                "multipleOf" => node.multiple_of = Some(arg.positive_number()?),
                "minLength" => node.min_length = Some(arg.count()?),
                "maxLength" => node.max_length = Some(arg.count()?),
                "pattern" => node.pattern = Some(arg.regex(arg.string()?)?),
                "minItems" => node.min_items = Some(arg.count()?),
                "maxItems" => node.max_items = Some(arg.count()?),
                "uniqueItems" => node.unique_items = arg.boolean()?,
                "minProperties" => node.min_properties = Some(arg.count()?),
                "maxProperties" => node.max_properties = Some(arg.count()?),
                "properties" => {
                    for (name, sub) in arg.object()? {
                        let id = self.compile_at(format!("{here}/{}", escape_token(name)), sub)?;
                        node.properties.push((name.clone(), id));
                    }
                }
                "patternProperties" => {
                    for (pattern, sub) in arg.object()? {
                        let regex = arg.regex(pattern)?;
                        let id =
                            self.compile_at(format!("{here}/{}", escape_token(pattern)), sub)?;
                        node.pattern_properties.push((regex, id));
                    }
                }
                "additionalProperties" => {
                    node.additional_properties = Some(self.compile_at(here, value)?)
                }
                "items" => {
                    if value.is_array() {
                        return Err(arg.invalid("the array form of 'items' is not supported"));
                    }
                    node.items = Some(self.compile_at(here, value)?);
                }
                "allOf" => node.all_of = self.compile_branches(&arg, &here)?,
                "anyOf" => node.any_of = self.compile_branches(&arg, &here)?,
                "oneOf" => node.one_of = self.compile_branches(&arg, &here)?,
                "not" => node.not = Some(self.compile_at(here, value)?),
                "if" => if_schema = Some(self.compile_at(here, value)?),
                "then" => then_schema = Some(self.compile_at(here, value)?),
                "else" => else_schema = Some(self.compile_at(here, value)?),
                "$ref" => node.reference = Some(self.resolve_reference(&arg)?),
                annotation if ANNOTATION_KEYWORDS.contains(&annotation) => {}
                extension => {
                    let definition = self.registry.get(extension).ok_or_else(|| {
                        CompileError::UnknownKeyword {
                            keyword: extension.to_string(),
                            location: location.clone(),
                        }
                    })?;
                    let validator = definition
                        .bind(value)
                        .map_err(|e| arg.invalid(e.to_string()))?;
                    node.extensions.push(ExtensionConstraint {
                        keyword: extension.to_string(),
                        literal: literal_text(value),
                        validator,
                    });
                }
            }
        }

        // `then` / `else` without `if` have no effect.
        if let Some(if_schema) = if_schema {
            node.condition = Some(Conditional {
                if_schema,
                then_schema,
                else_schema,
            });
        }
        Ok(node)
    }

    fn compile_branches(
        &mut self,
        arg: &KeywordValue<'_, 'a>,
        here: &str,
    ) -> Result<Vec<NodeId>, CompileError> {
        let branches = arg.array()?;
        if branches.is_empty() {
            return Err(arg.invalid("expected a non-empty array of schemas"));
        }
        branches
            .iter()
            .enumerate()
            .map(|(index, branch)| self.compile_at(format!("{here}/{index}"), branch))
            .collect()
    }

    fn resolve_reference(&mut self, arg: &KeywordValue<'_, 'a>) -> Result<NodeId, CompileError> {
        let reference = arg.string()?;
        let unresolved = |reason: &str| CompileError::UnresolvedReference {
            reference: reference.to_string(),
            location: arg.location.to_string(),
            reason: reason.to_string(),
        };
        let fragment = reference
            .strip_prefix('#')
            .ok_or_else(|| unresolved("only local references ('#...') are supported"))?;
        let target = self
            .document
            .pointer(fragment)
            .ok_or_else(|| unresolved("no schema at this location"))?;
        self.compile_at(fragment.to_string(), target)
    }
}

/// Text of an extension keyword's value as written in the schema.
fn literal_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A keyword and its raw value, with typed accessors that produce
/// [`CompileError::InvalidKeywordValue`] on mismatch.
struct KeywordValue<'s, 'v> {
    keyword: &'v str,
    location: &'s str,
    value: &'v Value,
}

impl<'s, 'v> KeywordValue<'s, 'v> {
    fn invalid(&self, reason: impl Into<String>) -> CompileError {
        CompileError::InvalidKeywordValue {
            keyword: self.keyword.to_string(),
            location: self.location.to_string(),
            reason: reason.into(),
        }
    }

    fn number(&self) -> Result<f64, CompileError> {
        self.value
            .as_f64()
            .ok_or_else(|| self.invalid("expected a number"))
    }

    fn positive_number(&self) -> Result<f64, CompileError> {
        match self.number()? {
            n if n > 0.0 => Ok(n),
            _ => Err(self.invalid("expected a number greater than zero")),
        }
    }

    fn count(&self) -> Result<u64, CompileError> {
        self.value
            .as_u64()
            .ok_or_else(|| self.invalid("expected a non-negative integer"))
    }

    fn boolean(&self) -> Result<bool, CompileError> {
        self.value
            .as_bool()
            .ok_or_else(|| self.invalid("expected a boolean"))
    }

    fn string(&self) -> Result<&'v str, CompileError> {
        self.value
            .as_str()
            .ok_or_else(|| self.invalid("expected a string"))
    }

    fn array(&self) -> Result<&'v Vec<Value>, CompileError> {
        self.value
            .as_array()
            .ok_or_else(|| self.invalid("expected an array"))
    }

    fn object(&self) -> Result<&'v serde_json::Map<String, Value>, CompileError> {
        self.value
            .as_object()
            .ok_or_else(|| self.invalid("expected an object"))
    }

    fn string_array(&self) -> Result<Vec<String>, CompileError> {
        self.array()?
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.invalid("expected an array of strings"))
            })
            .collect()
    }

    fn types(&self) -> Result<Vec<JsonType>, CompileError> {
        let names: Vec<&str> = match self.value {
            Value::String(name) => vec![name.as_str()],
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| self.invalid("expected an array of type names"))
                })
                .collect::<Result<_, _>>()?,
            _ => return Err(self.invalid("expected a type name or an array of type names")),
        };
        names
            .into_iter()
            .map(|name| {
                JsonType::from_name(name)
                    .ok_or_else(|| self.invalid(format!("unknown type '{name}'")))
            })
            .collect()
    }

    fn regex(&self, pattern: &str) -> Result<Regex, CompileError> {
        Regex::new(pattern)
            .map_err(|e| self.invalid(format!("invalid regular expression: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MAXIMUM_QUANTITY, MINIMUM_QUANTITY};

    fn quantity_registry() -> Registry {
        Registry::with_quantity_keywords().unwrap()
    }

    #[test]
    fn test_compile_json_text() {
        let schema = compile(
            r#"{"type": "object", "properties": {"cpu": {"maximumQuantity": "2"}}}"#,
            &quantity_registry(),
        )
        .unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.extension_count(), 1);
        let root = schema.at(schema.root());
        assert_eq!(root.location(), "#");
        assert_eq!(root.types, vec![JsonType::Object]);
        let (name, cpu) = &root.properties[0];
        assert_eq!(name, "cpu");
        let cpu = schema.at(*cpu);
        assert_eq!(cpu.location(), "#/properties/cpu");
        assert_eq!(cpu.extensions()[0].keyword(), MAXIMUM_QUANTITY);
        assert_eq!(cpu.extensions()[0].literal(), "2");
    }

    #[test]
    fn test_node_lookup_with_foreign_id() {
        let registry = quantity_registry();
        let small = compile("{}", &registry).unwrap();
        let large = compile(
            r#"{"properties": {"a": {"type": "string"}, "b": {"maximumQuantity": "1"}}}"#,
            &registry,
        )
        .unwrap();
        let (_, last) = large.at(large.root()).properties[1];
        assert_eq!(
            large.node(last).map(SchemaNode::location),
            Some("#/properties/b")
        );
        assert!(small.node(last).is_none());
        assert!(small.node(small.root()).is_some());
    }

    #[test]
    fn test_compile_yaml_text() {
        let text = r#"
type: object
required: [limits]
properties:
  limits:
    type: object
    properties:
      memory:
        minimumQuantity: 64Mi
        maximumQuantity: 4Gi
"#;
        let schema = compile(text, &quantity_registry()).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.extension_count(), 2);
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let err = compile(r#"{"minimumQuantity": "1"}"#, &Registry::new()).unwrap_err();
        match err {
            CompileError::UnknownKeyword { keyword, location } => {
                assert_eq!(keyword, MINIMUM_QUANTITY);
                assert_eq!(location, "#");
            }
            other => panic!("Expected UnknownKeyword, got: {other}"),
        }
    }

    #[test]
    fn test_unknown_keyword_in_nested_schema() {
        let err = compile(
            r#"{"properties": {"a": {"items": {"resourceMinimum": "1"}}}}"#,
            &quantity_registry(),
        )
        .unwrap_err();
        match err {
            CompileError::UnknownKeyword { keyword, location } => {
                assert_eq!(keyword, "resourceMinimum");
                assert_eq!(location, "#/properties/a/items");
            }
            other => panic!("Expected UnknownKeyword, got: {other}"),
        }
    }

    #[test]
    fn test_bad_bound_literal_is_compile_error() {
        let err = compile(r#"{"minimumQuantity": "two"}"#, &quantity_registry()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::InvalidKeywordValue { ref keyword, .. } if keyword == MINIMUM_QUANTITY
        ));
        let err = compile(r#"{"maximumQuantity": ["1"]}"#, &quantity_registry()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidKeywordValue { .. }));
    }

    #[test]
    fn test_annotations_ignored() {
        let schema = compile(
            r#"{"$schema": "https://json-schema.org/draft/2020-12/schema",
                "title": "t", "description": "d", "default": 1, "format": "anything",
                "definitions": {"unused": {"notAKeyword": true}}}"#,
            &Registry::new(),
        )
        .unwrap();
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn test_boolean_schemas() {
        let schema = compile(
            r#"{"properties": {"open": true, "closed": false}}"#,
            &Registry::new(),
        )
        .unwrap();
        let root = schema.at(schema.root());
        let closed = root.properties.iter().find(|(n, _)| n == "closed").unwrap().1;
        let open = root.properties.iter().find(|(n, _)| n == "open").unwrap().1;
        assert!(schema.at(closed).rejects_all());
        assert!(!schema.at(open).rejects_all());
    }

    #[test]
    fn test_invalid_schema_shape() {
        let err = compile(r#"{"properties": {"a": 5}}"#, &Registry::new()).unwrap_err();
        match err {
            CompileError::InvalidSchema { location } => assert_eq!(location, "#/properties/a"),
            other => panic!("Expected InvalidSchema, got: {other}"),
        }
    }

    #[test]
    fn test_malformed_core_values() {
        let registry = Registry::new();
        for text in [
            r#"{"type": "text"}"#,
            r#"{"type": 5}"#,
            r#"{"required": ["a", 1]}"#,
            r#"{"minLength": -1}"#,
            r#"{"multipleOf": 0}"#,
            r#"{"pattern": "("}"#,
            r#"{"anyOf": []}"#,
            r#"{"items": [{"type": "string"}]}"#,
            r#"{"exclusiveMinimum": true}"#,
            r#"{"uniqueItems": "yes"}"#,
        ] {
            let err = compile(text, &registry).unwrap_err();
            assert!(
                matches!(err, CompileError::InvalidKeywordValue { .. }),
                "{text} should be InvalidKeywordValue, got: {err}"
            );
        }
    }

    #[test]
    fn test_malformed_text() {
        assert!(matches!(
            compile("{unclosed", &Registry::new()),
            Err(CompileError::Decode(_))
        ));
        assert!(matches!(
            compile("1: {type: string}", &Registry::new()),
            Err(CompileError::Normalize(_))
        ));
    }

    #[test]
    fn test_local_references() {
        let schema = compile(
            r##"{
                "definitions": {"quantity": {"type": ["string", "number"], "minimumQuantity": "0"}},
                "properties": {
                    "cpu": {"$ref": "#/definitions/quantity"},
                    "memory": {"$ref": "#/definitions/quantity"}
                }
            }"##,
            &quantity_registry(),
        )
        .unwrap();
        let root = schema.at(schema.root());
        let cpu = schema.at(root.properties[0].1).reference.unwrap();
        let memory = schema.at(root.properties[1].1).reference.unwrap();
        // Both references share one compiled node.
        assert_eq!(cpu, memory);
        assert_eq!(schema.at(cpu).location(), "#/definitions/quantity");
        assert_eq!(schema.extension_count(), 1);
    }

    #[test]
    fn test_recursive_reference_through_properties() {
        let schema = compile(
            r##"{"type": "object", "properties": {"child": {"$ref": "#"}}}"##,
            &Registry::new(),
        )
        .unwrap();
        let root = schema.at(schema.root());
        let child = schema.at(root.properties[0].1);
        assert_eq!(child.reference, Some(schema.root()));
    }

    #[test]
    fn test_in_place_reference_cycle_rejected() {
        let err = compile(r##"{"$ref": "#"}"##, &Registry::new()).unwrap_err();
        assert!(matches!(err, CompileError::ReferenceCycle { .. }));

        let err = compile(
            r##"{"$defs": {
                    "a": {"allOf": [{"$ref": "#/$defs/b"}]},
                    "b": {"not": {"$ref": "#/$defs/a"}}
                },
                "$ref": "#/$defs/a"}"##,
            &Registry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::ReferenceCycle { .. }));
    }

    #[test]
    fn test_unresolved_references() {
        let err = compile(r##"{"$ref": "#/definitions/missing"}"##, &Registry::new()).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedReference { .. }));
        let err = compile(
            r#"{"$ref": "https://example.com/schema.json"}"#,
            &Registry::new(),
        )
        .unwrap_err();
        match err {
            CompileError::UnresolvedReference { reason, .. } => {
                assert!(reason.contains("local"));
            }
            other => panic!("Expected UnresolvedReference, got: {other}"),
        }
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let text = r##"{
            "type": "object",
            "required": ["b", "a"],
            "properties": {
                "z": {"maximumQuantity": "1Gi"},
                "a": {"anyOf": [{"type": "string"}, {"$ref": "#/$defs/n"}]},
                "m": {"patternProperties": {"^x-": {"minimumQuantity": "1"}}}
            },
            "$defs": {"n": {"type": "number", "minimum": 0}}
        }"##;
        let registry = quantity_registry();
        let a = compile(text, &registry).unwrap();
        let b = compile(text, &registry).unwrap();
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }

    #[test]
    fn test_pointer_escaping_in_locations() {
        let schema = compile(
            r##"{"properties": {
                "a/b": {"type": "string"},
                "ref": {"$ref": "#/properties/a~1b"}
            }}"##,
            &Registry::new(),
        )
        .unwrap();
        let root = schema.at(schema.root());
        let slash = root.properties.iter().find(|(n, _)| n == "a/b").unwrap().1;
        let reference = root.properties.iter().find(|(n, _)| n == "ref").unwrap().1;
        assert_eq!(schema.at(slash).location(), "#/properties/a~1b");
        assert_eq!(schema.at(reference).reference, Some(slash));
    }

    #[test]
    fn test_then_without_if_ignored() {
        let schema = compile(r#"{"then": {"type": "string"}}"#, &Registry::new()).unwrap();
        assert!(schema.at(schema.root()).condition.is_none());
    }

    #[test]
    fn test_core_keyword_detection() {
        assert!(is_core_keyword("properties"));
        assert!(is_core_keyword("title"));
        assert!(!is_core_keyword(MINIMUM_QUANTITY));
    }
}
