//! # Document Normalization: String-Keyed Canonical Trees
//!
//! A decoded YAML document may carry mapping keys of any type (`1: x`,
//! `true: y`, even `{a: b}: z`). Schemas only speak about string-named
//! members, so before evaluation the document is rewritten into a
//! `serde_json::Value` tree.
//!
//! ## Rules
//!
//! 1. `null`, booleans, integers and strings pass through unchanged.
//! 2. Floats pass through unless they are NaN or infinite, which JSON cannot
//!    hold ([`NormalizationError::UnrepresentableNumber`]).
//! 3. Sequences are rewritten element-wise, order preserved.
//! 4. Mappings are rewritten value-wise; every key must be a string (a tagged
//!    string counts). The first non-string key anywhere aborts the whole call
//!    with [`NormalizationError::NonStringKey`]; no partial tree is returned.
//!    Two keys that name the same member (`cpu` and `!t cpu`) fail with
//!    [`NormalizationError::DuplicateKey`].
//! 5. YAML tags are transparent: `!custom value` normalizes as `value`.
//!
//! An optional depth limit turns pathologically nested input into
//! [`NormalizationError::DepthExceeded`] instead of deep recursion.

use serde_json::{Map, Number, Value};
use serde_yaml::Value as YamlValue;

use crate::error::NormalizationError;
use crate::path::InstancePath;

/// Rewrite a decoded document into string-keyed form with no depth limit.
///
/// # Errors
///
/// See the module documentation for the failure rules.
pub fn normalize(document: &YamlValue) -> Result<Value, NormalizationError> {
    normalize_with_limit(document, None)
}

/// Rewrite a decoded document into string-keyed form.
///
/// With `max_depth = Some(n)`, a value nested more than `n` containers below
/// the root fails with [`NormalizationError::DepthExceeded`].
pub fn normalize_with_limit(
    document: &YamlValue,
    max_depth: Option<usize>,
) -> Result<Value, NormalizationError> {
    let mut path = InstancePath::root();
    normalize_value(document, &mut path, max_depth)
}

fn normalize_value(
    value: &YamlValue,
    path: &mut InstancePath,
    max_depth: Option<usize>,
) -> Result<Value, NormalizationError> {
    if let Some(max_depth) = max_depth {
        if path.depth() > max_depth {
            return Err(NormalizationError::DepthExceeded {
                path: path.clone(),
                max_depth,
            });
        }
    }

    match value {
        YamlValue::Null => Ok(Value::Null),
        YamlValue::Bool(b) => Ok(Value::Bool(*b)),
        YamlValue::Number(n) => normalize_number(n, path),
        YamlValue::String(s) => Ok(Value::String(s.clone())),
        YamlValue::Sequence(seq) => {
            let mut items = Vec::with_capacity(seq.len());
            for (index, item) in seq.iter().enumerate() {
                path.push_index(index);
                let normalized = normalize_value(item, path, max_depth);
                path.pop();
                items.push(normalized?);
            }
            Ok(Value::Array(items))
        }
        YamlValue::Mapping(mapping) => {
            let mut object = Map::new();
            for (key, item) in mapping {
                let key = string_key(key).ok_or_else(|| NormalizationError::NonStringKey {
                    path: path.clone(),
                    key: describe_key(key),
                })?;
                if object.contains_key(key) {
                    return Err(NormalizationError::DuplicateKey {
                        path: path.clone(),
                        key: key.to_string(),
                    });
                }
                path.push_key(key);
                let normalized = normalize_value(item, path, max_depth);
                path.pop();
                object.insert(key.to_string(), normalized?);
            }
            Ok(Value::Object(object))
        }
        YamlValue::Tagged(tagged) => normalize_value(&tagged.value, path, max_depth),
    }
}

fn normalize_number(
    n: &serde_yaml::Number,
    path: &InstancePath,
) -> Result<Value, NormalizationError> {
    if let Some(i) = n.as_i64() {
        Ok(Value::Number(Number::from(i)))
    } else if let Some(u) = n.as_u64() {
        Ok(Value::Number(Number::from(u)))
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| NormalizationError::UnrepresentableNumber {
                path: path.clone(),
                value: n.to_string(),
            })
    }
}

fn string_key(key: &YamlValue) -> Option<&str> {
    match key {
        YamlValue::String(s) => Some(s),
        YamlValue::Tagged(tagged) => match &tagged.value {
            YamlValue::String(s) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

fn describe_key(key: &YamlValue) -> String {
    match key {
        YamlValue::Null => "null".to_string(),
        YamlValue::Bool(b) => format!("boolean {b}"),
        YamlValue::Number(n) => format!("number {n}"),
        YamlValue::String(s) => format!("string {s:?}"),
        YamlValue::Sequence(_) => "sequence".to_string(),
        YamlValue::Mapping(_) => "mapping".to_string(),
        YamlValue::Tagged(tagged) => format!("tagged value {}", tagged.tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_yaml;
    use serde_json::json;

    fn normalize_text(text: &str) -> Result<Value, NormalizationError> {
        normalize(&decode_yaml(text).unwrap())
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(normalize_text("null").unwrap(), json!(null));
        assert_eq!(normalize_text("true").unwrap(), json!(true));
        assert_eq!(normalize_text("42").unwrap(), json!(42));
        assert_eq!(normalize_text("-7").unwrap(), json!(-7));
        assert_eq!(normalize_text("1.5").unwrap(), json!(1.5));
        assert_eq!(normalize_text("hello").unwrap(), json!("hello"));
    }

    #[test]
    fn test_nested_document() {
        let doc = r#"
apiVersion: v1
kind: Pod
spec:
  containers:
    - name: app
      resources:
        limits:
          cpu: 500m
          memory: 1Gi
"#;
        let value = normalize_text(doc).unwrap();
        assert_eq!(
            value,
            json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "spec": {
                    "containers": [{
                        "name": "app",
                        "resources": {"limits": {"cpu": "500m", "memory": "1Gi"}}
                    }]
                }
            })
        );
    }

    #[test]
    fn test_sequence_order_preserved() {
        let value = normalize_text("[3, 1, 2]").unwrap();
        assert_eq!(value, json!([3, 1, 2]));
    }

    #[test]
    fn test_integer_key_rejected() {
        let err = normalize_text("spec:\n  1: one\n").unwrap_err();
        match err {
            NormalizationError::NonStringKey { path, key } => {
                assert_eq!(path.to_string(), "/spec");
                assert_eq!(key, "number 1");
            }
            other => panic!("Expected NonStringKey, got: {other}"),
        }
    }

    #[test]
    fn test_mapping_key_rejected() {
        let err = normalize_text("? {a: b}\n: value\n").unwrap_err();
        assert!(matches!(
            err,
            NormalizationError::NonStringKey { ref key, .. } if key == "mapping"
        ));
    }

    #[test]
    fn test_non_string_key_inside_sequence() {
        let err = normalize_text("items:\n  - ok: 1\n  - true: 2\n").unwrap_err();
        match err {
            NormalizationError::NonStringKey { path, key } => {
                assert_eq!(path.to_string(), "/items/1");
                assert_eq!(key, "boolean true");
            }
            other => panic!("Expected NonStringKey, got: {other}"),
        }
    }

    #[test]
    fn test_null_key_rejected() {
        assert!(normalize_text("~: value\n").is_err());
    }

    #[test]
    fn test_tags_are_transparent() {
        let value = normalize_text("size: !quantity 2Gi\n").unwrap();
        assert_eq!(value, json!({"size": "2Gi"}));
    }

    #[test]
    fn test_tagged_key_colliding_with_plain_key_rejected() {
        let doc = decode_yaml("limits:\n  cpu: 1\n  !t cpu: 2\n").unwrap();
        assert_eq!(doc["limits"].as_mapping().unwrap().len(), 2);
        match normalize(&doc).unwrap_err() {
            NormalizationError::DuplicateKey { path, key } => {
                assert_eq!(path.to_string(), "/limits");
                assert_eq!(key, "cpu");
            }
            other => panic!("Expected DuplicateKey, got: {other}"),
        }
        assert_eq!(
            normalize_text("!t cpu: 2\nmemory: 1Gi\n").unwrap(),
            json!({"cpu": 2, "memory": "1Gi"})
        );
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let err = normalize_text("limit: .inf\n").unwrap_err();
        assert!(matches!(err, NormalizationError::UnrepresentableNumber { .. }));
        let err = normalize_text("- .nan\n").unwrap_err();
        match err {
            NormalizationError::UnrepresentableNumber { path, .. } => {
                assert_eq!(path.to_string(), "/0");
            }
            other => panic!("Expected UnrepresentableNumber, got: {other}"),
        }
    }

    #[test]
    fn test_depth_limit() {
        let doc = decode_yaml("a: {b: {c: {d: 1}}}").unwrap();
        assert!(normalize_with_limit(&doc, Some(4)).is_ok());
        let err = normalize_with_limit(&doc, Some(2)).unwrap_err();
        match err {
            NormalizationError::DepthExceeded { path, max_depth } => {
                assert_eq!(max_depth, 2);
                assert_eq!(path.to_string(), "/a/b/c");
            }
            other => panic!("Expected DepthExceeded, got: {other}"),
        }
    }

    #[test]
    fn test_deep_nesting_without_limit() {
        let mut doc = YamlValue::String("leaf".to_string());
        for _ in 0..200 {
            doc = YamlValue::Sequence(vec![doc]);
        }
        let value = normalize(&doc).unwrap();
        let mut cursor = &value;
        for _ in 0..200 {
            cursor = &cursor[0];
        }
        assert_eq!(cursor, &json!("leaf"));
    }
}
