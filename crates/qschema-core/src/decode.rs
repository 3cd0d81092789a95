//! # YAML Decoding
//!
//! Turns document text into `serde_yaml::Value` trees. JSON is a subset of
//! YAML, so JSON text decodes through the same path. Mapping keys keep
//! whatever type YAML gave them; [`crate::normalize`] deals with that.

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::DecodeError;

/// Decode a single YAML (or JSON) document.
///
/// # Errors
///
/// Returns [`DecodeError::Yaml`] for malformed text or for a stream that
/// holds more than one document.
pub fn decode_yaml(text: &str) -> Result<Value, DecodeError> {
    Ok(serde_yaml::from_str(text)?)
}

/// Decode every document of a `---`-separated YAML stream, in order.
///
/// # Errors
///
/// Returns [`DecodeError::Yaml`] for the first malformed document; no
/// documents are returned in that case.
pub fn decode_yaml_stream(text: &str) -> Result<Vec<Value>, DecodeError> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        documents.push(Value::deserialize(document)?);
    }
    Ok(documents)
}
