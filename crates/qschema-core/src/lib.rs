//! # qschema-core: Foundational Types for qschema
//!
//! The leaf crate of the workspace. It holds everything the schema engine
//! needs that is not itself about schemas:
//!
//! - [`quantity`]: resource-quantity strings (`100m`, `2Gi`, `1.5k`) parsed
//!   into a canonical decimal magnitude and compared exactly.
//! - [`decode`]: YAML decoding of single documents and `---` streams.
//! - [`normalize`]: rewriting a decoded YAML tree into a string-keyed JSON
//!   tree, failing on the first non-string key.
//! - [`path`]: instance paths from the document root, rendered as JSON
//!   Pointers.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `qschema-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - Every fallible operation returns a typed error from [`error`].

pub mod decode;
pub mod error;
pub mod normalize;
pub mod path;
pub mod quantity;

// Re-export primary types for ergonomic imports.
pub use decode::{decode_yaml, decode_yaml_stream};
pub use error::{DecodeError, NormalizationError, QuantityError};
pub use normalize::{normalize, normalize_with_limit};
pub use path::{InstancePath, PathToken};
pub use quantity::{compare_quantities, parse_quantity, QuantityInput, QuantityValue};
