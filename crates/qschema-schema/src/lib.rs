//! # qschema-schema: Quantity-Aware Schema Validation
//!
//! Validates semi-structured configuration documents against a JSON Schema
//! subset extended with custom comparison keywords. The two built-in
//! extensions, `minimumQuantity` and `maximumQuantity`, bound
//! resource-quantity fields (`cpu: 500m`, `memory: 2Gi`) exactly, which plain
//! `minimum`/`maximum` cannot do.
//!
//! ## Pipeline
//!
//! 1. [`registry`]: `(name, meta-schema, factory)` table of extension
//!    keywords. Meta-schemas are checked with the `jsonschema` crate.
//! 2. [`compile`]: schema text to an arena of nodes, with every keyword
//!    resolved and every extension bound. Unknown keywords fail here.
//! 3. [`evaluate`]: non-short-circuiting walk producing a nested error tree
//!    plus warnings for values that could not be compared.
//! 4. [`reduce`]: narrows the tree to its most specific entries.
//! 5. [`validate`]: the facade tying it together with [`ValidationOptions`].
//!
//! Decoding and normalization of documents live in `qschema-core`.
//!
//! ## Crate Policy
//!
//! - Depends only on `qschema-core` internally.
//! - No I/O. Callers supply schema and document text.
//! - A compiled schema is immutable and is built fresh per validation call.

pub mod compile;
pub mod evaluate;
pub mod reduce;
pub mod registry;
pub mod validate;

pub use compile::{compile, compile_value, CompileError, CompiledSchema, NodeId, SchemaNode};
pub use evaluate::{evaluate, EvaluateError, Evaluation, Evaluator, ValidationError, Warning};
pub use reduce::{reduce, reduce_all_branches};
pub use registry::{
    Keyword, KeywordOutcome, Registry, RegistryError, MAXIMUM_QUANTITY, MINIMUM_QUANTITY,
};
pub use validate::{
    ReductionStrategy, Report, SchemaValidator, ValidateError, ValidationOptions,
};
