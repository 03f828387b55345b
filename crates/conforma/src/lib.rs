//! # CONFORMA
//!
//! Schema definition and validation engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          CONFORMA ARCHITECTURE                              │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                                                                             │
//! │    ┌─────────────┐      ┌─────────────┐      ┌─────────────┐               │
//! │    │ Descriptor  │      │ Normalizer  │      │   Schema    │               │
//! │    │ (JSON tree) │ ──→  │ (shorthands,│ ──→  │ (immutable, │               │
//! │    │             │      │  $extend)   │      │ fingerprint)│               │
//! │    └─────────────┘      └─────────────┘      └─────────────┘               │
//! │          │                    │                    │                       │
//! │          ▼                    ▼                    ▼                       │
//! │    ┌─────────────┐      ┌─────────────┐      ┌─────────────┐               │
//! │    │ Input value │      │  Compiler   │      │  Validator  │               │
//! │    │             │ ──→  │ (plan cache)│ ──→  │ (one pass)  │               │
//! │    └─────────────┘      └─────────────┘      └─────────────┘               │
//! │                                                                             │
//! │    DATA FLOW: descriptor → Schema → Program → output or SchemaError        │
//! │                                                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use conforma::{schema, process, Options};
//! use serde_json::json;
//!
//! let user = schema(&json!({
//!     "login": {"$type": "string", "$minLength": 3},
//!     "age": "uint8?",
//!     "tags": "string[:5]"
//! }))?;
//!
//! let output = process(&json!({"login": "marcus", "age": 41, "tags": []}),
//!                      &user, Options::NONE, None)?;
//! ```

// ============================================================================
// MODULES
// ============================================================================

/// Diagnostic model and error types.
pub mod error;

/// Primitive helpers: deep equality, big-integer strings, name escaping.
pub mod misc;

/// CSS named-color table.
pub mod colors;

/// Enum factory with introspection metadata.
pub mod enums;

/// Expression sub-compiler for the `$exp` directive.
pub mod expr;

/// Normalized schema model and the normalizer.
pub mod schema;

/// Runtime type library.
pub mod types;

/// Validator compiler and the routine cache.
pub mod compiler;

/// The routine interpreter.
mod validator;

use serde_json::Value;

pub use compiler::{Mode, Options, Program, Roles};
pub use error::{ConformaError, ConformaResult, DefinitionError, Issue, IssueCode, SchemaError};
pub use schema::{Predicates, Schema, Verdict};

use std::sync::Arc;

// ============================================================================
// FAÇADE
// ============================================================================

/// Normalizes a descriptor into an immutable [`Schema`].
///
/// Idempotence holds by construction: normalization consumes descriptors
/// and produces the distinct `Schema` type, which is already final.
///
/// # Errors
///
/// Returns [`DefinitionError`] for any authoring mistake: unknown types or
/// directives, malformed shorthands, bad `$exp`/access expressions,
/// duplicate `$include` fields.
pub fn schema(descriptor: &Value) -> Result<Schema, DefinitionError> {
    schema_with(descriptor, &Predicates::new())
}

/// Like [`schema`], with named predicates available to `$fn` directives.
pub fn schema_with(
    descriptor: &Value,
    predicates: &Predicates,
) -> Result<Schema, DefinitionError> {
    tracing::trace!("normalizing schema descriptor");
    let root = schema::normalize::normalize(descriptor, predicates)?;
    Ok(Schema::from_root(root))
}

/// Validates `input` against `schema` and returns the normalized output.
///
/// The compiled routine is fetched from the process-wide cache (compiling
/// on miss). `access` is the caller's role set; `None` disables access
/// checks.
///
/// # Errors
///
/// Returns [`SchemaError`] with one issue (fail-fast, the default) or all
/// issues ([`Options::ACCUMULATE_ERRORS`]) in schema declaration order.
pub fn process(
    input: &Value,
    schema: &Schema,
    options: Options,
    access: Option<&Roles>,
) -> Result<Value, SchemaError> {
    compiler::fetch(schema, options, access).run(input)
}

/// Fetches the compiled routine without running it, for introspection and
/// cache warmup.
pub fn precompile(
    mode: Mode,
    schema: &Schema,
    options: Options,
    access: Option<&Roles>,
) -> Arc<Program> {
    let Mode::Process = mode;
    compiler::fetch(schema, options, access)
}

// ============================================================================
// PRELUDE
// ============================================================================

/// Frequently used items for a single import.
///
/// ```rust,ignore
/// use conforma::prelude::*;
/// ```
pub mod prelude {
    pub use crate::compiler::{Mode, Options, Roles};
    pub use crate::error::{ConformaError, DefinitionError, Issue, IssueCode, SchemaError};
    pub use crate::schema::{Predicates, Schema, Verdict};
    pub use crate::{precompile, process, schema, schema_with};
}
