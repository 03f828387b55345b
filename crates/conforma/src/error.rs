//! # Error Types
//!
//! Defines all errors that can occur in CONFORMA.
//!
//! ## Architecture: Errors as Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                    ERROR HIERARCHY                                          │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                                                                             │
//! │                      ConformaError                                          │
//! │                           │                                                 │
//! │       ┌───────────────────┼───────────────────┐                             │
//! │       │                   │                   │                             │
//! │       ▼                   ▼                   ▼                             │
//! │  DefinitionError     SchemaError         Json / Io                          │
//! │  (schema authoring   (validation          (parsing, files)                  │
//! │   mistakes, raised    diagnostics,                                          │
//! │   by the normalizer)  raised by process)                                    │
//! │                                                                             │
//! │  PRINCIPLE: A broken schema is a programmer error and surfaces              │
//! │             eagerly; a broken input surfaces as typed Issues with           │
//! │             a code and a path.                                              │
//! │                                                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// ============================================================================
// VALIDATION DIAGNOSTICS
// ============================================================================

/// Closed vocabulary of validation diagnostic codes.
///
/// Every issue reported by a compiled validator carries exactly one of
/// these codes. The set is closed: new failure modes map onto an existing
/// code rather than extending the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    /// Value is not a boolean.
    ExpectedBoolean,
    /// Value is not a number (or is null where a number is required).
    ExpectedNumber,
    /// Value is not a string.
    ExpectedString,
    /// Value is not an object.
    ExpectedObject,
    /// Value is not an array.
    ExpectedArray,
    /// Value is the right shape but fails a semantic constraint
    /// (`$allowed`, `$exp`, `$fn`, non-integral number, forbidden character).
    InvalidValue,
    /// Numeric value outside its permitted range, or a `numeric` value
    /// exceeding `$precision`/`$scale`.
    OutOfRange,
    /// String or array length outside `$length`/`$minLength`/`$maxLength`.
    LengthConstraint,
    /// Input object carries a property the schema does not declare.
    UnexpectedProperty,
    /// A required property is absent.
    MissingProperty,
    /// The caller's roles do not satisfy the field's write expression.
    NoAccess,
    /// A domain string (color, uuid, mac, ip, isbn, date, ...) is malformed.
    InvalidFormat,
    /// String does not match the `$pattern` regex.
    PatternMismatch,
}

impl IssueCode {
    /// Returns the canonical code name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExpectedBoolean => "ExpectedBoolean",
            Self::ExpectedNumber => "ExpectedNumber",
            Self::ExpectedString => "ExpectedString",
            Self::ExpectedObject => "ExpectedObject",
            Self::ExpectedArray => "ExpectedArray",
            Self::InvalidValue => "InvalidValue",
            Self::OutOfRange => "OutOfRange",
            Self::LengthConstraint => "LengthConstraint",
            Self::UnexpectedProperty => "UnexpectedProperty",
            Self::MissingProperty => "MissingProperty",
            Self::NoAccess => "NoAccess",
            Self::InvalidFormat => "InvalidFormat",
            Self::PatternMismatch => "PatternMismatch",
        }
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation diagnostic: a code plus the path of the offending
/// value.
///
/// Paths are `.`-joined field names from the root; array indices appear as
/// `[n]`; field names that literally start with `$` are escaped back to
/// `\$`. The root path is the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Diagnostic code from the closed vocabulary.
    pub code: IssueCode,
    /// Dotted field path from the root, empty for the root value itself.
    pub path: String,
}

impl Issue {
    /// Creates an issue for the given code and path.
    pub fn new(code: IssueCode, path: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} at {}", self.code, self.path)
        }
    }
}

/// Error carrier thrown by `process` when an input fails validation.
///
/// In fail-fast mode (the default) `issues` holds exactly one entry; with
/// [`Options::ACCUMULATE_ERRORS`](crate::Options::ACCUMULATE_ERRORS) it
/// holds every issue found, in depth-first declaration order of the schema.
#[derive(Error, Debug, Clone)]
#[error("validation failed: {}", issue_list(.issues))]
pub struct SchemaError {
    /// All collected diagnostics, in schema declaration order.
    pub issues: Vec<Issue>,
}

impl SchemaError {
    /// Wraps a list of issues.
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }
}

/// Helper function: formats an issue list as a comma-separated string.
fn issue_list(issues: &[Issue]) -> String {
    if issues.is_empty() {
        "(none)".to_string()
    } else {
        issues
            .iter()
            .map(Issue::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============================================================================
// SCHEMA DEFINITION ERRORS
// ============================================================================

/// Error raised eagerly by the normalizer for a broken schema descriptor.
///
/// These are programmer mistakes — no input value is involved yet, so they
/// are deliberately distinct from [`SchemaError`].
#[derive(Error, Debug, Clone)]
pub enum DefinitionError {
    /// `$type` names a type the registry does not know.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A directive is not recognized, or not supported by the node's type.
    #[error("type {type_name} does not support directive {directive}")]
    UnknownDirective {
        type_name: String,
        directive: String,
    },

    /// A `$type` shorthand string could not be parsed.
    #[error("invalid type shorthand {shorthand:?}: {reason}")]
    InvalidShorthand { shorthand: String, reason: String },

    /// A directive carries a value of the wrong shape.
    #[error("invalid value for directive {directive}: {reason}")]
    InvalidDirective { directive: String, reason: String },

    /// An `$exp` expression failed to compile.
    #[error("invalid expression {expression:?}: {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// An `$r`/`$w`/`$a` access expression violates the grammar.
    #[error("invalid access expression {expression:?}: {reason}")]
    InvalidAccess { expression: String, reason: String },

    /// `$include` brought in a field that is already defined.
    #[error("duplicate field from $include: {0}")]
    DuplicateField(String),

    /// `$fn` names a predicate that was not supplied.
    #[error("unknown predicate: {0}")]
    UnknownPredicate(String),

    /// An enum key collides with the factory's own members.
    #[error("reserved enum key: {0}")]
    ReservedEnumKey(String),

    /// An enum value is not a finite integer.
    #[error("invalid enum value for key {key}: {reason}")]
    InvalidEnumValue { key: String, reason: String },

    /// The descriptor tree itself is malformed.
    #[error("invalid schema descriptor: {0}")]
    InvalidDescriptor(String),
}

// ============================================================================
// MAIN ERROR TYPE
// ============================================================================

/// Main error type for all CONFORMA operations.
///
/// Library entry points return the specific error they can produce
/// ([`DefinitionError`] from `schema`, [`SchemaError`] from `process`);
/// this umbrella exists for callers that thread both through one `?` chain,
/// such as the CLI and the file-loading helpers.
#[derive(Error, Debug)]
pub enum ConformaError {
    /// Schema authoring error.
    #[error("schema definition failed: {0}")]
    Definition(#[from] DefinitionError),

    /// Input validation error.
    #[error(transparent)]
    Validation(#[from] SchemaError),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient alias for CONFORMA operations.
pub type ConformaResult<T> = Result<T, ConformaError>;

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_display() {
        let issue = Issue::new(IssueCode::ExpectedBoolean, "a.b[2]");
        assert_eq!(issue.to_string(), "ExpectedBoolean at a.b[2]");
    }

    #[test]
    fn test_issue_display_root() {
        let issue = Issue::new(IssueCode::ExpectedObject, "");
        assert_eq!(issue.to_string(), "ExpectedObject");
    }

    #[test]
    fn test_schema_error_display() {
        let error = SchemaError::new(vec![
            Issue::new(IssueCode::ExpectedNumber, "b"),
            Issue::new(IssueCode::MissingProperty, "c"),
        ]);
        assert_eq!(
            error.to_string(),
            "validation failed: ExpectedNumber at b, MissingProperty at c"
        );
    }

    #[test]
    fn test_empty_schema_error() {
        let error = SchemaError::new(vec![]);
        assert_eq!(error.to_string(), "validation failed: (none)");
    }

    #[test]
    fn test_error_conversion() {
        let definition_error = DefinitionError::UnknownType("int7".into());
        let conforma_error: ConformaError = definition_error.into();
        assert!(matches!(conforma_error, ConformaError::Definition(_)));
    }
}
