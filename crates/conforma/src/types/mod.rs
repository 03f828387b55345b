//! # Type Registry
//!
//! The runtime type library: every named type the schema language knows,
//! each contributing a normalize-time builder (consume directives, bake
//! defaults, produce a [`Kind`]) and a validate-time checker.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       TYPE CATALOG                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  scalar.rs    any bool int uint int8..53 uint8..53 number      │
//! │               double numeric lat lon bigint int64 uint64       │
//! │  text.rs      char string text textline                        │
//! │  format.rs    color creditcard isbn mac ip uuid                │
//! │  datetime.rs  date time datetime datetime-ms datetime-us       │
//! │  (normalizer) object map array                                 │
//! │                                                                 │
//! │  build(base, directives)  →  Kind  (schema compile time)       │
//! │  Kind + Value             →  Ok | IssueCode  (validate time)   │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod datetime;
pub mod format;
pub mod scalar;
pub mod text;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::DefinitionError;
use crate::schema::{Node, ObjectSpec};

pub use datetime::DateTimeSpec;
pub use format::{ColorSpec, IpFormat, IpSpec, IsbnFormat, MacSeparator, UuidFormat, UuidSpec, UuidVersion};
pub use scalar::{BigIntSpec, FloatSpec, IntSpec, NumericSpec};
pub use text::{CharSpec, TextClass, TextSpec};

// ============================================================================
// KIND
// ============================================================================

/// Resolved type of a normalized schema node, with all type-specific
/// directives folded into the variant's constraint data.
///
/// The validator dispatches exhaustively on this tag; there is no
/// stringly-typed lookup at validation time.
#[derive(Debug, Clone)]
pub enum Kind {
    /// Anything except an absent value and (unless nullable) null.
    Any,
    /// Literal booleans only.
    Bool,
    /// Integer families with resolved bounds.
    Int(IntSpec),
    /// Finite floating point, optionally bounded (`number`, `double`,
    /// `lat`, `lon`).
    Float(FloatSpec),
    /// Arbitrary-precision decimal constrained by precision/scale.
    Numeric(NumericSpec),
    /// Big integers carried as strings (`bigint`, `int64`, `uint64`).
    BigInt(BigIntSpec),
    /// Exactly one Unicode code point.
    Char(CharSpec),
    /// String family (`string`, `text`, `textline`).
    Text(TextSpec),
    /// `#RGB` / `#RRGGBB` / CSS names / extra names.
    Color(ColorSpec),
    /// Digits, length 13-19, Luhn checksum.
    CreditCard,
    /// 10- or 13-digit ISBN with checksum.
    Isbn(IsbnFormat),
    /// 48-bit MAC address.
    Mac(MacSeparator),
    /// IPv4/IPv6 address, optionally with a required port.
    Ip(IpSpec),
    /// Canonical 8-4-4-4-12 UUID.
    Uuid(UuidSpec),
    /// Date/time against a compiled format.
    DateTime(DateTimeSpec),
    /// Record with named fields and derived metadata.
    Object(ObjectSpec),
    /// Homogeneous string-keyed map; `$data` is the value schema.
    Map(Box<Node>),
    /// Ordered sequence; `$data`/shorthand supplies the element schema.
    Array(ArraySpec),
}

/// Element schema and length bounds of an array node.
#[derive(Debug, Clone)]
pub struct ArraySpec {
    pub element: Box<Node>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
}

// ============================================================================
// DIRECTIVE CONSUMPTION
// ============================================================================

/// Tracks which directives of a descriptor node have been consumed.
///
/// The normalizer takes the common directives, the type builder takes its
/// type-specific ones, and whatever remains is either unknown or not
/// applicable to the resolved type — both a [`DefinitionError`].
pub(crate) struct Directives<'a> {
    type_name: String,
    map: IndexMap<&'a str, &'a Value>,
}

impl<'a> Directives<'a> {
    pub fn new(type_name: &str, entries: impl Iterator<Item = (&'a str, &'a Value)>) -> Self {
        Self {
            type_name: type_name.to_string(),
            map: entries.collect(),
        }
    }

    /// Removes and returns a directive value; explicit `null` counts as
    /// absent (a cleared directive).
    pub fn take(&mut self, name: &str) -> Option<&'a Value> {
        match self.map.shift_remove(name) {
            Some(Value::Null) => None,
            other => other,
        }
    }

    /// Removes a directive, keeping an explicit `null` observable.
    pub fn take_raw(&mut self, name: &str) -> Option<&'a Value> {
        self.map.shift_remove(name)
    }

    pub fn take_bool(&mut self, name: &str) -> Result<Option<bool>, DefinitionError> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.invalid(name, "expected a boolean")),
        }
    }

    pub fn take_str(&mut self, name: &str) -> Result<Option<&'a str>, DefinitionError> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(self.invalid(name, "expected a string")),
        }
    }

    pub fn take_f64(&mut self, name: &str) -> Result<Option<f64>, DefinitionError> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(_) => Err(self.invalid(name, "expected a number")),
        }
    }

    /// Non-negative integer directives (`$length`, `$minLength`, ...).
    pub fn take_index(&mut self, name: &str) -> Result<Option<usize>, DefinitionError> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(u) => Ok(Some(u as usize)),
                None => Err(self.invalid(name, "expected a non-negative integer")),
            },
            Some(_) => Err(self.invalid(name, "expected a non-negative integer")),
        }
    }

    pub fn invalid(&self, name: &str, reason: &str) -> DefinitionError {
        DefinitionError::InvalidDirective {
            directive: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Fails if any directive was neither consumed nor applicable.
    pub fn finish(self) -> Result<(), DefinitionError> {
        if let Some((name, _)) = self.map.into_iter().next() {
            return Err(DefinitionError::UnknownDirective {
                type_name: self.type_name,
                directive: name.to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// REGISTRY DISPATCH
// ============================================================================

/// Builds the [`Kind`] for a scalar base type, consuming its type-specific
/// directives.
///
/// Returns `Ok(None)` for the container types (`object`, `map`, `array`),
/// which the normalizer materializes itself; `Err` for a name the registry
/// does not know.
pub(crate) fn build_scalar(
    base: &str,
    args: Option<&[f64]>,
    bag: &mut Directives<'_>,
) -> Result<Option<Kind>, DefinitionError> {
    if args.is_some() && base != "numeric" {
        return Err(DefinitionError::InvalidShorthand {
            shorthand: base.to_string(),
            reason: "only numeric(p, s) accepts arguments".into(),
        });
    }
    let kind = match base {
        "object" | "map" | "array" => return Ok(None),
        "any" => Kind::Any,
        "bool" => Kind::Bool,
        "int" | "uint" | "int8" | "int16" | "int24" | "int32" | "int53" | "uint8" | "uint16"
        | "uint24" | "uint32" | "uint53" => Kind::Int(scalar::build_int(base, bag)?),
        "number" | "double" | "lat" | "lon" => Kind::Float(scalar::build_float(base, bag)?),
        "numeric" => Kind::Numeric(scalar::build_numeric(args, bag)?),
        "bigint" | "int64" | "uint64" => Kind::BigInt(scalar::build_bigint(base, bag)?),
        "char" => Kind::Char(text::build_char(bag)?),
        "string" | "text" | "textline" => Kind::Text(text::build_text(base, bag)?),
        "color" => Kind::Color(format::build_color(bag)?),
        "creditcard" => Kind::CreditCard,
        "isbn" => Kind::Isbn(format::build_isbn(bag)?),
        "mac" => Kind::Mac(format::build_mac(bag)?),
        "ip" => Kind::Ip(format::build_ip(bag)?),
        "uuid" => Kind::Uuid(format::build_uuid(bag)?),
        "date" | "time" | "datetime" | "datetime-ms" | "datetime-us" => {
            Kind::DateTime(datetime::build(base, bag)?)
        }
        _ => return Err(DefinitionError::UnknownType(base.to_string())),
    };
    Ok(Some(kind))
}

/// Returns true if `name` is a registered type name.
pub fn is_known_type(name: &str) -> bool {
    matches!(
        name,
        "any" | "bool"
            | "int" | "uint"
            | "int8" | "int16" | "int24" | "int32" | "int53"
            | "uint8" | "uint16" | "uint24" | "uint32" | "uint53"
            | "number" | "double" | "numeric" | "lat" | "lon"
            | "bigint" | "int64" | "uint64"
            | "char" | "string" | "text" | "textline"
            | "color" | "creditcard" | "isbn" | "mac" | "ip" | "uuid"
            | "date" | "time" | "datetime" | "datetime-ms" | "datetime-us"
            | "object" | "map" | "array"
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_bag() -> Directives<'static> {
        Directives::new("test", std::iter::empty())
    }

    #[test]
    fn test_known_types() {
        for name in ["any", "int8", "uint53", "textline", "datetime-us", "map"] {
            assert!(is_known_type(name), "{name}");
        }
        assert!(!is_known_type("int7"));
        assert!(!is_known_type(""));
    }

    #[test]
    fn test_build_scalar_unknown() {
        let mut bag = empty_bag();
        assert!(matches!(
            build_scalar("float128", None, &mut bag),
            Err(DefinitionError::UnknownType(_))
        ));
    }

    #[test]
    fn test_build_scalar_containers_deferred() {
        for name in ["object", "map", "array"] {
            let mut bag = empty_bag();
            assert!(build_scalar(name, None, &mut bag).unwrap().is_none());
        }
    }

    #[test]
    fn test_args_only_for_numeric() {
        let mut bag = empty_bag();
        let result = build_scalar("int", Some(&[5.0]), &mut bag);
        assert!(matches!(
            result,
            Err(DefinitionError::InvalidShorthand { .. })
        ));
    }

    #[test]
    fn test_unconsumed_directive_fails() {
        let precision = serde_json::json!(5);
        let entries = [("$precision", &precision)];
        let mut bag = Directives::new("bool", entries.into_iter());
        build_scalar("bool", None, &mut bag).unwrap();
        assert!(matches!(
            bag.finish(),
            Err(DefinitionError::UnknownDirective { .. })
        ));
    }
}
