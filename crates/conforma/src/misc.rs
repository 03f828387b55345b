//! # Primitive Helpers
//!
//! Small value-level utilities the engine is built on.
//!
//! ## Big-integer comparison
//!
//! ```text
//! compareBigInt(a, b)
//! ───────────────────
//! 1. different sign        →  negative < positive
//! 2. same sign, diff. len  →  more digits = larger magnitude
//! 3. same sign, same len   →  lexicographic digit comparison
//! (negative operands invert the magnitude ordering)
//! ```
//!
//! Big integers travel as strings throughout the engine; the `bigint`,
//! `int64` and `uint64` types never parse them into machine integers.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static VARIABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid pattern"));

static BIG_INT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(0|[1-9][0-9]*)$").expect("valid pattern"));

// ============================================================================
// STRUCTURAL EQUALITY AND CLONING
// ============================================================================

/// Structural equality over JSON values.
///
/// Differs from `Value`'s derived `PartialEq` in one observable way:
/// numbers are compared by numeric value, so `1` equals `1.0`. Objects
/// compare by key-set equality with recursive value comparison; arrays
/// compare element-wise in order. Ownership makes cycles unrepresentable
/// in `Value`, so no cycle detection is needed.
pub fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) {
                return i == j;
            }
            if let (Some(i), Some(j)) = (x.as_u64(), y.as_u64()) {
                return i == j;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(i), Some(j)) => i == j || (i.is_nan() && j.is_nan()),
                _ => false,
            }
        }
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(i, j)| equals(i, j))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| equals(v, w)))
        }
        _ => false,
    }
}

/// Structural copy of a JSON value.
///
/// Every reference in the source becomes an independent copy; the engine
/// uses this to materialize `$default` values per invocation so callers
/// can never share or mutate a default through the output.
pub fn clone_deep(value: &Value) -> Value {
    value.clone()
}

// ============================================================================
// IDENTIFIER AND NAME CLASSIFIERS
// ============================================================================

/// Returns true if `s` is a valid identifier: `[A-Za-z_$][A-Za-z0-9_$]*`.
pub fn is_variable_name(s: &str) -> bool {
    VARIABLE_NAME.is_match(s)
}

/// Returns true if `s` names a schema directive (starts with `$`).
pub fn is_directive_name(s: &str) -> bool {
    s.starts_with('$')
}

/// Converts a delimited name (`snake_case`, `kebab-case`, spaced) to
/// camelCase. Already-camel input passes through unchanged.
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' || c == '-' || c == ' ' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Escapes regex metacharacters so the result matches `s` literally.
pub fn escape_regex(s: &str) -> String {
    regex::escape(s)
}

// ============================================================================
// FIELD-NAME ESCAPING
// ============================================================================

/// Unescapes an authored field name: `\$` becomes `$`, `\\` becomes `\`.
///
/// Applied exactly once at normalization. A backslash before any other
/// character is kept literally.
pub fn unescape_field_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('$') | Some('\\') => {
                    out.push(chars.next().expect("peeked"));
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Escapes a field name back to its authored form for diagnostic paths.
pub fn escape_field_name(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\");
    if escaped.starts_with('$') {
        format!("\\{escaped}")
    } else {
        escaped
    }
}

// ============================================================================
// BIG-INTEGER STRINGS
// ============================================================================

/// Returns true if `s` is a canonical big-integer string: `-?(0|[1-9][0-9]*)`.
pub fn is_big_int(s: &str) -> bool {
    BIG_INT.is_match(s)
}

/// Total order over big-integer strings accepted by [`is_big_int`].
///
/// Sign first, then digit count, then lexicographic digits; both
/// magnitude criteria invert for negative operands.
pub fn compare_big_int(a: &str, b: &str) -> Ordering {
    let a_neg = a.starts_with('-');
    let b_neg = b.starts_with('-');
    match (a_neg, b_neg) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    let a_mag = a.strip_prefix('-').unwrap_or(a);
    let b_mag = b.strip_prefix('-').unwrap_or(b);
    let magnitude = match a_mag.len().cmp(&b_mag.len()) {
        Ordering::Equal => a_mag.cmp(b_mag),
        other => other,
    };
    if a_neg {
        magnitude.reverse()
    } else {
        magnitude
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equals_numbers_by_value() {
        assert!(equals(&json!(1), &json!(1.0)));
        assert!(equals(&json!(-3), &json!(-3)));
        assert!(!equals(&json!(1), &json!(2)));
    }

    #[test]
    fn test_equals_structures() {
        assert!(equals(
            &json!({"a": [1, {"b": "x"}]}),
            &json!({"a": [1, {"b": "x"}]})
        ));
        assert!(!equals(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!equals(&json!([1, 2]), &json!([2, 1])));
    }

    #[test]
    fn test_clone_deep_roundtrip() {
        let value = json!({"a": [1, 2.5, null], "b": {"c": "x"}});
        assert!(equals(&clone_deep(&value), &value));
    }

    #[test]
    fn test_is_variable_name() {
        assert!(is_variable_name("x"));
        assert!(is_variable_name("_private"));
        assert!(is_variable_name("$meta"));
        assert!(is_variable_name("camelCase9"));
        assert!(!is_variable_name(""));
        assert!(!is_variable_name("9lives"));
        assert!(!is_variable_name("with space"));
    }

    #[test]
    fn test_is_directive_name() {
        assert!(is_directive_name("$type"));
        assert!(!is_directive_name("type"));
        assert!(!is_directive_name("\\$type"));
    }

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("credit_card"), "creditCard");
        assert_eq!(to_camel_case("date-time-ms"), "dateTimeMs");
        assert_eq!(to_camel_case("already"), "already");
        assert_eq!(to_camel_case("_leading"), "leading");
    }

    #[test]
    fn test_field_name_escaping_roundtrip() {
        for name in ["plain", "$type", "$", "back\\slash", "$a\\$b"] {
            assert_eq!(unescape_field_name(&escape_field_name(name)), name);
        }
    }

    #[test]
    fn test_unescape_field_name() {
        assert_eq!(unescape_field_name("\\$type"), "$type");
        assert_eq!(unescape_field_name("\\\\x"), "\\x");
        assert_eq!(unescape_field_name("a\\b"), "a\\b");
    }

    #[test]
    fn test_is_big_int() {
        assert!(is_big_int("0"));
        assert!(is_big_int("-1"));
        assert!(is_big_int("9223372036854775808"));
        assert!(!is_big_int("01"));
        assert!(!is_big_int("-0"));
        assert!(!is_big_int("1.5"));
        assert!(!is_big_int(""));
        assert!(!is_big_int("+1"));
    }

    #[test]
    fn test_compare_big_int() {
        assert_eq!(compare_big_int("0", "0"), Ordering::Equal);
        assert_eq!(compare_big_int("-1", "1"), Ordering::Less);
        assert_eq!(compare_big_int("10", "9"), Ordering::Greater);
        assert_eq!(compare_big_int("-10", "-9"), Ordering::Less);
        assert_eq!(
            compare_big_int("9223372036854775807", "9223372036854775808"),
            Ordering::Less
        );
        assert_eq!(compare_big_int("123", "124"), Ordering::Less);
    }

    #[test]
    fn test_compare_big_int_is_total() {
        let values = ["-100", "-21", "-3", "0", "5", "42", "999"];
        for (i, a) in values.iter().enumerate() {
            for (j, b) in values.iter().enumerate() {
                assert_eq!(compare_big_int(a, b), i.cmp(&j), "{a} vs {b}");
            }
        }
    }
}
