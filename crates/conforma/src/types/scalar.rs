//! # Scalar Types
//!
//! Numeric families of the catalog: fixed-width integers, floats, the
//! `numeric` decimal, and the string-carried big integers.
//!
//! ```text
//! Family       Value shape        Range source
//! ──────────────────────────────────────────────────────────
//! Int          JSON number        type width ∩ $min/$max
//! Float        JSON number        preset (lat/lon) ∩ $min/$max
//! Numeric      number or string   $precision / $scale digits
//! BigInt       string             64-bit bounds ∩ $min/$max
//! ```

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{DefinitionError, IssueCode};
use crate::misc::{compare_big_int, is_big_int};
use crate::types::Directives;

/// Largest integer magnitude exactly representable in a double.
const MAX_SAFE: i128 = (1_i128 << 53) - 1;

static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("valid pattern"));

// ============================================================================
// INTEGERS
// ============================================================================

/// Resolved integer bounds. `i128` holds the full `u64` input range.
#[derive(Debug, Clone)]
pub struct IntSpec {
    pub lo: Option<i128>,
    pub hi: Option<i128>,
}

pub(crate) fn build_int(base: &str, bag: &mut Directives<'_>) -> Result<IntSpec, DefinitionError> {
    let (type_lo, type_hi): (Option<i128>, Option<i128>) = match base {
        "int" => (None, None),
        "uint" => (Some(0), None),
        "int8" => (Some(-128), Some(127)),
        "int16" => (Some(-32_768), Some(32_767)),
        "int24" => (Some(-8_388_608), Some(8_388_607)),
        "int32" => (Some(-2_147_483_648), Some(2_147_483_647)),
        "int53" => (Some(-MAX_SAFE), Some(MAX_SAFE)),
        "uint8" => (Some(0), Some(255)),
        "uint16" => (Some(0), Some(65_535)),
        "uint24" => (Some(0), Some(16_777_215)),
        "uint32" => (Some(0), Some(4_294_967_295)),
        "uint53" => (Some(0), Some(MAX_SAFE)),
        _ => unreachable!("registry dispatch"),
    };

    let mut lo = type_lo;
    let mut hi = type_hi;
    if let Some(min) = bag.take_f64("$min")? {
        lo = tighter_lo(lo, min.ceil() as i128);
    }
    if let Some(min) = bag.take_f64("$minExclusive")? {
        lo = tighter_lo(lo, min.floor() as i128 + 1);
    }
    if let Some(max) = bag.take_f64("$max")? {
        hi = tighter_hi(hi, max.floor() as i128);
    }
    if let Some(max) = bag.take_f64("$maxExclusive")? {
        hi = tighter_hi(hi, max.ceil() as i128 - 1);
    }
    Ok(IntSpec { lo, hi })
}

fn tighter_lo(current: Option<i128>, candidate: i128) -> Option<i128> {
    Some(current.map_or(candidate, |c| c.max(candidate)))
}

fn tighter_hi(current: Option<i128>, candidate: i128) -> Option<i128> {
    Some(current.map_or(candidate, |c| c.min(candidate)))
}

pub(crate) fn check_int(value: &Value, spec: &IntSpec) -> Result<(), IssueCode> {
    let Value::Number(n) = value else {
        return Err(IssueCode::ExpectedNumber);
    };
    let i: i128 = if let Some(i) = n.as_i64() {
        i128::from(i)
    } else if let Some(u) = n.as_u64() {
        i128::from(u)
    } else {
        let f = n.as_f64().unwrap_or(f64::NAN);
        if !f.is_finite() || f.fract() != 0.0 {
            return Err(IssueCode::InvalidValue);
        }
        f as i128
    };
    if spec.lo.is_some_and(|lo| i < lo) || spec.hi.is_some_and(|hi| i > hi) {
        return Err(IssueCode::OutOfRange);
    }
    Ok(())
}

// ============================================================================
// FLOATS
// ============================================================================

/// Resolved float bounds (`number`, `double`, `lat`, `lon`).
#[derive(Debug, Clone)]
pub struct FloatSpec {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_exclusive: Option<f64>,
    pub max_exclusive: Option<f64>,
}

pub(crate) fn build_float(
    base: &str,
    bag: &mut Directives<'_>,
) -> Result<FloatSpec, DefinitionError> {
    let (preset_min, preset_max) = match base {
        "lat" => (Some(-90.0), Some(90.0)),
        "lon" => (Some(-180.0), Some(180.0)),
        _ => (None, None),
    };
    let mut min = preset_min;
    let mut max = preset_max;
    if let Some(m) = bag.take_f64("$min")? {
        min = Some(min.map_or(m, |c: f64| c.max(m)));
    }
    if let Some(m) = bag.take_f64("$max")? {
        max = Some(max.map_or(m, |c: f64| c.min(m)));
    }
    Ok(FloatSpec {
        min,
        max,
        min_exclusive: bag.take_f64("$minExclusive")?,
        max_exclusive: bag.take_f64("$maxExclusive")?,
    })
}

pub(crate) fn check_float(value: &Value, spec: &FloatSpec) -> Result<(), IssueCode> {
    let Value::Number(n) = value else {
        return Err(IssueCode::ExpectedNumber);
    };
    // serde_json numbers are always finite, so only the bounds remain.
    let f = n.as_f64().ok_or(IssueCode::ExpectedNumber)?;
    if spec.min.is_some_and(|m| f < m)
        || spec.max.is_some_and(|m| f > m)
        || spec.min_exclusive.is_some_and(|m| f <= m)
        || spec.max_exclusive.is_some_and(|m| f >= m)
    {
        return Err(IssueCode::OutOfRange);
    }
    Ok(())
}

// ============================================================================
// NUMERIC (decimal)
// ============================================================================

/// Digit budget of a `numeric` node: `precision` total digits of which at
/// most `scale` are fractional.
#[derive(Debug, Clone)]
pub struct NumericSpec {
    pub precision: u32,
    pub scale: u32,
}

pub(crate) fn build_numeric(
    args: Option<&[f64]>,
    bag: &mut Directives<'_>,
) -> Result<NumericSpec, DefinitionError> {
    let (mut precision, mut scale) = (None, None);
    if let Some(args) = args {
        if args.len() != 2 || args.iter().any(|a| a.fract() != 0.0 || *a < 0.0) {
            return Err(DefinitionError::InvalidShorthand {
                shorthand: "numeric".into(),
                reason: "numeric(p, s) takes two non-negative integers".into(),
            });
        }
        precision = Some(args[0] as u32);
        scale = Some(args[1] as u32);
    }
    if let Some(p) = bag.take_index("$precision")? {
        precision = Some(p as u32);
    }
    if let Some(s) = bag.take_index("$scale")? {
        scale = Some(s as u32);
    }
    let precision = precision.ok_or_else(|| bag.invalid("$precision", "numeric requires it"))?;
    let scale = scale.unwrap_or(0);
    if scale >= precision {
        return Err(bag.invalid("$scale", "requires 0 <= scale < precision"));
    }
    Ok(NumericSpec { precision, scale })
}

pub(crate) fn check_numeric(value: &Value, spec: &NumericSpec) -> Result<(), IssueCode> {
    let rendered;
    let s = match value {
        Value::String(s) => s.as_str(),
        Value::Number(n) => {
            rendered = n.to_string();
            rendered.as_str()
        }
        _ => return Err(IssueCode::ExpectedNumber),
    };
    if !DECIMAL.is_match(s) {
        return Err(IssueCode::InvalidFormat);
    }
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (unsigned, ""),
    };
    let int_digits = int_part.trim_start_matches('0').len() as u32;
    let frac_digits = frac_part.len() as u32;
    if frac_digits > spec.scale || int_digits > spec.precision.saturating_sub(spec.scale) {
        return Err(IssueCode::OutOfRange);
    }
    Ok(())
}

// ============================================================================
// BIG INTEGERS
// ============================================================================

/// String bounds for `bigint`, `int64`, `uint64`; compared with
/// [`compare_big_int`], never parsed into machine integers.
#[derive(Debug, Clone)]
pub struct BigIntSpec {
    pub min: Option<String>,
    pub max: Option<String>,
    pub min_exclusive: Option<String>,
    pub max_exclusive: Option<String>,
}

pub(crate) fn build_bigint(
    base: &str,
    bag: &mut Directives<'_>,
) -> Result<BigIntSpec, DefinitionError> {
    let (type_min, type_max) = match base {
        "bigint" => (None, None),
        "int64" => (
            Some("-9223372036854775808".to_string()),
            Some("9223372036854775807".to_string()),
        ),
        "uint64" => (
            Some("0".to_string()),
            Some("18446744073709551615".to_string()),
        ),
        _ => unreachable!("registry dispatch"),
    };
    let mut min = type_min;
    let mut max = type_max;
    if let Some(m) = take_big_int(bag, "$min")? {
        min = Some(match &min {
            Some(t) if compare_big_int(t, &m) == Ordering::Greater => t.clone(),
            _ => m,
        });
    }
    if let Some(m) = take_big_int(bag, "$max")? {
        max = Some(match &max {
            Some(t) if compare_big_int(t, &m) == Ordering::Less => t.clone(),
            _ => m,
        });
    }
    Ok(BigIntSpec {
        min,
        max,
        min_exclusive: take_big_int(bag, "$minExclusive")?,
        max_exclusive: take_big_int(bag, "$maxExclusive")?,
    })
}

fn take_big_int(
    bag: &mut Directives<'_>,
    name: &str,
) -> Result<Option<String>, DefinitionError> {
    match bag.take_str(name)? {
        None => Ok(None),
        Some(s) if is_big_int(s) => Ok(Some(s.to_string())),
        Some(_) => Err(bag.invalid(name, "expected a big-integer string")),
    }
}

pub(crate) fn check_bigint(value: &Value, spec: &BigIntSpec) -> Result<(), IssueCode> {
    let Value::String(s) = value else {
        return Err(IssueCode::ExpectedString);
    };
    if !is_big_int(s) {
        return Err(IssueCode::InvalidFormat);
    }
    if spec
        .min
        .as_deref()
        .is_some_and(|m| compare_big_int(s, m) == Ordering::Less)
        || spec
            .max
            .as_deref()
            .is_some_and(|m| compare_big_int(s, m) == Ordering::Greater)
        || spec
            .min_exclusive
            .as_deref()
            .is_some_and(|m| compare_big_int(s, m) != Ordering::Greater)
        || spec
            .max_exclusive
            .as_deref()
            .is_some_and(|m| compare_big_int(s, m) != Ordering::Less)
    {
        return Err(IssueCode::OutOfRange);
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag() -> Directives<'static> {
        Directives::new("test", std::iter::empty())
    }

    fn int_spec(base: &str) -> IntSpec {
        build_int(base, &mut bag()).unwrap()
    }

    #[test]
    fn test_int8_bounds() {
        let spec = int_spec("int8");
        assert!(check_int(&json!(-128), &spec).is_ok());
        assert!(check_int(&json!(127), &spec).is_ok());
        assert_eq!(check_int(&json!(-129), &spec), Err(IssueCode::OutOfRange));
        assert_eq!(check_int(&json!(128), &spec), Err(IssueCode::OutOfRange));
    }

    #[test]
    fn test_int_rejects_non_numbers() {
        let spec = int_spec("int");
        assert_eq!(check_int(&json!(true), &spec), Err(IssueCode::ExpectedNumber));
        assert_eq!(check_int(&json!("5"), &spec), Err(IssueCode::ExpectedNumber));
        assert_eq!(check_int(&json!(1.5), &spec), Err(IssueCode::InvalidValue));
    }

    #[test]
    fn test_int_accepts_integral_floats() {
        let spec = int_spec("int");
        assert!(check_int(&json!(3.0), &spec).is_ok());
    }

    #[test]
    fn test_uint53_bounds() {
        let spec = int_spec("uint53");
        assert!(check_int(&json!(9_007_199_254_740_991_u64), &spec).is_ok());
        assert_eq!(
            check_int(&json!(9_007_199_254_740_992_u64), &spec),
            Err(IssueCode::OutOfRange)
        );
        assert_eq!(check_int(&json!(-1), &spec), Err(IssueCode::OutOfRange));
    }

    #[test]
    fn test_min_max_intersect_type_bounds() {
        let min = json!(0);
        let max = json!(200);
        let entries = [("$min", &min), ("$max", &max)];
        let mut b = Directives::new("int8", entries.into_iter());
        let spec = build_int("int8", &mut b).unwrap();
        // $max 200 cannot widen int8's 127.
        assert_eq!(spec.lo, Some(0));
        assert_eq!(spec.hi, Some(127));
    }

    #[test]
    fn test_lat_lon_presets() {
        let lat = build_float("lat", &mut bag()).unwrap();
        assert!(check_float(&json!(-90.0), &lat).is_ok());
        assert_eq!(check_float(&json!(90.5), &lat), Err(IssueCode::OutOfRange));

        let lon = build_float("lon", &mut bag()).unwrap();
        assert!(check_float(&json!(179.9), &lon).is_ok());
        assert_eq!(check_float(&json!(-181), &lon), Err(IssueCode::OutOfRange));
    }

    #[test]
    fn test_float_exclusive_bounds() {
        let zero = json!(0);
        let entries = [("$minExclusive", &zero)];
        let mut b = Directives::new("number", entries.into_iter());
        let spec = build_float("number", &mut b).unwrap();
        assert_eq!(check_float(&json!(0), &spec), Err(IssueCode::OutOfRange));
        assert!(check_float(&json!(0.001), &spec).is_ok());
    }

    #[test]
    fn test_numeric_digits() {
        let spec = NumericSpec {
            precision: 5,
            scale: 2,
        };
        assert!(check_numeric(&json!("123.45"), &spec).is_ok());
        assert!(check_numeric(&json!(123.45), &spec).is_ok());
        assert!(check_numeric(&json!("0.25"), &spec).is_ok());
        assert_eq!(
            check_numeric(&json!("1234.5"), &spec),
            Err(IssueCode::OutOfRange)
        );
        assert_eq!(
            check_numeric(&json!("1.234"), &spec),
            Err(IssueCode::OutOfRange)
        );
        assert_eq!(
            check_numeric(&json!("12a"), &spec),
            Err(IssueCode::InvalidFormat)
        );
        assert_eq!(
            check_numeric(&json!(true), &spec),
            Err(IssueCode::ExpectedNumber)
        );
    }

    #[test]
    fn test_numeric_requires_scale_below_precision() {
        let result = build_numeric(Some(&[2.0, 2.0]), &mut bag());
        assert!(result.is_err());
        let spec = build_numeric(Some(&[5.0, 2.0]), &mut bag()).unwrap();
        assert_eq!(spec.precision, 5);
        assert_eq!(spec.scale, 2);
    }

    #[test]
    fn test_int64_bounds() {
        let spec = build_bigint("int64", &mut bag()).unwrap();
        assert!(check_bigint(&json!("9223372036854775807"), &spec).is_ok());
        assert_eq!(
            check_bigint(&json!("9223372036854775808"), &spec),
            Err(IssueCode::OutOfRange)
        );
        assert!(check_bigint(&json!("-9223372036854775808"), &spec).is_ok());
        assert_eq!(
            check_bigint(&json!("-9223372036854775809"), &spec),
            Err(IssueCode::OutOfRange)
        );
    }

    #[test]
    fn test_uint64_bounds() {
        let spec = build_bigint("uint64", &mut bag()).unwrap();
        assert!(check_bigint(&json!("18446744073709551615"), &spec).is_ok());
        assert_eq!(
            check_bigint(&json!("-1"), &spec),
            Err(IssueCode::OutOfRange)
        );
    }

    #[test]
    fn test_bigint_exclusive_bounds() {
        let min = json!("0");
        let entries = [("$minExclusive", &min)];
        let mut b = Directives::new("bigint", entries.into_iter());
        let spec = build_bigint("bigint", &mut b).unwrap();
        assert_eq!(check_bigint(&json!("0"), &spec), Err(IssueCode::OutOfRange));
        assert!(check_bigint(&json!("1"), &spec).is_ok());
    }

    #[test]
    fn test_bigint_shape() {
        let spec = build_bigint("bigint", &mut bag()).unwrap();
        assert!(check_bigint(&json!("0"), &spec).is_ok());
        assert_eq!(
            check_bigint(&json!(12), &spec),
            Err(IssueCode::ExpectedString)
        );
        assert_eq!(
            check_bigint(&json!("012"), &spec),
            Err(IssueCode::InvalidFormat)
        );
    }
}
