//! # Type Shorthand Parser
//!
//! Parses compact `$type` strings into a base type, nullability markers
//! and array dimensions.
//!
//! ```text
//! "int"            →  int
//! "int?"           →  nullable int
//! "int[]"          →  array of int
//! "int?[2:4][]?"   →  array (2..4) of nullable arrays of nullable int
//! "numeric(5, 2)"  →  numeric, precision 5, scale 2
//! ```
//!
//! A dimension parses outward: `int[2][3]` is an outer array of length 2
//! whose elements are arrays of length 3. `?` may appear at most once per
//! level; bounds are `n` (exact), `n:` (min), `:m` (max), `n:m`, or empty.

use crate::error::DefinitionError;

/// One `[bound]` dimension with its optional `?` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dim {
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub nullable: bool,
}

/// Parsed `$type` shorthand.
#[derive(Debug, Clone, PartialEq)]
pub struct Shorthand {
    pub base: String,
    /// `numeric(p, s)`-style arguments.
    pub args: Option<Vec<f64>>,
    pub base_nullable: bool,
    /// Dimensions in written (outer-to-inner) order.
    pub dims: Vec<Dim>,
}

/// Parses a `$type` string.
pub fn parse(type_str: &str) -> Result<Shorthand, DefinitionError> {
    let err = |reason: &str| DefinitionError::InvalidShorthand {
        shorthand: type_str.to_string(),
        reason: reason.to_string(),
    };
    let chars: Vec<char> = type_str.chars().collect();
    let mut i = 0;

    // Base name: letters, digits and dashes (datetime-ms).
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-') {
        i += 1;
    }
    if i == 0 {
        return Err(err("missing base type"));
    }
    let base: String = chars[..i].iter().collect();

    // Optional argument list: numeric(5, 2).
    let mut args = None;
    if chars.get(i) == Some(&'(') {
        let close = chars[i..]
            .iter()
            .position(|c| *c == ')')
            .ok_or_else(|| err("unterminated argument list"))?
            + i;
        let list: String = chars[i + 1..close].iter().collect();
        let mut parsed = Vec::new();
        for part in list.split(',') {
            let part = part.trim();
            let n: f64 = part
                .parse()
                .map_err(|_| err("arguments must be numbers"))?;
            parsed.push(n);
        }
        args = Some(parsed);
        i = close + 1;
    }

    // Base-level nullability.
    let mut base_nullable = false;
    if chars.get(i) == Some(&'?') {
        base_nullable = true;
        i += 1;
        if chars.get(i) == Some(&'?') {
            return Err(err("repeated '?'"));
        }
    }

    // Dimensions, each with its own optional '?'.
    let mut dims = Vec::new();
    while i < chars.len() {
        if chars[i] != '[' {
            return Err(err("unexpected trailing characters"));
        }
        let close = chars[i..]
            .iter()
            .position(|c| *c == ']')
            .ok_or_else(|| err("unterminated '['"))?
            + i;
        let bound: String = chars[i + 1..close].iter().collect();
        let (min, max) = parse_bound(&bound).ok_or_else(|| err("bad dimension bound"))?;
        i = close + 1;
        let mut nullable = false;
        if chars.get(i) == Some(&'?') {
            nullable = true;
            i += 1;
            if chars.get(i) == Some(&'?') {
                return Err(err("repeated '?'"));
            }
        }
        dims.push(Dim {
            min,
            max,
            nullable,
        });
    }

    Ok(Shorthand {
        base,
        args,
        base_nullable,
        dims,
    })
}

/// Parses `""`, `"n"`, `"n:"`, `":m"` or `"n:m"`.
fn parse_bound(bound: &str) -> Option<(Option<usize>, Option<usize>)> {
    if bound.is_empty() {
        return Some((None, None));
    }
    let side = |s: &str| -> Option<Option<usize>> {
        if s.is_empty() {
            Some(None)
        } else if s.bytes().all(|b| b.is_ascii_digit()) {
            Some(Some(s.parse().ok()?))
        } else {
            None
        }
    };
    match bound.split_once(':') {
        None => {
            let n = side(bound)??;
            Some((Some(n), Some(n)))
        }
        Some((lo, hi)) => {
            if lo.is_empty() && hi.is_empty() {
                return None;
            }
            Some((side(lo)?, side(hi)?))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
