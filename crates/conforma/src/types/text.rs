//! # Text Types
//!
//! `char`, `string`, `text` and `textline`.
//!
//! ```text
//! Type       Control chars (< U+0020)    Line separators
//! ─────────────────────────────────────────────────────────
//! string     all rejected                rejected (< U+0020)
//! text       \t \n \r permitted          permitted
//! textline   \t permitted                \n \r U+2028 U+2029 rejected
//! ```
//!
//! Rust strings are valid UTF-8, so unpaired surrogates cannot reach the
//! checkers; surrogate-pair correctness holds by construction.

use serde_json::Value;

use crate::error::{DefinitionError, IssueCode};
use crate::types::Directives;

// ============================================================================
// CHAR
// ============================================================================

/// Constraints of a `char` node.
#[derive(Debug, Clone)]
pub struct CharSpec {
    /// String of permitted characters, if restricted.
    pub allowed: Option<String>,
    /// Whether the empty string is additionally admitted.
    pub empty: bool,
}

pub(crate) fn build_char(bag: &mut Directives<'_>) -> Result<CharSpec, DefinitionError> {
    Ok(CharSpec {
        allowed: bag.take_str("$allowed")?.map(str::to_string),
        empty: bag.take_bool("$empty")?.unwrap_or(false),
    })
}

pub(crate) fn check_char(value: &Value, spec: &CharSpec) -> Result<(), IssueCode> {
    let Value::String(s) = value else {
        return Err(IssueCode::ExpectedString);
    };
    if s.is_empty() {
        return if spec.empty {
            Ok(())
        } else {
            Err(IssueCode::InvalidValue)
        };
    }
    let mut chars = s.chars();
    let c = chars.next().expect("non-empty");
    if chars.next().is_some() {
        return Err(IssueCode::InvalidValue);
    }
    if let Some(allowed) = &spec.allowed {
        if !allowed.contains(c) {
            return Err(IssueCode::InvalidValue);
        }
    }
    Ok(())
}

// ============================================================================
// STRING FAMILY
// ============================================================================

/// Which control-character policy a text node enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextClass {
    /// `string`: no code points below U+0020.
    Plain,
    /// `text`: tab, newline and carriage return permitted.
    Text,
    /// `textline`: tab permitted, all line separators rejected.
    Line,
}

/// A compiled `$pattern` regex with its source kept for fingerprints.
#[derive(Debug, Clone)]
pub struct PatternSpec {
    pub source: String,
    pub regex: regex::Regex,
}

/// Constraints of a `string`/`text`/`textline` node.
#[derive(Debug, Clone)]
pub struct TextSpec {
    pub class: TextClass,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub pattern: Option<PatternSpec>,
    pub empty: bool,
}

pub(crate) fn build_text(
    base: &str,
    bag: &mut Directives<'_>,
) -> Result<TextSpec, DefinitionError> {
    let class = match base {
        "string" => TextClass::Plain,
        "text" => TextClass::Text,
        "textline" => TextClass::Line,
        _ => unreachable!("registry dispatch"),
    };
    let mut min_len = bag.take_index("$minLength")?;
    let mut max_len = bag.take_index("$maxLength")?;
    if let Some(exact) = bag.take_index("$length")? {
        min_len = Some(exact);
        max_len = Some(exact);
    }
    let pattern = match bag.take_str("$pattern")? {
        None => None,
        Some(src) => Some(PatternSpec {
            source: src.to_string(),
            regex: regex::Regex::new(src)
                .map_err(|e| bag.invalid("$pattern", &e.to_string()))?,
        }),
    };
    Ok(TextSpec {
        class,
        min_len,
        max_len,
        pattern,
        empty: bag.take_bool("$empty")?.unwrap_or(false),
    })
}

fn permitted(class: TextClass, c: char) -> bool {
    match class {
        TextClass::Plain => c >= '\u{20}',
        TextClass::Text => c >= '\u{20}' || c == '\t' || c == '\n' || c == '\r',
        TextClass::Line => {
            (c >= '\u{20}' || c == '\t') && c != '\u{2028}' && c != '\u{2029}'
        }
    }
}

pub(crate) fn check_text(value: &Value, spec: &TextSpec) -> Result<(), IssueCode> {
    let Value::String(s) = value else {
        return Err(IssueCode::ExpectedString);
    };
    if s.is_empty() {
        return if spec.empty {
            Ok(())
        } else {
            Err(IssueCode::InvalidValue)
        };
    }
    if !s.chars().all(|c| permitted(spec.class, c)) {
        return Err(IssueCode::InvalidValue);
    }
    let len = s.chars().count();
    if spec.min_len.is_some_and(|m| len < m) || spec.max_len.is_some_and(|m| len > m) {
        return Err(IssueCode::LengthConstraint);
    }
    if let Some(pattern) = &spec.pattern {
        if !pattern.regex.is_match(s) {
            return Err(IssueCode::PatternMismatch);
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
