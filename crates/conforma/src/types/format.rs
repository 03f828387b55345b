//! # Format Types
//!
//! Domain-specific string types: `color`, `creditcard`, `isbn`, `mac`,
//! `ip` and `uuid`. Each checker answers one question — does the string
//! belong to the format — and reports `InvalidFormat` otherwise.

use std::net::{Ipv4Addr, Ipv6Addr};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::colors::css_color;
use crate::error::{DefinitionError, IssueCode};
use crate::types::Directives;

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid pattern"));

static UUID_CORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid pattern")
});

// ============================================================================
// COLOR
// ============================================================================

/// Accepted name sources of a `color` node; hex forms are always accepted.
#[derive(Debug, Clone)]
pub struct ColorSpec {
    /// Accept CSS color names (default true).
    pub css_names: bool,
    /// Additional accepted names, lowercased at normalization.
    pub extra_names: Option<IndexMap<String, String>>,
}

pub(crate) fn build_color(bag: &mut Directives<'_>) -> Result<ColorSpec, DefinitionError> {
    let extra_names = match bag.take("$extraNames") {
        None => None,
        Some(Value::Object(map)) => {
            let mut extra = IndexMap::new();
            for (name, hex) in map {
                let Value::String(hex) = hex else {
                    return Err(bag.invalid("$extraNames", "values must be strings"));
                };
                extra.insert(name.to_ascii_lowercase(), hex.clone());
            }
            Some(extra)
        }
        Some(_) => return Err(bag.invalid("$extraNames", "expected a name-to-hex object")),
    };
    Ok(ColorSpec {
        css_names: bag.take_bool("$cssNames")?.unwrap_or(true),
        extra_names,
    })
}

pub(crate) fn check_color(value: &Value, spec: &ColorSpec) -> Result<(), IssueCode> {
    let Value::String(s) = value else {
        return Err(IssueCode::ExpectedString);
    };
    if s.starts_with('#') {
        return if HEX_COLOR.is_match(s) {
            Ok(())
        } else {
            Err(IssueCode::InvalidFormat)
        };
    }
    if spec.css_names && css_color(s).is_some() {
        return Ok(());
    }
    if let Some(extra) = &spec.extra_names {
        if extra.contains_key(s.to_ascii_lowercase().as_str()) {
            return Ok(());
        }
    }
    Err(IssueCode::InvalidFormat)
}

// ============================================================================
// CREDIT CARD
// ============================================================================

pub(crate) fn check_creditcard(value: &Value) -> Result<(), IssueCode> {
    let Value::String(s) = value else {
        return Err(IssueCode::ExpectedString);
    };
    if s.len() < 13 || s.len() > 19 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IssueCode::InvalidFormat);
    }
    if !luhn(s) {
        return Err(IssueCode::InvalidFormat);
    }
    Ok(())
}

/// Luhn checksum over an all-digit string.
fn luhn(digits: &str) -> bool {
    let mut sum = 0u32;
    for (i, b) in digits.bytes().rev().enumerate() {
        let mut d = u32::from(b - b'0');
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

// ============================================================================
// ISBN
// ============================================================================

/// Which ISBN lengths a node admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsbnFormat {
    Any,
    Ten,
    Thirteen,
}

pub(crate) fn build_isbn(bag: &mut Directives<'_>) -> Result<IsbnFormat, DefinitionError> {
    Ok(match bag.take_str("$format")? {
        None => IsbnFormat::Any,
        Some("isbn10") => IsbnFormat::Ten,
        Some("isbn13") => IsbnFormat::Thirteen,
        Some(_) => return Err(bag.invalid("$format", "expected \"isbn10\" or \"isbn13\"")),
    })
}

pub(crate) fn check_isbn(value: &Value, format: IsbnFormat) -> Result<(), IssueCode> {
    let Value::String(s) = value else {
        return Err(IssueCode::ExpectedString);
    };
    // Hyphen and space group separators are ignored.
    let compact: String = s.chars().filter(|c| *c != '-' && *c != ' ').collect();
    let ok = match (format, compact.len()) {
        (IsbnFormat::Any | IsbnFormat::Ten, 10) => isbn10(&compact),
        (IsbnFormat::Any | IsbnFormat::Thirteen, 13) => isbn13(&compact),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(IssueCode::InvalidFormat)
    }
}

fn isbn10(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut sum = 0u32;
    for (i, b) in bytes.iter().enumerate() {
        let d = match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'X' | b'x' if i == 9 => 10,
            _ => return false,
        };
        sum += (10 - i as u32) * d;
    }
    sum % 11 == 0
}

fn isbn13(s: &str) -> bool {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = s
        .bytes()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    sum % 10 == 0
}

// ============================================================================
// MAC
// ============================================================================

/// Octet separator of a `mac` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacSeparator {
    Colon,
    Dash,
    None,
}

pub(crate) fn build_mac(bag: &mut Directives<'_>) -> Result<MacSeparator, DefinitionError> {
    Ok(match bag.take_str("$separator")? {
        None | Some(":") => MacSeparator::Colon,
        Some("-") => MacSeparator::Dash,
        Some("") => MacSeparator::None,
        Some(_) => return Err(bag.invalid("$separator", "expected \":\", \"-\" or \"\"")),
    })
}

pub(crate) fn check_mac(value: &Value, separator: MacSeparator) -> Result<(), IssueCode> {
    let Value::String(s) = value else {
        return Err(IssueCode::ExpectedString);
    };
    let ok = match separator {
        MacSeparator::Colon => mac_grouped(s, ':'),
        MacSeparator::Dash => mac_grouped(s, '-'),
        MacSeparator::None => s.len() == 12 && s.bytes().all(|b| b.is_ascii_hexdigit()),
    };
    if ok {
        Ok(())
    } else {
        Err(IssueCode::InvalidFormat)
    }
}

fn mac_grouped(s: &str, separator: char) -> bool {
    let groups: Vec<&str> = s.split(separator).collect();
    groups.len() == 6
        && groups
            .iter()
            .all(|g| g.len() == 2 && g.bytes().all(|b| b.is_ascii_hexdigit()))
}

// ============================================================================
// IP
// ============================================================================

/// Address families an `ip` node admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFormat {
    Any,
    V4,
    V6,
}

/// Family plus the port requirement of an `ip` node.
#[derive(Debug, Clone)]
pub struct IpSpec {
    pub format: IpFormat,
    /// When set, a port is required: `ip:port` for v4, `[ip]:port` for v6.
    pub port: bool,
}

pub(crate) fn build_ip(bag: &mut Directives<'_>) -> Result<IpSpec, DefinitionError> {
    let format = match bag.take_str("$format")? {
        None | Some("any") => IpFormat::Any,
        Some("ipv4") => IpFormat::V4,
        Some("ipv6") => IpFormat::V6,
        Some(_) => return Err(bag.invalid("$format", "expected \"ipv4\", \"ipv6\" or \"any\"")),
    };
    Ok(IpSpec {
        format,
        port: bag.take_bool("$port")?.unwrap_or(false),
    })
}

pub(crate) fn check_ip(value: &Value, spec: &IpSpec) -> Result<(), IssueCode> {
    let Value::String(s) = value else {
        return Err(IssueCode::ExpectedString);
    };
    let ok = match spec.format {
        IpFormat::V4 => ip_v4(s, spec.port),
        IpFormat::V6 => ip_v6(s, spec.port),
        IpFormat::Any => ip_v4(s, spec.port) || ip_v6(s, spec.port),
    };
    if ok {
        Ok(())
    } else {
        Err(IssueCode::InvalidFormat)
    }
}

fn ip_v4(s: &str, port: bool) -> bool {
    if port {
        let Some((host, p)) = s.rsplit_once(':') else {
            return false;
        };
        valid_port(p) && host.parse::<Ipv4Addr>().is_ok()
    } else {
        s.parse::<Ipv4Addr>().is_ok()
    }
}

fn ip_v6(s: &str, port: bool) -> bool {
    if port {
        let Some(rest) = s.strip_prefix('[') else {
            return false;
        };
        let Some((host, p)) = rest.split_once("]:") else {
            return false;
        };
        valid_port(p) && host.parse::<Ipv6Addr>().is_ok()
    } else {
        s.parse::<Ipv6Addr>().is_ok()
    }
}

fn valid_port(p: &str) -> bool {
    !p.is_empty()
        && p.len() <= 5
        && p.bytes().all(|b| b.is_ascii_digit())
        && p.parse::<u32>().is_ok_and(|n| n <= 65_535)
}

// ============================================================================
// UUID
// ============================================================================

/// Version constraint of a `uuid` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UuidVersion {
    Any,
    Exact(u8),
    /// `"N+"`: a minimum version.
    Min(u8),
}

/// Brace policy of a `uuid` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UuidFormat {
    /// Unbraced only (also the default when `$format` is missing or null).
    Rfc,
    /// Braced only.
    Windows,
    /// Braced or unbraced.
    Any,
}

/// Version and brace constraints of a `uuid` node.
#[derive(Debug, Clone)]
pub struct UuidSpec {
    pub version: UuidVersion,
    pub format: UuidFormat,
}

pub(crate) fn build_uuid(bag: &mut Directives<'_>) -> Result<UuidSpec, DefinitionError> {
    let version = match bag.take_str("$version")? {
        None => UuidVersion::Any,
        Some(s) => {
            let (digits, min) = match s.strip_suffix('+') {
                Some(d) => (d, true),
                None => (s, false),
            };
            let n: u8 = digits
                .parse()
                .map_err(|_| bag.invalid("$version", "expected \"1\"..\"5\" or \"N+\""))?;
            if !(1..=5).contains(&n) {
                return Err(bag.invalid("$version", "expected \"1\"..\"5\" or \"N+\""));
            }
            if min {
                UuidVersion::Min(n)
            } else {
                UuidVersion::Exact(n)
            }
        }
    };
    let format = match bag.take_str("$format")? {
        None => UuidFormat::Rfc,
        Some("rfc") => UuidFormat::Rfc,
        Some("windows") => UuidFormat::Windows,
        Some("any") => UuidFormat::Any,
        Some(_) => return Err(bag.invalid("$format", "expected \"rfc\", \"windows\" or \"any\"")),
    };
    Ok(UuidSpec { version, format })
}

pub(crate) fn check_uuid(value: &Value, spec: &UuidSpec) -> Result<(), IssueCode> {
    let Value::String(s) = value else {
        return Err(IssueCode::ExpectedString);
    };
    let braced = s.starts_with('{') && s.ends_with('}') && s.len() > 2;
    let core = if braced { &s[1..s.len() - 1] } else { s.as_str() };
    let braces_ok = match spec.format {
        UuidFormat::Rfc => !braced,
        UuidFormat::Windows => braced,
        UuidFormat::Any => true,
    };
    if !braces_ok || !UUID_CORE.is_match(core) {
        return Err(IssueCode::InvalidFormat);
    }
    let version = core.as_bytes()[14];
    let version = (version as char).to_digit(16).expect("hex checked") as u8;
    let version_ok = match spec.version {
        UuidVersion::Any => true,
        UuidVersion::Exact(n) => version == n,
        UuidVersion::Min(n) => version >= n,
    };
    if version_ok {
        Ok(())
    } else {
        Err(IssueCode::InvalidFormat)
    }
}

// ============================================================================
// TESTS
// ============================================================================
