//! # Access Expressions
//!
//! Parses and evaluates the `$r`/`$w`/`$a` directives.
//!
//! ```text
//! Grammar:   token ('|' token)*   or   token ('&' token)*
//! Tokens:    role identifiers, '*' (any), 'none', 'inherit'
//!
//! "user|admin"       → write for user OR admin
//! "audit&admin"      → write for callers holding BOTH roles
//! "admin|inherit"    → admin, or whatever the nearest ancestor grants
//! ```
//!
//! Mixing `|` and `&` in one expression and parenthesisation are schema
//! errors; the grammar is deliberately flat.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::DefinitionError;
use crate::misc::is_variable_name;

/// The role set a caller holds. `None` at the API boundary disables
/// access checks entirely.
pub type Roles = BTreeSet<String>;

/// Combinator of an access expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOp {
    /// `|` — union: any satisfied term suffices.
    Or,
    /// `&` — intersection: every term must be satisfied.
    And,
}

/// One token of an access expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTerm {
    Role(String),
    /// `*` — always satisfied.
    Any,
    /// `none` — never satisfied.
    None,
    /// `inherit` — the nearest ancestor's expression, falling back to `*`.
    Inherit,
}

/// A parsed access expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessExpr {
    pub op: AccessOp,
    pub terms: Vec<AccessTerm>,
}

impl AccessExpr {
    /// Parses an access expression against the flat grammar.
    pub fn parse(src: &str) -> Result<Self, DefinitionError> {
        let err = |reason: &str| DefinitionError::InvalidAccess {
            expression: src.to_string(),
            reason: reason.to_string(),
        };
        let has_or = src.contains('|');
        let has_and = src.contains('&');
        if has_or && has_and {
            return Err(err("cannot mix '|' and '&'"));
        }
        let (op, separator) = if has_and {
            (AccessOp::And, '&')
        } else {
            (AccessOp::Or, '|')
        };
        let mut terms = Vec::new();
        for raw in src.split(separator) {
            let token = raw.trim();
            let term = match token {
                "" => return Err(err("empty token")),
                "*" => AccessTerm::Any,
                "none" => AccessTerm::None,
                "inherit" => AccessTerm::Inherit,
                _ => {
                    if !is_variable_name(token) {
                        return Err(err("token is not an identifier"));
                    }
                    AccessTerm::Role(token.to_string())
                }
            };
            terms.push(term);
        }
        Ok(Self { op, terms })
    }

    /// Evaluates the expression against a role set.
    ///
    /// `inherited` is the already-evaluated verdict of the nearest
    /// ancestor's `$w` expression; the root inherits `*` (true).
    pub fn satisfied(&self, roles: &Roles, inherited: bool) -> bool {
        let term_ok = |term: &AccessTerm| match term {
            AccessTerm::Any => true,
            AccessTerm::None => false,
            AccessTerm::Inherit => inherited,
            AccessTerm::Role(role) => roles.contains(role),
        };
        match self.op {
            AccessOp::Or => self.terms.iter().any(term_ok),
            AccessOp::And => self.terms.iter().all(term_ok),
        }
    }
}

impl fmt::Display for AccessExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = match self.op {
            AccessOp::Or => "|",
            AccessOp::And => "&",
        };
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(separator)?;
            }
            match term {
                AccessTerm::Role(role) => f.write_str(role)?,
                AccessTerm::Any => f.write_str("*")?,
                AccessTerm::None => f.write_str("none")?,
                AccessTerm::Inherit => f.write_str("inherit")?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> Roles {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_parse_single_token() {
        let expr = AccessExpr::parse("admin").unwrap();
        assert_eq!(expr.op, AccessOp::Or);
        assert_eq!(expr.terms, vec![AccessTerm::Role("admin".into())]);
    }

    #[test]
    fn test_parse_union_and_intersection() {
        let union = AccessExpr::parse("user|admin").unwrap();
        assert_eq!(union.op, AccessOp::Or);
        assert_eq!(union.terms.len(), 2);

        let inter = AccessExpr::parse("audit&admin").unwrap();
        assert_eq!(inter.op, AccessOp::And);
    }

    #[test]
    fn test_parse_rejects_mixed_and_malformed() {
        assert!(AccessExpr::parse("a|b&c").is_err());
        assert!(AccessExpr::parse("").is_err());
        assert!(AccessExpr::parse("a||b").is_err());
        assert!(AccessExpr::parse("(a|b)").is_err());
        assert!(AccessExpr::parse("a b").is_err());
    }

    #[test]
    fn test_satisfied_union() {
        let expr = AccessExpr::parse("user|admin").unwrap();
        assert!(expr.satisfied(&roles(&["user"]), false));
        assert!(expr.satisfied(&roles(&["admin", "other"]), false));
        assert!(!expr.satisfied(&roles(&["guest"]), false));
    }

    #[test]
    fn test_satisfied_intersection() {
        let expr = AccessExpr::parse("audit&admin").unwrap();
        assert!(expr.satisfied(&roles(&["audit", "admin"]), false));
        assert!(!expr.satisfied(&roles(&["admin"]), false));
    }

    #[test]
    fn test_any_and_none() {
        assert!(AccessExpr::parse("*").unwrap().satisfied(&roles(&[]), false));
        assert!(!AccessExpr::parse("none")
            .unwrap()
            .satisfied(&roles(&["admin"]), false));
    }

    #[test]
    fn test_inherit_uses_ancestor_verdict() {
        let expr = AccessExpr::parse("admin|inherit").unwrap();
        assert!(expr.satisfied(&roles(&["user"]), true));
        assert!(!expr.satisfied(&roles(&["user"]), false));
        assert!(expr.satisfied(&roles(&["admin"]), false));
    }

    #[test]
    fn test_display_roundtrip() {
        for src in ["admin", "user|admin", "audit&admin", "*|inherit", "none"] {
            let expr = AccessExpr::parse(src).unwrap();
            assert_eq!(expr.to_string(), src);
        }
    }
}
