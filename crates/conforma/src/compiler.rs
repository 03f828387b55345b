//! # Validator Compiler
//!
//! Emits one specialized validation routine per (schema fingerprint,
//! options, access fingerprint) triple and memoizes it process-wide.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                    COMPILATION PIPELINE                                     │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                                                                             │
//! │   Schema + Options + Roles              Program                             │
//! │   ┌──────────────────────┐              ┌───────────────────────┐           │
//! │   │ normalized Node tree │ ──compile──► │ schema Arc + Plan tree│           │
//! │   │ $w: "admin|inherit"  │              │   writable: bool      │           │
//! │   │ $delta: false        │              │   delta:    bool      │           │
//! │   │ EXTRACT_NESTED       │              │   extract:  bool      │           │
//! │   └──────────────────────┘              └───────────────────────┘           │
//! │                                                                             │
//! │   Every option- and access-dependent decision is resolved at compile        │
//! │   time; the validator interprets the plan in a single pass.                 │
//! │                                                                             │
//! │   CACHE: fingerprint-keyed memo table. Redundant concurrent compiles        │
//! │   are benign — entries for one key are semantically identical and           │
//! │   the last write wins.                                                      │
//! │                                                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::ops::{BitOr, BitOrAssign};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::SchemaError;
use crate::schema::{Node, Schema};
use crate::types::Kind;
use crate::validator;

pub use crate::schema::access::Roles;

// ============================================================================
// OPTIONS
// ============================================================================

/// Bit-combinable processing options.
///
/// ```rust,ignore
/// let output = process(&input, &schema, Options::EXTRACT_ALL | Options::DELTA_MODE, None)?;
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Options(u32);

impl Options {
    /// No options.
    pub const NONE: Options = Options(0);
    /// Silently drop unknown fields at the root object.
    pub const EXTRACT_TOP: Options = Options(1);
    /// Silently drop unknown fields inside nested objects.
    pub const EXTRACT_NESTED: Options = Options(1 << 1);
    /// Both extraction modes.
    pub const EXTRACT_ALL: Options = Options(1 | 1 << 1);
    /// Admit missing fields at every level (partial updates), except
    /// where a node sets `$delta: false`.
    pub const DELTA_MODE: Options = Options(1 << 2);
    /// Collect every issue instead of failing on the first.
    pub const ACCUMULATE_ERRORS: Options = Options(1 << 3);

    /// Returns true if every flag of `other` is set.
    pub fn contains(self, other: Options) -> bool {
        self.0 & other.0 == other.0
    }

    /// The raw flag bits.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Options {
    type Output = Options;

    fn bitor(self, rhs: Options) -> Options {
        Options(self.0 | rhs.0)
    }
}

impl BitOrAssign for Options {
    fn bitor_assign(&mut self, rhs: Options) {
        self.0 |= rhs.0;
    }
}

/// Compilation mode of [`precompile`](crate::precompile).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The validating/normalizing routine behind
    /// [`process`](crate::process).
    Process,
}

// ============================================================================
// PROGRAM
// ============================================================================

/// Per-node decisions resolved at compile time.
#[derive(Debug)]
pub(crate) struct Plan {
    /// Whether the caller's roles satisfy this node's `$w` (with
    /// `inherit` substituted); always true when access is disabled.
    pub writable: bool,
    /// Whether missing fields of this object node are admitted.
    pub delta: bool,
    /// Whether unknown keys of this object node are dropped silently.
    pub extract: bool,
    pub children: IndexMap<String, Plan>,
    pub element: Option<Box<Plan>>,
}

/// A compiled validation routine: the schema plus its resolved plan.
///
/// Programs are immutable and shared via the process-wide cache; running
/// one never mutates the input.
#[derive(Debug)]
pub struct Program {
    schema: Schema,
    plan: Plan,
    options: Options,
    access_enabled: bool,
}

impl Program {
    /// The options this routine was specialized for.
    pub fn options(&self) -> Options {
        self.options
    }

    /// The schema this routine validates against.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn plan(&self) -> &Plan {
        &self.plan
    }

    pub(crate) fn access_enabled(&self) -> bool {
        self.access_enabled
    }

    /// Runs the routine: validates `input` and returns the fresh,
    /// normalized output.
    pub fn run(&self, input: &Value) -> Result<Value, SchemaError> {
        validator::run(self, input)
    }
}

// ============================================================================
// CACHE
// ============================================================================

type CacheKey = (String, u32, Option<String>);

static PROGRAMS: Lazy<Mutex<HashMap<CacheKey, Arc<Program>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn access_fingerprint(access: Option<&Roles>) -> Option<String> {
    access.map(|roles| {
        roles
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    })
}

/// Fetches or compiles the routine for the given triple.
pub(crate) fn fetch(schema: &Schema, options: Options, access: Option<&Roles>) -> Arc<Program> {
    let key: CacheKey = (
        schema.fingerprint().to_string(),
        options.bits(),
        access_fingerprint(access),
    );
    if let Some(program) = PROGRAMS.lock().expect("cache lock").get(&key) {
        tracing::trace!(options = options.bits(), "validator cache hit");
        return Arc::clone(program);
    }

    tracing::debug!(options = options.bits(), "compiling validator");
    let program = Arc::new(compile(schema, options, access));
    PROGRAMS
        .lock()
        .expect("cache lock")
        .insert(key, Arc::clone(&program));
    program
}

fn compile(schema: &Schema, options: Options, access: Option<&Roles>) -> Program {
    let plan = build_plan(schema.root(), options, access, true, true, true);
    Program {
        schema: schema.clone(),
        plan,
        options,
        access_enabled: access.is_some(),
    }
}

/// Resolves a node's plan.
///
/// `inherited_ok` is the verdict of the nearest ancestor `$w` (root falls
/// back to `*`); `delta_state` is the `$delta` override chain.
fn build_plan(
    node: &Node,
    options: Options,
    access: Option<&Roles>,
    is_root: bool,
    inherited_ok: bool,
    delta_state: bool,
) -> Plan {
    let (writable, next_inherited) = match (&node.write, access) {
        (Some(expr), Some(roles)) => {
            let ok = expr.satisfied(roles, inherited_ok);
            (ok, ok)
        }
        _ => (true, inherited_ok),
    };

    let delta_state = node.delta.unwrap_or(delta_state);
    let delta = options.contains(Options::DELTA_MODE) && delta_state;
    let extract = if is_root {
        options.contains(Options::EXTRACT_TOP)
    } else {
        options.contains(Options::EXTRACT_NESTED)
    };

    let mut children = IndexMap::new();
    let mut element = None;
    match &node.kind {
        Kind::Object(spec) => {
            for (name, child) in &spec.fields {
                children.insert(
                    name.clone(),
                    build_plan(child, options, access, false, next_inherited, delta_state),
                );
            }
        }
        Kind::Map(value) => {
            element = Some(Box::new(build_plan(
                value,
                options,
                access,
                false,
                next_inherited,
                delta_state,
            )));
        }
        Kind::Array(spec) => {
            element = Some(Box::new(build_plan(
                &spec.element,
                options,
                access,
                false,
                next_inherited,
                delta_state,
            )));
        }
        _ => {}
    }

    Plan {
        writable,
        delta,
        extract,
        children,
        element,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize::normalize, Predicates};
    use serde_json::json;

    fn schema_of(descriptor: Value) -> Schema {
        let root = normalize(&descriptor, &Predicates::new()).unwrap();
        Schema::from_root(root)
    }

    fn roles(names: &[&str]) -> Roles {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_options_combine() {
        let options = Options::EXTRACT_TOP | Options::DELTA_MODE;
        assert!(options.contains(Options::EXTRACT_TOP));
        assert!(options.contains(Options::DELTA_MODE));
        assert!(!options.contains(Options::ACCUMULATE_ERRORS));
        assert_eq!(
            Options::EXTRACT_ALL,
            Options::EXTRACT_TOP | Options::EXTRACT_NESTED
        );
        assert_eq!(Options::NONE.bits(), 0);
    }

    #[test]
    fn test_cache_reuses_programs() {
        let a = schema_of(json!({"n": "int"}));
        let b = schema_of(json!({"n": "int"}));
        let first = fetch(&a, Options::NONE, None);
        let second = fetch(&b, Options::NONE, None);
        assert!(Arc::ptr_eq(&first, &second));
        // A different option set compiles a distinct routine.
        let third = fetch(&a, Options::DELTA_MODE, None);
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_cache_keyed_by_access() {
        let schema = schema_of(json!({"n": {"$type": "int", "$w": "admin"}}));
        let admin = fetch(&schema, Options::NONE, Some(&roles(&["admin"])));
        let user = fetch(&schema, Options::NONE, Some(&roles(&["user"])));
        let open = fetch(&schema, Options::NONE, None);
        assert!(!Arc::ptr_eq(&admin, &user));
        assert!(!Arc::ptr_eq(&admin, &open));
        assert!(admin.plan().children["n"].writable);
        assert!(!user.plan().children["n"].writable);
        assert!(open.plan().children["n"].writable);
    }

    #[test]
    fn test_inherit_resolves_to_ancestor() {
        let schema = schema_of(json!({
            "$w": "user|admin",
            "profile": {
                "bio": {"$type": "string", "$w": "admin|inherit"}
            }
        }));
        let program = fetch(&schema, Options::NONE, Some(&roles(&["user"])));
        let profile = &program.plan().children["profile"];
        assert!(profile.children["bio"].writable);

        let guest = fetch(&schema, Options::NONE, Some(&roles(&["guest"])));
        assert!(!guest.plan().children["profile"].children["bio"].writable);
    }

    #[test]
    fn test_delta_override_chain() {
        let schema = schema_of(json!({
            "a": "int",
            "strict": {
                "$delta": false,
                "b": "int",
                "inner": {"c": "int"}
            }
        }));
        let program = fetch(&schema, Options::DELTA_MODE, None);
        assert!(program.plan().delta);
        let strict = &program.plan().children["strict"];
        assert!(!strict.delta);
        // The override propagates to descendants.
        assert!(!strict.children["inner"].delta);
        // Without the option, delta is off everywhere.
        let plain = fetch(&schema, Options::NONE, None);
        assert!(!plain.plan().delta);
    }

    #[test]
    fn test_extract_root_vs_nested() {
        let schema = schema_of(json!({"nested": {"x": "int"}}));
        let program = fetch(&schema, Options::EXTRACT_TOP, None);
        assert!(program.plan().extract);
        assert!(!program.plan().children["nested"].extract);

        let program = fetch(&schema, Options::EXTRACT_NESTED, None);
        assert!(!program.plan().extract);
        assert!(program.plan().children["nested"].extract);
    }
}
