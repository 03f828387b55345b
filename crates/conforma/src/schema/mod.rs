//! # Normalized Schema Model
//!
//! The sealed, immutable form produced by the normalizer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    NORMALIZED SCHEMA                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   descriptor (Value)            normalized (Node tree)         │
//! │   ┌──────────────────┐          ┌──────────────────┐           │
//! │   │ { "$type": ...,  │  norm.   │ Node             │           │
//! │   │   "name": {...}, │ ──────►  │   .kind: Kind    │           │
//! │   │   "tags": "int[]"│          │   .nullable ...  │           │
//! │   │ }                │          │   Object(fields: │           │
//! │   └──────────────────┘          │     IndexMap)    │           │
//! │                                 └──────────────────┘           │
//! │                                                                 │
//! │   Field order in IndexMap = declaration order = issue order     │
//! │   Fingerprint = canonical rendering, the validator cache key    │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod access;
pub(crate) mod derive;
pub(crate) mod normalize;
pub mod shorthand;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ConformaResult, IssueCode};
use crate::expr::Expr;
use crate::types::Kind;

pub use access::{AccessExpr, AccessOp, AccessTerm};

// ============================================================================
// NODE
// ============================================================================

/// Group membership of a field, from `$g`.
///
/// Missing, empty and cleared values normalize to the default group; an
/// explicit `null` excludes the field from `$groupMap` entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupTag {
    Default,
    Named(String),
    Excluded,
}

impl GroupTag {
    /// The group name this tag contributes to, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Default => Some("@default"),
            Self::Named(name) => Some(name),
            Self::Excluded => None,
        }
    }
}

/// Parsed `$fk` reference of the form `table.column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Parsed `$unique` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniqueDirective {
    /// `$unique: true` — the field forms a singleton group.
    Singleton,
    /// `$unique: "g1|g2"` — the field participates in named groups.
    Groups(Vec<String>),
}

/// Outcome of a `$fn` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Fails with the default `InvalidValue` code.
    Fail,
    /// Fails with a caller-supplied code from the closed vocabulary.
    Code(IssueCode),
}

/// External predicate callable from a `$fn` directive.
pub type PredicateFn = Arc<dyn Fn(&Value) -> Verdict + Send + Sync>;

/// Named predicates supplied to
/// [`schema_with`](crate::schema_with); `$fn: "name"` resolves against
/// this table at normalization.
#[derive(Default, Clone)]
pub struct Predicates {
    map: HashMap<String, PredicateFn>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a predicate under `name`.
    pub fn insert<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Value) -> Verdict + Send + Sync + 'static,
    {
        self.map.insert(name.into(), Arc::new(predicate));
    }

    pub(crate) fn get(&self, name: &str) -> Option<&PredicateFn> {
        self.map.get(name)
    }
}

impl fmt::Debug for Predicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicates")
            .field("names", &self.map.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A resolved `$fn` reference: the name (part of the fingerprint) plus the
/// callable.
#[derive(Clone)]
pub struct Predicate {
    pub name: String,
    pub check: PredicateFn,
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

/// One normalized schema node.
///
/// `kind` carries the resolved type and its type-specific constraints;
/// the remaining fields are the type-agnostic common directives.
#[derive(Debug, Clone)]
pub struct Node {
    /// Resolved registry name, e.g. `"int8"` or `"object"`.
    pub type_name: String,
    pub kind: Kind,
    pub nullable: bool,
    pub optional: bool,
    pub default: Option<Value>,
    pub allowed: Option<Vec<Value>>,
    pub exp: Option<Expr>,
    pub func: Option<Predicate>,
    pub group: GroupTag,
    pub pk: bool,
    pub fk: Option<ForeignKey>,
    pub unique: Option<UniqueDirective>,
    pub read: Option<AccessExpr>,
    pub write: Option<AccessExpr>,
    pub append: Option<AccessExpr>,
    /// `$delta` override; only meaningful on object nodes.
    pub delta: Option<bool>,
}

impl Node {
    /// A node with the given kind and no common directives set.
    pub(crate) fn new(type_name: impl Into<String>, kind: Kind) -> Self {
        Self {
            type_name: type_name.into(),
            kind,
            nullable: false,
            optional: false,
            default: None,
            allowed: None,
            exp: None,
            func: None,
            group: GroupTag::Default,
            pk: false,
            fk: None,
            unique: None,
            read: None,
            write: None,
            append: None,
            delta: None,
        }
    }
}

// ============================================================================
// OBJECT METADATA
// ============================================================================

/// Fields plus the derived metadata of an object node.
#[derive(Debug, Clone)]
pub struct ObjectSpec {
    /// Declared fields in declaration order.
    pub fields: IndexMap<String, Node>,
    /// Group name → member field names (`$groupMap`).
    pub group_map: IndexMap<String, Vec<String>>,
    /// Primary-key field names in declaration order (`$pkArray`).
    pub pk_array: Vec<String>,
    /// Field name → foreign-key reference (`$fkMap`).
    pub fk_map: IndexMap<String, ForeignKey>,
    /// Union of PK and FK field names (`$idArray`).
    pub id_array: Vec<String>,
    /// Unique groups as sorted, deduplicated field-name tuples
    /// (`$uniqueArray`).
    pub unique_array: Vec<Vec<String>>,
}

impl ObjectSpec {
    /// `$pkMap` view: membership test over `pk_array`.
    pub fn is_pk(&self, field: &str) -> bool {
        self.pk_array.iter().any(|f| f == field)
    }

    /// `$idMap` view: membership test over `id_array`.
    pub fn is_id(&self, field: &str) -> bool {
        self.id_array.iter().any(|f| f == field)
    }

    /// `$fkArray` view: FK field names in declaration order.
    pub fn fk_array(&self) -> Vec<&str> {
        self.fk_map.keys().map(String::as_str).collect()
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// An immutable normalized schema, cheap to clone and share.
#[derive(Debug, Clone)]
pub struct Schema {
    root: Arc<Node>,
    fingerprint: Arc<str>,
}

impl Schema {
    pub(crate) fn from_root(root: Node) -> Self {
        let mut canon = String::new();
        write_canon(&root, &mut canon);
        Self {
            root: Arc::new(root),
            fingerprint: canon.into(),
        }
    }

    /// The root node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Canonical, equality-comparable digest of the schema; the validator
    /// cache key component.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Loads a schema descriptor from a JSON file and normalizes it.
    pub fn from_file(path: &Path) -> ConformaResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let descriptor: Value = serde_json::from_str(&content)?;
        let root = normalize::normalize(&descriptor, &Predicates::new())?;
        Ok(Self::from_root(root))
    }
}

// ============================================================================
// CANONICAL RENDERING (fingerprint)
// ============================================================================

/// Serializes a JSON value deterministically: object keys sorted.
fn canon_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).expect("string serializes"));
                out.push(':');
                canon_value(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canon_value(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&serde_json::to_string(other).expect("scalar serializes")),
    }
}

fn write_canon(node: &Node, out: &mut String) {
    use std::fmt::Write;

    out.push('(');
    out.push_str(&node.type_name);
    if node.nullable {
        out.push('?');
    }
    if node.optional {
        out.push_str(",opt");
    }
    if let Some(default) = &node.default {
        out.push_str(",default=");
        canon_value(default, out);
    }
    if let Some(allowed) = &node.allowed {
        out.push_str(",allowed=");
        canon_value(&Value::Array(allowed.clone()), out);
    }
    if let Some(exp) = &node.exp {
        let _ = write!(out, ",exp={:?}", exp.source());
    }
    if let Some(func) = &node.func {
        let _ = write!(out, ",fn={:?}", func.name);
    }
    if let Some(name) = node.group.name() {
        if name != "@default" {
            let _ = write!(out, ",g={name:?}");
        }
    } else {
        out.push_str(",g=null");
    }
    if node.pk {
        out.push_str(",pk");
    }
    if let Some(fk) = &node.fk {
        let _ = write!(out, ",fk={fk}");
    }
    match &node.unique {
        Some(UniqueDirective::Singleton) => out.push_str(",unique"),
        Some(UniqueDirective::Groups(groups)) => {
            let _ = write!(out, ",unique={}", groups.join("|"));
        }
        None => {}
    }
    for (label, expr) in [("r", &node.read), ("w", &node.write), ("a", &node.append)] {
        if let Some(expr) = expr {
            let _ = write!(out, ",{label}={expr}");
        }
    }
    if let Some(delta) = node.delta {
        let _ = write!(out, ",delta={delta}");
    }
    write_kind_canon(&node.kind, out);
    out.push(')');
}

fn write_kind_canon(kind: &Kind, out: &mut String) {
    use std::fmt::Write;

    match kind {
        Kind::Any | Kind::Bool | Kind::CreditCard => {}
        Kind::Int(spec) => {
            let _ = write!(out, ",int[{:?},{:?}]", spec.lo, spec.hi);
        }
        Kind::Float(spec) => {
            let _ = write!(
                out,
                ",float[{:?},{:?},{:?},{:?}]",
                spec.min, spec.max, spec.min_exclusive, spec.max_exclusive
            );
        }
        Kind::Numeric(spec) => {
            let _ = write!(out, ",numeric[{},{}]", spec.precision, spec.scale);
        }
        Kind::BigInt(spec) => {
            let _ = write!(
                out,
                ",bigint[{:?},{:?},{:?},{:?}]",
                spec.min, spec.max, spec.min_exclusive, spec.max_exclusive
            );
        }
        Kind::Char(spec) => {
            let _ = write!(out, ",char[{:?},{}]", spec.allowed, spec.empty);
        }
        Kind::Text(spec) => {
            let _ = write!(
                out,
                ",text[{:?},{:?},{:?},{:?},{}]",
                spec.class,
                spec.min_len,
                spec.max_len,
                spec.pattern.as_ref().map(|p| &p.source),
                spec.empty
            );
        }
        Kind::Color(spec) => {
            let _ = write!(out, ",color[{},{:?}]", spec.css_names, spec.extra_names);
        }
        Kind::Isbn(format) => {
            let _ = write!(out, ",isbn[{format:?}]");
        }
        Kind::Mac(separator) => {
            let _ = write!(out, ",mac[{separator:?}]");
        }
        Kind::Ip(spec) => {
            let _ = write!(out, ",ip[{:?},{}]", spec.format, spec.port);
        }
        Kind::Uuid(spec) => {
            let _ = write!(out, ",uuid[{:?},{:?}]", spec.version, spec.format);
        }
        Kind::DateTime(spec) => {
            let _ = write!(
                out,
                ",dt[{:?},{},{}]",
                spec.source, spec.leap_year, spec.leap_second
            );
        }
        Kind::Object(spec) => {
            out.push_str(",fields={");
            for (i, (name, child)) in spec.fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{name:?}:");
                write_canon(child, out);
            }
            out.push('}');
        }
        Kind::Map(value) => {
            out.push_str(",value=");
            write_canon(value, out);
        }
        Kind::Array(spec) => {
            let _ = write!(out, ",len[{:?},{:?}],element=", spec.min_len, spec.max_len);
            write_canon(&spec.element, out);
        }
    }
}

// ============================================================================
// DEBUG RENDERER
// ============================================================================

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(&self.root, f, 0)
    }
}

fn render(node: &Node, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    let pad = "  ".repeat(indent);
    let suffix = if node.nullable { "?" } else { "" };
    match &node.kind {
        Kind::Object(spec) => {
            writeln!(f, "object{suffix} {{")?;
            for (name, child) in &spec.fields {
                write!(f, "{pad}  {}: ", crate::misc::escape_field_name(name))?;
                render(child, f, indent + 1)?;
            }
            if !spec.pk_array.is_empty() {
                writeln!(f, "{pad}  # pk: {}", spec.pk_array.join(", "))?;
            }
            for tuple in &spec.unique_array {
                writeln!(f, "{pad}  # unique: ({})", tuple.join(", "))?;
            }
            writeln!(f, "{pad}}}")
        }
        Kind::Array(spec) => {
            let bounds = match (spec.min_len, spec.max_len) {
                (None, None) => String::new(),
                (min, max) => format!(
                    "[{}:{}]",
                    min.map_or(String::new(), |m| m.to_string()),
                    max.map_or(String::new(), |m| m.to_string())
                ),
            };
            write!(f, "array{bounds}{suffix} of ")?;
            render(&spec.element, f, indent)
        }
        Kind::Map(value) => {
            write!(f, "map{suffix} of ")?;
            render(value, f, indent)
        }
        _ => {
            write!(f, "{}{suffix}", node.type_name)?;
            if node.optional {
                write!(f, " (optional)")?;
            }
            if let Some(default) = &node.default {
                write!(f, " = {default}")?;
            }
            writeln!(f)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
