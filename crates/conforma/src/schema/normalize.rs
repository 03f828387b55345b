//! # Schema Normalizer
//!
//! Interprets a user-authored descriptor tree and produces the canonical
//! [`Node`] form.
//!
//! ## Pipeline
//!
//! ```text
//! descriptor (Value)
//!       │
//!       ▼ resolve_composition      $extend merge, $include field union
//! flat descriptor map
//!       │
//!       ▼ shorthand::parse          "int?[2:4][]" → base + dims
//!       ▼ directive consumption     common set here, type set in types::
//!       ▼ recursion                 object fields, $data, array dims
//! normalized Node tree (+ derived object metadata)
//! ```
//!
//! Every directive must be consumed by exactly one stage; a leftover is an
//! unknown or non-applicable directive and fails normalization.

use serde_json::{Map, Value};

use crate::error::DefinitionError;
use crate::expr::Expr;
use crate::misc::unescape_field_name;
use crate::types::{self, ArraySpec, Directives, Kind};

use super::{
    derive, shorthand, AccessExpr, ForeignKey, GroupTag, Node, Predicate, Predicates,
    UniqueDirective,
};

/// Normalizes a descriptor into a [`Node`] tree.
pub(crate) fn normalize(descriptor: &Value, preds: &Predicates) -> Result<Node, DefinitionError> {
    match descriptor {
        Value::String(type_str) => build_typed(type_str, &Map::new(), preds),
        Value::Object(map) => {
            let resolved = resolve_composition(map)?;
            let type_str = match resolved.get("$type") {
                None => "object".to_string(),
                Some(Value::String(s)) => s.clone(),
                Some(_) => {
                    return Err(DefinitionError::InvalidDirective {
                        directive: "$type".into(),
                        reason: "expected a string".into(),
                    })
                }
            };
            build_typed(&type_str, &resolved, preds)
        }
        _ => Err(DefinitionError::InvalidDescriptor(
            "descriptor must be an object or a type string".into(),
        )),
    }
}

// ============================================================================
// COMPOSITION ($extend / $include)
// ============================================================================

/// Resolves `$extend` and `$include*` into a flat descriptor map.
fn resolve_composition(map: &Map<String, Value>) -> Result<Map<String, Value>, DefinitionError> {
    let mut merged = match map.get("$extend") {
        None => map.clone(),
        Some(Value::Object(base)) => {
            let mut base = resolve_composition(base)?;
            overlay(&mut base, map);
            base
        }
        Some(_) => {
            return Err(DefinitionError::InvalidDirective {
                directive: "$extend".into(),
                reason: "expected a schema descriptor object".into(),
            })
        }
    };

    let include_keys: Vec<String> = merged
        .keys()
        .filter(|k| k.starts_with("$include"))
        .cloned()
        .collect();
    for key in include_keys {
        let value = merged.shift_remove(&key).expect("key listed");
        let sources: Vec<&Value> = match &value {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        for source in sources {
            let Value::Object(source) = source else {
                return Err(DefinitionError::InvalidDirective {
                    directive: key.clone(),
                    reason: "expected schema descriptor objects".into(),
                });
            };
            let source = resolve_composition(source)?;
            for (field, descriptor) in source {
                if field.starts_with('$') {
                    continue;
                }
                if merged.contains_key(&field) {
                    return Err(DefinitionError::DuplicateField(field));
                }
                merged.insert(field, descriptor);
            }
        }
    }

    Ok(merged)
}

/// Applies the extending descriptor on top of the resolved base: `null`
/// removes a field or clears a directive, objects merge recursively,
/// everything else replaces.
fn overlay(base: &mut Map<String, Value>, extending: &Map<String, Value>) {
    for (key, value) in extending {
        if key == "$extend" {
            continue;
        }
        match value {
            Value::Null => {
                base.shift_remove(key);
            }
            Value::Object(next) => match base.get_mut(key) {
                Some(Value::Object(current)) => overlay_value(current, next),
                _ => {
                    base.insert(key.clone(), value.clone());
                }
            },
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn overlay_value(base: &mut Map<String, Value>, next: &Map<String, Value>) {
    for (key, value) in next {
        match value {
            Value::Null => {
                base.shift_remove(key);
            }
            Value::Object(inner) => match base.get_mut(key) {
                Some(Value::Object(current)) => overlay_value(current, inner),
                _ => {
                    base.insert(key.clone(), value.clone());
                }
            },
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

// ============================================================================
// FIELD-ROLE DIRECTIVES
// ============================================================================

/// Common directives that describe the field as a whole; applied to the
/// outermost node when shorthand dimensions are present.
struct FieldRole {
    nullable: bool,
    optional: bool,
    default: Option<Value>,
    group: GroupTag,
    pk: bool,
    fk: Option<ForeignKey>,
    unique: Option<UniqueDirective>,
    read: Option<AccessExpr>,
    write: Option<AccessExpr>,
    append: Option<AccessExpr>,
    delta: Option<bool>,
}

fn take_field_role(bag: &mut Directives<'_>) -> Result<FieldRole, DefinitionError> {
    let group = match bag.take_raw("$g") {
        None => GroupTag::Default,
        Some(Value::Null) => GroupTag::Excluded,
        Some(Value::String(s)) if s.is_empty() => GroupTag::Default,
        Some(Value::String(s)) => GroupTag::Named(s.clone()),
        Some(_) => return Err(bag.invalid("$g", "expected a string or null")),
    };

    let fk = match bag.take_str("$fk")? {
        None => None,
        Some(s) => match s.split_once('.') {
            Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                Some(ForeignKey {
                    table: table.to_string(),
                    column: column.to_string(),
                })
            }
            _ => return Err(bag.invalid("$fk", "expected \"table.column\"")),
        },
    };

    let unique = match bag.take("$unique") {
        None => None,
        Some(Value::Bool(true)) => Some(UniqueDirective::Singleton),
        Some(Value::Bool(false)) => None,
        Some(Value::String(s)) => {
            let groups: Vec<String> = s.split('|').map(str::to_string).collect();
            if groups.iter().any(String::is_empty) {
                return Err(bag.invalid("$unique", "empty group name"));
            }
            Some(UniqueDirective::Groups(groups))
        }
        Some(_) => return Err(bag.invalid("$unique", "expected a bool or group names")),
    };

    let mut access = [None, None, None];
    for (slot, directive) in access.iter_mut().zip(["$r", "$w", "$a"]) {
        if let Some(src) = bag.take_str(directive)? {
            *slot = Some(AccessExpr::parse(src)?);
        }
    }
    let [read, write, append] = access;

    Ok(FieldRole {
        nullable: bag.take_bool("$nullable")?.unwrap_or(false),
        optional: bag.take_bool("$optional")?.unwrap_or(false),
        default: bag.take("$default").cloned(),
        group,
        pk: bag.take_bool("$pk")?.unwrap_or(false),
        fk,
        unique,
        read,
        write,
        append,
        delta: bag.take_bool("$delta")?,
    })
}

// ============================================================================
// TYPED PATH
// ============================================================================

fn build_typed(
    type_str: &str,
    entries: &Map<String, Value>,
    preds: &Predicates,
) -> Result<Node, DefinitionError> {
    let sh = shorthand::parse(type_str)?;
    if !types::is_known_type(&sh.base) {
        return Err(DefinitionError::UnknownType(sh.base));
    }

    let mut bag = Directives::new(
        &sh.base,
        entries
            .iter()
            .filter(|(k, _)| k.as_str() != "$type" && k.starts_with('$'))
            .map(|(k, v)| (k.as_str(), v)),
    );
    let role = take_field_role(&mut bag)?;
    if role.delta.is_some() && sh.base != "object" {
        return Err(bag.invalid("$delta", "only object nodes support it"));
    }

    // Value-level directives attach to the base node.
    let allowed = match bag.take("$allowed") {
        None => None,
        Some(Value::Array(items)) => Some(items.clone()),
        Some(_) => return Err(bag.invalid("$allowed", "expected an array of literals")),
    };
    let exp = match bag.take_str("$exp")? {
        None => None,
        Some(src) => Some(Expr::compile(src)?),
    };
    let func = match bag.take_str("$fn")? {
        None => None,
        Some(name) => match preds.get(name) {
            Some(check) => Some(Predicate {
                name: name.to_string(),
                check: check.clone(),
            }),
            None => return Err(DefinitionError::UnknownPredicate(name.to_string())),
        },
    };

    let mut node = build_base(&sh.base, sh.args.as_deref(), entries, &mut bag, preds)?;
    bag.finish()?;

    node.nullable = sh.base_nullable;
    node.allowed = allowed;
    node.exp = exp;
    node.func = func;
    node.delta = role.delta;

    // Wrap shorthand dimensions outer-to-inner around the base.
    for dim in sh.dims.iter().rev() {
        let mut wrapper = Node::new(
            "array",
            Kind::Array(ArraySpec {
                element: Box::new(node),
                min_len: dim.min,
                max_len: dim.max,
            }),
        );
        wrapper.nullable = dim.nullable;
        node = wrapper;
    }

    node.nullable |= role.nullable;
    node.optional = role.optional;
    node.default = role.default;
    node.group = role.group;
    node.pk = role.pk;
    node.fk = role.fk;
    node.unique = role.unique;
    node.read = role.read;
    node.write = role.write;
    node.append = role.append;

    Ok(node)
}

/// Builds the innermost node for the base type, consuming its directives.
fn build_base(
    base: &str,
    args: Option<&[f64]>,
    entries: &Map<String, Value>,
    bag: &mut Directives<'_>,
    preds: &Predicates,
) -> Result<Node, DefinitionError> {
    let fields: Vec<(&String, &Value)> = entries
        .iter()
        .filter(|(k, _)| !k.starts_with('$'))
        .collect();
    if base != "object" && !fields.is_empty() {
        return Err(DefinitionError::InvalidDescriptor(format!(
            "type {base} does not take child properties (found {:?})",
            fields[0].0
        )));
    }

    let kind = match base {
        "object" => {
            let mut normalized = indexmap::IndexMap::new();
            for (key, descriptor) in fields {
                let name = unescape_field_name(key);
                let child = normalize(descriptor, preds)?;
                normalized.insert(name, child);
            }
            Kind::Object(derive::object_spec(normalized))
        }
        "map" => {
            let data = bag
                .take("$data")
                .ok_or_else(|| bag.invalid("$data", "map requires a value schema"))?;
            Kind::Map(Box::new(normalize(data, preds)?))
        }
        "array" => {
            let data = bag
                .take("$data")
                .ok_or_else(|| bag.invalid("$data", "array requires an element schema"))?;
            let mut min_len = bag.take_index("$minLength")?;
            let mut max_len = bag.take_index("$maxLength")?;
            if let Some(exact) = bag.take_index("$length")? {
                min_len = Some(exact);
                max_len = Some(exact);
            }
            Kind::Array(ArraySpec {
                element: Box::new(normalize(data, preds)?),
                min_len,
                max_len,
            })
        }
        _ => types::build_scalar(base, args, bag)?.expect("containers handled above"),
    };

    Ok(Node::new(base, kind))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Verdict;
    use serde_json::json;

    fn norm(descriptor: Value) -> Result<Node, DefinitionError> {
        normalize(&descriptor, &Predicates::new())
    }

    fn object_fields(node: &Node) -> &indexmap::IndexMap<String, Node> {
        match &node.kind {
            Kind::Object(spec) => &spec.fields,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_implicit_object() {
        let node = norm(json!({"a": {"$type": "bool"}, "b": "int"})).unwrap();
        assert_eq!(node.type_name, "object");
        let fields = object_fields(&node);
        assert_eq!(fields["a"].type_name, "bool");
        assert_eq!(fields["b"].type_name, "int");
    }

    #[test]
    fn test_string_descriptor_is_shorthand() {
        let node = norm(json!({"tags": "string[]"})).unwrap();
        let fields = object_fields(&node);
        let tags = &fields["tags"];
        assert_eq!(tags.type_name, "array");
        match &tags.kind {
            Kind::Array(spec) => assert_eq!(spec.element.type_name, "string"),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_shorthand_dimensions_outer_to_inner() {
        let node = norm(json!({"$type": "int[2][3]"})).unwrap();
        let Kind::Array(outer) = &node.kind else {
            panic!("expected array");
        };
        assert_eq!(outer.min_len, Some(2));
        let Kind::Array(inner) = &outer.element.kind else {
            panic!("expected nested array");
        };
        assert_eq!(inner.min_len, Some(3));
        assert_eq!(inner.element.type_name, "int");
    }

    #[test]
    fn test_shorthand_nullability_levels() {
        let node = norm(json!({"$type": "int?[]"})).unwrap();
        let Kind::Array(spec) = &node.kind else {
            panic!("expected array");
        };
        assert!(!node.nullable);
        assert!(spec.element.nullable);
    }

    #[test]
    fn test_unknown_type_and_directive() {
        assert!(matches!(
            norm(json!({"$type": "int7"})),
            Err(DefinitionError::UnknownType(_))
        ));
        assert!(matches!(
            norm(json!({"$type": "int", "$frobnicate": 1})),
            Err(DefinitionError::UnknownDirective { .. })
        ));
        // Known directive, wrong type.
        assert!(matches!(
            norm(json!({"$type": "bool", "$precision": 3})),
            Err(DefinitionError::UnknownDirective { .. })
        ));
    }

    #[test]
    fn test_extend_merges_and_overrides() {
        let base = json!({"a": {"$type": "int"}, "b": {"$type": "string"}});
        let node = norm(json!({
            "$extend": base,
            "b": {"$type": "bool"},
            "c": {"$type": "int"}
        }))
        .unwrap();
        let fields = object_fields(&node);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["a"].type_name, "int");
        assert_eq!(fields["b"].type_name, "bool");
        assert_eq!(fields["c"].type_name, "int");
    }

    #[test]
    fn test_extend_null_removes_field() {
        let base = json!({"a": {"$type": "int"}, "b": {"$type": "string"}});
        let node = norm(json!({"$extend": base, "b": null})).unwrap();
        let fields = object_fields(&node);
        assert_eq!(fields.len(), 1);
        assert!(!fields.contains_key("b"));
        // Removing a field that does not exist is a no-op.
        let node = norm(json!({"$extend": {"a": {"$type": "int"}}, "zz": null})).unwrap();
        assert_eq!(object_fields(&node).len(), 1);
    }

    #[test]
    fn test_extend_null_clears_directive() {
        let base = json!({"a": {"$type": "int", "$min": 5}});
        let node = norm(json!({"$extend": base, "a": {"$min": null, "$type": "int"}})).unwrap();
        let fields = object_fields(&node);
        let Kind::Int(spec) = &fields["a"].kind else {
            panic!("expected int");
        };
        assert_eq!(spec.lo, None);
    }

    #[test]
    fn test_include_disjoint_union() {
        let timestamps = json!({"created": {"$type": "datetime"}});
        let owner = json!({"owner": {"$type": "string"}});
        let node = norm(json!({
            "name": {"$type": "string"},
            "$include": [timestamps, owner]
        }))
        .unwrap();
        let fields = object_fields(&node);
        assert_eq!(fields.len(), 3);
        assert!(fields.contains_key("created"));
        assert!(fields.contains_key("owner"));
    }

    #[test]
    fn test_include_duplicate_is_error() {
        let mixin = json!({"name": {"$type": "string"}});
        let direct = norm(json!({
            "name": {"$type": "string"},
            "$include": mixin
        }));
        assert!(matches!(direct, Err(DefinitionError::DuplicateField(_))));

        let mixin_a = json!({"x": {"$type": "int"}});
        let mixin_b = json!({"x": {"$type": "string"}});
        let between = norm(json!({
            "$includeA": mixin_a,
            "$includeB": mixin_b
        }));
        assert!(matches!(between, Err(DefinitionError::DuplicateField(_))));
    }

    #[test]
    fn test_escaped_field_names() {
        let node = norm(json!({"\\$meta": {"$type": "string"}})).unwrap();
        let fields = object_fields(&node);
        assert!(fields.contains_key("$meta"));
    }

    #[test]
    fn test_map_requires_data() {
        let node = norm(json!({"$type": "map", "$data": {"$type": "int"}})).unwrap();
        match &node.kind {
            Kind::Map(value) => assert_eq!(value.type_name, "int"),
            other => panic!("expected map, got {other:?}"),
        }
        assert!(norm(json!({"$type": "map"})).is_err());
    }

    #[test]
    fn test_explicit_array_with_length() {
        let node = norm(json!({
            "$type": "array",
            "$data": "int",
            "$minLength": 1,
            "$maxLength": 5
        }))
        .unwrap();
        let Kind::Array(spec) = &node.kind else {
            panic!("expected array");
        };
        assert_eq!(spec.min_len, Some(1));
        assert_eq!(spec.max_len, Some(5));
    }

    #[test]
    fn test_fn_resolves_predicate() {
        let mut preds = Predicates::new();
        preds.insert("isEven", |v: &Value| {
            match v.as_i64() {
                Some(i) if i % 2 == 0 => Verdict::Pass,
                _ => Verdict::Fail,
            }
        });
        let node = normalize(&json!({"$type": "int", "$fn": "isEven"}), &preds).unwrap();
        assert_eq!(node.func.as_ref().unwrap().name, "isEven");

        let missing = normalize(&json!({"$type": "int", "$fn": "nope"}), &preds);
        assert!(matches!(missing, Err(DefinitionError::UnknownPredicate(_))));
    }

    #[test]
    fn test_scalar_rejects_child_properties() {
        assert!(norm(json!({"$type": "int", "oops": {"$type": "bool"}})).is_err());
    }

    #[test]
    fn test_delta_only_on_objects() {
        assert!(norm(json!({"$delta": false, "a": "int"})).is_ok());
        assert!(norm(json!({"$type": "int", "$delta": false})).is_err());
    }
}
