//! # Validator
//!
//! Interprets a compiled [`Program`] over an input value in one
//! depth-first pass.
//!
//! ## Field admission order
//!
//! ```text
//! writability → existence → nullability → type → constraints → recursion
//!                                                  │
//!                       $allowed → range/length/pattern → $exp → $fn
//! ```
//!
//! The input is never mutated; the output is a freshly built mirror with
//! `$default` values deep-cloned per invocation. In fail-fast mode the
//! first issue halts the walk; with `ACCUMULATE_ERRORS` the walk continues
//! and every issue is collected in declaration order.

use serde_json::{Map, Value};

use crate::compiler::{Options, Plan, Program};
use crate::error::{Issue, IssueCode, SchemaError};
use crate::misc::{clone_deep, equals, escape_field_name};
use crate::schema::{Node, Verdict};
use crate::types::{datetime, format, scalar, text, Kind};

/// Sentinel for the fail-fast unwind; the collected issues live in the
/// context.
struct Halt;

enum Segment<'a> {
    Field(&'a str),
    Index(usize),
}

struct Ctx<'a> {
    issues: Vec<Issue>,
    accumulate: bool,
    access_enabled: bool,
    path: Vec<Segment<'a>>,
}

impl<'a> Ctx<'a> {
    fn issue(&mut self, code: IssueCode) -> Result<(), Halt> {
        self.issues.push(Issue::new(code, self.render_path()));
        if self.accumulate {
            Ok(())
        } else {
            Err(Halt)
        }
    }

    fn render_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                Segment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(&escape_field_name(name));
                }
                Segment::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

/// Runs a compiled program over an input value.
pub(crate) fn run<'a>(program: &'a Program, input: &'a Value) -> Result<Value, SchemaError> {
    let mut ctx = Ctx {
        issues: Vec::new(),
        accumulate: program.options().contains(Options::ACCUMULATE_ERRORS),
        access_enabled: program.access_enabled(),
        path: Vec::new(),
    };
    let output = match check_node(&mut ctx, program.schema().root(), program.plan(), input) {
        Ok(output) => output,
        Err(Halt) => return Err(SchemaError::new(ctx.issues)),
    };
    if ctx.issues.is_empty() {
        Ok(output.unwrap_or(Value::Null))
    } else {
        Err(SchemaError::new(ctx.issues))
    }
}

/// The `Expected*` code a node reports for a wrong-shaped value.
fn expected_code(kind: &Kind) -> IssueCode {
    match kind {
        Kind::Any => IssueCode::InvalidValue,
        Kind::Bool => IssueCode::ExpectedBoolean,
        Kind::Int(_) | Kind::Float(_) | Kind::Numeric(_) => IssueCode::ExpectedNumber,
        Kind::BigInt(_)
        | Kind::Char(_)
        | Kind::Text(_)
        | Kind::Color(_)
        | Kind::CreditCard
        | Kind::Isbn(_)
        | Kind::Mac(_)
        | Kind::Ip(_)
        | Kind::Uuid(_)
        | Kind::DateTime(_) => IssueCode::ExpectedString,
        Kind::Object(_) | Kind::Map(_) => IssueCode::ExpectedObject,
        Kind::Array(_) => IssueCode::ExpectedArray,
    }
}

/// Validates one value against one node; returns the output value, or
/// `None` if the value was rejected while accumulating.
fn check_node<'a>(
    ctx: &mut Ctx<'a>,
    node: &'a Node,
    plan: &'a Plan,
    value: &'a Value,
) -> Result<Option<Value>, Halt> {
    if ctx.access_enabled && !plan.writable {
        ctx.issue(IssueCode::NoAccess)?;
        return Ok(None);
    }

    if value.is_null() {
        if node.nullable {
            return Ok(Some(Value::Null));
        }
        ctx.issue(expected_code(&node.kind))?;
        return Ok(None);
    }

    match &node.kind {
        Kind::Object(_) | Kind::Map(_) | Kind::Array(_) => {
            if !constraints(ctx, node, value)? {
                return Ok(None);
            }
            check_container(ctx, node, plan, value)
        }
        kind => {
            let verdict = match kind {
                Kind::Any => Ok(()),
                Kind::Bool => {
                    if value.is_boolean() {
                        Ok(())
                    } else {
                        Err(IssueCode::ExpectedBoolean)
                    }
                }
                Kind::Int(spec) => scalar::check_int(value, spec),
                Kind::Float(spec) => scalar::check_float(value, spec),
                Kind::Numeric(spec) => scalar::check_numeric(value, spec),
                Kind::BigInt(spec) => scalar::check_bigint(value, spec),
                Kind::Char(spec) => text::check_char(value, spec),
                Kind::Text(spec) => text::check_text(value, spec),
                Kind::Color(spec) => format::check_color(value, spec),
                Kind::CreditCard => format::check_creditcard(value),
                Kind::Isbn(isbn) => format::check_isbn(value, *isbn),
                Kind::Mac(separator) => format::check_mac(value, *separator),
                Kind::Ip(spec) => format::check_ip(value, spec),
                Kind::Uuid(spec) => format::check_uuid(value, spec),
                Kind::DateTime(spec) => datetime::check(value, spec),
                Kind::Object(_) | Kind::Map(_) | Kind::Array(_) => unreachable!("handled above"),
            };
            if let Err(code) = verdict {
                ctx.issue(code)?;
                return Ok(None);
            }
            if !constraints(ctx, node, value)? {
                return Ok(None);
            }
            Ok(Some(value.clone()))
        }
    }
}

/// The common constraint chain: `$allowed` → `$exp` → `$fn`. Returns
/// whether the value passed.
fn constraints<'a>(ctx: &mut Ctx<'a>, node: &'a Node, value: &Value) -> Result<bool, Halt> {
    // `any` observably ignores $allowed.
    if !matches!(node.kind, Kind::Any) {
        if let Some(allowed) = &node.allowed {
            if !allowed.iter().any(|candidate| equals(candidate, value)) {
                ctx.issue(IssueCode::InvalidValue)?;
                return Ok(false);
            }
        }
    }
    if let Some(exp) = &node.exp {
        let passed = value.as_f64().is_some_and(|x| exp.test(x));
        if !passed {
            ctx.issue(IssueCode::InvalidValue)?;
            return Ok(false);
        }
    }
    if let Some(func) = &node.func {
        match (func.check)(value) {
            Verdict::Pass => {}
            Verdict::Fail => {
                ctx.issue(IssueCode::InvalidValue)?;
                return Ok(false);
            }
            Verdict::Code(code) => {
                ctx.issue(code)?;
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn check_container<'a>(
    ctx: &mut Ctx<'a>,
    node: &'a Node,
    plan: &'a Plan,
    value: &'a Value,
) -> Result<Option<Value>, Halt> {
    match &node.kind {
        Kind::Object(spec) => {
            let Value::Object(input) = value else {
                ctx.issue(IssueCode::ExpectedObject)?;
                return Ok(None);
            };
            let mut output = Map::new();

            // Unknown keys first, in input order.
            if !plan.extract {
                for key in input.keys() {
                    if !spec.fields.contains_key(key.as_str()) {
                        ctx.path.push(Segment::Field(key.as_str()));
                        ctx.issue(IssueCode::UnexpectedProperty)?;
                        ctx.path.pop();
                    }
                }
            }

            // Declared fields in declaration order.
            for (name, child) in &spec.fields {
                let child_plan = &plan.children[name.as_str()];
                ctx.path.push(Segment::Field(name.as_str()));
                match input.get(name.as_str()) {
                    Some(present) => {
                        if let Some(out) = check_node(ctx, child, child_plan, present)? {
                            output.insert(name.clone(), out);
                        }
                    }
                    None => {
                        if ctx.access_enabled && !child_plan.writable && !plan.delta {
                            // Full-mode access control covers every
                            // declared field, present or not.
                            ctx.issue(IssueCode::NoAccess)?;
                        } else if plan.delta {
                            // Partial update: absence admitted.
                        } else if let Some(default) = &child.default {
                            output.insert(name.clone(), clone_deep(default));
                        } else if !child.optional {
                            ctx.issue(IssueCode::MissingProperty)?;
                        }
                    }
                }
                ctx.path.pop();
            }

            Ok(Some(Value::Object(output)))
        }
        Kind::Map(value_node) => {
            let Value::Object(input) = value else {
                ctx.issue(IssueCode::ExpectedObject)?;
                return Ok(None);
            };
            let element_plan = plan.element.as_deref().expect("map plan has element");
            let mut output = Map::new();
            for (key, entry) in input {
                ctx.path.push(Segment::Field(key.as_str()));
                if let Some(out) = check_node(ctx, value_node, element_plan, entry)? {
                    output.insert(key.clone(), out);
                }
                ctx.path.pop();
            }
            Ok(Some(Value::Object(output)))
        }
        Kind::Array(spec) => {
            let Value::Array(items) = value else {
                ctx.issue(IssueCode::ExpectedArray)?;
                return Ok(None);
            };
            if spec.min_len.is_some_and(|m| items.len() < m)
                || spec.max_len.is_some_and(|m| items.len() > m)
            {
                ctx.issue(IssueCode::LengthConstraint)?;
            }
            let element_plan = plan.element.as_deref().expect("array plan has element");
            let mut output = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                ctx.path.push(Segment::Index(i));
                if let Some(out) = check_node(ctx, &spec.element, element_plan, item)? {
                    output.push(out);
                }
                ctx.path.pop();
            }
            Ok(Some(Value::Array(output)))
        }
        _ => unreachable!("container dispatch"),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{fetch, Roles};
    use crate::schema::{normalize::normalize, Predicates, Schema};
    use serde_json::json;

    fn schema_of(descriptor: Value) -> Schema {
        let root = normalize(&descriptor, &Predicates::new()).unwrap();
        Schema::from_root(root)
    }

    fn run_with(
        descriptor: Value,
        input: Value,
        options: Options,
    ) -> Result<Value, SchemaError> {
        fetch(&schema_of(descriptor), options, None).run(&input)
    }

    fn codes(error: &SchemaError) -> Vec<(IssueCode, String)> {
        error
            .issues
            .iter()
            .map(|i| (i.code, i.path.clone()))
            .collect()
    }

    #[test]
    fn test_scalar_root() {
        assert_eq!(
            run_with(json!({"$type": "int8"}), json!(127), Options::NONE).unwrap(),
            json!(127)
        );
        let err = run_with(json!({"$type": "int8"}), json!(128), Options::NONE).unwrap_err();
        assert_eq!(codes(&err), vec![(IssueCode::OutOfRange, String::new())]);
    }

    #[test]
    fn test_object_roundtrip() {
        let output = run_with(
            json!({"a": {"$type": "bool"}, "b": "int"}),
            json!({"a": true, "b": 7}),
            Options::NONE,
        )
        .unwrap();
        assert_eq!(output, json!({"a": true, "b": 7}));
    }

    #[test]
    fn test_missing_and_unexpected() {
        let err = run_with(
            json!({"a": "int"}),
            json!({"b": 1}),
            Options::ACCUMULATE_ERRORS,
        )
        .unwrap_err();
        assert_eq!(
            codes(&err),
            vec![
                (IssueCode::UnexpectedProperty, "b".into()),
                (IssueCode::MissingProperty, "a".into()),
            ]
        );
    }

    #[test]
    fn test_fail_fast_stops_at_first() {
        let err = run_with(
            json!({"a": "int", "b": "int"}),
            json!({"a": "x", "b": "y"}),
            Options::NONE,
        )
        .unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].path, "a");
    }

    #[test]
    fn test_nullability() {
        assert_eq!(
            run_with(json!({"$type": "int?"}), json!(null), Options::NONE).unwrap(),
            json!(null)
        );
        let err = run_with(json!({"$type": "int"}), json!(null), Options::NONE).unwrap_err();
        assert_eq!(err.issues[0].code, IssueCode::ExpectedNumber);
    }

    #[test]
    fn test_array_bounds_and_paths() {
        let descriptor = json!({"$type": "int[2:4]"});
        assert!(run_with(descriptor.clone(), json!([1]), Options::NONE).is_err());
        for n in 2..=4 {
            let items: Vec<i32> = (0..n).collect();
            assert!(run_with(descriptor.clone(), json!(items), Options::NONE).is_ok());
        }
        assert!(run_with(descriptor.clone(), json!([1, 2, 3, 4, 5]), Options::NONE).is_err());

        let err = run_with(descriptor, json!([1, "x", 3]), Options::NONE).unwrap_err();
        assert_eq!(codes(&err), vec![(IssueCode::ExpectedNumber, "[1]".into())]);
    }

    #[test]
    fn test_nested_array_paths() {
        let err = run_with(
            json!({"grid": "int[2][2]"}),
            json!({"grid": [[1, 2], [3, "x"]]}),
            Options::NONE,
        )
        .unwrap_err();
        assert_eq!(err.issues[0].path, "grid[1][1]");
    }

    #[test]
    fn test_map_values() {
        let descriptor = json!({"$type": "map", "$data": "int"});
        assert_eq!(
            run_with(descriptor.clone(), json!({"a": 1, "b": 2}), Options::NONE).unwrap(),
            json!({"a": 1, "b": 2})
        );
        let err = run_with(descriptor, json!({"a": 1, "b": "x"}), Options::NONE).unwrap_err();
        assert_eq!(codes(&err), vec![(IssueCode::ExpectedNumber, "b".into())]);
    }

    #[test]
    fn test_defaults_cloned_per_invocation() {
        let descriptor = json!({"e": {"$type": "object", "$default": {}}});
        let schema = schema_of(descriptor);
        let program = fetch(&schema, Options::NONE, None);
        let first = program.run(&json!({})).unwrap();
        let second = program.run(&json!({})).unwrap();
        assert_eq!(first, second);
        assert_eq!(first["e"], json!({}));
    }

    #[test]
    fn test_delta_mode_admits_missing() {
        let descriptor = json!({"a": {"$type": "bool"}, "b": {"$type": "int"}});
        let output = run_with(descriptor.clone(), json!({"a": true}), Options::DELTA_MODE).unwrap();
        assert_eq!(output, json!({"a": true}));
        // Unknown fields still fail in delta mode.
        let err =
            run_with(descriptor.clone(), json!({"invalid": true}), Options::DELTA_MODE).unwrap_err();
        assert_eq!(err.issues[0].code, IssueCode::UnexpectedProperty);
        // Without delta mode, b is required.
        assert!(run_with(descriptor, json!({"a": true}), Options::NONE).is_err());
    }

    #[test]
    fn test_delta_false_subtree() {
        let descriptor = json!({
            "loose": {"x": "int"},
            "strict": {"$delta": false, "y": "int"}
        });
        let err = run_with(
            descriptor,
            json!({"loose": {}, "strict": {}}),
            Options::DELTA_MODE | Options::ACCUMULATE_ERRORS,
        )
        .unwrap_err();
        assert_eq!(
            codes(&err),
            vec![(IssueCode::MissingProperty, "strict.y".into())]
        );
    }

    #[test]
    fn test_extract_modes() {
        let descriptor = json!({"a": "int", "nested": {"b": "int"}});
        let input = json!({"a": 1, "extra": true, "nested": {"b": 2, "extra": true}});
        let output = run_with(descriptor.clone(), input.clone(), Options::EXTRACT_ALL).unwrap();
        assert_eq!(output, json!({"a": 1, "nested": {"b": 2}}));

        // EXTRACT_TOP alone still rejects the nested unknown.
        let err = run_with(descriptor, input, Options::EXTRACT_TOP).unwrap_err();
        assert_eq!(err.issues[0].path, "nested.extra");
    }

    #[test]
    fn test_allowed_literals() {
        let descriptor = json!({"$type": "string", "$allowed": ["on", "off"]});
        assert!(run_with(descriptor.clone(), json!("on"), Options::NONE).is_ok());
        let err = run_with(descriptor, json!("auto"), Options::NONE).unwrap_err();
        assert_eq!(err.issues[0].code, IssueCode::InvalidValue);
    }

    #[test]
    fn test_exp_constraint() {
        let descriptor = json!({"$type": "int", "$exp": "x % 2 == 0"});
        assert!(run_with(descriptor.clone(), json!(4), Options::NONE).is_ok());
        let err = run_with(descriptor, json!(5), Options::NONE).unwrap_err();
        assert_eq!(err.issues[0].code, IssueCode::InvalidValue);
    }

    #[test]
    fn test_fn_predicate_codes() {
        let mut preds = Predicates::new();
        preds.insert("nonZero", |v: &Value| match v.as_i64() {
            Some(0) => Verdict::Code(IssueCode::OutOfRange),
            Some(_) => Verdict::Pass,
            None => Verdict::Fail,
        });
        let root = normalize(&json!({"$type": "int", "$fn": "nonZero"}), &preds).unwrap();
        let schema = Schema::from_root(root);
        let program = fetch(&schema, Options::NONE, None);
        assert!(program.run(&json!(5)).is_ok());
        let err = program.run(&json!(0)).unwrap_err();
        assert_eq!(err.issues[0].code, IssueCode::OutOfRange);
    }

    #[test]
    fn test_access_full_mode_covers_all_fields() {
        let descriptor = json!({
            "name": {"$type": "string"},
            "secret": {"$type": "string", "$w": "admin"}
        });
        let schema = schema_of(descriptor);
        let user: Roles = ["user".to_string()].into();
        let program = fetch(&schema, Options::ACCUMULATE_ERRORS, Some(&user));
        // Present or absent, the restricted field reports NoAccess.
        let err = program.run(&json!({"name": "x", "secret": "s"})).unwrap_err();
        assert_eq!(codes(&err), vec![(IssueCode::NoAccess, "secret".into())]);
        let err = program.run(&json!({"name": "x"})).unwrap_err();
        assert_eq!(codes(&err), vec![(IssueCode::NoAccess, "secret".into())]);
    }

    #[test]
    fn test_access_delta_checks_present_only() {
        let descriptor = json!({
            "name": {"$type": "string"},
            "secret": {"$type": "string", "$w": "admin"}
        });
        let schema = schema_of(descriptor);
        let user: Roles = ["user".to_string()].into();
        let program = fetch(&schema, Options::DELTA_MODE, Some(&user));
        assert!(program.run(&json!({"name": "x"})).is_ok());
        let err = program.run(&json!({"secret": "s"})).unwrap_err();
        assert_eq!(err.issues[0].code, IssueCode::NoAccess);
    }

    #[test]
    fn test_escaped_names_in_paths() {
        let err = run_with(
            json!({"\\$meta": {"$type": "int"}}),
            json!({"$meta": "x"}),
            Options::NONE,
        )
        .unwrap_err();
        assert_eq!(err.issues[0].path, "\\$meta");
    }

    #[test]
    fn test_input_not_mutated() {
        let descriptor = json!({"a": "int", "b": {"$type": "string", "$default": "d"}});
        let input = json!({"a": 1});
        let snapshot = input.clone();
        let output = run_with(descriptor, input.clone(), Options::NONE).unwrap();
        assert_eq!(input, snapshot);
        assert_eq!(output, json!({"a": 1, "b": "d"}));
    }
}
