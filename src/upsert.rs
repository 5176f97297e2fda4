//! Ensure-or-create writes into nested object literals.
//!
//! Every metadata injection goes through [`ensure_path`]: walk a key path
//! down an object literal, creating empty objects for missing keys, and
//! return the deepest container. A key can be in one of four states:
//!
//! - missing: a new `key: {}` property is appended
//! - an object literal: descend into it
//! - a reactive accessor `get key() { return { ... } }`: rewritten to a
//!   plain `key: { ... }` property, then descended into
//! - anything else: a [`StoryweaveError::SchemaConflict`]
//!
//! Leaf writes follow one policy: an explicit user value always wins. When
//! the leaf already exists the write is skipped and a warning goes to the
//! diagnostics sink.

use storyweave_core::diagnostics::{Diagnostics, Warning, W_EXPLICIT_VALUE_KEPT};
use storyweave_core::error::{StoryweaveError, StoryweaveResult};

use storyweave_cst::{
    Expr, FunctionBody, KeyValueProp, MethodKind, MethodProp, ObjectLit, Prop, Stmt,
};

/// What a key currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    Missing,
    PresentAsObject(usize),
    PresentAsAccessor(usize),
    PresentAsOther(&'static str),
}

/// Classify `key` within `object`.
pub fn classify(object: &ObjectLit, key: &str) -> PathState {
    let Some(index) = object.position(key) else {
        return PathState::Missing;
    };
    match &object.props[index] {
        Prop::KeyValue(kv) => match kv.value.unwrap_parens() {
            Expr::Object(_) => PathState::PresentAsObject(index),
            other => PathState::PresentAsOther(other.kind_name()),
        },
        Prop::Method(method) if accessor_object(method).is_some() => {
            PathState::PresentAsAccessor(index)
        }
        Prop::Method(method) => PathState::PresentAsOther(match method.kind {
            MethodKind::Getter => "getter",
            MethodKind::Setter => "setter",
            MethodKind::Method => "method",
        }),
        Prop::Spread(_) => PathState::PresentAsOther("spread"),
    }
}

/// The object a getter returns when its body is a single `return { ... }`.
fn accessor_object(method: &MethodProp) -> Option<&ObjectLit> {
    if method.kind != MethodKind::Getter {
        return None;
    }
    let FunctionBody::Block(block) = &method.function.body else {
        return None;
    };
    let mut stmts = block.stmts.iter().filter(|s| !matches!(s, Stmt::Empty(_)));
    match (stmts.next(), stmts.next()) {
        (Some(Stmt::Return { arg: Some(arg), .. }), None) => arg.unwrap_parens().as_object(),
        _ => None,
    }
}

/// Replace the accessor at `index` with an equivalent `key: { ... }`.
fn normalize_accessor(object: &mut ObjectLit, index: usize) -> StoryweaveResult<()> {
    let Prop::Method(method) = &object.props[index] else {
        return Err(StoryweaveError::internal("accessor normalization on a non-method property"));
    };
    let returned = accessor_object(method)
        .cloned()
        .ok_or_else(|| StoryweaveError::internal("accessor does not return an object literal"))?;
    object.props[index] = Prop::KeyValue(KeyValueProp {
        span: Some(method.span),
        key: method.key.clone(),
        value: Expr::Object(returned),
        shorthand: false,
        synthesized: true,
    });
    Ok(())
}

/// Walk `path` down from `object`, creating what is missing, and return
/// the deepest object literal.
///
/// `target` names the meta or story being written, for error messages.
/// Calling this twice with the same path returns the same container and
/// never adds a second intermediate property.
pub fn ensure_path<'o>(
    object: &'o mut ObjectLit,
    path: &[&str],
    target: &str,
) -> StoryweaveResult<&'o mut ObjectLit> {
    ensure_from(object, path, 0, target)
}

fn ensure_from<'o>(
    object: &'o mut ObjectLit,
    path: &[&str],
    depth: usize,
    target: &str,
) -> StoryweaveResult<&'o mut ObjectLit> {
    let Some(key) = path.get(depth) else {
        return Ok(object);
    };
    let index = match classify(object, key) {
        PathState::Missing => {
            object.push(key, Expr::Object(ObjectLit::new()));
            object.props.len() - 1
        }
        PathState::PresentAsObject(index) => index,
        PathState::PresentAsAccessor(index) => {
            normalize_accessor(object, index)?;
            index
        }
        PathState::PresentAsOther(actual) => {
            return Err(StoryweaveError::SchemaConflict {
                path: path[..=depth].join("."),
                expected: "object literal".to_string(),
                actual: actual.to_string(),
                target: target.to_string(),
            });
        }
    };
    let child = match &mut object.props[index] {
        Prop::KeyValue(kv) => kv.value.unwrap_parens_mut().as_object_mut(),
        _ => None,
    }
    .ok_or_else(|| StoryweaveError::internal(format!("'{}' is not an object after upsert", key)))?;
    ensure_from(child, path, depth + 1, target)
}

/// Write `value` at `path` unless the leaf already holds a value.
///
/// Returns `true` when the value was written. When the leaf exists, a
/// warning naming `target` and `feature` is sent to `diagnostics`.
pub fn upsert_leaf(
    object: &mut ObjectLit,
    path: &[&str],
    value: impl FnOnce() -> Expr,
    target: &str,
    feature: &str,
    diagnostics: &mut dyn Diagnostics,
) -> StoryweaveResult<bool> {
    let Some((leaf, parents)) = path.split_last() else {
        return Err(StoryweaveError::internal("upsert with an empty path"));
    };
    let container = ensure_path(object, parents, target)?;
    if container.position(leaf).is_some() {
        diagnostics.warn(
            Warning::new(
                W_EXPLICIT_VALUE_KEPT,
                format!(
                    "{} already sets {}; keeping it instead of the inferred {}",
                    target,
                    path.join("."),
                    feature
                ),
            )
            .about(target),
        );
        return Ok(false);
    }
    container.push(leaf, value());
    Ok(true)
}

/// Add `key: value` at the top level when `key` is absent. No warning.
pub fn insert_if_absent(object: &mut ObjectLit, key: &str, value: impl FnOnce() -> Expr) -> bool {
    if object.position(key).is_some() {
        return false;
    }
    object.push(key, value());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyweave_core::diagnostics::CollectedDiagnostics;
    use storyweave_cst::{parse_expression_range, print_expr, Span};

    fn object(src: &str) -> ObjectLit {
        match parse_expression_range(src, Span::new(0, src.len())).unwrap() {
            Expr::Object(object) => object,
            other => panic!("expected object, got {}", other.kind_name()),
        }
    }

    fn print(object: &ObjectLit, src: &str) -> String {
        print_expr(&Expr::Object(object.clone()), src)
    }

    mod ensure {
        use super::*;

        #[test]
        fn creates_missing_levels() {
            let src = "{ name: \"A\" }";
            let mut obj = object(src);
            ensure_path(&mut obj, &["parameters", "docs"], "Story \"A\"").unwrap();
            assert_eq!(print(&obj, src), "{ name: \"A\", parameters: { docs: {} } }");
        }

        #[test]
        fn is_idempotent() {
            let src = "{}";
            let mut obj = object(src);
            ensure_path(&mut obj, &["parameters", "docs"], "meta").unwrap();
            ensure_path(&mut obj, &["parameters", "docs"], "meta")
                .unwrap()
                .push("x", Expr::bool(true));
            assert_eq!(obj.props.len(), 1);
            let parameters = obj.get("parameters").unwrap().as_object().unwrap();
            assert_eq!(parameters.props.len(), 1);
            let docs = parameters.get("docs").unwrap().as_object().unwrap();
            assert_eq!(docs.props.len(), 1);
        }

        #[test]
        fn descends_into_existing_objects() {
            let src = "{ parameters: { layout: \"centered\" } }";
            let mut obj = object(src);
            ensure_path(&mut obj, &["parameters", "docs"], "meta").unwrap();
            assert_eq!(
                print(&obj, src),
                "{ parameters: { layout: \"centered\", docs: {} } }"
            );
        }

        #[test]
        fn looks_through_parentheses() {
            let src = "{ parameters: ({ a: 1 }) }";
            let mut obj = object(src);
            ensure_path(&mut obj, &["parameters", "b"], "meta").unwrap();
            assert_eq!(print(&obj, src), "{ parameters: ({ a: 1, b: {} }) }");
        }

        #[test]
        fn normalizes_reactive_accessors() {
            let src = "{ get parameters() { return { layout: \"full\" }; } }";
            let mut obj = object(src);
            assert!(matches!(classify(&obj, "parameters"), PathState::PresentAsAccessor(0)));
            ensure_path(&mut obj, &["parameters", "docs"], "meta").unwrap();
            assert_eq!(
                print(&obj, src),
                "{ parameters: { layout: \"full\", docs: {} } }"
            );
        }

        #[test]
        fn conflicting_values_are_reported() {
            let src = "{ parameters: { docs: \"none\" } }";
            let mut obj = object(src);
            let err = ensure_path(&mut obj, &["parameters", "docs", "description"], "Story \"A\"")
                .unwrap_err();
            match err {
                StoryweaveError::SchemaConflict {
                    path, actual, target, ..
                } => {
                    assert_eq!(path, "parameters.docs");
                    assert_eq!(actual, "string literal");
                    assert_eq!(target, "Story \"A\"");
                }
                other => panic!("unexpected error {other}"),
            }
        }

        #[test]
        fn other_getters_conflict() {
            let src = "{ get parameters() { const p = {}; return p; } }";
            let obj = object(src);
            assert_eq!(classify(&obj, "parameters"), PathState::PresentAsOther("getter"));
        }
    }

    mod leaf {
        use super::*;

        #[test]
        fn writes_when_absent() {
            let src = "{ name: \"A\" }";
            let mut obj = object(src);
            let mut sink = CollectedDiagnostics::new();
            let written = upsert_leaf(
                &mut obj,
                &["parameters", "docs", "description", "story"],
                || Expr::string("Doc"),
                "Story \"A\"",
                "description",
                &mut sink,
            )
            .unwrap();
            assert!(written);
            assert!(sink.is_empty());
            assert_eq!(
                print(&obj, src),
                "{ name: \"A\", parameters: { docs: { description: { story: \"Doc\" } } } }"
            );
        }

        #[test]
        fn explicit_value_wins() {
            let src = "{ parameters: { docs: { description: { story: \"Mine\" } } } }";
            let mut obj = object(src);
            let mut sink = CollectedDiagnostics::new();
            let written = upsert_leaf(
                &mut obj,
                &["parameters", "docs", "description", "story"],
                || Expr::string("Inferred"),
                "Story \"A\"",
                "description",
                &mut sink,
            )
            .unwrap();
            assert!(!written);
            assert!(sink.has_code(W_EXPLICIT_VALUE_KEPT));
            assert_eq!(sink.warnings()[0].subject.as_deref(), Some("Story \"A\""));
            assert_eq!(print(&obj, src), src);
        }

        #[test]
        fn insert_if_absent_keeps_existing() {
            let src = "{ exportName: \"Mine\" }";
            let mut obj = object(src);
            assert!(!insert_if_absent(&mut obj, "exportName", || Expr::string("Other")));
            assert!(!obj.is_dirty());
            assert!(insert_if_absent(&mut obj, "name", || Expr::string("A")));
            assert_eq!(print(&obj, src), "{ exportName: \"Mine\", name: \"A\" }");
        }
    }
}
