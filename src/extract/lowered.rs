//! Lowered tree extraction.
//!
//! The lowering step turns the component file into a module whose default
//! export renders it. Inside that entry function every story element has
//! become a call to the `Story` binding, in document order. This module
//! finds those calls, the `defineMeta(...)` declaration and the shape of
//! the default export; it knows nothing about the source tree.

use storyweave_core::error::{StoryweaveError, StoryweaveResult};
use storyweave_core::patch::Span;
use tracing::debug;

use storyweave_cst::{
    CallExpr, CallSiteCollector, ExportDefaultKind, Expr, Function, ObjectLit, ObjectPattern,
    Pattern, Program, Stmt,
};

use super::source::{define_meta_args, define_meta_local, find_define_meta};
use crate::STORY_EXPORT;

/// Binding introduced for an entry function that has no usable name.
pub const ENTRY_BINDING: &str = "__entry";

/// The `defineMeta(...)` declaration in the lowered module.
#[derive(Debug, Clone, Copy)]
pub struct MetaCallSite<'a> {
    pub pattern: &'a ObjectPattern,
    pub call: &'a CallExpr,
    pub args: &'a ObjectLit,
}

/// One story invocation inside the entry function.
#[derive(Debug, Clone, Copy)]
pub struct StoryCallSite<'a> {
    pub call: &'a CallExpr,
    /// The argument object, the call's second argument.
    pub args: &'a ObjectLit,
}

impl StoryCallSite<'_> {
    pub fn args_span(&self) -> StoryweaveResult<Span> {
        self.args
            .span
            .ok_or_else(|| StoryweaveError::internal("parsed story arguments have no span"))
    }
}

/// How the lowered module default-exports its entry function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultExport {
    /// `export default function Name() {}`; `prefix` is `export default `.
    Function { prefix: Span, named: bool },
    /// `export default Name;`
    Identifier { stmt: Span },
    /// `export default wrap(Name, ...);`; `prefix` is `export default `.
    Wrapper { prefix: Span },
}

/// The call sites of one lowered module.
#[derive(Debug, Clone)]
pub struct CallSiteSet<'a> {
    pub meta: MetaCallSite<'a>,
    /// Story invocations in document order.
    pub stories: Vec<StoryCallSite<'a>>,
    /// Name the entry function is reachable under once the default export
    /// is rewritten.
    pub entry: String,
    pub default_export: DefaultExport,
}

/// Locate the call sites of a lowered module.
///
/// `meta_local` and `story_binding` are the names the source file uses;
/// names bound in the lowered module take precedence. Top-level snippets
/// the lowering step placed inside the entry function are named by
/// `templates`; stories inside them are not rendered and not collected.
pub fn extract_call_sites<'a>(
    program: &'a Program,
    meta_local: &str,
    story_binding: &str,
    templates: &[&str],
    file: &str,
) -> StoryweaveResult<CallSiteSet<'a>> {
    let local = define_meta_local(program).unwrap_or(meta_local);
    let (_, declarator) = find_define_meta(program, local).ok_or_else(|| {
        StoryweaveError::internal(format!("the lowered module has no {}(...) declaration", local))
    })?;
    let Pattern::Object(pattern) = &declarator.name else {
        return Err(StoryweaveError::internal(
            "the lowered defineMeta(...) result is not destructured",
        ));
    };
    let call = declarator
        .init
        .as_ref()
        .and_then(|init| init.unwrap_parens().as_call())
        .ok_or_else(|| StoryweaveError::internal("the lowered defineMeta(...) is not a call"))?;
    let args = define_meta_args(declarator).ok_or_else(|| {
        StoryweaveError::internal("the lowered defineMeta(...) argument is not an object literal")
    })?;
    let story_binding = pattern
        .binding_for(STORY_EXPORT)
        .map(|ident| ident.name.as_str())
        .unwrap_or(story_binding);

    let (entry_fn, entry, default_export) = entry_function(program)?;

    let mut stories = Vec::new();
    let calls = CallSiteCollector::collect_in_function_except(entry_fn, story_binding, templates);
    for call in calls {
        let args = call
            .args
            .get(1)
            .and_then(|arg| arg.expr())
            .and_then(|expr| expr.unwrap_parens().as_object())
            .ok_or_else(|| {
                StoryweaveError::structural(
                    file,
                    format!(
                        "the lowered story call at {} does not receive a static argument object; story attributes cannot be spread",
                        call.span
                    ),
                )
            })?;
        stories.push(StoryCallSite { call, args });
    }

    debug!(file, stories = stories.len(), entry = %entry, "extracted call sites");
    Ok(CallSiteSet {
        meta: MetaCallSite {
            pattern,
            call,
            args,
        },
        stories,
        entry,
        default_export,
    })
}

/// Find the entry function through the default export.
fn entry_function(program: &Program) -> StoryweaveResult<(&Function, String, DefaultExport)> {
    let export = program
        .body
        .iter()
        .find_map(|stmt| match stmt {
            Stmt::ExportDefault(export) => Some(export),
            _ => None,
        })
        .ok_or_else(|| StoryweaveError::internal("the lowered module has no default export"))?;

    match &export.kind {
        ExportDefaultKind::Function(function) => {
            let prefix = Span::new(export.span.start, function.span.start);
            let entry = match &function.name {
                Some(name) => name.name.clone(),
                None => ENTRY_BINDING.to_string(),
            };
            let named = function.name.is_some();
            Ok((function, entry, DefaultExport::Function { prefix, named }))
        }
        ExportDefaultKind::Expr(expr) => match expr.unwrap_parens() {
            Expr::Ident(ident) => {
                let function = function_named(program, &ident.name)?;
                Ok((
                    function,
                    ident.name.clone(),
                    DefaultExport::Identifier { stmt: export.span },
                ))
            }
            Expr::Call(call) => {
                let name = call
                    .args
                    .first()
                    .and_then(|arg| arg.expr())
                    .and_then(|expr| expr.unwrap_parens().as_ident())
                    .ok_or_else(|| {
                        StoryweaveError::internal(
                            "the lowered default export wraps something other than the entry function",
                        )
                    })?;
                let function = function_named(program, &name.name)?;
                let start = expr.span().map_or(export.span.end, |span| span.start);
                Ok((
                    function,
                    ENTRY_BINDING.to_string(),
                    DefaultExport::Wrapper {
                        prefix: Span::new(export.span.start, start),
                    },
                ))
            }
            other => Err(StoryweaveError::internal(format!(
                "unexpected default export in the lowered module: {}",
                other.kind_name()
            ))),
        },
        ExportDefaultKind::Class(_) => Err(StoryweaveError::internal(
            "the lowered module default-exports a class",
        )),
    }
}

/// A top-level function declaration, or a variable initialized with a
/// function, named `name`.
fn function_named<'p>(program: &'p Program, name: &str) -> StoryweaveResult<&'p Function> {
    program
        .body
        .iter()
        .find_map(|stmt| match stmt {
            Stmt::Function(decl) if decl.function.name.as_ref().is_some_and(|n| n.name == name) => {
                Some(&decl.function)
            }
            _ => stmt.as_var_decl()?.declarators.iter().find_map(|d| {
                match (&d.name, d.init.as_ref().map(Expr::unwrap_parens)) {
                    (Pattern::Ident(ident), Some(Expr::Function(f) | Expr::Arrow(f)))
                        if ident.name == name =>
                    {
                        Some(f.as_ref())
                    }
                    _ => None,
                }
            }),
        })
        .ok_or_else(|| {
            StoryweaveError::internal(format!(
                "the lowered entry function '{}' is not declared at the top level",
                name
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyweave_cst::parse_module;

    const META: &str = "import { defineMeta } from \"@storyweave/csf\";\nconst { Story } = defineMeta({ title: \"A\" });\n";

    fn names(set: &CallSiteSet<'_>) -> Vec<String> {
        set.stories
            .iter()
            .map(|site| site.args.get("name").and_then(|n| n.as_str()).unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn function_default_export() {
        let src = format!(
            "{}export default function Entry($$anchor) {{\n  Story($$anchor, {{ name: \"A\" }});\n  {{ const t = () => {{}}; Story(n, {{ name: \"B\", template: t }}); }}\n}}\n",
            META
        );
        let program = parse_module(&src).unwrap();
        let set = extract_call_sites(&program, "defineMeta", "Story", &[], "a.svelte").unwrap();
        assert_eq!(names(&set), vec!["A", "B"]);
        assert_eq!(set.entry, "Entry");
        let DefaultExport::Function { prefix, named } = set.default_export else {
            panic!("expected function export");
        };
        assert!(named);
        assert_eq!(prefix.slice(&src), "export default ");
        assert_eq!(set.meta.args.get("title").and_then(|t| t.as_str()), Some("A"));
    }

    #[test]
    fn identifier_default_export() {
        let src = format!(
            "{}function Entry($$anchor) {{ Story($$anchor, {{ name: \"A\" }}); }}\nexport default Entry;\n",
            META
        );
        let program = parse_module(&src).unwrap();
        let set = extract_call_sites(&program, "defineMeta", "Story", &[], "a.svelte").unwrap();
        assert_eq!(set.entry, "Entry");
        let DefaultExport::Identifier { stmt } = set.default_export else {
            panic!("expected identifier export");
        };
        assert_eq!(stmt.slice(&src), "export default Entry;");
    }

    #[test]
    fn wrapped_default_export() {
        let src = format!(
            "{}const Entry = ($$anchor) => {{ Story($$anchor, {{ name: \"A\" }}); }};\nexport default hmr(Entry, {{ id: 1 }});\n",
            META
        );
        let program = parse_module(&src).unwrap();
        let set = extract_call_sites(&program, "defineMeta", "Story", &[], "a.svelte").unwrap();
        assert_eq!(set.entry, ENTRY_BINDING);
        let DefaultExport::Wrapper { prefix } = set.default_export else {
            panic!("expected wrapper export");
        };
        assert_eq!(prefix.slice(&src), "export default ");
        assert_eq!(names(&set), vec!["A"]);
    }

    #[test]
    fn lowered_names_take_precedence() {
        let src = "import { defineMeta as dm } from \"@storyweave/csf\";\nconst { Story: S } = dm({});\nexport default function E($$anchor) { S($$anchor, { name: \"A\" }); Story(x, {}); }\n";
        let program = parse_module(src).unwrap();
        let set = extract_call_sites(&program, "defineMeta", "Story", &[], "a.svelte").unwrap();
        assert_eq!(names(&set), vec!["A"]);
    }

    #[test]
    fn dynamic_story_arguments_are_rejected() {
        let src = format!(
            "{}export default function E($$anchor) {{ Story($$anchor, $.spread_props(p)); }}\n",
            META
        );
        let program = parse_module(&src).unwrap();
        let err = extract_call_sites(&program, "defineMeta", "Story", &[], "a.svelte").unwrap_err();
        assert!(matches!(err, StoryweaveError::Structural { .. }));
    }

    #[test]
    fn missing_default_export_is_internal() {
        let program = parse_module(META).unwrap();
        let err = extract_call_sites(&program, "defineMeta", "Story", &[], "a.svelte").unwrap_err();
        assert!(matches!(err, StoryweaveError::InternalConsistency { .. }));
    }
}
