// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! CallSiteCollector visitor for locating calls to a named function.
//!
//! Calls are collected pre-order, so an outer call comes before the calls
//! nested in its arguments. This matches the document order of the markup
//! the calls were lowered from.
//!
//! # Usage
//!
//! ```ignore
//! let calls = CallSiteCollector::collect_in_function_except(entry, "Story", &[]);
//! for call in &calls {
//!     println!("story call at {}", call.span);
//! }
//! ```

use super::dispatch::walk_function_node;
use super::traits::{VisitResult, Visitor};
use crate::nodes::{CallExpr, Expr, Function, FunctionBody, Pattern, Stmt};

/// The identifier a call invokes, looking through parentheses.
pub fn callee_name(call: &CallExpr) -> Option<&str> {
    match call.callee.unwrap_parens() {
        Expr::Ident(ident) => Some(&ident.name),
        _ => None,
    }
}

/// A visitor that collects calls whose callee is a given identifier.
pub struct CallSiteCollector<'a, 'n> {
    callee: &'n str,
    calls: Vec<&'a CallExpr>,
    /// Statements whose subtrees are not searched.
    skipped: Vec<&'a Stmt>,
}

impl<'a, 'n> CallSiteCollector<'a, 'n> {
    pub fn new(callee: &'n str) -> Self {
        CallSiteCollector {
            callee,
            calls: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Collect matching calls inside `function`, nested functions included.
    ///
    /// Declarations in the function body (not in nested blocks) that bind
    /// one of `excluded` are not searched.
    pub fn collect_in_function_except(
        function: &'a Function,
        callee: &'n str,
        excluded: &[&str],
    ) -> Vec<&'a CallExpr> {
        let mut collector = CallSiteCollector::new(callee);
        if let FunctionBody::Block(block) = &function.body {
            collector.skipped = block
                .stmts
                .iter()
                .filter(|stmt| declares_any(stmt, excluded))
                .collect();
        }
        walk_function_node(&mut collector, function);
        collector.calls
    }
}

fn declares_any(stmt: &Stmt, names: &[&str]) -> bool {
    match stmt {
        Stmt::Var(decl) => decl.declarators.iter().any(|declarator| {
            matches!(&declarator.name, Pattern::Ident(ident) if names.contains(&ident.name.as_str()))
        }),
        Stmt::Function(decl) => decl
            .function
            .name
            .as_ref()
            .is_some_and(|name| names.contains(&name.name.as_str())),
        _ => false,
    }
}

impl<'a> Visitor<'a> for CallSiteCollector<'a, '_> {
    fn visit_stmt(&mut self, node: &'a Stmt) -> VisitResult {
        if self.skipped.iter().any(|stmt| std::ptr::eq(*stmt, node)) {
            return VisitResult::SkipChildren;
        }
        VisitResult::Continue
    }

    fn visit_call(&mut self, node: &'a CallExpr) -> VisitResult {
        if callee_name(node) == Some(self.callee) {
            self.calls.push(node);
        }
        VisitResult::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{ExportDefaultKind, Stmt};
    use crate::parser::parse_module;

    #[test]
    fn collects_in_document_order() {
        let src = r#"
export default function Entry($$anchor) {
    Story($$anchor, { name: "First", children: ($$anchor) => {
        Story($$anchor, { name: "Nested" });
    } });
    other(() => Story($$anchor, { name: "Last" }));
}
"#;
        let program = parse_module(src).unwrap();
        let Stmt::ExportDefault(export) = &program.body[0] else {
            panic!("expected default export");
        };
        let ExportDefaultKind::Function(entry) = &export.kind else {
            panic!("expected function");
        };
        let calls = CallSiteCollector::collect_in_function_except(entry, "Story", &[]);
        let names: Vec<&str> = calls
            .iter()
            .map(|call| {
                call.args[1]
                    .expr()
                    .and_then(|e| e.as_object())
                    .and_then(|o| o.get("name"))
                    .and_then(|n| n.as_str())
                    .unwrap()
            })
            .collect();
        assert_eq!(names, vec!["First", "Nested", "Last"]);
    }

    #[test]
    fn excluded_declarations_are_not_searched() {
        let src = r#"
export default function Entry($$anchor) {
    const group = ($$anchor) => {
        Story($$anchor, { name: "Hidden" });
    };
    function other($$anchor) {
        Story($$anchor, { name: "AlsoHidden" });
    }
    {
        const group = ($$anchor) => {};
        Story($$anchor, { name: "Shown" });
    }
}
"#;
        let program = parse_module(src).unwrap();
        let Stmt::ExportDefault(export) = &program.body[0] else {
            panic!("expected default export");
        };
        let ExportDefaultKind::Function(entry) = &export.kind else {
            panic!("expected function");
        };
        assert_eq!(CallSiteCollector::collect_in_function_except(entry, "Story", &[]).len(), 3);
        let calls =
            CallSiteCollector::collect_in_function_except(entry, "Story", &["group", "other"]);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].span.slice(src).contains("\"Shown\""));
    }

    #[test]
    fn ignores_member_callees() {
        let src = "function entry() { $.Story(a); Story(b); (Story)(c); }";
        let program = parse_module(src).unwrap();
        let Stmt::Function(decl) = &program.body[0] else {
            panic!("expected function");
        };
        let calls = CallSiteCollector::collect_in_function_except(&decl.function, "Story", &[]);
        assert_eq!(calls.len(), 2);
    }
}
