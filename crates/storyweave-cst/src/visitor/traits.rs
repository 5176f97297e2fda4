// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Visitor trait definitions for script and markup traversal.

use crate::nodes::{CallExpr, Expr, Function, Node, Stmt};

/// Result of visiting a node - controls traversal behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VisitResult {
    /// Continue traversal into children.
    ///
    /// After visiting children, `leave_*` will be called for this node.
    #[default]
    Continue,

    /// Skip children, continue with siblings.
    ///
    /// `leave_*` is still called for this node.
    SkipChildren,

    /// Stop traversal entirely.
    ///
    /// No further `visit_*` or `leave_*` methods are called.
    Stop,
}

/// Read-only traversal of script nodes.
///
/// `visit_*` methods run pre-order, `leave_*` methods post-order. The node
/// lifetime lets visitors keep references into the tree.
pub trait Visitor<'a> {
    fn visit_stmt(&mut self, _node: &'a Stmt) -> VisitResult {
        VisitResult::Continue
    }

    fn leave_stmt(&mut self, _node: &'a Stmt) {}

    /// Called for every expression before its specific hook.
    fn visit_expr(&mut self, _node: &'a Expr) -> VisitResult {
        VisitResult::Continue
    }

    fn leave_expr(&mut self, _node: &'a Expr) {}

    fn visit_call(&mut self, _node: &'a CallExpr) -> VisitResult {
        VisitResult::Continue
    }

    fn leave_call(&mut self, _node: &'a CallExpr) {}

    /// Function declarations and expressions, arrows and methods.
    fn visit_function(&mut self, _node: &'a Function) -> VisitResult {
        VisitResult::Continue
    }

    fn leave_function(&mut self, _node: &'a Function) {}
}

/// Read-only traversal of markup nodes, in document order.
pub trait MarkupVisitor<'a> {
    fn visit_node(&mut self, _node: &'a Node) -> VisitResult {
        VisitResult::Continue
    }

    fn leave_node(&mut self, _node: &'a Node) {}
}
