// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Walk functions driving [`Visitor`] and [`MarkupVisitor`] implementations.
//!
//! Children are visited in source order. Opaque nodes (class bodies, loop
//! headers, template literals) have no children.

use std::ops::ControlFlow;

use super::traits::{MarkupVisitor, VisitResult, Visitor};
use crate::nodes::{
    Argument, ArrayElement, Expr, ExportDefaultKind, Function, FunctionBody, Node,
    ObjectPatternProp, Pattern, Prop, PropKey, Stmt, MemberProp,
};

type Flow = ControlFlow<()>;

/// Walk `function`: its parameters, then its body.
pub fn walk_function_node<'a, V: Visitor<'a>>(visitor: &mut V, function: &'a Function) {
    let _ = walk_function(visitor, function);
}

/// Walk markup nodes in document order.
pub fn walk_fragment<'a, V: MarkupVisitor<'a>>(visitor: &mut V, nodes: &'a [Node]) {
    let _ = walk_nodes(visitor, nodes);
}

fn walk_stmts<'a, V: Visitor<'a>>(visitor: &mut V, stmts: &'a [Stmt]) -> Flow {
    for stmt in stmts {
        walk_stmt(visitor, stmt)?;
    }
    ControlFlow::Continue(())
}

fn walk_stmt<'a, V: Visitor<'a>>(visitor: &mut V, stmt: &'a Stmt) -> Flow {
    match visitor.visit_stmt(stmt) {
        VisitResult::Stop => return ControlFlow::Break(()),
        VisitResult::SkipChildren => {
            visitor.leave_stmt(stmt);
            return ControlFlow::Continue(());
        }
        VisitResult::Continue => {}
    }

    match stmt {
        Stmt::Import(_)
        | Stmt::ExportNamed(_)
        | Stmt::ExportAll(_)
        | Stmt::Class(_)
        | Stmt::Empty(_)
        | Stmt::Other(_) => {}
        Stmt::ExportDefault(export) => match &export.kind {
            ExportDefaultKind::Function(function) => walk_function(visitor, function)?,
            ExportDefaultKind::Class(_) => {}
            ExportDefaultKind::Expr(expr) => walk_expr(visitor, expr)?,
        },
        Stmt::ExportDecl(export) => walk_stmt(visitor, &export.decl)?,
        Stmt::Var(decl) => {
            for declarator in &decl.declarators {
                walk_pattern(visitor, &declarator.name)?;
                if let Some(init) = &declarator.init {
                    walk_expr(visitor, init)?;
                }
            }
        }
        Stmt::Function(decl) => walk_function(visitor, &decl.function)?,
        Stmt::Expr { expr, .. } => walk_expr(visitor, expr)?,
        Stmt::Block(block) => walk_stmts(visitor, &block.stmts)?,
        Stmt::If(node) => {
            walk_expr(visitor, &node.test)?;
            walk_stmt(visitor, &node.consequent)?;
            if let Some(alternate) = &node.alternate {
                walk_stmt(visitor, alternate)?;
            }
        }
        Stmt::Loop(node) => walk_stmt(visitor, &node.body)?,
        Stmt::Return { arg, .. } => {
            if let Some(arg) = arg {
                walk_expr(visitor, arg)?;
            }
        }
        Stmt::Throw { arg, .. } => walk_expr(visitor, arg)?,
        Stmt::Try(node) => {
            walk_stmts(visitor, &node.block.stmts)?;
            if let Some(param) = &node.param {
                walk_pattern(visitor, param)?;
            }
            if let Some(handler) = &node.handler {
                walk_stmts(visitor, &handler.stmts)?;
            }
            if let Some(finalizer) = &node.finalizer {
                walk_stmts(visitor, &finalizer.stmts)?;
            }
        }
        Stmt::Switch(node) => {
            walk_expr(visitor, &node.discriminant)?;
            for case in &node.cases {
                if let Some(test) = &case.test {
                    walk_expr(visitor, test)?;
                }
                walk_stmts(visitor, &case.body)?;
            }
        }
        Stmt::Labeled { body, .. } => walk_stmt(visitor, body)?,
    }

    visitor.leave_stmt(stmt);
    ControlFlow::Continue(())
}

fn walk_function<'a, V: Visitor<'a>>(visitor: &mut V, function: &'a Function) -> Flow {
    match visitor.visit_function(function) {
        VisitResult::Stop => return ControlFlow::Break(()),
        VisitResult::SkipChildren => {
            visitor.leave_function(function);
            return ControlFlow::Continue(());
        }
        VisitResult::Continue => {}
    }
    for param in &function.params {
        walk_pattern(visitor, param)?;
    }
    match &function.body {
        FunctionBody::Block(block) => walk_stmts(visitor, &block.stmts)?,
        FunctionBody::Expr(expr) => walk_expr(visitor, expr)?,
    }
    visitor.leave_function(function);
    ControlFlow::Continue(())
}

fn walk_pattern<'a, V: Visitor<'a>>(visitor: &mut V, pattern: &'a Pattern) -> Flow {
    match pattern {
        Pattern::Ident(_) => {}
        Pattern::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatternProp::KeyValue { key, value, .. } => {
                        if let PropKey::Computed { expr, .. } = key {
                            walk_expr(visitor, expr)?;
                        }
                        walk_pattern(visitor, value)?;
                    }
                    ObjectPatternProp::Shorthand { default, .. } => {
                        if let Some(default) = default {
                            walk_expr(visitor, default)?;
                        }
                    }
                    ObjectPatternProp::Rest { arg, .. } => walk_pattern(visitor, arg)?,
                }
            }
        }
        Pattern::Array(array) => {
            for element in array.elements.iter().flatten() {
                walk_pattern(visitor, element)?;
            }
        }
        Pattern::Assign { left, right, .. } => {
            walk_pattern(visitor, left)?;
            walk_expr(visitor, right)?;
        }
        Pattern::Rest { arg, .. } => walk_pattern(visitor, arg)?,
        Pattern::Expr(expr) => walk_expr(visitor, expr)?,
    }
    ControlFlow::Continue(())
}

fn walk_args<'a, V: Visitor<'a>>(visitor: &mut V, args: &'a [Argument]) -> Flow {
    for arg in args {
        match arg {
            Argument::Expr(expr) | Argument::Spread { arg: expr, .. } => walk_expr(visitor, expr)?,
        }
    }
    ControlFlow::Continue(())
}

fn walk_expr<'a, V: Visitor<'a>>(visitor: &mut V, expr: &'a Expr) -> Flow {
    match visitor.visit_expr(expr) {
        VisitResult::Stop => return ControlFlow::Break(()),
        VisitResult::SkipChildren => {
            visitor.leave_expr(expr);
            return ControlFlow::Continue(());
        }
        VisitResult::Continue => {}
    }

    match expr {
        Expr::Ident(_)
        | Expr::Str(_)
        | Expr::Num(_)
        | Expr::Bool(_)
        | Expr::Null(_)
        | Expr::Regex(_)
        | Expr::Template(_)
        | Expr::Class(_)
        | Expr::This(_)
        | Expr::Super(_)
        | Expr::MetaProperty(_) => {}
        Expr::Call(call) => match visitor.visit_call(call) {
            VisitResult::Stop => return ControlFlow::Break(()),
            VisitResult::SkipChildren => visitor.leave_call(call),
            VisitResult::Continue => {
                walk_expr(visitor, &call.callee)?;
                walk_args(visitor, &call.args)?;
                visitor.leave_call(call);
            }
        },
        Expr::Function(function) | Expr::Arrow(function) => walk_function(visitor, function)?,
        Expr::Array(array) => {
            for element in array.elements.iter().flatten() {
                match element {
                    ArrayElement::Expr(expr) | ArrayElement::Spread { arg: expr, .. } => {
                        walk_expr(visitor, expr)?
                    }
                }
            }
        }
        Expr::Object(object) => {
            for prop in &object.props {
                match prop {
                    Prop::KeyValue(kv) => {
                        if let PropKey::Computed { expr, .. } = &kv.key {
                            walk_expr(visitor, expr)?;
                        }
                        walk_expr(visitor, &kv.value)?;
                    }
                    Prop::Method(method) => walk_function(visitor, &method.function)?,
                    Prop::Spread(spread) => walk_expr(visitor, &spread.arg)?,
                }
            }
        }
        Expr::TaggedTemplate(node) => walk_expr(visitor, &node.tag)?,
        Expr::New(node) => {
            walk_expr(visitor, &node.callee)?;
            walk_args(visitor, &node.args)?;
        }
        Expr::Member(node) => {
            walk_expr(visitor, &node.object)?;
            if let MemberProp::Computed(property) = &node.property {
                walk_expr(visitor, property)?;
            }
        }
        Expr::Unary(node) => walk_expr(visitor, &node.arg)?,
        Expr::Binary(node) => {
            walk_expr(visitor, &node.left)?;
            walk_expr(visitor, &node.right)?;
        }
        Expr::Assign(node) => {
            walk_expr(visitor, &node.target)?;
            walk_expr(visitor, &node.value)?;
        }
        Expr::Conditional(node) => {
            walk_expr(visitor, &node.test)?;
            walk_expr(visitor, &node.consequent)?;
            walk_expr(visitor, &node.alternate)?;
        }
        Expr::Sequence { exprs, .. } => {
            for expr in exprs {
                walk_expr(visitor, expr)?;
            }
        }
        Expr::Paren { expr, .. } => walk_expr(visitor, expr)?,
        Expr::TypeCast(cast) => walk_expr(visitor, &cast.expr)?,
    }

    visitor.leave_expr(expr);
    ControlFlow::Continue(())
}

fn walk_nodes<'a, V: MarkupVisitor<'a>>(visitor: &mut V, nodes: &'a [Node]) -> Flow {
    for node in nodes {
        walk_node(visitor, node)?;
    }
    ControlFlow::Continue(())
}

fn walk_node<'a, V: MarkupVisitor<'a>>(visitor: &mut V, node: &'a Node) -> Flow {
    match visitor.visit_node(node) {
        VisitResult::Stop => return ControlFlow::Break(()),
        VisitResult::SkipChildren => {
            visitor.leave_node(node);
            return ControlFlow::Continue(());
        }
        VisitResult::Continue => {}
    }
    match node {
        Node::Element(element) => walk_nodes(visitor, &element.children)?,
        Node::Block(block) => {
            for branch in &block.branches {
                walk_nodes(visitor, &branch.children)?;
            }
        }
        Node::Snippet(snippet) => walk_nodes(visitor, &snippet.children)?,
        Node::Text(_) | Node::Comment(_) | Node::Mustache { .. } | Node::Tag { .. } => {}
    }
    visitor.leave_node(node);
    ControlFlow::Continue(())
}
