// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Statement, declaration and pattern nodes.

use storyweave_core::patch::Span;

use super::expression::{Expr, Function, Ident, PropKey, StrLit};
use crate::tokenizer::{Comment, CommentKind};

/// A parsed script: a module script, or a whole lowered module.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub span: Span,
    pub body: Vec<Stmt>,
    pub comments: Vec<Comment>,
}

impl Program {
    /// Comments directly preceding `offset`, separated from it and from
    /// each other by whitespace only.
    ///
    /// A block comment ends the run; consecutive line comments are
    /// gathered together.
    pub fn leading_comments(&self, src: &str, offset: usize) -> Vec<Comment> {
        let mut found = Vec::new();
        let mut cursor = offset;
        for comment in self.comments.iter().rev() {
            if comment.span.end > cursor {
                continue;
            }
            if !src[comment.span.end..cursor].trim().is_empty() {
                break;
            }
            if comment.kind == CommentKind::Block && !found.is_empty() {
                break;
            }
            found.push(*comment);
            cursor = comment.span.start;
            if comment.kind == CommentKind::Block {
                break;
            }
        }
        found.reverse();
        found
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x from "m"`
    Default,
    /// `import { a as b } from "m"`
    Named,
    /// `import * as ns from "m"`
    Namespace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpecifier {
    pub span: Span,
    pub kind: ImportKind,
    /// Exported name for named imports.
    pub imported: Option<String>,
    pub local: Ident,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub span: Span,
    pub specifiers: Vec<ImportSpecifier>,
    pub source: StrLit,
    pub type_only: bool,
}

impl ImportDecl {
    /// Local name bound for the named import `imported`.
    pub fn local_for(&self, imported: &str) -> Option<&str> {
        self.specifiers
            .iter()
            .find(|s| s.kind == ImportKind::Named && s.imported.as_deref() == Some(imported))
            .map(|s| s.local.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportDefaultKind {
    Function(Function),
    Class(ClassDecl),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportDefault {
    pub span: Span,
    pub kind: ExportDefaultKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportDecl {
    pub span: Span,
    pub decl: Box<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    pub span: Span,
    pub local: String,
    pub exported: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportNamed {
    pub span: Span,
    pub specifiers: Vec<ExportSpecifier>,
    pub source: Option<StrLit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub span: Span,
    pub name: Pattern,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub span: Span,
    pub kind: VarKind,
    pub declarators: Vec<VarDeclarator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub span: Span,
    pub function: Function,
}

/// Class declaration; the body is kept opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub span: Span,
    pub name: Option<Ident>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub span: Span,
    pub test: Expr,
    pub consequent: Box<Stmt>,
    pub alternate: Option<Box<Stmt>>,
}

/// `for`, `while` and `do` loops; the loop header is kept opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopStmt {
    pub span: Span,
    pub header: Span,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub span: Span,
    pub block: Block,
    pub param: Option<Pattern>,
    pub handler: Option<Block>,
    pub finalizer: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub span: Span,
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub span: Span,
    pub discriminant: Expr,
    pub cases: Vec<SwitchCase>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Import(ImportDecl),
    ExportDefault(ExportDefault),
    ExportDecl(ExportDecl),
    ExportNamed(ExportNamed),
    ExportAll(Span),
    Var(VarDecl),
    Function(FunctionDecl),
    Class(ClassDecl),
    Expr { span: Span, expr: Expr },
    Block(Block),
    If(IfStmt),
    Loop(LoopStmt),
    Return { span: Span, arg: Option<Expr> },
    Throw { span: Span, arg: Expr },
    Try(TryStmt),
    Switch(SwitchStmt),
    Labeled { span: Span, label: Ident, body: Box<Stmt> },
    Empty(Span),
    /// Type-only declarations, `break`, `continue` and `debugger`.
    Other(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Import(n) => n.span,
            Stmt::ExportDefault(n) => n.span,
            Stmt::ExportDecl(n) => n.span,
            Stmt::ExportNamed(n) => n.span,
            Stmt::Var(n) => n.span,
            Stmt::Function(n) => n.span,
            Stmt::Class(n) => n.span,
            Stmt::Block(n) => n.span,
            Stmt::If(n) => n.span,
            Stmt::Loop(n) => n.span,
            Stmt::Try(n) => n.span,
            Stmt::Switch(n) => n.span,
            Stmt::ExportAll(span)
            | Stmt::Empty(span)
            | Stmt::Other(span)
            | Stmt::Expr { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::Labeled { span, .. } => *span,
        }
    }

    /// The variable declaration, whether exported or not.
    pub fn as_var_decl(&self) -> Option<&VarDecl> {
        match self {
            Stmt::Var(decl) => Some(decl),
            Stmt::ExportDecl(export) => export.decl.as_var_decl(),
            _ => None,
        }
    }

    pub fn as_var_decl_mut(&mut self) -> Option<&mut VarDecl> {
        match self {
            Stmt::Var(decl) => Some(decl),
            Stmt::ExportDecl(export) => export.decl.as_var_decl_mut(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(Ident),
    Object(ObjectPattern),
    Array(ArrayPattern),
    Assign {
        span: Span,
        left: Box<Pattern>,
        right: Box<Expr>,
    },
    Rest {
        span: Span,
        arg: Box<Pattern>,
    },
    /// Member expression target in an assignment pattern.
    Expr(Box<Expr>),
}

impl Pattern {
    pub fn span(&self) -> Option<Span> {
        match self {
            Pattern::Ident(ident) => ident.span,
            Pattern::Object(object) => Some(object.span),
            Pattern::Array(array) => Some(array.span),
            Pattern::Assign { span, .. } | Pattern::Rest { span, .. } => Some(*span),
            Pattern::Expr(expr) => expr.span(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPattern {
    pub span: Span,
    pub props: Vec<ObjectPatternProp>,
}

impl ObjectPattern {
    /// Local binding for the property `key`, looking through defaults.
    pub fn binding_for(&self, key: &str) -> Option<&Ident> {
        self.props.iter().find_map(|prop| match prop {
            ObjectPatternProp::Shorthand { key: ident, .. } if ident.name == key => Some(ident),
            ObjectPatternProp::KeyValue {
                key: prop_key,
                value,
                ..
            } if prop_key.static_name() == Some(key) => match value {
                Pattern::Ident(ident) => Some(ident),
                Pattern::Assign { left, .. } => match left.as_ref() {
                    Pattern::Ident(ident) => Some(ident),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectPatternProp {
    KeyValue {
        span: Span,
        key: PropKey,
        value: Pattern,
    },
    Shorthand {
        span: Span,
        key: Ident,
        default: Option<Expr>,
    },
    Rest {
        span: Span,
        arg: Box<Pattern>,
    },
}

impl ObjectPatternProp {
    pub fn span(&self) -> Span {
        match self {
            ObjectPatternProp::KeyValue { span, .. }
            | ObjectPatternProp::Shorthand { span, .. }
            | ObjectPatternProp::Rest { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPattern {
    pub span: Span,
    pub elements: Vec<Option<Pattern>>,
}
