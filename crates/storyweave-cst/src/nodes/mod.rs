// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Position-indexed node model.
//!
//! Every parsed node carries a `[start, end)` byte range into the buffer it
//! was parsed from. The same script nodes serve the module script of a
//! component file and the whole lowered module.

pub mod expression;
pub mod markup;
pub mod statement;

pub use expression::{
    Argument, ArrayElement, ArrayLit, AssignExpr, BinaryExpr, BoolLit, CallExpr,
    ConditionalExpr, Expr, Function, FunctionBody, Ident, KeyValueProp, MemberExpr, MemberProp,
    MethodKind, MethodProp, NewExpr, NumLit, ObjectLit, Prop, PropKey, SpreadProp, StrLit,
    TaggedTemplate, TypeCastExpr, UnaryExpr,
};
pub use markup::{
    AttrValue, Attribute, AttributeKind, Block as MarkupBlock, BlockKind, Branch, Element, Node,
    Root, Script, Snippet, VOID_ELEMENTS,
};
pub use statement::{
    ArrayPattern, Block, ClassDecl, ExportDecl, ExportDefault, ExportDefaultKind, ExportNamed,
    ExportSpecifier, FunctionDecl, IfStmt, ImportDecl, ImportKind, ImportSpecifier, LoopStmt,
    ObjectPattern, ObjectPatternProp, Pattern, Program, Stmt, SwitchCase, SwitchStmt, TryStmt,
    VarDecl, VarDeclarator, VarKind,
};
