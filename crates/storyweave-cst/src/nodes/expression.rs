// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Expression nodes.
//!
//! Literal and container nodes that the upsert engine may create carry an
//! `Option<Span>`: `Some` for parsed nodes, `None` for synthesized ones.
//! Every other node is only ever parsed and carries a plain `Span`.

use storyweave_core::ident::is_valid_identifier;
use storyweave_core::patch::Span;

use super::statement::{Block, Pattern};

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub span: Option<Span>,
    pub name: String,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Ident {
            span: None,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrLit {
    pub span: Option<Span>,
    /// The cooked value, escapes resolved.
    pub value: String,
}

impl StrLit {
    pub fn new(value: impl Into<String>) -> Self {
        StrLit {
            span: None,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumLit {
    pub span: Span,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoolLit {
    pub span: Option<Span>,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLit {
    pub span: Option<Span>,
    /// `None` entries are holes.
    pub elements: Vec<Option<ArrayElement>>,
}

impl ArrayLit {
    pub fn new(elements: Vec<Expr>) -> Self {
        ArrayLit {
            span: None,
            elements: elements.into_iter().map(|e| Some(ArrayElement::Expr(e))).collect(),
        }
    }

    /// The values of an array made only of string literals.
    pub fn static_strings(&self) -> Option<Vec<String>> {
        self.elements
            .iter()
            .map(|element| match element {
                Some(ArrayElement::Expr(Expr::Str(s))) => Some(s.value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn push(&mut self, expr: Expr) {
        self.elements.push(Some(ArrayElement::Expr(expr)));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElement {
    Expr(Expr),
    Spread { span: Span, arg: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLit {
    pub span: Option<Span>,
    pub props: Vec<Prop>,
}

impl ObjectLit {
    pub fn new() -> Self {
        ObjectLit {
            span: None,
            props: Vec::new(),
        }
    }

    /// Index of the last property statically named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.props
            .iter()
            .rposition(|prop| prop.static_name() == Some(name))
    }

    /// Value of the key-value property named `name`.
    pub fn get(&self, name: &str) -> Option<&Expr> {
        match self.props.get(self.position(name)?)? {
            Prop::KeyValue(kv) => Some(&kv.value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Expr> {
        let index = self.position(name)?;
        match self.props.get_mut(index)? {
            Prop::KeyValue(kv) => Some(&mut kv.value),
            _ => None,
        }
    }

    /// Append a synthesized `key: value` property.
    pub fn push(&mut self, key: &str, value: Expr) {
        self.props.push(Prop::KeyValue(KeyValueProp::synthesized(key, value)));
    }
}

impl Default for ObjectLit {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Prop {
    KeyValue(KeyValueProp),
    Method(MethodProp),
    Spread(SpreadProp),
}

impl Prop {
    /// Source range of the property, `None` for new properties.
    pub fn span(&self) -> Option<Span> {
        match self {
            Prop::KeyValue(kv) => kv.span,
            Prop::Method(m) => Some(m.span),
            Prop::Spread(s) => Some(s.span),
        }
    }

    pub fn static_name(&self) -> Option<&str> {
        match self {
            Prop::KeyValue(kv) => kv.key.static_name(),
            Prop::Method(m) => m.key.static_name(),
            Prop::Spread(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyValueProp {
    /// Where the property sits in the source.
    pub span: Option<Span>,
    pub key: PropKey,
    pub value: Expr,
    /// `{ a }` form; key and value are the same identifier.
    pub shorthand: bool,
    /// Printed structurally as `key: value` instead of from source.
    pub synthesized: bool,
}

impl KeyValueProp {
    /// A new `key: value` property with no source position.
    pub fn synthesized(key: &str, value: Expr) -> Self {
        KeyValueProp {
            span: None,
            key: PropKey::for_name(key),
            value,
            shorthand: false,
            synthesized: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodProp {
    pub span: Span,
    pub kind: MethodKind,
    pub key: PropKey,
    pub function: Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpreadProp {
    pub span: Span,
    pub arg: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Ident(Ident),
    Str(StrLit),
    Num(NumLit),
    Computed { span: Span, expr: Box<Expr> },
}

impl PropKey {
    /// Identifier key when `name` is a valid identifier, string key otherwise.
    pub fn for_name(name: &str) -> Self {
        if is_valid_identifier(name) {
            PropKey::Ident(Ident::new(name))
        } else {
            PropKey::Str(StrLit::new(name))
        }
    }

    pub fn static_name(&self) -> Option<&str> {
        match self {
            PropKey::Ident(ident) => Some(&ident.name),
            PropKey::Str(s) => Some(&s.value),
            PropKey::Num(n) => Some(&n.raw),
            PropKey::Computed { .. } => None,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            PropKey::Ident(ident) => ident.span,
            PropKey::Str(s) => s.span,
            PropKey::Num(n) => Some(n.span),
            PropKey::Computed { span, .. } => Some(*span),
        }
    }
}

/// Function declarations, function expressions, arrows and methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub span: Span,
    pub name: Option<Ident>,
    pub is_async: bool,
    pub is_generator: bool,
    pub is_arrow: bool,
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Block),
    /// Concise arrow body.
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub span: Span,
    pub callee: Box<Expr>,
    pub args: Vec<Argument>,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExpr {
    pub span: Span,
    pub callee: Box<Expr>,
    pub args: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Expr(Expr),
    Spread { span: Span, arg: Expr },
}

impl Argument {
    /// The argument expression unless it is a spread.
    pub fn expr(&self) -> Option<&Expr> {
        match self {
            Argument::Expr(expr) => Some(expr),
            Argument::Spread { .. } => None,
        }
    }

    pub fn expr_mut(&mut self) -> Option<&mut Expr> {
        match self {
            Argument::Expr(expr) => Some(expr),
            Argument::Spread { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpr {
    pub span: Span,
    pub object: Box<Expr>,
    pub property: MemberProp,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProp {
    Ident(Ident),
    Private(Ident),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedTemplate {
    pub span: Span,
    pub tag: Box<Expr>,
    pub quasi: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub span: Span,
    pub op: String,
    /// `false` for postfix `++`/`--`.
    pub prefix: bool,
    pub arg: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub span: Span,
    pub op: String,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignExpr {
    pub span: Span,
    pub op: String,
    pub target: Box<Expr>,
    pub value: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpr {
    pub span: Span,
    pub test: Box<Expr>,
    pub consequent: Box<Expr>,
    pub alternate: Box<Expr>,
}

/// `expr as T`, `expr satisfies T` and `expr!`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeCastExpr {
    pub span: Span,
    pub expr: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(Ident),
    Str(StrLit),
    Num(NumLit),
    Bool(BoolLit),
    Null(Span),
    Regex(Span),
    /// Untagged template literal, kept opaque.
    Template(Span),
    TaggedTemplate(TaggedTemplate),
    Array(ArrayLit),
    Object(ObjectLit),
    Function(Box<Function>),
    Arrow(Box<Function>),
    /// Class expression, kept opaque.
    Class(Span),
    Call(CallExpr),
    New(NewExpr),
    Member(MemberExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Assign(AssignExpr),
    Conditional(ConditionalExpr),
    Sequence { span: Span, exprs: Vec<Expr> },
    Paren { span: Span, expr: Box<Expr> },
    TypeCast(TypeCastExpr),
    This(Span),
    Super(Span),
    /// `import.meta`, `new.target` and the `import` of `import(...)`.
    MetaProperty(Span),
}

impl Expr {
    pub fn span(&self) -> Option<Span> {
        match self {
            Expr::Ident(n) => n.span,
            Expr::Str(n) => n.span,
            Expr::Num(n) => Some(n.span),
            Expr::Bool(n) => n.span,
            Expr::Array(n) => n.span,
            Expr::Object(n) => n.span,
            Expr::Function(f) | Expr::Arrow(f) => Some(f.span),
            Expr::TaggedTemplate(n) => Some(n.span),
            Expr::Call(n) => Some(n.span),
            Expr::New(n) => Some(n.span),
            Expr::Member(n) => Some(n.span),
            Expr::Unary(n) => Some(n.span),
            Expr::Binary(n) => Some(n.span),
            Expr::Assign(n) => Some(n.span),
            Expr::Conditional(n) => Some(n.span),
            Expr::TypeCast(n) => Some(n.span),
            Expr::Null(span)
            | Expr::Regex(span)
            | Expr::Template(span)
            | Expr::Class(span)
            | Expr::This(span)
            | Expr::Super(span)
            | Expr::MetaProperty(span)
            | Expr::Sequence { span, .. }
            | Expr::Paren { span, .. } => Some(*span),
        }
    }

    /// Human description of the node kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Ident(_) => "identifier",
            Expr::Str(_) => "string literal",
            Expr::Num(_) => "number literal",
            Expr::Bool(_) => "boolean literal",
            Expr::Null(_) => "null",
            Expr::Regex(_) => "regular expression",
            Expr::Template(_) | Expr::TaggedTemplate(_) => "template literal",
            Expr::Array(_) => "array literal",
            Expr::Object(_) => "object literal",
            Expr::Function(_) | Expr::Arrow(_) => "function",
            Expr::Class(_) => "class",
            Expr::Call(_) => "call expression",
            Expr::New(_) => "new expression",
            Expr::Member(_) => "member expression",
            Expr::Unary(_) => "unary expression",
            Expr::Binary(_) => "binary expression",
            Expr::Assign(_) => "assignment",
            Expr::Conditional(_) => "conditional expression",
            Expr::Sequence { .. } => "sequence expression",
            Expr::Paren { .. } => "parenthesized expression",
            Expr::TypeCast(_) => "type assertion",
            Expr::This(_) => "this",
            Expr::Super(_) => "super",
            Expr::MetaProperty(_) => "meta property",
        }
    }

    pub fn as_ident(&self) -> Option<&Ident> {
        match self {
            Expr::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(&s.value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectLit> {
        match self {
            Expr::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ObjectLit> {
        match self {
            Expr::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayLit> {
        match self {
            Expr::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&CallExpr> {
        match self {
            Expr::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Strip parentheses and type assertions.
    pub fn unwrap_parens(&self) -> &Expr {
        match self {
            Expr::Paren { expr, .. } => expr.unwrap_parens(),
            Expr::TypeCast(cast) => cast.expr.unwrap_parens(),
            other => other,
        }
    }

    pub fn unwrap_parens_mut(&mut self) -> &mut Expr {
        match self {
            Expr::Paren { expr, .. } => expr.unwrap_parens_mut(),
            Expr::TypeCast(cast) => cast.expr.unwrap_parens_mut(),
            other => other,
        }
    }

    /// A synthesized string literal.
    pub fn string(value: impl Into<String>) -> Expr {
        Expr::Str(StrLit::new(value))
    }

    /// A synthesized identifier reference.
    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Ident(Ident::new(name))
    }

    /// A synthesized boolean literal.
    pub fn bool(value: bool) -> Expr {
        Expr::Bool(BoolLit { span: None, value })
    }
}
