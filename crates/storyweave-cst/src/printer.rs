// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Re-rendering of touched expressions.
//!
//! A node that was not touched prints as its exact source slice. A touched
//! object or array literal that came from source is spliced: the source
//! between its properties is copied byte for byte, touched properties are
//! re-rendered, and new properties are inserted after the last existing
//! one. Nodes with no source position print structurally.
//!
//! ```ignore
//! let mut state = CodegenState::new(src);
//! object.codegen(&mut state);
//! let text = state.to_string();
//! ```

use std::fmt;

use storyweave_core::patch::Span;
use storyweave_core::text::line_indent_at;

use crate::nodes::{ArrayElement, ArrayLit, Expr, KeyValueProp, ObjectLit, Prop, PropKey, StrLit};

/// Output buffer plus the source buffer spans refer to.
pub struct CodegenState<'src> {
    src: &'src str,
    out: String,
}

impl<'src> CodegenState<'src> {
    pub fn new(src: &'src str) -> Self {
        CodegenState {
            src,
            out: String::new(),
        }
    }

    pub fn add_token(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// Copy `[start, end)` of the source buffer.
    pub fn add_source(&mut self, start: usize, end: usize) {
        if start < end {
            self.out.push_str(Span::new(start, end).slice(self.src));
        }
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl fmt::Display for CodegenState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.out)
    }
}

pub trait Codegen<'src> {
    fn codegen(&self, state: &mut CodegenState<'src>);
}

/// Render `expr` against the buffer its spans point into.
pub fn print_expr(expr: &Expr, src: &str) -> String {
    let mut state = CodegenState::new(src);
    expr.codegen(&mut state);
    state.into_string()
}

/// A JSON-escaped, double-quoted string literal.
pub fn quote_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.escape_default()))
}

impl Expr {
    /// True when the node or anything reachable through literal containers
    /// was created or changed since parsing.
    pub fn is_dirty(&self) -> bool {
        match self {
            Expr::Object(object) => object.is_dirty(),
            Expr::Array(array) => array.is_dirty(),
            Expr::Paren { expr, .. } => expr.is_dirty(),
            Expr::TypeCast(cast) => cast.expr.is_dirty(),
            other => other.span().is_none(),
        }
    }
}

impl ObjectLit {
    pub fn is_dirty(&self) -> bool {
        self.span.is_none()
            || self.props.iter().any(|prop| match prop {
                Prop::KeyValue(kv) => kv.span.is_none() || kv.synthesized || kv.value.is_dirty(),
                Prop::Method(_) | Prop::Spread(_) => false,
            })
    }
}

impl ArrayLit {
    pub fn is_dirty(&self) -> bool {
        self.span.is_none()
            || self.elements.iter().flatten().any(|element| match element {
                ArrayElement::Expr(expr) => expr.is_dirty(),
                ArrayElement::Spread { .. } => false,
            })
    }
}

/// Separator placed before a property inserted after `last` inside the
/// literal at `span`.
fn insertion_separator(src: &str, span: Span, last: Option<Span>) -> String {
    match last {
        Some(last) if span.slice(src)[..last.start - span.start].contains('\n') => {
            format!(",\n{}", line_indent_at(src, last.start))
        }
        Some(_) => ", ".to_string(),
        None => " ".to_string(),
    }
}

impl<'src> Codegen<'src> for Expr {
    fn codegen(&self, state: &mut CodegenState<'src>) {
        if let (false, Some(span)) = (self.is_dirty(), self.span()) {
            state.add_source(span.start, span.end);
            return;
        }
        match self {
            Expr::Object(object) => object.codegen(state),
            Expr::Array(array) => array.codegen(state),
            Expr::Str(s) => s.codegen(state),
            Expr::Ident(ident) => state.add_token(&ident.name),
            Expr::Bool(b) => state.add_token(if b.value { "true" } else { "false" }),
            Expr::Paren { span, expr } => splice_inner(state, *span, expr),
            Expr::TypeCast(cast) => splice_inner(state, cast.span, &cast.expr),
            other => {
                if let Some(span) = other.span() {
                    state.add_source(span.start, span.end);
                }
            }
        }
    }
}

/// Print a wrapper's source around a re-rendered inner expression.
fn splice_inner<'src>(state: &mut CodegenState<'src>, outer: Span, inner: &Expr) {
    match inner.span() {
        Some(inner_span) => {
            state.add_source(outer.start, inner_span.start);
            inner.codegen(state);
            state.add_source(inner_span.end, outer.end);
        }
        None => inner.codegen(state),
    }
}

impl<'src> Codegen<'src> for StrLit {
    fn codegen(&self, state: &mut CodegenState<'src>) {
        match self.span {
            Some(span) => state.add_source(span.start, span.end),
            None => state.add_token(&quote_string(&self.value)),
        }
    }
}

impl<'src> Codegen<'src> for PropKey {
    fn codegen(&self, state: &mut CodegenState<'src>) {
        match self {
            PropKey::Ident(ident) => state.add_token(&ident.name),
            PropKey::Str(s) => s.codegen(state),
            PropKey::Num(n) => state.add_token(&n.raw),
            PropKey::Computed { span, .. } => state.add_source(span.start, span.end),
        }
    }
}

impl<'src> Codegen<'src> for KeyValueProp {
    fn codegen(&self, state: &mut CodegenState<'src>) {
        match (self.span, self.value.span()) {
            (Some(span), _) if !self.synthesized && !self.value.is_dirty() => {
                state.add_source(span.start, span.end);
            }
            (Some(span), Some(value_span)) if !self.synthesized => {
                state.add_source(span.start, value_span.start);
                self.value.codegen(state);
                state.add_source(value_span.end, span.end);
            }
            _ => {
                self.key.codegen(state);
                state.add_token(": ");
                self.value.codegen(state);
            }
        }
    }
}

impl<'src> Codegen<'src> for Prop {
    fn codegen(&self, state: &mut CodegenState<'src>) {
        match self {
            Prop::KeyValue(kv) => kv.codegen(state),
            Prop::Method(method) => state.add_source(method.span.start, method.span.end),
            Prop::Spread(spread) => state.add_source(spread.span.start, spread.span.end),
        }
    }
}

impl<'src> Codegen<'src> for ObjectLit {
    fn codegen(&self, state: &mut CodegenState<'src>) {
        let Some(span) = self.span else {
            if self.props.is_empty() {
                state.add_token("{}");
                return;
            }
            state.add_token("{ ");
            for (i, prop) in self.props.iter().enumerate() {
                if i > 0 {
                    state.add_token(", ");
                }
                prop.codegen(state);
            }
            state.add_token(" }");
            return;
        };

        let mut cursor = span.start + 1;
        state.add_source(span.start, cursor);
        let mut last: Option<Span> = None;
        let mut inserted = false;
        for prop in &self.props {
            match prop.span() {
                Some(prop_span) => {
                    state.add_source(cursor, prop_span.start);
                    prop.codegen(state);
                    cursor = prop_span.end;
                    last = Some(prop_span);
                }
                None => {
                    let separator = insertion_separator(state.src, span, last);
                    state.add_token(&separator);
                    prop.codegen(state);
                    last = last.or(Some(Span::empty_at(cursor)));
                    inserted = true;
                }
            }
        }
        if inserted && self.props.iter().all(|p| p.span().is_none()) {
            state.add_token(" ");
        }
        state.add_source(cursor, span.end);
    }
}

impl<'src> Codegen<'src> for ArrayLit {
    fn codegen(&self, state: &mut CodegenState<'src>) {
        let Some(span) = self.span else {
            state.add_token("[");
            for (i, element) in self.elements.iter().enumerate() {
                if i > 0 {
                    state.add_token(", ");
                }
                match element {
                    Some(ArrayElement::Expr(expr)) => expr.codegen(state),
                    Some(ArrayElement::Spread { span, .. }) => {
                        state.add_source(span.start, span.end)
                    }
                    None => {}
                }
            }
            state.add_token("]");
            return;
        };

        let mut cursor = span.start + 1;
        state.add_source(span.start, cursor);
        let mut any = false;
        for element in self.elements.iter().flatten() {
            let element_span = match element {
                ArrayElement::Expr(expr) => expr.span(),
                ArrayElement::Spread { span, .. } => Some(*span),
            };
            match element_span {
                Some(element_span) => {
                    state.add_source(cursor, element_span.start);
                    match element {
                        ArrayElement::Expr(expr) => expr.codegen(state),
                        ArrayElement::Spread { .. } => {
                            state.add_source(element_span.start, element_span.end)
                        }
                    }
                    cursor = element_span.end;
                }
                None => {
                    if any {
                        state.add_token(", ");
                    }
                    if let ArrayElement::Expr(expr) = element {
                        expr.codegen(state);
                    }
                }
            }
            any = true;
        }
        state.add_source(cursor, span.end);
    }
}
