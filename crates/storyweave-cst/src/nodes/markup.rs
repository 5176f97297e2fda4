// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Markup nodes for component files.
//!
//! Expressions inside markup (`{...}` attribute values, mustache tags and
//! block headers) are stored as spans. Callers that need the expression
//! parse it on demand with [`crate::parse_expression_at`], so markup the
//! pipeline never looks at is never parsed as script.

use storyweave_core::patch::Span;

use super::statement::Program;

/// Elements with no closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// A parsed component file.
#[derive(Debug, Clone, PartialEq)]
pub struct Root {
    pub span: Span,
    /// `<script module>` or `<script context="module">`.
    pub module_script: Option<Script>,
    /// The plain `<script>` element.
    pub instance_script: Option<Script>,
    /// Top-level nodes, scripts excluded.
    pub fragment: Vec<Node>,
}

/// A `<script>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    /// The whole element, tags included.
    pub span: Span,
    /// The opening `<script ...>` tag.
    pub open_span: Span,
    pub attributes: Vec<Attribute>,
    /// Text between the tags.
    pub content_span: Span,
    /// Parsed content; only module scripts are parsed.
    pub program: Option<Program>,
    pub is_module: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(Span),
    Comment(Span),
    /// `{expression}`; the span covers the braces, `expression` the inside.
    Mustache { span: Span, expression: Span },
    /// `{@html ...}`, `{@render ...}`, `{@const ...}`, `{@debug ...}`.
    Tag { span: Span, name: String, content: Span },
    Block(Block),
    Snippet(Snippet),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Element(element) => element.span,
            Node::Block(block) => block.span,
            Node::Snippet(snippet) => snippet.span,
            Node::Text(span) | Node::Comment(span) => *span,
            Node::Mustache { span, .. } | Node::Tag { span, .. } => *span,
        }
    }

    /// Returns true for text nodes made only of whitespace.
    pub fn is_whitespace(&self, src: &str) -> bool {
        match self {
            Node::Text(span) => span.slice(src).trim().is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub span: Span,
    pub name: String,
    /// The opening tag, `<` through `>` or `/>`.
    pub open_span: Span,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    /// The closing tag, absent for self-closing and void elements.
    pub close_span: Option<Span>,
}

impl Element {
    pub fn self_closing(&self) -> bool {
        self.close_span.is_none()
    }

    /// Attribute named `name`.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == Some(name))
    }

    /// Range between the opening and closing tags.
    pub fn inner_span(&self) -> Span {
        match self.close_span {
            Some(close) => Span::new(self.open_span.end, close.start),
            None => Span::empty_at(self.open_span.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub span: Span,
    pub kind: AttributeKind,
}

impl Attribute {
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Plain { name, .. } => Some(name),
            AttributeKind::Directive { name, .. } => Some(name),
            AttributeKind::Shorthand { name, .. } => Some(name),
            AttributeKind::Spread { .. } => None,
        }
    }

    pub fn value(&self) -> Option<&AttrValue> {
        match &self.kind {
            AttributeKind::Plain { value, .. } | AttributeKind::Directive { value, .. } => {
                Some(value)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    /// `name`, `name="text"`, `name={expr}`.
    Plain { name: String, value: AttrValue },
    /// `prefix:name` with an optional value (`let:args`, `on:click={...}`).
    Directive {
        name: String,
        prefix: String,
        local: String,
        value: AttrValue,
    },
    /// `{name}`.
    Shorthand { name: String, expression: Span },
    /// `{...expr}`.
    Spread { expression: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Bare attribute.
    True,
    /// Quoted or unquoted text with no expressions. The span covers the
    /// text only, quotes excluded.
    Text { span: Span },
    /// A single `{expr}`; `span` covers the braces, `expression` the inside.
    Expr { span: Span, expression: Span },
    /// Text interleaved with expressions, e.g. `"a {b} c"`.
    Mixed { span: Span },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    If,
    Each,
    Await,
    Key,
}

impl BlockKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Each => "each",
            BlockKind::Await => "await",
            BlockKind::Key => "key",
        }
    }
}

/// `{#if}`, `{#each}`, `{#await}` and `{#key}` blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub span: Span,
    pub kind: BlockKind,
    /// Text after the keyword in the opening tag.
    pub header: Span,
    /// One entry per branch (`{:else}`, `{:then}`, ...), in order.
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// The tag opening the branch; the block's opening tag for the first.
    pub tag: Span,
    pub children: Vec<Node>,
}

/// `{#snippet name(params)}...{/snippet}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    pub span: Span,
    pub name: String,
    pub name_span: Span,
    /// Text between the parameter parentheses, `None` without parentheses.
    pub params: Option<Span>,
    /// The `{#snippet ...}` opening tag.
    pub open_span: Span,
    /// Between the opening and closing tags.
    pub body_span: Span,
    pub children: Vec<Node>,
}
