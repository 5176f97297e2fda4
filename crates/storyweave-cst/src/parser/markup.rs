// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Component-file markup parser.
//!
//! Produces a [`Root`] whose markup nodes keep the spans of their embedded
//! expressions. Expression boundaries are found by tokenizing up to the
//! first unmatched `}`, so braces inside strings, templates and comments
//! never end an expression early. Only the module script is parsed.

use memchr::{memchr2, memmem};
use storyweave_core::patch::Span;

use super::errors::{ParseError, ParseResult};
use super::parse_program;
use crate::nodes::{
    AttrValue, Attribute, AttributeKind, BlockKind, Branch, Element, MarkupBlock, Node, Root,
    Script, Snippet, VOID_ELEMENTS,
};
use crate::tokenizer::{tokenize, StopAt};

/// Elements whose content is raw text.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Parse a component file.
pub fn parse_component(src: &str) -> ParseResult<Root> {
    let mut parser = MarkupParser { src, pos: 0 };
    let nodes = parser.parse_nodes(&Parent::Root)?;

    let mut module_script = None;
    let mut instance_script = None;
    let mut fragment = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Element(element) if element.name == "script" => {
                let script = into_script(src, element)?;
                let slot = if script.is_module {
                    &mut module_script
                } else {
                    &mut instance_script
                };
                if slot.is_some() {
                    return Err(ParseError::Unexpected {
                        offset: script.span.start,
                        found: "a second <script> element".to_string(),
                        expected: "one script of each kind".to_string(),
                    });
                }
                *slot = Some(script);
            }
            other => fragment.push(other),
        }
    }

    Ok(Root {
        span: Span::new(0, src.len()),
        module_script,
        instance_script,
        fragment,
    })
}

fn into_script(src: &str, element: Element) -> ParseResult<Script> {
    let is_module = element.attributes.iter().any(|attr| match &attr.kind {
        AttributeKind::Plain { name, value } => {
            name == "module"
                || (name == "context"
                    && matches!(value, AttrValue::Text { span } if span.slice(src) == "module"))
        }
        _ => false,
    });
    let content_span = element.inner_span();
    let program = if is_module {
        Some(parse_program(src, content_span)?)
    } else {
        None
    };
    Ok(Script {
        span: element.span,
        open_span: element.open_span,
        attributes: element.attributes,
        content_span,
        program,
        is_module,
    })
}

/// What closes the node list being parsed.
enum Parent<'a> {
    Root,
    Element { name: &'a str, offset: usize },
    Block { keyword: &'a str, offset: usize },
}

struct MarkupParser<'src> {
    src: &'src str,
    pos: usize,
}

impl<'src> MarkupParser<'src> {
    fn rest(&self) -> &'src str {
        &self.src[self.pos..]
    }

    fn at(&self, text: &str) -> bool {
        self.rest().starts_with(text)
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(offset).copied()
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn expect(&mut self, text: &str) -> ParseResult<()> {
        if self.at(text) {
            self.pos += text.len();
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", text)))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.rest().chars().next() {
            Some(ch) => ParseError::Unexpected {
                offset: self.pos,
                found: format!("{:?}", ch),
                expected: expected.to_string(),
            },
            None => ParseError::UnexpectedEof {
                offset: self.pos,
                expected: expected.to_string(),
            },
        }
    }

    /// Offset of the `}` closing an expression that starts at `start`.
    fn brace_end(&self, start: usize) -> ParseResult<usize> {
        Ok(tokenize(self.src, start, self.src.len(), StopAt::UnmatchedBrace)?.end)
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> Span {
        let start = self.pos;
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        Span::new(start, self.pos)
    }

    /// A `<` at `offset` opens a tag, a closing tag or a comment.
    fn starts_tag(&self, offset: usize) -> bool {
        matches!(self.byte_at(offset + 1), Some(b) if b.is_ascii_alphabetic() || b == b'/' || b == b'!')
    }

    // ========================================================================
    // Node lists
    // ========================================================================

    fn parse_nodes(&mut self, parent: &Parent<'_>) -> ParseResult<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            if self.pos >= self.src.len() {
                return match parent {
                    Parent::Root => Ok(nodes),
                    Parent::Element { name, offset } => Err(ParseError::UnclosedElement {
                        offset: *offset,
                        name: name.to_string(),
                    }),
                    Parent::Block { keyword, offset } => Err(ParseError::UnclosedBlock {
                        offset: *offset,
                        kind: keyword.to_string(),
                    }),
                };
            }

            if self.at("</") {
                if matches!(parent, Parent::Element { .. }) {
                    return Ok(nodes);
                }
                return Err(self.unexpected("content"));
            }
            if self.at("{:") || self.at("{/") {
                if matches!(parent, Parent::Block { .. }) {
                    return Ok(nodes);
                }
                return Err(self.unexpected("content"));
            }

            let node = if self.at("<!--") {
                self.parse_comment()?
            } else if self.at("<") && self.starts_tag(self.pos) {
                Node::Element(self.parse_element()?)
            } else if self.at("{#") {
                self.parse_block()?
            } else if self.at("{@") {
                self.parse_tag()?
            } else if self.at("{") {
                let start = self.pos;
                let end = self.brace_end(start + 1)?;
                self.pos = end + 1;
                Node::Mustache {
                    span: Span::new(start, self.pos),
                    expression: Span::new(start + 1, end),
                }
            } else {
                self.parse_text()
            };
            nodes.push(node);
        }
    }

    fn parse_text(&mut self) -> Node {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut cursor = self.pos;
        loop {
            match memchr2(b'<', b'{', &bytes[cursor..]) {
                Some(index) => {
                    let found = cursor + index;
                    if bytes[found] == b'<' && !self.starts_tag(found) {
                        cursor = found + 1;
                        continue;
                    }
                    // a text node always makes progress
                    cursor = if found == start { found + 1 } else { found };
                    break;
                }
                None => {
                    cursor = bytes.len();
                    break;
                }
            }
        }
        self.pos = cursor;
        Node::Text(Span::new(start, cursor))
    }

    fn parse_comment(&mut self) -> ParseResult<Node> {
        let start = self.pos;
        let Some(index) = memmem::find(self.rest().as_bytes(), b"-->") else {
            return Err(ParseError::UnexpectedEof {
                offset: start,
                expected: "'-->'".to_string(),
            });
        };
        self.pos += index + 3;
        Ok(Node::Comment(Span::new(start, self.pos)))
    }

    // ========================================================================
    // Elements
    // ========================================================================

    fn parse_element(&mut self) -> ParseResult<Element> {
        let start = self.pos;
        self.expect("<")?;
        let name_span = self.read_while(|c| c.is_alphanumeric() || matches!(c, ':' | '.' | '-' | '_'));
        let name = name_span.slice(self.src).to_string();
        let attributes = self.parse_attributes(&name, start)?;
        let self_closing = self.at("/>");
        self.pos += if self_closing { 2 } else { 1 };
        let open_span = Span::new(start, self.pos);

        if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            return Ok(Element {
                span: open_span,
                name,
                open_span,
                attributes,
                children: Vec::new(),
                close_span: None,
            });
        }

        let children = if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            let needle = format!("</{}", name);
            let Some(index) = memmem::find(self.rest().as_bytes(), needle.as_bytes()) else {
                return Err(ParseError::UnclosedElement { offset: start, name });
            };
            let text = Span::new(self.pos, self.pos + index);
            self.pos = text.end;
            if text.is_empty() {
                Vec::new()
            } else {
                vec![Node::Text(text)]
            }
        } else {
            self.parse_nodes(&Parent::Element {
                name: &name,
                offset: start,
            })?
        };

        let close_start = self.pos;
        self.expect("</")?;
        let close_name = self.read_while(|c| !c.is_whitespace() && c != '>');
        if close_name.slice(self.src) != name {
            return Err(ParseError::MismatchedTag {
                offset: close_start,
                found: close_name.slice(self.src).to_string(),
                expected: name,
            });
        }
        self.skip_whitespace();
        self.expect(">")?;

        Ok(Element {
            span: Span::new(start, self.pos),
            name,
            open_span,
            attributes,
            children,
            close_span: Some(Span::new(close_start, self.pos)),
        })
    }

    fn parse_attributes(&mut self, element: &str, element_start: usize) -> ParseResult<Vec<Attribute>> {
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            if self.at(">") || self.at("/>") {
                return Ok(attributes);
            }
            if self.pos >= self.src.len() {
                return Err(ParseError::UnclosedElement {
                    offset: element_start,
                    name: element.to_string(),
                });
            }

            let start = self.pos;
            let kind = if self.at("{") {
                let end = self.brace_end(start + 1)?;
                self.pos = end + 1;
                let inner = Span::new(start + 1, end);
                let text = inner.slice(self.src).trim_start();
                if let Some(spread) = text.strip_prefix("...") {
                    AttributeKind::Spread {
                        expression: Span::new(end - spread.len(), end),
                    }
                } else {
                    AttributeKind::Shorthand {
                        name: text.trim().to_string(),
                        expression: inner,
                    }
                }
            } else {
                let name_span = self.read_while(|c| {
                    !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\'' | '{' | '}')
                });
                if name_span.is_empty() {
                    return Err(self.unexpected("attribute name"));
                }
                let name = name_span.slice(self.src).to_string();
                let value = if self.at("=") {
                    self.pos += 1;
                    self.parse_attr_value()?
                } else {
                    AttrValue::True
                };
                match name.split_once(':') {
                    Some((prefix, local)) => AttributeKind::Directive {
                        prefix: prefix.to_string(),
                        local: local.to_string(),
                        name,
                        value,
                    },
                    None => AttributeKind::Plain { name, value },
                }
            };
            attributes.push(Attribute {
                span: Span::new(start, self.pos),
                kind,
            });
        }
    }

    fn parse_attr_value(&mut self) -> ParseResult<AttrValue> {
        if self.at("{") {
            let start = self.pos;
            let end = self.brace_end(start + 1)?;
            self.pos = end + 1;
            return Ok(AttrValue::Expr {
                span: Span::new(start, self.pos),
                expression: Span::new(start + 1, end),
            });
        }

        let quote = match self.byte_at(self.pos) {
            Some(q @ (b'"' | b'\'')) => Some(q),
            _ => None,
        };
        let Some(quote) = quote else {
            let span = self.read_while(|c| !c.is_whitespace() && c != '>' && c != '/');
            return Ok(AttrValue::Text { span });
        };

        let content_start = self.pos + 1;
        let mut cursor = content_start;
        let mut expressions = Vec::new();
        let bytes = self.src.as_bytes();
        loop {
            match bytes.get(cursor) {
                None => {
                    return Err(ParseError::UnexpectedEof {
                        offset: self.pos,
                        expected: "closing quote".to_string(),
                    })
                }
                Some(&b) if b == quote => break,
                Some(b'{') => {
                    let end = self.brace_end(cursor + 1)?;
                    expressions.push(Span::new(cursor, end + 1));
                    cursor = end + 1;
                }
                Some(_) => cursor += 1,
            }
        }
        let content = Span::new(content_start, cursor);
        self.pos = cursor + 1;

        Ok(match expressions.as_slice() {
            [] => AttrValue::Text { span: content },
            [only] if *only == content => AttrValue::Expr {
                span: *only,
                expression: Span::new(only.start + 1, only.end - 1),
            },
            _ => AttrValue::Mixed { span: content },
        })
    }

    // ========================================================================
    // Blocks, snippets and tags
    // ========================================================================

    fn parse_block(&mut self) -> ParseResult<Node> {
        let start = self.pos;
        self.expect("{#")?;
        let keyword = self.read_while(|c| c.is_ascii_alphabetic()).slice(self.src);
        if keyword == "snippet" {
            return self.parse_snippet(start).map(Node::Snippet);
        }
        let kind = match keyword {
            "if" => BlockKind::If,
            "each" => BlockKind::Each,
            "await" => BlockKind::Await,
            "key" => BlockKind::Key,
            _ => {
                return Err(ParseError::Unexpected {
                    offset: start,
                    found: format!("{{#{}", keyword),
                    expected: "a block keyword".to_string(),
                })
            }
        };

        let header_end = self.brace_end(self.pos)?;
        let header = trimmed(self.src, Span::new(self.pos, header_end));
        self.pos = header_end + 1;

        let mut tag = Span::new(start, self.pos);
        let mut branches = Vec::new();
        loop {
            let children = self.parse_nodes(&Parent::Block {
                keyword,
                offset: start,
            })?;
            branches.push(Branch { tag, children });
            let tag_start = self.pos;
            let tag_end = self.brace_end(tag_start + 2)?;
            self.pos = tag_end + 1;
            tag = Span::new(tag_start, self.pos);
            if self.src[tag_start..].starts_with("{/") {
                let closing = self.src[tag_start + 2..tag_end].trim();
                if closing != keyword {
                    return Err(ParseError::MismatchedTag {
                        offset: tag_start,
                        found: closing.to_string(),
                        expected: keyword.to_string(),
                    });
                }
                break;
            }
        }

        Ok(Node::Block(MarkupBlock {
            span: Span::new(start, self.pos),
            kind,
            header,
            branches,
        }))
    }

    fn parse_snippet(&mut self, start: usize) -> ParseResult<Snippet> {
        self.skip_whitespace();
        let name_span = self.read_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
        if name_span.is_empty() {
            return Err(self.unexpected("snippet name"));
        }
        let header_end = self.brace_end(self.pos)?;
        let rest = &self.src[self.pos..header_end];
        let params = match (rest.find('('), rest.rfind(')')) {
            (Some(open), Some(close)) if open < close => {
                Some(Span::new(self.pos + open + 1, self.pos + close))
            }
            _ => None,
        };
        self.pos = header_end + 1;
        let open_span = Span::new(start, self.pos);

        let children = self.parse_nodes(&Parent::Block {
            keyword: "snippet",
            offset: start,
        })?;
        let body_span = Span::new(open_span.end, self.pos);
        if !self.at("{/") {
            return Err(self.unexpected("'{/snippet}'"));
        }
        let close_end = self.brace_end(self.pos + 2)?;
        let closing = self.src[self.pos + 2..close_end].trim();
        if closing != "snippet" {
            return Err(ParseError::MismatchedTag {
                offset: self.pos,
                found: closing.to_string(),
                expected: "snippet".to_string(),
            });
        }
        self.pos = close_end + 1;

        Ok(Snippet {
            span: Span::new(start, self.pos),
            name: name_span.slice(self.src).to_string(),
            name_span,
            params,
            open_span,
            body_span,
            children,
        })
    }

    fn parse_tag(&mut self) -> ParseResult<Node> {
        let start = self.pos;
        self.expect("{@")?;
        let name = self.read_while(|c| c.is_ascii_alphabetic()).slice(self.src).to_string();
        let end = self.brace_end(self.pos)?;
        let content = trimmed(self.src, Span::new(self.pos, end));
        self.pos = end + 1;
        Ok(Node::Tag {
            span: Span::new(start, self.pos),
            name,
            content,
        })
    }
}

/// `span` without its leading and trailing whitespace.
fn trimmed(src: &str, span: Span) -> Span {
    let text = span.slice(src);
    let leading = text.len() - text.trim_start().len();
    let trailing = text.len() - text.trim_end().len();
    if leading == text.len() {
        return Span::empty_at(span.start);
    }
    Span::new(span.start + leading, span.end - trailing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &Node) -> &Element {
        match node {
            Node::Element(element) => element,
            other => panic!("expected element, got {:?}", other),
        }
    }

    mod scripts {
        use super::*;

        #[test]
        fn splits_module_and_instance_scripts() {
            let src = r#"<script module>
  import { defineMeta } from "@storyweave/csf";
  const { Story } = defineMeta({ title: "A" });
</script>

<script lang="ts">
  let count: number = $state(0);
</script>

<Story name="Primary" />"#;
            let root = parse_component(src).unwrap();
            let module = root.module_script.as_ref().unwrap();
            assert!(module.is_module);
            assert_eq!(module.program.as_ref().unwrap().body.len(), 2);
            let instance = root.instance_script.as_ref().unwrap();
            assert!(instance.program.is_none());
            let story = root
                .fragment
                .iter()
                .find(|n| matches!(n, Node::Element(_)))
                .unwrap();
            assert_eq!(element(story).name, "Story");
        }

        #[test]
        fn context_module_attribute() {
            let src = "<script context=\"module\">export const meta = {};</script>";
            let root = parse_component(src).unwrap();
            assert!(root.module_script.is_some());
            assert!(root.instance_script.is_none());
        }

        #[test]
        fn raw_text_is_not_markup() {
            let src = "<style>.a > .b { color: red }</style><div>x</div>";
            let root = parse_component(src).unwrap();
            assert_eq!(root.fragment.len(), 2);
            let style = element(&root.fragment[0]);
            assert!(matches!(style.children[..], [Node::Text(_)]));
        }
    }

    mod attributes {
        use super::*;

        #[test]
        fn attribute_kinds() {
            let src = r#"<Story name="Primary" args={{ label: "}" }} {...rest} {tags} asChild let:args on:click|once={go} title="a {b} c" />"#;
            let root = parse_component(src).unwrap();
            let story = element(&root.fragment[0]);
            assert!(story.self_closing());
            assert_eq!(story.attributes.len(), 8);

            let Some(AttrValue::Text { span }) = story.attribute("name").and_then(|a| a.value()) else {
                panic!("expected text value");
            };
            assert_eq!(span.slice(src), "Primary");

            let Some(AttrValue::Expr { expression, .. }) =
                story.attribute("args").and_then(|a| a.value())
            else {
                panic!("expected expression value");
            };
            assert_eq!(expression.slice(src), r#"{ label: "}" }"#);

            assert!(matches!(story.attributes[2].kind, AttributeKind::Spread { .. }));
            assert!(matches!(&story.attributes[3].kind, AttributeKind::Shorthand { name, .. } if name == "tags"));
            assert!(matches!(story.attribute("asChild").unwrap().value(), Some(AttrValue::True)));
            assert!(matches!(&story.attributes[5].kind, AttributeKind::Directive { prefix, local, .. } if prefix == "let" && local == "args"));
            assert!(matches!(story.attribute("title").unwrap().value(), Some(AttrValue::Mixed { .. })));
        }

        #[test]
        fn quoted_single_expression_is_expression() {
            let src = r#"<Story template="{sample}" />"#;
            let root = parse_component(src).unwrap();
            let story = element(&root.fragment[0]);
            let Some(AttrValue::Expr { expression, .. }) = story.attribute("template").unwrap().value() else {
                panic!("expected expression");
            };
            assert_eq!(expression.slice(src), "sample");
        }
    }

    mod blocks {
        use super::*;

        #[test]
        fn snippets_and_blocks() {
            let src = r#"{#snippet template(args: Args, context)}
  {#if args.show}<b>{args.label}</b>{:else}none{/if}
{/snippet}"#;
            let root = parse_component(src).unwrap();
            let Node::Snippet(snippet) = &root.fragment[0] else {
                panic!("expected snippet");
            };
            assert_eq!(snippet.name, "template");
            assert_eq!(snippet.params.unwrap().slice(src), "args: Args, context");
            assert!(snippet.body_span.slice(src).contains("{#if"));
            let block = snippet
                .children
                .iter()
                .find_map(|n| match n {
                    Node::Block(b) => Some(b),
                    _ => None,
                })
                .unwrap();
            assert_eq!(block.kind, BlockKind::If);
            assert_eq!(block.header.slice(src), "args.show");
            assert_eq!(block.branches.len(), 2);
        }

        #[test]
        fn tags_and_comments() {
            let src = "<!-- Docs -->\n{@render children()}\na < b";
            let root = parse_component(src).unwrap();
            assert!(matches!(root.fragment[0], Node::Comment(_)));
            assert!(matches!(&root.fragment[2], Node::Tag { name, .. } if name == "render"));
            assert!(matches!(root.fragment.last(), Some(Node::Text(_))));
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn mismatched_tag() {
            let err = parse_component("<div><span></div>").unwrap_err();
            assert!(matches!(err, ParseError::MismatchedTag { .. }));
        }

        #[test]
        fn unclosed_block() {
            let err = parse_component("{#if a}<p>x</p>").unwrap_err();
            assert!(matches!(err, ParseError::UnclosedBlock { offset: 0, .. }));
        }

        #[test]
        fn unclosed_element() {
            let err = parse_component("<div>").unwrap_err();
            assert!(matches!(err, ParseError::UnclosedElement { .. }));
        }
    }
}
