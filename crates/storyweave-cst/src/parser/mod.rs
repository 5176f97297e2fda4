// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Entry points for parsing scripts, expressions and component files.

pub mod errors;
mod markup;
mod script;

pub use errors::{ParseError, ParseResult};
pub use markup::parse_component;
pub use script::unescape_string;

use storyweave_core::patch::Span;

use crate::nodes::{Expr, Program};
use crate::tokenizer::{tokenize, StopAt};
use script::ScriptParser;

/// Parse a whole buffer as a module.
pub fn parse_module(src: &str) -> ParseResult<Program> {
    parse_program(src, Span::new(0, src.len()))
}

/// Parse `range` of `src` as a module. Node spans are absolute offsets
/// into `src`.
pub fn parse_program(src: &str, range: Span) -> ParseResult<Program> {
    let stream = tokenize(src, range.start, range.end, StopAt::End)?;
    let comments = stream.comments.clone();
    let mut parser = ScriptParser::new(src, &stream, range.start);
    parser.parse_program(range, comments)
}

/// Parse the expression starting at `start` and ending at the first `}`
/// that closes nothing.
///
/// Returns the expression and the offset of that `}`.
pub fn parse_expression_at(src: &str, start: usize) -> ParseResult<(Expr, usize)> {
    let stream = tokenize(src, start, src.len(), StopAt::UnmatchedBrace)?;
    let end = stream.end;
    let mut parser = ScriptParser::new(src, &stream, start);
    let expr = parser.parse_expression()?;
    if !parser.is_eof() {
        return Err(ParseError::Unexpected {
            offset: parser.current_offset(),
            found: "trailing input".to_string(),
            expected: "'}'".to_string(),
        });
    }
    Ok((expr, end))
}

/// Parse exactly `range` of `src` as one expression.
pub fn parse_expression_range(src: &str, range: Span) -> ParseResult<Expr> {
    let stream = tokenize(src, range.start, range.end, StopAt::End)?;
    let mut parser = ScriptParser::new(src, &stream, range.start);
    let expr = parser.parse_expression()?;
    if !parser.is_eof() {
        return Err(ParseError::Unexpected {
            offset: parser.current_offset(),
            found: "trailing input".to_string(),
            expected: "end of expression".to_string(),
        });
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{ExportDefaultKind, FunctionBody, Pattern, Prop, Stmt};

    mod modules {
        use super::*;

        #[test]
        fn parses_imports_with_specifiers() {
            let src = r#"import Button, { defineMeta as dm, type Foo } from "@storyweave/csf";
import * as $ from 'svelte/internal/client';
import "./styles.css";"#;
            let program = parse_module(src).unwrap();
            assert_eq!(program.body.len(), 3);
            let Stmt::Import(first) = &program.body[0] else {
                panic!("expected import");
            };
            assert_eq!(first.source.value, "@storyweave/csf");
            assert_eq!(first.local_for("defineMeta"), Some("dm"));
            assert_eq!(first.specifiers.len(), 3);
            let Stmt::Import(third) = &program.body[2] else {
                panic!("expected import");
            };
            assert!(third.specifiers.is_empty());
        }

        #[test]
        fn skips_type_declarations() {
            let src = "type Args = { label: string } | null;\ninterface Props extends Base { x: number }\nconst a: Array<string> = [];\n";
            let program = parse_module(src).unwrap();
            assert!(matches!(program.body[0], Stmt::Other(_)));
            assert!(matches!(program.body[1], Stmt::Other(_)));
            assert!(program.body[2].as_var_decl().is_some());
        }

        #[test]
        fn parses_destructuring_declaration() {
            let src = "const { Story, meta: m } = defineMeta({ title: 'A' });";
            let program = parse_module(src).unwrap();
            let decl = program.body[0].as_var_decl().unwrap();
            let Pattern::Object(pattern) = &decl.declarators[0].name else {
                panic!("expected object pattern");
            };
            assert_eq!(pattern.binding_for("Story").unwrap().name, "Story");
            assert_eq!(pattern.binding_for("meta").unwrap().name, "m");
            let init = decl.declarators[0].init.as_ref().unwrap();
            let call = init.as_call().unwrap();
            assert_eq!(call.callee.as_ident().unwrap().name, "defineMeta");
        }

        #[test]
        fn recognizes_default_export_shapes() {
            let src = "export default function Entry($$anchor) { $.push(); }";
            let program = parse_module(src).unwrap();
            let Stmt::ExportDefault(export) = &program.body[0] else {
                panic!("expected default export");
            };
            let ExportDefaultKind::Function(function) = &export.kind else {
                panic!("expected function");
            };
            assert_eq!(function.name.as_ref().unwrap().name, "Entry");

            let program = parse_module("export default wrap(Entry, { a: 1 });").unwrap();
            let Stmt::ExportDefault(export) = &program.body[0] else {
                panic!("expected default export");
            };
            assert!(matches!(export.kind, ExportDefaultKind::Expr(_)));
        }

        #[test]
        fn automatic_semicolons() {
            let src = "let a = 1\nlet b = a\n++b\nreturn_value()";
            let program = parse_module(src).unwrap();
            assert_eq!(program.body.len(), 4);
        }

        #[test]
        fn opaque_classes_and_loops() {
            let src = "class A extends B { #x = 1; get y() { return this.#x } }\nfor (let i = 0; i < 3; i++) { f(i) }";
            let program = parse_module(src).unwrap();
            assert!(matches!(program.body[0], Stmt::Class(_)));
            assert!(matches!(program.body[1], Stmt::Loop(_)));
        }

        #[test]
        fn reports_error_offset() {
            let src = "const a = ;";
            let err = parse_module(src).unwrap_err();
            assert_eq!(err.offset(), 10);
        }
    }

    mod expressions {
        use super::*;

        #[test]
        fn arrow_functions() {
            let (expr, _) = parse_expression_at("(a, { b }) => a + b}", 0).unwrap();
            let Expr::Arrow(function) = expr else {
                panic!("expected arrow");
            };
            assert_eq!(function.params.len(), 2);
            assert!(matches!(function.body, FunctionBody::Expr(_)));

            let (expr, _) = parse_expression_at("async x => { await x }}", 0).unwrap();
            let Expr::Arrow(function) = expr else {
                panic!("expected arrow");
            };
            assert!(function.is_async);
        }

        #[test]
        fn typed_arrow_is_arrow() {
            let (expr, _) = parse_expression_at("(a: string): number => 1}", 0).unwrap();
            assert!(matches!(expr, Expr::Arrow(_)));
            let (expr, _) = parse_expression_at("(a) ? b : c}", 0).unwrap();
            assert!(matches!(expr, Expr::Conditional(_)));
        }

        #[test]
        fn object_members() {
            let src = "{ a, 'b-c': 1, [k]: 2, ...rest, m() {}, get g() { return { x: 1 } } }";
            let (expr, end) = parse_expression_at(&format!("{}}}", src), 0).unwrap();
            assert_eq!(end, src.len());
            let object = expr.as_object().unwrap();
            assert_eq!(object.props.len(), 6);
            assert!(matches!(&object.props[0], Prop::KeyValue(kv) if kv.shorthand));
            assert_eq!(object.props[1].static_name(), Some("b-c"));
            assert_eq!(object.props[2].static_name(), None);
            assert!(matches!(object.props[3], Prop::Spread(_)));
            assert!(matches!(object.props[5], Prop::Method(_)));
        }

        #[test]
        fn casts_and_non_null() {
            let src = "[a as const, b!, c satisfies Foo<Bar>]";
            let expr = parse_expression_range(src, Span::new(0, src.len())).unwrap();
            let array = expr.as_array().unwrap();
            assert_eq!(array.elements.len(), 3);
        }

        #[test]
        fn optional_chains_and_calls() {
            let src = "$$props.children?.($$anchor) ?? x?.[0]";
            let expr = parse_expression_range(src, Span::new(0, src.len())).unwrap();
            assert!(matches!(expr, Expr::Binary(_)));
        }

        #[test]
        fn trailing_input_is_rejected() {
            let src = "a b";
            assert!(parse_expression_range(src, Span::new(0, src.len())).is_err());
        }

        #[test]
        fn expression_at_offset() {
            let src = "<Story args={{ a: 1 }} />";
            let start = src.find("{{").unwrap() + 1;
            let (expr, end) = parse_expression_at(src, start).unwrap();
            assert!(expr.as_object().is_some());
            assert_eq!(&src[end..end + 1], "}");
            assert_eq!(end, src.find("} />").unwrap());
        }
    }

    mod strings {
        use super::*;

        #[test]
        fn unescapes() {
            assert_eq!(unescape_string(r#""a\nb""#), "a\nb");
            assert_eq!(unescape_string(r"'it\'s'"), "it's");
            assert_eq!(unescape_string(r#""A\x42\u{1F600}""#), "AB\u{1F600}");
            assert_eq!(unescape_string(r#""\uD83D\uDE00""#), "\u{1F600}");
        }
    }
}
