// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Recursive-descent parser for module scripts and lowered output.
//!
//! The parser covers the JavaScript that story files and compiled
//! components contain. TypeScript annotations are tolerated: type-only
//! declarations become [`Stmt::Other`], and annotations, `as`/`satisfies`
//! casts and type parameter lists are skipped without validation. Class
//! bodies and loop headers are kept opaque.

use storyweave_core::patch::Span;

use super::errors::{ParseError, ParseResult};
use crate::nodes::{
    Argument, ArrayElement, ArrayLit, ArrayPattern, AssignExpr, BinaryExpr, Block, BoolLit,
    CallExpr, ClassDecl, ConditionalExpr, ExportDecl, ExportDefault, ExportDefaultKind,
    ExportNamed, ExportSpecifier, Expr, Function, FunctionBody, FunctionDecl, Ident, IfStmt,
    ImportDecl, ImportKind, ImportSpecifier, KeyValueProp, LoopStmt, MemberExpr, MemberProp,
    MethodKind, MethodProp, NewExpr, NumLit, ObjectLit, ObjectPattern, ObjectPatternProp,
    Pattern, Program, Prop, PropKey, SpreadProp, Stmt, StrLit, SwitchCase, SwitchStmt,
    TaggedTemplate, TryStmt, TypeCastExpr, UnaryExpr, VarDecl, VarDeclarator, VarKind,
};
use crate::tokenizer::{TokKind, Token, TokenStream};

const ASSIGN_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "**=", "<<=", ">>=", ">>>=", "&=", "|=", "^=", "&&=",
    "||=", "??=",
];

const PREFIX_OPS: &[&str] = &["!", "-", "+", "~", "++", "--"];

const PREFIX_WORDS: &[&str] = &["typeof", "void", "delete", "await"];

/// Binding power of a binary operator.
fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "??" => 1,
        "||" => 2,
        "&&" => 3,
        "|" => 4,
        "^" => 5,
        "&" => 6,
        "==" | "!=" | "===" | "!==" => 7,
        "<" | ">" | "<=" | ">=" | "instanceof" | "in" => 8,
        "<<" | ">>" | ">>>" => 9,
        "+" | "-" => 10,
        "*" | "/" | "%" => 11,
        "**" => 12,
        _ => return None,
    })
}

/// Precedence at which `as`/`satisfies` casts bind.
const CAST_PRECEDENCE: u8 = 8;

pub(crate) struct ScriptParser<'src> {
    src: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    prev_end: usize,
    /// End of the parsed range, used for end-of-input errors.
    end: usize,
}

impl<'src> ScriptParser<'src> {
    pub(crate) fn new(src: &'src str, stream: &TokenStream, start: usize) -> Self {
        ScriptParser {
            src,
            tokens: stream.tokens.clone(),
            pos: 0,
            prev_end: start,
            end: stream.end,
        }
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    /// Start of the current token, or the range end.
    pub(crate) fn current_offset(&self) -> usize {
        self.cur_start()
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_nth(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.pos + n).copied()
    }

    fn text(&self, tok: &Token) -> &'src str {
        &self.src[tok.span.start..tok.span.end]
    }

    fn nth_text(&self, n: usize) -> &'src str {
        self.peek_nth(n).map(|t| self.text(&t)).unwrap_or("")
    }

    fn nth_kind(&self, n: usize) -> Option<TokKind> {
        self.peek_nth(n).map(|t| t.kind)
    }

    fn nth_newline(&self, n: usize) -> bool {
        self.peek_nth(n).is_some_and(|t| t.newline_before)
    }

    /// Current token is the punctuator or word `text`.
    fn at(&self, text: &str) -> bool {
        self.nth_is(0, text)
    }

    fn nth_is(&self, n: usize, text: &str) -> bool {
        match self.peek_nth(n) {
            Some(tok) => {
                matches!(tok.kind, TokKind::Punct | TokKind::Ident) && self.text(&tok) == text
            }
            None => false,
        }
    }

    fn at_kind(&self, kind: TokKind) -> bool {
        self.nth_kind(0) == Some(kind)
    }

    fn cur_start(&self) -> usize {
        self.peek().map(|t| t.span.start).unwrap_or(self.end)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn bump(&mut self) -> ParseResult<Token> {
        let tok = self.peek().ok_or(ParseError::UnexpectedEof {
            offset: self.end,
            expected: "more input".to_string(),
        })?;
        self.pos += 1;
        self.prev_end = tok.span.end;
        Ok(tok)
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.pos += 1;
            self.prev_end = self.tokens[self.pos - 1].span.end;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> ParseResult<Token> {
        if self.at(text) {
            self.bump()
        } else {
            self.unexpected(&format!("'{}'", text))
        }
    }

    fn unexpected<T>(&self, expected: &str) -> ParseResult<T> {
        match self.peek() {
            Some(tok) => Err(ParseError::Unexpected {
                offset: tok.span.start,
                found: format!("'{}'", self.text(&tok)),
                expected: expected.to_string(),
            }),
            None => Err(ParseError::UnexpectedEof {
                offset: self.end,
                expected: expected.to_string(),
            }),
        }
    }

    fn save(&self) -> (usize, usize) {
        (self.pos, self.prev_end)
    }

    fn restore(&mut self, saved: (usize, usize)) {
        self.pos = saved.0;
        self.prev_end = saved.1;
    }

    fn at_statement_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(tok) => tok.newline_before || self.at(";") || self.at("}"),
        }
    }

    fn consume_semicolon(&mut self) -> ParseResult<()> {
        if self.eat(";") || self.at_statement_end() {
            Ok(())
        } else {
            self.unexpected("';'")
        }
    }

    fn ident(&mut self) -> ParseResult<Ident> {
        match self.peek() {
            Some(tok) if matches!(tok.kind, TokKind::Ident | TokKind::PrivateName) => {
                self.bump()?;
                Ok(Ident {
                    span: Some(tok.span),
                    name: self.text(&tok).to_string(),
                })
            }
            _ => self.unexpected("identifier"),
        }
    }

    fn string_literal(&mut self) -> ParseResult<StrLit> {
        match self.peek() {
            Some(tok) if tok.kind == TokKind::Str => {
                self.bump()?;
                Ok(StrLit {
                    span: Some(tok.span),
                    value: unescape_string(self.text(&tok)),
                })
            }
            _ => self.unexpected("string literal"),
        }
    }

    /// Index of the token closing the bracket at `open`.
    fn find_matching(&self, open: usize) -> Option<usize> {
        let mut stack: Vec<&str> = Vec::new();
        for (i, tok) in self.tokens.iter().enumerate().skip(open) {
            if tok.kind != TokKind::Punct {
                continue;
            }
            match self.text(tok) {
                "(" => stack.push(")"),
                "[" => stack.push("]"),
                "{" => stack.push("}"),
                close @ (")" | "]" | "}") => {
                    if stack.pop() != Some(close) {
                        return None;
                    }
                    if stack.is_empty() {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Skip one token, or a whole bracketed group when at an opener.
    fn skip_balanced_one(&mut self) -> ParseResult<()> {
        let Some(tok) = self.peek() else {
            return self.unexpected("more input");
        };
        let close = match (tok.kind, self.text(&tok)) {
            (TokKind::Punct, "(") => ")",
            (TokKind::Punct, "[") => "]",
            (TokKind::Punct, "{") => "}",
            _ => {
                self.bump()?;
                return Ok(());
            }
        };
        self.bump()?;
        let mut stack = vec![close];
        while let Some(&expected) = stack.last() {
            let Some(tok) = self.peek() else {
                return self.unexpected(&format!("'{}'", expected));
            };
            if tok.kind == TokKind::Punct {
                match self.text(&tok) {
                    "(" => stack.push(")"),
                    "[" => stack.push("]"),
                    "{" => stack.push("}"),
                    close @ (")" | "]" | "}") => {
                        if close != expected {
                            return self.unexpected(&format!("'{}'", expected));
                        }
                        stack.pop();
                    }
                    _ => {}
                }
            }
            self.bump()?;
        }
        Ok(())
    }

    // ========================================================================
    // TypeScript tolerance
    // ========================================================================

    /// Skip a `<...>` type argument or parameter list.
    fn skip_angle(&mut self) -> ParseResult<()> {
        let mut depth = 0i32;
        loop {
            let Some(tok) = self.peek() else {
                return self.unexpected("'>'");
            };
            match self.text(&tok) {
                "(" | "[" | "{" if tok.kind == TokKind::Punct => {
                    self.skip_balanced_one()?;
                    continue;
                }
                "<" => depth += 1,
                ">" => depth -= 1,
                ">>" => depth -= 2,
                ">>>" => depth -= 3,
                ";" => return self.unexpected("'>'"),
                _ => {}
            }
            self.bump()?;
            if depth <= 0 {
                return Ok(());
            }
        }
    }

    /// Skip a type expression.
    fn skip_type(&mut self) -> ParseResult<()> {
        let mut open_conditionals = 0usize;
        loop {
            while self.at("keyof")
                || self.at("typeof")
                || self.at("readonly")
                || self.at("unique")
                || self.at("infer")
                || self.at("|")
                || self.at("&")
                || self.at("-")
                || self.at("new")
            {
                self.bump()?;
            }
            let group = self.at("(");
            match self.peek() {
                None => return self.unexpected("type"),
                Some(tok) => match (tok.kind, self.text(&tok)) {
                    (TokKind::Punct, "(" | "[" | "{") => self.skip_balanced_one()?,
                    (TokKind::Punct, "<") => self.skip_angle()?,
                    (TokKind::Ident | TokKind::Str | TokKind::Num | TokKind::Template, _) => {
                        self.bump()?;
                    }
                    _ => return self.unexpected("type"),
                },
            }
            loop {
                if self.at(".") && self.nth_kind(1) == Some(TokKind::Ident) {
                    self.bump()?;
                    self.bump()?;
                } else if self.at("<") && !self.nth_newline(0) {
                    self.skip_angle()?;
                } else if self.at("[") && !self.nth_newline(0) {
                    self.skip_balanced_one()?;
                } else {
                    break;
                }
            }
            if self.at("|") || self.at("&") || (group && self.at("=>")) {
                self.bump()?;
                continue;
            }
            if (self.at("extends") || self.at("is")) && !self.nth_newline(0) {
                if self.at("extends") {
                    open_conditionals += 1;
                }
                self.bump()?;
                continue;
            }
            if open_conditionals > 0 && (self.at("?") || self.at(":")) {
                if self.at(":") {
                    open_conditionals -= 1;
                }
                self.bump()?;
                continue;
            }
            return Ok(());
        }
    }

    fn skip_decorators(&mut self) -> ParseResult<()> {
        while self.eat("@") {
            self.parse_call_member()?;
        }
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub(crate) fn parse_program(
        &mut self,
        span: Span,
        comments: Vec<crate::tokenizer::Comment>,
    ) -> ParseResult<Program> {
        let mut body = Vec::new();
        while !self.is_eof() {
            body.push(self.parse_statement()?);
        }
        Ok(Program {
            span,
            body,
            comments,
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.cur_start();
        let Some(tok) = self.peek() else {
            return self.unexpected("statement");
        };
        let text = self.text(&tok);

        if tok.kind == TokKind::Punct {
            match text {
                "{" => return Ok(Stmt::Block(self.parse_block()?)),
                ";" => {
                    self.bump()?;
                    return Ok(Stmt::Empty(self.span_from(start)));
                }
                "@" => {
                    self.skip_decorators()?;
                    return self.parse_statement();
                }
                _ => {}
            }
        }

        if tok.kind == TokKind::Ident {
            let next_is_name = self.nth_kind(1) == Some(TokKind::Ident) && !self.nth_newline(1);
            match text {
                "import" if !self.nth_is(1, "(") && !self.nth_is(1, ".") => {
                    return self.parse_import();
                }
                "export" => return self.parse_export(),
                "const" if self.nth_is(1, "enum") => {
                    self.bump()?;
                    return self.skip_enum(start);
                }
                "var" | "const" => return Ok(Stmt::Var(self.parse_var_decl()?)),
                "let" if matches!(self.nth_kind(1), Some(TokKind::Ident))
                    || self.nth_is(1, "[")
                    || self.nth_is(1, "{") =>
                {
                    return Ok(Stmt::Var(self.parse_var_decl()?));
                }
                "function" => return self.parse_function_decl(),
                "async" if self.nth_is(1, "function") && !self.nth_newline(1) => {
                    return self.parse_function_decl();
                }
                "class" => return Ok(Stmt::Class(self.parse_class()?)),
                "abstract" if self.nth_is(1, "class") => {
                    self.bump()?;
                    let class = self.parse_class()?;
                    return Ok(Stmt::Class(ClassDecl {
                        span: self.span_from(start),
                        name: class.name,
                    }));
                }
                "if" => return self.parse_if(),
                "for" | "while" => {
                    self.bump()?;
                    self.eat("await");
                    let header_start = self.cur_start();
                    self.skip_balanced_one()?;
                    let header = self.span_from(header_start);
                    let body = self.parse_statement()?;
                    return Ok(Stmt::Loop(LoopStmt {
                        span: self.span_from(start),
                        header,
                        body: Box::new(body),
                    }));
                }
                "do" => {
                    self.bump()?;
                    let body = self.parse_statement()?;
                    self.expect("while")?;
                    let header_start = self.cur_start();
                    self.skip_balanced_one()?;
                    let header = self.span_from(header_start);
                    self.eat(";");
                    return Ok(Stmt::Loop(LoopStmt {
                        span: self.span_from(start),
                        header,
                        body: Box::new(body),
                    }));
                }
                "return" => {
                    self.bump()?;
                    let arg = if self.at_statement_end() {
                        None
                    } else {
                        Some(self.parse_expression()?)
                    };
                    self.consume_semicolon()?;
                    return Ok(Stmt::Return {
                        span: self.span_from(start),
                        arg,
                    });
                }
                "throw" => {
                    self.bump()?;
                    let arg = self.parse_expression()?;
                    self.consume_semicolon()?;
                    return Ok(Stmt::Throw {
                        span: self.span_from(start),
                        arg,
                    });
                }
                "try" => return self.parse_try(),
                "switch" => return self.parse_switch(),
                "break" | "continue" => {
                    self.bump()?;
                    if next_is_name {
                        self.bump()?;
                    }
                    self.consume_semicolon()?;
                    return Ok(Stmt::Other(self.span_from(start)));
                }
                "debugger" => {
                    self.bump()?;
                    self.consume_semicolon()?;
                    return Ok(Stmt::Other(self.span_from(start)));
                }
                "type" if next_is_name => {
                    self.bump()?;
                    self.bump()?;
                    if self.at("<") {
                        self.skip_angle()?;
                    }
                    self.expect("=")?;
                    self.skip_type()?;
                    self.consume_semicolon()?;
                    return Ok(Stmt::Other(self.span_from(start)));
                }
                "interface" if next_is_name => {
                    self.bump()?;
                    self.bump()?;
                    if self.at("<") {
                        self.skip_angle()?;
                    }
                    while !self.at("{") {
                        if self.is_eof() {
                            return self.unexpected("'{'");
                        }
                        if !self.eat("extends") && !self.eat(",") {
                            self.skip_type()?;
                        }
                    }
                    self.skip_balanced_one()?;
                    return Ok(Stmt::Other(self.span_from(start)));
                }
                "enum" if next_is_name => return self.skip_enum(start),
                "declare" if next_is_name => {
                    self.bump()?;
                    self.parse_statement()?;
                    return Ok(Stmt::Other(self.span_from(start)));
                }
                "namespace" | "module"
                    if (next_is_name || self.nth_kind(1) == Some(TokKind::Str))
                        && !self.nth_newline(1) =>
                {
                    self.bump()?;
                    while !self.at("{") {
                        if self.is_eof() {
                            return self.unexpected("'{'");
                        }
                        self.bump()?;
                    }
                    self.skip_balanced_one()?;
                    return Ok(Stmt::Other(self.span_from(start)));
                }
                _ => {}
            }

            if self.nth_is(1, ":") {
                let label = self.ident()?;
                self.bump()?;
                let body = self.parse_statement()?;
                return Ok(Stmt::Labeled {
                    span: self.span_from(start),
                    label,
                    body: Box::new(body),
                });
            }
        }

        let expr = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Stmt::Expr {
            span: self.span_from(start),
            expr,
        })
    }

    fn skip_enum(&mut self, start: usize) -> ParseResult<Stmt> {
        self.expect("enum")?;
        self.ident()?;
        self.skip_balanced_one()?;
        Ok(Stmt::Other(self.span_from(start)))
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        let start = self.cur_start();
        self.expect("{")?;
        let mut stmts = Vec::new();
        while !self.at("}") {
            if self.is_eof() {
                return self.unexpected("'}'");
            }
            stmts.push(self.parse_statement()?);
        }
        self.bump()?;
        Ok(Block {
            span: self.span_from(start),
            stmts,
        })
    }

    fn parse_import(&mut self) -> ParseResult<Stmt> {
        let start = self.cur_start();
        self.expect("import")?;
        let mut type_only = false;
        if self.at("type")
            && (self.nth_is(1, "{")
                || self.nth_is(1, "*")
                || (self.nth_kind(1) == Some(TokKind::Ident) && !self.nth_is(1, "from")))
        {
            self.bump()?;
            type_only = true;
        }

        let mut specifiers = Vec::new();
        if !self.at_kind(TokKind::Str) {
            if self.at_kind(TokKind::Ident) {
                let spec_start = self.cur_start();
                let local = self.ident()?;
                specifiers.push(ImportSpecifier {
                    span: self.span_from(spec_start),
                    kind: ImportKind::Default,
                    imported: None,
                    local,
                });
                self.eat(",");
            }
            if self.at("*") {
                let spec_start = self.cur_start();
                self.bump()?;
                self.expect("as")?;
                let local = self.ident()?;
                specifiers.push(ImportSpecifier {
                    span: self.span_from(spec_start),
                    kind: ImportKind::Namespace,
                    imported: None,
                    local,
                });
            } else if self.at("{") {
                self.bump()?;
                while !self.at("}") {
                    let spec_start = self.cur_start();
                    if self.at("type")
                        && !self.nth_is(1, ",")
                        && !self.nth_is(1, "}")
                        && !self.nth_is(1, "as")
                    {
                        self.bump()?;
                    }
                    let imported = if self.at_kind(TokKind::Str) {
                        self.string_literal()?.value
                    } else {
                        self.ident()?.name
                    };
                    let local = if self.eat("as") {
                        self.ident()?
                    } else {
                        Ident {
                            span: Some(self.span_from(spec_start)),
                            name: imported.clone(),
                        }
                    };
                    specifiers.push(ImportSpecifier {
                        span: self.span_from(spec_start),
                        kind: ImportKind::Named,
                        imported: Some(imported),
                        local,
                    });
                    if !self.eat(",") {
                        break;
                    }
                }
                self.expect("}")?;
            }
            self.expect("from")?;
        }
        let source = self.string_literal()?;
        if (self.at("with") || self.at("assert")) && !self.nth_newline(0) {
            self.bump()?;
            self.skip_balanced_one()?;
        }
        self.consume_semicolon()?;
        Ok(Stmt::Import(ImportDecl {
            span: self.span_from(start),
            specifiers,
            source,
            type_only,
        }))
    }

    fn parse_export(&mut self) -> ParseResult<Stmt> {
        let start = self.cur_start();
        self.expect("export")?;

        if self.eat("default") {
            let kind = if self.at("function") || (self.at("async") && self.nth_is(1, "function")) {
                ExportDefaultKind::Function(self.parse_function()?)
            } else if self.at("class") || self.at("abstract") {
                self.eat("abstract");
                ExportDefaultKind::Class(self.parse_class()?)
            } else if self.at("interface") {
                self.parse_statement()?;
                return Ok(Stmt::Other(self.span_from(start)));
            } else {
                let expr = self.parse_assign()?;
                self.consume_semicolon()?;
                ExportDefaultKind::Expr(expr)
            };
            return Ok(Stmt::ExportDefault(ExportDefault {
                span: self.span_from(start),
                kind,
            }));
        }

        if self.at("*") {
            self.bump()?;
            if self.eat("as") {
                self.skip_balanced_one()?;
            }
            self.expect("from")?;
            self.string_literal()?;
            self.consume_semicolon()?;
            return Ok(Stmt::ExportAll(self.span_from(start)));
        }

        let type_only = self.at("type") && self.nth_is(1, "{");
        if type_only {
            self.bump()?;
        }
        if self.at("{") {
            self.bump()?;
            let mut specifiers = Vec::new();
            while !self.at("}") {
                let spec_start = self.cur_start();
                if self.at("type") && !self.nth_is(1, ",") && !self.nth_is(1, "}") {
                    self.bump()?;
                }
                let local = if self.at_kind(TokKind::Str) {
                    self.string_literal()?.value
                } else {
                    self.ident()?.name
                };
                let exported = if self.eat("as") {
                    if self.at_kind(TokKind::Str) {
                        self.string_literal()?.value
                    } else {
                        self.ident()?.name
                    }
                } else {
                    local.clone()
                };
                specifiers.push(ExportSpecifier {
                    span: self.span_from(spec_start),
                    local,
                    exported,
                });
                if !self.eat(",") {
                    break;
                }
            }
            self.expect("}")?;
            let source = if self.eat("from") {
                Some(self.string_literal()?)
            } else {
                None
            };
            self.consume_semicolon()?;
            if type_only {
                return Ok(Stmt::Other(self.span_from(start)));
            }
            return Ok(Stmt::ExportNamed(ExportNamed {
                span: self.span_from(start),
                specifiers,
                source,
            }));
        }

        let decl = self.parse_statement()?;
        Ok(Stmt::ExportDecl(ExportDecl {
            span: self.span_from(start),
            decl: Box::new(decl),
        }))
    }

    fn parse_var_decl(&mut self) -> ParseResult<VarDecl> {
        let start = self.cur_start();
        let kind = match self.nth_text(0) {
            "const" => VarKind::Const,
            "let" => VarKind::Let,
            _ => VarKind::Var,
        };
        self.bump()?;
        let mut declarators = Vec::new();
        loop {
            let decl_start = self.cur_start();
            let name = self.parse_binding_pattern()?;
            self.eat("!");
            if self.eat(":") {
                self.skip_type()?;
            }
            let init = if self.eat("=") {
                Some(self.parse_assign()?)
            } else {
                None
            };
            declarators.push(VarDeclarator {
                span: self.span_from(decl_start),
                name,
                init,
            });
            if !self.eat(",") {
                break;
            }
        }
        self.consume_semicolon()?;
        Ok(VarDecl {
            span: self.span_from(start),
            kind,
            declarators,
        })
    }

    fn parse_function_decl(&mut self) -> ParseResult<Stmt> {
        let start = self.cur_start();
        let function = self.parse_function()?;
        Ok(Stmt::Function(FunctionDecl {
            span: self.span_from(start),
            function,
        }))
    }

    fn parse_class(&mut self) -> ParseResult<ClassDecl> {
        let start = self.cur_start();
        self.expect("class")?;
        let name = if self.at_kind(TokKind::Ident)
            && !self.at("extends")
            && !self.at("implements")
        {
            Some(self.ident()?)
        } else {
            None
        };
        while !self.at("{") {
            if self.is_eof() {
                return self.unexpected("class body");
            }
            self.skip_balanced_one()?;
        }
        self.skip_balanced_one()?;
        Ok(ClassDecl {
            span: self.span_from(start),
            name,
        })
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let start = self.cur_start();
        self.expect("if")?;
        self.expect("(")?;
        let test = self.parse_expression()?;
        self.expect(")")?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat("else") {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If(IfStmt {
            span: self.span_from(start),
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_try(&mut self) -> ParseResult<Stmt> {
        let start = self.cur_start();
        self.expect("try")?;
        let block = self.parse_block()?;
        let mut param = None;
        let mut handler = None;
        if self.eat("catch") {
            if self.eat("(") {
                param = Some(self.parse_binding_pattern()?);
                if self.eat(":") {
                    self.skip_type()?;
                }
                self.expect(")")?;
            }
            handler = Some(self.parse_block()?);
        }
        let finalizer = if self.eat("finally") {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Stmt::Try(TryStmt {
            span: self.span_from(start),
            block,
            param,
            handler,
            finalizer,
        }))
    }

    fn parse_switch(&mut self) -> ParseResult<Stmt> {
        let start = self.cur_start();
        self.expect("switch")?;
        self.expect("(")?;
        let discriminant = self.parse_expression()?;
        self.expect(")")?;
        self.expect("{")?;
        let mut cases = Vec::new();
        while !self.at("}") {
            let case_start = self.cur_start();
            let test = if self.eat("case") {
                Some(self.parse_expression()?)
            } else {
                self.expect("default")?;
                None
            };
            self.expect(":")?;
            let mut body = Vec::new();
            while !self.at("case") && !self.at("default") && !self.at("}") {
                if self.is_eof() {
                    return self.unexpected("'}'");
                }
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase {
                span: self.span_from(case_start),
                test,
                body,
            });
        }
        self.bump()?;
        Ok(Stmt::Switch(SwitchStmt {
            span: self.span_from(start),
            discriminant,
            cases,
        }))
    }

    // ========================================================================
    // Patterns
    // ========================================================================

    fn parse_binding_pattern(&mut self) -> ParseResult<Pattern> {
        if self.at("{") {
            self.parse_object_pattern().map(Pattern::Object)
        } else if self.at("[") {
            self.parse_array_pattern()
        } else {
            self.ident().map(Pattern::Ident)
        }
    }

    fn parse_binding_element(&mut self) -> ParseResult<Pattern> {
        let start = self.cur_start();
        let left = self.parse_binding_pattern()?;
        if self.eat("=") {
            let right = self.parse_assign()?;
            return Ok(Pattern::Assign {
                span: self.span_from(start),
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_object_pattern(&mut self) -> ParseResult<ObjectPattern> {
        let start = self.cur_start();
        self.expect("{")?;
        let mut props = Vec::new();
        while !self.at("}") {
            let prop_start = self.cur_start();
            if self.eat("...") {
                let arg = self.parse_binding_pattern()?;
                props.push(ObjectPatternProp::Rest {
                    span: self.span_from(prop_start),
                    arg: Box::new(arg),
                });
            } else {
                let key = self.parse_prop_key()?;
                if self.eat(":") {
                    let value = self.parse_binding_element()?;
                    props.push(ObjectPatternProp::KeyValue {
                        span: self.span_from(prop_start),
                        key,
                        value,
                    });
                } else {
                    let PropKey::Ident(key) = key else {
                        return self.unexpected("':'");
                    };
                    let default = if self.eat("=") {
                        Some(self.parse_assign()?)
                    } else {
                        None
                    };
                    props.push(ObjectPatternProp::Shorthand {
                        span: self.span_from(prop_start),
                        key,
                        default,
                    });
                }
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect("}")?;
        Ok(ObjectPattern {
            span: self.span_from(start),
            props,
        })
    }

    fn parse_array_pattern(&mut self) -> ParseResult<Pattern> {
        let start = self.cur_start();
        self.expect("[")?;
        let mut elements = Vec::new();
        while !self.at("]") {
            if self.eat(",") {
                elements.push(None);
                continue;
            }
            let element_start = self.cur_start();
            if self.eat("...") {
                let arg = self.parse_binding_pattern()?;
                elements.push(Some(Pattern::Rest {
                    span: self.span_from(element_start),
                    arg: Box::new(arg),
                }));
            } else {
                elements.push(Some(self.parse_binding_element()?));
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect("]")?;
        Ok(Pattern::Array(ArrayPattern {
            span: self.span_from(start),
            elements,
        }))
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Pattern>> {
        self.expect("(")?;
        let mut params = Vec::new();
        while !self.at(")") {
            self.skip_decorators()?;
            while (self.at("public")
                || self.at("private")
                || self.at("protected")
                || self.at("readonly")
                || self.at("override"))
                && matches!(self.nth_kind(1), Some(TokKind::Ident))
            {
                self.bump()?;
            }
            let start = self.cur_start();
            let param = if self.eat("...") {
                let arg = self.parse_binding_pattern()?;
                self.eat("?");
                if self.eat(":") {
                    self.skip_type()?;
                }
                Pattern::Rest {
                    span: self.span_from(start),
                    arg: Box::new(arg),
                }
            } else {
                let left = self.parse_binding_pattern()?;
                self.eat("?");
                if self.eat(":") {
                    self.skip_type()?;
                }
                if self.eat("=") {
                    let right = self.parse_assign()?;
                    Pattern::Assign {
                        span: self.span_from(start),
                        left: Box::new(left),
                        right: Box::new(right),
                    }
                } else {
                    left
                }
            };
            params.push(param);
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")")?;
        Ok(params)
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn parse_function(&mut self) -> ParseResult<Function> {
        let start = self.cur_start();
        let is_async = self.eat("async");
        self.expect("function")?;
        let is_generator = self.eat("*");
        let name = if self.at_kind(TokKind::Ident) {
            Some(self.ident()?)
        } else {
            None
        };
        if self.at("<") {
            self.skip_angle()?;
        }
        let params = self.parse_params()?;
        if self.eat(":") {
            self.skip_type()?;
        }
        let body = self.parse_block()?;
        Ok(Function {
            span: self.span_from(start),
            name,
            is_async,
            is_generator,
            is_arrow: false,
            params,
            body: FunctionBody::Block(body),
        })
    }

    /// Parse an arrow function if one starts here.
    fn try_parse_arrow(&mut self) -> ParseResult<Option<Expr>> {
        let start = self.cur_start();
        let mut offset = 0;
        let is_async = self.at("async")
            && !self.nth_newline(1)
            && ((self.nth_kind(1) == Some(TokKind::Ident) && self.nth_is(2, "=>"))
                || self.nth_is(1, "("));
        if is_async {
            offset = 1;
        }

        let single_param =
            self.nth_kind(offset) == Some(TokKind::Ident) && self.nth_is(offset + 1, "=>");
        if !single_param {
            if !self.nth_is(offset, "(") {
                return Ok(None);
            }
            let Some(close) = self.find_matching(self.pos + offset) else {
                return Ok(None);
            };
            let after = close + 1 - self.pos;
            if self.nth_is(after, ":") {
                let saved = self.save();
                self.pos += after + 1;
                let is_arrow = self.skip_type().is_ok() && self.at("=>");
                self.restore(saved);
                if !is_arrow {
                    return Ok(None);
                }
            } else if !self.nth_is(after, "=>") || self.nth_newline(after) {
                return Ok(None);
            }
        }

        if is_async {
            self.bump()?;
        }
        let params = if single_param {
            vec![Pattern::Ident(self.ident()?)]
        } else {
            self.parse_params()?
        };
        if self.eat(":") {
            self.skip_type()?;
        }
        self.expect("=>")?;
        let body = if self.at("{") {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assign()?))
        };
        Ok(Some(Expr::Arrow(Box::new(Function {
            span: self.span_from(start),
            name: None,
            is_async,
            is_generator: false,
            is_arrow: true,
            params,
            body,
        }))))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(crate) fn parse_expression(&mut self) -> ParseResult<Expr> {
        let start = self.cur_start();
        let first = self.parse_assign()?;
        if !self.at(",") {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(",") {
            exprs.push(self.parse_assign()?);
        }
        Ok(Expr::Sequence {
            span: self.span_from(start),
            exprs,
        })
    }

    pub(crate) fn parse_assign(&mut self) -> ParseResult<Expr> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }
        let start = self.cur_start();
        if self.at("yield") {
            self.bump()?;
            self.eat("*");
            let arg = if self.at_statement_end()
                || self.at(")")
                || self.at("]")
                || self.at(",")
                || self.at(":")
            {
                None
            } else {
                Some(self.parse_assign()?)
            };
            return Ok(match arg {
                Some(arg) => Expr::Unary(UnaryExpr {
                    span: self.span_from(start),
                    op: "yield".to_string(),
                    prefix: true,
                    arg: Box::new(arg),
                }),
                None => Expr::MetaProperty(self.span_from(start)),
            });
        }
        let left = self.parse_conditional()?;
        if let Some(tok) = self.peek() {
            let op = self.text(&tok);
            if tok.kind == TokKind::Punct && ASSIGN_OPS.contains(&op) {
                self.bump()?;
                let value = self.parse_assign()?;
                return Ok(Expr::Assign(AssignExpr {
                    span: self.span_from(start),
                    op: op.to_string(),
                    target: Box::new(left),
                    value: Box::new(value),
                }));
            }
        }
        Ok(left)
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let start = self.cur_start();
        let test = self.parse_binary(1)?;
        if !self.eat("?") {
            return Ok(test);
        }
        let consequent = self.parse_assign()?;
        self.expect(":")?;
        let alternate = self.parse_assign()?;
        Ok(Expr::Conditional(ConditionalExpr {
            span: self.span_from(start),
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        }))
    }

    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let start = self.cur_start();
        let mut left = self.parse_unary()?;
        loop {
            let Some(tok) = self.peek() else {
                break;
            };
            let op = self.text(&tok);
            if tok.kind == TokKind::Ident
                && (op == "as" || op == "satisfies")
                && !tok.newline_before
                && min_prec <= CAST_PRECEDENCE
            {
                self.bump()?;
                if !self.eat("const") {
                    self.skip_type()?;
                }
                left = Expr::TypeCast(TypeCastExpr {
                    span: self.span_from(start),
                    expr: Box::new(left),
                });
                continue;
            }
            let is_operator = match tok.kind {
                TokKind::Punct => true,
                TokKind::Ident => op == "instanceof" || op == "in",
                _ => false,
            };
            let Some(prec) = binary_precedence(op).filter(|_| is_operator) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.bump()?;
            let next_min = if op == "**" { prec } else { prec + 1 };
            let right = self.parse_binary(next_min)?;
            left = Expr::Binary(BinaryExpr {
                span: self.span_from(start),
                op: op.to_string(),
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.cur_start();
        if let Some(tok) = self.peek() {
            let op = self.text(&tok);
            let is_prefix = match tok.kind {
                TokKind::Punct => PREFIX_OPS.contains(&op),
                TokKind::Ident => PREFIX_WORDS.contains(&op),
                _ => false,
            };
            if is_prefix {
                self.bump()?;
                let arg = self.parse_unary()?;
                return Ok(Expr::Unary(UnaryExpr {
                    span: self.span_from(start),
                    op: op.to_string(),
                    prefix: true,
                    arg: Box::new(arg),
                }));
            }
        }
        let expr = self.parse_call_member()?;
        if (self.at("++") || self.at("--")) && !self.nth_newline(0) {
            let op = self.bump()?;
            return Ok(Expr::Unary(UnaryExpr {
                span: self.span_from(start),
                op: self.text(&op).to_string(),
                prefix: false,
                arg: Box::new(expr),
            }));
        }
        Ok(expr)
    }

    fn parse_member_name(&mut self) -> ParseResult<MemberProp> {
        if self.at_kind(TokKind::PrivateName) {
            return Ok(MemberProp::Private(self.ident()?));
        }
        Ok(MemberProp::Ident(self.ident()?))
    }

    fn parse_call_member(&mut self) -> ParseResult<Expr> {
        let start = self.cur_start();
        let mut expr = if self.at("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            if self.eat(".") {
                let property = self.parse_member_name()?;
                expr = Expr::Member(MemberExpr {
                    span: self.span_from(start),
                    object: Box::new(expr),
                    property,
                    optional: false,
                });
            } else if self.eat("?.") {
                if self.at("(") {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call(CallExpr {
                        span: self.span_from(start),
                        callee: Box::new(expr),
                        args,
                        optional: true,
                    });
                } else if self.eat("[") {
                    let property = self.parse_expression()?;
                    self.expect("]")?;
                    expr = Expr::Member(MemberExpr {
                        span: self.span_from(start),
                        object: Box::new(expr),
                        property: MemberProp::Computed(Box::new(property)),
                        optional: true,
                    });
                } else {
                    let property = self.parse_member_name()?;
                    expr = Expr::Member(MemberExpr {
                        span: self.span_from(start),
                        object: Box::new(expr),
                        property,
                        optional: true,
                    });
                }
            } else if self.eat("[") {
                let property = self.parse_expression()?;
                self.expect("]")?;
                expr = Expr::Member(MemberExpr {
                    span: self.span_from(start),
                    object: Box::new(expr),
                    property: MemberProp::Computed(Box::new(property)),
                    optional: false,
                });
            } else if self.at("(") {
                let args = self.parse_arguments()?;
                expr = Expr::Call(CallExpr {
                    span: self.span_from(start),
                    callee: Box::new(expr),
                    args,
                    optional: false,
                });
            } else if self.at_kind(TokKind::Template) {
                let quasi = self.bump()?.span;
                expr = Expr::TaggedTemplate(TaggedTemplate {
                    span: self.span_from(start),
                    tag: Box::new(expr),
                    quasi,
                });
            } else if self.at("!") && !self.nth_newline(0) {
                self.bump()?;
                expr = Expr::TypeCast(TypeCastExpr {
                    span: self.span_from(start),
                    expr: Box::new(expr),
                });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_new(&mut self) -> ParseResult<Expr> {
        let start = self.cur_start();
        self.expect("new")?;
        if self.eat(".") {
            self.ident()?;
            return Ok(Expr::MetaProperty(self.span_from(start)));
        }
        let mut callee = if self.at("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            if self.eat(".") {
                let property = self.parse_member_name()?;
                callee = Expr::Member(MemberExpr {
                    span: self.span_from(start),
                    object: Box::new(callee),
                    property,
                    optional: false,
                });
            } else if self.eat("[") {
                let property = self.parse_expression()?;
                self.expect("]")?;
                callee = Expr::Member(MemberExpr {
                    span: self.span_from(start),
                    object: Box::new(callee),
                    property: MemberProp::Computed(Box::new(property)),
                    optional: false,
                });
            } else {
                break;
            }
        }
        let args = if self.at("(") {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New(NewExpr {
            span: self.span_from(start),
            callee: Box::new(callee),
            args,
        }))
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Argument>> {
        self.expect("(")?;
        let mut args = Vec::new();
        while !self.at(")") {
            let start = self.cur_start();
            if self.eat("...") {
                let arg = self.parse_assign()?;
                args.push(Argument::Spread {
                    span: self.span_from(start),
                    arg,
                });
            } else {
                args.push(Argument::Expr(self.parse_assign()?));
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.cur_start();
        let Some(tok) = self.peek() else {
            return self.unexpected("expression");
        };
        let text = self.text(&tok);
        match tok.kind {
            TokKind::Ident => match text {
                "function" => Ok(Expr::Function(Box::new(self.parse_function()?))),
                "async" if self.nth_is(1, "function") && !self.nth_newline(1) => {
                    Ok(Expr::Function(Box::new(self.parse_function()?)))
                }
                "class" => Ok(Expr::Class(self.parse_class()?.span)),
                "this" => {
                    self.bump()?;
                    Ok(Expr::This(tok.span))
                }
                "super" => {
                    self.bump()?;
                    Ok(Expr::Super(tok.span))
                }
                "null" => {
                    self.bump()?;
                    Ok(Expr::Null(tok.span))
                }
                "true" | "false" => {
                    self.bump()?;
                    Ok(Expr::Bool(BoolLit {
                        span: Some(tok.span),
                        value: text == "true",
                    }))
                }
                "import" => {
                    self.bump()?;
                    if self.eat(".") {
                        self.ident()?;
                    }
                    Ok(Expr::MetaProperty(self.span_from(start)))
                }
                _ => Ok(Expr::Ident(self.ident()?)),
            },
            TokKind::PrivateName => Ok(Expr::Ident(self.ident()?)),
            TokKind::Num => {
                self.bump()?;
                Ok(Expr::Num(NumLit {
                    span: tok.span,
                    raw: text.to_string(),
                }))
            }
            TokKind::Str => Ok(Expr::Str(self.string_literal()?)),
            TokKind::Template => {
                self.bump()?;
                Ok(Expr::Template(tok.span))
            }
            TokKind::Regex => {
                self.bump()?;
                Ok(Expr::Regex(tok.span))
            }
            TokKind::Punct => match text {
                "(" => {
                    self.bump()?;
                    let expr = self.parse_expression()?;
                    self.expect(")")?;
                    Ok(Expr::Paren {
                        span: self.span_from(start),
                        expr: Box::new(expr),
                    })
                }
                "[" => self.parse_array(),
                "{" => Ok(Expr::Object(self.parse_object()?)),
                _ => self.unexpected("expression"),
            },
        }
    }

    fn parse_array(&mut self) -> ParseResult<Expr> {
        let start = self.cur_start();
        self.expect("[")?;
        let mut elements = Vec::new();
        while !self.at("]") {
            if self.eat(",") {
                elements.push(None);
                continue;
            }
            let element_start = self.cur_start();
            if self.eat("...") {
                let arg = self.parse_assign()?;
                elements.push(Some(ArrayElement::Spread {
                    span: self.span_from(element_start),
                    arg,
                }));
            } else {
                elements.push(Some(ArrayElement::Expr(self.parse_assign()?)));
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect("]")?;
        Ok(Expr::Array(ArrayLit {
            span: Some(self.span_from(start)),
            elements,
        }))
    }

    fn parse_prop_key(&mut self) -> ParseResult<PropKey> {
        let Some(tok) = self.peek() else {
            return self.unexpected("property name");
        };
        match tok.kind {
            TokKind::Ident | TokKind::PrivateName => Ok(PropKey::Ident(self.ident()?)),
            TokKind::Str => Ok(PropKey::Str(self.string_literal()?)),
            TokKind::Num => {
                self.bump()?;
                Ok(PropKey::Num(NumLit {
                    span: tok.span,
                    raw: self.text(&tok).to_string(),
                }))
            }
            TokKind::Punct if self.text(&tok) == "[" => {
                let start = self.cur_start();
                self.bump()?;
                let expr = self.parse_assign()?;
                self.expect("]")?;
                Ok(PropKey::Computed {
                    span: self.span_from(start),
                    expr: Box::new(expr),
                })
            }
            _ => self.unexpected("property name"),
        }
    }

    /// The token after a `get`/`set`/`async` word starts a property key.
    fn modifier_applies(&self) -> bool {
        !(self.nth_is(1, "(")
            || self.nth_is(1, ":")
            || self.nth_is(1, ",")
            || self.nth_is(1, "}")
            || self.nth_is(1, "=")
            || self.nth_is(1, "<"))
            && self.peek_nth(1).is_some()
    }

    pub(crate) fn parse_object(&mut self) -> ParseResult<ObjectLit> {
        let start = self.cur_start();
        self.expect("{")?;
        let mut props = Vec::new();
        while !self.at("}") {
            let prop_start = self.cur_start();
            if self.eat("...") {
                let arg = self.parse_assign()?;
                props.push(Prop::Spread(SpreadProp {
                    span: self.span_from(prop_start),
                    arg,
                }));
            } else {
                let mut kind = MethodKind::Method;
                let mut is_async = false;
                if (self.at("get") || self.at("set")) && self.modifier_applies() {
                    kind = if self.at("get") {
                        MethodKind::Getter
                    } else {
                        MethodKind::Setter
                    };
                    self.bump()?;
                } else if self.at("async") && self.modifier_applies() && !self.nth_newline(1) {
                    is_async = true;
                    self.bump()?;
                }
                let is_generator = self.eat("*");
                let key_start = self.cur_start();
                let key = self.parse_prop_key()?;
                let is_method = self.at("(")
                    || self.at("<")
                    || kind != MethodKind::Method
                    || is_async
                    || is_generator;
                if is_method {
                    if self.at("<") {
                        self.skip_angle()?;
                    }
                    let params = self.parse_params()?;
                    if self.eat(":") {
                        self.skip_type()?;
                    }
                    let body = self.parse_block()?;
                    props.push(Prop::Method(MethodProp {
                        span: self.span_from(prop_start),
                        kind,
                        key,
                        function: Function {
                            span: self.span_from(key_start),
                            name: None,
                            is_async,
                            is_generator,
                            is_arrow: false,
                            params,
                            body: FunctionBody::Block(body),
                        },
                    }));
                } else if self.eat(":") {
                    let value = self.parse_assign()?;
                    props.push(Prop::KeyValue(KeyValueProp {
                        span: Some(self.span_from(prop_start)),
                        key,
                        value,
                        shorthand: false,
                        synthesized: false,
                    }));
                } else {
                    let PropKey::Ident(ident) = &key else {
                        return self.unexpected("':'");
                    };
                    let value = Expr::Ident(ident.clone());
                    if self.eat("=") {
                        self.parse_assign()?;
                    }
                    props.push(Prop::KeyValue(KeyValueProp {
                        span: Some(self.span_from(prop_start)),
                        key,
                        value,
                        shorthand: true,
                        synthesized: false,
                    }));
                }
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect("}")?;
        Ok(ObjectLit {
            span: Some(self.span_from(start)),
            props,
        })
    }
}

/// Resolve the escapes of a quoted string literal.
pub fn unescape_string(raw: &str) -> String {
    let inner = if raw.len() >= 2 {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    let mut pending_high: Option<u32> = None;

    fn read_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, count: usize) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            value = value * 16 + chars.next()?.to_digit(16)?;
        }
        Some(value)
    }

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            if let Some(high) = pending_high.take() {
                out.push(char::from_u32(high).unwrap_or('\u{fffd}'));
            }
            out.push(ch);
            continue;
        }
        let Some(escaped) = chars.next() else {
            break;
        };
        let code = match escaped {
            'n' => Some('\n' as u32),
            't' => Some('\t' as u32),
            'r' => Some('\r' as u32),
            'b' => Some(0x08),
            'f' => Some(0x0c),
            'v' => Some(0x0b),
            '0' if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => Some(0),
            'x' => read_hex(&mut chars, 2),
            'u' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut value = 0u32;
                    for c in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                        value = value * 16 + c.to_digit(16).unwrap_or(0);
                    }
                    Some(value)
                } else {
                    read_hex(&mut chars, 4)
                }
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                None
            }
            '\n' | '\u{2028}' | '\u{2029}' => None,
            other => Some(other as u32),
        };
        let Some(code) = code else {
            continue;
        };
        if let Some(high) = pending_high.take() {
            if (0xDC00..0xE000).contains(&code) {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00);
                out.push(char::from_u32(combined).unwrap_or('\u{fffd}'));
                continue;
            }
            out.push('\u{fffd}');
        }
        if (0xD800..0xDC00).contains(&code) {
            pending_high = Some(code);
            continue;
        }
        out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
    }
    if pending_high.is_some() {
        out.push('\u{fffd}');
    }
    out
}
