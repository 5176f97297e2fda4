// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Tokenizer for module scripts, lowered output and markup expressions.
//!
//! The tokenizer works on a byte range of a larger buffer and produces
//! tokens whose spans are absolute offsets into that buffer. Template
//! literals are a single token (nested `${}` is skipped, not tokenized).
//! Comments are collected on the side.
//!
//! In [`StopAt::UnmatchedBrace`] mode tokenizing ends at the first `}` that
//! closes nothing; this is how markup `{expression}` boundaries are found.

#[cfg(test)]
mod tests;

use storyweave_core::patch::Span;
use thiserror::Error;

/// Kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokKind {
    /// Identifiers and keywords.
    Ident,
    /// `#name` private class member.
    PrivateName,
    Num,
    Str,
    /// A whole template literal, backticks included.
    Template,
    Regex,
    Punct,
}

/// A token with its absolute span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokKind,
    pub span: Span,
    /// A line terminator appears between the previous token and this one.
    pub newline_before: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// `// ...`
    Line,
    /// `/* ... */`
    Block,
}

/// A comment with its absolute span, markers included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comment {
    pub kind: CommentKind,
    pub span: Span,
}

/// Where tokenizing ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAt {
    /// At the end of the range.
    End,
    /// At the first unmatched `}`.
    UnmatchedBrace,
}

/// Tokenizer output.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    /// Offset where tokenizing stopped: the range end, or the offset of the
    /// unmatched `}`.
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokError {
    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),
    #[error("unterminated template literal starting at offset {0}")]
    UnterminatedTemplate(usize),
    #[error("unterminated comment starting at offset {0}")]
    UnterminatedComment(usize),
    #[error("unterminated regular expression starting at offset {0}")]
    UnterminatedRegex(usize),
    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("expression starting at offset {0} is missing its closing '}}'")]
    MissingClosingBrace(usize),
}

impl TokError {
    /// Byte offset the error points at.
    pub fn offset(&self) -> usize {
        match self {
            TokError::UnterminatedString(o)
            | TokError::UnterminatedTemplate(o)
            | TokError::UnterminatedComment(o)
            | TokError::UnterminatedRegex(o)
            | TokError::MissingClosingBrace(o) => *o,
            TokError::UnexpectedChar { offset, .. } => *offset,
        }
    }
}

/// Punctuators, longest first.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@",
];

/// Keywords after which a `/` starts a regular expression.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await",
];

/// Tokenize `src[start..end]`.
pub fn tokenize(src: &str, start: usize, end: usize, stop: StopAt) -> Result<TokenStream, TokError> {
    Lexer::new(src, start, end).run(stop)
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$' || (!ch.is_ascii() && ch.is_alphabetic())
}

fn is_ident_part(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || ch == '_'
        || ch == '$'
        || (!ch.is_ascii() && (ch.is_alphanumeric() || ch == '\u{200c}' || ch == '\u{200d}'))
}

struct Lexer<'src> {
    src: &'src str,
    pos: usize,
    end: usize,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    newline_before: bool,
}

impl<'src> Lexer<'src> {
    fn new(src: &'src str, start: usize, end: usize) -> Self {
        Lexer {
            src,
            pos: start,
            end: end.min(src.len()),
            tokens: Vec::new(),
            comments: Vec::new(),
            newline_before: false,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..self.end].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset..self.end)?.chars().next()
    }

    fn rest(&self) -> &'src str {
        &self.src[self.pos..self.end]
    }

    fn run(mut self, stop: StopAt) -> Result<TokenStream, TokError> {
        let origin = self.pos;
        let mut depth = 0usize;
        if self.rest().starts_with("#!") {
            self.skip_line();
        }
        loop {
            self.skip_trivia()?;
            let Some(ch) = self.peek_char() else {
                break;
            };
            let start = self.pos;
            let kind = if is_ident_start(ch) || ch == '\\' {
                self.scan_ident();
                TokKind::Ident
            } else if ch == '#' && self.peek_char_at(1).is_some_and(is_ident_start) {
                self.pos += 1;
                self.scan_ident();
                TokKind::PrivateName
            } else if ch.is_ascii_digit()
                || (ch == '.' && self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit()))
            {
                self.scan_number();
                TokKind::Num
            } else if ch == '"' || ch == '\'' {
                self.scan_string(ch)?;
                TokKind::Str
            } else if ch == '`' {
                self.scan_template()?;
                TokKind::Template
            } else if ch == '/' && self.regex_allowed() {
                self.scan_regex()?;
                TokKind::Regex
            } else {
                self.scan_punct(ch)?;
                TokKind::Punct
            };
            let span = Span::new(start, self.pos);
            if kind == TokKind::Punct {
                match &self.src[start..self.pos] {
                    "{" => depth += 1,
                    "}" if depth == 0 && stop == StopAt::UnmatchedBrace => {
                        return Ok(TokenStream {
                            tokens: self.tokens,
                            comments: self.comments,
                            end: start,
                        });
                    }
                    "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            self.tokens.push(Token {
                kind,
                span,
                newline_before: self.newline_before,
            });
            self.newline_before = false;
        }
        if stop == StopAt::UnmatchedBrace {
            return Err(TokError::MissingClosingBrace(origin));
        }
        Ok(TokenStream {
            tokens: self.tokens,
            comments: self.comments,
            end: self.end,
        })
    }

    fn skip_line(&mut self) {
        match self.rest().find('\n') {
            Some(i) => self.pos += i,
            None => self.pos = self.end,
        }
    }

    fn skip_trivia(&mut self) -> Result<(), TokError> {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' || ch == '\r' || ch == '\u{2028}' || ch == '\u{2029}' {
                self.newline_before = true;
                self.pos += ch.len_utf8();
            } else if ch.is_whitespace() || ch == '\u{feff}' {
                self.pos += ch.len_utf8();
            } else if self.rest().starts_with("//") {
                let start = self.pos;
                self.skip_line();
                self.comments.push(Comment {
                    kind: CommentKind::Line,
                    span: Span::new(start, self.pos),
                });
            } else if self.rest().starts_with("/*") {
                let start = self.pos;
                let Some(close) = self.src[start + 2..self.end].find("*/") else {
                    return Err(TokError::UnterminatedComment(start));
                };
                let end = start + 2 + close + 2;
                if self.src[start..end].contains('\n') {
                    self.newline_before = true;
                }
                self.pos = end;
                self.comments.push(Comment {
                    kind: CommentKind::Block,
                    span: Span::new(start, end),
                });
            } else {
                break;
            }
        }
        Ok(())
    }

    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        let text = &self.src[prev.span.start..prev.span.end];
        match prev.kind {
            TokKind::Punct => !matches!(text, ")" | "]" | "}"),
            TokKind::Ident => REGEX_PRECEDING_KEYWORDS.contains(&text),
            _ => false,
        }
    }

    fn scan_ident(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\\' {
                // Unicode escape in an identifier: `\uXXXX` or `\u{...}`.
                self.pos += 1;
                if self.peek_char() == Some('u') {
                    self.pos += 1;
                    if self.peek_char() == Some('{') {
                        while let Some(c) = self.peek_char() {
                            self.pos += c.len_utf8();
                            if c == '}' {
                                break;
                            }
                        }
                    } else {
                        for _ in 0..4 {
                            match self.peek_char() {
                                Some(c) if c.is_ascii_hexdigit() => self.pos += 1,
                                _ => break,
                            }
                        }
                    }
                }
            } else if is_ident_part(ch) {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn scan_number(&mut self) {
        let hex = self.rest().len() > 1
            && self.rest().starts_with('0')
            && matches!(self.peek_char_at(1), Some('x' | 'X' | 'b' | 'B' | 'o' | 'O'));
        let mut seen_dot = false;
        let mut prev = '\0';
        while let Some(ch) = self.peek_char() {
            let accept = if ch.is_ascii_alphanumeric() || ch == '_' {
                true
            } else if ch == '.' {
                !seen_dot && !hex && self.peek_char_at(1) != Some('.')
            } else if ch == '+' || ch == '-' {
                !hex && matches!(prev, 'e' | 'E')
            } else {
                false
            };
            if !accept {
                break;
            }
            if ch == '.' {
                seen_dot = true;
            }
            prev = ch;
            self.pos += 1;
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<(), TokError> {
        let start = self.pos;
        self.pos += 1;
        while let Some(ch) = self.peek_char() {
            match ch {
                '\\' => {
                    self.pos += 1;
                    if let Some(next) = self.peek_char() {
                        self.pos += next.len_utf8();
                    }
                }
                '\n' => return Err(TokError::UnterminatedString(start)),
                c if c == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                c => self.pos += c.len_utf8(),
            }
        }
        Err(TokError::UnterminatedString(start))
    }

    fn scan_template(&mut self) -> Result<(), TokError> {
        let start = self.pos;
        self.pos += 1;
        while let Some(ch) = self.peek_char() {
            match ch {
                '\\' => {
                    self.pos += 1;
                    if let Some(next) = self.peek_char() {
                        self.pos += next.len_utf8();
                    }
                }
                '`' => {
                    self.pos += 1;
                    return Ok(());
                }
                '$' if self.peek_char_at(1) == Some('{') => {
                    self.pos += 2;
                    self.skip_balanced_braces(start)?;
                }
                c => self.pos += c.len_utf8(),
            }
        }
        Err(TokError::UnterminatedTemplate(start))
    }

    /// Skip to just after the `}` closing an already-opened `{`.
    fn skip_balanced_braces(&mut self, template_start: usize) -> Result<(), TokError> {
        let mut depth = 1usize;
        while let Some(ch) = self.peek_char() {
            match ch {
                '{' => {
                    depth += 1;
                    self.pos += 1;
                }
                '}' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                '"' | '\'' => self.scan_string(ch)?,
                '`' => self.scan_template()?,
                '/' if self.rest().starts_with("//") => self.skip_line(),
                '/' if self.rest().starts_with("/*") => {
                    let start = self.pos;
                    match self.src[start + 2..self.end].find("*/") {
                        Some(close) => self.pos = start + 2 + close + 2,
                        None => return Err(TokError::UnterminatedComment(start)),
                    }
                }
                c => self.pos += c.len_utf8(),
            }
        }
        Err(TokError::UnterminatedTemplate(template_start))
    }

    fn scan_regex(&mut self) -> Result<(), TokError> {
        let start = self.pos;
        self.pos += 1;
        let mut in_class = false;
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(TokError::UnterminatedRegex(start));
            };
            match ch {
                '\\' => {
                    self.pos += 1;
                    if let Some(next) = self.peek_char() {
                        self.pos += next.len_utf8();
                    }
                }
                '\n' => return Err(TokError::UnterminatedRegex(start)),
                '[' => {
                    in_class = true;
                    self.pos += 1;
                }
                ']' => {
                    in_class = false;
                    self.pos += 1;
                }
                '/' if !in_class => {
                    self.pos += 1;
                    break;
                }
                c => self.pos += c.len_utf8(),
            }
        }
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_alphabetic() {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn scan_punct(&mut self, ch: char) -> Result<(), TokError> {
        let rest = self.rest();
        // `?.5` is a conditional followed by a number.
        if rest.starts_with("?.") && rest[2..].starts_with(|c: char| c.is_ascii_digit()) {
            self.pos += 1;
            return Ok(());
        }
        match PUNCTUATORS.iter().find(|p| rest.starts_with(*p)) {
            Some(p) => {
                self.pos += p.len();
                Ok(())
            }
            None => Err(TokError::UnexpectedChar {
                ch,
                offset: self.pos,
            }),
        }
    }
}
