// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use super::*;

fn tokenize_all(text: &str) -> Result<Vec<(TokKind, &str)>, TokError> {
    let stream = tokenize(text, 0, text.len(), StopAt::End)?;
    Ok(stream
        .tokens
        .iter()
        .map(|t| (t.kind, &text[t.span.start..t.span.end]))
        .collect())
}

#[test]
fn test_identifiers_and_punctuators() {
    assert_eq!(
        tokenize_all("const { Story } = defineMeta($$props);"),
        Ok(vec![
            (TokKind::Ident, "const"),
            (TokKind::Punct, "{"),
            (TokKind::Ident, "Story"),
            (TokKind::Punct, "}"),
            (TokKind::Punct, "="),
            (TokKind::Ident, "defineMeta"),
            (TokKind::Punct, "("),
            (TokKind::Ident, "$$props"),
            (TokKind::Punct, ")"),
            (TokKind::Punct, ";"),
        ])
    );
}

#[test]
fn test_longest_punctuator_wins() {
    assert_eq!(
        tokenize_all("a ?? b?.c === d >>>= e => f"),
        Ok(vec![
            (TokKind::Ident, "a"),
            (TokKind::Punct, "??"),
            (TokKind::Ident, "b"),
            (TokKind::Punct, "?."),
            (TokKind::Ident, "c"),
            (TokKind::Punct, "==="),
            (TokKind::Ident, "d"),
            (TokKind::Punct, ">>>="),
            (TokKind::Ident, "e"),
            (TokKind::Punct, "=>"),
            (TokKind::Ident, "f"),
        ])
    );
}

#[test]
fn test_conditional_before_decimal() {
    assert_eq!(
        tokenize_all("a?.5:1"),
        Ok(vec![
            (TokKind::Ident, "a"),
            (TokKind::Punct, "?"),
            (TokKind::Num, ".5"),
            (TokKind::Punct, ":"),
            (TokKind::Num, "1"),
        ])
    );
}

#[test]
fn test_numbers() {
    assert_eq!(
        tokenize_all("0xFF 1_000 1.5e-3 10n"),
        Ok(vec![
            (TokKind::Num, "0xFF"),
            (TokKind::Num, "1_000"),
            (TokKind::Num, "1.5e-3"),
            (TokKind::Num, "10n"),
        ])
    );
}

#[test]
fn test_strings_with_escapes() {
    assert_eq!(
        tokenize_all(r#"'it\'s' "say \"hi\"""#),
        Ok(vec![
            (TokKind::Str, r"'it\'s'"),
            (TokKind::Str, r#""say \"hi\"""#),
        ])
    );
    assert_eq!(
        tokenize_all("'open\n'"),
        Err(TokError::UnterminatedString(0))
    );
}

#[test]
fn test_template_literal_is_one_token() {
    let text = "`a ${ { b: `c${d}` }.b } e` + 1";
    let tokens = tokenize_all(text).unwrap();
    assert_eq!(tokens[0], (TokKind::Template, "`a ${ { b: `c${d}` }.b } e`"));
    assert_eq!(tokens[1], (TokKind::Punct, "+"));
}

#[test]
fn test_regex_versus_division() {
    assert_eq!(
        tokenize_all("x = a / b / c"),
        Ok(vec![
            (TokKind::Ident, "x"),
            (TokKind::Punct, "="),
            (TokKind::Ident, "a"),
            (TokKind::Punct, "/"),
            (TokKind::Ident, "b"),
            (TokKind::Punct, "/"),
            (TokKind::Ident, "c"),
        ])
    );
    assert_eq!(
        tokenize_all("return /[/}]+/g.test(s)").unwrap()[1],
        (TokKind::Regex, "/[/}]+/g")
    );
}

#[test]
fn test_comments_are_collected() {
    let text = "/** doc */\nconst a = 1; // trailing\n";
    let stream = tokenize(text, 0, text.len(), StopAt::End).unwrap();
    assert_eq!(stream.comments.len(), 2);
    assert_eq!(stream.comments[0].kind, CommentKind::Block);
    assert_eq!(&text[stream.comments[0].span.start..stream.comments[0].span.end], "/** doc */");
    assert_eq!(stream.comments[1].kind, CommentKind::Line);
    assert!(stream.tokens[0].newline_before);
    assert!(!stream.tokens[1].newline_before);
}

#[test]
fn test_stop_at_unmatched_brace() {
    let text = "{tags: ['a', `}`], x: { y }}} rest";
    // Start after the markup opening brace.
    let stream = tokenize(text, 1, text.len(), StopAt::UnmatchedBrace).unwrap();
    assert_eq!(stream.end, text.find("}} rest").unwrap());
}

#[test]
fn test_missing_closing_brace() {
    let text = "{ a: 1";
    assert_eq!(
        tokenize(text, 0, text.len(), StopAt::UnmatchedBrace).unwrap_err(),
        TokError::MissingClosingBrace(0)
    );
}

#[test]
fn test_spans_are_absolute() {
    let text = "<script>let a = 1;</script>";
    let stream = tokenize(text, 8, 18, StopAt::End).unwrap();
    let first = stream.tokens[0];
    assert_eq!(first.span, Span::new(8, 11));
    assert_eq!(stream.end, 18);
}
