//! Text utilities: offset conversions, dedent and comment cleanup.
//!
//! ## Coordinate Conventions
//!
//! - [`byte_offset_to_position`] returns **1-indexed** line and column
//!   (matching editor conventions, used in error messages)
//! - [`LineIndex`] returns **0-indexed** line and UTF-16 column (matching
//!   the Source Map v3 format)
//! - Byte offsets are **0-indexed**

/// Convert a byte offset to 1-indexed line and column.
///
/// Columns count Unicode scalar values. If `offset` exceeds the content
/// length, returns the position at the end of the content.
pub fn byte_offset_to_position(content: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 1u32;

    for (i, ch) in content.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Precomputed line starts for repeated offset lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build the index for `text`.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        LineIndex { line_starts }
    }

    /// 0-indexed line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    /// 0-indexed line and UTF-16 column of `offset` in `text`.
    ///
    /// `text` must be the same text the index was built from.
    pub fn line_col_utf16(&self, text: &str, offset: usize) -> (u32, u32) {
        let line = self.line_of(offset);
        let start = self.line_starts[line];
        let end = offset.min(text.len());
        let col: usize = text
            .get(start..end)
            .map(|s| s.chars().map(char::len_utf16).sum())
            .unwrap_or(0);
        (line as u32, col as u32)
    }
}

/// Remove the common leading whitespace of all non-blank lines, then trim
/// leading and trailing blank lines.
///
/// Tabs and spaces are both counted as one unit of indentation.
pub fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    let stripped: Vec<&str> = lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[indent..]
            }
        })
        .collect();

    let first = stripped.iter().position(|l| !l.is_empty());
    let last = stripped.iter().rposition(|l| !l.is_empty());
    match (first, last) {
        (Some(first), Some(last)) => stripped[first..=last]
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Strip the markers from a block comment's raw text.
///
/// `/**`, `/*` and `*/` are removed, then a leading `*` (with the space
/// after it) is removed from every line and the result is dedented.
pub fn clean_block_comment(raw: &str) -> String {
    let inner = raw
        .strip_prefix("/**")
        .or_else(|| raw.strip_prefix("/*"))
        .unwrap_or(raw);
    let inner = inner.strip_suffix("*/").unwrap_or(inner);

    let lines: Vec<String> = inner
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            match trimmed.strip_prefix('*') {
                Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).to_string(),
                None => line.to_string(),
            }
        })
        .collect();
    dedent(&lines.join("\n"))
}

/// Join consecutive `//` line comments into one text block.
pub fn clean_line_comments<'a>(raws: impl IntoIterator<Item = &'a str>) -> String {
    let lines: Vec<&str> = raws
        .into_iter()
        .map(|raw| {
            let body = raw.strip_prefix("//").unwrap_or(raw);
            body.strip_prefix(' ').unwrap_or(body)
        })
        .collect();
    dedent(&lines.join("\n"))
}

/// Strip the `<!--` / `-->` markers from an HTML comment and dedent it.
pub fn clean_html_comment(raw: &str) -> String {
    let inner = raw.strip_prefix("<!--").unwrap_or(raw);
    let inner = inner.strip_suffix("-->").unwrap_or(inner);
    dedent(inner)
}

/// Indent every non-empty line of `text` with `indent`.
pub fn indent_lines(text: &str, indent: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The leading whitespace of the line containing `offset`.
pub fn line_indent_at(text: &str, offset: usize) -> &str {
    let offset = offset.min(text.len());
    let line_start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let rest = &text[line_start..];
    let width = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    &rest[..width]
}
