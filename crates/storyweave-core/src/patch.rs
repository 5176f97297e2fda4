//! Patch accumulator: Span, Patch, PatchSet and PositionMap.
//!
//! This module implements the text rewriting infrastructure for storyweave:
//! - Half-open byte spans shared by every parsed node
//! - Range replacements with conflict detection (overlapping spans, out of bounds)
//! - An append buffer for synthesized trailing statements
//! - A position map from output offsets back to input offsets
//! - Source Map v3 rendering of the position map
//!
//! Patches are computed once against the original text and never recomputed
//! mid-pass. Application is a single forward pass over the sorted patches, so
//! the bytes outside every patched range are copied verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::text::LineIndex;

/// Hash type for content fingerprints (SHA-256, stored as hex string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute SHA-256 hash of the given bytes, returning hex-encoded string.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        ContentHash(hex::encode(result))
    }

    /// The first `len` hex characters of the hash.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Span
// ============================================================================

/// Byte offsets into one specific text buffer.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// A zero-width span at `offset`.
    pub fn empty_at(offset: usize) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span overlaps with another.
    ///
    /// Adjacent spans (one ends where another starts) do NOT overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The text this span covers in `source`.
    ///
    /// Returns an empty string when the span does not fall on valid
    /// boundaries of `source`.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..self.end).unwrap_or("")
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Patches
// ============================================================================

/// A single range replacement against the original text.
///
/// Deletions use an empty replacement; insertions use a zero-width span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Range in the original text being replaced.
    pub span: Span,
    /// Text written in place of `span`.
    pub replacement: String,
}

impl Patch {
    /// Replace the bytes in `span` with `text`.
    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        Patch {
            span,
            replacement: text.into(),
        }
    }

    /// Remove the bytes in `span`.
    pub fn delete(span: Span) -> Self {
        Patch {
            span,
            replacement: String::new(),
        }
    }

    /// Insert `text` at `offset` without removing anything.
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Patch {
            span: Span::empty_at(offset),
            replacement: text.into(),
        }
    }
}

/// Reasons a patch set refuses to apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// Two patches touch the same bytes.
    #[error("overlapping patches: {first} and {second}")]
    Overlapping { first: Span, second: Span },

    /// A patch extends beyond the end of the text.
    #[error("patch {span} is out of bounds for text of length {source_len}")]
    OutOfBounds { span: Span, source_len: usize },

    /// A patch boundary splits a UTF-8 character.
    #[error("patch boundary {offset} is not on a character boundary")]
    NotCharBoundary { offset: usize },
}

/// Result type for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;

/// Collects range replacements plus appended statements for one text buffer.
///
/// # Example
///
/// ```
/// use storyweave_core::patch::{Patch, PatchSet, Span};
///
/// let source = "let a = 1;\nlet b = 2;\n";
/// let mut patches = PatchSet::new(source);
/// patches.add(Patch::replace(Span::new(8, 9), "10"));
/// patches.append("let c = 3;\n");
///
/// let output = patches.apply().unwrap();
/// assert_eq!(output.text, "let a = 10;\nlet b = 2;\nlet c = 3;\n");
/// ```
#[derive(Debug, Clone)]
pub struct PatchSet<'src> {
    source: &'src str,
    patches: Vec<Patch>,
    appended: Vec<String>,
}

impl<'src> PatchSet<'src> {
    /// Create an empty patch set for `source`.
    pub fn new(source: &'src str) -> Self {
        PatchSet {
            source,
            patches: Vec::new(),
            appended: Vec::new(),
        }
    }

    /// Queue a patch.
    pub fn add(&mut self, patch: Patch) {
        self.patches.push(patch);
    }

    /// Queue text to be appended after the (patched) source.
    pub fn append(&mut self, text: impl Into<String>) {
        self.appended.push(text.into());
    }

    /// Number of queued range patches.
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Returns true if neither patches nor appended text are queued.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && self.appended.is_empty()
    }

    /// Check every patch against the source without applying anything.
    ///
    /// Returns the patches sorted by position. Zero-width insertions at the
    /// same offset keep their queue order.
    pub fn validate(&self) -> PatchResult<Vec<&Patch>> {
        let source_len = self.source.len();
        for patch in &self.patches {
            if patch.span.end > source_len {
                return Err(PatchError::OutOfBounds {
                    span: patch.span,
                    source_len,
                });
            }
            for offset in [patch.span.start, patch.span.end] {
                if !self.source.is_char_boundary(offset) {
                    return Err(PatchError::NotCharBoundary { offset });
                }
            }
        }

        let mut sorted: Vec<&Patch> = self.patches.iter().collect();
        // Stable sort: equal keys keep queue order.
        sorted.sort_by_key(|p| (p.span.start, p.span.end));

        for pair in sorted.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if prev.span.overlaps(&curr.span) {
                return Err(PatchError::Overlapping {
                    first: prev.span,
                    second: curr.span,
                });
            }
        }
        Ok(sorted)
    }

    /// Apply all queued patches and appended text in one forward pass.
    ///
    /// # Errors
    ///
    /// - `PatchError::Overlapping` if any two patches touch the same bytes
    /// - `PatchError::OutOfBounds` if a span exceeds the source length
    /// - `PatchError::NotCharBoundary` if a span splits a character
    pub fn apply(self) -> PatchResult<PatchOutput> {
        let sorted = self.validate()?;

        let appended_len: usize = self.appended.iter().map(String::len).sum();
        let replaced_len: usize = sorted.iter().map(|p| p.replacement.len()).sum();
        let mut text = String::with_capacity(self.source.len() + appended_len + replaced_len);
        let mut map = PositionMap::default();
        let mut cursor = 0usize;

        for patch in sorted {
            if patch.span.start > cursor {
                map.push_copied(text.len(), Span::new(cursor, patch.span.start));
                text.push_str(&self.source[cursor..patch.span.start]);
            }
            if !patch.replacement.is_empty() {
                map.push_replaced(
                    Span::new(text.len(), text.len() + patch.replacement.len()),
                    patch.span,
                );
                text.push_str(&patch.replacement);
            }
            cursor = cursor.max(patch.span.end);
        }
        if cursor < self.source.len() {
            map.push_copied(text.len(), Span::new(cursor, self.source.len()));
            text.push_str(&self.source[cursor..]);
        }
        for appended in &self.appended {
            text.push_str(appended);
        }

        Ok(PatchOutput { text, map })
    }
}

/// Patched text together with its position map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutput {
    /// The rewritten text.
    pub text: String,
    /// Mapping from output ranges back to input ranges.
    pub map: PositionMap,
}

// ============================================================================
// Position map
// ============================================================================

/// How an output range relates to the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Bytes copied verbatim; every offset maps one to one.
    Copied,
    /// Replacement text; only the start is meaningful.
    Replaced,
}

/// One mapped range of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedSegment {
    /// Range in the output text.
    pub generated: Span,
    /// Range in the input text.
    pub original: Span,
    /// Whether the bytes were copied or replaced.
    pub kind: SegmentKind,
}

/// Best-effort mapping from output offsets to input offsets.
///
/// Appended text has no counterpart in the input and is left unmapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionMap {
    segments: Vec<MappedSegment>,
}

impl PositionMap {
    fn push_copied(&mut self, generated_start: usize, original: Span) {
        self.segments.push(MappedSegment {
            generated: Span::new(generated_start, generated_start + original.len()),
            original,
            kind: SegmentKind::Copied,
        });
    }

    fn push_replaced(&mut self, generated: Span, original: Span) {
        self.segments.push(MappedSegment {
            generated,
            original,
            kind: SegmentKind::Replaced,
        });
    }

    /// Mapped segments in output order.
    pub fn segments(&self) -> &[MappedSegment] {
        &self.segments
    }

    /// Map an output offset back to the input, if it lies in a mapped range.
    ///
    /// Offsets inside replacement text map to the start of the replaced range.
    pub fn original_offset(&self, generated: usize) -> Option<usize> {
        let idx = self
            .segments
            .partition_point(|seg| seg.generated.end <= generated);
        let seg = self.segments.get(idx)?;
        if seg.generated.start > generated {
            return None;
        }
        match seg.kind {
            SegmentKind::Copied => Some(seg.original.start + (generated - seg.generated.start)),
            SegmentKind::Replaced => Some(seg.original.start),
        }
    }

    /// Render the map as a Source Map v3 document.
    ///
    /// Columns are counted in UTF-16 code units, as the format requires.
    pub fn to_source_map(&self, generated: &str, original: &str, source_name: &str) -> SourceMap {
        let gen_index = LineIndex::new(generated);
        let orig_index = LineIndex::new(original);

        let mut points: Vec<(usize, usize)> = Vec::new();
        for seg in &self.segments {
            points.push((seg.generated.start, seg.original.start));
            if seg.kind == SegmentKind::Copied {
                let text = seg.generated.slice(generated);
                for (i, byte) in text.bytes().enumerate() {
                    let next = seg.generated.start + i + 1;
                    if byte == b'\n' && next < seg.generated.end {
                        points.push((next, seg.original.start + i + 1));
                    }
                }
            }
        }

        let mut mappings = String::new();
        let mut current_line = 0u32;
        let mut first_in_line = true;
        let mut prev_gen_col = 0i64;
        let mut prev_orig_line = 0i64;
        let mut prev_orig_col = 0i64;

        for (gen_offset, orig_offset) in points {
            let (gen_line, gen_col) = gen_index.line_col_utf16(generated, gen_offset);
            let (orig_line, orig_col) = orig_index.line_col_utf16(original, orig_offset);
            while current_line < gen_line {
                mappings.push(';');
                current_line += 1;
                first_in_line = true;
                prev_gen_col = 0;
            }
            if !first_in_line {
                mappings.push(',');
            }
            encode_vlq(&mut mappings, i64::from(gen_col) - prev_gen_col);
            encode_vlq(&mut mappings, 0);
            encode_vlq(&mut mappings, i64::from(orig_line) - prev_orig_line);
            encode_vlq(&mut mappings, i64::from(orig_col) - prev_orig_col);
            prev_gen_col = i64::from(gen_col);
            prev_orig_line = i64::from(orig_line);
            prev_orig_col = i64::from(orig_col);
            first_in_line = false;
        }

        SourceMap {
            version: 3,
            sources: vec![source_name.to_string()],
            sources_content: vec![original.to_string()],
            names: Vec::new(),
            mappings,
        }
    }
}

/// A Source Map v3 document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Append the base64 VLQ encoding of `value`.
fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = (vlq & 0b1_1111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64_ALPHABET[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod content_hash_tests {
        use super::*;

        #[test]
        fn content_hash_compute_produces_hex() {
            let hash = ContentHash::compute(b"hello");
            assert_eq!(hash.0.len(), 64);
            assert!(hash.0.chars().all(|c| c.is_ascii_hexdigit()));
        }

        #[test]
        fn content_hash_short_prefix() {
            let hash = ContentHash::compute(b"hello");
            assert_eq!(hash.short(10), &hash.0[..10]);
            assert_eq!(hash.short(100), hash.0.as_str());
        }
    }

    mod span_tests {
        use super::*;

        #[test]
        fn span_overlap_detection() {
            let span1 = Span::new(10, 20);
            let span2 = Span::new(15, 25);
            let span3 = Span::new(20, 30);

            assert!(span1.overlaps(&span2));
            assert!(!span1.overlaps(&span3));
            assert!(!span3.overlaps(&span1));
        }

        #[test]
        fn span_slice() {
            let source = "hello world";
            assert_eq!(Span::new(6, 11).slice(source), "world");
            assert_eq!(Span::new(6, 40).slice(source), "");
        }

        #[test]
        #[should_panic(expected = "must be <= end")]
        fn span_rejects_inverted_range() {
            let _ = Span::new(5, 2);
        }
    }

    mod apply_tests {
        use super::*;

        #[test]
        fn apply_preserves_bytes_outside_patches() {
            let source = "aaa bbb ccc ddd";
            let mut set = PatchSet::new(source);
            set.add(Patch::replace(Span::new(12, 15), "DDDD"));
            set.add(Patch::replace(Span::new(4, 7), "B"));
            let output = set.apply().unwrap();
            assert_eq!(output.text, "aaa B ccc DDDD");
            // Unchanged ranges survive byte for byte.
            assert_eq!(&output.text[0..4], &source[0..4]);
            assert_eq!(&output.text[5..10], &source[7..12]);
        }

        #[test]
        fn apply_rejects_overlap() {
            let mut set = PatchSet::new("0123456789");
            set.add(Patch::replace(Span::new(2, 6), "x"));
            set.add(Patch::replace(Span::new(5, 8), "y"));
            let err = set.apply().unwrap_err();
            assert_eq!(
                err,
                PatchError::Overlapping {
                    first: Span::new(2, 6),
                    second: Span::new(5, 8)
                }
            );
        }

        #[test]
        fn apply_allows_adjacent_patches() {
            let mut set = PatchSet::new("0123456789");
            set.add(Patch::replace(Span::new(2, 5), "a"));
            set.add(Patch::replace(Span::new(5, 8), "b"));
            assert_eq!(set.apply().unwrap().text, "01ab89");
        }

        #[test]
        fn insertion_inside_replacement_is_overlap() {
            let mut set = PatchSet::new("0123456789");
            set.add(Patch::replace(Span::new(2, 6), "x"));
            set.add(Patch::insert(4, "y"));
            assert!(matches!(
                set.apply(),
                Err(PatchError::Overlapping { .. })
            ));
        }

        #[test]
        fn insertions_at_same_offset_keep_queue_order() {
            let mut set = PatchSet::new("ab");
            set.add(Patch::insert(1, "1"));
            set.add(Patch::insert(1, "2"));
            set.add(Patch::insert(1, "3"));
            assert_eq!(set.apply().unwrap().text, "a123b");
        }

        #[test]
        fn insertion_before_replacement_at_same_start() {
            let mut set = PatchSet::new("abcdef");
            set.add(Patch::replace(Span::new(2, 4), "XY"));
            set.add(Patch::insert(2, "!"));
            assert_eq!(set.apply().unwrap().text, "ab!XYef");
        }

        #[test]
        fn apply_rejects_out_of_bounds() {
            let mut set = PatchSet::new("short");
            set.add(Patch::delete(Span::new(3, 10)));
            assert!(matches!(
                set.apply(),
                Err(PatchError::OutOfBounds { source_len: 5, .. })
            ));
        }

        #[test]
        fn apply_rejects_split_character() {
            let mut set = PatchSet::new("héllo");
            set.add(Patch::delete(Span::new(2, 3)));
            assert!(matches!(
                set.apply(),
                Err(PatchError::NotCharBoundary { offset: 2 })
            ));
        }

        #[test]
        fn appended_text_comes_last() {
            let mut set = PatchSet::new("x;\n");
            set.append("y;\n");
            set.append("z;\n");
            set.add(Patch::delete(Span::new(0, 3)));
            assert_eq!(set.apply().unwrap().text, "y;\nz;\n");
        }

        #[test]
        fn empty_set_returns_source() {
            let set = PatchSet::new("unchanged");
            assert!(set.is_empty());
            assert_eq!(set.apply().unwrap().text, "unchanged");
        }
    }

    mod position_map_tests {
        use super::*;

        #[test]
        fn copied_offsets_map_one_to_one() {
            let mut set = PatchSet::new("aaa bbb ccc");
            set.add(Patch::replace(Span::new(4, 7), "BBBBB"));
            let output = set.apply().unwrap();
            assert_eq!(output.text, "aaa BBBBB ccc");
            assert_eq!(output.map.original_offset(0), Some(0));
            assert_eq!(output.map.original_offset(6), Some(4));
            assert_eq!(output.map.original_offset(10), Some(8));
        }

        #[test]
        fn appended_text_is_unmapped() {
            let mut set = PatchSet::new("abc");
            set.append("def");
            let output = set.apply().unwrap();
            assert_eq!(output.map.original_offset(1), Some(1));
            assert_eq!(output.map.original_offset(4), None);
        }

        #[test]
        fn source_map_lines_follow_copies() {
            let source = "a\nb\nc\n";
            let mut set = PatchSet::new(source);
            set.add(Patch::insert(0, "x\n"));
            let output = set.apply().unwrap();
            let map = output.map.to_source_map(&output.text, source, "in.js");
            assert_eq!(map.version, 3);
            assert_eq!(map.sources, vec!["in.js".to_string()]);
            // Line 0 is the inserted replacement, lines 1..3 copy lines 0..2.
            assert_eq!(map.mappings, "AAAA;AAAA;AACA;AACA");
        }

        #[test]
        fn vlq_encoding() {
            let mut out = String::new();
            encode_vlq(&mut out, 0);
            encode_vlq(&mut out, 1);
            encode_vlq(&mut out, -1);
            encode_vlq(&mut out, 16);
            assert_eq!(out, "ACDgB");
        }
    }
}
