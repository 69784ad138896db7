//! Boundary detectors.
//!
//! Pure functions over text: they decide *where* to cut and return
//! [`Segment`]s; turning segments into typed chunks is the strategies' job.

pub mod bracket;
pub mod complexity;
pub mod patterns;
pub mod semantic;

use crate::config::SizeLimits;
use unicode_segmentation::UnicodeSegmentation;

/// A contiguous run of source lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 1-indexed, inclusive
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
}

impl Segment {
    #[must_use]
    pub fn size(&self) -> usize {
        char_len(&self.content)
    }
}

#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split a line longer than `max` into pieces of at most `max` characters,
/// never breaking a grapheme cluster.
#[must_use]
pub fn hard_wrap(line: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for grapheme in line.graphemes(true) {
        let len = char_len(grapheme);
        if current_len > 0 && current_len + len > max {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(grapheme);
        current_len += len;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Accumulates lines until a detector decides to cut
#[derive(Debug, Default)]
pub(crate) struct SegmentBuilder<'a> {
    lines: Vec<&'a str>,
    start_line: usize,
    size: usize,
}

impl<'a> SegmentBuilder<'a> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub(crate) const fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Size after appending `line` (newline separator included)
    pub(crate) fn size_with(&self, line: &str) -> usize {
        let sep = usize::from(!self.lines.is_empty());
        self.size + sep + char_len(line)
    }

    pub(crate) fn push(&mut self, line_no: usize, line: &'a str) {
        if self.lines.is_empty() {
            self.start_line = line_no;
        }
        self.size = self.size_with(line);
        self.lines.push(line);
    }

    /// Emit the pending lines; whitespace-only runs are discarded
    pub(crate) fn flush(&mut self, out: &mut Vec<Segment>) {
        if self.lines.is_empty() {
            return;
        }
        let lines = std::mem::take(&mut self.lines);
        self.size = 0;
        if lines.iter().all(|l| l.trim().is_empty()) {
            return;
        }
        out.push(Segment {
            start_line: self.start_line,
            end_line: self.start_line + lines.len() - 1,
            content: lines.join("\n"),
        });
    }
}

/// Emit a single line that exceeds the max size as wrapped pieces
pub(crate) fn push_wrapped_line(out: &mut Vec<Segment>, line_no: usize, line: &str, max: usize) {
    for piece in hard_wrap(line, max) {
        out.push(Segment {
            start_line: line_no,
            end_line: line_no,
            content: piece,
        });
    }
}

/// Fold an undersized trailing segment into its predecessor when it fits
pub fn absorb_undersized_tail(segments: &mut Vec<Segment>, limits: SizeLimits) {
    if segments.len() < 2 {
        return;
    }
    let last_idx = segments.len() - 1;
    let (last_size, last_start) = (segments[last_idx].size(), segments[last_idx].start_line);
    let prev = &segments[last_idx - 1];
    if last_size >= limits.min_chunk_size
        || last_start != prev.end_line + 1
        || prev.size() + 1 + last_size > limits.max_chunk_size
    {
        return;
    }
    if let Some(last) = segments.pop() {
        if let Some(prev) = segments.last_mut() {
            prev.content.push('\n');
            prev.content.push_str(&last.content);
            prev.end_line = last.end_line;
        }
    }
}

/// Greedy line windows of at most `max` characters, numbered from `first_line`
#[must_use]
pub fn window_lines(content: &str, first_line: usize, limits: SizeLimits) -> Vec<Segment> {
    let mut builder = SegmentBuilder::new();
    let mut segments = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line_no = first_line + idx;
        if char_len(line) > limits.max_chunk_size {
            builder.flush(&mut segments);
            push_wrapped_line(&mut segments, line_no, line, limits.max_chunk_size);
            continue;
        }
        if !builder.is_empty() && builder.size_with(line) > limits.max_chunk_size {
            builder.flush(&mut segments);
        }
        builder.push(line_no, line);
    }
    builder.flush(&mut segments);
    absorb_undersized_tail(&mut segments, limits);
    segments
}

/// Join contiguous neighbours while either side is below `min` and the
/// result still fits.
#[must_use]
pub fn coalesce_segments(segments: Vec<Segment>, limits: SizeLimits) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if let Some(prev) = out.last_mut() {
            let undersized =
                prev.size() < limits.min_chunk_size || segment.size() < limits.min_chunk_size;
            let contiguous = segment.start_line <= prev.end_line + 1;
            if undersized && contiguous && prev.size() + 1 + segment.size() <= limits.max_chunk_size
            {
                prev.content.push('\n');
                prev.content.push_str(&segment.content);
                prev.end_line = prev.end_line.max(segment.end_line);
                continue;
            }
        }
        out.push(segment);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: usize, end: usize, content: &str) -> Segment {
        Segment {
            start_line: start,
            end_line: end,
            content: content.to_string(),
        }
    }

    #[test]
    fn hard_wrap_respects_max_and_graphemes() {
        let pieces = hard_wrap("abcdefg", 3);
        assert_eq!(pieces, vec!["abc", "def", "g"]);

        // "e" + combining acute accent is one grapheme of two chars
        let pieces = hard_wrap("ae\u{301}b", 2);
        assert_eq!(pieces, vec!["a", "e\u{301}", "b"]);
    }

    #[test]
    fn builder_tracks_size_and_lines() {
        let mut builder = SegmentBuilder::new();
        builder.push(3, "ab");
        builder.push(4, "cde");
        assert_eq!(builder.size(), 6);
        assert_eq!(builder.size_with("f"), 8);

        let mut out = Vec::new();
        builder.flush(&mut out);
        assert!(builder.is_empty());
        assert_eq!(out, vec![segment(3, 4, "ab\ncde")]);
    }

    #[test]
    fn builder_discards_blank_runs() {
        let mut builder = SegmentBuilder::new();
        builder.push(1, "");
        builder.push(2, "   ");
        let mut out = Vec::new();
        builder.flush(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn absorbs_small_contiguous_tail() {
        let limits = SizeLimits {
            min_chunk_size: 5,
            max_chunk_size: 100,
        };
        let mut segments = vec![segment(1, 2, "hello\nworld"), segment(3, 3, "}")];
        absorb_undersized_tail(&mut segments, limits);
        assert_eq!(segments, vec![segment(1, 3, "hello\nworld\n}")]);

        let mut gapped = vec![segment(1, 2, "hello\nworld"), segment(5, 5, "}")];
        absorb_undersized_tail(&mut gapped, limits);
        assert_eq!(gapped.len(), 2);
    }

    #[test]
    fn windows_stay_within_max() {
        let limits = SizeLimits {
            min_chunk_size: 1,
            max_chunk_size: 12,
        };
        let windows = window_lines("aaaa\nbbbb\ncccc\ndddd", 10, limits);
        assert_eq!(
            windows,
            vec![segment(10, 11, "aaaa\nbbbb"), segment(12, 13, "cccc\ndddd")]
        );
    }

    #[test]
    fn coalesces_small_contiguous_neighbours() {
        let limits = SizeLimits {
            min_chunk_size: 6,
            max_chunk_size: 20,
        };
        let merged = coalesce_segments(
            vec![
                segment(1, 1, "# a"),
                segment(2, 3, "text\nmore"),
                segment(9, 9, "far"),
            ],
            limits,
        );
        assert_eq!(merged, vec![segment(1, 3, "# a\ntext\nmore"), segment(9, 9, "far")]);
    }
}
