use super::patterns::{
    has_control_keyword, is_blank, is_class_definition, is_comment, is_export,
    is_function_definition, is_import,
};
use super::{absorb_undersized_tail, char_len, push_wrapped_line, Segment, SegmentBuilder};
use crate::config::SizeLimits;
use crate::language::Language;

/// Lines scoring above this start a new segment
pub const BOUNDARY_THRESHOLD: f64 = 0.7;

/// Additive boundary score of a single line, capped at 1.0
#[must_use]
pub fn score_line(line: &str, language: Language) -> f64 {
    let mut score: f64 = 0.0;
    if is_function_definition(line) || is_class_definition(line) {
        score += 0.9;
    }
    if is_import(line) || is_export(line) {
        score += 0.8;
    }
    if has_control_keyword(line) {
        score += 0.6;
    }
    if is_comment(line, language) {
        score += 0.3;
    }
    if is_blank(line) {
        score += 0.1;
    }
    score.min(1.0)
}

/// Definition or import line, the only kinds allowed to open a segment
#[must_use]
pub fn is_semantic_boundary(line: &str) -> bool {
    is_function_definition(line) || is_class_definition(line) || is_import(line)
}

/// Cut before high-scoring boundary lines once the pending segment reaches `min`
#[must_use]
pub fn split_semantically(content: &str, limits: SizeLimits, language: Language) -> Vec<Segment> {
    let mut builder = SegmentBuilder::new();
    let mut segments = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;

        if char_len(line) > limits.max_chunk_size {
            builder.flush(&mut segments);
            push_wrapped_line(&mut segments, line_no, line, limits.max_chunk_size);
            continue;
        }

        let boundary =
            is_semantic_boundary(line) && score_line(line, language) > BOUNDARY_THRESHOLD;
        if !builder.is_empty()
            && ((boundary && builder.size() >= limits.min_chunk_size)
                || builder.size_with(line) > limits.max_chunk_size)
        {
            builder.flush(&mut segments);
        }
        builder.push(line_no, line);
    }

    builder.flush(&mut segments);
    absorb_undersized_tail(&mut segments, limits);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_are_additive_and_capped() {
        assert!((score_line("function f() {", Language::JavaScript) - 0.9).abs() < f64::EPSILON);
        assert!((score_line("import x from 'y';", Language::JavaScript) - 0.8).abs() < f64::EPSILON);
        assert!((score_line("", Language::JavaScript) - 0.1).abs() < f64::EPSILON);
        assert!((score_line("  // note", Language::JavaScript) - 0.3).abs() < f64::EPSILON);
        assert!((score_line("  while (x) {", Language::JavaScript) - 0.6).abs() < f64::EPSILON);
        // definition + control keyword
        assert!((score_line("function f() { if (x) {} }", Language::JavaScript) - 1.0).abs() < f64::EPSILON);
        assert!(score_line("x = 1;", Language::JavaScript).abs() < f64::EPSILON);
    }

    #[test]
    fn cuts_before_definitions() {
        let code = "function a() {\n  return 1;\n}\nfunction b() {\n  return 2;\n}";
        let limits = SizeLimits {
            min_chunk_size: 10,
            max_chunk_size: 500,
        };
        let segments = split_semantically(code, limits, Language::JavaScript);
        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].start_line, segments[0].end_line), (1, 3));
        assert_eq!((segments[1].start_line, segments[1].end_line), (4, 6));
    }

    #[test]
    fn keeps_small_prefix_together() {
        let code = "x;\nfunction b() {\n  return 2;\n}";
        let limits = SizeLimits {
            min_chunk_size: 10,
            max_chunk_size: 500,
        };
        let segments = split_semantically(code, limits, Language::JavaScript);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].end_line, 4);
    }
}
