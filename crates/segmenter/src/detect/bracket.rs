use super::patterns::{is_blank, is_class_definition, is_comment, is_function_definition};
use super::{absorb_undersized_tail, push_wrapped_line, Segment, SegmentBuilder};
use crate::config::SizeLimits;
use crate::language::Language;

/// Bracket-balance splitter settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketConfig {
    pub pairs: Vec<(char, char)>,
    /// Split once `Σ|open - close|` drops to this value
    pub max_imbalance: usize,
    pub limits: SizeLimits,
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            pairs: vec![('{', '}'), ('(', ')'), ('[', ']')],
            max_imbalance: 2,
            limits: SizeLimits::default(),
        }
    }
}

impl BracketConfig {
    #[must_use]
    pub fn with_limits(limits: SizeLimits) -> Self {
        Self {
            limits,
            ..Default::default()
        }
    }
}

/// Open/close counters per configured pair
#[derive(Debug, Clone)]
pub struct BracketTracker {
    pairs: Vec<(char, char)>,
    counts: Vec<(usize, usize)>,
}

impl BracketTracker {
    #[must_use]
    pub fn new(pairs: &[(char, char)]) -> Self {
        Self {
            pairs: pairs.to_vec(),
            counts: vec![(0, 0); pairs.len()],
        }
    }

    pub fn update(&mut self, line: &str) {
        for ch in line.chars() {
            for (idx, (open, close)) in self.pairs.iter().enumerate() {
                if ch == *open {
                    self.counts[idx].0 += 1;
                } else if ch == *close {
                    self.counts[idx].1 += 1;
                }
            }
        }
    }

    #[must_use]
    pub fn imbalance(&self) -> usize {
        self.counts
            .iter()
            .map(|(open, close)| open.abs_diff(*close))
            .sum()
    }

    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = (0, 0));
    }
}

/// Blank, comment-opening, brace-containing or definition line
#[must_use]
pub fn is_good_boundary(line: &str, language: Language) -> bool {
    is_blank(line)
        || is_comment(line, language)
        || line.contains('{')
        || line.contains('}')
        || is_function_definition(line)
        || is_class_definition(line)
}

/// Split `content` where brackets balance out, honoring the size limits
#[must_use]
pub fn split_by_brackets(content: &str, config: &BracketConfig, language: Language) -> Vec<Segment> {
    let limits = config.limits;
    let mut tracker = BracketTracker::new(&config.pairs);
    let mut builder = SegmentBuilder::new();
    let mut segments = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;

        if super::char_len(line) > limits.max_chunk_size {
            builder.flush(&mut segments);
            tracker.reset();
            push_wrapped_line(&mut segments, line_no, line, limits.max_chunk_size);
            continue;
        }

        if !builder.is_empty() && builder.size_with(line) > limits.max_chunk_size {
            builder.flush(&mut segments);
            tracker.reset();
        }

        builder.push(line_no, line);
        tracker.update(line);

        if builder.size() >= limits.min_chunk_size
            && (tracker.imbalance() <= config.max_imbalance || is_good_boundary(line, language))
        {
            builder.flush(&mut segments);
            tracker.reset();
        }
    }

    builder.flush(&mut segments);
    absorb_undersized_tail(&mut segments, limits);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(min: usize, max: usize) -> BracketConfig {
        BracketConfig::with_limits(SizeLimits {
            min_chunk_size: min,
            max_chunk_size: max,
        })
    }

    #[test]
    fn tracker_measures_imbalance() {
        let mut tracker = BracketTracker::new(&[('{', '}'), ('(', ')')]);
        tracker.update("fn a() {");
        assert_eq!(tracker.imbalance(), 1);
        tracker.update("  call((x)");
        assert_eq!(tracker.imbalance(), 2);
        tracker.reset();
        assert_eq!(tracker.imbalance(), 0);
    }

    #[test]
    fn splitting_is_deterministic_on_balanced_input() {
        let cfg = config(1, 100);
        let first = split_by_brackets("{}\n{}\n", &cfg, Language::JavaScript);
        let second = split_by_brackets("{}\n{}\n", &cfg, Language::JavaScript);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!((first[0].start_line, first[0].end_line), (1, 1));
        assert_eq!((first[1].start_line, first[1].end_line), (2, 2));
    }

    #[test]
    fn respects_max_size() {
        let code = (0..40)
            .map(|i| format!("let value_{i} = compute({i});"))
            .collect::<Vec<_>>()
            .join("\n");
        let segments = split_by_brackets(&code, &config(10, 120), Language::JavaScript);
        assert!(segments.len() > 1);
        for segment in &segments {
            assert!(segment.size() <= 120, "segment too large: {}", segment.size());
        }
    }

    #[test]
    fn waits_for_min_size_before_cutting() {
        let code = "a();\nb();\nc();\nd();";
        let segments = split_by_brackets(code, &config(9, 100), Language::JavaScript);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].content, "a();\nb();");
        assert_eq!(segments[1].content, "c();\nd();");
    }

    #[test]
    fn wraps_oversized_lines() {
        let long = "x".repeat(250);
        let segments = split_by_brackets(&long, &config(1, 100), Language::Unknown);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.start_line == 1 && s.size() <= 100));
    }
}
