//! Post-processing of chunk sets: deduplication, type-aware grouping,
//! overlap injection and whole-set validation.

use crate::config::SizeLimits;
use crate::strategy::validate_chunks;
use crate::types::{ChunkType, CodeChunk};
use log::debug;
use std::collections::HashSet;

const SEPARATOR: &str = "\n\n";

/// Merge-pass parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    pub max_chunk_size: usize,
    /// Largest line gap allowed between a group and the next chunk
    pub max_gap: usize,
    /// Character budget for injected overlap; zero disables it
    pub overlap_budget: usize,
}

/// Neighbour constraints for a finished chunk set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetBounds {
    pub max_overlap_lines: usize,
    pub max_gap_lines: usize,
}

/// Drop chunks whose `(start_line, end_line, size)` was already seen
#[must_use]
pub fn dedup(chunks: Vec<CodeChunk>) -> Vec<CodeChunk> {
    let mut seen = HashSet::new();
    chunks
        .into_iter()
        .filter(|c| seen.insert((c.start_line, c.end_line, c.size())))
        .collect()
}

/// Stable order: merge rank of the type, then start line; unranked types last
pub fn order_by_type(chunks: &mut [CodeChunk]) {
    chunks.sort_by_key(|c| (c.chunk_type().merge_rank().unwrap_or(u8::MAX), c.start_line));
}

fn line_gap(prev_end: usize, next_start: usize) -> usize {
    next_start.saturating_sub(prev_end + 1)
}

/// Greedy grouping in the given order. A chunk joins the open group when its
/// type is compatible with the group's last member, the line gap is within
/// `max_gap` and the joined text fits `max_chunk_size`.
#[must_use]
pub fn merge_pass(chunks: Vec<CodeChunk>, policy: MergePolicy) -> Vec<CodeChunk> {
    let mut out: Vec<CodeChunk> = Vec::with_capacity(chunks.len());
    // type and end line of the most recent member of the open group
    let mut tail: Option<(ChunkType, usize)> = None;

    for chunk in chunks {
        if let (Some(group), Some((last_type, last_end))) = (out.last_mut(), tail) {
            let fits = group.size() + SEPARATOR.len() + chunk.size() <= policy.max_chunk_size;
            let compatible = last_type.is_compatible_with(chunk.chunk_type());
            let near = line_gap(last_end, chunk.start_line) <= policy.max_gap;
            if fits && compatible && near {
                tail = Some((chunk.chunk_type(), chunk.end_line));
                join(group, chunk);
                continue;
            }
        }
        tail = Some((chunk.chunk_type(), chunk.end_line));
        out.push(chunk);
    }
    out
}

fn join(group: &mut CodeChunk, next: CodeChunk) {
    let meta = &mut group.metadata;
    let first_type = meta.chunk_type;
    if meta.merged_types.is_empty() {
        meta.merged_types.push(first_type);
    }
    if !meta.merged_types.contains(&next.metadata.chunk_type) {
        meta.merged_types.push(next.metadata.chunk_type);
    }
    meta.chunk_count = Some(
        meta.chunk_count.unwrap_or(1) + next.metadata.chunk_count.unwrap_or(1),
    );
    meta.complexity = meta.complexity.max(next.metadata.complexity);
    for dep in next.metadata.dependencies {
        if !meta.dependencies.contains(&dep) {
            meta.dependencies.push(dep);
        }
    }
    if meta.function_name != next.metadata.function_name {
        meta.function_name = None;
    }

    group.content.push_str(SEPARATOR);
    group.content.push_str(&next.content);
    group.start_line = group.start_line.min(next.start_line);
    group.end_line = group.end_line.max(next.end_line);
}

/// Append leading whole lines of each successor to its predecessor, within
/// `budget` characters and without pushing the chunk past `max_chunk_size`.
/// Line numbers are left untouched.
#[must_use]
pub fn inject_overlap(mut chunks: Vec<CodeChunk>, budget: usize, max_chunk_size: usize) -> Vec<CodeChunk> {
    if budget == 0 || chunks.len() < 2 {
        return chunks;
    }
    for i in 0..chunks.len() - 1 {
        let mut lines: Vec<&str> = Vec::new();
        let mut taken = 0usize;
        for line in chunks[i + 1].content.lines() {
            let cost = line.chars().count() + usize::from(!lines.is_empty());
            if taken + cost > budget {
                break;
            }
            taken += cost;
            lines.push(line);
        }

        let room = max_chunk_size.saturating_sub(chunks[i].size() + 1);
        while taken > room {
            let Some(dropped) = lines.pop() else { break };
            taken -= dropped.chars().count() + usize::from(!lines.is_empty());
        }
        if lines.is_empty() || taken == 0 {
            continue;
        }

        let overlap = lines.join("\n");
        let current = &mut chunks[i];
        current.content.push('\n');
        current.content.push_str(&overlap);
        current.metadata.has_overlap = true;
        current.metadata.overlap_size = taken;
    }
    chunks
}

/// Every chunk valid, and neighbours (by start line) neither overlap by more
/// than `max_overlap_lines` nor leave a gap above `max_gap_lines`.
#[must_use]
pub fn validate_chunk_set(chunks: &[CodeChunk], limits: SizeLimits, bounds: SetBounds) -> bool {
    if !validate_chunks(chunks, limits) {
        return false;
    }
    let mut ordered: Vec<&CodeChunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| (c.start_line, c.end_line));
    ordered.windows(2).all(|pair| {
        let (prev, next) = (pair[0], pair[1]);
        let overlap = prev.end_line.saturating_sub(next.start_line);
        let gap = line_gap(prev.end_line, next.start_line);
        let ok = overlap <= bounds.max_overlap_lines && gap <= bounds.max_gap_lines;
        if !ok {
            debug!(
                "chunk set rejected at lines {}-{} / {}-{} (overlap {overlap}, gap {gap})",
                prev.start_line, prev.end_line, next.start_line, next.end_line
            );
        }
        ok
    })
}

/// Multi-strategy merge: dedup, type-ordered grouping, then positional
/// ordering and overlap.
#[derive(Debug, Clone, Copy)]
pub struct HierarchicalMerger {
    policy: MergePolicy,
}

impl HierarchicalMerger {
    #[must_use]
    pub const fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn merge(&self, chunks: Vec<CodeChunk>) -> Vec<CodeChunk> {
        let before = chunks.len();
        let mut unique = dedup(chunks);
        order_by_type(&mut unique);
        let mut merged = merge_pass(unique, self.policy);
        merged.sort_by_key(|c| (c.start_line, c.end_line));
        debug!("hierarchical merge: {before} -> {} chunks", merged.len());
        inject_overlap(merged, self.policy.overlap_budget, self.policy.max_chunk_size)
    }

    /// Single-strategy variant: positional order, no type ranking
    #[must_use]
    pub fn merge_flat(&self, mut chunks: Vec<CodeChunk>) -> Vec<CodeChunk> {
        chunks.sort_by_key(|c| (c.start_line, c.end_line));
        let merged = merge_pass(chunks, self.policy);
        inject_overlap(merged, self.policy.overlap_budget, self.policy.max_chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn chunk(start: usize, end: usize, content: &str, kind: ChunkType) -> CodeChunk {
        CodeChunk::new(
            start,
            end,
            content.to_string(),
            ChunkMetadata::with_language("javascript").chunk_type(kind),
        )
    }

    fn policy(max: usize, gap: usize, overlap: usize) -> MergePolicy {
        MergePolicy {
            max_chunk_size: max,
            max_gap: gap,
            overlap_budget: overlap,
        }
    }

    const BOUNDS: SetBounds = SetBounds {
        max_overlap_lines: 50,
        max_gap_lines: 100,
    };

    #[test]
    fn dedup_keeps_first_occurrence() {
        let chunks = vec![
            chunk(1, 2, "ab", ChunkType::Function),
            chunk(1, 2, "xy", ChunkType::Class),
            chunk(1, 3, "ab", ChunkType::Function),
        ];
        let out = dedup(chunks);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].chunk_type(), ChunkType::Function);
    }

    #[test]
    fn type_order_puts_unranked_types_last() {
        let mut chunks = vec![
            chunk(10, 12, "g", ChunkType::Generic),
            chunk(5, 8, "f", ChunkType::Function),
            chunk(1, 2, "i", ChunkType::Import),
        ];
        order_by_type(&mut chunks);
        let kinds: Vec<_> = chunks.iter().map(CodeChunk::chunk_type).collect();
        assert_eq!(kinds, vec![ChunkType::Function, ChunkType::Import, ChunkType::Generic]);
    }

    #[test]
    fn merges_near_compatible_chunks() {
        let chunks = vec![
            chunk(1, 1, "function f(){}", ChunkType::Function),
            chunk(3, 3, "function g(){}", ChunkType::Function),
        ];
        let merged = HierarchicalMerger::new(policy(2000, 5, 0)).merge_flat(chunks);
        assert_eq!(merged.len(), 1);
        assert_eq!((merged[0].start_line, merged[0].end_line), (1, 3));
        assert_eq!(merged[0].content, "function f(){}\n\nfunction g(){}");
        assert_eq!(merged[0].metadata.chunk_count, Some(2));
    }

    #[test]
    fn respects_gap_size_and_compatibility() {
        let far = vec![
            chunk(1, 1, "a", ChunkType::Function),
            chunk(20, 20, "b", ChunkType::Function),
        ];
        assert_eq!(merge_pass(far, policy(2000, 5, 0)).len(), 2);

        let big = vec![
            chunk(1, 1, "aaaa", ChunkType::Function),
            chunk(2, 2, "bbbb", ChunkType::Function),
        ];
        assert_eq!(merge_pass(big, policy(9, 5, 0)).len(), 2);

        let mixed = vec![
            chunk(1, 1, "use a;", ChunkType::Import),
            chunk(2, 2, "fn b() {}", ChunkType::Function),
        ];
        assert_eq!(merge_pass(mixed, policy(2000, 5, 0)).len(), 2);
    }

    #[test]
    fn overlap_borrows_leading_lines() {
        let chunks = vec![
            chunk(1, 2, "alpha\nbeta", ChunkType::Generic),
            chunk(3, 5, "gamma\ndelta\nepsilon", ChunkType::Generic),
        ];
        let out = inject_overlap(chunks, 12, 100);
        assert_eq!(out[0].content, "alpha\nbeta\ngamma\ndelta");
        assert!(out[0].metadata.has_overlap);
        assert_eq!(out[0].metadata.overlap_size, 11);
        assert_eq!(out[0].end_line, 2);
        assert!(!out[1].metadata.has_overlap);
    }

    #[test]
    fn overlap_never_exceeds_max_size() {
        let chunks = vec![
            chunk(1, 1, "0123456789", ChunkType::Generic),
            chunk(2, 3, "ab\ncd", ChunkType::Generic),
        ];
        let out = inject_overlap(chunks, 50, 13);
        assert_eq!(out[0].content, "0123456789\nab");
        let out = inject_overlap(out, 50, 12);
        assert!(out[0].size() <= 13);
    }

    #[test]
    fn set_validation_rejects_deep_overlap() {
        let limits = SizeLimits {
            min_chunk_size: 1,
            max_chunk_size: 2000,
        };
        let deep = vec![
            chunk(1, 60, "outer", ChunkType::Class),
            chunk(2, 3, "inner", ChunkType::Method),
        ];
        assert!(!validate_chunk_set(&deep, limits, BOUNDS));

        let shallow = vec![
            chunk(1, 40, "outer", ChunkType::Class),
            chunk(2, 3, "inner", ChunkType::Method),
        ];
        assert!(validate_chunk_set(&shallow, limits, BOUNDS));

        let gapped = vec![
            chunk(1, 1, "a", ChunkType::Generic),
            chunk(200, 200, "b", ChunkType::Generic),
        ];
        assert!(!validate_chunk_set(&gapped, limits, BOUNDS));
    }

    proptest! {
        #[test]
        fn overlap_keeps_line_ranges(lens in proptest::collection::vec(1usize..40, 2..8), budget in 0usize..60) {
            let mut line = 1;
            let chunks: Vec<CodeChunk> = lens
                .iter()
                .map(|len| {
                    let c = chunk(line, line + 1, &format!("{}\n{}", "x".repeat(*len), "y".repeat(*len)), ChunkType::Generic);
                    line += 2;
                    c
                })
                .collect();
            let ranges: Vec<_> = chunks.iter().map(|c| (c.start_line, c.end_line)).collect();
            let out = inject_overlap(chunks, budget, 100);
            let after: Vec<_> = out.iter().map(|c| (c.start_line, c.end_line)).collect();
            prop_assert_eq!(ranges, after);
            prop_assert!(out.iter().all(|c| c.size() <= 100));
        }
    }
}
