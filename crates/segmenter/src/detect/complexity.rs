use super::patterns::{control_keyword_count, def_keyword_count};
use crate::types::ChunkType;

/// Ceiling used wherever a chunk type is not known yet
pub const GENERAL_COMPLEXITY_CEILING: u32 = 50;

/// `1 + control*2 + defs*3 + braces + parens*0.5 + log10(lines+1)*2`
#[must_use]
pub fn raw_complexity(content: &str) -> f64 {
    let control = control_keyword_count(content);
    let defs = def_keyword_count(content);
    let braces = content.chars().filter(|c| matches!(c, '{' | '}')).count();
    let parens = content.chars().filter(|c| matches!(c, '(' | ')')).count();
    let lines = content.lines().count();

    #[allow(clippy::cast_precision_loss)]
    let score = 1.0
        + control as f64 * 2.0
        + defs as f64 * 3.0
        + braces as f64
        + parens as f64 * 0.5
        + ((lines + 1) as f64).log10() * 2.0;
    score
}

/// Rounded complexity capped at `ceiling`
#[must_use]
pub fn complexity_score(content: &str, ceiling: u32) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rounded = raw_complexity(content).round().min(f64::from(u32::MAX)) as u32;
    rounded.min(ceiling)
}

/// Complexity with the general-purpose ceiling
#[must_use]
pub fn general_complexity(content: &str) -> u32 {
    complexity_score(content, GENERAL_COMPLEXITY_CEILING)
}

/// Sanity filter: is `content` a believable chunk of `chunk_type`?
#[must_use]
pub fn is_plausible(chunk_type: ChunkType, content: &str) -> bool {
    let (min, max) = chunk_type.complexity_bounds();
    let score = complexity_score(content, u32::MAX);
    (min..=max).contains(&score)
}
