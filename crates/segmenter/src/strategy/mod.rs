//! Segmentation strategies.
//!
//! Every algorithm implements [`SegmentationStrategy`]. Strategies are
//! stateless apart from their descriptor (and, for the structural strategy,
//! a parser handle); priority lives in [`crate::priority`] and is never
//! stored on the strategy itself.

mod blocks;
mod bracket;
mod class;
mod data_format;
mod function;
mod import;
mod line;
mod markdown;
mod minimal;
mod semantic;
mod structural;

pub use bracket::BracketBalanceStrategy;
pub use class::ClassExtractStrategy;
pub use data_format::DataFormatStrategy;
pub use function::FunctionExtractStrategy;
pub use import::ImportGroupStrategy;
pub use line::LineCountStrategy;
pub use markdown::MarkdownStrategy;
pub use minimal::MinimalStrategy;
pub use semantic::SemanticScoreStrategy;
pub use structural::AstStructuralStrategy;

use crate::config::{ChunkingOptions, SizeLimits};
use crate::detect::complexity::general_complexity;
use crate::detect::Segment;
use crate::error::Result;
use crate::language::{FileKind, Language};
use crate::parser::SyntaxTree;
use crate::types::{ChunkMetadata, ChunkType, CodeChunk};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Wildcard entry in [`StrategyDescriptor::supported_languages`]
pub const ANY_LANGUAGE: &str = "*";

/// Immutable identity of a strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyDescriptor {
    pub name: String,
    pub supported_languages: BTreeSet<String>,
    pub description: String,
}

impl StrategyDescriptor {
    pub fn new<I, S>(name: impl Into<String>, languages: I, description: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            supported_languages: languages.into_iter().map(Into::into).collect(),
            description: description.into(),
        }
    }

    /// Descriptor accepting every language
    pub fn universal(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, [ANY_LANGUAGE], description)
    }

    #[must_use]
    pub fn supports_language(&self, language: &str) -> bool {
        self.supported_languages.contains(ANY_LANGUAGE)
            || self
                .supported_languages
                .iter()
                .any(|l| l.eq_ignore_ascii_case(language))
    }
}

/// Everything a strategy may look at; read-only
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub language: String,
    pub source_code: Arc<str>,
    pub file_path: Option<String>,
    pub ast: Option<Arc<SyntaxTree>>,
    pub custom_params: BTreeMap<String, serde_json::Value>,
    pub options: ChunkingOptions,
}

impl ExecutionContext {
    pub fn new(language: impl Into<String>, source_code: impl Into<Arc<str>>) -> Self {
        Self {
            language: language.into(),
            source_code: source_code.into(),
            file_path: None,
            ast: None,
            custom_params: BTreeMap::new(),
            options: ChunkingOptions::default(),
        }
    }

    #[must_use]
    pub fn with_file_path(mut self, path: Option<&str>) -> Self {
        self.file_path = path.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_ast(mut self, ast: Option<Arc<SyntaxTree>>) -> Self {
        self.ast = ast;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ChunkingOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom_params.insert(key.into(), value);
        self
    }

    /// Resolved language, falling back to the file extension
    #[must_use]
    pub fn lang(&self) -> Language {
        Language::resolve(&self.language, self.file_path.as_deref())
    }

    #[must_use]
    pub fn file_kind(&self) -> FileKind {
        FileKind::classify(self.lang(), self.file_path.as_deref())
    }

    #[must_use]
    pub const fn limits(&self) -> SizeLimits {
        self.options.limits()
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.source_code
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.source_code.chars().count()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.source_code.lines().count()
    }

    /// Lowercased file extension without the dot
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.file_path
            .as_deref()
            .and_then(|p| std::path::Path::new(p).extension())
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

/// One segmentation algorithm
#[async_trait]
pub trait SegmentationStrategy: Send + Sync {
    fn descriptor(&self) -> &StrategyDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Cheap, side-effect-free applicability check
    fn can_handle(&self, ctx: &ExecutionContext) -> bool;

    async fn segment(&self, ctx: &ExecutionContext) -> Result<Vec<CodeChunk>>;

    fn validate(&self, chunks: &[CodeChunk], limits: SizeLimits) -> bool {
        validate_chunks(chunks, limits)
    }

    /// Syntax node kinds the strategy consumes; empty for text strategies
    fn supported_node_types(&self, _language: Language) -> &'static [&'static str] {
        &[]
    }

    /// Benefits from a pre-parsed tree in the context
    fn consumes_ast(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        let descriptor = self.descriptor();
        format!("{}: {}", descriptor.name, descriptor.description)
    }
}

/// Shared validation: non-empty, well-formed, every chunk within
/// `[min, max]`. The lower bound is waived when the whole set is smaller
/// than `min` (a tiny file cannot produce a full-size chunk).
#[must_use]
pub fn validate_chunks(chunks: &[CodeChunk], limits: SizeLimits) -> bool {
    if chunks.is_empty() {
        return false;
    }
    let waive_min = min_bound_waived(chunks, limits);
    chunks.iter().all(|chunk| {
        let size = chunk.size();
        chunk.is_well_formed()
            && size <= limits.max_chunk_size
            && (waive_min || size >= limits.min_chunk_size)
    })
}

#[must_use]
pub fn min_bound_waived(chunks: &[CodeChunk], limits: SizeLimits) -> bool {
    chunks.iter().map(CodeChunk::size).sum::<usize>() < limits.min_chunk_size
}

/// Build a chunk with language, path, complexity and provenance filled in
pub(crate) fn chunk_from_segment(
    ctx: &ExecutionContext,
    segment: Segment,
    chunk_type: ChunkType,
    strategy: &str,
) -> CodeChunk {
    let metadata = ChunkMetadata::with_language(ctx.language.clone())
        .chunk_type(chunk_type)
        .complexity(general_complexity(&segment.content))
        .file_path(ctx.file_path.as_deref())
        .strategy(strategy);
    CodeChunk::new(segment.start_line, segment.end_line, segment.content, metadata)
}

/// Lines `start..=end` (1-indexed) of `content`, joined with `\n`
pub(crate) fn line_range(content: &str, start: usize, end: usize) -> String {
    content
        .lines()
        .skip(start.saturating_sub(1))
        .take(end.saturating_sub(start) + 1)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fold undersized chunks into their predecessor (or successor, for a
/// leading one) while the result fits. Skipped entirely when the lower bound
/// is waived for the set.
pub(crate) fn coalesce_small_chunks(chunks: Vec<CodeChunk>, limits: SizeLimits) -> Vec<CodeChunk> {
    if chunks.len() < 2 || min_bound_waived(&chunks, limits) {
        return chunks;
    }
    let mut out: Vec<CodeChunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if let Some(prev) = out.last_mut() {
            let undersized =
                prev.size() < limits.min_chunk_size || chunk.size() < limits.min_chunk_size;
            if undersized && prev.size() + 2 + chunk.size() <= limits.max_chunk_size {
                absorb_chunk(prev, chunk);
                continue;
            }
        }
        out.push(chunk);
    }
    out
}

fn absorb_chunk(into: &mut CodeChunk, next: CodeChunk) {
    let separator = if next.start_line <= into.end_line + 1 {
        "\n"
    } else {
        "\n\n"
    };
    into.content.push_str(separator);
    into.content.push_str(&next.content);
    into.start_line = into.start_line.min(next.start_line);
    into.end_line = into.end_line.max(next.end_line);
    into.metadata.complexity = into.metadata.complexity.max(next.metadata.complexity);
    into.metadata.chunk_count = Some(into.metadata.chunk_count.unwrap_or(1) + 1);
    if into.metadata.chunk_type != next.metadata.chunk_type
        && !into.metadata.merged_types.contains(&next.metadata.chunk_type)
    {
        if into.metadata.merged_types.is_empty() {
            into.metadata.merged_types.push(into.metadata.chunk_type);
        }
        into.metadata.merged_types.push(next.metadata.chunk_type);
    }
    for dep in next.metadata.dependencies {
        if !into.metadata.dependencies.contains(&dep) {
            into.metadata.dependencies.push(dep);
        }
    }
}

/// Split an oversized unit into line windows, tagging each with `part`
pub(crate) fn split_oversized(chunk: CodeChunk, limits: SizeLimits) -> Vec<CodeChunk> {
    if chunk.size() <= limits.max_chunk_size {
        return vec![chunk];
    }
    crate::detect::window_lines(&chunk.content, chunk.start_line, limits)
        .into_iter()
        .enumerate()
        .map(|(idx, segment)| {
            let mut metadata = chunk.metadata.clone();
            metadata.complexity = general_complexity(&segment.content);
            metadata.part = Some(idx + 1);
            CodeChunk::new(segment.start_line, segment.end_line, segment.content, metadata)
        })
        .collect()
}

/// All built-in strategies in registration order
#[must_use]
pub fn default_strategies(
    parser: Arc<dyn crate::parser::AstParser>,
) -> Vec<Arc<dyn SegmentationStrategy>> {
    vec![
        Arc::new(MarkdownStrategy::new()),
        Arc::new(DataFormatStrategy::new()),
        Arc::new(FunctionExtractStrategy::new()),
        Arc::new(ClassExtractStrategy::new()),
        Arc::new(AstStructuralStrategy::new(parser)),
        Arc::new(ImportGroupStrategy::new()),
        Arc::new(SemanticScoreStrategy::new()),
        Arc::new(BracketBalanceStrategy::new()),
        Arc::new(LineCountStrategy::new()),
        Arc::new(MinimalStrategy::new()),
    ]
}


#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(start: usize, end: usize, content: &str) -> CodeChunk {
        CodeChunk::new(start, end, content.to_string(), ChunkMetadata::default())
    }

    fn limits(min: usize, max: usize) -> SizeLimits {
        SizeLimits {
            min_chunk_size: min,
            max_chunk_size: max,
        }
    }

    #[test]
    fn descriptor_wildcard_and_case() {
        let universal = StrategyDescriptor::universal("line_count", "lines");
        assert!(universal.supports_language("cobol"));

        let js = StrategyDescriptor::new("x", ["javascript"], "");
        assert!(js.supports_language("JavaScript"));
        assert!(!js.supports_language("rust"));
    }

    #[test]
    fn validation_rules() {
        assert!(!validate_chunks(&[], limits(1, 10)));
        assert!(validate_chunks(&[chunk(1, 1, "hello")], limits(1, 10)));
        assert!(!validate_chunks(&[chunk(1, 1, "hello world!")], limits(1, 10)));
        assert!(!validate_chunks(&[chunk(2, 1, "hello")], limits(1, 10)));

        // tiny set: lower bound waived
        assert!(validate_chunks(&[chunk(1, 1, "ab")], limits(5, 10)));
        // big enough set: lower bound enforced
        assert!(!validate_chunks(
            &[chunk(1, 1, "ab"), chunk(2, 2, "abcdefgh")],
            limits(5, 10)
        ));
    }

    #[test]
    fn coalesces_undersized_neighbours() {
        let merged = coalesce_small_chunks(
            vec![chunk(1, 1, "abcdefgh"), chunk(3, 3, "xy"), chunk(5, 6, "0123456789")],
            limits(5, 12),
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].content, "abcdefgh\n\nxy");
        assert_eq!((merged[0].start_line, merged[0].end_line), (1, 3));
        assert_eq!(merged[0].metadata.chunk_count, Some(2));
    }

    #[test]
    fn splits_oversized_into_parts() {
        let big = chunk(10, 13, "aaaa\nbbbb\ncccc\ndddd");
        let parts = split_oversized(big, limits(1, 10));
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].metadata.part, Some(1));
        assert_eq!((parts[1].start_line, parts[1].end_line), (12, 13));
    }

    #[test]
    fn line_range_is_one_indexed() {
        assert_eq!(line_range("a\nb\nc\nd", 2, 3), "b\nc");
        assert_eq!(line_range("a\nb", 2, 9), "b");
    }
}
