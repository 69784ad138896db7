use super::{chunk_from_segment, ExecutionContext, SegmentationStrategy, StrategyDescriptor};
use crate::detect::bracket::BracketTracker;
use crate::detect::{absorb_undersized_tail, char_len, push_wrapped_line, Segment, SegmentBuilder};
use crate::error::{Result, SegmenterError};
use crate::types::{ChunkType, CodeChunk};
use async_trait::async_trait;

const NAME: &str = "line_count";

/// Universal line-window strategy; the end of every default fallback chain
/// before `minimal`.
pub struct LineCountStrategy {
    descriptor: StrategyDescriptor,
}

impl LineCountStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: StrategyDescriptor::universal(
                NAME,
                "Splits by line budget, keeping brace-balanced boundaries when possible",
            ),
        }
    }

    /// Line windows bounded by `max_lines_per_chunk` and `max_chunk_size`.
    /// With boundary preservation on, the line budget is stretched until the
    /// open braces close (the character budget is never stretched).
    pub(crate) fn split(ctx: &ExecutionContext) -> Vec<Segment> {
        let options = &ctx.options;
        let limits = ctx.limits();
        let preserve =
            options.preserve_function_boundaries || options.preserve_class_boundaries;

        let mut tracker = BracketTracker::new(&[('{', '}')]);
        let mut builder = SegmentBuilder::new();
        let mut segments = Vec::new();

        for (idx, line) in ctx.content().lines().enumerate() {
            let line_no = idx + 1;

            if char_len(line) > limits.max_chunk_size {
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

            let budget_reached = builder.line_count() >= options.max_lines_per_chunk;
            let balanced = !preserve || tracker.imbalance() == 0;
            if budget_reached && balanced && builder.size() >= limits.min_chunk_size {
                builder.flush(&mut segments);
                tracker.reset();
            }
        }

        builder.flush(&mut segments);
        absorb_undersized_tail(&mut segments, limits);
        segments
    }
}

impl Default for LineCountStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentationStrategy for LineCountStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn can_handle(&self, _ctx: &ExecutionContext) -> bool {
        true
    }

    async fn segment(&self, ctx: &ExecutionContext) -> Result<Vec<CodeChunk>> {
        let chunks: Vec<CodeChunk> = Self::split(ctx)
            .into_iter()
            .map(|segment| chunk_from_segment(ctx, segment, ChunkType::Generic, NAME))
            .collect();
        if chunks.is_empty() {
            return Err(SegmenterError::strategy(NAME, "content has no non-blank lines"));
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingOptions;

    fn create_test_content() -> String {
        let mut lines = Vec::new();
        for i in 0..100 {
            lines.push(format!("fn test_function_{i}() {{ }}"));
        }
        lines.join("\n")
    }

    fn ctx_with(options: ChunkingOptions, code: &str) -> ExecutionContext {
        ExecutionContext::new("rust", code).with_options(options)
    }

    #[tokio::test]
    async fn test_chunk_by_lines() {
        let options = ChunkingOptions {
            max_lines_per_chunk: 10,
            ..Default::default()
        };
        let content = create_test_content();
        let ctx = ctx_with(options, &content);

        let strategy = LineCountStrategy::new();
        let chunks = strategy.segment(&ctx).await.unwrap();
        assert_eq!(chunks.len(), 10);

        for chunk in &chunks {
            assert_eq!(chunk.line_count(), 10);
            assert!(!chunk.content.is_empty());
            assert_eq!(chunk.metadata.strategy.as_deref(), Some("line_count"));
        }
        assert!(strategy.validate(&chunks, ctx.limits()));
    }

    #[tokio::test]
    async fn stretches_budget_to_close_braces() {
        let options = ChunkingOptions {
            max_lines_per_chunk: 2,
            min_chunk_size: 1,
            ..Default::default()
        };
        let code = "fn a() {\n    let x = 1;\n    x\n}\nfn b() {}";
        let chunks = LineCountStrategy::new()
            .segment(&ctx_with(options.clone(), code))
            .await
            .unwrap();
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 4));

        let strict = ChunkingOptions {
            preserve_function_boundaries: false,
            preserve_class_boundaries: false,
            ..options
        };
        let chunks = LineCountStrategy::new()
            .segment(&ctx_with(strict, code))
            .await
            .unwrap();
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 2));
    }

    #[tokio::test]
    async fn never_exceeds_max_size() {
        let options = ChunkingOptions {
            max_chunk_size: 120,
            min_chunk_size: 10,
            ..Default::default()
        };
        let content = create_test_content();
        let chunks = LineCountStrategy::new()
            .segment(&ctx_with(options, &content))
            .await
            .unwrap();
        assert!(chunks.iter().all(|c| c.size() <= 120));
    }

    #[tokio::test]
    async fn blank_content_fails() {
        let ctx = ExecutionContext::new("text", "\n   \n");
        assert!(LineCountStrategy::new().segment(&ctx).await.is_err());
    }
}
