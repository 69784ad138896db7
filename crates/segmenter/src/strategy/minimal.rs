use super::{chunk_from_segment, ExecutionContext, SegmentationStrategy, StrategyDescriptor};
use crate::config::SizeLimits;
use crate::detect::{window_lines, Segment};
use crate::error::{Result, SegmenterError};
use crate::types::{ChunkType, CodeChunk};
use async_trait::async_trait;

const NAME: &str = "minimal";

/// Whole file as one chunk, or evenly sized windows when it exceeds the max
pub struct MinimalStrategy {
    descriptor: StrategyDescriptor,
}

impl MinimalStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: StrategyDescriptor::universal(
                NAME,
                "Emits the whole file, windowed only when it exceeds the size limit",
            ),
        }
    }

    pub(crate) fn windows(content: &str, limits: SizeLimits) -> Vec<Segment> {
        let size = content.chars().count();
        if size <= limits.max_chunk_size {
            let line_count = content.lines().count().max(1);
            return vec![Segment {
                start_line: 1,
                end_line: line_count,
                content: content.to_string(),
            }];
        }
        // aim for equal windows so the last one is not a sliver
        let windows = size.div_ceil(limits.max_chunk_size);
        let target = size.div_ceil(windows);
        window_lines(
            content,
            1,
            SizeLimits {
                max_chunk_size: target.min(limits.max_chunk_size).max(1),
                ..limits
            },
        )
        .into_iter()
        .fold(Vec::new(), |mut acc: Vec<Segment>, segment| {
            match acc.last_mut() {
                Some(prev)
                    if prev.end_line + 1 >= segment.start_line
                        && prev.size() + 1 + segment.size() <= limits.max_chunk_size
                        && segment.size() < limits.min_chunk_size =>
                {
                    prev.content.push('\n');
                    prev.content.push_str(&segment.content);
                    prev.end_line = segment.end_line;
                }
                _ => acc.push(segment),
            }
            acc
        })
    }
}

impl Default for MinimalStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentationStrategy for MinimalStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn can_handle(&self, _ctx: &ExecutionContext) -> bool {
        true
    }

    async fn segment(&self, ctx: &ExecutionContext) -> Result<Vec<CodeChunk>> {
        if ctx.content().trim().is_empty() {
            return Err(SegmenterError::strategy(NAME, "content is blank"));
        }
        Ok(Self::windows(ctx.content(), ctx.limits())
            .into_iter()
            .map(|segment| chunk_from_segment(ctx, segment, ChunkType::Generic, NAME))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::ctx_with_limits;

    #[tokio::test]
    async fn whole_file_when_it_fits() {
        let ctx = ctx_with_limits("text", "one\ntwo\nthree", 1, 100);
        let chunks = MinimalStrategy::new().segment(&ctx).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 3));
        assert_eq!(chunks[0].content, "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn evenly_windowed_when_too_large() {
        let content = (0..30).map(|i| format!("line {i:03}")).collect::<Vec<_>>().join("\n");
        let ctx = ctx_with_limits("text", &content, 50, 120);
        let strategy = MinimalStrategy::new();
        let chunks = strategy.segment(&ctx).await.unwrap();
        assert!(chunks.len() >= 3);
        assert!(strategy.validate(&chunks, ctx.limits()));
    }
}
