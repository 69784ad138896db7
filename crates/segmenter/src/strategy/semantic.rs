use super::{chunk_from_segment, ExecutionContext, SegmentationStrategy, StrategyDescriptor};
use crate::detect::semantic::split_semantically;
use crate::error::{Result, SegmenterError};
use crate::types::{ChunkType, CodeChunk};
use async_trait::async_trait;

const NAME: &str = "semantic_score";

/// Cuts before definition and import lines
pub struct SemanticScoreStrategy {
    descriptor: StrategyDescriptor,
}

impl SemanticScoreStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: StrategyDescriptor::universal(
                NAME,
                "Scores lines by semantic weight and cuts before strong boundaries",
            ),
        }
    }
}

impl Default for SemanticScoreStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentationStrategy for SemanticScoreStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn can_handle(&self, ctx: &ExecutionContext) -> bool {
        ctx.lang().is_code()
    }

    async fn segment(&self, ctx: &ExecutionContext) -> Result<Vec<CodeChunk>> {
        let chunks: Vec<CodeChunk> = split_semantically(ctx.content(), ctx.limits(), ctx.lang())
            .into_iter()
            .map(|segment| chunk_from_segment(ctx, segment, ChunkType::Generic, NAME))
            .collect();
        if chunks.is_empty() {
            return Err(SegmenterError::strategy(NAME, "no segments produced"));
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::{ctx, ctx_with_limits};

    #[tokio::test]
    async fn segments_python_by_definitions() {
        let code = "import os\n\ndef a():\n    return os.getcwd()\n\ndef b():\n    return 2\n";
        let ctx = ctx_with_limits("python", code, 20, 500);
        let chunks = SemanticScoreStrategy::new().segment(&ctx).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].start_line, 6);
    }

    #[test]
    fn code_only() {
        assert!(!SemanticScoreStrategy::new().can_handle(&ctx("markdown", "# hi")));
    }
}
