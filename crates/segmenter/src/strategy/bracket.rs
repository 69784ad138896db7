use super::{chunk_from_segment, ExecutionContext, SegmentationStrategy, StrategyDescriptor};
use crate::detect::bracket::{split_by_brackets, BracketConfig};
use crate::error::{Result, SegmenterError};
use crate::types::{ChunkType, CodeChunk};
use async_trait::async_trait;

const NAME: &str = "bracket_balance";

/// Cuts where bracket counts balance out
pub struct BracketBalanceStrategy {
    descriptor: StrategyDescriptor,
    max_imbalance: usize,
}

impl BracketBalanceStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: StrategyDescriptor::universal(
                NAME,
                "Splits at points where bracket pairs are balanced",
            ),
            max_imbalance: BracketConfig::default().max_imbalance,
        }
    }

    #[must_use]
    pub const fn with_max_imbalance(mut self, max_imbalance: usize) -> Self {
        self.max_imbalance = max_imbalance;
        self
    }
}

impl Default for BracketBalanceStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentationStrategy for BracketBalanceStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn can_handle(&self, ctx: &ExecutionContext) -> bool {
        ctx.content()
            .chars()
            .any(|c| matches!(c, '{' | '}' | '(' | ')' | '[' | ']'))
    }

    async fn segment(&self, ctx: &ExecutionContext) -> Result<Vec<CodeChunk>> {
        let config = BracketConfig {
            max_imbalance: self.max_imbalance,
            ..BracketConfig::with_limits(ctx.limits())
        };
        let chunks: Vec<CodeChunk> = split_by_brackets(ctx.content(), &config, ctx.lang())
            .into_iter()
            .map(|segment| chunk_from_segment(ctx, segment, ChunkType::Generic, NAME))
            .collect();
        if chunks.is_empty() {
            return Err(SegmenterError::strategy(NAME, "no segments produced"));
        }
        Ok(chunks)
    }
}
