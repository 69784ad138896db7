use super::blocks::{find_blocks, BlockKind};
use super::{
    chunk_from_segment, coalesce_small_chunks, line_range, split_oversized, ExecutionContext,
    SegmentationStrategy, StrategyDescriptor,
};
use crate::detect::complexity::is_plausible;
use crate::detect::patterns::is_class_definition;
use crate::detect::Segment;
use crate::error::{Result, SegmenterError};
use crate::language::Language;
use crate::parser::TreeSitterParser;
use crate::types::{ChunkType, CodeChunk};
use async_trait::async_trait;

const NAME: &str = "class_extract";

/// One chunk per class-like definition (class, struct, trait, impl, interface)
pub struct ClassExtractStrategy {
    descriptor: StrategyDescriptor,
}

impl ClassExtractStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: StrategyDescriptor::universal(
                NAME,
                "Extracts class, struct, trait and interface definitions",
            ),
        }
    }

    fn class_chunk(ctx: &ExecutionContext, segment: Segment, name: Option<&str>) -> CodeChunk {
        let mut chunk = chunk_from_segment(ctx, segment, ChunkType::Class, NAME);
        if let Some(name) = name {
            chunk.metadata = chunk.metadata.class_name(name);
        }
        chunk
    }

    fn from_tree(ctx: &ExecutionContext) -> Option<Vec<CodeChunk>> {
        let tree = ctx.ast.as_ref()?;
        let content = ctx.content();
        let chunks: Vec<CodeChunk> = tree
            .classes()
            .filter(|node| node.depth == 0)
            .map(|node| {
                let location = tree.node_location(node);
                let segment = Segment {
                    start_line: location.start_line,
                    end_line: location.end_line,
                    content: tree.node_text(node, content).to_string(),
                };
                Self::class_chunk(ctx, segment, tree.node_name(node))
            })
            .collect();
        (!chunks.is_empty()).then_some(chunks)
    }

    fn from_text(ctx: &ExecutionContext) -> Vec<CodeChunk> {
        let content = ctx.content();
        find_blocks(content, ctx.lang(), BlockKind::Class)
            .into_iter()
            .map(|block| {
                let segment = Segment {
                    start_line: block.start_line,
                    end_line: block.end_line,
                    content: line_range(content, block.start_line, block.end_line),
                };
                Self::class_chunk(ctx, segment, block.name.as_deref())
            })
            .collect()
    }
}

impl Default for ClassExtractStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentationStrategy for ClassExtractStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn can_handle(&self, ctx: &ExecutionContext) -> bool {
        if !ctx.lang().is_code() {
            return false;
        }
        match ctx.ast.as_ref() {
            Some(tree) if tree.classes().next().is_some() => true,
            _ => ctx.content().lines().any(is_class_definition),
        }
    }

    async fn segment(&self, ctx: &ExecutionContext) -> Result<Vec<CodeChunk>> {
        let limits = ctx.limits();
        let extracted = Self::from_tree(ctx).unwrap_or_else(|| Self::from_text(ctx));

        let chunks: Vec<CodeChunk> = extracted
            .into_iter()
            .filter(|chunk| is_plausible(ChunkType::Class, &chunk.content))
            .flat_map(|chunk| split_oversized(chunk, limits))
            .collect();

        if chunks.is_empty() {
            return Err(SegmenterError::strategy(NAME, "no classes found"));
        }
        Ok(coalesce_small_chunks(chunks, limits))
    }

    fn supported_node_types(&self, language: Language) -> &'static [&'static str] {
        TreeSitterParser::supported_node_types(language)
    }

    fn consumes_ast(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::ctx;

    #[tokio::test]
    async fn extracts_javascript_class() {
        let code = "import x from 'x';\n\nclass Greeter {\n  greet(name) {\n    return `hi ${name}`;\n  }\n}\n";
        let chunks = ClassExtractStrategy::new()
            .segment(&ctx("javascript", code))
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (3, 7));
        assert_eq!(chunks[0].metadata.class_name.as_deref(), Some("Greeter"));
        assert_eq!(chunks[0].chunk_type(), ChunkType::Class);
    }

    #[tokio::test]
    async fn no_classes_is_an_error() {
        let result = ClassExtractStrategy::new()
            .segment(&ctx("javascript", "const x = 1;"))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn can_handle_requires_a_class() {
        let strategy = ClassExtractStrategy::new();
        assert!(strategy.can_handle(&ctx("rust", "pub struct Point { x: i32 }")));
        assert!(!strategy.can_handle(&ctx("rust", "fn main() {}")));
    }
}
