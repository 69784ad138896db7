use super::{
    chunk_from_segment, coalesce_small_chunks, split_oversized, ExecutionContext,
    SegmentationStrategy, StrategyDescriptor,
};
use crate::detect::Segment;
use crate::error::{Result, SegmenterError};
use crate::language::Language;
use crate::parser::{AstParser, NodeCategory, SyntaxNode, SyntaxTree, TreeSitterParser};
use crate::types::{ChunkType, CodeChunk};
use async_trait::async_trait;
use std::sync::Arc;

const NAME: &str = "ast_structural";

/// Top-level syntax nodes as chunks; oversized classes are broken into
/// their members.
pub struct AstStructuralStrategy {
    descriptor: StrategyDescriptor,
    parser: Arc<dyn AstParser>,
}

impl AstStructuralStrategy {
    #[must_use]
    pub fn new(parser: Arc<dyn AstParser>) -> Self {
        Self {
            descriptor: StrategyDescriptor::new(
                NAME,
                ["rust", "python", "javascript", "typescript"],
                "Chunks along top-level syntax nodes from the parsed tree",
            ),
            parser,
        }
    }

    async fn tree(&self, ctx: &ExecutionContext) -> Result<Arc<SyntaxTree>> {
        if let Some(tree) = ctx.ast.as_ref() {
            return Ok(Arc::clone(tree));
        }
        let parser = Arc::clone(&self.parser);
        let content = Arc::clone(&ctx.source_code);
        let language = ctx.lang().as_str().to_string();
        let outcome = tokio::task::spawn_blocking(move || parser.parse(&content, &language))
            .await
            .map_err(|e| SegmenterError::parse(format!("parser task failed: {e}")))?;
        match outcome.tree {
            Some(tree) if outcome.success => Ok(tree),
            _ => Err(SegmenterError::parse(
                outcome.error.unwrap_or_else(|| "no syntax tree".to_string()),
            )),
        }
    }

    fn node_chunk(ctx: &ExecutionContext, tree: &SyntaxTree, node: &SyntaxNode) -> CodeChunk {
        let location = tree.node_location(node);
        let segment = Segment {
            start_line: location.start_line,
            end_line: location.end_line,
            content: tree.node_text(node, ctx.content()).to_string(),
        };
        let chunk_type = node.category.chunk_type();
        let mut chunk = chunk_from_segment(ctx, segment, chunk_type, NAME);
        if let Some(name) = tree.node_name(node) {
            chunk.metadata = match node.category {
                NodeCategory::Function | NodeCategory::Method => chunk.metadata.function_name(name),
                NodeCategory::Class => chunk.metadata.class_name(name),
                _ => chunk.metadata,
            };
        }
        if let Some(parent) = node.parent.as_deref() {
            if chunk_type == ChunkType::Method || chunk_type == ChunkType::Property {
                chunk.metadata = chunk.metadata.class_name(parent);
            }
        }
        chunk
    }

    /// Consecutive import nodes become one chunk
    fn push_merging_imports(chunks: &mut Vec<CodeChunk>, chunk: CodeChunk) {
        if chunk.chunk_type() == ChunkType::Import {
            if let Some(prev) = chunks.last_mut() {
                if prev.chunk_type() == ChunkType::Import && chunk.start_line <= prev.end_line + 2 {
                    prev.content.push('\n');
                    prev.content.push_str(&chunk.content);
                    prev.end_line = chunk.end_line;
                    return;
                }
            }
        }
        chunks.push(chunk);
    }
}

#[async_trait]
impl SegmentationStrategy for AstStructuralStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn can_handle(&self, ctx: &ExecutionContext) -> bool {
        ctx.ast.is_some() || (ctx.lang().supports_ast() && self.parser.supports(ctx.lang().as_str()))
    }

    async fn segment(&self, ctx: &ExecutionContext) -> Result<Vec<CodeChunk>> {
        let tree = self.tree(ctx).await?;
        let limits = ctx.limits();

        let mut chunks = Vec::new();
        for node in tree.top_level() {
            let chunk = Self::node_chunk(ctx, &tree, node);
            let members: Vec<&SyntaxNode> = tree.members_of(node).collect();
            if chunk.size() > limits.max_chunk_size && !members.is_empty() {
                for member in members {
                    let member_chunk = Self::node_chunk(ctx, &tree, member);
                    chunks.extend(split_oversized(member_chunk, limits));
                }
                continue;
            }
            for piece in split_oversized(chunk, limits) {
                Self::push_merging_imports(&mut chunks, piece);
            }
        }

        if chunks.is_empty() {
            return Err(SegmenterError::parse("syntax tree has no structural nodes"));
        }
        chunks.sort_by_key(|c| c.start_line);
        Ok(coalesce_small_chunks(chunks, limits))
    }

    fn supported_node_types(&self, language: Language) -> &'static [&'static str] {
        TreeSitterParser::supported_node_types(language)
    }

    fn consumes_ast(&self) -> bool {
        true
    }
}
