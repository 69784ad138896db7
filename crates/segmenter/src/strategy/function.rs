use super::blocks::{find_blocks, BlockKind};
use super::{
    chunk_from_segment, coalesce_small_chunks, line_range, split_oversized, ExecutionContext,
    SegmentationStrategy, StrategyDescriptor,
};
use crate::detect::complexity::is_plausible;
use crate::detect::patterns::is_function_definition;
use crate::detect::Segment;
use crate::error::{Result, SegmenterError};
use crate::language::Language;
use crate::parser::{NodeCategory, TreeSitterParser};
use crate::types::{ChunkType, CodeChunk};
use async_trait::async_trait;

const NAME: &str = "function_extract";

/// One chunk per function or method
pub struct FunctionExtractStrategy {
    descriptor: StrategyDescriptor,
}

impl FunctionExtractStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: StrategyDescriptor::universal(
                NAME,
                "Extracts each function/method definition as its own chunk",
            ),
        }
    }

    fn from_tree(ctx: &ExecutionContext) -> Option<Vec<CodeChunk>> {
        let tree = ctx.ast.as_ref()?;
        let content = ctx.content();
        let chunks: Vec<CodeChunk> = tree
            .functions()
            .filter(|node| node.depth <= 1)
            .map(|node| {
                let location = tree.node_location(node);
                let segment = Segment {
                    start_line: location.start_line,
                    end_line: location.end_line,
                    content: tree.node_text(node, content).to_string(),
                };
                let chunk_type = if node.category == NodeCategory::Method {
                    ChunkType::Method
                } else {
                    ChunkType::Function
                };
                let mut chunk = chunk_from_segment(ctx, segment, chunk_type, NAME);
                if let Some(name) = tree.node_name(node) {
                    chunk.metadata = chunk.metadata.function_name(name);
                }
                if let Some(parent) = node.parent.as_deref() {
                    if chunk_type == ChunkType::Method {
                        chunk.metadata = chunk.metadata.class_name(parent);
                    }
                }
                chunk
            })
            .collect();
        (!chunks.is_empty()).then_some(chunks)
    }

    fn from_text(ctx: &ExecutionContext) -> Vec<CodeChunk> {
        let content = ctx.content();
        let lang = ctx.lang();
        let classes = find_blocks(content, lang, BlockKind::Class);
        let functions = find_blocks(content, lang, BlockKind::Function);

        functions
            .into_iter()
            .map(|block| {
                let segment = Segment {
                    start_line: block.start_line,
                    end_line: block.end_line,
                    content: line_range(content, block.start_line, block.end_line),
                };
                let owner = classes
                    .iter()
                    .find(|c| c.encloses(&block) && c.start_line != block.start_line);
                let chunk_type = if owner.is_some() {
                    ChunkType::Method
                } else {
                    ChunkType::Function
                };
                let mut chunk = chunk_from_segment(ctx, segment, chunk_type, NAME);
                if let Some(name) = block.name {
                    chunk.metadata = chunk.metadata.function_name(name);
                }
                if let Some(class_name) = owner.and_then(|c| c.name.clone()) {
                    chunk.metadata = chunk.metadata.class_name(class_name);
                }
                chunk
            })
            .collect()
    }
}

impl Default for FunctionExtractStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentationStrategy for FunctionExtractStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn can_handle(&self, ctx: &ExecutionContext) -> bool {
        if !ctx.lang().is_code() {
            return false;
        }
        match ctx.ast.as_ref() {
            Some(tree) if tree.functions().next().is_some() => true,
            _ => ctx.content().lines().any(is_function_definition),
        }
    }

    async fn segment(&self, ctx: &ExecutionContext) -> Result<Vec<CodeChunk>> {
        let limits = ctx.limits();
        let extracted = Self::from_tree(ctx).unwrap_or_else(|| Self::from_text(ctx));

        let chunks: Vec<CodeChunk> = extracted
            .into_iter()
            .filter(|chunk| is_plausible(chunk.chunk_type(), &chunk.content))
            .flat_map(|chunk| split_oversized(chunk, limits))
            .collect();

        if chunks.is_empty() {
            return Err(SegmenterError::strategy(NAME, "no functions found"));
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
    use crate::parser::AstParser;
    use crate::strategy::test_support::{ctx, ctx_with_limits};

    #[tokio::test]
    async fn extracts_two_small_functions() {
        let ctx = ctx("javascript", "function f(){}\n\nfunction g(){}");
        let strategy = FunctionExtractStrategy::new();
        assert!(strategy.can_handle(&ctx));

        let chunks = strategy.segment(&ctx).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 1));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (3, 3));
        assert_eq!(chunks[1].metadata.function_name.as_deref(), Some("g"));
        assert!(strategy.validate(&chunks, ctx.limits()));
    }

    #[tokio::test]
    async fn uses_syntax_tree_when_present() {
        let code = "struct S;\n\nimpl S {\n    fn a(&self) -> u32 {\n        1\n    }\n}\n\nfn main() {\n    S.a();\n}\n";
        let outcome = TreeSitterParser::new().parse(code, "rust");
        let ctx = ctx("rust", code).with_ast(outcome.tree);

        let chunks = FunctionExtractStrategy::new().segment(&ctx).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_type(), ChunkType::Method);
        assert_eq!(chunks[0].metadata.class_name.as_deref(), Some("S"));
        assert_eq!(chunks[1].metadata.function_name.as_deref(), Some("main"));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (9, 11));
    }

    #[tokio::test]
    async fn detects_python_methods_from_text() {
        let code = "class A:\n    def m(self):\n        return 1\n\ndef top():\n    return 2\n";
        let chunks = FunctionExtractStrategy::new()
            .segment(&ctx("python", code))
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_type(), ChunkType::Method);
        assert_eq!(chunks[0].metadata.class_name.as_deref(), Some("A"));
        assert_eq!(chunks[1].chunk_type(), ChunkType::Function);
    }

    #[tokio::test]
    async fn splits_oversized_function() {
        let body = (0..30)
            .map(|i| format!("  if (x > {i}) {{ total += {i}; }}"))
            .collect::<Vec<_>>()
            .join("\n");
        let code = format!("function big() {{\n{body}\n}}");
        let ctx = ctx_with_limits("javascript", &code, 10, 300);
        let chunks = FunctionExtractStrategy::new().segment(&ctx).await.unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.size() <= 300));
        assert_eq!(chunks[0].metadata.part, Some(1));
    }

    #[test]
    fn rejects_non_code() {
        let ctx = ctx("markdown", "# function f() {}");
        assert!(!FunctionExtractStrategy::new().can_handle(&ctx));
    }
}
