use super::{chunk_from_segment, ExecutionContext, SegmentationStrategy, StrategyDescriptor};
use crate::detect::patterns::indentation;
use crate::detect::{coalesce_segments, window_lines, Segment, SegmentBuilder};
use crate::error::{Result, SegmenterError};
use crate::language::{FileKind, Language};
use crate::types::{ChunkType, CodeChunk};
use async_trait::async_trait;

const NAME: &str = "data_format";

fn is_json_key(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('"') && trimmed.contains("\":")
}

fn is_open_tag(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('<')
        && !trimmed.starts_with("</")
        && !trimmed.starts_with("<?")
        && !trimmed.starts_with("<!")
}

fn is_yaml_top_level(line: &str) -> bool {
    if line.starts_with("---") {
        return true;
    }
    let Some(first) = line.chars().next() else {
        return false;
    };
    !first.is_whitespace() && first != '#' && first != '-' && line.contains(':')
}

/// Per-line "starts a top-level section" predicate for a format
fn section_starts(content: &str, language: Language) -> Vec<bool> {
    let lines: Vec<&str> = content.lines().collect();
    match language {
        Language::Toml => lines
            .iter()
            .map(|l| l.starts_with('[') && l.trim_end().ends_with(']'))
            .collect(),
        Language::Yaml => lines.iter().map(|l| is_yaml_top_level(l)).collect(),
        Language::Json => {
            let depth = lines
                .iter()
                .filter(|l| is_json_key(l))
                .map(|l| indentation(l))
                .min();
            lines
                .iter()
                .map(|l| is_json_key(l) && Some(indentation(l)) == depth)
                .collect()
        }
        _ => {
            // markup: children of the root element share the smallest
            // indentation among all opening tags after the first
            let depth = lines
                .iter()
                .filter(|l| is_open_tag(l))
                .skip(1)
                .map(|l| indentation(l))
                .min();
            lines
                .iter()
                .map(|l| is_open_tag(l) && Some(indentation(l)) == depth)
                .collect()
        }
    }
}

fn split_sections(content: &str, language: Language) -> Vec<Segment> {
    let starts = section_starts(content, language);
    let mut builder = SegmentBuilder::new();
    let mut segments = Vec::new();
    for ((idx, line), starts_section) in content.lines().enumerate().zip(starts) {
        if starts_section {
            builder.flush(&mut segments);
        }
        builder.push(idx + 1, line);
    }
    builder.flush(&mut segments);
    segments
}

/// Structured data and markup split into top-level sections
pub struct DataFormatStrategy {
    descriptor: StrategyDescriptor,
}

impl DataFormatStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: StrategyDescriptor::new(
                NAME,
                ["json", "yaml", "toml", "xml", "html"],
                "Splits JSON/YAML/TOML/XML/HTML into top-level sections",
            ),
        }
    }
}

impl Default for DataFormatStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentationStrategy for DataFormatStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn can_handle(&self, ctx: &ExecutionContext) -> bool {
        matches!(ctx.file_kind(), FileKind::Markup | FileKind::StructuredConfig)
    }

    async fn segment(&self, ctx: &ExecutionContext) -> Result<Vec<CodeChunk>> {
        let limits = ctx.limits();
        let pieces: Vec<Segment> = split_sections(ctx.content(), ctx.lang())
            .into_iter()
            .flat_map(|section| {
                if section.size() > limits.max_chunk_size {
                    window_lines(&section.content, section.start_line, limits)
                } else {
                    vec![section]
                }
            })
            .collect();

        let chunks: Vec<CodeChunk> = coalesce_segments(pieces, limits)
            .into_iter()
            .map(|segment| chunk_from_segment(ctx, segment, ChunkType::Declaration, NAME))
            .collect();
        if chunks.is_empty() {
            return Err(SegmenterError::strategy(NAME, "document has no content"));
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::ctx_with_limits;

    async fn ranges(language: &str, content: &str) -> Vec<(usize, usize)> {
        let ctx = ctx_with_limits(language, content, 1, 2000);
        DataFormatStrategy::new()
            .segment(&ctx)
            .await
            .unwrap()
            .iter()
            .map(|c| (c.start_line, c.end_line))
            .collect()
    }

    #[tokio::test]
    async fn toml_tables() {
        let doc = "title = \"x\"\n\n[server]\nport = 1\n\n[client]\nretries = 2\n";
        assert_eq!(ranges("toml", doc).await, vec![(1, 2), (3, 5), (6, 7)]);
    }

    #[tokio::test]
    async fn yaml_keys() {
        let doc = "name: app\nservices:\n  web:\n    image: nginx\nvolumes:\n  - data\n";
        assert_eq!(ranges("yaml", doc).await, vec![(1, 1), (2, 4), (5, 6)]);
    }

    #[tokio::test]
    async fn json_top_level_keys() {
        let doc = "{\n  \"a\": 1,\n  \"b\": {\n    \"c\": 2\n  }\n}";
        assert_eq!(ranges("json", doc).await, vec![(1, 1), (2, 2), (3, 6)]);
    }

    #[tokio::test]
    async fn xml_children() {
        let doc = "<root>\n  <a>1</a>\n  <b>\n    <c/>\n  </b>\n</root>";
        assert_eq!(ranges("xml", doc).await, vec![(1, 1), (2, 2), (3, 6)]);
    }
}
