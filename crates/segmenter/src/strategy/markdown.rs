use super::{chunk_from_segment, ExecutionContext, SegmentationStrategy, StrategyDescriptor};
use crate::detect::{coalesce_segments, window_lines, Segment, SegmentBuilder};
use crate::error::{Result, SegmenterError};
use crate::language::{FileKind, Language};
use crate::types::{ChunkType, CodeChunk};
use async_trait::async_trait;

const NAME: &str = "markdown";

fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &trimmed[level..];
    (rest.is_empty() || rest.starts_with(' ')).then(|| rest.trim())
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Heading-delimited sections; headings inside code fences do not count
fn sections(content: &str) -> Vec<Segment> {
    let mut builder = SegmentBuilder::new();
    let mut segments = Vec::new();
    let mut in_fence = false;

    for (idx, line) in content.lines().enumerate() {
        if is_fence(line) {
            in_fence = !in_fence;
        } else if !in_fence && heading_text(line).is_some() {
            builder.flush(&mut segments);
        }
        builder.push(idx + 1, line);
    }
    builder.flush(&mut segments);
    segments
}

/// Markdown documents split by heading, fenced code kept with its section
pub struct MarkdownStrategy {
    descriptor: StrategyDescriptor,
}

impl MarkdownStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: StrategyDescriptor::new(
                NAME,
                ["markdown", "md"],
                "Splits markdown at headings, keeping code fences intact",
            ),
        }
    }
}

impl Default for MarkdownStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentationStrategy for MarkdownStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn can_handle(&self, ctx: &ExecutionContext) -> bool {
        ctx.lang() == Language::Markdown || ctx.file_kind() == FileKind::Markdown
    }

    async fn segment(&self, ctx: &ExecutionContext) -> Result<Vec<CodeChunk>> {
        let limits = ctx.limits();
        let pieces: Vec<Segment> = sections(ctx.content())
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
            .map(|segment| {
                let heading = segment
                    .content
                    .lines()
                    .find_map(heading_text)
                    .map(str::to_string);
                let mut chunk = chunk_from_segment(ctx, segment, ChunkType::Documentation, NAME);
                if let Some(heading) = heading {
                    chunk
                        .metadata
                        .extra
                        .insert("heading".to_string(), serde_json::Value::String(heading));
                }
                chunk
            })
            .collect();

        if chunks.is_empty() {
            return Err(SegmenterError::strategy(NAME, "document has no content"));
        }
        Ok(chunks)
    }
}
