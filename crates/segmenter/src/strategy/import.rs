use super::{
    chunk_from_segment, coalesce_small_chunks, ExecutionContext, SegmentationStrategy,
    StrategyDescriptor,
};
use crate::detect::patterns::{is_blank, is_import};
use crate::detect::window_lines;
use crate::error::{Result, SegmenterError};
use crate::types::{ChunkType, CodeChunk};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

const NAME: &str = "import_group";

fn module_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?:from\s+['"]?(?P<from>[\w@./-]+)|require(?:_relative)?\s*\(?\s*['"](?P<req>[^'"]+)|import\s+['"](?P<bare>[^'"]+)|^\s*import\s+(?P<py>[\w.]+)\s*$|use\s+(?P<rs>[\w:]+)|#include\s+[<"](?P<inc>[^>"]+))"#,
        )
        .expect("static regex is valid")
    })
}

/// Referenced module of an import line
fn imported_module(line: &str) -> Option<String> {
    let caps = module_re().captures(line)?;
    ["from", "req", "bare", "py", "rs", "inc"]
        .iter()
        .find_map(|group| caps.name(group))
        .map(|m| m.as_str().trim_end_matches("::").to_string())
}

/// Groups runs of import statements into import chunks
pub struct ImportGroupStrategy {
    descriptor: StrategyDescriptor,
}

impl ImportGroupStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: StrategyDescriptor::universal(
                NAME,
                "Groups contiguous import statements with their dependencies",
            ),
        }
    }

    /// Contiguous import runs; blank lines inside a run are kept
    fn import_runs(content: &str) -> Vec<(usize, usize)> {
        let mut runs = Vec::new();
        let mut current: Option<(usize, usize)> = None;
        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            if is_import(line) {
                current = Some(current.map_or((line_no, line_no), |(start, _)| (start, line_no)));
            } else if !is_blank(line) {
                if let Some(run) = current.take() {
                    runs.push(run);
                }
            }
        }
        runs.extend(current);
        runs
    }
}

impl Default for ImportGroupStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentationStrategy for ImportGroupStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn can_handle(&self, ctx: &ExecutionContext) -> bool {
        ctx.lang().is_code() && ctx.content().lines().any(is_import)
    }

    async fn segment(&self, ctx: &ExecutionContext) -> Result<Vec<CodeChunk>> {
        let content = ctx.content();
        let limits = ctx.limits();
        let lines: Vec<&str> = content.lines().collect();

        let mut chunks = Vec::new();
        for (start, end) in Self::import_runs(content) {
            let run = lines[start - 1..end].join("\n");
            for segment in window_lines(&run, start, limits) {
                let deps: Vec<String> = segment
                    .content
                    .lines()
                    .filter(|l| is_import(l))
                    .filter_map(imported_module)
                    .collect();
                let mut chunk = chunk_from_segment(ctx, segment, ChunkType::Import, NAME);
                for dep in deps {
                    chunk.metadata = chunk.metadata.add_dependency(dep);
                }
                chunks.push(chunk);
            }
        }

        if chunks.is_empty() {
            return Err(SegmenterError::strategy(NAME, "no import statements"));
        }
        Ok(coalesce_small_chunks(chunks, limits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::ctx;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_module_names() {
        assert_eq!(imported_module("import React from 'react';").as_deref(), Some("react"));
        assert_eq!(imported_module("from os.path import join").as_deref(), Some("os.path"));
        assert_eq!(imported_module("import os").as_deref(), Some("os"));
        assert_eq!(imported_module("use std::sync::Arc;").as_deref(), Some("std::sync::Arc"));
        assert_eq!(imported_module("const fs = require('fs');").as_deref(), Some("fs"));
        assert_eq!(imported_module("#include <stdio.h>").as_deref(), Some("stdio.h"));
    }

    #[tokio::test]
    async fn groups_contiguous_imports() {
        let code = "import a from 'a';\nimport b from 'b';\n\nimport c from 'c';\n\nconst x = 1;\nimport d from 'd';\n";
        let chunks = ImportGroupStrategy::new()
            .segment(&ctx("javascript", code))
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 4));
        assert_eq!(chunks[0].metadata.dependencies, vec!["a", "b", "c"]);
        assert_eq!(chunks[1].start_line, 7);
        assert_eq!(chunks[1].chunk_type(), ChunkType::Import);
    }

    #[test]
    fn needs_imports() {
        assert!(!ImportGroupStrategy::new().can_handle(&ctx("python", "x = 1")));
        assert!(ImportGroupStrategy::new().can_handle(&ctx("python", "import os")));
    }
}
