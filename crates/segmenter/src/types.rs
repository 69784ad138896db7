use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bounded slice of source text with structural metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeChunk {
    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// The chunk text
    pub content: String,

    /// Structural metadata and provenance
    pub metadata: ChunkMetadata,
}

impl CodeChunk {
    /// Create a new code chunk
    #[must_use]
    pub const fn new(
        start_line: usize,
        end_line: usize,
        content: String,
        metadata: ChunkMetadata,
    ) -> Self {
        Self {
            start_line,
            end_line,
            content,
            metadata,
        }
    }

    /// Get the number of lines in this chunk
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Content length in characters
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.chars().count()
    }

    /// Check if chunk contains a specific line
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// `start_line <= end_line` and the content is not empty
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.start_line >= 1 && self.start_line <= self.end_line && !self.content.is_empty()
    }

    #[must_use]
    pub const fn chunk_type(&self) -> ChunkType {
        self.metadata.chunk_type
    }
}

/// Metadata about a code chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Language name as supplied by the caller
    pub language: String,

    /// Structural kind
    pub chunk_type: ChunkType,

    /// Complexity score (see `detect::complexity`)
    pub complexity: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    /// Imported modules / referenced names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Strategy that produced the chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Part index when an oversized unit was split
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<usize>,

    /// Trailing content borrowed from the next chunk
    #[serde(default)]
    pub has_overlap: bool,

    #[serde(default)]
    pub overlap_size: usize,

    /// Number of source chunks folded into this one by a merge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_types: Vec<ChunkType>,

    /// Produced by a guard/emergency path
    #[serde(default)]
    pub fallback: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,

    /// Free-form extension fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ChunkMetadata {
    /// Create metadata with language only
    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Default::default()
        }
    }

    /// Builder: set chunk type
    #[must_use]
    pub const fn chunk_type(mut self, chunk_type: ChunkType) -> Self {
        self.chunk_type = chunk_type;
        self
    }

    /// Builder: set complexity
    #[must_use]
    pub const fn complexity(mut self, complexity: u32) -> Self {
        self.complexity = complexity;
        self
    }

    /// Builder: set file path
    #[must_use]
    pub fn file_path(mut self, path: Option<&str>) -> Self {
        self.file_path = path.map(str::to_string);
        self
    }

    /// Builder: set function name
    #[must_use]
    pub fn function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    /// Builder: set class name
    #[must_use]
    pub fn class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = Some(name.into());
        self
    }

    /// Builder: add dependency
    #[must_use]
    pub fn add_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Builder: set producing strategy
    #[must_use]
    pub fn strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy = Some(name.into());
        self
    }
}

/// Structural kind of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Module,
    Class,
    Function,
    Method,
    Property,
    Declaration,
    Import,
    Export,
    Documentation,
    #[default]
    Generic,
}

impl ChunkType {
    pub const ALL: [Self; 10] = [
        Self::Module,
        Self::Class,
        Self::Function,
        Self::Method,
        Self::Property,
        Self::Declaration,
        Self::Import,
        Self::Export,
        Self::Documentation,
        Self::Generic,
    ];

    /// Position in the hierarchical merge order; `None` sorts last
    #[must_use]
    pub const fn merge_rank(self) -> Option<u8> {
        match self {
            Self::Module => Some(0),
            Self::Class => Some(1),
            Self::Function => Some(2),
            Self::Method => Some(3),
            Self::Property => Some(4),
            Self::Declaration => Some(5),
            Self::Import | Self::Export | Self::Documentation | Self::Generic => None,
        }
    }

    /// Whether a chunk of `other` type may join a merge group ending in `self`
    #[must_use]
    pub const fn is_compatible_with(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Module, Self::Module)
                | (Self::Class, Self::Class)
                | (Self::Function, Self::Function)
                | (Self::Method, Self::Method)
                | (Self::Property, Self::Property)
                | (Self::Declaration, Self::Declaration)
                | (Self::Import, Self::Import)
                | (Self::Export, Self::Export)
                | (Self::Documentation, Self::Documentation)
                | (Self::Generic, Self::Generic)
                | (Self::Function, Self::Method)
                | (Self::Method, Self::Function)
                | (Self::Class, Self::Declaration)
                | (Self::Declaration, Self::Class)
                | (Self::Module, Self::Declaration)
                | (Self::Declaration, Self::Module)
        )
    }

    /// Plausible complexity range for a candidate chunk of this type
    #[must_use]
    pub const fn complexity_bounds(self) -> (u32, u32) {
        match self {
            Self::Function | Self::Method => (5, 300),
            Self::Class => (5, 500),
            Self::Module => (1, 1000),
            Self::Documentation => (1, 100),
            Self::Import | Self::Export => (1, 100),
            Self::Property => (1, 100),
            Self::Declaration => (1, 200),
            Self::Generic => (1, 1000),
        }
    }

    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
            Self::Property => "property",
            Self::Declaration => "declaration",
            Self::Import => "import",
            Self::Export => "export",
            Self::Documentation => "documentation",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics about a chunk set
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_lines: usize,
    pub total_chars: usize,
    pub avg_chars_per_chunk: usize,
    pub min_chars: usize,
    pub max_chars: usize,
}

impl ChunkingStats {
    #[must_use]
    pub fn from_chunks(chunks: &[CodeChunk]) -> Self {
        let sizes: Vec<usize> = chunks.iter().map(CodeChunk::size).collect();
        let total_chars: usize = sizes.iter().sum();
        Self {
            total_chunks: chunks.len(),
            total_lines: chunks.iter().map(CodeChunk::line_count).sum(),
            total_chars,
            avg_chars_per_chunk: if chunks.is_empty() {
                0
            } else {
                total_chars / chunks.len()
            },
            min_chars: sizes.iter().copied().min().unwrap_or(0),
            max_chars: sizes.iter().copied().max().unwrap_or(0),
        }
    }
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Lines: {} | Chars: {} | Avg: {} | Range: {}-{}",
            self.total_chunks,
            self.total_lines,
            self.total_chars,
            self.avg_chars_per_chunk,
            self.min_chars,
            self.max_chars
        )
    }
}
