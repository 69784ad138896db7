//! # Context Segmenter
//!
//! Orchestrates competing code-segmentation strategies into bounded,
//! structurally coherent chunks for indexing and retrieval.
//!
//! ## Architecture
//!
//! ```text
//! Source Code
//!     │
//!     ├──> Resource Guard (memory / error pressure)
//!     │         └─> degraded path: line windows or one emergency chunk
//!     │
//!     ├──> Tree-sitter Parsing → SyntaxTree (when supported)
//!     │
//!     ├──> Strategy Selection
//!     │    ├─> file-type override (markdown, data formats, tests)
//!     │    └─> heuristic score (priority, language, size, content, history)
//!     │
//!     ├──> Execution
//!     │    ├─> cached, timed, validated strategy run
//!     │    └─> bounded fallback chain
//!     │
//!     └──> Post-processing
//!          ├─> flat or hierarchical merge
//!          ├─> overlap injection
//!          └─> chunk-set validation
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use context_segmenter::{ChunkingOptions, ProcessingCoordinator, SegmenterConfig};
//!
//! # async fn run() -> context_segmenter::Result<()> {
//! let coordinator = ProcessingCoordinator::new(SegmenterConfig::default())?;
//!
//! let code = "function f(){}\n\nfunction g(){}";
//! let result = coordinator
//!     .segment(code, "javascript", Some("app.js"), &ChunkingOptions::default())
//!     .await?;
//!
//! for chunk in &result.chunks {
//!     println!("{}-{} via {}", chunk.start_line, chunk.end_line, result.strategy_used);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
pub mod detect;
mod error;
mod executor;
mod guard;
mod language;
mod merge;
pub mod parser;
mod priority;
mod selector;
pub mod strategy;
mod types;

pub use config::{ChunkingOptions, GuardConfig, OptimizationLevel, SegmenterConfig, SizeLimits};
pub use coordinator::{
    ProcessingCoordinator, ProcessingResult, SegmentRequest, HIERARCHICAL, HIERARCHICAL_FAMILIES,
    INVALID_CHUNK_SET,
};
pub use error::{Result, SegmenterError};
pub use executor::{
    cache_key, ExecutionCache, ExecutionCoordinator, ExecutionMetadata, ExecutionResult,
    ALL_STRATEGIES_FAILED,
};
pub use guard::{
    emergency_chunk, Alert, AlertSeverity, HealthReport, HealthStatus, MemoryProbe,
    ProcessMemoryProbe, ResourceGuard, StaticMemoryProbe, ERROR_RATE_EXCEEDED,
    MEMORY_LIMIT_EXCEEDED,
};
pub use language::{FileKind, Language};
pub use merge::{
    dedup, inject_overlap, merge_pass, order_by_type, validate_chunk_set, HierarchicalMerger,
    MergePolicy, SetBounds,
};
pub use parser::{AstParser, ParseOutcome, SyntaxTree, TreeSitterParser};
pub use priority::{
    AdaptiveWeights, ObserverHandle, PerformanceStats, PriorityConfig, PriorityManager,
};
pub use selector::{ContentFeatures, ScoredStrategy, SizeClass, StrategySelector};
pub use strategy::{
    default_strategies, validate_chunks, ExecutionContext, SegmentationStrategy,
    StrategyDescriptor,
};
pub use types::{ChunkMetadata, ChunkType, ChunkingStats, CodeChunk};
