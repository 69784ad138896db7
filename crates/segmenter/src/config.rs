use crate::error::{Result, SegmenterError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request chunking options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingOptions {
    /// Maximum chunk size in characters (hard limit)
    pub max_chunk_size: usize,

    /// Minimum chunk size in characters
    pub min_chunk_size: usize,

    /// Upper bound for injected overlap, in characters
    pub overlap_size: usize,

    /// Overlap budget as a fraction of `max_chunk_size`
    pub max_overlap_ratio: f64,

    /// Line budget for the line-based strategy
    pub max_lines_per_chunk: usize,

    /// Avoid cutting inside a function body when a split is optional
    pub preserve_function_boundaries: bool,

    /// Avoid cutting inside a class body when a split is optional
    pub preserve_class_boundaries: bool,

    pub optimization_level: OptimizationLevel,

    /// Run exactly this strategy, bypassing selection and fallback
    pub force_strategy: Option<String>,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 2000,
            min_chunk_size: 100,
            overlap_size: 100,
            max_overlap_ratio: 0.1,
            max_lines_per_chunk: 50,
            preserve_function_boundaries: true,
            preserve_class_boundaries: true,
            optimization_level: OptimizationLevel::Medium,
            force_strategy: None,
        }
    }
}

impl ChunkingOptions {
    /// Single strategy, no post-processing
    pub fn for_speed() -> Self {
        Self {
            optimization_level: OptimizationLevel::Low,
            ..Default::default()
        }
    }

    /// Multi-strategy run with hierarchical merge
    pub fn for_quality() -> Self {
        Self {
            optimization_level: OptimizationLevel::High,
            ..Default::default()
        }
    }

    /// Validate options
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(SegmenterError::invalid_config("max_chunk_size must be > 0"));
        }

        if self.min_chunk_size > self.max_chunk_size {
            return Err(SegmenterError::invalid_config(format!(
                "min_chunk_size ({}) cannot exceed max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            )));
        }

        if !(0.0..=1.0).contains(&self.max_overlap_ratio) {
            return Err(SegmenterError::invalid_config(format!(
                "max_overlap_ratio ({}) must be within [0, 1]",
                self.max_overlap_ratio
            )));
        }

        if self.max_lines_per_chunk == 0 {
            return Err(SegmenterError::invalid_config(
                "max_lines_per_chunk must be > 0",
            ));
        }

        Ok(())
    }

    #[must_use]
    pub const fn limits(&self) -> SizeLimits {
        SizeLimits {
            min_chunk_size: self.min_chunk_size,
            max_chunk_size: self.max_chunk_size,
        }
    }

    /// Overlap budget in characters: `min(overlap_size, max_chunk_size * ratio)`
    #[must_use]
    pub fn overlap_budget(&self) -> usize {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let by_ratio = (self.max_chunk_size as f64 * self.max_overlap_ratio).floor() as usize;
        self.overlap_size.min(by_ratio)
    }
}

/// How much post-processing the coordinator applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    Low,
    #[default]
    Medium,
    High,
}

/// Size bounds a chunk set is validated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SizeLimits {
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
}

impl Default for SizeLimits {
    fn default() -> Self {
        ChunkingOptions::default().limits()
    }
}

/// Orchestrator-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Fallback substitutions allowed after the first attempt
    pub max_retries: usize,

    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,

    /// Per-strategy time budget; exceeding it raises an alert only
    pub max_execution_time_ms: u64,

    /// Line gap allowed inside a hierarchical merge group
    pub hierarchical_merge_gap: usize,

    /// Line gap allowed by the single-strategy merge pass
    pub flat_merge_gap: usize,

    /// Chunk-set validation: max line overlap between neighbours
    pub max_overlap_lines: usize,

    /// Chunk-set validation: max line gap between neighbours
    pub max_gap_lines: usize,

    /// Memory budget available to batch processing
    pub memory_budget_mb: u64,

    /// Batches run in parallel when the budget exceeds this threshold
    pub parallel_memory_threshold_mb: u64,

    pub guard: GuardConfig,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            cache_capacity: 256,
            cache_ttl_secs: 600,
            max_execution_time_ms: 5_000,
            hierarchical_merge_gap: 10,
            flat_merge_gap: 5,
            max_overlap_lines: 50,
            max_gap_lines: 100,
            memory_budget_mb: 1024,
            parallel_memory_threshold_mb: 512,
            guard: GuardConfig::default(),
        }
    }
}

impl SegmenterConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(SegmenterError::invalid_config("cache_capacity must be > 0"));
        }
        if self.max_execution_time_ms == 0 {
            return Err(SegmenterError::invalid_config(
                "max_execution_time_ms must be > 0",
            ));
        }
        self.guard.validate()
    }

    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Parallel fan-out is admitted only with enough memory headroom
    #[must_use]
    pub const fn admits_parallel_batch(&self) -> bool {
        self.memory_budget_mb > self.parallel_memory_threshold_mb
    }
}

/// Resource guard thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Resident memory limit for the process
    pub memory_limit_mb: u64,

    /// Error rate over the recent window that forces degraded processing
    pub error_rate_threshold: f64,

    /// Number of recent outcomes considered
    pub error_window: usize,

    /// Outcomes required before the error rate is trusted
    pub min_error_samples: usize,

    /// Alerts older than this no longer affect health
    pub alert_window_secs: u64,

    pub max_alerts: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: 2048,
            error_rate_threshold: 0.5,
            error_window: 20,
            min_error_samples: 5,
            alert_window_secs: 300,
            max_alerts: 100,
        }
    }
}

impl GuardConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.error_rate_threshold) {
            return Err(SegmenterError::invalid_config(format!(
                "guard.error_rate_threshold ({}) must be within [0, 1]",
                self.error_rate_threshold
            )));
        }
        if self.error_window == 0 {
            return Err(SegmenterError::invalid_config(
                "guard.error_window must be > 0",
            ));
        }
        if self.min_error_samples > self.error_window {
            return Err(SegmenterError::invalid_config(format!(
                "guard.min_error_samples ({}) cannot exceed guard.error_window ({})",
                self.min_error_samples, self.error_window
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_valid() {
        assert!(ChunkingOptions::default().validate().is_ok());
        assert!(ChunkingOptions::for_speed().validate().is_ok());
        assert!(ChunkingOptions::for_quality().validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        let mut options = ChunkingOptions {
            min_chunk_size: 3000,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        options.min_chunk_size = 100;
        options.max_chunk_size = 0;
        assert!(options.validate().is_err());

        options.max_chunk_size = 2000;
        options.max_overlap_ratio = 1.5;
        assert!(options.validate().is_err());

        options.max_overlap_ratio = 0.2;
        options.max_lines_per_chunk = 0;
        assert!(options.validate().is_err());

        options.max_lines_per_chunk = 40;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn overlap_budget_takes_the_smaller_bound() {
        let options = ChunkingOptions::default();
        assert_eq!(options.overlap_budget(), 100);

        let small = ChunkingOptions {
            max_chunk_size: 500,
            ..Default::default()
        };
        assert_eq!(small.overlap_budget(), 50);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ChunkingOptions =
            serde_json::from_str(r#"{"max_chunk_size": 800, "optimization_level": "high"}"#)
                .unwrap();
        assert_eq!(options.max_chunk_size, 800);
        assert_eq!(options.min_chunk_size, 100);
        assert_eq!(options.optimization_level, OptimizationLevel::High);
    }

    #[test]
    fn segmenter_config_from_toml() {
        let config = SegmenterConfig::from_toml_str(
            r#"
max_retries = 5
flat_merge_gap = 3

[guard]
memory_limit_mb = 512
"#,
        )
        .unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.flat_merge_gap, 3);
        assert_eq!(config.hierarchical_merge_gap, 10);
        assert_eq!(config.guard.memory_limit_mb, 512);
        assert_eq!(config.guard.error_window, 20);
    }

    #[test]
    fn segmenter_config_rejects_invalid_values_at_load_time() {
        assert!(SegmenterConfig::from_toml_str("cache_capacity = 0").is_err());
        assert!(SegmenterConfig::from_toml_str("[guard]\nerror_rate_threshold = 2.0").is_err());
        assert!(SegmenterConfig::from_toml_str("max_retries = \"many\"").is_err());
    }

    #[test]
    fn parallel_admission_uses_memory_budget() {
        let mut config = SegmenterConfig::default();
        assert!(config.admits_parallel_batch());
        config.memory_budget_mb = 256;
        assert!(!config.admits_parallel_batch());
    }
}
