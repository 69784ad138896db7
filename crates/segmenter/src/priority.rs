//! Layered strategy priorities with adaptive adjustment.
//!
//! Resolution order for a (strategy, context) pair is file extension, then
//! language, then the default table, then [`UNCONFIGURED_PRIORITY`]. Lower
//! values are preferred. Once a strategy has enough recorded executions its
//! priority may be lowered (never raised) by up to 5 based on speed and
//! success rate.

use crate::error::{Result, SegmenterError};
use crate::strategy::ExecutionContext;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Priority of a strategy that appears in no table
pub const UNCONFIGURED_PRIORITY: u32 = 999;

/// Executions required before adaptive adjustment kicks in
pub const MIN_SAMPLES_FOR_ADJUSTMENT: u64 = 10;

/// Average time at which the time score bottoms out
const TIME_SCORE_CEILING_MS: f64 = 1000.0;

/// Largest improvement adaptive adjustment can grant
const MAX_ADJUSTMENT: f64 = 5.0;

/// Chain used for strategies without a configured fallback path
pub const DEFAULT_FALLBACK_PATH: [&str; 2] = ["line_count", "minimal"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveWeights {
    pub performance_weight: f64,
    pub success_rate_weight: f64,
}

impl Default for AdaptiveWeights {
    fn default() -> Self {
        Self {
            performance_weight: 0.4,
            success_rate_weight: 0.6,
        }
    }
}

/// Layered priority tables plus fallback chains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    pub default_priorities: BTreeMap<String, u32>,
    /// language -> (strategy -> priority)
    pub language_specific: BTreeMap<String, BTreeMap<String, u32>>,
    /// extension (no dot) -> (strategy -> priority)
    pub file_type_specific: BTreeMap<String, BTreeMap<String, u32>>,
    /// strategy -> ordered substitutes
    pub fallback_paths: BTreeMap<String, Vec<String>>,
    pub adaptive_weights: AdaptiveWeights,
}

fn table(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
    entries
        .iter()
        .map(|(name, priority)| ((*name).to_string(), *priority))
        .collect()
}

fn chain(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|s| (*s).to_string()).collect()
}

impl Default for PriorityConfig {
    fn default() -> Self {
        let default_priorities = table(&[
            ("markdown", 0),
            ("data_format", 1),
            ("function_extract", 2),
            ("class_extract", 3),
            ("ast_structural", 4),
            ("import_group", 5),
            ("semantic_score", 6),
            ("bracket_balance", 7),
            ("line_count", 8),
            ("minimal", 9),
        ]);

        let mut language_specific = BTreeMap::new();
        language_specific.insert("markdown".to_string(), table(&[("markdown", 0)]));
        for lang in ["json", "yaml", "toml", "xml", "html"] {
            language_specific.insert(lang.to_string(), table(&[("data_format", 0)]));
        }
        language_specific.insert(
            "python".to_string(),
            table(&[("class_extract", 2), ("function_extract", 3)]),
        );

        let mut file_type_specific = BTreeMap::new();
        for ext in ["md", "markdown"] {
            file_type_specific.insert(ext.to_string(), table(&[("markdown", 0)]));
        }
        for ext in ["json", "yaml", "yml", "toml", "xml", "html", "htm"] {
            file_type_specific.insert(ext.to_string(), table(&[("data_format", 0)]));
        }

        let mut fallback_paths = BTreeMap::new();
        fallback_paths.insert(
            "ast_structural".to_string(),
            chain(&["function_extract", "line_count", "minimal"]),
        );
        fallback_paths.insert(
            "function_extract".to_string(),
            chain(&["semantic_score", "line_count", "minimal"]),
        );
        fallback_paths.insert(
            "class_extract".to_string(),
            chain(&["function_extract", "line_count", "minimal"]),
        );
        fallback_paths.insert("line_count".to_string(), chain(&["minimal"]));
        fallback_paths.insert("minimal".to_string(), Vec::new());

        Self {
            default_priorities,
            language_specific,
            file_type_specific,
            fallback_paths,
            adaptive_weights: AdaptiveWeights::default(),
        }
    }
}

impl PriorityConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let AdaptiveWeights {
            performance_weight,
            success_rate_weight,
        } = self.adaptive_weights;
        if !(performance_weight.is_finite() && success_rate_weight.is_finite()) {
            return Err(SegmenterError::invalid_config(
                "adaptive weights must be finite",
            ));
        }
        if performance_weight < 0.0 || success_rate_weight < 0.0 {
            return Err(SegmenterError::invalid_config(
                "adaptive weights must be non-negative",
            ));
        }
        if performance_weight + success_rate_weight <= 0.0 {
            return Err(SegmenterError::invalid_config(
                "adaptive weights cannot both be zero",
            ));
        }
        Ok(())
    }

    /// Configured default, or [`UNCONFIGURED_PRIORITY`]
    #[must_use]
    pub fn base_priority(&self, name: &str) -> u32 {
        self.default_priorities
            .get(name)
            .copied()
            .unwrap_or(UNCONFIGURED_PRIORITY)
    }
}

/// Rolling execution statistics for one strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub execution_count: u64,
    pub total_time_ms: f64,
    pub success_count: u64,
}

impl PerformanceStats {
    #[must_use]
    pub fn average_time_ms(&self) -> f64 {
        if self.execution_count == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let count = self.execution_count as f64;
            self.total_time_ms / count
        }
    }

    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.execution_count == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = self.success_count as f64 / self.execution_count as f64;
            rate
        }
    }

    fn record(&mut self, duration_ms: f64, success: bool) {
        self.execution_count += 1;
        self.total_time_ms += duration_ms.max(0.0);
        if success {
            self.success_count += 1;
        }
    }
}

/// Returned by [`PriorityManager::on_config_change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

type ConfigObserver = Arc<dyn Fn(&PriorityConfig) + Send + Sync>;

/// Owns the priority tables and per-strategy statistics of one orchestrator
pub struct PriorityManager {
    config: RwLock<PriorityConfig>,
    stats: Mutex<HashMap<String, PerformanceStats>>,
    observers: Mutex<Vec<(ObserverHandle, ConfigObserver)>>,
    next_handle: AtomicU64,
}

impl Default for PriorityManager {
    fn default() -> Self {
        Self::new(PriorityConfig::default())
    }
}

impl std::fmt::Debug for PriorityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityManager")
            .field("config", &self.config())
            .field("tracked_strategies", &self.performance_stats().len())
            .finish_non_exhaustive()
    }
}

impl PriorityManager {
    #[must_use]
    pub fn new(config: PriorityConfig) -> Self {
        Self {
            config: RwLock::new(config),
            stats: Mutex::new(HashMap::new()),
            observers: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Snapshot of the current configuration
    #[must_use]
    pub fn config(&self) -> PriorityConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the configuration and notify observers
    pub fn update_config(&self, config: PriorityConfig) -> Result<()> {
        config.validate()?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config.clone();

        let observers: Vec<ConfigObserver> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        debug!("priority config updated, notifying {} observer(s)", observers.len());
        for observer in observers {
            observer(&config);
        }
        Ok(())
    }

    pub fn on_config_change<F>(&self, observer: F) -> ObserverHandle
    where
        F: Fn(&PriorityConfig) + Send + Sync + 'static,
    {
        let handle = ObserverHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((handle, Arc::new(observer)));
        handle
    }

    /// Returns false when the handle was not registered
    pub fn remove_observer(&self, handle: ObserverHandle) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(h, _)| *h != handle);
        observers.len() != before
    }

    /// File extension > language > default > [`UNCONFIGURED_PRIORITY`]
    #[must_use]
    pub fn get_priority(&self, name: &str, ctx: &ExecutionContext) -> u32 {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);

        let by_extension = ctx
            .extension()
            .and_then(|ext| config.file_type_specific.get(&ext))
            .and_then(|t| t.get(name));
        if let Some(priority) = by_extension {
            return *priority;
        }

        let by_language = config
            .language_specific
            .get(&ctx.language.to_ascii_lowercase())
            .and_then(|t| t.get(name));
        if let Some(priority) = by_language {
            return *priority;
        }

        config.base_priority(name)
    }

    pub fn update_performance(&self, name: &str, duration_ms: f64, success: bool) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .record(duration_ms, success);
    }

    #[must_use]
    pub fn stats_for(&self, name: &str) -> Option<PerformanceStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    #[must_use]
    pub fn performance_stats(&self) -> BTreeMap<String, PerformanceStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, stats)| (name.clone(), *stats))
            .collect()
    }

    pub fn clear_stats(&self) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Blend of time and success scores in `[0, 1]`; `None` until warmed up
    #[must_use]
    pub fn performance_score(&self, name: &str) -> Option<f64> {
        let stats = self.stats_for(name)?;
        if stats.execution_count < MIN_SAMPLES_FOR_ADJUSTMENT {
            return None;
        }
        let weights = self.config().adaptive_weights;
        let time_score = 1.0 - (stats.average_time_ms() / TIME_SCORE_CEILING_MS).min(1.0);
        let score = (time_score * weights.performance_weight
            + stats.success_rate() * weights.success_rate_weight)
            / (weights.performance_weight + weights.success_rate_weight);
        Some(score.clamp(0.0, 1.0))
    }

    fn adjust(&self, name: &str, base: u32) -> u32 {
        let Some(score) = self.performance_score(name) else {
            return base;
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bonus = (score * MAX_ADJUSTMENT).floor() as u32;
        base.saturating_sub(bonus)
    }

    /// Default priority improved by recorded performance
    #[must_use]
    pub fn adjust_priority(&self, name: &str) -> u32 {
        let base = self.config().base_priority(name);
        self.adjust(name, base)
    }

    /// Context-resolved priority improved by recorded performance
    #[must_use]
    pub fn adjusted_priority(&self, name: &str, ctx: &ExecutionContext) -> u32 {
        self.adjust(name, self.get_priority(name, ctx))
    }

    /// Substitutes for `failed`; parse-dependent entries are dropped when the
    /// failure was structural.
    #[must_use]
    pub fn get_fallback_path(&self, failed: &str, reason: &str) -> Vec<String> {
        let path = self
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fallback_paths
            .get(failed)
            .cloned()
            .unwrap_or_else(|| chain(&DEFAULT_FALLBACK_PATH));

        let structural = is_structural_failure(reason);
        let filtered: Vec<String> = path
            .into_iter()
            .filter(|name| name != failed)
            .filter(|name| !(structural && depends_on_structure(name)))
            .collect();
        if structural {
            debug!("structural failure in '{failed}', fallback path: {filtered:?}");
        }
        if filtered.is_empty() {
            warn!("no fallback configured for strategy '{failed}'");
        }
        filtered
    }
}

/// Failure text mentions parsing, syntax or tree structure
#[must_use]
pub fn is_structural_failure(reason: &str) -> bool {
    let lower = reason.to_ascii_lowercase();
    lower.contains("parse")
        || lower.contains("syntax")
        || lower.contains("tree-sitter")
        || lower.contains("structur")
        || lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == "ast")
}

/// Strategy name implies it needs a syntax tree
#[must_use]
pub fn depends_on_structure(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("ast")
        || lower.contains("_ast")
        || lower.contains("structur")
        || lower.contains("syntax")
        || lower.contains("tree_sitter")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;

    fn layered_config() -> PriorityConfig {
        let mut config = PriorityConfig::default();
        config.default_priorities.insert("custom".into(), 5);
        config
            .language_specific
            .entry("rust".into())
            .or_default()
            .insert("custom".into(), 3);
        config
            .file_type_specific
            .entry("rs".into())
            .or_default()
            .insert("custom".into(), 1);
        config
    }

    #[test]
    fn resolution_precedence() {
        let manager = PriorityManager::new(layered_config());

        let all = ExecutionContext::new("rust", "x").with_file_path(Some("src/main.rs"));
        assert_eq!(manager.get_priority("custom", &all), 1);

        let language_only = ExecutionContext::new("rust", "x");
        assert_eq!(manager.get_priority("custom", &language_only), 3);

        let none = ExecutionContext::new("go", "x").with_file_path(Some("main.go"));
        assert_eq!(manager.get_priority("custom", &none), 5);

        assert_eq!(manager.get_priority("nobody", &none), UNCONFIGURED_PRIORITY);
    }

    #[test]
    fn adjustment_needs_warm_up() {
        let manager = PriorityManager::default();
        for _ in 0..9 {
            manager.update_performance("line_count", 1.0, true);
        }
        assert_eq!(manager.adjust_priority("line_count"), 8);

        manager.update_performance("line_count", 1.0, true);
        // score = (0.999 * 0.4 + 1.0 * 0.6) / 1.0 -> floor(4.99) = 4
        assert_eq!(manager.adjust_priority("line_count"), 4);
    }

    #[test]
    fn adjustment_saturates_at_zero() {
        let manager = PriorityManager::default();
        for _ in 0..20 {
            manager.update_performance("markdown", 0.0, true);
        }
        assert_eq!(manager.adjust_priority("markdown"), 0);
    }

    #[test]
    fn stats_are_tracked_and_cleared() {
        let manager = PriorityManager::default();
        manager.update_performance("minimal", 10.0, true);
        manager.update_performance("minimal", 30.0, false);
        let stats = manager.stats_for("minimal").unwrap();
        assert_eq!(stats.execution_count, 2);
        assert!((stats.average_time_ms() - 20.0).abs() < f64::EPSILON);
        assert!((stats.success_rate() - 0.5).abs() < f64::EPSILON);

        manager.clear_stats();
        assert!(manager.performance_stats().is_empty());
    }

    #[test]
    fn fallback_paths() {
        let manager = PriorityManager::default();
        assert_eq!(
            manager.get_fallback_path("semantic_score", "boom"),
            vec!["line_count", "minimal"]
        );
        assert!(manager.get_fallback_path("minimal", "boom").is_empty());
        assert_eq!(
            manager.get_fallback_path("function_extract", "timeout"),
            vec!["semantic_score", "line_count", "minimal"]
        );
    }

    #[test]
    fn structural_failures_skip_parse_dependent_strategies() {
        let mut config = PriorityConfig::default();
        config.fallback_paths.insert(
            "ast_structural".into(),
            chain(&["ast_lite", "tree_sitter_blocks", "function_extract", "line_count"]),
        );
        let manager = PriorityManager::new(config);

        let path = manager.get_fallback_path("ast_structural", "Parse error: unexpected token");
        assert_eq!(path, vec!["function_extract", "line_count"]);

        let path = manager.get_fallback_path("ast_structural", "budget exceeded");
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn failure_classification() {
        assert!(is_structural_failure("Parse error: x"));
        assert!(is_structural_failure("no AST available"));
        assert!(!is_structural_failure("vast output"));
        assert!(depends_on_structure("ast_structural"));
        assert!(!depends_on_structure("line_count"));
    }

    #[test]
    fn observers_are_notified_until_removed() {
        let manager = PriorityManager::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handle = manager.on_config_change(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        manager.update_config(PriorityConfig::default()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(manager.remove_observer(handle));
        assert!(!manager.remove_observer(handle));
        manager.update_config(PriorityConfig::default()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let mut config = PriorityConfig::default();
        config.adaptive_weights = AdaptiveWeights {
            performance_weight: 0.0,
            success_rate_weight: 0.0,
        };
        let manager = PriorityManager::default();
        assert!(manager.update_config(config).is_err());
    }

    #[test]
    fn loads_from_toml_and_json() {
        let toml = r#"
            [default_priorities]
            line_count = 1

            [fallback_paths]
            line_count = []

            [adaptive_weights]
            performance_weight = 1.0
            success_rate_weight = 1.0
        "#;
        let config = PriorityConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.base_priority("line_count"), 1);
        assert_eq!(config.base_priority("minimal"), UNCONFIGURED_PRIORITY);

        let json = r#"{"default_priorities": {"minimal": 2}}"#;
        let config = PriorityConfig::from_json_str(json).unwrap();
        assert_eq!(config.base_priority("minimal"), 2);
        // unspecified tables fall back to the built-in defaults
        assert!(!config.fallback_paths.is_empty());
    }

    proptest! {
        #[test]
        fn adjusted_priority_never_exceeds_default(
            runs in proptest::collection::vec((0.0f64..5000.0, any::<bool>()), 0..40),
            base in 0u32..1000,
        ) {
            let mut config = PriorityConfig::default();
            config.default_priorities.insert("probe".into(), base);
            let manager = PriorityManager::new(config);
            for (duration, success) in runs {
                manager.update_performance("probe", duration, success);
            }
            prop_assert!(manager.adjust_priority("probe") <= base);
        }
    }
}
