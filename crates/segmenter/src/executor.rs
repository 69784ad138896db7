//! Strategy execution: registry, result cache, validation and fallback walks.

use crate::config::SegmenterConfig;
use crate::error::SegmenterError;
use crate::priority::PriorityManager;
use crate::selector::StrategySelector;
use crate::strategy::{ExecutionContext, SegmentationStrategy, StrategyDescriptor};
use crate::types::CodeChunk;
use log::{debug, info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Reason recorded when every strategy in a fallback walk failed
pub const ALL_STRATEGIES_FAILED: &str = "All strategies failed";

/// Provenance attached to an [`ExecutionResult`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionMetadata {
    /// Nodes in the syntax tree the strategy saw, if any
    pub node_count: Option<usize>,
    /// Served from the execution cache
    pub cached: bool,
    /// Strategies run for this result, fallbacks included
    pub attempts: usize,
    /// One `"Fallback from A to B"` entry per substitution
    pub fallback_chain: Vec<String>,
    pub fallback_reason: Option<String>,
    /// Some attempt ran past `max_execution_time_ms`
    pub budget_exceeded: bool,
}

/// Outcome of running one strategy (or one fallback walk)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub chunks: Vec<CodeChunk>,
    pub execution_time_ms: f64,
    pub strategy_name: String,
    pub success: bool,
    pub error: Option<String>,
    pub metadata: ExecutionMetadata,
}

impl ExecutionResult {
    fn succeeded(name: &str, chunks: Vec<CodeChunk>, elapsed: Duration) -> Self {
        Self {
            chunks,
            execution_time_ms: elapsed.as_secs_f64() * 1000.0,
            strategy_name: name.to_string(),
            success: true,
            error: None,
            metadata: ExecutionMetadata {
                attempts: 1,
                ..Default::default()
            },
        }
    }

    fn failed(name: &str, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            chunks: Vec::new(),
            execution_time_ms: elapsed.as_secs_f64() * 1000.0,
            strategy_name: name.to_string(),
            success: false,
            error: Some(error.into()),
            metadata: ExecutionMetadata {
                attempts: 1,
                ..Default::default()
            },
        }
    }

    /// Succeeded with at least one chunk
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.success && !self.chunks.is_empty()
    }
}

fn to_lower_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// `sha256` over the strategy name and every context input that shapes its
/// output: language, file path, size and line budgets, boundary flags,
/// custom params and content.
#[must_use]
pub fn cache_key(strategy: &str, ctx: &ExecutionContext) -> String {
    let options = &ctx.options;
    let mut hasher = Sha256::new();
    hasher.update(strategy.as_bytes());
    hasher.update(b"|");
    hasher.update(ctx.language.to_ascii_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(ctx.file_path.as_deref().unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(options.min_chunk_size.to_le_bytes());
    hasher.update(options.max_chunk_size.to_le_bytes());
    hasher.update(options.max_lines_per_chunk.to_le_bytes());
    hasher.update([
        u8::from(options.preserve_function_boundaries),
        u8::from(options.preserve_class_boundaries),
    ]);
    hasher.update(b"|");
    hasher.update(serde_json::to_vec(&ctx.custom_params).unwrap_or_default());
    hasher.update(b"|");
    hasher.update(ctx.content().as_bytes());
    to_lower_hex(&hasher.finalize())
}

struct CacheInner {
    map: HashMap<String, (Instant, ExecutionResult)>,
    order: VecDeque<String>,
}

/// Insertion-ordered (FIFO) result cache with a TTL
pub struct ExecutionCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    ttl: Duration,
}

impl ExecutionCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            ttl,
        }
    }

    /// Deep copy of a live entry; expired entries are dropped on access
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ExecutionResult> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = inner.map.get(key)?.0.elapsed() > self.ttl;
        if expired {
            inner.map.remove(key);
            if let Some(pos) = inner.order.iter().position(|k| k == key) {
                inner.order.remove(pos);
            }
            return None;
        }
        inner.map.get(key).map(|(_, result)| result.clone())
    }

    pub fn insert(&self, key: String, result: ExecutionResult) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.map.insert(key.clone(), (Instant::now(), result)).is_none() {
            inner.order.push_back(key);
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.map.remove(&oldest);
            }
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.map.clear();
        inner.order.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs strategies, validates and caches their output, and walks fallback
/// paths on failure.
pub struct ExecutionCoordinator {
    strategies: RwLock<Vec<Arc<dyn SegmentationStrategy>>>,
    priorities: Arc<PriorityManager>,
    cache: ExecutionCache,
    max_retries: usize,
    max_execution_time: Duration,
}

impl ExecutionCoordinator {
    #[must_use]
    pub fn new(
        strategies: Vec<Arc<dyn SegmentationStrategy>>,
        priorities: Arc<PriorityManager>,
        config: &SegmenterConfig,
    ) -> Self {
        Self {
            strategies: RwLock::new(strategies),
            priorities,
            cache: ExecutionCache::new(config.cache_capacity, config.cache_ttl()),
            max_retries: config.max_retries,
            max_execution_time: Duration::from_millis(config.max_execution_time_ms),
        }
    }

    #[must_use]
    pub fn priorities(&self) -> &Arc<PriorityManager> {
        &self.priorities
    }

    #[must_use]
    pub const fn cache(&self) -> &ExecutionCache {
        &self.cache
    }

    /// Snapshot of the registry in registration order
    #[must_use]
    pub fn strategies(&self) -> Vec<Arc<dyn SegmentationStrategy>> {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn strategy(&self, name: &str) -> Option<Arc<dyn SegmentationStrategy>> {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    #[must_use]
    pub fn get_available_strategies(&self) -> Vec<StrategyDescriptor> {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.descriptor().clone())
            .collect()
    }

    /// Register (or replace, by name) a strategy; clears the cache
    pub fn add_strategy(&self, strategy: Arc<dyn SegmentationStrategy>) {
        {
            let mut registry = self.strategies.write().unwrap_or_else(PoisonError::into_inner);
            match registry.iter().position(|s| s.name() == strategy.name()) {
                Some(idx) => registry[idx] = strategy,
                None => registry.push(strategy),
            }
        }
        self.cache.clear();
    }

    /// Returns false when no strategy had that name; clears the cache
    pub fn remove_strategy(&self, name: &str) -> bool {
        let removed = {
            let mut registry = self.strategies.write().unwrap_or_else(PoisonError::into_inner);
            let before = registry.len();
            registry.retain(|s| s.name() != name);
            registry.len() != before
        };
        self.cache.clear();
        removed
    }

    /// Run `segment` and time it; callers record the performance stats
    async fn run_timed(
        &self,
        strategy: &dyn SegmentationStrategy,
        ctx: &ExecutionContext,
    ) -> (crate::error::Result<Vec<CodeChunk>>, Duration) {
        let started = Instant::now();
        let outcome = strategy.segment(ctx).await;
        let elapsed = started.elapsed();
        if elapsed > self.max_execution_time {
            warn!(
                "strategy '{}' took {:?}, over the {:?} budget",
                strategy.name(),
                elapsed,
                self.max_execution_time
            );
        }
        (outcome, elapsed)
    }

    /// Run one strategy; never fails, callers check `success`
    pub async fn execute_strategy(&self, name: &str, ctx: &ExecutionContext) -> ExecutionResult {
        let Some(strategy) = self.strategy(name) else {
            return ExecutionResult::failed(
                name,
                SegmenterError::StrategyNotFound(name.to_string()).to_string(),
                Duration::ZERO,
            );
        };

        let limits = ctx.limits();
        let key = cache_key(name, ctx);
        if let Some(mut hit) = self.cache.get(&key) {
            debug!("cache hit for strategy '{name}'");
            hit.metadata.cached = true;
            return hit;
        }

        if !strategy.can_handle(ctx) {
            return ExecutionResult::failed(
                name,
                format!("Strategy '{name}' cannot handle language '{}'", ctx.language),
                Duration::ZERO,
            );
        }

        let (outcome, elapsed) = self.run_timed(strategy.as_ref(), ctx).await;
        let mut result = match outcome {
            Ok(chunks) if strategy.validate(&chunks, limits) => {
                ExecutionResult::succeeded(name, chunks, elapsed)
            }
            Ok(chunks) => {
                debug!("strategy '{name}' produced {} invalid chunk(s)", chunks.len());
                ExecutionResult::failed(
                    name,
                    SegmenterError::InvalidOutput(name.to_string()).to_string(),
                    elapsed,
                )
            }
            Err(e) => {
                debug!("strategy '{name}' failed: {e}");
                ExecutionResult::failed(name, e.to_string(), elapsed)
            }
        };
        result.metadata.node_count = ctx.ast.as_ref().map(|tree| tree.node_count());
        result.metadata.budget_exceeded = elapsed > self.max_execution_time;

        self.priorities
            .update_performance(name, result.execution_time_ms, result.success);
        if result.success {
            self.cache.insert(key, result.clone());
        }
        result
    }

    /// Run `name`, then its fallback path, for at most `max_retries + 1`
    /// attempts in total.
    pub async fn execute_with_fallback(&self, name: &str, ctx: &ExecutionContext) -> ExecutionResult {
        let mut result = self.execute_strategy(name, ctx).await;
        if result.is_usable() {
            return result;
        }

        let first_error = result.error.clone().unwrap_or_default();
        let path = self.priorities.get_fallback_path(name, &first_error);
        let mut chain = Vec::new();
        let mut attempts = 1;
        let mut budget_exceeded = result.metadata.budget_exceeded;
        let mut current = name.to_string();

        for next in path.into_iter().take(self.max_retries) {
            let reason = format!("Fallback from {current} to {next}");
            info!("{reason}: {}", result.error.as_deref().unwrap_or("empty result"));
            chain.push(reason);
            attempts += 1;

            result = self.execute_strategy(&next, ctx).await;
            budget_exceeded |= result.metadata.budget_exceeded;
            current = next;
            if result.is_usable() {
                result.metadata.fallback_reason = Some(chain.join("; "));
                result.metadata.fallback_chain = chain;
                result.metadata.attempts = attempts;
                result.metadata.budget_exceeded = budget_exceeded;
                return result;
            }
        }

        warn!("{ALL_STRATEGIES_FAILED} for '{name}' after {attempts} attempt(s)");
        result.success = false;
        if result.error.is_none() {
            result.error = Some(format!("Strategy '{current}' produced no chunks"));
        }
        result.metadata.fallback_reason = Some(ALL_STRATEGIES_FAILED.to_string());
        result.metadata.fallback_chain = chain;
        result.metadata.attempts = attempts;
        result.metadata.budget_exceeded = budget_exceeded;
        result
    }

    /// Try applicable strategies in ascending priority and return the first
    /// usable result, or the last failure.
    pub async fn execute_best_strategy(&self, ctx: &ExecutionContext) -> ExecutionResult {
        let candidates = StrategySelector::new(Arc::clone(&self.priorities))
            .by_priority(&self.strategies(), ctx);

        let mut last = ExecutionResult::failed(
            "none",
            format!("No strategy can handle language '{}'", ctx.language),
            Duration::ZERO,
        );
        for strategy in candidates {
            last = self.execute_strategy(strategy.name(), ctx).await;
            if last.is_usable() {
                return last;
            }
        }
        last
    }

    /// Raw output for multi-strategy merging: chunks must be well formed and
    /// within the max size, the lower bound is left to the merged set.
    pub async fn execute_for_merge(&self, name: &str, ctx: &ExecutionContext) -> Option<Vec<CodeChunk>> {
        let strategy = self.strategy(name)?;
        if !strategy.can_handle(ctx) {
            return None;
        }
        let (outcome, elapsed) = self.run_timed(strategy.as_ref(), ctx).await;
        let max = ctx.limits().max_chunk_size;
        let chunks = outcome.ok().filter(|chunks| {
            !chunks.is_empty() && chunks.iter().all(|c| c.is_well_formed() && c.size() <= max)
        });
        self.priorities
            .update_performance(name, elapsed.as_secs_f64() * 1000.0, chunks.is_some());
        chunks
    }
}

impl std::fmt::Debug for ExecutionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.strategies().iter().map(|s| s.name().to_string()).collect();
        f.debug_struct("ExecutionCoordinator")
            .field("strategies", &names)
            .field("cached_results", &self.cache.len())
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
