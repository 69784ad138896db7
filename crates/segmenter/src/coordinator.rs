//! Processing façade: guard check, parsing, selection, execution and
//! post-processing for single files and batches.

use crate::config::{ChunkingOptions, OptimizationLevel, SegmenterConfig};
use crate::error::{Result, SegmenterError};
use crate::executor::{ExecutionCoordinator, ExecutionResult, ALL_STRATEGIES_FAILED};
use crate::guard::{
    emergency_chunk, AlertSeverity, HealthReport, MemoryProbe, ProcessMemoryProbe, ResourceGuard,
};
use crate::merge::{validate_chunk_set, HierarchicalMerger, MergePolicy, SetBounds};
use crate::parser::{AstParser, TreeSitterParser};
use crate::priority::{PerformanceStats, PriorityManager};
use crate::selector::StrategySelector;
use crate::strategy::{
    default_strategies, ExecutionContext, SegmentationStrategy, StrategyDescriptor,
};
use crate::types::{ChunkingStats, CodeChunk};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Strategy families combined by the high optimization level
pub const HIERARCHICAL_FAMILIES: [&str; 4] =
    ["import_group", "class_extract", "function_extract", "ast_structural"];

/// Reported as `strategy_used` for a multi-strategy merge
pub const HIERARCHICAL: &str = "hierarchical";

/// Low-cost strategy run when the guard forces degraded processing
const GUARD_STRATEGY: &str = "line_count";

/// Reason recorded when a strategy's chunks break the neighbour bounds
pub const INVALID_CHUNK_SET: &str = "Chunk set invalid";

/// One entry of a batch request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentRequest {
    pub content: String,
    pub language: String,
    pub file_path: Option<String>,
    pub options: ChunkingOptions,
}

impl SegmentRequest {
    pub fn new(content: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            language: language.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ChunkingOptions) -> Self {
        self.options = options;
        self
    }
}

/// Outcome of segmenting one file
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub chunks: Vec<CodeChunk>,
    pub success: bool,
    pub strategy_used: String,
    /// Strategies whose output was merged (high optimization level)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contributing_strategies: Vec<String>,
    pub execution_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fallback_chain: Vec<String>,
    pub cached: bool,
    /// Produced by the guard path instead of normal selection
    pub degraded: bool,
    pub optimization_level: OptimizationLevel,
    pub stats: ChunkingStats,
}

impl ProcessingResult {
    fn empty(level: OptimizationLevel) -> Self {
        Self {
            chunks: Vec::new(),
            success: false,
            strategy_used: String::new(),
            contributing_strategies: Vec::new(),
            execution_time_ms: 0.0,
            error: None,
            fallback_reason: None,
            fallback_chain: Vec::new(),
            cached: false,
            degraded: false,
            optimization_level: level,
            stats: ChunkingStats::default(),
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(OptimizationLevel::default())
        }
    }

    fn succeeded(
        strategy_used: impl Into<String>,
        chunks: Vec<CodeChunk>,
        level: OptimizationLevel,
    ) -> Self {
        let mut result = Self {
            success: true,
            strategy_used: strategy_used.into(),
            ..Self::empty(level)
        };
        result.set_chunks(chunks);
        result
    }

    fn from_execution(exec: ExecutionResult, level: OptimizationLevel) -> Self {
        Self {
            stats: ChunkingStats::from_chunks(&exec.chunks),
            chunks: exec.chunks,
            success: exec.success,
            strategy_used: exec.strategy_name,
            contributing_strategies: Vec::new(),
            execution_time_ms: exec.execution_time_ms,
            error: exec.error,
            fallback_reason: exec.metadata.fallback_reason,
            fallback_chain: exec.metadata.fallback_chain,
            cached: exec.metadata.cached,
            degraded: false,
            optimization_level: level,
        }
    }

    fn set_chunks(&mut self, chunks: Vec<CodeChunk>) {
        self.stats = ChunkingStats::from_chunks(&chunks);
        self.chunks = chunks;
    }
}

/// Composition root: owns the executor, selector, priority manager, guard
/// and parser. Cloning shares all of them.
#[derive(Clone)]
pub struct ProcessingCoordinator {
    config: Arc<SegmenterConfig>,
    parser: Arc<dyn AstParser>,
    executor: Arc<ExecutionCoordinator>,
    selector: StrategySelector,
    guard: Arc<ResourceGuard>,
}

impl ProcessingCoordinator {
    /// Built-in strategies, tree-sitter parsing, default priorities and the
    /// process memory probe.
    pub fn new(config: SegmenterConfig) -> Result<Self> {
        Self::with_components(
            config,
            Arc::new(TreeSitterParser::new()),
            Arc::new(PriorityManager::default()),
            Box::new(ProcessMemoryProbe),
        )
    }

    pub fn with_components(
        config: SegmenterConfig,
        parser: Arc<dyn AstParser>,
        priorities: Arc<PriorityManager>,
        probe: Box<dyn MemoryProbe>,
    ) -> Result<Self> {
        config.validate()?;
        let strategies = default_strategies(Arc::clone(&parser));
        let executor = ExecutionCoordinator::new(strategies, Arc::clone(&priorities), &config);
        let guard = ResourceGuard::with_probe(config.guard.clone(), probe);
        Ok(Self {
            config: Arc::new(config),
            parser,
            executor: Arc::new(executor),
            selector: StrategySelector::new(priorities),
            guard: Arc::new(guard),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    #[must_use]
    pub fn executor(&self) -> &ExecutionCoordinator {
        &self.executor
    }

    #[must_use]
    pub fn priorities(&self) -> &Arc<PriorityManager> {
        self.executor.priorities()
    }

    #[must_use]
    pub fn guard(&self) -> &ResourceGuard {
        &self.guard
    }

    pub fn add_strategy(&self, strategy: Arc<dyn SegmentationStrategy>) {
        self.executor.add_strategy(strategy);
    }

    pub fn remove_strategy(&self, name: &str) -> bool {
        self.executor.remove_strategy(name)
    }

    #[must_use]
    pub fn get_available_strategies(&self) -> Vec<StrategyDescriptor> {
        self.executor.get_available_strategies()
    }

    #[must_use]
    pub fn get_performance_stats(&self) -> BTreeMap<String, PerformanceStats> {
        self.priorities().performance_stats()
    }

    #[must_use]
    pub fn health_check(&self) -> HealthReport {
        self.guard.health_check()
    }

    /// Segment one file.
    ///
    /// Returns `Err` only for caller errors (empty content, invalid options);
    /// strategy failures come back as a result with `success == false`.
    pub async fn segment(
        &self,
        content: &str,
        language: &str,
        file_path: Option<&str>,
        options: &ChunkingOptions,
    ) -> Result<ProcessingResult> {
        if content.trim().is_empty() {
            return Err(SegmenterError::EmptyContent);
        }
        options.validate()?;
        let started = Instant::now();

        if let Some(reason) = self.guard.degradation_reason() {
            let mut result = self.degraded(content, language, file_path, options, reason).await;
            result.execution_time_ms = elapsed_ms(started);
            return Ok(result);
        }

        let ctx = self.context(content, language, file_path, options).await;
        let mut result = match (&options.force_strategy, options.optimization_level) {
            (Some(name), level) => {
                let exec = self.executor.execute_strategy(name, &ctx).await;
                self.note_budget(&exec);
                self.gate_chunk_set(&ctx, ProcessingResult::from_execution(exec, level))
                    .await
            }
            (None, OptimizationLevel::Low) => {
                let exec = self.run_selected(&ctx).await;
                self.gate_chunk_set(&ctx, ProcessingResult::from_execution(exec, OptimizationLevel::Low))
                    .await
            }
            (None, OptimizationLevel::Medium) => self.single_strategy(&ctx).await,
            (None, OptimizationLevel::High) => self.hierarchical(&ctx).await,
        };

        result.execution_time_ms = elapsed_ms(started);
        self.guard.record_outcome(result.success);
        if !result.success {
            warn!(
                "segmentation failed for {}: {}",
                file_path.unwrap_or("<memory>"),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(result)
    }

    /// Segment a batch. Runs one task per file when the memory budget admits
    /// it, otherwise serially; a failing file never affects the others.
    pub async fn segment_many(&self, requests: Vec<SegmentRequest>) -> Vec<ProcessingResult> {
        if self.config.admits_parallel_batch() && requests.len() > 1 {
            debug!("segmenting {} files in parallel", requests.len());
            let handles: Vec<_> = requests
                .into_iter()
                .map(|request| {
                    let this = self.clone();
                    tokio::spawn(async move { this.segment_request(&request).await })
                })
                .collect();

            let mut results = Vec::with_capacity(handles.len());
            for handle in handles {
                results.push(handle.await.unwrap_or_else(|e| {
                    ProcessingResult::failed(format!("segmentation task failed: {e}"))
                }));
            }
            results
        } else {
            let mut results = Vec::with_capacity(requests.len());
            for request in &requests {
                results.push(self.segment_request(request).await);
            }
            results
        }
    }

    async fn segment_request(&self, request: &SegmentRequest) -> ProcessingResult {
        self.segment(
            &request.content,
            &request.language,
            request.file_path.as_deref(),
            &request.options,
        )
        .await
        .unwrap_or_else(|e| ProcessingResult::failed(e.to_string()))
    }

    /// Context with a pre-parsed tree when the parser knows the language
    async fn context(
        &self,
        content: &str,
        language: &str,
        file_path: Option<&str>,
        options: &ChunkingOptions,
    ) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(language, content)
            .with_file_path(file_path)
            .with_options(options.clone());
        let lang = ctx.lang();
        if !self.parser.supports(lang.as_str()) {
            return ctx;
        }

        let parser = Arc::clone(&self.parser);
        let source = Arc::clone(&ctx.source_code);
        let lang_name = lang.as_str().to_string();
        match tokio::task::spawn_blocking(move || parser.parse(&source, &lang_name)).await {
            Ok(outcome) if outcome.success => ctx.ast = outcome.tree,
            Ok(outcome) => debug!(
                "parse failed for {language}: {}",
                outcome.error.as_deref().unwrap_or("no tree")
            ),
            Err(e) => warn!("parser task failed: {e}"),
        }
        ctx
    }

    fn note_budget(&self, exec: &ExecutionResult) {
        if exec.metadata.budget_exceeded {
            self.guard.alert(
                AlertSeverity::Warning,
                format!(
                    "strategy '{}' exceeded the {} ms execution budget",
                    exec.strategy_name, self.config.max_execution_time_ms
                ),
            );
        }
    }

    async fn run_selected(&self, ctx: &ExecutionContext) -> ExecutionResult {
        let strategies = self.executor.strategies();
        let exec = match self.selector.select_optimal_strategy(&strategies, ctx) {
            Some(strategy) => {
                debug!("running '{}' for {}", strategy.name(), ctx.language);
                self.executor.execute_with_fallback(strategy.name(), ctx).await
            }
            None => self.executor.execute_best_strategy(ctx).await,
        };
        self.note_budget(&exec);
        exec
    }

    /// Selected strategy (with fallback), then flat merge and overlap. The
    /// raw output is used when the processed set fails validation, and it
    /// has to pass the same gate.
    async fn single_strategy(&self, ctx: &ExecutionContext) -> ProcessingResult {
        let exec = self.run_selected(ctx).await;
        let mut result = ProcessingResult::from_execution(exec, OptimizationLevel::Medium);
        if !result.success {
            return result;
        }

        let merger = HierarchicalMerger::new(self.merge_policy(ctx, self.config.flat_merge_gap));
        let processed = merger.merge_flat(result.chunks.clone());
        if validate_chunk_set(&processed, ctx.limits(), self.set_bounds()) {
            result.set_chunks(processed);
            return result;
        }
        debug!("flat merge produced an invalid set, checking raw chunks");
        self.gate_chunk_set(ctx, result).await
    }

    /// A successful result whose set breaks the neighbour bounds continues
    /// down the fallback path of the strategy that produced it.
    async fn gate_chunk_set(
        &self,
        ctx: &ExecutionContext,
        result: ProcessingResult,
    ) -> ProcessingResult {
        let bounds = self.set_bounds();
        if !result.success || validate_chunk_set(&result.chunks, ctx.limits(), bounds) {
            return result;
        }

        let level = result.optimization_level;
        let mut tried = vec![result.strategy_used.clone()];
        tried.extend(
            result
                .fallback_chain
                .iter()
                .filter_map(|step| step.rsplit(" to ").next().map(str::to_string)),
        );
        let mut chain = result.fallback_chain;
        let mut current = result.strategy_used;
        warn!("'{current}' produced an invalid chunk set, continuing fallback");

        let path = self.priorities().get_fallback_path(&current, INVALID_CHUNK_SET);
        let mut last_error = INVALID_CHUNK_SET.to_string();
        let mut substitutions = 0;
        for next in path {
            if substitutions == self.config.max_retries {
                break;
            }
            if tried.contains(&next) {
                continue;
            }
            substitutions += 1;
            chain.push(format!("Fallback from {current} to {next}"));
            tried.push(next.clone());

            let exec = self.executor.execute_strategy(&next, ctx).await;
            self.note_budget(&exec);
            current = next;
            if !exec.is_usable() {
                last_error = exec.error.unwrap_or_else(|| INVALID_CHUNK_SET.to_string());
                continue;
            }
            if !validate_chunk_set(&exec.chunks, ctx.limits(), bounds) {
                last_error = INVALID_CHUNK_SET.to_string();
                continue;
            }

            let mut recovered = ProcessingResult::from_execution(exec, level);
            recovered.fallback_reason = Some(INVALID_CHUNK_SET.to_string());
            recovered.fallback_chain = chain;
            return recovered;
        }

        warn!("{ALL_STRATEGIES_FAILED} after an invalid chunk set");
        let mut failed = ProcessingResult::failed(last_error);
        failed.strategy_used = current;
        failed.optimization_level = level;
        failed.fallback_reason = Some(ALL_STRATEGIES_FAILED.to_string());
        failed.fallback_chain = chain;
        failed
    }

    /// Several strategy families merged hierarchically; the single-strategy
    /// path is used when fewer than two contribute or the set is invalid.
    async fn hierarchical(&self, ctx: &ExecutionContext) -> ProcessingResult {
        let mut contributors = Vec::new();
        let mut pooled = Vec::new();
        for name in HIERARCHICAL_FAMILIES {
            if let Some(chunks) = self.executor.execute_for_merge(name, ctx).await {
                contributors.push(name.to_string());
                pooled.extend(chunks);
            }
        }

        if contributors.len() >= 2 {
            let merger =
                HierarchicalMerger::new(self.merge_policy(ctx, self.config.hierarchical_merge_gap));
            let merged = merger.merge(pooled);
            if validate_chunk_set(&merged, ctx.limits(), self.set_bounds()) {
                let mut result =
                    ProcessingResult::succeeded(HIERARCHICAL, merged, OptimizationLevel::High);
                result.contributing_strategies = contributors;
                return result;
            }
            debug!("hierarchical merge of {contributors:?} failed set validation");
        }

        let mut result = self.single_strategy(ctx).await;
        result.optimization_level = OptimizationLevel::High;
        result
    }

    /// Guard path: `line_count` without a syntax tree, then the emergency
    /// chunk. Always succeeds.
    async fn degraded(
        &self,
        content: &str,
        language: &str,
        file_path: Option<&str>,
        options: &ChunkingOptions,
        reason: &str,
    ) -> ProcessingResult {
        info!("guard forcing degraded processing: {reason}");
        let ctx = ExecutionContext::new(language, content)
            .with_file_path(file_path)
            .with_options(options.clone());
        let exec = self.executor.execute_strategy(GUARD_STRATEGY, &ctx).await;

        let (chunks, strategy_used) = if exec.is_usable() {
            (exec.chunks, GUARD_STRATEGY.to_string())
        } else {
            warn!(
                "guard strategy failed ({}), emitting emergency chunk",
                exec.error.as_deref().unwrap_or("no chunks")
            );
            (
                vec![emergency_chunk(content, language, file_path, reason)],
                "emergency".to_string(),
            )
        };

        let mut result =
            ProcessingResult::succeeded(strategy_used, chunks, options.optimization_level);
        result.fallback_reason = Some(reason.to_string());
        result.degraded = true;
        result
    }

    fn merge_policy(&self, ctx: &ExecutionContext, max_gap: usize) -> MergePolicy {
        MergePolicy {
            max_chunk_size: ctx.options.max_chunk_size,
            max_gap,
            overlap_budget: ctx.options.overlap_budget(),
        }
    }

    fn set_bounds(&self) -> SetBounds {
        SetBounds {
            max_overlap_lines: self.config.max_overlap_lines,
            max_gap_lines: self.config.max_gap_lines,
        }
    }
}

impl std::fmt::Debug for ProcessingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingCoordinator")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{StaticMemoryProbe, MEMORY_LIMIT_EXCEEDED};
    use pretty_assertions::assert_eq;

    fn coordinator() -> ProcessingCoordinator {
        coordinator_with_memory(64)
    }

    fn coordinator_with_memory(mb: u64) -> ProcessingCoordinator {
        ProcessingCoordinator::with_components(
            SegmenterConfig::default(),
            Arc::new(TreeSitterParser::new()),
            Arc::new(PriorityManager::default()),
            Box::new(StaticMemoryProbe(mb)),
        )
        .unwrap()
    }

    const TWO_FUNCTIONS: &str = "function f(){}\n\nfunction g(){}";

    #[tokio::test]
    async fn merges_adjacent_functions() {
        let result = coordinator()
            .segment(TWO_FUNCTIONS, "javascript", None, &ChunkingOptions::default())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.strategy_used, "function_extract");
        assert_eq!(result.chunks.len(), 1);
        assert_eq!((result.chunks[0].start_line, result.chunks[0].end_line), (1, 3));
        assert_eq!(result.chunks[0].content, TWO_FUNCTIONS);
        assert_eq!(result.stats.total_chunks, 1);
    }

    #[tokio::test]
    async fn low_level_skips_post_processing() {
        let result = coordinator()
            .segment(TWO_FUNCTIONS, "javascript", None, &ChunkingOptions::for_speed())
            .await
            .unwrap();
        assert_eq!(result.chunks.len(), 2);
        assert_eq!(result.optimization_level, OptimizationLevel::Low);
    }

    /// `function f` on line 1 and `function g` on line 152, with plain
    /// statements between them.
    fn functions_far_apart() -> String {
        let mut code = String::from("function f() { return 1; }\n");
        for i in 1..=150 {
            code.push_str(&format!("var x{i} = {i};\n"));
        }
        code.push_str("function g() { return 2; }\n");
        code
    }

    fn assert_covers_whole_file(result: &ProcessingResult, coordinator: &ProcessingCoordinator) {
        let limits = ChunkingOptions::default().limits();
        assert!(validate_chunk_set(&result.chunks, limits, coordinator.set_bounds()));
        assert_eq!(result.chunks.iter().map(|c| c.start_line).min(), Some(1));
        assert_eq!(result.chunks.iter().map(|c| c.end_line).max(), Some(152));
    }

    #[tokio::test]
    async fn wide_gap_between_functions_falls_back_to_covering_strategy() {
        let coordinator = coordinator();
        let result = coordinator
            .segment(&functions_far_apart(), "javascript", None, &ChunkingOptions::default())
            .await
            .unwrap();

        assert!(result.success);
        assert_ne!(result.strategy_used, "function_extract");
        assert_eq!(result.fallback_reason.as_deref(), Some(INVALID_CHUNK_SET));
        assert_eq!(
            result.fallback_chain.first().map(String::as_str),
            Some("Fallback from function_extract to semantic_score")
        );
        assert_covers_whole_file(&result, &coordinator);
    }

    #[tokio::test]
    async fn low_level_output_is_gated_too() {
        let coordinator = coordinator();
        let result = coordinator
            .segment(&functions_far_apart(), "javascript", None, &ChunkingOptions::for_speed())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.optimization_level, OptimizationLevel::Low);
        assert_covers_whole_file(&result, &coordinator);
    }

    #[tokio::test]
    async fn forced_strategy_with_invalid_set_continues_its_fallback_path() {
        let coordinator = coordinator();
        let options = ChunkingOptions {
            force_strategy: Some("function_extract".into()),
            ..Default::default()
        };
        let result = coordinator
            .segment(&functions_far_apart(), "javascript", None, &options)
            .await
            .unwrap();

        assert!(result.success);
        assert_ne!(result.strategy_used, "function_extract");
        assert!(!result.fallback_chain.is_empty());
        assert_covers_whole_file(&result, &coordinator);
    }

    #[tokio::test]
    async fn invalid_set_with_no_fallback_left_is_a_failed_result() {
        let coordinator = coordinator();
        for name in ["semantic_score", "line_count", "minimal"] {
            assert!(coordinator.remove_strategy(name));
        }
        let options = ChunkingOptions {
            force_strategy: Some("function_extract".into()),
            ..Default::default()
        };
        let result = coordinator
            .segment(&functions_far_apart(), "javascript", None, &options)
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.chunks.is_empty());
        assert_eq!(result.fallback_reason.as_deref(), Some(ALL_STRATEGIES_FAILED));
        assert_eq!(result.fallback_chain.len(), 3);
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let err = coordinator()
            .segment("", "javascript", None, &ChunkingOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SegmenterError::EmptyContent));
        assert!(coordinator().get_performance_stats().is_empty());
    }

    #[tokio::test]
    async fn invalid_options_fail_fast() {
        let options = ChunkingOptions {
            min_chunk_size: 500,
            max_chunk_size: 100,
            ..Default::default()
        };
        let err = coordinator()
            .segment("x", "text", None, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, SegmenterError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn forced_unknown_strategy_fails_without_fallback() {
        let options = ChunkingOptions {
            force_strategy: Some("nonexistent".into()),
            ..Default::default()
        };
        let result = coordinator()
            .segment(TWO_FUNCTIONS, "javascript", None, &options)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
        assert!(result.fallback_chain.is_empty());
    }

    #[tokio::test]
    async fn memory_pressure_takes_the_guard_path() {
        let coordinator = coordinator_with_memory(1 << 20);
        let result = coordinator
            .segment(TWO_FUNCTIONS, "javascript", None, &ChunkingOptions::default())
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.degraded);
        assert_eq!(result.fallback_reason.as_deref(), Some(MEMORY_LIMIT_EXCEEDED));
        assert_eq!(coordinator.health_check().status, crate::guard::HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn emergency_chunk_when_guard_strategy_is_missing() {
        let coordinator = coordinator_with_memory(1 << 20);
        assert!(coordinator.remove_strategy("line_count"));
        let result = coordinator
            .segment("a\nb", "text", Some("notes.txt"), &ChunkingOptions::default())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.strategy_used, "emergency");
        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks[0].metadata.fallback);
    }

    #[tokio::test]
    async fn high_level_merges_several_families() {
        let code = "import a from 'a';\nimport b from 'b';\n\nclass A {\n  m() { return 1; }\n}\n\nfunction f() { return 2; }\n";
        let options = ChunkingOptions {
            min_chunk_size: 1,
            ..ChunkingOptions::for_quality()
        };
        let result = coordinator()
            .segment(code, "javascript", Some("app.js"), &options)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.strategy_used, HIERARCHICAL);
        assert!(result.contributing_strategies.contains(&"import_group".to_string()));
        assert!(result.contributing_strategies.contains(&"class_extract".to_string()));
        assert!(result.chunks.iter().all(|c| c.is_well_formed() && c.size() <= 2000));
    }

    #[tokio::test]
    async fn batch_keeps_order_and_isolates_failures() {
        let coordinator = coordinator();
        let results = coordinator
            .segment_many(vec![
                SegmentRequest::new(TWO_FUNCTIONS, "javascript"),
                SegmentRequest::new("", "javascript"),
                SegmentRequest::new("# Title\n\nbody", "markdown").with_file_path("README.md"),
            ])
            .await;
        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap().contains("Empty"));
        assert_eq!(results[2].strategy_used, "markdown");
    }

    #[tokio::test]
    async fn serial_batch_when_memory_budget_is_tight() {
        let config = SegmenterConfig {
            memory_budget_mb: 256,
            ..Default::default()
        };
        assert!(!config.admits_parallel_batch());
        let coordinator = ProcessingCoordinator::with_components(
            config,
            Arc::new(TreeSitterParser::new()),
            Arc::new(PriorityManager::default()),
            Box::new(StaticMemoryProbe(64)),
        )
        .unwrap();
        let results = coordinator
            .segment_many(vec![
                SegmentRequest::new("a = 1\nb = 2", "python"),
                SegmentRequest::new("plain words", "text"),
            ])
            .await;
        assert!(results.iter().all(|r| r.success));
    }
}
