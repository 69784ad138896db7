//! Strategy selection: file-type overrides, then a heuristic score built
//! from priority, language support, AST availability, file size, content
//! features and recorded performance.

use crate::detect::patterns::{is_class_definition, is_function_definition, is_import};
use crate::language::FileKind;
use crate::priority::PriorityManager;
use crate::strategy::{ExecutionContext, SegmentationStrategy};
use log::debug;
use std::sync::Arc;

/// Files up to this many lines count as small
pub const SMALL_FILE_LINES: usize = 50;

/// Files above this many lines count as large
pub const LARGE_FILE_LINES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    #[must_use]
    pub const fn from_lines(lines: usize) -> Self {
        if lines <= SMALL_FILE_LINES {
            Self::Small
        } else if lines > LARGE_FILE_LINES {
            Self::Large
        } else {
            Self::Medium
        }
    }
}

/// Cheap content features feeding the heuristic score
#[derive(Debug, Clone, PartialEq)]
pub struct ContentFeatures {
    pub line_count: usize,
    pub size_class: SizeClass,
    pub file_kind: FileKind,
    pub has_ast: bool,
    pub function_count: usize,
    pub class_count: usize,
    pub import_count: usize,
    /// Deepest `{` nesting seen
    pub max_nesting_depth: usize,
    /// Bracket characters per character of content
    pub bracket_density: f64,
}

impl ContentFeatures {
    #[must_use]
    pub fn analyze(ctx: &ExecutionContext) -> Self {
        let content = ctx.content();
        let line_count = content.lines().count();

        let (function_count, class_count, import_count) = match ctx.ast.as_ref() {
            Some(tree) => (
                tree.functions().count(),
                tree.classes().count(),
                tree.imports().count(),
            ),
            None => content.lines().fold((0, 0, 0), |(f, c, i), line| {
                (
                    f + usize::from(is_function_definition(line)),
                    c + usize::from(is_class_definition(line)),
                    i + usize::from(is_import(line)),
                )
            }),
        };

        let mut depth: usize = 0;
        let mut max_depth = 0;
        let mut brackets = 0usize;
        let mut chars = 0usize;
        for ch in content.chars() {
            chars += 1;
            match ch {
                '{' => {
                    depth += 1;
                    max_depth = max_depth.max(depth);
                    brackets += 1;
                }
                '}' => {
                    depth = depth.saturating_sub(1);
                    brackets += 1;
                }
                '(' | ')' | '[' | ']' => brackets += 1,
                _ => {}
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let bracket_density = if chars == 0 {
            0.0
        } else {
            brackets as f64 / chars as f64
        };

        Self {
            line_count,
            size_class: SizeClass::from_lines(line_count),
            file_kind: ctx.file_kind(),
            has_ast: ctx.ast.is_some(),
            function_count,
            class_count,
            import_count,
            max_nesting_depth: max_depth,
            bracket_density,
        }
    }
}

/// A candidate with its heuristic score
#[derive(Clone)]
pub struct ScoredStrategy {
    pub strategy: Arc<dyn SegmentationStrategy>,
    pub score: f64,
}

impl std::fmt::Debug for ScoredStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoredStrategy")
            .field("strategy", &self.strategy.name())
            .field("score", &self.score)
            .finish()
    }
}

#[allow(clippy::cast_precision_loss)]
fn capped(value: usize, weight: usize, cap: usize) -> f64 {
    value.saturating_mul(weight).min(cap) as f64
}

/// Ranks strategies for a context
#[derive(Debug, Clone)]
pub struct StrategySelector {
    priorities: Arc<PriorityManager>,
}

impl StrategySelector {
    #[must_use]
    pub const fn new(priorities: Arc<PriorityManager>) -> Self {
        Self { priorities }
    }

    /// Name family expected for special file kinds
    #[must_use]
    pub const fn override_family(kind: FileKind) -> Option<&'static str> {
        match kind {
            FileKind::Markdown => Some("markdown"),
            FileKind::Markup | FileKind::StructuredConfig => Some("data_format"),
            FileKind::Test => Some("function"),
            FileKind::Code | FileKind::Text => None,
        }
    }

    /// Heuristic score of one strategy; callers check `can_handle` first
    #[must_use]
    pub fn score(
        &self,
        strategy: &dyn SegmentationStrategy,
        ctx: &ExecutionContext,
        features: &ContentFeatures,
    ) -> f64 {
        let name = strategy.name();
        let base = self.priorities.get_priority(name, ctx);
        let adjusted = self.priorities.adjusted_priority(name, ctx);

        let mut score = (12.0 - f64::from(base)) * 10.0;
        if strategy.descriptor().supports_language(&ctx.language) {
            score += 20.0;
        }
        if features.has_ast && strategy.consumes_ast() {
            score += 15.0;
        }

        score += match features.size_class {
            SizeClass::Small if name.contains("line") || name.contains("bracket") => 15.0,
            SizeClass::Large
                if name.contains("ast") || name.contains("semantic") || name.contains("structur") =>
            {
                15.0
            }
            SizeClass::Medium if name.contains("function") || name.contains("class") => 10.0,
            _ => 0.0,
        };

        if name.contains("function") {
            score += capped(features.function_count, 3, 15);
        }
        if name.contains("class") {
            score += capped(features.class_count, 5, 15);
        }
        if name.contains("import") {
            score += capped(features.import_count, 2, 10);
        }
        if name.contains("bracket") {
            score += capped(features.max_nesting_depth, 2, 10);
            score += (features.bracket_density * 10.0).min(10.0);
        }

        score + f64::from(base.saturating_sub(adjusted)) * 5.0
    }

    /// Applicable strategies ranked by descending score; equal scores keep
    /// registration order.
    #[must_use]
    pub fn select_with_heuristics(
        &self,
        strategies: &[Arc<dyn SegmentationStrategy>],
        ctx: &ExecutionContext,
    ) -> Vec<ScoredStrategy> {
        let features = ContentFeatures::analyze(ctx);
        let mut ranked: Vec<ScoredStrategy> = strategies
            .iter()
            .filter(|s| s.can_handle(ctx))
            .map(|s| ScoredStrategy {
                strategy: Arc::clone(s),
                score: self.score(s.as_ref(), ctx, &features),
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    /// File-type override first, then the highest heuristic score
    #[must_use]
    pub fn select_optimal_strategy(
        &self,
        strategies: &[Arc<dyn SegmentationStrategy>],
        ctx: &ExecutionContext,
    ) -> Option<Arc<dyn SegmentationStrategy>> {
        if let Some(family) = Self::override_family(ctx.file_kind()) {
            let direct = strategies
                .iter()
                .find(|s| s.name().contains(family) && s.can_handle(ctx));
            if let Some(strategy) = direct {
                debug!("file-type override selects '{}'", strategy.name());
                return Some(Arc::clone(strategy));
            }
        }

        let best = self.select_with_heuristics(strategies, ctx).into_iter().next()?;
        debug!("selected '{}' (score {:.1})", best.strategy.name(), best.score);
        Some(best.strategy)
    }

    /// Applicable strategies in ascending adjusted priority; equal
    /// priorities keep registration order.
    #[must_use]
    pub fn by_priority(
        &self,
        strategies: &[Arc<dyn SegmentationStrategy>],
        ctx: &ExecutionContext,
    ) -> Vec<Arc<dyn SegmentationStrategy>> {
        let mut candidates: Vec<(u32, Arc<dyn SegmentationStrategy>)> = strategies
            .iter()
            .filter(|s| s.can_handle(ctx))
            .map(|s| (self.priorities.adjusted_priority(s.name(), ctx), Arc::clone(s)))
            .collect();
        candidates.sort_by_key(|(priority, _)| *priority);
        candidates.into_iter().map(|(_, s)| s).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{AstParser, TreeSitterParser};
    use crate::strategy::default_strategies;

    fn selector() -> StrategySelector {
        StrategySelector::new(Arc::new(PriorityManager::default()))
    }

    fn strategies() -> Vec<Arc<dyn SegmentationStrategy>> {
        default_strategies(Arc::new(TreeSitterParser::new()))
    }

    fn pick(ctx: &ExecutionContext) -> String {
        selector()
            .select_optimal_strategy(&strategies(), ctx)
            .map(|s| s.name().to_string())
            .unwrap_or_default()
    }

    #[test]
    fn small_javascript_with_functions_prefers_function_extract() {
        let code = "function f(){}\n\nfunction g(){}";
        let tree = TreeSitterParser::new().parse(code, "javascript").tree;
        let ctx = ExecutionContext::new("javascript", code).with_ast(tree);
        assert_eq!(pick(&ctx), "function_extract");

        let without_ast = ExecutionContext::new("javascript", code);
        assert_eq!(pick(&without_ast), "function_extract");
    }

    #[test]
    fn file_kind_overrides() {
        let md = ExecutionContext::new("markdown", "# Title\n\ntext");
        assert_eq!(pick(&md), "markdown");

        let json = ExecutionContext::new("json", "{\"a\": 1}");
        assert_eq!(pick(&json), "data_format");

        let test = ExecutionContext::new("javascript", "function itWorks() {}")
            .with_file_path(Some("src/__tests__/app.test.js"));
        assert_eq!(pick(&test), "function_extract");
    }

    #[test]
    fn plain_text_falls_to_universal_strategies() {
        let ctx = ExecutionContext::new("text", "just some words\nacross lines");
        assert_eq!(pick(&ctx), "line_count");
    }

    #[test]
    fn features_count_definitions() {
        let ctx = ExecutionContext::new(
            "javascript",
            "import a from 'a';\nclass A {\n  m() { if (x) { y(); } }\n}\nfunction f() {}",
        );
        let features = ContentFeatures::analyze(&ctx);
        assert_eq!(features.import_count, 1);
        assert_eq!(features.class_count, 1);
        assert_eq!(features.function_count, 1);
        assert_eq!(features.max_nesting_depth, 3);
        assert_eq!(features.size_class, SizeClass::Small);
    }

    #[test]
    fn ranking_is_stable_for_equal_scores() {
        let ctx = ExecutionContext::new("text", "alpha\nbeta");
        let ranked = selector().select_with_heuristics(&strategies(), &ctx);
        let names: Vec<_> = ranked.iter().map(|s| s.strategy.name().to_string()).collect();
        assert_eq!(names, vec!["line_count", "minimal"]);
    }

    #[test]
    fn priority_order_for_fallback_walks() {
        let ctx = ExecutionContext::new("text", "alpha\nbeta");
        let ordered = selector().by_priority(&strategies(), &ctx);
        let names: Vec<_> = ordered.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["line_count", "minimal"]);
    }
}
