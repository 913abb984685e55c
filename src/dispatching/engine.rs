//! Rule engine for multi-criteria shell ordering.
//!
//! Composes multiple dispatching rules with configurable evaluation modes
//! and tie-breaking strategies.
//!
//! # Reference
//! Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

use std::sync::Arc;

use super::{rules, DispatchContext, DispatchingRule, RuleScore};
use crate::models::ClassShell;

/// How multiple rules are combined.
#[derive(Debug, Clone, Default)]
pub enum EvaluationMode {
    /// Apply rules in sequence; use next rule only on ties.
    #[default]
    Sequential,
    /// Compute weighted sum of all rule scores.
    Weighted,
}

/// How ties are broken after all rules are exhausted.
#[derive(Debug, Clone, Default)]
pub enum TieBreaker {
    /// Keep input order.
    #[default]
    NextRule,
    /// Deterministic by shell ID (lexicographic).
    ById,
}

#[derive(Clone)]
struct WeightedRule {
    rule: Arc<dyn DispatchingRule>,
    weight: f64,
}

/// A composable rule engine for shell prioritization.
///
/// # Example
/// ```
/// use term_roster::dispatching::{DispatchContext, RuleEngine};
/// use term_roster::models::ClassShell;
///
/// let shells = vec![
///     ClassShell::new("L2-01", "L2").with_students(["a", "b"]),
///     ClassShell::new("L1-01", "L1").with_students(["c"]),
/// ];
/// let ctx = DispatchContext::new()
///     .with_competent_teachers("L1", 1)
///     .with_competent_teachers("L2", 4);
///
/// let order = RuleEngine::most_constrained_first().sort_indices(&shells, &ctx);
/// assert_eq!(order, vec![1, 0]);
/// ```
#[derive(Clone)]
pub struct RuleEngine {
    rules: Vec<WeightedRule>,
    mode: EvaluationMode,
    tie_breaker: TieBreaker,
    epsilon: f64,
}

impl RuleEngine {
    /// Creates an empty rule engine.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            mode: EvaluationMode::Sequential,
            tie_breaker: TieBreaker::NextRule,
            epsilon: 1e-9,
        }
    }

    /// Default placement order: fewest competent teachers, then larger
    /// roster, then curriculum order, then id.
    pub fn most_constrained_first() -> Self {
        Self::new()
            .with_rule(rules::FewestCompetentTeachers)
            .with_tie_breaker(rules::LargestRoster)
            .with_tie_breaker(rules::LevelOrder)
            .with_final_tie_breaker(TieBreaker::ById)
    }

    /// Adds a primary rule (weight 1.0).
    pub fn with_rule<R: DispatchingRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight: 1.0,
        });
        self
    }

    /// Adds a weighted rule.
    pub fn with_weighted_rule<R: DispatchingRule + 'static>(
        mut self,
        rule: R,
        weight: f64,
    ) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight,
        });
        self
    }

    /// Adds a tie-breaking rule (weight 0.0, used only in Sequential mode).
    pub fn with_tie_breaker<R: DispatchingRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight: 0.0,
        });
        self
    }

    /// Sets the evaluation mode.
    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the final tie-breaking strategy.
    pub fn with_final_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }

    /// Sorts shells by priority (highest priority first).
    ///
    /// Returns indices into the original slice. The sort is stable.
    pub fn sort_indices(&self, shells: &[ClassShell], context: &DispatchContext) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..shells.len()).collect();

        match &self.mode {
            EvaluationMode::Sequential => {
                indices.sort_by(|&a, &b| self.compare_sequential(&shells[a], &shells[b], context));
            }
            EvaluationMode::Weighted => {
                let scores: Vec<f64> = shells
                    .iter()
                    .map(|s| self.weighted_score(s, context))
                    .collect();
                indices.sort_by(|&a, &b| {
                    scores[a]
                        .partial_cmp(&scores[b])
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| self.final_tie(&shells[a], &shells[b]))
                });
            }
        }

        indices
    }

    /// Returns the index of the highest-priority shell.
    pub fn select_best(&self, shells: &[ClassShell], context: &DispatchContext) -> Option<usize> {
        self.sort_indices(shells, context).first().copied()
    }

    /// Evaluates a single shell and returns the weighted score of each rule.
    pub fn evaluate(&self, shell: &ClassShell, context: &DispatchContext) -> Vec<RuleScore> {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(shell, context) * wr.weight)
            .collect()
    }

    fn compare_sequential(
        &self,
        a: &ClassShell,
        b: &ClassShell,
        context: &DispatchContext,
    ) -> std::cmp::Ordering {
        for wr in &self.rules {
            let score_a = wr.rule.evaluate(a, context);
            let score_b = wr.rule.evaluate(b, context);

            if (score_a - score_b).abs() > self.epsilon {
                return score_a
                    .partial_cmp(&score_b)
                    .unwrap_or(std::cmp::Ordering::Equal);
            }
        }
        self.final_tie(a, b)
    }

    fn final_tie(&self, a: &ClassShell, b: &ClassShell) -> std::cmp::Ordering {
        match &self.tie_breaker {
            TieBreaker::NextRule => std::cmp::Ordering::Equal,
            TieBreaker::ById => a.id.cmp(&b.id),
        }
    }

    fn weighted_score(&self, shell: &ClassShell, context: &DispatchContext) -> f64 {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(shell, context) * wr.weight)
            .sum()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::most_constrained_first()
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field(
                "rules",
                &self
                    .rules
                    .iter()
                    .map(|r| format!("{}(w={})", r.rule.name(), r.weight))
                    .collect::<Vec<_>>(),
            )
            .field("mode", &self.mode)
            .finish()
    }
}
