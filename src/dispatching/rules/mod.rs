//! Built-in dispatching rules.
//!
//! # Categories
//!
//! - **Constraint-based**: MCT (fewest competent teachers), LCAP (least capacity)
//! - **Size-based**: LR (largest roster), SR (smallest roster)
//! - **Curriculum**: LO (level order)
//!
//! # Score Convention
//! All rules return lower scores for higher priority shells.

use super::{DispatchContext, DispatchingRule, RuleScore};
use crate::models::ClassShell;

// ======================== Constraint-based rules ========================

/// Fewest Competent Teachers.
///
/// Shells of levels that few teachers can take go first. Levels nobody
/// covers score 0 and surface early as unresolved.
#[derive(Debug, Clone, Copy)]
pub struct FewestCompetentTeachers;

impl DispatchingRule for FewestCompetentTeachers {
    fn name(&self) -> &'static str {
        "MCT"
    }

    fn evaluate(&self, shell: &ClassShell, context: &DispatchContext) -> RuleScore {
        context
            .competent_teachers
            .get(&shell.level_id)
            .copied()
            .unwrap_or(0) as f64
    }

    fn description(&self) -> &'static str {
        "Fewest Competent Teachers"
    }
}

/// Least Level Capacity.
///
/// Prioritizes levels whose competent teachers have the fewest weekly
/// classes to give.
#[derive(Debug, Clone, Copy)]
pub struct LeastCapacity;

impl DispatchingRule for LeastCapacity {
    fn name(&self) -> &'static str {
        "LCAP"
    }

    fn evaluate(&self, shell: &ClassShell, context: &DispatchContext) -> RuleScore {
        context
            .level_capacity
            .get(&shell.level_id)
            .copied()
            .unwrap_or(0) as f64
    }

    fn description(&self) -> &'static str {
        "Least Level Capacity"
    }
}

// ======================== Size-based rules ========================

/// Largest Roster.
#[derive(Debug, Clone, Copy)]
pub struct LargestRoster;

impl DispatchingRule for LargestRoster {
    fn name(&self) -> &'static str {
        "LR"
    }

    fn evaluate(&self, shell: &ClassShell, _context: &DispatchContext) -> RuleScore {
        -(shell.size() as f64)
    }

    fn description(&self) -> &'static str {
        "Largest Roster"
    }
}

/// Smallest Roster.
#[derive(Debug, Clone, Copy)]
pub struct SmallestRoster;

impl DispatchingRule for SmallestRoster {
    fn name(&self) -> &'static str {
        "SR"
    }

    fn evaluate(&self, shell: &ClassShell, _context: &DispatchContext) -> RuleScore {
        shell.size() as f64
    }

    fn description(&self) -> &'static str {
        "Smallest Roster"
    }
}

// ======================== Curriculum rule ========================

/// Level Order.
///
/// Earlier curriculum stages first. Unknown levels go last.
#[derive(Debug, Clone, Copy)]
pub struct LevelOrder;

impl DispatchingRule for LevelOrder {
    fn name(&self) -> &'static str {
        "LO"
    }

    fn evaluate(&self, shell: &ClassShell, context: &DispatchContext) -> RuleScore {
        context
            .level_order
            .get(&shell.level_id)
            .map(|&o| o as f64)
            .unwrap_or(f64::MAX)
    }

    fn description(&self) -> &'static str {
        "Level Order"
    }
}
