//! Shell dispatching rules and rule engine.
//!
//! Decides the order in which class shells are offered to placement.
//! Placing the hardest shells first (fewest competent teachers, least
//! capacity) leaves the flexible ones to fill the gaps.
//!
//! # Usage
//!
//! ```
//! use term_roster::dispatching::{DispatchContext, RuleEngine, TieBreaker};
//! use term_roster::dispatching::rules;
//!
//! let engine = RuleEngine::new()
//!     .with_rule(rules::FewestCompetentTeachers)
//!     .with_tie_breaker(rules::LargestRoster)
//!     .with_final_tie_breaker(TieBreaker::ById);
//!
//! let context = DispatchContext::new();
//! // let order = engine.sort_indices(&shells, &context);
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Brelaz (1979), "New methods to color the vertices of a graph"
//!   (most-constrained-first ordering)

mod context;
mod engine;
pub mod rules;

pub use context::DispatchContext;
pub use engine::{EvaluationMode, RuleEngine, TieBreaker};

use crate::models::ClassShell;
use std::fmt::Debug;

/// Score returned by a dispatching rule.
///
/// Lower scores = higher priority (placed first).
pub type RuleScore = f64;

/// A rule that evaluates how urgently a shell should be placed.
///
/// # Score Convention
/// **Lower score = higher priority.**
pub trait DispatchingRule: Send + Sync + Debug {
    /// Rule name (e.g., "MCT", "LR").
    fn name(&self) -> &'static str;

    /// Evaluates the priority of a shell.
    fn evaluate(&self, shell: &ClassShell, context: &DispatchContext) -> RuleScore;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}
