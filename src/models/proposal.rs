//! Proposal model.
//!
//! A proposal is an immutable, versioned snapshot of a term schedule.
//! Generation creates a root version; refinement creates a child version
//! that records its parent. Only the store creates proposals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Schedule;

/// Approval stamp of a proposal version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// Who approved.
    pub approved_by: String,
    /// When.
    pub approved_at: DateTime<Utc>,
}

/// A versioned term schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// `"{term}/v{version}"`.
    pub id: String,
    /// Academic term.
    pub term_id: String,
    /// Version within the term (1-based, strictly increasing).
    pub version: u32,
    /// Generation run that produced the root of this lineage.
    pub generation_run: u32,
    /// Version this one was refined from; `None` for generated roots.
    pub parent_version: Option<u32>,
    /// Seed used for randomized tie-breaks, for replay.
    pub seed: u64,
    /// Classes and unresolved shells.
    pub schedule: Schedule,
    /// Optimization score (higher is better).
    pub optimization_score: f64,
    /// Number of findings reported by the conflict detector.
    pub conflict_count: usize,
    /// Who generated or committed this version.
    pub created_by: String,
    /// Approval stamp, once approved.
    pub approval: Option<Approval>,
}

impl Proposal {
    /// Builds the canonical proposal id.
    pub fn make_id(term_id: &str, version: u32) -> String {
        format!("{term_id}/v{version}")
    }

    /// Whether this version has been approved.
    pub fn is_approved(&self) -> bool {
        self.approval.is_some()
    }

    /// Whether this version was produced by refinement.
    pub fn is_refinement(&self) -> bool {
        self.parent_version.is_some()
    }
}
