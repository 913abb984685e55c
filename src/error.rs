//! Error types for roster preparation.

use thiserror::Error;

use crate::config::ConfigError;
use crate::models::{TimeSlot, UnresolvedReason};
use crate::validation::ValidationError;

/// Main error type.
///
/// Every rejected operation returns one of these with enough structure for
/// a caller to explain the rejection.
#[derive(Debug, Error)]
pub enum RosterError {
    /// Generation is blocked on missing prerequisite data.
    #[error("term {term_id} is not ready for generation: {}", issues.join("; "))]
    FoundationIncomplete {
        term_id: String,
        issues: Vec<String>,
    },

    /// A shell could not get a teacher and slot. Reported, not fatal.
    #[error("shell {shell_id} (level {level_id}) left unresolved: {reason:?}")]
    UnresolvedAssignment {
        shell_id: String,
        level_id: String,
        reason: UnresolvedReason,
    },

    /// The teacher already holds the slot in another class.
    #[error("teacher {teacher_id} already teaches {holder_class_id} at {slot}")]
    Collision {
        teacher_id: String,
        slot: TimeSlot,
        holder_class_id: String,
    },

    /// The slot is outside the teacher's availability or the valid grid.
    #[error("teacher {teacher_id} is not available at {slot}")]
    Availability { teacher_id: String, slot: TimeSlot },

    /// The proposal a commit was based on is no longer current.
    #[error("proposal for term {term_id} moved on: based on v{based_on}, current is v{current}")]
    StaleProposal {
        term_id: String,
        based_on: u32,
        current: u32,
    },

    /// A mutation or input violates an invariant with no override present.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The refinement session is no longer open.
    #[error("refinement session is {state}")]
    SessionClosed { state: &'static str },

    /// The generation run was cancelled or superseded.
    #[error("generation run {run} for term {term_id} was cancelled")]
    Cancelled { term_id: String, run: u32 },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RosterError {
    /// Shorthand for [`RosterError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Result type alias for roster operations.
pub type Result<T> = std::result::Result<T, RosterError>;
