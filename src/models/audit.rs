//! Audit trail entries.
//!
//! Every successful mutation of a term's schedule produces one entry with
//! the actor, a timestamp and before/after snapshots of the class groups it
//! touched. Entries are consumed by an external audit-trail viewer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ClassGroup;

/// Kind of audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A generation run produced a new version.
    Generation,
    /// A refinement mutation.
    ManualEdit,
    /// A version was approved.
    Approval,
}

/// One audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the term's audit log (assigned by the store).
    pub sequence: u64,
    /// Academic term.
    pub term_id: String,
    /// Who acted.
    pub actor: String,
    /// When.
    pub at: DateTime<Utc>,
    /// What kind of action.
    pub action: AuditAction,
    /// Version the action was applied against.
    pub base_version: Option<u32>,
    /// Version the action resulted in, once committed.
    pub result_version: Option<u32>,
    /// Short description (e.g. `"transfer s12 C3 -> C4"`).
    pub description: String,
    /// Affected classes before the action.
    pub before: Vec<ClassGroup>,
    /// Affected classes after the action.
    pub after: Vec<ClassGroup>,
}

impl AuditEntry {
    /// Creates an entry stamped with the current time.
    pub fn now(
        term_id: impl Into<String>,
        actor: impl Into<String>,
        action: AuditAction,
        description: impl Into<String>,
    ) -> Self {
        Self {
            sequence: 0,
            term_id: term_id.into(),
            actor: actor.into(),
            at: Utc::now(),
            action,
            base_version: None,
            result_version: None,
            description: description.into(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Sets the base version.
    pub fn with_base_version(mut self, version: Option<u32>) -> Self {
        self.base_version = version;
        self
    }

    /// Sets before/after snapshots.
    pub fn with_snapshots(mut self, before: Vec<ClassGroup>, after: Vec<ClassGroup>) -> Self {
        self.before = before;
        self.after = after;
        self
    }
}
