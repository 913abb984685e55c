//! Conflict findings.
//!
//! A conflict record is one finding of the conflict detector. Blocking
//! findings prevent approval; warnings are advisory and may be overridden
//! with a recorded justification.

use serde::{Deserialize, Serialize};

use super::TimeSlot;

/// Classification of findings, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// A pool student is not in any class.
    UnassignedStudent,
    /// A student appears in more than one roster or shell.
    DuplicateStudent,
    /// A teacher holds the same slot in two classes.
    DoubleBookedTeacher,
    /// A class sits in a slot its teacher did not submit.
    SlotUnavailable,
    /// A teacher holds more classes than allowed.
    TeacherOverloaded,
    /// A class is above its level maximum (needs a split).
    OversizedClass,
    /// A class is below its level minimum (needs a merge).
    UndersizedClass,
    /// A class's new/existing mix is far from its level's.
    RatioDeviation,
}

impl ConflictKind {
    /// Default severity of this kind.
    pub fn severity(self) -> Severity {
        match self {
            ConflictKind::UnassignedStudent
            | ConflictKind::DuplicateStudent
            | ConflictKind::DoubleBookedTeacher
            | ConflictKind::SlotUnavailable
            | ConflictKind::TeacherOverloaded => Severity::Blocking,
            ConflictKind::OversizedClass
            | ConflictKind::UndersizedClass
            | ConflictKind::RatioDeviation => Severity::Warning,
        }
    }
}

/// Whether a finding prevents approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Blocking,
    Warning,
}

/// Entity a finding refers to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Student(String),
    Teacher(String),
    Class(String),
    Shell(String),
    Level(String),
    Slot(TimeSlot),
}

/// One detector finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Finding kind.
    pub kind: ConflictKind,
    /// Severity (derived from kind).
    pub severity: Severity,
    /// Entities involved, most specific first.
    pub entities: Vec<EntityRef>,
    /// Human-readable description.
    pub message: String,
    /// Justification of a size override covering this finding.
    pub override_justification: Option<String>,
}

impl ConflictRecord {
    /// Creates a finding with the kind's default severity.
    pub fn new(kind: ConflictKind, entities: Vec<EntityRef>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            entities,
            message: message.into(),
            override_justification: None,
        }
    }

    /// Attaches an override justification.
    pub fn with_override(mut self, justification: Option<&str>) -> Self {
        self.override_justification = justification.map(str::to_owned);
        self
    }

    /// Whether the finding prevents approval.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }

    /// Whether a recorded override covers the finding.
    pub fn is_overridden(&self) -> bool {
        self.override_justification.is_some()
    }

    /// Whether the finding refers to a given entity.
    pub fn involves(&self, entity: &EntityRef) -> bool {
        self.entities.contains(entity)
    }
}
