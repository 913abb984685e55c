//! Teacher model.
//!
//! Teachers are the resources classes are assigned to. Each teacher has
//! competencies per level (a closed tier), and an availability submission
//! for the term listing free slots and a weekly class limit.
//!
//! A teacher without a submission is unavailable for every slot.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::TimeSlot;

/// Competency tier of a teacher for a level.
///
/// Ordered from least to most experienced, so `Expert > Senior > Junior`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompetencyTier {
    Junior,
    Senior,
    Expert,
}

/// A teacher's availability submission for one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySubmission {
    /// Slots the teacher can teach in.
    pub slots: BTreeSet<TimeSlot>,
    /// Maximum number of classes per week.
    pub max_classes_per_week: u32,
}

impl AvailabilitySubmission {
    /// Creates a submission with the given weekly limit and no slots.
    pub fn new(max_classes_per_week: u32) -> Self {
        Self {
            slots: BTreeSet::new(),
            max_classes_per_week,
        }
    }

    /// Adds one available slot.
    pub fn with_slot(mut self, slot: TimeSlot) -> Self {
        self.slots.insert(slot);
        self
    }

    /// Adds several available slots.
    pub fn with_slots(mut self, slots: impl IntoIterator<Item = TimeSlot>) -> Self {
        self.slots.extend(slots);
        self
    }

    /// Marks every slot of the nominal grid as available.
    pub fn full_week(max_classes_per_week: u32) -> Self {
        Self::new(max_classes_per_week).with_slots(TimeSlot::all())
    }
}

/// A teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    /// Unique teacher identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Levels this teacher may teach, with tier.
    pub competencies: BTreeMap<String, CompetencyTier>,
    /// Optional per-level limits on the number of classes.
    pub level_caps: BTreeMap<String, u32>,
    /// Term availability; `None` means nothing was submitted.
    pub submission: Option<AvailabilitySubmission>,
}

impl Teacher {
    /// Creates a teacher with no competencies and no submission.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            competencies: BTreeMap::new(),
            level_caps: BTreeMap::new(),
            submission: None,
        }
    }

    /// Sets the teacher name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a level competency.
    pub fn with_competency(mut self, level_id: impl Into<String>, tier: CompetencyTier) -> Self {
        self.competencies.insert(level_id.into(), tier);
        self
    }

    /// Limits the number of classes this teacher takes for one level.
    pub fn with_level_cap(mut self, level_id: impl Into<String>, cap: u32) -> Self {
        self.level_caps.insert(level_id.into(), cap);
        self
    }

    /// Attaches the availability submission.
    pub fn with_submission(mut self, submission: AvailabilitySubmission) -> Self {
        self.submission = Some(submission);
        self
    }

    /// Whether an availability submission exists.
    pub fn has_submitted(&self) -> bool {
        self.submission.is_some()
    }

    /// Competency tier for a level, if any.
    pub fn tier_for(&self, level_id: &str) -> Option<CompetencyTier> {
        self.competencies.get(level_id).copied()
    }

    /// Submitted weekly limit (0 without a submission).
    pub fn max_classes_per_week(&self) -> u32 {
        self.submission
            .as_ref()
            .map(|s| s.max_classes_per_week)
            .unwrap_or(0)
    }

    /// Whether the teacher submitted the given slot.
    pub fn is_available_at(&self, slot: &TimeSlot) -> bool {
        match &self.submission {
            None => false,
            Some(s) => s.slots.contains(slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Day;

    #[test]
    fn test_teacher_builder() {
        let t = Teacher::new("U1")
            .with_name("Ustadz One")
            .with_competency("L1", CompetencyTier::Expert)
            .with_competency("L2", CompetencyTier::Junior)
            .with_level_cap("L2", 1)
            .with_submission(
                AvailabilitySubmission::new(5).with_slot(TimeSlot::new(Day::Monday, 0)),
            );

        assert_eq!(t.tier_for("L1"), Some(CompetencyTier::Expert));
        assert_eq!(t.tier_for("L3"), None);
        assert_eq!(t.level_caps.get("L2"), Some(&1));
        assert_eq!(t.max_classes_per_week(), 5);
        assert!(t.is_available_at(&TimeSlot::new(Day::Monday, 0)));
        assert!(!t.is_available_at(&TimeSlot::new(Day::Monday, 1)));
    }

    #[test]
    fn test_no_submission_is_unavailable() {
        let t = Teacher::new("U2").with_competency("L1", CompetencyTier::Senior);
        assert!(!t.has_submitted());
        assert_eq!(t.max_classes_per_week(), 0);
        assert!(TimeSlot::all().all(|s| !t.is_available_at(&s)));
    }

    #[test]
    fn test_tier_ordering() {
        assert!(CompetencyTier::Expert > CompetencyTier::Senior);
        assert!(CompetencyTier::Senior > CompetencyTier::Junior);
    }

    #[test]
    fn test_full_week_submission() {
        let s = AvailabilitySubmission::full_week(6);
        assert_eq!(s.slots.len(), 35);
        assert_eq!(s.max_classes_per_week, 6);
    }
}
