//! Schedule (solution) model.
//!
//! A schedule is the content of a proposal: the class groups that were
//! bound to a teacher and slot, plus the shells that could not be placed.
//! Every pool student belongs to exactly one of the two.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ClassGroup, ClassShell, TimeSlot};

/// Why a shell could not be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnresolvedReason {
    /// No teacher is competent for the level.
    NoCompetentTeacher,
    /// Every competent teacher is at a weekly or per-level limit.
    NoCapacity,
    /// Competent teachers with capacity have no free slot left.
    NoFreeSlot,
    /// The level has fewer students than its minimum class size and
    /// undersized classes are not allowed.
    UndersizedLevel,
}

/// A shell left without teacher and slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedShell {
    /// The unplaced roster.
    pub shell: ClassShell,
    /// Why placement failed.
    pub reason: UnresolvedReason,
}

impl UnresolvedShell {
    /// Creates an unresolved entry.
    pub fn new(shell: ClassShell, reason: UnresolvedReason) -> Self {
        Self { shell, reason }
    }
}

/// Class groups and unresolved shells of one proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Placed classes.
    pub classes: Vec<ClassGroup>,
    /// Shells that still need a teacher and slot.
    pub unresolved: Vec<UnresolvedShell>,
}

impl Schedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class.
    pub fn add_class(&mut self, class: ClassGroup) {
        self.classes.push(class);
    }

    /// Adds an unresolved shell.
    pub fn add_unresolved(&mut self, shell: ClassShell, reason: UnresolvedReason) {
        self.unresolved.push(UnresolvedShell::new(shell, reason));
    }

    /// Number of placed classes.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Finds a class by id.
    pub fn class(&self, class_id: &str) -> Option<&ClassGroup> {
        self.classes.iter().find(|c| c.id == class_id)
    }

    /// Finds a class by id, mutably.
    pub fn class_mut(&mut self, class_id: &str) -> Option<&mut ClassGroup> {
        self.classes.iter_mut().find(|c| c.id == class_id)
    }

    /// Position of a class in `classes`.
    pub fn class_index(&self, class_id: &str) -> Option<usize> {
        self.classes.iter().position(|c| c.id == class_id)
    }

    /// Classes taught by a teacher.
    pub fn classes_for_teacher(&self, teacher_id: &str) -> Vec<&ClassGroup> {
        self.classes
            .iter()
            .filter(|c| c.teacher_id == teacher_id)
            .collect()
    }

    /// Classes of a level.
    pub fn classes_for_level(&self, level_id: &str) -> Vec<&ClassGroup> {
        self.classes
            .iter()
            .filter(|c| c.level_id == level_id)
            .collect()
    }

    /// Number of classes a teacher holds.
    pub fn teacher_load(&self, teacher_id: &str) -> usize {
        self.classes
            .iter()
            .filter(|c| c.teacher_id == teacher_id)
            .count()
    }

    /// Class count per engaged teacher.
    pub fn all_loads(&self) -> BTreeMap<String, usize> {
        let mut loads: BTreeMap<String, usize> = BTreeMap::new();
        for c in &self.classes {
            *loads.entry(c.teacher_id.clone()).or_insert(0) += 1;
        }
        loads
    }

    /// The class holding `(teacher, slot)`, ignoring `exclude_class`.
    pub fn holder_of(
        &self,
        teacher_id: &str,
        slot: &TimeSlot,
        exclude_class: Option<&str>,
    ) -> Option<&ClassGroup> {
        self.classes.iter().find(|c| {
            c.teacher_id == teacher_id
                && c.slot == *slot
                && exclude_class.map_or(true, |ex| c.id != ex)
        })
    }

    /// The class whose roster contains a student.
    pub fn class_of_student(&self, student_id: &str) -> Option<&ClassGroup> {
        self.classes.iter().find(|c| c.has_student(student_id))
    }

    /// Total students placed in classes.
    pub fn assigned_student_count(&self) -> usize {
        self.classes.iter().map(|c| c.size()).sum()
    }

    /// Total students held by unresolved shells.
    pub fn unresolved_student_count(&self) -> usize {
        self.unresolved.iter().map(|u| u.shell.size()).sum()
    }

    /// Average roster size over placed classes.
    pub fn average_class_size(&self) -> f64 {
        if self.classes.is_empty() {
            return 0.0;
        }
        self.assigned_student_count() as f64 / self.classes.len() as f64
    }
}
