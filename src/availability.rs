//! Teacher availability matrix.
//!
//! Builds one 35-cell grid (7 days x 5 sessions) per teacher from the term's
//! availability submissions, restricted to the configured schedulable grid,
//! together with competency tiers and effective load limits.
//!
//! The matrix also tracks run-local state during generation: which cells
//! each teacher has already consumed, per-teacher and per-level loads, and
//! how many classes run in parallel at each slot.
//!
//! # Complexity
//! Building is O(t * 35). `competent_teachers` is O(t log t).

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::config::GenerationConfig;
use crate::models::{CompetencyTier, Schedule, Teacher, TermFoundation, TimeSlot, GRID_CELLS};

/// Availability and run-local load of one teacher.
#[derive(Debug, Clone)]
pub struct TeacherAvailability {
    /// Teacher id.
    pub teacher_id: String,
    /// Competency tier per level.
    pub tiers: BTreeMap<String, CompetencyTier>,
    /// Per-level class caps.
    pub level_caps: BTreeMap<String, u32>,
    /// Effective weekly cap.
    pub cap: u32,
    available: [bool; GRID_CELLS],
    reserved: [bool; GRID_CELLS],
    load: u32,
    level_load: BTreeMap<String, u32>,
}

impl TeacherAvailability {
    fn build(teacher: &Teacher, config: &GenerationConfig) -> Self {
        let mut available = [false; GRID_CELLS];
        if let Some(sub) = &teacher.submission {
            for slot in &sub.slots {
                if !config.grid.contains(slot) {
                    continue;
                }
                if let Some(cell) = slot.cell() {
                    available[cell] = true;
                }
            }
        }
        Self {
            teacher_id: teacher.id.clone(),
            tiers: teacher.competencies.clone(),
            level_caps: teacher.level_caps.clone(),
            cap: config.effective_cap(teacher.max_classes_per_week()),
            available,
            reserved: [false; GRID_CELLS],
            load: 0,
            level_load: BTreeMap::new(),
        }
    }

    /// Whether the slot is submitted and schedulable.
    pub fn is_available(&self, slot: &TimeSlot) -> bool {
        slot.cell().is_some_and(|c| self.available[c])
    }

    /// Whether the slot is available and not yet consumed in this run.
    pub fn is_unreserved(&self, slot: &TimeSlot) -> bool {
        slot.cell()
            .is_some_and(|c| self.available[c] && !self.reserved[c])
    }

    /// Number of schedulable submitted slots.
    pub fn available_count(&self) -> usize {
        self.available.iter().filter(|a| **a).count()
    }

    /// Tier for a level, if competent.
    pub fn tier_for(&self, level_id: &str) -> Option<CompetencyTier> {
        self.tiers.get(level_id).copied()
    }

    /// Classes assigned so far.
    pub fn load(&self) -> u32 {
        self.load
    }

    /// Classes of one level assigned so far.
    pub fn level_load(&self, level_id: &str) -> u32 {
        self.level_load.get(level_id).copied().unwrap_or(0)
    }

    /// How many more classes of `level_id` this teacher can take.
    pub fn remaining_capacity(&self, level_id: &str) -> u32 {
        let weekly = self.cap.saturating_sub(self.load);
        match self.level_caps.get(level_id) {
            Some(&cap) => weekly.min(cap.saturating_sub(self.level_load(level_id))),
            None => weekly,
        }
    }

    /// Upper bound on classes this teacher can take in a week.
    pub fn weekly_capacity(&self) -> usize {
        (self.cap as usize).min(self.available_count())
    }
}

/// Queryable availability of all teachers for one term.
///
/// # Example
///
/// ```
/// use term_roster::availability::AvailabilityMatrix;
/// use term_roster::config::GenerationConfig;
/// use term_roster::models::*;
///
/// let foundation = TermFoundation::new("T1")
///     .with_level(Level::new("L1", 1))
///     .with_teacher(
///         Teacher::new("U1")
///             .with_competency("L1", CompetencyTier::Senior)
///             .with_submission(AvailabilitySubmission::new(3).with_slot(TimeSlot::new(Day::Monday, 0))),
///     );
/// let matrix = AvailabilityMatrix::build(&foundation, &GenerationConfig::default());
///
/// assert_eq!(matrix.candidate_slots("U1"), vec![TimeSlot::new(Day::Monday, 0)]);
/// assert_eq!(matrix.competent_teachers("L1").len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct AvailabilityMatrix {
    teachers: Vec<TeacherAvailability>,
    index: BTreeMap<String, usize>,
    slot_usage: [u32; GRID_CELLS],
    rooms_per_slot: Option<u32>,
}

impl AvailabilityMatrix {
    /// Builds the matrix from a foundation's submissions.
    ///
    /// Teachers without a submission get an empty grid and zero cap.
    pub fn build(foundation: &TermFoundation, config: &GenerationConfig) -> Self {
        let mut teachers: Vec<TeacherAvailability> = foundation
            .teachers
            .iter()
            .map(|t| TeacherAvailability::build(t, config))
            .collect();
        teachers.sort_by(|a, b| a.teacher_id.cmp(&b.teacher_id));
        let index = teachers
            .iter()
            .enumerate()
            .map(|(i, t)| (t.teacher_id.clone(), i))
            .collect();
        Self {
            teachers,
            index,
            slot_usage: [0; GRID_CELLS],
            rooms_per_slot: config.rooms_per_slot,
        }
    }

    /// Builds the matrix and reserves every placed class of a schedule.
    pub fn with_schedule(
        foundation: &TermFoundation,
        config: &GenerationConfig,
        schedule: &Schedule,
    ) -> Self {
        let mut matrix = Self::build(foundation, config);
        for class in &schedule.classes {
            matrix.reserve(&class.teacher_id, &class.level_id, &class.slot);
        }
        matrix
    }

    /// Looks up a teacher.
    pub fn teacher(&self, teacher_id: &str) -> Option<&TeacherAvailability> {
        self.index.get(teacher_id).map(|&i| &self.teachers[i])
    }

    /// All teachers, ordered by id.
    pub fn teachers(&self) -> impl Iterator<Item = &TeacherAvailability> {
        self.teachers.iter()
    }

    /// Whether another class can run in parallel at the slot.
    pub fn has_room(&self, slot: &TimeSlot) -> bool {
        match (self.rooms_per_slot, slot.cell()) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(rooms), Some(c)) => self.slot_usage[c] < rooms,
        }
    }

    /// Whether the teacher can take a new class at the slot.
    pub fn is_free(&self, teacher_id: &str, slot: &TimeSlot) -> bool {
        self.teacher(teacher_id)
            .is_some_and(|t| t.is_unreserved(slot))
            && self.has_room(slot)
    }

    /// Free slots of a teacher in grid order.
    pub fn candidate_slots(&self, teacher_id: &str) -> Vec<TimeSlot> {
        TimeSlot::all()
            .filter(|s| self.is_free(teacher_id, s))
            .collect()
    }

    /// Teachers competent for a level with a submitted grid.
    ///
    /// Ordered by tier (Expert first), then ascending load, then id.
    pub fn competent_teachers(&self, level_id: &str) -> Vec<&TeacherAvailability> {
        let mut list: Vec<&TeacherAvailability> = self
            .teachers
            .iter()
            .filter(|t| t.tier_for(level_id).is_some() && t.available_count() > 0)
            .collect();
        list.sort_by(|a, b| {
            Reverse(a.tier_for(level_id))
                .cmp(&Reverse(b.tier_for(level_id)))
                .then(a.load.cmp(&b.load))
                .then_with(|| a.teacher_id.cmp(&b.teacher_id))
        });
        list
    }

    /// Classes a teacher holds in this run.
    pub fn load(&self, teacher_id: &str) -> u32 {
        self.teacher(teacher_id).map_or(0, |t| t.load)
    }

    /// Classes running at a slot in this run.
    pub fn slot_usage(&self, slot: &TimeSlot) -> u32 {
        slot.cell().map_or(0, |c| self.slot_usage[c])
    }

    /// Marks `(teacher, slot)` consumed by a class of `level_id`.
    ///
    /// Returns `false` without changes if the teacher is unknown or the
    /// slot is unavailable or already consumed.
    pub fn reserve(&mut self, teacher_id: &str, level_id: &str, slot: &TimeSlot) -> bool {
        let (Some(&i), Some(cell)) = (self.index.get(teacher_id), slot.cell()) else {
            return false;
        };
        let t = &mut self.teachers[i];
        if !t.available[cell] || t.reserved[cell] {
            return false;
        }
        t.reserved[cell] = true;
        t.load += 1;
        *t.level_load.entry(level_id.to_string()).or_insert(0) += 1;
        self.slot_usage[cell] += 1;
        true
    }

    /// Undoes a [`reserve`](Self::reserve).
    pub fn release(&mut self, teacher_id: &str, level_id: &str, slot: &TimeSlot) -> bool {
        let (Some(&i), Some(cell)) = (self.index.get(teacher_id), slot.cell()) else {
            return false;
        };
        let t = &mut self.teachers[i];
        if !t.reserved[cell] {
            return false;
        }
        t.reserved[cell] = false;
        t.load = t.load.saturating_sub(1);
        if let Some(n) = t.level_load.get_mut(level_id) {
            *n = n.saturating_sub(1);
        }
        self.slot_usage[cell] = self.slot_usage[cell].saturating_sub(1);
        true
    }

    /// Weekly capacity of the teachers competent for a level.
    pub fn level_capacity(&self, level_id: &str) -> usize {
        self.competent_teachers(level_id)
            .iter()
            .map(|t| {
                let weekly = t.weekly_capacity();
                match t.level_caps.get(level_id) {
                    Some(&cap) => weekly.min(cap as usize),
                    None => weekly,
                }
            })
            .sum()
    }

    /// Weekly capacity of all teachers.
    pub fn total_capacity(&self) -> usize {
        self.teachers.iter().map(|t| t.weekly_capacity()).sum()
    }
}
