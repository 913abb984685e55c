//! Atomic teacher/slot binding.
//!
//! The assigner is the only code path that binds a class to a teacher and
//! slot, both during generation and during refinement. Every operation runs
//! all checks against the current schedule first and writes only when all
//! of them pass, so a rejected call leaves the schedule untouched.
//!
//! # Checks (in order)
//!
//! 1. Slot is in the configured grid and in the teacher's submission
//!    ([`RosterError::Availability`])
//! 2. Teacher does not already hold the slot in another class
//!    ([`RosterError::Collision`])
//! 3. Teacher is competent for the level
//! 4. Weekly cap and per-level cap are respected
//! 5. A classroom is free at the slot, when rooms are limited

use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::{Result, RosterError};
use crate::models::{ClassGroup, ClassShell, Schedule, Teacher, TermFoundation, TimeSlot};
use crate::validation::{ValidationError, ValidationErrorKind};

/// Binds classes to teachers and slots.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleAssigner<'a> {
    foundation: &'a TermFoundation,
    config: &'a GenerationConfig,
}

impl<'a> ScheduleAssigner<'a> {
    /// Creates an assigner for a term.
    pub fn new(foundation: &'a TermFoundation, config: &'a GenerationConfig) -> Self {
        Self { foundation, config }
    }

    fn teacher(&self, teacher_id: &str) -> Result<&'a Teacher> {
        self.foundation
            .teacher(teacher_id)
            .ok_or_else(|| RosterError::not_found("teacher", teacher_id))
    }

    /// Checks whether a class of `level_id` may be bound to
    /// `(teacher_id, slot)`.
    ///
    /// `class_id` names the class being rebound, whose current binding is
    /// ignored; `None` for a new class.
    pub fn check(
        &self,
        schedule: &Schedule,
        class_id: Option<&str>,
        level_id: &str,
        teacher_id: &str,
        slot: &TimeSlot,
    ) -> Result<()> {
        let teacher = self.teacher(teacher_id)?;

        if !self.config.grid.contains(slot) || !teacher.is_available_at(slot) {
            return Err(RosterError::Availability {
                teacher_id: teacher_id.to_string(),
                slot: *slot,
            });
        }

        if let Some(holder) = schedule.holder_of(teacher_id, slot, class_id) {
            return Err(RosterError::Collision {
                teacher_id: teacher_id.to_string(),
                slot: *slot,
                holder_class_id: holder.id.clone(),
            });
        }

        if teacher.tier_for(level_id).is_none() {
            return Err(ValidationError::new(
                ValidationErrorKind::NotCompetent,
                format!("Teacher '{teacher_id}' is not competent for level '{level_id}'"),
            )
            .into());
        }

        let others = |c: &&ClassGroup| c.teacher_id == teacher_id && class_id != Some(c.id.as_str());
        let load = schedule.classes.iter().filter(others).count();
        let cap = self.config.effective_cap(teacher.max_classes_per_week()) as usize;
        if load + 1 > cap {
            return Err(ValidationError::new(
                ValidationErrorKind::WorkloadExceeded,
                format!("Teacher '{teacher_id}' would teach {} classes (limit {cap})", load + 1),
            )
            .into());
        }
        if let Some(&level_cap) = teacher.level_caps.get(level_id) {
            let level_load = schedule
                .classes
                .iter()
                .filter(others)
                .filter(|c| c.level_id == level_id)
                .count();
            if level_load + 1 > level_cap as usize {
                return Err(ValidationError::new(
                    ValidationErrorKind::WorkloadExceeded,
                    format!(
                        "Teacher '{teacher_id}' would teach {} classes of level '{level_id}' (limit {level_cap})",
                        level_load + 1
                    ),
                )
                .into());
            }
        }

        if let Some(rooms) = self.config.rooms_per_slot {
            let parallel = schedule
                .classes
                .iter()
                .filter(|c| c.slot == *slot && class_id != Some(c.id.as_str()))
                .count();
            if parallel >= rooms as usize {
                return Err(ValidationError::new(
                    ValidationErrorKind::RoomsExhausted,
                    format!("All {rooms} classrooms are taken at {slot}"),
                )
                .into());
            }
        }

        Ok(())
    }

    /// Binds a shell into a new class.
    pub fn place(
        &self,
        schedule: &mut Schedule,
        shell: ClassShell,
        teacher_id: &str,
        slot: TimeSlot,
    ) -> Result<()> {
        if schedule.class(&shell.id).is_some() {
            return Err(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Class '{}' already exists", shell.id),
            )
            .into());
        }
        self.check(schedule, None, &shell.level_id, teacher_id, &slot)?;
        debug!(class = %shell.id, teacher = teacher_id, %slot, "placed");
        schedule.add_class(ClassGroup::from_shell(shell, teacher_id, slot));
        Ok(())
    }

    /// Rebinds an existing class to a teacher and slot.
    pub fn assign_slot(
        &self,
        schedule: &mut Schedule,
        class_id: &str,
        teacher_id: &str,
        slot: TimeSlot,
    ) -> Result<()> {
        let idx = schedule
            .class_index(class_id)
            .ok_or_else(|| RosterError::not_found("class", class_id))?;
        let level_id = schedule.classes[idx].level_id.clone();
        self.check(schedule, Some(class_id), &level_id, teacher_id, &slot)?;

        let class = &mut schedule.classes[idx];
        class.teacher_id = teacher_id.to_string();
        class.slot = slot;
        debug!(class = class_id, teacher = teacher_id, %slot, "assigned");
        Ok(())
    }

    /// Moves a class to another slot with its current teacher.
    pub fn move_slot(&self, schedule: &mut Schedule, class_id: &str, slot: TimeSlot) -> Result<()> {
        let teacher_id = schedule
            .class(class_id)
            .map(|c| c.teacher_id.clone())
            .ok_or_else(|| RosterError::not_found("class", class_id))?;
        self.assign_slot(schedule, class_id, &teacher_id, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvailabilitySubmission, CompetencyTier, Day, Level};

    fn mon(session: u8) -> TimeSlot {
        TimeSlot::new(Day::Monday, session)
    }

    fn foundation() -> TermFoundation {
        TermFoundation::new("T1")
            .with_level(Level::new("L1", 1))
            .with_level(Level::new("L2", 2))
            .with_teacher(
                Teacher::new("U1")
                    .with_competency("L1", CompetencyTier::Senior)
                    .with_level_cap("L1", 2)
                    .with_submission(AvailabilitySubmission::new(3).with_slots((0..5).map(mon))),
            )
            .with_teacher(
                Teacher::new("U2")
                    .with_competency("L1", CompetencyTier::Junior)
                    .with_competency("L2", CompetencyTier::Expert)
                    .with_submission(AvailabilitySubmission::full_week(5)),
            )
    }

    fn schedule() -> Schedule {
        let mut s = Schedule::new();
        s.add_class(ClassGroup::new("C1", "L1", "U1", mon(0)).with_students(["a"]));
        s.add_class(ClassGroup::new("C2", "L2", "U2", mon(0)).with_students(["b"]));
        s
    }

    #[test]
    fn test_move_slot() {
        let f = foundation();
        let config = GenerationConfig::default();
        let assigner = ScheduleAssigner::new(&f, &config);
        let mut s = schedule();

        assigner.move_slot(&mut s, "C1", mon(3)).unwrap();
        assert_eq!(s.class("C1").map(|c| c.slot), Some(mon(3)));
        // moving onto its own slot is not a collision
        assigner.move_slot(&mut s, "C1", mon(3)).unwrap();
    }

    #[test]
    fn test_availability_error_is_atomic() {
        let f = foundation();
        let config = GenerationConfig::default();
        let assigner = ScheduleAssigner::new(&f, &config);
        let mut s = schedule();
        let before = s.clone();

        let err = assigner
            .move_slot(&mut s, "C1", TimeSlot::new(Day::Tuesday, 0))
            .unwrap_err();
        assert!(matches!(err, RosterError::Availability { ref teacher_id, .. } if teacher_id == "U1"));
        assert_eq!(s, before);
    }

    #[test]
    fn test_grid_restricts_slots() {
        let f = foundation();
        let config = GenerationConfig::default()
            .with_grid(crate::models::SlotGrid::new(Day::ALL[..5].to_vec(), 5));
        let assigner = ScheduleAssigner::new(&f, &config);
        let mut s = schedule();
        let err = assigner
            .move_slot(&mut s, "C2", TimeSlot::new(Day::Sunday, 0))
            .unwrap_err();
        assert!(matches!(err, RosterError::Availability { .. }));
    }

    #[test]
    fn test_collision_names_holder() {
        let f = foundation();
        let config = GenerationConfig::default();
        let assigner = ScheduleAssigner::new(&f, &config);
        let mut s = schedule();
        s.add_class(ClassGroup::new("C3", "L2", "U2", mon(1)));
        let before = s.clone();

        let err = assigner.move_slot(&mut s, "C3", mon(0)).unwrap_err();
        match err {
            RosterError::Collision {
                teacher_id,
                slot,
                holder_class_id,
            } => {
                assert_eq!(teacher_id, "U2");
                assert_eq!(slot, mon(0));
                assert_eq!(holder_class_id, "C2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(s, before);
    }

    #[test]
    fn test_reassign_requires_competence() {
        let f = foundation();
        let config = GenerationConfig::default();
        let assigner = ScheduleAssigner::new(&f, &config);
        let mut s = schedule();

        let err = assigner.assign_slot(&mut s, "C2", "U1", mon(1)).unwrap_err();
        assert!(matches!(
            err,
            RosterError::Validation(ValidationError { kind: ValidationErrorKind::NotCompetent, .. })
        ));

        assigner.assign_slot(&mut s, "C1", "U2", mon(1)).unwrap();
        let c1 = s.class("C1").unwrap();
        assert_eq!((c1.teacher_id.as_str(), c1.slot), ("U2", mon(1)));
    }

    #[test]
    fn test_level_cap() {
        let f = foundation();
        let config = GenerationConfig::default();
        let assigner = ScheduleAssigner::new(&f, &config);
        let mut s = schedule();

        assigner
            .place(&mut s, ClassShell::new("C3", "L1"), "U1", mon(1))
            .unwrap();
        let err = assigner
            .place(&mut s, ClassShell::new("C4", "L1"), "U1", mon(2))
            .unwrap_err();
        assert!(matches!(
            err,
            RosterError::Validation(ValidationError { kind: ValidationErrorKind::WorkloadExceeded, .. })
        ));
        assert_eq!(s.class_count(), 3);
    }

    #[test]
    fn test_weekly_cap() {
        let f = foundation();
        let config = GenerationConfig::default().with_workload(4, 6, 1);
        let assigner = ScheduleAssigner::new(&f, &config);
        let mut s = schedule();

        let err = assigner
            .place(&mut s, ClassShell::new("C3", "L2"), "U2", mon(1))
            .unwrap_err();
        assert!(matches!(
            err,
            RosterError::Validation(ValidationError { kind: ValidationErrorKind::WorkloadExceeded, .. })
        ));
        // rebinding the class already held does not count twice
        assigner.move_slot(&mut s, "C2", mon(2)).unwrap();
    }

    #[test]
    fn test_place_rejects_duplicate_id_and_unknown() {
        let f = foundation();
        let config = GenerationConfig::default();
        let assigner = ScheduleAssigner::new(&f, &config);
        let mut s = schedule();

        let err = assigner
            .place(&mut s, ClassShell::new("C1", "L1"), "U1", mon(2))
            .unwrap_err();
        assert!(matches!(
            err,
            RosterError::Validation(ValidationError { kind: ValidationErrorKind::DuplicateId, .. })
        ));
        let err = assigner.move_slot(&mut s, "C9", mon(2)).unwrap_err();
        assert!(matches!(err, RosterError::NotFound { kind: "class", .. }));
        let err = assigner.assign_slot(&mut s, "C1", "U9", mon(2)).unwrap_err();
        assert!(matches!(err, RosterError::NotFound { kind: "teacher", .. }));
    }

    #[test]
    fn test_rooms_per_slot() {
        let f = foundation();
        let config = GenerationConfig::default().with_rooms_per_slot(1);
        let assigner = ScheduleAssigner::new(&f, &config);
        let mut s = schedule();
        s.classes.retain(|c| c.id == "C1");

        let err = assigner
            .place(&mut s, ClassShell::new("C3", "L2"), "U2", mon(0))
            .unwrap_err();
        assert!(matches!(
            err,
            RosterError::Validation(ValidationError { kind: ValidationErrorKind::RoomsExhausted, .. })
        ));
        assigner
            .place(&mut s, ClassShell::new("C3", "L2"), "U2", mon(1))
            .unwrap();
    }
}
