//! Conflict detection.
//!
//! A pure scan of a schedule against the term foundation and configuration.
//! The detector never mutates anything, so running it twice on the same
//! schedule yields the same findings in the same order.
//!
//! # Reporting order
//!
//! | # | Kind | Severity |
//! |---|------|----------|
//! | 1 | Unassigned student (incl. held by unresolved shells) | Blocking |
//! | 2 | Duplicate student | Blocking |
//! | 3 | Double-booked teacher | Blocking |
//! | 4 | Slot outside availability | Blocking |
//! | 5 | Teacher over workload limit | Blocking |
//! | 6 | Oversized class (needs split) | Warning |
//! | 7 | Undersized class (needs merge) | Warning |
//! | 8 | Ratio deviation | Warning |
//!
//! Within a kind, findings follow student, teacher or class id order.
//! Size findings on a class with an override carry its justification.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::GenerationConfig;
use crate::models::{
    ClassGroup, ConflictKind, ConflictRecord, EntityRef, Proposal, Schedule, SizeBounds,
    TermFoundation, TimeSlot,
};

/// Scans schedules for blocking and warning findings.
#[derive(Debug, Clone, Copy)]
pub struct ConflictDetector<'a> {
    foundation: &'a TermFoundation,
    config: &'a GenerationConfig,
}

impl<'a> ConflictDetector<'a> {
    /// Creates a detector for a term.
    pub fn new(foundation: &'a TermFoundation, config: &'a GenerationConfig) -> Self {
        Self { foundation, config }
    }

    /// Scans a proposal.
    pub fn detect_proposal(&self, proposal: &Proposal) -> Vec<ConflictRecord> {
        self.detect(&proposal.schedule)
    }

    /// Scans a schedule.
    pub fn detect(&self, schedule: &Schedule) -> Vec<ConflictRecord> {
        let mut classes: Vec<&ClassGroup> = schedule.classes.iter().collect();
        classes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut findings = Vec::new();
        self.unassigned_students(schedule, &mut findings);
        self.duplicate_students(schedule, &classes, &mut findings);
        self.double_bookings(&classes, &mut findings);
        self.unavailable_slots(&classes, &mut findings);
        self.overloads(&classes, &mut findings);
        self.size_violations(&classes, &mut findings);
        self.ratio_deviations(&classes, &mut findings);
        findings
    }

    /// Whether a set of findings allows approval.
    pub fn is_approval_eligible(findings: &[ConflictRecord]) -> bool {
        findings.iter().all(|f| !f.is_blocking())
    }

    /// Number of blocking findings.
    pub fn blocking_count(findings: &[ConflictRecord]) -> usize {
        findings.iter().filter(|f| f.is_blocking()).count()
    }

    /// Blocking findings that keep a schedule from being committed.
    ///
    /// Students held by an unresolved shell are still accounted for and may
    /// be carried into a new version; any other blocking finding may not.
    pub fn commit_blockers(findings: &[ConflictRecord]) -> Vec<&ConflictRecord> {
        findings
            .iter()
            .filter(|f| f.is_blocking())
            .filter(|f| {
                !(f.kind == ConflictKind::UnassignedStudent
                    && f.entities.iter().any(|e| matches!(e, EntityRef::Shell(_))))
            })
            .collect()
    }

    /// Size findings not covered by an override.
    pub fn unjustified_sizes(findings: &[ConflictRecord]) -> Vec<&ConflictRecord> {
        findings
            .iter()
            .filter(|f| {
                matches!(
                    f.kind,
                    ConflictKind::OversizedClass | ConflictKind::UndersizedClass
                )
            })
            .filter(|f| !f.is_overridden())
            .collect()
    }

    /// Resolved size bounds of a level (defaults for unknown levels).
    pub fn bounds_for(&self, level_id: &str) -> SizeBounds {
        match self.foundation.level(level_id) {
            Some(level) => self.config.size_bounds_for(level),
            None => SizeBounds::new(self.config.size.default_min, self.config.size.default_max),
        }
    }

    /// Share of new students in a level's pool.
    pub fn pool_new_ratio(&self, level_id: &str) -> f64 {
        let (new, total) = self
            .foundation
            .students
            .iter()
            .filter(|s| s.level_id == level_id)
            .fold((0usize, 0usize), |(n, t), s| (n + usize::from(s.is_new()), t + 1));
        if total == 0 {
            0.0
        } else {
            new as f64 / total as f64
        }
    }

    fn unassigned_students(&self, schedule: &Schedule, out: &mut Vec<ConflictRecord>) {
        let placed: BTreeSet<&str> = schedule
            .classes
            .iter()
            .flat_map(|c| c.roster.iter().map(String::as_str))
            .collect();
        let mut pool: Vec<_> = self.foundation.students.iter().collect();
        pool.sort_by(|a, b| a.id.cmp(&b.id));

        for student in pool {
            if placed.contains(student.id.as_str()) {
                continue;
            }
            let holder = schedule
                .unresolved
                .iter()
                .find(|u| u.shell.roster.contains(&student.id));
            let record = match holder {
                Some(u) => ConflictRecord::new(
                    ConflictKind::UnassignedStudent,
                    vec![
                        EntityRef::Student(student.id.clone()),
                        EntityRef::Shell(u.shell.id.clone()),
                        EntityRef::Level(student.level_id.clone()),
                    ],
                    format!(
                        "Student {} is held by unresolved shell {} ({:?})",
                        student.id, u.shell.id, u.reason
                    ),
                ),
                None => ConflictRecord::new(
                    ConflictKind::UnassignedStudent,
                    vec![
                        EntityRef::Student(student.id.clone()),
                        EntityRef::Level(student.level_id.clone()),
                    ],
                    format!("Student {} of level {} is in no class", student.id, student.level_id),
                ),
            };
            out.push(record);
        }
    }

    fn duplicate_students(
        &self,
        schedule: &Schedule,
        classes: &[&ClassGroup],
        out: &mut Vec<ConflictRecord>,
    ) {
        let mut holders: BTreeMap<&str, Vec<EntityRef>> = BTreeMap::new();
        for class in classes {
            for s in &class.roster {
                holders
                    .entry(s.as_str())
                    .or_default()
                    .push(EntityRef::Class(class.id.clone()));
            }
        }
        for u in &schedule.unresolved {
            for s in &u.shell.roster {
                holders
                    .entry(s.as_str())
                    .or_default()
                    .push(EntityRef::Shell(u.shell.id.clone()));
            }
        }
        for (student, refs) in holders {
            if refs.len() < 2 {
                continue;
            }
            let mut entities = vec![EntityRef::Student(student.to_string())];
            entities.extend(refs);
            out.push(ConflictRecord::new(
                ConflictKind::DuplicateStudent,
                entities,
                format!("Student {student} appears in more than one roster"),
            ));
        }
    }

    fn double_bookings(&self, classes: &[&ClassGroup], out: &mut Vec<ConflictRecord>) {
        let mut by_cell: BTreeMap<(&str, TimeSlot), Vec<&str>> = BTreeMap::new();
        for class in classes {
            by_cell
                .entry((class.teacher_id.as_str(), class.slot))
                .or_default()
                .push(class.id.as_str());
        }
        for ((teacher, slot), ids) in by_cell {
            if ids.len() < 2 {
                continue;
            }
            let mut entities = vec![EntityRef::Teacher(teacher.to_string()), EntityRef::Slot(slot)];
            entities.extend(ids.iter().map(|id| EntityRef::Class(id.to_string())));
            out.push(ConflictRecord::new(
                ConflictKind::DoubleBookedTeacher,
                entities,
                format!("Teacher {teacher} holds {slot} in {}", ids.join(", ")),
            ));
        }
    }

    fn unavailable_slots(&self, classes: &[&ClassGroup], out: &mut Vec<ConflictRecord>) {
        for class in classes {
            let available = self.config.grid.contains(&class.slot)
                && self
                    .foundation
                    .teacher(&class.teacher_id)
                    .is_some_and(|t| t.is_available_at(&class.slot));
            if available {
                continue;
            }
            out.push(ConflictRecord::new(
                ConflictKind::SlotUnavailable,
                vec![
                    EntityRef::Class(class.id.clone()),
                    EntityRef::Teacher(class.teacher_id.clone()),
                    EntityRef::Slot(class.slot),
                ],
                format!(
                    "Class {} is at {} outside teacher {}'s availability",
                    class.id, class.slot, class.teacher_id
                ),
            ));
        }
    }

    fn overloads(&self, classes: &[&ClassGroup], out: &mut Vec<ConflictRecord>) {
        let mut loads: BTreeMap<&str, usize> = BTreeMap::new();
        let mut level_loads: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        for class in classes {
            *loads.entry(class.teacher_id.as_str()).or_insert(0) += 1;
            *level_loads
                .entry((class.teacher_id.as_str(), class.level_id.as_str()))
                .or_insert(0) += 1;
        }

        for (teacher_id, load) in loads {
            let teacher = self.foundation.teacher(teacher_id);
            let cap = teacher
                .map(|t| self.config.effective_cap(t.max_classes_per_week()))
                .unwrap_or(0) as usize;
            if load > cap {
                out.push(ConflictRecord::new(
                    ConflictKind::TeacherOverloaded,
                    vec![EntityRef::Teacher(teacher_id.to_string())],
                    format!("Teacher {teacher_id} teaches {load} classes (limit {cap})"),
                ));
            }
            let Some(teacher) = teacher else { continue };
            for (level_id, &level_cap) in &teacher.level_caps {
                let level_load = level_loads
                    .get(&(teacher_id, level_id.as_str()))
                    .copied()
                    .unwrap_or(0);
                if level_load > level_cap as usize {
                    out.push(ConflictRecord::new(
                        ConflictKind::TeacherOverloaded,
                        vec![
                            EntityRef::Teacher(teacher_id.to_string()),
                            EntityRef::Level(level_id.clone()),
                        ],
                        format!(
                            "Teacher {teacher_id} teaches {level_load} classes of level {level_id} (limit {level_cap})"
                        ),
                    ));
                }
            }
        }
    }

    fn size_violations(&self, classes: &[&ClassGroup], out: &mut Vec<ConflictRecord>) {
        let mut oversized = Vec::new();
        let mut undersized = Vec::new();
        for class in classes {
            let bounds = self.bounds_for(&class.level_id);
            let size = class.size();
            let entities = vec![
                EntityRef::Class(class.id.clone()),
                EntityRef::Level(class.level_id.clone()),
            ];
            if size > bounds.max as usize {
                oversized.push(
                    ConflictRecord::new(
                        ConflictKind::OversizedClass,
                        entities,
                        format!(
                            "Class {} has {size} students, above maximum {} (split)",
                            class.id, bounds.max
                        ),
                    )
                    .with_override(class.override_justification()),
                );
            } else if size < bounds.min as usize {
                undersized.push(
                    ConflictRecord::new(
                        ConflictKind::UndersizedClass,
                        entities,
                        format!(
                            "Class {} has {size} students, below minimum {} (merge)",
                            class.id, bounds.min
                        ),
                    )
                    .with_override(class.override_justification()),
                );
            }
        }
        out.extend(oversized);
        out.extend(undersized);
    }

    fn ratio_deviations(&self, classes: &[&ClassGroup], out: &mut Vec<ConflictRecord>) {
        let index = self.foundation.student_index();
        let mut pool_ratio: BTreeMap<&str, f64> = BTreeMap::new();
        for class in classes {
            if class.roster.is_empty() {
                continue;
            }
            let target = *pool_ratio
                .entry(class.level_id.as_str())
                .or_insert_with(|| self.pool_new_ratio(&class.level_id));
            let new = class
                .roster
                .iter()
                .filter(|s| index.get(s.as_str()).is_some_and(|st| st.is_new()))
                .count();
            let ratio = new as f64 / class.size() as f64;
            let deviation = (ratio - target).abs();
            if deviation > self.config.ratio.tolerance + 1e-9 {
                out.push(ConflictRecord::new(
                    ConflictKind::RatioDeviation,
                    vec![
                        EntityRef::Class(class.id.clone()),
                        EntityRef::Level(class.level_id.clone()),
                    ],
                    format!(
                        "Class {} is {:.0}% new students, level pool is {:.0}%",
                        class.id,
                        ratio * 100.0,
                        target * 100.0
                    ),
                ));
            }
        }
    }
}
