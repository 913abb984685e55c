//! Shared fixtures and end-to-end scenarios.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::models::{
    AvailabilitySubmission, ClassGroup, CompetencyTier, Day, Level, Proposal, Schedule, Student,
    Teacher, TermFoundation, TimeSlot,
};

/// One level of 16 students and one of 4, a single teacher for both.
pub(crate) fn small_foundation() -> TermFoundation {
    TermFoundation::new("T1")
        .with_level(Level::new("L1", 1))
        .with_level(Level::new("L2", 2))
        .with_students((0..16).map(|i| {
            if i % 3 == 0 {
                Student::fresh(format!("a{i:02}"), "L1")
            } else {
                Student::returning(format!("a{i:02}"), "L1")
            }
        }))
        .with_students((0..4).map(|i| Student::fresh(format!("b{i:02}"), "L2")))
        .with_teacher(
            Teacher::new("U1")
                .with_competency("L1", CompetencyTier::Expert)
                .with_competency("L2", CompetencyTier::Senior)
                .with_submission(AvailabilitySubmission::full_week(6)),
        )
}

/// 160 students over four levels (45 new), 12 teachers with a full week
/// and a limit of five classes each. Teacher `i` is Expert for level
/// `i % 4` and Senior for level `(i + 1) % 4`.
pub(crate) fn term_foundation() -> TermFoundation {
    let levels = [("L1", 46, 12), ("L2", 46, 11), ("L3", 36, 11), ("L4", 32, 11)];
    let mut f = TermFoundation::new("2026-T1").with_registered_students(160);
    for (order, (id, count, new)) in levels.iter().enumerate() {
        f = f
            .with_level(Level::new(*id, order as u32 + 1))
            .with_students((0..*count).map(|i| {
                let sid = format!("{id}-S{i:02}");
                if i < *new {
                    Student::fresh(sid, *id)
                } else {
                    Student::returning(sid, *id)
                }
            }));
    }
    for i in 0..12 {
        let id = format!("U{:02}", i + 1);
        f = f
            .with_teacher(
                Teacher::new(&id)
                    .with_competency(levels[i % 4].0, CompetencyTier::Expert)
                    .with_competency(levels[(i + 1) % 4].0, CompetencyTier::Senior)
                    .with_submission(AvailabilitySubmission::full_week(5)),
            )
            .with_required_teacher(id);
    }
    f
}

fn weekdays(limit: u32) -> AvailabilitySubmission {
    AvailabilitySubmission::new(limit).with_slots(TimeSlot::all().filter(|s| !s.day.is_weekend()))
}

/// A hand-built version 1 for refinement tests.
pub(crate) struct RefinementFixture {
    pub foundation: TermFoundation,
    pub config: GenerationConfig,
    pub proposal: Arc<Proposal>,
}

/// L1: C1 (s00..s09, U1, Monday#1) and C2 (s10..s16, U2, Monday#1).
/// L2: C3 (t00..t07, U2, Monday#2). All students existing.
pub(crate) fn refinement_fixture() -> RefinementFixture {
    let foundation = TermFoundation::new("T1")
        .with_level(Level::new("L1", 1))
        .with_level(Level::new("L2", 2))
        .with_students((0..17).map(|i| Student::returning(format!("s{i:02}"), "L1")))
        .with_students((0..8).map(|i| Student::returning(format!("t{i:02}"), "L2")))
        .with_teacher(
            Teacher::new("U1")
                .with_competency("L1", CompetencyTier::Expert)
                .with_competency("L2", CompetencyTier::Senior)
                .with_submission(weekdays(5)),
        )
        .with_teacher(
            Teacher::new("U2")
                .with_competency("L1", CompetencyTier::Senior)
                .with_competency("L2", CompetencyTier::Expert)
                .with_submission(weekdays(5)),
        );

    let mut schedule = Schedule::new();
    schedule.add_class(
        ClassGroup::new("C1", "L1", "U1", TimeSlot::new(Day::Monday, 0))
            .with_students((0..10).map(|i| format!("s{i:02}"))),
    );
    schedule.add_class(
        ClassGroup::new("C2", "L1", "U2", TimeSlot::new(Day::Monday, 0))
            .with_students((10..17).map(|i| format!("s{i:02}"))),
    );
    schedule.add_class(
        ClassGroup::new("C3", "L2", "U2", TimeSlot::new(Day::Monday, 1))
            .with_students((0..8).map(|i| format!("t{i:02}"))),
    );

    let proposal = Proposal {
        id: Proposal::make_id("T1", 1),
        term_id: "T1".into(),
        version: 1,
        generation_run: 1,
        parent_version: None,
        seed: 0,
        schedule,
        optimization_score: 0.0,
        conflict_count: 0,
        created_by: "fixture".into(),
        approval: None,
    };
    RefinementFixture {
        foundation,
        config: GenerationConfig::default(),
        proposal: Arc::new(proposal),
    }
}

/// Every pool student appears in exactly one roster or unresolved shell.
pub(crate) fn assert_partition(schedule: &Schedule, foundation: &TermFoundation) {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    let rosters = schedule
        .classes
        .iter()
        .map(|c| &c.roster)
        .chain(schedule.unresolved.iter().map(|u| &u.shell.roster));
    for roster in rosters {
        for s in roster {
            *seen.entry(s.as_str()).or_insert(0) += 1;
        }
    }
    for student in &foundation.students {
        assert_eq!(seen.get(student.id.as_str()), Some(&1), "student {}", student.id);
    }
    assert_eq!(seen.len(), foundation.students.len());
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::detector::ConflictDetector;
    use crate::error::RosterError;
    use crate::generator::ClassGenerator;
    use crate::models::{ConflictKind, UnresolvedReason};
    use crate::refinement::{RefinementSession, SessionState};
    use crate::store::ProposalStore;
    use crate::validation::ValidationErrorKind;

    #[test]
    fn test_generation_properties() {
        let f = term_foundation();
        let config = GenerationConfig::default();
        let outcome = ClassGenerator::new(config.clone()).generate(&f, 1).unwrap();
        let schedule = &outcome.schedule;

        for class in &schedule.classes {
            let bounds = config.size_bounds_for(f.level(&class.level_id).unwrap());
            assert!(bounds.contains(class.size()), "{} has {}", class.id, class.size());
        }

        let mut bookings = BTreeSet::new();
        for class in &schedule.classes {
            assert!(bookings.insert((class.teacher_id.as_str(), class.slot)));
        }

        for class in &schedule.classes {
            let teacher = f.teacher(&class.teacher_id).unwrap();
            assert!(teacher.is_available_at(&class.slot), "{} at {}", class.id, class.slot);
        }

        for (teacher, load) in schedule.all_loads() {
            let cap = f.teacher(&teacher).unwrap().max_classes_per_week();
            assert!(load as u32 <= cap);
        }

        assert_partition(schedule, &f);
        assert!(ConflictDetector::is_approval_eligible(&outcome.findings));
        assert!(!outcome
            .findings
            .iter()
            .any(|c| c.kind == ConflictKind::SlotUnavailable));
    }

    #[test]
    fn test_scenario_full_term() {
        let f = term_foundation();
        let outcome = ClassGenerator::new(GenerationConfig::default())
            .generate(&f, 1)
            .unwrap();
        let r = &outcome.report;

        assert!((15..=25).contains(&r.total_classes), "{} classes", r.total_classes);
        assert!((7.0..=10.0).contains(&r.average_class_size));
        assert!(
            (4.0..=6.0).contains(&r.average_teacher_workload),
            "workload {}",
            r.average_teacher_workload
        );
        assert_eq!(r.unassigned_student_count, 0);
        assert!(outcome.schedule.unresolved.is_empty());
        assert!(!outcome
            .findings
            .iter()
            .any(|c| c.kind == ConflictKind::DoubleBookedTeacher));
    }

    #[test]
    fn test_scenario_smaller_max_size() {
        let f = term_foundation();
        let base = ClassGenerator::new(GenerationConfig::default())
            .generate(&f, 1)
            .unwrap();
        let smaller = ClassGenerator::new(GenerationConfig::default().with_default_size(7, 8))
            .generate(&f, 1)
            .unwrap();
        assert!(smaller.report.total_classes > base.report.total_classes);
    }

    #[test]
    fn test_scenario_transfer_between_classes() {
        let fx = refinement_fixture();
        let mut session =
            RefinementSession::open(Arc::clone(&fx.proposal), &fx.foundation, &fx.config, "staff");
        let before = session.findings().len();

        let findings = session.transfer_student("s03", "C1", "C2").unwrap();
        assert_eq!(session.draft().class("C1").unwrap().size(), 9);
        assert_eq!(session.draft().class("C2").unwrap().size(), 8);
        assert_eq!(findings.len(), before);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_scenario_exhausted_teacher() {
        let f = term_foundation()
            .with_level(Level::new("L5", 5))
            .with_students((0..20).map(|i| Student::returning(format!("L5-S{i:02}"), "L5")))
            .with_teacher(
                Teacher::new("U13")
                    .with_competency("L5", CompetencyTier::Expert)
                    .with_submission(
                        AvailabilitySubmission::new(1).with_slot(TimeSlot::new(Day::Monday, 0)),
                    ),
            )
            .with_registered_students(180);
        let outcome = ClassGenerator::new(GenerationConfig::default())
            .generate(&f, 1)
            .unwrap();

        assert_eq!(outcome.unresolved.len(), 1);
        assert!(matches!(
            &outcome.unresolved[0],
            RosterError::UnresolvedAssignment { level_id, reason: UnresolvedReason::NoCapacity, .. }
                if level_id == "L5"
        ));
        assert_eq!(outcome.schedule.classes_for_level("L5").len(), 1);
        for level in ["L1", "L2", "L3", "L4"] {
            assert!(!outcome.schedule.classes_for_level(level).is_empty());
        }
        assert_eq!(outcome.schedule.class_count(), 19);
        assert_partition(&outcome.schedule, &f);
    }

    #[test]
    fn test_scenario_concurrent_sessions() {
        let fx = refinement_fixture();
        let store = ProposalStore::new();
        let gen = ClassGenerator::new(fx.config.clone());
        let v1 = store.generate(&gen, &fx.foundation, "admin").unwrap().proposal;

        let mut draft = RefinementSession::open(v1, &fx.foundation, &fx.config, "admin");
        let v2 = draft.commit(&store).unwrap();
        let mut draft = RefinementSession::open(v2, &fx.foundation, &fx.config, "admin");
        let v3 = draft.commit(&store).unwrap();
        assert_eq!(v3.version, 3);

        let mut a = RefinementSession::open(Arc::clone(&v3), &fx.foundation, &fx.config, "staff-a");
        let mut b = RefinementSession::open(Arc::clone(&v3), &fx.foundation, &fx.config, "staff-b");
        let class_id = v3.schedule.classes[0].id.clone();
        a.override_size_limit(&class_id, "approved by head teacher").unwrap();
        b.override_size_limit(&class_id, "parent request").unwrap();

        let v4 = a.commit(&store).unwrap();
        assert_eq!(v4.version, 4);
        assert_eq!(a.state(), SessionState::Committed(4));

        let err = b.commit(&store).unwrap_err();
        assert!(matches!(
            err,
            RosterError::StaleProposal { based_on: 3, current: 4, .. }
        ));
        assert_eq!(b.state(), SessionState::Open);
        assert_eq!(store.current_version(&fx.foundation.term_id), Some(4));
        assert_eq!(
            store
                .current(&fx.foundation.term_id)
                .unwrap()
                .schedule
                .class(&class_id)
                .unwrap()
                .override_justification(),
            Some("approved by head teacher")
        );
    }

    #[test]
    fn test_generation_is_deterministic() {
        let f = term_foundation();
        let gen = ClassGenerator::new(GenerationConfig::default());

        let a = ProposalStore::new().generate(&gen, &f, "admin").unwrap().proposal;
        let b = ProposalStore::new().generate(&gen, &f, "admin").unwrap().proposal;
        assert_eq!(
            serde_json::to_string(&*a).unwrap(),
            serde_json::to_string(&*b).unwrap()
        );
    }

    #[test]
    fn test_generated_overrides_are_deterministic() {
        // 12 students cannot be split into rosters of 7..10
        let f = TermFoundation::new("T1")
            .with_level(Level::new("L1", 1))
            .with_students((0..12).map(|i| Student::returning(format!("a{i:02}"), "L1")))
            .with_teacher(
                Teacher::new("U1")
                    .with_competency("L1", CompetencyTier::Expert)
                    .with_submission(AvailabilitySubmission::full_week(6)),
            );
        let gen = ClassGenerator::new(GenerationConfig::default());

        let a = ProposalStore::new().generate(&gen, &f, "admin").unwrap().proposal;
        let b = ProposalStore::new().generate(&gen, &f, "admin").unwrap().proposal;
        assert!(a.schedule.classes.iter().all(|c| c.size_override.is_some()));
        assert_eq!(
            serde_json::to_string(&*a).unwrap(),
            serde_json::to_string(&*b).unwrap()
        );
    }

    #[test]
    fn test_commit_rejects_drained_source_class() {
        let fx = refinement_fixture();
        let store = ProposalStore::new();
        let gen = ClassGenerator::new(fx.config.clone());
        let v1 = store.generate(&gen, &fx.foundation, "admin").unwrap().proposal;

        let mut l1 = v1.schedule.classes_for_level("L1");
        l1.sort_by_key(|c| std::cmp::Reverse(c.size()));
        let (target, source) = (l1[0].id.clone(), l1[1].id.clone());
        assert_eq!((l1[0].size(), l1[1].size()), (9, 8));
        let moving: Vec<String> = l1[1].roster.iter().take(2).cloned().collect();

        let mut session =
            RefinementSession::open(Arc::clone(&v1), &fx.foundation, &fx.config, "staff");
        session.override_size_limit(&target, "combined advanced group").unwrap();
        for student in &moving {
            session.transfer_student(student, &source, &target).unwrap();
        }
        assert_eq!(session.draft().class(&source).unwrap().size(), 6);

        let err = session.commit(&store).unwrap_err();
        assert!(matches!(
            err,
            RosterError::Validation(ref e) if e.kind == ValidationErrorKind::SizeLimitExceeded
        ));
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(store.current_version(&fx.foundation.term_id), Some(1));

        session.override_size_limit(&source, "small evening group").unwrap();
        let v2 = session.commit(&store).unwrap();
        assert_eq!(v2.version, 2);
        for c in &v2.schedule.classes {
            let bounds = fx.config.size_bounds_for(fx.foundation.level(&c.level_id).unwrap());
            assert!(bounds.contains(c.size()) || c.override_justification().is_some());
        }
    }

    #[test]
    fn test_detection_is_idempotent() {
        let f = term_foundation();
        let config = GenerationConfig::default().with_default_size(7, 8);
        let outcome = ClassGenerator::new(config.clone()).generate(&f, 1).unwrap();
        let detector = ConflictDetector::new(&f, &config);
        assert_eq!(detector.detect(&outcome.schedule), detector.detect(&outcome.schedule));
        assert_eq!(detector.detect(&outcome.schedule), outcome.findings);
    }

    #[test]
    fn test_cancelled_run_writes_nothing() {
        let f = term_foundation();
        let store = ProposalStore::new();
        let gen = ClassGenerator::new(GenerationConfig::default());

        let ticket = store.begin_generation(&f.term_id);
        ticket.cancel();
        let err = gen
            .generate_with_cancel(&f, ticket.run, ticket.flag())
            .unwrap_err();
        assert!(matches!(err, RosterError::Cancelled { .. }));
        assert!(store.current(&f.term_id).is_none());
        assert!(store.audit_log(&f.term_id).is_empty());

        let unset = AtomicBool::new(false);
        assert!(gen.generate_with_cancel(&f, 2, &unset).is_ok());
    }
}
