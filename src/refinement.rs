//! Manual refinement of a proposal.
//!
//! A session edits a private draft copied from one proposal version. Each
//! mutation is validated before it writes, re-runs the conflict detector
//! and returns the new findings. A rejected mutation leaves the draft
//! untouched and the session open.
//!
//! # States
//!
//! ```text
//! Open --commit--> Committed(version)
//!   \---discard--> Discarded
//! ```
//!
//! A commit that loses the optimistic-concurrency race fails with
//! `StaleProposal` and leaves the session open; the caller reopens against
//! the new current version.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::assigner::ScheduleAssigner;
use crate::config::GenerationConfig;
use crate::detector::ConflictDetector;
use crate::error::{Result, RosterError};
use crate::generator::ScoreBreakdown;
use crate::models::{
    AuditAction, AuditEntry, ClassGroup, ConflictRecord, Proposal, Schedule, SizeOverride,
    TermFoundation, TimeSlot,
};
use crate::store::{ProposalStore, Revision};
use crate::validation::{ValidationError, ValidationErrorKind};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting mutations.
    Open,
    /// Committed as the given version.
    Committed(u32),
    /// Abandoned; nothing was written.
    Discarded,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            SessionState::Open => "open",
            SessionState::Committed(_) => "committed",
            SessionState::Discarded => "discarded",
        }
    }
}

/// An editing session over one proposal version.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use term_roster::config::GenerationConfig;
/// use term_roster::generator::ClassGenerator;
/// use term_roster::models::{
///     AvailabilitySubmission, CompetencyTier, Level, Student, Teacher, TermFoundation,
/// };
/// use term_roster::refinement::{RefinementSession, SessionState};
/// use term_roster::store::ProposalStore;
///
/// let foundation = TermFoundation::new("T1")
///     .with_level(Level::new("L1", 1))
///     .with_students((0..16).map(|i| Student::returning(format!("S{i:02}"), "L1")))
///     .with_teacher(
///         Teacher::new("U1")
///             .with_competency("L1", CompetencyTier::Expert)
///             .with_submission(AvailabilitySubmission::full_week(5)),
///     );
/// let config = GenerationConfig::default();
/// let store = ProposalStore::new();
/// let v1 = store
///     .generate(&ClassGenerator::new(config.clone()), &foundation, "admin")
///     .unwrap()
///     .proposal;
///
/// let mut session = RefinementSession::open(Arc::clone(&v1), &foundation, &config, "alice");
/// session.auto_rebalance("L1").unwrap();
/// let v2 = session.commit(&store).unwrap();
/// assert_eq!(v2.version, 2);
/// assert_eq!(session.state(), SessionState::Committed(2));
/// ```
#[derive(Debug)]
pub struct RefinementSession<'a> {
    base: Arc<Proposal>,
    foundation: &'a TermFoundation,
    config: &'a GenerationConfig,
    actor: String,
    draft: Schedule,
    edits: Vec<AuditEntry>,
    findings: Vec<ConflictRecord>,
    state: SessionState,
}

impl<'a> RefinementSession<'a> {
    /// Opens a session on a proposal version.
    pub fn open(
        base: Arc<Proposal>,
        foundation: &'a TermFoundation,
        config: &'a GenerationConfig,
        actor: impl Into<String>,
    ) -> Self {
        let draft = base.schedule.clone();
        let findings = ConflictDetector::new(foundation, config).detect(&draft);
        Self {
            base,
            foundation,
            config,
            actor: actor.into(),
            draft,
            edits: Vec::new(),
            findings,
            state: SessionState::Open,
        }
    }

    /// Session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Version the session is based on.
    pub fn base(&self) -> &Proposal {
        &self.base
    }

    /// Current draft.
    pub fn draft(&self) -> &Schedule {
        &self.draft
    }

    /// Findings on the current draft.
    pub fn findings(&self) -> &[ConflictRecord] {
        &self.findings
    }

    /// Audit entries of the mutations applied so far.
    pub fn edits(&self) -> &[AuditEntry] {
        &self.edits
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            SessionState::Open => Ok(()),
            other => Err(RosterError::SessionClosed { state: other.name() }),
        }
    }

    fn assigner(&self) -> ScheduleAssigner<'a> {
        ScheduleAssigner::new(self.foundation, self.config)
    }

    fn class(&self, class_id: &str) -> Result<&ClassGroup> {
        self.draft
            .class(class_id)
            .ok_or_else(|| RosterError::not_found("class", class_id))
    }

    fn snapshot(&self, ids: &[&str]) -> Vec<ClassGroup> {
        ids.iter()
            .filter_map(|id| self.draft.class(id).cloned())
            .collect()
    }

    fn record(
        &mut self,
        description: String,
        before: Vec<ClassGroup>,
        after: Vec<ClassGroup>,
    ) -> Vec<ConflictRecord> {
        debug!(term = %self.base.term_id, actor = %self.actor, "{description}");
        let entry = AuditEntry::now(
            &self.base.term_id,
            &self.actor,
            AuditAction::ManualEdit,
            description,
        )
        .with_base_version(Some(self.base.version))
        .with_snapshots(before, after);
        self.edits.push(entry);
        self.findings = ConflictDetector::new(self.foundation, self.config).detect(&self.draft);
        self.findings.clone()
    }

    /// Moves one student between two classes of the same level.
    ///
    /// # Errors
    /// - `NotFound` for an unknown class.
    /// - `Validation` with `SameClass`, `StudentNotInRoster`,
    ///   `LevelMismatch`, or `SizeLimitExceeded` when the target would go
    ///   above its maximum without an override.
    pub fn transfer_student(
        &mut self,
        student_id: &str,
        from_class: &str,
        to_class: &str,
    ) -> Result<Vec<ConflictRecord>> {
        self.ensure_open()?;
        let from = self.class(from_class)?;
        let to = self.class(to_class)?;

        if from.id == to.id {
            return Err(ValidationError::new(
                ValidationErrorKind::SameClass,
                format!("Student {student_id} is already in {from_class}"),
            )
            .into());
        }
        if !from.has_student(student_id) {
            return Err(ValidationError::new(
                ValidationErrorKind::StudentNotInRoster,
                format!("Student {student_id} is not in {from_class}"),
            )
            .into());
        }
        if from.level_id != to.level_id {
            return Err(ValidationError::new(
                ValidationErrorKind::LevelMismatch,
                format!(
                    "{from_class} is level {} but {to_class} is level {}",
                    from.level_id, to.level_id
                ),
            )
            .into());
        }
        let detector = ConflictDetector::new(self.foundation, self.config);
        let bounds = detector.bounds_for(&to.level_id);
        if to.size() + 1 > bounds.max as usize && to.override_justification().is_none() {
            return Err(ValidationError::new(
                ValidationErrorKind::SizeLimitExceeded,
                format!(
                    "{to_class} would have {} students (maximum {})",
                    to.size() + 1,
                    bounds.max
                ),
            )
            .into());
        }

        let before = self.snapshot(&[from_class, to_class]);
        if let Some(c) = self.draft.class_mut(from_class) {
            c.roster.remove(student_id);
        }
        if let Some(c) = self.draft.class_mut(to_class) {
            c.roster.insert(student_id.to_string());
        }
        let after = self.snapshot(&[from_class, to_class]);

        if let Some(target) = after.last() {
            let new = target
                .roster
                .iter()
                .filter(|id| self.foundation.student(id).is_some_and(|s| s.is_new()))
                .count();
            debug!(
                class = to_class,
                new_share = new as f64 / target.size() as f64,
                pool_share = detector.pool_new_ratio(&target.level_id),
                "target ratio"
            );
        }
        Ok(self.record(
            format!("transfer {student_id} {from_class} -> {to_class}"),
            before,
            after,
        ))
    }

    /// Gives a class to another teacher at the same slot.
    pub fn reassign_teacher(
        &mut self,
        class_id: &str,
        teacher_id: &str,
    ) -> Result<Vec<ConflictRecord>> {
        self.ensure_open()?;
        let slot = self.class(class_id)?.slot;
        let before = self.snapshot(&[class_id]);
        self.assigner()
            .assign_slot(&mut self.draft, class_id, teacher_id, slot)?;
        let after = self.snapshot(&[class_id]);
        Ok(self.record(format!("reassign {class_id} -> {teacher_id}"), before, after))
    }

    /// Moves a class to another slot with its current teacher.
    pub fn move_time_slot(&mut self, class_id: &str, slot: TimeSlot) -> Result<Vec<ConflictRecord>> {
        self.ensure_open()?;
        let before = self.snapshot(&[class_id]);
        self.assigner().move_slot(&mut self.draft, class_id, slot)?;
        let after = self.snapshot(&[class_id]);
        Ok(self.record(format!("move {class_id} -> {slot}"), before, after))
    }

    /// Records a size-limit override on a class.
    ///
    /// The override stays on the class for every later mutation and
    /// version; size findings for it carry the justification.
    pub fn override_size_limit(
        &mut self,
        class_id: &str,
        justification: &str,
    ) -> Result<Vec<ConflictRecord>> {
        self.ensure_open()?;
        self.class(class_id)?;
        if justification.trim().is_empty() {
            return Err(ValidationError::new(
                ValidationErrorKind::EmptyJustification,
                format!("Size override for {class_id} needs a justification"),
            )
            .into());
        }

        let before = self.snapshot(&[class_id]);
        let granted_by = self.actor.clone();
        if let Some(c) = self.draft.class_mut(class_id) {
            c.size_override = Some(SizeOverride {
                justification: justification.trim().to_string(),
                granted_by,
                granted_at: Utc::now(),
            });
        }
        let after = self.snapshot(&[class_id]);
        Ok(self.record(format!("override size of {class_id}"), before, after))
    }

    /// Evens out class sizes within one level.
    ///
    /// Moves one student at a time from the largest to the smallest class
    /// until sizes differ by at most one. Teachers and slots never change
    /// and no student leaves the level. The moved student is one of the
    /// category the source holds a larger share of, lowest id first.
    pub fn auto_rebalance(&mut self, level_id: &str) -> Result<Vec<ConflictRecord>> {
        self.ensure_open()?;
        let mut ids: Vec<String> = self
            .draft
            .classes_for_level(level_id)
            .iter()
            .map(|c| c.id.clone())
            .collect();
        if ids.is_empty() {
            return Err(RosterError::not_found("level classes", level_id));
        }
        ids.sort();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let before = self.snapshot(&id_refs);

        let mut moves = 0usize;
        while let Some((from, to, student)) = self.next_rebalance_move(&id_refs) {
            if let Some(c) = self.draft.class_mut(&from) {
                c.roster.remove(&student);
            }
            if let Some(c) = self.draft.class_mut(&to) {
                c.roster.insert(student);
            }
            moves += 1;
        }
        if moves == 0 {
            return Ok(self.findings.clone());
        }

        let after = self.snapshot(&id_refs);
        Ok(self.record(
            format!("rebalance {level_id} ({moves} moves)"),
            before,
            after,
        ))
    }

    fn next_rebalance_move(&self, ids: &[&str]) -> Option<(String, String, String)> {
        let classes: Vec<&ClassGroup> = ids.iter().filter_map(|id| self.draft.class(id)).collect();
        let largest = classes
            .iter()
            .copied()
            .reduce(|a, b| if b.size() > a.size() { b } else { a })?;
        let smallest = classes
            .iter()
            .copied()
            .reduce(|a, b| if b.size() < a.size() { b } else { a })?;
        if largest.size() < smallest.size() + 2 {
            return None;
        }

        let is_new = |id: &str| self.foundation.student(id).is_some_and(|s| s.is_new());
        let share = |c: &ClassGroup| {
            if c.size() == 0 {
                0.0
            } else {
                c.roster.iter().filter(|id| is_new(id)).count() as f64 / c.size() as f64
            }
        };
        let move_new = share(largest) > share(smallest);
        let student = largest
            .roster
            .iter()
            .find(|id| is_new(id) == move_new)
            .or_else(|| largest.roster.iter().next())?;
        Some((largest.id.clone(), smallest.id.clone(), student.clone()))
    }

    /// Binds an unresolved shell to a teacher and slot.
    pub fn place_unresolved(
        &mut self,
        shell_id: &str,
        teacher_id: &str,
        slot: TimeSlot,
    ) -> Result<Vec<ConflictRecord>> {
        self.ensure_open()?;
        let idx = self
            .draft
            .unresolved
            .iter()
            .position(|u| u.shell.id == shell_id)
            .ok_or_else(|| RosterError::not_found("unresolved shell", shell_id))?;
        let shell = self.draft.unresolved[idx].shell.clone();

        self.assigner()
            .place(&mut self.draft, shell, teacher_id, slot)?;
        self.draft.unresolved.remove(idx);
        self.draft.classes.sort_by(|a, b| a.id.cmp(&b.id));

        let after = self.snapshot(&[shell_id]);
        Ok(self.record(
            format!("place {shell_id} -> {teacher_id} at {slot}"),
            Vec::new(),
            after,
        ))
    }

    /// Commits the draft as the next version.
    ///
    /// # Errors
    /// The session stays open on every error.
    /// - `Validation(SizeLimitExceeded)` if a class is outside its bounds
    ///   without an override.
    /// - `Validation(BlockingConflicts)` if the draft has blocking findings
    ///   other than students held by unresolved shells.
    /// - `StaleProposal` if another version was committed since the base.
    pub fn commit(&mut self, store: &ProposalStore) -> Result<Arc<Proposal>> {
        self.ensure_open()?;
        let detector = ConflictDetector::new(self.foundation, self.config);
        self.findings = detector.detect(&self.draft);
        let unjustified = ConflictDetector::unjustified_sizes(&self.findings);
        if let Some(first) = unjustified.first() {
            return Err(ValidationError::new(
                ValidationErrorKind::SizeLimitExceeded,
                format!(
                    "{} class(es) outside size bounds without override: {}",
                    unjustified.len(),
                    first.message
                ),
            )
            .into());
        }

        let revision = Revision {
            parent_version: self.base.version,
            schedule: self.draft.clone(),
            optimization_score: ScoreBreakdown::calculate(&self.draft, self.foundation, self.config)
                .score,
            conflict_count: self.findings.len(),
            created_by: self.actor.clone(),
            edits: self.edits.clone(),
        };
        let proposal = store.commit(&self.base.term_id, revision, &detector)?;
        self.state = SessionState::Committed(proposal.version);
        Ok(proposal)
    }

    /// Abandons the session. Nothing is written.
    pub fn discard(&mut self) -> Result<()> {
        self.ensure_open()?;
        debug!(term = %self.base.term_id, edits = self.edits.len(), "session discarded");
        self.state = SessionState::Discarded;
        Ok(())
    }
}
