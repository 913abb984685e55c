//! Versioned proposal store.
//!
//! Holds, per term, the ordered history of proposal versions, the current
//! version, the generation run counter and the audit log. Each term has its
//! own lock; terms never contend with each other.
//!
//! # Concurrency
//!
//! - Generation runs outside the lock. A run holds a [`GenerationTicket`];
//!   starting a newer run for the same term cancels the older ticket, and a
//!   cancelled or superseded run writes nothing.
//! - Commits are compare-and-swap on the current version. A commit whose
//!   parent is no longer current fails with `StaleProposal` and changes
//!   nothing. A revision with blocking findings is rejected before the
//!   version check.
//! - Reads return `Arc` snapshots and only take the term lock briefly.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use tracing::{info, warn};

use crate::detector::ConflictDetector;
use crate::error::{Result, RosterError};
use crate::generator::{ClassGenerator, GenerationOutcome, GenerationReport};
use crate::models::{Approval, AuditAction, AuditEntry, Proposal, Schedule, TermFoundation};
use crate::validation::{ValidationError, ValidationErrorKind};

/// Handle of one generation run.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    /// Term.
    pub term_id: String,
    /// Run number (1-based per term).
    pub run: u32,
    cancel: Arc<AtomicBool>,
}

impl GenerationTicket {
    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Flag to pass to [`ClassGenerator::generate_with_cancel`].
    pub fn flag(&self) -> &AtomicBool {
        &self.cancel
    }
}

/// A refined schedule submitted for commit.
#[derive(Debug, Clone)]
pub struct Revision {
    /// Version the draft was based on.
    pub parent_version: u32,
    /// Refined schedule.
    pub schedule: Schedule,
    /// Score of the refined schedule.
    pub optimization_score: f64,
    /// Detector findings on the refined schedule.
    pub conflict_count: usize,
    /// Committing actor.
    pub created_by: String,
    /// Audit entries of the mutations, in order.
    pub edits: Vec<AuditEntry>,
}

/// A stored generation together with its report.
#[derive(Debug)]
pub struct GeneratedProposal {
    /// The stored version.
    pub proposal: Arc<Proposal>,
    /// Metrics and score of the run.
    pub report: GenerationReport,
    /// One `UnresolvedAssignment` per shell left unplaced.
    pub unresolved: Vec<RosterError>,
}

#[derive(Debug, Default)]
struct TermState {
    history: Vec<Arc<Proposal>>,
    audit: Vec<AuditEntry>,
    last_run: u32,
    active: Option<(u32, Arc<AtomicBool>)>,
}

impl TermState {
    fn current(&self) -> Option<&Arc<Proposal>> {
        self.history.last()
    }

    fn current_version(&self) -> u32 {
        self.current().map_or(0, |p| p.version)
    }

    fn append_audit(&mut self, mut entry: AuditEntry) {
        entry.sequence = self.audit.len() as u64 + 1;
        self.audit.push(entry);
    }
}

/// Per-term proposal versions with optimistic concurrency.
#[derive(Debug, Default)]
pub struct ProposalStore {
    terms: RwLock<BTreeMap<String, Arc<Mutex<TermState>>>>,
}

impl ProposalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn term(&self, term_id: &str) -> Arc<Mutex<TermState>> {
        if let Some(state) = self
            .terms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(term_id)
        {
            return Arc::clone(state);
        }
        let mut terms = self.terms.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(terms.entry(term_id.to_string()).or_default())
    }

    fn existing(&self, term_id: &str) -> Option<Arc<Mutex<TermState>>> {
        self.terms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(term_id)
            .cloned()
    }

    fn lock(state: &Mutex<TermState>) -> MutexGuard<'_, TermState> {
        state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a generation run, cancelling any run still in flight.
    pub fn begin_generation(&self, term_id: &str) -> GenerationTicket {
        let state = self.term(term_id);
        let mut state = Self::lock(&state);

        if let Some((run, flag)) = state.active.take() {
            flag.store(true, Ordering::Release);
            warn!(term = term_id, run, "generation superseded");
        }
        state.last_run += 1;
        let cancel = Arc::new(AtomicBool::new(false));
        state.active = Some((state.last_run, Arc::clone(&cancel)));

        GenerationTicket {
            term_id: term_id.to_string(),
            run: state.last_run,
            cancel,
        }
    }

    /// Stores the outcome of a run as the next version.
    ///
    /// # Errors
    /// `Cancelled` if the ticket was cancelled or superseded.
    pub fn complete_generation(
        &self,
        ticket: &GenerationTicket,
        outcome: GenerationOutcome,
        actor: &str,
    ) -> Result<Arc<Proposal>> {
        let state = self.term(&ticket.term_id);
        let mut state = Self::lock(&state);

        let is_active = matches!(&state.active, Some((run, _)) if *run == ticket.run);
        if ticket.is_cancelled() || !is_active {
            warn!(term = %ticket.term_id, run = ticket.run, "discarding cancelled generation");
            return Err(RosterError::Cancelled {
                term_id: ticket.term_id.clone(),
                run: ticket.run,
            });
        }
        state.active = None;

        let version = state.current_version() + 1;
        let proposal = Arc::new(Proposal {
            id: Proposal::make_id(&ticket.term_id, version),
            term_id: ticket.term_id.clone(),
            version,
            generation_run: ticket.run,
            parent_version: None,
            seed: outcome.seed,
            optimization_score: outcome.optimization_score(),
            conflict_count: outcome.findings.len(),
            schedule: outcome.schedule,
            created_by: actor.to_string(),
            approval: None,
        });
        state.history.push(Arc::clone(&proposal));

        let mut entry = AuditEntry::now(
            &ticket.term_id,
            actor,
            AuditAction::Generation,
            format!("generation run {}", ticket.run),
        );
        entry.result_version = Some(version);
        state.append_audit(entry);

        info!(term = %ticket.term_id, version, run = ticket.run, "generated version stored");
        Ok(proposal)
    }

    /// Runs a generator under a fresh ticket and stores the result.
    pub fn generate(
        &self,
        generator: &ClassGenerator,
        foundation: &TermFoundation,
        actor: &str,
    ) -> Result<GeneratedProposal> {
        let ticket = self.begin_generation(&foundation.term_id);
        let mut outcome = generator.generate_with_cancel(foundation, ticket.run, ticket.flag())?;
        let report = outcome.report.clone();
        let unresolved = std::mem::take(&mut outcome.unresolved);
        let proposal = self.complete_generation(&ticket, outcome, actor)?;
        Ok(GeneratedProposal {
            proposal,
            report,
            unresolved,
        })
    }

    /// Commits a refined schedule if its parent is still current.
    ///
    /// Students held by unresolved shells may be carried over. Any other
    /// blocking finding rejects the revision.
    ///
    /// # Errors
    /// - `Validation(BlockingConflicts)` if the schedule double-books a
    ///   teacher, overloads one, uses an unsubmitted slot, or drops or
    ///   duplicates a student.
    /// - `NotFound` if the term has no proposal.
    /// - `StaleProposal` if another version was committed since the parent.
    pub fn commit(
        &self,
        term_id: &str,
        revision: Revision,
        detector: &ConflictDetector<'_>,
    ) -> Result<Arc<Proposal>> {
        let findings = detector.detect(&revision.schedule);
        let blockers = ConflictDetector::commit_blockers(&findings);
        if let Some(first) = blockers.first() {
            warn!(term = term_id, blocking = blockers.len(), "commit rejected");
            return Err(ValidationError::new(
                ValidationErrorKind::BlockingConflicts,
                format!(
                    "revision of {term_id} v{} has {} blocking finding(s): {}",
                    revision.parent_version,
                    blockers.len(),
                    first.message
                ),
            )
            .into());
        }

        let state = self
            .existing(term_id)
            .ok_or_else(|| RosterError::not_found("term", term_id))?;
        let mut state = Self::lock(&state);

        let parent = state
            .current()
            .cloned()
            .ok_or_else(|| RosterError::not_found("proposal", term_id))?;
        if parent.version != revision.parent_version {
            warn!(
                term = term_id,
                based_on = revision.parent_version,
                current = parent.version,
                "stale commit rejected"
            );
            return Err(RosterError::StaleProposal {
                term_id: term_id.to_string(),
                based_on: revision.parent_version,
                current: parent.version,
            });
        }

        let version = parent.version + 1;
        let proposal = Arc::new(Proposal {
            id: Proposal::make_id(term_id, version),
            term_id: term_id.to_string(),
            version,
            generation_run: parent.generation_run,
            parent_version: Some(parent.version),
            seed: parent.seed,
            schedule: revision.schedule,
            optimization_score: revision.optimization_score,
            conflict_count: revision.conflict_count,
            created_by: revision.created_by,
            approval: None,
        });
        state.history.push(Arc::clone(&proposal));
        let edits = revision.edits.len();
        for mut entry in revision.edits {
            entry.result_version = Some(version);
            state.append_audit(entry);
        }

        info!(term = term_id, version, parent = parent.version, edits, "refinement committed");
        Ok(proposal)
    }

    /// Approves the current version.
    ///
    /// # Errors
    /// - `StaleProposal` if `version` is not current.
    /// - `Validation(NotApprovable)` if the detector reports blocking findings.
    pub fn approve(
        &self,
        term_id: &str,
        version: u32,
        actor: &str,
        detector: &ConflictDetector<'_>,
    ) -> Result<Arc<Proposal>> {
        let state = self
            .existing(term_id)
            .ok_or_else(|| RosterError::not_found("term", term_id))?;
        let mut state = Self::lock(&state);

        let current = state
            .current()
            .cloned()
            .ok_or_else(|| RosterError::not_found("proposal", term_id))?;
        if current.version != version {
            return Err(RosterError::StaleProposal {
                term_id: term_id.to_string(),
                based_on: version,
                current: current.version,
            });
        }

        let findings = detector.detect_proposal(&current);
        if !ConflictDetector::is_approval_eligible(&findings) {
            return Err(ValidationError::new(
                ValidationErrorKind::NotApprovable,
                format!(
                    "{} v{version} has {} blocking finding(s)",
                    term_id,
                    ConflictDetector::blocking_count(&findings)
                ),
            )
            .into());
        }

        let mut approved = (*current).clone();
        approved.approval = Some(Approval {
            approved_by: actor.to_string(),
            approved_at: Utc::now(),
        });
        let approved = Arc::new(approved);
        if let Some(last) = state.history.last_mut() {
            *last = Arc::clone(&approved);
        }

        let mut entry = AuditEntry::now(
            term_id,
            actor,
            AuditAction::Approval,
            format!("approve v{version}"),
        )
        .with_base_version(Some(version));
        entry.result_version = Some(version);
        state.append_audit(entry);

        info!(term = term_id, version, actor, "proposal approved");
        Ok(approved)
    }

    /// Current version of a term.
    pub fn current(&self, term_id: &str) -> Option<Arc<Proposal>> {
        let state = self.existing(term_id)?;
        let state = Self::lock(&state);
        state.current().cloned()
    }

    /// Current version number (`None` before the first generation).
    pub fn current_version(&self, term_id: &str) -> Option<u32> {
        self.current(term_id).map(|p| p.version)
    }

    /// A specific version.
    pub fn version(&self, term_id: &str, version: u32) -> Option<Arc<Proposal>> {
        let state = self.existing(term_id)?;
        let state = Self::lock(&state);
        state.history.iter().find(|p| p.version == version).cloned()
    }

    /// All versions, oldest first.
    pub fn history(&self, term_id: &str) -> Vec<Arc<Proposal>> {
        self.existing(term_id)
            .map(|state| {
                let state = Self::lock(&state);
                state.history.clone()
            })
            .unwrap_or_default()
    }

    /// Audit log, in sequence order.
    pub fn audit_log(&self, term_id: &str) -> Vec<AuditEntry> {
        self.existing(term_id)
            .map(|state| {
                let state = Self::lock(&state);
                state.audit.clone()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::testing;

    fn revision(parent: &Proposal, actor: &str) -> Revision {
        Revision {
            parent_version: parent.version,
            schedule: parent.schedule.clone(),
            optimization_score: parent.optimization_score,
            conflict_count: parent.conflict_count,
            created_by: actor.to_string(),
            edits: Vec::new(),
        }
    }

    #[test]
    fn test_generate_stores_version() {
        let store = ProposalStore::new();
        let f = testing::small_foundation();
        let gen = ClassGenerator::new(GenerationConfig::default());

        let generated = store.generate(&gen, &f, "admin").unwrap();
        let v1 = &generated.proposal;
        assert_eq!(v1.version, 1);
        assert_eq!(v1.id, "T1/v1");
        assert_eq!(v1.generation_run, 1);
        assert_eq!(v1.parent_version, None);

        // report and unresolved shells come back with the stored version
        assert_eq!(generated.report.total_classes, 2);
        assert_eq!(generated.report.unresolved_shells, 1);
        assert_eq!(generated.report.optimization_score(), v1.optimization_score);
        assert_eq!(generated.unresolved.len(), 1);
        assert!(matches!(
            &generated.unresolved[0],
            RosterError::UnresolvedAssignment { level_id, .. } if level_id == "L2"
        ));

        let v2 = store.generate(&gen, &f, "admin").unwrap().proposal;
        assert_eq!(v2.version, 2);
        assert_eq!(v2.generation_run, 2);
        assert_eq!(store.current_version("T1"), Some(2));
        assert_eq!(store.history("T1").len(), 2);
        assert_eq!(store.audit_log("T1").len(), 2);
        assert_eq!(store.audit_log("T1")[1].sequence, 2);
    }

    #[test]
    fn test_newer_run_cancels_older() {
        let store = ProposalStore::new();
        let f = testing::small_foundation();
        let gen = ClassGenerator::new(GenerationConfig::default());

        let first = store.begin_generation("T1");
        let second = store.begin_generation("T1");
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        let outcome = gen.generate(&f, first.run).unwrap();
        let err = store.complete_generation(&first, outcome, "admin").unwrap_err();
        assert!(matches!(err, RosterError::Cancelled { run: 1, .. }));
        assert!(store.current("T1").is_none());

        let err = gen
            .generate_with_cancel(&f, first.run, first.flag())
            .unwrap_err();
        assert!(matches!(err, RosterError::Cancelled { .. }));

        let outcome = gen.generate_with_cancel(&f, second.run, second.flag()).unwrap();
        let v = store.complete_generation(&second, outcome, "admin").unwrap();
        assert_eq!(v.version, 1);
        assert_eq!(v.generation_run, 2);
    }

    #[test]
    fn test_commit_is_compare_and_swap() {
        let store = ProposalStore::new();
        let f = testing::small_foundation();
        let config = GenerationConfig::default();
        let gen = ClassGenerator::new(config.clone());
        let detector = ConflictDetector::new(&f, &config);
        // L2 stays in an unresolved shell, which a commit may carry over
        let v1 = store.generate(&gen, &f, "admin").unwrap().proposal;

        let v2 = store.commit("T1", revision(&v1, "alice"), &detector).unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.parent_version, Some(1));
        assert_eq!(v2.seed, v1.seed);
        assert_eq!(v2.schedule.unresolved.len(), 1);

        let err = store.commit("T1", revision(&v1, "bob"), &detector).unwrap_err();
        assert!(matches!(
            err,
            RosterError::StaleProposal { based_on: 1, current: 2, .. }
        ));
        assert_eq!(store.current_version("T1"), Some(2));
        // v1 stays readable
        assert_eq!(store.version("T1", 1).unwrap().version, 1);
    }

    #[test]
    fn test_commit_rejects_blocking_revisions() {
        let store = ProposalStore::new();
        let f = testing::small_foundation();
        let config = GenerationConfig::default().with_undersized_allowed(true);
        let gen = ClassGenerator::new(config.clone());
        let detector = ConflictDetector::new(&f, &config);
        let v1 = store.generate(&gen, &f, "admin").unwrap().proposal;
        let audit = store.audit_log("T1").len();

        let assert_rejected = |rev: Revision| {
            let err = store.commit("T1", rev, &detector).unwrap_err();
            assert!(matches!(
                err,
                RosterError::Validation(ref e) if e.kind == ValidationErrorKind::BlockingConflicts
            ));
        };

        // double-booked teacher
        let mut rev = revision(&v1, "mallory");
        rev.schedule.classes[1].slot = rev.schedule.classes[0].slot;
        assert_rejected(rev);

        // student in two rosters
        let mut rev = revision(&v1, "mallory");
        let moved = rev.schedule.classes[0].roster.iter().next().cloned().unwrap();
        rev.schedule.classes[1].roster.insert(moved);
        assert_rejected(rev);

        // student dropped from every roster
        let mut rev = revision(&v1, "mallory");
        let dropped = rev.schedule.classes[0].roster.iter().next().cloned().unwrap();
        rev.schedule.classes[0].roster.remove(&dropped);
        assert_rejected(rev);

        assert_eq!(store.current_version("T1"), Some(1));
        assert_eq!(store.audit_log("T1").len(), audit);
        assert!(store.commit("T1", revision(&v1, "alice"), &detector).is_ok());
    }

    #[test]
    fn test_generated_sizes_are_bounded_or_overridden() {
        let store = ProposalStore::new();
        let f = TermFoundation::new("T1")
            .with_level(crate::models::Level::new("L1", 1))
            .with_students(
                (0..12).map(|i| crate::models::Student::returning(format!("a{i:02}"), "L1")),
            )
            .with_teacher(
                crate::models::Teacher::new("U1")
                    .with_competency("L1", crate::models::CompetencyTier::Expert)
                    .with_submission(crate::models::AvailabilitySubmission::full_week(6)),
            );
        let config = GenerationConfig::default();
        let v1 = store
            .generate(&ClassGenerator::new(config.clone()), &f, "admin")
            .unwrap()
            .proposal;

        assert_eq!(v1.schedule.class_count(), 2);
        for c in &v1.schedule.classes {
            let bounds = config.size_bounds_for(f.level(&c.level_id).unwrap());
            assert!(
                bounds.contains(c.size()) || c.override_justification().is_some(),
                "{} has {} students and no override",
                c.id,
                c.size()
            );
        }
    }

    #[test]
    fn test_commit_unknown_term() {
        let store = ProposalStore::new();
        let f = TermFoundation::new("X");
        let config = GenerationConfig::default();
        let p = Proposal {
            id: "X/v1".into(),
            term_id: "X".into(),
            version: 1,
            generation_run: 1,
            parent_version: None,
            seed: 0,
            schedule: Schedule::new(),
            optimization_score: 0.0,
            conflict_count: 0,
            created_by: "a".into(),
            approval: None,
        };
        assert!(matches!(
            store.commit("X", revision(&p, "a"), &ConflictDetector::new(&f, &config)),
            Err(RosterError::NotFound { .. })
        ));
    }

    #[test]
    fn test_approve() {
        let store = ProposalStore::new();
        let f = testing::small_foundation();
        let config = GenerationConfig::default().with_undersized_allowed(true);
        let gen = ClassGenerator::new(config.clone());
        let v1 = store.generate(&gen, &f, "admin").unwrap().proposal;
        let detector = ConflictDetector::new(&f, &config);

        let approved = store.approve("T1", v1.version, "head", &detector).unwrap();
        assert!(approved.is_approved());
        assert!(store.current("T1").unwrap().is_approved());
        assert_eq!(
            store.audit_log("T1").last().map(|e| e.action),
            Some(AuditAction::Approval)
        );

        assert!(matches!(
            store.approve("T1", 7, "head", &detector),
            Err(RosterError::StaleProposal { .. })
        ));
    }

    #[test]
    fn test_approve_rejects_blocking_findings() {
        let store = ProposalStore::new();
        let f = testing::small_foundation();
        let config = GenerationConfig::default();
        let gen = ClassGenerator::new(config.clone());
        // L2 stays unresolved: its students are unassigned
        let v1 = store.generate(&gen, &f, "admin").unwrap().proposal;
        let detector = ConflictDetector::new(&f, &config);

        let err = store.approve("T1", v1.version, "head", &detector).unwrap_err();
        assert!(matches!(
            err,
            RosterError::Validation(ref e) if e.kind == ValidationErrorKind::NotApprovable
        ));
        assert!(!store.current("T1").unwrap().is_approved());
    }

    #[test]
    fn test_terms_are_isolated() {
        let store = ProposalStore::new();
        let gen = ClassGenerator::new(GenerationConfig::default());
        store.generate(&gen, &testing::small_foundation(), "admin").unwrap();
        let t2 = store.begin_generation("T2");
        assert_eq!(t2.run, 1);
        assert_eq!(store.current_version("T2"), None);
        assert_eq!(store.current_version("T1"), Some(1));
    }
}
