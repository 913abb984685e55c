//! Two-phase class generation.
//!
//! Turns a term foundation into a schedule: level rosters are split into
//! class shells (Phase A, [`SizingStrategy`]) and each shell is bound to a
//! teacher and slot (Phase B, [`PlacementStrategy`]). Every binding goes
//! through [`ScheduleAssigner`], so a generated schedule never carries a
//! double-booking or an out-of-availability slot.
//!
//! # Algorithm
//!
//! 1. Readiness gate (`FoundationIncomplete` on failure).
//! 2. Seed a `ChaCha8Rng` from `config.seed` or `derive_seed(term, run)`.
//! 3. Build the availability matrix and the level demand.
//! 4. Phase A per level in curriculum order. Levels below their minimum
//!    size stay unresolved (`UndersizedLevel`) unless undersized classes
//!    are allowed.
//! 5. Phase B in most-constrained-first order, checking the cancellation
//!    flag before each shell. A placed class whose roster is outside its
//!    bounds carries a generated size override.
//! 6. Detect conflicts and compute the report.
//!
//! This is a heuristic. An exact solver can be plugged in through the
//! strategy traits.
//!
//! # Complexity
//! O(s * t * 35) for s shells and t teachers.

mod placement;
mod report;
mod sizing;

pub use placement::{least_used_slot, workload_band, BandedPlacement, Placement, PlacementStrategy};
pub use report::{GenerationReport, ScoreBreakdown};
pub use sizing::{proportional_quotas, shell_id, split_sizes, MidpointSizing, SizingStrategy};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::assigner::ScheduleAssigner;
use crate::availability::AvailabilityMatrix;
use crate::config::GenerationConfig;
use crate::demand::{DemandSummary, LevelDemandCalculator};
use crate::detector::ConflictDetector;
use crate::dispatching::{DispatchContext, RuleEngine};
use crate::error::{Result, RosterError};
use crate::models::{
    ClassShell, ConflictRecord, Schedule, SizeBounds, SizeOverride, TermFoundation,
    UnresolvedReason,
};
use crate::validation::check_readiness;

/// Result of one generation run, before it is stored as a proposal.
#[derive(Debug)]
pub struct GenerationOutcome {
    /// Term.
    pub term_id: String,
    /// Generation run number.
    pub run: u32,
    /// Seed used.
    pub seed: u64,
    /// Generated classes and unresolved shells.
    pub schedule: Schedule,
    /// Level demand computed before sizing.
    pub demand: DemandSummary,
    /// Metrics and score.
    pub report: GenerationReport,
    /// Detector findings on the schedule.
    pub findings: Vec<ConflictRecord>,
    /// One `UnresolvedAssignment` per unresolved shell.
    pub unresolved: Vec<RosterError>,
}

impl GenerationOutcome {
    /// Optimization score of the schedule.
    pub fn optimization_score(&self) -> f64 {
        self.report.optimization_score()
    }
}

/// Derives a run seed from term and run number (FNV-1a, 64 bit).
pub fn derive_seed(term_id: &str, run: u32) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    term_id
        .as_bytes()
        .iter()
        .chain(&[0xff])
        .chain(&run.to_le_bytes())
        .fold(OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

/// Two-phase class generator.
///
/// # Example
///
/// ```
/// use term_roster::config::GenerationConfig;
/// use term_roster::generator::ClassGenerator;
/// use term_roster::models::{
///     AvailabilitySubmission, CompetencyTier, Level, Student, Teacher, TermFoundation,
/// };
///
/// let foundation = TermFoundation::new("2026-T1")
///     .with_level(Level::new("L1", 1))
///     .with_students((0..16).map(|i| {
///         if i < 6 {
///             Student::fresh(format!("S{i:02}"), "L1")
///         } else {
///             Student::returning(format!("S{i:02}"), "L1")
///         }
///     }))
///     .with_teacher(
///         Teacher::new("U1")
///             .with_competency("L1", CompetencyTier::Expert)
///             .with_submission(AvailabilitySubmission::full_week(5)),
///     );
///
/// let generator = ClassGenerator::new(GenerationConfig::default());
/// let outcome = generator.generate(&foundation, 1).unwrap();
/// assert_eq!(outcome.schedule.class_count(), 2);
/// assert!(outcome.schedule.unresolved.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ClassGenerator {
    config: GenerationConfig,
    sizing: Arc<dyn SizingStrategy>,
    placement: Arc<dyn PlacementStrategy>,
    rule_engine: RuleEngine,
}

impl ClassGenerator {
    /// Creates a generator with the default strategies.
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            sizing: Arc::new(MidpointSizing),
            placement: Arc::new(BandedPlacement),
            rule_engine: RuleEngine::most_constrained_first(),
        }
    }

    /// Replaces the Phase A strategy.
    pub fn with_sizing<S: SizingStrategy + 'static>(mut self, sizing: S) -> Self {
        self.sizing = Arc::new(sizing);
        self
    }

    /// Replaces the Phase B strategy.
    pub fn with_placement<P: PlacementStrategy + 'static>(mut self, placement: P) -> Self {
        self.placement = Arc::new(placement);
        self
    }

    /// Replaces the shell ordering.
    pub fn with_rule_engine(mut self, engine: RuleEngine) -> Self {
        self.rule_engine = engine;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Runs generation without a cancellation flag.
    pub fn generate(&self, foundation: &TermFoundation, run: u32) -> Result<GenerationOutcome> {
        let never = AtomicBool::new(false);
        self.generate_with_cancel(foundation, run, &never)
    }

    /// Runs generation, aborting with `Cancelled` once `cancel` is set.
    ///
    /// A cancelled run returns no partial schedule.
    pub fn generate_with_cancel(
        &self,
        foundation: &TermFoundation,
        run: u32,
        cancel: &AtomicBool,
    ) -> Result<GenerationOutcome> {
        let config = &self.config;
        let term_id = foundation.term_id.as_str();
        config.validate()?;
        check_readiness(foundation, config).into_result(term_id)?;

        let seed = config.seed.unwrap_or_else(|| derive_seed(term_id, run));
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        info!(
            term = term_id,
            run,
            seed,
            sizing = self.sizing.name(),
            placement = self.placement.name(),
            "generation started"
        );

        let mut matrix = AvailabilityMatrix::build(foundation, config);
        let demand = LevelDemandCalculator::new(config).calculate_with(foundation, &matrix);
        for w in &demand.warnings {
            warn!(term = term_id, "{w}");
        }

        // Phase A
        let by_level = foundation.students_by_level();
        let mut schedule = Schedule::new();
        let mut pending = Vec::new();
        let mut bounds = BTreeMap::new();
        for level_demand in &demand.levels {
            let (Some(level), Some(students)) = (
                foundation.level(&level_demand.level_id),
                by_level.get(level_demand.level_id.as_str()),
            ) else {
                continue;
            };
            bounds.insert(level.id.as_str(), level_demand.bounds);
            let shells = self.sizing.size_level(level, level_demand.bounds, students, &mut rng);
            if level_demand.infeasible && !config.allow_undersized_classes {
                for shell in shells {
                    schedule.add_unresolved(shell, UnresolvedReason::UndersizedLevel);
                }
            } else {
                pending.extend(shells);
            }
        }
        ensure_running(cancel, term_id, run)?;

        // Phase B
        let context = DispatchContext::from_matrix(foundation, &matrix);
        let order = self.rule_engine.sort_indices(&pending, &context);
        let assigner = ScheduleAssigner::new(foundation, config);
        for idx in order {
            ensure_running(cancel, term_id, run)?;
            let shell = &pending[idx];
            let reason = match self.placement.choose(shell, &matrix, &config.workload) {
                Ok(p) => match assigner.place(&mut schedule, shell.clone(), &p.teacher_id, p.slot) {
                    Ok(()) => {
                        if !matrix.reserve(&p.teacher_id, &shell.level_id, &p.slot) {
                            warn!(
                                shell = %shell.id,
                                teacher = %p.teacher_id,
                                slot = %p.slot,
                                "matrix out of step with schedule"
                            );
                        }
                        if let Some(&b) = bounds.get(shell.level_id.as_str()) {
                            attach_override(&mut schedule, shell, b);
                        }
                        continue;
                    }
                    Err(e) => {
                        debug!(shell = %shell.id, error = %e, "placement rejected");
                        UnresolvedReason::NoFreeSlot
                    }
                },
                Err(reason) => reason,
            };
            warn!(shell = %shell.id, level = %shell.level_id, ?reason, "shell left unresolved");
            schedule.add_unresolved(shell.clone(), reason);
        }

        schedule.classes.sort_by(|a, b| a.id.cmp(&b.id));
        schedule.unresolved.sort_by(|a, b| a.shell.id.cmp(&b.shell.id));

        let unresolved = schedule
            .unresolved
            .iter()
            .map(|u| RosterError::UnresolvedAssignment {
                shell_id: u.shell.id.clone(),
                level_id: u.shell.level_id.clone(),
                reason: u.reason,
            })
            .collect();
        let findings = ConflictDetector::new(foundation, config).detect(&schedule);
        let report = GenerationReport::calculate(&schedule, foundation, config, findings.len());

        info!(
            term = term_id,
            run,
            classes = report.total_classes,
            unresolved = report.unresolved_shells,
            conflicts = report.conflict_count,
            score = report.optimization_score(),
            "generation finished"
        );

        Ok(GenerationOutcome {
            term_id: term_id.to_string(),
            run,
            seed,
            schedule,
            demand,
            report,
            findings,
            unresolved,
        })
    }
}

/// Marks a placed class whose roster is outside `bounds`.
fn attach_override(schedule: &mut Schedule, shell: &ClassShell, bounds: SizeBounds) {
    if bounds.contains(shell.size()) {
        return;
    }
    if let Some(class) = schedule.class_mut(&shell.id) {
        debug!(class = %shell.id, size = shell.size(), "size override attached");
        class.size_override = Some(SizeOverride::generated(shell.size(), bounds));
    }
}

fn ensure_running(cancel: &AtomicBool, term_id: &str, run: u32) -> Result<()> {
    if cancel.load(Ordering::Acquire) {
        warn!(term = term_id, run, "generation cancelled");
        return Err(RosterError::Cancelled {
            term_id: term_id.to_string(),
            run,
        });
    }
    Ok(())
}
