//! Generation report and optimization score.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Average class size | Mean roster size over placed classes |
//! | Average teacher workload | Mean class count over engaged teachers |
//! | Workload std dev | Population std dev of engaged teachers' loads |
//! | Achieved ratio | New students / placed students |
//! | Unassigned | Pool students in no class roster |
//!
//! # Score
//!
//! ```text
//! score = -(w_size * size_variance
//!         + w_workload * workload_variance
//!         + w_ratio * ratio_deviation)
//!         - w_unresolved * unresolved_shells
//! ```
//!
//! Higher is better; a perfect proposal scores 0.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::models::{ClassComposition, Schedule, SizeBounds, TermFoundation};

/// Components of the optimization score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Mean squared deviation of class sizes from their level midpoint.
    pub size_variance: f64,
    /// Mean squared deviation of engaged loads from the optimal midpoint.
    pub workload_variance: f64,
    /// Mean |class new share - level pool new share|.
    pub ratio_deviation: f64,
    /// Shells left unresolved.
    pub unresolved_shells: usize,
    /// Weighted total (higher is better).
    pub score: f64,
}

impl ScoreBreakdown {
    /// Scores a schedule.
    pub fn calculate(
        schedule: &Schedule,
        foundation: &TermFoundation,
        config: &GenerationConfig,
    ) -> Self {
        let index = foundation.student_index();
        let mut pool: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for s in &foundation.students {
            let entry = pool.entry(s.level_id.as_str()).or_insert((0, 0));
            entry.0 += usize::from(s.is_new());
            entry.1 += 1;
        }

        let mut size_sq = 0.0;
        let mut ratio_abs = 0.0;
        let mut counted = 0usize;
        for class in &schedule.classes {
            let bounds = foundation
                .level(&class.level_id)
                .map(|l| config.size_bounds_for(l))
                .unwrap_or_else(|| SizeBounds::new(config.size.default_min, config.size.default_max));
            let diff = class.size() as f64 - bounds.midpoint();
            size_sq += diff * diff;

            if class.size() > 0 {
                let new = class
                    .roster
                    .iter()
                    .filter(|id| index.get(id.as_str()).is_some_and(|s| s.is_new()))
                    .count();
                let (pool_new, pool_total) =
                    pool.get(class.level_id.as_str()).copied().unwrap_or((0, 0));
                let pool_ratio = if pool_total == 0 {
                    0.0
                } else {
                    pool_new as f64 / pool_total as f64
                };
                ratio_abs += (new as f64 / class.size() as f64 - pool_ratio).abs();
            }
            counted += 1;
        }
        let size_variance = mean(size_sq, counted);
        let ratio_deviation = mean(ratio_abs, counted);

        let loads = schedule.all_loads();
        let optimal = config.workload.optimal_midpoint();
        let workload_sq: f64 = loads
            .values()
            .map(|&l| {
                let d = l as f64 - optimal;
                d * d
            })
            .sum();
        let workload_variance = mean(workload_sq, loads.len());

        let unresolved_shells = schedule.unresolved.len();
        let w = &config.weights;
        let score = -(w.size * size_variance
            + w.workload * workload_variance
            + w.ratio * ratio_deviation)
            - w.unresolved * unresolved_shells as f64;

        Self {
            size_variance,
            workload_variance,
            ratio_deviation,
            unresolved_shells,
            score,
        }
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Summary of a generated proposal for readiness and review screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Placed classes.
    pub total_classes: usize,
    /// Mean roster size.
    pub average_class_size: f64,
    /// Mean class count over engaged teachers.
    pub average_teacher_workload: f64,
    /// Pool students in no class.
    pub unassigned_student_count: usize,
    /// Detector findings.
    pub conflict_count: usize,
    /// New students / placed students.
    pub achieved_ratio: f64,
    /// Teachers with at least one class.
    pub teachers_utilized: usize,
    /// Shells without teacher and slot.
    pub unresolved_shells: usize,
    /// Population std dev of engaged loads.
    pub workload_std_dev: f64,
    /// Classes per composition.
    pub composition: BTreeMap<ClassComposition, usize>,
    /// Score and its components.
    pub score: ScoreBreakdown,
}

impl GenerationReport {
    /// Builds the report for a schedule.
    ///
    /// # Arguments
    /// * `conflict_count` - Number of detector findings for the schedule.
    pub fn calculate(
        schedule: &Schedule,
        foundation: &TermFoundation,
        config: &GenerationConfig,
        conflict_count: usize,
    ) -> Self {
        let index = foundation.student_index();
        let placed: BTreeSet<&str> = schedule
            .classes
            .iter()
            .flat_map(|c| c.roster.iter().map(String::as_str))
            .collect();
        let unassigned_student_count = foundation
            .students
            .iter()
            .filter(|s| !placed.contains(s.id.as_str()))
            .count();

        let placed_new = placed
            .iter()
            .filter(|id| index.get(*id).is_some_and(|s| s.is_new()))
            .count();
        let achieved_ratio = mean(placed_new as f64, placed.len());

        let loads = schedule.all_loads();
        let total_load: usize = loads.values().sum();
        let average_teacher_workload = mean(total_load as f64, loads.len());
        let workload_std_dev = mean(
            loads
                .values()
                .map(|&l| (l as f64 - average_teacher_workload).powi(2))
                .sum(),
            loads.len(),
        )
        .sqrt();

        let mut composition = BTreeMap::new();
        for class in &schedule.classes {
            let new = class
                .roster
                .iter()
                .filter(|id| index.get(id.as_str()).is_some_and(|s| s.is_new()))
                .count();
            *composition
                .entry(ClassComposition::classify(new, class.size()))
                .or_insert(0) += 1;
        }

        Self {
            total_classes: schedule.class_count(),
            average_class_size: schedule.average_class_size(),
            average_teacher_workload,
            unassigned_student_count,
            conflict_count,
            achieved_ratio,
            teachers_utilized: loads.len(),
            unresolved_shells: schedule.unresolved.len(),
            workload_std_dev,
            composition,
            score: ScoreBreakdown::calculate(schedule, foundation, config),
        }
    }

    /// Optimization score.
    pub fn optimization_score(&self) -> f64 {
        self.score.score
    }
}
