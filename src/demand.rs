//! Level demand calculation.
//!
//! Aggregates the student pool by level and category into class counts,
//! feasibility flags, achieved new/existing ratios and capacity overflow.
//!
//! # Algorithm
//!
//! For a level with `n` students and bounds `[min, max]`:
//! - minimum class count `ceil(n / max)`
//! - maximum compliant count `floor(n / min)`
//! - recommended count: the compliant count whose average size is closest
//!   to the bounds midpoint (fewer classes on ties); without a compliant
//!   split, the minimum class count
//!
//! Levels with zero students are skipped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::availability::AvailabilityMatrix;
use crate::config::GenerationConfig;
use crate::models::{SizeBounds, Student, TermFoundation};

/// Demand of one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDemand {
    /// Level id.
    pub level_id: String,
    /// Curriculum position.
    pub order_number: u32,
    /// Resolved size bounds.
    pub bounds: SizeBounds,
    /// Students assessed into the level.
    pub student_count: usize,
    /// New students.
    pub new_count: usize,
    /// Existing students.
    pub existing_count: usize,
    /// `ceil(n / max)`.
    pub min_classes: usize,
    /// `floor(n / min)`.
    pub max_compliant_classes: usize,
    /// Class count the sizing phase should produce.
    pub recommended_classes: usize,
    /// Fewer students than one minimum-size class.
    pub infeasible: bool,
    /// No class count keeps every roster inside bounds.
    pub no_compliant_split: bool,
    /// Share of new students in the level pool.
    pub achieved_new_ratio: f64,
    /// `|achieved - target|`.
    pub ratio_deviation: f64,
    /// Deviation exceeds the configured tolerance.
    pub ratio_warning: bool,
    /// Weekly capacity of the teachers competent for this level.
    pub teacher_capacity: usize,
    /// Minimum class count exceeds `teacher_capacity`.
    pub overflow: bool,
}

/// Demand of a whole pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSummary {
    /// Per level, in curriculum order.
    pub levels: Vec<LevelDemand>,
    /// Students in the pool.
    pub total_students: usize,
    /// Sum of per-level minimum class counts.
    pub total_min_classes: usize,
    /// Sum of per-level recommended counts.
    pub total_recommended_classes: usize,
    /// Weekly capacity of all teachers.
    pub teacher_capacity: usize,
    /// Classroom capacity (`rooms_per_slot x valid slots`), if limited.
    pub room_capacity: Option<usize>,
    /// Pool cannot fit into teacher or room capacity.
    pub pool_overflow: bool,
    /// Human-readable warnings.
    pub warnings: Vec<String>,
}

impl DemandSummary {
    /// Demand of one level.
    pub fn level(&self, level_id: &str) -> Option<&LevelDemand> {
        self.levels.iter().find(|l| l.level_id == level_id)
    }
}

/// Computes `(min_classes, max_compliant, recommended)` for `count` students.
pub fn class_counts(count: usize, bounds: SizeBounds) -> (usize, usize, usize) {
    if count == 0 {
        return (0, 0, 0);
    }
    let max = bounds.max.max(1) as usize;
    let min = bounds.min.max(1) as usize;
    let min_classes = count.div_ceil(max);
    let max_compliant = count / min;
    (min_classes, max_compliant, recommended_class_count(count, bounds))
}

/// Recommended class count for `count` students.
pub fn recommended_class_count(count: usize, bounds: SizeBounds) -> usize {
    if count == 0 {
        return 0;
    }
    let min_classes = count.div_ceil(bounds.max.max(1) as usize);
    let max_compliant = count / bounds.min.max(1) as usize;
    if min_classes > max_compliant {
        return min_classes;
    }
    let target = bounds.midpoint();
    let mut best = min_classes;
    let mut best_gap = f64::INFINITY;
    for k in min_classes..=max_compliant {
        let gap = (count as f64 / k as f64 - target).abs();
        if gap < best_gap - 1e-9 {
            best = k;
            best_gap = gap;
        }
    }
    best
}

/// Level demand calculator.
#[derive(Debug, Clone, Copy)]
pub struct LevelDemandCalculator<'a> {
    config: &'a GenerationConfig,
}

impl<'a> LevelDemandCalculator<'a> {
    /// Creates a calculator for a configuration.
    pub fn new(config: &'a GenerationConfig) -> Self {
        Self { config }
    }

    /// Computes the demand of one level.
    pub fn level_demand(
        &self,
        level_id: &str,
        order_number: u32,
        bounds: SizeBounds,
        students: &[&Student],
    ) -> LevelDemand {
        let student_count = students.len();
        let new_count = students.iter().filter(|s| s.is_new()).count();
        let (min_classes, max_compliant_classes, recommended_classes) =
            class_counts(student_count, bounds);
        let achieved_new_ratio = if student_count == 0 {
            0.0
        } else {
            new_count as f64 / student_count as f64
        };
        let ratio_deviation = (achieved_new_ratio - self.config.ratio.target_new).abs();

        LevelDemand {
            level_id: level_id.to_string(),
            order_number,
            bounds,
            student_count,
            new_count,
            existing_count: student_count - new_count,
            min_classes,
            max_compliant_classes,
            recommended_classes,
            infeasible: student_count < bounds.min as usize,
            no_compliant_split: min_classes > max_compliant_classes,
            achieved_new_ratio,
            ratio_deviation,
            ratio_warning: ratio_deviation > self.config.ratio.tolerance,
            teacher_capacity: 0,
            overflow: false,
        }
    }

    /// Computes the demand of the whole pool.
    pub fn calculate(&self, foundation: &TermFoundation) -> DemandSummary {
        let matrix = AvailabilityMatrix::build(foundation, self.config);
        self.calculate_with(foundation, &matrix)
    }

    /// Computes the demand against a prebuilt availability matrix.
    pub fn calculate_with(
        &self,
        foundation: &TermFoundation,
        matrix: &AvailabilityMatrix,
    ) -> DemandSummary {
        let by_level = foundation.students_by_level();
        let mut levels_sorted: Vec<_> = foundation.levels.iter().collect();
        levels_sorted.sort_by(|a, b| a.order_number.cmp(&b.order_number).then(a.id.cmp(&b.id)));

        let mut levels = Vec::new();
        let mut warnings = Vec::new();

        for level in levels_sorted {
            let Some(students) = by_level.get(level.id.as_str()) else {
                continue;
            };
            let bounds = self.config.size_bounds_for(level);
            let mut demand = self.level_demand(&level.id, level.order_number, bounds, students);
            demand.teacher_capacity = matrix.level_capacity(&level.id);
            demand.overflow = demand.min_classes > demand.teacher_capacity;

            if demand.infeasible {
                warnings.push(format!(
                    "Level {}: {} students cannot fill one class of minimum {}",
                    level.id, demand.student_count, bounds.min
                ));
            } else if demand.no_compliant_split {
                warnings.push(format!(
                    "Level {}: {} students cannot be split into classes of {}..{}",
                    level.id, demand.student_count, bounds.min, bounds.max
                ));
            }
            if demand.ratio_warning {
                warnings.push(format!(
                    "Level {}: new-student ratio {:.0}% deviates from target {:.0}%",
                    level.id,
                    demand.achieved_new_ratio * 100.0,
                    self.config.ratio.target_new * 100.0
                ));
            }
            if demand.overflow {
                warnings.push(format!(
                    "Level {}: needs at least {} classes, competent teachers can take {}",
                    level.id, demand.min_classes, demand.teacher_capacity
                ));
            }
            debug!(
                level = %level.id,
                students = demand.student_count,
                recommended = demand.recommended_classes,
                "level demand"
            );
            levels.push(demand);
        }

        let total_students = levels.iter().map(|l| l.student_count).sum();
        let total_min_classes: usize = levels.iter().map(|l| l.min_classes).sum();
        let total_recommended_classes = levels.iter().map(|l| l.recommended_classes).sum();
        let teacher_capacity = matrix.total_capacity();
        let room_capacity = self
            .config
            .rooms_per_slot
            .map(|rooms| rooms as usize * self.config.grid.len());

        let mut pool_overflow = false;
        if total_min_classes > teacher_capacity {
            pool_overflow = true;
            warnings.push(format!(
                "Pool needs at least {total_min_classes} classes, teachers can take {teacher_capacity}"
            ));
        }
        if let Some(rooms) = room_capacity {
            if total_min_classes > rooms {
                pool_overflow = true;
                warnings.push(format!(
                    "Pool needs at least {total_min_classes} classes, classrooms allow {rooms}"
                ));
            }
        }

        DemandSummary {
            levels,
            total_students,
            total_min_classes,
            total_recommended_classes,
            teacher_capacity,
            room_capacity,
            pool_overflow,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvailabilitySubmission, CompetencyTier, Level, Teacher};

    #[test]
    fn test_class_counts() {
        let b = SizeBounds::new(7, 10);
        assert_eq!(class_counts(40, b), (4, 5, 5));
        assert_eq!(class_counts(46, b), (5, 6, 5));
        assert_eq!(class_counts(10, b), (1, 1, 1));
        assert_eq!(class_counts(0, b), (0, 0, 0));
    }

    #[test]
    fn test_no_compliant_split_uses_min_classes() {
        let b = SizeBounds::new(7, 10);
        // 12 students: ceil(12/10) = 2 > floor(12/7) = 1
        assert_eq!(class_counts(12, b), (2, 1, 2));
        // 5 students: below minimum
        assert_eq!(recommended_class_count(5, b), 1);
    }

    #[test]
    fn test_recommended_prefers_fewer_on_tie() {
        // 30 students, 5..10 (midpoint 7.5): k=4 -> 7.5 exactly
        assert_eq!(recommended_class_count(30, SizeBounds::new(5, 10)), 4);
        // 16 students, 6..10 (midpoint 8): k=2 -> 8
        assert_eq!(recommended_class_count(16, SizeBounds::new(6, 10)), 2);
    }

    fn foundation() -> TermFoundation {
        let mut students = Vec::new();
        for i in 0..20 {
            students.push(if i < 8 {
                Student::fresh(format!("a{i:02}"), "L1")
            } else {
                Student::returning(format!("a{i:02}"), "L1")
            });
        }
        for i in 0..5 {
            students.push(Student::fresh(format!("b{i:02}"), "L2"));
        }
        TermFoundation::new("T1")
            .with_level(Level::new("L1", 1))
            .with_level(Level::new("L2", 2))
            .with_level(Level::new("L3", 3))
            .with_students(students)
            .with_teacher(
                Teacher::new("U1")
                    .with_competency("L1", CompetencyTier::Senior)
                    .with_submission(AvailabilitySubmission::full_week(1)),
            )
    }

    #[test]
    fn test_calculate() {
        let config = GenerationConfig::default();
        let summary = LevelDemandCalculator::new(&config).calculate(&foundation());

        assert_eq!(summary.levels.len(), 2);
        assert!(summary.level("L3").is_none());
        assert_eq!(summary.total_students, 25);

        let l1 = summary.level("L1").unwrap();
        assert_eq!(l1.new_count, 8);
        assert_eq!(l1.existing_count, 12);
        assert_eq!(l1.recommended_classes, 2);
        assert!((l1.achieved_new_ratio - 0.4).abs() < 1e-10);
        assert!(!l1.ratio_warning);
        assert_eq!(l1.teacher_capacity, 1);
        assert!(l1.overflow);

        let l2 = summary.level("L2").unwrap();
        assert!(l2.infeasible);
        assert!(l2.ratio_warning);
        assert_eq!(l2.teacher_capacity, 0);
        assert!(l2.overflow);

        assert!(summary.pool_overflow);
        assert!(!summary.warnings.is_empty());
    }

    #[test]
    fn test_room_capacity_overflow() {
        let config = GenerationConfig::default()
            .with_rooms_per_slot(1)
            .with_grid(crate::models::SlotGrid::new(vec![crate::models::Day::Monday], 1));
        let summary = LevelDemandCalculator::new(&config).calculate(&foundation());
        assert_eq!(summary.room_capacity, Some(1));
        assert!(summary.pool_overflow);
    }
}
