//! Phase B: teacher and slot placement.
//!
//! # Algorithm (`BandedPlacement`)
//!
//! For one shell, the candidates are competent teachers with remaining
//! weekly and per-level capacity and at least one free slot. They are
//! ranked by workload band:
//!
//! | Band | Teacher load |
//! |------|--------------|
//! | 0 | engaged, below the optimal minimum |
//! | 1 | engaged, inside the optimal band |
//! | 2 | idle |
//! | 3 | engaged, at or above the optimal maximum |
//!
//! then by lower load, then higher tier, then id. Filling engaged teachers
//! into the optimal band before engaging idle ones keeps the average
//! workload of engaged teachers inside the band.
//!
//! The slot is the teacher's free slot with the lowest usage across the
//! run, then the earliest in grid order.

use std::cmp::Reverse;
use std::fmt::Debug;

use crate::availability::AvailabilityMatrix;
use crate::config::WorkloadConfig;
use crate::models::{ClassShell, TimeSlot, UnresolvedReason};

/// A chosen teacher and slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Teacher id.
    pub teacher_id: String,
    /// Slot.
    pub slot: TimeSlot,
}

/// Chooses a teacher and slot for a shell.
pub trait PlacementStrategy: Send + Sync + Debug {
    /// Strategy name.
    fn name(&self) -> &'static str;

    /// Picks a placement, or the reason none exists.
    fn choose(
        &self,
        shell: &ClassShell,
        matrix: &AvailabilityMatrix,
        workload: &WorkloadConfig,
    ) -> Result<Placement, UnresolvedReason>;
}

/// Workload band of a teacher (lower is preferred).
pub fn workload_band(load: u32, workload: &WorkloadConfig) -> u8 {
    if load == 0 {
        2
    } else if load < workload.optimal_min {
        0
    } else if load < workload.optimal_max {
        1
    } else {
        3
    }
}

/// Least-used free slot of a teacher.
pub fn least_used_slot(matrix: &AvailabilityMatrix, teacher_id: &str) -> Option<TimeSlot> {
    matrix
        .candidate_slots(teacher_id)
        .into_iter()
        .min_by_key(|s| (matrix.slot_usage(s), *s))
}

/// Band-first teacher selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct BandedPlacement;

impl PlacementStrategy for BandedPlacement {
    fn name(&self) -> &'static str {
        "BandedPlacement"
    }

    fn choose(
        &self,
        shell: &ClassShell,
        matrix: &AvailabilityMatrix,
        workload: &WorkloadConfig,
    ) -> Result<Placement, UnresolvedReason> {
        let level_id = shell.level_id.as_str();
        let competent = matrix.competent_teachers(level_id);
        if competent.is_empty() {
            return Err(UnresolvedReason::NoCompetentTeacher);
        }

        let with_capacity: Vec<_> = competent
            .into_iter()
            .filter(|t| t.remaining_capacity(level_id) > 0)
            .collect();
        if with_capacity.is_empty() {
            return Err(UnresolvedReason::NoCapacity);
        }

        let mut best = None;
        for t in with_capacity {
            let Some(slot) = least_used_slot(matrix, &t.teacher_id) else {
                continue;
            };
            let key = (
                workload_band(t.load(), workload),
                t.load(),
                Reverse(t.tier_for(level_id)),
                t.teacher_id.as_str(),
            );
            match &best {
                Some((best_key, _)) if *best_key <= key => {}
                _ => best = Some((key, slot)),
            }
        }

        best.map(|((_, _, _, teacher_id), slot)| Placement {
            teacher_id: teacher_id.to_string(),
            slot,
        })
        .ok_or(UnresolvedReason::NoFreeSlot)
    }
}
