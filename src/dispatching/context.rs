//! Dispatch context for rule evaluation.

use std::collections::BTreeMap;

use crate::availability::AvailabilityMatrix;
use crate::models::TermFoundation;

/// Per-level facts dispatching rules read.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    /// Number of competent teachers with a submission (level_id -> count).
    pub competent_teachers: BTreeMap<String, usize>,
    /// Weekly capacity of those teachers (level_id -> classes).
    pub level_capacity: BTreeMap<String, usize>,
    /// Curriculum position (level_id -> order number).
    pub level_order: BTreeMap<String, u32>,
}

impl DispatchContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the context for a term from its availability matrix.
    pub fn from_matrix(foundation: &TermFoundation, matrix: &AvailabilityMatrix) -> Self {
        let mut ctx = Self::new();
        for level in &foundation.levels {
            ctx.competent_teachers
                .insert(level.id.clone(), matrix.competent_teachers(&level.id).len());
            ctx.level_capacity
                .insert(level.id.clone(), matrix.level_capacity(&level.id));
            ctx.level_order.insert(level.id.clone(), level.order_number);
        }
        ctx
    }

    /// Sets the competent teacher count of a level.
    pub fn with_competent_teachers(mut self, level_id: impl Into<String>, count: usize) -> Self {
        self.competent_teachers.insert(level_id.into(), count);
        self
    }

    /// Sets the capacity of a level.
    pub fn with_level_capacity(mut self, level_id: impl Into<String>, classes: usize) -> Self {
        self.level_capacity.insert(level_id.into(), classes);
        self
    }

    /// Sets the curriculum position of a level.
    pub fn with_level_order(mut self, level_id: impl Into<String>, order: u32) -> Self {
        self.level_order.insert(level_id.into(), order);
        self
    }
}
