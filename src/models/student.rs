//! Student model.
//!
//! Students arrive from the assessment pipeline already placed into a
//! level. Only the placement result and the enrollment category matter here.

use serde::{Deserialize, Serialize};

/// Enrollment category of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentCategory {
    /// First term at the institution (placement test).
    New,
    /// Continuing from a previous term (term exam).
    Existing,
}

/// An assessed student in the term's pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Unique student identifier.
    pub id: String,
    /// Level the student was assessed into.
    pub level_id: String,
    /// Enrollment category.
    pub category: StudentCategory,
}

impl Student {
    /// Creates a new student.
    pub fn new(
        id: impl Into<String>,
        level_id: impl Into<String>,
        category: StudentCategory,
    ) -> Self {
        Self {
            id: id.into(),
            level_id: level_id.into(),
            category,
        }
    }

    /// Creates a new-category student.
    pub fn fresh(id: impl Into<String>, level_id: impl Into<String>) -> Self {
        Self::new(id, level_id, StudentCategory::New)
    }

    /// Creates an existing-category student.
    pub fn returning(id: impl Into<String>, level_id: impl Into<String>) -> Self {
        Self::new(id, level_id, StudentCategory::Existing)
    }

    /// Whether this is a new student.
    #[inline]
    pub fn is_new(&self) -> bool {
        self.category == StudentCategory::New
    }
}
