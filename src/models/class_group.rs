//! Class group and shell models.
//!
//! A [`ClassShell`] is a sized roster for one level that has not yet been
//! given a teacher and slot. Binding a shell produces a [`ClassGroup`], the
//! allocation unit of a proposal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{SizeBounds, TimeSlot};

/// Grantor recorded on overrides attached during generation.
pub const GENERATOR_ACTOR: &str = "generator";

/// A roster awaiting teacher and slot assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassShell {
    /// Shell identifier (becomes the class id once placed).
    pub id: String,
    /// Level of every student in the roster.
    pub level_id: String,
    /// Student ids.
    pub roster: BTreeSet<String>,
}

impl ClassShell {
    /// Creates an empty shell.
    pub fn new(id: impl Into<String>, level_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            level_id: level_id.into(),
            roster: BTreeSet::new(),
        }
    }

    /// Adds students to the roster.
    pub fn with_students<I, S>(mut self, students: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roster.extend(students.into_iter().map(Into::into));
        self
    }

    /// Roster size.
    #[inline]
    pub fn size(&self) -> usize {
        self.roster.len()
    }
}

/// A recorded permission for a class to sit outside its size bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeOverride {
    /// Why the deviation is acceptable. Never empty.
    pub justification: String,
    /// Who granted the override.
    pub granted_by: String,
    /// When the override was granted.
    pub granted_at: DateTime<Utc>,
}

impl SizeOverride {
    /// Override attached by the generator to a class it could not size
    /// within bounds.
    ///
    /// `granted_at` is the Unix epoch so that two runs with the same seed
    /// produce identical proposals.
    pub fn generated(size: usize, bounds: SizeBounds) -> Self {
        Self {
            justification: format!(
                "Generated based on available students and teachers \
                 ({size} students, bounds {}..{})",
                bounds.min, bounds.max
            ),
            granted_by: GENERATOR_ACTOR.to_string(),
            granted_at: DateTime::<Utc>::default(),
        }
    }
}

/// Mix of student categories within a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassComposition {
    NewOnly,
    ExistingOnly,
    Mixed,
}

impl ClassComposition {
    /// Classifies a roster from its new-student count and total size.
    pub fn classify(new_students: usize, size: usize) -> Self {
        if new_students == 0 {
            ClassComposition::ExistingOnly
        } else if new_students == size {
            ClassComposition::NewOnly
        } else {
            ClassComposition::Mixed
        }
    }
}

/// A scheduled class: teacher + level + slot + roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassGroup {
    /// Unique class identifier within a proposal.
    pub id: String,
    /// Level taught.
    pub level_id: String,
    /// Assigned teacher.
    pub teacher_id: String,
    /// Weekly slot.
    pub slot: TimeSlot,
    /// Student ids.
    pub roster: BTreeSet<String>,
    /// Size-limit override, if granted.
    pub size_override: Option<SizeOverride>,
}

impl ClassGroup {
    /// Creates a class with an empty roster.
    pub fn new(
        id: impl Into<String>,
        level_id: impl Into<String>,
        teacher_id: impl Into<String>,
        slot: TimeSlot,
    ) -> Self {
        Self {
            id: id.into(),
            level_id: level_id.into(),
            teacher_id: teacher_id.into(),
            slot,
            roster: BTreeSet::new(),
            size_override: None,
        }
    }

    /// Binds a shell to a teacher and slot.
    pub fn from_shell(shell: ClassShell, teacher_id: impl Into<String>, slot: TimeSlot) -> Self {
        Self {
            id: shell.id,
            level_id: shell.level_id,
            teacher_id: teacher_id.into(),
            slot,
            roster: shell.roster,
            size_override: None,
        }
    }

    /// Adds students to the roster.
    pub fn with_students<I, S>(mut self, students: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roster.extend(students.into_iter().map(Into::into));
        self
    }

    /// Roster size.
    #[inline]
    pub fn size(&self) -> usize {
        self.roster.len()
    }

    /// Whether the roster contains a student.
    pub fn has_student(&self, student_id: &str) -> bool {
        self.roster.contains(student_id)
    }

    /// Justification of the size override, if one exists.
    pub fn override_justification(&self) -> Option<&str> {
        self.size_override
            .as_ref()
            .map(|o| o.justification.as_str())
            .filter(|j| !j.trim().is_empty())
    }
}
