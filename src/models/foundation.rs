//! Term foundation: the upstream inputs of generation.
//!
//! Bundles the level catalog, the assessed student pool and the teaching
//! staff of one term. Everything here is owned by upstream collection
//! workflows and treated as read-only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Level, Student, Teacher};

/// Inputs for one academic term.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermFoundation {
    /// Academic term identifier.
    pub term_id: String,
    /// Level catalog.
    pub levels: Vec<Level>,
    /// Assessed student pool.
    pub students: Vec<Student>,
    /// Teaching staff, with or without submissions.
    pub teachers: Vec<Teacher>,
    /// Teachers whose availability must be submitted before generation.
    /// Empty means every listed teacher is required.
    pub required_teachers: Vec<String>,
    /// Students registered for the term (assessed or not).
    /// `None` means the pool is the full registration.
    pub registered_students: Option<usize>,
}

impl TermFoundation {
    /// Creates an empty foundation for a term.
    pub fn new(term_id: impl Into<String>) -> Self {
        Self {
            term_id: term_id.into(),
            ..Default::default()
        }
    }

    /// Adds a level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.levels.push(level);
        self
    }

    /// Adds students.
    pub fn with_students(mut self, students: impl IntoIterator<Item = Student>) -> Self {
        self.students.extend(students);
        self
    }

    /// Adds a teacher.
    pub fn with_teacher(mut self, teacher: Teacher) -> Self {
        self.teachers.push(teacher);
        self
    }

    /// Declares a teacher whose submission is required.
    pub fn with_required_teacher(mut self, teacher_id: impl Into<String>) -> Self {
        self.required_teachers.push(teacher_id.into());
        self
    }

    /// Sets the registered student count.
    pub fn with_registered_students(mut self, count: usize) -> Self {
        self.registered_students = Some(count);
        self
    }

    /// Finds a level by id.
    pub fn level(&self, level_id: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.id == level_id)
    }

    /// Finds a student by id.
    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == student_id)
    }

    /// Finds a teacher by id.
    pub fn teacher(&self, teacher_id: &str) -> Option<&Teacher> {
        self.teachers.iter().find(|t| t.id == teacher_id)
    }

    /// Required teacher ids (all teachers when none are declared).
    pub fn required_teacher_ids(&self) -> Vec<&str> {
        if self.required_teachers.is_empty() {
            self.teachers.iter().map(|t| t.id.as_str()).collect()
        } else {
            self.required_teachers.iter().map(String::as_str).collect()
        }
    }

    /// Students grouped by level id.
    pub fn students_by_level(&self) -> BTreeMap<&str, Vec<&Student>> {
        let mut map: BTreeMap<&str, Vec<&Student>> = BTreeMap::new();
        for s in &self.students {
            map.entry(s.level_id.as_str()).or_default().push(s);
        }
        map
    }

    /// Student lookup table.
    pub fn student_index(&self) -> BTreeMap<&str, &Student> {
        self.students.iter().map(|s| (s.id.as_str(), s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvailabilitySubmission, Student};

    #[test]
    fn test_required_defaults_to_all() {
        let f = TermFoundation::new("T")
            .with_teacher(Teacher::new("U1"))
            .with_teacher(Teacher::new("U2").with_submission(AvailabilitySubmission::new(3)));
        assert_eq!(f.required_teacher_ids(), vec!["U1", "U2"]);

        let f = f.with_required_teacher("U2");
        assert_eq!(f.required_teacher_ids(), vec!["U2"]);
    }

    #[test]
    fn test_students_by_level() {
        let f = TermFoundation::new("T").with_students([
            Student::fresh("s1", "L2"),
            Student::returning("s2", "L1"),
            Student::returning("s3", "L2"),
        ]);
        let by_level = f.students_by_level();
        assert_eq!(by_level.len(), 2);
        assert_eq!(by_level["L2"].len(), 2);
        assert_eq!(f.student("s2").map(|s| s.level_id.as_str()), Some("L1"));
        assert_eq!(f.student_index().len(), 3);
    }
}
