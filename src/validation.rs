//! Input validation and generation readiness.
//!
//! Checks structural integrity of a term foundation before generation and
//! computes the readiness figures that gate it. Detects:
//! - Duplicate level, student and teacher IDs
//! - Students or competencies referring to unknown levels
//! - Unusable size bounds
//! - Submitted slots outside the nominal grid
//! - Missing availability submissions
//!
//! The same [`ValidationError`] type is returned by refinement mutations
//! that would break an invariant without an override.

use std::collections::HashSet;

use thiserror::Error;

use crate::config::GenerationConfig;
use crate::error::RosterError;
use crate::models::TermFoundation;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind:?}: {message}")]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A student or competency references a level that doesn't exist.
    InvalidLevelReference,
    /// Size bounds violate `0 < min <= max`.
    InvalidSizeBounds,
    /// A submitted slot lies outside the 7 x 5 grid.
    SlotOutsideGrid,
    /// A required teacher has no availability submission.
    MissingSubmission,
    /// The student pool is empty.
    EmptyPool,
    /// A transfer crosses levels.
    LevelMismatch,
    /// A roster would leave its size bounds with no override.
    SizeLimitExceeded,
    /// An override was requested without justification.
    EmptyJustification,
    /// The teacher is not competent for the class level.
    NotCompetent,
    /// The teacher would exceed a weekly or per-level limit.
    WorkloadExceeded,
    /// Every classroom is taken at the slot.
    RoomsExhausted,
    /// The student is not in the expected roster.
    StudentNotInRoster,
    /// Source and target of a transfer are the same class.
    SameClass,
    /// Approval requested for a proposal with blocking findings.
    NotApprovable,
    /// A commit would store a schedule that double-books, overloads or
    /// drops students.
    BlockingConflicts,
}

impl ValidationError {
    /// Creates a validation error.
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ValidationErrorKind> for ValidationError {
    fn from(kind: ValidationErrorKind) -> Self {
        Self::new(kind, format!("{kind:?}"))
    }
}

/// Validates the structural integrity of a term foundation.
///
/// Checks:
/// 1. No duplicate level, student or teacher IDs
/// 2. Every student's level exists
/// 3. Every competency and level cap refers to an existing level
/// 4. Catalog size bounds are usable
/// 5. Every submitted slot is inside the nominal grid
/// 6. The pool is not empty
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(foundation: &TermFoundation) -> ValidationResult {
    let mut errors = Vec::new();

    let mut level_ids = HashSet::new();
    for level in &foundation.levels {
        if !level_ids.insert(level.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate level ID: {}", level.id),
            ));
        }
        if let Some(b) = level.size_bounds {
            if !b.is_valid() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidSizeBounds,
                    format!("Level '{}' has size bounds {}..{}", level.id, b.min, b.max),
                ));
            }
        }
    }

    if foundation.students.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyPool,
            format!("Term '{}' has no assessed students", foundation.term_id),
        ));
    }

    let mut student_ids = HashSet::new();
    for s in &foundation.students {
        if !student_ids.insert(s.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate student ID: {}", s.id),
            ));
        }
        if !level_ids.contains(s.level_id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidLevelReference,
                format!("Student '{}' assessed into unknown level '{}'", s.id, s.level_id),
            ));
        }
    }

    let mut teacher_ids = HashSet::new();
    for t in &foundation.teachers {
        if !teacher_ids.insert(t.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate teacher ID: {}", t.id),
            ));
        }
        for level_id in t.competencies.keys().chain(t.level_caps.keys()) {
            if !level_ids.contains(level_id.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidLevelReference,
                    format!("Teacher '{}' references unknown level '{}'", t.id, level_id),
                ));
            }
        }
        if let Some(sub) = &t.submission {
            for slot in &sub.slots {
                if slot.cell().is_none() {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::SlotOutsideGrid,
                        format!("Teacher '{}' submitted slot {} outside the grid", t.id, slot),
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Aggregate readiness of a term for generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessReport {
    /// Assessed students / registered students (0.0..1.0).
    pub student_completeness: f64,
    /// Required teachers with a submission / required teachers.
    pub teacher_availability_completeness: f64,
    /// Demanded levels with an available competent teacher / demanded levels.
    pub competency_coverage: f64,
    /// Mean of the three figures, as a percentage.
    pub readiness_percent: f64,
    /// Issues that block generation.
    pub blocking_issues: Vec<String>,
    /// Advisory issues.
    pub warnings: Vec<String>,
}

impl ReadinessReport {
    /// Whether generation may proceed.
    pub fn can_generate(&self) -> bool {
        self.blocking_issues.is_empty()
    }

    /// Converts blocking issues into [`RosterError::FoundationIncomplete`].
    pub fn into_result(self, term_id: &str) -> Result<(), RosterError> {
        if self.can_generate() {
            Ok(())
        } else {
            Err(RosterError::FoundationIncomplete {
                term_id: term_id.to_string(),
                issues: self.blocking_issues,
            })
        }
    }
}

/// Computes readiness for generation.
///
/// Blocking: any input validation error, student completeness below
/// `readiness.min_student_completeness`, any required teacher without a
/// submission. Warning: competency coverage below
/// `readiness.min_competency_coverage`.
pub fn check_readiness(foundation: &TermFoundation, config: &GenerationConfig) -> ReadinessReport {
    let mut blocking_issues = Vec::new();
    let mut warnings = Vec::new();

    if let Err(errors) = validate_input(foundation) {
        blocking_issues.extend(errors.into_iter().map(|e| e.message));
    }

    let assessed = foundation.students.len();
    let registered = foundation.registered_students.unwrap_or(assessed).max(assessed);
    let student_completeness = ratio_or_zero(assessed, registered);
    if student_completeness < config.readiness.min_student_completeness {
        blocking_issues.push(format!(
            "Student assessment data is only {:.1}% complete (minimum {:.0}% required)",
            student_completeness * 100.0,
            config.readiness.min_student_completeness * 100.0
        ));
    }

    let required = foundation.required_teacher_ids();
    let mut submitted = 0;
    for id in &required {
        match foundation.teacher(id) {
            Some(t) if t.has_submitted() => submitted += 1,
            Some(_) => blocking_issues.push(format!(
                "{:?}: teacher '{id}' has not submitted availability",
                ValidationErrorKind::MissingSubmission
            )),
            None => blocking_issues.push(format!("Required teacher '{id}' is not on staff")),
        }
    }
    let teacher_availability_completeness = ratio_or_zero(submitted, required.len());

    let demanded: Vec<&str> = foundation.students_by_level().keys().copied().collect();
    let covered = demanded
        .iter()
        .filter(|level_id| {
            foundation
                .teachers
                .iter()
                .any(|t| t.has_submitted() && t.tier_for(level_id).is_some())
        })
        .count();
    let competency_coverage = ratio_or_zero(covered, demanded.len());
    if competency_coverage < config.readiness.min_competency_coverage {
        warnings.push(format!(
            "Only {:.1}% of demanded levels have a competent teacher (recommended {:.0}%+)",
            competency_coverage * 100.0,
            config.readiness.min_competency_coverage * 100.0
        ));
    }

    let readiness_percent =
        (student_completeness + teacher_availability_completeness + competency_coverage) / 3.0
            * 100.0;

    ReadinessReport {
        student_completeness,
        teacher_availability_completeness,
        competency_coverage,
        readiness_percent,
        blocking_issues,
        warnings,
    }
}

fn ratio_or_zero(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
