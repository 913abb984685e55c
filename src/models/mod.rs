//! Roster domain models.
//!
//! Provides the data types for describing a term's inputs (levels, students,
//! teachers and their availability) and its outputs (class groups,
//! schedules, versioned proposals, conflict findings, audit entries).
//!
//! # Domain Mappings
//!
//! | term-roster | General scheduling | Meaning |
//! |-------------|--------------------|---------|
//! | ClassShell | Unscheduled job | Sized roster without teacher/slot |
//! | ClassGroup | Assignment | Roster bound to teacher and slot |
//! | Teacher | Resource | Capacity-limited, skill-tiered |
//! | TimeSlot | Period | Atomic (day, session) unit |
//! | Proposal | Schedule version | Immutable snapshot |

mod audit;
mod class_group;
mod conflict;
mod foundation;
mod level;
mod proposal;
mod schedule;
mod slot;
mod student;
mod teacher;

pub use audit::{AuditAction, AuditEntry};
pub use class_group::{ClassComposition, ClassGroup, ClassShell, SizeOverride, GENERATOR_ACTOR};
pub use conflict::{ConflictKind, ConflictRecord, EntityRef, Severity};
pub use foundation::TermFoundation;
pub use level::{Level, LevelCategory, SizeBounds};
pub use proposal::{Approval, Proposal};
pub use schedule::{Schedule, UnresolvedReason, UnresolvedShell};
pub use slot::{Day, SlotGrid, TimeSlot, DAYS_PER_WEEK, GRID_CELLS, SESSIONS_PER_DAY};
pub use student::{Student, StudentCategory};
pub use teacher::{AvailabilitySubmission, CompetencyTier, Teacher};
