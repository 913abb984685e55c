//! Term class-roster preparation.
//!
//! Turns a term's assessed students, level catalog and teacher availability
//! into a versioned schedule of class groups (teacher + level + weekly slot
//! + roster), then supports conflict detection, manual refinement with
//! optimistic concurrency, and approval.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Student`, `Level`, `Teacher`, `TimeSlot`,
//!   `ClassShell`, `ClassGroup`, `Schedule`, `Proposal`, `ConflictRecord`,
//!   `AuditEntry`, `TermFoundation`
//! - **`config`**: `GenerationConfig`, loadable from TOML
//! - **`validation`**: Input integrity checks and generation readiness
//! - **`demand`**: Class counts per level (`LevelDemandCalculator`)
//! - **`availability`**: Per-teacher slot grid and run-local load
//!   (`AvailabilityMatrix`)
//! - **`dispatching`**: Shell ordering rules (most constrained first)
//! - **`generator`**: Two-phase heuristic (`ClassGenerator`)
//! - **`assigner`**: The only path that binds classes to teacher and slot
//! - **`detector`**: Pure conflict detection (`ConflictDetector`)
//! - **`refinement`**: Editing sessions over a proposal version
//! - **`store`**: Per-term proposal versions with compare-and-swap commits
//!
//! # Flow
//!
//! ```text
//! TermFoundation ──> readiness ──> demand ──> sizing ──> placement ──> Proposal v1
//!                                                                       │
//!                      RefinementSession (transfer, move, reassign) <───┘
//!                                   │ commit (CAS on version)
//!                                   v
//!                             Proposal vN ──> approve
//! ```
//!
//! # Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Schaerf (1999), "A Survey of Automated Timetabling"

pub mod assigner;
pub mod availability;
pub mod config;
pub mod demand;
pub mod detector;
pub mod dispatching;
pub mod error;
pub mod generator;
pub mod models;
pub mod refinement;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, RosterError};
