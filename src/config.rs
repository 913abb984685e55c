//! Generation configuration.
//!
//! Size bounds, ratio targets, workload band, the schedulable grid and
//! score weights are all parameters of a run, never constants, so staff
//! can re-run generation with different settings and compare proposals.
//! Omitted values fall back to institution-wide defaults.
//!
//! # Examples
//!
//! ```
//! use term_roster::config::GenerationConfig;
//!
//! let config = GenerationConfig::from_toml_str(r#"
//!     allow_undersized_classes = true
//!
//!     [size]
//!     default_max = 8
//!
//!     [size.categories.memorization]
//!     min = 4
//!     max = 8
//!
//!     [grid]
//!     days = ["monday", "tuesday", "wednesday", "thursday", "friday"]
//!     sessions = 5
//! "#).unwrap();
//!
//! assert_eq!(config.size.default_min, 7);
//! assert_eq!(config.size.default_max, 8);
//! assert_eq!(config.grid.len(), 25);
//! ```
//!
//! Use defaults when no file exists:
//!
//! ```
//! use term_roster::config::GenerationConfig;
//!
//! let config = GenerationConfig::load("roster.toml").unwrap_or_default();
//! assert_eq!(config.workload.optimal_max, 6);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Level, SizeBounds, SlotGrid};

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Parameters of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Class size bounds.
    pub size: SizeConfig,
    /// New/existing mixing target.
    pub ratio: RatioConfig,
    /// Teacher workload band.
    pub workload: WorkloadConfig,
    /// Schedulable days and sessions.
    pub grid: SlotGrid,
    /// Readiness thresholds.
    pub readiness: ReadinessConfig,
    /// Optimization score weights.
    pub weights: ScoreWeights,
    /// Place a level's only shell even when it is below minimum size.
    pub allow_undersized_classes: bool,
    /// Seed for randomized tie-breaks; derived from term and run when absent.
    pub seed: Option<u64>,
    /// Classrooms usable in parallel per slot; `None` = unlimited.
    pub rooms_per_slot: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            size: SizeConfig::default(),
            ratio: RatioConfig::default(),
            workload: WorkloadConfig::default(),
            grid: SlotGrid::full_week(),
            readiness: ReadinessConfig::default(),
            weights: ScoreWeights::default(),
            allow_undersized_classes: false,
            seed: None,
            rooms_per_slot: None,
        }
    }
}

/// Class size configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeConfig {
    /// Default minimum class size.
    pub default_min: u32,
    /// Default maximum class size.
    pub default_max: u32,
    /// Bounds per level category key (`"memorization"`, ...).
    pub categories: BTreeMap<String, SizeBounds>,
    /// Bounds per level id; these win over everything else.
    pub levels: BTreeMap<String, SizeBounds>,
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            default_min: 7,
            default_max: 10,
            categories: BTreeMap::new(),
            levels: BTreeMap::new(),
        }
    }
}

/// Target share of new students per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatioConfig {
    /// Target fraction of new students (0.0..=1.0).
    pub target_new: f64,
    /// Allowed absolute deviation before a warning.
    pub tolerance: f64,
}

impl Default for RatioConfig {
    fn default() -> Self {
        Self {
            target_new: 0.4,
            tolerance: 0.2,
        }
    }
}

/// Teacher workload band (classes per week).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Lower edge of the optimal band.
    pub optimal_min: u32,
    /// Upper edge of the optimal band.
    pub optimal_max: u32,
    /// Hard ceiling applied on top of each teacher's own limit.
    pub absolute_max: u32,
}

impl WorkloadConfig {
    /// Midpoint of the optimal band.
    pub fn optimal_midpoint(&self) -> f64 {
        (self.optimal_min as f64 + self.optimal_max as f64) / 2.0
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            optimal_min: 4,
            optimal_max: 6,
            absolute_max: 8,
        }
    }
}

/// Readiness thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Minimum fraction of registered students that must be assessed.
    pub min_student_completeness: f64,
    /// Fraction of demanded levels with a competent teacher below which
    /// a warning is raised.
    pub min_competency_coverage: f64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            min_student_completeness: 0.8,
            min_competency_coverage: 0.7,
        }
    }
}

/// Weights of the optimization score terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Class size variance around the level midpoint.
    pub size: f64,
    /// Teacher workload variance around the optimal midpoint.
    pub workload: f64,
    /// Mean new-student ratio deviation.
    pub ratio: f64,
    /// Penalty per unresolved shell.
    pub unresolved: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            size: 1.0,
            workload: 1.0,
            ratio: 10.0,
            unresolved: 100.0,
        }
    }
}

impl GenerationConfig {
    /// Creates the institution-default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist, is not valid TOML, or fails
    /// [`GenerationConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the default size bounds.
    pub fn with_default_size(mut self, min: u32, max: u32) -> Self {
        self.size.default_min = min;
        self.size.default_max = max;
        self
    }

    /// Overrides size bounds for one level.
    pub fn with_level_size(mut self, level_id: impl Into<String>, min: u32, max: u32) -> Self {
        self.size.levels.insert(level_id.into(), SizeBounds::new(min, max));
        self
    }

    /// Sets the new-student target and tolerance.
    pub fn with_ratio(mut self, target_new: f64, tolerance: f64) -> Self {
        self.ratio = RatioConfig {
            target_new,
            tolerance,
        };
        self
    }

    /// Sets the workload band.
    pub fn with_workload(mut self, optimal_min: u32, optimal_max: u32, absolute_max: u32) -> Self {
        self.workload = WorkloadConfig {
            optimal_min,
            optimal_max,
            absolute_max,
        };
        self
    }

    /// Sets the schedulable grid.
    pub fn with_grid(mut self, grid: SlotGrid) -> Self {
        self.grid = grid;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Allows undersized single-shell levels to be placed.
    pub fn with_undersized_allowed(mut self, allow: bool) -> Self {
        self.allow_undersized_classes = allow;
        self
    }

    /// Limits parallel classes per slot.
    pub fn with_rooms_per_slot(mut self, rooms: u32) -> Self {
        self.rooms_per_slot = Some(rooms);
        self
    }

    /// Resolves the size bounds of a level.
    ///
    /// Precedence: configured level override, catalog bounds, configured
    /// category bounds, defaults.
    pub fn size_bounds_for(&self, level: &Level) -> SizeBounds {
        if let Some(b) = self.size.levels.get(&level.id) {
            return *b;
        }
        if let Some(b) = level.size_bounds {
            return b;
        }
        if let Some(b) = self.size.categories.get(level.category.as_str()) {
            return *b;
        }
        SizeBounds::new(self.size.default_min, self.size.default_max)
    }

    /// Effective weekly cap of a teacher given their submitted limit.
    pub fn effective_cap(&self, submitted: u32) -> u32 {
        submitted.min(self.workload.absolute_max)
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let default = SizeBounds::new(self.size.default_min, self.size.default_max);
        if !default.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "default size bounds {}..{} must satisfy 0 < min <= max",
                default.min, default.max
            )));
        }
        for (key, b) in self.size.categories.iter().chain(self.size.levels.iter()) {
            if !b.is_valid() {
                return Err(ConfigError::Invalid(format!(
                    "size bounds for '{key}' ({}..{}) must satisfy 0 < min <= max",
                    b.min, b.max
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.ratio.target_new) || self.ratio.tolerance < 0.0 {
            return Err(ConfigError::Invalid(
                "ratio target must be in 0..=1 and tolerance non-negative".into(),
            ));
        }
        let w = &self.workload;
        if w.optimal_min > w.optimal_max || w.absolute_max == 0 {
            return Err(ConfigError::Invalid(format!(
                "workload band {}..{} (max {}) is inconsistent",
                w.optimal_min, w.optimal_max, w.absolute_max
            )));
        }
        if self.grid.is_empty() {
            return Err(ConfigError::Invalid("slot grid has no schedulable slot".into()));
        }
        Ok(())
    }
}
