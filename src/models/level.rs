//! Level catalog model.
//!
//! Levels are ordered curriculum stages. Each level belongs to a closed
//! [`LevelCategory`] which drives category-specific size defaults, and may
//! carry its own size bounds that override every default.

use serde::{Deserialize, Serialize};

/// Curriculum category of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelCategory {
    /// Entry-level literacy classes.
    Foundation,
    /// Recitation and reading fluency classes.
    Recitation,
    /// Memorization classes (typically smaller groups).
    Memorization,
}

impl LevelCategory {
    /// Configuration key of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            LevelCategory::Foundation => "foundation",
            LevelCategory::Recitation => "recitation",
            LevelCategory::Memorization => "memorization",
        }
    }
}

/// Inclusive class size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBounds {
    /// Minimum compliant roster size.
    pub min: u32,
    /// Maximum compliant roster size.
    pub max: u32,
}

impl SizeBounds {
    /// Creates size bounds.
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Midpoint of the bounds, the sizing target.
    #[inline]
    pub fn midpoint(&self) -> f64 {
        (self.min as f64 + self.max as f64) / 2.0
    }

    /// Whether a roster size is within bounds.
    #[inline]
    pub fn contains(&self, size: usize) -> bool {
        size >= self.min as usize && size <= self.max as usize
    }

    /// Whether the bounds are usable (`0 < min <= max`).
    pub fn is_valid(&self) -> bool {
        self.min > 0 && self.min <= self.max
    }
}

/// A curriculum level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Unique level identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Position in the curriculum sequence.
    pub order_number: u32,
    /// Curriculum category.
    pub category: LevelCategory,
    /// Level-specific size bounds; `None` falls back to configuration.
    pub size_bounds: Option<SizeBounds>,
}

impl Level {
    /// Creates a foundation-category level with no size override.
    pub fn new(id: impl Into<String>, order_number: u32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            order_number,
            category: LevelCategory::Foundation,
            size_bounds: None,
        }
    }

    /// Sets the level name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the curriculum category.
    pub fn with_category(mut self, category: LevelCategory) -> Self {
        self.category = category;
        self
    }

    /// Sets level-specific size bounds.
    pub fn with_size_bounds(mut self, min: u32, max: u32) -> Self {
        self.size_bounds = Some(SizeBounds::new(min, max));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bounds() {
        let b = SizeBounds::new(7, 10);
        assert!((b.midpoint() - 8.5).abs() < 1e-10);
        assert!(b.contains(7));
        assert!(b.contains(10));
        assert!(!b.contains(6));
        assert!(!b.contains(11));
        assert!(b.is_valid());
        assert!(!SizeBounds::new(0, 4).is_valid());
        assert!(!SizeBounds::new(9, 8).is_valid());
    }

    #[test]
    fn test_level_builder() {
        let l = Level::new("T2", 2)
            .with_name("Recitation II")
            .with_category(LevelCategory::Recitation)
            .with_size_bounds(8, 12);
        assert_eq!(l.id, "T2");
        assert_eq!(l.order_number, 2);
        assert_eq!(l.category, LevelCategory::Recitation);
        assert_eq!(l.size_bounds, Some(SizeBounds::new(8, 12)));
    }
}
