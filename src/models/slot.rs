//! Time slot model.
//!
//! A time slot is the atomic scheduling unit: one session period on one day
//! of the week. The nominal grid is 7 days x 5 sessions (35 cells); which of
//! those cells may actually be scheduled is configuration (see
//! [`SlotGrid`]).
//!
//! Slots order by day, then session, which is also the canonical grid
//! order used for deterministic slot selection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of nominal days in the weekly grid.
pub const DAYS_PER_WEEK: usize = 7;
/// Number of nominal session periods per day.
pub const SESSIONS_PER_DAY: usize = 5;
/// Total cells in the nominal weekly grid.
pub const GRID_CELLS: usize = DAYS_PER_WEEK * SESSIONS_PER_DAY;

/// Day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    /// All days in week order.
    pub const ALL: [Day; DAYS_PER_WEEK] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    /// Zero-based position in the week (Monday = 0).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Day::Monday => 0,
            Day::Tuesday => 1,
            Day::Wednesday => 2,
            Day::Thursday => 3,
            Day::Friday => 4,
            Day::Saturday => 5,
            Day::Sunday => 6,
        }
    }

    /// Whether this day falls on the weekend.
    pub fn is_weekend(self) -> bool {
        matches!(self, Day::Saturday | Day::Sunday)
    }
}

/// A (day, session) pair.
///
/// `session` is a zero-based period index within the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Day of the week.
    pub day: Day,
    /// Session period (0-based).
    pub session: u8,
}

impl TimeSlot {
    /// Creates a new time slot.
    pub fn new(day: Day, session: u8) -> Self {
        Self { day, session }
    }

    /// Index of this slot in the nominal 35-cell grid.
    ///
    /// Returns `None` if the session lies outside the nominal grid.
    pub fn cell(&self) -> Option<usize> {
        let session = self.session as usize;
        if session >= SESSIONS_PER_DAY {
            return None;
        }
        Some(self.day.index() * SESSIONS_PER_DAY + session)
    }

    /// Inverse of [`TimeSlot::cell`].
    pub fn from_cell(cell: usize) -> Option<Self> {
        if cell >= GRID_CELLS {
            return None;
        }
        Some(Self {
            day: Day::ALL[cell / SESSIONS_PER_DAY],
            session: (cell % SESSIONS_PER_DAY) as u8,
        })
    }

    /// Every slot of the nominal grid in canonical order.
    pub fn all() -> impl Iterator<Item = TimeSlot> {
        (0..GRID_CELLS).filter_map(TimeSlot::from_cell)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.day, self.session + 1)
    }
}

/// The set of schedulable days and sessions.
///
/// Whether weekends are schedulable is institutional policy, so the grid is
/// always supplied by configuration rather than assumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotGrid {
    /// Days on which classes may be held.
    pub days: Vec<Day>,
    /// Number of session periods per day (at most [`SESSIONS_PER_DAY`]).
    pub sessions: u8,
}

impl SlotGrid {
    /// Creates a grid over the given days and session count.
    pub fn new(days: Vec<Day>, sessions: u8) -> Self {
        Self { days, sessions }
    }

    /// The full nominal 7 x 5 grid.
    pub fn full_week() -> Self {
        Self::new(Day::ALL.to_vec(), SESSIONS_PER_DAY as u8)
    }

    /// Whether a slot may be scheduled under this grid.
    pub fn contains(&self, slot: &TimeSlot) -> bool {
        slot.cell().is_some() && slot.session < self.sessions && self.days.contains(&slot.day)
    }

    /// Valid slots in canonical order.
    pub fn slots(&self) -> Vec<TimeSlot> {
        TimeSlot::all().filter(|s| self.contains(s)).collect()
    }

    /// Number of valid slots.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    /// Whether the grid has no valid slot.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self::full_week()
    }
}
