//! Punch classification.
//!
//! A day has zero, one or two punches. Two punches recorded out of order are
//! swapped so downstream rules always see `start <= end`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::TimesheetEntry;

/// The punches present on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PunchState {
    /// No punches.
    Missing,
    /// Exactly one punch; its pair is missing.
    Single {
        /// The punch that was recorded.
        at: NaiveDateTime,
    },
    /// Both punches, ordered.
    Pair {
        /// Check-in.
        start: NaiveDateTime,
        /// Check-out.
        end: NaiveDateTime,
    },
}

/// The classification of an entry's punches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PunchClassification {
    /// The punches found.
    pub state: PunchState,
    /// Whether check-in was later than check-out and the two were swapped.
    pub reordered: bool,
}

/// Classifies the punches on an entry.
///
/// # Example
///
/// ```
/// use timesheet_engine::calculation::{classify_punches, PunchState};
/// use timesheet_engine::models::TimesheetEntry;
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
/// let mut entry = TimesheetEntry::new("emp_001", date);
/// entry.end_time = date.and_hms_opt(17, 30, 0);
///
/// let result = classify_punches(&entry);
/// assert_eq!(result.state, PunchState::Single { at: date.and_hms_opt(17, 30, 0).unwrap() });
/// ```
pub fn classify_punches(entry: &TimesheetEntry) -> PunchClassification {
    match (entry.start_time, entry.end_time) {
        (None, None) => PunchClassification {
            state: PunchState::Missing,
            reordered: false,
        },
        (Some(at), None) | (None, Some(at)) => PunchClassification {
            state: PunchState::Single { at },
            reordered: false,
        },
        (Some(start), Some(end)) if end < start => PunchClassification {
            state: PunchState::Pair {
                start: end,
                end: start,
            },
            reordered: true,
        },
        (Some(start), Some(end)) => PunchClassification {
            state: PunchState::Pair { start, end },
            reordered: false,
        },
    }
}
