//! Calendar context supplied for one employee and date.
//!
//! This module contains the [`DayContext`] type describing the scheduled
//! shift segments, payable credit and pay terms for a day.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DayType;

/// A scheduled shift segment (e.g. the morning or afternoon shift).
///
/// Segments are expressed as wall-clock times and never cross midnight.
///
/// # Example
///
/// ```
/// use timesheet_engine::models::ScheduledSegment;
/// use chrono::NaiveTime;
///
/// let morning = ScheduledSegment {
///     start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
///     end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
/// };
/// assert_eq!(morning.minutes(), 240);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSegment {
    /// Segment start.
    pub start: NaiveTime,
    /// Segment end.
    pub end: NaiveTime,
}

impl ScheduledSegment {
    /// Length of the segment in minutes; zero if the segment is reversed.
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(0)
    }

    /// Anchors the segment to a date.
    pub fn on(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        (date.and_time(self.start), date.and_time(self.end))
    }
}

/// Pay terms in effect on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayTerms {
    /// Wage rate used by payroll.
    pub wage_rate: Decimal,
    /// Percentage of pay that is net-payable (e.g. 85 during probation).
    pub net_pay_percent: Decimal,
    /// Whether the day is paid at full salary.
    pub is_full_salary_day: bool,
}

impl Default for PayTerms {
    fn default() -> Self {
        Self {
            wage_rate: Decimal::ZERO,
            net_pay_percent: Decimal::ONE_HUNDRED,
            is_full_salary_day: false,
        }
    }
}

/// Everything the calendar knows about one employee's date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayContext {
    /// Day classification.
    pub day_type: DayType,
    /// Scheduled segments in chronological order. Empty for a rest day.
    #[serde(default)]
    pub segments: Vec<ScheduledSegment>,
    /// Maximum payable working-day credit for the date.
    pub max_credit: Decimal,
    /// Pay terms in effect.
    #[serde(default)]
    pub pay_terms: PayTerms,
}

impl DayContext {
    /// Context used when the calendar has nothing for the date: a regular
    /// day with no schedule.
    pub fn fallback() -> Self {
        Self {
            day_type: DayType::Regular,
            segments: Vec::new(),
            max_credit: Decimal::ZERO,
            pay_terms: PayTerms::default(),
        }
    }

    /// Total scheduled minutes across all segments.
    pub fn scheduled_minutes(&self) -> i64 {
        self.segments.iter().map(ScheduledSegment::minutes).sum()
    }

    /// Whether any working time is scheduled on the date.
    pub fn has_schedule(&self) -> bool {
        self.scheduled_minutes() > 0
    }

    /// The earliest scheduled start, if any.
    pub fn first_segment_start(&self) -> Option<NaiveTime> {
        self.segments.iter().map(|s| s.start).min()
    }

    /// The latest scheduled end, if any.
    pub fn last_segment_end(&self) -> Option<NaiveTime> {
        self.segments.iter().map(|s| s.end).max()
    }
}
