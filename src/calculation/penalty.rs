//! Late/early penalty computation.
//!
//! Lateness is measured against the first scheduled segment start and
//! earliness against the last segment end. A day is penalized only when the
//! two together exceed the grace period, so hitting the grace exactly is
//! still on time.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::DayContext;

/// The result of the penalty computation for a two-punch day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyResult {
    /// Minutes late, never negative.
    pub late_minutes: i64,
    /// Minutes early, never negative.
    pub early_minutes: i64,
    /// The grace period applied.
    pub grace_minutes: i64,
    /// `late + early > grace`.
    pub is_penalized: bool,
}

/// Computes late/early minutes and the penalty flag.
///
/// A day with no scheduled segments has nothing to be late for.
///
/// # Example
///
/// ```
/// use timesheet_engine::calculation::calculate_penalty;
/// use timesheet_engine::models::{DayContext, DayType, PayTerms, ScheduledSegment};
/// use chrono::{NaiveDate, NaiveTime};
/// use rust_decimal::Decimal;
///
/// let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
/// let context = DayContext {
///     day_type: DayType::Regular,
///     segments: vec![ScheduledSegment {
///         start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
///         end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
///     }],
///     max_credit: Decimal::ONE,
///     pay_terms: PayTerms::default(),
/// };
///
/// let result = calculate_penalty(
///     date.and_hms_opt(8, 3, 0).unwrap(),
///     date.and_hms_opt(16, 58, 0).unwrap(),
///     date,
///     &context,
///     5,
/// );
/// assert_eq!(result.late_minutes, 3);
/// assert_eq!(result.early_minutes, 2);
/// assert!(!result.is_penalized);
/// ```
pub fn calculate_penalty(
    start: NaiveDateTime,
    end: NaiveDateTime,
    date: NaiveDate,
    context: &DayContext,
    grace_minutes: i64,
) -> PenaltyResult {
    let late_minutes = context
        .first_segment_start()
        .map(|first| (start - date.and_time(first)).num_minutes().max(0))
        .unwrap_or(0);

    let early_minutes = context
        .last_segment_end()
        .map(|last| (date.and_time(last) - end).num_minutes().max(0))
        .unwrap_or(0);

    PenaltyResult {
        late_minutes,
        early_minutes,
        grace_minutes,
        is_penalized: late_minutes + early_minutes > grace_minutes,
    }
}
