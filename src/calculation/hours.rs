//! Worked-hour and overtime computation for a two-punch day.
//!
//! Scheduled hours are the intersection of the punch interval with each
//! scheduled segment. Time outside the segments counts as overtime only where
//! it also falls inside an approved overtime window; the rest is discarded.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{DayContext, DayType, OvertimeHours, TimeWindow};

/// Which overtime bucket a day's approved extra time falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OvertimeBucket {
    /// Scheduled working day.
    Weekday,
    /// Day with nothing scheduled (weekly rest day).
    Weekend,
    /// Public holiday.
    Holiday,
}

/// Worked time split into scheduled, approved overtime and discarded minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursResult {
    /// Minutes inside scheduled segments.
    pub scheduled_minutes: i64,
    /// Minutes outside segments but inside an approved overtime window.
    pub overtime_minutes: i64,
    /// Minutes outside segments with no approval; never paid.
    pub unapproved_minutes: i64,
    /// Scheduled minutes as hours.
    pub worked_hours: Decimal,
    /// Overtime hours assigned to the day's bucket.
    pub overtime: OvertimeHours,
    /// The bucket used.
    pub bucket: OvertimeBucket,
}

/// Length in minutes of the overlap between two intervals.
fn overlap_minutes(
    a: (NaiveDateTime, NaiveDateTime),
    b: (NaiveDateTime, NaiveDateTime),
) -> i64 {
    let start = a.0.max(b.0);
    let end = a.1.min(b.1);
    if end > start {
        (end - start).num_minutes()
    } else {
        0
    }
}

/// Converts minutes to hours rounded to two decimal places.
///
/// ```
/// use timesheet_engine::calculation::minutes_to_hours;
/// use rust_decimal::Decimal;
///
/// assert_eq!(minutes_to_hours(90), Decimal::new(150, 2));
/// assert_eq!(minutes_to_hours(20), Decimal::new(33, 2));
/// ```
pub fn minutes_to_hours(minutes: i64) -> Decimal {
    (Decimal::new(minutes, 0) / Decimal::new(60, 0)).round_dp(2)
}

/// Determines the overtime bucket for a day.
pub fn overtime_bucket(context: &DayContext) -> OvertimeBucket {
    if context.day_type == DayType::Holiday {
        OvertimeBucket::Holiday
    } else if !context.has_schedule() {
        OvertimeBucket::Weekend
    } else {
        OvertimeBucket::Weekday
    }
}

/// Computes scheduled and overtime hours for the interval `[start, end]`.
///
/// # Arguments
///
/// * `start` / `end` - The ordered punches
/// * `date` - The entry date the segments are anchored to
/// * `context` - Calendar context with the scheduled segments
/// * `overtime_windows` - Approved windows, merged and sorted
///
/// # Example
///
/// ```
/// use timesheet_engine::calculation::calculate_hours;
/// use timesheet_engine::models::{DayContext, DayType, PayTerms, ScheduledSegment, TimeWindow};
/// use chrono::{NaiveDate, NaiveTime};
/// use rust_decimal::Decimal;
///
/// let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
/// let context = DayContext {
///     day_type: DayType::Regular,
///     segments: vec![
///         ScheduledSegment { start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(), end: NaiveTime::from_hms_opt(12, 0, 0).unwrap() },
///         ScheduledSegment { start: NaiveTime::from_hms_opt(13, 30, 0).unwrap(), end: NaiveTime::from_hms_opt(17, 30, 0).unwrap() },
///     ],
///     max_credit: Decimal::ONE,
///     pay_terms: PayTerms::default(),
/// };
/// let window = TimeWindow {
///     start: date.and_hms_opt(17, 30, 0).unwrap(),
///     end: date.and_hms_opt(19, 0, 0).unwrap(),
/// };
///
/// let result = calculate_hours(
///     date.and_hms_opt(8, 0, 0).unwrap(),
///     date.and_hms_opt(20, 0, 0).unwrap(),
///     date,
///     &context,
///     &[window],
/// );
/// assert_eq!(result.worked_hours, Decimal::new(8, 0));
/// assert_eq!(result.overtime.weekday, Decimal::new(150, 2));
/// assert_eq!(result.unapproved_minutes, 150); // lunch break plus 19:00-20:00
/// ```
pub fn calculate_hours(
    start: NaiveDateTime,
    end: NaiveDateTime,
    date: NaiveDate,
    context: &DayContext,
    overtime_windows: &[TimeWindow],
) -> HoursResult {
    let punch = (start, end);
    let segments: Vec<(NaiveDateTime, NaiveDateTime)> =
        context.segments.iter().map(|s| s.on(date)).collect();

    let scheduled_minutes: i64 = segments
        .iter()
        .map(|segment| overlap_minutes(punch, *segment))
        .sum();

    // Windows are merged upstream, so they can be summed without double counting.
    let overtime_minutes: i64 = overtime_windows
        .iter()
        .map(|window| {
            let window = (window.start, window.end);
            let inside_window = overlap_minutes(punch, window);
            let scheduled_inside: i64 = segments
                .iter()
                .map(|segment| {
                    let clipped = (punch.0.max(window.0), punch.1.min(window.1));
                    overlap_minutes(clipped, *segment)
                })
                .sum();
            (inside_window - scheduled_inside).max(0)
        })
        .sum();

    let total_minutes = (end - start).num_minutes().max(0);
    let unapproved_minutes = (total_minutes - scheduled_minutes - overtime_minutes).max(0);

    let bucket = overtime_bucket(context);
    let hours = minutes_to_hours(overtime_minutes);
    let overtime = match bucket {
        OvertimeBucket::Weekday => OvertimeHours {
            weekday: hours,
            ..OvertimeHours::default()
        },
        OvertimeBucket::Weekend => OvertimeHours {
            weekend: hours,
            ..OvertimeHours::default()
        },
        OvertimeBucket::Holiday => OvertimeHours {
            holiday: hours,
            ..OvertimeHours::default()
        },
    };

    HoursResult {
        scheduled_minutes,
        overtime_minutes,
        unapproved_minutes,
        worked_hours: minutes_to_hours(scheduled_minutes),
        overtime,
        bucket,
    }
}
