//! Timesheet entry model and related types.
//!
//! A [`TimesheetEntry`] is the single record kept per employee per date. It
//! holds the raw punches alongside everything the calculator derives from
//! them: attendance status, working-day credit, overtime and penalties.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PayTerms;

/// Calendar classification of a day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    /// An ordinary day, scheduled or rest.
    #[default]
    Regular,
    /// A public holiday; always paid at full credit.
    Holiday,
    /// A makeup workday offsetting a prior holiday or rest day.
    Compensatory,
}

impl std::fmt::Display for DayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DayType::Regular => write!(f, "Regular"),
            DayType::Holiday => write!(f, "Holiday"),
            DayType::Compensatory => write!(f, "Compensatory"),
        }
    }
}

/// Attendance outcome of a day.
///
/// An entry without a status is still undetermined (in progress, or a day
/// with nothing scheduled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Both punches present and within the grace period.
    OnTime,
    /// Late arrival or early leave beyond the grace period. Also shown for a
    /// day that currently has only one punch and is not yet finalized.
    NotOnTime,
    /// Exactly one punch once the day is finalized.
    SinglePunch,
    /// No attendance on a scheduled day.
    Absent,
}

/// Reason recorded for an absence covered by approved leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentReason {
    /// Paid leave; consumes leave balance.
    PaidLeave,
    /// Unpaid leave.
    UnpaidLeave,
    /// Maternity leave.
    MaternityLeave,
}

/// Approved overtime hours split by bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeHours {
    /// Overtime on a scheduled weekday.
    pub weekday: Decimal,
    /// Overtime on a day with no scheduled segments.
    pub weekend: Decimal,
    /// Overtime on a holiday.
    pub holiday: Decimal,
}

impl OvertimeHours {
    /// Sum across all buckets.
    pub fn total(&self) -> Decimal {
        self.weekday + self.weekend + self.holiday
    }
}

/// Identifies a timesheet entry: one per employee per date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    /// The employee identifier.
    pub employee_id: String,
    /// The calendar date.
    pub date: NaiveDate,
}

impl EntryKey {
    /// Creates a key for the employee and date.
    pub fn new(employee_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            employee_id: employee_id.into(),
            date,
        }
    }
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.employee_id, self.date)
    }
}

/// One employee's attendance record for one date.
///
/// `start_time` and `end_time` are the raw punches. Every other field is
/// derived by [`compute`](crate::calculation::compute) and is overwritten in
/// full on each recalculation.
///
/// # Example
///
/// ```
/// use timesheet_engine::models::TimesheetEntry;
/// use chrono::NaiveDate;
///
/// let entry = TimesheetEntry::new("emp_001", NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
/// assert!(entry.status.is_none());
/// assert!(entry.working_days.is_none());
/// assert_eq!(entry.punch_count(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimesheetEntry {
    /// The employee identifier.
    pub employee_id: String,
    /// The calendar date of the entry.
    pub date: NaiveDate,
    /// Check-in punch.
    pub start_time: Option<NaiveDateTime>,
    /// Check-out punch.
    pub end_time: Option<NaiveDateTime>,
    /// Day classification from the calendar.
    pub day_type: DayType,
    /// Attendance status; `None` while undetermined.
    pub status: Option<AttendanceStatus>,
    /// Payable working-day credit; may be fractional or negative.
    pub working_days: Option<Decimal>,
    /// Leave reason when the day is covered by approved leave.
    pub absent_reason: Option<AbsentReason>,
    /// Whether the employee is exempt from attendance on this date.
    pub is_globally_exempt: bool,
    /// Allowed lateness plus earliness in minutes.
    pub grace_minutes: i64,
    /// Minutes late against the first scheduled segment.
    pub late_minutes: i64,
    /// Minutes early against the last scheduled segment.
    pub early_minutes: i64,
    /// Whether late plus early minutes exceeded the grace period.
    pub is_penalized: bool,
    /// Hours worked inside scheduled segments.
    pub worked_hours: Decimal,
    /// Approved overtime by bucket.
    pub overtime: OvertimeHours,
    /// Maximum payable credit the calendar allowed for the date.
    pub max_credit: Decimal,
    /// Pay terms in effect on the date.
    pub pay_terms: PayTerms,
    /// Set once the end-of-day pass has run for the entry.
    pub is_finalized: bool,
    /// Set when the inputs conflicted and a person should look at the entry.
    pub needs_review: bool,
}

impl TimesheetEntry {
    /// Creates an empty, undetermined entry.
    pub fn new(employee_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            employee_id: employee_id.into(),
            date,
            start_time: None,
            end_time: None,
            day_type: DayType::Regular,
            status: None,
            working_days: None,
            absent_reason: None,
            is_globally_exempt: false,
            grace_minutes: 0,
            late_minutes: 0,
            early_minutes: 0,
            is_penalized: false,
            worked_hours: Decimal::ZERO,
            overtime: OvertimeHours::default(),
            max_credit: Decimal::ZERO,
            pay_terms: PayTerms::default(),
            is_finalized: false,
            needs_review: false,
        }
    }

    /// Number of punches present (0, 1 or 2).
    pub fn punch_count(&self) -> usize {
        usize::from(self.start_time.is_some()) + usize::from(self.end_time.is_some())
    }

    /// Records a punch.
    ///
    /// The first punch becomes the check-in. Later punches become the
    /// check-out, keeping the latest one. A punch earlier than the current
    /// check-in takes its place and the old check-in moves to check-out if
    /// that slot is still empty.
    ///
    /// ```
    /// use timesheet_engine::models::TimesheetEntry;
    /// use chrono::NaiveDate;
    ///
    /// let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    /// let mut entry = TimesheetEntry::new("emp_001", date);
    /// entry.record_punch(date.and_hms_opt(17, 30, 0).unwrap());
    /// entry.record_punch(date.and_hms_opt(8, 0, 0).unwrap());
    ///
    /// assert_eq!(entry.start_time, date.and_hms_opt(8, 0, 0));
    /// assert_eq!(entry.end_time, date.and_hms_opt(17, 30, 0));
    /// ```
    pub fn record_punch(&mut self, at: NaiveDateTime) {
        match (self.start_time, self.end_time) {
            (None, _) => self.start_time = Some(at),
            (Some(start), None) if at < start => {
                self.start_time = Some(at);
                self.end_time = Some(start);
            }
            (Some(_), None) => self.end_time = Some(at),
            (Some(start), Some(end)) => {
                if at < start {
                    self.start_time = Some(at);
                } else if at > end {
                    self.end_time = Some(at);
                }
            }
        }
    }

    /// Builds the per-entry view handed to payroll.
    pub fn payroll_snapshot(&self) -> PayrollSnapshot {
        PayrollSnapshot {
            employee_id: self.employee_id.clone(),
            date: self.date,
            working_days: self.working_days.unwrap_or(Decimal::ZERO),
            overtime_weekday_hours: self.overtime.weekday,
            overtime_weekend_hours: self.overtime.weekend,
            overtime_holiday_hours: self.overtime.holiday,
            is_penalized: self.is_penalized,
            pay_terms: self.pay_terms.clone(),
        }
    }
}

/// Per-entry figures consumed by the payroll engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollSnapshot {
    /// The employee identifier.
    pub employee_id: String,
    /// The date of the entry.
    pub date: NaiveDate,
    /// Working-day credit, zero when undetermined.
    pub working_days: Decimal,
    /// Weekday overtime hours.
    pub overtime_weekday_hours: Decimal,
    /// Weekend overtime hours.
    pub overtime_weekend_hours: Decimal,
    /// Holiday overtime hours.
    pub overtime_holiday_hours: Decimal,
    /// Whether the day was penalized.
    pub is_penalized: bool,
    /// Pay terms snapshot for the date.
    pub pay_terms: PayTerms,
}
