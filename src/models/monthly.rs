//! Monthly aggregate models.
//!
//! This module contains the [`MonthlyTimesheet`] produced by the monthly
//! rollup and the [`MonthKey`] that identifies a calendar month.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OvertimeHours;

/// A calendar month.
///
/// # Example
///
/// ```
/// use timesheet_engine::models::MonthKey;
/// use chrono::NaiveDate;
///
/// let month = MonthKey::of(NaiveDate::from_ymd_opt(2026, 12, 15).unwrap());
/// assert_eq!(month.first_day(), NaiveDate::from_ymd_opt(2026, 12, 1));
/// assert_eq!(month.last_day(), NaiveDate::from_ymd_opt(2026, 12, 31));
/// assert_eq!(month.next(), MonthKey { year: 2027, month: 1 });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthKey {
    /// Calendar year.
    pub year: i32,
    /// Month number, 1 to 12.
    pub month: u32,
}

impl MonthKey {
    /// The month containing the date.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First day of the month; `None` for an invalid month number.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Last day of the month; `None` for an invalid month number.
    pub fn last_day(&self) -> Option<NaiveDate> {
        self.next().first_day().and_then(|d| d.pred_opt())
    }

    /// Whether the date falls within the month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// The following month.
    pub fn next(&self) -> Self {
        if self.month >= 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Whole months from `earlier` to this month; negative if `earlier` is
    /// later.
    pub fn months_since(&self, earlier: MonthKey) -> i32 {
        (self.year - earlier.year) * 12 + self.month as i32 - earlier.month as i32
    }

    /// The preceding month.
    pub fn prev(&self) -> Self {
        if self.month <= 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// An entry left out of a rollup because it was inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupDiagnostic {
    /// Date of the excluded entry.
    pub date: NaiveDate,
    /// A code identifying the problem.
    pub code: String,
    /// A human-readable description.
    pub message: String,
}

/// One employee's aggregate for one month.
///
/// Always produced by a full recount of the month's finalized entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTimesheet {
    /// The employee identifier.
    pub employee_id: String,
    /// The month aggregated.
    pub month: MonthKey,
    /// Hours worked inside scheduled segments.
    pub total_hours: Decimal,
    /// Sum of working-day credits.
    pub total_working_days: Decimal,
    /// Overtime totals by bucket.
    pub overtime: OvertimeHours,
    /// Number of penalized days.
    pub penalty_count: u32,
    /// Leave balance carried in from the previous month.
    pub opening_leave_balance: Decimal,
    /// Leave accrued during the month.
    pub accrued_leave: Decimal,
    /// Number of entries with a paid-leave absence.
    pub consumed_leave_days: Decimal,
    /// `opening + accrued - consumed`.
    pub remaining_leave_balance: Decimal,
    /// Entries counted.
    pub entry_count: u32,
    /// Entries left out, with the reason.
    #[serde(default)]
    pub diagnostics: Vec<RollupDiagnostic>,
}

impl MonthlyTimesheet {
    /// The summary view used for leave display and payroll.
    pub fn summary(&self) -> MonthlySummary {
        MonthlySummary {
            employee_id: self.employee_id.clone(),
            month: self.month,
            total_working_days: self.total_working_days,
            overtime_weekday_hours: self.overtime.weekday,
            overtime_weekend_hours: self.overtime.weekend,
            overtime_holiday_hours: self.overtime.holiday,
            penalty_count: self.penalty_count,
            remaining_leave_balance: self.remaining_leave_balance,
        }
    }
}

/// Monthly figures consumed by leave display and payroll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// The employee identifier.
    pub employee_id: String,
    /// The month.
    pub month: MonthKey,
    /// Sum of working-day credits.
    pub total_working_days: Decimal,
    /// Weekday overtime hours.
    pub overtime_weekday_hours: Decimal,
    /// Weekend overtime hours.
    pub overtime_weekend_hours: Decimal,
    /// Holiday overtime hours.
    pub overtime_holiday_hours: Decimal,
    /// Number of penalized days.
    pub penalty_count: u32,
    /// Leave balance left at the end of the month.
    pub remaining_leave_balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_navigation_wraps_years() {
        let january = MonthKey {
            year: 2026,
            month: 1,
        };
        assert_eq!(
            january.prev(),
            MonthKey {
                year: 2025,
                month: 12
            }
        );
        assert_eq!(january.prev().next(), january);
    }

    #[test]
    fn test_months_since_crosses_years() {
        let march = MonthKey {
            year: 2026,
            month: 3,
        };
        let november = MonthKey {
            year: 2025,
            month: 11,
        };
        assert_eq!(march.months_since(november), 4);
        assert_eq!(november.months_since(march), -4);
        assert_eq!(march.months_since(march), 0);
    }

    #[test]
    fn test_last_day_handles_february() {
        let february = MonthKey {
            year: 2028,
            month: 2,
        };
        assert_eq!(february.last_day(), NaiveDate::from_ymd_opt(2028, 2, 29));
    }

    #[test]
    fn test_contains() {
        let march = MonthKey {
            year: 2026,
            month: 3,
        };
        assert!(march.contains(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()));
        assert!(!march.contains(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()));
    }

    #[test]
    fn test_display() {
        let month = MonthKey {
            year: 2026,
            month: 3,
        };
        assert_eq!(month.to_string(), "2026-03");
    }

    #[test]
    fn test_month_ordering() {
        let a = MonthKey {
            year: 2025,
            month: 12,
        };
        let b = MonthKey {
            year: 2026,
            month: 1,
        };
        assert!(a < b);
    }
}
