//! Monthly rollup.
//!
//! The monthly aggregate is never updated incrementally. Every rollup rescans
//! all finalized entries of the month, so leave consumption is a recount: an
//! entry whose paid-leave reason was cleared by attendance simply stops being
//! counted the next time the month is rolled up.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::models::{
    AbsentReason, DayType, MonthKey, MonthlyTimesheet, OvertimeHours, RollupDiagnostic,
    TimesheetEntry,
};

/// Diagnostic code for a finalized entry with no status on a day that should
/// have one.
pub const FINALIZED_WITHOUT_STATUS: &str = "FINALIZED_WITHOUT_STATUS";

/// Leave balances carried into a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveBalance {
    /// Balance carried in from the previous month.
    pub opening: Decimal,
    /// Leave accrued during the month.
    pub accrued: Decimal,
}

/// Checks a finalized entry before it is aggregated.
///
/// Rest days and holidays legitimately finalize without a status; any other
/// finalized day must have one.
fn check_consistency(entry: &TimesheetEntry) -> Option<RollupDiagnostic> {
    if entry.status.is_some() {
        return None;
    }
    let missing_credit = entry.working_days.is_none();
    let should_have_status = entry.day_type != DayType::Holiday && entry.max_credit > Decimal::ZERO;
    if missing_credit || should_have_status {
        Some(RollupDiagnostic {
            date: entry.date,
            code: FINALIZED_WITHOUT_STATUS.to_string(),
            message: format!(
                "Entry for {} on {} is finalized but has no status; excluded from the month",
                entry.employee_id, entry.date
            ),
        })
    } else {
        None
    }
}

/// Recomputes one employee's month from its entries.
///
/// Entries for other employees or months and entries that are not yet
/// finalized are ignored. Inconsistent finalized entries are left out and
/// reported in `diagnostics`; they never abort the rollup.
///
/// # Example
///
/// ```
/// use timesheet_engine::calculation::{roll_up_month, LeaveBalance};
/// use timesheet_engine::models::{AbsentReason, AttendanceStatus, MonthKey, TimesheetEntry};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
/// let mut entry = TimesheetEntry::new("emp_001", date);
/// entry.status = Some(AttendanceStatus::Absent);
/// entry.absent_reason = Some(AbsentReason::PaidLeave);
/// entry.working_days = Some(Decimal::ONE);
/// entry.max_credit = Decimal::ONE;
/// entry.is_finalized = true;
///
/// let month = roll_up_month(
///     "emp_001",
///     MonthKey::of(date),
///     &[entry],
///     LeaveBalance { opening: Decimal::new(5, 0), accrued: Decimal::ONE },
/// );
/// assert_eq!(month.consumed_leave_days, Decimal::ONE);
/// assert_eq!(month.remaining_leave_balance, Decimal::new(5, 0));
/// ```
pub fn roll_up_month(
    employee_id: &str,
    month: MonthKey,
    entries: &[TimesheetEntry],
    balance: LeaveBalance,
) -> MonthlyTimesheet {
    let mut total_hours = Decimal::ZERO;
    let mut total_working_days = Decimal::ZERO;
    let mut overtime = OvertimeHours::default();
    let mut penalty_count = 0u32;
    let mut consumed_leave_days = Decimal::ZERO;
    let mut entry_count = 0u32;
    let mut diagnostics = Vec::new();

    for entry in entries
        .iter()
        .filter(|e| e.employee_id == employee_id && month.contains(e.date) && e.is_finalized)
    {
        if let Some(diagnostic) = check_consistency(entry) {
            warn!(
                employee_id = %entry.employee_id,
                date = %entry.date,
                code = %diagnostic.code,
                "Entry excluded from monthly rollup"
            );
            diagnostics.push(diagnostic);
            continue;
        }

        entry_count += 1;
        total_hours += entry.worked_hours;
        total_working_days += entry.working_days.unwrap_or(Decimal::ZERO);
        overtime.weekday += entry.overtime.weekday;
        overtime.weekend += entry.overtime.weekend;
        overtime.holiday += entry.overtime.holiday;
        if entry.is_penalized {
            penalty_count += 1;
        }
        if entry.absent_reason == Some(AbsentReason::PaidLeave) {
            consumed_leave_days += Decimal::ONE;
        }
    }

    diagnostics.sort_by_key(|d| d.date);

    let remaining_leave_balance = balance.opening + balance.accrued - consumed_leave_days;

    debug!(
        employee_id = %employee_id,
        month = %month,
        entry_count,
        excluded = diagnostics.len(),
        %remaining_leave_balance,
        "Month rolled up"
    );

    MonthlyTimesheet {
        employee_id: employee_id.to_string(),
        month,
        total_hours,
        total_working_days,
        overtime,
        penalty_count,
        opening_leave_balance: balance.opening,
        accrued_leave: balance.accrued,
        consumed_leave_days,
        remaining_leave_balance,
        entry_count,
        diagnostics,
    }
}
