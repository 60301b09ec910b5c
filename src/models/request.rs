//! Approved workflow requests.
//!
//! Requests arrive already approved; the approval workflow itself lives
//! elsewhere. The calculator only needs to know which requests overlap a
//! date and what they grant.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::AbsentReason;

/// The kind of an approved request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Paid leave.
    LeavePaid,
    /// Unpaid leave.
    LeaveUnpaid,
    /// Maternity leave.
    LeaveMaternity,
    /// Overtime inside a time window.
    Overtime,
    /// Exemption from late/early penalties.
    LateExemption,
    /// Post-parental accommodation (extended grace plus a credit bonus).
    PostParental,
}

impl RequestType {
    /// The absence reason a leave request records, `None` for other types.
    pub fn leave_reason(self) -> Option<AbsentReason> {
        match self {
            RequestType::LeavePaid => Some(AbsentReason::PaidLeave),
            RequestType::LeaveUnpaid => Some(AbsentReason::UnpaidLeave),
            RequestType::LeaveMaternity => Some(AbsentReason::MaternityLeave),
            RequestType::Overtime | RequestType::LateExemption | RequestType::PostParental => {
                None
            }
        }
    }

    /// Whether the request extends the grace period.
    pub fn extends_grace(self) -> bool {
        matches!(self, RequestType::LateExemption | RequestType::PostParental)
    }
}

/// A closed-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start.
    pub start: NaiveDateTime,
    /// Window end.
    pub end: NaiveDateTime,
}

/// An approved request covering one or more dates.
///
/// # Example
///
/// ```
/// use timesheet_engine::models::{ApprovedRequest, RequestType};
/// use chrono::NaiveDate;
///
/// let leave = ApprovedRequest {
///     id: 7,
///     employee_id: "emp_001".to_string(),
///     request_type: RequestType::LeavePaid,
///     start_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
///     end_date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
///     window: None,
///     approved_at: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap().and_hms_opt(9, 0, 0).unwrap(),
/// };
/// assert!(leave.covers(NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()));
/// assert_eq!(leave.span_days(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedRequest {
    /// Request identifier from the workflow system.
    pub id: u64,
    /// The employee the request belongs to.
    pub employee_id: String,
    /// The kind of request.
    pub request_type: RequestType,
    /// First covered date (inclusive).
    pub start_date: NaiveDate,
    /// Last covered date (inclusive).
    pub end_date: NaiveDate,
    /// Approved time window, required for overtime.
    #[serde(default)]
    pub window: Option<TimeWindow>,
    /// When the request was approved.
    pub approved_at: NaiveDateTime,
}

impl ApprovedRequest {
    /// Whether the request covers the date.
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Number of dates covered.
    pub fn span_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}
