//! Resolution of the approved requests that apply to one date.
//!
//! Leave requests compete for the day's absence reason. When more than one
//! leave type overlaps a date the most specific request wins (shortest span),
//! then the most recent approval, then the highest request id. The loser ids
//! are reported so the entry can be flagged for review.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{AbsentReason, ApprovedRequest, RequestType, TimeWindow};

/// The approved requests in force on a date, reduced to what the calculator
/// needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRequests {
    /// Absence reason granted by the winning leave request.
    pub leave: Option<AbsentReason>,
    /// Id of the winning leave request.
    pub leave_request_id: Option<u64>,
    /// Ids of leave requests of a different type that lost the tie-break.
    pub conflicting_leave_ids: Vec<u64>,
    /// Approved overtime windows, merged and sorted.
    pub overtime_windows: Vec<TimeWindow>,
    /// A late exemption is active.
    pub late_exemption: bool,
    /// A post-parental accommodation is active.
    pub post_parental: bool,
}

impl ResolvedRequests {
    /// Whether the extended grace period applies.
    pub fn extends_grace(&self) -> bool {
        self.late_exemption || self.post_parental
    }
}

/// Reduces the requests covering `date` for `employee_id`.
///
/// Requests for other employees or dates are ignored, so callers may pass an
/// unfiltered list.
///
/// # Example
///
/// ```
/// use timesheet_engine::calculation::resolve_requests;
/// use timesheet_engine::models::{AbsentReason, ApprovedRequest, RequestType};
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
/// let approved_at = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let requests = vec![ApprovedRequest {
///     id: 1,
///     employee_id: "emp_001".to_string(),
///     request_type: RequestType::LeavePaid,
///     start_date: date,
///     end_date: date,
///     window: None,
///     approved_at,
/// }];
///
/// let resolved = resolve_requests("emp_001", date, &requests);
/// assert_eq!(resolved.leave, Some(AbsentReason::PaidLeave));
/// assert!(resolved.conflicting_leave_ids.is_empty());
/// ```
pub fn resolve_requests(
    employee_id: &str,
    date: NaiveDate,
    requests: &[ApprovedRequest],
) -> ResolvedRequests {
    let applicable: Vec<&ApprovedRequest> = requests
        .iter()
        .filter(|r| r.employee_id == employee_id && r.covers(date))
        .collect();

    let mut leaves: Vec<(&ApprovedRequest, AbsentReason)> = applicable
        .iter()
        .filter_map(|r| r.request_type.leave_reason().map(|reason| (*r, reason)))
        .collect();

    // Most specific first, then most recently approved, then highest id.
    leaves.sort_by(|(a, _), (b, _)| {
        a.span_days()
            .cmp(&b.span_days())
            .then_with(|| b.approved_at.cmp(&a.approved_at))
            .then_with(|| b.id.cmp(&a.id))
    });

    let (leave, leave_request_id, conflicting_leave_ids) = match leaves.first() {
        Some((winner, reason)) => {
            let conflicting = leaves
                .iter()
                .skip(1)
                .filter(|(_, other)| other != reason)
                .map(|(r, _)| r.id)
                .collect();
            (Some(*reason), Some(winner.id), conflicting)
        }
        None => (None, None, Vec::new()),
    };

    let windows: Vec<TimeWindow> = applicable
        .iter()
        .filter(|r| r.request_type == RequestType::Overtime)
        .filter_map(|r| r.window)
        .collect();

    ResolvedRequests {
        leave,
        leave_request_id,
        conflicting_leave_ids,
        overtime_windows: merge_windows(windows),
        late_exemption: applicable
            .iter()
            .any(|r| r.request_type == RequestType::LateExemption),
        post_parental: applicable
            .iter()
            .any(|r| r.request_type == RequestType::PostParental),
    }
}

/// Sorts windows and merges any that overlap or touch. Empty windows are
/// dropped.
pub fn merge_windows(mut windows: Vec<TimeWindow>) -> Vec<TimeWindow> {
    windows.retain(|w| w.end > w.start);
    windows.sort_by_key(|w| w.start);

    let mut merged: Vec<TimeWindow> = Vec::with_capacity(windows.len());
    for window in windows {
        match merged.last_mut() {
            Some(last) if window.start <= last.end => {
                if window.end > last.end {
                    last.end = window.end;
                }
            }
            _ => merged.push(window),
        }
    }
    merged
}
