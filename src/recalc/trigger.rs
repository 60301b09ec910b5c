//! Upstream changes that require entries to be recomputed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::sources::EmployeeDirectory;

/// An upstream change.
///
/// Triggers describe what changed, not what to do about it: each resolves to
/// a set of employees and an inclusive date range whose entries are
/// recomputed. Applying the same trigger twice converges to the same state.
///
/// # Example
///
/// ```
/// use timesheet_engine::recalc::RecalcTrigger;
///
/// let trigger: RecalcTrigger = serde_json::from_str(
///     r#"{"type": "exemption_changed", "employee_id": "emp_001", "from": "2026-03-01"}"#,
/// ).unwrap();
/// assert_eq!(trigger.employee_id(), Some("emp_001"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecalcTrigger {
    /// An employee was added to or removed from the exemption list.
    ExemptionChanged {
        /// The affected employee.
        employee_id: String,
        /// First affected date.
        from: NaiveDate,
        /// Last affected date; today when open-ended.
        #[serde(default)]
        to: Option<NaiveDate>,
    },
    /// Pay terms changed retroactively.
    PayTermsChanged {
        /// The affected employee; everyone when `None`.
        #[serde(default)]
        employee_id: Option<String>,
        /// The date the new terms take effect.
        effective_from: NaiveDate,
    },
    /// A schedule, holiday or makeup day changed.
    ScheduleChanged {
        /// The affected employee; everyone when `None`.
        #[serde(default)]
        employee_id: Option<String>,
        /// First affected date.
        from: NaiveDate,
        /// Last affected date; today when open-ended.
        #[serde(default)]
        to: Option<NaiveDate>,
    },
    /// A request was approved.
    RequestApproved {
        /// The request owner.
        employee_id: String,
        /// The approved request id.
        request_id: u64,
        /// First covered date.
        start_date: NaiveDate,
        /// Last covered date.
        end_date: NaiveDate,
    },
    /// An approved request was revoked.
    RequestRevoked {
        /// The request owner.
        employee_id: String,
        /// The revoked request id.
        request_id: u64,
        /// First covered date.
        start_date: NaiveDate,
        /// Last covered date.
        end_date: NaiveDate,
    },
}

/// The employees and dates a trigger affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedScope {
    /// Employees to recompute.
    pub employees: Vec<String>,
    /// First date, inclusive.
    pub from: NaiveDate,
    /// Last date, inclusive.
    pub to: NaiveDate,
}

impl AffectedScope {
    /// Every date in the range.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.from.iter_days().take_while(move |d| *d <= self.to)
    }

    /// Whether the range contains no dates.
    pub fn is_empty(&self) -> bool {
        self.employees.is_empty() || self.to < self.from
    }
}

impl RecalcTrigger {
    /// The single employee named by the trigger, if any.
    pub fn employee_id(&self) -> Option<&str> {
        match self {
            RecalcTrigger::ExemptionChanged { employee_id, .. }
            | RecalcTrigger::RequestApproved { employee_id, .. }
            | RecalcTrigger::RequestRevoked { employee_id, .. } => Some(employee_id),
            RecalcTrigger::PayTermsChanged { employee_id, .. }
            | RecalcTrigger::ScheduleChanged { employee_id, .. } => employee_id.as_deref(),
        }
    }

    /// A short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RecalcTrigger::ExemptionChanged { .. } => "exemption_changed",
            RecalcTrigger::PayTermsChanged { .. } => "pay_terms_changed",
            RecalcTrigger::ScheduleChanged { .. } => "schedule_changed",
            RecalcTrigger::RequestApproved { .. } => "request_approved",
            RecalcTrigger::RequestRevoked { .. } => "request_revoked",
        }
    }

    /// Resolves the employees and dates to recompute.
    ///
    /// Open-ended ranges stop at `today`. An explicit range whose end is
    /// before its start is rejected. A range that starts after `today` is
    /// returned as-is: only entries that already exist are touched there.
    pub fn affected_scope(
        &self,
        directory: &dyn EmployeeDirectory,
        today: NaiveDate,
    ) -> EngineResult<AffectedScope> {
        let (employee, from, to) = match self {
            RecalcTrigger::ExemptionChanged {
                employee_id,
                from,
                to,
            } => (Some(employee_id.clone()), *from, to.unwrap_or(today)),
            RecalcTrigger::PayTermsChanged {
                employee_id,
                effective_from,
            } => (employee_id.clone(), *effective_from, today),
            RecalcTrigger::ScheduleChanged {
                employee_id,
                from,
                to,
            } => (employee_id.clone(), *from, to.unwrap_or(today)),
            RecalcTrigger::RequestApproved {
                employee_id,
                start_date,
                end_date,
                ..
            }
            | RecalcTrigger::RequestRevoked {
                employee_id,
                start_date,
                end_date,
                ..
            } => (Some(employee_id.clone()), *start_date, *end_date),
        };

        let explicit_end = match self {
            RecalcTrigger::ExemptionChanged { to, .. } | RecalcTrigger::ScheduleChanged { to, .. } => {
                to.is_some()
            }
            RecalcTrigger::PayTermsChanged { .. } => false,
            RecalcTrigger::RequestApproved { .. } | RecalcTrigger::RequestRevoked { .. } => true,
        };
        if explicit_end && to < from {
            return Err(EngineError::InvalidDateRange { from, to });
        }

        let employees = match employee {
            Some(id) => vec![id],
            None => directory.all_employees(),
        };

        Ok(AffectedScope {
            employees,
            from,
            to,
        })
    }
}
