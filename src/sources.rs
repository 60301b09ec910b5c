//! External collaborators consumed by the engine.
//!
//! The calendar, the approved-request set, the exemption list and the
//! employee directory are owned by other systems. The engine reads them
//! through the traits in this module and never mutates them itself. The
//! in-memory implementations back the server binary and the tests; their
//! mutators stand in for the owning systems.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{
    CalendarConfig, CompensatoryDayConfig, ConfigLoader, EmployeeRecord, HolidayConfig,
    PayTermsConfig,
};
use crate::models::{ApprovedRequest, DayContext, DayType};

/// Supplies the calendar context of an employee's date.
pub trait CalendarSource: Send + Sync {
    /// The context for the date, or `None` when the calendar has nothing.
    fn day_context(&self, employee_id: &str, date: NaiveDate) -> Option<DayContext>;
}

/// Supplies approved requests.
pub trait RequestSource: Send + Sync {
    /// Approved requests of the employee covering the date.
    fn overlapping_requests(&self, employee_id: &str, date: NaiveDate) -> Vec<ApprovedRequest>;
}

/// Supplies the blanket attendance exemption list.
pub trait ExemptionSource: Send + Sync {
    /// Whether the employee is exempt from attendance on the date.
    fn is_globally_exempt(&self, employee_id: &str, date: NaiveDate) -> bool;
}

/// Supplies the employees the engine keeps timesheets for.
pub trait EmployeeDirectory: Send + Sync {
    /// Employees active on the date.
    fn active_employees(&self, date: NaiveDate) -> Vec<String>;

    /// Every known employee.
    fn all_employees(&self) -> Vec<String>;

    /// Whether the employee is known and active on the date.
    fn is_active(&self, employee_id: &str, date: NaiveDate) -> bool;
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A calendar built from `calendar.yaml` and the pay-term files.
///
/// Dates before the earliest pay-term file have no context.
///
/// # Example
///
/// ```no_run
/// use timesheet_engine::config::ConfigLoader;
/// use timesheet_engine::sources::{CalendarSource, StaticCalendar};
/// use chrono::NaiveDate;
///
/// let loader = ConfigLoader::load("./config/default").unwrap();
/// let calendar = StaticCalendar::from_config(&loader);
///
/// let context = calendar.day_context("emp_001", NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
/// assert!(context.is_some());
/// ```
#[derive(Debug)]
pub struct StaticCalendar {
    calendar: RwLock<CalendarConfig>,
    /// Sorted oldest first.
    pay_terms: RwLock<Vec<PayTermsConfig>>,
}

impl StaticCalendar {
    /// Creates a calendar from parsed configuration.
    pub fn new(calendar: CalendarConfig, mut pay_terms: Vec<PayTermsConfig>) -> Self {
        pay_terms.sort_by_key(|p| p.effective_date);
        Self {
            calendar: RwLock::new(calendar),
            pay_terms: RwLock::new(pay_terms),
        }
    }

    /// Creates a calendar from a loaded configuration.
    pub fn from_config(loader: &ConfigLoader) -> Self {
        Self::new(loader.calendar().clone(), loader.pay_terms().to_vec())
    }

    /// Declares a public holiday.
    pub fn add_holiday(&self, holiday: HolidayConfig) {
        let mut calendar = write(&self.calendar);
        calendar.holidays.retain(|h| h.date != holiday.date);
        calendar.holidays.push(holiday);
    }

    /// Declares a makeup workday.
    pub fn add_compensatory_day(&self, day: CompensatoryDayConfig) {
        let mut calendar = write(&self.calendar);
        calendar.compensatory_days.retain(|d| d.date != day.date);
        calendar.compensatory_days.push(day);
    }

    /// Adds or replaces the pay terms effective from a date.
    pub fn upsert_pay_terms(&self, terms: PayTermsConfig) {
        let mut all = write(&self.pay_terms);
        all.retain(|p| p.effective_date != terms.effective_date);
        all.push(terms);
        all.sort_by_key(|p| p.effective_date);
    }
}

impl CalendarSource for StaticCalendar {
    fn day_context(&self, employee_id: &str, date: NaiveDate) -> Option<DayContext> {
        let pay_terms = read(&self.pay_terms)
            .iter()
            .rev()
            .find(|p| p.effective_date <= date)
            .map(|p| p.terms_for(employee_id).clone())?;

        let calendar = read(&self.calendar);
        let credit_for = |segments: usize| calendar.credit_per_segment * Decimal::from(segments);

        if calendar.holidays.iter().any(|h| h.date == date) {
            return Some(DayContext {
                day_type: DayType::Holiday,
                segments: Vec::new(),
                max_credit: calendar.holiday_credit,
                pay_terms,
            });
        }

        if let Some(day) = calendar.compensatory_days.iter().find(|d| d.date == date) {
            let segments = if day.segments.is_empty() {
                calendar.default_segments.clone()
            } else {
                day.segments.clone()
            };
            return Some(DayContext {
                day_type: DayType::Compensatory,
                max_credit: credit_for(segments.len()),
                segments,
                pay_terms,
            });
        }

        let template = calendar
            .employee_templates
            .get(employee_id)
            .unwrap_or(&calendar.weekly_template);
        let segments = template.segments_for(date.weekday()).to_vec();

        Some(DayContext {
            day_type: DayType::Regular,
            max_credit: credit_for(segments.len()),
            segments,
            pay_terms,
        })
    }
}

/// Approved requests held in memory.
#[derive(Debug, Default)]
pub struct InMemoryRequests {
    requests: RwLock<Vec<ApprovedRequest>>,
}

impl InMemoryRequests {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an approval, replacing any request with the same id.
    ///
    /// Returns the replaced request, whose dates may no longer be covered.
    pub fn approve(&self, request: ApprovedRequest) -> Option<ApprovedRequest> {
        let mut requests = write(&self.requests);
        let replaced = requests
            .iter()
            .position(|r| r.id == request.id)
            .map(|index| requests.remove(index));
        requests.push(request);
        replaced
    }

    /// Removes a request, returning it if it existed.
    pub fn revoke(&self, id: u64) -> Option<ApprovedRequest> {
        let mut requests = write(&self.requests);
        let index = requests.iter().position(|r| r.id == id)?;
        Some(requests.remove(index))
    }

    /// Looks up a request by id.
    pub fn get(&self, id: u64) -> Option<ApprovedRequest> {
        read(&self.requests).iter().find(|r| r.id == id).cloned()
    }
}

impl RequestSource for InMemoryRequests {
    fn overlapping_requests(&self, employee_id: &str, date: NaiveDate) -> Vec<ApprovedRequest> {
        read(&self.requests)
            .iter()
            .filter(|r| r.employee_id == employee_id && r.covers(date))
            .cloned()
            .collect()
    }
}

/// A period during which an employee is exempt from attendance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExemptionPeriod {
    /// First exempt date.
    pub from: NaiveDate,
    /// Last exempt date; open-ended when `None`.
    pub to: Option<NaiveDate>,
}

impl ExemptionPeriod {
    fn covers(&self, date: NaiveDate) -> bool {
        date >= self.from && self.to.is_none_or(|to| date <= to)
    }
}

/// The exemption list held in memory.
#[derive(Debug, Default)]
pub struct InMemoryExemptions {
    periods: RwLock<HashMap<String, Vec<ExemptionPeriod>>>,
}

impl InMemoryExemptions {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exemption period.
    pub fn exempt(&self, employee_id: impl Into<String>, period: ExemptionPeriod) {
        write(&self.periods)
            .entry(employee_id.into())
            .or_default()
            .push(period);
    }

    /// Removes every exemption of the employee, returning the removed periods.
    pub fn clear(&self, employee_id: &str) -> Vec<ExemptionPeriod> {
        write(&self.periods).remove(employee_id).unwrap_or_default()
    }
}

impl ExemptionSource for InMemoryExemptions {
    fn is_globally_exempt(&self, employee_id: &str, date: NaiveDate) -> bool {
        read(&self.periods)
            .get(employee_id)
            .is_some_and(|periods| periods.iter().any(|p| p.covers(date)))
    }
}

/// The employee directory held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    employees: RwLock<Vec<EmployeeRecord>>,
}

impl InMemoryDirectory {
    /// Creates a directory with the given employees.
    pub fn new(employees: Vec<EmployeeRecord>) -> Self {
        Self {
            employees: RwLock::new(employees),
        }
    }

    /// Creates a directory from `engine.yaml`.
    pub fn from_config(loader: &ConfigLoader) -> Self {
        Self::new(loader.engine().employees.clone())
    }

}

impl EmployeeDirectory for InMemoryDirectory {
    fn active_employees(&self, date: NaiveDate) -> Vec<String> {
        let mut ids: Vec<String> = read(&self.employees)
            .iter()
            .filter(|e| e.is_active_on(date))
            .map(|e| e.id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn all_employees(&self) -> Vec<String> {
        let mut ids: Vec<String> = read(&self.employees).iter().map(|e| e.id.clone()).collect();
        ids.sort();
        ids
    }

    fn is_active(&self, employee_id: &str, date: NaiveDate) -> bool {
        read(&self.employees)
            .iter()
            .any(|e| e.id == employee_id && e.is_active_on(date))
    }
}
