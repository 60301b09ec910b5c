//! Configuration types for the timesheet engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use chrono::{NaiveDate, NaiveTime, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::calculation::CalculationPolicy;
use crate::models::{PayTerms, ScheduledSegment};

/// Leave accounting parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavePolicy {
    /// Balance an employee starts with when no earlier month exists.
    pub initial_balance: Decimal,
    /// Leave accrued every month.
    pub monthly_accrual: Decimal,
}

impl Default for LeavePolicy {
    fn default() -> Self {
        Self {
            initial_balance: Decimal::ZERO,
            monthly_accrual: Decimal::ONE,
        }
    }
}

/// Background recalculation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecalcSettings {
    /// Concurrent chunks used by the end-of-day finalize pass.
    pub worker_count: usize,
    /// Attempts per trigger before it is dropped.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Upper bound on the retry delay.
    pub max_backoff_ms: u64,
    /// Quiet period before queued rollups are flushed.
    pub rollup_debounce_ms: u64,
    /// Longest a queued rollup waits while triggers keep arriving.
    pub rollup_max_delay_ms: u64,
    /// Capacity of the trigger queue.
    pub queue_capacity: usize,
}

impl Default for RecalcSettings {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_attempts: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 10_000,
            rollup_debounce_ms: 500,
            rollup_max_delay_ms: 5_000,
            queue_capacity: 1024,
        }
    }
}

/// HTTP server and scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// Local time of day the finalize pass runs for the previous date.
    pub finalize_at: NaiveTime,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            finalize_at: NaiveTime::from_hms_opt(0, 5, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// An employee known to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    /// The employee identifier.
    pub id: String,
    /// First active date, if bounded.
    #[serde(default)]
    pub active_from: Option<NaiveDate>,
    /// Last active date, if bounded.
    #[serde(default)]
    pub active_to: Option<NaiveDate>,
}

impl EmployeeRecord {
    /// Whether the employee is active on the date.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.active_from.is_none_or(|from| date >= from)
            && self.active_to.is_none_or(|to| date <= to)
    }
}

/// Contents of `engine.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Grace and bonus parameters for the calculator.
    #[serde(default)]
    pub policy: CalculationPolicy,
    /// Leave accounting.
    #[serde(default)]
    pub leave: LeavePolicy,
    /// Background recalculation.
    #[serde(default)]
    pub recalc: RecalcSettings,
    /// HTTP server and scheduler.
    #[serde(default)]
    pub server: ServerSettings,
    /// Employee directory.
    #[serde(default)]
    pub employees: Vec<EmployeeRecord>,
}

/// Scheduled segments per weekday. Days left out are rest days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyTemplate {
    /// Monday segments.
    pub monday: Vec<ScheduledSegment>,
    /// Tuesday segments.
    pub tuesday: Vec<ScheduledSegment>,
    /// Wednesday segments.
    pub wednesday: Vec<ScheduledSegment>,
    /// Thursday segments.
    pub thursday: Vec<ScheduledSegment>,
    /// Friday segments.
    pub friday: Vec<ScheduledSegment>,
    /// Saturday segments.
    pub saturday: Vec<ScheduledSegment>,
    /// Sunday segments.
    pub sunday: Vec<ScheduledSegment>,
}

impl WeeklyTemplate {
    /// The segments scheduled on a weekday.
    pub fn segments_for(&self, weekday: Weekday) -> &[ScheduledSegment] {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }
}

/// A public holiday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayConfig {
    /// The date of the holiday.
    pub date: NaiveDate,
    /// The holiday name.
    pub name: String,
}

/// A makeup workday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensatoryDayConfig {
    /// The date worked.
    pub date: NaiveDate,
    /// What the day makes up for.
    #[serde(default)]
    pub reason: String,
    /// Segments worked; the calendar default when empty.
    #[serde(default)]
    pub segments: Vec<ScheduledSegment>,
}

/// Contents of `calendar.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Credit earned per scheduled segment (0.5 for a half day).
    pub credit_per_segment: Decimal,
    /// Credit paid on a holiday.
    pub holiday_credit: Decimal,
    /// Segments used for a makeup day that does not list its own.
    pub default_segments: Vec<ScheduledSegment>,
    /// Company-wide weekly schedule.
    pub weekly_template: WeeklyTemplate,
    /// Per-employee schedule overrides.
    #[serde(default)]
    pub employee_templates: HashMap<String, WeeklyTemplate>,
    /// Public holidays.
    #[serde(default)]
    pub holidays: Vec<HolidayConfig>,
    /// Makeup workdays.
    #[serde(default)]
    pub compensatory_days: Vec<CompensatoryDayConfig>,
}

/// One `pay_terms/*.yaml` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayTermsConfig {
    /// The date these terms take effect.
    pub effective_date: NaiveDate,
    /// Terms for employees without an override.
    pub default: PayTerms,
    /// Per-employee overrides.
    #[serde(default)]
    pub employees: HashMap<String, PayTerms>,
}

impl PayTermsConfig {
    /// The terms for an employee.
    pub fn terms_for(&self, employee_id: &str) -> &PayTerms {
        self.employees.get(employee_id).unwrap_or(&self.default)
    }
}
