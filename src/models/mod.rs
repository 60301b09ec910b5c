//! Core data models for the Timesheet Engine.
//!
//! This module contains all the domain models used throughout the engine.

mod audit;
mod context;
mod entry;
mod monthly;
mod request;

pub use audit::{AuditStep, AuditWarning, CalculationTrace};
pub use context::{DayContext, PayTerms, ScheduledSegment};
pub use entry::{
    AbsentReason, AttendanceStatus, DayType, EntryKey, OvertimeHours, PayrollSnapshot,
    TimesheetEntry,
};
pub use monthly::{MonthKey, MonthlySummary, MonthlyTimesheet, RollupDiagnostic};
pub use request::{ApprovedRequest, RequestType, TimeWindow};
