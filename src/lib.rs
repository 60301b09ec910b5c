//! Attendance and Timesheet Calculation Engine
//!
//! This crate turns raw punches, the company calendar, approved requests and
//! exemptions into one timesheet entry per employee per date, keeps those
//! entries consistent as upstream data changes, and rolls them up into
//! monthly aggregates with a chained leave balance.

#![warn(missing_docs)]

pub mod api;
pub mod calculation;
pub mod config;
pub mod error;
pub mod models;
pub mod recalc;
pub mod sources;
pub mod store;
