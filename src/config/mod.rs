//! Configuration loading and management for the Timesheet Engine.
//!
//! This module provides functionality to load the engine settings, the
//! company calendar and effective-dated pay terms from YAML files.
//!
//! # Example
//!
//! ```no_run
//! use timesheet_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/default").unwrap();
//! println!("Employees: {}", config.engine().employees.len());
//! ```

mod loader;
mod types;

pub use loader::{CONFIG_DIR_ENV, ConfigLoader, DEFAULT_CONFIG_DIR};
pub use types::{
    CalendarConfig, CompensatoryDayConfig, EmployeeRecord, EngineConfig, HolidayConfig,
    LeavePolicy, PayTermsConfig, RecalcSettings, ServerSettings, WeeklyTemplate,
};
