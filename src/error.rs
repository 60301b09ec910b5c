//! Error types for the Timesheet Engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for the error conditions that can occur outside the calculator itself.
//! The calculator never fails: missing context and conflicting requests are
//! reported as audit warnings instead.

use chrono::NaiveDate;
use thiserror::Error;

/// The main error type for the Timesheet Engine.
///
/// # Example
///
/// ```
/// use timesheet_engine::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/engine.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/engine.yaml");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// A punch could not be recorded.
    #[error("Invalid punch for employee '{employee_id}': {message}")]
    InvalidPunch {
        /// The employee the punch belongs to.
        employee_id: String,
        /// A description of what made the punch invalid.
        message: String,
    },

    /// No timesheet entry exists for the employee and date.
    #[error("Timesheet entry not found for employee '{employee_id}' on {date}")]
    EntryNotFound {
        /// The employee identifier.
        employee_id: String,
        /// The requested date.
        date: NaiveDate,
    },

    /// A date range was empty or reversed.
    #[error("Invalid date range: {from} to {to}")]
    InvalidDateRange {
        /// Range start (inclusive).
        from: NaiveDate,
        /// Range end (inclusive).
        to: NaiveDate,
    },

    /// A date was finalized before it ended.
    #[error("Cannot finalize {date}: the day has not ended (today is {today})")]
    DayNotEnded {
        /// The date asked for.
        date: NaiveDate,
        /// The current date.
        today: NaiveDate,
    },

    /// The backing store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// A description of the storage failure.
        message: String,
    },

    /// The recalculation queue is no longer accepting work.
    #[error("Recalculation queue is closed")]
    QueueClosed,

    /// A general calculation error occurred.
    #[error("Calculation error: {message}")]
    CalculationError {
        /// A description of the calculation error.
        message: String,
    },
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_found_displays_path() {
        let error = EngineError::ConfigNotFound {
            path: "/missing/engine.yaml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found: /missing/engine.yaml"
        );
    }

    #[test]
    fn test_config_parse_error_displays_path_and_message() {
        let error = EngineError::ConfigParseError {
            path: "/config/bad.yaml".to_string(),
            message: "invalid YAML syntax".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse configuration file '/config/bad.yaml': invalid YAML syntax"
        );
    }

    #[test]
    fn test_entry_not_found_displays_employee_and_date() {
        let error = EngineError::EntryNotFound {
            employee_id: "emp_001".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        };
        assert_eq!(
            error.to_string(),
            "Timesheet entry not found for employee 'emp_001' on 2026-03-02"
        );
    }

    #[test]
    fn test_invalid_date_range_displays_bounds() {
        let error = EngineError::InvalidDateRange {
            from: NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        };
        assert_eq!(error.to_string(), "Invalid date range: 2026-03-05 to 2026-03-01");
    }

    #[test]
    fn test_day_not_ended_displays_both_dates() {
        let error = EngineError::DayNotEnded {
            date: NaiveDate::from_ymd_opt(2026, 3, 11).unwrap(),
            today: NaiveDate::from_ymd_opt(2026, 3, 11).unwrap(),
        };
        assert_eq!(
            error.to_string(),
            "Cannot finalize 2026-03-11: the day has not ended (today is 2026-03-11)"
        );
    }

    #[test]
    fn test_queue_closed_message() {
        assert_eq!(
            EngineError::QueueClosed.to_string(),
            "Recalculation queue is closed"
        );
    }

    #[test]
    fn test_errors_implement_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<EngineError>();
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn returns_storage_error() -> EngineResult<()> {
            Err(EngineError::Storage {
                message: "lock poisoned".to_string(),
            })
        }

        fn propagates_error() -> EngineResult<()> {
            returns_storage_error()?;
            Ok(())
        }

        assert!(propagates_error().is_err());
    }
}
