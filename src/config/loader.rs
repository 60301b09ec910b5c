//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the engine,
//! calendar and pay-term configuration from YAML files.

use std::fs;
use std::path::Path;

use crate::calculation::CalculationPolicy;
use crate::error::{EngineError, EngineResult};

use super::types::{CalendarConfig, EngineConfig, LeavePolicy, PayTermsConfig, RecalcSettings};

/// Environment variable naming the configuration directory.
pub const CONFIG_DIR_ENV: &str = "TIMESHEET_CONFIG_DIR";

/// Directory used when [`CONFIG_DIR_ENV`] is not set.
pub const DEFAULT_CONFIG_DIR: &str = "./config/default";

/// Loads and provides access to the engine configuration.
///
/// # Directory Structure
///
/// ```text
/// config/default/
/// ├── engine.yaml         # Policy, leave, recalculation, server, employees
/// ├── calendar.yaml       # Weekly template, holidays, makeup days
/// └── pay_terms/
///     └── 2026-01-01.yaml # Pay terms effective from this date
/// ```
///
/// # Example
///
/// ```no_run
/// use timesheet_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/default").unwrap();
///
/// for terms in loader.pay_terms() {
///     println!("{}: {:?}", terms.effective_date, terms.default);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    engine: EngineConfig,
    calendar: CalendarConfig,
    /// Sorted oldest first.
    pay_terms: Vec<PayTermsConfig>,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` instance on success, or an error if:
    /// - Any required file is missing
    /// - Any file contains invalid YAML
    /// - The `pay_terms` directory has no files
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let engine = Self::load_yaml::<EngineConfig>(&path.join("engine.yaml"))?;
        let calendar = Self::load_yaml::<CalendarConfig>(&path.join("calendar.yaml"))?;
        let pay_terms = Self::load_pay_terms(&path.join("pay_terms"))?;

        Ok(Self::from_parts(engine, calendar, pay_terms))
    }

    /// Loads from [`CONFIG_DIR_ENV`], falling back to [`DEFAULT_CONFIG_DIR`].
    pub fn from_env() -> EngineResult<Self> {
        let dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
        Self::load(dir)
    }

    /// Builds a loader from already-parsed parts.
    pub fn from_parts(
        engine: EngineConfig,
        calendar: CalendarConfig,
        mut pay_terms: Vec<PayTermsConfig>,
    ) -> Self {
        pay_terms.sort_by_key(|p| p.effective_date);
        Self {
            engine,
            calendar,
            pay_terms,
        }
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads all pay-term files from the directory.
    fn load_pay_terms(dir: &Path) -> EngineResult<Vec<PayTermsConfig>> {
        let dir_str = dir.display().to_string();

        let entries = fs::read_dir(dir).map_err(|_| EngineError::ConfigNotFound {
            path: dir_str.clone(),
        })?;

        let mut terms = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| EngineError::ConfigNotFound {
                path: dir_str.clone(),
            })?;

            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                terms.push(Self::load_yaml::<PayTermsConfig>(&path)?);
            }
        }

        if terms.is_empty() {
            return Err(EngineError::ConfigNotFound {
                path: format!("{} (no pay term files found)", dir_str),
            });
        }

        Ok(terms)
    }

    /// Returns the engine settings.
    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    /// Returns the calendar.
    pub fn calendar(&self) -> &CalendarConfig {
        &self.calendar
    }

    /// Returns every pay-term file, oldest first.
    pub fn pay_terms(&self) -> &[PayTermsConfig] {
        &self.pay_terms
    }

    /// Returns the calculation policy.
    pub fn policy(&self) -> &CalculationPolicy {
        &self.engine.policy
    }

    /// Returns the leave policy.
    pub fn leave(&self) -> &LeavePolicy {
        &self.engine.leave
    }

    /// Returns the recalculation settings.
    pub fn recalc(&self) -> &RecalcSettings {
        &self.engine.recalc
    }
}
