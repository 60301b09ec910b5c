//! Recalculation of stored entries.
//!
//! This module contains the [`Recalculator`] service that owns every write to
//! the store, the [`RecalcTrigger`] events that describe upstream changes,
//! and the background [`RecalcQueue`] that applies them with retry and
//! coalesced monthly rollups.

mod service;
mod trigger;
mod worker;

pub use service::{FinalizeReport, MonthRef, RecalcOutcome, Recalculator, Sources};
pub use trigger::{AffectedScope, RecalcTrigger};
pub use worker::{RecalcQueue, backoff_delay, next_finalize_run, run_finalize_schedule};
