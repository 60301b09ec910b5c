//! Application state for the Timesheet Engine API.
//!
//! This module defines the shared application state that is available
//! to all request handlers.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::ConfigLoader;
use crate::recalc::{RecalcQueue, Recalculator, Sources};
use crate::sources::{InMemoryDirectory, InMemoryExemptions, InMemoryRequests, StaticCalendar};
use crate::store::InMemoryTimesheetStore;

/// Shared application state.
///
/// Holds the recalculation service, the queue feeding its worker, and the
/// mutable sources the API writes calendar edits, approvals and exemptions
/// into.
#[derive(Clone)]
pub struct AppState {
    recalculator: Arc<Recalculator>,
    queue: RecalcQueue,
    calendar: Arc<StaticCalendar>,
    requests: Arc<InMemoryRequests>,
    exemptions: Arc<InMemoryExemptions>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        recalculator: Arc<Recalculator>,
        queue: RecalcQueue,
        calendar: Arc<StaticCalendar>,
        requests: Arc<InMemoryRequests>,
        exemptions: Arc<InMemoryExemptions>,
    ) -> Self {
        Self {
            recalculator,
            queue,
            calendar,
            requests,
            exemptions,
        }
    }

    /// Wires in-memory sources and store from configuration and starts the
    /// recalculation worker on the current runtime.
    ///
    /// `fixed_today` pins the engine's notion of today.
    pub fn from_config(
        config: &ConfigLoader,
        fixed_today: Option<NaiveDate>,
    ) -> (Self, JoinHandle<()>) {
        let calendar = Arc::new(StaticCalendar::from_config(config));
        let requests = Arc::new(InMemoryRequests::new());
        let exemptions = Arc::new(InMemoryExemptions::new());
        let sources = Sources {
            calendar: calendar.clone(),
            requests: requests.clone(),
            exemptions: exemptions.clone(),
            directory: Arc::new(InMemoryDirectory::from_config(config)),
        };

        let mut recalculator =
            Recalculator::from_config(config, Arc::new(InMemoryTimesheetStore::new()), sources);
        if let Some(today) = fixed_today {
            recalculator = recalculator.with_fixed_today(today);
        }
        let recalculator = Arc::new(recalculator);

        let (queue, worker) = RecalcQueue::spawn(recalculator.clone(), config.recalc().clone());
        (
            Self::new(recalculator, queue, calendar, requests, exemptions),
            worker,
        )
    }

    /// Returns the recalculation service.
    pub fn recalculator(&self) -> &Arc<Recalculator> {
        &self.recalculator
    }

    /// Returns the recalculation queue.
    pub fn queue(&self) -> &RecalcQueue {
        &self.queue
    }

    /// Returns the calendar.
    pub fn calendar(&self) -> &StaticCalendar {
        &self.calendar
    }

    /// Returns the approved-request source.
    pub fn requests(&self) -> &InMemoryRequests {
        &self.requests
    }

    /// Returns the exemption list.
    pub fn exemptions(&self) -> &InMemoryExemptions {
        &self.exemptions
    }
}
