//! HTTP API module for the Timesheet Engine.
//!
//! This module provides the REST endpoints for recording punches, reading
//! entries and monthly summaries, and feeding upstream changes into the
//! recalculation queue.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{ExemptionRequest, FinalizeRequest, PunchRequest};
pub use response::{ApiError, ApiErrorResponse};
pub use state::AppState;
