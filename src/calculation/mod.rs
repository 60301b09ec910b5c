//! Calculation logic for the Timesheet Engine.
//!
//! This module contains the timesheet calculator and the monthly rollup. The
//! calculator is split into rule modules: punch classification, approved
//! request precedence, scheduled hours and overtime, late/early penalties, and
//! [`compute`], which runs them in order against one entry.

mod hours;
mod monthly_rollup;
mod penalty;
mod policy;
mod precedence;
mod punches;
mod timesheet;

pub use hours::{HoursResult, OvertimeBucket, calculate_hours, minutes_to_hours, overtime_bucket};
pub use monthly_rollup::{FINALIZED_WITHOUT_STATUS, LeaveBalance, roll_up_month};
pub use penalty::{PenaltyResult, calculate_penalty};
pub use policy::{
    ACCOMMODATION_BONUS_CREDIT, ACCOMMODATION_GRACE_MINUTES, CalculationPolicy,
    DEFAULT_GRACE_MINUTES,
};
pub use precedence::{ResolvedRequests, merge_windows, resolve_requests};
pub use punches::{PunchClassification, PunchState, classify_punches};
pub use timesheet::{CalculationInput, compute};
