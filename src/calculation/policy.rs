//! Calculation policy constants.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Grace period in minutes with no accommodation.
pub const DEFAULT_GRACE_MINUTES: i64 = 5;

/// Grace period in minutes under a late exemption or post-parental
/// accommodation.
pub const ACCOMMODATION_GRACE_MINUTES: i64 = 65;

/// Credit added to a two-punch day under post-parental accommodation (0.125).
pub const ACCOMMODATION_BONUS_CREDIT: Decimal = Decimal::from_parts(125, 0, 0, false, 3);

/// Tunable parameters for the calculator.
///
/// # Example
///
/// ```
/// use timesheet_engine::calculation::CalculationPolicy;
/// use rust_decimal::Decimal;
///
/// let policy = CalculationPolicy::default();
/// assert_eq!(policy.default_grace_minutes, 5);
/// assert_eq!(policy.accommodation_grace_minutes, 65);
/// assert_eq!(policy.accommodation_bonus_credit, Decimal::new(125, 3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationPolicy {
    /// Grace period without accommodation.
    pub default_grace_minutes: i64,
    /// Grace period with accommodation.
    pub accommodation_grace_minutes: i64,
    /// Post-parental credit bonus.
    pub accommodation_bonus_credit: Decimal,
}

impl Default for CalculationPolicy {
    fn default() -> Self {
        Self {
            default_grace_minutes: DEFAULT_GRACE_MINUTES,
            accommodation_grace_minutes: ACCOMMODATION_GRACE_MINUTES,
            accommodation_bonus_credit: ACCOMMODATION_BONUS_CREDIT,
        }
    }
}
