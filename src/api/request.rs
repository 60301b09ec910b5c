//! Request types for the Timesheet Engine API.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::sources::ExemptionPeriod;

/// Request body for `POST /punches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PunchRequest {
    /// The employee punching in or out.
    pub employee_id: String,
    /// When the punch happened, in site-local time.
    pub timestamp: NaiveDateTime,
}

/// Request body for `POST /finalize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalizeRequest {
    /// The date to finalize; yesterday when omitted.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Request body for `POST /exemptions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExemptionRequest {
    /// The exempt employee.
    pub employee_id: String,
    /// First exempt date.
    pub from: NaiveDate,
    /// Last exempt date; open-ended when omitted.
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl ExemptionRequest {
    /// The period this request records.
    pub fn period(&self) -> ExemptionPeriod {
        ExemptionPeriod {
            from: self.from,
            to: self.to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punch_request_deserialization() {
        let json = r#"{"employee_id": "emp_001", "timestamp": "2026-03-02T08:03:00"}"#;
        let request: PunchRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.employee_id, "emp_001");
        assert_eq!(
            request.timestamp,
            NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(8, 3, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_finalize_request_date_is_optional() {
        let request: FinalizeRequest = serde_json::from_str("{}").unwrap();
        assert!(request.date.is_none());
    }

    #[test]
    fn test_exemption_request_period() {
        let json = r#"{"employee_id": "emp_001", "from": "2026-03-01"}"#;
        let request: ExemptionRequest = serde_json::from_str(json).unwrap();

        let period = request.period();
        assert_eq!(period.from, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert!(period.to.is_none());
    }
}
