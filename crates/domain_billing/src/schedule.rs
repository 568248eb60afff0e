//! Repayment schedule entries

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{CoreError, LoanId, ScheduleId};

/// Installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    /// Not yet paid
    Pending,
    /// Paid in full
    Paid,
}

impl ScheduleStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "PENDING",
            ScheduleStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ScheduleStatus::Pending),
            "PAID" => Ok(ScheduleStatus::Paid),
            other => Err(CoreError::validation(format!("unknown schedule status '{}'", other))),
        }
    }
}

/// One installment of a loan's schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: ScheduleId,
    pub loan_id: LoanId,
    /// 1-based week number
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount: i64,
    pub paid_amount: i64,
    pub status: ScheduleStatus,
}

impl ScheduleEntry {
    pub fn is_paid(&self) -> bool {
        self.status == ScheduleStatus::Paid
    }
}

/// An installment waiting to be inserted; always starts `PENDING`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScheduleEntry {
    pub loan_id: LoanId,
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("PENDING".parse::<ScheduleStatus>().unwrap(), ScheduleStatus::Pending);
        assert_eq!(ScheduleStatus::Paid.to_string(), "PAID");
        assert!("paid".parse::<ScheduleStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&ScheduleStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
    }
}
