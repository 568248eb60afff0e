//! Loan, payment and schedule DTOs

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{LoanId, PaymentId};
use domain_billing::{Loan, LoanTerms, Page, Payment, ScheduleEntry};

use crate::error::ApiError;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitLoanRequest {
    #[validate(range(min = 1, message = "principal_amount must be at least 1"))]
    pub principal_amount: i64,
    pub annual_interest_rate: Decimal,
    #[validate(range(min = 1, message = "total_weeks must be at least 1"))]
    pub total_weeks: u32,
    /// `YYYY-MM-DD`
    pub start_date: String,
}

impl SubmitLoanRequest {
    pub fn into_terms(self) -> Result<LoanTerms, ApiError> {
        let start_date = NaiveDate::parse_from_str(self.start_date.trim(), DATE_FORMAT)
            .map_err(|_| ApiError::bad_request("Invalid start_date"))?;

        Ok(LoanTerms {
            principal_amount: self.principal_amount,
            annual_interest_rate: self.annual_interest_rate,
            total_weeks: self.total_weeks,
            start_date,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitLoanResponse {
    pub loan_id: LoanId,
    pub weekly_payment_amount: i64,
    pub total_payable: i64,
}

impl From<&Loan> for SubmitLoanResponse {
    fn from(loan: &Loan) -> Self {
        Self {
            loan_id: loan.id,
            weekly_payment_amount: loan.weekly_payment_amount,
            total_payable: loan.total_payable_amount,
        }
    }
}

/// Loan detail with its delinquency status folded in
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanDetailResponse {
    pub loan_id: LoanId,
    pub principal_amount: i64,
    pub annual_interest_rate: Decimal,
    pub total_payable: i64,
    pub weekly_payment_amount: i64,
    pub total_weeks: u32,
    pub start_date: String,
    pub created_at: String,
    pub is_delinquent: bool,
}

impl LoanDetailResponse {
    pub fn new(loan: &Loan, is_delinquent: bool) -> Self {
        Self {
            loan_id: loan.id,
            principal_amount: loan.principal_amount,
            annual_interest_rate: loan.annual_interest_rate,
            total_payable: loan.total_payable_amount,
            weekly_payment_amount: loan.weekly_payment_amount,
            total_weeks: loan.total_weeks,
            start_date: loan.start_date.format(DATE_FORMAT).to_string(),
            created_at: rfc3339(loan.created_at),
            is_delinquent,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutstandingResponse {
    pub loan_id: LoanId,
    pub outstanding: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitPaymentRequest {
    #[validate(range(min = 1, message = "amount must be at least 1"))]
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitPaymentResponse {
    pub payment_id: PaymentId,
    pub week_number: u32,
}

impl From<&Payment> for SubmitPaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            week_number: payment.week_number,
        }
    }
}

/// `?limit=&cursor=` for listings
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

impl PageParams {
    /// The limit as the caller sent it; negative or out-of-range counts as absent
    pub fn requested_limit(&self) -> Option<u32> {
        self.limit.and_then(|limit| u32::try_from(limit).ok())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub payment_id: PaymentId,
    pub week_number: u32,
    pub amount: i64,
    pub paid_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListPaymentResponse {
    pub payments: Vec<PaymentResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl From<Page<Payment>> for ListPaymentResponse {
    fn from(page: Page<Payment>) -> Self {
        let payments = page
            .items
            .iter()
            .map(|payment| PaymentResponse {
                payment_id: payment.id,
                week_number: payment.week_number,
                amount: payment.amount,
                paid_at: rfc3339(payment.paid_at),
            })
            .collect();
        Self {
            payments,
            next_cursor: page.next_cursor,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub sequence: u32,
    pub due_date: String,
    pub amount: i64,
    pub paid_amount: i64,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListScheduleResponse {
    pub schedules: Vec<ScheduleResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl From<Page<ScheduleEntry>> for ListScheduleResponse {
    fn from(page: Page<ScheduleEntry>) -> Self {
        let schedules = page
            .items
            .iter()
            .map(|entry| ScheduleResponse {
                sequence: entry.sequence,
                due_date: entry.due_date.format(DATE_FORMAT).to_string(),
                amount: entry.amount,
                paid_amount: entry.paid_amount,
                status: entry.status.as_str().to_string(),
            })
            .collect();
        Self {
            schedules,
            next_cursor: page.next_cursor,
        }
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(start_date: &str) -> SubmitLoanRequest {
        SubmitLoanRequest {
            principal_amount: 5_000_000,
            annual_interest_rate: Decimal::new(10, 2),
            total_weeks: 50,
            start_date: start_date.to_string(),
        }
    }

    #[test]
    fn test_start_date_must_be_iso() {
        let terms = request("2025-01-06").into_terms().unwrap();
        assert_eq!(terms.start_date, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());

        assert!(matches!(request("06/01/2025").into_terms(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_request_validation() {
        assert!(request("2025-01-06").validate().is_ok());

        let mut zero_weeks = request("2025-01-06");
        zero_weeks.total_weeks = 0;
        assert!(zero_weeks.validate().is_err());

        assert!(SubmitPaymentRequest { amount: 0 }.validate().is_err());
        assert!(SubmitPaymentRequest { amount: 110_000 }.validate().is_ok());
    }

    #[test]
    fn test_negative_limit_counts_as_absent() {
        let params = PageParams { limit: Some(-3), cursor: None };
        assert_eq!(params.requested_limit(), None);
        let params = PageParams { limit: Some(25), cursor: None };
        assert_eq!(params.requested_limit(), Some(25));
    }
}
