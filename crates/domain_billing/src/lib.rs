//! Billing Domain - Loan Repayment Ledger
//!
//! This crate implements the billing ledger engine: fixed-term loans repaid
//! in equal weekly installments.
//!
//! # Loan Lifecycle
//!
//! 1. **Origination**: flat interest is applied once to the principal and the
//!    total is split into `total_weeks` equal installments. The loan and its
//!    schedule are written together.
//! 2. **Repayment**: each payment must be exactly one installment and settles
//!    the next unpaid week. Retries carrying the same idempotency key are
//!    recognized and not applied twice.
//! 3. **Monitoring**: outstanding balance and delinquency are derived on
//!    demand; nothing about them is stored.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingLedger, LoanTerms, SubmitPayment};
//!
//! let ledger = BillingLedger::new(repository);
//!
//! let loan = ledger.submit_loan(terms).await?;
//! ledger
//!     .submit_payment(SubmitPayment::new(loan.id, loan.weekly_payment_amount, "req-1"))
//!     .await?;
//! assert_eq!(ledger.get_outstanding(loan.id).await?, loan.total_payable_amount - loan.weekly_payment_amount);
//! ```

pub mod amortization;
pub mod delinquency;
pub mod error;
pub mod ledger;
pub mod loan;
pub mod pagination;
pub mod payment;
pub mod ports;
pub mod schedule;

pub use amortization::{AmortizationPlan, AmortizationPlanner, Installment};
pub use delinquency::{DelinquencyAssessment, DelinquencyEvaluator};
pub use error::BillingError;
pub use ledger::BillingLedger;
pub use loan::{CreateLoanCommand, Loan, LoanTerms};
pub use pagination::{Page, PaymentCursor, PaymentQuery, ScheduleCursor, ScheduleQuery};
pub use payment::{CreatePaymentCommand, Payment, SubmitPayment};
pub use ports::LedgerRepository;
pub use schedule::{NewScheduleEntry, ScheduleEntry, ScheduleStatus};
