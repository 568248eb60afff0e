//! Billing ledger orchestration
//!
//! `BillingLedger` is the entry point the HTTP layer talks to. It plans
//! loans, posts payments and answers read queries by composing the
//! amortization planner, the delinquency rules and a [`LedgerRepository`].
//!
//! # Invariants
//!
//! - A loan and its full schedule are written in one unit of work
//! - A payment and the schedule update it settles are written in one unit of work
//! - Weeks are paid strictly in order, one payment per week
//! - A retried payment (same idempotency key) never creates a second row

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use core_kernel::{HealthCheckResult, LoanId, PortError};

use crate::amortization::AmortizationPlanner;
use crate::delinquency::{DelinquencyAssessment, DelinquencyEvaluator};
use crate::error::BillingError;
use crate::loan::{Loan, LoanTerms};
use crate::pagination::{
    parse_payment_cursor, parse_schedule_cursor, Page, PaymentCursor, PaymentQuery, ScheduleCursor,
    ScheduleQuery,
};
use crate::payment::{Payment, SubmitPayment};
use crate::ports::LedgerRepository;
use crate::schedule::ScheduleEntry;

/// The billing ledger engine
#[derive(Debug)]
pub struct BillingLedger<R> {
    repo: Arc<R>,
    planner: AmortizationPlanner,
}

impl<R> Clone for BillingLedger<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            planner: self.planner,
        }
    }
}

impl<R: LedgerRepository> BillingLedger<R> {
    /// Creates a ledger over a repository
    pub fn new(repo: R) -> Self {
        Self::from_shared(Arc::new(repo))
    }

    /// Creates a ledger over a repository that is shared elsewhere
    pub fn from_shared(repo: Arc<R>) -> Self {
        Self {
            repo,
            planner: AmortizationPlanner::new(),
        }
    }

    /// The repository the ledger writes through
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Plans and persists a new loan together with its schedule
    ///
    /// # Errors
    ///
    /// `InvalidLoanTerms` is returned before anything is written. Storage
    /// failures roll back both the loan and the schedule.
    #[instrument(skip(self, terms), fields(principal = terms.principal_amount, weeks = terms.total_weeks))]
    pub async fn submit_loan(&self, terms: LoanTerms) -> Result<Loan, BillingError> {
        let plan = self.planner.plan(&terms).inspect_err(|e| trace_error("submit_loan", e))?;

        let result: Result<Loan, BillingError> = self
            .repo
            .with_tx(move |tx| async move {
                let loan = tx.insert_loan(plan.loan_command()).await?;
                let entries = plan.schedule_for(loan.id);
                let expected = entries.len() as u64;

                let inserted = tx.create_loan_schedules(entries).await?;
                if inserted != expected {
                    return Err(BillingError::internal(format!(
                        "schedule insert wrote {} of {} rows for {}",
                        inserted, expected, loan.id
                    )));
                }
                Ok(loan)
            })
            .await;

        match &result {
            Ok(loan) => info!(loan_id = %loan.id, weekly_payment = loan.weekly_payment_amount, "loan created"),
            Err(e) => trace_error("submit_loan", e),
        }
        result
    }

    /// Fetches a loan
    #[instrument(skip(self), fields(loan_id = %loan_id))]
    pub async fn get_loan_by_id(&self, loan_id: LoanId) -> Result<Loan, BillingError> {
        self.repo
            .get_loan_by_id(loan_id)
            .await
            .map_err(|e| loan_read_error(loan_id, e))
            .inspect_err(|e| trace_error("get_loan_by_id", e))
    }

    /// Amount still owed on a loan
    ///
    /// The loan and the paid total are read in the same unit of work.
    #[instrument(skip(self), fields(loan_id = %loan_id))]
    pub async fn get_outstanding(&self, loan_id: LoanId) -> Result<i64, BillingError> {
        self.repo
            .with_tx(move |tx| async move {
                let loan = tx.get_loan_by_id(loan_id).await.map_err(|e| loan_read_error(loan_id, e))?;
                let total_paid = tx.get_total_paid_amount(loan_id).await?;
                loan.outstanding(total_paid)
            })
            .await
            .inspect_err(|e| trace_error("get_outstanding", e))
    }

    /// Posts one weekly installment
    ///
    /// The payment is assigned to the next unpaid week. Checks run in this
    /// order: the loan exists, it is not overpaid, the amount is exactly one
    /// installment, an unpaid week remains.
    ///
    /// # Errors
    ///
    /// `DuplicatePayment` when the idempotency key (or the week) was already
    /// used. Callers should treat it as "already processed". This holds for
    /// a retry of the payment that closed the loan too.
    #[instrument(
        skip(self, payment),
        fields(loan_id = %payment.loan_id, idempotency_key = %payment.idempotency_key)
    )]
    pub async fn submit_payment(&self, payment: SubmitPayment) -> Result<Payment, BillingError> {
        let result: Result<Payment, BillingError> = self
            .repo
            .with_tx(move |tx| async move {
                let loan_id = payment.loan_id;
                let loan = tx.lock_loan(loan_id).await.map_err(|e| loan_read_error(loan_id, e))?;

                let total_paid = tx.get_total_paid_amount(loan_id).await?;
                if total_paid > loan.total_payable_amount {
                    return Err(closed_or_duplicate(&tx, loan_id, &payment.idempotency_key).await);
                }

                if !loan.accepts_installment(payment.amount) {
                    return Err(BillingError::InvalidPayment {
                        expected: loan.weekly_payment_amount,
                        actual: payment.amount,
                    });
                }

                let paid_weeks = tx.get_paid_weeks_count(loan_id).await?;
                let next_week = paid_weeks.saturating_add(1);
                if next_week > loan.total_weeks {
                    return Err(closed_or_duplicate(&tx, loan_id, &payment.idempotency_key).await);
                }

                let idempotency_key = payment.idempotency_key.clone();
                let recorded = match tx.insert_payment(payment.for_week(next_week)).await {
                    Ok(recorded) => recorded,
                    Err(e) if e.is_unique_violation() => {
                        return Err(BillingError::DuplicatePayment { loan_id, idempotency_key });
                    }
                    Err(e) => return Err(e.into()),
                };

                let entry = tx
                    .get_schedule_by_sequence(loan_id, next_week)
                    .await
                    .map_err(|e| match e {
                        PortError::NotFound { .. } => BillingError::internal(format!(
                            "no schedule entry for week {} of {}",
                            next_week, loan_id
                        )),
                        other => other.into(),
                    })?;
                tx.update_schedule_payment(entry.id, recorded.amount).await?;

                Ok(recorded)
            })
            .await;

        match &result {
            Ok(p) => info!(payment_id = %p.id, week = p.week_number, "payment posted"),
            Err(e) => trace_error("submit_payment", e),
        }
        result
    }

    /// Full delinquency picture for a loan at `now`
    #[instrument(skip(self), fields(loan_id = %loan_id))]
    pub async fn assess_delinquency(
        &self,
        loan_id: LoanId,
        now: DateTime<Utc>,
    ) -> Result<DelinquencyAssessment, BillingError> {
        self.repo
            .with_tx(move |tx| async move {
                let loan = tx.get_loan_by_id(loan_id).await.map_err(|e| loan_read_error(loan_id, e))?;
                let last_paid_week = tx
                    .get_last_paid_week(loan_id)
                    .await
                    .map_err(BillingError::DelinquencyCheckFailed)?;
                Ok(DelinquencyEvaluator::assess(loan.created_at, now, last_paid_week))
            })
            .await
            .inspect_err(|e| trace_error("assess_delinquency", e))
    }

    /// Whether the loan is behind schedule at `now`
    pub async fn is_delinquent(&self, loan_id: LoanId, now: DateTime<Utc>) -> Result<bool, BillingError> {
        Ok(self.assess_delinquency(loan_id, now).await?.is_delinquent)
    }

    /// One page of a loan's payments in `(paid_at, id)` order
    ///
    /// `limit` is used as given; clamping belongs to the caller.
    #[instrument(skip(self, cursor), fields(loan_id = %loan_id))]
    pub async fn list_payments(
        &self,
        loan_id: LoanId,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Page<Payment>, BillingError> {
        let after = parse_payment_cursor(cursor).inspect_err(|e| trace_error("list_payments", e))?;
        let rows = self
            .repo
            .list_payments_by_loan_id(PaymentQuery { loan_id, limit, after })
            .await
            .map_err(BillingError::from)
            .inspect_err(|e| trace_error("list_payments", e))?;
        Page::from_rows(rows, limit, |payment: &Payment| PaymentCursor::from(payment))
    }

    /// One page of a loan's schedule in sequence order
    #[instrument(skip(self, cursor), fields(loan_id = %loan_id))]
    pub async fn list_schedules(
        &self,
        loan_id: LoanId,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Page<ScheduleEntry>, BillingError> {
        let after = parse_schedule_cursor(cursor).inspect_err(|e| trace_error("list_schedules", e))?;
        let rows = self
            .repo
            .list_schedules_by_loan_id(ScheduleQuery { loan_id, limit, after })
            .await
            .map_err(BillingError::from)
            .inspect_err(|e| trace_error("list_schedules", e))?;
        Page::from_rows(rows, limit, |entry: &ScheduleEntry| ScheduleCursor::from(entry))
    }

    /// Health of the underlying repository
    pub async fn health(&self) -> HealthCheckResult {
        self.repo.health_check().await
    }
}

fn loan_read_error(loan_id: LoanId, error: PortError) -> BillingError {
    if error.is_not_found() {
        BillingError::LoanNotFound(loan_id)
    } else {
        error.into()
    }
}

/// Rejection for a payment on a closed loan
///
/// A key the loan already recorded is a retry and gets `DuplicatePayment`.
async fn closed_or_duplicate<T>(tx: &T, loan_id: LoanId, idempotency_key: &str) -> BillingError
where
    T: LedgerRepository,
{
    match tx.find_payment_by_idempotency_key(loan_id, idempotency_key).await {
        Ok(Some(_)) => BillingError::DuplicatePayment {
            loan_id,
            idempotency_key: idempotency_key.to_string(),
        },
        Ok(None) => BillingError::LoanAlreadyClosed(loan_id),
        Err(e) => e.into(),
    }
}

/// Logs a failed operation at a level matching how alarming it is
fn trace_error(operation: &str, error: &BillingError) {
    match error {
        BillingError::Internal(_) => error!(operation, error = %error, "ledger operation failed"),
        BillingError::Timeout { .. } => warn!(operation, error = %error, "ledger operation timed out"),
        BillingError::DuplicatePayment { .. } => info!(operation, "payment already processed"),
        _ if error.is_domain_error() => debug!(operation, error = %error, "ledger operation rejected"),
        _ => error!(operation, error = %error, "ledger operation failed"),
    }
}
