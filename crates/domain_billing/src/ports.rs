//! Billing Domain Ports
//!
//! This module defines the persistence contract the billing ledger depends
//! on. The production adapter lives in `infra_db`; an in-memory double is
//! available behind the `mock` feature for tests.
//!
//! # Units of work
//!
//! [`LedgerRepository::with_tx`] runs a closure against a transaction-bound
//! handle (`Self::Tx`). The handle is owned by the closure for exactly as
//! long as the closure runs. Returning `Ok` commits, returning `Err` or
//! panicking rolls back. Calling `with_tx` on a handle that is already bound
//! to a transaction reuses that transaction.
//!
//! ```rust,ignore
//! let loan = repo
//!     .with_tx(move |tx| async move {
//!         let loan = tx.insert_loan(command).await?;
//!         tx.create_loan_schedules(plan.schedule_for(loan.id)).await?;
//!         Ok::<_, BillingError>(loan)
//!     })
//!     .await?;
//! ```

use std::future::Future;

use async_trait::async_trait;

use core_kernel::{DomainPort, HealthCheckable, LoanId, PortError, ScheduleId};

use crate::loan::{CreateLoanCommand, Loan};
use crate::pagination::{PaymentQuery, ScheduleQuery};
use crate::payment::{CreatePaymentCommand, Payment};
use crate::schedule::{NewScheduleEntry, ScheduleEntry};

/// Operation labels shared by every adapter, used in timeout diagnostics
pub mod op {
    pub const GET_LOAN_BY_ID: &str = "get_loan_by_id";
    pub const LOCK_LOAN: &str = "lock_loan";
    pub const INSERT_LOAN: &str = "insert_loan";
    pub const GET_TOTAL_PAID_AMOUNT: &str = "get_total_paid_amount";
    pub const GET_PAID_WEEKS_COUNT: &str = "get_paid_weeks_count";
    pub const GET_LAST_PAID_WEEK: &str = "get_last_paid_week";
    pub const INSERT_PAYMENT: &str = "insert_payment";
    pub const FIND_PAYMENT_BY_IDEMPOTENCY_KEY: &str = "find_payment_by_idempotency_key";
    pub const LIST_PAYMENTS_BY_LOAN_ID: &str = "list_payments_by_loan_id";
    pub const CREATE_LOAN_SCHEDULES: &str = "create_loan_schedules";
    pub const LIST_SCHEDULES_BY_LOAN_ID: &str = "list_schedules_by_loan_id";
    pub const UPDATE_SCHEDULE_PAYMENT: &str = "update_schedule_payment";
    pub const GET_SCHEDULE_BY_SEQUENCE: &str = "get_schedule_by_sequence";
}

/// Persistence port for loans, schedules and payments
#[async_trait]
pub trait LedgerRepository: DomainPort + HealthCheckable {
    /// Repository handle bound to an open transaction
    type Tx: LedgerRepository + Clone;

    /// Runs `work` as one atomic unit
    ///
    /// Commits when `work` returns `Ok`; rolls back on `Err` and on panic,
    /// re-raising the panic after the rollback.
    async fn with_tx<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<PortError> + Send + 'static,
        F: FnOnce(Self::Tx) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static;

    /// Fetches a loan, `NotFound` when it does not exist
    async fn get_loan_by_id(&self, id: LoanId) -> Result<Loan, PortError>;

    /// Fetches a loan and holds it against concurrent payment posting until
    /// the surrounding unit of work ends
    ///
    /// Plain reads use [`get_loan_by_id`](Self::get_loan_by_id) and never wait
    /// on this lock.
    async fn lock_loan(&self, id: LoanId) -> Result<Loan, PortError>;

    async fn insert_loan(&self, command: CreateLoanCommand) -> Result<Loan, PortError>;

    /// Sum of all payment amounts for a loan, 0 when there are none
    async fn get_total_paid_amount(&self, loan_id: LoanId) -> Result<i64, PortError>;

    async fn get_paid_weeks_count(&self, loan_id: LoanId) -> Result<u32, PortError>;

    /// Highest paid week number, 0 when nothing was paid
    async fn get_last_paid_week(&self, loan_id: LoanId) -> Result<u32, PortError>;

    /// Inserts a payment
    ///
    /// A reused idempotency key or an already-paid `(loan, week)` pair is
    /// reported as `PortError::UniqueViolation`.
    async fn insert_payment(&self, command: CreatePaymentCommand) -> Result<Payment, PortError>;

    /// The loan's payment recorded under `idempotency_key`, if any
    async fn find_payment_by_idempotency_key(
        &self,
        loan_id: LoanId,
        idempotency_key: &str,
    ) -> Result<Option<Payment>, PortError>;

    /// Up to `query.limit` payments after the cursor, ordered by `(paid_at, id)`
    async fn list_payments_by_loan_id(&self, query: PaymentQuery) -> Result<Vec<Payment>, PortError>;

    /// Inserts all entries in one statement and returns how many were written
    async fn create_loan_schedules(&self, entries: Vec<NewScheduleEntry>) -> Result<u64, PortError>;

    /// Up to `query.limit` entries after the cursor, ordered by `sequence`
    async fn list_schedules_by_loan_id(&self, query: ScheduleQuery) -> Result<Vec<ScheduleEntry>, PortError>;

    /// Records the paid amount on an entry; the entry becomes `PAID` once
    /// the installment is covered
    async fn update_schedule_payment(&self, id: ScheduleId, paid_amount: i64) -> Result<ScheduleEntry, PortError>;

    async fn get_schedule_by_sequence(&self, loan_id: LoanId, sequence: u32) -> Result<ScheduleEntry, PortError>;
}

/// In-memory implementation of LedgerRepository for testing
///
/// Transactions take a snapshot of the committed state, run against it and
/// swap it back in on success. One transaction runs at a time, which gives
/// the serializable behavior the ledger relies on.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use futures::FutureExt;
    use tokio::sync::{Mutex, RwLock};

    use core_kernel::{AdapterHealth, HealthCheckResult, PaymentId};

    use crate::schedule::ScheduleStatus;

    #[derive(Debug, Clone, Default)]
    struct LedgerState {
        loans: BTreeMap<LoanId, Loan>,
        schedules: BTreeMap<ScheduleId, ScheduleEntry>,
        payments: BTreeMap<PaymentId, Payment>,
        last_loan_id: i64,
        last_schedule_id: i64,
        last_payment_id: i64,
    }

    #[derive(Debug, Clone, Copy)]
    enum Fault {
        Fail,
        TimeOut,
    }

    #[derive(Debug, Default)]
    struct TxCounters {
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
    }

    /// In-memory ledger store
    #[derive(Debug, Clone)]
    pub struct MockLedgerRepository {
        committed: Arc<RwLock<LedgerState>>,
        working: Option<Arc<RwLock<LedgerState>>>,
        tx_gate: Arc<Mutex<()>>,
        faults: Arc<RwLock<HashMap<String, Fault>>>,
        counters: Arc<TxCounters>,
    }

    impl Default for MockLedgerRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockLedgerRepository {
        /// Creates an empty store
        pub fn new() -> Self {
            Self {
                committed: Arc::new(RwLock::new(LedgerState::default())),
                working: None,
                tx_gate: Arc::new(Mutex::new(())),
                faults: Arc::new(RwLock::new(HashMap::new())),
                counters: Arc::new(TxCounters::default()),
            }
        }

        fn state(&self) -> &Arc<RwLock<LedgerState>> {
            self.working.as_ref().unwrap_or(&self.committed)
        }

        /// Makes every call to `operation` fail with an internal error
        pub async fn fail_on(&self, operation: &str) {
            self.faults.write().await.insert(operation.to_string(), Fault::Fail);
        }

        /// Makes every call to `operation` report a timeout
        pub async fn time_out_on(&self, operation: &str) {
            self.faults.write().await.insert(operation.to_string(), Fault::TimeOut);
        }

        /// Removes every injected fault
        pub async fn clear_faults(&self) {
            self.faults.write().await.clear();
        }

        async fn check_fault(&self, operation: &str) -> Result<(), PortError> {
            match self.faults.read().await.get(operation) {
                Some(Fault::Fail) => Err(PortError::internal(format!("injected failure in {}", operation))),
                Some(Fault::TimeOut) => Err(PortError::timeout(operation, Duration::from_secs(2))),
                None => Ok(()),
            }
        }

        async fn stored_loan(&self, id: LoanId) -> Result<Loan, PortError> {
            self.state()
                .read()
                .await
                .loans
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Loan", id))
        }

        /// Stores a loan as-is, keeping its id and timestamps
        pub async fn seed_loan(&self, loan: Loan) -> Loan {
            let mut state = self.state().write().await;
            state.last_loan_id = state.last_loan_id.max(loan.id.value());
            state.loans.insert(loan.id, loan.clone());
            loan
        }

        /// Stores a payment as-is, bypassing uniqueness checks
        pub async fn seed_payment(&self, payment: Payment) -> Payment {
            let mut state = self.state().write().await;
            state.last_payment_id = state.last_payment_id.max(payment.id.value());
            state.payments.insert(payment.id, payment.clone());
            payment
        }

        /// Committed payments of a loan in insertion order
        pub async fn payments_for(&self, loan_id: LoanId) -> Vec<Payment> {
            self.committed
                .read()
                .await
                .payments
                .values()
                .filter(|p| p.loan_id == loan_id)
                .cloned()
                .collect()
        }

        /// Committed schedule entries of a loan ordered by sequence
        pub async fn schedules_for(&self, loan_id: LoanId) -> Vec<ScheduleEntry> {
            let mut entries: Vec<_> = self
                .committed
                .read()
                .await
                .schedules
                .values()
                .filter(|s| s.loan_id == loan_id)
                .cloned()
                .collect();
            entries.sort_by_key(|s| s.sequence);
            entries
        }

        pub async fn loan_count(&self) -> usize {
            self.committed.read().await.loans.len()
        }

        pub fn commit_count(&self) -> usize {
            self.counters.commits.load(Ordering::SeqCst)
        }

        pub fn rollback_count(&self) -> usize {
            self.counters.rollbacks.load(Ordering::SeqCst)
        }
    }

    impl DomainPort for MockLedgerRepository {}

    #[async_trait]
    impl HealthCheckable for MockLedgerRepository {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-ledger-repository".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl LedgerRepository for MockLedgerRepository {
        type Tx = MockLedgerRepository;

        async fn with_tx<T, E, F, Fut>(&self, work: F) -> Result<T, E>
        where
            T: Send + 'static,
            E: From<PortError> + Send + 'static,
            F: FnOnce(Self::Tx) -> Fut + Send + 'static,
            Fut: Future<Output = Result<T, E>> + Send + 'static,
        {
            if self.working.is_some() {
                return work(self.clone()).await;
            }

            let _gate = self.tx_gate.lock().await;
            let snapshot = self.committed.read().await.clone();
            let tx = Self {
                working: Some(Arc::new(RwLock::new(snapshot))),
                ..self.clone()
            };

            match AssertUnwindSafe(work(tx.clone())).catch_unwind().await {
                Ok(Ok(value)) => {
                    let finished = tx.state().read().await.clone();
                    *self.committed.write().await = finished;
                    self.counters.commits.fetch_add(1, Ordering::SeqCst);
                    Ok(value)
                }
                Ok(Err(error)) => {
                    self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
                    Err(error)
                }
                Err(panic) => {
                    self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
                    std::panic::resume_unwind(panic)
                }
            }
        }

        async fn get_loan_by_id(&self, id: LoanId) -> Result<Loan, PortError> {
            self.check_fault(op::GET_LOAN_BY_ID).await?;
            self.stored_loan(id).await
        }

        // the transaction gate already serializes units of work
        async fn lock_loan(&self, id: LoanId) -> Result<Loan, PortError> {
            self.check_fault(op::LOCK_LOAN).await?;
            self.stored_loan(id).await
        }

        async fn insert_loan(&self, command: CreateLoanCommand) -> Result<Loan, PortError> {
            self.check_fault(op::INSERT_LOAN).await?;
            let mut state = self.state().write().await;
            state.last_loan_id += 1;
            let loan = Loan {
                id: LoanId::new(state.last_loan_id),
                principal_amount: command.principal_amount,
                annual_interest_rate: command.annual_interest_rate,
                total_interest_amount: command.total_interest_amount,
                total_payable_amount: command.total_payable_amount,
                weekly_payment_amount: command.weekly_payment_amount,
                total_weeks: command.total_weeks,
                start_date: command.start_date,
                created_at: Utc::now(),
            };
            state.loans.insert(loan.id, loan.clone());
            Ok(loan)
        }

        async fn get_total_paid_amount(&self, loan_id: LoanId) -> Result<i64, PortError> {
            self.check_fault(op::GET_TOTAL_PAID_AMOUNT).await?;
            Ok(self
                .state()
                .read()
                .await
                .payments
                .values()
                .filter(|p| p.loan_id == loan_id)
                .map(|p| p.amount)
                .sum())
        }

        async fn get_paid_weeks_count(&self, loan_id: LoanId) -> Result<u32, PortError> {
            self.check_fault(op::GET_PAID_WEEKS_COUNT).await?;
            let count = self
                .state()
                .read()
                .await
                .payments
                .values()
                .filter(|p| p.loan_id == loan_id)
                .count();
            u32::try_from(count).map_err(|_| PortError::internal("paid weeks count overflows"))
        }

        async fn get_last_paid_week(&self, loan_id: LoanId) -> Result<u32, PortError> {
            self.check_fault(op::GET_LAST_PAID_WEEK).await?;
            Ok(self
                .state()
                .read()
                .await
                .payments
                .values()
                .filter(|p| p.loan_id == loan_id)
                .map(|p| p.week_number)
                .max()
                .unwrap_or(0))
        }

        async fn insert_payment(&self, command: CreatePaymentCommand) -> Result<Payment, PortError> {
            self.check_fault(op::INSERT_PAYMENT).await?;
            let mut state = self.state().write().await;

            if !state.loans.contains_key(&command.loan_id) {
                return Err(PortError::internal(format!(
                    "payment references missing loan {}",
                    command.loan_id
                )));
            }
            if state.payments.values().any(|p| p.idempotency_key == command.idempotency_key) {
                return Err(PortError::unique_violation(
                    "payments_idempotency_key_key",
                    format!("idempotency key '{}' already used", command.idempotency_key),
                ));
            }
            if state
                .payments
                .values()
                .any(|p| p.loan_id == command.loan_id && p.week_number == command.week_number)
            {
                return Err(PortError::unique_violation(
                    "payments_loan_week_key",
                    format!("week {} of {} already paid", command.week_number, command.loan_id),
                ));
            }

            state.last_payment_id += 1;
            let payment = Payment {
                id: PaymentId::new(state.last_payment_id),
                loan_id: command.loan_id,
                week_number: command.week_number,
                amount: command.amount,
                idempotency_key: command.idempotency_key,
                paid_at: command.paid_at,
            };
            state.payments.insert(payment.id, payment.clone());
            Ok(payment)
        }

        async fn find_payment_by_idempotency_key(
            &self,
            loan_id: LoanId,
            idempotency_key: &str,
        ) -> Result<Option<Payment>, PortError> {
            self.check_fault(op::FIND_PAYMENT_BY_IDEMPOTENCY_KEY).await?;
            Ok(self
                .state()
                .read()
                .await
                .payments
                .values()
                .find(|p| p.loan_id == loan_id && p.idempotency_key == idempotency_key)
                .cloned())
        }

        async fn list_payments_by_loan_id(&self, query: PaymentQuery) -> Result<Vec<Payment>, PortError> {
            self.check_fault(op::LIST_PAYMENTS_BY_LOAN_ID).await?;
            let state = self.state().read().await;
            let mut payments: Vec<_> = state
                .payments
                .values()
                .filter(|p| p.loan_id == query.loan_id)
                .filter(|p| match query.after {
                    Some(after) => (p.paid_at, p.id) > (after.paid_at, after.id),
                    None => true,
                })
                .cloned()
                .collect();
            payments.sort_by_key(|p| (p.paid_at, p.id));
            payments.truncate(query.limit as usize);
            Ok(payments)
        }

        async fn create_loan_schedules(&self, entries: Vec<NewScheduleEntry>) -> Result<u64, PortError> {
            self.check_fault(op::CREATE_LOAN_SCHEDULES).await?;
            let mut state = self.state().write().await;

            for (index, entry) in entries.iter().enumerate() {
                let clashes_stored = state
                    .schedules
                    .values()
                    .any(|s| s.loan_id == entry.loan_id && s.sequence == entry.sequence);
                let clashes_batch = entries[..index]
                    .iter()
                    .any(|e| e.loan_id == entry.loan_id && e.sequence == entry.sequence);
                if clashes_stored || clashes_batch {
                    return Err(PortError::unique_violation(
                        "schedules_loan_id_sequence_key",
                        format!("sequence {} of {} already scheduled", entry.sequence, entry.loan_id),
                    ));
                }
            }

            let inserted = entries.len() as u64;
            for entry in entries {
                state.last_schedule_id += 1;
                let id = ScheduleId::new(state.last_schedule_id);
                state.schedules.insert(
                    id,
                    ScheduleEntry {
                        id,
                        loan_id: entry.loan_id,
                        sequence: entry.sequence,
                        due_date: entry.due_date,
                        amount: entry.amount,
                        paid_amount: 0,
                        status: ScheduleStatus::Pending,
                    },
                );
            }
            Ok(inserted)
        }

        async fn list_schedules_by_loan_id(&self, query: ScheduleQuery) -> Result<Vec<ScheduleEntry>, PortError> {
            self.check_fault(op::LIST_SCHEDULES_BY_LOAN_ID).await?;
            let after = query.after.map_or(0, |cursor| cursor.sequence);
            let state = self.state().read().await;
            let mut entries: Vec<_> = state
                .schedules
                .values()
                .filter(|s| s.loan_id == query.loan_id && s.sequence > after)
                .cloned()
                .collect();
            entries.sort_by_key(|s| s.sequence);
            entries.truncate(query.limit as usize);
            Ok(entries)
        }

        async fn update_schedule_payment(&self, id: ScheduleId, paid_amount: i64) -> Result<ScheduleEntry, PortError> {
            self.check_fault(op::UPDATE_SCHEDULE_PAYMENT).await?;
            let mut state = self.state().write().await;
            let entry = state
                .schedules
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Schedule", id))?;
            entry.paid_amount = paid_amount;
            entry.status = if paid_amount >= entry.amount {
                ScheduleStatus::Paid
            } else {
                ScheduleStatus::Pending
            };
            Ok(entry.clone())
        }

        async fn get_schedule_by_sequence(&self, loan_id: LoanId, sequence: u32) -> Result<ScheduleEntry, PortError> {
            self.check_fault(op::GET_SCHEDULE_BY_SEQUENCE).await?;
            self.state()
                .read()
                .await
                .schedules
                .values()
                .find(|s| s.loan_id == loan_id && s.sequence == sequence)
                .cloned()
                .ok_or_else(|| PortError::not_found("Schedule", format!("{}#{}", loan_id, sequence)))
        }
    }
}
