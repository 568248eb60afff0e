//! PostgreSQL Ledger Adapter
//!
//! `PostgresLedgerAdapter` implements [`LedgerRepository`]. A handle is
//! either bound to the pool or to one open transaction:
//!
//! - pool-bound handles run every call on whichever connection the pool
//!   hands out
//! - [`LedgerRepository::with_tx`] begins a transaction and passes the work
//!   a transaction-bound clone; all calls made through it share the
//!   transaction until the work returns
//!
//! `lock_loan` reads the loan row `FOR UPDATE`, so two payments for the same
//! loan queue behind each other and the second one counts the first one's
//! week. `get_loan_by_id` takes no row lock, so balance and delinquency
//! reads never wait on a payment being posted.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use core_kernel::{
    AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, LoanId, PortError, ScheduleId,
    TimeoutPolicy,
};
use domain_billing::ports::op;
use domain_billing::{
    CreateLoanCommand, CreatePaymentCommand, LedgerRepository, Loan, NewScheduleEntry, Payment,
    PaymentQuery, ScheduleEntry, ScheduleQuery,
};

use crate::error::DatabaseError;
use crate::repositories::ledger as queries;

type SharedTx = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

#[derive(Clone)]
enum Scope {
    Pool(PgPool),
    Tx(SharedTx),
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Pool(_) => f.write_str("Pool"),
            Scope::Tx(_) => f.write_str("Tx"),
        }
    }
}

/// Runs a query against the handle's pool or its open transaction
macro_rules! on_conn {
    ($adapter:expr, $conn:ident => $query:expr) => {
        match &$adapter.scope {
            Scope::Pool(pool) => {
                let $conn = pool;
                $query.await
            }
            Scope::Tx(shared) => {
                let mut guard = shared.lock().await;
                match guard.as_mut() {
                    Some(tx) => {
                        let $conn = &mut **tx;
                        $query.await
                    }
                    None => Err(DatabaseError::TransactionFailed(
                        "transaction already finished".to_string(),
                    )),
                }
            }
        }
    };
}

/// PostgreSQL-backed implementation of the LedgerRepository port
#[derive(Debug, Clone)]
pub struct PostgresLedgerAdapter {
    pool: PgPool,
    scope: Scope,
    timeouts: TimeoutPolicy,
}

impl PostgresLedgerAdapter {
    /// Creates a pool-bound adapter with the default deadlines
    pub fn new(pool: PgPool) -> Self {
        Self::with_timeouts(pool, TimeoutPolicy::default())
    }

    pub fn with_timeouts(pool: PgPool, timeouts: TimeoutPolicy) -> Self {
        Self {
            scope: Scope::Pool(pool.clone()),
            pool,
            timeouts,
        }
    }

    /// Returns true when this handle is bound to an open transaction
    pub fn in_transaction(&self) -> bool {
        matches!(self.scope, Scope::Tx(_))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn rollback(tx: Option<Transaction<'static, Postgres>>) {
    if let Some(tx) = tx {
        match tx.rollback().await {
            Ok(()) => debug!("transaction rolled back"),
            Err(e) => warn!(error = %e, "rollback failed"),
        }
    }
}

impl DomainPort for PostgresLedgerAdapter {}

#[async_trait]
impl HealthCheckable for PostgresLedgerAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(_) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
        };
        HealthCheckResult {
            adapter_id: "postgres-ledger-adapter".to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl LedgerRepository for PostgresLedgerAdapter {
    type Tx = PostgresLedgerAdapter;

    async fn with_tx<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<PortError> + Send + 'static,
        F: FnOnce(Self::Tx) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if self.in_transaction() {
            return work(self.clone()).await;
        }

        let tx = self
            .timeouts
            .run("begin_transaction", 1, async {
                self.pool.begin().await.map_err(DatabaseError::from)
            })
            .await?;
        debug!("transaction opened");

        let shared: SharedTx = Arc::new(Mutex::new(Some(tx)));
        let handle = Self {
            scope: Scope::Tx(Arc::clone(&shared)),
            ..self.clone()
        };

        let outcome = AssertUnwindSafe(work(handle)).catch_unwind().await;
        let tx = shared.lock().await.take();

        match outcome {
            Ok(Ok(value)) => {
                if let Some(tx) = tx {
                    self.timeouts
                        .run("commit_transaction", 1, async move {
                            tx.commit().await.map_err(DatabaseError::from)
                        })
                        .await?;
                    debug!("transaction committed");
                }
                Ok(value)
            }
            Ok(Err(error)) => {
                rollback(tx).await;
                Err(error)
            }
            Err(panic) => {
                rollback(tx).await;
                std::panic::resume_unwind(panic)
            }
        }
    }

    #[instrument(skip(self), fields(loan_id = %id))]
    async fn get_loan_by_id(&self, id: LoanId) -> Result<Loan, PortError> {
        self.timeouts
            .run(op::GET_LOAN_BY_ID, 1, async {
                on_conn!(self, conn => queries::fetch_loan(conn, id, false))
            })
            .await
    }

    #[instrument(skip(self), fields(loan_id = %id))]
    async fn lock_loan(&self, id: LoanId) -> Result<Loan, PortError> {
        self.timeouts
            .run(op::LOCK_LOAN, 1, async {
                on_conn!(self, conn => queries::fetch_loan(conn, id, true))
            })
            .await
    }

    #[instrument(skip(self, command), fields(weeks = command.total_weeks))]
    async fn insert_loan(&self, command: CreateLoanCommand) -> Result<Loan, PortError> {
        self.timeouts
            .run(op::INSERT_LOAN, 1, async {
                on_conn!(self, conn => queries::insert_loan(conn, &command))
            })
            .await
    }

    #[instrument(skip(self), fields(loan_id = %loan_id))]
    async fn get_total_paid_amount(&self, loan_id: LoanId) -> Result<i64, PortError> {
        self.timeouts
            .run(op::GET_TOTAL_PAID_AMOUNT, 1, async {
                on_conn!(self, conn => queries::total_paid_amount(conn, loan_id))
            })
            .await
    }

    #[instrument(skip(self), fields(loan_id = %loan_id))]
    async fn get_paid_weeks_count(&self, loan_id: LoanId) -> Result<u32, PortError> {
        self.timeouts
            .run(op::GET_PAID_WEEKS_COUNT, 1, async {
                on_conn!(self, conn => queries::paid_weeks_count(conn, loan_id))
            })
            .await
    }

    #[instrument(skip(self), fields(loan_id = %loan_id))]
    async fn get_last_paid_week(&self, loan_id: LoanId) -> Result<u32, PortError> {
        self.timeouts
            .run(op::GET_LAST_PAID_WEEK, 1, async {
                on_conn!(self, conn => queries::last_paid_week(conn, loan_id))
            })
            .await
    }

    #[instrument(skip(self, command), fields(loan_id = %command.loan_id, week = command.week_number))]
    async fn insert_payment(&self, command: CreatePaymentCommand) -> Result<Payment, PortError> {
        self.timeouts
            .run(op::INSERT_PAYMENT, 1, async {
                on_conn!(self, conn => queries::insert_payment(conn, &command))
            })
            .await
    }

    #[instrument(skip(self, idempotency_key), fields(loan_id = %loan_id))]
    async fn find_payment_by_idempotency_key(
        &self,
        loan_id: LoanId,
        idempotency_key: &str,
    ) -> Result<Option<Payment>, PortError> {
        self.timeouts
            .run(op::FIND_PAYMENT_BY_IDEMPOTENCY_KEY, 1, async {
                on_conn!(self, conn => queries::find_payment_by_idempotency_key(conn, loan_id, idempotency_key))
            })
            .await
    }

    #[instrument(skip(self, query), fields(loan_id = %query.loan_id, limit = query.limit))]
    async fn list_payments_by_loan_id(&self, query: PaymentQuery) -> Result<Vec<Payment>, PortError> {
        self.timeouts
            .run(op::LIST_PAYMENTS_BY_LOAN_ID, query.limit as usize, async {
                on_conn!(self, conn => queries::list_payments(conn, &query))
            })
            .await
    }

    #[instrument(skip(self, entries), fields(rows = entries.len()))]
    async fn create_loan_schedules(&self, entries: Vec<NewScheduleEntry>) -> Result<u64, PortError> {
        self.timeouts
            .run(op::CREATE_LOAN_SCHEDULES, entries.len(), async {
                on_conn!(self, conn => queries::insert_schedules(conn, &entries))
            })
            .await
    }

    #[instrument(skip(self, query), fields(loan_id = %query.loan_id, limit = query.limit))]
    async fn list_schedules_by_loan_id(&self, query: ScheduleQuery) -> Result<Vec<ScheduleEntry>, PortError> {
        self.timeouts
            .run(op::LIST_SCHEDULES_BY_LOAN_ID, query.limit as usize, async {
                on_conn!(self, conn => queries::list_schedules(conn, &query))
            })
            .await
    }

    #[instrument(skip(self), fields(schedule_id = %id))]
    async fn update_schedule_payment(&self, id: ScheduleId, paid_amount: i64) -> Result<ScheduleEntry, PortError> {
        self.timeouts
            .run(op::UPDATE_SCHEDULE_PAYMENT, 1, async {
                on_conn!(self, conn => queries::update_schedule_payment(conn, id, paid_amount))
            })
            .await
    }

    #[instrument(skip(self), fields(loan_id = %loan_id))]
    async fn get_schedule_by_sequence(&self, loan_id: LoanId, sequence: u32) -> Result<ScheduleEntry, PortError> {
        self.timeouts
            .run(op::GET_SCHEDULE_BY_SEQUENCE, 1, async {
                on_conn!(self, conn => queries::fetch_schedule_by_sequence(conn, loan_id, sequence))
            })
            .await
    }
}
