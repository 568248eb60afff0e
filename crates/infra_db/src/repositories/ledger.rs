//! Loan, schedule and payment queries

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgExecutor, Postgres, QueryBuilder};

use core_kernel::{LoanId, PaymentId, ScheduleId};
use domain_billing::{
    CreateLoanCommand, CreatePaymentCommand, Loan, NewScheduleEntry, Payment, PaymentQuery,
    ScheduleEntry, ScheduleQuery, ScheduleStatus,
};

use crate::error::DatabaseError;

const LOAN_COLUMNS: &str = "id, principal_amount, annual_interest_rate, total_interest_amount, \
     total_payable_amount, weekly_payment_amount, total_weeks, start_date, created_at";
const SCHEDULE_COLUMNS: &str = "id, loan_id, sequence, due_date, amount, paid_amount, status";
const PAYMENT_COLUMNS: &str = "id, loan_id, week_number, amount, idempotency_key, paid_at";

/// Database row for a loan
#[derive(Debug, Clone, FromRow)]
pub struct LoanRow {
    pub id: i64,
    pub principal_amount: i64,
    pub annual_interest_rate: Decimal,
    pub total_interest_amount: i64,
    pub total_payable_amount: i64,
    pub weekly_payment_amount: i64,
    pub total_weeks: i32,
    pub start_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl LoanRow {
    pub fn into_domain(self) -> Result<Loan, DatabaseError> {
        Ok(Loan {
            id: LoanId::new(self.id),
            principal_amount: self.principal_amount,
            annual_interest_rate: self.annual_interest_rate,
            total_interest_amount: self.total_interest_amount,
            total_payable_amount: self.total_payable_amount,
            weekly_payment_amount: self.weekly_payment_amount,
            total_weeks: from_db_int(self.total_weeks, "total_weeks")?,
            start_date: self.start_date,
            created_at: self.created_at,
        })
    }
}

/// Database row for a schedule entry
#[derive(Debug, Clone, FromRow)]
pub struct ScheduleRow {
    pub id: i64,
    pub loan_id: i64,
    pub sequence: i32,
    pub due_date: NaiveDate,
    pub amount: i64,
    pub paid_amount: i64,
    pub status: String,
}

impl ScheduleRow {
    pub fn into_domain(self) -> Result<ScheduleEntry, DatabaseError> {
        let status: ScheduleStatus = self
            .status
            .parse()
            .map_err(|e: core_kernel::CoreError| DatabaseError::Decode(e.to_string()))?;
        Ok(ScheduleEntry {
            id: ScheduleId::new(self.id),
            loan_id: LoanId::new(self.loan_id),
            sequence: from_db_int(self.sequence, "sequence")?,
            due_date: self.due_date,
            amount: self.amount,
            paid_amount: self.paid_amount,
            status,
        })
    }
}

/// Database row for a payment
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: i64,
    pub loan_id: i64,
    pub week_number: i32,
    pub amount: i64,
    pub idempotency_key: String,
    pub paid_at: DateTime<Utc>,
}

impl PaymentRow {
    pub fn into_domain(self) -> Result<Payment, DatabaseError> {
        Ok(Payment {
            id: PaymentId::new(self.id),
            loan_id: LoanId::new(self.loan_id),
            week_number: from_db_int(self.week_number, "week_number")?,
            amount: self.amount,
            idempotency_key: self.idempotency_key,
            paid_at: self.paid_at,
        })
    }
}

fn from_db_int(value: i32, column: &str) -> Result<u32, DatabaseError> {
    u32::try_from(value).map_err(|_| DatabaseError::Decode(format!("negative {}: {}", column, value)))
}

fn to_db_int(value: u32, column: &str) -> Result<i32, DatabaseError> {
    i32::try_from(value).map_err(|_| DatabaseError::Decode(format!("{} out of range: {}", column, value)))
}

/// Fetches a loan; `lock` adds `FOR UPDATE` and only makes sense inside a transaction
pub async fn fetch_loan<'e, E>(executor: E, id: LoanId, lock: bool) -> Result<Loan, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {} FROM loans WHERE id = $1{}",
        LOAN_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, LoanRow>(&sql)
        .bind(id.value())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Loan", id))?
        .into_domain()
}

pub async fn insert_loan<'e, E>(executor: E, command: &CreateLoanCommand) -> Result<Loan, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO loans (principal_amount, annual_interest_rate, total_interest_amount, \
         total_payable_amount, weekly_payment_amount, total_weeks, start_date) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
        LOAN_COLUMNS
    );
    sqlx::query_as::<_, LoanRow>(&sql)
        .bind(command.principal_amount)
        .bind(command.annual_interest_rate)
        .bind(command.total_interest_amount)
        .bind(command.total_payable_amount)
        .bind(command.weekly_payment_amount)
        .bind(to_db_int(command.total_weeks, "total_weeks")?)
        .bind(command.start_date)
        .fetch_one(executor)
        .await?
        .into_domain()
}

pub async fn total_paid_amount<'e, E>(executor: E, loan_id: LoanId) -> Result<i64, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments WHERE loan_id = $1",
    )
    .bind(loan_id.value())
    .fetch_one(executor)
    .await?;
    Ok(total)
}

pub async fn paid_weeks_count<'e, E>(executor: E, loan_id: LoanId) -> Result<u32, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments WHERE loan_id = $1")
        .bind(loan_id.value())
        .fetch_one(executor)
        .await?;
    u32::try_from(count).map_err(|_| DatabaseError::Decode(format!("payment count out of range: {}", count)))
}

pub async fn last_paid_week<'e, E>(executor: E, loan_id: LoanId) -> Result<u32, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let week = sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(MAX(week_number), 0) FROM payments WHERE loan_id = $1",
    )
    .bind(loan_id.value())
    .fetch_one(executor)
    .await?;
    from_db_int(week, "week_number")
}

pub async fn insert_payment<'e, E>(executor: E, command: &CreatePaymentCommand) -> Result<Payment, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO payments (loan_id, week_number, amount, idempotency_key, paid_at) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {}",
        PAYMENT_COLUMNS
    );
    sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(command.loan_id.value())
        .bind(to_db_int(command.week_number, "week_number")?)
        .bind(command.amount)
        .bind(&command.idempotency_key)
        .bind(command.paid_at)
        .fetch_one(executor)
        .await?
        .into_domain()
}

pub async fn find_payment_by_idempotency_key<'e, E>(
    executor: E,
    loan_id: LoanId,
    idempotency_key: &str,
) -> Result<Option<Payment>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {} FROM payments WHERE loan_id = $1 AND idempotency_key = $2",
        PAYMENT_COLUMNS
    );
    sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(loan_id.value())
        .bind(idempotency_key)
        .fetch_optional(executor)
        .await?
        .map(PaymentRow::into_domain)
        .transpose()
}

/// Keyset page of payments ordered by `(paid_at, id)`
pub async fn list_payments<'e, E>(executor: E, query: &PaymentQuery) -> Result<Vec<Payment>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {} FROM payments \
         WHERE loan_id = $1 AND ($2::timestamptz IS NULL OR (paid_at, id) > ($2, $3)) \
         ORDER BY paid_at, id LIMIT $4",
        PAYMENT_COLUMNS
    );
    sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(query.loan_id.value())
        .bind(query.after.map(|c| c.paid_at))
        .bind(query.after.map(|c| c.id.value()))
        .bind(i64::from(query.limit))
        .fetch_all(executor)
        .await?
        .into_iter()
        .map(PaymentRow::into_domain)
        .collect()
}

/// Inserts all entries with one multi-row `INSERT`
pub async fn insert_schedules<'e, E>(executor: E, entries: &[NewScheduleEntry]) -> Result<u64, DatabaseError>
where
    E: PgExecutor<'e>,
{
    if entries.is_empty() {
        return Ok(0);
    }

    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        rows.push((entry, to_db_int(entry.sequence, "sequence")?));
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO schedules (loan_id, sequence, due_date, amount, paid_amount, status) ");
    builder.push_values(rows, |mut row, (entry, sequence)| {
        row.push_bind(entry.loan_id.value())
            .push_bind(sequence)
            .push_bind(entry.due_date)
            .push_bind(entry.amount)
            .push_bind(0_i64)
            .push_bind(ScheduleStatus::Pending.as_str());
    });

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

/// Keyset page of schedule entries ordered by `sequence`
pub async fn list_schedules<'e, E>(executor: E, query: &ScheduleQuery) -> Result<Vec<ScheduleEntry>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let after = query.after.map_or(0, |c| c.sequence);
    let sql = format!(
        "SELECT {} FROM schedules WHERE loan_id = $1 AND sequence > $2 ORDER BY sequence LIMIT $3",
        SCHEDULE_COLUMNS
    );
    sqlx::query_as::<_, ScheduleRow>(&sql)
        .bind(query.loan_id.value())
        .bind(to_db_int(after, "sequence")?)
        .bind(i64::from(query.limit))
        .fetch_all(executor)
        .await?
        .into_iter()
        .map(ScheduleRow::into_domain)
        .collect()
}

/// Sets the paid amount; the entry flips to `PAID` once the installment is covered
pub async fn update_schedule_payment<'e, E>(
    executor: E,
    id: ScheduleId,
    paid_amount: i64,
) -> Result<ScheduleEntry, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE schedules \
         SET paid_amount = $2, \
             status = CASE WHEN $2 >= amount THEN 'PAID' ELSE 'PENDING' END, \
             updated_at = NOW() \
         WHERE id = $1 RETURNING {}",
        SCHEDULE_COLUMNS
    );
    sqlx::query_as::<_, ScheduleRow>(&sql)
        .bind(id.value())
        .bind(paid_amount)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Schedule", id))?
        .into_domain()
}

pub async fn fetch_schedule_by_sequence<'e, E>(
    executor: E,
    loan_id: LoanId,
    sequence: u32,
) -> Result<ScheduleEntry, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {} FROM schedules WHERE loan_id = $1 AND sequence = $2",
        SCHEDULE_COLUMNS
    );
    sqlx::query_as::<_, ScheduleRow>(&sql)
        .bind(loan_id.value())
        .bind(to_db_int(sequence, "sequence")?)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Schedule", format!("{}#{}", loan_id, sequence)))?
        .into_domain()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_row_maps_status() {
        let row = ScheduleRow {
            id: 3,
            loan_id: 1,
            sequence: 2,
            due_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            amount: 100,
            paid_amount: 100,
            status: "PAID".to_string(),
        };
        let entry = row.into_domain().unwrap();
        assert_eq!(entry.status, ScheduleStatus::Paid);
        assert_eq!(entry.sequence, 2);
    }

    #[test]
    fn test_unknown_status_is_decode_error() {
        let row = ScheduleRow {
            id: 3,
            loan_id: 1,
            sequence: 2,
            due_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            amount: 100,
            paid_amount: 0,
            status: "LATE".to_string(),
        };
        assert!(matches!(row.into_domain(), Err(DatabaseError::Decode(_))));
    }

    #[test]
    fn test_negative_week_is_rejected() {
        assert!(from_db_int(-1, "week_number").is_err());
        assert_eq!(to_db_int(7, "sequence").unwrap(), 7);
        assert!(to_db_int(u32::MAX, "sequence").is_err());
    }
}
