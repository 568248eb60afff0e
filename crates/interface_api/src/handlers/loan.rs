//! Loan handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::instrument;
use validator::Validate;

use core_kernel::LoanId;
use domain_billing::{LedgerRepository, SubmitPayment};

use crate::dto::*;
use crate::error::{ApiError, ApiResult};
use crate::middleware::IdempotencyKey;
use crate::AppState;

fn loan_id_from(path: Result<Path<String>, PathRejection>) -> ApiResult<LoanId> {
    let Path(raw) = path?;
    raw.parse().map_err(|_| ApiError::bad_request("Invalid loan id"))
}

/// Originates a loan and its weekly schedule
#[instrument(skip_all)]
pub async fn submit_loan<R: LedgerRepository>(
    State(state): State<AppState<R>>,
    payload: Result<Json<SubmitLoanRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitLoanResponse>)> {
    let Json(request) = payload?;
    request.validate()?;

    let loan = state.ledger.submit_loan(request.into_terms()?).await?;
    Ok((StatusCode::CREATED, Json(SubmitLoanResponse::from(&loan))))
}

/// Loan detail, including whether it is delinquent right now
pub async fn get_loan<R: LedgerRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<LoanDetailResponse>> {
    let loan_id = loan_id_from(path)?;

    let loan = state.ledger.get_loan_by_id(loan_id).await?;
    let is_delinquent = state.ledger.is_delinquent(loan.id, Utc::now()).await?;

    Ok(Json(LoanDetailResponse::new(&loan, is_delinquent)))
}

pub async fn get_outstanding<R: LedgerRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<OutstandingResponse>> {
    let loan_id = loan_id_from(path)?;
    let outstanding = state.ledger.get_outstanding(loan_id).await?;
    Ok(Json(OutstandingResponse { loan_id, outstanding }))
}

/// Posts one weekly installment
///
/// The whole call is bounded by the configured payment budget on top of the
/// per-step repository deadlines. Running out of it drops the in-flight
/// unit of work, which rolls it back.
#[instrument(skip_all, fields(idempotency_key = %key.0))]
pub async fn submit_payment<R: LedgerRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
    key: IdempotencyKey,
    payload: Result<Json<SubmitPaymentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitPaymentResponse>)> {
    let loan_id = loan_id_from(path)?;
    let Json(request) = payload?;
    request.validate()?;

    let budget = state.config.payment_timeout();
    let submit = state
        .ledger
        .submit_payment(SubmitPayment::new(loan_id, request.amount, key.0));

    let payment = tokio::time::timeout(budget, submit)
        .await
        .map_err(|_| ApiError::Timeout(format!("payment for {} exceeded {}ms", loan_id, budget.as_millis())))??;

    Ok((StatusCode::CREATED, Json(SubmitPaymentResponse::from(&payment))))
}

pub async fn list_payments<R: LedgerRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<ListPaymentResponse>> {
    let loan_id = loan_id_from(path)?;
    let Query(params) = params?;
    let limit = state.config.clamp_limit(params.requested_limit());

    let page = state
        .ledger
        .list_payments(loan_id, limit, params.cursor.as_deref())
        .await?;
    Ok(Json(ListPaymentResponse::from(page)))
}

pub async fn list_schedules<R: LedgerRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<ListScheduleResponse>> {
    let loan_id = loan_id_from(path)?;
    let Query(params) = params?;
    let limit = state.config.clamp_limit(params.requested_limit());

    let page = state
        .ledger
        .list_schedules(loan_id, limit, params.cursor.as_deref())
        .await?;
    Ok(Json(ListScheduleResponse::from(page)))
}
