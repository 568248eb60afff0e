//! HTTP surface tests against the in-memory repository

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use chrono::Utc;
use serde_json::{json, Value};
use tracing_subscriber::{reload, EnvFilter, Registry};

use domain_billing::ports::mock::MockLedgerRepository;
use domain_billing::ports::op;
use domain_billing::BillingLedger;
use interface_api::config::ApiConfig;
use interface_api::dto::{
    ListPaymentResponse, ListScheduleResponse, LoanDetailResponse, OutstandingResponse,
    StatusResponse, SubmitLoanResponse, SubmitPaymentResponse,
};
use interface_api::telemetry::LogLevelControl;
use interface_api::{create_router, AppState};
use test_utils::LoanBuilder;

const IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("x-idempotency-key");

fn server(repo: &MockLedgerRepository) -> TestServer {
    let state = AppState::new(BillingLedger::new(repo.clone()), ApiConfig::default());
    TestServer::new(create_router(state)).unwrap()
}

fn five_week_loan() -> Value {
    json!({
        "principal_amount": 5_000_000,
        "annual_interest_rate": "0.10",
        "total_weeks": 5,
        "start_date": "2025-01-06"
    })
}

async fn create_loan(server: &TestServer) -> SubmitLoanResponse {
    let response = server.post("/loan").json(&five_week_loan()).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<SubmitLoanResponse>()
}

async fn pay(server: &TestServer, loan_id: i64, amount: i64, key: &str) -> TestResponse {
    server
        .post(&format!("/loan/{}/payment", loan_id))
        .add_header(IDEMPOTENCY_KEY, HeaderValue::from_str(key).unwrap())
        .json(&json!({ "amount": amount }))
        .await
}

fn error_kind(response: &TestResponse) -> String {
    response.json::<Value>()["error"].as_str().unwrap_or_default().to_string()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_liveness_and_readiness() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);

        let live = server.get("/health").await;
        live.assert_status_ok();
        assert_eq!(live.json::<Value>()["status"], "healthy");

        let ready = server.get("/health/ready").await;
        ready.assert_status_ok();
        assert_eq!(ready.json::<Value>()["status"], "ready");
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);

        let response = server.get("/health").await;
        assert!(response.headers().contains_key("x-request-id"));
    }
}

mod loans {
    use super::*;

    #[tokio::test]
    async fn test_submit_loan_returns_installment_terms() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);

        let created = create_loan(&server).await;
        assert_eq!(created.weekly_payment_amount, 1_100_000);
        assert_eq!(created.total_payable, 5_500_000);
        assert_eq!(repo.schedules_for(created.loan_id).await.len(), 5);
    }

    #[tokio::test]
    async fn test_submit_loan_rejects_bad_input() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);

        let indivisible = server
            .post("/loan")
            .json(&json!({
                "principal_amount": 1_000_000,
                "annual_interest_rate": 0,
                "total_weeks": 3,
                "start_date": "2025-01-06"
            }))
            .await;
        indivisible.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(&indivisible), "invalid_loan_terms");

        let mut body = five_week_loan();
        body["start_date"] = json!("06/01/2025");
        let bad_date = server.post("/loan").json(&body).await;
        bad_date.assert_status(StatusCode::BAD_REQUEST);

        let mut body = five_week_loan();
        body["total_weeks"] = json!(0);
        let zero_weeks = server.post("/loan").json(&body).await;
        zero_weeks.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(&zero_weeks), "validation_error");

        let malformed = server.post("/loan").text("{not json").await;
        malformed.assert_status(StatusCode::BAD_REQUEST);

        assert_eq!(repo.loan_count().await, 0);
    }

    #[tokio::test]
    async fn test_get_loan_reports_delinquency() {
        let repo = MockLedgerRepository::new();
        let loan = repo
            .seed_loan(LoanBuilder::new().with_id(7).created_days_before(Utc::now(), 28).build())
            .await;
        let server = server(&repo);

        let response = server.get(&format!("/loan/{}", loan.id.value())).await;
        response.assert_status_ok();

        let detail = response.json::<LoanDetailResponse>();
        assert_eq!(detail.loan_id, loan.id);
        assert_eq!(detail.total_weeks, 50);
        assert!(detail.is_delinquent);
    }

    #[tokio::test]
    async fn test_fresh_loan_is_not_delinquent() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let created = create_loan(&server).await;

        let detail = server
            .get(&format!("/loan/{}", created.loan_id.value()))
            .await
            .json::<LoanDetailResponse>();
        assert!(!detail.is_delinquent);
        assert_eq!(detail.start_date, "2025-01-06");
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_loan_ids() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);

        let missing = server.get("/loan/404").await;
        missing.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(error_kind(&missing), "loan_not_found");

        server.get("/loan/404/outstanding").await.assert_status(StatusCode::NOT_FOUND);
        server.get("/loan/abc").await.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_prefixed_loan_id_is_accepted() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let created = create_loan(&server).await;

        server
            .get(&format!("/loan/{}", created.loan_id))
            .await
            .assert_status_ok();
    }
}

mod payments {
    use super::*;

    #[tokio::test]
    async fn test_payment_settles_next_week_and_reduces_outstanding() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let loan = create_loan(&server).await;
        let id = loan.loan_id.value();

        let first = pay(&server, id, 1_100_000, "req-1").await;
        first.assert_status(StatusCode::CREATED);
        assert_eq!(first.json::<SubmitPaymentResponse>().week_number, 1);

        let second = pay(&server, id, 1_100_000, "req-2").await;
        assert_eq!(second.json::<SubmitPaymentResponse>().week_number, 2);

        let outstanding = server
            .get(&format!("/loan/{}/outstanding", id))
            .await
            .json::<OutstandingResponse>();
        assert_eq!(outstanding.outstanding, 3_300_000);
    }

    #[tokio::test]
    async fn test_retry_with_same_key_is_acknowledged_once() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let loan = create_loan(&server).await;
        let id = loan.loan_id.value();

        pay(&server, id, 1_100_000, "req-1").await.assert_status(StatusCode::CREATED);

        let retry = pay(&server, id, 1_100_000, "req-1").await;
        retry.assert_status_ok();
        let body = retry.json::<StatusResponse>();
        assert_eq!(body.status, "success");
        assert_eq!(body.message, "payment already processed");

        assert_eq!(repo.payments_for(loan.loan_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_idempotency_key_is_rejected() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let loan = create_loan(&server).await;

        let response = server
            .post(&format!("/loan/{}/payment", loan.loan_id.value()))
            .json(&json!({ "amount": 1_100_000 }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(repo.payments_for(loan.loan_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_amount_is_rejected() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let loan = create_loan(&server).await;
        let id = loan.loan_id.value();

        let partial = pay(&server, id, 500_000, "req-1").await;
        partial.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(&partial), "invalid_payment_amount");

        let zero = pay(&server, id, 0, "req-2").await;
        zero.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(&zero), "validation_error");
    }

    #[tokio::test]
    async fn test_paying_a_closed_loan_conflicts() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let loan = create_loan(&server).await;
        let id = loan.loan_id.value();

        for week in 1..=5 {
            pay(&server, id, 1_100_000, &format!("req-{}", week))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let extra = pay(&server, id, 1_100_000, "req-6").await;
        extra.assert_status(StatusCode::CONFLICT);

        let retry = pay(&server, id, 1_100_000, "req-5").await;
        retry.assert_status_ok();
        assert_eq!(retry.json::<StatusResponse>().message, "payment already processed");
        assert_eq!(repo.payments_for(loan.loan_id).await.len(), 5);

        let outstanding = server
            .get(&format!("/loan/{}/outstanding", id))
            .await
            .json::<OutstandingResponse>();
        assert_eq!(outstanding.outstanding, 0);
    }

    #[tokio::test]
    async fn test_repository_timeout_maps_to_gateway_timeout() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let loan = create_loan(&server).await;
        repo.time_out_on(op::INSERT_PAYMENT).await;

        let response = pay(&server, loan.loan_id.value(), 1_100_000, "req-1").await;
        response.assert_status(StatusCode::GATEWAY_TIMEOUT);
        assert!(repo.payments_for(loan.loan_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal_error() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let loan = create_loan(&server).await;
        repo.fail_on(op::UPDATE_SCHEDULE_PAYMENT).await;

        let response = pay(&server, loan.loan_id.value(), 1_100_000, "req-1").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json::<Value>()["message"], "Internal server error");
        assert!(repo.payments_for(loan.loan_id).await.is_empty());
    }
}

mod listings {
    use super::*;

    #[tokio::test]
    async fn test_payment_pages_follow_cursor() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let loan = create_loan(&server).await;
        let id = loan.loan_id.value();
        for week in 1..=3 {
            pay(&server, id, 1_100_000, &format!("req-{}", week)).await;
        }

        let first = server
            .get(&format!("/loan/{}/payment", id))
            .add_query_param("limit", 2)
            .await
            .json::<ListPaymentResponse>();
        assert_eq!(first.payments.len(), 2);
        assert_eq!(first.payments[0].week_number, 1);
        let cursor = first.next_cursor.expect("more payments remain");

        let second = server
            .get(&format!("/loan/{}/payment", id))
            .add_query_param("limit", 2)
            .add_query_param("cursor", &cursor)
            .await
            .json::<ListPaymentResponse>();
        assert_eq!(second.payments.len(), 1);
        assert_eq!(second.payments[0].week_number, 3);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_schedule_limit_is_clamped_to_default() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let loan = create_loan(&server).await;
        let id = loan.loan_id.value();
        pay(&server, id, 1_100_000, "req-1").await;

        for limit in ["0", "-1", "1000"] {
            let page = server
                .get(&format!("/loan/{}/schedule", id))
                .add_query_param("limit", limit)
                .await
                .json::<ListScheduleResponse>();
            assert_eq!(page.schedules.len(), 5);
            assert!(page.next_cursor.is_none());
            assert_eq!(page.schedules[0].status, "PAID");
            assert_eq!(page.schedules[0].paid_amount, 1_100_000);
            assert_eq!(page.schedules[1].status, "PENDING");
            assert_eq!(page.schedules[1].due_date, "2025-01-20");
        }
    }

    #[tokio::test]
    async fn test_schedule_pages_follow_cursor() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let loan = create_loan(&server).await;
        let path = format!("/loan/{}/schedule", loan.loan_id.value());

        let first = server
            .get(&path)
            .add_query_param("limit", 3)
            .await
            .json::<ListScheduleResponse>();
        let sequences: Vec<u32> = first.schedules.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);

        let second = server
            .get(&path)
            .add_query_param("limit", 3)
            .add_query_param("cursor", first.next_cursor.unwrap())
            .await
            .json::<ListScheduleResponse>();
        let sequences: Vec<u32> = second.schedules.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![4, 5]);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_invalid_cursor_is_rejected() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);
        let loan = create_loan(&server).await;

        let response = server
            .get(&format!("/loan/{}/payment", loan.loan_id.value()))
            .add_query_param("cursor", "%%%not-base64")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(&response), "invalid_cursor");
    }

    #[tokio::test]
    async fn test_unknown_loan_lists_nothing() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);

        let page = server.get("/loan/999/payment").await.json::<ListPaymentResponse>();
        assert!(page.payments.is_empty());
        assert!(page.next_cursor.is_none());
    }
}

mod admin {
    use super::*;

    #[tokio::test]
    async fn test_log_level_can_be_changed_at_runtime() {
        let repo = MockLedgerRepository::new();
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        let control = LogLevelControl::new(handle);
        let state = AppState::new(BillingLedger::new(repo.clone()), ApiConfig::default())
            .with_log_control(control.clone());
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server
            .post("/loan/admin/log-level")
            .add_query_param("level", "debug")
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<StatusResponse>().message, "Log level changed to DEBUG");
        assert!(control.current().unwrap().contains("debug"));

        server
            .post("/loan/admin/log-level")
            .add_query_param("level", "chatty")
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        drop(layer);
    }

    #[tokio::test]
    async fn test_log_level_without_control_is_an_error() {
        let repo = MockLedgerRepository::new();
        let server = server(&repo);

        server
            .post("/loan/admin/log-level")
            .add_query_param("level", "warn")
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
}
