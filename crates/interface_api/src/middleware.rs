//! API middleware and request extractors

use std::time::Instant;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderName},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::error::ApiError;

pub const IDEMPOTENCY_KEY_HEADER: HeaderName = HeaderName::from_static("x-idempotency-key");
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Request logging middleware
///
/// Records method, path, status and latency for every request.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        request_id = %request_id,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "http_request"
    );

    response
}

/// The caller-chosen key that makes a payment post safe to retry
///
/// Extraction fails with 400 when the `X-Idempotency-Key` header is missing
/// or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(&IDEMPOTENCY_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApiError::bad_request("Request failed due to not providing X-Idempotency-Key"))?;

        Ok(IdempotencyKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    async fn extract(request: HttpRequest<()>) -> Result<IdempotencyKey, ApiError> {
        let (mut parts, _) = request.into_parts();
        IdempotencyKey::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_key_is_read_from_header() {
        let request = HttpRequest::builder()
            .header("X-Idempotency-Key", " req-42 ")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap(), IdempotencyKey("req-42".to_string()));
    }

    #[tokio::test]
    async fn test_missing_or_blank_key_is_rejected() {
        let missing = HttpRequest::builder().body(()).unwrap();
        assert!(matches!(extract(missing).await, Err(ApiError::BadRequest(_))));

        let blank = HttpRequest::builder()
            .header("X-Idempotency-Key", "   ")
            .body(())
            .unwrap();
        assert!(matches!(extract(blank).await, Err(ApiError::BadRequest(_))));
    }
}
