//! Tests for core_kernel error types

use std::time::Duration;

use core_kernel::error::CoreError;
use core_kernel::PortError;

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");

    match error {
        CoreError::Validation(msg) => assert_eq!(msg, "Invalid input"),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_core_error_invalid_cursor_display() {
    let error = CoreError::invalid_cursor("bad base64");
    assert_eq!(error.to_string(), "Invalid cursor: bad base64");
}

#[test]
fn test_port_error_internal_keeps_source() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
    let error = PortError::internal_with_source("query failed", io);

    let source = std::error::Error::source(&error).expect("source should be kept");
    assert!(source.to_string().contains("socket closed"));
}

#[test]
fn test_port_error_classification_is_by_variant() {
    let errors = vec![
        PortError::not_found("Loan", 1),
        PortError::unique_violation("payments_idempotency_key_key", "dup"),
        PortError::timeout("InsertPayment", Duration::from_secs(2)),
        PortError::connection("refused"),
        PortError::internal("boom"),
    ];

    let not_found = errors.iter().filter(|e| e.is_not_found()).count();
    let unique = errors.iter().filter(|e| e.is_unique_violation()).count();
    let timeouts = errors.iter().filter(|e| e.is_timeout()).count();
    let transient = errors.iter().filter(|e| e.is_transient()).count();

    assert_eq!(not_found, 1);
    assert_eq!(unique, 1);
    assert_eq!(timeouts, 1);
    assert_eq!(transient, 2);
}

#[test]
fn test_timeout_duration_saturates() {
    let error = PortError::timeout("huge", Duration::MAX);
    match error {
        PortError::Timeout { duration_ms, .. } => assert_eq!(duration_ms, u64::MAX),
        _ => panic!("Expected Timeout error"),
    }
}
