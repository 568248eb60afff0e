//! Core Kernel - Foundational types for the billing ledger
//!
//! This crate provides the building blocks shared by the domain, the storage
//! adapter and the HTTP layer:
//! - Strongly-typed identifiers
//! - The port error channel and adapter marker traits
//! - The adaptive per-call timeout policy
//! - The opaque keyset cursor codec

pub mod identifiers;
pub mod ports;
pub mod timeout;
pub mod cursor;
pub mod error;

pub use identifiers::{LoanId, PaymentId, ScheduleId};
pub use ports::{PortError, DomainPort, AdapterHealth, HealthCheckResult, HealthCheckable};
pub use timeout::TimeoutPolicy;
pub use cursor::{encode_cursor, decode_cursor};
pub use error::CoreError;
