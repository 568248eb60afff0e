//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! billing ledger test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built loan terms and timestamps
//! - `builders`: Builder patterns for loans and payments
//! - `database`: PostgreSQL container management
//! - `assertions`: Schedule and plan invariant checks
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
