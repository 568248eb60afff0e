//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL implementation of the billing ledger's
//! repository port using SQLx.
//!
//! # Architecture
//!
//! - [`repositories`] holds the SQL, generic over any Postgres executor
//! - [`adapters`] implements `LedgerRepository` on top of it, including the
//!   unit of work and per-call deadlines
//! - [`pool`] creates the connection pool and applies migrations
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/billing")).await?;
//! run_migrations(&pool).await?;
//! let repo = PostgresLedgerAdapter::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresLedgerAdapter;
pub use error::DatabaseError;
pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
