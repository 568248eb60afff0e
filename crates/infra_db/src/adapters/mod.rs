//! Domain Adapters
//!
//! Implementations of domain ports on top of the PostgreSQL layer. An
//! adapter translates port calls into repository queries, applies the
//! per-call deadline and converts [`crate::DatabaseError`] into
//! `PortError`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerAdapter;
//! use domain_billing::BillingLedger;
//!
//! let ledger = BillingLedger::new(PostgresLedgerAdapter::new(pool));
//! let loan = ledger.get_loan_by_id(loan_id).await?;
//! ```

pub mod ledger;

pub use ledger::PostgresLedgerAdapter;
