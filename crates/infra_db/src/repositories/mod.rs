//! SQL access for the ledger tables
//!
//! Query functions are generic over [`sqlx::PgExecutor`] so the same SQL runs
//! against the pool or inside an open transaction. Rows are mapped to domain
//! types here and nowhere else.

pub mod ledger;
