//! Keyset cursors and pages for loan history listings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{decode_cursor, encode_cursor, LoanId, PaymentId};

use crate::error::BillingError;
use crate::payment::Payment;
use crate::schedule::ScheduleEntry;

/// Resume position in a payment listing ordered by `(paid_at, id)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCursor {
    pub paid_at: DateTime<Utc>,
    pub id: PaymentId,
}

impl From<&Payment> for PaymentCursor {
    fn from(payment: &Payment) -> Self {
        Self {
            paid_at: payment.paid_at,
            id: payment.id,
        }
    }
}

/// Resume position in a schedule listing ordered by `sequence`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleCursor {
    pub sequence: u32,
}

impl From<&ScheduleEntry> for ScheduleCursor {
    fn from(entry: &ScheduleEntry) -> Self {
        Self { sequence: entry.sequence }
    }
}

/// Repository query for one page of payments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentQuery {
    pub loan_id: LoanId,
    pub limit: u32,
    /// `None` starts from the beginning
    pub after: Option<PaymentCursor>,
}

/// Repository query for one page of schedule entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleQuery {
    pub loan_id: LoanId,
    pub limit: u32,
    pub after: Option<ScheduleCursor>,
}

/// One page of a listing plus the opaque token for the next one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Builds a page from the rows a repository returned for `limit`
    ///
    /// A full page is taken as a hint that more rows follow, so the next
    /// cursor points at the last row. A short page ends the listing.
    pub fn from_rows<K, F>(items: Vec<T>, limit: u32, key: F) -> Result<Self, BillingError>
    where
        K: Serialize,
        F: Fn(&T) -> K,
    {
        let full = limit > 0 && items.len() == limit as usize;
        let next_cursor = match items.last() {
            Some(last) if full => Some(encode_cursor(&key(last))?),
            _ => None,
        };
        Ok(Self { items, next_cursor })
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Decodes a client-supplied payment cursor
pub fn parse_payment_cursor(raw: Option<&str>) -> Result<Option<PaymentCursor>, BillingError> {
    Ok(decode_cursor(raw)?)
}

/// Decodes a client-supplied schedule cursor
pub fn parse_schedule_cursor(raw: Option<&str>) -> Result<Option<ScheduleCursor>, BillingError> {
    Ok(decode_cursor(raw)?)
}
