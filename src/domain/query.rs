//! Listing filters and keyset pages.

use serde::{Deserialize, Serialize};

use super::{Transaction, TransactionStatus};
use crate::utils::cursor::Cursor;

pub const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    pub gateway: Option<String>,
    pub payment_mode: Option<String>,
}

impl TransactionFilter {
    pub fn by_status(status: TransactionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.status.map_or(true, |s| s == tx.status)
            && self.gateway.as_deref().map_or(true, |g| g == tx.gateway)
            && self
                .payment_mode
                .as_deref()
                .map_or(true, |m| m == tx.payment_mode)
    }
}

/// Position and size of one page. `after` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub after: Option<Cursor>,
}

impl PageRequest {
    pub fn first(limit: u32) -> Self {
        Self { limit, after: None }
    }

    pub fn after(limit: u32, cursor: Cursor) -> Self {
        Self {
            limit,
            after: Some(cursor),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<Transaction>,
    /// Encoded cursor to resume from; `None` once the listing is exhausted.
    pub next_cursor: Option<String>,
}
