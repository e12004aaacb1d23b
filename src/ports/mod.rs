//! Storage port for the ledger.
//! Adapters own durability and atomicity; status rules live in `services::ledger`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AuditEntry, Page, PageRequest, Transaction, TransactionFilter, TransactionStatus, TransitionRequest};
use crate::error::LedgerResult;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Persists a new record together with its `created` audit entry.
    /// Fails with `DuplicateKey` when the id is taken; the stored record is left untouched.
    async fn insert(&self, tx: &Transaction) -> LedgerResult<Transaction>;

    async fn find(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>>;

    /// Applies `request` only if the stored status still equals `expected`.
    /// Returns `None` when the record is missing or its status moved on.
    async fn compare_and_set_status(
        &self,
        transaction_id: &str,
        expected: TransactionStatus,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Transaction>>;

    /// One page in `(created_at, transaction_id)` order, strictly after `page.after`.
    async fn list(&self, filter: &TransactionFilter, page: &PageRequest) -> LedgerResult<Page>;

    /// Audit entries for one record, oldest first.
    async fn history(&self, transaction_id: &str) -> LedgerResult<Vec<AuditEntry>>;
}
