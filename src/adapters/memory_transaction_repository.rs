//! In-process implementation of TransactionRepository.
//!
//! Records sit behind per-record async mutexes so transitions on different ids
//! proceed in parallel. Secondary indexes are ordered sets keyed by
//! `(created_at, transaction_id)`, giving logarithmic filtered scans in list order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, RwLock};

use crate::domain::{
    AuditEntry, Page, PageRequest, Transaction, TransactionFilter, TransactionStatus,
    TransitionRequest,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::TransactionRepository;
use crate::utils::cursor::Cursor;

type Slot = Arc<Mutex<Transaction>>;

#[derive(Default)]
struct Indexes {
    all: BTreeSet<Cursor>,
    by_status: HashMap<TransactionStatus, BTreeSet<Cursor>>,
    by_gateway: HashMap<String, BTreeSet<Cursor>>,
    by_payment_mode: HashMap<String, BTreeSet<Cursor>>,
}

impl Indexes {
    fn add(&mut self, tx: &Transaction) {
        let key = Cursor::of(tx);
        self.by_status.entry(tx.status).or_default().insert(key.clone());
        self.by_gateway
            .entry(tx.gateway.clone())
            .or_default()
            .insert(key.clone());
        self.by_payment_mode
            .entry(tx.payment_mode.clone())
            .or_default()
            .insert(key.clone());
        self.all.insert(key);
    }

    fn move_status(&mut self, tx: &Transaction, from: TransactionStatus) {
        let key = Cursor::of(tx);
        if let Some(set) = self.by_status.get_mut(&from) {
            set.remove(&key);
        }
        self.by_status.entry(tx.status).or_default().insert(key);
    }

    /// Candidate keys for `filter`, already in list order, at most `limit + 1` of them.
    fn scan(&self, filter: &TransactionFilter, after: Option<&Cursor>, limit: usize) -> Vec<Cursor> {
        let empty = BTreeSet::new();
        let status_set = filter.status.map(|s| self.by_status.get(&s).unwrap_or(&empty));
        let gateway_set = filter
            .gateway
            .as_ref()
            .map(|g| self.by_gateway.get(g).unwrap_or(&empty));
        let mode_set = filter
            .payment_mode
            .as_ref()
            .map(|m| self.by_payment_mode.get(m).unwrap_or(&empty));

        let constraints: Vec<&BTreeSet<Cursor>> =
            [status_set, gateway_set, mode_set].into_iter().flatten().collect();

        // Drive the scan from the smallest set and probe the others.
        let driver = constraints
            .iter()
            .copied()
            .min_by_key(|set| set.len())
            .unwrap_or(&self.all);

        let lower = match after {
            Some(cursor) => Bound::Excluded(cursor),
            None => Bound::Unbounded,
        };

        driver
            .range::<Cursor, _>((lower, Bound::Unbounded))
            .filter(|key| constraints.iter().all(|set| set.contains(*key)))
            .take(limit + 1)
            .cloned()
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTransactionRepository {
    records: Arc<RwLock<HashMap<String, Slot>>>,
    indexes: Arc<StdMutex<Indexes>>,
    audit: Arc<StdMutex<HashMap<String, Vec<AuditEntry>>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn slot(&self, transaction_id: &str) -> Option<Slot> {
        self.records.read().await.get(transaction_id).cloned()
    }

    fn with_indexes<R>(&self, f: impl FnOnce(&mut Indexes) -> R) -> LedgerResult<R> {
        let mut guard = self
            .indexes
            .lock()
            .map_err(|_| LedgerError::Storage("index lock poisoned".to_string()))?;
        Ok(f(&mut guard))
    }

    fn append_audit(&self, entry: AuditEntry) -> LedgerResult<()> {
        let mut guard = self
            .audit
            .lock()
            .map_err(|_| LedgerError::Storage("audit lock poisoned".to_string()))?;
        guard.entry(entry.transaction_id.clone()).or_default().push(entry);
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> LedgerResult<Transaction> {
        let mut records = self.records.write().await;
        if records.contains_key(&tx.transaction_id) {
            return Err(LedgerError::DuplicateKey(tx.transaction_id.clone()));
        }

        // Index and audit first so the record is never visible without them.
        self.with_indexes(|idx| idx.add(tx))?;
        self.append_audit(AuditEntry::created(tx))?;
        records.insert(tx.transaction_id.clone(), Arc::new(Mutex::new(tx.clone())));

        Ok(tx.clone())
    }

    async fn find(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>> {
        match self.slot(transaction_id).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn compare_and_set_status(
        &self,
        transaction_id: &str,
        expected: TransactionStatus,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Transaction>> {
        let Some(slot) = self.slot(transaction_id).await else {
            return Ok(None);
        };

        let mut record = slot.lock().await;
        if record.status != expected {
            return Ok(None);
        }

        let updated = record.settled(request, now);
        self.with_indexes(|idx| idx.move_status(&updated, expected))?;
        self.append_audit(AuditEntry::status_changed(expected, &updated))?;
        *record = updated.clone();

        Ok(Some(updated))
    }

    async fn list(&self, filter: &TransactionFilter, page: &PageRequest) -> LedgerResult<Page> {
        let limit = page.limit as usize;
        let mut keys = self.with_indexes(|idx| idx.scan(filter, page.after.as_ref(), limit))?;

        let has_more = keys.len() > limit;
        keys.truncate(limit);

        let mut items = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(tx) = self.find(&key.transaction_id).await? {
                // The index may trail a concurrent transition; the record is authoritative.
                if filter.matches(&tx) {
                    items.push(tx);
                }
            }
        }

        let next_cursor = if has_more {
            keys.last().map(Cursor::encode)
        } else {
            None
        };

        Ok(Page { items, next_cursor })
    }

    async fn history(&self, transaction_id: &str) -> LedgerResult<Vec<AuditEntry>> {
        let guard = self
            .audit
            .lock()
            .map_err(|_| LedgerError::Storage("audit lock poisoned".to_string()))?;
        Ok(guard.get(transaction_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewTransaction;
    use bigdecimal::BigDecimal;
    use chrono::Duration;

    fn record(id: &str, gateway: &str, mode: &str, offset_secs: i64) -> Transaction {
        let created = DateTime::<Utc>::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap();
        Transaction::new(
            NewTransaction::new(id, gateway, mode, BigDecimal::from(100), BigDecimal::from(1)),
            created,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_and_keeps_original() {
        let repo = InMemoryTransactionRepository::new();
        let original = record("txn_a", "Razorpay", "upi", 0);
        repo.insert(&original).await.unwrap();

        let clash = record("txn_a", "PayU", "netbanking", 5);
        let err = repo.insert(&clash).await.unwrap_err();

        assert!(matches!(err, LedgerError::DuplicateKey(id) if id == "txn_a"));
        assert_eq!(repo.find("txn_a").await.unwrap().unwrap(), original);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_held_record_does_not_block_other_ids() {
        let repo = InMemoryTransactionRepository::new();
        repo.insert(&record("txn_held", "PayU", "upi", 0)).await.unwrap();
        repo.insert(&record("txn_free", "PayU", "upi", 1)).await.unwrap();
        let request = TransitionRequest::new(TransactionStatus::Success);
        let now = Utc::now();
        let wait = std::time::Duration::from_millis(500);

        let slot = repo.slot("txn_held").await.unwrap();
        let guard = slot.lock().await;

        let found = tokio::time::timeout(wait, repo.find("txn_free")).await;
        assert!(matches!(found, Ok(Ok(Some(_)))));
        let settled = tokio::time::timeout(
            wait,
            repo.compare_and_set_status("txn_free", TransactionStatus::Pending, &request, now),
        )
        .await;
        assert!(matches!(settled, Ok(Ok(Some(_)))));

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            repo.compare_and_set_status("txn_held", TransactionStatus::Pending, &request, now),
        )
        .await;
        assert!(blocked.is_err());

        drop(guard);
        let released = repo
            .compare_and_set_status("txn_held", TransactionStatus::Pending, &request, now)
            .await
            .unwrap();
        assert!(released.is_some());
    }

    #[tokio::test]
    async fn test_compare_and_set_only_from_expected_state() {
        let repo = InMemoryTransactionRepository::new();
        let tx = record("txn_b", "Cashfree", "upi", 0);
        repo.insert(&tx).await.unwrap();

        let later = tx.created_at + Duration::seconds(30);
        let request = TransitionRequest::new(TransactionStatus::Failed);
        let updated = repo
            .compare_and_set_status("txn_b", TransactionStatus::Pending, &request, later)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, TransactionStatus::Failed);
        assert_eq!(updated.updated_at, later);

        let second = repo
            .compare_and_set_status("txn_b", TransactionStatus::Pending, &request, later)
            .await
            .unwrap();
        assert!(second.is_none());

        let missing = repo
            .compare_and_set_status("nope", TransactionStatus::Pending, &request, later)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_combines_indexes_in_creation_order() {
        let repo = InMemoryTransactionRepository::new();
        repo.insert(&record("t3", "PayU", "upi", 3)).await.unwrap();
        repo.insert(&record("t1", "PayU", "upi", 1)).await.unwrap();
        repo.insert(&record("t2", "Razorpay", "upi", 2)).await.unwrap();
        repo.insert(&record("t4", "PayU", "credit_card", 4)).await.unwrap();

        let filter = TransactionFilter {
            gateway: Some("PayU".to_string()),
            payment_mode: Some("upi".to_string()),
            ..TransactionFilter::default()
        };
        let page = repo.list(&filter, &PageRequest::first(10)).await.unwrap();

        let ids: Vec<_> = page.items.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t3"]);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_status_index_follows_transition() {
        let repo = InMemoryTransactionRepository::new();
        let tx = record("t1", "PayU", "upi", 1);
        repo.insert(&tx).await.unwrap();
        repo.compare_and_set_status(
            "t1",
            TransactionStatus::Pending,
            &TransitionRequest::new(TransactionStatus::Success),
            tx.created_at,
        )
        .await
        .unwrap();

        let pending = repo
            .list(&TransactionFilter::by_status(TransactionStatus::Pending), &PageRequest::first(10))
            .await
            .unwrap();
        let success = repo
            .list(&TransactionFilter::by_status(TransactionStatus::Success), &PageRequest::first(10))
            .await
            .unwrap();

        assert!(pending.items.is_empty());
        assert_eq!(success.items.len(), 1);
    }

    #[tokio::test]
    async fn test_history_records_each_write() {
        let repo = InMemoryTransactionRepository::new();
        let tx = record("t1", "PayU", "upi", 1);
        repo.insert(&tx).await.unwrap();
        repo.compare_and_set_status(
            "t1",
            TransactionStatus::Pending,
            &TransitionRequest::new(TransactionStatus::Cancelled),
            tx.created_at + Duration::seconds(1),
        )
        .await
        .unwrap();

        let history = repo.history("t1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].old_status, None);
        assert_eq!(history[1].old_status, Some(TransactionStatus::Pending));
        assert_eq!(history[1].new_status, TransactionStatus::Cancelled);
    }
}
