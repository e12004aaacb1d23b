//! The ledger store: sole writer of transaction records.
//!
//! Validation and the status machine live here; atomicity is delegated to the
//! repository's insert and compare-and-set primitives. Every repository call is
//! bounded by `operation_timeout` and reports `StorageTimeout` when it expires.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::Stream;
use tracing::{debug, info, warn};

use crate::domain::transaction::validate_transition_request;
use crate::domain::{
    AuditEntry, NewTransaction, Page, PageRequest, Transaction, TransactionFilter,
    TransactionStatus, TransitionRequest,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::TransactionRepository;
use crate::utils::cursor;
use crate::validation;

/// Compare-and-set rounds before a still-pending record is reported as a storage fault.
const MAX_TRANSITION_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct LedgerSettings {
    pub operation_timeout: Duration,
    pub list_max_limit: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(5),
            list_max_limit: 100,
        }
    }
}

#[derive(Clone)]
pub struct LedgerStore {
    repository: Arc<dyn TransactionRepository>,
    settings: LedgerSettings,
}

impl LedgerStore {
    pub fn new(repository: Arc<dyn TransactionRepository>, settings: LedgerSettings) -> Self {
        Self {
            repository,
            settings,
        }
    }

    pub fn settings(&self) -> LedgerSettings {
        self.settings
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> LedgerResult<T>
    where
        F: Future<Output = LedgerResult<T>>,
    {
        match tokio::time::timeout(self.settings.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.settings.operation_timeout.as_millis() as u64,
                    "Ledger operation timed out"
                );
                Err(LedgerError::StorageTimeout(format!(
                    "{} exceeded {:?}",
                    operation, self.settings.operation_timeout
                )))
            }
        }
    }

    /// Records a new `pending` transaction. The total is always computed here.
    pub async fn create(&self, input: NewTransaction) -> LedgerResult<Transaction> {
        let tx = Transaction::new(input, Utc::now())?;

        let created = self
            .bounded("create", self.repository.insert(&tx))
            .await
            .map_err(|e| {
                if let LedgerError::DuplicateKey(_) = &e {
                    warn!(transaction_id = %tx.transaction_id, "Duplicate transaction id rejected");
                }
                e
            })?;

        info!(
            transaction_id = %created.transaction_id,
            gateway = %created.gateway,
            payment_mode = %created.payment_mode,
            total_amount = %created.total_amount,
            "Transaction created"
        );
        Ok(created)
    }

    /// Moves a `pending` transaction to a terminal status.
    ///
    /// Redelivering the same settlement returns the stored record untouched;
    /// a different terminal status fails with `ConflictingTransition`.
    pub async fn transition(
        &self,
        transaction_id: &str,
        request: TransitionRequest,
    ) -> LedgerResult<Transaction> {
        validate_transition_request(&request)?;

        if !request.new_status.is_terminal() {
            let current = self.get(transaction_id).await?;
            warn!(transaction_id, from = %current.status, "Transition back to pending rejected");
            return Err(LedgerError::InvalidTransition {
                transaction_id: transaction_id.to_string(),
                from: current.status,
                to: request.new_status,
            });
        }

        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let applied = self
                .bounded(
                    "transition",
                    self.repository.compare_and_set_status(
                        transaction_id,
                        TransactionStatus::Pending,
                        &request,
                        Utc::now(),
                    ),
                )
                .await?;

            if let Some(updated) = applied {
                info!(transaction_id, status = %updated.status, "Transaction settled");
                return Ok(updated);
            }

            let current = self
                .bounded("transition", self.repository.find(transaction_id))
                .await?
                .ok_or_else(|| LedgerError::NotFound(transaction_id.to_string()))?;

            if current.status.is_terminal() {
                return match current.check_replay(&request) {
                    Ok(()) => {
                        debug!(transaction_id, status = %current.status, "Idempotent transition replay");
                        Ok(current)
                    }
                    Err(e) => {
                        warn!(transaction_id, error = %e, "Transition rejected");
                        Err(e)
                    }
                };
            }
        }

        Err(LedgerError::Storage(format!(
            "transaction {} changed concurrently during transition",
            transaction_id
        )))
    }

    pub async fn get(&self, transaction_id: &str) -> LedgerResult<Transaction> {
        self.bounded("get", self.repository.find(transaction_id))
            .await?
            .ok_or_else(|| LedgerError::NotFound(transaction_id.to_string()))
    }

    /// One page of matching transactions, oldest first.
    /// `cursor` is the `next_cursor` of a previous page.
    pub async fn list(
        &self,
        filter: &TransactionFilter,
        limit: u32,
        cursor: Option<&str>,
    ) -> LedgerResult<Page> {
        let after = cursor
            .map(|raw| {
                cursor::decode(raw).map_err(|message| LedgerError::Validation {
                    field: "cursor",
                    message,
                })
            })
            .transpose()?;
        let page = PageRequest {
            limit: self.clamp_limit(limit),
            after,
        };
        self.list_page(filter, &page).await
    }

    pub async fn list_page(&self, filter: &TransactionFilter, page: &PageRequest) -> LedgerResult<Page> {
        let filter = normalize_filter(filter)?;
        self.bounded("list", self.repository.list(&filter, page)).await
    }

    /// Lazily walks every matching transaction, fetching `page_size` rows at a time.
    ///
    /// Each page is a separate bounded read, so the stream can be dropped and
    /// resumed later from the last seen record with `list`.
    pub fn stream(
        &self,
        filter: TransactionFilter,
        page_size: u32,
    ) -> impl Stream<Item = LedgerResult<Transaction>> + Send + 'static {
        let store = self.clone();
        let limit = self.clamp_limit(page_size);

        async_stream::try_stream! {
            let mut page = PageRequest::first(limit);
            loop {
                let batch = store.list_page(&filter, &page).await?;
                let next = batch.next_cursor.clone();
                for tx in batch.items {
                    yield tx;
                }
                match next {
                    Some(raw) => {
                        let after = cursor::decode(&raw)
                            .map_err(|e| LedgerError::Storage(format!("bad cursor from store: {}", e)))?;
                        page = PageRequest::after(limit, after);
                    }
                    None => break,
                }
            }
        }
    }

    /// Audit trail for one transaction, oldest first.
    pub async fn history(&self, transaction_id: &str) -> LedgerResult<Vec<AuditEntry>> {
        let entries = self
            .bounded("history", self.repository.history(transaction_id))
            .await?;
        if entries.is_empty() {
            // Every stored record has a creation entry, so empty means unknown.
            return Err(LedgerError::NotFound(transaction_id.to_string()));
        }
        Ok(entries)
    }

    fn clamp_limit(&self, limit: u32) -> u32 {
        limit.clamp(1, self.settings.list_max_limit.max(1))
    }
}

fn normalize_filter(filter: &TransactionFilter) -> LedgerResult<TransactionFilter> {
    Ok(TransactionFilter {
        status: filter.status,
        gateway: filter
            .gateway
            .as_deref()
            .map(validation::normalize_gateway)
            .transpose()?,
        payment_mode: filter
            .payment_mode
            .as_deref()
            .map(validation::normalize_payment_mode)
            .transpose()?,
    })
}
