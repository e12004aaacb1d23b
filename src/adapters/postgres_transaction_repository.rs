//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::pool_manager::{PoolManager, QueryIntent};
use crate::domain::{
    AuditEntry, Page, PageRequest, Transaction, TransactionFilter, TransactionStatus,
    TransitionRequest,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::TransactionRepository;
use crate::utils::cursor::Cursor;

const TRANSACTION_COLUMNS: &str = "transaction_id, gateway, payment_mode, base_amount, fee_amount, \
     total_amount, status, gateway_transaction_id, gateway_response, created_at, updated_at";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pools: PoolManager,
}

impl PostgresTransactionRepository {
    pub fn new(pools: PoolManager) -> Self {
        Self { pools }
    }

    async fn insert_audit(
        executor: &mut sqlx::Transaction<'_, Postgres>,
        entry: &AuditEntry,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO payment_transaction_audit (
                id, transaction_id, action, old_status, new_status, actor, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.transaction_id)
        .bind(entry.action.as_str())
        .bind(entry.old_status.map(|s| s.as_str()))
        .bind(entry.new_status.as_str())
        .bind(&entry.actor)
        .bind(entry.recorded_at)
        .execute(&mut **executor)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> LedgerResult<Transaction> {
        let id = tx.transaction_id.as_str();
        let mut db_tx = self
            .pools
            .primary()
            .begin()
            .await
            .map_err(|e| LedgerError::from_sqlx(e, id))?;

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO payment_transactions (
                transaction_id, gateway, payment_mode, base_amount, fee_amount,
                total_amount, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(&tx.transaction_id)
        .bind(&tx.gateway)
        .bind(&tx.payment_mode)
        .bind(&tx.base_amount)
        .bind(&tx.fee_amount)
        .bind(&tx.total_amount)
        .bind(tx.status.as_str())
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(|e| LedgerError::from_sqlx(e, id))?;

        let inserted = row.into_domain()?;

        Self::insert_audit(&mut db_tx, &AuditEntry::created(&inserted))
            .await
            .map_err(|e| LedgerError::from_sqlx(e, id))?;

        db_tx.commit().await.map_err(|e| LedgerError::from_sqlx(e, id))?;
        Ok(inserted)
    }

    async fn find(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM payment_transactions WHERE transaction_id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(self.pools.get_pool(QueryIntent::Write))
        .await
        .map_err(|e| LedgerError::from_sqlx(e, transaction_id))?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn compare_and_set_status(
        &self,
        transaction_id: &str,
        expected: TransactionStatus,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Transaction>> {
        let mut db_tx = self
            .pools
            .primary()
            .begin()
            .await
            .map_err(|e| LedgerError::from_sqlx(e, transaction_id))?;

        // The status predicate makes this the single serialization point for racing callbacks.
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE payment_transactions
            SET status = $3,
                gateway_transaction_id = $4,
                gateway_response = $5,
                updated_at = $6
            WHERE transaction_id = $1 AND status = $2
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(transaction_id)
        .bind(expected.as_str())
        .bind(request.new_status.as_str())
        .bind(&request.gateway_transaction_id)
        .bind(&request.gateway_response)
        .bind(now)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(|e| LedgerError::from_sqlx(e, transaction_id))?;

        let Some(row) = row else {
            db_tx
                .rollback()
                .await
                .map_err(|e| LedgerError::from_sqlx(e, transaction_id))?;
            return Ok(None);
        };

        let updated = row.into_domain()?;
        Self::insert_audit(&mut db_tx, &AuditEntry::status_changed(expected, &updated))
            .await
            .map_err(|e| LedgerError::from_sqlx(e, transaction_id))?;

        db_tx
            .commit()
            .await
            .map_err(|e| LedgerError::from_sqlx(e, transaction_id))?;
        Ok(Some(updated))
    }

    async fn list(&self, filter: &TransactionFilter, page: &PageRequest) -> LedgerResult<Page> {
        let limit = page.limit as usize;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM payment_transactions WHERE TRUE",
            TRANSACTION_COLUMNS
        ));
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(gateway) = &filter.gateway {
            qb.push(" AND gateway = ").push_bind(gateway.clone());
        }
        if let Some(mode) = &filter.payment_mode {
            qb.push(" AND payment_mode = ").push_bind(mode.clone());
        }
        if let Some(after) = &page.after {
            qb.push(" AND (created_at, transaction_id COLLATE \"C\") > (")
                .push_bind(after.created_at)
                .push(", ")
                .push_bind(after.transaction_id.clone())
                .push(")");
        }
        qb.push(" ORDER BY created_at ASC, transaction_id COLLATE \"C\" ASC LIMIT ")
            .push_bind(limit as i64 + 1);

        let rows = qb
            .build_query_as::<TransactionRow>()
            .fetch_all(self.pools.get_pool(list_intent(filter)))
            .await
            .map_err(LedgerError::from)?;

        let mut items = rows
            .into_iter()
            .map(TransactionRow::into_domain)
            .collect::<LedgerResult<Vec<_>>>()?;

        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|tx| Cursor::of(tx).encode())
        } else {
            None
        };

        Ok(Page { items, next_cursor })
    }

    async fn history(&self, transaction_id: &str) -> LedgerResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, transaction_id, action, old_status, new_status, actor, recorded_at
            FROM payment_transaction_audit
            WHERE transaction_id = $1
            ORDER BY recorded_at ASC, seq ASC
            "#,
        )
        .bind(transaction_id)
        // An empty trail means NotFound, so a lagging replica must not answer.
        .fetch_all(self.pools.get_pool(QueryIntent::ReadLatest))
        .await
        .map_err(|e| LedgerError::from_sqlx(e, transaction_id))?;

        rows.into_iter().map(AuditRow::into_domain).collect()
    }
}

/// A status filter promises no record in another status, which a lagging
/// replica cannot keep; only unfiltered-by-status listings may use it.
fn list_intent(filter: &TransactionFilter) -> QueryIntent {
    if filter.status.is_some() {
        QueryIntent::ReadLatest
    } else {
        QueryIntent::Read
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    transaction_id: String,
    gateway: String,
    payment_mode: String,
    base_amount: bigdecimal::BigDecimal,
    fee_amount: bigdecimal::BigDecimal,
    total_amount: bigdecimal::BigDecimal,
    status: String,
    gateway_transaction_id: Option<String>,
    gateway_response: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> LedgerResult<Transaction> {
        Ok(Transaction {
            status: parse_status(&self.status)?,
            transaction_id: self.transaction_id,
            gateway: self.gateway,
            payment_mode: self.payment_mode,
            base_amount: self.base_amount,
            fee_amount: self.fee_amount,
            total_amount: self.total_amount,
            gateway_transaction_id: self.gateway_transaction_id,
            gateway_response: self.gateway_response,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    transaction_id: String,
    action: String,
    old_status: Option<String>,
    new_status: String,
    actor: String,
    recorded_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_domain(self) -> LedgerResult<AuditEntry> {
        Ok(AuditEntry {
            id: self.id,
            transaction_id: self.transaction_id,
            action: self
                .action
                .parse()
                .map_err(|e| LedgerError::Storage(format!("corrupt audit row: {}", e)))?,
            old_status: self.old_status.as_deref().map(parse_status).transpose()?,
            new_status: parse_status(&self.new_status)?,
            actor: self.actor,
            recorded_at: self.recorded_at,
        })
    }
}

fn parse_status(raw: &str) -> LedgerResult<TransactionStatus> {
    raw.parse()
        .map_err(|e| LedgerError::Storage(format!("corrupt status '{}': {}", raw, e)))
}
