//! Deterministic demo records, loadable any number of times.

use anyhow::Context;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::domain::{NewTransaction, TransactionStatus, TransitionRequest};
use crate::error::{LedgerError, LedgerResult};
use crate::services::LedgerStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRecord {
    pub transaction_id: String,
    pub gateway: String,
    pub payment_mode: String,
    pub base_amount: BigDecimal,
    pub fee_amount: BigDecimal,
    #[serde(default = "pending")]
    pub status: TransactionStatus,
    #[serde(default)]
    pub gateway_transaction_id: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
}

fn pending() -> TransactionStatus {
    TransactionStatus::Pending
}

impl SeedRecord {
    fn new_transaction(&self) -> NewTransaction {
        NewTransaction::new(
            self.transaction_id.clone(),
            self.gateway.clone(),
            self.payment_mode.clone(),
            self.base_amount.clone(),
            self.fee_amount.clone(),
        )
    }

    fn transition_request(&self) -> TransitionRequest {
        TransitionRequest {
            new_status: self.status,
            gateway_transaction_id: self.gateway_transaction_id.clone(),
            gateway_response: self.gateway_response.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

/// The built-in example set: one settled, one pending and one failed payment.
pub fn default_seeds() -> Vec<SeedRecord> {
    let amount = |s: &str| BigDecimal::from_str(s).unwrap_or_default();

    vec![
        SeedRecord {
            transaction_id: "seed_txn_001".to_string(),
            gateway: "Razorpay".to_string(),
            payment_mode: "upi".to_string(),
            base_amount: amount("1500.00"),
            fee_amount: amount("0.00"),
            status: TransactionStatus::Success,
            gateway_transaction_id: Some("pay_seed_razorpay_001".to_string()),
            gateway_response: Some(r#"{"status":"captured","method":"upi"}"#.to_string()),
        },
        SeedRecord {
            transaction_id: "seed_txn_002".to_string(),
            gateway: "PayU".to_string(),
            payment_mode: "debit_card".to_string(),
            base_amount: amount("9300.00"),
            fee_amount: amount("46.00"),
            status: TransactionStatus::Pending,
            gateway_transaction_id: None,
            gateway_response: None,
        },
        SeedRecord {
            transaction_id: "seed_txn_003".to_string(),
            gateway: "Cashfree".to_string(),
            payment_mode: "netbanking".to_string(),
            base_amount: amount("12000.00"),
            fee_amount: amount("90.00"),
            status: TransactionStatus::Failed,
            gateway_transaction_id: Some("cf_seed_003".to_string()),
            gateway_response: Some(r#"{"status":"FAILED","reason":"bank_declined"}"#.to_string()),
        },
    ]
}

/// Reads seeds from a JSON array of records.
pub fn load_seed_file(path: &Path) -> anyhow::Result<Vec<SeedRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid seed file {}", path.display()))
}

pub struct SeedLoader<'a> {
    ledger: &'a LedgerStore,
}

impl<'a> SeedLoader<'a> {
    pub fn new(ledger: &'a LedgerStore) -> Self {
        Self { ledger }
    }

    /// Creates each seed and settles it to its target status.
    ///
    /// Seeds whose id already exists are skipped, but a terminal seed left
    /// `pending` by an earlier interrupted run is still settled. Any other
    /// failure aborts the batch.
    pub async fn load(&self, seeds: &[SeedRecord]) -> LedgerResult<SeedReport> {
        let mut report = SeedReport::default();

        for seed in seeds {
            match self.ledger.create(seed.new_transaction()).await {
                Ok(_) => {}
                Err(LedgerError::DuplicateKey(id)) => {
                    if seed.status.is_terminal() {
                        self.settle_existing(seed).await?;
                    }
                    info!(transaction_id = %id, "Seed already present, skipping");
                    report.skipped.push(id);
                    continue;
                }
                Err(e) => return Err(e),
            }

            if seed.status.is_terminal() {
                self.ledger
                    .transition(&seed.transaction_id, seed.transition_request())
                    .await?;
            }

            report.created.push(seed.transaction_id.clone());
        }

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            "Seed load finished"
        );
        Ok(report)
    }

    async fn settle_existing(&self, seed: &SeedRecord) -> LedgerResult<()> {
        match self
            .ledger
            .transition(&seed.transaction_id, seed.transition_request())
            .await
        {
            Ok(_) => Ok(()),
            Err(e @ (LedgerError::ConflictingTransition { .. } | LedgerError::InvalidTransition { .. })) => {
                warn!(
                    transaction_id = %seed.transaction_id,
                    error = %e,
                    "Existing record diverges from seed, leaving it as is"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
