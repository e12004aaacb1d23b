//! Transaction domain entity.
//! Storage-agnostic representation of a payment-gateway transaction and its status machine.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, LedgerResult};
use crate::validation::{self, ValidationError};

/// Fractional digits carried by every amount column (decimal(10,2)).
pub const AMOUNT_SCALE: i64 = 2;
/// Largest value representable in decimal(10,2), in minor units (99999999.99).
pub const MAX_AMOUNT_MINOR_UNITS: i64 = 9_999_999_999;
const MAX_INTEGER_DIGITS: i64 = 8;

pub fn max_amount() -> BigDecimal {
    BigDecimal::new(MAX_AMOUNT_MINOR_UNITS.into(), AMOUNT_SCALE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 4] = [
        TransactionStatus::Pending,
        TransactionStatus::Success,
        TransactionStatus::Failed,
        TransactionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// `pending` is the only state with outgoing edges, and every edge ends in a terminal state.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        *self == TransactionStatus::Pending && next.is_terminal()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ValidationError::new("status", "must be one of: pending, success, failed, cancelled")
            })
    }
}

/// Input for `LedgerStore::create`. The total is never part of the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub transaction_id: String,
    pub gateway: String,
    pub payment_mode: String,
    pub base_amount: BigDecimal,
    pub fee_amount: BigDecimal,
}

impl NewTransaction {
    pub fn new(
        transaction_id: impl Into<String>,
        gateway: impl Into<String>,
        payment_mode: impl Into<String>,
        base_amount: BigDecimal,
        fee_amount: BigDecimal,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            gateway: gateway.into(),
            payment_mode: payment_mode.into(),
            base_amount,
            fee_amount,
        }
    }
}

/// Requested move out of `pending`, as delivered by a gateway callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub new_status: TransactionStatus,
    pub gateway_transaction_id: Option<String>,
    pub gateway_response: Option<String>,
}

impl TransitionRequest {
    pub fn new(new_status: TransactionStatus) -> Self {
        Self {
            new_status,
            gateway_transaction_id: None,
            gateway_response: None,
        }
    }

    pub fn with_gateway_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.gateway_transaction_id = Some(id.into());
        self
    }

    pub fn with_gateway_response(mut self, response: impl Into<String>) -> Self {
        self.gateway_response = Some(response.into());
        self
    }
}

/// Domain entity representing a ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub gateway: String,
    pub payment_mode: String,
    pub base_amount: BigDecimal,
    pub fee_amount: BigDecimal,
    pub total_amount: BigDecimal,
    pub status: TransactionStatus,
    pub gateway_transaction_id: Option<String>,
    pub gateway_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds a validated `pending` record with `total_amount` derived from its parts.
    pub fn new(input: NewTransaction, now: DateTime<Utc>) -> LedgerResult<Self> {
        validation::validate_transaction_id(&input.transaction_id)?;
        let gateway = validation::normalize_gateway(&input.gateway)?;
        let payment_mode = validation::normalize_payment_mode(&input.payment_mode)?;

        let base_amount = normalize_amount("base_amount", &input.base_amount)?;
        let fee_amount = normalize_amount("fee_amount", &input.fee_amount)?;
        let total_amount = normalize_amount("total_amount", &(&base_amount + &fee_amount))?;

        Ok(Self {
            transaction_id: input.transaction_id,
            gateway,
            payment_mode,
            base_amount,
            fee_amount,
            total_amount,
            status: TransactionStatus::Pending,
            gateway_transaction_id: None,
            gateway_response: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the record as it looks once `request` is applied at `now`.
    pub fn settled(&self, request: &TransitionRequest, now: DateTime<Utc>) -> Self {
        Self {
            status: request.new_status,
            gateway_transaction_id: request.gateway_transaction_id.clone(),
            gateway_response: request.gateway_response.clone(),
            updated_at: now,
            ..self.clone()
        }
    }

    /// Decides what a transition request means for a record that is already terminal.
    ///
    /// An identical replay is accepted, a different terminal status is a conflict,
    /// and anything else is rejected as an invalid transition.
    pub fn check_replay(&self, request: &TransitionRequest) -> LedgerResult<()> {
        if !self.status.is_terminal() {
            return Ok(());
        }

        if self.status != request.new_status {
            return Err(LedgerError::ConflictingTransition {
                transaction_id: self.transaction_id.clone(),
                current: self.status,
                requested: request.new_status,
            });
        }

        if self.gateway_transaction_id == request.gateway_transaction_id
            && self.gateway_response == request.gateway_response
        {
            return Ok(());
        }

        Err(LedgerError::InvalidTransition {
            transaction_id: self.transaction_id.clone(),
            from: self.status,
            to: request.new_status,
        })
    }

    pub fn has_consistent_total(&self) -> bool {
        self.total_amount == &self.base_amount + &self.fee_amount
    }
}

/// Checks a caller-supplied amount and pins it to two fractional digits.
///
/// The raw digits and exponent are bounded before any rescaling, so inputs such
/// as `1e9223372036854775807` are rejected without building huge integers.
pub fn normalize_amount(field: &'static str, amount: &BigDecimal) -> LedgerResult<BigDecimal> {
    let (units, scale) = amount.as_bigint_and_exponent();
    let digits = units.to_string();

    if digits.starts_with('-') {
        return Err(LedgerError::InvalidAmount(format!("{} must not be negative", field)));
    }
    if digits == "0" {
        return Ok(BigDecimal::new(units, AMOUNT_SCALE));
    }

    let significant = digits.len() as i64;
    if significant.saturating_sub(scale) > MAX_INTEGER_DIGITS {
        return Err(exceeds_max(field));
    }
    // Nonzero digits below the second decimal place cannot all be trailing zeros.
    if scale > significant.saturating_add(AMOUNT_SCALE) {
        return Err(excess_precision(field));
    }

    let scaled = amount.with_scale(AMOUNT_SCALE);
    if scaled != *amount {
        return Err(excess_precision(field));
    }
    if scaled > max_amount() {
        return Err(exceeds_max(field));
    }

    Ok(scaled)
}

// Messages leave the raw value out: displaying an extreme exponent expands every digit.
fn exceeds_max(field: &'static str) -> LedgerError {
    LedgerError::InvalidAmount(format!("{} must not exceed {}", field, max_amount()))
}

fn excess_precision(field: &'static str) -> LedgerError {
    LedgerError::InvalidAmount(format!(
        "{} must have at most {} decimal places",
        field, AMOUNT_SCALE
    ))
}

pub fn validate_transition_request(request: &TransitionRequest) -> LedgerResult<()> {
    if let Some(id) = &request.gateway_transaction_id {
        validation::validate_gateway_transaction_id(id)?;
    }
    Ok(())
}
