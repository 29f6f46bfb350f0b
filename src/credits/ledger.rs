//! Credit ledger

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Charge amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("Ledger storage error: {0}")]
    Storage(String),
}

/// Result of a conditional charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeReceipt {
    /// Whether the charge was applied
    pub ok: bool,
    /// Balance after the attempt
    pub new_balance: i64,
}

/// One applied charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRecord {
    pub organization_id: String,
    pub amount: i64,
    pub description: String,
    pub balance_after: i64,
    pub charged_at: DateTime<Utc>,
}

/// Per-organization credit balances
#[async_trait::async_trait]
pub trait CreditLedger: Send + Sync {
    /// Current balance
    async fn balance(&self, organization_id: &str) -> Result<i64, LedgerError>;

    /// Deduct `amount` only if the balance covers it
    ///
    /// The check and the deduction are one atomic step, so concurrent charges
    /// can never drive the balance below zero.
    async fn check_and_charge(
        &self,
        organization_id: &str,
        amount: i64,
        description: &str,
    ) -> Result<ChargeReceipt, LedgerError>;
}

/// Ledger held in memory
///
/// Organizations not seen before start at the configured default balance.
#[derive(Debug, Default)]
pub struct InMemoryCreditLedger {
    balances: DashMap<String, i64>,
    default_balance: i64,
    charges: Mutex<Vec<ChargeRecord>>,
}

impl InMemoryCreditLedger {
    /// Create a ledger where new organizations start at `default_balance`
    pub fn new(default_balance: i64) -> Self {
        Self {
            balances: DashMap::new(),
            default_balance,
            charges: Mutex::new(Vec::new()),
        }
    }

    /// Set an organization's balance
    pub fn set_balance(&self, organization_id: impl Into<String>, balance: i64) {
        self.balances.insert(organization_id.into(), balance);
    }

    /// Builder form of `set_balance`
    pub fn with_balance(self, organization_id: impl Into<String>, balance: i64) -> Self {
        self.set_balance(organization_id, balance);
        self
    }

    /// Every applied charge, oldest first
    pub fn charges(&self) -> Vec<ChargeRecord> {
        self.charges.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl CreditLedger for InMemoryCreditLedger {
    async fn balance(&self, organization_id: &str) -> Result<i64, LedgerError> {
        Ok(self
            .balances
            .get(organization_id)
            .map(|b| *b)
            .unwrap_or(self.default_balance))
    }

    async fn check_and_charge(
        &self,
        organization_id: &str,
        amount: i64,
        description: &str,
    ) -> Result<ChargeReceipt, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut balance = self
            .balances
            .entry(organization_id.to_string())
            .or_insert(self.default_balance);

        if *balance < amount {
            tracing::info!(
                "[CreditLedger] Refused charge of {} for {} (balance {})",
                amount,
                organization_id,
                *balance
            );
            return Ok(ChargeReceipt {
                ok: false,
                new_balance: *balance,
            });
        }

        *balance -= amount;
        let new_balance = *balance;
        drop(balance);

        self.charges
            .lock()
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .push(ChargeRecord {
                organization_id: organization_id.to_string(),
                amount,
                description: description.to_string(),
                balance_after: new_balance,
                charged_at: Utc::now(),
            });

        tracing::debug!(
            "[CreditLedger] Charged {} to {} ({}), balance now {}",
            amount,
            organization_id,
            description,
            new_balance
        );
        Ok(ChargeReceipt {
            ok: true,
            new_balance,
        })
    }
}
