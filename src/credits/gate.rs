//! Credit gate for premium turns

use std::sync::Arc;

use super::ledger::CreditLedger;
use crate::core::{OrchestratorError, OrchestratorResult};

/// What happened when a completed turn was charged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The turn was charged
    Charged { amount: i64, new_balance: i64 },
    /// The balance no longer covered the turn, or the ledger failed
    Unbilled,
}

impl ChargeOutcome {
    /// Credits actually deducted
    pub fn credits_used(&self) -> i64 {
        match self {
            ChargeOutcome::Charged { amount, .. } => *amount,
            ChargeOutcome::Unbilled => 0,
        }
    }
}

/// Checks and charges credits for premium turns
#[derive(Clone)]
pub struct CreditGate {
    ledger: Arc<dyn CreditLedger>,
    turn_cost: i64,
}

impl CreditGate {
    /// Create a gate charging `turn_cost` per completed premium turn
    pub fn new(ledger: Arc<dyn CreditLedger>, turn_cost: i64) -> Self {
        Self { ledger, turn_cost }
    }

    /// Credits charged per premium turn
    pub fn turn_cost(&self) -> i64 {
        self.turn_cost
    }

    /// Fail with `InsufficientCredits` unless the balance is positive
    pub async fn ensure_available(&self, organization_id: &str) -> OrchestratorResult<()> {
        let balance = self.ledger.balance(organization_id).await?;
        if balance <= 0 {
            tracing::info!(
                "[CreditGate] Organization {} has no credits (balance {})",
                organization_id,
                balance
            );
            return Err(OrchestratorError::InsufficientCredits {
                organization_id: organization_id.to_string(),
            });
        }
        Ok(())
    }

    /// Charge one completed turn
    ///
    /// Never fails the turn: a refused charge or ledger error comes back as
    /// `Unbilled`.
    pub async fn charge_turn(&self, organization_id: &str, description: &str) -> ChargeOutcome {
        match self
            .ledger
            .check_and_charge(organization_id, self.turn_cost, description)
            .await
        {
            Ok(receipt) if receipt.ok => ChargeOutcome::Charged {
                amount: self.turn_cost,
                new_balance: receipt.new_balance,
            },
            Ok(receipt) => {
                tracing::warn!(
                    "[CreditGate] Charge refused for {} at completion (balance {}), turn unbilled",
                    organization_id,
                    receipt.new_balance
                );
                ChargeOutcome::Unbilled
            }
            Err(e) => {
                tracing::error!(
                    "[CreditGate] Ledger failed charging {}: {}, turn unbilled",
                    organization_id,
                    e
                );
                ChargeOutcome::Unbilled
            }
        }
    }
}
