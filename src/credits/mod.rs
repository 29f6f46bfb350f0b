//! Organization credits
//!
//! Premium turns need a positive balance to start and are charged once they
//! complete. Basic turns are free.

pub mod gate;
pub mod ledger;

pub use gate::{ChargeOutcome, CreditGate};
pub use ledger::{ChargeReceipt, ChargeRecord, CreditLedger, InMemoryCreditLedger, LedgerError};
