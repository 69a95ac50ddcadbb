pub mod csv;
pub mod ledger;
pub mod seen;

pub use ledger::{DealLedger, LedgerSnapshot, LEDGER_HEADER};
pub use seen::DedupStore;

#[cfg(test)]
mod tests;
