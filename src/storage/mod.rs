pub mod ledger;

pub use ledger::MessageLedger;
