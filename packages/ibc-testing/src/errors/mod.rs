mod harness_error;
mod ledger_error;

pub use harness_error::HarnessError;
pub use ledger_error::LedgerError;

pub type HarnessResult<T> = core::result::Result<T, HarnessError>;
pub type LedgerResult<T> = core::result::Result<T, LedgerError>;
