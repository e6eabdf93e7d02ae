#[cfg(feature = "backtraces")]
use std::backtrace::Backtrace;
use std::fmt::Display;
use thiserror::Error;

use super::ledger_error::LedgerError;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HarnessError {
    /// A message or proof was malformed or rejected before any state changed.
    #[error("Validation error: {msg}")]
    Validation {
        msg: String,
        #[cfg(feature = "backtraces")]
        backtrace: Backtrace,
    },
    /// A handshake step was attempted out of order, or a packet arrived out of order.
    #[error("Protocol violation: {msg}")]
    ProtocolViolation {
        msg: String,
        #[cfg(feature = "backtraces")]
        backtrace: Backtrace,
    },
    /// An invariant of the harness itself is broken. Tests must abort on this.
    #[error("Harness inconsistency: {msg}")]
    Inconsistency {
        msg: String,
        #[cfg(feature = "backtraces")]
        backtrace: Backtrace,
    },
    #[error("Ledger rejected the messages: {source}")]
    LedgerErr {
        source: LedgerError,
        #[cfg(feature = "backtraces")]
        backtrace: Backtrace,
    },
    #[error("Unknown chain: {chain_id}")]
    UnknownChain {
        chain_id: String,
        #[cfg(feature = "backtraces")]
        backtrace: Backtrace,
    },
    #[error("No pending packets to relay on path {path}")]
    NothingToRelay {
        path: String,
        #[cfg(feature = "backtraces")]
        backtrace: Backtrace,
    },
    #[error("Error parsing into type {target_type}: {msg}")]
    ParseErr {
        /// the target type that was attempted
        target_type: String,
        msg: String,
        #[cfg(feature = "backtraces")]
        backtrace: Backtrace,
    },
    #[error("Error serializing type {source_type}: {msg}")]
    SerializeErr {
        /// the source type that was attempted
        source_type: String,
        msg: String,
        #[cfg(feature = "backtraces")]
        backtrace: Backtrace,
    },
}

impl HarnessError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        HarnessError::Validation {
            msg: msg.into(),
            #[cfg(feature = "backtraces")]
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn protocol_violation(msg: impl Into<String>) -> Self {
        HarnessError::ProtocolViolation {
            msg: msg.into(),
            #[cfg(feature = "backtraces")]
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn inconsistency(msg: impl Into<String>) -> Self {
        HarnessError::Inconsistency {
            msg: msg.into(),
            #[cfg(feature = "backtraces")]
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn ledger_err(original: LedgerError) -> Self {
        HarnessError::LedgerErr {
            source: original,
            #[cfg(feature = "backtraces")]
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn unknown_chain(chain_id: impl ToString) -> Self {
        HarnessError::UnknownChain {
            chain_id: chain_id.to_string(),
            #[cfg(feature = "backtraces")]
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn nothing_to_relay(path: impl ToString) -> Self {
        HarnessError::NothingToRelay {
            path: path.to_string(),
            #[cfg(feature = "backtraces")]
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn parse_err(target: impl Into<String>, msg: impl Display) -> Self {
        HarnessError::ParseErr {
            target_type: target.into(),
            msg: msg.to_string(),
            #[cfg(feature = "backtraces")]
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn serialize_err(source: impl Into<String>, msg: impl Display) -> Self {
        HarnessError::SerializeErr {
            source_type: source.into(),
            msg: msg.to_string(),
            #[cfg(feature = "backtraces")]
            backtrace: Backtrace::capture(),
        }
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, HarnessError::ProtocolViolation { .. })
    }

    pub fn is_inconsistency(&self) -> bool {
        matches!(self, HarnessError::Inconsistency { .. })
    }
}

impl From<LedgerError> for HarnessError {
    fn from(original: LedgerError) -> Self {
        HarnessError::ledger_err(original)
    }
}
