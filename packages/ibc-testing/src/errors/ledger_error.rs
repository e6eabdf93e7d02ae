use thiserror::Error;

/// Errors reported by a [`Ledger`](crate::Ledger) implementation.
///
/// The coordinator never inspects the variants to make decisions. They are
/// surfaced to the caller (wrapped in [`HarnessError::LedgerErr`](crate::HarnessError))
/// or turned into an error acknowledgement when they occur while an application
/// processes a received packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("Unauthorized: {msg}")]
    Unauthorized { msg: String },
    #[error("Insufficient funds: {address} has {available}, needs {required}")]
    InsufficientFunds {
        address: String,
        available: String,
        required: String,
    },
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },
    #[error("Invalid request: {msg}")]
    InvalidRequest { msg: String },
    #[error("Contract error: {msg}")]
    ContractErr { msg: String },
    #[error("Unknown error: {msg}")]
    Unknown { msg: String },
}

impl LedgerError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        LedgerError::Unauthorized { msg: msg.into() }
    }

    pub fn insufficient_funds(
        address: impl Into<String>,
        available: impl ToString,
        required: impl ToString,
    ) -> Self {
        LedgerError::InsufficientFunds {
            address: address.into(),
            available: available.to_string(),
            required: required.to_string(),
        }
    }

    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        LedgerError::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        LedgerError::InvalidRequest { msg: msg.into() }
    }

    pub fn contract_err(msg: impl Into<String>) -> Self {
        LedgerError::ContractErr { msg: msg.into() }
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        LedgerError::Unknown { msg: msg.into() }
    }
}

impl From<cosmwasm_std::StdError> for LedgerError {
    fn from(original: cosmwasm_std::StdError) -> Self {
        LedgerError::invalid_request(original.to_string())
    }
}

impl From<cosmwasm_std::OverflowError> for LedgerError {
    fn from(original: cosmwasm_std::OverflowError) -> Self {
        LedgerError::invalid_request(original.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_works() {
        let error = LedgerError::unauthorized("only the admin");
        match error {
            LedgerError::Unauthorized { msg } => assert_eq!(msg, "only the admin"),
            e => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn insufficient_funds_works() {
        let error = LedgerError::insufficient_funds("cosmos1abc", "5stake", "7stake");
        match &error {
            LedgerError::InsufficientFunds {
                address,
                available,
                required,
            } => {
                assert_eq!(address, "cosmos1abc");
                assert_eq!(available, "5stake");
                assert_eq!(required, "7stake");
            }
            e => panic!("Unexpected error: {:?}", e),
        }
        assert_eq!(
            error.to_string(),
            "Insufficient funds: cosmos1abc has 5stake, needs 7stake"
        );
    }

    #[test]
    fn not_found_works() {
        let error = LedgerError::not_found("proposal", 42);
        match &error {
            LedgerError::NotFound { kind, id } => {
                assert_eq!(kind, "proposal");
                assert_eq!(id, "42");
            }
            e => panic!("Unexpected error: {:?}", e),
        }
        assert_eq!(error.to_string(), "proposal not found: 42");
    }

    #[test]
    fn contract_err_works() {
        let error = LedgerError::contract_err("kaputt");
        match error {
            LedgerError::ContractErr { msg } => assert_eq!(msg, "kaputt"),
            e => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn from_std_error_works() {
        let error: LedgerError = cosmwasm_std::StdError::generic_err("broken").into();
        match error {
            LedgerError::InvalidRequest { msg } => assert!(msg.contains("broken")),
            e => panic!("Unexpected error: {:?}", e),
        }
    }
}
