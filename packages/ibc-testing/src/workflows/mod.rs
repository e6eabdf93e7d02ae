//! Multi-step flows built only on a chain's message submission and query
//! interface.

mod contract;
mod gov;

pub use contract::{instantiate, store_code};
pub use gov::{advance_past_voting, query_proposal, submit_proposal, vote_and_advance};

use crate::errors::{HarnessError, HarnessResult};
use crate::msg::MsgResponse;

/// Takes the only response of a single message batch.
///
/// Anything but exactly one response means the ledger and the harness
/// disagree about what a message produces, so no response is picked.
pub(crate) fn single_response(
    responses: Vec<MsgResponse>,
    operation: &str,
) -> HarnessResult<MsgResponse> {
    let count = responses.len();
    let [response]: [MsgResponse; 1] = responses.try_into().map_err(|_| {
        HarnessError::inconsistency(format!(
            "{} expected exactly 1 response, got {}",
            operation, count
        ))
    })?;
    Ok(response)
}
