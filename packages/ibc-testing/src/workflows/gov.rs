use std::time::Duration;

use cosmwasm_std::Addr;

use super::single_response;
use crate::chain::Chain;
use crate::errors::{HarnessError, HarnessResult};
use crate::ledger::{GovParams, Ledger, LedgerQuery, Proposal, ProposalResponse, ProposalStatus};
use crate::msg::{GovMsg, Msg, MsgResponse, VoteOption};

/// Submits a proposal carrying `messages` with the minimum deposit and
/// commits the block. Returns the proposal id.
pub fn submit_proposal<L: Ledger>(
    chain: &mut Chain<L>,
    messages: Vec<Msg>,
    proposer: &Addr,
) -> HarnessResult<u64> {
    let params: GovParams = chain.query_json(&LedgerQuery::GovParams {})?;
    let msg = GovMsg::SubmitProposal {
        title: format!("{} messages from {}", messages.len(), proposer),
        summary: "submitted by the test harness".to_string(),
        messages,
        initial_deposit: params.min_deposit,
    };
    let response = chain.submit_messages(proposer, vec![msg.into()])?;
    let proposal_id = match single_response(response.msg_responses, "SubmitProposal")? {
        MsgResponse::SubmitProposal { proposal_id } => proposal_id,
        other => {
            return Err(HarnessError::inconsistency(format!(
                "SubmitProposal answered with {:?}",
                other
            )))
        }
    };
    chain.commit_block()?;
    log::debug!("{} submitted proposal {}", chain.id(), proposal_id);
    Ok(proposal_id)
}

/// Casts a vote from the default sender, who holds all bonded power, then
/// advances past the end of the voting period. Returns the final status.
///
/// A proposal that did not pass is a valid outcome, not an error.
pub fn vote_and_advance<L: Ledger>(
    chain: &mut Chain<L>,
    proposal_id: u64,
    option: VoteOption,
) -> HarnessResult<ProposalStatus> {
    let voter = chain.sender().clone();
    let msg = GovMsg::Vote {
        proposal_id,
        option,
    };
    let response = chain.submit_messages(&voter, vec![msg.into()])?;
    single_response(response.msg_responses, "Vote")?;
    advance_past_voting(chain, proposal_id)
}

/// Moves the chain's time to the end of the voting period, commits the block
/// and returns the final status.
pub fn advance_past_voting<L: Ledger>(
    chain: &mut Chain<L>,
    proposal_id: u64,
) -> HarnessResult<ProposalStatus> {
    let proposal = query_proposal(chain, proposal_id)?;
    let voting_end = match (proposal.status, proposal.voting_end_time) {
        (ProposalStatus::Voting, Some(end)) => end,
        (status, _) => {
            return Err(HarnessError::inconsistency(format!(
                "proposal {} is {:?}, not voting",
                proposal_id, status
            )))
        }
    };
    let now = chain.time();
    if voting_end > now {
        chain.increment_time(Duration::from_nanos(voting_end.nanos() - now.nanos()));
    }
    chain.commit_block()?;

    let status = query_proposal(chain, proposal_id)?.status;
    if !status.is_final() {
        return Err(HarnessError::inconsistency(format!(
            "proposal {} is still {:?} after its voting period",
            proposal_id, status
        )));
    }
    log::debug!("{} proposal {} ended {:?}", chain.id(), proposal_id, status);
    Ok(status)
}

pub fn query_proposal<L: Ledger>(chain: &Chain<L>, proposal_id: u64) -> HarnessResult<Proposal> {
    let response: ProposalResponse = chain.query_json(&LedgerQuery::Proposal { proposal_id })?;
    Ok(response.proposal)
}
