//! Panicking shorthands for test bodies. Any failure aborts the test.

use cosmwasm_std::Addr;
use serde::Serialize;

use cw_ibc_testing::workflows::{instantiate, submit_proposal, vote_and_advance};
use cw_ibc_testing::{Chain, Ledger, Msg, ProposalStatus, VoteOption};

/// Submits `messages` as a proposal from the chain's default sender.
pub fn submit_gov_proposal<L: Ledger>(chain: &mut Chain<L>, messages: Vec<Msg>) -> u64 {
    let proposer = chain.sender().clone();
    submit_proposal(chain, messages, &proposer)
        .unwrap_or_else(|err| panic!("submitting proposal on {}: {}", chain.id(), err))
}

/// Votes yes and requires the proposal to pass.
pub fn vote_and_pass_gov_proposal<L: Ledger>(chain: &mut Chain<L>, proposal_id: u64) {
    let status = vote_and_advance(chain, proposal_id, VoteOption::Yes)
        .unwrap_or_else(|err| panic!("voting on proposal {}: {}", proposal_id, err));
    assert_eq!(status, ProposalStatus::Passed, "proposal {}", proposal_id);
}

/// Instantiates `code_id` from the chain's default sender.
pub fn instantiate_contract<L, M>(chain: &mut Chain<L>, code_id: u64, init_msg: &M) -> Addr
where
    L: Ledger,
    M: Serialize + ?Sized,
{
    let sender = chain.sender().clone();
    instantiate(chain, &sender, code_id, init_msg, vec![], "ibc-test")
        .unwrap_or_else(|err| panic!("instantiating code {}: {}", code_id, err))
}
