use std::collections::BTreeMap;

use cosmwasm_std::{Addr, Coin, Decimal, Timestamp, Uint128};

use super::bank::{Bank, Staking};
use crate::errors::{LedgerError, LedgerResult};
use crate::ledger::{GovParams, Proposal, ProposalStatus, TallyResult};
use crate::msg::{Msg, VoteOption};

/// How a proposal whose voting period ended was decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Verdict {
    Passed,
    Rejected,
    /// Quorum missed or vetoed. The deposit is burned.
    RejectedAndBurned,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Gov {
    pub module: Addr,
    pub params: GovParams,
    proposals: BTreeMap<u64, Proposal>,
    votes: BTreeMap<u64, BTreeMap<Addr, VoteOption>>,
    deposits: BTreeMap<u64, Vec<(Addr, Vec<Coin>)>>,
    next_id: u64,
}

pub(crate) struct NewProposal {
    pub messages: Vec<Msg>,
    pub initial_deposit: Vec<Coin>,
    pub title: String,
    pub summary: String,
}

impl Gov {
    pub fn new(module: Addr, params: GovParams) -> Self {
        Gov {
            module,
            params,
            proposals: BTreeMap::new(),
            votes: BTreeMap::new(),
            deposits: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn proposal(&self, proposal_id: u64) -> LedgerResult<&Proposal> {
        self.proposals
            .get(&proposal_id)
            .ok_or_else(|| LedgerError::not_found("proposal", proposal_id))
    }

    fn proposal_mut(&mut self, proposal_id: u64) -> LedgerResult<&mut Proposal> {
        self.proposals
            .get_mut(&proposal_id)
            .ok_or_else(|| LedgerError::not_found("proposal", proposal_id))
    }

    pub fn submit(
        &mut self,
        bank: &mut Bank,
        proposer: &Addr,
        proposal: NewProposal,
        now: Timestamp,
    ) -> LedgerResult<u64> {
        if proposal.title.is_empty() {
            return Err(LedgerError::invalid_request("proposal title must not be empty"));
        }
        bank.send(proposer, &self.module, &proposal.initial_deposit)?;

        let id = self.next_id;
        self.next_id += 1;
        self.proposals.insert(
            id,
            Proposal {
                id,
                proposer: proposer.clone(),
                title: proposal.title,
                summary: proposal.summary,
                messages: proposal.messages,
                status: ProposalStatus::DepositPeriod,
                total_deposit: vec![],
                submit_time: now,
                deposit_end_time: now.plus_seconds(self.params.max_deposit_period_secs),
                voting_start_time: None,
                voting_end_time: None,
                final_tally: None,
                failed_reason: None,
            },
        );
        self.record_deposit(id, proposer, proposal.initial_deposit, now)?;
        Ok(id)
    }

    pub fn deposit(
        &mut self,
        bank: &mut Bank,
        depositor: &Addr,
        proposal_id: u64,
        amount: Vec<Coin>,
        now: Timestamp,
    ) -> LedgerResult<()> {
        let status = self.proposal(proposal_id)?.status;
        if status.is_final() {
            return Err(LedgerError::invalid_request(format!(
                "proposal {} is {:?} and takes no deposits",
                proposal_id, status
            )));
        }
        bank.send(depositor, &self.module, &amount)?;
        self.record_deposit(proposal_id, depositor, amount, now)
    }

    fn record_deposit(
        &mut self,
        proposal_id: u64,
        depositor: &Addr,
        amount: Vec<Coin>,
        now: Timestamp,
    ) -> LedgerResult<()> {
        let voting_period = self.params.voting_period_secs;
        let min_deposit = self.params.min_deposit.clone();
        let proposal = self.proposal_mut(proposal_id)?;
        for coin in &amount {
            add_coin(&mut proposal.total_deposit, coin)?;
        }
        if proposal.status == ProposalStatus::DepositPeriod
            && covers(&proposal.total_deposit, &min_deposit)
        {
            proposal.status = ProposalStatus::Voting;
            proposal.voting_start_time = Some(now);
            proposal.voting_end_time = Some(now.plus_seconds(voting_period));
        }
        self.deposits
            .entry(proposal_id)
            .or_default()
            .push((depositor.clone(), amount));
        Ok(())
    }

    pub fn vote(&mut self, voter: &Addr, proposal_id: u64, option: VoteOption) -> LedgerResult<()> {
        let status = self.proposal(proposal_id)?.status;
        if status != ProposalStatus::Voting {
            return Err(LedgerError::invalid_request(format!(
                "proposal {} is not in its voting period",
                proposal_id
            )));
        }
        self.votes
            .entry(proposal_id)
            .or_default()
            .insert(voter.clone(), option);
        Ok(())
    }

    /// Proposals whose deposit or voting period has ended at `now`.
    pub fn due(&self, now: Timestamp) -> Vec<u64> {
        self.proposals
            .values()
            .filter(|p| match p.status {
                ProposalStatus::DepositPeriod => p.deposit_end_time <= now,
                ProposalStatus::Voting => p.voting_end_time.is_some_and(|end| end <= now),
                _ => false,
            })
            .map(|p| p.id)
            .collect()
    }

    /// Counts the votes of a proposal, weighted by bonded power, and records the tally.
    pub fn tally(&mut self, staking: &Staking, proposal_id: u64) -> LedgerResult<Verdict> {
        let mut tally = TallyResult::default();
        if let Some(votes) = self.votes.get(&proposal_id) {
            for (voter, option) in votes {
                let power = staking.power(voter);
                match option {
                    VoteOption::Yes => tally.yes += power,
                    VoteOption::No => tally.no += power,
                    VoteOption::Abstain => tally.abstain += power,
                    VoteOption::NoWithVeto => tally.no_with_veto += power,
                }
            }
        }
        let verdict = verdict(&self.params, &tally, staking.total_power());
        self.proposal_mut(proposal_id)?.final_tally = Some(tally);
        Ok(verdict)
    }

    /// Sets the final status and settles the deposits.
    pub fn finish(
        &mut self,
        bank: &mut Bank,
        proposal_id: u64,
        status: ProposalStatus,
        burn: bool,
        failed_reason: Option<String>,
    ) -> LedgerResult<()> {
        let proposal = self.proposal_mut(proposal_id)?;
        proposal.status = status;
        proposal.failed_reason = failed_reason;
        let total = proposal.total_deposit.clone();
        let deposits = self.deposits.remove(&proposal_id).unwrap_or_default();
        if burn {
            bank.burn(&self.module, &total)?;
        } else {
            for (depositor, amount) in deposits {
                bank.send(&self.module, &depositor, &amount)?;
            }
        }
        Ok(())
    }
}

fn verdict(params: &GovParams, tally: &TallyResult, bonded: Uint128) -> Verdict {
    let total = tally.total();
    if bonded.is_zero() || total.is_zero() || Decimal::from_ratio(total, bonded) < params.quorum
    {
        return Verdict::RejectedAndBurned;
    }
    if Decimal::from_ratio(tally.no_with_veto, total) > params.veto_threshold {
        return Verdict::RejectedAndBurned;
    }
    let counted = total - tally.abstain;
    if counted.is_zero() {
        return Verdict::Rejected;
    }
    if Decimal::from_ratio(tally.yes, counted) > params.threshold {
        Verdict::Passed
    } else {
        Verdict::Rejected
    }
}

fn add_coin(coins: &mut Vec<Coin>, coin: &Coin) -> LedgerResult<()> {
    match coins.iter_mut().find(|c| c.denom == coin.denom) {
        Some(existing) => existing.amount = existing.amount.checked_add(coin.amount)?,
        None => coins.push(coin.clone()),
    }
    Ok(())
}

fn covers(have: &[Coin], need: &[Coin]) -> bool {
    need.iter().all(|n| {
        have.iter()
            .find(|h| h.denom == n.denom)
            .is_some_and(|h| h.amount >= n.amount)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::coins;

    fn setup() -> (Gov, Bank, Staking, Addr) {
        let voter = Addr::unchecked("voter");
        let mut bank = Bank::default();
        bank.mint(&voter, &coins(100_000_000, "stake")).unwrap();
        let mut staking = Staking::default();
        staking.bond(&voter, Uint128::new(1_000));
        let gov = Gov::new(Addr::unchecked("gov"), GovParams::with_denom("stake"));
        (gov, bank, staking, voter)
    }

    fn new_proposal(deposit: u128) -> NewProposal {
        NewProposal {
            messages: vec![],
            initial_deposit: coins(deposit, "stake"),
            title: "title".to_string(),
            summary: "summary".to_string(),
        }
    }

    #[test]
    fn submit_with_min_deposit_starts_voting() {
        let (mut gov, mut bank, _, voter) = setup();
        let now = Timestamp::from_seconds(1_000);
        let id = gov
            .submit(&mut bank, &voter, new_proposal(10_000_000), now)
            .unwrap();
        assert_eq!(id, 1);
        let proposal = gov.proposal(id).unwrap();
        assert_eq!(proposal.status, ProposalStatus::Voting);
        assert_eq!(proposal.voting_end_time, Some(now.plus_seconds(120)));
        assert_eq!(bank.balance(&gov.module, "stake"), Uint128::new(10_000_000));
    }

    #[test]
    fn small_deposit_waits_and_expires() {
        let (mut gov, mut bank, _, voter) = setup();
        let now = Timestamp::from_seconds(1_000);
        let id = gov.submit(&mut bank, &voter, new_proposal(5), now).unwrap();
        assert_eq!(gov.proposal(id).unwrap().status, ProposalStatus::DepositPeriod);
        assert!(gov.vote(&voter, id, VoteOption::Yes).is_err());
        assert!(gov.due(now.plus_seconds(100)).is_empty());
        assert_eq!(gov.due(now.plus_seconds(172_800)), vec![id]);

        gov.deposit(&mut bank, &voter, id, coins(9_999_995, "stake"), now)
            .unwrap();
        assert_eq!(gov.proposal(id).unwrap().status, ProposalStatus::Voting);
        assert_eq!(
            gov.proposal(id).unwrap().total_deposit,
            coins(10_000_000, "stake")
        );
    }

    #[test]
    fn tally_works() {
        let params = GovParams::with_denom("stake");
        let bonded = Uint128::new(100);
        let tally = |yes: u128, no: u128, abstain: u128, veto: u128| TallyResult {
            yes: Uint128::new(yes),
            no: Uint128::new(no),
            abstain: Uint128::new(abstain),
            no_with_veto: Uint128::new(veto),
        };

        assert_eq!(verdict(&params, &tally(0, 0, 0, 0), bonded), Verdict::RejectedAndBurned);
        assert_eq!(verdict(&params, &tally(30, 0, 0, 0), bonded), Verdict::RejectedAndBurned);
        assert_eq!(verdict(&params, &tally(100, 0, 0, 0), bonded), Verdict::Passed);
        assert_eq!(verdict(&params, &tally(50, 50, 0, 0), bonded), Verdict::Rejected);
        assert_eq!(verdict(&params, &tally(10, 5, 80, 0), bonded), Verdict::Passed);
        assert_eq!(verdict(&params, &tally(0, 0, 100, 0), bonded), Verdict::Rejected);
        assert_eq!(verdict(&params, &tally(60, 0, 0, 40), bonded), Verdict::RejectedAndBurned);
        assert_eq!(
            verdict(&params, &tally(1, 0, 0, 0), Uint128::zero()),
            Verdict::RejectedAndBurned
        );
    }

    #[test]
    fn finish_refunds_or_burns() {
        let (mut gov, mut bank, staking, voter) = setup();
        let now = Timestamp::from_seconds(1_000);
        let before = bank.balance(&voter, "stake");

        let refunded = gov
            .submit(&mut bank, &voter, new_proposal(10_000_000), now)
            .unwrap();
        gov.vote(&voter, refunded, VoteOption::Yes).unwrap();
        assert_eq!(gov.tally(&staking, refunded).unwrap(), Verdict::Passed);
        gov.finish(&mut bank, refunded, ProposalStatus::Passed, false, None)
            .unwrap();
        assert_eq!(bank.balance(&voter, "stake"), before);
        assert_eq!(
            gov.proposal(refunded).unwrap().final_tally.as_ref().unwrap().yes,
            Uint128::new(1_000)
        );

        let burned = gov
            .submit(&mut bank, &voter, new_proposal(10_000_000), now)
            .unwrap();
        assert_eq!(gov.tally(&staking, burned).unwrap(), Verdict::RejectedAndBurned);
        gov.finish(&mut bank, burned, ProposalStatus::Failed, true, None)
            .unwrap();
        assert_eq!(
            bank.balance(&voter, "stake"),
            before - Uint128::new(10_000_000)
        );
        assert!(bank.balance(&gov.module, "stake").is_zero());
    }
}
