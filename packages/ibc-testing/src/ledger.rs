//! The capability interface between a chain and the ledger it runs.
//!
//! A chain knows nothing about balances, proposals or contracts. It hands
//! message batches to a [`Ledger`] and reads state back through
//! [`Ledger::query_state`]. Implementations only need to be [`Clone`]: the
//! chain applies every batch to a copy and keeps it only if the whole batch
//! succeeded.

use cosmwasm_std::{Addr, Binary, Coin, Decimal, Event, Timestamp, Uint128};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::account::{Account, ValidatorSet};
use crate::errors::LedgerResult;
use crate::ibc::PacketTimeout;
use crate::ident::{ChainId, ChannelId, PortId};
use crate::msg::{Msg, MsgResponse};

/// The block a ledger call is executed in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct BlockInfo {
    pub chain_id: ChainId,
    pub height: u64,
    pub time: Timestamp,
}

/// A packet an application wants to send. The chain's IBC core assigns the
/// sequence and routes it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct OutboundPacket {
    pub source_port: PortId,
    pub source_channel: ChannelId,
    pub data: Binary,
    pub timeout: PacketTimeout,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppResponse {
    /// One entry per message of the batch, in order
    pub msg_responses: Vec<MsgResponse>,
    pub events: Vec<Event>,
    pub packets: Vec<OutboundPacket>,
}

impl AppResponse {
    pub fn extend(&mut self, other: AppResponse) {
        self.msg_responses.extend(other.msg_responses);
        self.events.extend(other.events);
        self.packets.extend(other.packets);
    }
}

/// Everything a ledger needs to set up its genesis state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Genesis {
    pub chain_id: ChainId,
    pub bech32_prefix: String,
    pub bond_denom: String,
    pub genesis_time: Timestamp,
    pub accounts: Vec<Account>,
    pub initial_balance: Uint128,
    pub validators: ValidatorSet,
    /// Receives the bonded power of all validators
    pub delegator: Addr,
    /// Sender of all IBC application callbacks
    pub ibc_module: Addr,
    /// Escrows proposal deposits and executes passed proposals
    pub gov_module: Addr,
}

pub trait Ledger: Clone {
    /// Applies the messages in order. On error the caller discards `self`.
    fn apply_messages(
        &mut self,
        block: &BlockInfo,
        sender: &Addr,
        msgs: &[Msg],
    ) -> LedgerResult<AppResponse>;

    /// Answers a read only request with a JSON document.
    fn query_state(&self, block: &BlockInfo, request: &LedgerQuery) -> LedgerResult<Binary>;

    /// End of block work, such as finalizing proposals whose voting period ended.
    fn commit_block(&mut self, block: &BlockInfo) -> LedgerResult<AppResponse>;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedgerQuery {
    /// Returns [`BalanceResponse`]
    Balance { address: String, denom: String },
    /// Returns [`AllBalancesResponse`]
    AllBalances { address: String },
    /// Returns [`ProposalResponse`]
    Proposal { proposal_id: u64 },
    /// Returns [`GovParams`]
    GovParams {},
    /// Returns [`CodeInfoResponse`]
    CodeInfo { code_id: u64 },
    /// Returns [`ContractInfoResponse`]
    ContractInfo { contract_addr: String },
    /// Returns [`ContractsByCodeResponse`]
    ContractsByCode { code_id: u64 },
    /// Returns whatever the contract answers
    ContractSmart { contract_addr: String, msg: Binary },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct BalanceResponse {
    pub amount: Coin,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct AllBalancesResponse {
    pub amount: Vec<Coin>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    DepositPeriod,
    Voting,
    Passed,
    /// Rejected by the tally, or passed but its messages failed
    Failed,
    /// The deposit period ended without reaching the minimum deposit
    Expired,
}

impl ProposalStatus {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Passed | ProposalStatus::Failed | ProposalStatus::Expired
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct TallyResult {
    pub yes: Uint128,
    pub no: Uint128,
    pub abstain: Uint128,
    pub no_with_veto: Uint128,
}

impl TallyResult {
    pub fn total(&self) -> Uint128 {
        self.yes + self.no + self.abstain + self.no_with_veto
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Proposal {
    pub id: u64,
    pub proposer: Addr,
    pub title: String,
    pub summary: String,
    pub messages: Vec<Msg>,
    pub status: ProposalStatus,
    pub total_deposit: Vec<Coin>,
    pub submit_time: Timestamp,
    pub deposit_end_time: Timestamp,
    pub voting_start_time: Option<Timestamp>,
    pub voting_end_time: Option<Timestamp>,
    /// Set once the proposal is finalized
    pub final_tally: Option<TallyResult>,
    /// Why a passed proposal failed to execute
    pub failed_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ProposalResponse {
    pub proposal: Proposal,
}

/// Default voting period, in seconds.
pub const DEFAULT_VOTING_PERIOD_SECS: u64 = 120;
/// Default deposit period, in seconds.
pub const DEFAULT_MAX_DEPOSIT_PERIOD_SECS: u64 = 172_800;
pub const DEFAULT_MIN_DEPOSIT: u128 = 10_000_000;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct GovParams {
    pub min_deposit: Vec<Coin>,
    pub max_deposit_period_secs: u64,
    pub voting_period_secs: u64,
    /// Share of the bonded power that must vote
    pub quorum: Decimal,
    /// Share of the non abstaining votes that must be yes
    pub threshold: Decimal,
    /// Share of the votes that vetoes the proposal
    pub veto_threshold: Decimal,
}

impl GovParams {
    pub fn with_denom(denom: &str) -> Self {
        GovParams {
            min_deposit: vec![Coin::new(DEFAULT_MIN_DEPOSIT, denom)],
            max_deposit_period_secs: DEFAULT_MAX_DEPOSIT_PERIOD_SECS,
            voting_period_secs: DEFAULT_VOTING_PERIOD_SECS,
            quorum: Decimal::permille(334),
            threshold: Decimal::percent(50),
            veto_threshold: Decimal::permille(334),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct CodeInfoResponse {
    pub code_id: u64,
    pub creator: Addr,
    /// Hex encoded sha256 of the wasm bytes
    pub checksum: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ContractInfoResponse {
    pub code_id: u64,
    pub creator: Addr,
    pub admin: Option<Addr>,
    pub label: String,
    /// The contract's IBC port
    pub ibc_port_id: PortId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ContractsByCodeResponse {
    pub contracts: Vec<Addr>,
}
