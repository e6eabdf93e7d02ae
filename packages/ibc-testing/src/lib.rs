//! Deterministic multi-chain coordinator for exercising IBC workflows.
//!
//! A [`Coordinator`] owns a set of [`Chain`]s, each running a [`Ledger`] plus
//! its own IBC core. Connections and channels between two chains are opened
//! through the full four step handshakes on a [`Path`], and packets are
//! relayed with real commitment proofs against light clients. Nothing touches
//! the network or the wall clock.
//!
//! The [`testing`] module ships [`MockLedger`](testing::MockLedger), an
//! in-memory ledger with a bank, governance and a mock contract engine.

mod account;
mod chain;
mod config;
mod coordinator;
mod endpoint;
mod errors;
mod height;
pub mod ibc;
mod ident;
mod ledger;
mod msg;
mod path;
mod relay;
pub mod testing;
pub mod workflows;

pub use crate::account::{
    account_address, bech32_address, contract_address, module_address, Account, Validator,
    ValidatorSet,
};
pub use crate::chain::{Chain, Tx, TxResponse};
pub use crate::config::{ChainConfig, CoordinatorConfig};
pub use crate::coordinator::Coordinator;
pub use crate::endpoint::{
    ChannelConfig, ConnectionConfig, Endpoint, DEFAULT_CHANNEL_VERSION,
    DEFAULT_CONNECTION_VERSION, DEFAULT_PORT,
};
pub use crate::errors::{HarnessError, HarnessResult, LedgerError, LedgerResult};
pub use crate::height::Height;
pub use crate::ibc::{Order, Packet, PacketTimeout, RecvOutcome, StdAck};
pub use crate::ident::{
    ChainId, ChannelId, ClientId, ConnectionId, PortId, CLIENT_TYPE, WASM_PORT_PREFIX,
};
pub use crate::ledger::{
    AllBalancesResponse, AppResponse, BalanceResponse, BlockInfo, CodeInfoResponse,
    ContractInfoResponse, ContractsByCodeResponse, Genesis, GovParams, Ledger, LedgerQuery,
    OutboundPacket, Proposal, ProposalResponse, ProposalStatus, TallyResult,
    DEFAULT_MAX_DEPOSIT_PERIOD_SECS, DEFAULT_MIN_DEPOSIT, DEFAULT_VOTING_PERIOD_SECS,
};
pub use crate::msg::{
    BankMsg, GovMsg, IbcAppMsg, IbcChannel, IbcMsg, Msg, MsgResponse, VoteOption, WasmMsg,
};
pub use crate::path::Path;
pub use crate::relay::{RelayOutcome, RelayReport};
