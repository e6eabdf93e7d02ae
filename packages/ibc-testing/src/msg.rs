//! Messages a chain hands to its ledger, and the per-message responses.

use cosmwasm_std::{Addr, Binary, Coin};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ibc::{Order, Packet, PacketTimeout};
use crate::ident::{ChannelId, ConnectionId, PortId};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Msg {
    Bank(BankMsg),
    Gov(GovMsg),
    Wasm(WasmMsg),
    /// Handled by the chain's IBC core, never forwarded to the ledger
    Ibc(IbcMsg),
    /// Callbacks into IBC applications. Only the IBC core may send these.
    IbcApp(IbcAppMsg),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BankMsg {
    Send {
        to_address: String,
        amount: Vec<Coin>,
    },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoteOption {
    Yes,
    No,
    Abstain,
    NoWithVeto,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GovMsg {
    SubmitProposal {
        /// Executed by the governance module account if the proposal passes
        messages: Vec<Msg>,
        initial_deposit: Vec<Coin>,
        title: String,
        summary: String,
    },
    Deposit {
        proposal_id: u64,
        amount: Vec<Coin>,
    },
    Vote {
        proposal_id: u64,
        option: VoteOption,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WasmMsg {
    StoreCode {
        wasm_byte_code: Binary,
    },
    Instantiate {
        admin: Option<String>,
        code_id: u64,
        /// JSON encoded instantiate message
        msg: Binary,
        funds: Vec<Coin>,
        label: String,
    },
    Execute {
        contract_addr: String,
        /// JSON encoded execute message
        msg: Binary,
        funds: Vec<Coin>,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IbcMsg {
    SendPacket {
        source_port: PortId,
        source_channel: ChannelId,
        data: Binary,
        timeout: PacketTimeout,
    },
}

/// A channel as seen by the application bound to its port.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct IbcChannel {
    pub port_id: PortId,
    pub channel_id: ChannelId,
    pub counterparty_port_id: PortId,
    /// Not known yet during ChanOpenInit
    pub counterparty_channel_id: Option<ChannelId>,
    pub order: Order,
    pub version: String,
    pub connection_id: ConnectionId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IbcAppMsg {
    /// Answered with [`MsgResponse::ChannelOpen`] carrying the accepted version
    ChannelOpen {
        channel: IbcChannel,
        counterparty_version: Option<String>,
    },
    ChannelConnect {
        channel: IbcChannel,
    },
    ChannelClose {
        channel: IbcChannel,
    },
    /// Answered with [`MsgResponse::PacketReceive`] carrying the acknowledgement
    PacketReceive {
        packet: Packet,
    },
    PacketAck {
        packet: Packet,
        acknowledgement: Binary,
    },
    PacketTimeout {
        packet: Packet,
    },
}

/// One entry per top-level message of a batch.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MsgResponse {
    Empty {},
    SubmitProposal {
        proposal_id: u64,
    },
    StoreCode {
        code_id: u64,
        /// Hex encoded sha256 of the wasm bytes
        checksum: String,
    },
    Instantiate {
        address: Addr,
        data: Option<Binary>,
    },
    Execute {
        data: Option<Binary>,
    },
    SendPacket {
        sequence: u64,
    },
    ChannelOpen {
        version: String,
    },
    PacketReceive {
        acknowledgement: Binary,
    },
}

impl From<BankMsg> for Msg {
    fn from(msg: BankMsg) -> Self {
        Msg::Bank(msg)
    }
}

impl From<GovMsg> for Msg {
    fn from(msg: GovMsg) -> Self {
        Msg::Gov(msg)
    }
}

impl From<WasmMsg> for Msg {
    fn from(msg: WasmMsg) -> Self {
        Msg::Wasm(msg)
    }
}

impl From<IbcMsg> for Msg {
    fn from(msg: IbcMsg) -> Self {
        Msg::Ibc(msg)
    }
}
