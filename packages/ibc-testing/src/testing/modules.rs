//! The interfaces mock contracts and native IBC modules implement, and the
//! [`EchoModule`] bound to the default `mock` port.

use cosmwasm_std::{Addr, Binary, Event, MessageInfo};

use super::storage::ContractStorage;
use crate::errors::{LedgerError, LedgerResult};
use crate::ibc::{Packet, StdAck};
use crate::ident::PortId;
use crate::ledger::BlockInfo;
use crate::msg::{IbcChannel, Msg};

/// Where a contract or module call runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractEnv {
    pub block: BlockInfo,
    /// The contract, or the module account of a native module
    pub address: Addr,
    pub port_id: PortId,
}

/// What a contract or module hands back besides its own state changes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContractResponse {
    /// Executed right after the call, with the caller's address as sender
    pub messages: Vec<Msg>,
    pub events: Vec<Event>,
    pub data: Option<Binary>,
}

impl ContractResponse {
    pub fn new() -> Self {
        ContractResponse::default()
    }

    pub fn add_message(mut self, msg: impl Into<Msg>) -> Self {
        self.messages.push(msg.into());
        self
    }

    pub fn add_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn set_data(mut self, data: impl Into<Binary>) -> Self {
        self.data = Some(data.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiveResponse {
    pub acknowledgement: Binary,
    pub response: ContractResponse,
}

impl ReceiveResponse {
    pub fn new(acknowledgement: impl Into<Binary>) -> Self {
        ReceiveResponse {
            acknowledgement: acknowledgement.into(),
            response: ContractResponse::default(),
        }
    }
}

/// An application bound to an IBC port.
///
/// Returning an error from any callback fails the IBC step that triggered it,
/// except for `packet_receive`, whose errors become error acknowledgements.
pub trait IbcModule {
    /// Accepts or rejects a new channel. Returns the version to use.
    fn channel_open(
        &self,
        storage: &mut ContractStorage,
        env: &ContractEnv,
        channel: &IbcChannel,
        counterparty_version: Option<&str>,
    ) -> LedgerResult<String>;

    fn channel_connect(
        &self,
        _storage: &mut ContractStorage,
        _env: &ContractEnv,
        _channel: &IbcChannel,
    ) -> LedgerResult<ContractResponse> {
        Ok(ContractResponse::default())
    }

    fn channel_close(
        &self,
        _storage: &mut ContractStorage,
        _env: &ContractEnv,
        _channel: &IbcChannel,
    ) -> LedgerResult<ContractResponse> {
        Ok(ContractResponse::default())
    }

    fn packet_receive(
        &self,
        storage: &mut ContractStorage,
        env: &ContractEnv,
        packet: &Packet,
    ) -> LedgerResult<ReceiveResponse>;

    fn packet_ack(
        &self,
        _storage: &mut ContractStorage,
        _env: &ContractEnv,
        _packet: &Packet,
        _acknowledgement: &Binary,
    ) -> LedgerResult<ContractResponse> {
        Ok(ContractResponse::default())
    }

    fn packet_timeout(
        &self,
        _storage: &mut ContractStorage,
        _env: &ContractEnv,
        _packet: &Packet,
    ) -> LedgerResult<ContractResponse> {
        Ok(ContractResponse::default())
    }
}

/// Rust stand-in for the code behind a stored wasm blob.
pub trait Contract {
    fn instantiate(
        &self,
        storage: &mut ContractStorage,
        env: &ContractEnv,
        info: &MessageInfo,
        msg: &[u8],
    ) -> LedgerResult<ContractResponse>;

    fn execute(
        &self,
        storage: &mut ContractStorage,
        env: &ContractEnv,
        info: &MessageInfo,
        msg: &[u8],
    ) -> LedgerResult<ContractResponse>;

    fn query(&self, storage: &ContractStorage, env: &ContractEnv, msg: &[u8]) -> LedgerResult<Binary>;

    /// The IBC entry points, if the contract has any.
    fn ibc(&self) -> Option<&dyn IbcModule> {
        None
    }
}

/// Number of packets a module received, keyed in its storage.
pub const RECEIVED_KEY: &[u8] = b"received";
pub const ACKNOWLEDGED_KEY: &[u8] = b"acknowledged";
pub const TIMED_OUT_KEY: &[u8] = b"timed_out";

/// Packet data that makes the [`EchoModule`] fail after counting the packet.
pub const ECHO_FAIL: &[u8] = b"fail";

pub(crate) fn bump(storage: &mut ContractStorage, key: &[u8]) -> LedgerResult<u64> {
    let count = storage.may_load::<u64>(key)?.unwrap_or_default() + 1;
    storage.save(key, &count)?;
    Ok(count)
}

/// Accepts every channel and acknowledges every packet with its own data.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoModule;

impl IbcModule for EchoModule {
    fn channel_open(
        &self,
        _storage: &mut ContractStorage,
        _env: &ContractEnv,
        channel: &IbcChannel,
        counterparty_version: Option<&str>,
    ) -> LedgerResult<String> {
        Ok(counterparty_version
            .map(str::to_string)
            .unwrap_or_else(|| channel.version.clone()))
    }

    fn packet_receive(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        packet: &Packet,
    ) -> LedgerResult<ReceiveResponse> {
        bump(storage, RECEIVED_KEY)?;
        if packet.data.as_slice() == ECHO_FAIL {
            return Err(LedgerError::contract_err("echo refused the packet"));
        }
        Ok(ReceiveResponse::new(
            StdAck::success(packet.data.clone()).to_binary(),
        ))
    }

    fn packet_ack(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        _packet: &Packet,
        _acknowledgement: &Binary,
    ) -> LedgerResult<ContractResponse> {
        bump(storage, ACKNOWLEDGED_KEY)?;
        Ok(ContractResponse::default())
    }

    fn packet_timeout(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        _packet: &Packet,
    ) -> LedgerResult<ContractResponse> {
        bump(storage, TIMED_OUT_KEY)?;
        Ok(ContractResponse::default())
    }
}
