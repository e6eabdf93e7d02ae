//! Mock contracts every [`MockLedger`](super::MockLedger) can store.

use cosmwasm_std::{from_json, to_json_binary, Addr, Binary, Event, MessageInfo};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::modules::{
    bump, Contract, ContractEnv, ContractResponse, IbcModule, ReceiveResponse, ACKNOWLEDGED_KEY,
    RECEIVED_KEY, TIMED_OUT_KEY,
};
use super::storage::ContractStorage;
use crate::errors::{LedgerError, LedgerResult};
use crate::ibc::{Packet, StdAck};
use crate::msg::{IbcChannel, Msg};

/// Stand-in bytes of the counter contract.
pub const COUNTER_WASM: &[u8] = b"\0asm\x01\0\0\0counter";
/// Stand-in bytes of the reflect contract.
pub const REFLECT_WASM: &[u8] = b"\0asm\x01\0\0\0reflect";

const COUNT_KEY: &[u8] = b"count";
const OWNER_KEY: &[u8] = b"owner";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct CounterInstantiateMsg {
    pub count: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CounterExecuteMsg {
    Increment {},
    /// Owner only
    Reset { count: u64 },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CounterQueryMsg {
    GetCount {},
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct CountResponse {
    pub count: u64,
}

fn load_owner(storage: &ContractStorage) -> LedgerResult<Addr> {
    storage.load(OWNER_KEY)
}

fn only_owner(storage: &ContractStorage, info: &MessageInfo) -> LedgerResult<()> {
    let owner = load_owner(storage)?;
    if info.sender != owner {
        return Err(LedgerError::unauthorized(format!(
            "only {} may do this, not {}",
            owner, info.sender
        )));
    }
    Ok(())
}

/// Keeps a number its users can increment.
#[derive(Clone, Copy, Debug, Default)]
pub struct Counter;

impl Contract for Counter {
    fn instantiate(
        &self,
        storage: &mut ContractStorage,
        env: &ContractEnv,
        info: &MessageInfo,
        msg: &[u8],
    ) -> LedgerResult<ContractResponse> {
        let msg: CounterInstantiateMsg = from_json(msg)?;
        storage.save(COUNT_KEY, &msg.count)?;
        storage.save(OWNER_KEY, &info.sender)?;
        Ok(ContractResponse::new().add_event(
            Event::new("counter")
                .add_attribute("action", "instantiate")
                .add_attribute("contract", env.address.as_str()),
        ))
    }

    fn execute(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        info: &MessageInfo,
        msg: &[u8],
    ) -> LedgerResult<ContractResponse> {
        let count = match from_json(msg)? {
            CounterExecuteMsg::Increment {} => storage.load::<u64>(COUNT_KEY)? + 1,
            CounterExecuteMsg::Reset { count } => {
                only_owner(storage, info)?;
                count
            }
        };
        storage.save(COUNT_KEY, &count)?;
        Ok(ContractResponse::new().set_data(to_json_binary(&CountResponse { count })?))
    }

    fn query(&self, storage: &ContractStorage, _env: &ContractEnv, msg: &[u8]) -> LedgerResult<Binary> {
        match from_json(msg)? {
            CounterQueryMsg::GetCount {} => Ok(to_json_binary(&CountResponse {
                count: storage.load(COUNT_KEY)?,
            })?),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ReflectInstantiateMsg {}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReflectExecuteMsg {
    /// Dispatches the messages with the contract as sender. Only the owner
    /// and the contract itself may call this.
    ReflectMsgs { msgs: Vec<Msg> },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReflectQueryMsg {
    Owner {},
    /// Returns [`PacketCountsResponse`]
    PacketCounts {},
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct OwnerResponse {
    pub owner: Addr,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct PacketCountsResponse {
    pub received: u64,
    pub acknowledged: u64,
    pub timed_out: u64,
}

/// Executes whatever its owner asks it to, and speaks IBC on its own port.
#[derive(Clone, Copy, Debug, Default)]
pub struct Reflect;

impl Contract for Reflect {
    fn instantiate(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        info: &MessageInfo,
        msg: &[u8],
    ) -> LedgerResult<ContractResponse> {
        let _: ReflectInstantiateMsg = from_json(msg)?;
        storage.save(OWNER_KEY, &info.sender)?;
        Ok(ContractResponse::new())
    }

    fn execute(
        &self,
        storage: &mut ContractStorage,
        env: &ContractEnv,
        info: &MessageInfo,
        msg: &[u8],
    ) -> LedgerResult<ContractResponse> {
        match from_json(msg)? {
            ReflectExecuteMsg::ReflectMsgs { msgs } => {
                if info.sender != env.address {
                    only_owner(storage, info)?;
                }
                if msgs.is_empty() {
                    return Err(LedgerError::contract_err("must reflect at least one message"));
                }
                Ok(ContractResponse {
                    messages: msgs,
                    ..ContractResponse::default()
                })
            }
        }
    }

    fn query(&self, storage: &ContractStorage, _env: &ContractEnv, msg: &[u8]) -> LedgerResult<Binary> {
        match from_json(msg)? {
            ReflectQueryMsg::Owner {} => Ok(to_json_binary(&OwnerResponse {
                owner: load_owner(storage)?,
            })?),
            ReflectQueryMsg::PacketCounts {} => Ok(to_json_binary(&PacketCountsResponse {
                received: storage.may_load(RECEIVED_KEY)?.unwrap_or_default(),
                acknowledged: storage.may_load(ACKNOWLEDGED_KEY)?.unwrap_or_default(),
                timed_out: storage.may_load(TIMED_OUT_KEY)?.unwrap_or_default(),
            })?),
        }
    }

    fn ibc(&self) -> Option<&dyn IbcModule> {
        Some(self)
    }
}

impl IbcModule for Reflect {
    fn channel_open(
        &self,
        _storage: &mut ContractStorage,
        _env: &ContractEnv,
        channel: &IbcChannel,
        counterparty_version: Option<&str>,
    ) -> LedgerResult<String> {
        Ok(counterparty_version.unwrap_or(&channel.version).to_string())
    }

    fn packet_receive(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        packet: &Packet,
    ) -> LedgerResult<ReceiveResponse> {
        bump(storage, RECEIVED_KEY)?;
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
        Ok(ContractResponse::new())
    }

    fn packet_timeout(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        _packet: &Packet,
    ) -> LedgerResult<ContractResponse> {
        bump(storage, TIMED_OUT_KEY)?;
        Ok(ContractResponse::new())
    }
}
