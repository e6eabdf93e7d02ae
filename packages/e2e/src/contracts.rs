//! The consumer contracts and the provider's native module.

use cosmwasm_std::{from_json, to_json_binary, Addr, Binary, Event, MessageInfo, Uint128};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use cw_ibc_testing::testing::{
    Contract, ContractEnv, ContractResponse, ContractStorage, IbcModule, ReceiveResponse,
};
use cw_ibc_testing::{
    ChannelId, IbcChannel, IbcMsg, LedgerError, LedgerResult, Order, Packet, PacketTimeout,
    StdAck, WasmMsg,
};

/// Stand-in bytes of the gateway contract.
pub const GATEWAY_WASM: &[u8] = b"\0asm\x01\0\0\0gateway";
/// Stand-in bytes of the vault contract.
pub const VAULT_WASM: &[u8] = b"\0asm\x01\0\0\0vault";

/// Native port of the provider module.
pub const PROVIDER_PORT: &str = "provider";
/// The only version gateway and provider agree on.
pub const CHANNEL_VERSION: &str = "consumer-1";

const PACKET_LIFETIME_SECS: u64 = 600;

const VAULT_CODE_KEY: &[u8] = b"vault_code_id";
const VAULT_KEY: &[u8] = b"vault";
const CHANNEL_KEY: &[u8] = b"channel";
const REGISTERED_KEY: &[u8] = b"registered";
const GATEWAY_KEY: &[u8] = b"gateway";
const BONDED_PREFIX: &str = "bonded:";
const CONSUMERS_KEY: &[u8] = b"consumers";

/// Packets the gateway sends to the provider.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPacket {
    Register { gateway: String, vault: String },
}

fn check_channel(
    channel: &IbcChannel,
    counterparty_version: Option<&str>,
) -> LedgerResult<String> {
    if channel.order != Order::Ordered {
        return Err(LedgerError::contract_err(format!(
            "channel must be ORDERED, got {}",
            channel.order
        )));
    }
    let version = counterparty_version.unwrap_or(&channel.version);
    if version != CHANNEL_VERSION {
        return Err(LedgerError::contract_err(format!(
            "unsupported channel version {}, expected {}",
            version, CHANNEL_VERSION
        )));
    }
    Ok(CHANNEL_VERSION.to_string())
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct GatewayInstantiateMsg {
    pub vault_code_id: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GatewayExecuteMsg {
    /// Sent by the vault the gateway instantiated
    RegisterVault {},
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GatewayQueryMsg {
    /// Returns [`GatewayConfigResponse`]
    Config {},
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct GatewayConfigResponse {
    pub vault_code_id: u64,
    pub vault: Option<Addr>,
    /// The channel to the provider, once connected
    pub channel_id: Option<ChannelId>,
    /// Whether the provider acknowledged the registration
    pub registered: bool,
}

/// Bridges the consumer chain to the provider. Instantiates its vault on
/// creation and registers with the provider when its channel connects.
#[derive(Clone, Copy, Debug, Default)]
pub struct Gateway;

impl Contract for Gateway {
    fn instantiate(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        _info: &MessageInfo,
        msg: &[u8],
    ) -> LedgerResult<ContractResponse> {
        let msg: GatewayInstantiateMsg = from_json(msg)?;
        storage.save(VAULT_CODE_KEY, &msg.vault_code_id)?;
        storage.save(REGISTERED_KEY, &false)?;
        Ok(ContractResponse::new().add_message(WasmMsg::Instantiate {
            admin: None,
            code_id: msg.vault_code_id,
            msg: to_json_binary(&VaultInstantiateMsg {})?,
            funds: vec![],
            label: "vault".to_string(),
        }))
    }

    fn execute(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        info: &MessageInfo,
        msg: &[u8],
    ) -> LedgerResult<ContractResponse> {
        match from_json(msg)? {
            GatewayExecuteMsg::RegisterVault {} => {
                if let Some(vault) = storage.may_load::<Addr>(VAULT_KEY)? {
                    return Err(LedgerError::unauthorized(format!(
                        "vault {} is already registered",
                        vault
                    )));
                }
                storage.save(VAULT_KEY, &info.sender)?;
                Ok(ContractResponse::new().add_event(
                    Event::new("gateway").add_attribute("vault", info.sender.as_str()),
                ))
            }
        }
    }

    fn query(
        &self,
        storage: &ContractStorage,
        _env: &ContractEnv,
        msg: &[u8],
    ) -> LedgerResult<Binary> {
        match from_json(msg)? {
            GatewayQueryMsg::Config {} => Ok(to_json_binary(&GatewayConfigResponse {
                vault_code_id: storage.load(VAULT_CODE_KEY)?,
                vault: storage.may_load(VAULT_KEY)?,
                channel_id: storage.may_load(CHANNEL_KEY)?,
                registered: storage.may_load(REGISTERED_KEY)?.unwrap_or_default(),
            })?),
        }
    }

    fn ibc(&self) -> Option<&dyn IbcModule> {
        Some(self)
    }
}

impl IbcModule for Gateway {
    fn channel_open(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        channel: &IbcChannel,
        counterparty_version: Option<&str>,
    ) -> LedgerResult<String> {
        if let Some(existing) = storage.may_load::<ChannelId>(CHANNEL_KEY)? {
            return Err(LedgerError::contract_err(format!(
                "gateway already uses {}",
                existing
            )));
        }
        check_channel(channel, counterparty_version)
    }

    fn channel_connect(
        &self,
        storage: &mut ContractStorage,
        env: &ContractEnv,
        channel: &IbcChannel,
    ) -> LedgerResult<ContractResponse> {
        storage.save(CHANNEL_KEY, &channel.channel_id)?;
        let vault: Addr = storage.load(VAULT_KEY)?;
        let packet = ProviderPacket::Register {
            gateway: env.address.to_string(),
            vault: vault.to_string(),
        };
        Ok(ContractResponse::new().add_message(IbcMsg::SendPacket {
            source_port: env.port_id.clone(),
            source_channel: channel.channel_id.clone(),
            data: to_json_binary(&packet)?,
            timeout: PacketTimeout::with_timestamp(
                env.block.time.plus_seconds(PACKET_LIFETIME_SECS),
            ),
        }))
    }

    fn channel_close(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        _channel: &IbcChannel,
    ) -> LedgerResult<ContractResponse> {
        storage.remove(CHANNEL_KEY);
        storage.save(REGISTERED_KEY, &false)?;
        Ok(ContractResponse::new())
    }

    fn packet_receive(
        &self,
        _storage: &mut ContractStorage,
        _env: &ContractEnv,
        _packet: &Packet,
    ) -> LedgerResult<ReceiveResponse> {
        Err(LedgerError::contract_err("gateway does not accept packets"))
    }

    fn packet_ack(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        _packet: &Packet,
        acknowledgement: &Binary,
    ) -> LedgerResult<ContractResponse> {
        let ack: StdAck = from_json(acknowledgement)?;
        if let StdAck::Error(err) = &ack {
            log::info!("provider rejected the registration: {}", err);
        }
        storage.save(REGISTERED_KEY, &ack.is_success())?;
        Ok(ContractResponse::new())
    }

    fn packet_timeout(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        _packet: &Packet,
    ) -> LedgerResult<ContractResponse> {
        storage.save(REGISTERED_KEY, &false)?;
        Ok(ContractResponse::new())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct VaultInstantiateMsg {}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VaultExecuteMsg {
    /// Bonds the attached funds
    Bond {},
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VaultQueryMsg {
    /// Returns [`BondedResponse`]
    Bonded { address: String },
    Gateway {},
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct BondedResponse {
    pub amount: Uint128,
}

/// Holds bonded funds. Its creator is its gateway.
#[derive(Clone, Copy, Debug, Default)]
pub struct Vault;

fn bonded_key(address: &str) -> Vec<u8> {
    format!("{}{}", BONDED_PREFIX, address).into_bytes()
}

impl Contract for Vault {
    fn instantiate(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        info: &MessageInfo,
        msg: &[u8],
    ) -> LedgerResult<ContractResponse> {
        let _: VaultInstantiateMsg = from_json(msg)?;
        storage.save(GATEWAY_KEY, &info.sender)?;
        Ok(ContractResponse::new().add_message(WasmMsg::Execute {
            contract_addr: info.sender.to_string(),
            msg: to_json_binary(&GatewayExecuteMsg::RegisterVault {})?,
            funds: vec![],
        }))
    }

    fn execute(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        info: &MessageInfo,
        msg: &[u8],
    ) -> LedgerResult<ContractResponse> {
        match from_json(msg)? {
            VaultExecuteMsg::Bond {} => {
                let amount: Uint128 = info.funds.iter().map(|coin| coin.amount).sum();
                if amount.is_zero() {
                    return Err(LedgerError::contract_err("no funds to bond"));
                }
                let key = bonded_key(info.sender.as_str());
                let bonded = storage.may_load::<Uint128>(&key)?.unwrap_or_default();
                storage.save(&key, &bonded.checked_add(amount)?)?;
                Ok(ContractResponse::new())
            }
        }
    }

    fn query(
        &self,
        storage: &ContractStorage,
        _env: &ContractEnv,
        msg: &[u8],
    ) -> LedgerResult<Binary> {
        match from_json(msg)? {
            VaultQueryMsg::Bonded { address } => Ok(to_json_binary(&BondedResponse {
                amount: storage.may_load(&bonded_key(&address))?.unwrap_or_default(),
            })?),
            VaultQueryMsg::Gateway {} => {
                Ok(to_json_binary(&storage.load::<Addr>(GATEWAY_KEY)?)?)
            }
        }
    }
}

/// A consumer the provider knows about.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ConsumerRecord {
    pub channel_id: ChannelId,
    pub gateway: String,
    pub vault: String,
}

/// Native module on the provider's `provider` port. Records every consumer
/// that registers over an ordered channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProviderModule;

impl ProviderModule {
    pub fn consumers(storage: &ContractStorage) -> LedgerResult<Vec<ConsumerRecord>> {
        Ok(storage.may_load(CONSUMERS_KEY)?.unwrap_or_default())
    }
}

impl IbcModule for ProviderModule {
    fn channel_open(
        &self,
        _storage: &mut ContractStorage,
        _env: &ContractEnv,
        channel: &IbcChannel,
        counterparty_version: Option<&str>,
    ) -> LedgerResult<String> {
        check_channel(channel, counterparty_version)
    }

    fn packet_receive(
        &self,
        storage: &mut ContractStorage,
        _env: &ContractEnv,
        packet: &Packet,
    ) -> LedgerResult<ReceiveResponse> {
        match from_json(&packet.data)? {
            ProviderPacket::Register { gateway, vault } => {
                let mut consumers = ProviderModule::consumers(storage)?;
                if consumers.iter().any(|c| c.gateway == gateway) {
                    return Err(LedgerError::contract_err(format!(
                        "consumer {} is already registered",
                        gateway
                    )));
                }
                log::debug!("provider registered consumer {} with vault {}", gateway, vault);
                consumers.push(ConsumerRecord {
                    channel_id: packet.destination_channel.clone(),
                    gateway,
                    vault,
                });
                storage.save(CONSUMERS_KEY, &consumers)?;
                Ok(ReceiveResponse::new(
                    StdAck::success(b"registered".as_slice()).to_binary(),
                ))
            }
        }
    }
}
