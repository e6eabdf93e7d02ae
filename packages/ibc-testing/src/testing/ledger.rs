use std::collections::BTreeMap;
use std::sync::Arc;

use cosmwasm_std::{to_json_binary, Addr, Binary, Coin, Event, MessageInfo};

use super::bank::{Bank, Staking};
use super::contracts::{Counter, Reflect, COUNTER_WASM, REFLECT_WASM};
use super::gov::{Gov, NewProposal, Verdict};
use super::modules::{Contract, ContractEnv, ContractResponse, EchoModule, IbcModule};
use super::storage::ContractStorage;
use super::wasm::{Instance, Wasm};
use crate::account::{contract_address, module_address};
use crate::endpoint::DEFAULT_PORT;
use crate::errors::{LedgerError, LedgerResult};
use crate::ident::{ChainId, PortId};
use crate::ledger::{
    AllBalancesResponse, AppResponse, BalanceResponse, BlockInfo, CodeInfoResponse,
    ContractInfoResponse, ContractsByCodeResponse, Genesis, GovParams, Ledger, LedgerQuery,
    OutboundPacket, ProposalResponse, ProposalStatus,
};
use crate::msg::{BankMsg, GovMsg, IbcAppMsg, IbcMsg, Msg, MsgResponse, WasmMsg};

/// How deep contracts may nest sub-messages.
pub const MAX_CALL_DEPTH: usize = 10;

#[derive(Clone)]
struct NativeModule {
    handler: Arc<dyn IbcModule>,
    storage: ContractStorage,
}

/// In-memory ledger with a bank, bonded power, governance, a mock contract
/// engine and native IBC modules.
///
/// Every chain built on it starts with the [`Counter`] and [`Reflect`] codes in
/// the library and an [`EchoModule`] bound to the `mock` port.
#[derive(Clone)]
pub struct MockLedger {
    chain_id: ChainId,
    bech32_prefix: String,
    ibc_module: Addr,
    bank: Bank,
    staking: Staking,
    gov: Gov,
    wasm: Wasm,
    modules: BTreeMap<PortId, NativeModule>,
}

impl MockLedger {
    pub fn new(genesis: &Genesis) -> Self {
        let mut bank = Bank::default();
        for account in &genesis.accounts {
            bank.set_balance(
                &account.address,
                Coin::new(genesis.initial_balance, &genesis.bond_denom),
            );
        }
        let mut staking = Staking::default();
        staking.bond(&genesis.delegator, genesis.validators.total_power());

        let ledger = MockLedger {
            chain_id: genesis.chain_id.clone(),
            bech32_prefix: genesis.bech32_prefix.clone(),
            ibc_module: genesis.ibc_module.clone(),
            bank,
            staking,
            gov: Gov::new(
                genesis.gov_module.clone(),
                GovParams::with_denom(&genesis.bond_denom),
            ),
            wasm: Wasm::default(),
            modules: BTreeMap::new(),
        };
        ledger
            .with_contract(COUNTER_WASM, Counter)
            .with_contract(REFLECT_WASM, Reflect)
            .with_module(DEFAULT_PORT, EchoModule)
    }

    /// Makes `wasm` storable, backed by `contract`.
    pub fn with_contract(mut self, wasm: &[u8], contract: impl Contract + 'static) -> Self {
        self.wasm.register(wasm, Arc::new(contract));
        self
    }

    /// Binds a native module to a port.
    pub fn with_module(mut self, port_id: impl Into<PortId>, module: impl IbcModule + 'static) -> Self {
        self.modules.insert(
            port_id.into(),
            NativeModule {
                handler: Arc::new(module),
                storage: ContractStorage::new(),
            },
        );
        self
    }

    pub fn with_gov_params(mut self, params: GovParams) -> Self {
        self.gov.params = params;
        self
    }

    pub fn gov_module(&self) -> &Addr {
        &self.gov.module
    }

    pub fn module_storage(&self, port_id: &PortId) -> Option<&ContractStorage> {
        self.modules.get(port_id).map(|module| &module.storage)
    }

    pub fn contract_storage(&self, address: &Addr) -> Option<&ContractStorage> {
        self.wasm.instance(address).ok().map(|instance| &instance.storage)
    }

    fn addr_validate(&self, address: &str) -> LedgerResult<Addr> {
        let (hrp, _) = bech32::decode(address).map_err(|e| {
            LedgerError::invalid_request(format!("invalid address {}: {}", address, e))
        })?;
        if hrp.as_str() != self.bech32_prefix {
            return Err(LedgerError::invalid_request(format!(
                "address {} does not have prefix {}",
                address, self.bech32_prefix
            )));
        }
        Ok(Addr::unchecked(address))
    }

    fn module_account(&self, port_id: &PortId) -> LedgerResult<Addr> {
        module_address(&self.bech32_prefix, port_id.as_str())
            .map_err(|e| LedgerError::unknown(e.to_string()))
    }

    fn env(block: &BlockInfo, address: &Addr, port_id: PortId) -> ContractEnv {
        ContractEnv {
            block: block.clone(),
            address: address.clone(),
            port_id,
        }
    }

    fn dispatch(
        &mut self,
        block: &BlockInfo,
        sender: &Addr,
        msg: &Msg,
        depth: usize,
        out: &mut AppResponse,
    ) -> LedgerResult<MsgResponse> {
        if depth > MAX_CALL_DEPTH {
            return Err(LedgerError::invalid_request(format!(
                "sub-messages nested deeper than {}",
                MAX_CALL_DEPTH
            )));
        }
        match msg {
            Msg::Bank(BankMsg::Send { to_address, amount }) => {
                let recipient = self.addr_validate(to_address)?;
                self.bank.send(sender, &recipient, amount)?;
                out.events.push(
                    Event::new("transfer")
                        .add_attribute("sender", sender.as_str())
                        .add_attribute("recipient", recipient.as_str()),
                );
                Ok(MsgResponse::Empty {})
            }
            Msg::Gov(msg) => self.gov_msg(block, sender, msg),
            Msg::Wasm(msg) => self.wasm_msg(block, sender, msg, depth, out),
            Msg::Ibc(IbcMsg::SendPacket {
                source_port,
                source_channel,
                data,
                timeout,
            }) => {
                self.check_port_owner(sender, source_port)?;
                out.packets.push(OutboundPacket {
                    source_port: source_port.clone(),
                    source_channel: source_channel.clone(),
                    data: data.clone(),
                    timeout: timeout.clone(),
                });
                Ok(MsgResponse::Empty {})
            }
            Msg::IbcApp(msg) => {
                if *sender != self.ibc_module {
                    return Err(LedgerError::unauthorized(format!(
                        "IBC callbacks must come from {}, not {}",
                        self.ibc_module, sender
                    )));
                }
                self.ibc_app_msg(block, msg, depth, out)
            }
        }
    }

    fn check_port_owner(&self, sender: &Addr, port_id: &PortId) -> LedgerResult<()> {
        let owner = match port_id.contract() {
            Some(contract) => Addr::unchecked(contract),
            None => self.module_account(port_id)?,
        };
        if *sender != owner {
            return Err(LedgerError::unauthorized(format!(
                "{} does not own port {}",
                sender, port_id
            )));
        }
        Ok(())
    }

    fn gov_msg(&mut self, block: &BlockInfo, sender: &Addr, msg: &GovMsg) -> LedgerResult<MsgResponse> {
        match msg {
            GovMsg::SubmitProposal {
                messages,
                initial_deposit,
                title,
                summary,
            } => {
                let proposal = NewProposal {
                    messages: messages.clone(),
                    initial_deposit: initial_deposit.clone(),
                    title: title.clone(),
                    summary: summary.clone(),
                };
                let proposal_id = self.gov.submit(&mut self.bank, sender, proposal, block.time)?;
                Ok(MsgResponse::SubmitProposal { proposal_id })
            }
            GovMsg::Deposit {
                proposal_id,
                amount,
            } => {
                self.gov
                    .deposit(&mut self.bank, sender, *proposal_id, amount.clone(), block.time)?;
                Ok(MsgResponse::Empty {})
            }
            GovMsg::Vote {
                proposal_id,
                option,
            } => {
                self.gov.vote(sender, *proposal_id, *option)?;
                Ok(MsgResponse::Empty {})
            }
        }
    }

    fn wasm_msg(
        &mut self,
        block: &BlockInfo,
        sender: &Addr,
        msg: &WasmMsg,
        depth: usize,
        out: &mut AppResponse,
    ) -> LedgerResult<MsgResponse> {
        match msg {
            WasmMsg::StoreCode { wasm_byte_code } => {
                let (code_id, checksum) = self.wasm.store_code(sender, wasm_byte_code.as_slice())?;
                out.events.push(
                    Event::new("store_code")
                        .add_attribute("code_id", code_id.to_string())
                        .add_attribute("code_checksum", checksum.as_str()),
                );
                Ok(MsgResponse::StoreCode { code_id, checksum })
            }
            WasmMsg::Instantiate {
                admin,
                code_id,
                msg,
                funds,
                label,
            } => {
                let contract = self.wasm.implementation(*code_id)?;
                let admin = admin
                    .as_deref()
                    .map(|admin| self.addr_validate(admin))
                    .transpose()?;
                let seq = self.wasm.next_instance_seq();
                let address = contract_address(&self.bech32_prefix, &self.chain_id, *code_id, seq)
                    .map_err(|e| LedgerError::unknown(e.to_string()))?;
                self.wasm.add_instance(
                    address.clone(),
                    Instance {
                        code_id: *code_id,
                        creator: sender.clone(),
                        admin,
                        label: label.clone(),
                        seq,
                        storage: ContractStorage::new(),
                    },
                )?;
                self.bank.send(sender, &address, funds)?;

                let env = Self::env(block, &address, PortId::for_contract(&address));
                let info = MessageInfo {
                    sender: sender.clone(),
                    funds: funds.clone(),
                };
                let storage = &mut self.wasm.instance_mut(&address)?.storage;
                let response = contract.instantiate(storage, &env, &info, msg.as_slice())?;
                out.events.push(
                    Event::new("instantiate")
                        .add_attribute("_contract_address", address.as_str())
                        .add_attribute("code_id", code_id.to_string()),
                );
                let data = self.handle_response(block, &address, response, depth, out)?;
                Ok(MsgResponse::Instantiate { address, data })
            }
            WasmMsg::Execute {
                contract_addr,
                msg,
                funds,
            } => {
                let address = self.addr_validate(contract_addr)?;
                let contract = self.wasm.implementation(self.wasm.instance(&address)?.code_id)?;
                self.bank.send(sender, &address, funds)?;

                let env = Self::env(block, &address, PortId::for_contract(&address));
                let info = MessageInfo {
                    sender: sender.clone(),
                    funds: funds.clone(),
                };
                let storage = &mut self.wasm.instance_mut(&address)?.storage;
                let response = contract.execute(storage, &env, &info, msg.as_slice())?;
                out.events.push(
                    Event::new("execute").add_attribute("_contract_address", address.as_str()),
                );
                let data = self.handle_response(block, &address, response, depth, out)?;
                Ok(MsgResponse::Execute { data })
            }
        }
    }

    /// Runs the messages a contract or module returned, with it as sender.
    fn handle_response(
        &mut self,
        block: &BlockInfo,
        sender: &Addr,
        response: ContractResponse,
        depth: usize,
        out: &mut AppResponse,
    ) -> LedgerResult<Option<Binary>> {
        out.events.extend(response.events);
        for msg in &response.messages {
            self.dispatch(block, sender, msg, depth + 1, out)?;
        }
        Ok(response.data)
    }

    fn ibc_app_msg(
        &mut self,
        block: &BlockInfo,
        msg: &IbcAppMsg,
        depth: usize,
        out: &mut AppResponse,
    ) -> LedgerResult<MsgResponse> {
        match msg {
            IbcAppMsg::ChannelOpen {
                channel,
                counterparty_version,
            } => {
                let version =
                    self.call_ibc(block, &channel.port_id, depth, out, |module, storage, env| {
                        let version = module.channel_open(
                            storage,
                            env,
                            channel,
                            counterparty_version.as_deref(),
                        )?;
                        Ok((version, ContractResponse::default()))
                    })?;
                Ok(MsgResponse::ChannelOpen { version })
            }
            IbcAppMsg::ChannelConnect { channel } => {
                self.call_ibc(block, &channel.port_id, depth, out, |module, storage, env| {
                    Ok(((), module.channel_connect(storage, env, channel)?))
                })?;
                Ok(MsgResponse::Empty {})
            }
            IbcAppMsg::ChannelClose { channel } => {
                self.call_ibc(block, &channel.port_id, depth, out, |module, storage, env| {
                    Ok(((), module.channel_close(storage, env, channel)?))
                })?;
                Ok(MsgResponse::Empty {})
            }
            IbcAppMsg::PacketReceive { packet } => {
                let acknowledgement = self.call_ibc(
                    block,
                    &packet.destination_port,
                    depth,
                    out,
                    |module, storage, env| {
                        let received = module.packet_receive(storage, env, packet)?;
                        Ok((received.acknowledgement, received.response))
                    },
                )?;
                Ok(MsgResponse::PacketReceive { acknowledgement })
            }
            IbcAppMsg::PacketAck {
                packet,
                acknowledgement,
            } => {
                self.call_ibc(block, &packet.source_port, depth, out, |module, storage, env| {
                    Ok(((), module.packet_ack(storage, env, packet, acknowledgement)?))
                })?;
                Ok(MsgResponse::Empty {})
            }
            IbcAppMsg::PacketTimeout { packet } => {
                self.call_ibc(block, &packet.source_port, depth, out, |module, storage, env| {
                    Ok(((), module.packet_timeout(storage, env, packet)?))
                })?;
                Ok(MsgResponse::Empty {})
            }
        }
    }

    /// Calls the application bound to `port_id`: a contract for `wasm.` ports,
    /// a native module otherwise.
    fn call_ibc<T, F>(
        &mut self,
        block: &BlockInfo,
        port_id: &PortId,
        depth: usize,
        out: &mut AppResponse,
        call: F,
    ) -> LedgerResult<T>
    where
        F: FnOnce(&dyn IbcModule, &mut ContractStorage, &ContractEnv) -> LedgerResult<(T, ContractResponse)>,
    {
        let (result, response, address) = match port_id.contract() {
            Some(contract) => {
                let address = Addr::unchecked(contract);
                let implementation = self.wasm.implementation(self.wasm.instance(&address)?.code_id)?;
                let module = implementation.ibc().ok_or_else(|| {
                    LedgerError::not_found("IBC entry points of contract", &address)
                })?;
                let env = Self::env(block, &address, port_id.clone());
                let storage = &mut self.wasm.instance_mut(&address)?.storage;
                let (result, response) = call(module, storage, &env)?;
                (result, response, address)
            }
            None => {
                let address = self.module_account(port_id)?;
                let native = self
                    .modules
                    .get_mut(port_id)
                    .ok_or_else(|| LedgerError::not_found("port", port_id))?;
                let handler = Arc::clone(&native.handler);
                let env = Self::env(block, &address, port_id.clone());
                let (result, response) = call(handler.as_ref(), &mut native.storage, &env)?;
                (result, response, address)
            }
        };
        self.handle_response(block, &address, response, depth, out)?;
        Ok(result)
    }

    fn finalize_proposal(
        &mut self,
        block: &BlockInfo,
        proposal_id: u64,
        out: &mut AppResponse,
    ) -> LedgerResult<()> {
        if self.gov.proposal(proposal_id)?.status == ProposalStatus::DepositPeriod {
            self.gov
                .finish(&mut self.bank, proposal_id, ProposalStatus::Expired, true, None)?;
            log::info!("proposal {} expired without enough deposit", proposal_id);
            return Ok(());
        }

        match self.gov.tally(&self.staking, proposal_id)? {
            Verdict::Passed => {
                let messages = self.gov.proposal(proposal_id)?.messages.clone();
                let gov_module = self.gov.module.clone();
                let mut staged = self.clone();
                let mut effects = AppResponse::default();
                let executed = messages.iter().try_for_each(|msg| {
                    staged
                        .dispatch(block, &gov_module, msg, 0, &mut effects)
                        .map(|_| ())
                });
                match executed {
                    Ok(()) => {
                        *self = staged;
                        out.events.extend(effects.events);
                        out.packets.extend(effects.packets);
                        self.gov
                            .finish(&mut self.bank, proposal_id, ProposalStatus::Passed, false, None)?;
                        log::info!("proposal {} passed", proposal_id);
                    }
                    Err(err) => {
                        log::info!("proposal {} passed but failed to execute: {}", proposal_id, err);
                        self.gov.finish(
                            &mut self.bank,
                            proposal_id,
                            ProposalStatus::Failed,
                            false,
                            Some(err.to_string()),
                        )?;
                    }
                }
            }
            Verdict::Rejected => {
                self.gov
                    .finish(&mut self.bank, proposal_id, ProposalStatus::Failed, false, None)?;
                log::info!("proposal {} rejected", proposal_id);
            }
            Verdict::RejectedAndBurned => {
                self.gov
                    .finish(&mut self.bank, proposal_id, ProposalStatus::Failed, true, None)?;
                log::info!("proposal {} rejected, deposit burned", proposal_id);
            }
        }
        Ok(())
    }
}

impl Ledger for MockLedger {
    fn apply_messages(
        &mut self,
        block: &BlockInfo,
        sender: &Addr,
        msgs: &[Msg],
    ) -> LedgerResult<AppResponse> {
        let mut response = AppResponse::default();
        for msg in msgs {
            let msg_response = self.dispatch(block, sender, msg, 0, &mut response)?;
            response.msg_responses.push(msg_response);
        }
        Ok(response)
    }

    fn query_state(&self, block: &BlockInfo, request: &LedgerQuery) -> LedgerResult<Binary> {
        let response = match request {
            LedgerQuery::Balance { address, denom } => to_json_binary(&BalanceResponse {
                amount: Coin::new(self.bank.balance(&Addr::unchecked(address), denom), denom),
            })?,
            LedgerQuery::AllBalances { address } => to_json_binary(&AllBalancesResponse {
                amount: self.bank.all_balances(&Addr::unchecked(address)),
            })?,
            LedgerQuery::Proposal { proposal_id } => to_json_binary(&ProposalResponse {
                proposal: self.gov.proposal(*proposal_id)?.clone(),
            })?,
            LedgerQuery::GovParams {} => to_json_binary(&self.gov.params)?,
            LedgerQuery::CodeInfo { code_id } => {
                let code = self.wasm.code(*code_id)?;
                to_json_binary(&CodeInfoResponse {
                    code_id: *code_id,
                    creator: code.creator.clone(),
                    checksum: code.checksum.clone(),
                })?
            }
            LedgerQuery::ContractInfo { contract_addr } => {
                let address = Addr::unchecked(contract_addr);
                let instance = self.wasm.instance(&address)?;
                to_json_binary(&ContractInfoResponse {
                    code_id: instance.code_id,
                    creator: instance.creator.clone(),
                    admin: instance.admin.clone(),
                    label: instance.label.clone(),
                    ibc_port_id: PortId::for_contract(&address),
                })?
            }
            LedgerQuery::ContractsByCode { code_id } => to_json_binary(&ContractsByCodeResponse {
                contracts: self.wasm.contracts_by_code(*code_id),
            })?,
            LedgerQuery::ContractSmart { contract_addr, msg } => {
                let address = Addr::unchecked(contract_addr);
                let instance = self.wasm.instance(&address)?;
                let contract = self.wasm.implementation(instance.code_id)?;
                let env = Self::env(block, &address, PortId::for_contract(&address));
                contract.query(&instance.storage, &env, msg.as_slice())?
            }
        };
        Ok(response)
    }

    fn commit_block(&mut self, block: &BlockInfo) -> LedgerResult<AppResponse> {
        let mut out = AppResponse::default();
        for proposal_id in self.gov.due(block.time) {
            self.finalize_proposal(block, proposal_id, &mut out)?;
        }
        Ok(out)
    }
}
