//! One simulated chain: a [`Ledger`] plus the IBC core, block production and
//! the account registry.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use cosmwasm_std::{from_json, Addr, Binary, Coin, Event, Timestamp, Uint128};
use serde::de::DeserializeOwned;

use crate::account::{
    genesis_accounts, genesis_validators, module_address, new_account, Account, ValidatorSet,
};
use crate::config::ChainConfig;
use crate::errors::{HarnessError, HarnessResult};
use crate::height::Height;
use crate::ibc::{
    compute_root, Channel, CommitmentProof, Delivery, Header, IbcStore, Order, Packet,
    ProvableEntries, RecvOutcome, StdAck,
};
use crate::ident::{ChainId, ChannelId, ClientId, ConnectionId, PortId};
use crate::ledger::{AppResponse, BalanceResponse, BlockInfo, Genesis, Ledger, LedgerQuery};
use crate::msg::{BankMsg, IbcAppMsg, IbcMsg, Msg, MsgResponse};

/// A signed batch of messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tx {
    pub sender: Addr,
    /// Must equal the sender's current account sequence
    pub sequence: u64,
    pub msgs: Vec<Msg>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxResponse {
    /// One entry per message of the batch, in order
    pub msg_responses: Vec<MsgResponse>,
    pub events: Vec<Event>,
    /// Packets sent while executing the batch
    pub packets: Vec<Packet>,
}

#[derive(Clone, Debug)]
struct CommittedBlock {
    header: Header,
    entries: Arc<ProvableEntries>,
}

impl CommittedBlock {
    fn new(
        chain_id: &ChainId,
        height: Height,
        time: Timestamp,
        validators: &ValidatorSet,
        entries: ProvableEntries,
    ) -> Self {
        CommittedBlock {
            header: Header {
                chain_id: chain_id.clone(),
                height,
                time,
                root: compute_root(&entries),
                validators_hash: validators.hash(),
            },
            entries: Arc::new(entries),
        }
    }

    fn proof(&self) -> CommitmentProof {
        CommitmentProof::new(self.header.height, Arc::clone(&self.entries))
    }
}

pub struct Chain<L> {
    id: ChainId,
    config: ChainConfig,
    ledger: L,
    ibc: IbcStore,
    accounts: Vec<Account>,
    validators: ValidatorSet,
    ibc_module: Addr,
    /// Height of the block currently being built
    height: Height,
    /// Time of the block currently being built
    time: Timestamp,
    latest: CommittedBlock,
    /// Older committed blocks, oldest first
    history: VecDeque<CommittedBlock>,
    /// Whether state changed since the latest commit
    dirty: bool,
}

impl<L: Ledger> Chain<L> {
    /// Creates the chain and commits its genesis block at height 1.
    pub fn new<F>(id: ChainId, config: ChainConfig, ledger_factory: F) -> HarnessResult<Self>
    where
        F: FnOnce(&Genesis) -> L,
    {
        let prefix = config.bech32_prefix();
        let accounts = genesis_accounts(prefix, &id, config.num_accounts())?;
        let validators = genesis_validators(
            prefix,
            &id,
            config.num_validators(),
            config.validator_power(),
        )?;
        let ibc_module = module_address(prefix, "ibc")?;
        let gov_module = module_address(prefix, "gov")?;
        let genesis = Genesis {
            chain_id: id.clone(),
            bech32_prefix: prefix.to_string(),
            bond_denom: config.bond_denom().to_string(),
            genesis_time: config.genesis_time(),
            accounts: accounts.clone(),
            initial_balance: config.initial_balance(),
            validators: validators.clone(),
            delegator: accounts[0].address.clone(),
            ibc_module: ibc_module.clone(),
            gov_module,
        };
        let ledger = ledger_factory(&genesis);

        let ibc = IbcStore::new();
        let genesis_height = Height::new(config.revision_number(), 1);
        let latest = CommittedBlock::new(
            &id,
            genesis_height,
            config.genesis_time(),
            &validators,
            ibc.provable_entries()?,
        );
        let time = config
            .genesis_time()
            .plus_nanos(duration_nanos(config.block_time()));
        log::debug!("created chain {} with {} accounts", id, accounts.len());
        Ok(Chain {
            id,
            config,
            ledger,
            ibc,
            accounts,
            validators,
            ibc_module,
            height: genesis_height.increment(),
            time,
            latest,
            history: VecDeque::new(),
            dirty: false,
        })
    }

    pub fn id(&self) -> &ChainId {
        &self.id
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ibc(&self) -> &IbcStore {
        &self.ibc
    }

    /// Height of the block currently being built.
    pub fn height(&self) -> Height {
        self.height
    }

    /// Time of the block currently being built.
    pub fn time(&self) -> Timestamp {
        self.time
    }

    pub fn block_info(&self) -> BlockInfo {
        BlockInfo {
            chain_id: self.id.clone(),
            height: self.height.revision_height,
            time: self.time,
        }
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, address: &Addr) -> Option<&Account> {
        self.accounts.iter().find(|a| a.address == *address)
    }

    /// Account 0, the default signer. It also holds all bonded power.
    pub fn sender(&self) -> &Addr {
        &self.accounts[0].address
    }

    /// The module account that sends IBC callbacks to applications.
    pub fn ibc_module_address(&self) -> &Addr {
        &self.ibc_module
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Applies a signed batch. All messages succeed or none has any effect.
    pub fn submit_tx(&mut self, tx: Tx) -> HarnessResult<TxResponse> {
        let index = self
            .accounts
            .iter()
            .position(|a| a.address == tx.sender)
            .ok_or_else(|| {
                HarnessError::validation(format!("{} is not an account on {}", tx.sender, self.id))
            })?;
        let expected = self.accounts[index].sequence;
        if tx.sequence != expected {
            return Err(HarnessError::validation(format!(
                "account sequence mismatch for {}: expected {}, got {}",
                tx.sender, expected, tx.sequence
            )));
        }
        if tx.msgs.is_empty() {
            return Err(HarnessError::validation("transaction contains no messages"));
        }

        let response = self.atomically(|staging| staging.execute(&tx.sender, &tx.msgs))?;
        self.accounts[index].sequence += 1;
        log::trace!(
            "{} applied {} messages from {} at {}",
            self.id,
            tx.msgs.len(),
            tx.sender,
            self.height
        );
        Ok(response)
    }

    /// Signs `msgs` with the sender's current sequence and applies them.
    pub fn submit_messages(&mut self, sender: &Addr, msgs: Vec<Msg>) -> HarnessResult<TxResponse> {
        let sequence = self
            .account(sender)
            .map(|a| a.sequence)
            .ok_or_else(|| {
                HarnessError::validation(format!("{} is not an account on {}", sender, self.id))
            })?;
        self.submit_tx(Tx {
            sender: sender.clone(),
            sequence,
            msgs,
        })
    }

    /// Applies `msgs` from the default sender and commits the block.
    pub fn send_msgs(&mut self, msgs: Vec<Msg>) -> HarnessResult<TxResponse> {
        let sender = self.sender().clone();
        let response = self.submit_messages(&sender, msgs)?;
        self.commit_block()?;
        Ok(response)
    }

    /// Registers a new account, funded by the default sender.
    pub fn create_account(&mut self, funds: Vec<Coin>) -> HarnessResult<Addr> {
        let account = new_account(self.config.bech32_prefix(), &self.id, self.accounts.len())?;
        let address = account.address.clone();
        if !funds.is_empty() {
            let sender = self.sender().clone();
            self.submit_messages(
                &sender,
                vec![BankMsg::Send {
                    to_address: address.to_string(),
                    amount: funds,
                }
                .into()],
            )?;
        }
        self.accounts.push(account);
        Ok(address)
    }

    pub fn query(&self, request: &LedgerQuery) -> HarnessResult<Binary> {
        Ok(self.ledger.query_state(&self.block_info(), request)?)
    }

    pub fn query_json<T: DeserializeOwned>(&self, request: &LedgerQuery) -> HarnessResult<T> {
        let response = self.query(request)?;
        from_json(&response).map_err(|e| HarnessError::parse_err(std::any::type_name::<T>(), e))
    }

    pub fn balance(&self, address: &Addr, denom: &str) -> HarnessResult<Uint128> {
        let response: BalanceResponse = self.query_json(&LedgerQuery::Balance {
            address: address.to_string(),
            denom: denom.to_string(),
        })?;
        Ok(response.amount.amount)
    }

    /// Moves the time of the block being built forward.
    pub fn increment_time(&mut self, delta: Duration) {
        self.time = self.time.plus_nanos(duration_nanos(delta));
    }

    /// Finalizes the current block and starts the next one `delta` later.
    ///
    /// Returns the height of the committed block.
    pub fn advance_block(&mut self, delta: Duration) -> HarnessResult<Height> {
        self.atomically(|staging| {
            let app = staging.ledger.commit_block(&staging.block)?;
            staging.absorb(app, &mut TxResponse::default())
        })?;

        let committed = CommittedBlock::new(
            &self.id,
            self.height,
            self.time,
            &self.validators,
            self.ibc.provable_entries()?,
        );
        let previous = std::mem::replace(&mut self.latest, committed);
        self.history.push_back(previous);
        while self.history.len() >= self.config.max_history() {
            self.history.pop_front();
        }

        let height = self.height;
        self.height = self.height.increment();
        self.time = self.time.plus_nanos(duration_nanos(delta));
        self.dirty = false;
        log::trace!("{} committed block {}", self.id, height);
        Ok(height)
    }

    /// Finalizes the current block and starts the next one a block time later.
    pub fn commit_block(&mut self) -> HarnessResult<Height> {
        self.advance_block(self.config.block_time())
    }

    pub fn latest_header(&self) -> &Header {
        &self.latest.header
    }

    /// A header from the retained history.
    pub fn header(&self, height: Height) -> Option<&Header> {
        self.committed(height).map(|block| &block.header)
    }

    /// A proof against the latest committed block.
    pub fn query_proof(&self) -> CommitmentProof {
        self.latest.proof()
    }

    pub fn query_proof_at(&self, height: Height) -> Option<CommitmentProof> {
        self.committed(height).map(CommittedBlock::proof)
    }

    fn committed(&self, height: Height) -> Option<&CommittedBlock> {
        std::iter::once(&self.latest)
            .chain(self.history.iter())
            .find(|block| block.header.height == height)
    }

    fn atomically<T, F>(&mut self, f: F) -> HarnessResult<T>
    where
        F: FnOnce(&mut Staging<L>) -> HarnessResult<T>,
    {
        let mut staging = Staging {
            ledger: self.ledger.clone(),
            ibc: self.ibc.clone(),
            block: self.block_info(),
            ibc_module: self.ibc_module.clone(),
        };
        let out = f(&mut staging)?;
        self.ledger = staging.ledger;
        self.ibc = staging.ibc;
        self.dirty = true;
        Ok(out)
    }

    // IBC

    pub fn channel(&self, port_id: &PortId, channel_id: &ChannelId) -> HarnessResult<&Channel> {
        self.ibc.channel(port_id, channel_id)
    }

    pub fn pending_packets(&self, port_id: &PortId, channel_id: &ChannelId) -> Vec<Packet> {
        self.ibc.pending_packets(port_id, channel_id)
    }

    pub fn acknowledgement(
        &self,
        port_id: &PortId,
        channel_id: &ChannelId,
        sequence: u64,
    ) -> Option<&Binary> {
        self.ibc.acknowledgement(port_id, channel_id, sequence)
    }

    pub fn is_timed_out(&self, port_id: &PortId, channel_id: &ChannelId, sequence: u64) -> bool {
        self.ibc.is_timed_out(port_id, channel_id, sequence)
    }

    pub fn create_client(&mut self, counterparty: &Header) -> HarnessResult<ClientId> {
        self.atomically(|staging| Ok(staging.ibc.create_client(counterparty)))
    }

    pub fn update_client(&mut self, client_id: &ClientId, header: &Header) -> HarnessResult<bool> {
        self.atomically(|staging| staging.ibc.update_client(client_id, header))
    }

    pub fn conn_open_init(
        &mut self,
        client_id: &ClientId,
        counterparty_client_id: &ClientId,
        version: &str,
        delay_period: u64,
    ) -> HarnessResult<ConnectionId> {
        self.atomically(|staging| {
            staging
                .ibc
                .conn_open_init(client_id, counterparty_client_id, version, delay_period)
        })
    }

    pub fn conn_open_try(
        &mut self,
        client_id: &ClientId,
        counterparty_client_id: &ClientId,
        counterparty_connection_id: &ConnectionId,
        proof: &CommitmentProof,
    ) -> HarnessResult<ConnectionId> {
        self.atomically(|staging| {
            staging.ibc.conn_open_try(
                client_id,
                counterparty_client_id,
                counterparty_connection_id,
                proof,
            )
        })
    }

    pub fn conn_open_ack(
        &mut self,
        connection_id: &ConnectionId,
        counterparty_connection_id: &ConnectionId,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        self.atomically(|staging| {
            staging
                .ibc
                .conn_open_ack(connection_id, counterparty_connection_id, proof)
        })
    }

    pub fn conn_open_confirm(
        &mut self,
        connection_id: &ConnectionId,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        self.atomically(|staging| staging.ibc.conn_open_confirm(connection_id, proof))
    }

    pub fn chan_open_init(
        &mut self,
        port_id: &PortId,
        connection_id: &ConnectionId,
        order: Order,
        counterparty_port_id: &PortId,
        version: &str,
        proof: &CommitmentProof,
    ) -> HarnessResult<ChannelId> {
        self.atomically(|staging| {
            let channel_id = staging.ibc.chan_open_init(
                port_id,
                connection_id,
                order,
                counterparty_port_id,
                version,
                proof,
            )?;
            staging.channel_open(port_id, &channel_id, None)?;
            Ok(channel_id)
        })
    }

    pub fn chan_open_try(
        &mut self,
        port_id: &PortId,
        connection_id: &ConnectionId,
        order: Order,
        counterparty_port_id: &PortId,
        counterparty_channel_id: &ChannelId,
        proof: &CommitmentProof,
    ) -> HarnessResult<ChannelId> {
        self.atomically(|staging| {
            let (channel_id, counterparty_version) = staging.ibc.chan_open_try(
                port_id,
                connection_id,
                order,
                counterparty_port_id,
                counterparty_channel_id,
                proof,
            )?;
            staging.channel_open(port_id, &channel_id, Some(counterparty_version))?;
            Ok(channel_id)
        })
    }

    pub fn chan_open_ack(
        &mut self,
        port_id: &PortId,
        channel_id: &ChannelId,
        counterparty_channel_id: &ChannelId,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        self.atomically(|staging| {
            staging
                .ibc
                .chan_open_ack(port_id, channel_id, counterparty_channel_id, proof)?;
            let channel = staging.ibc.channel(port_id, channel_id)?.describe();
            staging.callback(IbcAppMsg::ChannelConnect { channel })?;
            Ok(())
        })
    }

    pub fn chan_open_confirm(
        &mut self,
        port_id: &PortId,
        channel_id: &ChannelId,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        self.atomically(|staging| {
            staging.ibc.chan_open_confirm(port_id, channel_id, proof)?;
            let channel = staging.ibc.channel(port_id, channel_id)?.describe();
            staging.callback(IbcAppMsg::ChannelConnect { channel })?;
            Ok(())
        })
    }

    pub fn chan_close_init(&mut self, port_id: &PortId, channel_id: &ChannelId) -> HarnessResult<()> {
        self.atomically(|staging| {
            staging.ibc.chan_close_init(port_id, channel_id)?;
            let channel = staging.ibc.channel(port_id, channel_id)?.describe();
            staging.callback(IbcAppMsg::ChannelClose { channel })?;
            Ok(())
        })
    }

    pub fn chan_close_confirm(
        &mut self,
        port_id: &PortId,
        channel_id: &ChannelId,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        self.atomically(|staging| {
            staging.ibc.chan_close_confirm(port_id, channel_id, proof)?;
            let channel = staging.ibc.channel(port_id, channel_id)?.describe();
            staging.callback(IbcAppMsg::ChannelClose { channel })?;
            Ok(())
        })
    }

    /// Delivers a packet relayed from the counterparty.
    ///
    /// Errors of the receiving application do not fail the call. They are
    /// written as an error acknowledgement and the application's changes are
    /// discarded.
    pub fn recv_packet(
        &mut self,
        packet: &Packet,
        proof: &CommitmentProof,
    ) -> HarnessResult<RecvOutcome> {
        let (height, time) = (self.height, self.time);
        self.atomically(|staging| {
            if staging.ibc.recv_packet(packet, proof, height, time)? == Delivery::TimedOut {
                return Ok(RecvOutcome::TimedOut);
            }
            let acknowledgement = staging.deliver(packet);
            staging
                .ibc
                .write_acknowledgement(packet, acknowledgement.as_slice())?;
            Ok(RecvOutcome::Received { acknowledgement })
        })
    }

    pub fn acknowledge_packet(
        &mut self,
        packet: &Packet,
        acknowledgement: &Binary,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        self.atomically(|staging| {
            staging
                .ibc
                .acknowledge_packet(packet, acknowledgement, proof)?;
            staging.callback(IbcAppMsg::PacketAck {
                packet: packet.clone(),
                acknowledgement: acknowledgement.clone(),
            })?;
            Ok(())
        })
    }

    pub fn timeout_packet(&mut self, packet: &Packet, proof: &CommitmentProof) -> HarnessResult<()> {
        self.atomically(|staging| {
            staging.ibc.timeout_packet(packet, proof)?;
            staging.callback(IbcAppMsg::PacketTimeout {
                packet: packet.clone(),
            })?;
            Ok(())
        })
    }

    pub fn timeout_on_close(
        &mut self,
        packet: &Packet,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        self.atomically(|staging| {
            staging.ibc.timeout_on_close(packet, proof)?;
            staging.callback(IbcAppMsg::PacketTimeout {
                packet: packet.clone(),
            })?;
            Ok(())
        })
    }
}

/// Copies of the ledger and IBC store that a batch is applied to.
struct Staging<L> {
    ledger: L,
    ibc: IbcStore,
    block: BlockInfo,
    ibc_module: Addr,
}

impl<L: Ledger> Staging<L> {
    fn execute(&mut self, sender: &Addr, msgs: &[Msg]) -> HarnessResult<TxResponse> {
        let mut response = TxResponse::default();
        for msg in msgs {
            match msg {
                Msg::Ibc(IbcMsg::SendPacket {
                    source_port,
                    source_channel,
                    data,
                    timeout,
                }) => {
                    let packet = self.ibc.send_packet(
                        source_port,
                        source_channel,
                        data.clone(),
                        timeout.clone(),
                    )?;
                    response.msg_responses.push(MsgResponse::SendPacket {
                        sequence: packet.sequence,
                    });
                    response.packets.push(packet);
                }
                Msg::IbcApp(_) => {
                    return Err(HarnessError::validation(
                        "IBC application callbacks can only be sent by the IBC core",
                    ))
                }
                _ => {
                    let app =
                        self.ledger
                            .apply_messages(&self.block, sender, std::slice::from_ref(msg))?;
                    self.absorb(app, &mut response)?;
                }
            }
        }
        Ok(response)
    }

    /// Merges a ledger response, sending the packets it requested.
    fn absorb(&mut self, app: AppResponse, into: &mut TxResponse) -> HarnessResult<()> {
        into.msg_responses.extend(app.msg_responses);
        into.events.extend(app.events);
        for outbound in app.packets {
            let packet = self.ibc.send_packet(
                &outbound.source_port,
                &outbound.source_channel,
                outbound.data,
                outbound.timeout,
            )?;
            into.packets.push(packet);
        }
        Ok(())
    }

    fn callback(&mut self, msg: IbcAppMsg) -> HarnessResult<TxResponse> {
        let app = self
            .ledger
            .apply_messages(&self.block, &self.ibc_module, &[Msg::IbcApp(msg)])?;
        let mut response = TxResponse::default();
        self.absorb(app, &mut response)?;
        Ok(response)
    }

    /// Runs the open callback and stores the version the application settled on.
    fn channel_open(
        &mut self,
        port_id: &PortId,
        channel_id: &ChannelId,
        counterparty_version: Option<String>,
    ) -> HarnessResult<()> {
        let channel = self.ibc.channel(port_id, channel_id)?.describe();
        let response = self.callback(IbcAppMsg::ChannelOpen {
            channel,
            counterparty_version,
        })?;
        let version = response.msg_responses.into_iter().find_map(|r| match r {
            MsgResponse::ChannelOpen { version } => Some(version),
            _ => None,
        });
        if let Some(version) = version {
            self.ibc.set_channel_version(port_id, channel_id, version)?;
        }
        Ok(())
    }

    /// Hands a packet to its application on a nested copy of the state and
    /// returns the acknowledgement to write.
    fn deliver(&mut self, packet: &Packet) -> Binary {
        let mut nested = Staging {
            ledger: self.ledger.clone(),
            ibc: self.ibc.clone(),
            block: self.block.clone(),
            ibc_module: self.ibc_module.clone(),
        };
        let result = nested
            .callback(IbcAppMsg::PacketReceive {
                packet: packet.clone(),
            })
            .and_then(|response| {
                response
                    .msg_responses
                    .into_iter()
                    .find_map(|r| match r {
                        MsgResponse::PacketReceive { acknowledgement } => Some(acknowledgement),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        HarnessError::validation("application returned no acknowledgement")
                    })
            });
        match result {
            Ok(acknowledgement) => {
                self.ledger = nested.ledger;
                self.ibc = nested.ibc;
                acknowledgement
            }
            Err(err) => {
                log::debug!(
                    "application failed to receive packet {} on {}/{}: {}",
                    packet.sequence,
                    packet.destination_port,
                    packet.destination_channel,
                    err
                );
                StdAck::error(err.to_string()).to_binary()
            }
        }
    }
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
