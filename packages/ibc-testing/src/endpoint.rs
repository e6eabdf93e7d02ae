//! One side of a path: the client, connection and channel a chain uses to
//! talk to its counterparty, and the handshake steps run on that side.
//!
//! Every step updates this chain's client with the counterparty's latest
//! header, proves the counterparty's state, executes the step and commits a
//! block so the counterparty can prove the result in turn.

use crate::chain::Chain;
use crate::errors::{HarnessError, HarnessResult};
use crate::ibc::Order;
use crate::ident::{ChainId, ChannelId, ClientId, ConnectionId, PortId};
use crate::ledger::Ledger;

pub const DEFAULT_CONNECTION_VERSION: &str = "1";
pub const DEFAULT_PORT: &str = "mock";
pub const DEFAULT_CHANNEL_VERSION: &str = "mock-version";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub version: String,
    pub delay_period: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            version: DEFAULT_CONNECTION_VERSION.to_string(),
            delay_period: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    pub port_id: PortId,
    pub version: String,
    pub order: Order,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            port_id: PortId::from(DEFAULT_PORT),
            version: DEFAULT_CHANNEL_VERSION.to_string(),
            order: Order::Unordered,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub chain_id: ChainId,
    pub client_id: Option<ClientId>,
    pub connection_id: Option<ConnectionId>,
    pub channel_id: Option<ChannelId>,
    pub connection_config: ConnectionConfig,
    pub channel_config: ChannelConfig,
}

impl Endpoint {
    pub fn new(chain_id: ChainId) -> Self {
        Endpoint {
            chain_id,
            client_id: None,
            connection_id: None,
            channel_id: None,
            connection_config: ConnectionConfig::default(),
            channel_config: ChannelConfig::default(),
        }
    }

    pub fn port_id(&self) -> &PortId {
        &self.channel_config.port_id
    }

    pub fn client_id(&self) -> HarnessResult<&ClientId> {
        self.client_id.as_ref().ok_or_else(|| {
            HarnessError::protocol_violation(format!("endpoint on {} has no client", self.chain_id))
        })
    }

    pub fn connection_id(&self) -> HarnessResult<&ConnectionId> {
        self.connection_id.as_ref().ok_or_else(|| {
            HarnessError::protocol_violation(format!(
                "endpoint on {} has no connection",
                self.chain_id
            ))
        })
    }

    pub fn channel_id(&self) -> HarnessResult<&ChannelId> {
        self.channel_id.as_ref().ok_or_else(|| {
            HarnessError::protocol_violation(format!("endpoint on {} has no channel", self.chain_id))
        })
    }

    fn check_chain<L: Ledger>(&self, chain: &Chain<L>) -> HarnessResult<()> {
        if *chain.id() != self.chain_id {
            return Err(HarnessError::validation(format!(
                "endpoint of {} used with chain {}",
                self.chain_id,
                chain.id()
            )));
        }
        Ok(())
    }

    /// Creates a client of the counterparty chain on this chain.
    pub fn create_client<L: Ledger>(
        &mut self,
        chain: &mut Chain<L>,
        counterparty_chain: &Chain<L>,
    ) -> HarnessResult<()> {
        self.check_chain(chain)?;
        let client_id = chain.create_client(counterparty_chain.latest_header())?;
        self.client_id = Some(client_id);
        chain.commit_block()?;
        Ok(())
    }

    /// Brings this chain's client up to the counterparty's latest header.
    /// Does not commit.
    pub fn update_client<L: Ledger>(
        &self,
        chain: &mut Chain<L>,
        counterparty_chain: &Chain<L>,
    ) -> HarnessResult<()> {
        self.check_chain(chain)?;
        chain.update_client(self.client_id()?, counterparty_chain.latest_header())?;
        Ok(())
    }

    pub fn conn_open_init<L: Ledger>(
        &mut self,
        chain: &mut Chain<L>,
        counterparty: &Endpoint,
    ) -> HarnessResult<()> {
        self.check_chain(chain)?;
        let connection_id = chain.conn_open_init(
            self.client_id()?,
            counterparty.client_id()?,
            &self.connection_config.version,
            self.connection_config.delay_period,
        )?;
        self.connection_id = Some(connection_id);
        chain.commit_block()?;
        Ok(())
    }

    pub fn conn_open_try<L: Ledger>(
        &mut self,
        chain: &mut Chain<L>,
        counterparty: &Endpoint,
        counterparty_chain: &Chain<L>,
    ) -> HarnessResult<()> {
        self.update_client(chain, counterparty_chain)?;
        let connection_id = chain.conn_open_try(
            self.client_id()?,
            counterparty.client_id()?,
            counterparty.connection_id()?,
            &counterparty_chain.query_proof(),
        )?;
        self.connection_id = Some(connection_id);
        chain.commit_block()?;
        Ok(())
    }

    pub fn conn_open_ack<L: Ledger>(
        &mut self,
        chain: &mut Chain<L>,
        counterparty: &Endpoint,
        counterparty_chain: &Chain<L>,
    ) -> HarnessResult<()> {
        self.update_client(chain, counterparty_chain)?;
        chain.conn_open_ack(
            self.connection_id()?,
            counterparty.connection_id()?,
            &counterparty_chain.query_proof(),
        )?;
        chain.commit_block()?;
        Ok(())
    }

    pub fn conn_open_confirm<L: Ledger>(
        &mut self,
        chain: &mut Chain<L>,
        counterparty_chain: &Chain<L>,
    ) -> HarnessResult<()> {
        self.update_client(chain, counterparty_chain)?;
        chain.conn_open_confirm(self.connection_id()?, &counterparty_chain.query_proof())?;
        chain.commit_block()?;
        Ok(())
    }

    /// Needs the connection OPEN on both chains.
    pub fn chan_open_init<L: Ledger>(
        &mut self,
        chain: &mut Chain<L>,
        counterparty: &Endpoint,
        counterparty_chain: &Chain<L>,
    ) -> HarnessResult<()> {
        self.update_client(chain, counterparty_chain)?;
        let channel_id = chain.chan_open_init(
            self.port_id(),
            self.connection_id()?,
            self.channel_config.order,
            counterparty.port_id(),
            &self.channel_config.version,
            &counterparty_chain.query_proof(),
        )?;
        self.channel_id = Some(channel_id);
        chain.commit_block()?;
        Ok(())
    }

    pub fn chan_open_try<L: Ledger>(
        &mut self,
        chain: &mut Chain<L>,
        counterparty: &Endpoint,
        counterparty_chain: &Chain<L>,
    ) -> HarnessResult<()> {
        self.update_client(chain, counterparty_chain)?;
        let channel_id = chain.chan_open_try(
            self.port_id(),
            self.connection_id()?,
            self.channel_config.order,
            counterparty.port_id(),
            counterparty.channel_id()?,
            &counterparty_chain.query_proof(),
        )?;
        self.channel_id = Some(channel_id);
        chain.commit_block()?;
        Ok(())
    }

    pub fn chan_open_ack<L: Ledger>(
        &mut self,
        chain: &mut Chain<L>,
        counterparty: &Endpoint,
        counterparty_chain: &Chain<L>,
    ) -> HarnessResult<()> {
        self.update_client(chain, counterparty_chain)?;
        chain.chan_open_ack(
            self.port_id(),
            self.channel_id()?,
            counterparty.channel_id()?,
            &counterparty_chain.query_proof(),
        )?;
        chain.commit_block()?;
        Ok(())
    }

    pub fn chan_open_confirm<L: Ledger>(
        &mut self,
        chain: &mut Chain<L>,
        counterparty_chain: &Chain<L>,
    ) -> HarnessResult<()> {
        self.update_client(chain, counterparty_chain)?;
        chain.chan_open_confirm(
            self.port_id(),
            self.channel_id()?,
            &counterparty_chain.query_proof(),
        )?;
        chain.commit_block()?;
        Ok(())
    }

    pub fn chan_close_init<L: Ledger>(&mut self, chain: &mut Chain<L>) -> HarnessResult<()> {
        self.check_chain(chain)?;
        chain.chan_close_init(self.port_id(), self.channel_id()?)?;
        chain.commit_block()?;
        Ok(())
    }

    pub fn chan_close_confirm<L: Ledger>(
        &mut self,
        chain: &mut Chain<L>,
        counterparty_chain: &Chain<L>,
    ) -> HarnessResult<()> {
        self.update_client(chain, counterparty_chain)?;
        chain.chan_close_confirm(
            self.port_id(),
            self.channel_id()?,
            &counterparty_chain.query_proof(),
        )?;
        chain.commit_block()?;
        Ok(())
    }
}
