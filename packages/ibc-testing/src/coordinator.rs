//! Owns every chain of a test and drives the handshakes between them.

use std::time::Duration;

use crate::chain::Chain;
use crate::config::CoordinatorConfig;
use crate::endpoint::Endpoint;
use crate::errors::{HarnessError, HarnessResult};
use crate::ident::ChainId;
use crate::ledger::{Genesis, Ledger};
use crate::path::Path;

pub struct Coordinator<L> {
    config: CoordinatorConfig,
    /// In creation order, so chain `i` has id `<prefix><i + 1>`
    chains: Vec<Chain<L>>,
}

impl<L: Ledger> Coordinator<L> {
    /// Creates `n_chains` chains, each with a ledger built by `ledger_factory`.
    pub fn new<F>(config: CoordinatorConfig, n_chains: usize, ledger_factory: F) -> HarnessResult<Self>
    where
        F: Fn(&Genesis) -> L,
    {
        if n_chains == 0 {
            return Err(HarnessError::validation("a coordinator needs at least one chain"));
        }
        let chains = (1..=n_chains)
            .map(|index| {
                let id = ChainId::indexed(config.chain_id_prefix(), index);
                Chain::new(id, config.chain.clone(), &ledger_factory)
            })
            .collect::<HarnessResult<Vec<_>>>()?;
        log::debug!("coordinator started with {} chains", chains.len());
        Ok(Coordinator { config, chains })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// The id of the chain with the given 1-based index.
    pub fn chain_id(&self, index: usize) -> ChainId {
        ChainId::indexed(self.config.chain_id_prefix(), index)
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        self.chains.iter().map(|chain| chain.id().clone()).collect()
    }

    fn index_of(&self, chain_id: &ChainId) -> HarnessResult<usize> {
        self.chains
            .iter()
            .position(|chain| chain.id() == chain_id)
            .ok_or_else(|| HarnessError::unknown_chain(chain_id))
    }

    pub fn chain(&self, chain_id: &ChainId) -> HarnessResult<&Chain<L>> {
        let index = self.index_of(chain_id)?;
        Ok(&self.chains[index])
    }

    pub fn chain_mut(&mut self, chain_id: &ChainId) -> HarnessResult<&mut Chain<L>> {
        let index = self.index_of(chain_id)?;
        Ok(&mut self.chains[index])
    }

    /// Mutable access to two distinct chains at once.
    pub fn chain_pair_mut(
        &mut self,
        a: &ChainId,
        b: &ChainId,
    ) -> HarnessResult<(&mut Chain<L>, &mut Chain<L>)> {
        let (ia, ib) = (self.index_of(a)?, self.index_of(b)?);
        if ia == ib {
            return Err(HarnessError::validation(format!(
                "a path needs two distinct chains, got {} twice",
                a
            )));
        }
        if ia < ib {
            let (left, right) = self.chains.split_at_mut(ib);
            Ok((&mut left[ia], &mut right[0]))
        } else {
            let (left, right) = self.chains.split_at_mut(ia);
            Ok((&mut right[0], &mut left[ib]))
        }
    }

    /// A path between two chains with default endpoint configuration.
    pub fn new_path(&self, a: &ChainId, b: &ChainId) -> HarnessResult<Path> {
        let (ia, ib) = (self.index_of(a)?, self.index_of(b)?);
        if ia == ib {
            return Err(HarnessError::validation(format!(
                "a path needs two distinct chains, got {} twice",
                a
            )));
        }
        Ok(Path::new(a.clone(), b.clone()))
    }

    /// Moves the time of every chain forward by one block time.
    pub fn increment_time(&mut self) {
        let delta = self.config.chain.block_time();
        self.increment_time_by(delta);
    }

    pub fn increment_time_by(&mut self, delta: Duration) {
        for chain in &mut self.chains {
            chain.increment_time(delta);
        }
    }

    pub fn commit_block(&mut self, chain_ids: &[ChainId]) -> HarnessResult<()> {
        for chain_id in chain_ids {
            self.chain_mut(chain_id)?.commit_block()?;
        }
        Ok(())
    }

    pub fn commit_n_blocks(&mut self, chain_id: &ChainId, n: u64) -> HarnessResult<()> {
        let chain = self.chain_mut(chain_id)?;
        for _ in 0..n {
            chain.commit_block()?;
        }
        Ok(())
    }

    /// Updates the client `endpoint` holds of `counterparty`'s chain and commits.
    pub fn update_client(&mut self, endpoint: &Endpoint, counterparty: &Endpoint) -> HarnessResult<()> {
        let (chain, counterparty_chain) =
            self.chain_pair_mut(&endpoint.chain_id, &counterparty.chain_id)?;
        if counterparty_chain.is_dirty() {
            counterparty_chain.commit_block()?;
        }
        endpoint.update_client(chain, counterparty_chain)?;
        chain.commit_block()?;
        Ok(())
    }

    /// Creates a client of each chain on the other one.
    pub fn setup_clients(&mut self, path: &mut Path) -> HarnessResult<()> {
        let (a, b) = self.chain_pair_mut(&path.endpoint_a.chain_id, &path.endpoint_b.chain_id)?;
        path.endpoint_a.create_client(a, b)?;
        path.endpoint_b.create_client(b, a)?;
        log::debug!(
            "created clients {} on {} and {} on {}",
            path.endpoint_a.client_id()?,
            a.id(),
            path.endpoint_b.client_id()?,
            b.id()
        );
        Ok(())
    }

    /// Runs the four step connection handshake, creating clients first if needed.
    pub fn setup_connections(&mut self, path: &mut Path) -> HarnessResult<()> {
        if path.endpoint_a.client_id.is_none() || path.endpoint_b.client_id.is_none() {
            self.setup_clients(path)?;
        }
        let (a, b) = self.chain_pair_mut(&path.endpoint_a.chain_id, &path.endpoint_b.chain_id)?;
        let Path {
            endpoint_a,
            endpoint_b,
        } = path;
        endpoint_a.conn_open_init(a, endpoint_b)?;
        endpoint_b.conn_open_try(b, endpoint_a, a)?;
        endpoint_a.conn_open_ack(a, endpoint_b, b)?;
        endpoint_b.conn_open_confirm(b, a)?;
        log::debug!(
            "opened connection {} on {} and {} on {}",
            endpoint_a.connection_id()?,
            a.id(),
            endpoint_b.connection_id()?,
            b.id()
        );
        Ok(())
    }

    /// Runs the four step channel handshake over the path's connection.
    ///
    /// Always opens new channels. The path only takes the new channel ids once
    /// both ends are OPEN; on failure it keeps the ids it had.
    pub fn create_channels(&mut self, path: &mut Path) -> HarnessResult<()> {
        let (a, b) = self.chain_pair_mut(&path.endpoint_a.chain_id, &path.endpoint_b.chain_id)?;
        let mut endpoint_a = path.endpoint_a.clone();
        let mut endpoint_b = path.endpoint_b.clone();
        endpoint_a.channel_id = None;
        endpoint_b.channel_id = None;
        endpoint_a.chan_open_init(a, &endpoint_b, b)?;
        endpoint_b.chan_open_try(b, &endpoint_a, a)?;
        endpoint_a.chan_open_ack(a, &endpoint_b, b)?;
        endpoint_b.chan_open_confirm(b, a)?;
        log::debug!(
            "opened {} channel {} on {} and {} on {}",
            endpoint_a.channel_config.order,
            endpoint_a.channel_id()?,
            a.id(),
            endpoint_b.channel_id()?,
            b.id()
        );
        path.endpoint_a = endpoint_a;
        path.endpoint_b = endpoint_b;
        Ok(())
    }

    /// Clients, connection and channel in one go.
    pub fn setup(&mut self, path: &mut Path) -> HarnessResult<()> {
        self.setup_connections(path)?;
        self.create_channels(path)
    }

    /// Closes the channel from side A and confirms the closure on side B.
    pub fn close_channel(&mut self, path: &mut Path) -> HarnessResult<()> {
        let (a, b) = self.chain_pair_mut(&path.endpoint_a.chain_id, &path.endpoint_b.chain_id)?;
        path.endpoint_a.chan_close_init(a)?;
        path.endpoint_b.chan_close_confirm(b, a)?;
        log::info!("closed channel {}", path);
        Ok(())
    }
}
