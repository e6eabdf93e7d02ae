use std::time::Duration;

use cosmwasm_std::{Timestamp, Uint128};
use serde::{Deserialize, Serialize};

use crate::errors::{HarnessError, HarnessResult};

const DEFAULT_CHAIN_ID_PREFIX: &str = "testchain";

const DEFAULT_BECH32_PREFIX: &str = "cosmos";

const DEFAULT_BOND_DENOM: &str = "stake";

/// 2020-01-02T15:04:05Z, the reference instant every chain starts at.
const DEFAULT_GENESIS_TIME_SECS: u64 = 1_577_977_445;

const DEFAULT_BLOCK_TIME_SECS: u64 = 5;

/// Number of committed blocks a chain keeps around for proofs.
/// Relaying always proves against the latest header, so this only limits
/// how far back tests can inspect.
const DEFAULT_MAX_HISTORY: usize = 100;

const DEFAULT_NUM_ACCOUNTS: usize = 2;

const DEFAULT_NUM_VALIDATORS: usize = 1;

const DEFAULT_VALIDATOR_POWER: u128 = 1_000_000_000;

const DEFAULT_INITIAL_BALANCE: u128 = 100_000_000_000_000;

const DEFAULT_REVISION_NUMBER: u64 = 0;

/// Configuration of a coordinator and of all chains it creates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct CoordinatorConfig {
    /// Chain ids are this prefix followed by the 1-based chain index.
    pub chain_id_prefix: Option<String>,
    /// Settings shared by every chain.
    #[serde(default)]
    pub chain: ChainConfig,
}

impl CoordinatorConfig {
    pub fn new(chain: ChainConfig) -> Self {
        Self {
            chain_id_prefix: None,
            chain,
        }
    }

    /// Parses a JSON document. Missing fields fall back to the defaults.
    pub fn from_json(json: &str) -> HarnessResult<Self> {
        serde_json::from_str(json).map_err(|e| HarnessError::parse_err("CoordinatorConfig", e))
    }

    pub fn chain_id_prefix(&self) -> &str {
        self.chain_id_prefix
            .as_deref()
            .unwrap_or(DEFAULT_CHAIN_ID_PREFIX)
    }
}

/// Per-chain settings. All fields are optional and have documented defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ChainConfig {
    /// Human readable part of all addresses generated on the chain.
    pub bech32_prefix: Option<String>,
    /// Denom of genesis balances and of validator power.
    pub bond_denom: Option<String>,
    /// Unix time (seconds) of the genesis block.
    pub genesis_time_secs: Option<u64>,
    /// Time between two blocks when no explicit delta is given.
    pub block_time_secs: Option<u64>,
    /// Number of committed block snapshots kept for proofs.
    pub max_history: Option<usize>,
    /// Number of funded genesis accounts. Account 0 is the default sender.
    pub num_accounts: Option<usize>,
    pub num_validators: Option<usize>,
    /// Voting power of each validator. Account 0 is the delegator of all of it.
    pub validator_power: Option<u128>,
    /// Genesis balance of every account in the bond denom.
    pub initial_balance: Option<u128>,
    pub revision_number: Option<u64>,
}

impl ChainConfig {
    pub fn bech32_prefix(&self) -> &str {
        self.bech32_prefix.as_deref().unwrap_or(DEFAULT_BECH32_PREFIX)
    }

    pub fn bond_denom(&self) -> &str {
        self.bond_denom.as_deref().unwrap_or(DEFAULT_BOND_DENOM)
    }

    pub fn genesis_time(&self) -> Timestamp {
        Timestamp::from_seconds(
            self.genesis_time_secs
                .unwrap_or(DEFAULT_GENESIS_TIME_SECS),
        )
    }

    pub fn block_time(&self) -> Duration {
        Duration::from_secs(self.block_time_secs.unwrap_or(DEFAULT_BLOCK_TIME_SECS))
    }

    pub fn max_history(&self) -> usize {
        self.max_history.unwrap_or(DEFAULT_MAX_HISTORY).max(1)
    }

    pub fn num_accounts(&self) -> usize {
        self.num_accounts.unwrap_or(DEFAULT_NUM_ACCOUNTS).max(1)
    }

    pub fn num_validators(&self) -> usize {
        self.num_validators
            .unwrap_or(DEFAULT_NUM_VALIDATORS)
            .max(1)
    }

    pub fn validator_power(&self) -> Uint128 {
        Uint128::new(self.validator_power.unwrap_or(DEFAULT_VALIDATOR_POWER))
    }

    pub fn initial_balance(&self) -> Uint128 {
        Uint128::new(self.initial_balance.unwrap_or(DEFAULT_INITIAL_BALANCE))
    }

    pub fn revision_number(&self) -> u64 {
        self.revision_number.unwrap_or(DEFAULT_REVISION_NUMBER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_work() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.chain_id_prefix(), "testchain");
        assert_eq!(config.chain.bech32_prefix(), "cosmos");
        assert_eq!(config.chain.bond_denom(), "stake");
        assert_eq!(config.chain.block_time(), Duration::from_secs(5));
        assert_eq!(config.chain.genesis_time().seconds(), 1_577_977_445);
        assert_eq!(config.chain.num_accounts(), 2);
        assert_eq!(config.chain.revision_number(), 0);
    }

    #[test]
    fn from_json_works() {
        let config = CoordinatorConfig::from_json(
            r#"{"chain_id_prefix":"zone","chain":{"bech32_prefix":"bbn","block_time_secs":7}}"#,
        )
        .unwrap();
        assert_eq!(config.chain_id_prefix(), "zone");
        assert_eq!(config.chain.bech32_prefix(), "bbn");
        assert_eq!(config.chain.block_time(), Duration::from_secs(7));
        // untouched fields keep their defaults
        assert_eq!(config.chain.bond_denom(), "stake");
    }

    #[test]
    fn from_json_accepts_empty_document() {
        let config = CoordinatorConfig::from_json("{}").unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn from_json_rejects_garbage() {
        let err = CoordinatorConfig::from_json("[1, 2").unwrap_err();
        match err {
            HarnessError::ParseErr { target_type, .. } => {
                assert_eq!(target_type, "CoordinatorConfig")
            }
            e => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn zero_sizes_are_clamped() {
        let chain = ChainConfig {
            max_history: Some(0),
            num_accounts: Some(0),
            num_validators: Some(0),
            ..ChainConfig::default()
        };
        assert_eq!(chain.max_history(), 1);
        assert_eq!(chain.num_accounts(), 1);
        assert_eq!(chain.num_validators(), 1);
    }
}
