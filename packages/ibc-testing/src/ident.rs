//! Identifiers of chains and of the IBC objects living on them.

use derive_more::{Display, From};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::{HarnessError, HarnessResult};

/// Client type used for all light clients in this harness.
pub const CLIENT_TYPE: &str = "07-tendermint";

/// Prefix of ports owned by contracts: `wasm.<contract address>`.
pub const WASM_PORT_PREFIX: &str = "wasm.";

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Debug,
    Display,
    From,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    JsonSchema,
)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        ChainId(id.into())
    }

    /// The id of the chain with the given 1-based index.
    pub fn indexed(prefix: &str, index: usize) -> Self {
        ChainId(format!("{}{}", prefix, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChainId {
    fn from(id: &str) -> Self {
        ChainId::new(id)
    }
}

macro_rules! counter_identifier {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Serialize,
            Deserialize,
            Clone,
            Debug,
            Display,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(counter: u64) -> Self {
                $name(format!("{}-{}", $prefix, counter))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Parses an identifier produced by `new`.
            pub fn parse(id: &str) -> HarnessResult<Self> {
                let counter = id
                    .strip_prefix(concat!($prefix, "-"))
                    .and_then(|n| n.parse::<u64>().ok());
                match counter {
                    Some(counter) => Ok($name::new(counter)),
                    None => Err(HarnessError::parse_err(stringify!($name), id)),
                }
            }
        }
    };
}

counter_identifier!(
    /// A light client on one chain tracking a counterparty chain.
    ClientId,
    "07-tendermint"
);
counter_identifier!(ConnectionId, "connection");
counter_identifier!(ChannelId, "channel");

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Debug,
    Display,
    From,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    JsonSchema,
)]
#[serde(transparent)]
pub struct PortId(String);

impl PortId {
    pub fn new(id: impl Into<String>) -> Self {
        PortId(id.into())
    }

    /// The port bound to a contract.
    pub fn for_contract(contract: &cosmwasm_std::Addr) -> Self {
        PortId(format!("{}{}", WASM_PORT_PREFIX, contract))
    }

    /// The contract owning this port, if it is a contract port.
    pub fn contract(&self) -> Option<&str> {
        self.0.strip_prefix(WASM_PORT_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PortId {
    fn from(id: &str) -> Self {
        PortId::new(id)
    }
}
