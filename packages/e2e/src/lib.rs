//! End-to-end consumer/provider scenario on top of `cw-ibc-testing`.
//!
//! The consumer chain runs a gateway contract that instantiates its own
//! staking vault and registers both with the provider chain over an ordered
//! channel to the provider's native `provider` port.

mod clients;
mod contracts;
mod helpers;
mod setup;

pub use clients::{ConsumerClient, ConsumerContracts, ProviderClient};
pub use contracts::{
    BondedResponse, ConsumerRecord, Gateway, GatewayConfigResponse, GatewayExecuteMsg,
    GatewayInstantiateMsg, GatewayQueryMsg, ProviderModule, ProviderPacket, Vault,
    VaultExecuteMsg, VaultInstantiateMsg, VaultQueryMsg, CHANNEL_VERSION, GATEWAY_WASM,
    PROVIDER_PORT, VAULT_WASM,
};
pub use helpers::{instantiate_contract, submit_gov_proposal, vote_and_pass_gov_proposal};
pub use setup::{
    example_ledger, pending_registrations, setup_example_chains, setup_integration, Example,
    Integration,
};
