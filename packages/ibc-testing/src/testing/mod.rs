// The external interface is `use cw_ibc_testing::testing::X` for all mock ledger symbols, no matter where they live internally.

mod bank;
mod contracts;
mod gov;
mod ledger;
mod modules;
mod storage;
mod wasm;

pub use contracts::{
    CountResponse, Counter, CounterExecuteMsg, CounterInstantiateMsg, CounterQueryMsg,
    OwnerResponse, PacketCountsResponse, Reflect, ReflectExecuteMsg, ReflectInstantiateMsg,
    ReflectQueryMsg, COUNTER_WASM, REFLECT_WASM,
};
pub use ledger::{MockLedger, MAX_CALL_DEPTH};
pub use modules::{
    Contract, ContractEnv, ContractResponse, EchoModule, IbcModule, ReceiveResponse,
    ACKNOWLEDGED_KEY, ECHO_FAIL, RECEIVED_KEY, TIMED_OUT_KEY,
};
pub use storage::ContractStorage;
pub use wasm::checksum;

use crate::chain::Chain;
use crate::config::{ChainConfig, CoordinatorConfig};
use crate::coordinator::Coordinator;
use crate::ident::ChainId;

/// A single chain with default settings running a [`MockLedger`].
pub fn mock_chain(id: &str) -> Chain<MockLedger> {
    Chain::new(ChainId::new(id), ChainConfig::default(), MockLedger::new).unwrap()
}

/// A coordinator over `n_chains` default chains running a [`MockLedger`].
pub fn mock_coordinator(n_chains: usize) -> Coordinator<MockLedger> {
    mock_coordinator_with_config(CoordinatorConfig::default(), n_chains)
}

pub fn mock_coordinator_with_config(
    config: CoordinatorConfig,
    n_chains: usize,
) -> Coordinator<MockLedger> {
    Coordinator::new(config, n_chains, MockLedger::new).unwrap()
}
