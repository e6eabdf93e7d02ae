use cosmwasm_std::Addr;

use cw_ibc_testing::testing::MockLedger;
use cw_ibc_testing::{
    ChainId, ChannelConfig, Coordinator, CoordinatorConfig, Genesis, HarnessResult, LedgerError,
    Order, Packet, Path, PortId, RelayReport,
};

use crate::clients::{ConsumerClient, ProviderClient};
use crate::contracts::{
    Gateway, ProviderModule, Vault, CHANNEL_VERSION, GATEWAY_WASM, PROVIDER_PORT, VAULT_WASM,
};

/// A [`MockLedger`] that knows the consumer contracts and runs the provider
/// module on its `provider` port.
pub fn example_ledger(genesis: &Genesis) -> MockLedger {
    MockLedger::new(genesis)
        .with_contract(GATEWAY_WASM, Gateway)
        .with_contract(VAULT_WASM, Vault)
        .with_module(PROVIDER_PORT, ProviderModule)
}

/// Two chains and the path between them. Nothing is opened yet.
pub struct Example {
    pub coordinator: Coordinator<MockLedger>,
    pub provider_chain: ChainId,
    pub consumer_chain: ChainId,
    /// Side A is the consumer, side B the provider
    pub path: Path,
    pub provider_denom: String,
    pub consumer_denom: String,
    /// Funded default sender of the provider chain
    pub provider_actor: Addr,
}

/// The result of [`setup_integration`].
#[derive(Debug)]
pub struct Integration {
    pub consumer: ConsumerClient,
    pub provider: ProviderClient,
    /// The registration packets relayed while setting up
    pub report: RelayReport,
}

pub fn setup_example_chains() -> HarnessResult<Example> {
    let coordinator = Coordinator::new(CoordinatorConfig::default(), 2, example_ledger)?;
    let provider_chain = coordinator.chain_id(1);
    let consumer_chain = coordinator.chain_id(2);
    let path = coordinator.new_path(&consumer_chain, &provider_chain)?;

    let provider = coordinator.chain(&provider_chain)?;
    let consumer = coordinator.chain(&consumer_chain)?;
    let provider_denom = provider.config().bond_denom().to_string();
    let consumer_denom = consumer.config().bond_denom().to_string();
    let provider_actor = provider.sender().clone();

    Ok(Example {
        coordinator,
        provider_chain,
        consumer_chain,
        path,
        provider_denom,
        consumer_denom,
        provider_actor,
    })
}

/// Connects the chains, deploys the consumer contracts, opens the ordered
/// channel between gateway and provider and relays the registration.
///
/// Fails if opening the channel produced no packets to relay.
pub fn setup_integration(example: &mut Example) -> HarnessResult<Integration> {
    let coordinator = &mut example.coordinator;
    coordinator.setup_connections(&mut example.path)?;

    let consumer = ConsumerClient::bootstrap(coordinator.chain_mut(&example.consumer_chain)?)?;
    let provider = ProviderClient {
        chain_id: example.provider_chain.clone(),
    };

    example.path.endpoint_a.channel_config = ChannelConfig {
        port_id: consumer.contracts.gateway_port(),
        version: CHANNEL_VERSION.to_string(),
        order: Order::Ordered,
    };
    example.path.endpoint_b.channel_config = ChannelConfig {
        port_id: PortId::from(PROVIDER_PORT),
        version: CHANNEL_VERSION.to_string(),
        order: Order::Ordered,
    };
    coordinator.create_channels(&mut example.path)?;

    pending_registrations(coordinator, &example.path)?;
    let report = coordinator.relay_and_ack_pending_packets(&example.path)?;
    log::info!(
        "integration ready on {} with {} packets relayed",
        example.path,
        report.len()
    );
    Ok(Integration {
        consumer,
        provider,
        report,
    })
}

/// The packets the consumer side of `path` still has to relay. Connecting the
/// gateway's channel must have queued its registration.
pub fn pending_registrations(
    coordinator: &Coordinator<MockLedger>,
    path: &Path,
) -> HarnessResult<Vec<Packet>> {
    let pending = coordinator.pending_on(&path.endpoint_a)?;
    if pending.is_empty() {
        return Err(LedgerError::not_found("registration packet", path).into());
    }
    Ok(pending)
}
