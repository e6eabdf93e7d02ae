use cosmwasm_std::{to_json_binary, Addr, Coin};

use cw_ibc_testing::testing::MockLedger;
use cw_ibc_testing::workflows::{instantiate, store_code};
use cw_ibc_testing::{
    Chain, ChainId, HarnessError, HarnessResult, LedgerError, LedgerQuery, Msg, PortId, WasmMsg,
};

use crate::contracts::{
    BondedResponse, ConsumerRecord, GatewayConfigResponse, GatewayInstantiateMsg,
    GatewayQueryMsg, ProviderModule, VaultExecuteMsg, VaultQueryMsg, GATEWAY_WASM, PROVIDER_PORT,
    VAULT_WASM,
};

/// Addresses of the contracts deployed on the consumer chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumerContracts {
    pub gateway: Addr,
    pub vault: Addr,
}

impl ConsumerContracts {
    /// The port the gateway's channel is bound to.
    pub fn gateway_port(&self) -> PortId {
        PortId::for_contract(&self.gateway)
    }
}

/// Talks to the consumer contracts on one chain.
#[derive(Clone, Debug)]
pub struct ConsumerClient {
    pub chain_id: ChainId,
    pub contracts: ConsumerContracts,
}

impl ConsumerClient {
    /// Stores both codes and instantiates the gateway, which creates its vault.
    pub fn bootstrap(chain: &mut Chain<MockLedger>) -> HarnessResult<Self> {
        let deployer = chain.sender().clone();
        let gateway_code = store_code(chain, &deployer, GATEWAY_WASM)?;
        let vault_code = store_code(chain, &deployer, VAULT_WASM)?;
        let gateway = instantiate(
            chain,
            &deployer,
            gateway_code,
            &GatewayInstantiateMsg {
                vault_code_id: vault_code,
            },
            vec![],
            "gateway",
        )?;
        let config = query_gateway(chain, &gateway)?;
        let vault = config.vault.ok_or_else(|| {
            HarnessError::from(LedgerError::not_found("vault of gateway", &gateway))
        })?;
        log::info!("{} deployed gateway {} with vault {}", chain.id(), gateway, vault);
        Ok(ConsumerClient {
            chain_id: chain.id().clone(),
            contracts: ConsumerContracts { gateway, vault },
        })
    }

    pub fn config(&self, chain: &Chain<MockLedger>) -> HarnessResult<GatewayConfigResponse> {
        query_gateway(chain, &self.contracts.gateway)
    }

    /// Bonds `funds` from `sender` into the vault and commits the block.
    pub fn bond(
        &self,
        chain: &mut Chain<MockLedger>,
        sender: &Addr,
        funds: Vec<Coin>,
    ) -> HarnessResult<()> {
        let msg = WasmMsg::Execute {
            contract_addr: self.contracts.vault.to_string(),
            msg: to_json_binary(&VaultExecuteMsg::Bond {}).map_err(LedgerError::from)?,
            funds,
        };
        chain.submit_messages(sender, vec![Msg::from(msg)])?;
        chain.commit_block()?;
        Ok(())
    }

    pub fn bonded(&self, chain: &Chain<MockLedger>, address: &Addr) -> HarnessResult<BondedResponse> {
        let msg = to_json_binary(&VaultQueryMsg::Bonded {
            address: address.to_string(),
        })
        .map_err(LedgerError::from)?;
        chain.query_json(&LedgerQuery::ContractSmart {
            contract_addr: self.contracts.vault.to_string(),
            msg,
        })
    }
}

fn query_gateway(chain: &Chain<MockLedger>, gateway: &Addr) -> HarnessResult<GatewayConfigResponse> {
    let msg = to_json_binary(&GatewayQueryMsg::Config {}).map_err(LedgerError::from)?;
    chain.query_json(&LedgerQuery::ContractSmart {
        contract_addr: gateway.to_string(),
        msg,
    })
}

/// Reads the provider module's state on one chain.
#[derive(Clone, Debug)]
pub struct ProviderClient {
    pub chain_id: ChainId,
}

impl ProviderClient {
    pub fn port(&self) -> PortId {
        PortId::from(PROVIDER_PORT)
    }

    /// Every consumer registered so far, in registration order.
    pub fn consumers(&self, chain: &Chain<MockLedger>) -> HarnessResult<Vec<ConsumerRecord>> {
        match chain.ledger().module_storage(&self.port()) {
            Some(storage) => Ok(ProviderModule::consumers(storage)?),
            None => Ok(vec![]),
        }
    }
}
