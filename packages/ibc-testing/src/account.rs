//! Accounts, validators and deterministic address derivation.

use bech32::{Bech32, Hrp};
use cosmwasm_std::{Addr, Binary, Uint128};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{HarnessError, HarnessResult};
use crate::ident::ChainId;

/// Length of account and module addresses in bytes.
const ACCOUNT_ADDRESS_LENGTH: usize = 20;
/// Length of contract addresses in bytes.
const CONTRACT_ADDRESS_LENGTH: usize = 32;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Account {
    pub address: Addr,
    /// Reference to the key that signs for this account. Nothing is ever signed
    /// in the harness, the key only gives accounts a stable identity.
    pub pub_key: Binary,
    /// Replay protection: the sequence the next transaction must carry.
    pub sequence: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Validator {
    pub address: Addr,
    pub pub_key: Binary,
    pub power: Uint128,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct ValidatorSet {
    pub validators: Vec<Validator>,
}

impl ValidatorSet {
    pub fn total_power(&self) -> Uint128 {
        self.validators.iter().map(|v| v.power).sum()
    }

    /// Hash committed in every header. Light clients trust exactly one set.
    pub fn hash(&self) -> Binary {
        let mut hasher = Sha256::new();
        for validator in &self.validators {
            hasher.update(validator.pub_key.as_slice());
            hasher.update(validator.power.u128().to_be_bytes());
        }
        Binary::from(hasher.finalize().to_vec())
    }
}

fn seed(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Encodes the given bytes as a bech32 address.
pub fn bech32_address(prefix: &str, data: &[u8]) -> HarnessResult<Addr> {
    let hrp = Hrp::parse(prefix).map_err(|e| HarnessError::validation(e.to_string()))?;
    let encoded = bech32::encode::<Bech32>(hrp, data)
        .map_err(|e| HarnessError::serialize_err("Addr", e))?;
    Ok(Addr::unchecked(encoded))
}

/// Address of the genesis account with the given index.
pub fn account_address(prefix: &str, chain_id: &ChainId, index: usize) -> HarnessResult<Addr> {
    let hash = seed(&[
        chain_id.as_str().as_bytes(),
        b"account",
        &(index as u64).to_be_bytes(),
    ]);
    bech32_address(prefix, &hash[..ACCOUNT_ADDRESS_LENGTH])
}

/// Address of a module account such as `gov`. Independent of the chain, as in the SDK.
pub fn module_address(prefix: &str, module: &str) -> HarnessResult<Addr> {
    let hash = seed(&[b"module", module.as_bytes()]);
    bech32_address(prefix, &hash[..ACCOUNT_ADDRESS_LENGTH])
}

/// Deterministic address of the `instance_id`-th contract created on a chain.
pub fn contract_address(
    prefix: &str,
    chain_id: &ChainId,
    code_id: u64,
    instance_id: u64,
) -> HarnessResult<Addr> {
    let hash = seed(&[
        b"wasm",
        chain_id.as_str().as_bytes(),
        &code_id.to_be_bytes(),
        &instance_id.to_be_bytes(),
    ]);
    bech32_address(prefix, &hash[..CONTRACT_ADDRESS_LENGTH])
}

/// The `index`-th account of a chain, with a fresh sequence.
pub fn new_account(prefix: &str, chain_id: &ChainId, index: usize) -> HarnessResult<Account> {
    let address = account_address(prefix, chain_id, index)?;
    let pub_key = seed(&[
        chain_id.as_str().as_bytes(),
        b"pubkey",
        &(index as u64).to_be_bytes(),
    ]);
    Ok(Account {
        address,
        pub_key: Binary::from(pub_key.to_vec()),
        sequence: 0,
    })
}

/// Creates the genesis accounts of a chain.
pub fn genesis_accounts(
    prefix: &str,
    chain_id: &ChainId,
    count: usize,
) -> HarnessResult<Vec<Account>> {
    (0..count)
        .map(|index| new_account(prefix, chain_id, index))
        .collect()
}

/// Creates the genesis validator set of a chain.
pub fn genesis_validators(
    prefix: &str,
    chain_id: &ChainId,
    count: usize,
    power: Uint128,
) -> HarnessResult<ValidatorSet> {
    let validators = (0..count)
        .map(|index| {
            let key = seed(&[
                chain_id.as_str().as_bytes(),
                b"validator",
                &(index as u64).to_be_bytes(),
            ]);
            Ok(Validator {
                address: bech32_address(&format!("{}valoper", prefix), &key[..ACCOUNT_ADDRESS_LENGTH])?,
                pub_key: Binary::from(key.to_vec()),
                power,
            })
        })
        .collect::<HarnessResult<Vec<_>>>()?;
    Ok(ValidatorSet { validators })
}
