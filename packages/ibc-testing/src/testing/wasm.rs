use std::collections::BTreeMap;
use std::sync::Arc;

use cosmwasm_std::Addr;
use sha2::{Digest, Sha256};

use super::modules::Contract;
use super::storage::ContractStorage;
use crate::errors::{LedgerError, LedgerResult};

/// Hex encoded sha256 of a wasm blob.
pub fn checksum(wasm: &[u8]) -> String {
    hex::encode(Sha256::digest(wasm))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CodeEntry {
    pub creator: Addr,
    pub checksum: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Instance {
    pub code_id: u64,
    pub creator: Addr,
    pub admin: Option<Addr>,
    pub label: String,
    /// Position in creation order
    pub seq: u64,
    pub storage: ContractStorage,
}

/// Stored codes and contract instances.
///
/// The library maps checksums to the Rust implementations standing in for
/// the wasm bytes. Only blobs in the library can be stored.
#[derive(Clone, Default)]
pub(crate) struct Wasm {
    library: BTreeMap<String, Arc<dyn Contract>>,
    codes: Vec<CodeEntry>,
    instances: BTreeMap<Addr, Instance>,
    instance_seq: u64,
}

impl Wasm {
    pub fn register(&mut self, wasm: &[u8], contract: Arc<dyn Contract>) -> String {
        let checksum = checksum(wasm);
        self.library.insert(checksum.clone(), contract);
        checksum
    }

    /// Stores a blob and returns its code id, starting at 1.
    pub fn store_code(&mut self, creator: &Addr, wasm: &[u8]) -> LedgerResult<(u64, String)> {
        let checksum = checksum(wasm);
        if !self.library.contains_key(&checksum) {
            return Err(LedgerError::invalid_request(format!(
                "no contract implementation for wasm with checksum {}",
                checksum
            )));
        }
        self.codes.push(CodeEntry {
            creator: creator.clone(),
            checksum: checksum.clone(),
        });
        Ok((self.codes.len() as u64, checksum))
    }

    pub fn code(&self, code_id: u64) -> LedgerResult<&CodeEntry> {
        code_id
            .checked_sub(1)
            .and_then(|index| self.codes.get(index as usize))
            .ok_or_else(|| LedgerError::not_found("code", code_id))
    }

    pub fn implementation(&self, code_id: u64) -> LedgerResult<Arc<dyn Contract>> {
        let checksum = &self.code(code_id)?.checksum;
        self.library
            .get(checksum)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("contract implementation", checksum))
    }

    /// Reserves the next instance sequence, used to derive the address.
    pub fn next_instance_seq(&mut self) -> u64 {
        self.instance_seq += 1;
        self.instance_seq
    }

    pub fn add_instance(&mut self, address: Addr, instance: Instance) -> LedgerResult<()> {
        if self.instances.contains_key(&address) {
            return Err(LedgerError::invalid_request(format!(
                "contract {} already exists",
                address
            )));
        }
        self.instances.insert(address, instance);
        Ok(())
    }

    pub fn instance(&self, address: &Addr) -> LedgerResult<&Instance> {
        self.instances
            .get(address)
            .ok_or_else(|| LedgerError::not_found("contract", address))
    }

    pub fn instance_mut(&mut self, address: &Addr) -> LedgerResult<&mut Instance> {
        self.instances
            .get_mut(address)
            .ok_or_else(|| LedgerError::not_found("contract", address))
    }

    /// Contracts created from a code, oldest first.
    pub fn contracts_by_code(&self, code_id: u64) -> Vec<Addr> {
        let mut found: Vec<(&Addr, &Instance)> = self
            .instances
            .iter()
            .filter(|(_, instance)| instance.code_id == code_id)
            .collect();
        found.sort_by_key(|(_, instance)| instance.seq);
        found.into_iter().map(|(address, _)| address.clone()).collect()
    }
}
