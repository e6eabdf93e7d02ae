use std::collections::BTreeMap;
use std::sync::Arc;

use cosmwasm_std::Binary;
use sha2::{Digest, Sha256};

use crate::height::Height;

/// The key/value view of a chain's IBC store that proofs are made against.
pub type ProvableEntries = BTreeMap<String, Vec<u8>>;

/// Hashes all entries in key order. Keys and values are length prefixed so
/// that no two different stores share a root.
pub fn compute_root(entries: &ProvableEntries) -> Binary {
    let mut hasher = Sha256::new();
    for (key, value) in entries {
        hasher.update((key.len() as u64).to_be_bytes());
        hasher.update(key.as_bytes());
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value);
    }
    Binary::from(hasher.finalize().to_vec())
}

/// A proof about the committed store of a chain at `height`.
///
/// The witness is the complete store snapshot of that block. Verifying a proof
/// recomputes its root and compares it with the consensus state a light client
/// trusts for the same height, so a proof cannot claim anything the chain did
/// not commit.
#[derive(Clone, Debug)]
pub struct CommitmentProof {
    height: Height,
    witness: Arc<ProvableEntries>,
}

impl CommitmentProof {
    pub(crate) fn new(height: Height, witness: Arc<ProvableEntries>) -> Self {
        CommitmentProof { height, witness }
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn root(&self) -> Binary {
        compute_root(&self.witness)
    }

    /// The value stored under `key`, without any verification.
    pub fn value(&self, key: &str) -> Option<&[u8]> {
        self.witness.get(key).map(Vec::as_slice)
    }

    #[cfg(test)]
    pub(crate) fn forged(height: Height, entries: ProvableEntries) -> Self {
        CommitmentProof::new(height, Arc::new(entries))
    }
}
