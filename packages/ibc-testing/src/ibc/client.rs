use std::collections::BTreeMap;

use cosmwasm_std::{Binary, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::proof::CommitmentProof;
use crate::errors::{HarnessError, HarnessResult};
use crate::height::Height;
use crate::ident::ChainId;

/// A committed block as seen by light clients of the chain.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Header {
    pub chain_id: ChainId,
    pub height: Height,
    pub time: Timestamp,
    /// Root of the provable store after this block
    pub root: Binary,
    pub validators_hash: Binary,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ConsensusState {
    pub timestamp: Timestamp,
    pub root: Binary,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ClientState {
    /// The chain this client tracks
    pub chain_id: ChainId,
    pub latest_height: Height,
    pub trusted_validators_hash: Binary,
}

/// A light client tracking one counterparty chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightClient {
    state: ClientState,
    consensus_states: BTreeMap<Height, ConsensusState>,
}

impl LightClient {
    /// Creates a client that trusts the given header.
    pub fn new(header: &Header) -> Self {
        let mut consensus_states = BTreeMap::new();
        consensus_states.insert(
            header.height,
            ConsensusState {
                timestamp: header.time,
                root: header.root.clone(),
            },
        );
        LightClient {
            state: ClientState {
                chain_id: header.chain_id.clone(),
                latest_height: header.height,
                trusted_validators_hash: header.validators_hash.clone(),
            },
            consensus_states,
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn latest_height(&self) -> Height {
        self.state.latest_height
    }

    pub fn consensus_state(&self, height: Height) -> Option<&ConsensusState> {
        self.consensus_states.get(&height)
    }

    /// Adds a consensus state for the header. Returns false if the client is
    /// already at or past the header's height.
    pub fn update(&mut self, header: &Header) -> HarnessResult<bool> {
        if header.chain_id != self.state.chain_id {
            return Err(HarnessError::validation(format!(
                "header of chain {} submitted to client of chain {}",
                header.chain_id, self.state.chain_id
            )));
        }
        if header.validators_hash != self.state.trusted_validators_hash {
            return Err(HarnessError::validation(format!(
                "header at height {} is signed by an untrusted validator set",
                header.height
            )));
        }
        if header.height <= self.state.latest_height {
            return Ok(false);
        }
        self.consensus_states.insert(
            header.height,
            ConsensusState {
                timestamp: header.time,
                root: header.root.clone(),
            },
        );
        self.state.latest_height = header.height;
        Ok(true)
    }

    /// Checks the proof against the trusted root and returns the value it
    /// claims for `key`.
    pub fn verified_value<'a>(
        &self,
        proof: &'a CommitmentProof,
        key: &str,
    ) -> HarnessResult<Option<&'a [u8]>> {
        let consensus = self.consensus_state(proof.height()).ok_or_else(|| {
            HarnessError::validation(format!(
                "client for {} has no consensus state at height {}",
                self.state.chain_id,
                proof.height()
            ))
        })?;
        if consensus.root != proof.root() {
            return Err(HarnessError::validation(format!(
                "proof root does not match the consensus state of {} at height {}",
                self.state.chain_id,
                proof.height()
            )));
        }
        Ok(proof.value(key))
    }

    pub fn verify_membership(
        &self,
        proof: &CommitmentProof,
        key: &str,
        value: &[u8],
    ) -> HarnessResult<()> {
        match self.verified_value(proof, key)? {
            Some(stored) if stored == value => Ok(()),
            Some(_) => Err(HarnessError::validation(format!(
                "membership proof failed: value under {} differs",
                key
            ))),
            None => Err(HarnessError::validation(format!(
                "membership proof failed: {} is absent",
                key
            ))),
        }
    }

    pub fn verify_non_membership(&self, proof: &CommitmentProof, key: &str) -> HarnessResult<()> {
        match self.verified_value(proof, key)? {
            None => Ok(()),
            Some(_) => Err(HarnessError::validation(format!(
                "non-membership proof failed: {} is present",
                key
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibc::proof::{compute_root, ProvableEntries};

    fn store(pairs: &[(&str, &[u8])]) -> ProvableEntries {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect()
    }

    fn header(height: u64, entries: &ProvableEntries) -> Header {
        Header {
            chain_id: ChainId::new("testchain1"),
            height: Height::new(0, height),
            time: Timestamp::from_seconds(1_000 + height * 5),
            root: compute_root(entries),
            validators_hash: Binary::from(b"validators".to_vec()),
        }
    }

    #[test]
    fn update_works() {
        let genesis = store(&[]);
        let mut client = LightClient::new(&header(1, &genesis));
        assert_eq!(client.latest_height(), Height::new(0, 1));

        let next = store(&[("a", b"1")]);
        assert!(client.update(&header(2, &next)).unwrap());
        assert_eq!(client.latest_height(), Height::new(0, 2));
        assert_eq!(
            client.consensus_state(Height::new(0, 2)).unwrap().root,
            compute_root(&next)
        );
        // stale headers are ignored
        assert!(!client.update(&header(2, &next)).unwrap());
        assert!(!client.update(&header(1, &genesis)).unwrap());
    }

    #[test]
    fn update_rejects_foreign_headers() {
        let entries = store(&[]);
        let mut client = LightClient::new(&header(1, &entries));

        let mut other_chain = header(2, &entries);
        other_chain.chain_id = ChainId::new("testchain2");
        assert!(matches!(
            client.update(&other_chain).unwrap_err(),
            HarnessError::Validation { .. }
        ));

        let mut other_validators = header(2, &entries);
        other_validators.validators_hash = Binary::from(b"evil".to_vec());
        assert!(matches!(
            client.update(&other_validators).unwrap_err(),
            HarnessError::Validation { .. }
        ));
    }

    #[test]
    fn membership_works() {
        let entries = store(&[("commitments/1", b"abc")]);
        let client = LightClient::new(&header(4, &entries));
        let proof = CommitmentProof::forged(Height::new(0, 4), entries);

        client
            .verify_membership(&proof, "commitments/1", b"abc")
            .unwrap();
        client.verify_non_membership(&proof, "commitments/2").unwrap();
        assert!(client
            .verify_membership(&proof, "commitments/1", b"abd")
            .is_err());
        assert!(client.verify_non_membership(&proof, "commitments/1").is_err());
    }

    #[test]
    fn forged_witness_is_rejected() {
        let entries = store(&[("k", b"v")]);
        let client = LightClient::new(&header(4, &entries));

        let forged = CommitmentProof::forged(Height::new(0, 4), store(&[("k", b"w")]));
        let err = client.verify_membership(&forged, "k", b"w").unwrap_err();
        assert!(err.to_string().contains("proof root does not match"));

        let unknown_height = CommitmentProof::forged(Height::new(0, 9), entries);
        let err = client.verify_membership(&unknown_height, "k", b"v").unwrap_err();
        assert!(err.to_string().contains("no consensus state"));
    }
}
