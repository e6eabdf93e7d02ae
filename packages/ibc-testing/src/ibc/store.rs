use std::collections::{BTreeMap, BTreeSet};

use cosmwasm_std::Binary;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::channel::Channel;
use super::client::{Header, LightClient};
use super::connection::ConnectionEnd;
use super::keys;
use super::packet::Packet;
use super::proof::{CommitmentProof, ProvableEntries};
use crate::errors::{HarnessError, HarnessResult};
use crate::ident::{ChannelId, ClientId, ConnectionId, PortId};

pub(crate) type ChannelKey = (PortId, ChannelId);
pub(crate) type PacketKey = (PortId, ChannelId, u64);

/// Marker stored for every received packet of an unordered channel.
const RECEIPT: &[u8] = &[1];

/// The IBC state of one chain.
///
/// Everything the counterparty needs to verify is exported through
/// [`IbcStore::provable_entries`]. The remaining bookkeeping (pending packets,
/// processed acknowledgements and timeouts) is local to this chain.
#[derive(Clone, Debug, Default)]
pub struct IbcStore {
    client_counter: u64,
    connection_counter: u64,
    channel_counter: u64,
    pub(super) clients: BTreeMap<ClientId, LightClient>,
    pub(super) connections: BTreeMap<ConnectionId, ConnectionEnd>,
    pub(super) channels: BTreeMap<ChannelKey, Channel>,
    pub(super) commitments: BTreeMap<PacketKey, Binary>,
    pub(super) receipts: BTreeSet<PacketKey>,
    pub(super) acks: BTreeMap<PacketKey, Binary>,
    /// Sent packets that were neither acknowledged nor timed out, by sequence
    pub(super) pending: BTreeMap<ChannelKey, BTreeMap<u64, Packet>>,
    pub(super) acknowledged: BTreeMap<PacketKey, Binary>,
    pub(super) timed_out: BTreeSet<PacketKey>,
}

impl IbcStore {
    pub fn new() -> Self {
        IbcStore::default()
    }

    pub(super) fn next_connection_counter(&mut self) -> u64 {
        let counter = self.connection_counter;
        self.connection_counter += 1;
        counter
    }

    pub(super) fn next_channel_counter(&mut self) -> u64 {
        let counter = self.channel_counter;
        self.channel_counter += 1;
        counter
    }

    /// Creates a light client trusting the given counterparty header.
    pub fn create_client(&mut self, header: &Header) -> ClientId {
        let client_id = ClientId::new(self.client_counter);
        self.client_counter += 1;
        self.clients
            .insert(client_id.clone(), LightClient::new(header));
        log::debug!(
            "created client {} for {} at {}",
            client_id,
            header.chain_id,
            header.height
        );
        client_id
    }

    /// Returns false when the client already knows a header at least as recent.
    pub fn update_client(&mut self, client_id: &ClientId, header: &Header) -> HarnessResult<bool> {
        let client = self.clients.get_mut(client_id).ok_or_else(|| {
            HarnessError::validation(format!("client {} does not exist", client_id))
        })?;
        client.update(header)
    }

    pub fn client(&self, client_id: &ClientId) -> HarnessResult<&LightClient> {
        self.clients.get(client_id).ok_or_else(|| {
            HarnessError::validation(format!("client {} does not exist", client_id))
        })
    }

    /// The client verifying proofs for this channel's counterparty.
    pub(super) fn channel_client(&self, channel: &Channel) -> HarnessResult<&LightClient> {
        let connection = self.connection(&channel.end.connection_id)?;
        self.client(&connection.client_id)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn packet_commitment(
        &self,
        port_id: &PortId,
        channel_id: &ChannelId,
        sequence: u64,
    ) -> Option<&Binary> {
        self.commitments
            .get(&(port_id.clone(), channel_id.clone(), sequence))
    }

    pub fn has_packet_receipt(&self, port_id: &PortId, channel_id: &ChannelId, sequence: u64) -> bool {
        self.receipts
            .contains(&(port_id.clone(), channel_id.clone(), sequence))
    }

    pub fn packet_ack_commitment(
        &self,
        port_id: &PortId,
        channel_id: &ChannelId,
        sequence: u64,
    ) -> Option<&Binary> {
        self.acks.get(&(port_id.clone(), channel_id.clone(), sequence))
    }

    /// Pending packets of one channel in send order.
    pub fn pending_packets(&self, port_id: &PortId, channel_id: &ChannelId) -> Vec<Packet> {
        self.pending
            .get(&(port_id.clone(), channel_id.clone()))
            .map(|queue| queue.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn all_pending_packets(&self) -> impl Iterator<Item = &Packet> {
        self.pending.values().flat_map(|queue| queue.values())
    }

    /// The acknowledgement this chain processed for one of its packets.
    pub fn acknowledgement(
        &self,
        port_id: &PortId,
        channel_id: &ChannelId,
        sequence: u64,
    ) -> Option<&Binary> {
        self.acknowledged
            .get(&(port_id.clone(), channel_id.clone(), sequence))
    }

    pub fn is_timed_out(&self, port_id: &PortId, channel_id: &ChannelId, sequence: u64) -> bool {
        self.timed_out
            .contains(&(port_id.clone(), channel_id.clone(), sequence))
    }

    /// The key/value view light clients of this chain verify against.
    pub fn provable_entries(&self) -> HarnessResult<ProvableEntries> {
        let mut entries = ProvableEntries::new();
        for (client_id, client) in &self.clients {
            entries.insert(
                keys::client_state(client_id),
                encode(client.state(), "ClientState")?,
            );
        }
        for (connection_id, end) in &self.connections {
            entries.insert(keys::connection(connection_id), encode(end, "ConnectionEnd")?);
        }
        for ((port_id, channel_id), channel) in &self.channels {
            entries.insert(
                keys::channel_end(port_id, channel_id),
                encode(&channel.end, "ChannelEnd")?,
            );
            entries.insert(
                keys::next_sequence_recv(port_id, channel_id),
                keys::encode_sequence(channel.next_sequence_recv),
            );
        }
        for ((port_id, channel_id, sequence), commitment) in &self.commitments {
            entries.insert(
                keys::packet_commitment(port_id, channel_id, *sequence),
                commitment.to_vec(),
            );
        }
        for (port_id, channel_id, sequence) in &self.receipts {
            entries.insert(
                keys::packet_receipt(port_id, channel_id, *sequence),
                RECEIPT.to_vec(),
            );
        }
        for ((port_id, channel_id, sequence), commitment) in &self.acks {
            entries.insert(
                keys::packet_ack(port_id, channel_id, *sequence),
                commitment.to_vec(),
            );
        }
        Ok(entries)
    }
}

fn encode<T: Serialize>(value: &T, source_type: &str) -> HarnessResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| HarnessError::serialize_err(source_type, e))
}

/// Verifies `proof` with `client` and decodes the JSON value stored under `key`.
pub(super) fn proven<T: DeserializeOwned>(
    client: &LightClient,
    proof: &CommitmentProof,
    key: &str,
    target_type: &str,
) -> HarnessResult<Option<T>> {
    match client.verified_value(proof, key)? {
        Some(bytes) => serde_json::from_slice(bytes)
            .map(Some)
            .map_err(|e| HarnessError::parse_err(target_type, e)),
        None => Ok(None),
    }
}
