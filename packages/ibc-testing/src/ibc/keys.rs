//! Keys of the provable IBC store.

use crate::errors::{HarnessError, HarnessResult};
use crate::ident::{ChannelId, ClientId, ConnectionId, PortId};

pub fn client_state(client_id: &ClientId) -> String {
    format!("clients/{}/clientState", client_id)
}

pub fn connection(connection_id: &ConnectionId) -> String {
    format!("connections/{}", connection_id)
}

pub fn channel_end(port_id: &PortId, channel_id: &ChannelId) -> String {
    format!("channelEnds/ports/{}/channels/{}", port_id, channel_id)
}

pub fn next_sequence_recv(port_id: &PortId, channel_id: &ChannelId) -> String {
    format!("nextSequenceRecv/ports/{}/channels/{}", port_id, channel_id)
}

pub fn packet_commitment(port_id: &PortId, channel_id: &ChannelId, sequence: u64) -> String {
    format!(
        "commitments/ports/{}/channels/{}/sequences/{}",
        port_id, channel_id, sequence
    )
}

pub fn packet_receipt(port_id: &PortId, channel_id: &ChannelId, sequence: u64) -> String {
    format!(
        "receipts/ports/{}/channels/{}/sequences/{}",
        port_id, channel_id, sequence
    )
}

pub fn packet_ack(port_id: &PortId, channel_id: &ChannelId, sequence: u64) -> String {
    format!(
        "acks/ports/{}/channels/{}/sequences/{}",
        port_id, channel_id, sequence
    )
}

/// Sequences are stored as 8 big endian bytes.
pub fn encode_sequence(sequence: u64) -> Vec<u8> {
    sequence.to_be_bytes().to_vec()
}

pub fn decode_sequence(value: &[u8]) -> HarnessResult<u64> {
    let bytes: [u8; 8] = value.try_into().map_err(|_| {
        HarnessError::parse_err("u64", format!("expected 8 bytes, got {}", value.len()))
    })?;
    Ok(u64::from_be_bytes(bytes))
}
