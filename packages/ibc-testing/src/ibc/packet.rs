use cosmwasm_std::{Binary, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::channel::Order;
use super::client::LightClient;
use super::handshake::{transition, Layer, State, Step};
use super::keys;
use super::proof::CommitmentProof;
use super::store::{proven, IbcStore};
use crate::errors::{HarnessError, HarnessResult};
use crate::height::Height;
use crate::ident::{ChannelId, PortId};

/// When a packet stops being deliverable. Unset or zero fields are disabled,
/// at least one of them must be set.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct PacketTimeout {
    pub block: Option<Height>,
    pub timestamp: Option<Timestamp>,
}

impl PacketTimeout {
    pub fn with_height(height: Height) -> Self {
        PacketTimeout {
            block: Some(height),
            timestamp: None,
        }
    }

    pub fn with_timestamp(timestamp: Timestamp) -> Self {
        PacketTimeout {
            block: None,
            timestamp: Some(timestamp),
        }
    }

    pub fn with_both(height: Height, timestamp: Timestamp) -> Self {
        PacketTimeout {
            block: Some(height),
            timestamp: Some(timestamp),
        }
    }

    fn height(&self) -> Height {
        self.block.unwrap_or_default()
    }

    fn timestamp_nanos(&self) -> u64 {
        self.timestamp.map(|t| t.nanos()).unwrap_or_default()
    }

    pub fn is_set(&self) -> bool {
        !self.height().is_zero() || self.timestamp_nanos() != 0
    }

    /// True once a chain at `height` and `time` may no longer receive the packet.
    pub fn has_elapsed(&self, height: Height, time: Timestamp) -> bool {
        let by_height = !self.height().is_zero() && height > self.height();
        let by_time = self.timestamp_nanos() != 0 && time.nanos() > self.timestamp_nanos();
        by_height || by_time
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Packet {
    /// Unique and strictly increasing per source channel, starting at 1
    pub sequence: u64,
    pub source_port: PortId,
    pub source_channel: ChannelId,
    pub destination_port: PortId,
    pub destination_channel: ChannelId,
    pub data: Binary,
    pub timeout: PacketTimeout,
}

impl Packet {
    /// sha256(timeout timestamp ‖ timeout revision ‖ timeout height ‖ sha256(data))
    pub fn commitment(&self) -> Binary {
        let height = self.timeout.height();
        let mut hasher = Sha256::new();
        hasher.update(self.timeout.timestamp_nanos().to_be_bytes());
        hasher.update(height.revision_number.to_be_bytes());
        hasher.update(height.revision_height.to_be_bytes());
        hasher.update(Sha256::digest(self.data.as_slice()));
        Binary::from(hasher.finalize().to_vec())
    }
}

pub fn ack_commitment(acknowledgement: &[u8]) -> Binary {
    Binary::from(Sha256::digest(acknowledgement).to_vec())
}

/// The standard acknowledgement envelope, `{"result":"<base64>"}` or `{"error":"<text>"}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StdAck {
    #[serde(rename = "result")]
    Success(Binary),
    Error(String),
}

impl StdAck {
    pub fn success(data: impl Into<Binary>) -> Self {
        StdAck::Success(data.into())
    }

    pub fn error(err: impl Into<String>) -> Self {
        StdAck::Error(err.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StdAck::Success(_))
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    pub fn to_binary(&self) -> Binary {
        // Serializing an enum of a binary and a string cannot fail
        match serde_json::to_vec(self) {
            Ok(bytes) => Binary::from(bytes),
            Err(_) => Binary::default(),
        }
    }

    /// Parses an acknowledgement that uses the standard envelope.
    pub fn parse(acknowledgement: &[u8]) -> HarnessResult<Self> {
        serde_json::from_slice(acknowledgement).map_err(|e| HarnessError::parse_err("StdAck", e))
    }
}

impl From<StdAck> for Binary {
    fn from(original: StdAck) -> Binary {
        original.to_binary()
    }
}

/// What the destination did with a packet handed to it by the relayer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecvOutcome {
    /// The application processed the packet and wrote this acknowledgement.
    Received { acknowledgement: Binary },
    /// The packet's timeout had elapsed. Nothing was stored.
    TimedOut,
}

/// Result of the core checks on a received packet, before the application runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    Deliver,
    TimedOut,
}

impl IbcStore {
    /// Assigns the next sequence of the channel and commits the packet.
    pub fn send_packet(
        &mut self,
        port_id: &PortId,
        channel_id: &ChannelId,
        data: Binary,
        timeout: PacketTimeout,
    ) -> HarnessResult<Packet> {
        if !timeout.is_set() {
            return Err(HarnessError::validation(
                "packet needs a timeout height or a timeout timestamp",
            ));
        }
        let channel = self.channel_mut(port_id, channel_id)?;
        if channel.end.state != State::Open {
            return Err(HarnessError::protocol_violation(format!(
                "cannot send on channel {}/{} in state {}",
                port_id, channel_id, channel.end.state
            )));
        }
        let destination_channel = channel.end.counterparty.channel_id.clone().ok_or_else(|| {
            HarnessError::inconsistency(format!(
                "open channel {}/{} has no counterparty channel",
                port_id, channel_id
            ))
        })?;
        let packet = Packet {
            sequence: channel.next_sequence_send,
            source_port: port_id.clone(),
            source_channel: channel_id.clone(),
            destination_port: channel.end.counterparty.port_id.clone(),
            destination_channel,
            data,
            timeout,
        };
        channel.next_sequence_send += 1;

        let key = (port_id.clone(), channel_id.clone(), packet.sequence);
        self.commitments.insert(key, packet.commitment());
        self.pending
            .entry((port_id.clone(), channel_id.clone()))
            .or_default()
            .insert(packet.sequence, packet.clone());
        log::debug!(
            "sent packet {} on {}/{}",
            packet.sequence,
            port_id,
            channel_id
        );
        Ok(packet)
    }

    /// Checks a packet relayed from the counterparty and marks it received.
    ///
    /// A packet whose timeout elapsed at (`height`, `time`) is reported as
    /// [`Delivery::TimedOut`] without touching any state.
    pub(crate) fn recv_packet(
        &mut self,
        packet: &Packet,
        proof: &CommitmentProof,
        height: Height,
        time: Timestamp,
    ) -> HarnessResult<Delivery> {
        let channel = self.channel(&packet.destination_port, &packet.destination_channel)?;
        if channel.end.state != State::Open {
            return Err(HarnessError::protocol_violation(format!(
                "cannot receive on channel {}/{} in state {}",
                packet.destination_port, packet.destination_channel, channel.end.state
            )));
        }
        let counterparty = &channel.end.counterparty;
        if counterparty.port_id != packet.source_port
            || counterparty.channel_id.as_ref() != Some(&packet.source_channel)
        {
            return Err(HarnessError::validation(format!(
                "packet from {}/{} does not match the counterparty of {}/{}",
                packet.source_port,
                packet.source_channel,
                packet.destination_port,
                packet.destination_channel
            )));
        }
        let ordering = channel.end.ordering;
        let next_sequence_recv = channel.next_sequence_recv;

        let client = self.channel_client(channel)?;
        client.verify_membership(
            proof,
            &keys::packet_commitment(&packet.source_port, &packet.source_channel, packet.sequence),
            packet.commitment().as_slice(),
        )?;

        if packet.timeout.has_elapsed(height, time) {
            log::info!(
                "packet {} on {}/{} timed out at height {}",
                packet.sequence,
                packet.destination_port,
                packet.destination_channel,
                height
            );
            return Ok(Delivery::TimedOut);
        }

        let key = (
            packet.destination_port.clone(),
            packet.destination_channel.clone(),
            packet.sequence,
        );
        match ordering {
            Order::Ordered => {
                if packet.sequence != next_sequence_recv {
                    return Err(HarnessError::protocol_violation(format!(
                        "ordered channel {}/{} expects sequence {}, got {}",
                        packet.destination_port,
                        packet.destination_channel,
                        next_sequence_recv,
                        packet.sequence
                    )));
                }
                let channel =
                    self.channel_mut(&packet.destination_port, &packet.destination_channel)?;
                channel.next_sequence_recv += 1;
            }
            Order::Unordered => {
                if self.receipts.contains(&key) {
                    return Err(HarnessError::protocol_violation(format!(
                        "packet {} on {}/{} was already received",
                        packet.sequence, packet.destination_port, packet.destination_channel
                    )));
                }
            }
        }
        self.receipts.insert(key);
        Ok(Delivery::Deliver)
    }

    pub(crate) fn write_acknowledgement(
        &mut self,
        packet: &Packet,
        acknowledgement: &[u8],
    ) -> HarnessResult<()> {
        if acknowledgement.is_empty() {
            return Err(HarnessError::validation("acknowledgement must not be empty"));
        }
        let key = (
            packet.destination_port.clone(),
            packet.destination_channel.clone(),
            packet.sequence,
        );
        if self.acks.contains_key(&key) {
            return Err(HarnessError::protocol_violation(format!(
                "acknowledgement for packet {} on {}/{} already written",
                packet.sequence, packet.destination_port, packet.destination_channel
            )));
        }
        self.acks.insert(key, ack_commitment(acknowledgement));
        Ok(())
    }

    /// Processes the acknowledgement of a packet this chain sent.
    pub fn acknowledge_packet(
        &mut self,
        packet: &Packet,
        acknowledgement: &Binary,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        let key = self.check_outstanding(packet)?;
        let channel = self.channel(&packet.source_port, &packet.source_channel)?;
        let ordering = channel.end.ordering;
        let next_sequence_ack = channel.next_sequence_ack;

        let client = self.channel_client(channel)?;
        client.verify_membership(
            proof,
            &keys::packet_ack(
                &packet.destination_port,
                &packet.destination_channel,
                packet.sequence,
            ),
            ack_commitment(acknowledgement).as_slice(),
        )?;

        if ordering == Order::Ordered {
            if packet.sequence != next_sequence_ack {
                return Err(HarnessError::protocol_violation(format!(
                    "ordered channel {}/{} expects acknowledgement {}, got {}",
                    packet.source_port, packet.source_channel, next_sequence_ack, packet.sequence
                )));
            }
            self.channel_mut(&packet.source_port, &packet.source_channel)?
                .next_sequence_ack += 1;
        }
        self.close_out(&key);
        self.acknowledged.insert(key, acknowledgement.clone());
        Ok(())
    }

    /// Processes a proof that the counterparty passed the packet's timeout
    /// without receiving it. Closes ordered channels, which must still be OPEN.
    pub fn timeout_packet(&mut self, packet: &Packet, proof: &CommitmentProof) -> HarnessResult<()> {
        let key = self.check_outstanding(packet)?;
        let channel = self.channel(&packet.source_port, &packet.source_channel)?;
        let ordering = channel.end.ordering;
        let closed = match ordering {
            Order::Ordered => Some(transition(
                Layer::Channel,
                channel.end.state,
                Step::CloseInit,
            )?),
            Order::Unordered => None,
        };
        let client = self.channel_client(channel)?;

        let consensus = client.consensus_state(proof.height()).ok_or_else(|| {
            HarnessError::validation(format!(
                "no consensus state at height {} to check the timeout against",
                proof.height()
            ))
        })?;
        if !packet.timeout.has_elapsed(proof.height(), consensus.timestamp) {
            return Err(HarnessError::validation(format!(
                "packet {} on {}/{} has not timed out at counterparty height {}",
                packet.sequence,
                packet.source_port,
                packet.source_channel,
                proof.height()
            )));
        }
        verify_not_received(client, proof, packet, ordering)?;

        self.close_out(&key);
        self.timed_out.insert(key);
        if let Some(state) = closed {
            let channel = self.channel_mut(&packet.source_port, &packet.source_channel)?;
            channel.end.state = state;
            log::info!(
                "timeout closed ordered channel {}/{}",
                packet.source_port,
                packet.source_channel
            );
        }
        Ok(())
    }

    /// Times out a packet because the counterparty channel is closed.
    pub fn timeout_on_close(
        &mut self,
        packet: &Packet,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        let key = self.check_outstanding(packet)?;
        let channel = self.channel(&packet.source_port, &packet.source_channel)?;
        let ordering = channel.end.ordering;
        let client = self.channel_client(channel)?;

        let counterparty_end: Option<super::channel::ChannelEnd> = proven(
            client,
            proof,
            &keys::channel_end(&packet.destination_port, &packet.destination_channel),
            "ChannelEnd",
        )?;
        let counterparty_state = counterparty_end
            .map(|end| end.state)
            .unwrap_or(State::Uninitialized);
        if counterparty_state != State::Closed {
            return Err(HarnessError::protocol_violation(format!(
                "timeout on close requires the counterparty channel CLOSED, found {}",
                counterparty_state
            )));
        }
        verify_not_received(client, proof, packet, ordering)?;

        self.close_out(&key);
        self.timed_out.insert(key);
        Ok(())
    }

    fn check_outstanding(&self, packet: &Packet) -> HarnessResult<(PortId, ChannelId, u64)> {
        let key = (
            packet.source_port.clone(),
            packet.source_channel.clone(),
            packet.sequence,
        );
        match self.commitments.get(&key) {
            Some(commitment) if *commitment == packet.commitment() => Ok(key),
            Some(_) => Err(HarnessError::validation(format!(
                "packet {} on {}/{} does not match its commitment",
                packet.sequence, packet.source_port, packet.source_channel
            ))),
            None => Err(HarnessError::protocol_violation(format!(
                "packet {} on {}/{} is not outstanding",
                packet.sequence, packet.source_port, packet.source_channel
            ))),
        }
    }

    fn close_out(&mut self, key: &(PortId, ChannelId, u64)) {
        self.commitments.remove(key);
        let channel_key = (key.0.clone(), key.1.clone());
        if let Some(queue) = self.pending.get_mut(&channel_key) {
            queue.remove(&key.2);
            if queue.is_empty() {
                self.pending.remove(&channel_key);
            }
        }
    }
}

fn verify_not_received(
    client: &LightClient,
    proof: &CommitmentProof,
    packet: &Packet,
    ordering: Order,
) -> HarnessResult<()> {
    match ordering {
        Order::Ordered => {
            let key = keys::next_sequence_recv(&packet.destination_port, &packet.destination_channel);
            let value = client.verified_value(proof, &key)?.ok_or_else(|| {
                HarnessError::validation(format!("proof does not contain {}", key))
            })?;
            let next_sequence_recv = keys::decode_sequence(value)?;
            if next_sequence_recv > packet.sequence {
                return Err(HarnessError::protocol_violation(format!(
                    "packet {} was already received, counterparty expects {}",
                    packet.sequence, next_sequence_recv
                )));
            }
            Ok(())
        }
        Order::Unordered => client.verify_non_membership(
            proof,
            &keys::packet_receipt(
                &packet.destination_port,
                &packet.destination_channel,
                packet.sequence,
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(data: &[u8], timeout: PacketTimeout) -> Packet {
        Packet {
            sequence: 1,
            source_port: PortId::from("mock"),
            source_channel: ChannelId::new(0),
            destination_port: PortId::from("mock"),
            destination_channel: ChannelId::new(1),
            data: Binary::from(data.to_vec()),
            timeout,
        }
    }

    #[test]
    fn timeout_is_set_works() {
        assert!(!PacketTimeout::default().is_set());
        assert!(!PacketTimeout::with_height(Height::zero()).is_set());
        assert!(!PacketTimeout::with_timestamp(Timestamp::from_nanos(0)).is_set());
        assert!(PacketTimeout::with_height(Height::new(0, 1)).is_set());
        assert!(PacketTimeout::with_timestamp(Timestamp::from_seconds(1)).is_set());
    }

    #[test]
    fn has_elapsed_is_strict() {
        let timeout = PacketTimeout::with_height(Height::new(0, 10));
        let now = Timestamp::from_seconds(100);
        assert!(!timeout.has_elapsed(Height::new(0, 9), now));
        assert!(!timeout.has_elapsed(Height::new(0, 10), now));
        assert!(timeout.has_elapsed(Height::new(0, 11), now));

        let timeout = PacketTimeout::with_timestamp(Timestamp::from_seconds(100));
        assert!(!timeout.has_elapsed(Height::new(0, 99), Timestamp::from_seconds(100)));
        assert!(timeout.has_elapsed(Height::new(0, 1), Timestamp::from_seconds(101)));
    }

    #[test]
    fn has_elapsed_ignores_disabled_fields() {
        let timeout = PacketTimeout::with_both(Height::zero(), Timestamp::from_seconds(50));
        assert!(!timeout.has_elapsed(Height::new(5, 5), Timestamp::from_seconds(50)));
        assert!(timeout.has_elapsed(Height::new(0, 1), Timestamp::from_seconds(51)));
    }

    #[test]
    fn commitment_covers_data_and_timeout() {
        let timeout = PacketTimeout::with_height(Height::new(0, 10));
        let a = packet(b"hello", timeout.clone());
        let b = packet(b"world", timeout);
        let c = packet(b"hello", PacketTimeout::with_height(Height::new(0, 11)));
        assert_eq!(a.commitment().len(), 32);
        assert_ne!(a.commitment(), b.commitment());
        assert_ne!(a.commitment(), c.commitment());
        assert_eq!(a.commitment(), a.clone().commitment());
    }

    #[test]
    fn std_ack_serializes_like_the_envelope() {
        let ack = StdAck::success(b"\x01".to_vec());
        assert_eq!(ack.to_binary().as_slice(), br#"{"result":"AQ=="}"#);
        let ack = StdAck::error("kaputt");
        assert_eq!(ack.to_binary().as_slice(), br#"{"error":"kaputt"}"#);
        assert!(ack.is_error());
    }

    #[test]
    fn std_ack_parse_works() {
        let parsed = StdAck::parse(br#"{"result":"AQ=="}"#).unwrap();
        assert_eq!(parsed, StdAck::success(b"\x01".to_vec()));
        assert!(parsed.is_success());
        match StdAck::parse(b"raw bytes").unwrap_err() {
            HarnessError::ParseErr { target_type, .. } => assert_eq!(target_type, "StdAck"),
            e => panic!("Unexpected error: {:?}", e),
        }
    }
}
