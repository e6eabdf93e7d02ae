//! Moves packets across a path: receive on the destination, then acknowledge
//! or time out on the source.

use cosmwasm_std::Binary;

use crate::chain::Chain;
use crate::coordinator::Coordinator;
use crate::endpoint::Endpoint;
use crate::errors::{HarnessError, HarnessResult};
use crate::ibc::{Channel, Packet, RecvOutcome, State};
use crate::ledger::Ledger;
use crate::path::Path;

/// How a single relayed packet ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Acknowledged { acknowledgement: Binary },
    TimedOut,
}

/// Everything a relay pass completed, in relay order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub acknowledged: Vec<(Packet, Binary)>,
    pub timed_out: Vec<Packet>,
}

impl RelayReport {
    fn record(&mut self, packet: Packet, outcome: RelayOutcome) {
        match outcome {
            RelayOutcome::Acknowledged { acknowledgement } => {
                self.acknowledged.push((packet, acknowledgement))
            }
            RelayOutcome::TimedOut => self.timed_out.push(packet),
        }
    }

    fn merge(&mut self, other: RelayReport) {
        self.acknowledged.extend(other.acknowledged);
        self.timed_out.extend(other.timed_out);
    }

    /// Number of packets relayed.
    pub fn len(&self) -> usize {
        self.acknowledged.len() + self.timed_out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<L: Ledger> Coordinator<L> {
    /// Relays one packet sent by either side of the path.
    pub fn relay_packet(&mut self, path: &Path, packet: &Packet) -> HarnessResult<RelayOutcome> {
        let (source, destination) = if sent_from(&path.endpoint_a, packet) {
            (&path.endpoint_a, &path.endpoint_b)
        } else if sent_from(&path.endpoint_b, packet) {
            (&path.endpoint_b, &path.endpoint_a)
        } else {
            return Err(HarnessError::validation(format!(
                "packet {} from {}/{} was not sent on path {}",
                packet.sequence, packet.source_port, packet.source_channel, path
            )));
        };
        let (src, dst) = self.chain_pair_mut(&source.chain_id, &destination.chain_id)?;
        relay_one(src, dst, source, destination, packet)
    }

    /// Relays the packets pending on side A to side B.
    pub fn relay_pending_packets(&mut self, path: &Path) -> HarnessResult<RelayReport> {
        self.relay_pass(&path.endpoint_a, &path.endpoint_b)
    }

    /// Relays everything pending on the path, A to B first, then B to A.
    ///
    /// Each direction works on the packets pending when it starts, so packets
    /// sent by acknowledgement handlers wait for the next call.
    pub fn relay_and_ack_pending_packets(&mut self, path: &Path) -> HarnessResult<RelayReport> {
        if self.pending_on(&path.endpoint_a)?.is_empty()
            && self.pending_on(&path.endpoint_b)?.is_empty()
        {
            return Err(HarnessError::nothing_to_relay(path));
        }
        let mut report = self.relay_pass(&path.endpoint_a, &path.endpoint_b)?;
        report.merge(self.relay_pass(&path.endpoint_b, &path.endpoint_a)?);
        log::debug!(
            "relayed {} packets on {}: {} acknowledged, {} timed out",
            report.len(),
            path,
            report.acknowledged.len(),
            report.timed_out.len()
        );
        Ok(report)
    }

    /// Packets sent on the endpoint's channel that are still waiting for an
    /// acknowledgement or a timeout.
    pub fn pending_on(&self, endpoint: &Endpoint) -> HarnessResult<Vec<Packet>> {
        let chain = self.chain(&endpoint.chain_id)?;
        Ok(chain.pending_packets(endpoint.port_id(), endpoint.channel_id()?))
    }

    fn relay_pass(&mut self, source: &Endpoint, destination: &Endpoint) -> HarnessResult<RelayReport> {
        let (src, dst) = self.chain_pair_mut(&source.chain_id, &destination.chain_id)?;
        let packets = src.pending_packets(source.port_id(), source.channel_id()?);
        let mut report = RelayReport::default();
        for packet in packets {
            let outcome = relay_one(src, dst, source, destination, &packet)?;
            report.record(packet, outcome);
        }
        Ok(report)
    }
}

fn sent_from(endpoint: &Endpoint, packet: &Packet) -> bool {
    packet.source_port == *endpoint.port_id()
        && endpoint.channel_id.as_ref() == Some(&packet.source_channel)
}

fn relay_one<L: Ledger>(
    src: &mut Chain<L>,
    dst: &mut Chain<L>,
    source: &Endpoint,
    destination: &Endpoint,
    packet: &Packet,
) -> HarnessResult<RelayOutcome> {
    relayable_state(src.channel(&packet.source_port, &packet.source_channel)?)?;
    let destination_state =
        relayable_state(dst.channel(&packet.destination_port, &packet.destination_channel)?)?;

    if src.is_dirty() {
        src.commit_block()?;
    }

    if destination_state == State::Closed {
        if dst.is_dirty() {
            dst.commit_block()?;
        }
        source.update_client(src, dst)?;
        src.timeout_on_close(packet, &dst.query_proof())?;
        src.commit_block()?;
        log::info!(
            "packet {} on {}/{} timed out on channel close",
            packet.sequence,
            packet.source_port,
            packet.source_channel
        );
        return Ok(RelayOutcome::TimedOut);
    }

    destination.update_client(dst, src)?;
    match dst.recv_packet(packet, &src.query_proof())? {
        RecvOutcome::Received { acknowledgement } => {
            dst.commit_block()?;
            source.update_client(src, dst)?;
            src.acknowledge_packet(packet, &acknowledgement, &dst.query_proof())?;
            src.commit_block()?;
            log::debug!(
                "packet {} from {}/{} acknowledged",
                packet.sequence,
                packet.source_port,
                packet.source_channel
            );
            Ok(RelayOutcome::Acknowledged { acknowledgement })
        }
        RecvOutcome::TimedOut => {
            dst.commit_block()?;
            source.update_client(src, dst)?;
            src.timeout_packet(packet, &dst.query_proof())?;
            src.commit_block()?;
            log::info!(
                "packet {} from {}/{} timed out",
                packet.sequence,
                packet.source_port,
                packet.source_channel
            );

            // an ordered channel closes when one of its packets times out
            let source_closed = src
                .channel(&packet.source_port, &packet.source_channel)?
                .state()
                == State::Closed;
            if source_closed {
                destination.update_client(dst, src)?;
                dst.chan_close_confirm(
                    &packet.destination_port,
                    &packet.destination_channel,
                    &src.query_proof(),
                )?;
                dst.commit_block()?;
                log::info!(
                    "closed {}/{} after an ordered timeout",
                    packet.destination_port,
                    packet.destination_channel
                );
            }
            Ok(RelayOutcome::TimedOut)
        }
    }
}

/// Packets only move between channel ends that finished their open handshake.
fn relayable_state(channel: &Channel) -> HarnessResult<State> {
    match channel.state() {
        state @ (State::Open | State::Closed) => Ok(state),
        state => Err(HarnessError::protocol_violation(format!(
            "cannot relay over channel {}/{} in state {}",
            channel.port_id, channel.channel_id, state
        ))),
    }
}
