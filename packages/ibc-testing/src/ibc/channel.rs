use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::connection::ConnectionEnd;
use super::handshake::{check_counterparty, transition, Layer, State, Step};
use super::keys;
use super::proof::CommitmentProof;
use super::store::{proven, IbcStore};
use crate::errors::{HarnessError, HarnessResult};
use crate::ident::{ChannelId, ConnectionId, PortId};
use crate::msg::IbcChannel;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Order {
    #[default]
    Unordered,
    /// Packets are received and acknowledged in send order. A timeout closes the channel.
    Ordered,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Unordered => f.write_str("UNORDERED"),
            Order::Ordered => f.write_str("ORDERED"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ChannelCounterparty {
    pub port_id: PortId,
    /// Unknown until the counterparty runs ChanOpenTry
    pub channel_id: Option<ChannelId>,
}

/// The part of a channel that is committed to the provable store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ChannelEnd {
    pub state: State,
    pub ordering: Order,
    pub counterparty: ChannelCounterparty,
    pub connection_id: ConnectionId,
    pub version: String,
}

/// A channel end together with its sequence counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub port_id: PortId,
    pub channel_id: ChannelId,
    pub end: ChannelEnd,
    pub next_sequence_send: u64,
    pub next_sequence_recv: u64,
    pub next_sequence_ack: u64,
}

impl Channel {
    fn new(port_id: PortId, channel_id: ChannelId, end: ChannelEnd) -> Self {
        Channel {
            port_id,
            channel_id,
            end,
            next_sequence_send: 1,
            next_sequence_recv: 1,
            next_sequence_ack: 1,
        }
    }

    pub fn state(&self) -> State {
        self.end.state
    }

    pub fn is_open(&self) -> bool {
        self.end.state == State::Open
    }

    /// The view of this channel handed to applications.
    pub fn describe(&self) -> IbcChannel {
        IbcChannel {
            port_id: self.port_id.clone(),
            channel_id: self.channel_id.clone(),
            counterparty_port_id: self.end.counterparty.port_id.clone(),
            counterparty_channel_id: self.end.counterparty.channel_id.clone(),
            order: self.end.ordering,
            version: self.end.version.clone(),
            connection_id: self.end.connection_id.clone(),
        }
    }
}

impl IbcStore {
    /// Both connection ends must be OPEN; `proof` shows the counterparty's.
    pub fn chan_open_init(
        &mut self,
        port_id: &PortId,
        connection_id: &ConnectionId,
        ordering: Order,
        counterparty_port_id: &PortId,
        version: &str,
        proof: &CommitmentProof,
    ) -> HarnessResult<ChannelId> {
        let connection = self.open_connection(connection_id)?;
        let counterparty_connection_id =
            connection.counterparty.connection_id.as_ref().ok_or_else(|| {
                HarnessError::inconsistency(format!(
                    "OPEN connection {} has no counterparty connection",
                    connection_id
                ))
            })?;
        let client = self.client(&connection.client_id)?;
        let counterparty: Option<ConnectionEnd> = proven(
            client,
            proof,
            &keys::connection(counterparty_connection_id),
            "ConnectionEnd",
        )?;
        let counterparty_state = counterparty
            .map(|end| end.state)
            .unwrap_or(State::Uninitialized);
        if counterparty_state != State::Open {
            return Err(HarnessError::protocol_violation(format!(
                "counterparty connection {} of {} is {}, channels need both ends OPEN",
                counterparty_connection_id, connection_id, counterparty_state
            )));
        }
        let state = transition(Layer::Channel, State::Uninitialized, Step::OpenInit)?;
        let channel_id = ChannelId::new(self.next_channel_counter());
        let end = ChannelEnd {
            state,
            ordering,
            counterparty: ChannelCounterparty {
                port_id: counterparty_port_id.clone(),
                channel_id: None,
            },
            connection_id: connection_id.clone(),
            version: version.to_string(),
        };
        self.channels.insert(
            (port_id.clone(), channel_id.clone()),
            Channel::new(port_id.clone(), channel_id.clone(), end),
        );
        log::debug!("ChanOpenInit: {}/{} ({})", port_id, channel_id, ordering);
        Ok(channel_id)
    }

    /// Returns the new channel and the version the counterparty proposed.
    pub fn chan_open_try(
        &mut self,
        port_id: &PortId,
        connection_id: &ConnectionId,
        ordering: Order,
        counterparty_port_id: &PortId,
        counterparty_channel_id: &ChannelId,
        proof: &CommitmentProof,
    ) -> HarnessResult<(ChannelId, String)> {
        let connection = self.open_connection(connection_id)?;
        let state = transition(Layer::Channel, State::Uninitialized, Step::OpenTry)?;
        let client = self.client(&connection.client_id)?;
        let counterparty: Option<ChannelEnd> = proven(
            client,
            proof,
            &keys::channel_end(counterparty_port_id, counterparty_channel_id),
            "ChannelEnd",
        )?;
        let counterparty = expect_state(Step::OpenTry, counterparty)?;
        if counterparty.ordering != ordering {
            return Err(HarnessError::validation(format!(
                "channel ordering mismatch: counterparty is {}, requested {}",
                counterparty.ordering, ordering
            )));
        }
        if counterparty.counterparty.port_id != *port_id {
            return Err(HarnessError::validation(format!(
                "counterparty channel {}/{} expects port {}, not {}",
                counterparty_port_id,
                counterparty_channel_id,
                counterparty.counterparty.port_id,
                port_id
            )));
        }
        if connection.counterparty.connection_id.as_ref() != Some(&counterparty.connection_id) {
            return Err(HarnessError::validation(format!(
                "counterparty channel runs on connection {}, which is not the counterparty of {}",
                counterparty.connection_id, connection_id
            )));
        }

        let channel_id = ChannelId::new(self.next_channel_counter());
        let end = ChannelEnd {
            state,
            ordering,
            counterparty: ChannelCounterparty {
                port_id: counterparty_port_id.clone(),
                channel_id: Some(counterparty_channel_id.clone()),
            },
            connection_id: connection_id.clone(),
            version: counterparty.version.clone(),
        };
        self.channels.insert(
            (port_id.clone(), channel_id.clone()),
            Channel::new(port_id.clone(), channel_id.clone(), end),
        );
        log::debug!(
            "ChanOpenTry: {}/{}, counterparty {}/{}",
            port_id,
            channel_id,
            counterparty_port_id,
            counterparty_channel_id
        );
        Ok((channel_id, counterparty.version))
    }

    /// Opens the channel. The version becomes the one the counterparty settled on.
    pub fn chan_open_ack(
        &mut self,
        port_id: &PortId,
        channel_id: &ChannelId,
        counterparty_channel_id: &ChannelId,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        let channel = self.channel(port_id, channel_id)?;
        let state = transition(Layer::Channel, channel.end.state, Step::OpenAck)?;
        self.open_connection(&channel.end.connection_id)?;
        let client = self.channel_client(channel)?;
        let counterparty: Option<ChannelEnd> = proven(
            client,
            proof,
            &keys::channel_end(&channel.end.counterparty.port_id, counterparty_channel_id),
            "ChannelEnd",
        )?;
        let counterparty = expect_state(Step::OpenAck, counterparty)?;
        if counterparty.counterparty.channel_id.as_ref() != Some(channel_id) {
            return Err(HarnessError::validation(format!(
                "counterparty channel {} does not point back to {}",
                counterparty_channel_id, channel_id
            )));
        }

        let channel = self.channel_mut(port_id, channel_id)?;
        channel.end.state = state;
        channel.end.counterparty.channel_id = Some(counterparty_channel_id.clone());
        channel.end.version = counterparty.version;
        log::debug!("ChanOpenAck: {}/{} is {}", port_id, channel_id, state);
        Ok(())
    }

    pub fn chan_open_confirm(
        &mut self,
        port_id: &PortId,
        channel_id: &ChannelId,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        let channel = self.channel(port_id, channel_id)?;
        let state = transition(Layer::Channel, channel.end.state, Step::OpenConfirm)?;
        self.open_connection(&channel.end.connection_id)?;
        let counterparty: Option<ChannelEnd> = self.proven_counterparty(channel, proof)?;
        expect_state(Step::OpenConfirm, counterparty)?;

        self.channel_mut(port_id, channel_id)?.end.state = state;
        log::debug!("ChanOpenConfirm: {}/{} is {}", port_id, channel_id, state);
        Ok(())
    }

    pub fn chan_close_init(&mut self, port_id: &PortId, channel_id: &ChannelId) -> HarnessResult<()> {
        let channel = self.channel_mut(port_id, channel_id)?;
        channel.end.state = transition(Layer::Channel, channel.end.state, Step::CloseInit)?;
        log::info!("ChanCloseInit: {}/{} is CLOSED", port_id, channel_id);
        Ok(())
    }

    pub fn chan_close_confirm(
        &mut self,
        port_id: &PortId,
        channel_id: &ChannelId,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        let channel = self.channel(port_id, channel_id)?;
        let state = transition(Layer::Channel, channel.end.state, Step::CloseConfirm)?;
        let counterparty: Option<ChannelEnd> = self.proven_counterparty(channel, proof)?;
        expect_state(Step::CloseConfirm, counterparty)?;

        self.channel_mut(port_id, channel_id)?.end.state = state;
        log::info!("ChanCloseConfirm: {}/{} is CLOSED", port_id, channel_id);
        Ok(())
    }

    /// Records the version an application negotiated during the open handshake.
    pub(crate) fn set_channel_version(
        &mut self,
        port_id: &PortId,
        channel_id: &ChannelId,
        version: String,
    ) -> HarnessResult<()> {
        self.channel_mut(port_id, channel_id)?.end.version = version;
        Ok(())
    }

    pub fn channel(&self, port_id: &PortId, channel_id: &ChannelId) -> HarnessResult<&Channel> {
        self.channels
            .get(&(port_id.clone(), channel_id.clone()))
            .ok_or_else(|| {
                HarnessError::protocol_violation(format!(
                    "channel {}/{} does not exist",
                    port_id, channel_id
                ))
            })
    }

    pub(crate) fn channel_mut(
        &mut self,
        port_id: &PortId,
        channel_id: &ChannelId,
    ) -> HarnessResult<&mut Channel> {
        self.channels
            .get_mut(&(port_id.clone(), channel_id.clone()))
            .ok_or_else(|| {
                HarnessError::protocol_violation(format!(
                    "channel {}/{} does not exist",
                    port_id, channel_id
                ))
            })
    }

    fn proven_counterparty(
        &self,
        channel: &Channel,
        proof: &CommitmentProof,
    ) -> HarnessResult<Option<ChannelEnd>> {
        let counterparty_channel_id = channel.end.counterparty.channel_id.as_ref().ok_or_else(|| {
            HarnessError::inconsistency(format!(
                "channel {}/{} in {} has no counterparty channel",
                channel.port_id, channel.channel_id, channel.end.state
            ))
        })?;
        let client = self.channel_client(channel)?;
        proven(
            client,
            proof,
            &keys::channel_end(&channel.end.counterparty.port_id, counterparty_channel_id),
            "ChannelEnd",
        )
    }
}

fn expect_state(step: Step, counterparty: Option<ChannelEnd>) -> HarnessResult<ChannelEnd> {
    let state = counterparty
        .as_ref()
        .map(|end| end.state)
        .unwrap_or(State::Uninitialized);
    check_counterparty(Layer::Channel, step, state)?;
    counterparty.ok_or_else(|| {
        HarnessError::protocol_violation(format!(
            "channel step {} found no counterparty channel",
            step
        ))
    })
}
