use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::handshake::{check_counterparty, transition, Layer, State, Step};
use super::keys;
use super::proof::CommitmentProof;
use super::store::{proven, IbcStore};
use crate::errors::{HarnessError, HarnessResult};
use crate::ident::{ClientId, ConnectionId};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ConnectionCounterparty {
    /// The client on the counterparty chain that tracks this chain
    pub client_id: ClientId,
    /// Unknown until the counterparty runs ConnOpenTry
    pub connection_id: Option<ConnectionId>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ConnectionEnd {
    pub state: State,
    pub client_id: ClientId,
    pub counterparty: ConnectionCounterparty,
    pub version: String,
    pub delay_period: u64,
}

impl ConnectionEnd {
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }
}

impl IbcStore {
    pub fn conn_open_init(
        &mut self,
        client_id: &ClientId,
        counterparty_client_id: &ClientId,
        version: &str,
        delay_period: u64,
    ) -> HarnessResult<ConnectionId> {
        self.client(client_id)?;
        let state = transition(Layer::Connection, State::Uninitialized, Step::OpenInit)?;
        let connection_id = ConnectionId::new(self.next_connection_counter());
        self.connections.insert(
            connection_id.clone(),
            ConnectionEnd {
                state,
                client_id: client_id.clone(),
                counterparty: ConnectionCounterparty {
                    client_id: counterparty_client_id.clone(),
                    connection_id: None,
                },
                version: version.to_string(),
                delay_period,
            },
        );
        log::debug!("ConnOpenInit: {} on client {}", connection_id, client_id);
        Ok(connection_id)
    }

    pub fn conn_open_try(
        &mut self,
        client_id: &ClientId,
        counterparty_client_id: &ClientId,
        counterparty_connection_id: &ConnectionId,
        proof: &CommitmentProof,
    ) -> HarnessResult<ConnectionId> {
        let state = transition(Layer::Connection, State::Uninitialized, Step::OpenTry)?;
        let client = self.client(client_id)?;
        let counterparty: Option<ConnectionEnd> = proven(
            client,
            proof,
            &keys::connection(counterparty_connection_id),
            "ConnectionEnd",
        )?;
        let counterparty = expect_state(Step::OpenTry, counterparty)?;
        if counterparty.counterparty.client_id != *client_id
            || counterparty.client_id != *counterparty_client_id
        {
            return Err(HarnessError::validation(format!(
                "counterparty connection {} was initialized for other clients",
                counterparty_connection_id
            )));
        }

        let connection_id = ConnectionId::new(self.next_connection_counter());
        self.connections.insert(
            connection_id.clone(),
            ConnectionEnd {
                state,
                client_id: client_id.clone(),
                counterparty: ConnectionCounterparty {
                    client_id: counterparty_client_id.clone(),
                    connection_id: Some(counterparty_connection_id.clone()),
                },
                version: counterparty.version,
                delay_period: counterparty.delay_period,
            },
        );
        log::debug!(
            "ConnOpenTry: {} on client {}, counterparty {}",
            connection_id,
            client_id,
            counterparty_connection_id
        );
        Ok(connection_id)
    }

    pub fn conn_open_ack(
        &mut self,
        connection_id: &ConnectionId,
        counterparty_connection_id: &ConnectionId,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        let end = self.connection(connection_id)?;
        let state = transition(Layer::Connection, end.state, Step::OpenAck)?;
        let client = self.client(&end.client_id)?;
        let counterparty: Option<ConnectionEnd> = proven(
            client,
            proof,
            &keys::connection(counterparty_connection_id),
            "ConnectionEnd",
        )?;
        let counterparty = expect_state(Step::OpenAck, counterparty)?;
        if counterparty.counterparty.connection_id.as_ref() != Some(connection_id) {
            return Err(HarnessError::validation(format!(
                "counterparty connection {} does not point back to {}",
                counterparty_connection_id, connection_id
            )));
        }

        let end = self.connection_mut(connection_id)?;
        end.state = state;
        end.counterparty.connection_id = Some(counterparty_connection_id.clone());
        log::debug!("ConnOpenAck: {} is {}", connection_id, state);
        Ok(())
    }

    pub fn conn_open_confirm(
        &mut self,
        connection_id: &ConnectionId,
        proof: &CommitmentProof,
    ) -> HarnessResult<()> {
        let end = self.connection(connection_id)?;
        let state = transition(Layer::Connection, end.state, Step::OpenConfirm)?;
        let counterparty_connection_id = end.counterparty.connection_id.clone().ok_or_else(|| {
            HarnessError::inconsistency(format!(
                "connection {} in TRYOPEN has no counterparty connection",
                connection_id
            ))
        })?;
        let client = self.client(&end.client_id)?;
        let counterparty: Option<ConnectionEnd> = proven(
            client,
            proof,
            &keys::connection(&counterparty_connection_id),
            "ConnectionEnd",
        )?;
        expect_state(Step::OpenConfirm, counterparty)?;

        self.connection_mut(connection_id)?.state = state;
        log::debug!("ConnOpenConfirm: {} is {}", connection_id, state);
        Ok(())
    }

    pub fn connection(&self, connection_id: &ConnectionId) -> HarnessResult<&ConnectionEnd> {
        self.connections.get(connection_id).ok_or_else(|| {
            HarnessError::protocol_violation(format!("connection {} does not exist", connection_id))
        })
    }

    fn connection_mut(&mut self, connection_id: &ConnectionId) -> HarnessResult<&mut ConnectionEnd> {
        self.connections.get_mut(connection_id).ok_or_else(|| {
            HarnessError::protocol_violation(format!("connection {} does not exist", connection_id))
        })
    }

    /// The connection, which must be OPEN to carry channels.
    pub(crate) fn open_connection(&self, connection_id: &ConnectionId) -> HarnessResult<&ConnectionEnd> {
        let end = self.connection(connection_id)?;
        if !end.is_open() {
            return Err(HarnessError::protocol_violation(format!(
                "connection {} is {}, channels need an OPEN connection",
                connection_id, end.state
            )));
        }
        Ok(end)
    }
}

fn expect_state(step: Step, counterparty: Option<ConnectionEnd>) -> HarnessResult<ConnectionEnd> {
    let state = counterparty
        .as_ref()
        .map(|end| end.state)
        .unwrap_or(State::Uninitialized);
    check_counterparty(Layer::Connection, step, state)?;
    counterparty.ok_or_else(|| {
        HarnessError::protocol_violation(format!(
            "connection step {} found no counterparty connection",
            step
        ))
    })
}
