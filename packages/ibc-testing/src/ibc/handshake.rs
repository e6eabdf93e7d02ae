//! The handshake state machine shared by connections and channels.
//!
//! Every step of a handshake is a lookup in [`TRANSITIONS`]. A step that has no
//! entry for the current state is a protocol violation. The state the
//! counterparty must have reached before a step may run is given by
//! [`Step::expected_counterparty`] and is checked against a proof of the
//! counterparty's store.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::{HarnessError, HarnessResult};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Nothing stored yet
    Uninitialized,
    Init,
    TryOpen,
    Open,
    /// Channels only
    Closed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Uninitialized => "UNINITIALIZED",
            State::Init => "INIT",
            State::TryOpen => "TRYOPEN",
            State::Open => "OPEN",
            State::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    OpenInit,
    OpenTry,
    OpenAck,
    OpenConfirm,
    CloseInit,
    CloseConfirm,
}

impl Step {
    /// The state the counterparty end must be proven to be in before this step runs.
    pub const fn expected_counterparty(&self) -> Option<State> {
        match self {
            Step::OpenInit | Step::CloseInit => None,
            Step::OpenTry => Some(State::Init),
            Step::OpenAck => Some(State::TryOpen),
            Step::OpenConfirm => Some(State::Open),
            Step::CloseConfirm => Some(State::Closed),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Which object a handshake is running for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    Connection,
    Channel,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Connection => f.write_str("connection"),
            Layer::Channel => f.write_str("channel"),
        }
    }
}

/// (current state, step) -> next state
const TRANSITIONS: &[(State, Step, State)] = &[
    (State::Uninitialized, Step::OpenInit, State::Init),
    (State::Uninitialized, Step::OpenTry, State::TryOpen),
    (State::Init, Step::OpenAck, State::Open),
    (State::TryOpen, Step::OpenConfirm, State::Open),
    (State::Open, Step::CloseInit, State::Closed),
    (State::Open, Step::CloseConfirm, State::Closed),
];

/// Returns the state reached by applying `step` to an end in state `current`.
pub fn transition(layer: Layer, current: State, step: Step) -> HarnessResult<State> {
    if layer == Layer::Connection && matches!(step, Step::CloseInit | Step::CloseConfirm) {
        return Err(HarnessError::protocol_violation(format!(
            "{} ends cannot be closed",
            layer
        )));
    }
    TRANSITIONS
        .iter()
        .find(|(from, s, _)| *from == current && *s == step)
        .map(|(_, _, to)| *to)
        .ok_or_else(|| {
            HarnessError::protocol_violation(format!(
                "{} step {} is not allowed in state {}",
                layer, step, current
            ))
        })
}

/// Checks that the counterparty has completed the step preceding `step`.
pub fn check_counterparty(layer: Layer, step: Step, counterparty: State) -> HarnessResult<()> {
    match step.expected_counterparty() {
        Some(expected) if expected != counterparty => {
            Err(HarnessError::protocol_violation(format!(
                "{} step {} requires the counterparty in state {}, found {}",
                layer, step, expected, counterparty
            )))
        }
        _ => Ok(()),
    }
}
