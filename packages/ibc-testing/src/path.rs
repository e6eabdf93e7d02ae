use std::fmt;

use crate::endpoint::Endpoint;
use crate::ident::ChainId;

/// Two endpoints that are, or will be, connected by a connection and a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    /// The side that initiates both handshakes
    pub endpoint_a: Endpoint,
    pub endpoint_b: Endpoint,
}

impl Path {
    pub fn new(chain_a: ChainId, chain_b: ChainId) -> Self {
        Path {
            endpoint_a: Endpoint::new(chain_a),
            endpoint_b: Endpoint::new(chain_b),
        }
    }

    /// The same path seen from side B.
    pub fn reversed(&self) -> Path {
        Path {
            endpoint_a: self.endpoint_b.clone(),
            endpoint_b: self.endpoint_a.clone(),
        }
    }

    /// The endpoints ordered so that the first one lives on `chain_id`.
    pub fn oriented(&self, chain_id: &ChainId) -> Option<(&Endpoint, &Endpoint)> {
        if self.endpoint_a.chain_id == *chain_id {
            Some((&self.endpoint_a, &self.endpoint_b))
        } else if self.endpoint_b.chain_id == *chain_id {
            Some((&self.endpoint_b, &self.endpoint_a))
        } else {
            None
        }
    }
}

fn describe(endpoint: &Endpoint) -> String {
    match &endpoint.channel_id {
        Some(channel_id) => format!(
            "{}:{}/{}",
            endpoint.chain_id,
            endpoint.port_id(),
            channel_id
        ),
        None => format!("{}:{}", endpoint.chain_id, endpoint.port_id()),
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}<->{}",
            describe(&self.endpoint_a),
            describe(&self.endpoint_b)
        )
    }
}
