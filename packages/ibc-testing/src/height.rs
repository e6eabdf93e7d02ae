use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An IBC height. Ordering compares the revision number first.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    JsonSchema,
)]
pub struct Height {
    pub revision_number: u64,
    pub revision_height: u64,
}

impl Height {
    pub const fn new(revision_number: u64, revision_height: u64) -> Self {
        Height {
            revision_number,
            revision_height,
        }
    }

    /// The zero height is used to disable height based packet timeouts.
    pub const fn zero() -> Self {
        Height::new(0, 0)
    }

    pub const fn is_zero(&self) -> bool {
        self.revision_number == 0 && self.revision_height == 0
    }

    #[must_use]
    pub const fn increment(&self) -> Self {
        Height::new(self.revision_number, self.revision_height + 1)
    }

    #[must_use]
    pub const fn add(&self, delta: u64) -> Self {
        Height::new(self.revision_number, self.revision_height + delta)
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}
