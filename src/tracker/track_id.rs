//! Track identities and their allocation.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identity of a track within one tracker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(u128);

impl TrackId {
    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> u128 {
        self.0
    }

    /// The identity viewed as a UUID (meaningful for [`IdPolicy::Random`]).
    pub fn as_uuid(&self) -> Uuid {
        Uuid::from_u128(self.0)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How new identities are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// 1, 2, 3, ... per tracker instance
    #[default]
    Sequential,
    /// Random UUID v4 values
    Random,
}

/// Per-tracker identity source. Never hands out the same value twice while
/// the value is live.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    policy: IdPolicy,
    next: u64,
}

impl IdAllocator {
    pub fn new(policy: IdPolicy) -> Self {
        Self { policy, next: 1 }
    }

    pub fn policy(&self) -> IdPolicy {
        self.policy
    }

    /// Draw a fresh identity; `is_live` reports identities currently in use.
    pub fn allocate(&mut self, is_live: impl Fn(TrackId) -> bool) -> TrackId {
        match self.policy {
            IdPolicy::Sequential => {
                let id = TrackId(self.next as u128);
                self.next += 1;
                id
            }
            IdPolicy::Random => loop {
                let id = TrackId(Uuid::new_v4().as_u128());
                if !is_live(id) {
                    break id;
                }
            },
        }
    }
}
