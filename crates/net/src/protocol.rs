//! Change feed message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something changed in a group's data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Change {
    /// A task was added or its completion state changed
    TaskChanged {
        group_id: Uuid,
        task_id: Uuid,
        completed: bool,
    },

    /// Someone joined the group
    MembersChanged { group_id: Uuid, user_id: Uuid },

    /// The group record itself changed
    GroupChanged {
        group_id: Uuid,
        created_at: DateTime<Utc>,
        creature_mood: u8,
    },

    /// One member nudged another
    Nudged {
        group_id: Uuid,
        from_user: Uuid,
        to_user: Uuid,
    },
}

impl Change {
    pub fn group_id(&self) -> Uuid {
        match self {
            Change::TaskChanged { group_id, .. }
            | Change::MembersChanged { group_id, .. }
            | Change::GroupChanged { group_id, .. }
            | Change::Nudged { group_id, .. } => *group_id,
        }
    }
}

/// Feed protocol messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Client wants changes for a group
    Subscribe { group_id: Uuid },

    /// Server confirms a subscription
    Subscribed { group_id: Uuid },

    /// Client no longer wants changes for a group
    Unsubscribe { group_id: Uuid },

    /// Client announces a change it made
    Publish(Change),

    /// Server delivers a change to a subscriber
    Change(Change),

    /// Ping to keep connection alive
    Ping,

    /// Pong response to ping
    Pong,

    /// Server is shutting down
    ServerShutdown,
}

impl Message {
    /// Serialize message to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize message from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
