//! Nudge model - a poke from one member to another

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nudge {
    pub id: Uuid,
    pub group_id: Uuid,
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Nudge {
    pub fn new(group_id: Uuid, from_user: Uuid, to_user: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            from_user,
            to_user,
            created_at: Utc::now(),
        }
    }
}

/// Result of a cooldown check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NudgeStatus {
    pub allowed: bool,
    pub seconds_left: i64,
}
