//! Group model - the unit of shared accountability

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::InviteCode;

/// Mood a freshly created group starts with
pub const INITIAL_CREATURE_MOOD: u8 = 100;

/// A small group sharing tasks and a creature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub invite_code: InviteCode,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    /// Last persisted creature mood (0-100); advisory only
    pub creature_mood: u8,
}

impl Group {
    pub fn new(name: String, created_by: Uuid, invite_code: InviteCode) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            invite_code,
            created_by,
            created_at: Utc::now(),
            creature_mood: INITIAL_CREATURE_MOOD,
        }
    }
}

/// Group row for list screens: the group plus its live mood
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: Group,
    pub joined_at: DateTime<Utc>,
    pub completed_tasks: u64,
    pub mood: u8,
}
