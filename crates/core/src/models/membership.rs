//! Membership models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's membership in a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub group_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: Uuid, group_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            group_id,
            joined_at: Utc::now(),
        }
    }
}

/// Represents a member with their profile info for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberInfo {
    pub user_id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub joined_at: DateTime<Utc>,
}
