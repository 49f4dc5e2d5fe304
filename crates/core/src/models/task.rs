//! Task model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A task owned by one member of a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub completed: bool,
    /// Public URL of the proof photo, set on completion
    pub photo_url: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(group_id: Uuid, user_id: Uuid, description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            user_id,
            description,
            completed: false,
            photo_url: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Mark complete with proof. Tasks never go back to incomplete.
    pub fn complete(&mut self, photo_url: String, at: DateTime<Utc>) {
        self.completed = true;
        self.photo_url = Some(photo_url);
        self.completed_at = Some(at);
    }
}

/// Task with the owner's username for the group feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDisplay {
    pub task: Task,
    pub owner_username: String,
}

impl TaskDisplay {
    pub fn format_completed_at(&self) -> Option<String> {
        self.task
            .completed_at
            .map(|t| t.format("%b %-d, %H:%M").to_string())
    }
}
