//! Device-local preferences
//!
//! Stores the signed-in session for this device and the last group each user
//! opened, so the CLI can pick up where it left off.

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse::{parse_uuid, OptionalExt};
use crate::error::Result;

/// User preferences
#[derive(Debug, Clone)]
pub struct UserPreferences {
    pub user_id: Uuid,
    pub last_group_id: Option<Uuid>,
}

/// Preferences store
pub struct PreferencesStore<'a> {
    conn: &'a Connection,
}

impl<'a> PreferencesStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Save user preferences
    pub fn save(&self, prefs: &UserPreferences) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO user_preferences (user_id, last_group_id, updated_at)
             VALUES (?1, ?2, ?3)",
            params![
                prefs.user_id.to_string(),
                prefs.last_group_id.map(|id| id.to_string()),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load user preferences
    pub fn load(&self, user_id: Uuid) -> Result<Option<UserPreferences>> {
        let last_group: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT last_group_id FROM user_preferences WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(last_group.map(|last| UserPreferences {
            user_id,
            last_group_id: last.and_then(|s| Uuid::parse_str(&s).ok()),
        }))
    }

    /// Set last group for a user
    pub fn set_last_group(&self, user_id: Uuid, group_id: Uuid) -> Result<()> {
        self.save(&UserPreferences {
            user_id,
            last_group_id: Some(group_id),
        })
    }

    /// Get last group for a user
    pub fn get_last_group(&self, user_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.load(user_id)?.and_then(|p| p.last_group_id))
    }

    /// Remember the session this device is signed in with
    pub fn save_device_session(&self, session_id: Uuid) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO device_session (slot, session_id, saved_at) VALUES (0, ?1, ?2)",
            params![session_id.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn device_session(&self) -> Result<Option<Uuid>> {
        let id = self
            .conn
            .query_row(
                "SELECT session_id FROM device_session WHERE slot = 0",
                [],
                |row| parse_uuid(&row.get::<_, String>(0)?),
            )
            .optional()?;
        Ok(id)
    }

    pub fn clear_device_session(&self) -> Result<()> {
        self.conn.execute("DELETE FROM device_session", [])?;
        Ok(())
    }
}
