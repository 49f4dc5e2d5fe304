//! Nudge storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::Nudge;

pub struct NudgeStore<'a> {
    conn: &'a Connection,
}

impl<'a> NudgeStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Record a nudge
    #[instrument(skip(self, nudge), fields(group_id = %nudge.group_id, to = %nudge.to_user))]
    pub fn create(&self, nudge: &Nudge) -> Result<()> {
        self.conn.execute(
            "INSERT INTO nudges (id, group_id, from_user, to_user, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                nudge.id.to_string(),
                nudge.group_id.to_string(),
                nudge.from_user.to_string(),
                nudge.to_user.to_string(),
                nudge.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Time of the most recent nudge between two members of a group
    #[instrument(skip(self))]
    pub fn last_between(
        &self,
        from_user: Uuid,
        to_user: Uuid,
        group_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>> {
        let last = self
            .conn
            .query_row(
                "SELECT created_at FROM nudges
                 WHERE from_user = ?1 AND to_user = ?2 AND group_id = ?3
                 ORDER BY created_at DESC LIMIT 1",
                params![
                    from_user.to_string(),
                    to_user.to_string(),
                    group_id.to_string()
                ],
                |row| parse_datetime(&row.get::<_, String>(0)?),
            )
            .optional()?;
        Ok(last)
    }

    /// Nudges received by a user, newest first
    #[instrument(skip(self))]
    pub fn list_received(&self, to_user: Uuid, limit: u32) -> Result<Vec<Nudge>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, group_id, from_user, to_user, created_at FROM nudges
             WHERE to_user = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;

        let nudges = stmt
            .query_map(params![to_user.to_string(), limit], |row| {
                Ok(Nudge {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    group_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    from_user: parse_uuid(&row.get::<_, String>(2)?)?,
                    to_user: parse_uuid(&row.get::<_, String>(3)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(nudges)
    }
}
