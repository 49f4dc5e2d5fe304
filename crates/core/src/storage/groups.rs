//! Group and membership storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{mood_from_i64, parse_datetime, parse_invite_code, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Group, InviteCode, MemberInfo, Membership};

const GROUP_COLUMNS: &str = "g.id, g.name, g.invite_code, g.created_by, g.created_at, g.creature_mood";

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        invite_code: parse_invite_code(&row.get::<_, String>(2)?)?,
        created_by: parse_uuid(&row.get::<_, String>(3)?)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?)?,
        creature_mood: mood_from_i64(row.get(5)?),
    })
}

pub struct GroupStore<'a> {
    conn: &'a Connection,
}

impl<'a> GroupStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new group
    #[instrument(skip(self, group), fields(group_name = %group.name))]
    pub fn create(&self, group: &Group) -> Result<()> {
        self.conn.execute(
            "INSERT INTO groups (id, name, invite_code, created_by, created_at, creature_mood)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                group.id.to_string(),
                group.name,
                group.invite_code.as_str(),
                group.created_by.to_string(),
                group.created_at.to_rfc3339(),
                group.creature_mood,
            ],
        )?;
        Ok(())
    }

    /// Find group by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Group>> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM groups g WHERE g.id = ?1");
        let group = self
            .conn
            .query_row(&sql, params![id.to_string()], group_from_row)
            .optional()?;
        Ok(group)
    }

    /// Find group by its (normalized) invite code
    #[instrument(skip(self), fields(code = %code))]
    pub fn find_by_invite_code(&self, code: &InviteCode) -> Result<Option<Group>> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM groups g WHERE g.invite_code = ?1");
        let group = self
            .conn
            .query_row(&sql, params![code.as_str()], group_from_row)
            .optional()?;
        Ok(group)
    }

    /// List a user's groups with join time, most recently joined first
    #[instrument(skip(self))]
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<(Group, DateTime<Utc>)>> {
        let sql = format!(
            "SELECT {GROUP_COLUMNS}, m.joined_at
             FROM groups g
             INNER JOIN memberships m ON m.group_id = g.id
             WHERE m.user_id = ?1
             ORDER BY m.joined_at DESC, m.rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let groups = stmt
            .query_map(params![user_id.to_string()], |row| {
                let group = group_from_row(row)?;
                let joined_at = parse_datetime(&row.get::<_, String>(6)?)?;
                Ok((group, joined_at))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(groups)
    }

    /// Persist the creature mood (last write wins)
    #[instrument(skip(self))]
    pub fn set_creature_mood(&self, group_id: Uuid, mood: u8) -> Result<()> {
        self.conn.execute(
            "UPDATE groups SET creature_mood = ?1 WHERE id = ?2",
            params![mood.min(100), group_id.to_string()],
        )?;
        Ok(())
    }

    /// Add membership
    #[instrument(skip(self, membership), fields(user_id = %membership.user_id, group_id = %membership.group_id))]
    pub fn add_member(&self, membership: &Membership) -> Result<()> {
        self.conn.execute(
            "INSERT INTO memberships (id, user_id, group_id, joined_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                membership.id.to_string(),
                membership.user_id.to_string(),
                membership.group_id.to_string(),
                membership.joined_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get membership
    #[instrument(skip(self))]
    pub fn get_membership(&self, user_id: Uuid, group_id: Uuid) -> Result<Option<Membership>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, group_id, joined_at FROM memberships
             WHERE user_id = ?1 AND group_id = ?2",
        )?;

        let membership = stmt
            .query_row(params![user_id.to_string(), group_id.to_string()], |row| {
                Ok(Membership {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    user_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    group_id: parse_uuid(&row.get::<_, String>(2)?)?,
                    joined_at: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })
            .optional()?;

        Ok(membership)
    }

    /// List members of a group with profile info, in join order
    #[instrument(skip(self))]
    pub fn list_members(&self, group_id: Uuid) -> Result<Vec<MemberInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.username, p.avatar_url, m.joined_at
             FROM memberships m
             INNER JOIN users u ON u.id = m.user_id
             LEFT JOIN profiles p ON p.user_id = m.user_id
             WHERE m.group_id = ?1
             ORDER BY m.joined_at, u.username",
        )?;

        let members = stmt
            .query_map(params![group_id.to_string()], |row| {
                Ok(MemberInfo {
                    user_id: parse_uuid(&row.get::<_, String>(0)?)?,
                    username: row.get(1)?,
                    avatar_url: row.get(2)?,
                    joined_at: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::storage::Database;
    use chrono::Duration;

    fn create_user(db: &Database, name: &str) -> Uuid {
        let user = User::new(name.to_string(), "hash".to_string());
        db.users().create(&user).unwrap();
        user.id
    }

    #[test]
    fn test_group_round_trip_and_code_lookup() {
        let db = Database::open_in_memory().unwrap();
        let owner = create_user(&db, "owner");
        let code = InviteCode::parse("QWERT").unwrap();
        let group = Group::new("Walkers".to_string(), owner, code.clone());
        db.groups().create(&group).unwrap();

        let found = db.groups().find_by_invite_code(&code).unwrap().unwrap();
        assert_eq!(found.id, group.id);
        assert_eq!(found.creature_mood, 100);

        db.groups().set_creature_mood(group.id, 37).unwrap();
        let found = db.groups().find_by_id(group.id).unwrap().unwrap();
        assert_eq!(found.creature_mood, 37);
    }

    #[test]
    fn test_invite_code_unique() {
        let db = Database::open_in_memory().unwrap();
        let owner = create_user(&db, "owner");
        let code = InviteCode::parse("ABCDE").unwrap();
        db.groups()
            .create(&Group::new("One".to_string(), owner, code.clone()))
            .unwrap();
        let err = db
            .groups()
            .create(&Group::new("Two".to_string(), owner, code))
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_groups_listed_by_join_time() {
        let db = Database::open_in_memory().unwrap();
        let user = create_user(&db, "user");
        let mut ids = Vec::new();
        for (i, name) in ["First", "Second"].iter().enumerate() {
            let group = Group::new(name.to_string(), user, InviteCode::generate());
            db.groups().create(&group).unwrap();
            let mut membership = Membership::new(user, group.id);
            membership.joined_at = Utc::now() - Duration::hours(10 - i as i64);
            db.groups().add_member(&membership).unwrap();
            ids.push(group.id);
        }

        let listed = db.groups().list_for_user(user).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0.id, ids[1]);
        assert_eq!(listed[1].0.id, ids[0]);
    }

    #[test]
    fn test_members_include_avatar() {
        let db = Database::open_in_memory().unwrap();
        let a = create_user(&db, "ana");
        let b = create_user(&db, "ben");
        db.users().update_profile(b, None, Some("file:///b.png")).unwrap();
        let group = Group::new("Pair".to_string(), a, InviteCode::generate());
        db.groups().create(&group).unwrap();
        db.groups().add_member(&Membership::new(a, group.id)).unwrap();
        db.groups().add_member(&Membership::new(b, group.id)).unwrap();

        let members = db.groups().list_members(group.id).unwrap();
        assert_eq!(members.len(), 2);
        let ben = members.iter().find(|m| m.username == "ben").unwrap();
        assert_eq!(ben.avatar_url.as_deref(), Some("file:///b.png"));
        assert!(db.groups().get_membership(a, group.id).unwrap().is_some());
    }
}
