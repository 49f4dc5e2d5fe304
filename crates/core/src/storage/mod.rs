//! SQLite storage layer for Huddle

mod groups;
mod migrations;
mod nudges;
mod parse;
mod preferences;
mod tasks;
mod traits;
mod users;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Group, InviteCode, MemberInfo, Membership, Nudge, Profile, Session, Task, TaskDisplay, User,
};
use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;

pub use groups::GroupStore;
pub use nudges::NudgeStore;
pub use preferences::{PreferencesStore, UserPreferences};
pub use tasks::{TaskFilter, TaskStore};
pub use traits::{GroupRepository, NudgeRepository, Storage, TaskRepository, UserRepository};
pub use users::UserStore;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(&self.conn)
    }

    pub fn groups(&self) -> GroupStore<'_> {
        GroupStore::new(&self.conn)
    }

    pub fn tasks(&self) -> TaskStore<'_> {
        TaskStore::new(&self.conn)
    }

    pub fn nudges(&self) -> NudgeStore<'_> {
        NudgeStore::new(&self.conn)
    }

    /// Get preferences store for device session and last group
    pub fn preferences(&self) -> PreferencesStore<'_> {
        PreferencesStore::new(&self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl UserRepository for Database {
    fn create_user(&self, user: &User) -> Result<()> {
        self.users().create(user)
    }

    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.users().find_by_id(id)
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.users().find_by_username(username)
    }

    fn rename_user(&self, user_id: Uuid, username: &str) -> Result<()> {
        self.users().rename(user_id, username)
    }

    fn update_last_login(&self, user_id: Uuid) -> Result<()> {
        self.users().update_last_login(user_id)
    }

    fn create_session(&self, session: &Session) -> Result<()> {
        self.users().create_session(session)
    }

    fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        self.users().find_valid_session(session_id)
    }

    fn delete_session(&self, session_id: Uuid) -> Result<()> {
        self.users().delete_session(session_id)
    }

    fn delete_user_sessions(&self, user_id: Uuid) -> Result<()> {
        self.users().delete_user_sessions(user_id)
    }

    fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.users().cleanup_expired_sessions()
    }

    fn create_profile(&self, user_id: Uuid) -> Result<()> {
        self.users().create_profile(user_id)
    }

    fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        self.users().find_profile(user_id)
    }

    fn update_profile(
        &self,
        user_id: Uuid,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<()> {
        self.users().update_profile(user_id, bio, avatar_url)
    }

    fn set_push_token(&self, user_id: Uuid, token: &str) -> Result<()> {
        self.users().set_push_token(user_id, token)
    }
}

impl GroupRepository for Database {
    fn create_group(&self, group: &Group) -> Result<()> {
        self.groups().create(group)
    }

    fn find_group_by_id(&self, id: Uuid) -> Result<Option<Group>> {
        self.groups().find_by_id(id)
    }

    fn find_group_by_invite_code(&self, code: &InviteCode) -> Result<Option<Group>> {
        self.groups().find_by_invite_code(code)
    }

    fn list_groups_for_user(&self, user_id: Uuid) -> Result<Vec<(Group, DateTime<Utc>)>> {
        self.groups().list_for_user(user_id)
    }

    fn set_creature_mood(&self, group_id: Uuid, mood: u8) -> Result<()> {
        self.groups().set_creature_mood(group_id, mood)
    }

    fn add_member(&self, membership: &Membership) -> Result<()> {
        self.groups().add_member(membership)
    }

    fn get_membership(&self, user_id: Uuid, group_id: Uuid) -> Result<Option<Membership>> {
        self.groups().get_membership(user_id, group_id)
    }

    fn list_members(&self, group_id: Uuid) -> Result<Vec<MemberInfo>> {
        self.groups().list_members(group_id)
    }
}

impl TaskRepository for Database {
    fn create_task(&self, task: &Task) -> Result<()> {
        self.tasks().create(task)
    }

    fn create_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.tasks().create_many(tasks)
    }

    fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        self.tasks().find_by_id(id)
    }

    fn list_tasks_for_group(&self, group_id: Uuid, filter: TaskFilter) -> Result<Vec<TaskDisplay>> {
        self.tasks().list_for_group(group_id, filter)
    }

    fn list_tasks_for_user(&self, user_id: Uuid, group_id: Uuid) -> Result<Vec<Task>> {
        self.tasks().list_for_user(user_id, group_id)
    }

    fn count_completed_tasks(&self, group_id: Uuid) -> Result<u64> {
        self.tasks().count_completed(group_id)
    }

    fn mark_task_completed(
        &self,
        task_id: Uuid,
        photo_url: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.tasks().mark_completed(task_id, photo_url, at)
    }
}

impl NudgeRepository for Database {
    fn create_nudge(&self, nudge: &Nudge) -> Result<()> {
        self.nudges().create(nudge)
    }

    fn last_nudge_between(
        &self,
        from_user: Uuid,
        to_user: Uuid,
        group_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>> {
        self.nudges().last_between(from_user, to_user, group_id)
    }

    fn list_nudges_received(&self, to_user: Uuid, limit: u32) -> Result<Vec<Nudge>> {
        self.nudges().list_received(to_user, limit)
    }
}
