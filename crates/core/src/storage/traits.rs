//! Storage repository traits
//!
//! These traits define the storage interface, allowing for different
//! implementations (SQLite, mock, future hosted backend).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::TaskFilter;
use crate::error::Result;
use crate::models::{
    Group, InviteCode, MemberInfo, Membership, Nudge, Profile, Session, Task, TaskDisplay, User,
};

/// User, session and profile operations
pub trait UserRepository {
    /// Create a new user
    fn create_user(&self, user: &User) -> Result<()>;

    /// Find user by ID
    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Find user by username
    fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Change a username
    fn rename_user(&self, user_id: Uuid, username: &str) -> Result<()>;

    /// Update user's last login time
    fn update_last_login(&self, user_id: Uuid) -> Result<()>;

    /// Create a session
    fn create_session(&self, session: &Session) -> Result<()>;

    /// Find a valid (non-expired) session
    fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// Delete a session
    fn delete_session(&self, session_id: Uuid) -> Result<()>;

    /// Delete all sessions for a user
    fn delete_user_sessions(&self, user_id: Uuid) -> Result<()>;

    /// Clean up expired sessions
    fn cleanup_expired_sessions(&self) -> Result<u64>;

    /// Create the profile row for a new user
    fn create_profile(&self, user_id: Uuid) -> Result<()>;

    /// Load a user's profile
    fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    /// Update bio and/or avatar
    fn update_profile(
        &self,
        user_id: Uuid,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<()>;

    /// Store a push token
    fn set_push_token(&self, user_id: Uuid, token: &str) -> Result<()>;
}

/// Group and membership operations
pub trait GroupRepository {
    /// Create a new group
    fn create_group(&self, group: &Group) -> Result<()>;

    /// Find group by ID
    fn find_group_by_id(&self, id: Uuid) -> Result<Option<Group>>;

    /// Find group by invite code
    fn find_group_by_invite_code(&self, code: &InviteCode) -> Result<Option<Group>>;

    /// List a user's groups with their join time, newest first
    fn list_groups_for_user(&self, user_id: Uuid) -> Result<Vec<(Group, DateTime<Utc>)>>;

    /// Persist the creature mood
    fn set_creature_mood(&self, group_id: Uuid, mood: u8) -> Result<()>;

    /// Add a membership
    fn add_member(&self, membership: &Membership) -> Result<()>;

    /// Get a membership
    fn get_membership(&self, user_id: Uuid, group_id: Uuid) -> Result<Option<Membership>>;

    /// List members of a group with profile info
    fn list_members(&self, group_id: Uuid) -> Result<Vec<MemberInfo>>;
}

/// Task operations
pub trait TaskRepository {
    /// Create a task
    fn create_task(&self, task: &Task) -> Result<()>;

    /// Create several tasks atomically
    fn create_tasks(&self, tasks: &[Task]) -> Result<()>;

    /// Find task by ID
    fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>>;

    /// List tasks in a group
    fn list_tasks_for_group(&self, group_id: Uuid, filter: TaskFilter) -> Result<Vec<TaskDisplay>>;

    /// List a user's tasks in a group
    fn list_tasks_for_user(&self, user_id: Uuid, group_id: Uuid) -> Result<Vec<Task>>;

    /// Count completed tasks in a group
    fn count_completed_tasks(&self, group_id: Uuid) -> Result<u64>;

    /// Mark a pending task completed
    fn mark_task_completed(&self, task_id: Uuid, photo_url: &str, at: DateTime<Utc>)
        -> Result<bool>;
}

/// Nudge operations
pub trait NudgeRepository {
    /// Record a nudge
    fn create_nudge(&self, nudge: &Nudge) -> Result<()>;

    /// Most recent nudge time between two members of a group
    fn last_nudge_between(
        &self,
        from_user: Uuid,
        to_user: Uuid,
        group_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Nudges received by a user
    fn list_nudges_received(&self, to_user: Uuid, limit: u32) -> Result<Vec<Nudge>>;
}

/// Combined storage interface
///
/// Provides access to all repository operations.
/// Implementations may be backed by SQLite, mocks, or network.
pub trait Storage: UserRepository + GroupRepository + TaskRepository + NudgeRepository {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where T: UserRepository + GroupRepository + TaskRepository + NudgeRepository
{}
