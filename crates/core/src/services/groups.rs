//! Group creation, joining and listing

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::invariants::{assert_group_invariants, assert_member_list_invariants};
use crate::models::{Group, GroupSummary, InviteCode, MemberInfo, Membership};
use crate::mood::{mood_at, MoodPersistence, MoodSettings};
use crate::storage::Storage;

/// Attempts at a fresh invite code before giving up
pub const MAX_INVITE_ATTEMPTS: usize = 8;

pub struct GroupService<'a, S: Storage + ?Sized> {
    store: &'a S,
}

impl<'a, S: Storage + ?Sized> GroupService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create a group with a random invite code; the creator joins it
    pub fn create_group(&self, name: &str, creator: Uuid) -> Result<Group> {
        self.create_group_with(name, creator, InviteCode::generate)
    }

    /// Create a group drawing invite codes from `next_code`
    #[instrument(skip(self, next_code))]
    pub fn create_group_with<F>(&self, name: &str, creator: Uuid, mut next_code: F) -> Result<Group>
    where
        F: FnMut() -> InviteCode,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Group name is required".into()));
        }
        if self.store.find_user_by_id(creator)?.is_none() {
            return Err(Error::NotFound(format!("User {creator}")));
        }

        let mut created = None;
        for attempt in 1..=MAX_INVITE_ATTEMPTS {
            let group = Group::new(name.to_string(), creator, next_code());
            match self.store.create_group(&group) {
                Ok(()) => {
                    created = Some(group);
                    break;
                }
                Err(e) if e.is_constraint_violation() => {
                    warn!(attempt, code = %group.invite_code, "Invite code collision");
                }
                Err(e) => return Err(e),
            }
        }

        let group = created.ok_or_else(|| {
            Error::Invitation("Could not allocate a unique invite code".into())
        })?;
        assert_group_invariants(&group);

        self.store.add_member(&Membership::new(creator, group.id))?;
        info!(group_id = %group.id, code = %group.invite_code, "Group created");
        Ok(group)
    }

    /// Join by invite code (any case). Joining twice is a no-op.
    #[instrument(skip(self))]
    pub fn join_group(&self, code: &str, user_id: Uuid) -> Result<Group> {
        let invalid = || Error::Invitation("Invalid invite code".into());
        let code = InviteCode::parse(code).map_err(|_| invalid())?;
        let group = self
            .store
            .find_group_by_invite_code(&code)?
            .ok_or_else(invalid)?;

        if self.store.get_membership(user_id, group.id)?.is_none() {
            self.store.add_member(&Membership::new(user_id, group.id))?;
            info!(group_id = %group.id, %user_id, "Joined group");
        }

        Ok(group)
    }

    pub fn find_group(&self, group_id: Uuid) -> Result<Group> {
        self.store
            .find_group_by_id(group_id)?
            .ok_or_else(|| Error::NotFound(format!("Group {group_id}")))
    }

    /// A user's groups, most recently joined first
    pub fn my_groups(&self, user_id: Uuid) -> Result<Vec<Group>> {
        Ok(self
            .store
            .list_groups_for_user(user_id)?
            .into_iter()
            .map(|(group, _)| group)
            .collect())
    }

    /// The group the user joined most recently
    pub fn latest_group(&self, user_id: Uuid) -> Result<Option<Group>> {
        Ok(self.my_groups(user_id)?.into_iter().next())
    }

    pub fn members(&self, group_id: Uuid) -> Result<Vec<MemberInfo>> {
        let group = self.find_group(group_id)?;
        let members = self.store.list_members(group_id)?;
        assert_member_list_invariants(&members, &group);
        Ok(members)
    }

    /// Group with its completed count and mood.
    ///
    /// Under write-back the persisted creature mood is reported; otherwise
    /// the raw formula from creation time, without the viewing-session floor.
    pub fn summary(
        &self,
        group_id: Uuid,
        settings: &MoodSettings,
        now: DateTime<Utc>,
    ) -> Result<GroupSummary> {
        let group = self.find_group(group_id)?;
        // No viewer here; report the creation time
        let joined_at = group.created_at;
        self.summarize(group, joined_at, settings, now)
    }

    /// Summaries for every group of a user, for list screens
    pub fn summaries(
        &self,
        user_id: Uuid,
        settings: &MoodSettings,
        now: DateTime<Utc>,
    ) -> Result<Vec<GroupSummary>> {
        self.store
            .list_groups_for_user(user_id)?
            .into_iter()
            .map(|(group, joined_at)| self.summarize(group, joined_at, settings, now))
            .collect()
    }

    fn summarize(
        &self,
        group: Group,
        joined_at: DateTime<Utc>,
        settings: &MoodSettings,
        now: DateTime<Utc>,
    ) -> Result<GroupSummary> {
        let completed_tasks = self.store.count_completed_tasks(group.id)?;
        let mood = match settings.persistence {
            MoodPersistence::WriteBack => group.creature_mood.min(100),
            MoodPersistence::Ephemeral => {
                mood_at(settings, Some(group.created_at), completed_tasks, now)
            }
        };
        Ok(GroupSummary {
            group,
            joined_at,
            completed_tasks,
            mood,
        })
    }

    /// Persist a session's mood (last write wins)
    #[instrument(skip(self))]
    pub fn set_creature_mood(&self, group_id: Uuid, mood: u8) -> Result<()> {
        self.store.set_creature_mood(group_id, mood.min(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::user;
    use crate::storage::Database;
    use chrono::Duration;

    #[test]
    fn test_create_group_makes_creator_member() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let service = GroupService::new(&db);

        let group = service.create_group("  Gym Buddies ", owner).unwrap();
        assert_eq!(group.name, "Gym Buddies");
        assert_eq!(group.creature_mood, 100);
        assert_eq!(group.invite_code.as_str().len(), 5);

        let members = service.members(group.id).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, owner);
    }

    #[test]
    fn test_create_group_validation() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let service = GroupService::new(&db);

        assert!(matches!(
            service.create_group("   ", owner),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            service.create_group("Ghosts", Uuid::new_v4()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_invite_code_collision_retries() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let service = GroupService::new(&db);
        let taken = InviteCode::parse("AAAAA").unwrap();
        service
            .create_group_with("First", owner, || taken.clone())
            .unwrap();

        let mut codes = vec!["BBBBB", "AAAAA"];
        let second = service
            .create_group_with("Second", owner, || {
                InviteCode::parse(codes.pop().unwrap()).unwrap()
            })
            .unwrap();
        assert_eq!(second.invite_code.as_str(), "BBBBB");

        let mut calls = 0;
        let err = service
            .create_group_with("Third", owner, || {
                calls += 1;
                taken.clone()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Invitation(_)));
        assert_eq!(calls, MAX_INVITE_ATTEMPTS);
    }

    #[test]
    fn test_join_case_insensitive_and_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let friend = user(&db, "friend");
        let service = GroupService::new(&db);
        let group = service.create_group("Readers", owner).unwrap();

        let lower = group.invite_code.as_str().to_lowercase();
        let joined = service.join_group(&format!(" {lower} "), friend).unwrap();
        assert_eq!(joined.id, group.id);
        service.join_group(&lower, friend).unwrap();
        assert_eq!(service.members(group.id).unwrap().len(), 2);
    }

    #[test]
    fn test_join_invalid_code() {
        let db = Database::open_in_memory().unwrap();
        let friend = user(&db, "friend");
        let service = GroupService::new(&db);

        for code in ["ZZZZZ", "nope", ""] {
            match service.join_group(code, friend) {
                Err(Error::Invitation(msg)) => assert_eq!(msg, "Invalid invite code"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_summary_uses_formula() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let service = GroupService::new(&db);
        let group = service.create_group("Walkers", owner).unwrap();

        let settings = MoodSettings::default();
        let summary = service
            .summary(group.id, &settings, group.created_at + Duration::seconds(15))
            .unwrap();
        assert_eq!(summary.completed_tasks, 0);
        assert_eq!(summary.mood, 45);

        let all = service
            .summaries(owner, &settings, group.created_at)
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].mood, 50);
    }

    #[test]
    fn test_summary_reports_persisted_mood_under_write_back() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let service = GroupService::new(&db);
        let group = service.create_group("Walkers", owner).unwrap();
        service.set_creature_mood(group.id, 85).unwrap();

        let settings = MoodSettings {
            persistence: MoodPersistence::WriteBack,
            ..MoodSettings::default()
        };
        let later = group.created_at + Duration::days(2);
        assert_eq!(service.summary(group.id, &settings, later).unwrap().mood, 85);
        assert_eq!(service.summaries(owner, &settings, later).unwrap()[0].mood, 85);

        // Ephemeral settings still use the formula
        let raw = service
            .summary(group.id, &MoodSettings::default(), later)
            .unwrap();
        assert_eq!(raw.mood, 0);
    }

    #[test]
    fn test_latest_group_and_mood_write() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let service = GroupService::new(&db);
        assert!(service.latest_group(owner).unwrap().is_none());

        let group = service.create_group("Walkers", owner).unwrap();
        service.set_creature_mood(group.id, 250).unwrap();
        assert_eq!(service.find_group(group.id).unwrap().creature_mood, 100);
        service.set_creature_mood(group.id, 42).unwrap();
        assert_eq!(service.find_group(group.id).unwrap().creature_mood, 42);
        assert_eq!(service.latest_group(owner).unwrap().unwrap().id, group.id);
    }
}
