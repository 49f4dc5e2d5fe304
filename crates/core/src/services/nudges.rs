//! Nudges between group members, rate limited per pair

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::require_member;
use crate::config::DEFAULT_NUDGE_COOLDOWN_SECS;
use crate::error::{Error, Result};
use crate::models::{Nudge, NudgeStatus};
use crate::storage::Storage;

pub struct NudgeService<'a, S: Storage + ?Sized> {
    store: &'a S,
    cooldown: Duration,
}

impl<'a, S: Storage + ?Sized> NudgeService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_cooldown(store, DEFAULT_NUDGE_COOLDOWN_SECS)
    }

    pub fn with_cooldown(store: &'a S, cooldown_secs: i64) -> Self {
        Self {
            store,
            cooldown: Duration::seconds(cooldown_secs.max(0)),
        }
    }

    /// Whether `from` may nudge `to` in `group` at `now`
    pub fn can_nudge(
        &self,
        from_user: Uuid,
        to_user: Uuid,
        group_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<NudgeStatus> {
        let Some(last) = self
            .store
            .last_nudge_between(from_user, to_user, group_id)?
        else {
            return Ok(NudgeStatus {
                allowed: true,
                seconds_left: 0,
            });
        };

        let remaining_ms = (self.cooldown - (now - last)).num_milliseconds();
        if remaining_ms <= 0 {
            return Ok(NudgeStatus {
                allowed: true,
                seconds_left: 0,
            });
        }

        Ok(NudgeStatus {
            allowed: false,
            // Round partial seconds up
            seconds_left: (remaining_ms + 999) / 1000,
        })
    }

    /// Record a nudge after membership and cooldown checks
    #[instrument(skip(self))]
    pub fn send_nudge(
        &self,
        from_user: Uuid,
        to_user: Uuid,
        group_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Nudge> {
        if from_user == to_user {
            return Err(Error::InvalidOperation("Cannot nudge yourself".into()));
        }
        require_member(self.store, from_user, group_id)?;
        require_member(self.store, to_user, group_id)?;

        let status = self.can_nudge(from_user, to_user, group_id, now)?;
        if !status.allowed {
            return Err(Error::Cooldown {
                seconds_left: status.seconds_left,
            });
        }

        let mut nudge = Nudge::new(group_id, from_user, to_user);
        nudge.created_at = now;
        self.store.create_nudge(&nudge)?;
        debug!(nudge_id = %nudge.id, "Nudge recorded");
        Ok(nudge)
    }

    pub fn received(&self, user_id: Uuid, limit: u32) -> Result<Vec<Nudge>> {
        self.store.list_nudges_received(user_id, limit)
    }

    /// Push token of the nudge target, if registered
    pub fn push_token_for(&self, user_id: Uuid) -> Result<Option<String>> {
        Ok(self
            .store
            .find_profile(user_id)?
            .and_then(|p| p.push_token)
            .filter(|t| !t.trim().is_empty()))
    }

    /// Save the device push token on the user's profile
    #[instrument(skip(self, token))]
    pub fn register_push_token(&self, user_id: Uuid, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Validation("Push token is empty".into()));
        }
        self.store.set_push_token(user_id, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{group_with, user};
    use crate::storage::Database;

    #[test]
    fn test_cooldown_per_pair() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "ben");
        let c = user(&db, "cy_");
        let group = group_with(&db, a, &[b, c]);
        let service = NudgeService::new(&db);
        let t0 = Utc::now();

        assert!(service.can_nudge(a, b, group.id, t0).unwrap().allowed);
        service.send_nudge(a, b, group.id, t0).unwrap();

        let status = service
            .can_nudge(a, b, group.id, t0 + Duration::milliseconds(20_500))
            .unwrap();
        assert_eq!(
            status,
            NudgeStatus {
                allowed: false,
                seconds_left: 40
            }
        );
        match service.send_nudge(a, b, group.id, t0 + Duration::seconds(30)) {
            Err(Error::Cooldown { seconds_left }) => assert_eq!(seconds_left, 30),
            other => panic!("unexpected {other:?}"),
        }

        // Other pairs are independent
        service.send_nudge(a, c, group.id, t0).unwrap();
        service.send_nudge(b, a, group.id, t0).unwrap();

        service
            .send_nudge(a, b, group.id, t0 + Duration::seconds(60))
            .unwrap();
        assert_eq!(service.received(b, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_nudge_rules() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "ben");
        let group = group_with(&db, a, &[]);
        let service = NudgeService::with_cooldown(&db, 0);

        assert!(matches!(
            service.send_nudge(a, a, group.id, Utc::now()),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            service.send_nudge(a, b, group.id, Utc::now()),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_push_token_registration() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let service = NudgeService::new(&db);

        assert_eq!(service.push_token_for(a).unwrap(), None);
        assert!(service.register_push_token(a, "  ").is_err());
        service
            .register_push_token(a, " ExponentPushToken[abc] ")
            .unwrap();
        assert_eq!(
            service.push_token_for(a).unwrap().as_deref(),
            Some("ExponentPushToken[abc]")
        );
    }
}
