//! Profile viewing and editing

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::accounts::validate_username;
use crate::error::{Error, Result};
use crate::models::{Profile, ProfileUpdate};
use crate::photos::{object_name, Bucket, PhotoStore};
use crate::storage::Storage;

pub struct ProfileService<'a, S: Storage + ?Sized> {
    store: &'a S,
}

impl<'a, S: Storage + ?Sized> ProfileService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn profile(&self, user_id: Uuid) -> Result<Profile> {
        self.store
            .find_profile(user_id)?
            .ok_or_else(|| Error::NotFound(format!("Profile {user_id}")))
    }

    /// Apply a partial update and return the fresh profile
    #[instrument(skip(self, update))]
    pub fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile> {
        let current = self.profile(user_id)?;
        if update.is_empty() {
            return Ok(current);
        }

        if let Some(username) = &update.username {
            let username = validate_username(username)?;
            if username != current.username {
                if let Some(other) = self.store.find_user_by_username(&username)? {
                    if other.id != user_id {
                        return Err(Error::Validation("Username already exists".into()));
                    }
                }
                self.store.rename_user(user_id, &username)?;
            }
        }

        let bio = update.bio.as_deref().map(str::trim);
        let avatar_url = update.avatar_url.as_deref().map(str::trim);
        if bio.is_some() || avatar_url.is_some() {
            self.store.update_profile(user_id, bio, avatar_url)?;
        }

        self.profile(user_id)
    }

    /// Store a new avatar image and point the profile at it
    #[instrument(skip(self, image, photos), fields(size = image.len()))]
    pub fn upload_avatar(
        &self,
        user_id: Uuid,
        image: &[u8],
        ext: Option<&str>,
        photos: &PhotoStore,
    ) -> Result<Profile> {
        self.profile(user_id)?;
        let stored = photos.upload(Bucket::Avatars, &object_name(user_id, ext, Utc::now()), image)?;
        self.store
            .update_profile(user_id, None, Some(&stored.public_url))?;
        self.profile(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::user;
    use crate::storage::Database;
    use tempfile::TempDir;

    #[test]
    fn test_update_profile_fields() {
        let db = Database::open_in_memory().unwrap();
        let ana = user(&db, "ana");
        let service = ProfileService::new(&db);

        let updated = service
            .update_profile(
                ana,
                &ProfileUpdate {
                    username: Some(" ana_k ".to_string()),
                    bio: Some(" early riser ".to_string()),
                    avatar_url: None,
                },
            )
            .unwrap();
        assert_eq!(updated.username, "ana_k");
        assert_eq!(updated.bio.as_deref(), Some("early riser"));

        let same = service
            .update_profile(ana, &ProfileUpdate::default())
            .unwrap();
        assert_eq!(same.username, "ana_k");
    }

    #[test]
    fn test_username_conflict() {
        let db = Database::open_in_memory().unwrap();
        let ana = user(&db, "ana");
        user(&db, "ben");
        let service = ProfileService::new(&db);

        let update = ProfileUpdate {
            username: Some("ben".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_profile(ana, &update),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_upload_avatar() {
        let tmp = TempDir::new().unwrap();
        let photos = PhotoStore::with_base_path(tmp.path().to_path_buf()).unwrap();
        let db = Database::open_in_memory().unwrap();
        let ana = user(&db, "ana");
        let service = ProfileService::new(&db);

        let profile = service
            .upload_avatar(ana, b"avatar", Some("webp"), &photos)
            .unwrap();
        let url = profile.avatar_url.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.contains(&ana.to_string()));
        assert_eq!(photos.list(Bucket::Avatars).unwrap().len(), 1);
    }
}
