//! Application state management

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use huddle_core::{Accounts, Config, Database, Group, GroupService, PhotoStore, User};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const DB_FILE: &str = "huddle.db";
const PHOTOS_DIR: &str = "photos";

/// Main application state
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub photos: PhotoStore,
    pub config: Config,
}

impl AppState {
    /// Open the database and photo store under the configured data directory
    pub fn new(config: Config) -> AppResult<Self> {
        let data_dir = config.data_dir()?;
        std::fs::create_dir_all(&data_dir)?;

        let db = Database::open(data_dir.join(DB_FILE))?;
        let photos = PhotoStore::with_base_path(data_dir.join(PHOTOS_DIR))?;
        debug!(dir = %data_dir.display(), "Application state opened");

        Ok(Self::from_parts(db, photos, config))
    }

    pub fn from_parts(db: Database, photos: PhotoStore, config: Config) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            photos,
            config,
        }
    }

    /// Lock the database. A panic elsewhere never leaves the connection
    /// mid-statement, so a poisoned lock is still usable.
    pub fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Session this device is signed in with
    pub fn current_session_id(&self) -> AppResult<Option<Uuid>> {
        Ok(self.db().preferences().device_session()?)
    }

    pub fn remember_session(&self, session_id: Uuid) -> AppResult<()> {
        Ok(self.db().preferences().save_device_session(session_id)?)
    }

    pub fn forget_session(&self) -> AppResult<()> {
        Ok(self.db().preferences().clear_device_session()?)
    }

    /// The signed-in user, if the saved session is still valid
    pub fn current_user(&self) -> AppResult<Option<User>> {
        let Some(session_id) = self.current_session_id()? else {
            return Ok(None);
        };
        let db = self.db();
        Ok(Accounts::new(&*db).current_user(session_id)?)
    }

    pub fn require_user(&self) -> AppResult<User> {
        self.current_user()?.ok_or(AppError::NotLoggedIn)
    }

    /// Remember which group the user last worked in
    pub fn select_group(&self, user_id: Uuid, group_id: Uuid) -> AppResult<()> {
        Ok(self.db().preferences().set_last_group(user_id, group_id)?)
    }

    /// Resolve the group a command acts on.
    ///
    /// An explicit id wins, then the last selected group, then the most
    /// recently joined one. The user must be a member of the result.
    pub fn current_group(&self, user_id: Uuid, explicit: Option<Uuid>) -> AppResult<Group> {
        let db = self.db();
        let groups = GroupService::new(&*db);

        let chosen = match explicit {
            Some(id) => Some(id),
            None => db.preferences().get_last_group(user_id)?,
        };

        if let Some(group_id) = chosen {
            let mine = groups.my_groups(user_id)?;
            if let Some(group) = mine.into_iter().find(|g| g.id == group_id) {
                return Ok(group);
            }
            if explicit.is_some() {
                return Err(huddle_core::Error::PermissionDenied(
                    "Not a member of this group".into(),
                )
                .into());
            }
        }

        groups.latest_group(user_id)?.ok_or(AppError::NoGroup)
    }
}
