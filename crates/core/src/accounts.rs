//! Account registration, sign-in and sessions

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Session, User};
use crate::storage::UserRepository;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;
/// Sessions last one week
pub const SESSION_HOURS: i64 = 24 * 7;

/// A signed-in user and the session proving it
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub session: Session,
}

/// Account operations over any user repository
pub struct Accounts<'a, R: UserRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: UserRepository + ?Sized> Accounts<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Register a new account, create its profile and sign it in
    #[instrument(skip(self, password))]
    pub fn sign_up(&self, username: &str, password: &str) -> Result<SignedIn> {
        let username = validate_username(username)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self.repo.find_user_by_username(&username)?.is_some() {
            return Err(Error::Validation("Username already exists".to_string()));
        }

        let user = User::new(username, hash_password(password)?);
        self.repo.create_user(&user)?;
        self.repo.create_profile(user.id)?;

        let session = Session::new(user.id, SESSION_HOURS);
        self.repo.create_session(&session)?;

        info!(user_id = %user.id, "Account created");
        Ok(SignedIn { user, session })
    }

    /// Verify credentials and open a new session
    #[instrument(skip(self, password))]
    pub fn sign_in(&self, username: &str, password: &str) -> Result<SignedIn> {
        let user = self
            .repo
            .find_user_by_username(username.trim())?
            .ok_or_else(|| Error::Authentication("User not found".to_string()))?;

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "Rejected sign-in");
            return Err(Error::Authentication("Invalid password".to_string()));
        }

        self.repo.update_last_login(user.id)?;
        let purged = self.repo.cleanup_expired_sessions()?;
        if purged > 0 {
            debug!(purged, "Removed expired sessions");
        }
        let session = Session::new(user.id, SESSION_HOURS);
        self.repo.create_session(&session)?;

        Ok(SignedIn { user, session })
    }

    #[instrument(skip(self))]
    pub fn sign_out(&self, session_id: Uuid) -> Result<()> {
        self.repo.delete_session(session_id)
    }

    /// User behind a valid session, if any
    pub fn current_user(&self, session_id: Uuid) -> Result<Option<User>> {
        match self.repo.find_valid_session(session_id)? {
            Some(session) => self.repo.find_user_by_id(session.user_id),
            None => Ok(None),
        }
    }

    /// Like [`Accounts::current_user`] but failing when signed out
    pub fn require_user(&self, session_id: Uuid) -> Result<User> {
        self.current_user(session_id)?
            .ok_or_else(|| Error::Authentication("Session expired".to_string()))
    }
}

/// Trim and length-check a username
pub fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(Error::Validation(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    Ok(username.to_string())
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| Error::InvalidOperation("Failed to hash password".to_string()))
}

fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|_| Error::Authentication("Invalid stored password".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_sign_up_then_sign_in() {
        let db = Database::open_in_memory().unwrap();
        let accounts = Accounts::new(&db);

        let created = accounts.sign_up("  river ", "hunter22").unwrap();
        assert_eq!(created.user.username, "river");
        assert!(db.find_profile(created.user.id).unwrap().is_some());

        let signed_in = accounts.sign_in("river", "hunter22").unwrap();
        assert_eq!(signed_in.user.id, created.user.id);
        let current = accounts.current_user(signed_in.session.id).unwrap().unwrap();
        assert_eq!(current.id, created.user.id);
    }

    #[test]
    fn test_validation_rules() {
        let db = Database::open_in_memory().unwrap();
        let accounts = Accounts::new(&db);

        assert!(matches!(
            accounts.sign_up("ab", "longenough"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            accounts.sign_up("abc", "short"),
            Err(Error::Validation(_))
        ));

        accounts.sign_up("abc", "longenough").unwrap();
        assert!(matches!(
            accounts.sign_up("abc", "another1"),
            Err(Error::Validation(msg)) if msg.contains("exists")
        ));
    }

    #[test]
    fn test_wrong_password_and_sign_out() {
        let db = Database::open_in_memory().unwrap();
        let accounts = Accounts::new(&db);
        let created = accounts.sign_up("river", "hunter22").unwrap();

        assert!(matches!(
            accounts.sign_in("river", "hunter23"),
            Err(Error::Authentication(_))
        ));
        assert!(matches!(
            accounts.sign_in("nobody", "hunter22"),
            Err(Error::Authentication(_))
        ));

        accounts.sign_out(created.session.id).unwrap();
        assert!(accounts.current_user(created.session.id).unwrap().is_none());
        assert!(accounts.require_user(created.session.id).is_err());
    }
}
