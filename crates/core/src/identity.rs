//! Identity collaborator: email/password accounts and sessions

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::feed::{ChangeKind, Collection};
use crate::models::{Account, Session, User};
use crate::storage::Database;
use crate::validation::{is_valid_email, ValidationError};

/// Sessions last one week
pub const SESSION_HOURS: i64 = 24 * 7;

pub trait IdentityProvider {
    /// Register an email/password account
    fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Account>;

    /// Register an account together with its `users` profile. The profile
    /// takes the account's id and email. Neither row is kept if either
    /// write fails.
    fn create_account_with_profile(&self, password: &str, profile: User) -> Result<User>;

    /// Check credentials and open a session
    fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    fn sign_out(&self, session_id: Uuid) -> Result<()>;

    /// A session that has not yet expired
    fn find_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    fn update_profile(
        &self,
        account_id: Uuid,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<()>;
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| Error::Authentication("Failed to hash password".to_string()))
}

fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|_| Error::Authentication("Invalid stored password".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn insert_account(
    db: &Database,
    email: &str,
    password: &str,
    display_name: Option<&str>,
) -> Result<Account> {
    let email = email.trim();
    if !is_valid_email(email) {
        return Err(ValidationError::Email.into());
    }

    let accounts = db.accounts();
    if accounts.find_by_email(email)?.is_some() {
        return Err(Error::Authentication("Email already in use".to_string()));
    }

    let mut account = Account::new(email.to_string(), hash_password(password)?);
    account.display_name = display_name.map(str::to_string);
    accounts.create(&account)?;

    info!(account_id = %account.id, "Account created");
    Ok(account)
}

impl IdentityProvider for Database {
    #[instrument(skip(self, password, display_name))]
    fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Account> {
        insert_account(self, email, password, display_name)
    }

    #[instrument(skip(self, password, profile), fields(role = profile.role.as_str()))]
    fn create_account_with_profile(&self, password: &str, mut profile: User) -> Result<User> {
        let tx = self.connection().unchecked_transaction()?;

        let account = insert_account(self, &profile.email, password, Some(&profile.name))?;
        profile.id = account.id;
        profile.email = account.email;
        self.users().create(&profile)?;

        tx.commit()?;
        self.publish(Collection::Users, ChangeKind::Added, profile.id);
        Ok(profile)
    }

    #[instrument(skip(self, password))]
    fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let accounts = self.accounts();
        let account = accounts
            .find_by_email(email.trim())?
            .ok_or_else(|| Error::Authentication("Invalid email or password".to_string()))?;

        if !verify_password(password, &account.password_hash)? {
            warn!(account_id = %account.id, "Password mismatch");
            return Err(Error::Authentication(
                "Invalid email or password".to_string(),
            ));
        }

        accounts.update_last_login(account.id)?;
        let session = Session::new(account.id, SESSION_HOURS);
        accounts.create_session(&session)?;
        Ok(session)
    }

    fn sign_out(&self, session_id: Uuid) -> Result<()> {
        self.accounts().delete_session(session_id)
    }

    fn find_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        self.accounts().find_valid_session(session_id)
    }

    fn update_profile(
        &self,
        account_id: Uuid,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<()> {
        if self
            .accounts()
            .update_profile(account_id, display_name, photo_url)?
        {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Account {}", account_id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_sign_in() {
        let db = Database::open_in_memory().unwrap();
        let account = db
            .create_account("asha@example.com", "Abc123!", Some("Asha"))
            .unwrap();
        assert_eq!(account.display_name.as_deref(), Some("Asha"));
        assert_ne!(account.password_hash, "Abc123!");

        let session = db.sign_in("asha@example.com", "Abc123!").unwrap();
        assert_eq!(session.account_id, account.id);
        assert!(db.find_session(session.id).unwrap().is_some());

        db.sign_out(session.id).unwrap();
        assert!(db.find_session(session.id).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_is_surfaced_verbatim() {
        let db = Database::open_in_memory().unwrap();
        db.create_account("asha@example.com", "Abc123!", None).unwrap();

        let err = db
            .create_account("ASHA@example.com", "Xyz789#", None)
            .unwrap_err();
        assert_eq!(err.to_string(), "Email already in use");
    }

    fn profile(email: &str) -> User {
        User::new(
            Uuid::nil(),
            "Asha".into(),
            email.into(),
            crate::models::UserRole::User,
        )
    }

    #[test]
    fn test_account_and_profile_share_identity() {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_account_with_profile("Abc123!", profile(" asha@example.com "))
            .unwrap();

        let account = db.accounts().find_by_email("asha@example.com").unwrap().unwrap();
        assert_eq!(user.id, account.id);
        assert_eq!(user.email, "asha@example.com");
        assert_eq!(account.display_name.as_deref(), Some("Asha"));
        let stored = db.users().find_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.email, account.email);
    }

    #[test]
    fn test_failed_profile_write_leaves_no_account() {
        let db = Database::open_in_memory().unwrap();
        db.connection()
            .execute_batch(
                "CREATE TRIGGER reject_profiles BEFORE INSERT ON users
                 BEGIN SELECT RAISE(ABORT, 'profile rejected'); END;",
            )
            .unwrap();

        assert!(db
            .create_account_with_profile("Abc123!", profile("asha@example.com"))
            .is_err());
        assert!(db.accounts().find_by_email("asha@example.com").unwrap().is_none());

        // The email is still free once profiles can be written again
        db.connection()
            .execute_batch("DROP TRIGGER reject_profiles;")
            .unwrap();
        let user = db
            .create_account_with_profile("Abc123!", profile("asha@example.com"))
            .unwrap();
        assert!(db.users().find_by_id(user.id).unwrap().is_some());
    }

    #[test]
    fn test_wrong_password() {
        let db = Database::open_in_memory().unwrap();
        db.create_account("ravi@example.com", "Abc123!", None).unwrap();

        let err = db.sign_in("ravi@example.com", "abc123!").unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_update_profile() {
        let db = Database::open_in_memory().unwrap();
        let account = db.create_account("meera@example.com", "Abc123!", None).unwrap();

        db.update_profile(account.id, Some("Meera"), Some("https://img.example/m.png"))
            .unwrap();
        let loaded = db.accounts().find_by_id(account.id).unwrap().unwrap();
        assert_eq!(loaded.display_name.as_deref(), Some("Meera"));
        assert_eq!(loaded.photo_url.as_deref(), Some("https://img.example/m.png"));

        assert!(db.update_profile(Uuid::new_v4(), Some("X"), None).is_err());
    }
}
