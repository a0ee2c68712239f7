//! # Account Flows
//!
//! Registration, activation, login/logout and the credential-change
//! flows. Each flow coordinates the user store and the session manager;
//! handlers stay thin.
//!
//! Email delivery is out of scope. Activation tokens, reset tokens and
//! confirmation codes are generated, persisted and returned to the
//! caller so an outer delivery layer (or a test) can pick them up.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::identity::{
    generate_activation_token, generate_email_change_code, generate_reset_token, is_valid_email,
    password, NewUser, User, UserId, MIN_PASSWORD_LEN, RESET_TOKEN_TTL_SECS,
};
use crate::session::SessionManager;
use crate::store::UserStore;
use crate::time::now_timestamp;

/// Coordinates account lifecycle and credential flows.
pub struct AccountManager {
    store: Arc<UserStore>,
    sessions: Arc<SessionManager>,
}

impl AccountManager {
    /// Create a manager over the given store and session manager.
    pub fn new(store: Arc<UserStore>, sessions: Arc<SessionManager>) -> Self {
        Self { store, sessions }
    }

    /// Register a new, disabled account.
    ///
    /// Returns the new user id and the activation token the account must
    /// redeem before it can log in.
    pub fn register(&self, input: NewUser) -> Result<(UserId, String)> {
        let (user, activation_token) = User::register(input)?;
        let user_id = user.id.clone();
        self.store.insert(user)?;

        tracing::info!(user = user_id.as_str(), "Account registered");
        Ok((user_id, activation_token))
    }

    /// Redeem an activation token, enabling the account.
    pub fn activate(&self, token: &str) -> Result<UserId> {
        let user = self
            .store
            .find_by_activation_token(token)
            .ok_or(Error::InvalidActivationToken)?;
        let user_id = user.id.clone();

        self.store.with_transaction(|txn| {
            let mut user = txn.fetch(&user_id)?;
            user.enabled = true;
            user.activation_token = None;
            txn.stage(user);
            Ok(())
        })?;

        tracing::info!(user = user_id.as_str(), "Account activated");
        Ok(user_id)
    }

    /// Issue a fresh activation token for a not-yet-enabled account.
    pub fn resend_activation(&self, email: &str) -> Result<String> {
        let user = self.store.find_by_email(email).ok_or(Error::UserNotFound)?;
        if user.enabled {
            return Err(Error::AlreadyActivated);
        }

        let token = generate_activation_token();
        let user_id = user.id.clone();
        let stored = token.clone();
        self.store.with_transaction(|txn| {
            let mut user = txn.fetch(&user_id)?;
            user.activation_token = Some(stored.clone());
            txn.stage(user);
            Ok(())
        })?;
        Ok(token)
    }

    /// Verify credentials and open a session.
    ///
    /// A wrong email and a wrong password produce the same error so the
    /// response does not confirm which addresses are registered.
    pub fn login(&self, email: &str, password: &str) -> Result<(UserId, String)> {
        let user = self
            .store
            .find_by_email(email)
            .ok_or(Error::InvalidCredentials)?;
        if !user.verify_password(password) {
            return Err(Error::InvalidCredentials);
        }
        if !user.enabled {
            return Err(Error::AccountNotActivated);
        }

        let token = self.sessions.issue(&user.id)?;
        Ok((user.id, token))
    }

    /// Close the session behind the presented token.
    pub fn logout(&self, user_id: &str, token: &str) -> Result<()> {
        self.sessions.revoke(user_id, token)
    }

    /// Start a password reset: derive a time-limited token and store it
    /// on the record.
    pub fn forgot_password(&self, email: &str) -> Result<String> {
        let user = self.store.find_by_email(email).ok_or(Error::UserNotFound)?;

        let token = generate_reset_token();
        let user_id = user.id.clone();
        let stored = token.clone();
        self.store.with_transaction(|txn| {
            let mut user = txn.fetch(&user_id)?;
            user.reset_password_token = Some(stored.clone());
            user.reset_password_expires = Some(now_timestamp() + RESET_TOKEN_TTL_SECS);
            txn.stage(user);
            Ok(())
        })?;

        tracing::info!(user = user_id.as_str(), "Password reset requested");
        Ok(token)
    }

    /// Consume a reset token and set a new password.
    ///
    /// `logout_everywhere` additionally clears the whole session list, so
    /// a stolen session dies with the old password.
    pub fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        logout_everywhere: bool,
    ) -> Result<UserId> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(format!(
                "please provide a password with min length {}",
                MIN_PASSWORD_LEN
            )));
        }
        let user = self
            .store
            .find_by_reset_token(token)
            .ok_or(Error::InvalidResetToken)?;
        match user.reset_password_expires {
            Some(expires) if expires > now_timestamp() => {}
            _ => return Err(Error::InvalidResetToken),
        }

        let user_id = user.id.clone();
        let hash = password::hash(new_password);
        self.store.with_transaction(|txn| {
            let mut user = txn.fetch(&user_id)?;
            user.password_hash = hash.clone();
            user.reset_password_token = None;
            user.reset_password_expires = None;
            if logout_everywhere {
                user.session_tokens.clear();
            }
            txn.stage(user);
            Ok(())
        })?;

        tracing::info!(user = user_id.as_str(), "Password reset");
        Ok(user_id)
    }

    /// Change the password of a logged-in user.
    ///
    /// `logout_everywhere` revokes every session except the one making
    /// the change.
    pub fn edit_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
        logout_everywhere: bool,
        current_token: &str,
    ) -> Result<()> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(format!(
                "please provide a password with min length {}",
                MIN_PASSWORD_LEN
            )));
        }
        let user = self.store.find_by_id(user_id)?;
        if !user.verify_password(old_password) {
            return Err(Error::InvalidCredentials);
        }

        let hash = password::hash(new_password);
        self.store.with_transaction(|txn| {
            let mut user = txn.fetch(user_id)?;
            user.password_hash = hash.clone();
            if logout_everywhere {
                user.session_tokens.retain(|t| t == current_token);
            }
            txn.stage(user);
            Ok(())
        })?;

        tracing::info!(user = user_id, "Password changed");
        Ok(())
    }

    /// Start an email change: re-verify the password, check the new
    /// address and derive a 6-digit confirmation code.
    pub fn request_email_change(
        &self,
        user_id: &str,
        password: &str,
        new_email: &str,
    ) -> Result<String> {
        let user = self.store.find_by_id(user_id)?;
        if !user.verify_password(password) {
            return Err(Error::InvalidCredentials);
        }
        if !is_valid_email(new_email) {
            return Err(Error::InvalidInput("please provide a valid email".into()));
        }
        if self.store.email_in_use(new_email) {
            return Err(Error::EmailTaken);
        }

        let code = generate_email_change_code();
        let stored = code.clone();
        self.store.with_transaction(|txn| {
            let mut user = txn.fetch(user_id)?;
            user.email_change_code = Some(stored.clone());
            txn.stage(user);
            Ok(())
        })?;
        Ok(code)
    }

    /// Consume the confirmation code and switch the address.
    pub fn change_email(&self, user_id: &str, code: &str, new_email: &str) -> Result<()> {
        let user = self.store.find_by_id(user_id)?;
        if user.email_change_code.as_deref() != Some(code) {
            return Err(Error::InvalidConfirmationCode);
        }
        // Re-checked at consume time: the address may have been taken
        // between request and confirmation.
        if self.store.email_in_use(new_email) {
            return Err(Error::EmailTaken);
        }

        let new_email = new_email.to_string();
        self.store.with_transaction(|txn| {
            let mut user = txn.fetch(user_id)?;
            user.email = new_email.clone();
            user.email_change_code = None;
            txn.stage(user);
            Ok(())
        })?;

        tracing::info!(user = user_id, "Email address changed");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Gender;
    use crate::session::DEFAULT_TOKEN_TTL_SECS;

    fn input(email: &str) -> NewUser {
        NewUser {
            first_name: "Alice".into(),
            last_name: "Adams".into(),
            birthday: "1990-04-21".into(),
            gender: Gender::Female,
            email: email.into(),
            password: "secret99".into(),
        }
    }

    fn manager() -> (AccountManager, Arc<UserStore>, Arc<SessionManager>) {
        let store = Arc::new(UserStore::new());
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            "test-secret",
            DEFAULT_TOKEN_TTL_SECS,
        ));
        (
            AccountManager::new(store.clone(), sessions.clone()),
            store,
            sessions,
        )
    }

    #[test]
    fn test_register_activate_login() {
        let (accounts, store, _) = manager();
        let (id, activation) = accounts.register(input("alice@example.com")).unwrap();

        // Login before activation is refused.
        assert_eq!(
            accounts.login("alice@example.com", "secret99"),
            Err(Error::AccountNotActivated)
        );

        assert_eq!(accounts.activate(&activation), Ok(id.clone()));
        assert!(store.find_by_id(&id).unwrap().activation_token.is_none());

        let (login_id, token) = accounts.login("alice@example.com", "secret99").unwrap();
        assert_eq!(login_id, id);
        assert!(!token.is_empty());
    }

    #[test]
    fn test_register_rejects_duplicate_email() {
        let (accounts, _, _) = manager();
        accounts.register(input("alice@example.com")).unwrap();
        assert_eq!(
            accounts.register(input("Alice@Example.com")).unwrap_err(),
            Error::EmailTaken
        );
    }

    #[test]
    fn test_activate_with_unknown_token() {
        let (accounts, _, _) = manager();
        assert_eq!(
            accounts.activate("no-such-token"),
            Err(Error::InvalidActivationToken)
        );
    }

    #[test]
    fn test_resend_activation() {
        let (accounts, _, _) = manager();
        let (_, first) = accounts.register(input("alice@example.com")).unwrap();

        let second = accounts.resend_activation("alice@example.com").unwrap();
        assert_ne!(first, second);
        // The first token is superseded.
        assert_eq!(
            accounts.activate(&first),
            Err(Error::InvalidActivationToken)
        );
        assert!(accounts.activate(&second).is_ok());

        assert_eq!(
            accounts.resend_activation("alice@example.com"),
            Err(Error::AlreadyActivated)
        );
    }

    #[test]
    fn test_login_failure_modes_indistinguishable() {
        let (accounts, _, _) = manager();
        let (_, activation) = accounts.register(input("alice@example.com")).unwrap();
        accounts.activate(&activation).unwrap();

        assert_eq!(
            accounts.login("nobody@example.com", "secret99"),
            Err(Error::InvalidCredentials)
        );
        assert_eq!(
            accounts.login("alice@example.com", "wrong-pass"),
            Err(Error::InvalidCredentials)
        );
    }

    #[test]
    fn test_logout_revokes_only_presented_token() {
        let (accounts, _, sessions) = manager();
        let (id, activation) = accounts.register(input("alice@example.com")).unwrap();
        accounts.activate(&activation).unwrap();

        let (_, first) = accounts.login("alice@example.com", "secret99").unwrap();
        let (_, second) = accounts.login("alice@example.com", "secret99").unwrap();

        accounts.logout(&id, &first).unwrap();
        assert!(sessions.validate(&first).is_err());
        assert!(sessions.validate(&second).is_ok());
    }

    #[test]
    fn test_password_reset_flow() {
        let (accounts, _, sessions) = manager();
        let (_, activation) = accounts.register(input("alice@example.com")).unwrap();
        accounts.activate(&activation).unwrap();
        let (_, token) = accounts.login("alice@example.com", "secret99").unwrap();

        let reset = accounts.forgot_password("alice@example.com").unwrap();
        accounts.reset_password(&reset, "brand-new-pass", true).unwrap();

        // Old password dead, old session dead, new password works.
        assert_eq!(
            accounts.login("alice@example.com", "secret99"),
            Err(Error::InvalidCredentials)
        );
        assert!(sessions.validate(&token).is_err());
        assert!(accounts.login("alice@example.com", "brand-new-pass").is_ok());

        // The token is single-use.
        assert_eq!(
            accounts.reset_password(&reset, "another-pass", false),
            Err(Error::InvalidResetToken)
        );
    }

    #[test]
    fn test_expired_reset_token_rejected() {
        let (accounts, store, _) = manager();
        let (id, _) = accounts.register(input("alice@example.com")).unwrap();
        let reset = accounts.forgot_password("alice@example.com").unwrap();

        let mut user = store.find_by_id(&id).unwrap();
        user.reset_password_expires = Some(now_timestamp() - 1);
        store.save(user).unwrap();

        assert_eq!(
            accounts.reset_password(&reset, "brand-new-pass", false),
            Err(Error::InvalidResetToken)
        );
    }

    #[test]
    fn test_edit_password_keeps_current_session() {
        let (accounts, _, sessions) = manager();
        let (id, activation) = accounts.register(input("alice@example.com")).unwrap();
        accounts.activate(&activation).unwrap();

        let (_, current) = accounts.login("alice@example.com", "secret99").unwrap();
        let (_, other) = accounts.login("alice@example.com", "secret99").unwrap();

        accounts
            .edit_password(&id, "secret99", "fresh-secret", true, &current)
            .unwrap();

        assert!(sessions.validate(&current).is_ok());
        assert!(sessions.validate(&other).is_err());
        assert!(accounts.login("alice@example.com", "fresh-secret").is_ok());
    }

    #[test]
    fn test_edit_password_requires_old_password() {
        let (accounts, _, _) = manager();
        let (id, activation) = accounts.register(input("alice@example.com")).unwrap();
        accounts.activate(&activation).unwrap();

        assert_eq!(
            accounts.edit_password(&id, "wrong", "fresh-secret", false, ""),
            Err(Error::InvalidCredentials)
        );
    }

    #[test]
    fn test_email_change_flow() {
        let (accounts, store, _) = manager();
        let (id, activation) = accounts.register(input("alice@example.com")).unwrap();
        accounts.activate(&activation).unwrap();

        let code = accounts
            .request_email_change(&id, "secret99", "alice@new.example.com")
            .unwrap();

        assert_eq!(
            accounts.change_email(&id, "000000", "alice@new.example.com"),
            Err(Error::InvalidConfirmationCode)
        );
        accounts
            .change_email(&id, &code, "alice@new.example.com")
            .unwrap();

        let user = store.find_by_id(&id).unwrap();
        assert_eq!(user.email, "alice@new.example.com");
        assert!(user.email_change_code.is_none());
    }

    #[test]
    fn test_email_change_rejects_taken_address() {
        let (accounts, _, _) = manager();
        let (id, activation) = accounts.register(input("alice@example.com")).unwrap();
        accounts.activate(&activation).unwrap();
        accounts.register(input("bob@example.com")).unwrap();

        assert_eq!(
            accounts.request_email_change(&id, "secret99", "bob@example.com"),
            Err(Error::EmailTaken)
        );
    }
}
