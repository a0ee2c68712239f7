//! # Authorization Gate
//!
//! Converts an inbound credential into a trusted identity reference and
//! enforces resource ownership.
//!
//! [`AuthGate::authenticate`] takes the raw `Authorization` header value,
//! extracts the bearer token and delegates to the session manager; any
//! defect short-circuits with [`Error::Unauthenticated`]. The resulting
//! [`AuthenticatedUser`] is what handlers act on; they never touch raw
//! tokens.
//!
//! Ownership checks generalize over anything with an owner id: posts,
//! comments, or any future entity gated the same way.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::identity::UserId;
use crate::session::SessionManager;

/// A verified identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub email: String,
}

/// Extract the token from an `Authorization` header value.
///
/// Accepts both `Bearer <token>` and the sloppier `Bearer: <token>`.
/// The scheme must be followed by a separator; a glued value like
/// `Bearerabc` is not a bearer header.
pub(crate) fn bearer_token(header: &str) -> Option<&str> {
    let rest = header.strip_prefix("Bearer")?;
    let rest = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix(' '))?;
    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Authenticates requests and enforces ownership.
pub struct AuthGate {
    sessions: Arc<SessionManager>,
}

impl AuthGate {
    /// Create a gate over the given session manager.
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Authenticate a raw `Authorization` header value.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<AuthenticatedUser> {
        let header = authorization.ok_or(Error::Unauthenticated)?;
        let token = bearer_token(header).ok_or(Error::Unauthenticated)?;
        let claims = self.sessions.validate(token)?;
        Ok(AuthenticatedUser {
            id: claims.sub,
            email: claims.email,
        })
    }

    /// Fail with [`Error::Forbidden`] unless `user` owns the resource.
    pub fn require_ownership(&self, owner_id: &str, user: &AuthenticatedUser) -> Result<()> {
        if owner_id != user.id {
            return Err(Error::Forbidden);
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Gender, NewUser, User};
    use crate::session::DEFAULT_TOKEN_TTL_SECS;
    use crate::store::UserStore;

    fn gate() -> (AuthGate, Arc<SessionManager>, UserId) {
        let store = Arc::new(UserStore::new());
        let (mut user, _) = User::register(NewUser {
            first_name: "Alice".into(),
            last_name: "Tester".into(),
            birthday: "1990-01-01".into(),
            gender: Gender::Female,
            email: "alice@example.com".into(),
            password: "secret99".into(),
        })
        .unwrap();
        user.enabled = true;
        let id = user.id.clone();
        store.insert(user).unwrap();

        let sessions = Arc::new(SessionManager::new(
            store,
            "test-secret",
            DEFAULT_TOKEN_TTL_SECS,
        ));
        (AuthGate::new(sessions.clone()), sessions, id)
    }

    #[test]
    fn test_authenticate_happy_path() {
        let (gate, sessions, id) = gate();
        let token = sessions.issue(&id).unwrap();

        let user = gate
            .authenticate(Some(&format!("Bearer {token}")))
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn test_authenticate_accepts_colon_variant() {
        let (gate, sessions, id) = gate();
        let token = sessions.issue(&id).unwrap();

        assert!(gate
            .authenticate(Some(&format!("Bearer: {token}")))
            .is_ok());
    }

    #[test]
    fn test_authenticate_missing_or_malformed_header() {
        let (gate, sessions, id) = gate();
        let token = sessions.issue(&id).unwrap();

        assert_eq!(gate.authenticate(None), Err(Error::Unauthenticated));
        assert_eq!(gate.authenticate(Some("")), Err(Error::Unauthenticated));
        assert_eq!(
            gate.authenticate(Some("Bearer")),
            Err(Error::Unauthenticated)
        );
        assert_eq!(
            gate.authenticate(Some(&format!("Basic {token}"))),
            Err(Error::Unauthenticated)
        );
        // No separator after the scheme is not a bearer header.
        assert_eq!(
            gate.authenticate(Some(&format!("Bearer{token}"))),
            Err(Error::Unauthenticated)
        );
    }

    #[test]
    fn test_authenticate_revoked_token() {
        let (gate, sessions, id) = gate();
        let token = sessions.issue(&id).unwrap();
        sessions.revoke(&id, &token).unwrap();

        assert_eq!(
            gate.authenticate(Some(&format!("Bearer {token}"))),
            Err(Error::Unauthenticated)
        );
    }

    #[test]
    fn test_require_ownership() {
        let (gate, sessions, id) = gate();
        let token = sessions.issue(&id).unwrap();
        let user = gate.authenticate(Some(&format!("Bearer {token}"))).unwrap();

        assert!(gate.require_ownership(&id, &user).is_ok());
        assert_eq!(
            gate.require_ownership("someone-else", &user),
            Err(Error::Forbidden)
        );
    }
}
