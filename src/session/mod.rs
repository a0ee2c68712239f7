//! # Session Manager
//!
//! Issues, validates and revokes the bearer tokens that authenticate
//! requests.
//!
//! ## Token format
//!
//! A token is `base64url(claims JSON) . base64url(HMAC-SHA256 tag)`. The
//! tag is computed over the encoded claims with the server secret, so the
//! token is self-verifying: signature plus expiry can be checked without
//! touching the store.
//!
//! Signature validity alone is deliberately insufficient. A stateless
//! signed token cannot be invalidated before its expiry, so every issued
//! token is also appended to the owning user's `session_tokens` list and
//! [`SessionManager::validate`] additionally requires membership there.
//! Logout removes one entry; "log out everywhere" clears the list; both
//! take effect immediately.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Error, Result};
use crate::identity::UserId;
use crate::store::UserStore;
use crate::time::now_timestamp;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime (7 days).
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 7 * 24 * 3600;

/// Claims carried inside a session token.
///
/// Only non-secret data: enough to attach an identity to a request
/// without a profile load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Unique id of this token. Signing is deterministic, so without it
    /// two logins in the same second would produce the same token string
    /// and single-token revocation could not tell them apart.
    pub jti: String,
    /// The user this token was issued to.
    pub sub: UserId,
    /// Email at issue time.
    pub email: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

/// Signs and verifies session tokens with HMAC-SHA256.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
}

impl TokenSigner {
    /// Create a signer from the server secret.
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| Error::Internal(format!("hmac key: {e}")))
    }

    /// Sign claims into a transportable token.
    pub fn sign(&self, claims: &SessionClaims) -> Result<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{tag}"))
    }

    /// Verify a token's signature and expiry, returning its claims.
    ///
    /// Any defect (malformed structure, bad signature, expired) maps to
    /// [`Error::Unauthenticated`] so callers cannot distinguish (and leak)
    /// the failure mode.
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let (payload, tag) = token.split_once('.').ok_or(Error::Unauthenticated)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| Error::Unauthenticated)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&tag).map_err(|_| Error::Unauthenticated)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| Error::Unauthenticated)?;
        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| Error::Unauthenticated)?;

        if claims.exp <= now_timestamp() {
            return Err(Error::Unauthenticated);
        }
        Ok(claims)
    }
}

/// Issues and validates per-login bearer credentials with multi-session
/// revocation.
pub struct SessionManager {
    store: Arc<UserStore>,
    signer: TokenSigner,
    ttl_secs: i64,
}

impl SessionManager {
    /// Create a manager over the given store.
    pub fn new(store: Arc<UserStore>, secret: &str, ttl_secs: i64) -> Self {
        Self {
            store,
            signer: TokenSigner::new(secret),
            ttl_secs,
        }
    }

    /// Direct access to the signing primitive.
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Issue a fresh token for a user and record it in their session
    /// list. Token derivation is pure; only the append is persisted.
    pub fn issue(&self, user_id: &str) -> Result<String> {
        let token = self.store.with_transaction(|txn| {
            let mut user = txn.fetch(user_id)?;
            let now = now_timestamp();
            let claims = SessionClaims {
                jti: uuid::Uuid::new_v4().to_string(),
                sub: user.id.clone(),
                email: user.email.clone(),
                iat: now,
                exp: now + self.ttl_secs,
            };
            let token = self.signer.sign(&claims)?;
            user.session_tokens.push(token.clone());
            txn.stage(user);
            Ok(token)
        })?;

        tracing::info!(user = user_id, "Session issued");
        Ok(token)
    }

    /// Validate a token: signature, expiry, account state and membership
    /// in the owner's active session list.
    pub fn validate(&self, token: &str) -> Result<SessionClaims> {
        let claims = self.signer.verify(token)?;

        let user = self.store.get(&claims.sub).ok_or(Error::Unauthenticated)?;
        if !user.enabled {
            return Err(Error::Unauthenticated);
        }
        if !user.session_tokens.iter().any(|t| t == token) {
            // Valid signature but revoked (logout / logout-everywhere).
            return Err(Error::Unauthenticated);
        }
        Ok(claims)
    }

    /// Remove one matching token from the user's session list.
    ///
    /// Idempotent: revoking an absent token is a no-op, not an error.
    pub fn revoke(&self, user_id: &str, token: &str) -> Result<()> {
        self.store.with_transaction(|txn| {
            let mut user = txn.fetch(user_id)?;
            if let Some(index) = user.session_tokens.iter().position(|t| t == token) {
                user.session_tokens.remove(index);
                txn.stage(user);
            }
            Ok(())
        })?;

        tracing::info!(user = user_id, "Session revoked");
        Ok(())
    }

    /// Clear every session the user holds ("log out everywhere").
    pub fn revoke_all(&self, user_id: &str) -> Result<()> {
        self.store.with_transaction(|txn| {
            let mut user = txn.fetch(user_id)?;
            user.session_tokens.clear();
            txn.stage(user);
            Ok(())
        })?;

        tracing::info!(user = user_id, "All sessions revoked");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
