//! # Identity
//!
//! User identity records and everything derived from them: registration
//! validation, password verification, account/reset token derivation and
//! the friendship-status view other modules build on.
//!
//! A [`User`] exclusively owns its own list fields. The relationship lists
//! (`friends`, `pending_friend_requests`, `sent_friend_requests`) are only
//! ever mutated by the friendship graph engine, and `session_tokens` only
//! by the session manager, both through the store's transaction boundary,
//! never in place.

use chrono::NaiveDate;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::time::now_timestamp;

pub mod accounts;
pub mod password;

/// Unique identifier of a user record. Immutable, assigned at creation.
pub type UserId = String;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Default lifetime of a password-reset token (1 hour).
pub const RESET_TOKEN_TTL_SECS: i64 = 3600;

/// Gender choices offered at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Other,
}

/// Relationship status shown on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipStatus {
    #[serde(rename = "single")]
    Single,
    #[serde(rename = "in a relationship")]
    InARelationship,
    #[serde(rename = "engaged")]
    Engaged,
    #[serde(rename = "married")]
    Married,
    #[serde(rename = "divorced")]
    Divorced,
    #[serde(rename = "widowed")]
    Widowed,
}

/// Friendship state of one user toward another, from the viewer's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendshipStatus {
    /// The other user is in the viewer's friend list.
    Friend,
    /// The viewer has an outbound request to the other user.
    RequestSent,
    /// The other user has requested friendship with the viewer.
    Pending,
    /// No relationship at all.
    None,
}

impl FriendshipStatus {
    /// Compute the viewer's status toward `other`.
    ///
    /// Checked in order: friends, inbound request, outbound request.
    /// The mutual-exclusion invariant means at most one can hold.
    pub fn between(viewer: &User, other: &UserId) -> Self {
        if viewer.friends.contains(other) {
            FriendshipStatus::Friend
        } else if viewer.pending_friend_requests.contains(other) {
            FriendshipStatus::Pending
        } else if viewer.sent_friend_requests.contains(other) {
            FriendshipStatus::RequestSent
        } else {
            FriendshipStatus::None
        }
    }
}

/// Input for creating a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    /// Accepted formats: YYYY-MM-DD, YYYY/MM/DD, YYYY.MM.DD.
    pub birthday: String,
    pub gender: Gender,
    pub email: String,
    pub password: String,
}

/// A registered user record.
///
/// This is the persisted layout; HTTP responses use the view types below
/// so secrets and internal bookkeeping never leak.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub birthday: NaiveDate,
    pub gender: Gender,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
    pub profile_image: String,
    pub cover_image: String,
    /// Account usable only when true. Set by activation.
    pub enabled: bool,
    pub activation_token: Option<String>,
    pub reset_password_token: Option<String>,
    pub reset_password_expires: Option<i64>,
    pub email_change_code: Option<String>,
    pub current_city: Option<String>,
    pub hometown: Option<String>,
    pub relationship: Option<RelationshipStatus>,
    /// Post ids on the user's home feed, newest first.
    pub feed: Vec<String>,
    /// Post ids the user authored, newest first.
    pub shared_posts: Vec<String>,
    /// Confirmed friends. Symmetric with the other side's list.
    pub friends: Vec<UserId>,
    /// Inbound friend requests: users who requested friendship with us.
    pub pending_friend_requests: Vec<UserId>,
    /// Outbound friend requests: exact inverse of the counterpart's
    /// pending list.
    pub sent_friend_requests: Vec<UserId>,
    /// Currently valid session tokens, oldest first.
    pub session_tokens: Vec<String>,
}

impl User {
    /// Create a disabled user from registration input.
    ///
    /// Returns the record together with its account activation token;
    /// the account stays unusable until the token is redeemed.
    pub fn register(input: NewUser) -> Result<(Self, String)> {
        if input.first_name.trim().is_empty() {
            return Err(Error::InvalidInput("please provide a name".into()));
        }
        if input.last_name.trim().is_empty() {
            return Err(Error::InvalidInput("please provide a lastname".into()));
        }
        if !is_valid_email(&input.email) {
            return Err(Error::InvalidInput("please provide a valid email".into()));
        }
        if input.password.len() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(format!(
                "please provide a password with min length {}",
                MIN_PASSWORD_LEN
            )));
        }
        let birthday = parse_birthday(&input.birthday)?;

        let activation_token = generate_activation_token();
        let user = Self {
            id: Uuid::new_v4().to_string(),
            first_name: input.first_name,
            last_name: input.last_name,
            birthday,
            gender: input.gender,
            email: input.email,
            password_hash: password::hash(&input.password),
            created_at: now_timestamp(),
            profile_image: "default_profile.jpg".to_string(),
            cover_image: "default_cover.jpg".to_string(),
            enabled: false,
            activation_token: Some(activation_token.clone()),
            reset_password_token: None,
            reset_password_expires: None,
            email_change_code: None,
            current_city: None,
            hometown: None,
            relationship: None,
            feed: Vec::new(),
            shared_posts: Vec::new(),
            friends: Vec::new(),
            pending_friend_requests: Vec::new(),
            sent_friend_requests: Vec::new(),
            session_tokens: Vec::new(),
        };
        Ok((user, activation_token))
    }

    /// Verify a candidate password against the stored hash.
    pub fn verify_password(&self, candidate: &str) -> bool {
        password::verify(candidate, &self.password_hash)
    }

    /// Full display name.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Minimal public card used in search results and friend listings.
#[derive(Debug, Clone, Serialize)]
pub struct UserCard {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: String,
}

impl From<&User> for UserCard {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            profile_image: user.profile_image.clone(),
        }
    }
}

/// Self-profile view: everything the owner may see, secrets stripped.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub birthday: NaiveDate,
    pub gender: Gender,
    pub email: String,
    pub profile_image: String,
    pub cover_image: String,
    pub current_city: Option<String>,
    pub hometown: Option<String>,
    pub relationship: Option<RelationshipStatus>,
    pub friends: Vec<UserId>,
    pub pending_friend_requests: Vec<UserId>,
    pub sent_friend_requests: Vec<UserId>,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            birthday: user.birthday,
            gender: user.gender,
            email: user.email.clone(),
            profile_image: user.profile_image.clone(),
            cover_image: user.cover_image.clone(),
            current_city: user.current_city.clone(),
            hometown: user.hometown.clone(),
            relationship: user.relationship,
            friends: user.friends.clone(),
            pending_friend_requests: user.pending_friend_requests.clone(),
            sent_friend_requests: user.sent_friend_requests.clone(),
        }
    }
}

/// Fields a user may change through the personal-data route.
///
/// Security-sensitive fields (email, password, the relationship lists,
/// the enabled flag) have their own guarded flows; touching them here is
/// rejected with [`Error::ForbiddenField`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonalDataEdit {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthday: Option<String>,
    pub gender: Option<Gender>,
    pub current_city: Option<String>,
    pub hometown: Option<String>,
    pub relationship: Option<RelationshipStatus>,
}

/// Names of fields that must never be editable via the personal-data
/// route, regardless of how the request body is shaped.
const FORBIDDEN_EDIT_FIELDS: &[&str] = &[
    "id",
    "email",
    "password",
    "password_hash",
    "enabled",
    "activation_token",
    "reset_password_token",
    "reset_password_expires",
    "email_change_code",
    "created_at",
    "profile_image",
    "cover_image",
    "feed",
    "shared_posts",
    "friends",
    "pending_friend_requests",
    "sent_friend_requests",
    "session_tokens",
];

/// Apply a raw personal-data edit to a user record.
///
/// The edit arrives as a JSON object so unknown and forbidden keys can be
/// rejected explicitly rather than silently dropped.
pub fn apply_personal_edit(user: &mut User, edit: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
    for key in edit.keys() {
        if FORBIDDEN_EDIT_FIELDS.contains(&key.as_str()) {
            return Err(Error::ForbiddenField(key.clone()));
        }
    }
    let parsed: PersonalDataEdit =
        serde_json::from_value(serde_json::Value::Object(edit.clone()))
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

    if let Some(first_name) = parsed.first_name {
        if first_name.trim().is_empty() {
            return Err(Error::InvalidInput("please provide a name".into()));
        }
        user.first_name = first_name;
    }
    if let Some(last_name) = parsed.last_name {
        if last_name.trim().is_empty() {
            return Err(Error::InvalidInput("please provide a lastname".into()));
        }
        user.last_name = last_name;
    }
    if let Some(birthday) = parsed.birthday {
        user.birthday = parse_birthday(&birthday)?;
    }
    if let Some(gender) = parsed.gender {
        user.gender = gender;
    }
    if let Some(city) = parsed.current_city {
        user.current_city = Some(city);
    }
    if let Some(hometown) = parsed.hometown {
        user.hometown = Some(hometown);
    }
    if let Some(relationship) = parsed.relationship {
        user.relationship = Some(relationship);
    }
    Ok(())
}

// ============================================================================
// TOKEN DERIVATION
// ============================================================================

fn random_token(entropy_bytes: usize) -> String {
    let mut bytes = vec![0u8; entropy_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Derive a fresh account activation token.
pub fn generate_activation_token() -> String {
    random_token(18)
}

/// Derive a fresh password-reset token.
pub fn generate_reset_token() -> String {
    random_token(15)
}

/// Derive a 6-digit email change confirmation code.
pub fn generate_email_change_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}

// ============================================================================
// INPUT PARSING
// ============================================================================

/// Parse a birthday in any of the accepted date formats.
pub fn parse_birthday(raw: &str) -> Result<NaiveDate> {
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Ok(date);
        }
    }
    Err(Error::InvalidInput(
        "invalid date format, birthday must be YYYY-MM-DD".into(),
    ))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

// ============================================================================
// TESTS
// ============================================================================
