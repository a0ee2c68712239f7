//! # Error Handling
//!
//! Crate-wide error types for Ripple.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants are
//! grouped by domain: validation, friendship conflicts, authentication,
//! missing resources and store failures. Each variant maps to an HTTP
//! status through [`Error::status`] and to a stable machine-readable kind
//! string through [`Error::kind`], which the HTTP layer places in the
//! `type` field of error responses.
//!
//! Precondition failures (`AlreadyFriends`, `NoSuchRequest`, ...) are
//! detected before any mutation and are terminal for the request.
//! [`Error::TransactionFailed`] is the only retryable error: it means the
//! store refused to commit an atomic multi-record write (typically a
//! write-write conflict) and the caller may retry with no partial effects
//! to worry about.

use thiserror::Error;

/// Result type alias for Ripple operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Ripple.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Validation
    // ========================================================================
    /// Malformed or missing input.
    #[error("Check your inputs: {0}")]
    InvalidInput(String),

    /// A user tried to create a relationship with themselves.
    #[error("You cannot send a friend request to yourself.")]
    SelfRelationship,

    /// A profile edit touched a field that is not editable via that route.
    #[error("You are not allowed to change '{0}' via this route.")]
    ForbiddenField(String),

    /// Registration or email change with an address already in use.
    #[error("This e-mail address is already in use.")]
    EmailTaken,

    /// Post or comment content was empty.
    #[error("Content body can not be empty.")]
    EmptyContent,

    /// Account activation token was missing or did not match any account.
    #[error("Please provide a valid activation token.")]
    InvalidActivationToken,

    /// Password reset token was missing, unknown or expired.
    #[error("Reset token is not valid or has expired.")]
    InvalidResetToken,

    /// Email change confirmation code did not match.
    #[error("Confirmation code is not valid.")]
    InvalidConfirmationCode,

    /// Activation requested for an account that is already enabled.
    #[error("Account is already activated.")]
    AlreadyActivated,

    /// Login attempted against a not-yet-activated account.
    #[error("Account is not activated. Please activate your account.")]
    AccountNotActivated,

    /// Login or password change with wrong credentials.
    #[error("Check your credentials.")]
    InvalidCredentials,

    // ========================================================================
    // Friendship conflicts
    // ========================================================================
    /// The two users are already friends.
    #[error("The user is already your friend.")]
    AlreadyFriends,

    /// An identical friend request is already pending on the target.
    #[error("You already sent a friend request to this user.")]
    RequestAlreadySent,

    /// The target already sent a request to the requester; it should be
    /// accepted instead of answered with a new request.
    #[error("You have a friend request from this user. Just accept it.")]
    ReciprocalRequestExists,

    /// No pending request exists between the two users.
    #[error("There is no such friend request.")]
    NoSuchRequest,

    /// The two users are not friends.
    #[error("This user is not your friend.")]
    NotFriends,

    // ========================================================================
    // Like conflicts
    // ========================================================================
    /// The user already liked this post or comment.
    #[error("You already liked this.")]
    AlreadyLiked,

    /// The user has not liked this post or comment.
    #[error("You have not liked this.")]
    NotLiked,

    // ========================================================================
    // Authentication / authorization
    // ========================================================================
    /// Missing, malformed, forged, expired or revoked credential.
    #[error("You are not authorized to access this route.")]
    Unauthenticated,

    /// Authenticated, but not the owner of the resource.
    #[error("Only the owner can perform this operation.")]
    Forbidden,

    // ========================================================================
    // Missing resources
    // ========================================================================
    /// No user with the given id or email.
    #[error("User not found with the given information.")]
    UserNotFound,

    /// No post with the given id.
    #[error("Post not found with the given information.")]
    PostNotFound,

    /// No comment with the given id under the given post.
    #[error("Comment not found with the given information.")]
    CommentNotFound,

    // ========================================================================
    // Store
    // ========================================================================
    /// The store could not commit an atomic multi-record write. No partial
    /// effects were applied; the operation may be retried.
    #[error("The operation could not be committed. Try again.")]
    TransactionFailed,

    // ========================================================================
    // Internal
    // ========================================================================
    /// Serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status code this error maps to.
    pub fn status(&self) -> u16 {
        match self {
            Error::InvalidInput(_)
            | Error::SelfRelationship
            | Error::ForbiddenField(_)
            | Error::EmptyContent
            | Error::InvalidActivationToken
            | Error::InvalidResetToken
            | Error::InvalidConfirmationCode
            | Error::AccountNotActivated
            | Error::InvalidCredentials => 400,

            Error::Unauthenticated => 401,

            Error::Forbidden => 403,

            Error::UserNotFound | Error::PostNotFound | Error::CommentNotFound => 404,

            Error::EmailTaken
            | Error::AlreadyActivated
            | Error::AlreadyFriends
            | Error::RequestAlreadySent
            | Error::ReciprocalRequestExists
            | Error::NoSuchRequest
            | Error::NotFriends
            | Error::AlreadyLiked
            | Error::NotLiked => 409,

            Error::TransactionFailed => 503,

            Error::Serialization(_) | Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable kind, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid-inputs",
            Error::SelfRelationship => "self-relationship",
            Error::ForbiddenField(_) => "forbidden-field",
            Error::EmailTaken => "email-already-taken",
            Error::EmptyContent => "empty-content",
            Error::InvalidActivationToken => "invalid-activation-token",
            Error::InvalidResetToken => "invalid-token",
            Error::InvalidConfirmationCode => "invalid-code",
            Error::AlreadyActivated => "already-activated",
            Error::AccountNotActivated => "account-not-activated",
            Error::InvalidCredentials => "invalid-credentials",
            Error::AlreadyFriends => "already-friends",
            Error::RequestAlreadySent => "request-already-sent",
            Error::ReciprocalRequestExists => "reciprocal-request-exists",
            Error::NoSuchRequest => "no-such-request",
            Error::NotFriends => "not-friends",
            Error::AlreadyLiked => "already-liked",
            Error::NotLiked => "not-liked",
            Error::Unauthenticated => "unauthorized-request",
            Error::Forbidden => "forbidden",
            Error::UserNotFound => "user-not-found",
            Error::PostNotFound => "post-not-found",
            Error::CommentNotFound => "comment-not-found",
            Error::TransactionFailed => "transaction-failed",
            Error::Serialization(_) => "serialization-error",
            Error::Internal(_) => "internal-error",
        }
    }

    /// Whether the caller may retry the operation unchanged.
    ///
    /// Only commit failures are retryable; every other error is terminal
    /// for that request and needs new input to succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransactionFailed)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
