//! # Ripple
//!
//! A social-networking backend core: identity and sessions, a friendship
//! graph with atomic two-sided updates, and posts with feed fan-out.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         RIPPLE MODULES                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐  │
//! │  │ Identity  │   │  Friends  │   │  Session  │   │   Posts   │  │
//! │  │           │   │           │   │           │   │           │  │
//! │  │ - Users   │   │ - Request │   │ - Issue   │   │ - Feed    │  │
//! │  │ - Accounts│   │ - Accept  │   │ - Validate│   │ - Likes   │  │
//! │  │ - Tokens  │   │ - Unfriend│   │ - Revoke  │   │ - Comments│  │
//! │  └─────┬─────┘   └─────┬─────┘   └─────┬─────┘   └─────┬─────┘  │
//! │        │               │               │               │        │
//! │        └───────────────┴───────┬───────┴───────────────┘        │
//! │                                │                                 │
//! │                    ┌───────────▼───────────┐                     │
//! │                    │         Store         │                     │
//! │                    │  versioned records +  │                     │
//! │                    │  atomic transactions  │                     │
//! │                    └───────────────────────┘                     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Server configuration
//! - [`store`] - Versioned in-memory stores with transactional commits
//! - [`identity`] - User records, account flows, profile rules
//! - [`friends`] - Friendship graph (requests, accept/deny/cancel, unfriend)
//! - [`session`] - Signed session tokens with server-side revocation
//! - [`auth`] - Request authentication and ownership checks
//! - [`posts`] - Posts, comments, likes and feed fan-out
//! - [`server`] - axum handlers and router
//!
//! ## Consistency Model
//!
//! Friendship state lives denormalized on both user records. Every
//! mutation that touches two records goes through the store's
//! transaction boundary, which validates record versions at commit and
//! aborts without partial effects on conflict. Aborts surface as a
//! retryable error; every other error is terminal for that call.

pub mod auth;
pub mod config;
pub mod error;
pub mod friends;
pub mod identity;
pub mod posts;
pub mod server;
pub mod session;
pub mod store;
pub mod time;

pub use auth::{AuthGate, AuthenticatedUser};
pub use error::{Error, Result};
pub use friends::FriendshipGraph;
pub use identity::{FriendshipStatus, NewUser, User, UserId};
pub use posts::{Comment, Post, PostService};
pub use session::{SessionClaims, SessionManager, TokenSigner};
pub use store::UserStore;
