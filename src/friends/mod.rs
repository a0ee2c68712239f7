//! # Friendship Graph Engine
//!
//! Relationship-state transitions between pairs of user records.
//!
//! ## Relationship lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      FRIENDSHIP LIFECYCLE                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │            send_request(R, T)                                   │
//! │   NONE ───────────────────────────► REQUESTED                   │
//! │    ▲        R ∈ T.pending                 │                     │
//! │    │        T ∈ R.sent                    │ accept_request(T,R) │
//! │    │                                      ▼                     │
//! │    │◄── cancel_request(R, T)          FRIENDS                   │
//! │    │◄── deny_request(T, R)            R ∈ T.friends             │
//! │    │                                  T ∈ R.friends             │
//! │    │                                      │                     │
//! │    └──────────────────────────────────────┘                     │
//! │                  unfriend(either side)                          │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no edge entity: a relationship is two list entries, one per
//! side, that must stay consistent. Every operation here therefore spans
//! two records and runs inside a single store transaction, so both writes
//! commit together or neither does, and a failed commit surfaces as
//! [`Error::TransactionFailed`] with no partial state left behind.
//!
//! ## Invariants
//!
//! After every successful operation:
//!
//! 1. Symmetry: `A ∈ B.friends ⇔ B ∈ A.friends`.
//! 2. Duality: `A ∈ B.pending_friend_requests ⇔ B ∈ A.sent_friend_requests`.
//! 3. Mutual exclusion: a pair is never simultaneously friends and
//!    requested.
//! 4. No self-relationship.
//!
//! For "does this request exist" checks the *pending-list holder* is the
//! authoritative side; the sent list is treated as a mirror and cleaned
//! up opportunistically. This keeps a hypothetical asymmetric leftover
//! from ever being read as a valid request.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::identity::{FriendshipStatus, UserId};
use crate::store::UserStore;

/// Remove the first occurrence of `id` from `list`. Returns whether an
/// entry was removed.
fn remove_one(list: &mut Vec<UserId>, id: &str) -> bool {
    if let Some(index) = list.iter().position(|entry| entry == id) {
        list.remove(index);
        true
    } else {
        false
    }
}

/// Performs every relationship-state transition as an all-or-nothing
/// update spanning two identity records.
///
/// This engine is the sole writer of the `friends`,
/// `pending_friend_requests` and `sent_friend_requests` lists.
pub struct FriendshipGraph {
    store: Arc<UserStore>,
}

impl FriendshipGraph {
    /// Create an engine over the given store.
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }

    /// Send a friend request from `requester` to `target`.
    ///
    /// Precondition checks, in order, before any mutation:
    /// - requester and target must differ;
    /// - [`Error::AlreadyFriends`] if they are already friends;
    /// - [`Error::RequestAlreadySent`] if the identical request is
    ///   already pending on the target;
    /// - [`Error::ReciprocalRequestExists`] if the target has already
    ///   requested the requester; the caller should accept instead.
    pub fn send_request(&self, requester_id: &str, target_id: &str) -> Result<()> {
        if requester_id == target_id {
            return Err(Error::SelfRelationship);
        }

        self.store.with_transaction(|txn| {
            let mut requester = txn.fetch(requester_id)?;
            let mut target = txn.fetch(target_id)?;

            if target.friends.iter().any(|id| id == requester_id) {
                return Err(Error::AlreadyFriends);
            }
            if target
                .pending_friend_requests
                .iter()
                .any(|id| id == requester_id)
            {
                return Err(Error::RequestAlreadySent);
            }
            if requester
                .pending_friend_requests
                .iter()
                .any(|id| id == target_id)
            {
                return Err(Error::ReciprocalRequestExists);
            }

            target.pending_friend_requests.push(requester_id.to_string());
            requester.sent_friend_requests.push(target_id.to_string());
            txn.stage(target);
            txn.stage(requester);
            Ok(())
        })?;

        tracing::info!(from = requester_id, to = target_id, "Friend request sent");
        Ok(())
    }

    /// Accept a pending friend request from `sender`.
    ///
    /// Moves the pair from the requested state to friends: four list
    /// mutations across two records, committed atomically.
    pub fn accept_request(&self, accepter_id: &str, sender_id: &str) -> Result<()> {
        if accepter_id == sender_id {
            return Err(Error::SelfRelationship);
        }

        self.store.with_transaction(|txn| {
            let mut accepter = txn.fetch(accepter_id)?;
            let mut sender = txn.fetch(sender_id)?;

            if accepter.friends.iter().any(|id| id == sender_id) {
                return Err(Error::AlreadyFriends);
            }
            if !remove_one(&mut accepter.pending_friend_requests, sender_id) {
                return Err(Error::NoSuchRequest);
            }

            accepter.friends.push(sender_id.to_string());
            remove_one(&mut sender.sent_friend_requests, accepter_id);
            sender.friends.push(accepter_id.to_string());

            txn.stage(accepter);
            txn.stage(sender);
            Ok(())
        })?;

        tracing::info!(
            accepter = accepter_id,
            sender = sender_id,
            "Friend request accepted"
        );
        Ok(())
    }

    /// Deny a pending friend request from `sender`.
    ///
    /// The denier's pending list is the authoritative side; the sender's
    /// sent list is cleaned up as a mirror.
    pub fn deny_request(&self, denier_id: &str, sender_id: &str) -> Result<()> {
        if denier_id == sender_id {
            return Err(Error::SelfRelationship);
        }

        self.store.with_transaction(|txn| {
            let mut denier = txn.fetch(denier_id)?;
            let mut sender = txn.fetch(sender_id)?;

            if !remove_one(&mut denier.pending_friend_requests, sender_id) {
                return Err(Error::NoSuchRequest);
            }
            remove_one(&mut sender.sent_friend_requests, denier_id);

            txn.stage(denier);
            txn.stage(sender);
            Ok(())
        })?;

        tracing::info!(denier = denier_id, sender = sender_id, "Friend request denied");
        Ok(())
    }

    /// Cancel a friend request the caller previously sent to `recipient`.
    ///
    /// Authoritative check is on the recipient's pending list: if the
    /// entry is gone the request no longer exists (never sent, already
    /// answered, or already cancelled).
    pub fn cancel_request(&self, canceller_id: &str, recipient_id: &str) -> Result<()> {
        if canceller_id == recipient_id {
            return Err(Error::SelfRelationship);
        }

        self.store.with_transaction(|txn| {
            let mut canceller = txn.fetch(canceller_id)?;
            let mut recipient = txn.fetch(recipient_id)?;

            if !remove_one(&mut recipient.pending_friend_requests, canceller_id) {
                return Err(Error::NoSuchRequest);
            }
            remove_one(&mut canceller.sent_friend_requests, recipient_id);

            txn.stage(recipient);
            txn.stage(canceller);
            Ok(())
        })?;

        tracing::info!(
            canceller = canceller_id,
            recipient = recipient_id,
            "Friend request cancelled"
        );
        Ok(())
    }

    /// Dissolve an existing friendship between `user` and `friend`.
    pub fn unfriend(&self, user_id: &str, friend_id: &str) -> Result<()> {
        if user_id == friend_id {
            return Err(Error::SelfRelationship);
        }

        self.store.with_transaction(|txn| {
            let mut user = txn.fetch(user_id)?;
            let mut friend = txn.fetch(friend_id)?;

            if !remove_one(&mut user.friends, friend_id) {
                return Err(Error::NotFriends);
            }
            remove_one(&mut friend.friends, user_id);

            txn.stage(user);
            txn.stage(friend);
            Ok(())
        })?;

        tracing::info!(user = user_id, friend = friend_id, "Friendship dissolved");
        Ok(())
    }

    /// The viewer's friendship status toward another user.
    pub fn status(&self, viewer_id: &str, other_id: &str) -> Result<FriendshipStatus> {
        let viewer = self.store.find_by_id(viewer_id)?;
        let _ = self.store.find_by_id(other_id)?;
        Ok(FriendshipStatus::between(&viewer, &other_id.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Gender, NewUser, User};

    fn seed(store: &UserStore, name: &str) -> UserId {
        let (user, _) = User::register(NewUser {
            first_name: name.into(),
            last_name: "Tester".into(),
            birthday: "1990-01-01".into(),
            gender: Gender::Other,
            email: format!("{}@example.com", name.to_lowercase()),
            password: "secret99".into(),
        })
        .unwrap();
        let id = user.id.clone();
        store.insert(user).unwrap();
        id
    }

    fn engine() -> (FriendshipGraph, Arc<UserStore>, UserId, UserId) {
        let store = Arc::new(UserStore::new());
        let a = seed(&store, "Alice");
        let b = seed(&store, "Bob");
        (FriendshipGraph::new(store.clone()), store, a, b)
    }

    /// Symmetry and duality must hold for a pair after any operation.
    fn assert_invariants(store: &UserStore, a: &str, b: &str) {
        let ua = store.find_by_id(a).unwrap();
        let ub = store.find_by_id(b).unwrap();

        assert_eq!(
            ua.friends.contains(&b.to_string()),
            ub.friends.contains(&a.to_string()),
            "symmetry violated"
        );
        assert_eq!(
            ua.pending_friend_requests.contains(&b.to_string()),
            ub.sent_friend_requests.contains(&a.to_string()),
            "duality violated (a pending / b sent)"
        );
        assert_eq!(
            ub.pending_friend_requests.contains(&a.to_string()),
            ua.sent_friend_requests.contains(&b.to_string()),
            "duality violated (b pending / a sent)"
        );
        let friends = ua.friends.contains(&b.to_string());
        let requested = ua.pending_friend_requests.contains(&b.to_string())
            || ua.sent_friend_requests.contains(&b.to_string());
        assert!(!(friends && requested), "mutual exclusion violated");

        for user in [&ua, &ub] {
            assert!(!user.friends.contains(&user.id), "self in friends");
            assert!(
                !user.pending_friend_requests.contains(&user.id),
                "self in pending"
            );
            assert!(!user.sent_friend_requests.contains(&user.id), "self in sent");
        }
    }

    #[test]
    fn test_send_request_writes_both_sides() {
        let (graph, store, a, b) = engine();

        graph.send_request(&a, &b).unwrap();

        let alice = store.find_by_id(&a).unwrap();
        let bob = store.find_by_id(&b).unwrap();
        assert_eq!(bob.pending_friend_requests, vec![a.clone()]);
        assert_eq!(alice.sent_friend_requests, vec![b.clone()]);
        assert_invariants(&store, &a, &b);
    }

    #[test]
    fn test_send_request_to_self_rejected() {
        let (graph, store, a, _) = engine();
        assert_eq!(graph.send_request(&a, &a), Err(Error::SelfRelationship));
        let alice = store.find_by_id(&a).unwrap();
        assert!(alice.sent_friend_requests.is_empty());
        assert!(alice.pending_friend_requests.is_empty());
    }

    #[test]
    fn test_send_request_to_missing_user() {
        let (graph, _, a, _) = engine();
        assert_eq!(graph.send_request(&a, "missing"), Err(Error::UserNotFound));
    }

    #[test]
    fn test_repeated_send_is_rejected_idempotently() {
        let (graph, store, a, b) = engine();

        graph.send_request(&a, &b).unwrap();
        let after_first = store.find_by_id(&b).unwrap();

        assert_eq!(graph.send_request(&a, &b), Err(Error::RequestAlreadySent));

        // State after the rejected second call equals state after the first.
        let after_second = store.find_by_id(&b).unwrap();
        assert_eq!(
            after_first.pending_friend_requests,
            after_second.pending_friend_requests
        );
        assert_eq!(
            store.find_by_id(&a).unwrap().sent_friend_requests,
            vec![b.clone()]
        );
        assert_invariants(&store, &a, &b);
    }

    #[test]
    fn test_reciprocal_request_points_at_accept() {
        let (graph, store, a, b) = engine();

        graph.send_request(&a, &b).unwrap();
        assert_eq!(
            graph.send_request(&b, &a),
            Err(Error::ReciprocalRequestExists)
        );
        assert_invariants(&store, &a, &b);
    }

    #[test]
    fn test_accept_round_trip() {
        let (graph, store, a, b) = engine();

        graph.send_request(&a, &b).unwrap();
        graph.accept_request(&b, &a).unwrap();

        let alice = store.find_by_id(&a).unwrap();
        let bob = store.find_by_id(&b).unwrap();
        assert_eq!(alice.friends, vec![b.clone()]);
        assert_eq!(bob.friends, vec![a.clone()]);
        assert!(alice.sent_friend_requests.is_empty());
        assert!(alice.pending_friend_requests.is_empty());
        assert!(bob.sent_friend_requests.is_empty());
        assert!(bob.pending_friend_requests.is_empty());
        assert_invariants(&store, &a, &b);
    }

    #[test]
    fn test_accept_without_request() {
        let (graph, store, a, b) = engine();
        assert_eq!(graph.accept_request(&b, &a), Err(Error::NoSuchRequest));
        assert_invariants(&store, &a, &b);
    }

    #[test]
    fn test_accept_when_already_friends() {
        let (graph, _, a, b) = engine();
        graph.send_request(&a, &b).unwrap();
        graph.accept_request(&b, &a).unwrap();
        assert_eq!(graph.accept_request(&b, &a), Err(Error::AlreadyFriends));
    }

    #[test]
    fn test_send_request_when_already_friends() {
        let (graph, store, a, b) = engine();
        graph.send_request(&a, &b).unwrap();
        graph.accept_request(&b, &a).unwrap();

        assert_eq!(graph.send_request(&a, &b), Err(Error::AlreadyFriends));
        assert_eq!(graph.send_request(&b, &a), Err(Error::AlreadyFriends));
        assert_invariants(&store, &a, &b);
    }

    #[test]
    fn test_cancel_restores_pre_call_state() {
        let (graph, store, a, b) = engine();
        let alice_before = store.find_by_id(&a).unwrap();
        let bob_before = store.find_by_id(&b).unwrap();

        graph.send_request(&a, &b).unwrap();
        graph.cancel_request(&a, &b).unwrap();

        assert_eq!(store.find_by_id(&a).unwrap(), alice_before);
        assert_eq!(store.find_by_id(&b).unwrap(), bob_before);
    }

    #[test]
    fn test_cancel_without_request() {
        let (graph, _, a, b) = engine();
        assert_eq!(graph.cancel_request(&a, &b), Err(Error::NoSuchRequest));
    }

    #[test]
    fn test_deny_clears_both_sides_without_friendship() {
        let (graph, store, a, b) = engine();

        graph.send_request(&a, &b).unwrap();
        graph.deny_request(&b, &a).unwrap();

        let alice = store.find_by_id(&a).unwrap();
        let bob = store.find_by_id(&b).unwrap();
        assert!(alice.sent_friend_requests.is_empty());
        assert!(bob.pending_friend_requests.is_empty());
        assert!(alice.friends.is_empty());
        assert!(bob.friends.is_empty());
        assert_invariants(&store, &a, &b);
    }

    #[test]
    fn test_deny_without_request() {
        let (graph, _, a, b) = engine();
        assert_eq!(graph.deny_request(&b, &a), Err(Error::NoSuchRequest));
    }

    #[test]
    fn test_unfriend() {
        let (graph, store, a, b) = engine();
        graph.send_request(&a, &b).unwrap();
        graph.accept_request(&b, &a).unwrap();

        graph.unfriend(&a, &b).unwrap();

        assert!(store.find_by_id(&a).unwrap().friends.is_empty());
        assert!(store.find_by_id(&b).unwrap().friends.is_empty());
        assert_invariants(&store, &a, &b);
    }

    #[test]
    fn test_unfriend_non_friends_mutates_nothing() {
        let (graph, store, a, b) = engine();
        let alice_before = store.find_by_id(&a).unwrap();
        let bob_before = store.find_by_id(&b).unwrap();

        assert_eq!(graph.unfriend(&a, &b), Err(Error::NotFriends));

        assert_eq!(store.find_by_id(&a).unwrap(), alice_before);
        assert_eq!(store.find_by_id(&b).unwrap(), bob_before);
    }

    #[test]
    fn test_accept_commit_failure_leaves_no_partial_friendship() {
        let (graph, store, a, b) = engine();
        graph.send_request(&a, &b).unwrap();

        store.fail_next_commit();
        assert_eq!(graph.accept_request(&b, &a), Err(Error::TransactionFailed));

        // No side became friends and the request is still pending intact.
        let alice = store.find_by_id(&a).unwrap();
        let bob = store.find_by_id(&b).unwrap();
        assert!(alice.friends.is_empty());
        assert!(bob.friends.is_empty());
        assert_eq!(bob.pending_friend_requests, vec![a.clone()]);
        assert_eq!(alice.sent_friend_requests, vec![b.clone()]);
        assert_invariants(&store, &a, &b);

        // Retry succeeds with no duplicated entries.
        graph.accept_request(&b, &a).unwrap();
        assert_eq!(store.find_by_id(&a).unwrap().friends, vec![b.clone()]);
        assert_eq!(store.find_by_id(&b).unwrap().friends, vec![a.clone()]);
    }

    #[test]
    fn test_send_commit_failure_leaves_no_partial_request() {
        let (graph, store, a, b) = engine();

        store.fail_next_commit();
        assert_eq!(graph.send_request(&a, &b), Err(Error::TransactionFailed));

        let alice = store.find_by_id(&a).unwrap();
        let bob = store.find_by_id(&b).unwrap();
        assert!(alice.sent_friend_requests.is_empty());
        assert!(bob.pending_friend_requests.is_empty());
    }

    #[test]
    fn test_invariants_across_operation_sequences() {
        let (graph, store, a, b) = engine();
        let c = seed(&store, "Carol");

        graph.send_request(&a, &b).unwrap();
        graph.send_request(&a, &c).unwrap();
        graph.send_request(&c, &b).unwrap();
        graph.accept_request(&b, &a).unwrap();
        graph.deny_request(&b, &c).unwrap();
        graph.cancel_request(&a, &c).unwrap();
        graph.unfriend(&b, &a).unwrap();

        for (x, y) in [(&a, &b), (&a, &c), (&b, &c)] {
            assert_invariants(&store, x, y);
        }
    }

    #[test]
    fn test_status_view() {
        let (graph, _, a, b) = engine();

        assert_eq!(graph.status(&a, &b).unwrap(), FriendshipStatus::None);
        graph.send_request(&a, &b).unwrap();
        assert_eq!(graph.status(&a, &b).unwrap(), FriendshipStatus::RequestSent);
        assert_eq!(graph.status(&b, &a).unwrap(), FriendshipStatus::Pending);
        graph.accept_request(&b, &a).unwrap();
        assert_eq!(graph.status(&a, &b).unwrap(), FriendshipStatus::Friend);
        assert_eq!(graph.status(&b, &a).unwrap(), FriendshipStatus::Friend);
    }
}
