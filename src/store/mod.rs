//! # Store
//!
//! In-memory document store backing the identity, post and comment
//! records.
//!
//! The user collection is transactional: [`UserStore::with_transaction`]
//! runs a closure against a read-validated snapshot and commits every
//! staged write atomically, or none of them. Conflict detection is
//! per-record version CAS: if any record read inside the transaction was
//! written by someone else before commit, the whole transaction fails
//! with [`Error::TransactionFailed`] and leaves zero observable effects.
//! This is the atomicity boundary the friendship graph engine and session
//! manager rely on for their dual-write contract.
//!
//! Posts and comments only ever need single-record writes, so their
//! collections are plain locked maps.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::identity::{User, UserId};
use crate::posts::{Comment, Post};

// ============================================================================
// USER STORE
// ============================================================================

struct Versioned {
    version: u64,
    user: User,
}

/// Transactional collection of user records, keyed and indexed by id.
#[derive(Default)]
pub struct UserStore {
    records: RwLock<HashMap<UserId, Versioned>>,
    #[cfg(test)]
    fail_next_commit: std::sync::atomic::AtomicBool,
}

impl UserStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly registered user.
    ///
    /// Enforces email uniqueness (case-insensitive) across the collection.
    pub fn insert(&self, user: User) -> Result<()> {
        let mut guard = self.records.write();
        if guard.contains_key(&user.id) {
            return Err(Error::Internal(format!("duplicate user id {}", user.id)));
        }
        let email = user.email.to_lowercase();
        if guard.values().any(|r| r.user.email.to_lowercase() == email) {
            return Err(Error::EmailTaken);
        }
        guard.insert(user.id.clone(), Versioned { version: 0, user });
        Ok(())
    }

    /// Look up a user by id.
    pub fn get(&self, id: &str) -> Option<User> {
        self.records.read().get(id).map(|r| r.user.clone())
    }

    /// Look up a user by id, failing with [`Error::UserNotFound`].
    pub fn find_by_id(&self, id: &str) -> Result<User> {
        self.get(id).ok_or(Error::UserNotFound)
    }

    /// Look up a user by email (case-insensitive).
    pub fn find_by_email(&self, email: &str) -> Option<User> {
        let email = email.to_lowercase();
        self.records
            .read()
            .values()
            .find(|r| r.user.email.to_lowercase() == email)
            .map(|r| r.user.clone())
    }

    /// Whether an email address is already registered.
    pub fn email_in_use(&self, email: &str) -> bool {
        self.find_by_email(email).is_some()
    }

    /// Look up a user by account activation token.
    pub fn find_by_activation_token(&self, token: &str) -> Option<User> {
        self.records
            .read()
            .values()
            .find(|r| r.user.activation_token.as_deref() == Some(token))
            .map(|r| r.user.clone())
    }

    /// Look up a user by password reset token.
    pub fn find_by_reset_token(&self, token: &str) -> Option<User> {
        self.records
            .read()
            .values()
            .find(|r| r.user.reset_password_token.as_deref() == Some(token))
            .map(|r| r.user.clone())
    }

    /// Ids of every user whose feed contains the given post.
    ///
    /// Feed fan-out is captured at post time, so the holders can differ
    /// from the author's current friend list.
    pub fn feed_holders(&self, post_id: &str) -> Vec<UserId> {
        self.records
            .read()
            .values()
            .filter(|r| r.user.feed.iter().any(|id| id == post_id))
            .map(|r| r.user.id.clone())
            .collect()
    }

    /// Case-insensitive substring search over first and last names.
    ///
    /// An empty or whitespace query returns no results.
    pub fn search_by_name(&self, query: &str) -> Vec<User> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.records
            .read()
            .values()
            .filter(|r| {
                r.user.first_name.to_lowercase().contains(&query)
                    || r.user.last_name.to_lowercase().contains(&query)
            })
            .map(|r| r.user.clone())
            .collect()
    }

    /// Overwrite a single existing record.
    ///
    /// For multi-record writes use [`Self::with_transaction`] instead.
    pub fn save(&self, user: User) -> Result<()> {
        let mut guard = self.records.write();
        let record = guard.get_mut(&user.id).ok_or(Error::UserNotFound)?;
        record.version += 1;
        record.user = user;
        Ok(())
    }

    /// Number of registered users.
    pub fn count(&self) -> usize {
        self.records.read().len()
    }

    /// Run a closure against the collection with atomic commit semantics.
    ///
    /// The closure reads records through [`UserTxn::fetch`] and stages
    /// writes with [`UserTxn::stage`]. If the closure errors, nothing is
    /// written. On success every record read is revalidated against its
    /// version at fetch time under the write lock; a mismatch means a
    /// concurrent writer got there first and the commit fails as a whole
    /// with [`Error::TransactionFailed`].
    pub fn with_transaction<R>(&self, f: impl FnOnce(&mut UserTxn<'_>) -> Result<R>) -> Result<R> {
        let mut txn = UserTxn {
            store: self,
            reads: HashMap::new(),
            writes: HashMap::new(),
        };
        let out = f(&mut txn)?;

        let mut guard = self.records.write();

        #[cfg(test)]
        if self
            .fail_next_commit
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(Error::TransactionFailed);
        }

        // Validate the whole read set before applying anything.
        for (id, version) in &txn.reads {
            match guard.get(id) {
                Some(record) if record.version == *version => {}
                _ => return Err(Error::TransactionFailed),
            }
        }
        for id in txn.writes.keys() {
            if !guard.contains_key(id) {
                return Err(Error::TransactionFailed);
            }
        }

        for (id, user) in txn.writes {
            // Present by the check above; the write lock is still held.
            if let Some(record) = guard.get_mut(&id) {
                record.version += 1;
                record.user = user;
            }
        }
        Ok(out)
    }

    /// Force the next transaction commit to fail, without applying any
    /// staged writes. Test fixture for atomicity-under-failure coverage.
    #[cfg(test)]
    pub fn fail_next_commit(&self) {
        self.fail_next_commit
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

/// An in-flight transaction over the user collection.
pub struct UserTxn<'a> {
    store: &'a UserStore,
    reads: HashMap<UserId, u64>,
    writes: HashMap<UserId, User>,
}

impl UserTxn<'_> {
    /// Read a record inside the transaction.
    ///
    /// Returns the staged copy if the record was already written in this
    /// transaction; otherwise records the version for commit validation.
    pub fn fetch(&mut self, id: &str) -> Result<User> {
        if let Some(staged) = self.writes.get(id) {
            return Ok(staged.clone());
        }
        let guard = self.store.records.read();
        let record = guard.get(id).ok_or(Error::UserNotFound)?;
        self.reads.insert(id.to_string(), record.version);
        Ok(record.user.clone())
    }

    /// Stage a modified record for commit.
    pub fn stage(&mut self, user: User) {
        self.writes.insert(user.id.clone(), user);
    }
}

// ============================================================================
// POST STORE
// ============================================================================

/// Collection of post records.
#[derive(Default)]
pub struct PostStore {
    records: RwLock<HashMap<String, Post>>,
}

impl PostStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new post.
    pub fn insert(&self, post: Post) {
        self.records.write().insert(post.id.clone(), post);
    }

    /// Look up a post by id, failing with [`Error::PostNotFound`].
    pub fn find_by_id(&self, id: &str) -> Result<Post> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or(Error::PostNotFound)
    }

    /// Overwrite an existing post.
    pub fn save(&self, post: Post) -> Result<()> {
        let mut guard = self.records.write();
        let slot = guard.get_mut(&post.id).ok_or(Error::PostNotFound)?;
        *slot = post;
        Ok(())
    }

    /// Remove a post. Missing ids are a no-op.
    pub fn remove(&self, id: &str) {
        self.records.write().remove(id);
    }

    /// Number of stored posts.
    pub fn count(&self) -> usize {
        self.records.read().len()
    }
}

// ============================================================================
// COMMENT STORE
// ============================================================================

/// Collection of comment records.
#[derive(Default)]
pub struct CommentStore {
    records: RwLock<HashMap<String, Comment>>,
}

impl CommentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new comment.
    pub fn insert(&self, comment: Comment) {
        self.records.write().insert(comment.id.clone(), comment);
    }

    /// Look up a comment by id, failing with [`Error::CommentNotFound`].
    pub fn find_by_id(&self, id: &str) -> Result<Comment> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or(Error::CommentNotFound)
    }

    /// Look up a comment that must belong to the given post.
    pub fn find_in_post(&self, post_id: &str, comment_id: &str) -> Result<Comment> {
        let comment = self.find_by_id(comment_id)?;
        if comment.post_id != post_id {
            return Err(Error::CommentNotFound);
        }
        Ok(comment)
    }

    /// Overwrite an existing comment.
    pub fn save(&self, comment: Comment) -> Result<()> {
        let mut guard = self.records.write();
        let slot = guard.get_mut(&comment.id).ok_or(Error::CommentNotFound)?;
        *slot = comment;
        Ok(())
    }

    /// Remove a comment. Missing ids are a no-op.
    pub fn remove(&self, id: &str) {
        self.records.write().remove(id);
    }

    /// Remove every comment that belongs to a post.
    pub fn remove_all_for_post(&self, post_id: &str) {
        self.records.write().retain(|_, c| c.post_id != post_id);
    }

    /// Number of stored comments.
    pub fn count(&self) -> usize {
        self.records.read().len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Gender, NewUser, User};

    fn test_user(name: &str, email: &str) -> User {
        let (user, _) = User::register(NewUser {
            first_name: name.into(),
            last_name: "Tester".into(),
            birthday: "1990-01-01".into(),
            gender: Gender::Other,
            email: email.into(),
            password: "secret99".into(),
        })
        .unwrap();
        user
    }

    #[test]
    fn test_insert_and_find() {
        let store = UserStore::new();
        let user = test_user("Alice", "alice@example.com");
        let id = user.id.clone();
        store.insert(user).unwrap();

        assert_eq!(store.find_by_id(&id).unwrap().first_name, "Alice");
        assert!(store.find_by_email("ALICE@example.com").is_some());
        assert!(matches!(
            store.find_by_id("missing"),
            Err(Error::UserNotFound)
        ));
    }

    #[test]
    fn test_email_uniqueness() {
        let store = UserStore::new();
        store
            .insert(test_user("Alice", "alice@example.com"))
            .unwrap();
        let dup = test_user("Alicia", "Alice@Example.com");
        assert!(matches!(store.insert(dup), Err(Error::EmailTaken)));
    }

    #[test]
    fn test_search_by_name() {
        let store = UserStore::new();
        store
            .insert(test_user("Alice", "alice@example.com"))
            .unwrap();
        store.insert(test_user("Bob", "bob@example.com")).unwrap();

        assert_eq!(store.search_by_name("ali").len(), 1);
        assert_eq!(store.search_by_name("tester").len(), 2);
        assert!(store.search_by_name("  ").is_empty());
        assert!(store.search_by_name("zelda").is_empty());
    }

    #[test]
    fn test_transaction_commits_all_writes() {
        let store = UserStore::new();
        let alice = test_user("Alice", "alice@example.com");
        let bob = test_user("Bob", "bob@example.com");
        let (a, b) = (alice.id.clone(), bob.id.clone());
        store.insert(alice).unwrap();
        store.insert(bob).unwrap();

        store
            .with_transaction(|txn| {
                let mut alice = txn.fetch(&a)?;
                let mut bob = txn.fetch(&b)?;
                alice.current_city = Some("Austin".into());
                bob.current_city = Some("Boston".into());
                txn.stage(alice);
                txn.stage(bob);
                Ok(())
            })
            .unwrap();

        assert_eq!(
            store.find_by_id(&a).unwrap().current_city.as_deref(),
            Some("Austin")
        );
        assert_eq!(
            store.find_by_id(&b).unwrap().current_city.as_deref(),
            Some("Boston")
        );
    }

    #[test]
    fn test_transaction_closure_error_writes_nothing() {
        let store = UserStore::new();
        let alice = test_user("Alice", "alice@example.com");
        let a = alice.id.clone();
        store.insert(alice).unwrap();

        let result: Result<()> = store.with_transaction(|txn| {
            let mut alice = txn.fetch(&a)?;
            alice.current_city = Some("Nowhere".into());
            txn.stage(alice);
            Err(Error::NoSuchRequest)
        });

        assert!(matches!(result, Err(Error::NoSuchRequest)));
        assert_eq!(store.find_by_id(&a).unwrap().current_city, None);
    }

    #[test]
    fn test_transaction_write_conflict_detected() {
        let store = UserStore::new();
        let alice = test_user("Alice", "alice@example.com");
        let a = alice.id.clone();
        store.insert(alice).unwrap();

        let result: Result<()> = store.with_transaction(|txn| {
            let mut snapshot = txn.fetch(&a)?;
            snapshot.current_city = Some("Late".into());
            txn.stage(snapshot);

            // A concurrent writer lands between fetch and commit.
            let mut racing = store.find_by_id(&a)?;
            racing.current_city = Some("Early".into());
            store.save(racing)?;
            Ok(())
        });

        assert!(matches!(result, Err(Error::TransactionFailed)));
        assert_eq!(
            store.find_by_id(&a).unwrap().current_city.as_deref(),
            Some("Early")
        );
    }

    #[test]
    fn test_injected_commit_failure_leaves_no_trace() {
        let store = UserStore::new();
        let alice = test_user("Alice", "alice@example.com");
        let a = alice.id.clone();
        store.insert(alice).unwrap();

        store.fail_next_commit();
        let result: Result<()> = store.with_transaction(|txn| {
            let mut alice = txn.fetch(&a)?;
            alice.current_city = Some("Ghost Town".into());
            txn.stage(alice);
            Ok(())
        });

        assert!(matches!(result, Err(Error::TransactionFailed)));
        assert_eq!(store.find_by_id(&a).unwrap().current_city, None);

        // The failpoint is one-shot: the retry goes through.
        store
            .with_transaction(|txn| {
                let mut alice = txn.fetch(&a)?;
                alice.current_city = Some("Real Town".into());
                txn.stage(alice);
                Ok(())
            })
            .unwrap();
        assert_eq!(
            store.find_by_id(&a).unwrap().current_city.as_deref(),
            Some("Real Town")
        );
    }

    #[test]
    fn test_fetch_sees_own_staged_writes() {
        let store = UserStore::new();
        let alice = test_user("Alice", "alice@example.com");
        let a = alice.id.clone();
        store.insert(alice).unwrap();

        store
            .with_transaction(|txn| {
                let mut alice = txn.fetch(&a)?;
                alice.friends.push("bob".into());
                txn.stage(alice);

                let again = txn.fetch(&a)?;
                assert_eq!(again.friends, vec!["bob".to_string()]);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_post_store_crud() {
        let posts = PostStore::new();
        let post = Post::new("author".into(), "hello".into(), Vec::new());
        let id = post.id.clone();
        posts.insert(post);

        let mut loaded = posts.find_by_id(&id).unwrap();
        loaded.content = "edited".into();
        posts.save(loaded).unwrap();
        assert_eq!(posts.find_by_id(&id).unwrap().content, "edited");

        posts.remove(&id);
        assert!(matches!(posts.find_by_id(&id), Err(Error::PostNotFound)));
    }

    #[test]
    fn test_comment_store_post_scoping() {
        let comments = CommentStore::new();
        let c = Comment::new("author".into(), "post-1".into(), "hi".into());
        let id = c.id.clone();
        comments.insert(c);

        assert!(comments.find_in_post("post-1", &id).is_ok());
        assert!(matches!(
            comments.find_in_post("post-2", &id),
            Err(Error::CommentNotFound)
        ));

        comments.insert(Comment::new("author".into(), "post-1".into(), "two".into()));
        comments.remove_all_for_post("post-1");
        assert_eq!(comments.count(), 0);
    }
}
