//! # Posts
//!
//! Posts, comments and likes, plus the feed fan-out that puts a new post
//! on the author's and every friend's home feed.
//!
//! Like counts are derived from the like lists, never maintained
//! independently, so the two can't drift apart. Ownership enforcement
//! (only the author edits or deletes) lives at the HTTP layer via the
//! authorization gate; this service assumes the caller already passed it.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identity::UserId;
use crate::store::{CommentStore, PostStore, UserStore};
use crate::time::now_timestamp;

/// A post on someone's wall.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: String,
    /// Author.
    pub user_id: UserId,
    pub content: String,
    pub media: Vec<String>,
    pub created_at: i64,
    /// Comment ids in creation order.
    pub comments: Vec<String>,
    pub comment_count: usize,
    /// Users who liked the post.
    pub likes: Vec<UserId>,
    pub like_count: usize,
}

impl Post {
    /// Create a new post record.
    pub fn new(user_id: UserId, content: String, media: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            content,
            media,
            created_at: now_timestamp(),
            comments: Vec::new(),
            comment_count: 0,
            likes: Vec::new(),
            like_count: 0,
        }
    }
}

/// A comment under a post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: String,
    /// Author.
    pub user_id: UserId,
    pub post_id: String,
    pub content: String,
    pub created_at: i64,
    pub likes: Vec<UserId>,
    pub like_count: usize,
}

impl Comment {
    /// Create a new comment record.
    pub fn new(user_id: UserId, post_id: String, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            post_id,
            content,
            created_at: now_timestamp(),
            likes: Vec::new(),
            like_count: 0,
        }
    }
}

/// A page reference in a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRef {
    pub page: usize,
    pub limit: usize,
}

/// Previous/next links for a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
}

impl Pagination {
    /// Build pagination links for a window into `total` items.
    /// Pages are 1-based.
    pub fn for_window(total: usize, page: usize, limit: usize) -> Self {
        let start = (page.saturating_sub(1)) * limit;
        let end = page * limit;
        Self {
            previous: (start > 0).then(|| PageRef {
                page: page - 1,
                limit,
            }),
            next: (end < total).then(|| PageRef {
                page: page + 1,
                limit,
            }),
        }
    }
}

fn page_window<T: Clone>(items: &[T], page: usize, limit: usize) -> (Vec<T>, Pagination) {
    let page = page.max(1);
    let limit = limit.max(1);
    let start = (page - 1) * limit;
    let window = items
        .iter()
        .skip(start)
        .take(limit)
        .cloned()
        .collect::<Vec<_>>();
    (window, Pagination::for_window(items.len(), page, limit))
}

/// Service for posts, comments and likes.
pub struct PostService {
    users: Arc<UserStore>,
    posts: Arc<PostStore>,
    comments: Arc<CommentStore>,
}

impl PostService {
    /// Create a service over the given stores.
    pub fn new(users: Arc<UserStore>, posts: Arc<PostStore>, comments: Arc<CommentStore>) -> Self {
        Self {
            users,
            posts,
            comments,
        }
    }

    // ── Posts ─────────────────────────────────────────────────────────────

    /// Create a post and fan it out to the author's and each friend's
    /// feed, newest first.
    ///
    /// The feed fan-out runs in one store transaction; if it cannot
    /// commit, the freshly inserted post record is removed again so the
    /// failure leaves no trace.
    pub fn create_post(
        &self,
        author_id: &str,
        content: &str,
        media: Vec<String>,
    ) -> Result<Post> {
        if content.trim().is_empty() {
            return Err(Error::EmptyContent);
        }
        let author = self.users.find_by_id(author_id)?;

        let post = Post::new(author.id.clone(), content.to_string(), media);
        self.posts.insert(post.clone());

        let post_id = post.id.clone();
        let fanout = self.users.with_transaction(|txn| {
            let mut author = txn.fetch(author_id)?;
            let friend_ids = author.friends.clone();
            author.feed.insert(0, post_id.clone());
            author.shared_posts.insert(0, post_id.clone());
            txn.stage(author);

            for friend_id in &friend_ids {
                let mut friend = txn.fetch(friend_id)?;
                friend.feed.insert(0, post_id.clone());
                txn.stage(friend);
            }
            Ok(())
        });

        if let Err(err) = fanout {
            // Compensating delete keeps the post store consistent with
            // the feeds.
            self.posts.remove(&post_id);
            return Err(err);
        }

        tracing::info!(author = author_id, post = post_id.as_str(), "Post created");
        Ok(post)
    }

    /// Delete a post, its comments, and every feed entry pointing at it.
    ///
    /// The sweep targets the users that actually hold the post on their
    /// feed, not the author's current friend list; the two can diverge
    /// after an unfriend.
    pub fn delete_post(&self, post_id: &str) -> Result<()> {
        let post = self.posts.find_by_id(post_id)?;
        let holder_ids = self.users.feed_holders(post_id);

        self.users.with_transaction(|txn| {
            let mut author = txn.fetch(&post.user_id)?;
            author.feed.retain(|id| id != post_id);
            author.shared_posts.retain(|id| id != post_id);
            txn.stage(author);

            for holder_id in &holder_ids {
                if *holder_id == post.user_id {
                    continue;
                }
                let mut holder = txn.fetch(holder_id)?;
                holder.feed.retain(|id| id != post_id);
                txn.stage(holder);
            }
            Ok(())
        })?;

        self.comments.remove_all_for_post(post_id);
        self.posts.remove(post_id);

        tracing::info!(post = post_id, "Post deleted");
        Ok(())
    }

    /// Replace a post's content.
    pub fn edit_post(&self, post_id: &str, new_content: &str) -> Result<Post> {
        if new_content.trim().is_empty() {
            return Err(Error::EmptyContent);
        }
        let mut post = self.posts.find_by_id(post_id)?;
        post.content = new_content.to_string();
        self.posts.save(post.clone())?;
        Ok(post)
    }

    /// Fetch a single post.
    pub fn get_post(&self, post_id: &str) -> Result<Post> {
        self.posts.find_by_id(post_id)
    }

    /// Like a post. Fails with [`Error::AlreadyLiked`] on a repeat.
    pub fn like_post(&self, post_id: &str, user_id: &str) -> Result<()> {
        let mut post = self.posts.find_by_id(post_id)?;
        if post.likes.iter().any(|id| id == user_id) {
            return Err(Error::AlreadyLiked);
        }
        post.likes.push(user_id.to_string());
        post.like_count = post.likes.len();
        self.posts.save(post)
    }

    /// Remove a like from a post.
    pub fn unlike_post(&self, post_id: &str, user_id: &str) -> Result<()> {
        let mut post = self.posts.find_by_id(post_id)?;
        let Some(index) = post.likes.iter().position(|id| id == user_id) else {
            return Err(Error::NotLiked);
        };
        post.likes.remove(index);
        post.like_count = post.likes.len();
        self.posts.save(post)
    }

    // ── Comments ──────────────────────────────────────────────────────────

    /// Add a comment under a post.
    pub fn add_comment(&self, post_id: &str, author_id: &str, content: &str) -> Result<Comment> {
        if content.trim().is_empty() {
            return Err(Error::EmptyContent);
        }
        let mut post = self.posts.find_by_id(post_id)?;
        let _ = self.users.find_by_id(author_id)?;

        let comment = Comment::new(author_id.to_string(), post.id.clone(), content.to_string());
        self.comments.insert(comment.clone());

        post.comments.push(comment.id.clone());
        post.comment_count = post.comments.len();
        self.posts.save(post)?;

        Ok(comment)
    }

    /// Fetch a comment, scoped to its post.
    pub fn get_comment(&self, post_id: &str, comment_id: &str) -> Result<Comment> {
        self.comments.find_in_post(post_id, comment_id)
    }

    /// Replace a comment's content.
    pub fn edit_comment(&self, post_id: &str, comment_id: &str, content: &str) -> Result<Comment> {
        if content.trim().is_empty() {
            return Err(Error::EmptyContent);
        }
        let mut comment = self.comments.find_in_post(post_id, comment_id)?;
        comment.content = content.to_string();
        self.comments.save(comment.clone())?;
        Ok(comment)
    }

    /// Delete a comment and unlink it from its post.
    pub fn delete_comment(&self, post_id: &str, comment_id: &str) -> Result<()> {
        let _ = self.comments.find_in_post(post_id, comment_id)?;

        let mut post = self.posts.find_by_id(post_id)?;
        post.comments.retain(|id| id != comment_id);
        post.comment_count = post.comments.len();
        self.posts.save(post)?;

        self.comments.remove(comment_id);
        Ok(())
    }

    /// Like a comment.
    pub fn like_comment(&self, post_id: &str, comment_id: &str, user_id: &str) -> Result<()> {
        let mut comment = self.comments.find_in_post(post_id, comment_id)?;
        if comment.likes.iter().any(|id| id == user_id) {
            return Err(Error::AlreadyLiked);
        }
        comment.likes.push(user_id.to_string());
        comment.like_count = comment.likes.len();
        self.comments.save(comment)
    }

    /// Remove a like from a comment.
    pub fn unlike_comment(&self, post_id: &str, comment_id: &str, user_id: &str) -> Result<()> {
        let mut comment = self.comments.find_in_post(post_id, comment_id)?;
        let Some(index) = comment.likes.iter().position(|id| id == user_id) else {
            return Err(Error::NotLiked);
        };
        comment.likes.remove(index);
        comment.like_count = comment.likes.len();
        self.comments.save(comment)
    }

    /// A page of a post's comments, in creation order.
    pub fn comments_page(
        &self,
        post_id: &str,
        page: usize,
        limit: Option<usize>,
    ) -> Result<(Vec<Comment>, Pagination)> {
        let post = self.posts.find_by_id(post_id)?;
        let all: Vec<Comment> = post
            .comments
            .iter()
            .filter_map(|id| self.comments.find_by_id(id).ok())
            .collect();
        let limit = limit.unwrap_or_else(|| all.len().max(1));
        Ok(page_window(&all, page, limit))
    }

    // ── Feeds ─────────────────────────────────────────────────────────────

    /// A page of the user's home feed, newest first.
    pub fn feed_page(
        &self,
        user_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Post>, Pagination)> {
        let user = self.users.find_by_id(user_id)?;
        let all: Vec<Post> = user
            .feed
            .iter()
            .filter_map(|id| self.posts.find_by_id(id).ok())
            .collect();
        Ok(page_window(&all, page, limit))
    }

    /// A page of the posts a user authored, newest first.
    pub fn shared_posts_page(
        &self,
        user_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Post>, Pagination)> {
        let user = self.users.find_by_id(user_id)?;
        let all: Vec<Post> = user
            .shared_posts
            .iter()
            .filter_map(|id| self.posts.find_by_id(id).ok())
            .collect();
        Ok(page_window(&all, page, limit))
    }
}

// ============================================================================
// TESTS
// ============================================================================
