//! Persistent store traits: scraped artifacts that outlive a single query.
//!
//! Two stores exist:
//! - a key-value store for search summaries and other text blobs
//! - a relational social store for users, tweets and retweets
//!
//! Both use insert-or-replace semantics on their natural keys. Nothing
//! expires on its own; records go away only through `delete`/`clear`.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    pub user_id: String,
    pub screen_name: String,
    pub created_at: DateTime<Utc>,
}

/// A stored original post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTweet {
    pub tweet_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
}

/// A stored retweet. `user_id` is the retweeting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRetweet {
    pub retweet_id: String,
    pub original_tweet_id: String,
    pub user_id: String,
    pub retweeted_at: DateTime<Utc>,
    pub text: String,
}

/// Which table a timeline entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TweetKind {
    Tweet,
    Retweet,
}

/// A merged timeline record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: String,
    pub user_id: String,
    pub kind: TweetKind,
    /// Creation time for tweets, retweet time for retweets
    pub at: DateTime<Utc>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_tweet_id: Option<String>,
}

impl From<StoredTweet> for TimelineEntry {
    fn from(t: StoredTweet) -> Self {
        Self {
            id: t.tweet_id,
            user_id: t.user_id,
            kind: TweetKind::Tweet,
            at: t.created_at,
            text: t.text,
            original_tweet_id: None,
        }
    }
}

impl From<StoredRetweet> for TimelineEntry {
    fn from(r: StoredRetweet) -> Self {
        Self {
            id: r.retweet_id,
            user_id: r.user_id,
            kind: TweetKind::Retweet,
            at: r.retweeted_at,
            text: r.text,
            original_tweet_id: Some(r.original_tweet_id),
        }
    }
}

/// Sort merged entries newest first. Ties keep tweets before retweets, then
/// order by id, so the result is deterministic.
pub fn sort_timeline(entries: &mut [TimelineEntry]) {
    entries.sort_by(|a, b| {
        b.at.cmp(&a.at)
            .then_with(|| kind_rank(a.kind).cmp(&kind_rank(b.kind)))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn kind_rank(kind: TweetKind) -> u8 {
    match kind {
        TweetKind::Tweet => 0,
        TweetKind::Retweet => 1,
    }
}

/// Text key-value persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Insert or replace.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Keys in ascending order, optionally restricted to a literal prefix.
    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}

/// Users, tweets and retweets.
#[async_trait]
pub trait SocialStore: Send + Sync {
    fn name(&self) -> &str;

    async fn upsert_user(&self, user: &StoredUser) -> Result<(), StoreError>;

    async fn upsert_tweet(&self, tweet: &StoredTweet) -> Result<(), StoreError>;

    async fn upsert_retweet(&self, retweet: &StoredRetweet) -> Result<(), StoreError>;

    /// Case-insensitive lookup by handle.
    async fn get_user_by_screen_name(
        &self,
        screen_name: &str,
    ) -> Result<Option<StoredUser>, StoreError>;

    /// Tweets and retweets of a user, newest first, tagged with their kind.
    async fn get_tweets_by_user(&self, user_id: &str) -> Result<Vec<TimelineEntry>, StoreError>;
}
