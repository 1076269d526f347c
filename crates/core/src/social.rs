//! Social-platform client trait.
//!
//! Timelines are paginated: each page carries an opaque continuation cursor
//! which is passed back to fetch the next page.

use crate::error::SocialError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialUser {
    pub id: String,
    pub screen_name: String,
    pub created_at: DateTime<Utc>,
}

/// A post on a user's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,

    /// Set when this post is a retweet: the id of the original post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweeted_id: Option<String>,
}

impl SocialPost {
    pub fn is_retweet(&self) -> bool {
        self.retweeted_id.is_some()
    }
}

/// One page of a timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePage {
    pub posts: Vec<SocialPost>,

    /// Cursor for the following page; `None` on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// A social-platform API client.
#[async_trait]
pub trait SocialClient: Send + Sync {
    fn name(&self) -> &str;

    /// Make sure an authenticated session exists, reusing a cached one when
    /// available.
    async fn ensure_session(&self) -> Result<(), SocialError>;

    /// Look up a user by handle (without `@`).
    async fn get_user(&self, handle: &str) -> Result<SocialUser, SocialError>;

    /// Fetch one page of a user's timeline. `cursor` is `None` for the first
    /// page and the previous page's `next` afterwards.
    async fn get_timeline(
        &self,
        user_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<TimelinePage, SocialError>;
}
