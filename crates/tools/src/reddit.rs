//! Reddit post extraction.
//!
//! Posts are read through the OAuth API (`oauth.reddit.com`) when client
//! credentials are configured, otherwise through the public `.json`
//! endpoints. Either way the response is the same pair of listings: the
//! post itself, then its comment tree.

use chrono::DateTime;
use reqwest::Url;
use serde::Deserialize;
use sleuth_config::RedditConfig;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

const PUBLIC_BASE: &str = "https://www.reddit.com";
const OAUTH_BASE: &str = "https://oauth.reddit.com";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

#[derive(Debug, thiserror::Error)]
pub enum RedditError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unexpected response: {0}")]
    Malformed(String),
}

/// A Reddit post with its top-level comments.
#[derive(Debug, Clone, PartialEq)]
pub struct RedditPost {
    pub title: String,
    pub author: Option<String>,
    pub created_utc: f64,
    pub score: i64,
    pub is_self: bool,
    pub selftext: String,
    pub url: String,
    pub comments: Vec<RedditComment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedditComment {
    pub author: Option<String>,
    pub body: String,
}

impl RedditPost {
    /// Render the post as plain text for summarization.
    pub fn render(&self, config: &RedditConfig) -> String {
        let posted_on = DateTime::from_timestamp(self.created_utc as i64, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        let mut text = format!("Title: {}\n\n", self.title);
        text.push_str(&format!("Author: u/{}\n", display_author(&self.author)));
        text.push_str(&format!("Posted on: {posted_on}\n"));
        text.push_str(&format!("Score: {}\n\n", self.score));

        if self.is_self {
            if !self.selftext.is_empty() {
                text.push_str(&format!(
                    "Content: {}\n\n",
                    cap(&self.selftext, config.selftext_chars)
                ));
            }
        } else {
            text.push_str(&format!("Link: {}\n\n", self.url));
        }

        text.push_str("Top Comments:\n");
        for comment in self.comments.iter().take(config.max_comments) {
            text.push_str(&format!(
                "- u/{}: {}\n",
                display_author(&comment.author),
                cap(&comment.body, config.comment_chars)
            ));
        }
        text
    }
}

fn display_author(author: &Option<String>) -> &str {
    author.as_deref().unwrap_or("[deleted]")
}

/// Keep the first `limit` characters, marking the cut with `...`.
fn cap(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let kept: String = text.chars().take(limit).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

/// Whether `host` belongs to Reddit.
pub fn is_reddit_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "reddit.com" || host.ends_with(".reddit.com")
}

/// The post id of a `/comments/<id>` URL.
pub fn post_id_from_url(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    segments.find(|s| *s == "comments")?;
    segments
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Reads Reddit posts.
pub struct RedditClient {
    client: reqwest::Client,
    config: RedditConfig,
    public_base: String,
    oauth_base: String,
    token_url: String,
    token: Mutex<Option<String>>,
}

impl RedditClient {
    pub fn new(config: RedditConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            config,
            public_base: PUBLIC_BASE.into(),
            oauth_base: OAUTH_BASE.into(),
            token_url: TOKEN_URL.into(),
            token: Mutex::new(None),
        })
    }

    /// Point the client at different hosts.
    pub fn with_endpoints(
        mut self,
        public_base: impl Into<String>,
        oauth_base: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.public_base = public_base.into();
        self.oauth_base = oauth_base.into();
        self.token_url = token_url.into();
        self
    }

    pub fn config(&self) -> &RedditConfig {
        &self.config
    }

    fn has_credentials(&self) -> bool {
        self.config.client_id.is_some() && self.config.client_secret.is_some()
    }

    async fn access_token(&self) -> Result<String, RedditError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let (Some(id), Some(secret)) = (&self.config.client_id, &self.config.client_secret)
        else {
            return Err(RedditError::Auth("client credentials not configured".into()));
        };

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| RedditError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RedditError::Auth(format!(
                "token request returned {}",
                response.status().as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| RedditError::Malformed(e.to_string()))?;
        debug!("Obtained Reddit access token");
        *cached = Some(body.access_token.clone());
        Ok(body.access_token)
    }

    /// Fetch a post and its top-level comments.
    pub async fn fetch_post(&self, post_id: &str) -> Result<RedditPost, RedditError> {
        let limit = self.config.max_comments.to_string();
        let query = [("limit", limit.as_str()), ("depth", "1"), ("raw_json", "1")];

        let request = if self.has_credentials() {
            let token = self.access_token().await?;
            self.client
                .get(format!("{}/comments/{post_id}", self.oauth_base))
                .bearer_auth(token)
        } else {
            self.client
                .get(format!("{}/comments/{post_id}.json", self.public_base))
        };

        let response = request
            .query(&query)
            .send()
            .await
            .map_err(|e| RedditError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 401 {
            *self.token.lock().await = None;
        }
        if status != 200 {
            return Err(RedditError::Status(status));
        }

        let listings: Vec<Listing> = response
            .json()
            .await
            .map_err(|e| RedditError::Malformed(e.to_string()))?;
        parse_listings(listings)
    }
}

fn parse_listings(listings: Vec<Listing>) -> Result<RedditPost, RedditError> {
    let mut listings = listings.into_iter();
    let post = listings
        .next()
        .and_then(|l| l.data.children.into_iter().find(|t| t.kind == "t3"))
        .ok_or_else(|| RedditError::Malformed("no post in response".into()))?;
    let post: PostData =
        serde_json::from_value(post.data).map_err(|e| RedditError::Malformed(e.to_string()))?;

    let comments = listings
        .next()
        .map(|l| l.data.children)
        .unwrap_or_default()
        .into_iter()
        .filter(|t| t.kind == "t1")
        .filter_map(|t| serde_json::from_value::<CommentData>(t.data).ok())
        .map(|c| RedditComment {
            author: real_author(c.author),
            body: c.body,
        })
        .collect();

    Ok(RedditPost {
        title: post.title,
        author: real_author(post.author),
        created_utc: post.created_utc,
        score: post.score,
        is_self: post.is_self,
        selftext: post.selftext,
        url: post.url,
        comments,
    })
}

fn real_author(author: Option<String>) -> Option<String> {
    author.filter(|a| a != "[deleted]")
}

// --- Reddit API types (internal) ---

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PostData {
    title: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct CommentData {
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    body: String,
}
