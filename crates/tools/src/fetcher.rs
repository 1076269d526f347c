//! The HTTP content fetcher.
//!
//! Reddit post URLs go through [`RedditClient`]; every other URL is
//! downloaded and converted to plain text with `html2text`.

use crate::reddit::{self, RedditClient, RedditError};
use async_trait::async_trait;
use reqwest::Url;
use sleuth_config::{FetchConfig, RedditConfig};
use sleuth_core::artifact::{ContentFetcher, FetchFailure, RetrievedArtifact};
use std::time::Duration;
use tracing::{debug, warn};

/// Rendered line width for HTML conversion.
const TEXT_WIDTH: usize = 100;

pub struct HttpFetcher {
    client: reqwest::Client,
    reddit: RedditClient,
}

impl HttpFetcher {
    pub fn new(fetch: &FetchConfig, reddit: RedditConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(fetch.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(fetch.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            reddit: RedditClient::new(reddit, timeout)?,
        })
    }

    /// Replace the Reddit client (tests point it at a local server).
    pub fn with_reddit(mut self, reddit: RedditClient) -> Self {
        self.reddit = reddit;
        self
    }

    async fn fetch_reddit(&self, url: &Url) -> RetrievedArtifact {
        let source = url.as_str();
        let Some(post_id) = reddit::post_id_from_url(url) else {
            return RetrievedArtifact::failure(
                source,
                FetchFailure::Unsupported,
                "not a Reddit post",
            );
        };

        debug!(post_id, "Extracting Reddit post");
        match self.reddit.fetch_post(&post_id).await {
            Ok(post) => RetrievedArtifact::success(source, post.render(self.reddit.config())),
            Err(RedditError::Status(403)) => {
                RetrievedArtifact::failure(source, FetchFailure::Forbidden, "")
            }
            Err(RedditError::Status(404)) => {
                RetrievedArtifact::failure(source, FetchFailure::NotFound, "")
            }
            Err(RedditError::Network(detail)) => {
                RetrievedArtifact::failure(source, FetchFailure::Network, &detail)
            }
            Err(e) => RetrievedArtifact::failure(source, FetchFailure::Platform, &e.to_string()),
        }
    }

    async fn fetch_page(&self, url: &Url) -> RetrievedArtifact {
        let source = url.as_str();
        let response = match self.client.get(url.clone()).send().await {
            Ok(r) => r,
            Err(e) => return RetrievedArtifact::failure(source, FetchFailure::Network, &e.to_string()),
        };

        let status = response.status().as_u16();
        match status {
            403 => return RetrievedArtifact::failure(source, FetchFailure::Forbidden, ""),
            404 => return RetrievedArtifact::failure(source, FetchFailure::NotFound, ""),
            s if !(200..300).contains(&s) => {
                return RetrievedArtifact::failure(source, FetchFailure::Http(s), "");
            }
            _ => {}
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return RetrievedArtifact::failure(source, FetchFailure::Network, &e.to_string()),
        };

        let text = html2text::from_read(body.as_bytes(), TEXT_WIDTH);
        if text.trim().is_empty() {
            return RetrievedArtifact::failure(source, FetchFailure::Extraction, "");
        }
        RetrievedArtifact::success(source, text)
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> RetrievedArtifact {
        let parsed = match Url::parse(url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => u,
            Ok(_) | Err(_) => {
                return RetrievedArtifact::failure(url, FetchFailure::Unsupported, "not an http(s) URL");
            }
        };

        let artifact = match parsed.host_str() {
            Some(host) if reddit::is_reddit_host(host) => self.fetch_reddit(&parsed).await,
            _ => self.fetch_page(&parsed).await,
        };

        if artifact.is_usable() {
            debug!(url, chars = artifact.text.len(), "Fetched content");
        } else {
            warn!(url, outcome = ?artifact.outcome, "Fetch failed");
        }
        artifact
    }
}
