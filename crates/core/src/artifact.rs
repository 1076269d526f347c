//! Retrieved artifacts and the content-fetcher seam.
//!
//! A fetch never fails from the caller's point of view: every problem is
//! folded into a [`RetrievedArtifact`] whose outcome is `Failed` and whose
//! text starts with one of the [`FAILURE_MARKERS`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Prefixes that identify failure text.
pub const FAILURE_MARKERS: [&str; 3] = ["Error", "Access forbidden", "Page not found"];

/// Why a fetch did not produce usable content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailure {
    /// Connection, DNS, TLS or timeout problem
    Network,
    /// HTTP 403
    Forbidden,
    /// HTTP 404
    NotFound,
    /// Any other non-success HTTP status
    Http(u16),
    /// The page downloaded but yielded no text
    Extraction,
    /// A platform API (e.g. Reddit) returned an error
    Platform,
    /// The URL shape is not one the fetcher handles
    Unsupported,
}

/// Outcome of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Success,
    Failed(FetchFailure),
}

/// Raw text retrieved from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedArtifact {
    /// URL or query the text came from
    pub source: String,

    /// Extracted text, or a marker-prefixed failure description
    pub text: String,

    pub outcome: FetchOutcome,
}

impl RetrievedArtifact {
    pub fn success(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            outcome: FetchOutcome::Success,
        }
    }

    /// Build a failure artifact with the canonical message for its kind.
    pub fn failure(source: impl Into<String>, failure: FetchFailure, detail: &str) -> Self {
        let source = source.into();
        let text = match &failure {
            FetchFailure::Forbidden => format!(
                "Access forbidden (403) for URL: {source}. The website may be blocking automated access."
            ),
            FetchFailure::NotFound => format!(
                "Page not found (404) for URL: {source}. The content may have been moved or deleted."
            ),
            FetchFailure::Http(status) => {
                format!("Error: HTTP {status} occurred while accessing URL: {source}")
            }
            FetchFailure::Network => {
                format!("Error: network error occurred while accessing URL: {source}: {detail}")
            }
            FetchFailure::Extraction => {
                format!("Error: failed to extract content from URL: {source}")
            }
            FetchFailure::Platform => {
                format!("Error: Reddit API error for URL: {source}: {detail}")
            }
            FetchFailure::Unsupported => {
                format!("Error: unsupported URL: {source}: {detail}")
            }
        };
        Self {
            source,
            text,
            outcome: FetchOutcome::Failed(failure),
        }
    }

    /// Whether this artifact should be fed to summarization.
    ///
    /// Checks the tag, the marker prefix and emptiness, so a hand-built
    /// success whose text still looks like an error is filtered too.
    pub fn is_usable(&self) -> bool {
        self.outcome == FetchOutcome::Success
            && !self.text.trim().is_empty()
            && !has_failure_marker(&self.text)
    }
}

/// Whether a text begins with one of the failure markers.
pub fn has_failure_marker(text: &str) -> bool {
    FAILURE_MARKERS.iter().any(|m| text.starts_with(m))
}

/// Retrieves raw text for a URL.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> RetrievedArtifact;
}
