//! Google Custom Search JSON API.

use async_trait::async_trait;
use serde::Deserialize;
use sleuth_config::SearchConfig;
use sleuth_core::error::SearchError;
use sleuth_core::search::{SearchHit, SearchProvider};
use std::time::Duration;
use tracing::{debug, warn};

/// The API returns at most ten results per request.
const MAX_PER_REQUEST: u32 = 10;

pub struct GoogleSearch {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    engine_id: String,
}

impl GoogleSearch {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SearchError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
        })
    }

    /// Build from config; both the API key and the engine id are required.
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            SearchError::NotConfigured("SEARCH_API_KEY is not set".into())
        })?;
        let engine_id = config.engine_id.clone().ok_or_else(|| {
            SearchError::NotConfigured("GOOGLE_SEARCH_CX is not set".into())
        })?;
        Self::new(&config.base_url, api_key, engine_id)
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(&self, query: &str, count: u32) -> Result<Vec<SearchHit>, SearchError> {
        let num = count.clamp(1, MAX_PER_REQUEST).to_string();
        debug!(query, num = %num, "Web search");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, "Search API returned error");
            return Err(SearchError::ApiError {
                status_code: status,
                message: body,
            });
        }

        let body: SearchResponse = response.json().await.map_err(|e| SearchError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        let hits: Vec<SearchHit> = body
            .items
            .into_iter()
            .take(count as usize)
            .map(|item| SearchHit {
                title: item.title,
                link: item.link,
                snippet: item.snippet,
            })
            .collect();

        debug!(
            links = ?hits.iter().map(|h| h.link.as_str()).collect::<Vec<_>>(),
            "Web search results"
        );
        Ok(hits)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    /// Absent when the query has no results
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{Canned, serve};

    #[test]
    fn missing_keys_not_configured() {
        let config = SearchConfig::default();
        assert!(matches!(
            GoogleSearch::from_config(&config),
            Err(SearchError::NotConfigured(_))
        ));

        let config = SearchConfig {
            api_key: Some("k".into()),
            ..SearchConfig::default()
        };
        assert!(matches!(
            GoogleSearch::from_config(&config),
            Err(SearchError::NotConfigured(msg)) if msg.contains("GOOGLE_SEARCH_CX")
        ));
    }

    #[tokio::test]
    async fn sends_query_params_and_parses_items() {
        let server = serve(vec![Canned::new(
            200,
            r#"{"items":[
                {"title":"A","link":"https://a.example","snippet":"first"},
                {"title":"B","link":"https://b.example"}
            ]}"#,
        )])
        .await;
        let search = GoogleSearch::new(&server.url, "key1", "cx1").unwrap();

        let hits = search.search("rust async", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].link, "https://a.example");
        assert_eq!(hits[1].snippet, "");

        let line = &server.requests()[0].request_line;
        assert!(line.contains("key=key1"));
        assert!(line.contains("cx=cx1"));
        assert!(line.contains("q=rust+async"));
        assert!(line.contains("num=5"));
    }

    #[tokio::test]
    async fn no_items_means_no_hits() {
        let server = serve(vec![Canned::new(200, r#"{"kind":"customsearch#search"}"#)]).await;
        let search = GoogleSearch::new(&server.url, "k", "cx").unwrap();
        assert!(search.search("nothing", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn count_clamped_to_api_maximum() {
        let server = serve(vec![Canned::new(200, "{}")]).await;
        let search = GoogleSearch::new(&server.url, "k", "cx").unwrap();
        search.search("q", 50).await.unwrap();
        assert!(server.requests()[0].request_line.contains("num=10"));
    }

    #[tokio::test]
    async fn error_status_is_api_error() {
        let server = serve(vec![Canned::new(403, "quota exceeded")]).await;
        let search = GoogleSearch::new(&server.url, "k", "cx").unwrap();
        match search.search("q", 5).await {
            Err(SearchError::ApiError {
                status_code,
                message,
            }) => {
                assert_eq!(status_code, 403);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }
}
