//! Search provider trait.

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One search result. `link` is the address used for follow-up fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Return at most `count` results for `query`, in ranking order.
    async fn search(&self, query: &str, count: u32) -> Result<Vec<SearchHit>, SearchError>;
}
