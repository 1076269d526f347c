//! Information-gathering backends for Sleuth.
//!
//! - [`HttpFetcher`]: page text via `html2text`, Reddit posts via the Reddit API
//! - [`GoogleSearch`]: Google Custom Search JSON API
//! - [`XApiClient`]: X API v2 social client with a cached app session
//! - [`TimelineScraper`]: paginated, rate-limit-aware timeline persistence

pub mod fetcher;
pub mod reddit;
pub mod social;
pub mod timeline_scraper;
pub mod web_search;

#[cfg(test)]
pub(crate) mod test_server;

pub use fetcher::HttpFetcher;
pub use reddit::RedditClient;
pub use social::XApiClient;
pub use timeline_scraper::{ScrapeReport, ScrapeSettings, TimelineScraper};
pub use web_search::GoogleSearch;
