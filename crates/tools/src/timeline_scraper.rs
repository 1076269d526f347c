//! Paginated timeline scraping into the social store.
//!
//! Requests are strictly sequential. A request budget caps how many timeline
//! pages are requested per reset window; once spent, the scraper sleeps out
//! the rest of the window. A `RateLimited` answer from the platform sleeps the
//! advertised reset time and retries the same page.

use sleuth_config::SocialConfig;
use sleuth_core::action::normalize_handle;
use sleuth_core::error::{Result, SocialError};
use sleuth_core::event::{DomainEvent, EventBus};
use sleuth_core::social::{SocialClient, SocialUser, TimelinePage};
use sleuth_core::store::{SocialStore, StoredRetweet, StoredTweet, StoredUser};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Pagination and rate-limit settings.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub page_size: u32,
    pub request_budget: u32,
    pub reset_window: Duration,
    pub page_delay: Duration,
    pub max_rate_limit_retries: u32,
    pub max_pages: Option<u32>,
}

impl From<&SocialConfig> for ScrapeSettings {
    fn from(c: &SocialConfig) -> Self {
        Self {
            page_size: c.page_size,
            request_budget: c.request_budget,
            reset_window: Duration::from_secs(c.reset_window_secs),
            page_delay: Duration::from_millis(c.page_delay_ms),
            max_rate_limit_retries: c.max_rate_limit_retries,
            max_pages: c.max_pages,
        }
    }
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self::from(&SocialConfig::default())
    }
}

/// What a scrape stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeReport {
    pub user: SocialUser,
    pub tweets: usize,
    pub retweets: usize,
    pub pages: u32,
}

impl ScrapeReport {
    pub fn summary(&self) -> String {
        format!(
            "Scraped @{}: stored {} tweets and {} retweets from {} page(s).",
            self.user.screen_name, self.tweets, self.retweets, self.pages
        )
    }
}

/// Requests allowed per window.
struct RequestBudget {
    limit: u32,
    window: Duration,
    used: u32,
    window_start: Instant,
}

impl RequestBudget {
    fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            used: 0,
            window_start: Instant::now(),
        }
    }

    /// Take one request, sleeping out the window first when it is spent.
    async fn acquire(&mut self) {
        if self.used >= self.limit {
            let elapsed = self.window_start.elapsed();
            if elapsed < self.window {
                let wait = self.window - elapsed;
                info!(wait_secs = wait.as_secs_f64(), "Request budget spent, waiting for window reset");
                tokio::time::sleep(wait).await;
            }
            self.reset();
        }
        self.used += 1;
    }

    fn reset(&mut self) {
        self.used = 0;
        self.window_start = Instant::now();
    }
}

pub struct TimelineScraper {
    client: Arc<dyn SocialClient>,
    store: Arc<dyn SocialStore>,
    settings: ScrapeSettings,
    events: Option<Arc<EventBus>>,
}

impl TimelineScraper {
    pub fn new(
        client: Arc<dyn SocialClient>,
        store: Arc<dyn SocialStore>,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            client,
            store,
            settings,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Scrape every available page of `handle`'s timeline into the store.
    pub async fn scrape(&self, handle: &str) -> Result<ScrapeReport> {
        let handle = normalize_handle(handle);
        self.client.ensure_session().await?;

        let user = self.client.get_user(handle).await?;
        info!(handle, user_id = %user.id, "Scraping timeline");
        self.store
            .upsert_user(&StoredUser {
                user_id: user.id.clone(),
                screen_name: user.screen_name.clone(),
                created_at: user.created_at,
            })
            .await?;

        let mut budget = RequestBudget::new(self.settings.request_budget, self.settings.reset_window);
        let mut report = ScrapeReport {
            user,
            tweets: 0,
            retweets: 0,
            pages: 0,
        };
        let user_id = report.user.id.clone();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .next_page(&user_id, cursor.as_deref(), &mut budget)
                .await?;
            report.pages += 1;
            self.store_page(&user_id, &page, &mut report).await?;

            if let Some(events) = &self.events {
                events.publish(DomainEvent::TimelinePageStored {
                    screen_name: report.user.screen_name.clone(),
                    page: report.pages,
                    posts: page.posts.len(),
                    timestamp: chrono::Utc::now(),
                });
            }
            debug!(page = report.pages, posts = page.posts.len(), "Stored timeline page");

            let reached_limit = self
                .settings
                .max_pages
                .is_some_and(|max| report.pages >= max);
            match page.next {
                Some(next) if !page.posts.is_empty() && !reached_limit => cursor = Some(next),
                _ => break,
            }

            tokio::time::sleep(self.settings.page_delay).await;
        }

        info!(
            handle,
            tweets = report.tweets,
            retweets = report.retweets,
            pages = report.pages,
            "Finished scraping timeline"
        );
        Ok(report)
    }

    async fn next_page(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        budget: &mut RequestBudget,
    ) -> Result<TimelinePage> {
        let mut retries = 0;
        loop {
            budget.acquire().await;
            match self
                .client
                .get_timeline(user_id, self.settings.page_size, cursor)
                .await
            {
                Err(SocialError::RateLimited { reset_after_secs })
                    if retries < self.settings.max_rate_limit_retries =>
                {
                    retries += 1;
                    warn!(reset_after_secs, retries, "Rate limited, waiting before retry");
                    tokio::time::sleep(Duration::from_secs(reset_after_secs)).await;
                    budget.reset();
                }
                other => return Ok(other?),
            }
        }
    }

    async fn store_page(
        &self,
        user_id: &str,
        page: &TimelinePage,
        report: &mut ScrapeReport,
    ) -> Result<()> {
        for post in &page.posts {
            match &post.retweeted_id {
                Some(original) => {
                    self.store
                        .upsert_retweet(&StoredRetweet {
                            retweet_id: post.id.clone(),
                            original_tweet_id: original.clone(),
                            user_id: user_id.to_string(),
                            retweeted_at: post.created_at,
                            text: post.text.clone(),
                        })
                        .await?;
                    report.retweets += 1;
                }
                None => {
                    self.store
                        .upsert_tweet(&StoredTweet {
                            tweet_id: post.id.clone(),
                            user_id: user_id.to_string(),
                            created_at: post.created_at,
                            text: post.text.clone(),
                        })
                        .await?;
                    report.tweets += 1;
                }
            }
        }
        Ok(())
    }
}
