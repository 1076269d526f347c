//! The action registry: descriptors the engine sees, parsing of its
//! invocations, and dispatch of typed actions to their backends.

use crate::condenser::Condenser;
use crate::engine::Engine;
use crate::prompts::{self, NO_VALID_CONTENT};
use sleuth_core::action::{
    self, Action, ActionDescriptor, ActionInvocation, ActionName, ScrapeUserArgs, SearchArgs,
    StoredUserQueryArgs,
};
use sleuth_core::artifact::ContentFetcher;
use sleuth_core::error::{ActionError, SearchError};
use sleuth_core::message::Message;
use sleuth_core::provider::ToolDefinition;
use sleuth_core::search::SearchProvider;
use sleuth_core::store::{KeyValueStore, SocialStore, TimelineEntry, TweetKind};
use sleuth_tools::TimelineScraper;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key prefix under which search summaries are persisted.
pub const SEARCH_KEY_PREFIX: &str = "search:";

pub struct ActionRegistry {
    engine: Engine,
    fetcher: Arc<dyn ContentFetcher>,
    condenser: Arc<Condenser>,
    search: Result<Arc<dyn SearchProvider>, SearchError>,
    kv_store: Option<Arc<dyn KeyValueStore>>,
    social_store: Option<Arc<dyn SocialStore>>,
    scraper: Option<Arc<TimelineScraper>>,
    default_num_results: u32,
    max_num_results: u32,
}

impl ActionRegistry {
    pub fn new(
        engine: Engine,
        fetcher: Arc<dyn ContentFetcher>,
        condenser: Arc<Condenser>,
    ) -> Self {
        Self {
            engine,
            fetcher,
            condenser,
            search: Err(SearchError::NotConfigured(
                "no search provider is attached".into(),
            )),
            kv_store: None,
            social_store: None,
            scraper: None,
            default_num_results: 5,
            max_num_results: 10,
        }
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Ok(search);
        self
    }

    /// Keep searching disabled, reporting `reason` whenever it is attempted.
    pub fn with_search_unavailable(mut self, reason: SearchError) -> Self {
        self.search = Err(reason);
        self
    }

    /// Result count used when an invocation omits one, and the upper clamp.
    pub fn with_search_defaults(mut self, default_num_results: u32, max_num_results: u32) -> Self {
        self.max_num_results = max_num_results.max(1);
        self.default_num_results = default_num_results.clamp(1, self.max_num_results);
        self
    }

    /// Where search summaries are saved.
    pub fn with_kv_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.kv_store = Some(store);
        self
    }

    pub fn with_social(mut self, store: Arc<dyn SocialStore>, scraper: Arc<TimelineScraper>) -> Self {
        self.social_store = Some(store);
        self.scraper = Some(scraper);
        self
    }

    pub fn list_descriptors(&self) -> Vec<ActionDescriptor> {
        action::descriptors().to_vec()
    }

    /// Tool definitions attached to every tool-enabled request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        action::descriptors()
            .iter()
            .map(ActionDescriptor::to_definition)
            .collect()
    }

    pub fn parse(&self, invocation: &ActionInvocation) -> Result<Action, ActionError> {
        Action::from_invocation(invocation)
    }

    /// Run an action and return the text the engine sees as its result.
    pub async fn dispatch(&self, action: &Action) -> Result<String, ActionError> {
        match action {
            Action::SearchAndSummarize(args) => self.search_and_summarize(args).await,
            Action::ScrapeSocialUser(args) => self.scrape_social_user(args).await,
            Action::AnswerFromStoredUser(args) => self.answer_from_stored_user(args).await,
        }
    }

    async fn search_and_summarize(&self, args: &SearchArgs) -> Result<String, ActionError> {
        let name = ActionName::SearchAndSummarize;
        let search = self.search.as_ref().map_err(|e| failed(name, e))?;

        let count = args
            .num_results
            .unwrap_or(self.default_num_results)
            .clamp(1, self.max_num_results);
        let hits = search
            .search(&args.query, count)
            .await
            .map_err(|e| failed(name, e))?;
        info!(query = %args.query, hits = hits.len(), "Search complete");

        let mut texts = Vec::with_capacity(hits.len());
        for hit in &hits {
            let artifact = self.fetcher.fetch(&hit.link).await;
            if artifact.is_usable() {
                texts.push(artifact.text);
            } else {
                debug!(url = %hit.link, outcome = ?artifact.outcome, "Dropping unusable artifact");
            }
        }
        if texts.is_empty() {
            warn!(query = %args.query, "No search result could be retrieved");
            return Ok(NO_VALID_CONTENT.to_string());
        }

        let summary = self
            .condenser
            .condense(&texts)
            .await
            .map_err(|e| failed(name, e))?;

        if let Some(store) = &self.kv_store {
            let key = format!("{SEARCH_KEY_PREFIX}{}", args.query);
            if let Err(e) = store.put(&key, &summary).await {
                warn!(key = %key, error = %e, "Failed to persist search summary");
            }
        }
        Ok(summary)
    }

    async fn scrape_social_user(&self, args: &ScrapeUserArgs) -> Result<String, ActionError> {
        let name = ActionName::ScrapeSocialUser;
        let scraper = self
            .scraper
            .as_ref()
            .ok_or_else(|| failed(name, "no social platform is configured"))?;
        let report = scraper
            .scrape(&args.username)
            .await
            .map_err(|e| failed(name, e))?;
        Ok(report.summary())
    }

    async fn answer_from_stored_user(
        &self,
        args: &StoredUserQueryArgs,
    ) -> Result<String, ActionError> {
        let name = ActionName::AnswerFromStoredUser;
        let store = self
            .social_store
            .as_ref()
            .ok_or_else(|| failed(name, "no social store is configured"))?;
        let handle = action::normalize_handle(&args.username);

        let Some(user) = store
            .get_user_by_screen_name(handle)
            .await
            .map_err(|e| failed(name, e))?
        else {
            return Ok(format!(
                "No stored posts for @{handle}. Call {} with this username first, then ask again.",
                ActionName::ScrapeSocialUser
            ));
        };

        let entries = store
            .get_tweets_by_user(&user.user_id)
            .await
            .map_err(|e| failed(name, e))?;
        if entries.is_empty() {
            return Ok(format!("@{} has no stored posts.", user.screen_name));
        }

        let chunks = self.chunk_entries(&entries);
        debug!(handle, posts = entries.len(), chunks = chunks.len(), "Condensing stored posts");
        let details = self
            .condenser
            .condense(&chunks)
            .await
            .map_err(|e| failed(name, e))?;

        self.engine
            .complete_text(vec![
                Message::system(prompts::stored_user_prompt(&user.screen_name)),
                Message::user(prompts::stored_user_question(&details, &args.query)),
            ])
            .await
            .map_err(|e| failed(name, e))
    }

    /// Group formatted posts into chunks of at most the per-text token limit.
    /// A single oversized post still forms its own chunk.
    fn chunk_entries(&self, entries: &[TimelineEntry]) -> Vec<String> {
        let counter = self.condenser.counter();
        let limit = self.condenser.settings().per_text_token_limit;

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0;
        for entry in entries {
            let line = format_entry(entry);
            let tokens = counter.count(&line);
            if !current.is_empty() && current_tokens + tokens > limit {
                chunks.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(&line);
            current_tokens += tokens;
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

fn format_entry(entry: &TimelineEntry) -> String {
    let kind = match entry.kind {
        TweetKind::Tweet => "Tweet",
        TweetKind::Retweet => "Retweet",
    };
    format!(
        "[{}] {kind}: {}",
        entry.at.format("%Y-%m-%d %H:%M:%S"),
        entry.text
    )
}

fn failed(action: ActionName, reason: impl std::fmt::Display) -> ActionError {
    ActionError::ExecutionFailed {
        action: action.as_str().to_string(),
        reason: reason.to_string(),
    }
}
