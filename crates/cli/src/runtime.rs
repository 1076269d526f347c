//! Wiring: turns an [`AppConfig`] into a ready tool-call loop and the stores
//! and scraper the commands use directly.

use sleuth_agent::{ActionRegistry, Condenser, Engine, TiktokenCounter, TokenCounter, ToolCallLoop};
use sleuth_config::AppConfig;
use sleuth_core::artifact::ContentFetcher;
use sleuth_core::error::{Error, Result, SearchError};
use sleuth_core::event::EventBus;
use sleuth_core::provider::Provider;
use sleuth_core::search::SearchProvider;
use sleuth_core::store::{KeyValueStore, SocialStore};
use sleuth_memory::{SqliteKeyValueStore, SqliteSocialStore};
use sleuth_tools::{GoogleSearch, HttpFetcher, ScrapeSettings, TimelineScraper, XApiClient};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The two persistent stores, both in the configured SQLite file.
#[derive(Clone)]
pub struct Stores {
    pub kv: Arc<dyn KeyValueStore>,
    pub social: Arc<dyn SocialStore>,
}

impl Stores {
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let path = config.store.db_path();
        if let Some(parent) = Path::new(&path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Internal(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let kv = SqliteKeyValueStore::open(&path, &config.store.kv_table).await?;
        let social = SqliteSocialStore::open(&path).await?;
        Ok(Self {
            kv: Arc::new(kv),
            social: Arc::new(social),
        })
    }
}

/// A scraper reading through the X API into `store`.
pub fn build_scraper(
    config: &AppConfig,
    store: Arc<dyn SocialStore>,
    events: Arc<EventBus>,
) -> Result<Arc<TimelineScraper>> {
    let client = XApiClient::from_config(&config.social)?;
    let scraper = TimelineScraper::new(
        Arc::new(client),
        store,
        ScrapeSettings::from(&config.social),
    )
    .with_events(events);
    Ok(Arc::new(scraper))
}

/// Backends the loop talks to. [`Runtime::from_config`] fills these with the
/// real HTTP clients.
pub struct Backends {
    pub provider: Arc<dyn Provider>,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub search: std::result::Result<Arc<dyn SearchProvider>, SearchError>,
    pub counter: Arc<dyn TokenCounter>,
}

impl Backends {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = sleuth_providers::build_from_config(config)?;
        let fetcher = HttpFetcher::new(&config.fetch, config.reddit.clone())
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {e}")))?;
        let search = GoogleSearch::from_config(&config.search)
            .map(|s| Arc::new(s) as Arc<dyn SearchProvider>);
        if let Err(e) = &search {
            info!("Web search disabled: {e}");
        }
        Ok(Self {
            provider,
            fetcher: Arc::new(fetcher),
            search,
            counter: Arc::new(TiktokenCounter::new()?),
        })
    }
}

pub struct Runtime {
    pub config: AppConfig,
    pub events: Arc<EventBus>,
    pub stores: Stores,
    pub scraper: Arc<TimelineScraper>,
    pub agent: ToolCallLoop,
}

impl Runtime {
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let backends = Backends::from_config(&config)?;
        let stores = Stores::open(&config).await?;
        Self::assemble(config, backends, stores)
    }

    /// Build the loop over explicit backends and stores.
    pub fn assemble(config: AppConfig, backends: Backends, stores: Stores) -> Result<Self> {
        let events = Arc::new(EventBus::default());
        let scraper = build_scraper(&config, stores.social.clone(), events.clone())?;

        let engine = Engine::new(backends.provider, &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens);
        let condenser = Condenser::new(engine.clone(), backends.counter, config.condenser.clone());

        let registry = ActionRegistry::new(engine.clone(), backends.fetcher, Arc::new(condenser))
            .with_search_defaults(
                config.search.default_num_results,
                config.search.max_num_results,
            )
            .with_kv_store(stores.kv.clone())
            .with_social(stores.social.clone(), scraper.clone());
        let registry = match backends.search {
            Ok(search) => registry.with_search(search),
            Err(reason) => registry.with_search_unavailable(reason),
        };

        let agent = ToolCallLoop::new(engine, Arc::new(registry))
            .with_settings(&config.agent)
            .with_events(events.clone());
        debug!(model = %config.model, max_iterations = config.agent.max_iterations, "Runtime assembled");

        Ok(Self {
            config,
            events,
            stores,
            scraper,
            agent,
        })
    }
}
