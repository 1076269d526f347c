//! End-to-end tests for the assembled Sleuth runtime.
//!
//! These drive the real tool-call loop, registry, condenser and SQLite
//! stores, with the network-facing backends (engine, search, fetcher)
//! replaced by scripted doubles.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use serde_json::json;
use sleuth::{Backends, ReplCommand, Runtime, Stores, parse_line};
use sleuth_agent::HeuristicCounter;
use sleuth_config::AppConfig;
use sleuth_core::artifact::{ContentFetcher, FetchFailure, RetrievedArtifact};
use sleuth_core::error::{Error, ProviderError, SearchError};
use sleuth_core::message::{Message, MessageToolCall, Role};
use sleuth_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use sleuth_core::search::{SearchHit, SearchProvider};
use sleuth_core::store::{StoredTweet, StoredUser};

// ── Doubles ──────────────────────────────────────────────────────────────

struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    fn with_results(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider exhausted")
    }
}

fn respond(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock".into(),
    }
}

fn text(content: &str) -> ProviderResponse {
    respond(Message::assistant(content))
}

fn action(id: &str, name: &str, args: serde_json::Value) -> ProviderResponse {
    let mut msg = Message::assistant("");
    msg.tool_calls.push(MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    });
    respond(msg)
}

#[derive(Default)]
struct PageFetcher {
    pages: HashMap<String, RetrievedArtifact>,
    fetched: Mutex<Vec<String>>,
}

impl PageFetcher {
    fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.into(), RetrievedArtifact::success(url, body));
        self
    }

    fn fetched(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ContentFetcher for PageFetcher {
    async fn fetch(&self, url: &str) -> RetrievedArtifact {
        self.fetched.lock().unwrap().push(url.into());
        self.pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| RetrievedArtifact::failure(url, FetchFailure::Forbidden, ""))
    }
}

struct FixedSearch(Vec<&'static str>);

#[async_trait::async_trait]
impl SearchProvider for FixedSearch {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn search(&self, _query: &str, count: u32) -> Result<Vec<SearchHit>, SearchError> {
        Ok(self
            .0
            .iter()
            .take(count as usize)
            .map(|link| SearchHit {
                title: link.to_string(),
                link: link.to_string(),
                snippet: String::new(),
            })
            .collect())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Env {
    _dir: tempfile::TempDir,
    config: AppConfig,
}

fn env() -> Env {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.store.path = Some(dir.path().join("sleuth.db").to_string_lossy().into_owned());
    config.social.session_file = Some(dir.path().join("session.json"));
    Env { _dir: dir, config }
}

async fn runtime(
    config: AppConfig,
    provider: Arc<ScriptedProvider>,
    fetcher: Arc<PageFetcher>,
    search: Result<Arc<dyn SearchProvider>, SearchError>,
) -> Runtime {
    let stores = Stores::open(&config).await.unwrap();
    let backends = Backends {
        provider,
        fetcher,
        search,
        counter: Arc::new(HeuristicCounter),
    };
    Runtime::assemble(config, backends, stores).unwrap()
}

fn tool_results(messages: &[Message]) -> Vec<&str> {
    messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.as_str())
        .collect()
}

const LINKS: [&str; 3] = ["https://a.test", "https://b.test", "https://c.test"];

fn three_pages() -> Arc<PageFetcher> {
    Arc::new(
        PageFetcher::default()
            .page(LINKS[0], "Rust 1.80 released")
            .page(LINKS[1], "LazyLock stabilized")
            .page(LINKS[2], "Exclusive ranges in patterns"),
    )
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_plain_answer_is_one_call() {
    let env = env();
    let provider = Arc::new(ScriptedProvider::new(vec![text("Hello there.")]));
    let rt = runtime(
        env.config.clone(),
        provider.clone(),
        Arc::new(PageFetcher::default()),
        Ok(Arc::new(FixedSearch(vec![]))),
    )
    .await;

    let outcome = rt.agent.run("hi").await.unwrap();
    assert_eq!(outcome.answer, "Hello there.");
    assert_eq!(outcome.engine_calls, 1);
    assert_eq!(provider.requests()[0].model, "gpt-4o-mini");
}

#[tokio::test]
async fn e2e_search_then_answer_persists_summary() {
    let env = env();
    let provider = Arc::new(ScriptedProvider::new(vec![
        action("call_1", "search_and_summarize", json!({"query": "rust 1.80", "num_results": 3})),
        text("release"),
        text("lazylock"),
        text("ranges"),
        text("Rust 1.80 stabilized LazyLock and exclusive ranges."),
    ]));
    let fetcher = three_pages();
    let rt = runtime(
        env.config.clone(),
        provider.clone(),
        fetcher.clone(),
        Ok(Arc::new(FixedSearch(LINKS.to_vec()))),
    )
    .await;

    let outcome = rt.agent.run("What is new in Rust 1.80?").await.unwrap();
    assert_eq!(outcome.answer, "Rust 1.80 stabilized LazyLock and exclusive ranges.");
    assert_eq!(outcome.engine_calls, 2);
    assert_eq!(fetcher.fetched(), 3);
    assert_eq!(
        tool_results(&outcome.conversation.messages),
        vec!["Previous web search queries: [\"rust 1.80\"]\nSummarized results: release\n\nlazylock\n\nranges"]
    );

    // the summary outlives the run
    drop(rt);
    let stores = Stores::open(&env.config).await.unwrap();
    assert_eq!(
        stores.kv.get("search:rust 1.80").await.unwrap().as_deref(),
        Some("release\n\nlazylock\n\nranges")
    );
    assert_eq!(
        stores.kv.list_keys(Some("search:")).await.unwrap(),
        vec!["search:rust 1.80".to_string()]
    );
}

#[tokio::test]
async fn e2e_repeated_query_short_circuits() {
    let env = env();
    let provider = Arc::new(ScriptedProvider::new(vec![
        action("call_1", "search_and_summarize", json!({"query": "rust"})),
        text("a"),
        text("b"),
        text("c"),
        action("call_2", "search_and_summarize", json!({"query": "rust"})),
        text("Final."),
    ]));
    let fetcher = three_pages();
    let rt = runtime(
        env.config.clone(),
        provider,
        fetcher.clone(),
        Ok(Arc::new(FixedSearch(LINKS.to_vec()))),
    )
    .await;

    let outcome = rt.agent.run("rust?").await.unwrap();
    assert_eq!(outcome.answer, "Final.");
    assert_eq!(fetcher.fetched(), 3);
    let results = tool_results(&outcome.conversation.messages);
    assert_eq!(
        results[1],
        "This query has already been searched. Please rephrase or ask a different question."
    );
}

#[tokio::test]
async fn e2e_failed_fetches_are_dropped() {
    let env = env();
    let provider = Arc::new(ScriptedProvider::new(vec![
        action("call_1", "search_and_summarize", json!({"query": "q"})),
        text("only a"),
        text("done"),
    ]));
    // only the first link has a page; the rest come back as 403s
    let fetcher = Arc::new(PageFetcher::default().page(LINKS[0], "page a"));
    let rt = runtime(
        env.config.clone(),
        provider.clone(),
        fetcher.clone(),
        Ok(Arc::new(FixedSearch(LINKS.to_vec()))),
    )
    .await;

    let outcome = rt.agent.run("q").await.unwrap();
    assert_eq!(fetcher.fetched(), 3);
    assert!(tool_results(&outcome.conversation.messages)[0].ends_with("Summarized results: only a"));
    // one extraction call, for the one usable page
    assert_eq!(provider.requests().len(), 3);
}

#[tokio::test]
async fn e2e_configured_iteration_bound() {
    let env = env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        format!(
            "model = \"test-model\"\n\n[agent]\nmax_iterations = 2\n\n[store]\npath = {:?}\n",
            env.config.store.db_path()
        ),
    )
    .unwrap();
    let mut config = AppConfig::load_from(&path).unwrap();
    config.social.session_file = env.config.social.session_file.clone();
    assert_eq!(config.agent.max_iterations, 2);

    let provider = Arc::new(ScriptedProvider::new(vec![
        action("call_1", "search_and_summarize", json!({"query": "one"})),
        action("call_2", "search_and_summarize", json!({"query": "two"})),
        text(""),
    ]));
    let rt = runtime(
        config,
        provider.clone(),
        Arc::new(PageFetcher::default()),
        Ok(Arc::new(FixedSearch(vec![]))),
    )
    .await;

    let outcome = rt.agent.run("q").await.unwrap();
    assert_eq!(outcome.engine_calls, 3);
    assert!(outcome.forced_final);
    assert_eq!(outcome.answer, "I couldn't find enough information to answer that.");

    let requests = provider.requests();
    assert!(requests.iter().all(|r| r.model == "test-model"));
    assert!(requests[2].tools.is_empty());
    assert_eq!(
        tool_results(&outcome.conversation.messages)[0],
        "Previous web search queries: [\"one\"]\nSummarized results: Unable to retrieve any valid content from the search results."
    );
}

#[tokio::test]
async fn e2e_missing_search_keys_are_reported_to_engine() {
    let env = env();
    let provider = Arc::new(ScriptedProvider::new(vec![
        action("call_1", "search_and_summarize", json!({"query": "q"})),
        text("I cannot search right now."),
    ]));
    let rt = runtime(
        env.config.clone(),
        provider,
        Arc::new(PageFetcher::default()),
        Err(SearchError::NotConfigured("SEARCH_API_KEY is not set".into())),
    )
    .await;

    let outcome = rt.agent.run("q").await.unwrap();
    assert_eq!(outcome.answer, "I cannot search right now.");
    let result = tool_results(&outcome.conversation.messages)[0];
    assert!(result.starts_with("Error: Action search_and_summarize failed"));
    assert!(result.contains("SEARCH_API_KEY"));
}

#[tokio::test]
async fn e2e_answers_from_stored_timeline() {
    let env = env();
    let stores = Stores::open(&env.config).await.unwrap();
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();
    stores
        .social
        .upsert_user(&StoredUser {
            user_id: "11".into(),
            screen_name: "ferris".into(),
            created_at: at,
        })
        .await
        .unwrap();
    stores
        .social
        .upsert_tweet(&StoredTweet {
            tweet_id: "1".into(),
            user_id: "11".into(),
            created_at: at,
            text: "Crabs love borrow checking".into(),
        })
        .await
        .unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        action(
            "call_1",
            "answer_from_stored_user",
            json!({"username": "@Ferris", "query": "What do they love?"}),
        ),
        text("loves borrow checking"),
        text("They love borrow checking."),
        text("Ferris loves borrow checking."),
    ]));
    let rt = runtime(
        env.config.clone(),
        provider.clone(),
        Arc::new(PageFetcher::default()),
        Ok(Arc::new(FixedSearch(vec![]))),
    )
    .await;

    let outcome = rt.agent.run("What does @ferris love?").await.unwrap();
    assert_eq!(outcome.answer, "Ferris loves borrow checking.");
    assert_eq!(
        tool_results(&outcome.conversation.messages),
        vec!["They love borrow checking."]
    );
    let requests = provider.requests();
    assert!(requests[1].messages[1].content.contains("Crabs love borrow checking"));
}

#[tokio::test]
async fn e2e_engine_failure_surfaces_as_provider_error() {
    let env = env();
    let provider = Arc::new(ScriptedProvider::with_results(vec![Err(
        ProviderError::AuthenticationFailed("bad key".into()),
    )]));
    let rt = runtime(
        env.config.clone(),
        provider,
        Arc::new(PageFetcher::default()),
        Ok(Arc::new(FixedSearch(vec![]))),
    )
    .await;

    let err = rt.agent.run("q").await.unwrap_err();
    assert!(matches!(err, Error::Provider(ProviderError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn e2e_store_put_replaces_value() {
    let env = env();
    let stores = Stores::open(&env.config).await.unwrap();
    stores.kv.put("search:rust", "old").await.unwrap();
    stores.kv.put("search:rust", "new").await.unwrap();

    assert_eq!(stores.kv.get("search:rust").await.unwrap().as_deref(), Some("new"));
    assert_eq!(stores.kv.list_keys(None).await.unwrap().len(), 1);
    assert!(stores.kv.delete("search:rust").await.unwrap());
    assert!(stores.kv.list_keys(None).await.unwrap().is_empty());
}

#[test]
fn repl_lines_map_to_commands() {
    assert_eq!(parse_line("exit"), ReplCommand::Exit);
    assert_eq!(parse_line("scrape @rustlang"), ReplCommand::Scrape("rustlang".into()));
    assert_eq!(
        parse_line("who won the match?"),
        ReplCommand::Ask("who won the match?".into())
    );
}
