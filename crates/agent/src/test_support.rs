//! Scripted collaborators shared by the agent tests.

use async_trait::async_trait;
use sleuth_core::artifact::{ContentFetcher, FetchFailure, RetrievedArtifact};
use sleuth_core::error::{ProviderError, SearchError};
use sleuth_core::message::{Message, MessageToolCall};
use sleuth_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use sleuth_core::search::{SearchHit, SearchProvider};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Returns queued responses in order and records every request.
/// An exhausted script answers with an API error.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "script exhausted".into(),
                })
            })
    }
}

fn response(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

pub fn text_response(text: &str) -> ProviderResponse {
    response(Message::assistant(text))
}

/// An assistant turn requesting `calls`, in order.
pub fn calls_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    let mut msg = Message::assistant("");
    msg.tool_calls = calls;
    response(msg)
}

pub fn call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}

pub fn call_response(id: &str, name: &str, args: serde_json::Value) -> ProviderResponse {
    calls_response(vec![call(id, name, args)])
}

/// Serves pages from a map; unknown URLs are 404s.
#[derive(Default)]
pub struct MapFetcher {
    pages: HashMap<String, RetrievedArtifact>,
    fetched: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, text: &str) -> Self {
        self.pages
            .insert(url.into(), RetrievedArtifact::success(url, text));
        self
    }

    pub fn failing(mut self, url: &str, failure: FetchFailure) -> Self {
        self.pages
            .insert(url.into(), RetrievedArtifact::failure(url, failure, "test"));
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> RetrievedArtifact {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| RetrievedArtifact::failure(url, FetchFailure::NotFound, ""))
    }
}

/// Returns the first `count` of a fixed hit list and records each call.
pub struct StaticSearch {
    links: Vec<String>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl StaticSearch {
    pub fn new(links: &[&str]) -> Self {
        Self {
            links: links.iter().map(|l| l.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &str, count: u32) -> Result<Vec<SearchHit>, SearchError> {
        self.calls.lock().unwrap().push((query.to_string(), count));
        Ok(self
            .links
            .iter()
            .take(count as usize)
            .enumerate()
            .map(|(i, link)| SearchHit {
                title: format!("Result {}", i + 1),
                link: link.clone(),
                snippet: String::new(),
            })
            .collect())
    }
}
