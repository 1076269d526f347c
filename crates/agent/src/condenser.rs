//! Condensing retrieved texts into a summary that fits the engine's context.
//!
//! Each text is sent through an extraction request on its own; the outputs are
//! joined with blank lines. When the joined result is still over the combined
//! limit it is condensed again as a single text. Passes are bounded by
//! `max_depth`, and a pass that does not shrink the text ends the recursion;
//! either way the result is then hard-truncated to the limit.

use crate::engine::Engine;
use crate::prompts::EXTRACTION_PROMPT;
use crate::token::TokenCounter;
use sleuth_config::CondenserConfig;
use sleuth_core::error::ProviderError;
use sleuth_core::message::Message;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Condenser {
    engine: Engine,
    counter: Arc<dyn TokenCounter>,
    settings: CondenserConfig,
}

impl Condenser {
    /// `engine` is switched to `settings.model` when one is set.
    pub fn new(engine: Engine, counter: Arc<dyn TokenCounter>, settings: CondenserConfig) -> Self {
        let engine = match &settings.model {
            Some(model) => engine.with_model(model),
            None => engine,
        };
        Self {
            engine,
            counter,
            settings,
        }
    }

    pub fn counter(&self) -> &Arc<dyn TokenCounter> {
        &self.counter
    }

    pub fn settings(&self) -> &CondenserConfig {
        &self.settings
    }

    /// Condense `texts`. Blank texts are skipped; no input gives `""`.
    pub async fn condense(&self, texts: &[String]) -> Result<String, ProviderError> {
        let limit = self.settings.combined_token_limit;
        let mut inputs: Vec<String> = texts
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect();
        if inputs.is_empty() {
            return Ok(String::new());
        }

        let mut previous_tokens = usize::MAX;
        let mut pass = 0;
        loop {
            pass += 1;
            let mut extracts = Vec::with_capacity(inputs.len());
            for text in &inputs {
                extracts.push(self.extract(text).await?);
            }
            let combined = extracts.join("\n\n");
            let tokens = self.counter.count(&combined);
            debug!(pass, inputs = inputs.len(), tokens, "Condense pass complete");

            if tokens <= limit {
                return Ok(combined);
            }
            if pass >= self.settings.max_depth || tokens >= previous_tokens {
                warn!(pass, tokens, limit, "Condensing did not converge, truncating");
                return Ok(self.counter.truncate(&combined, limit));
            }

            previous_tokens = tokens;
            inputs = vec![combined];
        }
    }

    /// One extraction request. Oversized texts are cut to their leading
    /// `truncate_chars` characters first.
    async fn extract(&self, text: &str) -> Result<String, ProviderError> {
        let input = if self.counter.count(text) > self.settings.per_text_token_limit {
            debug!(chars = self.settings.truncate_chars, "Truncating oversized text");
            text.chars().take(self.settings.truncate_chars).collect()
        } else {
            text.to_string()
        };

        self.engine
            .complete_text(vec![Message::system(EXTRACTION_PROMPT), Message::user(input)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedProvider, text_response};
    use crate::token::HeuristicCounter;

    fn settings(combined: usize, max_depth: u32) -> CondenserConfig {
        CondenserConfig {
            model: None,
            per_text_token_limit: 20_000,
            truncate_chars: 40_000,
            combined_token_limit: combined,
            max_depth,
        }
    }

    fn condenser(provider: Arc<ScriptedProvider>, settings: CondenserConfig) -> Condenser {
        Condenser::new(
            Engine::new(provider, "main-model"),
            Arc::new(HeuristicCounter),
            settings,
        )
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let c = condenser(provider.clone(), settings(128_000, 3));
        assert_eq!(c.condense(&[]).await.unwrap(), "");
        assert_eq!(c.condense(&["  ".into()]).await.unwrap(), "");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn one_extraction_per_text_joined() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("facts A"),
            text_response("facts B"),
        ]));
        let c = condenser(provider.clone(), settings(128_000, 3));
        let out = c.condense(&["page a".into(), "page b".into()]).await.unwrap();
        assert_eq!(out, "facts A\n\nfacts B");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].tools.is_empty());
        assert_eq!(requests[0].messages[0].content, EXTRACTION_PROMPT);
        assert_eq!(requests[0].messages[1].content, "page a");
    }

    #[tokio::test]
    async fn oversized_text_truncated_before_extraction() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("ok")]));
        let mut s = settings(128_000, 3);
        s.per_text_token_limit = 10;
        s.truncate_chars = 12;
        let c = condenser(provider.clone(), s);
        c.condense(&["x".repeat(100)]).await.unwrap();
        assert_eq!(provider.requests()[0].messages[1].content, "x".repeat(12));
    }

    #[tokio::test]
    async fn recondenses_combined_output_when_over_limit() {
        // 2 extracts of 40 chars each -> 82 chars ~ 21 tokens > 15
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response(&"a".repeat(40)),
            text_response(&"b".repeat(40)),
            text_response("short"),
        ]));
        let c = condenser(provider.clone(), settings(15, 3));
        let out = c.condense(&["p1".into(), "p2".into()]).await.unwrap();
        assert_eq!(out, "short");
        assert_eq!(provider.call_count(), 3);
        let second_pass_input = &provider.requests()[2].messages[1].content;
        assert!(second_pass_input.contains("\n\n"));
    }

    #[tokio::test]
    async fn non_shrinking_pass_falls_back_to_truncation() {
        let big = "z".repeat(200);
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response(&big),
            text_response(&"y".repeat(400)),
        ]));
        let c = condenser(provider.clone(), settings(10, 5));
        let out = c.condense(&["page".into()]).await.unwrap();
        assert_eq!(provider.call_count(), 2);
        assert!(HeuristicCounter.count(&out) <= 10);
    }

    #[tokio::test]
    async fn depth_ceiling_bounds_calls_and_output() {
        // Every pass shrinks a little, but never under the limit.
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response(&"a".repeat(400)),
            text_response(&"b".repeat(300)),
            text_response(&"c".repeat(200)),
            text_response("never used"),
        ]));
        let c = condenser(provider.clone(), settings(10, 3));
        let out = c.condense(&["page".into()]).await.unwrap();
        assert_eq!(provider.call_count(), 3);
        assert_eq!(out, "c".repeat(40));
    }

    #[tokio::test]
    async fn model_override_used_for_extraction() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("ok")]));
        let mut s = settings(128_000, 3);
        s.model = Some("cheap-model".into());
        let c = condenser(provider.clone(), s);
        c.condense(&["text".into()]).await.unwrap();
        assert_eq!(provider.requests()[0].model, "cheap-model");
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let c = condenser(provider, settings(128_000, 3));
        assert!(c.condense(&["text".into()]).await.is_err());
    }
}
