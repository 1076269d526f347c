//! The tool-call loop: one user query in, one answer out.
//!
//! The loop alternates between asking the engine for its next move and
//! executing the single action it requested. It runs at most
//! `max_iterations` tool-enabled requests; after that one more request is made
//! without tools, so a run never makes more than `max_iterations + 1` engine
//! calls.

use crate::engine::Engine;
use crate::prompts::{
    self, ALREADY_SEARCHED, FALLBACK_ANSWER, FINAL_ANSWER_INSTRUCTION,
};
use crate::registry::ActionRegistry;
use chrono::Utc;
use sleuth_config::{AgentSettings, DedupPolicy};
use sleuth_core::action::{Action, ActionInvocation};
use sleuth_core::error::{ActionError, Result};
use sleuth_core::event::{DomainEvent, EventBus};
use sleuth_core::message::{Conversation, Message, MessageToolCall};
use sleuth_core::provider::{ProviderResponse, ToolDefinition};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where the loop is between engine calls.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    ExecutingAction(MessageToolCall),
    Done(String),
}

/// The result of one run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub answer: String,
    /// Requests the loop itself made (condensing calls excluded)
    pub engine_calls: u32,
    /// Tool-enabled requests, at most `max_iterations`
    pub cycles: u32,
    /// Whether the answer came from the final no-tools request
    pub forced_final: bool,
    pub conversation: Conversation,
}

pub struct ToolCallLoop {
    engine: Engine,
    registry: Arc<ActionRegistry>,
    max_iterations: u32,
    dedup: DedupPolicy,
    persona: String,
    events: Arc<EventBus>,
}

/// Per-run bookkeeping.
#[derive(Default)]
struct RunState {
    seen: HashSet<String>,
    previous_queries: Vec<String>,
    engine_calls: u32,
}

impl ToolCallLoop {
    pub fn new(engine: Engine, registry: Arc<ActionRegistry>) -> Self {
        let defaults = AgentSettings::default();
        Self {
            engine,
            registry,
            max_iterations: defaults.max_iterations,
            dedup: defaults.dedup,
            persona: defaults.persona,
            events: Arc::new(EventBus::default()),
        }
    }

    /// Apply the `[agent]` config section.
    pub fn with_settings(self, settings: &AgentSettings) -> Self {
        self.with_max_iterations(settings.max_iterations)
            .with_dedup(settings.dedup)
            .with_persona(settings.persona.clone())
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Answer `query`. Engine failures abort the run; everything an action
    /// does wrong is reported back to the engine instead.
    pub async fn run(&self, query: &str) -> Result<LoopOutcome> {
        let system = prompts::system_prompt(&self.persona, &chrono::Local::now());
        let mut conversation = Conversation::seeded(system, query);
        info!(conversation_id = %conversation.id, "Starting tool-call loop");

        let tools = self.registry.definitions();
        let mut run = RunState::default();
        let mut cycles = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel if cycles >= self.max_iterations => break,
                LoopState::AwaitingModel => {
                    cycles += 1;
                    debug!(conversation_id = %conversation.id, cycle = cycles, "Awaiting model");
                    let response = self
                        .call_engine(&conversation, tools.clone(), &mut run)
                        .await?;
                    self.absorb(response.message, &mut conversation)
                }
                LoopState::ExecutingAction(call) => {
                    let content = self.execute(&call, &mut run).await;
                    conversation.push(Message::tool_result(&call.id, &call.name, content));
                    LoopState::AwaitingModel
                }
                LoopState::Done(answer) => {
                    info!(
                        conversation_id = %conversation.id,
                        engine_calls = run.engine_calls,
                        "Answer ready"
                    );
                    return Ok(LoopOutcome {
                        answer,
                        engine_calls: run.engine_calls,
                        cycles,
                        forced_final: false,
                        conversation,
                    });
                }
            };
        }

        warn!(
            conversation_id = %conversation.id,
            iterations = cycles,
            "Max iterations reached, forcing final answer"
        );
        conversation.push(Message::user(FINAL_ANSWER_INSTRUCTION));
        let response = self
            .call_engine(&conversation, Vec::new(), &mut run)
            .await?;
        let mut answer = response.message.content.clone();
        conversation.push(response.message);
        if answer.trim().is_empty() {
            answer = FALLBACK_ANSWER.to_string();
        }

        Ok(LoopOutcome {
            answer,
            engine_calls: run.engine_calls,
            cycles,
            forced_final: true,
            conversation,
        })
    }

    async fn call_engine(
        &self,
        conversation: &Conversation,
        tools: Vec<ToolDefinition>,
        run: &mut RunState,
    ) -> Result<ProviderResponse> {
        let request = self.engine.request(conversation.messages.clone(), tools);
        let response = self.engine.complete(request).await?;
        run.engine_calls += 1;

        if let Some(usage) = &response.usage {
            self.events.publish(DomainEvent::ResponseGenerated {
                conversation_id: conversation.id.to_string(),
                model: response.model.clone(),
                tokens_used: usage.total_tokens,
                timestamp: Utc::now(),
            });
        }
        Ok(response)
    }

    /// Append the engine's reply and pick the next state. Only the first
    /// tool call is kept, so every call in the history gets its result.
    fn absorb(&self, mut message: Message, conversation: &mut Conversation) -> LoopState {
        if message.tool_calls.is_empty() {
            let answer = message.content.clone();
            conversation.push(message);
            return LoopState::Done(answer);
        }

        if message.tool_calls.len() > 1 {
            let ignored: Vec<&str> = message.tool_calls[1..]
                .iter()
                .map(|c| c.name.as_str())
                .collect();
            warn!(?ignored, "Engine requested several actions, executing only the first");
            message.tool_calls.truncate(1);
        }
        let call = message.tool_calls[0].clone();
        conversation.push(message);
        LoopState::ExecutingAction(call)
    }

    /// Run one invocation and produce the action-result text.
    async fn execute(&self, call: &MessageToolCall, run: &mut RunState) -> String {
        let action = match ActionInvocation::from_tool_call(call)
            .and_then(|invocation| self.registry.parse(&invocation))
        {
            Ok(action) => action,
            Err(e) => return self.reject(&call.name, e),
        };

        if let Some(key) = self.dedup_key(&action)
            && !run.seen.insert(key)
        {
            debug!(action = %action.name(), "Suppressing repeated action");
            self.events.publish(DomainEvent::InvocationRejected {
                action: call.name.clone(),
                reason: "duplicate".into(),
                timestamp: Utc::now(),
            });
            return ALREADY_SEARCHED.to_string();
        }
        if let Some(query) = action.search_query() {
            run.previous_queries.push(query.to_string());
        }

        let start = Instant::now();
        let result = self.registry.dispatch(&action).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        self.events.publish(DomainEvent::ActionExecuted {
            action: call.name.clone(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(text) if action.search_query().is_some() => {
                prompts::search_result(&run.previous_queries, &text)
            }
            Ok(text) => text,
            Err(e) => {
                warn!(action = %call.name, error = %e, "Action failed");
                format!("Error: {e}")
            }
        }
    }

    fn reject(&self, name: &str, error: ActionError) -> String {
        warn!(action = name, error = %error, "Rejected invocation");
        self.events.publish(DomainEvent::InvocationRejected {
            action: name.to_string(),
            reason: error.to_string(),
            timestamp: Utc::now(),
        });
        format!("Error: {error}")
    }

    fn dedup_key(&self, action: &Action) -> Option<String> {
        match self.dedup {
            DedupPolicy::Off => None,
            DedupPolicy::SearchOnly => action.search_query().map(|_| action.dedup_key()),
            DedupPolicy::AllActions => Some(action.dedup_key()),
        }
    }
}
