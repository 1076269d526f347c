//! # Sleuth Core
//!
//! Domain types, traits, and error definitions for the Sleuth research
//! assistant. This crate has **no I/O of its own**; it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (reasoning engine, search provider, content
//! fetcher, social platform, persistent store) is a trait here. Concrete
//! implementations live in their own crates, so the tool-call loop can be
//! driven end-to-end by test doubles.

pub mod action;
pub mod artifact;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod search;
pub mod social;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use action::{Action, ActionDescriptor, ActionInvocation, ActionName, ParamKind, ParamSpec};
pub use artifact::{ContentFetcher, FetchFailure, FetchOutcome, RetrievedArtifact};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use search::{SearchHit, SearchProvider};
pub use social::{SocialClient, SocialPost, SocialUser, TimelinePage};
pub use store::{
    KeyValueStore, SocialStore, StoredRetweet, StoredTweet, StoredUser, TimelineEntry, TweetKind,
};
