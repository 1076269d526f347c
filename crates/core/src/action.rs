//! Actions: the closed set of external operations the engine may request.
//!
//! The engine names an action and hands over JSON arguments. That loose
//! invocation is checked against the action's static [`ActionDescriptor`]
//! and then deserialized into the typed [`Action`] enum, which dispatchers
//! match exhaustively.

use crate::error::ActionError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every action the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    SearchAndSummarize,
    ScrapeSocialUser,
    AnswerFromStoredUser,
}

impl ActionName {
    pub const ALL: [ActionName; 3] = [
        ActionName::SearchAndSummarize,
        ActionName::ScrapeSocialUser,
        ActionName::AnswerFromStoredUser,
    ];

    /// Wire name sent to and received from the engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::SearchAndSummarize => "search_and_summarize",
            ActionName::ScrapeSocialUser => "scrape_social_user",
            ActionName::AnswerFromStoredUser => "answer_from_stored_user",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == name)
    }

    /// The static descriptor for this action.
    pub fn descriptor(&self) -> &'static ActionDescriptor {
        match self {
            ActionName::SearchAndSummarize => &DESCRIPTORS[0],
            ActionName::ScrapeSocialUser => &DESCRIPTORS[1],
            ActionName::AnswerFromStoredUser => &DESCRIPTORS[2],
        }
    }
}

impl std::fmt::Display for ActionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Boolean,
}

impl ParamKind {
    fn json_type(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }
}

/// One parameter of an action.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

/// Static declaration of an action: name, description, parameter schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDescriptor {
    pub name: ActionName,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

static DESCRIPTORS: [ActionDescriptor; 3] = [
    ActionDescriptor {
        name: ActionName::SearchAndSummarize,
        description: "Search the web for information and summarize the result details",
        params: &[
            ParamSpec {
                name: "query",
                kind: ParamKind::String,
                required: true,
                description: "The search query",
            },
            ParamSpec {
                name: "num_results",
                kind: ParamKind::Integer,
                required: false,
                description: "The number of search results to process",
            },
        ],
    },
    ActionDescriptor {
        name: ActionName::ScrapeSocialUser,
        description: "Scrape a social-media user's timeline (tweets and retweets) and store it \
                      so later questions about that user can be answered",
        params: &[ParamSpec {
            name: "username",
            kind: ParamKind::String,
            required: true,
            description: "The user's handle, with or without a leading @",
        }],
    },
    ActionDescriptor {
        name: ActionName::AnswerFromStoredUser,
        description: "Answer a question using the stored posts of a social-media user \
                      that has already been scraped",
        params: &[
            ParamSpec {
                name: "username",
                kind: ParamKind::String,
                required: true,
                description: "The user's handle, with or without a leading @",
            },
            ParamSpec {
                name: "query",
                kind: ParamKind::String,
                required: true,
                description: "The question to answer from the user's posts",
            },
        ],
    },
];

/// All action descriptors, in a stable order.
pub fn descriptors() -> &'static [ActionDescriptor] {
    &DESCRIPTORS
}

impl ActionDescriptor {
    /// Render as a JSON-Schema tool definition for the engine.
    pub fn to_definition(&self) -> ToolDefinition {
        let mut properties = serde_json::Map::new();
        for p in self.params {
            properties.insert(
                p.name.to_string(),
                serde_json::json!({
                    "type": p.kind.json_type(),
                    "description": p.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        ToolDefinition {
            name: self.name.as_str().to_string(),
            description: self.description.to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    /// Check an argument object against this schema.
    ///
    /// Unknown keys are tolerated; missing required keys, `null` required
    /// values, empty required strings and wrong types are not.
    pub fn validate(&self, arguments: &Value) -> Result<(), ActionError> {
        let malformed = |reason: String| ActionError::MalformedInvocation {
            action: self.name.as_str().to_string(),
            reason,
        };

        let obj = arguments
            .as_object()
            .ok_or_else(|| malformed("arguments must be a JSON object".into()))?;

        for p in self.params {
            match obj.get(p.name) {
                None | Some(Value::Null) if p.required => {
                    return Err(malformed(format!("missing required parameter '{}'", p.name)));
                }
                None | Some(Value::Null) => {}
                Some(value) if !p.kind.accepts(value) => {
                    return Err(malformed(format!(
                        "parameter '{}' must be of type {}",
                        p.name,
                        p.kind.json_type()
                    )));
                }
                Some(Value::String(s)) if p.required && s.trim().is_empty() => {
                    return Err(malformed(format!("parameter '{}' must not be empty", p.name)));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// An action request as produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInvocation {
    /// Unique call ID (matches the engine's tool_call.id)
    pub id: String,

    /// Name of the action to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: Value,
}

impl ActionInvocation {
    /// Decode the engine's JSON-encoded arguments.
    ///
    /// The name is resolved first, so an unregistered action is reported as
    /// unknown whatever its arguments look like. An empty argument string is
    /// read as `{}`; anything that is not valid JSON is a malformed invocation.
    pub fn from_tool_call(call: &MessageToolCall) -> Result<Self, ActionError> {
        if ActionName::parse(&call.name).is_none() {
            return Err(ActionError::UnknownAction(call.name.clone()));
        }
        let raw = call.arguments.trim();
        let arguments = if raw.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw).map_err(|e| ActionError::MalformedInvocation {
                action: call.name.clone(),
                reason: format!("arguments are not valid JSON: {e}"),
            })?
        };
        Ok(Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub num_results: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeUserArgs {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUserQueryArgs {
    pub username: String,
    pub query: String,
}

/// A validated action with typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SearchAndSummarize(SearchArgs),
    ScrapeSocialUser(ScrapeUserArgs),
    AnswerFromStoredUser(StoredUserQueryArgs),
}

impl Action {
    /// Resolve and validate an invocation.
    pub fn from_invocation(invocation: &ActionInvocation) -> Result<Self, ActionError> {
        let name = ActionName::parse(&invocation.name)
            .ok_or_else(|| ActionError::UnknownAction(invocation.name.clone()))?;
        name.descriptor().validate(&invocation.arguments)?;

        let typed = |e: serde_json::Error| ActionError::MalformedInvocation {
            action: name.as_str().to_string(),
            reason: e.to_string(),
        };
        let args = invocation.arguments.clone();
        Ok(match name {
            ActionName::SearchAndSummarize => {
                Action::SearchAndSummarize(serde_json::from_value(args).map_err(typed)?)
            }
            ActionName::ScrapeSocialUser => {
                Action::ScrapeSocialUser(serde_json::from_value(args).map_err(typed)?)
            }
            ActionName::AnswerFromStoredUser => {
                Action::AnswerFromStoredUser(serde_json::from_value(args).map_err(typed)?)
            }
        })
    }

    pub fn name(&self) -> ActionName {
        match self {
            Action::SearchAndSummarize(_) => ActionName::SearchAndSummarize,
            Action::ScrapeSocialUser(_) => ActionName::ScrapeSocialUser,
            Action::AnswerFromStoredUser(_) => ActionName::AnswerFromStoredUser,
        }
    }

    /// The query string of a search action.
    pub fn search_query(&self) -> Option<&str> {
        match self {
            Action::SearchAndSummarize(args) => Some(&args.query),
            _ => None,
        }
    }

    /// Identity used when suppressing repeated actions within one run.
    ///
    /// Searches are keyed by query string alone, so asking for a different
    /// result count does not make a repeated query new.
    pub fn dedup_key(&self) -> String {
        let body = match self {
            Action::SearchAndSummarize(args) => args.query.clone(),
            Action::ScrapeSocialUser(args) => normalize_handle(&args.username).to_lowercase(),
            Action::AnswerFromStoredUser(args) => format!(
                "{}\u{1f}{}",
                normalize_handle(&args.username).to_lowercase(),
                args.query
            ),
        };
        format!("{}:{}", self.name(), body)
    }
}

/// Strip surrounding whitespace and a leading `@` from a handle.
pub fn normalize_handle(handle: &str) -> &str {
    let trimmed = handle.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed)
}
