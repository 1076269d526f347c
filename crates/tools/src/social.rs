//! X API v2 client.
//!
//! Authenticates with an app-only bearer token. The token comes from, in
//! order: memory, the configured `bearer_token`, the session file, or a
//! client-credentials exchange at `POST /oauth2/token` (whose result is then
//! written to the session file for the next run).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sleuth_config::SocialConfig;
use sleuth_core::error::SocialError;
use sleuth_core::social::{SocialClient, SocialPost, SocialUser, TimelinePage};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The timeline endpoint accepts 5..=100 results per page.
const MIN_PAGE: u32 = 5;
const MAX_PAGE: u32 = 100;

const MAX_HANDLE_LEN: usize = 15;

/// X handles are 1 to 15 ASCII letters, digits or underscores.
fn is_valid_handle(handle: &str) -> bool {
    (1..=MAX_HANDLE_LEN).contains(&handle.len())
        && handle.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Session data persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Session {
    bearer_token: String,
    created_at: DateTime<Utc>,
}

pub struct XApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
    preset_token: Option<String>,
    session_path: PathBuf,
    token: Mutex<Option<String>>,
}

impl XApiClient {
    pub fn from_config(config: &SocialConfig) -> Result<Self, SocialError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SocialError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            preset_token: config.bearer_token.clone(),
            session_path: config.session_path(),
            token: Mutex::new(None),
        })
    }

    async fn load_session(&self) -> Option<Session> {
        if !self.session_path.exists() {
            return None;
        }
        let raw = match tokio::fs::read_to_string(&self.session_path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.session_path.display(), error = %e, "Unreadable session file");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(path = %self.session_path.display(), error = %e, "Corrupt session file");
                None
            }
        }
    }

    async fn save_session(&self, session: &Session) -> Result<(), SocialError> {
        if let Some(parent) = self.session_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SocialError::AuthenticationFailed(format!("session dir: {e}")))?;
        }
        let raw = serde_json::to_string_pretty(session)
            .map_err(|e| SocialError::AuthenticationFailed(e.to_string()))?;
        tokio::fs::write(&self.session_path, raw)
            .await
            .map_err(|e| SocialError::AuthenticationFailed(format!("session file: {e}")))?;
        Ok(())
    }

    /// Forget a rejected token, in memory and on disk, so the next
    /// `ensure_session` goes back to the token exchange.
    async fn invalidate_session(&self) {
        *self.token.lock().await = None;
        match tokio::fs::remove_file(&self.session_path).await {
            Ok(()) => info!(path = %self.session_path.display(), "Removed rejected session"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.session_path.display(), error = %e, "Could not remove session file")
            }
        }
    }

    async fn request_token(&self) -> Result<String, SocialError> {
        let (Some(key), Some(secret)) = (&self.api_key, &self.api_secret) else {
            return Err(SocialError::NotConfigured(
                "set X_BEARER_TOKEN, or X_API_KEY and X_API_SECRET".into(),
            ));
        };

        let response = self
            .client
            .post(format!("{}/oauth2/token", self.base_url))
            .basic_auth(key, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SocialError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SocialError::AuthenticationFailed(format!(
                "token exchange returned {}",
                response.status().as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SocialError::AuthenticationFailed(e.to_string()))?;
        Ok(body.access_token)
    }

    async fn bearer(&self) -> Result<String, SocialError> {
        self.ensure_session().await?;
        self.token
            .lock()
            .await
            .clone()
            .ok_or_else(|| SocialError::AuthenticationFailed("no session".into()))
    }

    async fn send_get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, SocialError> {
        let token = self.bearer().await?;
        self.client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| SocialError::Network(e.to_string()))
    }

    /// GET a v2 endpoint and map the common error statuses. A rejected token
    /// triggers one re-authentication and retry.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SocialError> {
        let mut response = self.send_get(path, query).await?;
        if response.status().as_u16() == 401 {
            warn!(path, "Bearer token rejected, re-authenticating");
            self.invalidate_session().await;
            response = self.send_get(path, query).await?;
        }

        let status = response.status().as_u16();
        match status {
            200 => {}
            429 => {
                let reset_after_secs = response
                    .headers()
                    .get("x-rate-limit-reset")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(|reset_at| (reset_at - Utc::now().timestamp()).max(1) as u64)
                    .unwrap_or(60);
                return Err(SocialError::RateLimited { reset_after_secs });
            }
            401 => {
                self.invalidate_session().await;
                return Err(SocialError::AuthenticationFailed(
                    "bearer token rejected".into(),
                ));
            }
            _ => {
                let message = response.text().await.unwrap_or_default();
                return Err(SocialError::Api {
                    status_code: status,
                    message,
                });
            }
        }

        response.json().await.map_err(|e| SocialError::Api {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })
    }
}

#[async_trait]
impl SocialClient for XApiClient {
    fn name(&self) -> &str {
        "x"
    }

    async fn ensure_session(&self) -> Result<(), SocialError> {
        let mut token = self.token.lock().await;
        if token.is_some() {
            return Ok(());
        }

        if let Some(preset) = &self.preset_token {
            *token = Some(preset.clone());
            return Ok(());
        }

        if let Some(session) = self.load_session().await {
            info!(path = %self.session_path.display(), "Loaded cached session");
            *token = Some(session.bearer_token);
            return Ok(());
        }

        info!("Creating new session");
        let bearer_token = self.request_token().await?;
        self.save_session(&Session {
            bearer_token: bearer_token.clone(),
            created_at: Utc::now(),
        })
        .await?;
        *token = Some(bearer_token);
        Ok(())
    }

    async fn get_user(&self, handle: &str) -> Result<SocialUser, SocialError> {
        if !is_valid_handle(handle) {
            return Err(SocialError::InvalidHandle(handle.to_string()));
        }
        let body: UserResponse = match self
            .get_json(
                &format!("/2/users/by/username/{handle}"),
                &[("user.fields", "created_at".to_string())],
            )
            .await
        {
            Err(SocialError::Api {
                status_code: 404, ..
            }) => return Err(SocialError::UserNotFound(handle.to_string())),
            other => other?,
        };

        let user = body
            .data
            .ok_or_else(|| SocialError::UserNotFound(handle.to_string()))?;
        debug!(handle, id = %user.id, "Resolved user");
        Ok(SocialUser {
            id: user.id,
            screen_name: user.username,
            created_at: user.created_at.unwrap_or_else(Utc::now),
        })
    }

    async fn get_timeline(
        &self,
        user_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<TimelinePage, SocialError> {
        let mut query = vec![
            ("max_results", page_size.clamp(MIN_PAGE, MAX_PAGE).to_string()),
            ("tweet.fields", "created_at,referenced_tweets".to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("pagination_token", cursor.to_string()));
        }

        let body: TimelineResponse = self
            .get_json(&format!("/2/users/{user_id}/tweets"), &query)
            .await?;

        let posts = body
            .data
            .into_iter()
            .map(|t| SocialPost {
                retweeted_id: t
                    .referenced_tweets
                    .iter()
                    .find(|r| r.kind == "retweeted")
                    .map(|r| r.id.clone()),
                id: t.id,
                text: t.text,
                created_at: t.created_at.unwrap_or_else(Utc::now),
            })
            .collect();

        Ok(TimelinePage {
            posts,
            next: body.meta.and_then(|m| m.next_token),
        })
    }
}

// --- X API types (internal) ---

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    username: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<TweetData>,
    #[serde(default)]
    meta: Option<TimelineMeta>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
    text: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    referenced_tweets: Vec<ReferencedTweet>,
}

#[derive(Debug, Deserialize)]
struct ReferencedTweet {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct TimelineMeta {
    #[serde(default)]
    next_token: Option<String>,
}
