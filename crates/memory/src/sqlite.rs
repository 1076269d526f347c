//! SQLite backends.
//!
//! Two independent stores, each with its own pool:
//! - `SqliteKeyValueStore`: a single `(key, value)` table, name configurable
//! - `SqliteSocialStore`: `users`, `tweets` and `retweets`
//!
//! Both may point at the same database file. Timestamps are RFC 3339 text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sleuth_core::error::StoreError;
use sleuth_core::store::{
    KeyValueStore, SocialStore, StoredRetweet, StoredTweet, StoredUser, TimelineEntry,
    sort_timeline,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// Open a pool on `path`, creating the file when missing.
///
/// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
async fn open_pool(path: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(path)
        .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))
}

fn parse_time(raw: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("{column} column: {e}")))
}

fn column<T>(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn escape_like(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Table names are interpolated into SQL, so only identifiers are allowed.
fn validate_table_name(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if starts_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::Storage(format!("Invalid table name: {name:?}")))
    }
}

// --- Key-value store ---

/// Key-value persistence for search summaries and other text blobs.
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteKeyValueStore {
    /// Open (and create if needed) the store at `path` using `table`.
    pub async fn open(path: &str, table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;
        let pool = open_pool(path).await?;
        let store = Self {
            pool,
            table: table.to_string(),
        };
        store.run_migrations().await?;
        info!(table, "SQLite key-value store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            self.table
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("{} table: {e}", self.table)))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            self.table
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("put {key}: {e}")))?;
        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let sql = format!("SELECT value FROM {} WHERE key = ?1", self.table);
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get {key}: {e}")))?;
        row.map(|r| column::<String>(&r, "value")).transpose()
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE key = ?1", self.table);
        let result = sqlx::query(&sql)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("delete {key}: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
        let rows = match prefix {
            Some(prefix) => {
                let sql = format!(
                    "SELECT key FROM {} WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
                    self.table
                );
                sqlx::query(&sql)
                    .bind(escape_like(prefix))
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT key FROM {} ORDER BY key", self.table);
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(|e| StoreError::QueryFailed(format!("list keys: {e}")))?;

        let mut keys = rows
            .iter()
            .map(|r| column::<String>(r, "key"))
            .collect::<Result<Vec<_>, _>>()?;
        // LIKE is case-insensitive for ASCII in SQLite
        if let Some(prefix) = prefix {
            keys.retain(|k| k.starts_with(prefix));
        }
        Ok(keys)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {}", self.table);
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("clear: {e}")))?;
        info!(table = %self.table, "Cleared key-value store");
        Ok(())
    }
}

// --- Social store ---

/// Users, tweets and retweets scraped from the social platform.
pub struct SqliteSocialStore {
    pool: SqlitePool,
}

impl SqliteSocialStore {
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let pool = open_pool(path).await?;
        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite social store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            (
                "users table",
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    user_id     TEXT PRIMARY KEY,
                    screen_name TEXT NOT NULL,
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "tweets table",
                r#"
                CREATE TABLE IF NOT EXISTS tweets (
                    tweet_id   TEXT PRIMARY KEY,
                    user_id    TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    text       TEXT NOT NULL
                )
                "#,
            ),
            (
                "retweets table",
                r#"
                CREATE TABLE IF NOT EXISTS retweets (
                    retweet_id        TEXT PRIMARY KEY,
                    original_tweet_id TEXT NOT NULL,
                    user_id           TEXT NOT NULL,
                    retweeted_at      TEXT NOT NULL,
                    text              TEXT NOT NULL
                )
                "#,
            ),
            (
                "screen_name index",
                "CREATE INDEX IF NOT EXISTS idx_users_screen_name ON users(screen_name COLLATE NOCASE)",
            ),
            (
                "tweets index",
                "CREATE INDEX IF NOT EXISTS idx_tweets_user ON tweets(user_id)",
            ),
            (
                "retweets index",
                "CREATE INDEX IF NOT EXISTS idx_retweets_user ON retweets(user_id)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("Social store migrations complete");
        Ok(())
    }
}

#[async_trait]
impl SocialStore for SqliteSocialStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert_user(&self, user: &StoredUser) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, screen_name, created_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                screen_name = excluded.screen_name,
                created_at = excluded.created_at
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.screen_name)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("upsert user {}: {e}", user.user_id)))?;
        Ok(())
    }

    async fn upsert_tweet(&self, tweet: &StoredTweet) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tweets (tweet_id, user_id, created_at, text) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(tweet_id) DO UPDATE SET
                user_id = excluded.user_id,
                created_at = excluded.created_at,
                text = excluded.text
            "#,
        )
        .bind(&tweet.tweet_id)
        .bind(&tweet.user_id)
        .bind(tweet.created_at.to_rfc3339())
        .bind(&tweet.text)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("upsert tweet {}: {e}", tweet.tweet_id)))?;
        Ok(())
    }

    async fn upsert_retweet(&self, retweet: &StoredRetweet) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO retweets (retweet_id, original_tweet_id, user_id, retweeted_at, text)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(retweet_id) DO UPDATE SET
                original_tweet_id = excluded.original_tweet_id,
                user_id = excluded.user_id,
                retweeted_at = excluded.retweeted_at,
                text = excluded.text
            "#,
        )
        .bind(&retweet.retweet_id)
        .bind(&retweet.original_tweet_id)
        .bind(&retweet.user_id)
        .bind(retweet.retweeted_at.to_rfc3339())
        .bind(&retweet.text)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            StoreError::QueryFailed(format!("upsert retweet {}: {e}", retweet.retweet_id))
        })?;
        Ok(())
    }

    async fn get_user_by_screen_name(
        &self,
        screen_name: &str,
    ) -> Result<Option<StoredUser>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, screen_name, created_at FROM users
             WHERE screen_name = ?1 COLLATE NOCASE LIMIT 1",
        )
        .bind(screen_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("get user {screen_name}: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let created_at: String = column(&row, "created_at")?;
        Ok(Some(StoredUser {
            user_id: column(&row, "user_id")?,
            screen_name: column(&row, "screen_name")?,
            created_at: parse_time(&created_at, "created_at")?,
        }))
    }

    async fn get_tweets_by_user(&self, user_id: &str) -> Result<Vec<TimelineEntry>, StoreError> {
        let tweet_rows = sqlx::query(
            "SELECT tweet_id, user_id, created_at, text FROM tweets WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("tweets of {user_id}: {e}")))?;

        let retweet_rows = sqlx::query(
            "SELECT retweet_id, original_tweet_id, user_id, retweeted_at, text
             FROM retweets WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("retweets of {user_id}: {e}")))?;

        let mut entries = Vec::with_capacity(tweet_rows.len() + retweet_rows.len());
        for row in &tweet_rows {
            let created_at: String = column(row, "created_at")?;
            entries.push(TimelineEntry::from(StoredTweet {
                tweet_id: column(row, "tweet_id")?,
                user_id: column(row, "user_id")?,
                created_at: parse_time(&created_at, "created_at")?,
                text: column(row, "text")?,
            }));
        }
        for row in &retweet_rows {
            let retweeted_at: String = column(row, "retweeted_at")?;
            entries.push(TimelineEntry::from(StoredRetweet {
                retweet_id: column(row, "retweet_id")?,
                original_tweet_id: column(row, "original_tweet_id")?,
                user_id: column(row, "user_id")?,
                retweeted_at: parse_time(&retweeted_at, "retweeted_at")?,
                text: column(row, "text")?,
            }));
        }

        sort_timeline(&mut entries);
        Ok(entries)
    }
}
