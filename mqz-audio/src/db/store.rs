//! Durable narration store
//!
//! One logical table keyed by cache key. Values are base64 PCM payloads (see
//! [`crate::audio::pcm`]). Writes overwrite; nothing is ever evicted.

use crate::error::Result;
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use tracing::debug;

/// Persistent key-value area behind the cache's third tier
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Payload stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `payload` under `key`, replacing any previous value
    async fn put(&self, key: &str, payload: &str) -> Result<()>;

    /// Number of stored entries
    async fn count(&self) -> Result<u64>;
}

/// SQLite `audio_cache` table
#[derive(Clone)]
pub struct SqliteAudioStore {
    pool: Pool<Sqlite>,
}

impl SqliteAudioStore {
    /// Wrap a pool whose schema was created by [`crate::db::init::create_tables`].
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DurableStore for SqliteAudioStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT pcm_base64 FROM audio_cache WHERE cache_key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(payload)
    }

    async fn put(&self, key: &str, payload: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audio_cache (cache_key, pcm_base64)
            VALUES (?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                pcm_base64 = excluded.pcm_base64,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        debug!("Stored {} bytes of payload under '{}'", payload.len(), key);
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audio_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
