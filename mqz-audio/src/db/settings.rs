//! Runtime settings access
//!
//! Read/write settings from the settings table (key-value store). Missing
//! values are written back with their default on first read.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Default master volume
pub const DEFAULT_VOLUME: f32 = 0.8;

/// Get volume setting (0.0-1.0)
pub async fn get_volume(db: &Pool<Sqlite>) -> Result<f32> {
    match get_setting::<f32>(db, "volume_level").await? {
        Some(vol) => Ok(vol.clamp(0.0, 1.0)),
        None => {
            set_volume(db, DEFAULT_VOLUME).await?;
            Ok(DEFAULT_VOLUME)
        }
    }
}

/// Set volume setting (0.0-1.0)
pub async fn set_volume(db: &Pool<Sqlite>, volume: f32) -> Result<()> {
    set_setting(db, "volume_level", volume.clamp(0.0, 1.0)).await
}

/// Get audio device/sink identifier
pub async fn get_audio_device(db: &Pool<Sqlite>) -> Result<String> {
    match get_setting::<String>(db, "audio_sink").await? {
        Some(device) => Ok(device),
        None => {
            let default = "default".to_string();
            set_audio_device(db, &default).await?;
            Ok(default)
        }
    }
}

/// Set audio device/sink identifier
pub async fn set_audio_device(db: &Pool<Sqlite>, device: &str) -> Result<()> {
    set_setting(db, "audio_sink", device).await
}

/// Generic setting getter
///
/// Returns `Ok(None)` when the key is absent and an error when the stored
/// value does not parse as `T`.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => s.parse::<T>().map(Some).map_err(|_| {
            Error::Config(format!("Failed to parse setting '{}' value: {}", key, s))
        }),
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::create_tables;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_volume_get_set() {
        let db = setup_test_db().await;

        assert_eq!(get_volume(&db).await.unwrap(), DEFAULT_VOLUME);
        // Default was written back
        assert_eq!(
            get_setting::<f32>(&db, "volume_level").await.unwrap(),
            Some(DEFAULT_VOLUME)
        );

        set_volume(&db, 0.25).await.unwrap();
        assert_eq!(get_volume(&db).await.unwrap(), 0.25);

        set_volume(&db, 1.5).await.unwrap();
        assert_eq!(get_volume(&db).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_audio_device_get_set() {
        let db = setup_test_db().await;

        assert_eq!(get_audio_device(&db).await.unwrap(), "default");
        set_audio_device(&db, "pulse").await.unwrap();
        assert_eq!(get_audio_device(&db).await.unwrap(), "pulse");
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_error() {
        let db = setup_test_db().await;
        set_setting(&db, "volume_level", "loud").await.unwrap();
        assert!(matches!(get_volume(&db).await, Err(Error::Config(_))));
    }
}
