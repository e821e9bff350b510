use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::AppConfig;
use crate::camera::Camera;
use crate::error::{AppError, Result};

/// Settings sections stored as one JSON row each
const SECTIONS: [&str; 7] = [
    "web",
    "ingest",
    "motion",
    "recording",
    "health",
    "stream",
    "overlay",
];

/// SQLite backed configuration
///
/// Each settings section of [`AppConfig`] is a JSON row in `sections`, so a
/// hand-edited row only has to contain the keys it changes. Registered
/// cameras live in their own `cameras` table in registration order. Reads
/// go through an `ArcSwap` snapshot; writes hit the database first and only
/// then replace the snapshot.
#[derive(Clone)]
pub struct ConfigStore {
    pool: Pool<Sqlite>,
    cache: Arc<ArcSwap<AppConfig>>,
}

impl ConfigStore {
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(300))
            .connect(&db_url)
            .await?;

        Self::init_schema(&pool).await?;
        let config = Self::load(&pool).await?;
        info!(
            "Loaded configuration from {} ({} camera(s))",
            db_path.display(),
            config.cameras.len()
        );

        Ok(Self {
            pool,
            cache: Arc::new(ArcSwap::from_pointee(config)),
        })
    }

    async fn init_schema(pool: &Pool<Sqlite>) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sections (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cameras (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                url TEXT NOT NULL,
                added_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Assemble the config from both tables, writing defaults for missing
    /// sections so they show up in the database
    async fn load(pool: &Pool<Sqlite>) -> Result<AppConfig> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT name, value FROM sections")
            .fetch_all(pool)
            .await?;

        let mut sections = Map::new();
        for (name, value) in rows {
            let value: Value = serde_json::from_str(&value)
                .map_err(|e| AppError::Config(format!("section {}: {}", name, e)))?;
            sections.insert(name, value);
        }

        let mut config: AppConfig = serde_json::from_value(Value::Object(sections.clone()))
            .map_err(|e| AppError::Config(e.to_string()))?;

        let defaults = serde_json::to_value(&config)?;
        for name in SECTIONS {
            if !sections.contains_key(name) {
                debug!("Writing default config section {}", name);
                Self::save_section(pool, name, &defaults[name]).await?;
            }
        }

        let cameras: Vec<(String, String)> =
            sqlx::query_as("SELECT name, url FROM cameras ORDER BY id")
                .fetch_all(pool)
                .await?;
        config.cameras = cameras
            .into_iter()
            .map(|(name, url)| Camera::new(name, url))
            .collect();

        Ok(config)
    }

    async fn save_section(pool: &Pool<Sqlite>, name: &str, value: &Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sections (name, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(name) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
        )
        .bind(name)
        .bind(value.to_string())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Current configuration snapshot (lock-free)
    pub fn get(&self) -> Arc<AppConfig> {
        self.cache.load_full()
    }

    fn store_cameras(&self, f: impl FnOnce(&mut Vec<Camera>)) {
        let mut config = (**self.cache.load()).clone();
        f(&mut config.cameras);
        self.cache.store(Arc::new(config));
    }

    /// Persist a newly registered camera
    pub async fn insert_camera(&self, camera: &Camera) -> Result<()> {
        sqlx::query("INSERT INTO cameras (name, url) VALUES (?1, ?2)")
            .bind(&camera.name)
            .bind(&camera.url)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    AppError::Conflict(format!("Camera {} already exists", camera.name))
                }
                e => AppError::Database(e),
            })?;

        self.store_cameras(|cameras| cameras.push(camera.clone()));
        Ok(())
    }

    /// Remove a persisted camera, returning whether a row was deleted
    pub async fn delete_camera(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cameras WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        self.store_cameras(|cameras| cameras.retain(|c| !c.is_named(name)));
        Ok(result.rows_affected() > 0)
    }

    /// Close the connection pool; later writes fail
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_cameras_survive_reopen_in_order() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let store = ConfigStore::new(&db_path).await.unwrap();
        assert!(store.get().cameras.is_empty());
        assert_eq!(store.get().motion.threshold, 500);

        for (name, url) in [
            ("porch", "http://10.0.0.5:8080/video"),
            ("garage", "http://10.0.0.6/video"),
            ("attic", "http://10.0.0.7/video"),
        ] {
            store.insert_camera(&Camera::new(name, url)).await.unwrap();
        }
        assert!(store.delete_camera("GARAGE").await.unwrap());
        assert!(!store.delete_camera("garage").await.unwrap());
        assert_eq!(store.get().cameras.len(), 2);
        store.close().await;

        let store = ConfigStore::new(&db_path).await.unwrap();
        let names: Vec<_> = store.get().cameras.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, ["porch", "attic"]);
        assert_eq!(store.get().cameras[0].url, "http://10.0.0.5:8080/video");
    }

    #[tokio::test]
    async fn test_duplicate_camera_is_conflict() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(&dir.path().join("test.db")).await.unwrap();
        store
            .insert_camera(&Camera::new("porch", "http://10.0.0.5/video"))
            .await
            .unwrap();

        let err = store
            .insert_camera(&Camera::new("Porch", "http://10.0.0.6/video"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.get().cameras.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_section_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let store = ConfigStore::new(&db_path).await.unwrap();

        // An operator edits one key of one section by hand
        sqlx::query("UPDATE sections SET value = ?1 WHERE name = 'motion'")
            .bind(r#"{"threshold":800}"#)
            .execute(&store.pool)
            .await
            .unwrap();
        store.close().await;

        let store = ConfigStore::new(&db_path).await.unwrap();
        let config = store.get();
        assert_eq!(config.motion.threshold, 800);
        assert_eq!(config.motion.pixel_threshold, 20);
        assert_eq!(config.web.http_port, 8000);
    }

    #[tokio::test]
    async fn test_writes_fail_after_close() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(&dir.path().join("test.db")).await.unwrap();
        store.close().await;

        assert!(store
            .insert_camera(&Camera::new("porch", "http://10.0.0.5/video"))
            .await
            .is_err());
        assert!(store.get().cameras.is_empty());
    }
}
