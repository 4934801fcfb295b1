//! SQLite connection handle and migration runner.
//!
//! The [`Database`] is opened once at process start, handed to whoever needs
//! a pool, and closed during shutdown. There is no global connection state.

use std::{path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use bookshelf_kernel::{settings::DatabaseSettings, Migration};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    )
"#;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the SQLite file named in `settings`.
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let path = Path::new(&settings.path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(settings.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open database {}", path.display()))?;

        tracing::info!(
            target: "bookshelf-db",
            path = %path.display(),
            max_connections = settings.max_connections,
            "database opened"
        );

        Ok(Self { pool })
    }

    /// Private in-memory database on a single pinned connection.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("failed to open in-memory database")?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every migration not yet recorded in `schema_migrations`.
    ///
    /// Each migration runs in its own transaction together with its
    /// bookkeeping row. Returns how many were applied.
    pub async fn migrate(&self, migrations: &[(String, Migration)]) -> anyhow::Result<usize> {
        sqlx::query(CREATE_MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await
            .context("failed to create schema_migrations table")?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let mut tx = self.pool.begin().await?;

            let already: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM schema_migrations WHERE module = ? AND id = ?")
                    .bind(module)
                    .bind(migration.id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if already.is_some() {
                tracing::debug!(target: "bookshelf-db", module = %module, migration = migration.id, "migration already applied");
                continue;
            }

            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {}/{} failed", module, migration.id))?;
            sqlx::query("INSERT INTO schema_migrations (module, id) VALUES (?, ?)")
                .bind(module)
                .bind(migration.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            tracing::info!(target: "bookshelf-db", module = %module, migration = migration.id, "migration applied");
            applied += 1;
        }

        Ok(applied)
    }

    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(target: "bookshelf-db", "database closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrations() -> Vec<(String, Migration)> {
        vec![
            (
                "parents".to_string(),
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE parents (id INTEGER PRIMARY KEY);",
                },
            ),
            (
                "children".to_string(),
                Migration {
                    id: "001_init",
                    up: r#"
                        CREATE TABLE children (
                            id INTEGER PRIMARY KEY,
                            parent_id INTEGER NOT NULL REFERENCES parents (id)
                        );
                        CREATE INDEX children_parent ON children (parent_id);
                    "#,
                },
            ),
        ]
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let db = Database::in_memory().await.unwrap();

        assert_eq!(db.migrate(&migrations()).await.unwrap(), 2);
        assert_eq!(db.migrate(&migrations()).await.unwrap(), 0);

        let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(recorded, 2);
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let db = Database::in_memory().await.unwrap();
        db.migrate(&migrations()).await.unwrap();

        let orphan = sqlx::query("INSERT INTO children (id, parent_id) VALUES (1, 42)")
            .execute(db.pool())
            .await;
        assert!(orphan.is_err());
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let db = Database::in_memory().await.unwrap();
        let broken = vec![(
            "broken".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE ok (id INTEGER); CREATE TABLE oops (",
            },
        )];

        assert!(db.migrate(&broken).await.is_err());

        let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(recorded, 0);
    }

    #[tokio::test]
    async fn connect_creates_parent_directory() {
        let dir = std::env::temp_dir().join(format!("bookshelf-db-{}", uuid::Uuid::new_v4()));
        let settings = DatabaseSettings {
            path: dir.join("nested/library.sqlite").to_string_lossy().into_owned(),
            ..DatabaseSettings::default()
        };

        let db = Database::connect(&settings).await.unwrap();
        db.migrate(&migrations()).await.unwrap();
        db.close().await;

        assert!(dir.join("nested/library.sqlite").exists());
        let _ = std::fs::remove_dir_all(dir);
    }
}
