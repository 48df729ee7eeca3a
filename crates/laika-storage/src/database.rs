// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use laika_config::model::StorageConfig;
use laika_core::LaikaError;
use tracing::{debug, info};

use crate::migrations;

/// Handle to the SQLite database.
///
/// Cheap to clone; every clone talks to the same background thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the database at `path` with default settings and run
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, LaikaError> {
        let config = StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        };
        Self::open_with(&config).await
    }

    /// Open the database described by `config`.
    pub async fn open_with(config: &StorageConfig) -> Result<Self, LaikaError> {
        if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| LaikaError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(&config.database_path)
            .await
            .map_err(|e| LaikaError::storage(e.to_string()))?;

        let wal = config.wal_mode;
        let busy_timeout_ms = config.busy_timeout_ms;
        let db = Self { conn };
        db.call(move |conn| {
            if wal {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            conn.execute_batch(&format!(
                "PRAGMA foreign_keys = ON;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = {busy_timeout_ms};"
            ))?;
            migrations::run_migrations(conn)
        })
        .await?;

        info!(path = %config.database_path, wal, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database. Used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, LaikaError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| LaikaError::storage(e.to_string()))?;
        let db = Self { conn };
        db.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            migrations::run_migrations(conn)
        })
        .await?;
        debug!("in-memory database opened");
        Ok(db)
    }

    /// Raw access to the underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Run `f` on the writer thread.
    pub async fn call<T, F>(&self, f: F) -> Result<T, LaikaError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<T, LaikaError> + Send + 'static,
        T: Send + 'static,
    {
        self.conn.call(f).await.map_err(map_tr_err)
    }

    /// Run `f` inside one transaction. Any error rolls everything back.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T, LaikaError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, LaikaError> + Send + 'static,
        T: Send + 'static,
    {
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
        .await
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), LaikaError> {
        self.call(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
            Ok(())
        })
        .await?;
        self.conn
            .close()
            .await
            .map_err(|e| LaikaError::storage(e.to_string()))
    }
}

/// Unwrap the error a closure returned, or describe the connection failure.
pub fn map_tr_err(e: tokio_rusqlite::Error<LaikaError>) -> LaikaError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        tokio_rusqlite::Error::ConnectionClosed => LaikaError::storage("database connection closed"),
        _ => LaikaError::storage("database connection failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_runs_migrations_and_enables_foreign_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("laika.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let (tables, fk): (i64, i64) = db
            .call(|conn| {
                let tables = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('alerts', 'alert_references', 'laika_objects', 'queue')",
                    [],
                    |row| row.get(0),
                )?;
                let fk = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
                Ok((tables, fk))
            })
            .await
            .unwrap();
        assert_eq!(tables, 4);
        assert_eq!(fk, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().await.unwrap();
        let result: Result<(), LaikaError> = db
            .transaction(|tx| {
                tx.execute(
                    "INSERT INTO organizations (id, name, created_at) VALUES ('o1', 'Acme', '2026-01-01T00:00:00.000Z')",
                    [],
                )?;
                Err(LaikaError::Service("boom".into()))
            })
            .await;
        assert!(result.is_err());

        let count: i64 = db
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM organizations", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("laika.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }
}
