// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use byok_config::model::StorageConfig;
use byok_core::ByokError;
use tracing::{debug, info};

use crate::migrations;

/// Handle to the vault database: one tokio-rusqlite connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run
    /// pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, ByokError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(ByokError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(ByokError::storage)?;
        let db = Self { conn };
        db.initialize(wal_mode).await?;
        info!(path, wal_mode, "vault database opened");
        Ok(db)
    }

    /// Open using `[storage]` settings.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, ByokError> {
        Self::open(&config.database_path, config.wal_mode).await
    }

    /// Private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, ByokError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(ByokError::storage)?;
        let db = Self { conn };
        db.initialize(false).await?;
        Ok(db)
    }

    async fn initialize(&self, wal_mode: bool) -> Result<(), ByokError> {
        self.conn
            .call(move |conn| -> Result<(), ByokError> {
                if wal_mode {
                    conn.pragma_update(None, "journal_mode", "WAL")
                        .map_err(ByokError::storage)?;
                }
                conn.execute_batch(
                    "PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;",
                )
                .map_err(ByokError::storage)?;
                migrations::run_migrations(conn)
            })
            .await
            .map_err(map_call_err)?;
        debug!("migrations applied");
        Ok(())
    }

    /// The underlying connection. Query modules go through `call()`.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the main file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), ByokError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// Map a plain SQL failure from `call()`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ByokError {
    ByokError::storage(e)
}

/// Unwrap a domain error raised inside `call()`; wrap connection failures.
pub(crate) fn map_call_err(e: tokio_rusqlite::Error<ByokError>) -> ByokError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => ByokError::Storage {
            source: other.to_string().into(),
        },
    }
}

/// Shorthand for wrapping rusqlite errors inside domain closures.
pub(crate) fn sql(e: rusqlite::Error) -> ByokError {
    ByokError::storage(e)
}

/// True for UNIQUE / PRIMARY KEY constraint violations.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && matches!(
                    err.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
    )
}
