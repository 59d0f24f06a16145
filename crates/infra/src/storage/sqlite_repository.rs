//! Credential table in a local SQLite file
//!
//! Same columns as the hosted table. Timestamps are stored as RFC 3339
//! text in UTC with millisecond precision, so text order is time order.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use cleanplayer_core::CredentialRepository;
use cleanplayer_domain::{CleanPlayerError, CredentialRecord, Result as DomainResult};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::debug;

use crate::errors::InfraError;

const CREATE_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS {table} (
    spotify_user_id    TEXT PRIMARY KEY NOT NULL,
    access_token       TEXT NOT NULL,
    refresh_token      TEXT NOT NULL,
    expires_in         INTEGER NOT NULL,
    token_generated_at TEXT NOT NULL,
    updated_at         TEXT NOT NULL
)";

/// `CredentialRepository` backed by SQLite
#[derive(Clone)]
pub struct SqliteCredentialRepository {
    conn: Arc<Mutex<Connection>>,
    table: String,
}

impl std::fmt::Debug for SqliteCredentialRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCredentialRepository").field("table", &self.table).finish()
    }
}

impl SqliteCredentialRepository {
    /// Open (or create) the database file and ensure the table exists.
    ///
    /// # Errors
    /// Returns `CleanPlayerError::Config` for an invalid table name and
    /// `CleanPlayerError::Storage` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, table: &str) -> DomainResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(map_sql_error)?;
        Self::from_connection(conn, table)
    }

    /// In-memory database, dropped with the last clone.
    ///
    /// # Errors
    /// See [`SqliteCredentialRepository::open`].
    pub fn open_in_memory(table: &str) -> DomainResult<Self> {
        let conn = Connection::open_in_memory().map_err(map_sql_error)?;
        Self::from_connection(conn, table)
    }

    fn from_connection(conn: Connection, table: &str) -> DomainResult<Self> {
        validate_table_name(table)?;
        conn.busy_timeout(std::time::Duration::from_secs(5)).map_err(map_sql_error)?;
        conn.execute_batch(&CREATE_TABLE_SQL.replace("{table}", table)).map_err(map_sql_error)?;

        debug!(table, "SQLite credential store ready");
        Ok(Self { conn: Arc::new(Mutex::new(conn)), table: table.to_string() })
    }

    async fn run<T, F>(&self, op: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let table = self.table.clone();

        task::spawn_blocking(move || {
            let guard = conn.lock();
            op(&guard, &table).map_err(map_sql_error)
        })
        .await
        .map_err(|e| CleanPlayerError::Internal(format!("sqlite task failed: {e}")))?
    }
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn upsert(&self, record: &CredentialRecord) -> DomainResult<()> {
        let record = record.clone();
        debug!(table = %self.table, user_id = %record.user_id, "Upserting credential record");

        self.run(move |conn, table| {
            let now = format_timestamp(Utc::now());
            conn.execute(
                &format!(
                    "INSERT INTO {table}
                        (spotify_user_id, access_token, refresh_token, expires_in,
                         token_generated_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(spotify_user_id) DO UPDATE SET
                        access_token = excluded.access_token,
                        refresh_token = excluded.refresh_token,
                        expires_in = excluded.expires_in,
                        token_generated_at = excluded.token_generated_at,
                        updated_at = excluded.updated_at"
                ),
                params![
                    record.user_id,
                    record.access_token,
                    record.refresh_token,
                    record.lifetime_seconds,
                    format_timestamp(record.issued_at),
                    now,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, user_id: &str) -> DomainResult<Option<CredentialRecord>> {
        let user_id = user_id.to_string();

        self.run(move |conn, table| {
            conn.query_row(
                &format!(
                    "SELECT spotify_user_id, access_token, refresh_token, expires_in,
                            token_generated_at
                     FROM {table} WHERE spotify_user_id = ?1"
                ),
                params![user_id],
                map_record_row,
            )
            .optional()
        })
        .await
    }

    async fn delete(&self, user_id: &str) -> DomainResult<()> {
        let user_id = user_id.to_string();
        debug!(table = %self.table, user_id = %user_id, "Deleting credential record");

        self.run(move |conn, table| {
            conn.execute(
                &format!("DELETE FROM {table} WHERE spotify_user_id = ?1"),
                params![user_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_all(&self) -> DomainResult<Vec<CredentialRecord>> {
        self.run(|conn, table| {
            let mut stmt = conn.prepare(&format!(
                "SELECT spotify_user_id, access_token, refresh_token, expires_in,
                        token_generated_at
                 FROM {table} ORDER BY token_generated_at DESC"
            ))?;
            let records =
                stmt.query_map([], map_record_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<CredentialRecord> {
    let generated_at: String = row.get(4)?;
    let issued_at = DateTime::parse_from_rfc3339(&generated_at)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(CredentialRecord::new(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        issued_at,
        row.get::<_, i64>(3)?,
    ))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn validate_table_name(table: &str) -> DomainResult<()> {
    let valid = !table.is_empty()
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(CleanPlayerError::Config(format!("Invalid credential table name: {table}")))
    }
}

fn map_sql_error(err: rusqlite::Error) -> CleanPlayerError {
    InfraError::from(err).into()
}
