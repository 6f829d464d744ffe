//! SQLite-backed content store.
//!
//! Runtime defaults match the rest of the workspace:
//! - `journal_mode = WAL` so readers do not block the importer
//! - `busy_timeout = 5s` to ride out transient lock contention

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::{Connection, Row, params, params_from_iter, types::Type};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{ContentStore, DocumentRecord};

/// Busy timeout used for content store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 1;

/// Upper bound on bound parameters per `IN (...)` batch.
const LOOKUP_CHUNK: usize = 500;

const MIGRATION_V1_SQL: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id             INTEGER PRIMARY KEY,
    url            TEXT UNIQUE,
    title          TEXT,
    summary        TEXT,
    source_name    TEXT,
    subsource_name TEXT,
    content_hash   TEXT
);
CREATE INDEX IF NOT EXISTS idx_documents_url ON documents(url);
";

const MIGRATIONS: &[(u32, &str)] = &[(1, MIGRATION_V1_SQL)];

const SELECT_COLUMNS: &str =
    "SELECT id, url, title, summary, source_name, subsource_name, content_hash FROM documents";

/// Content store over a local SQLite database.
pub struct SqliteContentStore {
    conn: Mutex<Connection>,
}

impl SqliteContentStore {
    /// Open (or create) the store at `path`, apply pragmas, and migrate.
    ///
    /// # Errors
    ///
    /// Returns an error if opening, configuring or migrating the database fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create content store directory {}", parent.display()))?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("open content store {}", path.display()))?;
        configure_connection(&conn).context("configure sqlite pragmas")?;
        migrate(&mut conn).context("apply content store migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a throwaway in-memory store (tests, dry runs).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("open in-memory content store")?;
        migrate(&mut conn).context("apply content store migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or replace a record. A missing `content_hash` is computed from
    /// the title and summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is not an integer or the write fails.
    pub fn upsert(&self, record: &DocumentRecord) -> Result<()> {
        let id: i64 = record
            .id
            .trim()
            .parse()
            .with_context(|| format!("document id '{}' is not an integer", record.id))?;
        let hash = record
            .content_hash
            .clone()
            .unwrap_or_else(|| content_hash_hex(record));

        self.lock()?
            .execute(
                "INSERT INTO documents (id, url, title, summary, source_name, subsource_name, content_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    url = excluded.url,
                    title = excluded.title,
                    summary = excluded.summary,
                    source_name = excluded.source_name,
                    subsource_name = excluded.subsource_name,
                    content_hash = excluded.content_hash",
                params![
                    id,
                    record.url,
                    record.title,
                    record.summary,
                    record.source_name,
                    record.subsource_name,
                    hash
                ],
            )
            .with_context(|| format!("upsert document {id}"))?;
        Ok(())
    }

    /// Number of stored documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .context("count documents")?;
        u64::try_from(count).context("negative document count")
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("content store connection lock poisoned"))
    }
}

impl ContentStore for SqliteContentStore {
    fn lookup_by_ids(&self, ids: &BTreeSet<String>) -> Result<Vec<DocumentRecord>> {
        let keys: Vec<i64> = ids
            .iter()
            .filter_map(|id| match id.parse::<i64>() {
                Ok(int) => Some(int),
                Err(_) => {
                    debug!(id = %id, "skipping non-integer id in store lookup");
                    None
                }
            })
            .collect();

        let conn = self.lock()?;
        let mut out = Vec::new();
        for chunk in keys.chunks(LOOKUP_CHUNK) {
            out.extend(select_in(&conn, "id", chunk)?);
        }
        Ok(out)
    }

    fn lookup_by_urls(&self, urls: &BTreeSet<String>) -> Result<Vec<DocumentRecord>> {
        let keys: Vec<&str> = urls.iter().map(String::as_str).collect();

        let conn = self.lock()?;
        let mut out = Vec::new();
        for chunk in keys.chunks(LOOKUP_CHUNK) {
            out.extend(select_in(&conn, "url", chunk)?);
        }
        Ok(out)
    }
}

fn select_in<T: rusqlite::ToSql>(
    conn: &Connection,
    column: &str,
    keys: &[T],
) -> Result<Vec<DocumentRecord>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; keys.len()].join(", ");
    let sql = format!("{SELECT_COLUMNS} WHERE {column} IN ({placeholders}) ORDER BY id");
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare document lookup by {column}"))?;
    let rows = stmt
        .query_map(params_from_iter(keys.iter()), read_record)
        .with_context(|| format!("execute document lookup by {column}"))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("read documents by {column}"))
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get::<_, i64>(0)?.to_string(),
        url: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        source_name: row.get(4)?,
        subsource_name: row.get(5)?,
        content_hash: row.get(6)?,
    })
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Read `PRAGMA user_version` as a `u32`.
fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply all pending migrations in ascending order.
fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.commit()?;
        current = *version;
    }

    if current > LATEST_SCHEMA_VERSION {
        debug!(current, "content store schema is newer than this binary");
    }

    Ok(current)
}

fn content_hash_hex(record: &DocumentRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.title.as_deref().unwrap_or_default().as_bytes());
    hasher.update(b"\n");
    hasher.update(record.summary.as_deref().unwrap_or_default().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Parse a JSON array of records and upsert each one. Returns the count written.
///
/// # Errors
///
/// Returns an error on malformed JSON or the first failed write.
pub fn import_json(store: &SqliteContentStore, json: &str) -> Result<usize> {
    let records: Vec<DocumentRecord> =
        serde_json::from_str(json).context("parse document records")?;
    if records.iter().any(|r| r.id.trim().is_empty()) {
        bail!("every document record needs an id");
    }
    for record in &records {
        store.upsert(record)?;
    }
    Ok(records.len())
}
