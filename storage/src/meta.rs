//! Metadata repository: the flat keyed tables behind the logical namespace.

use std::str::FromStr;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::paths;

/// Directory marker sentinel for `size_bytes`.
pub(crate) const DIR_SIZE: i64 = -1;

/// The one migration bundle. Applied idempotently at startup; both tables
/// are defined here and nowhere else.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    dirname    TEXT    NOT NULL,
    basename   TEXT    NOT NULL,
    size_bytes INTEGER NOT NULL,
    mtime      TEXT    NOT NULL,
    content    BLOB,
    location   TEXT,
    PRIMARY KEY (dirname, basename)
);
CREATE TABLE IF NOT EXISTS segments (
    location   TEXT    NOT NULL,
    number     INTEGER NOT NULL,
    size_bytes INTEGER NOT NULL,
    hash       TEXT    NOT NULL,
    PRIMARY KEY (location, number)
);
"#;

/// A row of the `files` table: one node of the logical namespace, keyed by
/// (dirname, basename).
///
/// Exactly one of {zero size, inline content, external location} describes
/// how the bytes are materialized. A negative size marks a directory.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FileRecord {
    /// Directory part of the key.
    pub dirname: String,

    /// Base-name part of the key.
    pub basename: String,

    /// Content length; [`DIR_SIZE`] for directories.
    pub size_bytes: i64,

    /// Last-modified timestamp.
    pub mtime: DateTime<Utc>,

    /// Inline content, for small files.
    pub content: Option<Vec<u8>>,

    /// External-location token, for large files.
    pub location: Option<String>,
}

impl FileRecord {
    /// The full logical path of this record.
    pub fn path(&self) -> Utf8PathBuf {
        paths::join(&self.dirname, &self.basename)
    }

    /// Whether this record is a directory marker.
    pub fn is_dir(&self) -> bool {
        self.size_bytes < 0
    }
}

/// A row of the `segments` table: one numbered chunk of an externally
/// tiered object, keyed by (location, number).
///
/// Numbers are contiguous and ascending from 1; the segments of a location,
/// concatenated in order, reconstitute the full content.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SegmentRecord {
    /// External-location token grouping the segments of one object.
    pub location: String,

    /// Sequence number, starting at 1.
    pub number: i64,

    /// Segment size in bytes.
    pub size_bytes: i64,

    /// Content hash reported by the object store on upload.
    pub hash: String,
}

/// Versioned relational storage for [`FileRecord`]s and [`SegmentRecord`]s.
///
/// The pool is capped at a single connection: SQLite permits only limited
/// write concurrency, and one connection avoids persistent "database is
/// locked" failures under concurrent driver use.
#[derive(Debug, Clone)]
pub struct MetaStore {
    pool: Pool<Sqlite>,
}

impl MetaStore {
    /// Open (creating if missing) the database at `url` and apply the
    /// schema.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        Self::with_options(opts).await
    }

    /// Open a private in-memory database. Used by tests and throwaway
    /// deployments.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::with_options(SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    async fn with_options(opts: SqliteConnectOptions) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the schema bundle. Idempotent.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Look up the record at a logical path.
    pub async fn get(&self, path: &Utf8Path) -> Result<Option<FileRecord>, sqlx::Error> {
        let (dirname, basename) = paths::split(path);
        sqlx::query_as::<_, FileRecord>(
            "SELECT dirname, basename, size_bytes, mtime, content, location
             FROM files WHERE dirname = ? AND basename = ?",
        )
        .bind(dirname.as_str())
        .bind(basename)
        .fetch_optional(&self.pool)
        .await
    }

    /// Insert or overwrite the record at its (dirname, basename) key.
    pub async fn upsert(&self, record: &FileRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO files (dirname, basename, size_bytes, mtime, content, location)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (dirname, basename) DO UPDATE SET
                 size_bytes = excluded.size_bytes,
                 mtime = excluded.mtime,
                 content = excluded.content,
                 location = excluded.location",
        )
        .bind(&record.dirname)
        .bind(&record.basename)
        .bind(record.size_bytes)
        .bind(record.mtime)
        .bind(&record.content)
        .bind(&record.location)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a directory marker, leaving any pre-existing record at the
    /// same key untouched.
    pub async fn insert_dir_marker(
        &self,
        dirname: &str,
        basename: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO files (dirname, basename, size_bytes, mtime, content, location)
             VALUES (?, ?, ?, ?, NULL, NULL)
             ON CONFLICT (dirname, basename) DO NOTHING",
        )
        .bind(dirname)
        .bind(basename)
        .bind(DIR_SIZE)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update a single record's key in place.
    pub async fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> Result<(), sqlx::Error> {
        let (from_dir, from_base) = paths::split(from);
        let (to_dir, to_base) = paths::split(to);
        sqlx::query("UPDATE files SET dirname = ?, basename = ? WHERE dirname = ? AND basename = ?")
            .bind(to_dir.as_str())
            .bind(to_base)
            .bind(from_dir.as_str())
            .bind(from_base)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a single record by key.
    pub async fn remove(&self, dirname: &str, basename: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM files WHERE dirname = ? AND basename = ?")
            .bind(dirname)
            .bind(basename)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The records whose dirname equals `path` exactly. One level only.
    pub async fn children(&self, path: &Utf8Path) -> Result<Vec<FileRecord>, sqlx::Error> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT dirname, basename, size_bytes, mtime, content, location
             FROM files WHERE dirname = ?",
        )
        .bind(path.as_str())
        .fetch_all(&self.pool)
        .await
    }

    /// The base-names of the records whose dirname equals `path` exactly.
    pub async fn child_names(&self, path: &Utf8Path) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT basename FROM files WHERE dirname = ?")
            .bind(path.as_str())
            .fetch_all(&self.pool)
            .await
    }

    /// The segments recorded for a location, ascending by number.
    pub async fn segments(&self, location: &str) -> Result<Vec<SegmentRecord>, sqlx::Error> {
        sqlx::query_as::<_, SegmentRecord>(
            "SELECT location, number, size_bytes, hash
             FROM segments WHERE location = ? ORDER BY number",
        )
        .bind(location)
        .fetch_all(&self.pool)
        .await
    }

    /// Record one uploaded segment.
    pub async fn insert_segment(&self, segment: &SegmentRecord) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO segments (location, number, size_bytes, hash) VALUES (?, ?, ?, ?)")
            .bind(&segment.location)
            .bind(segment.number)
            .bind(segment.size_bytes)
            .bind(&segment.hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
