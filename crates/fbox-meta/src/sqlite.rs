//! SQLite-backed metadata store.
//!
//! One connection guarded by a mutex. Every write runs in an `IMMEDIATE`
//! transaction, which takes the database write lock up front, so a ref
//! compare-and-swap cannot interleave with another writer even across
//! processes sharing the file.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use fbox_types::{BlobHash, BoxId, BoxRecord, Commit, CommitId, Entry, NewBox, NewCommit};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::error::{MetaError, MetaResult};
use crate::names::validate_branch_name;
use crate::traits::MetadataStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS boxes (
    id TEXT PRIMARY KEY,
    namespace_id TEXT NOT NULL,
    name TEXT NOT NULL,
    visibility TEXT NOT NULL,
    default_branch TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(namespace_id, name)
);
CREATE TABLE IF NOT EXISTS commits (
    id TEXT PRIMARY KEY,
    box_id TEXT NOT NULL REFERENCES boxes(id),
    branch TEXT NOT NULL,
    parent_id TEXT,
    message TEXT NOT NULL,
    author TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS entries (
    commit_id TEXT NOT NULL REFERENCES commits(id),
    path TEXT NOT NULL,
    sha256 TEXT NOT NULL,
    size INTEGER NOT NULL,
    mode INTEGER NOT NULL,
    PRIMARY KEY(commit_id, path)
);
CREATE TABLE IF NOT EXISTS refs (
    box_id TEXT NOT NULL REFERENCES boxes(id),
    branch TEXT NOT NULL,
    commit_id TEXT NOT NULL REFERENCES commits(id),
    PRIMARY KEY(box_id, branch)
);
CREATE INDEX IF NOT EXISTS commits_by_box ON commits(box_id, branch);
"#;

const BOX_COLUMNS: &str = "id, namespace_id, name, visibility, default_branch, created_at, updated_at";

/// Persistent [`MetadataStore`] on a single SQLite database file.
#[derive(Debug)]
pub struct SqliteMetaStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteMetaStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// The parent directory must already exist.
    pub fn open(path: impl AsRef<Path>) -> MetaResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self::init(conn, Some(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), "opened metadata database");
        Ok(store)
    }

    /// A private database that lives as long as the store.
    pub fn open_in_memory() -> MetaResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> MetaResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file path, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MetaResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| MetaError::LockPoisoned(e.to_string()))
    }

    /// Run `f` inside an `IMMEDIATE` transaction, committing on success.
    fn write_tx<T>(&self, f: impl FnOnce(&Transaction<'_>) -> MetaResult<T>) -> MetaResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

fn encode_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(raw: &str) -> MetaResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| MetaError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

fn box_exists(conn: &Connection, id: &BoxId) -> MetaResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM boxes WHERE id = ?1", params![id.as_str()], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn commit_exists(conn: &Connection, id: &CommitId) -> MetaResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM commits WHERE id = ?1", params![id.as_str()], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn commit_in_box(conn: &Connection, id: &CommitId, box_id: &BoxId) -> MetaResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM commits WHERE id = ?1 AND box_id = ?2",
            params![id.as_str(), box_id.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn current_ref(conn: &Connection, box_id: &BoxId, branch: &str) -> MetaResult<Option<CommitId>> {
    let head: Option<String> = conn
        .query_row(
            "SELECT commit_id FROM refs WHERE box_id = ?1 AND branch = ?2",
            params![box_id.as_str(), branch],
            |row| row.get(0),
        )
        .optional()?;
    Ok(head.map(CommitId::from))
}

/// Raw column values of one `boxes` row.
struct BoxRow {
    id: String,
    namespace_id: String,
    name: String,
    visibility: String,
    default_branch: String,
    created_at: String,
    updated_at: String,
}

impl BoxRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            namespace_id: row.get(1)?,
            name: row.get(2)?,
            visibility: row.get(3)?,
            default_branch: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_record(self) -> MetaResult<BoxRecord> {
        Ok(BoxRecord {
            id: BoxId::from(self.id),
            namespace_id: self.namespace_id,
            name: self.name,
            visibility: self.visibility.parse()?,
            default_branch: self.default_branch,
            created_at: decode_time(&self.created_at)?,
            updated_at: decode_time(&self.updated_at)?,
        })
    }
}

fn load_entries(conn: &Connection, commit_id: &str) -> MetaResult<Vec<Entry>> {
    let mut stmt = conn.prepare(
        "SELECT path, sha256, size, mode FROM entries WHERE commit_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![commit_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (path, sha256, size, mode) = row?;
        let size = u64::try_from(size)
            .map_err(|_| MetaError::Corrupt(format!("negative size for {path:?}")))?;
        let mode = u32::try_from(mode)
            .map_err(|_| MetaError::Corrupt(format!("bad mode {mode} for {path:?}")))?;
        entries.push(Entry {
            sha256: BlobHash::parse(&sha256)?,
            path,
            size,
            mode,
        });
    }
    Ok(entries)
}

impl MetadataStore for SqliteMetaStore {
    fn create_box(&self, new_box: NewBox) -> MetaResult<BoxRecord> {
        let record = new_box.into_record(Utc::now())?;
        validate_branch_name(&record.default_branch)?;

        self.write_tx(|tx| {
            let taken = tx
                .query_row(
                    "SELECT 1 FROM boxes WHERE (namespace_id = ?1 AND name = ?2) OR id = ?3",
                    params![record.namespace_id, record.name, record.id.as_str()],
                    |_| Ok(()),
                )
                .optional()?;
            if taken.is_some() {
                return Err(MetaError::BoxExists {
                    namespace: record.namespace_id.clone(),
                    name: record.name.clone(),
                });
            }
            tx.execute(
                &format!("INSERT INTO boxes ({BOX_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    record.id.as_str(),
                    record.namespace_id,
                    record.name,
                    record.visibility.as_str(),
                    record.default_branch,
                    encode_time(&record.created_at),
                    encode_time(&record.updated_at),
                ],
            )?;
            Ok(())
        })?;
        tracing::debug!(box_id = %record.id, name = %record.name, "box created");
        Ok(record)
    }

    fn get_box(&self, namespace: &str, name: &str) -> MetaResult<Option<BoxRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {BOX_COLUMNS} FROM boxes WHERE namespace_id = ?1 AND name = ?2"),
                params![namespace, name],
                BoxRow::from_row,
            )
            .optional()?;
        row.map(BoxRow::into_record).transpose()
    }

    fn list_public_boxes(&self) -> MetaResult<Vec<BoxRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BOX_COLUMNS} FROM boxes WHERE visibility = 'public' ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], BoxRow::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_record()?);
        }
        Ok(out)
    }

    fn save_commit(&self, commit: NewCommit) -> MetaResult<Commit> {
        validate_branch_name(&commit.branch)?;
        let commit = commit.into_commit(Utc::now())?;

        // Reject sizes that do not fit the INTEGER column before opening a
        // transaction.
        let mut sizes = Vec::with_capacity(commit.entries.len());
        for entry in &commit.entries {
            let size = i64::try_from(entry.size).map_err(|_| {
                MetaError::Corrupt(format!("size {} of {:?} is too large", entry.size, entry.path))
            })?;
            sizes.push(size);
        }

        self.write_tx(|tx| {
            if !box_exists(tx, &commit.box_id)? {
                return Err(MetaError::BoxNotFound(commit.box_id.clone()));
            }
            if commit_exists(tx, &commit.id)? {
                return Err(MetaError::CommitExists(commit.id.clone()));
            }
            tx.execute(
                "INSERT INTO commits (id, box_id, branch, parent_id, message, author, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    commit.id.as_str(),
                    commit.box_id.as_str(),
                    commit.branch,
                    commit.parent_id.as_ref().map(CommitId::as_str),
                    commit.message,
                    commit.author,
                    encode_time(&commit.timestamp),
                ],
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO entries (commit_id, path, sha256, size, mode)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (entry, size) in commit.entries.iter().zip(&sizes) {
                insert.execute(params![
                    commit.id.as_str(),
                    entry.path,
                    entry.sha256.as_str(),
                    size,
                    i64::from(entry.mode),
                ])?;
            }
            Ok(())
        })?;
        tracing::debug!(
            commit = %commit.id,
            branch = %commit.branch,
            entries = commit.entries.len(),
            "commit saved"
        );
        Ok(commit)
    }

    fn get_commit(&self, id: &CommitId) -> MetaResult<Option<Commit>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT box_id, branch, parent_id, message, author, timestamp
                 FROM commits WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;
        let Some((box_id, branch, parent_id, message, author, timestamp)) = row else {
            return Ok(None);
        };

        Ok(Some(Commit {
            id: id.clone(),
            box_id: BoxId::from(box_id),
            branch,
            parent_id: parent_id.map(CommitId::from),
            message,
            author,
            timestamp: decode_time(&timestamp)?,
            entries: load_entries(&conn, id.as_str())?,
        }))
    }

    fn read_ref(&self, box_id: &BoxId, branch: &str) -> MetaResult<Option<CommitId>> {
        let conn = self.lock()?;
        current_ref(&conn, box_id, branch)
    }

    fn move_ref(
        &self,
        box_id: &BoxId,
        branch: &str,
        expected_parent: Option<&CommitId>,
        new_commit: &CommitId,
    ) -> MetaResult<()> {
        validate_branch_name(branch)?;

        self.write_tx(|tx| {
            if !box_exists(tx, box_id)? {
                return Err(MetaError::BoxNotFound(box_id.clone()));
            }
            if !commit_in_box(tx, new_commit, box_id)? {
                return Err(MetaError::CommitNotFound(new_commit.clone()));
            }

            let current = current_ref(tx, box_id, branch)?;
            let conflict = || MetaError::Conflict {
                box_id: box_id.clone(),
                branch: branch.to_string(),
                expected: expected_parent.cloned(),
                current: current.clone(),
            };

            let changed = match (current.as_ref(), expected_parent) {
                (None, None) => tx.execute(
                    "INSERT INTO refs (box_id, branch, commit_id) VALUES (?1, ?2, ?3)",
                    params![box_id.as_str(), branch, new_commit.as_str()],
                )?,
                (Some(_), Some(expected)) => tx.execute(
                    "UPDATE refs SET commit_id = ?1
                     WHERE box_id = ?2 AND branch = ?3 AND commit_id = ?4",
                    params![new_commit.as_str(), box_id.as_str(), branch, expected.as_str()],
                )?,
                _ => return Err(conflict()),
            };
            if changed != 1 {
                return Err(conflict());
            }
            Ok(())
        })
    }
}
