use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::{
    db::init_db,
    error::{Result, StoreError},
};

/// Minimal durable key-value contract the task list is persisted through.
pub trait KvStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&mut self, key: &str, value: &str) -> Result<()>;

    /// Read-modify-write `key` atomically with respect to every other writer
    /// of the same backend, other processes included.
    ///
    /// `f` receives the stored value and returns the value to write, or
    /// `None` to leave the entry untouched. An error from `f` aborts the
    /// whole operation without writing.
    fn transact(
        &mut self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()>;
}

/// SQLite-backed store: one row per key in the `kv` table.
pub struct SqliteKv {
    conn: Connection,
}

impl SqliteKv {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn })
    }

    /// Open (or create) the database file at `path`.
    ///
    /// Several processes may hold the same file open; writers wait up to
    /// [`BUSY_TIMEOUT`] for each other's transactions.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::new(conn)
    }
}

/// How long a write waits for another connection's transaction to finish.
pub const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

fn upsert(conn: &Connection, key: &str, value: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                        updated_at = excluded.updated_at",
        rusqlite::params![key, value, now],
    )?;
    debug!(key, bytes = value.len(), "kv put");
    Ok(())
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        upsert(&self.conn, key, value)
    }

    fn transact(
        &mut self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        // IMMEDIATE takes the write lock up front, so no other process can
        // write between our read and our write.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: Option<String> = tx
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        if let Some(next) = f(current)? {
            upsert(&tx, key, &next)?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// In-process store. Clones share the same entries, so a caller can keep a
/// handle after moving one into a [`crate::TaskStore`].
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, e.g. a corrupt document.
    pub fn with_entry(self, key: &str, value: &str) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Make every subsequent `put` fail until switched back off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.raw(key))
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        self.transact(key, &mut |_: Option<String>| -> Result<Option<String>> {
            Ok(Some(value.to_string()))
        })
    }

    fn transact(
        &mut self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = f(entries.get(key).cloned())? {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("writes disabled".to_string()));
            }
            entries.insert(key.to_string(), next);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_put_then_get_overwrites() {
        let mut kv = SqliteKv::new(Connection::open_in_memory().unwrap()).unwrap();
        assert_eq!(kv.get("k").unwrap(), None);

        kv.put("k", "one").unwrap();
        kv.put("k", "two").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn sqlite_file_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("zenflow.db");
        let path = path.to_str().unwrap();

        SqliteKv::open(path).unwrap().put("k", "v").unwrap();
        let reopened = SqliteKv::open(path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn sqlite_transact_sees_other_connections_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("zenflow.db");
        let path = path.to_str().unwrap();
        let mut first = SqliteKv::open(path).unwrap();
        let mut second = SqliteKv::open(path).unwrap();

        first.put("k", "a").unwrap();
        second
            .transact("k", &mut |current: Option<String>| -> Result<Option<String>> {
                assert_eq!(current.as_deref(), Some("a"));
                Ok(Some(format!("{}b", current.unwrap_or_default())))
            })
            .unwrap();
        assert_eq!(first.get("k").unwrap().as_deref(), Some("ab"));
    }

    #[test]
    fn sqlite_transact_error_rolls_back() {
        let mut kv = SqliteKv::new(Connection::open_in_memory().unwrap()).unwrap();
        kv.put("k", "kept").unwrap();

        let result = kv.transact("k", &mut |_: Option<String>| -> Result<Option<String>> {
            Err(StoreError::Unavailable("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("kept"));

        // Returning None leaves the entry alone.
        kv.transact("k", &mut |_: Option<String>| -> Result<Option<String>> { Ok(None) })
            .unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn memory_clones_share_entries() {
        let kv = MemoryKv::new();
        let mut writer = kv.clone();
        writer.put("k", "v").unwrap();
        assert_eq!(kv.raw("k").as_deref(), Some("v"));
    }

    #[test]
    fn memory_write_failure_is_reported() {
        let mut kv = MemoryKv::new();
        kv.set_fail_writes(true);
        assert!(matches!(kv.put("k", "v"), Err(StoreError::Unavailable(_))));
        assert_eq!(kv.raw("k"), None);
    }
}
