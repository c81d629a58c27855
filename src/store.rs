// src/store.rs
//! Durable cursor storage. A flat key-value table in sqlite; `set` buffers in
//! memory and `flush` commits everything pending in one transaction, so a
//! batch is only considered delivered once its cursor write hit disk.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

pub struct StateStore {
    conn: Mutex<Connection>,
    pending: Mutex<HashMap<String, String>>,
}

impl StateStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).context("opening state db")?;
        Self::bootstrap(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory state db")?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cursors (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("creating cursors table")?;
        Ok(Self {
            conn: Mutex::new(conn),
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Read a value. Pending (unflushed) writes shadow the committed table so
    /// a poller always sees its own proposals within a cycle.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(v) = self
            .pending
            .lock()
            .expect("state store lock poisoned")
            .get(key)
        {
            return Ok(Some(v.clone()));
        }
        let conn = self.conn.lock().expect("state store lock poisoned");
        let value = conn
            .query_row(
                "SELECT value FROM cursors WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("reading cursor")?;
        Ok(value)
    }

    /// Buffer a write. Nothing is durable until `flush`.
    pub fn set(&self, key: &str, value: &str) {
        self.pending
            .lock()
            .expect("state store lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    /// Commit all buffered writes in one transaction. After this returns,
    /// a restart will not re-deliver the batches those cursors cover.
    pub fn flush(&self) -> Result<()> {
        let drained: Vec<(String, String)> = {
            let mut pending = self.pending.lock().expect("state store lock poisoned");
            pending.drain().collect()
        };
        if drained.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().expect("state store lock poisoned");
        let tx = conn.transaction().context("opening flush transaction")?;
        for (key, value) in &drained {
            tx.execute(
                "INSERT INTO cursors (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .context("writing cursor")?;
        }
        tx.commit().context("committing flush")?;
        Ok(())
    }
}
