//! SQLite persistence for settings and the durable inbox queue.
//!
//! One `Connection` guarded by a mutex is the single writer of this process.
//! Other processes (CLI one-shot commands) serialize on SQLite's own lock via
//! the busy timeout.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::application::errors::StorageError;
use crate::domain::entities::{MessageId, PendingEvent, QueuedEvent, StatusUpdate};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const KIND_MESSAGE: &str = "message";
const KIND_STATUS: &str = "status";

pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self, StorageError> {
        let db = Self {
            conn: Mutex::new(conn),
            path,
        };
        db.init_tables()?;
        Ok(db)
    }

    fn init_tables(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                keyname TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS pending_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                msg_id INTEGER NOT NULL,
                serial INTEGER NOT NULL DEFAULT 0,
                payload TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (kind, msg_id, serial)
            )",
            [],
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    /// File backing this database, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // Settings

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE keyname = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Store `value` under `key`, or delete the key when `value` is `None`.
    /// Returns the value stored before.
    pub fn replace_setting(
        &self,
        key: &str,
        value: Option<&str>,
    ) -> Result<Option<String>, StorageError> {
        self.update_setting(key, |_| value.map(str::to_string))
    }

    /// Read-modify-write of one setting inside an immediate transaction, so
    /// no other connection can write between the read and the write.
    /// `update` gets the current value and returns the new one (`None`
    /// deletes). Returns the value stored before.
    pub fn update_setting<F>(&self, key: &str, update: F) -> Result<Option<String>, StorageError>
    where
        F: FnOnce(Option<&str>) -> Option<String>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let old: Option<String> = tx
            .query_row(
                "SELECT value FROM settings WHERE keyname = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        match update(old.as_deref()) {
            Some(value) => {
                tx.execute(
                    "INSERT INTO settings (keyname, value) VALUES (?1, ?2)
                     ON CONFLICT(keyname) DO UPDATE SET value = excluded.value",
                    params![key, value],
                )?;
            }
            None => {
                tx.execute("DELETE FROM settings WHERE keyname = ?1", [key])?;
            }
        }

        tx.commit()?;
        Ok(old)
    }

    /// All `(qualified key, value)` pairs in insertion order.
    pub fn list_settings(&self) -> Result<Vec<(String, String)>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT keyname, value FROM settings ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut settings = Vec::new();
        for row in rows {
            settings.push(row?);
        }
        Ok(settings)
    }

    // Inbox queue

    /// Persist a pending event. Returns `false` if it was already queued.
    pub fn put_event(&self, event: &PendingEvent) -> Result<bool, StorageError> {
        let (kind, msg_id, serial, payload) = match event {
            PendingEvent::Message(id) => (KIND_MESSAGE, id.0, 0i64, None),
            PendingEvent::StatusUpdate(update) => (
                KIND_STATUS,
                update.msg_id.0,
                update.serial as i64,
                Some(serde_json::to_string(&update.payload)?),
            ),
        };

        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO pending_events (kind, msg_id, serial, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![kind, msg_id, serial, payload],
        )?;
        Ok(inserted > 0)
    }

    /// Queued events, oldest first.
    pub fn pending_events(&self) -> Result<Vec<QueuedEvent>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, msg_id, serial, payload FROM pending_events ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, kind, msg_id, serial, payload) = row?;
            let event = if kind == KIND_STATUS {
                let payload = match payload {
                    Some(raw) => serde_json::from_str(&raw)?,
                    None => serde_json::Value::Null,
                };
                PendingEvent::StatusUpdate(StatusUpdate {
                    msg_id: MessageId(msg_id),
                    serial: serial as u64,
                    payload,
                })
            } else {
                PendingEvent::Message(MessageId(msg_id))
            };
            events.push(QueuedEvent { id, event });
        }
        Ok(events)
    }

    pub fn pop_event(&self, id: i64) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM pending_events WHERE id = ?1", [id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_twice() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.replace_setting("global/hello", Some("world")).unwrap(), None);
        assert_eq!(db.get_setting("global/hello").unwrap().as_deref(), Some("world"));
        assert_eq!(
            db.replace_setting("global/hello", Some("world")).unwrap().as_deref(),
            Some("world")
        );
        assert_eq!(db.get_setting("global/hello").unwrap().as_deref(), Some("world"));
    }

    #[test]
    fn test_delete_returns_previous() {
        let db = Database::open_in_memory().unwrap();
        db.replace_setting("global/k", Some("v")).unwrap();
        assert_eq!(db.replace_setting("global/k", None).unwrap().as_deref(), Some("v"));
        assert_eq!(db.get_setting("global/k").unwrap(), None);
        assert_eq!(db.replace_setting("global/k", None).unwrap(), None);
    }

    #[test]
    fn test_update_setting_sees_current_value() {
        let db = Database::open_in_memory().unwrap();
        let old = db
            .update_setting("global/n", |v| {
                assert_eq!(v, None);
                Some("1".to_string())
            })
            .unwrap();
        assert_eq!(old, None);
        db.update_setting("global/n", |v| v.map(|v| format!("{}2", v)))
            .unwrap();
        assert_eq!(db.get_setting("global/n").unwrap().as_deref(), Some("12"));
        db.update_setting("global/n", |_| None).unwrap();
        assert_eq!(db.get_setting("global/n").unwrap(), None);
    }

    #[test]
    fn test_concurrent_updates_from_two_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");
        Database::new(&path).unwrap();

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let db = Database::new(&path).unwrap();
                    for _ in 0..25 {
                        db.update_setting("global/counter", |v| {
                            let n: u32 = v.and_then(|v| v.parse().ok()).unwrap_or(0);
                            Some((n + 1).to_string())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let db = Database::new(&path).unwrap();
        assert_eq!(db.get_setting("global/counter").unwrap().as_deref(), Some("50"));
    }

    #[test]
    fn test_list_in_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        db.replace_setting("global/hello", Some("world")).unwrap();
        db.replace_setting("other/hello", Some("xxx")).unwrap();
        db.replace_setting("global/hello", Some("again")).unwrap();

        let all = db.list_settings().unwrap();
        assert_eq!(
            all,
            vec![
                ("global/hello".to_string(), "again".to_string()),
                ("other/hello".to_string(), "xxx".to_string()),
            ]
        );
    }

    #[test]
    fn test_queue_fifo_and_dedup() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.put_event(&PendingEvent::Message(MessageId(7))).unwrap());
        assert!(!db.put_event(&PendingEvent::Message(MessageId(7))).unwrap());
        let update = StatusUpdate {
            msg_id: MessageId(7),
            serial: 3,
            payload: json!({"score": 10}),
        };
        assert!(db.put_event(&PendingEvent::StatusUpdate(update.clone())).unwrap());
        assert!(db.put_event(&PendingEvent::Message(MessageId(2))).unwrap());

        let pending = db.pending_events().unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].event, PendingEvent::Message(MessageId(7)));
        assert_eq!(pending[1].event, PendingEvent::StatusUpdate(update));
        assert_eq!(pending[2].event, PendingEvent::Message(MessageId(2)));

        db.pop_event(pending[0].id).unwrap();
        let pending = db.pending_events().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].event.msg_id(), MessageId(7));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("bot.db");
        {
            let db = Database::new(&path).unwrap();
            db.replace_setting("global/admins", Some("a@example.org")).unwrap();
            db.put_event(&PendingEvent::Message(MessageId(42))).unwrap();
        }
        let db = Database::new(&path).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        assert_eq!(
            db.get_setting("global/admins").unwrap().as_deref(),
            Some("a@example.org")
        );
        let pending = db.pending_events().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event, PendingEvent::Message(MessageId(42)));
    }
}
