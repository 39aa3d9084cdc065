use mms_core::config::SubscriptionId;
use mms_core::error::MmsError;
use mms_core::store::{Folder, MessageLocator, MessageStore, StatusUpdate};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

const LOCATOR_SCHEME: &str = "mms://";

/// One persisted MMS row as read back from the database.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredMessage {
    pub id: i64,
    pub folder: String,
    pub thread_id: Option<i64>,
    pub group_mms: bool,
    pub response_status: Option<u8>,
    pub message_id: Option<String>,
    pub date: Option<i64>,
    pub read: bool,
    pub seen: bool,
    pub creator: Option<String>,
    pub subscription: Option<i64>,
    pub pdu: Vec<u8>,
}

/// [`MessageStore`] over a single SQLite connection.
pub struct SqliteMessageStore {
    conn: Mutex<Connection>,
}

impl SqliteMessageStore {
    pub fn in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.lock().execute_batch(
            "CREATE TABLE IF NOT EXISTS threads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_mms INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                folder TEXT NOT NULL,
                thread_id INTEGER REFERENCES threads(id),
                group_mms INTEGER NOT NULL,
                response_status INTEGER,
                message_id TEXT,
                date INTEGER,
                read INTEGER NOT NULL DEFAULT 0,
                seen INTEGER NOT NULL DEFAULT 0,
                creator TEXT,
                subscription INTEGER,
                created_at INTEGER NOT NULL,
                pdu BLOB NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_folder ON messages(folder);",
        )
    }

    pub fn insert(
        &self,
        pdu: &[u8],
        folder: Folder,
        create_thread: bool,
        group_enabled: bool,
    ) -> rusqlite::Result<i64> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let created_at = now_secs();
        let thread_id = if create_thread {
            tx.execute(
                "INSERT INTO threads (group_mms, created_at) VALUES (?1, ?2)",
                params![group_enabled, created_at],
            )?;
            Some(tx.last_insert_rowid())
        } else {
            None
        };
        tx.execute(
            "INSERT INTO messages (folder, thread_id, group_mms, created_at, pdu) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![folder.as_str(), thread_id, group_enabled, created_at, pdu],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Applies the set fields of `update`; returns whether the row exists.
    pub fn apply_update(&self, id: i64, update: &StatusUpdate) -> rusqlite::Result<bool> {
        let changed = self.lock().execute(
            "UPDATE messages SET
                folder = COALESCE(?1, folder),
                response_status = COALESCE(?2, response_status),
                message_id = COALESCE(?3, message_id),
                date = COALESCE(?4, date),
                read = COALESCE(?5, read),
                seen = COALESCE(?6, seen),
                creator = COALESCE(?7, creator),
                subscription = COALESCE(?8, subscription)
             WHERE id = ?9",
            params![
                update.message_box.map(Folder::as_str),
                update.response_status,
                update.message_id.as_deref(),
                update.date_secs,
                update.read,
                update.seen,
                update.creator.as_deref(),
                update.subscription.map(|SubscriptionId(id)| id),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn get(&self, id: i64) -> rusqlite::Result<Option<StoredMessage>> {
        self.lock()
            .query_row(
                "SELECT id, folder, thread_id, group_mms, response_status, message_id, date, read, seen, creator, subscription, pdu FROM messages WHERE id = ?1",
                params![id],
                |row| {
                    Ok(StoredMessage {
                        id: row.get(0)?,
                        folder: row.get(1)?,
                        thread_id: row.get(2)?,
                        group_mms: row.get(3)?,
                        response_status: row.get(4)?,
                        message_id: row.get(5)?,
                        date: row.get(6)?,
                        read: row.get(7)?,
                        seen: row.get(8)?,
                        creator: row.get(9)?,
                        subscription: row.get(10)?,
                        pdu: row.get(11)?,
                    })
                },
            )
            .optional()
    }

    pub fn get_by_locator(&self, locator: &MessageLocator) -> rusqlite::Result<Option<StoredMessage>> {
        match parse_locator(locator) {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }

    pub fn count(&self, folder: Option<Folder>) -> rusqlite::Result<i64> {
        let conn = self.lock();
        match folder {
            Some(folder) => conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE folder = ?1",
                params![folder.as_str()],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0)),
        }
    }
}

impl MessageStore for SqliteMessageStore {
    fn persist(
        &self,
        pdu: &[u8],
        folder: Folder,
        create_thread: bool,
        group_enabled: bool,
    ) -> Result<MessageLocator, MmsError> {
        let id = self.insert(pdu, folder, create_thread, group_enabled).map_err(store_error)?;
        log::debug!("store: persisted {} byte pdu as row {id} in {}", pdu.len(), folder.as_str());
        Ok(locator_for(id))
    }

    fn update_status(&self, locator: &MessageLocator, update: &StatusUpdate) -> Result<(), MmsError> {
        let id = parse_locator(locator)
            .ok_or_else(|| MmsError::Store(format!("not a message locator: {locator}")))?;
        if self.apply_update(id, update).map_err(store_error)? {
            Ok(())
        } else {
            Err(MmsError::Store(format!("no message at {locator}")))
        }
    }
}

pub fn locator_for(id: i64) -> MessageLocator {
    MessageLocator::new(format!("{LOCATOR_SCHEME}{id}"))
}

pub fn parse_locator(locator: &MessageLocator) -> Option<i64> {
    locator.as_str().strip_prefix(LOCATOR_SCHEME)?.parse().ok()
}

fn store_error(err: rusqlite::Error) -> MmsError {
    MmsError::Store(err.to_string())
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
