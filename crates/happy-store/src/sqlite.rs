//! User store backed by SQLite.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use tracing::{debug, info};

use crate::UserStore;
use crate::error::{Result, StoreError};
use crate::record::{AccessFrequencies, DEFAULT_COUNTER_WIDTH, UserId, UserRecord};

/// Current schema version for migrations.
const SCHEMA_VERSION: i32 = 2;

/// User store backed by SQLite.
///
/// Uses WAL mode. Every query runs on the blocking thread pool so callers
/// on the async runtime never stall on disk I/O.
#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
    counter_width: usize,
}

impl std::fmt::Debug for SqliteUserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteUserStore")
            .field("counter_width", &self.counter_width)
            .finish_non_exhaustive()
    }
}

impl SqliteUserStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directory and the schema if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        let store = Self::from_connection(conn)?;

        info!("User store opened at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let store = Self::from_connection(Connection::open_in_memory()?)?;
        debug!("In-memory user store created");
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            counter_width: DEFAULT_COUNTER_WIDTH,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await?
    }
}

/// Set pragmas and bring the schema up to date.
fn initialize(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    let current_version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if current_version >= SCHEMA_VERSION {
        debug!("Schema up to date (version {})", current_version);
        return Ok(());
    }

    info!(
        "Migrating schema from version {} to {}",
        current_version, SCHEMA_VERSION
    );

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT,
            phone TEXT,
            frequencies BLOB NOT NULL
        );
        "#,
    )?;

    if current_version < 2 {
        migrate_v2(conn)?;
    }

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Migration v2: language and wizard id counter.
fn migrate_v2(conn: &Connection) -> Result<()> {
    let has_lang: bool = conn
        .prepare("SELECT 1 FROM pragma_table_info('users') WHERE name = 'lang'")?
        .exists([])?;
    if has_lang {
        return Ok(());
    }

    conn.execute_batch(
        r#"
        ALTER TABLE users ADD COLUMN lang TEXT NOT NULL DEFAULT 'en';
        ALTER TABLE users ADD COLUMN next_wizard_id INTEGER NOT NULL DEFAULT 0;
        "#,
    )?;
    Ok(())
}

struct RawRecord {
    user_id: UserId,
    first_name: String,
    last_name: Option<String>,
    phone: Option<String>,
    lang: String,
    frequencies: Vec<u8>,
    next_wizard_id: i64,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            phone: row.get(3)?,
            lang: row.get(4)?,
            frequencies: row.get(5)?,
            next_wizard_id: row.get(6)?,
        })
    }

    fn decode(self, width: usize) -> Result<UserRecord> {
        let next_wizard_id = u64::try_from(self.next_wizard_id).map_err(|_| {
            StoreError::InvalidData(format!(
                "negative wizard id {} for user {}",
                self.next_wizard_id, self.user_id
            ))
        })?;
        Ok(UserRecord {
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            lang: self.lang,
            frequencies: AccessFrequencies::from_bytes(&self.frequencies, width)?,
            next_wizard_id,
        })
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get_record(&self, id: UserId) -> Result<Option<UserRecord>> {
        let width = self.counter_width;
        self.run(move |conn| {
            let raw = conn
                .query_row(
                    r#"
                    SELECT user_id, first_name, last_name, phone, lang,
                           frequencies, next_wizard_id
                    FROM users WHERE user_id = ?1
                    "#,
                    params![id],
                    RawRecord::from_row,
                )
                .optional()?;
            raw.map(|raw| raw.decode(width)).transpose()
        })
        .await
    }

    async fn upsert_record(&self, record: &UserRecord) -> Result<()> {
        let record = record.clone();
        let next_wizard_id = i64::try_from(record.next_wizard_id).map_err(|_| {
            StoreError::InvalidData(format!(
                "wizard id {} of user {} does not fit the database",
                record.next_wizard_id, record.user_id
            ))
        })?;

        self.run(move |conn| {
            conn.execute(
                r#"
                INSERT INTO users
                    (user_id, first_name, last_name, phone, lang, frequencies, next_wizard_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(user_id) DO UPDATE SET
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    phone = excluded.phone,
                    lang = excluded.lang,
                    frequencies = excluded.frequencies,
                    next_wizard_id = excluded.next_wizard_id
                "#,
                params![
                    record.user_id,
                    record.first_name,
                    record.last_name,
                    record.phone,
                    record.lang,
                    record.frequencies.to_bytes(),
                    next_wizard_id,
                ],
            )?;
            debug!("Upserted user {}", record.user_id);
            Ok(())
        })
        .await
    }

    async fn all_user_ids(&self) -> Result<Vec<UserId>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT user_id FROM users ORDER BY user_id")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<UserId>>>()?;
            Ok(ids)
        })
        .await
    }

    async fn contains(&self, id: UserId) -> Result<bool> {
        self.run(move |conn| {
            let exists = conn
                .prepare("SELECT 1 FROM users WHERE user_id = ?1")?
                .exists(params![id])?;
            Ok(exists)
        })
        .await
    }
}
