//! User records of the Happy bot and the storage they live in.
//!
//! - [`UserRecord`]: persisted per-user data, including the hourly
//!   [`AccessFrequencies`] used to size in-memory session lifetimes
//! - [`UserStore`]: the async storage interface the session pool loads
//!   from and writes back to
//! - [`SqliteUserStore`]: the production backend
//! - [`MemoryUserStore`]: an in-memory backend for tests and dry runs

mod error;
mod memory;
mod record;
mod sqlite;

use async_trait::async_trait;

pub use error::{Result, StoreError};
pub use memory::MemoryUserStore;
pub use record::{AccessFrequencies, DEFAULT_COUNTER_WIDTH, HOURS, UserId, UserRecord};
pub use sqlite::SqliteUserStore;

/// Persistent storage of user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch the record for `id`, or `None` if the user is unknown.
    async fn get_record(&self, id: UserId) -> Result<Option<UserRecord>>;

    /// Insert the record, or replace the stored one with the same id.
    async fn upsert_record(&self, record: &UserRecord) -> Result<()>;

    /// Ids of every stored user, ascending.
    async fn all_user_ids(&self) -> Result<Vec<UserId>>;

    /// Whether a record exists for `id`.
    async fn contains(&self, id: UserId) -> Result<bool>;
}
