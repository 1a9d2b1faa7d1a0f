//! In-memory user sessions with write-back to the user store.
//!
//! A session is loaded from the [`UserStore`] on first access and saved
//! back when it is evicted after a period of inactivity, explicitly, or by
//! the shutdown flush. While in memory, every change stays in memory only.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use happy_pool::{
    HookError, HookEvent, HookKind, Hooks, LifecycleHook, MissHook, PoolConfig, PoolError,
    PoolStats, SchedPool,
};
use happy_store::{HOURS, UserId, UserRecord, UserStore};
use tracing::debug;

use crate::error::{BotError, Result};

/// A multi-step interaction the user is currently in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSlot {
    pub id: u64,
    pub command: String,
}

/// A user's in-memory state: the persisted record plus state that is
/// never written to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    pub record: UserRecord,
    pub wizard: Option<WizardSlot>,
}

impl UserSession {
    pub fn new(record: UserRecord) -> Self {
        Self {
            record,
            wizard: None,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.record.user_id
    }

    /// Enter the wizard of `command`, replacing any unfinished one.
    pub fn start_wizard(&mut self, command: impl Into<String>) -> &WizardSlot {
        let id = self.record.next_wizard_id();
        self.wizard.insert(WizardSlot {
            id,
            command: command.into(),
        })
    }

    pub fn finish_wizard(&mut self) -> Option<WizardSlot> {
        self.wizard.take()
    }
}

/// Lifetime settings of the session pool.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Idle time after an access before a session is evicted. Busy hours
    /// extend it by multiples of itself.
    pub min_lifespan: Duration,

    /// Hourly access share at or above which an hour counts as busy.
    pub percent_life: f64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            min_lifespan: Duration::from_secs(3_600),
            percent_life: 0.05,
        }
    }
}

/// Loads sessions from the store on a pool miss.
struct StoreLoader(Arc<dyn UserStore>);

#[async_trait]
impl MissHook<UserId, UserSession> for StoreLoader {
    async fn load(&self, id: &UserId) -> std::result::Result<Option<UserSession>, HookError> {
        let record = self.0.get_record(*id).await?;
        Ok(record.map(UserSession::new))
    }
}

/// Saves a session to the store before it leaves the pool.
struct StoreSaver(Arc<dyn UserStore>);

#[async_trait]
impl LifecycleHook<UserId, UserSession> for StoreSaver {
    async fn on_event(
        &self,
        event: HookEvent<'_, UserId, UserSession>,
    ) -> std::result::Result<(), HookError> {
        let Some(session) = event.value else {
            return Ok(());
        };
        self.0.upsert_record(&session.record).await?;
        debug!(user_id = *event.key, "session saved to the store");
        Ok(())
    }
}

/// Pool of user sessions backed by a [`UserStore`].
#[derive(Debug, Clone)]
pub struct SessionPool {
    pool: SchedPool<UserId, UserSession>,
    settings: SessionSettings,
}

impl SessionPool {
    pub fn new(store: Arc<dyn UserStore>, settings: SessionSettings) -> Self {
        let mut hooks = Hooks::new();
        hooks
            .register_loader(Arc::new(StoreLoader(Arc::clone(&store))))
            .register(HookKind::BeforeDeletion, Arc::new(StoreSaver(store)));

        let config = PoolConfig::new().with_ttl(settings.min_lifespan);
        Self {
            pool: SchedPool::with_hooks(config, hooks),
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// The session of `id`, loading it from the store if needed.
    pub async fn get(&self, id: UserId) -> Result<UserSession> {
        self.pool.get(&id).await.map_err(|err| user_error(id, err))
    }

    /// Like [`get`](Self::get) without resetting the session's lifetime.
    pub async fn get_bypass(&self, id: UserId) -> Result<UserSession> {
        self.pool
            .get_bypass(&id)
            .await
            .map_err(|err| user_error(id, err))
    }

    /// Add a session for a user who just signed up. The record reaches the
    /// store when the session leaves the pool.
    pub async fn register(&self, record: UserRecord) -> Result<()> {
        let id = record.user_id;
        self.pool.set(id, UserSession::new(record)).await?;
        debug!(user_id = id, "session registered");
        Ok(())
    }

    /// Mutate the session of `id` in place. Counts as an access.
    pub async fn update<F, R>(&self, id: UserId, f: F) -> Result<R>
    where
        F: FnOnce(&mut UserSession) -> R + Send,
    {
        self.pool
            .with_mut(&id, f)
            .await
            .map_err(|err| user_error(id, err))
    }

    /// Record an access by `id` at `at` and size the session's lifetime to
    /// the user's habits: one minimum lifespan, plus one more for every
    /// consecutive busy hour after the current one.
    ///
    /// Returns the lifetime that was scheduled.
    pub async fn touch_activity(&self, id: UserId, at: DateTime<Utc>) -> Result<Duration> {
        let hour = at.hour();
        let percent = self.settings.percent_life;
        let busy_hours = self
            .update(id, |session| {
                session.record.frequencies.increment(hour);
                session
                    .record
                    .suggest_lifespan((hour + 1) % HOURS as u32, percent)
            })
            .await?;

        let lifespan = self
            .settings
            .min_lifespan
            .checked_mul(busy_hours + 1)
            .unwrap_or(Duration::MAX);
        self.pool
            .schedule_deletion(&id, Some(lifespan))
            .await
            .map_err(|err| user_error(id, err))?;

        debug!(
            user_id = id,
            hours = busy_hours + 1,
            "session will stay in memory for at least {:?}",
            lifespan
        );
        Ok(lifespan)
    }

    /// Save and remove the session of `id` now.
    pub async fn evict(&self, id: UserId) -> Result<UserSession> {
        self.pool.delete(&id).await.map_err(|err| user_error(id, err))
    }

    /// Save and remove every session. Returns the number saved.
    pub async fn flush(&self) -> Result<usize> {
        Ok(self.pool.clear().await?)
    }

    /// Whether a session for `id` is in memory. Resets its lifetime.
    pub async fn contains(&self, id: UserId) -> bool {
        self.pool.contains(&id).await
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// The underlying pool, for scheduling inspection.
    pub fn pool(&self) -> &SchedPool<UserId, UserSession> {
        &self.pool
    }
}

fn user_error(id: UserId, err: PoolError) -> BotError {
    if err.is_not_found() {
        BotError::UserNotFound(id)
    } else {
        BotError::Pool(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use happy_store::MemoryUserStore;

    fn settings() -> SessionSettings {
        SessionSettings {
            min_lifespan: Duration::from_secs(60),
            percent_life: 0.05,
        }
    }

    fn sessions(records: Vec<UserRecord>) -> (Arc<MemoryUserStore>, SessionPool) {
        let store = Arc::new(MemoryUserStore::with_records(records));
        let pool = SessionPool::new(store.clone(), settings());
        (store, pool)
    }

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 15, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_user() {
        let (_, pool) = sessions(vec![]);
        let err = pool.get(7).await.unwrap_err();
        assert!(matches!(err, BotError::UserNotFound(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_loaded_from_store() {
        let (_, pool) = sessions(vec![UserRecord::new(7, "fa").with_name("Bo", None)]);
        let session = pool.get(7).await.unwrap();
        assert_eq!(session.record.first_name, "Bo");
        assert!(session.wizard.is_none());
        assert!(pool.pool().deadline(&7).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_written_back_once_on_eviction() {
        let (store, pool) = sessions(vec![UserRecord::new(7, "en")]);
        pool.update(7, |s| s.record.lang = "fa".to_string())
            .await
            .unwrap();
        assert_eq!(store.upsert_count(), 0);

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(pool.is_empty());
        assert_eq!(store.upsert_count(), 1);
        assert_eq!(store.snapshot(7).unwrap().lang, "fa");
    }

    #[tokio::test(start_paused = true)]
    async fn test_registered_user_persisted_by_flush() {
        let (store, pool) = sessions(vec![UserRecord::new(1, "en")]);
        pool.get(1).await.unwrap();
        pool.register(UserRecord::new(2, "fa")).await.unwrap();

        assert_eq!(pool.flush().await.unwrap(), 2);
        assert_eq!(store.upsert_count(), 2);
        assert!(store.snapshot(2).is_some());
        assert!(pool.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_saves_immediately() {
        let (store, pool) = sessions(vec![UserRecord::new(3, "en")]);
        pool.get(3).await.unwrap();
        pool.evict(3).await.unwrap();
        pool.evict(3).await.unwrap_err();
        assert_eq!(store.upsert_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wizard_state_is_not_persisted() {
        let (store, pool) = sessions(vec![UserRecord::new(4, "en")]);
        let wizard_id = pool
            .update(4, |s| s.start_wizard("/signin").id)
            .await
            .unwrap();
        assert_eq!(wizard_id, 0);
        pool.evict(4).await.unwrap();

        // Only the id counter survives.
        let session = pool.get(4).await.unwrap();
        assert!(session.wizard.is_none());
        assert_eq!(session.record.next_wizard_id, 1);
        assert_eq!(store.snapshot(4).unwrap().next_wizard_id, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_activity_quiet_user_gets_min_lifespan() {
        let (_, pool) = sessions(vec![UserRecord::new(5, "en")]);

        let now = tokio::time::Instant::now();
        let lifespan = pool.touch_activity(5, at_hour(10)).await.unwrap();
        assert_eq!(lifespan, Duration::from_secs(60));
        assert_eq!(pool.pool().deadline(&5), Some(now + lifespan));

        let session = pool.get_bypass(5).await.unwrap();
        assert_eq!(session.record.frequencies.count(10), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_activity_extends_through_busy_hours() {
        let mut record = UserRecord::new(6, "en");
        // Busy at 11:00 and 12:00, quiet at 13:00.
        for hour in [10, 11, 11, 12, 12] {
            record.frequencies.increment(hour);
        }
        let (_, pool) = sessions(vec![record]);

        let lifespan = pool.touch_activity(6, at_hour(10)).await.unwrap();
        assert_eq!(lifespan, Duration::from_secs(60 * 3));

        tokio::time::sleep(Duration::from_secs(60 * 3 - 1)).await;
        assert!(pool.pool().peek(&6).is_some());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(pool.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_activity_with_huge_lifespan() {
        let mut record = UserRecord::new(8, "en");
        record.frequencies.increment(11);
        let store = Arc::new(MemoryUserStore::with_records(vec![record]));
        let pool = SessionPool::new(
            store,
            SessionSettings {
                min_lifespan: Duration::from_secs(u64::MAX / 2 + 1),
                percent_life: 0.05,
            },
        );

        let lifespan = pool.touch_activity(8, at_hour(10)).await.unwrap();
        assert_eq!(lifespan, Duration::MAX);
        assert!(pool.pool().deadline(&8).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_unknown_user() {
        let (_, pool) = sessions(vec![]);
        let err = pool.touch_activity(9, at_hour(1)).await.unwrap_err();
        assert!(matches!(err, BotError::UserNotFound(9)));
    }
}
