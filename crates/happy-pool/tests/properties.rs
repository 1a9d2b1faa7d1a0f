//! Behavioural tests of the scheduled pool against a fake backing store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use happy_pool::{
    HookError, HookEvent, HookKind, Hooks, LifecycleHook, MissHook, PoolConfig, PoolError,
    SchedPool,
};
use tokio::time::{Instant, sleep};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Record {
    name: String,
    visits: u32,
}

fn record(name: &str) -> Record {
    Record {
        name: name.to_string(),
        visits: 0,
    }
}

/// Backing store shared by the loader and the save hook.
#[derive(Default)]
struct FakeStore {
    rows: Mutex<HashMap<String, Record>>,
    saved: Mutex<Vec<(String, Record)>>,
    loads: Mutex<u32>,
}

impl FakeStore {
    fn with_row(key: &str, value: Record) -> Arc<Self> {
        let store = Self::default();
        store.rows.lock().unwrap().insert(key.to_string(), value);
        Arc::new(store)
    }

    fn saved(&self) -> Vec<(String, Record)> {
        self.saved.lock().unwrap().clone()
    }

    fn loads(&self) -> u32 {
        *self.loads.lock().unwrap()
    }
}

struct Loader(Arc<FakeStore>);

#[async_trait]
impl MissHook<String, Record> for Loader {
    async fn load(&self, key: &String) -> Result<Option<Record>, HookError> {
        *self.0.loads.lock().unwrap() += 1;
        Ok(self.0.rows.lock().unwrap().get(key).cloned())
    }
}

struct Saver(Arc<FakeStore>);

#[async_trait]
impl LifecycleHook<String, Record> for Saver {
    async fn on_event(&self, event: HookEvent<'_, String, Record>) -> Result<(), HookError> {
        let value = event.value.ok_or("deletion without a value")?;
        self.0
            .rows
            .lock()
            .unwrap()
            .insert(event.key.clone(), value.clone());
        self.0
            .saved
            .lock()
            .unwrap()
            .push((event.key.clone(), value.clone()));
        Ok(())
    }
}

/// Write-back pool over `store`, counting `AfterDeletion` events.
fn write_back_pool(
    store: &Arc<FakeStore>,
    ttl: Duration,
) -> (SchedPool<String, Record>, Arc<Mutex<u32>>) {
    let after_deletion = Arc::new(Mutex::new(0));
    let mut hooks = Hooks::new();
    hooks
        .register_loader(Arc::new(Loader(Arc::clone(store))))
        .register(HookKind::BeforeDeletion, Arc::new(Saver(Arc::clone(store))));
    let counter = Arc::clone(&after_deletion);
    hooks.on(HookKind::AfterDeletion, move |_| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    let pool = SchedPool::with_hooks(PoolConfig::new().with_ttl(ttl), hooks);
    (pool, after_deletion)
}

const TTL: Duration = Duration::from_secs(2);

#[tokio::test(start_paused = true)]
async fn test_access_resets_deadline() {
    let store = Arc::new(FakeStore::default());
    let (pool, _) = write_back_pool(&store, TTL);
    let key = "u1".to_string();
    pool.set(key.clone(), record("Ann")).await.unwrap();

    for _ in 0..10 {
        sleep(Duration::from_millis(1500)).await;
        let now = Instant::now();
        pool.get(&key).await.unwrap();
        assert_eq!(pool.deadline(&key), Some(now + TTL));
    }

    assert!(store.saved().is_empty());
    assert_eq!(pool.stats().evictions, 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_entry_is_evicted_once() {
    let store = Arc::new(FakeStore::default());
    let (pool, after_deletion) = write_back_pool(&store, TTL);
    pool.set("u1".into(), record("Ann")).await.unwrap();

    sleep(TTL + Duration::from_millis(1)).await;

    assert!(pool.is_empty());
    assert_eq!(store.saved().len(), 1);
    assert_eq!(*after_deletion.lock().unwrap(), 1);

    sleep(TTL * 5).await;
    assert_eq!(store.saved().len(), 1);
    assert_eq!(*after_deletion.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_miss_loads_once_then_hits() {
    let store = FakeStore::with_row("u3", record("Bo"));
    let (pool, _) = write_back_pool(&store, TTL);

    assert_eq!(pool.get(&"u3".into()).await.unwrap(), record("Bo"));
    assert_eq!(pool.get(&"u3".into()).await.unwrap(), record("Bo"));
    assert_eq!(store.loads(), 1);

    let stats = pool.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.loads, 1);
}

#[tokio::test(start_paused = true)]
async fn test_mutation_is_written_back_on_eviction() {
    let store = FakeStore::with_row("u1", record("Ann"));
    let (pool, _) = write_back_pool(&store, TTL);

    pool.with_mut(&"u1".into(), |r| r.visits += 1)
        .await
        .unwrap();
    sleep(TTL * 3).await;

    let expected = Record {
        name: "Ann".into(),
        visits: 1,
    };
    assert_eq!(store.saved(), vec![("u1".to_string(), expected.clone())]);
    assert_eq!(store.rows.lock().unwrap().get("u1"), Some(&expected));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_idempotent() {
    let store = Arc::new(FakeStore::default());
    let (pool, _) = write_back_pool(&store, TTL);
    pool.set("u1".into(), record("Ann")).await.unwrap();

    pool.cancel_scheduled_deletion(&"u1".into()).await;
    pool.cancel_scheduled_deletion(&"u1".into()).await;
    pool.cancel_scheduled_deletion(&"nobody".into()).await;

    sleep(TTL * 3).await;
    assert_eq!(pool.peek(&"u1".into()), Some(record("Ann")));
    assert!(store.saved().is_empty());
    assert_eq!(pool.stats().timer_races, 0);
}

#[tokio::test(start_paused = true)]
async fn test_clear_saves_every_entry() {
    let store = Arc::new(FakeStore::default());
    let (pool, _) = write_back_pool(&store, TTL);
    for name in ["a", "b", "c", "d"] {
        pool.set(name.into(), record(name)).await.unwrap();
    }

    assert_eq!(pool.clear().await.unwrap(), 4);
    assert!(pool.is_empty());
    assert_eq!(store.saved().len(), 4);
    assert_eq!(pool.stats().armed_timers, 0);

    // Cancelled timers do not save again.
    sleep(TTL * 3).await;
    assert_eq!(store.saved().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_clear_stops_at_first_failure() {
    let mut hooks: Hooks<String, Record> = Hooks::new();
    hooks.on(HookKind::BeforeDeletion, |_| Err("storage offline".into()));
    let pool = SchedPool::with_hooks(PoolConfig::new().with_ttl(TTL), hooks);
    pool.set("a".into(), record("a")).await.unwrap();
    pool.set("b".into(), record("b")).await.unwrap();

    let err = pool.clear().await.unwrap_err();
    assert!(matches!(err, PoolError::Hook { .. }));
    assert_eq!(pool.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_set_get_then_expire() {
    let store = Arc::new(FakeStore::default());
    let (pool, _) = write_back_pool(&store, TTL);

    pool.set("u1".into(), record("Ann")).await.unwrap();
    assert_eq!(pool.get(&"u1".into()).await.unwrap(), record("Ann"));

    sleep(Duration::from_secs(3)).await;
    assert!(pool.peek(&"u1".into()).is_none());
    assert_eq!(store.saved(), vec![("u1".to_string(), record("Ann"))]);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_unknown_user_is_not_found() {
    let store = Arc::new(FakeStore::default());
    let (pool, _) = write_back_pool(&store, TTL);

    let err = pool.get(&"u2".into()).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(pool.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scenario_loaded_user_gets_timer() {
    let store = FakeStore::with_row("u3", record("Bo"));
    let (pool, _) = write_back_pool(&store, TTL);

    assert_eq!(pool.get(&"u3".into()).await.unwrap(), record("Bo"));
    assert!(pool.contains(&"u3".into()).await);
    assert!(pool.deadline(&"u3".into()).is_some());
    assert_eq!(pool.stats().armed_timers, 1);
}

#[tokio::test(start_paused = true)]
async fn test_access_after_eviction_reloads() {
    let store = FakeStore::with_row("u1", record("Ann"));
    let (pool, _) = write_back_pool(&store, TTL);

    pool.get(&"u1".into()).await.unwrap();
    sleep(TTL * 2).await;
    assert!(pool.is_empty());

    assert_eq!(pool.get(&"u1".into()).await.unwrap(), record("Ann"));
    assert_eq!(store.loads(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_first_access_loads_once() {
    let store = FakeStore::with_row("u1", record("Ann"));
    let (pool, _) = write_back_pool(&store, TTL);

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get(&"u1".into()).await })
        })
        .collect();
    for reader in readers {
        assert_eq!(reader.await.unwrap().unwrap(), record("Ann"));
    }

    assert_eq!(store.loads(), 1);
    assert_eq!(pool.len(), 1);
}
