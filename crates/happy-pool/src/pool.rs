//! Deletion-scheduled pool of objects.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::hooks::{HookKind, Hooks};
use crate::lock::KeyLocks;
use crate::timer::{CancelOutcome, DeletionTimer, TimerHandle, TimerId};

/// Deadline offset used when `now + ttl` does not fit an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Bound for pool keys.
pub trait PoolKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> PoolKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Bound for pool values.
pub trait PoolValue: Clone + Send + Sync + 'static {}

impl<T> PoolValue for T where T: Clone + Send + Sync + 'static {}

/// Entries and their timer slots, guarded together.
struct PoolState<K, V> {
    items: HashMap<K, V>,

    /// One slot per present key: an armed timer, or `None` for the
    /// "no timer" marker.
    timers: HashMap<K, Option<TimerHandle>>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    evictions: AtomicU64,
    timer_races: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct PoolInner<K: PoolKey, V: PoolValue> {
    me: Weak<PoolInner<K, V>>,
    config: PoolConfig,
    hooks: Hooks<K, V>,
    state: Mutex<PoolState<K, V>>,
    locks: KeyLocks<K>,
    timer: DeletionTimer,
    counters: Counters,
}

/// Keyed pool whose entries are evicted after a period without access.
///
/// Each access re-arms the key's one-shot deletion timer. Eviction, explicit
/// deletion and [`clear`](Self::clear) run the deletion hooks, so a pool with
/// a `BeforeDeletion` save hook is a write-back cache with idle-timeout flush.
///
/// Operations on one key are serialized; operations on distinct keys proceed
/// independently, including while hooks await I/O. The pool must be used
/// from within a tokio runtime.
pub struct SchedPool<K: PoolKey, V: PoolValue> {
    inner: Arc<PoolInner<K, V>>,
}

impl<K: PoolKey, V: PoolValue> SchedPool<K, V> {
    /// Create a pool without hooks.
    pub fn new(config: PoolConfig) -> Self {
        Self::with_hooks(config, Hooks::new())
    }

    /// Create a pool with the given hooks.
    pub fn with_hooks(config: PoolConfig, hooks: Hooks<K, V>) -> Self {
        let inner = Arc::new_cyclic(|me| PoolInner {
            me: me.clone(),
            config,
            hooks,
            state: Mutex::new(PoolState {
                items: HashMap::new(),
                timers: HashMap::new(),
            }),
            locks: KeyLocks::new(),
            timer: DeletionTimer::new(),
            counters: Counters::default(),
        });
        Self { inner }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn hooks(&self) -> &Hooks<K, V> {
        &self.inner.hooks
    }

    /// Get the value for `key` and reset its TTL.
    ///
    /// Fails with [`PoolError::NotFound`] if the key is absent and no miss
    /// hook resolves it.
    pub async fn get(&self, key: &K) -> Result<V> {
        let _guard = self.inner.locks.acquire(key).await;
        let value = self.inner.get_bypass(key).await;
        self.inner.settle(key, value)
    }

    /// Get the value for `key` without touching its timer.
    pub async fn get_bypass(&self, key: &K) -> Result<V> {
        let _guard = self.inner.locks.acquire(key).await;
        self.inner.get_bypass(key).await
    }

    /// Store `value` under `key` and reset its TTL.
    pub async fn set(&self, key: K, value: V) -> Result<()> {
        let _guard = self.inner.locks.acquire(&key).await;
        let stored = self.inner.set_bypass(key.clone(), value).await;
        self.inner.settle(&key, stored)
    }

    /// Store `value` under `key` without touching its timer.
    pub async fn set_bypass(&self, key: K, value: V) -> Result<()> {
        let _guard = self.inner.locks.acquire(&key).await;
        self.inner.set_bypass(key, value).await
    }

    /// Delete `key`, cancelling its pending timer.
    ///
    /// If a `BeforeDeletion` hook fails, the entry and its timer are left
    /// as they were.
    pub async fn delete(&self, key: &K) -> Result<V> {
        let _guard = self.inner.locks.acquire(key).await;
        self.inner.remove_entry(key, true).await
    }

    /// Delete `key` without running any scheduling logic. The key's timer
    /// slot goes with it.
    pub async fn delete_bypass(&self, key: &K) -> Result<V> {
        let _guard = self.inner.locks.acquire(key).await;
        self.inner.remove_entry(key, true).await
    }

    /// Arm the deletion timer of `key` at `now + ttl`, replacing any
    /// existing one. `None` uses the pool's default TTL.
    ///
    /// Returns the new deadline. Fails with `NotFound` if the key is absent.
    pub async fn schedule_deletion(&self, key: &K, ttl: Option<Duration>) -> Result<Instant> {
        let _guard = self.inner.locks.acquire(key).await;
        self.inner.schedule(key, ttl)
    }

    /// Cancel the pending deletion of `key`. No-op when nothing is pending.
    pub async fn cancel_scheduled_deletion(&self, key: &K) {
        let _guard = self.inner.locks.acquire(key).await;
        self.inner.cancel_timer(key);
    }

    /// Delete every entry, running the deletion hooks for each.
    ///
    /// Used at shutdown to flush pending saves. Returns the number of
    /// deleted entries; the first hook failure stops the flush and leaves
    /// the remaining entries in place.
    pub async fn clear(&self) -> Result<usize> {
        let keys = self.keys();
        let mut deleted = 0;

        for key in keys {
            let _guard = self.inner.locks.acquire(&key).await;
            match self.inner.remove_entry(&key, true).await {
                Ok(_) => deleted += 1,
                // Evicted while we waited for the key.
                Err(PoolError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        debug!(deleted, "pool cleared");
        Ok(deleted)
    }

    /// Whether `key` is present.
    ///
    /// A membership check counts as an access: a present key has its timer
    /// re-armed with the default TTL. No hooks run and misses are not
    /// resolved.
    pub async fn contains(&self, key: &K) -> bool {
        let _guard = self.inner.locks.acquire(key).await;
        self.inner.schedule(key, None).is_ok()
    }

    /// Mutate the value of `key` in place. Counts as an access.
    ///
    /// A missing key is resolved through the miss hooks first.
    pub async fn with_mut<F, R>(&self, key: &K, f: F) -> Result<R>
    where
        F: FnOnce(&mut V) -> R + Send,
    {
        let _guard = self.inner.locks.acquire(key).await;
        if let Err(err) = self.inner.get_bypass(key).await {
            return self.inner.settle(key, Err(err));
        }

        let out = {
            let mut state = self.inner.state.lock();
            match state.items.get_mut(key) {
                Some(value) => f(value),
                None => return Err(PoolError::not_found(key)),
            }
        };

        self.inner.auto_schedule(key)?;
        Ok(out)
    }

    /// Read the value of `key` without hooks and without touching its timer.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.state.lock().items.get(key).cloned()
    }

    /// Deadline of the pending deletion timer of `key`, if any.
    pub fn deadline(&self, key: &K) -> Option<Instant> {
        let state = self.inner.state.lock();
        state
            .timers
            .get(key)
            .and_then(|slot| slot.as_ref())
            .filter(|handle| handle.is_pending())
            .map(TimerHandle::deadline)
    }

    /// Snapshot of the present keys.
    pub fn keys(&self) -> Vec<K> {
        self.inner.state.lock().items.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().items.is_empty()
    }

    /// Get pool statistics.
    pub fn stats(&self) -> PoolStats {
        let (size, armed_timers) = {
            let state = self.inner.state.lock();
            let armed = state
                .timers
                .values()
                .filter(|slot| slot.as_ref().is_some_and(TimerHandle::is_pending))
                .count();
            (state.items.len(), armed)
        };
        let counters = &self.inner.counters;
        PoolStats {
            size,
            armed_timers,
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            loads: counters.loads.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            timer_races: counters.timer_races.load(Ordering::Relaxed),
        }
    }
}

impl<K: PoolKey, V: PoolValue> Clone for SchedPool<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: PoolKey, V: PoolValue> std::fmt::Debug for SchedPool<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedPool")
            .field("config", &self.inner.config)
            .field("hooks", &self.inner.hooks)
            .field("size", &self.len())
            .finish_non_exhaustive()
    }
}

// The `*_bypass`, `schedule` and `remove_entry` methods below expect the
// caller to hold the key's lock.
impl<K: PoolKey, V: PoolValue> PoolInner<K, V> {
    async fn get_bypass(&self, key: &K) -> Result<V> {
        self.hooks.fire(HookKind::BeforeAccess, key, None).await?;

        let hit = self.state.lock().items.get(key).cloned();
        if let Some(value) = hit {
            Counters::bump(&self.counters.hits);
            self.hooks
                .fire(HookKind::AfterAccess, key, Some(&value))
                .await?;
            trace!(key = ?key, "pool hit");
            return Ok(value);
        }

        Counters::bump(&self.counters.misses);
        self.hooks.fire(HookKind::OnMiss, key, None).await?;

        match self.hooks.resolve_miss(key).await? {
            Some(value) => {
                Counters::bump(&self.counters.loads);
                self.set_bypass(key.clone(), value.clone()).await?;
                debug!(key = ?key, "pool miss resolved by loader");
                Ok(value)
            }
            None => {
                trace!(key = ?key, "pool miss");
                Err(PoolError::not_found(key))
            }
        }
    }

    async fn set_bypass(&self, key: K, value: V) -> Result<()> {
        self.hooks
            .fire(HookKind::BeforeAssignment, &key, Some(&value))
            .await?;

        {
            let mut state = self.state.lock();
            state.timers.entry(key.clone()).or_insert(None);
            state.items.insert(key.clone(), value.clone());
        }

        self.hooks
            .fire(HookKind::AfterAssignment, &key, Some(&value))
            .await
    }

    /// Remove `key` and its timer, bracketed by the deletion hooks. With
    /// `report_race` a timer found already fired counts as a race.
    async fn remove_entry(&self, key: &K, report_race: bool) -> Result<V> {
        let current = self.state.lock().items.get(key).cloned();
        let Some(current) = current else {
            return Err(PoolError::not_found(key));
        };

        debug!(key = ?key, "deleting pool entry");
        self.hooks
            .fire(HookKind::BeforeDeletion, key, Some(&current))
            .await?;

        let (removed, timer) = {
            let mut state = self.state.lock();
            (state.items.remove(key), state.timers.remove(key).flatten())
        };
        if let Some(timer) = timer {
            let outcome = timer.cancel();
            if report_race {
                self.note_cancel(key, outcome);
            }
        }
        let Some(removed) = removed else {
            return Err(PoolError::not_found(key));
        };

        self.hooks
            .fire(HookKind::AfterDeletion, key, Some(&removed))
            .await?;
        Ok(removed)
    }

    /// Finish an access or assignment with the auto-schedule. An After*
    /// hook fails only once the entry is stored, so the entry is armed
    /// before that error is returned.
    fn settle<T>(&self, key: &K, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.auto_schedule(key)?;
                Ok(value)
            }
            Err(err) if err.is_after_effect() => {
                if let Err(arm) = self.auto_schedule(key) {
                    debug!(key = ?key, error = %arm, "entry vanished before re-arming");
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn auto_schedule(&self, key: &K) -> Result<()> {
        if self.config.auto_schedule {
            self.schedule(key, None)?;
        }
        Ok(())
    }

    fn schedule(&self, key: &K, ttl: Option<Duration>) -> Result<Instant> {
        let (deadline, previous) = self.arm(key, ttl)?;
        if let Some(previous) = previous {
            self.note_cancel(key, previous.cancel());
        }
        trace!(key = ?key, "deletion scheduled");
        Ok(deadline)
    }

    /// Install a fresh timer for `key`, returning the displaced one.
    fn arm(&self, key: &K, ttl: Option<Duration>) -> Result<(Instant, Option<TimerHandle>)> {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let now = Instant::now();
        let deadline = now.checked_add(ttl).unwrap_or(now + FAR_FUTURE);

        let mut state = self.state.lock();
        if !state.items.contains_key(key) {
            return Err(PoolError::not_found(key));
        }

        let me = self.me.clone();
        let expired = key.clone();
        let handle = self.timer.schedule_once(deadline, move |id| async move {
            if let Some(inner) = me.upgrade() {
                inner.expire(expired, id).await;
            }
        });

        let previous = state.timers.insert(key.clone(), Some(handle)).flatten();
        Ok((deadline, previous))
    }

    fn cancel_timer(&self, key: &K) {
        let previous = self
            .state
            .lock()
            .timers
            .get_mut(key)
            .and_then(Option::take);
        if let Some(previous) = previous {
            self.note_cancel(key, previous.cancel());
        }
    }

    fn note_cancel(&self, key: &K, outcome: CancelOutcome) {
        if outcome == CancelOutcome::AlreadyFired {
            Counters::bump(&self.counters.timer_races);
            warn!(key = ?key, "deletion timer already fired during cancel attempt");
        }
    }

    /// Timer action: evict `key` if `timer_id` is still its current timer.
    async fn expire(&self, key: K, timer_id: TimerId) {
        let _guard = self.locks.acquire(&key).await;

        let current = {
            let state = self.state.lock();
            state
                .timers
                .get(&key)
                .and_then(|slot| slot.as_ref())
                .map(TimerHandle::id)
        };
        if current != Some(timer_id) {
            trace!(key = ?key, timer = %timer_id, "superseded deletion timer ignored");
            return;
        }

        match self.remove_entry(&key, false).await {
            Ok(_) => {
                Counters::bump(&self.counters.evictions);
                debug!(key = ?key, "pool entry evicted after idle timeout");
            }
            Err(PoolError::NotFound(_)) => {}
            Err(err) => {
                error!(key = ?key, error = %err, "eviction aborted, retrying after default TTL");
                // The displaced handle is this fired timer.
                if let Err(err) = self.arm(&key, None) {
                    debug!(key = ?key, error = %err, "entry vanished before re-arming");
                }
            }
        }
    }
}

impl<K: PoolKey, V: PoolValue> Drop for PoolInner<K, V> {
    fn drop(&mut self) {
        for handle in self.state.get_mut().timers.values().flatten() {
            handle.cancel();
        }
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Current number of entries.
    pub size: usize,

    /// Entries with a pending deletion timer.
    pub armed_timers: usize,

    /// Reads served from memory.
    pub hits: u64,

    /// Reads that missed.
    pub misses: u64,

    /// Misses resolved by a loader.
    pub loads: u64,

    /// Entries removed by their deletion timer.
    pub evictions: u64,

    /// Cancellations that found the timer already fired.
    pub timer_races: u64,
}
