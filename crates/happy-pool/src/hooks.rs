//! Lifecycle hooks attached to a pool.
//!
//! Every [`HookKind`] holds an ordered list of callbacks. Callbacks run in
//! registration order and the first failure aborts both the remaining
//! callbacks and the pool operation that fired them. Miss resolution has its
//! own list of [`MissHook`]s, tried in order until one returns a value.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{PoolError, Result};
use crate::pool::{PoolKey, PoolValue};

/// Error raised by a hook. Propagated to the caller unchanged.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A lifecycle event of a pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Before any read.
    BeforeAccess,
    /// After a read that hit. Not fired when the read missed.
    AfterAccess,
    /// A read missed; fired before the miss hooks are consulted.
    OnMiss,
    /// Before an explicit write.
    BeforeAssignment,
    /// After an explicit write.
    AfterAssignment,
    /// Before an entry is removed. The save point of write-back pools.
    BeforeDeletion,
    /// After an entry has been removed.
    AfterDeletion,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::BeforeAccess => write!(f, "BeforeAccess"),
            HookKind::AfterAccess => write!(f, "AfterAccess"),
            HookKind::OnMiss => write!(f, "OnMiss"),
            HookKind::BeforeAssignment => write!(f, "BeforeAssignment"),
            HookKind::AfterAssignment => write!(f, "AfterAssignment"),
            HookKind::BeforeDeletion => write!(f, "BeforeDeletion"),
            HookKind::AfterDeletion => write!(f, "AfterDeletion"),
        }
    }
}

/// Context handed to a lifecycle hook.
///
/// `value` is the stored value for `AfterAccess`, the incoming value for the
/// assignment events, the current value for `BeforeDeletion` and the removed
/// value for `AfterDeletion`. It is `None` for `BeforeAccess` and `OnMiss`.
#[derive(Debug)]
pub struct HookEvent<'a, K, V> {
    pub kind: HookKind,
    pub key: &'a K,
    pub value: Option<&'a V>,
}

impl<K, V> Clone for HookEvent<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for HookEvent<'_, K, V> {}

/// A callback fired at a lifecycle event.
///
/// Hooks run while the pool holds the key's lock, so a hook must not call
/// back into the pool for the key it was invoked for.
#[async_trait]
pub trait LifecycleHook<K: PoolKey, V: PoolValue>: Send + Sync {
    async fn on_event(&self, event: HookEvent<'_, K, V>) -> std::result::Result<(), HookError>;
}

/// A loader consulted when a read misses.
#[async_trait]
pub trait MissHook<K: PoolKey, V: PoolValue>: Send + Sync {
    /// Load the value for `key`.
    ///
    /// Return `Ok(None)` when this loader cannot resolve the key; the next
    /// loader is tried, and `NotFound` is reported once all declined.
    async fn load(&self, key: &K) -> std::result::Result<Option<V>, HookError>;
}

/// Adapts a synchronous closure into a [`LifecycleHook`].
struct FnHook<F>(F);

#[async_trait]
impl<K, V, F> LifecycleHook<K, V> for FnHook<F>
where
    K: PoolKey,
    V: PoolValue,
    F: Fn(HookEvent<'_, K, V>) -> std::result::Result<(), HookError> + Send + Sync,
{
    async fn on_event(&self, event: HookEvent<'_, K, V>) -> std::result::Result<(), HookError> {
        (self.0)(event)
    }
}

/// Registry of hooks for one pool.
pub struct Hooks<K: PoolKey, V: PoolValue> {
    lifecycle: HashMap<HookKind, Vec<Arc<dyn LifecycleHook<K, V>>>>,
    loaders: Vec<Arc<dyn MissHook<K, V>>>,
}

impl<K: PoolKey, V: PoolValue> Default for Hooks<K, V> {
    fn default() -> Self {
        Self {
            lifecycle: HashMap::new(),
            loaders: Vec::new(),
        }
    }
}

impl<K: PoolKey, V: PoolValue> Hooks<K, V> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lifecycle hook for `kind`.
    pub fn register(&mut self, kind: HookKind, hook: Arc<dyn LifecycleHook<K, V>>) -> &mut Self {
        self.lifecycle.entry(kind).or_default().push(hook);
        self
    }

    /// Append a synchronous closure as a lifecycle hook for `kind`.
    pub fn on<F>(&mut self, kind: HookKind, f: F) -> &mut Self
    where
        F: Fn(HookEvent<'_, K, V>) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(FnHook(f)))
    }

    /// Append a miss loader.
    pub fn register_loader(&mut self, loader: Arc<dyn MissHook<K, V>>) -> &mut Self {
        self.loaders.push(loader);
        self
    }

    /// Number of lifecycle hooks registered for `kind`.
    ///
    /// For [`HookKind::OnMiss`] this includes the miss loaders.
    pub fn count(&self, kind: HookKind) -> usize {
        let lifecycle = self.lifecycle.get(&kind).map_or(0, Vec::len);
        if kind == HookKind::OnMiss {
            lifecycle + self.loaders.len()
        } else {
            lifecycle
        }
    }

    /// Fire every hook registered for `kind`, in order.
    pub(crate) async fn fire(&self, kind: HookKind, key: &K, value: Option<&V>) -> Result<()> {
        let Some(hooks) = self.lifecycle.get(&kind) else {
            return Ok(());
        };

        let event = HookEvent { kind, key, value };
        for hook in hooks {
            hook.on_event(event)
                .await
                .map_err(|source| PoolError::Hook { kind, source })?;
        }
        Ok(())
    }

    /// Try the miss loaders in order until one resolves the key.
    pub(crate) async fn resolve_miss(&self, key: &K) -> Result<Option<V>> {
        for loader in &self.loaders {
            let loaded = loader.load(key).await.map_err(|source| PoolError::Hook {
                kind: HookKind::OnMiss,
                source,
            })?;
            if loaded.is_some() {
                return Ok(loaded);
            }
        }
        Ok(None)
    }
}

impl<K: PoolKey, V: PoolValue> fmt::Debug for Hooks<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(HookKind, usize)> = self
            .lifecycle
            .iter()
            .map(|(kind, hooks)| (*kind, hooks.len()))
            .collect();
        counts.sort_by_key(|(kind, _)| kind.to_string());
        f.debug_struct("Hooks")
            .field("lifecycle", &counts)
            .field("loaders", &self.loaders.len())
            .finish()
    }
}
