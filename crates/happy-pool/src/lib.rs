//! Deletion-scheduled object pool.
//!
//! A keyed in-memory cache where every entry carries its own one-shot
//! eviction timer:
//! - Entries are loaded on miss through ordered miss hooks
//! - Every access re-arms the key's timer (reset-on-access TTL)
//! - Eviction, explicit deletion and [`SchedPool::clear`] run the deletion
//!   hooks, which is where write-back pools persist their state
//! - Bypass operations mutate the map without touching the timers
//!
//! # Example
//!
//! ```rust,ignore
//! use happy_pool::{HookKind, Hooks, PoolConfig, SchedPool};
//!
//! let mut hooks = Hooks::new();
//! hooks.on(HookKind::BeforeDeletion, |event| {
//!     println!("saving {:?}", event.key);
//!     Ok(())
//! });
//!
//! let pool: SchedPool<u64, String> =
//!     SchedPool::with_hooks(PoolConfig::new().with_ttl(Duration::from_secs(60)), hooks);
//! pool.set(7, "seven".into()).await?;
//! ```

mod config;
mod error;
mod hooks;
mod lock;
mod pool;
mod timer;

pub use config::{DEFAULT_TTL, PoolConfig};
pub use error::{PoolError, Result};
pub use hooks::{HookError, HookEvent, HookKind, Hooks, LifecycleHook, MissHook};
pub use pool::{PoolKey, PoolStats, PoolValue, SchedPool};
pub use timer::{CancelOutcome, DeletionTimer, TimerHandle, TimerId};
