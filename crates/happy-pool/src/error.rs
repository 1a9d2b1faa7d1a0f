//! Error types for pool operations.

use std::fmt::Debug;

use crate::hooks::{HookError, HookKind};

/// Error type for pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Key is absent and no miss hook resolved it.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// A registered hook failed and aborted the operation.
    #[error("{kind} hook failed: {source}")]
    Hook {
        /// Lifecycle event the failing hook was registered for.
        kind: HookKind,
        /// The error raised by the hook, unchanged.
        source: HookError,
    },
}

impl PoolError {
    /// Build a `NotFound` error for the given key.
    pub fn not_found(key: &impl Debug) -> Self {
        Self::NotFound(format!("{key:?}"))
    }

    /// Whether this is the expected, recoverable miss outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the failing hook ran after the operation had taken effect.
    pub fn is_after_effect(&self) -> bool {
        matches!(
            self,
            Self::Hook {
                kind: HookKind::AfterAccess | HookKind::AfterAssignment | HookKind::AfterDeletion,
                ..
            }
        )
    }
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
