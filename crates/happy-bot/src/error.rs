//! Error types for the bot pools.

use happy_i18n::I18nError;
use happy_pool::PoolError;
use happy_store::{StoreError, UserId};

/// Error type for session and catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Domain '{domain}' not found for language '{lang}'")]
    DomainNotFound { domain: String, lang: String },

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] I18nError),
}

pub type Result<T> = std::result::Result<T, BotError>;
