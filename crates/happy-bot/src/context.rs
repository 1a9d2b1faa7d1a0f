//! Shared state of a running bot.

use std::sync::Arc;

use happy_config::HappyConfig;
use happy_i18n::{CatalogLoader, DirCatalogLoader, scan_languages};
use happy_store::{SqliteUserStore, UserId, UserStore};
use tracing::info;

use crate::catalog::CatalogPool;
use crate::error::Result;
use crate::session::{SessionPool, SessionSettings};

/// Everything a handler needs: configuration, storage and the two pools.
///
/// Cheap to clone; clones share the pools.
#[derive(Clone)]
pub struct BotContext {
    config: Arc<HappyConfig>,
    store: Arc<dyn UserStore>,
    sessions: SessionPool,
    catalogs: CatalogPool,
}

impl BotContext {
    /// Assemble a context from already opened collaborators.
    pub fn new(
        config: HappyConfig,
        store: Arc<dyn UserStore>,
        loader: Arc<dyn CatalogLoader>,
        languages: Vec<String>,
    ) -> Self {
        let settings = SessionSettings {
            min_lifespan: config.pool.min_user_lifespan(),
            percent_life: config.pool.percent_life,
        };
        let sessions = SessionPool::new(Arc::clone(&store), settings);
        let catalogs = CatalogPool::new(
            loader,
            languages,
            config.i18n.default_lang.clone(),
            config.pool.catalog_ttl(),
        );

        Self {
            config: Arc::new(config),
            store,
            sessions,
            catalogs,
        }
    }

    /// Open the SQLite store and the locale directory named by `config`.
    pub fn open(config: HappyConfig) -> Result<Self> {
        let store = SqliteUserStore::open(&config.storage.database)?;
        let languages = scan_languages(&config.i18n.locales_dir)?;
        let loader = DirCatalogLoader::new(&config.i18n.locales_dir);

        info!(
            database = %config.storage.database.display(),
            languages = ?languages,
            "bot context ready"
        );
        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(loader),
            languages,
        ))
    }

    pub fn config(&self) -> &HappyConfig {
        &self.config
    }

    /// The backing store. Reads through it bypass in-memory sessions.
    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionPool {
        &self.sessions
    }

    pub fn catalogs(&self) -> &CatalogPool {
        &self.catalogs
    }

    /// Installed languages.
    pub fn languages(&self) -> &[String] {
        self.catalogs.languages()
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.config.is_admin(user_id)
    }

    /// Translate `msgid` of `domain` into the language of `user_id`.
    ///
    /// Reading the user's language does not extend their session.
    pub async fn text_for(&self, user_id: UserId, domain: &str, msgid: &str) -> Result<String> {
        let lang = self.sessions.get_bypass(user_id).await?.record.lang;
        self.catalogs.translate(domain, &lang, msgid).await
    }

    /// Persist every in-memory session. Returns the number saved.
    pub async fn shutdown(&self) -> Result<usize> {
        let saved = self.sessions.flush().await?;
        let dropped = self.catalogs.clear().await?;
        info!(saved, dropped, "bot context shut down");
        Ok(saved)
    }
}

impl std::fmt::Debug for BotContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotContext")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("catalogs", &self.catalogs)
            .finish_non_exhaustive()
    }
}
