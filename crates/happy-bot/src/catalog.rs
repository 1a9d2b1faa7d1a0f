//! Translation catalogs kept in memory while they are in use.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use happy_i18n::{Catalog, CatalogLoader};
use happy_pool::{HookError, Hooks, MissHook, PoolConfig, PoolStats, SchedPool};
use tracing::{error, warn};

use crate::error::{BotError, Result};

/// Key of a catalog: a message domain in a language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainLang {
    pub domain: String,
    pub lang: String,
}

impl DomainLang {
    pub fn new(domain: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            lang: lang.into(),
        }
    }
}

impl fmt::Display for DomainLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.lang)
    }
}

struct LoaderHook(Arc<dyn CatalogLoader>);

#[async_trait]
impl MissHook<DomainLang, Arc<Catalog>> for LoaderHook {
    async fn load(&self, key: &DomainLang) -> std::result::Result<Option<Arc<Catalog>>, HookError> {
        let catalog = self.0.load_catalog(&key.domain, &key.lang).await?;
        Ok(catalog.map(Arc::new))
    }
}

/// Pool of catalogs loaded on demand and dropped when idle.
#[derive(Debug, Clone)]
pub struct CatalogPool {
    pool: SchedPool<DomainLang, Arc<Catalog>>,
    languages: Arc<[String]>,
    default_lang: String,
}

impl CatalogPool {
    /// `languages` are the installed languages; `default_lang` is used when
    /// a domain is missing in the requested one.
    pub fn new(
        loader: Arc<dyn CatalogLoader>,
        languages: Vec<String>,
        default_lang: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let mut hooks = Hooks::new();
        hooks.register_loader(Arc::new(LoaderHook(loader)));

        Self {
            pool: SchedPool::with_hooks(PoolConfig::new().with_ttl(ttl), hooks),
            languages: languages.into(),
            default_lang: default_lang.into(),
        }
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }

    pub fn supports(&self, lang: &str) -> bool {
        self.languages.iter().any(|l| l == lang)
    }

    /// The catalog of `domain` in `lang`.
    ///
    /// Fails with [`BotError::UnsupportedLanguage`] when no such catalog is
    /// installed.
    pub async fn get(&self, domain: &str, lang: &str) -> Result<Arc<Catalog>> {
        self.lookup(domain, lang)
            .await?
            .ok_or_else(|| BotError::UnsupportedLanguage(lang.to_string()))
    }

    async fn lookup(&self, domain: &str, lang: &str) -> Result<Option<Arc<Catalog>>> {
        match self.pool.get(&DomainLang::new(domain, lang)).await {
            Ok(catalog) => Ok(Some(catalog)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Translate `msgid` of `domain` into `lang`.
    ///
    /// A domain missing in `lang` is looked up in the default language.
    /// An untranslated msgid is returned unchanged.
    pub async fn translate(&self, domain: &str, lang: &str, msgid: &str) -> Result<String> {
        if !self.supports(lang) {
            return Err(BotError::UnsupportedLanguage(lang.to_string()));
        }

        let (catalog, used_lang) = match self.lookup(domain, lang).await? {
            Some(catalog) => (catalog, lang),
            None => {
                error!(domain, lang, "domain missing, falling back to the default language");
                let fallback = self.default_lang.as_str();
                match self.lookup(domain, fallback).await? {
                    Some(catalog) => (catalog, fallback),
                    None => {
                        error!(domain, lang = fallback, "domain missing in the default language");
                        return Err(BotError::DomainNotFound {
                            domain: domain.to_string(),
                            lang: fallback.to_string(),
                        });
                    }
                }
            }
        };

        match catalog.translate(msgid) {
            Some(text) => Ok(text.to_string()),
            None => {
                warn!(msgid, domain, lang = used_lang, "untranslated message");
                Ok(msgid.to_string())
            }
        }
    }

    /// Drop every loaded catalog.
    pub async fn clear(&self) -> Result<usize> {
        Ok(self.pool.clear().await?)
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
}
