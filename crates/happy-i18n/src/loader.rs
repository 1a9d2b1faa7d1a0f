//! Loading catalogs from a gettext locale directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{I18nError, Result};

const MESSAGES_DIR: &str = "LC_MESSAGES";

/// Source of translation catalogs.
#[async_trait]
pub trait CatalogLoader: Send + Sync {
    /// Load the catalog of `domain` in `lang`, or `None` if it isn't
    /// installed.
    async fn load_catalog(&self, domain: &str, lang: &str) -> Result<Option<Catalog>>;
}

/// Path of the catalog of `domain` in `lang` under `root`.
pub fn catalog_path(root: &Path, domain: &str, lang: &str) -> PathBuf {
    root.join(lang).join(MESSAGES_DIR).join(format!("{domain}.mo"))
}

/// Loads catalogs from `<root>/<lang>/LC_MESSAGES/<domain>.mo`.
#[derive(Debug, Clone)]
pub struct DirCatalogLoader {
    root: PathBuf,
}

impl DirCatalogLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl CatalogLoader for DirCatalogLoader {
    async fn load_catalog(&self, domain: &str, lang: &str) -> Result<Option<Catalog>> {
        let path = catalog_path(&self.root, domain, lang);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(domain, lang, "catalog not installed");
                return Ok(None);
            }
            Err(err) => return Err(I18nError::io(path, err)),
        };

        let catalog = Catalog::from_bytes(&bytes)?;
        debug!(domain, lang, entries = catalog.len(), "catalog loaded");
        Ok(Some(catalog))
    }
}

/// Languages installed under `root`: directories with an `LC_MESSAGES`
/// subdirectory holding at least one `.mo` file. Sorted.
///
/// A missing `root` has no languages.
pub fn scan_languages(root: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(I18nError::io(root, err)),
    };

    let mut langs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| I18nError::io(root, err))?;
        let messages = entry.path().join(MESSAGES_DIR);
        if !messages.is_dir() || !has_catalog(&messages)? {
            continue;
        }
        if let Some(lang) = entry.file_name().to_str() {
            langs.push(lang.to_string());
        }
    }

    langs.sort();
    Ok(langs)
}

fn has_catalog(dir: &Path) -> Result<bool> {
    for entry in std::fs::read_dir(dir).map_err(|err| I18nError::io(dir, err))? {
        let path = entry.map_err(|err| I18nError::io(dir, err))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "mo") {
            return Ok(true);
        }
    }
    Ok(false)
}
