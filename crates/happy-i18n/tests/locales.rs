//! Catalog loading from a locale directory tree.

use std::fs;
use std::path::Path;

use happy_i18n::{Catalog, CatalogLoader, DirCatalogLoader, I18nError, catalog_path, scan_languages};
use tempfile::TempDir;

fn install(root: &Path, lang: &str, domain: &str, catalog: &Catalog) {
    let path = catalog_path(root, domain, lang);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, catalog.to_bytes()).unwrap();
}

fn greeting(text: &str) -> Catalog {
    let mut catalog = Catalog::new();
    catalog.insert("HELLO", text);
    catalog
}

#[tokio::test]
async fn test_loads_installed_catalog() {
    let dir = TempDir::new().unwrap();
    install(dir.path(), "fa", "main", &greeting("سلام"));

    let loader = DirCatalogLoader::new(dir.path());
    let catalog = loader.load_catalog("main", "fa").await.unwrap().unwrap();
    assert_eq!(catalog.gettext("HELLO"), "سلام");
}

#[tokio::test]
async fn test_missing_catalog_is_none() {
    let dir = TempDir::new().unwrap();
    install(dir.path(), "fa", "main", &greeting("سلام"));

    let loader = DirCatalogLoader::new(dir.path());
    assert!(loader.load_catalog("cmds", "fa").await.unwrap().is_none());
    assert!(loader.load_catalog("main", "de").await.unwrap().is_none());
}

#[tokio::test]
async fn test_corrupt_catalog_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = catalog_path(dir.path(), "main", "en");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"definitely not a catalog file").unwrap();

    let loader = DirCatalogLoader::new(dir.path());
    let err = loader.load_catalog("main", "en").await.unwrap_err();
    assert!(matches!(err, I18nError::Malformed(_)));
}

#[test]
fn test_scan_languages() {
    let dir = TempDir::new().unwrap();
    install(dir.path(), "fa", "main", &greeting("سلام"));
    install(dir.path(), "en", "main", &greeting("Hello"));
    install(dir.path(), "en", "cmds", &greeting("Hello"));
    // No catalogs inside.
    fs::create_dir_all(dir.path().join("de").join("LC_MESSAGES")).unwrap();
    // No LC_MESSAGES directory.
    fs::create_dir_all(dir.path().join("fr")).unwrap();
    fs::write(dir.path().join("README"), "locales").unwrap();

    assert_eq!(scan_languages(dir.path()).unwrap(), vec!["en", "fa"]);
}

#[test]
fn test_scan_missing_root() {
    let dir = TempDir::new().unwrap();
    assert!(scan_languages(&dir.path().join("absent")).unwrap().is_empty());
}
