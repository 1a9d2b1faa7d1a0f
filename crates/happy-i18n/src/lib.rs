//! Translation catalogs for the Happy bot.
//!
//! Catalogs are compiled GNU gettext `.mo` files laid out as
//! `<root>/<lang>/LC_MESSAGES/<domain>.mo`.

mod catalog;
mod error;
mod loader;

pub use catalog::Catalog;
pub use error::{I18nError, Result};
pub use loader::{CatalogLoader, DirCatalogLoader, catalog_path, scan_languages};
