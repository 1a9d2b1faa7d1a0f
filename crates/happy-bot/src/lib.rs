//! Domain pools of the Happy bot.
//!
//! - [`SessionPool`]: user sessions loaded from the user store on demand
//!   and written back when they leave memory
//! - [`CatalogPool`]: translation catalogs keyed by [`DomainLang`], with
//!   fallback to the default language
//! - [`BotContext`]: the explicit shared state handlers receive

mod catalog;
mod context;
mod error;
mod session;

pub use catalog::{CatalogPool, DomainLang};
pub use context::BotContext;
pub use error::{BotError, Result};
pub use session::{SessionPool, SessionSettings, UserSession, WizardSlot};
