pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{AuditLog, HttpStreamClient, WebDriverClient};
pub use config::{BotConfig, BrowserKind, CatalogFile};
pub use core::bot::{BotOutcome, RestockBot};
pub use core::supervisor::StreamSupervisor;
pub use core::worker::WorkerContext;
pub use utils::error::{BotError, Result};
