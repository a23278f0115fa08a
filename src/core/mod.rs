pub mod bot;
pub mod filter;
pub mod listener;
pub mod price;
pub mod purchase;
pub mod queue;
pub mod supervisor;
pub mod worker;

pub use crate::domain::model::{Catalog, PostEvent, Product, PurchaseOutcome};
pub use crate::domain::ports::{BrowserDriver, BrowserSession, StreamClient, StreamListener};
pub use crate::utils::error::Result;
