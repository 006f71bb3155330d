pub mod config;
pub mod db;
pub mod error;
pub mod providers;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use providers::{AlertStore, MarketDataProvider, Notifier, UserDirectory};
pub use types::*;
