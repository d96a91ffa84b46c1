pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{LocalStorage, MemoryStorage};
pub use config::{PolicyConfig, StockpileConfig, TierConfig};
pub use core::{dispenser::Dispenser, inventory::InventoryStore, policy::AccessPolicy};
pub use domain::model::{AccessGrant, Quota, Record, RestockOutcome, ServiceName, StockReport};
pub use utils::error::{StockError, Result};
