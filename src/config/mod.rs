pub mod toml_config;

pub use toml_config::{PolicyConfig, StockpileConfig, StorageConfig, TierConfig};
