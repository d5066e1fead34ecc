mod env_overrides;
mod loader;
mod schema;

pub use schema::{CatalogConfig, Config, HttpConfig, OnDeviceConfig, ProviderConfig, ProvidersConfig};
