//! Resolution of connection parameters from environment variables or a secret manager.

mod base;
mod env;
mod layered;
mod memory;
mod resolve;
mod secret_manager;

pub use base::{ConfigKey, ConfigProvider, ConfigProviderError};
pub use env::EnvConfigProvider;
pub use layered::LayeredConfigProvider;
pub use memory::StaticConfigProvider;
pub use resolve::{ConnectionSettings, resolve_connection_settings};
pub use secret_manager::SecretManagerProvider;
