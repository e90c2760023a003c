//! Configuration for the MySQL to BigQuery pipeline.
//!
//! Static settings come from layered configuration files (see [`load_config`]); connection
//! parameters are resolved per run through a [`provider::ConfigProvider`].

mod environment;
mod load;
pub mod provider;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from_directory};
