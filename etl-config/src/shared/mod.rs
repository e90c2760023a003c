//! Configuration types shared by the pipeline crates.

mod base;
mod connection;
mod destination;
mod pipeline;
mod replicator;
mod table;

pub use base::ValidationError;
pub use connection::{DEFAULT_MYSQL_PORT, MySqlConnectionConfig};
pub use destination::{
    BigQueryConfig, DEFAULT_BIGQUERY_DATASET, DEFAULT_BIGQUERY_LOCATION, DestinationConfig,
};
pub use pipeline::{PipelineConfig, TableErrorPolicy};
pub use replicator::{ReplicatorConfig, SecretsConfig, ServerConfig};
pub use table::{TableSpec, Transformation, default_tables};
