use std::fmt;
use std::future::Future;

use thiserror::Error;

use crate::shared::{DEFAULT_BIGQUERY_DATASET, DEFAULT_BIGQUERY_LOCATION};

/// The fixed set of values a [`ConfigProvider`] resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    MysqlHost,
    MysqlPort,
    MysqlUser,
    MysqlPassword,
    MysqlDatabase,
    GcpProjectId,
    BigqueryDataset,
    BigqueryLocation,
}

impl ConfigKey {
    /// All keys, in resolution order.
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::MysqlHost,
        ConfigKey::MysqlPort,
        ConfigKey::MysqlUser,
        ConfigKey::MysqlPassword,
        ConfigKey::MysqlDatabase,
        ConfigKey::GcpProjectId,
        ConfigKey::BigqueryDataset,
        ConfigKey::BigqueryLocation,
    ];

    /// Environment variable and secret name of the key.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::MysqlHost => "MYSQL_HOST",
            ConfigKey::MysqlPort => "MYSQL_PORT",
            ConfigKey::MysqlUser => "MYSQL_USER",
            ConfigKey::MysqlPassword => "MYSQL_PASSWORD",
            ConfigKey::MysqlDatabase => "MYSQL_DATABASE",
            ConfigKey::GcpProjectId => "GCP_PROJECT_ID",
            ConfigKey::BigqueryDataset => "BIGQUERY_DATASET",
            ConfigKey::BigqueryLocation => "BIGQUERY_LOCATION",
        }
    }

    /// Value used when the provider has nothing for the key.
    pub fn default_value(&self) -> Option<&'static str> {
        match self {
            ConfigKey::MysqlPort => Some("3306"),
            ConfigKey::BigqueryDataset => Some(DEFAULT_BIGQUERY_DATASET),
            ConfigKey::BigqueryLocation => Some(DEFAULT_BIGQUERY_LOCATION),
            _ => None,
        }
    }

    /// Whether the key is kept in the secret store outside of development.
    ///
    /// Only the MySQL connection parameters are secrets; the BigQuery target always comes
    /// from the process environment.
    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            ConfigKey::MysqlHost
                | ConfigKey::MysqlPort
                | ConfigKey::MysqlUser
                | ConfigKey::MysqlPassword
                | ConfigKey::MysqlDatabase
        )
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while resolving configuration values.
#[derive(Debug, Error)]
pub enum ConfigProviderError {
    #[error("no value configured for `{0}`")]
    Missing(ConfigKey),

    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: ConfigKey, reason: String },

    #[error("secret manager request for `{key}` failed: {source}")]
    Request {
        key: ConfigKey,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to obtain an access token from the metadata server: {0}")]
    Token(#[source] reqwest::Error),

    #[error("secret `{key}` has a malformed payload: {reason}")]
    MalformedPayload { key: ConfigKey, reason: String },
}

/// Source of connection parameters.
///
/// Implementations return `Ok(None)` for keys they do not hold; [`ConfigProvider::resolve`]
/// then falls back to the key's default.
pub trait ConfigProvider: Sync {
    /// Looks up the raw value of `key`.
    fn get_secret(
        &self,
        key: ConfigKey,
    ) -> impl Future<Output = Result<Option<String>, ConfigProviderError>> + Send;

    /// Looks up `key`, falling back to its default, and fails when neither exists.
    fn resolve(
        &self,
        key: ConfigKey,
    ) -> impl Future<Output = Result<String, ConfigProviderError>> + Send {
        async move {
            match self.get_secret(key).await? {
                Some(value) => Ok(value),
                None => key
                    .default_value()
                    .map(str::to_owned)
                    .ok_or(ConfigProviderError::Missing(key)),
            }
        }
    }
}
