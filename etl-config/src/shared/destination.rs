use serde::Deserialize;

/// Default BigQuery dataset receiving the tables.
pub const DEFAULT_BIGQUERY_DATASET: &str = "mysql_etl";

/// Default location used when the dataset has to be created.
pub const DEFAULT_BIGQUERY_LOCATION: &str = "US";

/// Resolved BigQuery destination settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigQueryConfig {
    pub project_id: String,
    pub dataset_id: String,
    pub location: String,
    /// Service account key file; application default credentials are used when absent.
    pub service_account_key_path: Option<String>,
}

/// Static destination settings read from the configuration files.
///
/// Project, dataset and location are resolved at run time through a
/// [`crate::provider::ConfigProvider`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DestinationConfig {
    #[serde(default)]
    pub service_account_key_path: Option<String>,
}
