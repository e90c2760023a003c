use etl::bigquery::BigQueryClient;
use etl::destination::BigQueryDestination;
use etl::error::EtlResult;
use etl::pipeline::{Pipeline, RunSummary};
use etl::source::{MySqlSource, Source};
use etl::store::watermark::BigQueryWatermarkStore;
use etl_config::Environment;
use etl_config::provider::{
    ConnectionSettings, EnvConfigProvider, LayeredConfigProvider, SecretManagerProvider,
    resolve_connection_settings,
};
use etl_config::shared::{BigQueryConfig, PipelineConfig, ReplicatorConfig, ValidationError};
use tracing::info;

use crate::error::{ReplicatorError, ReplicatorResult};

/// Resolves connection settings for `environment` and runs the pipeline once.
///
/// Development reads every connection parameter from environment variables. Production reads
/// the MySQL parameters from Secret Manager in `secrets.gcp_project_id` and the BigQuery
/// target from environment variables.
pub async fn run_pipeline(
    config: &ReplicatorConfig,
    environment: Environment,
) -> ReplicatorResult<RunSummary> {
    info!(%environment, tables = config.pipeline.tables.len(), "starting etl run");

    let settings = resolve_settings(config, environment).await?;
    let summary = run_with_settings(config.pipeline.clone(), settings).await?;

    Ok(summary)
}

async fn resolve_settings(
    config: &ReplicatorConfig,
    environment: Environment,
) -> ReplicatorResult<ConnectionSettings> {
    let key_path = config.destination.service_account_key_path.clone();

    let settings = if environment.uses_secret_manager() {
        let project_id = config
            .secrets
            .gcp_project_id
            .clone()
            .ok_or(ValidationError::MissingSecretsProject(environment.as_str()))
            .map_err(ReplicatorError::config)?;
        let provider = LayeredConfigProvider::new(
            SecretManagerProvider::new(project_id),
            EnvConfigProvider::new(),
        );

        resolve_connection_settings(&provider, key_path).await
    } else {
        resolve_connection_settings(&EnvConfigProvider::new(), key_path).await
    };

    settings.map_err(ReplicatorError::config)
}

/// Opens both connections, then builds and runs the pipeline.
///
/// A connection failure ends the run before any table is touched.
async fn run_with_settings(
    pipeline_config: PipelineConfig,
    settings: ConnectionSettings,
) -> EtlResult<RunSummary> {
    let source = MySqlSource::connect(&settings.mysql).await?;

    let client = match connect_bigquery(&settings.bigquery).await {
        Ok(client) => client,
        Err(err) => {
            source.close().await;
            return Err(err);
        }
    };

    let BigQueryConfig {
        dataset_id,
        location,
        ..
    } = settings.bigquery;

    let store = BigQueryWatermarkStore::new(client.clone(), dataset_id.clone(), location.clone());
    let destination = BigQueryDestination::new(client, dataset_id, location);

    let mut pipeline = Pipeline::new(pipeline_config, source, destination, store);
    pipeline.run().await
}

async fn connect_bigquery(config: &BigQueryConfig) -> EtlResult<BigQueryClient> {
    let project_id = config.project_id.clone();

    match &config.service_account_key_path {
        Some(path) => {
            info!(
                project_id = %project_id,
                "authenticating to bigquery with a service account key"
            );
            BigQueryClient::new_with_key_path(project_id, path).await
        }
        None => {
            info!(
                project_id = %project_id,
                "authenticating to bigquery with application default credentials"
            );
            BigQueryClient::new_with_adc(project_id).await
        }
    }
}
