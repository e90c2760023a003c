use secrecy::SecretString;
use tracing::info;

use crate::provider::base::{ConfigKey, ConfigProvider, ConfigProviderError};
use crate::shared::{BigQueryConfig, MySqlConnectionConfig};

/// Connection settings for one run, resolved from a [`ConfigProvider`].
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub mysql: MySqlConnectionConfig,
    pub bigquery: BigQueryConfig,
}

/// Resolves every [`ConfigKey`] through `provider`.
///
/// The password is optional, every other key without a default is required.
pub async fn resolve_connection_settings<P>(
    provider: &P,
    service_account_key_path: Option<String>,
) -> Result<ConnectionSettings, ConfigProviderError>
where
    P: ConfigProvider,
{
    let port = provider.resolve(ConfigKey::MysqlPort).await?;
    let port = port
        .trim()
        .parse::<u16>()
        .map_err(|err| ConfigProviderError::InvalidValue {
            key: ConfigKey::MysqlPort,
            reason: format!("`{port}` is not a port number: {err}"),
        })?;

    let mysql = MySqlConnectionConfig {
        host: provider.resolve(ConfigKey::MysqlHost).await?,
        port,
        name: provider.resolve(ConfigKey::MysqlDatabase).await?,
        username: provider.resolve(ConfigKey::MysqlUser).await?,
        password: provider
            .get_secret(ConfigKey::MysqlPassword)
            .await?
            .map(SecretString::new),
    };

    let bigquery = BigQueryConfig {
        project_id: provider.resolve(ConfigKey::GcpProjectId).await?,
        dataset_id: provider.resolve(ConfigKey::BigqueryDataset).await?,
        location: provider.resolve(ConfigKey::BigqueryLocation).await?,
        service_account_key_path,
    };

    info!(
        mysql_host = %mysql.host,
        mysql_port = mysql.port,
        mysql_database = %mysql.name,
        project_id = %bigquery.project_id,
        dataset_id = %bigquery.dataset_id,
        "resolved connection settings"
    );

    Ok(ConnectionSettings { mysql, bigquery })
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;
    use crate::provider::{LayeredConfigProvider, StaticConfigProvider};

    fn complete_provider() -> StaticConfigProvider {
        StaticConfigProvider::new()
            .with(ConfigKey::MysqlHost, "db.internal")
            .with(ConfigKey::MysqlUser, "etl")
            .with(ConfigKey::MysqlPassword, "s3cret")
            .with(ConfigKey::MysqlDatabase, "shop")
            .with(ConfigKey::GcpProjectId, "analytics")
    }

    #[tokio::test]
    async fn defaults_fill_optional_keys() {
        let settings = resolve_connection_settings(&complete_provider(), None)
            .await
            .unwrap();

        assert_eq!(settings.mysql.port, 3306);
        assert_eq!(settings.mysql.host, "db.internal");
        assert_eq!(
            settings.mysql.password.as_ref().unwrap().expose_secret(),
            "s3cret"
        );
        assert_eq!(settings.bigquery.dataset_id, "mysql_etl");
        assert_eq!(settings.bigquery.location, "US");
        assert_eq!(settings.bigquery.project_id, "analytics");
    }

    #[tokio::test]
    async fn missing_project_is_an_error() {
        let provider = StaticConfigProvider::new()
            .with(ConfigKey::MysqlHost, "db")
            .with(ConfigKey::MysqlUser, "etl")
            .with(ConfigKey::MysqlDatabase, "shop");

        let err = resolve_connection_settings(&provider, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigProviderError::Missing(ConfigKey::GcpProjectId)
        ));
    }

    #[tokio::test]
    async fn destination_comes_from_env_when_secrets_are_remote() {
        let secrets = StaticConfigProvider::new()
            .with(ConfigKey::MysqlHost, "db.internal")
            .with(ConfigKey::MysqlUser, "etl")
            .with(ConfigKey::MysqlPassword, "s3cret")
            .with(ConfigKey::MysqlDatabase, "shop");
        let env = StaticConfigProvider::new()
            .with(ConfigKey::GcpProjectId, "analytics-prod")
            .with(ConfigKey::BigqueryDataset, "analytics")
            .with(ConfigKey::BigqueryLocation, "EU")
            .with(ConfigKey::MysqlHost, "ignored");
        let provider = LayeredConfigProvider::new(secrets, env);

        let settings = resolve_connection_settings(&provider, None)
            .await
            .unwrap();

        assert_eq!(settings.mysql.host, "db.internal");
        assert_eq!(settings.mysql.port, 3306);
        assert_eq!(settings.bigquery.project_id, "analytics-prod");
        assert_eq!(settings.bigquery.dataset_id, "analytics");
        assert_eq!(settings.bigquery.location, "EU");
    }

    #[tokio::test]
    async fn non_numeric_port_is_rejected() {
        let provider = complete_provider().with(ConfigKey::MysqlPort, "mysql");

        let err = resolve_connection_settings(&provider, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigProviderError::InvalidValue {
                key: ConfigKey::MysqlPort,
                ..
            }
        ));
    }
}
