use etl_config::load_config;
use etl_config::shared::ReplicatorConfig;

use crate::error::{ReplicatorError, ReplicatorResult};

/// Loads the layered replicator configuration and validates it.
pub fn load_replicator_config() -> ReplicatorResult<ReplicatorConfig> {
    let config = load_config::<ReplicatorConfig>().map_err(ReplicatorError::config)?;
    config.validate().map_err(ReplicatorError::config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use etl_config::{Environment, load_config_from_directory};

    use super::*;

    fn shipped_config(environment: Environment) -> ReplicatorConfig {
        let directory = Path::new(env!("CARGO_MANIFEST_DIR")).join("configuration");
        load_config_from_directory(&directory, environment).unwrap()
    }

    #[test]
    fn shipped_files_are_valid() {
        for environment in [Environment::Dev, Environment::Prod] {
            let config = shipped_config(environment);

            assert_eq!(config.validate(), Ok(()));
            assert_eq!(config.pipeline.tables.len(), 3);
        }
    }

    #[test]
    fn prod_file_leaves_secrets_project_unset() {
        let config = shipped_config(Environment::Prod);

        assert!(config.secrets.gcp_project_id.is_none());
    }
}
