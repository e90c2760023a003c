use crate::provider::base::{ConfigKey, ConfigProvider, ConfigProviderError};

/// Resolves secret keys through `secrets` and every other key through `env`.
///
/// See [`ConfigKey::is_secret`] for the split.
#[derive(Debug)]
pub struct LayeredConfigProvider<S, E> {
    secrets: S,
    env: E,
}

impl<S, E> LayeredConfigProvider<S, E> {
    pub fn new(secrets: S, env: E) -> Self {
        Self { secrets, env }
    }
}

impl<S, E> ConfigProvider for LayeredConfigProvider<S, E>
where
    S: ConfigProvider,
    E: ConfigProvider,
{
    async fn get_secret(&self, key: ConfigKey) -> Result<Option<String>, ConfigProviderError> {
        if key.is_secret() {
            self.secrets.get_secret(key).await
        } else {
            self.env.get_secret(key).await
        }
    }
}
