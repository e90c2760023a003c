use std::fmt;

use crate::provider::base::{ConfigKey, ConfigProvider, ConfigProviderError};

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Provider reading keys from process environment variables, used in development.
///
/// Empty values are treated as unset.
pub struct EnvConfigProvider {
    lookup: Lookup,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Creates a provider reading variables through `lookup` instead of the process environment.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }
}

impl Default for EnvConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnvConfigProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvConfigProvider").finish_non_exhaustive()
    }
}

impl ConfigProvider for EnvConfigProvider {
    async fn get_secret(&self, key: ConfigKey) -> Result<Option<String>, ConfigProviderError> {
        Ok((self.lookup)(key.name()).filter(|value| !value.is_empty()))
    }
}
