use std::collections::HashMap;

use crate::provider::base::{ConfigKey, ConfigProvider, ConfigProviderError};

/// Map-backed provider, mostly useful in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    values: HashMap<ConfigKey, String>,
}

impl StaticConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    async fn get_secret(&self, key: ConfigKey) -> Result<Option<String>, ConfigProviderError> {
        Ok(self.values.get(&key).cloned())
    }
}
