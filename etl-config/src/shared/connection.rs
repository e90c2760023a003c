use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;

/// Default MySQL server port.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Connection settings for the MySQL source database.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MySqlConnectionConfig {
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    /// Database (schema) name.
    pub name: String,
    pub username: String,
    pub password: Option<SecretString>,
}

fn default_mysql_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

impl MySqlConnectionConfig {
    /// Builds sqlx connect options targeting the configured database.
    pub fn with_db(&self) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .database(&self.name);

        match &self.password {
            Some(password) => options.password(password.expose_secret()),
            None => options,
        }
    }
}
