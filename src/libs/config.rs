use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connection settings for the MySQL database.
///
/// Deserializes from the same camelCase JSON shape the configuration files
/// use:
///
/// ```json
/// { "user": "app", "password": "secret", "host": "db", "database": "app",
///   "parameters": { "ssl-mode": "disabled" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    /// Extra connection options, see [`Configuration::connect_options`].
    pub parameters: BTreeMap<String, String>,
    pub max_connections: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: String::new(),
            parameters: BTreeMap::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Configuration {
    pub fn new(host: &str, user: &str, password: &str, database: &str) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
            host: host.to_string(),
            database: database.to_string(),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, key: &str, value: &str) -> Self {
        self.parameters.insert(key.to_string(), value.to_string());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config("host is empty".to_string()));
        }
        if self.database.is_empty() {
            return Err(Error::Config("database is empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(Error::Config("maxConnections must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Typed sqlx connection options. Credentials are passed as is and never
    /// go through a url.
    ///
    /// Supported `parameters`: `ssl-mode`, `ssl-ca`, `charset`, `collation`,
    /// `timezone`, `socket` and `statement-cache-capacity`.
    pub fn connect_options(&self) -> Result<MySqlConnectOptions> {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }

        for (key, value) in &self.parameters {
            options = match key.as_str() {
                "ssl-mode" => options.ssl_mode(
                    MySqlSslMode::from_str(value)
                        .map_err(|e| Error::Config(format!("invalid ssl-mode {value:?}: {e}")))?,
                ),
                "ssl-ca" => options.ssl_ca(value),
                "charset" => options.charset(value),
                "collation" => options.collation(value),
                "timezone" => options.timezone(Some(value.clone())),
                "socket" => options.socket(value),
                "statement-cache-capacity" => options.statement_cache_capacity(
                    value
                        .parse()
                        .map_err(|e| Error::Config(format!("invalid statement-cache-capacity {value:?}: {e}")))?,
                ),
                other => {
                    return Err(Error::Config(format!("unsupported connection parameter `{other}`")));
                }
            };
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let config = Configuration::from_json_str(
            r#"{"user":"app","password":"pw","host":"db","database":"main","maxConnections":8}"#,
        )
        .unwrap();
        assert_eq!(config.port, 3306);
        assert_eq!(config.max_connections, 8);
    }

    #[test]
    fn reserved_characters_stay_in_the_password() {
        let options = Configuration::new("db", "app", "p@ss/w#rd", "main")
            .connect_options()
            .unwrap();
        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_port(), 3306);
        assert_eq!(options.get_database(), Some("main"));
        assert_eq!(options.get_username(), "app");
    }

    #[test]
    fn parameters_apply_through_the_builder() {
        let options = Configuration::new("db", "app", "", "main")
            .with_parameter("ssl-mode", "disabled")
            .with_parameter("charset", "latin1")
            .connect_options()
            .unwrap();
        assert!(matches!(options.get_ssl_mode(), MySqlSslMode::Disabled));
        assert_eq!(options.get_charset(), "latin1");

        let err = Configuration::new("db", "app", "", "main")
            .with_parameter("compress", "true")
            .connect_options()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Configuration::new("db", "app", "", "main")
            .with_parameter("ssl-mode", "sometimes")
            .connect_options()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_missing_database() {
        let err = Configuration::from_json_str(r#"{"host":"db"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
