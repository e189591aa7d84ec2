use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::core::{Result, TabqlError};

/// Connection configuration for a session.
///
/// All fields are required except `table`, which scopes an initial
/// current table right after connecting. `prefix` is prepended to every
/// table name the session is scoped to and is immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub hostname: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub prefix: String,
    pub table: Option<String>,
}

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DbConfig,
}

/// Loads a database configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = tabql::config::load_config("tabql.toml").expect("Failed to load config");
/// println!("{:?}", config.database);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| TabqlError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
[database]
hostname = "localhost"
port = 3306
database = "app"
username = "app"
password = "secret"
prefix = "app_"
table = "posts"
"#;

    #[test]
    fn test_load_config_from_str() {
        let config: Config = toml::from_str(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.database.hostname, "localhost");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.prefix, "app_");
        assert_eq!(config.database.table.as_deref(), Some("posts"));
    }

    #[test]
    fn test_prefix_defaults_to_empty() {
        let toml_str = r#"
[database]
hostname = "localhost"
port = 3306
database = "app"
username = "app"
password = "secret"
"#;
        let config: Config = toml::from_str(toml_str).expect("Failed to parse config");
        assert_eq!(config.database.prefix, "");
        assert!(config.database.table.is_none());
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let toml_str = r#"
[database]
hostname = "localhost"
"#;
        let result: std::result::Result<Config, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }
}
