use std::path::Path;
use std::{env, fs};

use anyhow::{anyhow, Context, Result};
use toml::Value;

use crate::migrations::BASELINE_EXCLUSIONS;

#[derive(Debug)]
pub(crate) struct Config {
    database: DatabaseConfig,
    settings: SettingsConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct SettingsConfig {
    pub environment: String,
    pub strict_verify: bool,
    pub baseline_exclusions: Vec<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: String::new(),
            database: "operations".to_string(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        SettingsConfig {
            environment: "development".to_string(),
            strict_verify: false,
            baseline_exclusions: BASELINE_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Reads `path` when it exists, then applies `.env` and process environment overrides.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let value = content.parse::<Value>()?;
            Config::from_toml(value)?
        } else {
            debug!("{} not found, using defaults", path.display());
            Config {
                database: DatabaseConfig::default(),
                settings: SettingsConfig::default(),
            }
        };

        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        config.apply_overrides(|key| env::var(key).ok())?;

        Ok(config)
    }

    pub(crate) fn from_toml(config: Value) -> Result<Self> {
        let database = parse_database_config(
            config
                .get("database")
                .ok_or(anyhow!("Missing or invalid database settings"))?
                .clone(),
        )?;
        let settings = match config.get("settings") {
            Some(settings) => parse_settings_config(settings.clone())?,
            None => SettingsConfig::default(),
        };

        Ok(Config { database, settings })
    }

    pub(crate) fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.database.port = port
                .parse()
                .with_context(|| format!("Invalid DB_PORT value: {}", port))?;
        }
        if let Some(username) = lookup("DB_USER") {
            self.database.username = username;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.database.password = password;
        }
        if let Some(database) = lookup("DB_NAME") {
            self.database.database = database;
        }
        if let Some(environment) = lookup("MIGRATE_ENV") {
            self.settings.environment = environment;
        }
        if let Some(strict) = lookup("MIGRATE_STRICT_VERIFY") {
            self.settings.strict_verify = parse_flag(&strict)
                .ok_or_else(|| anyhow!("Invalid MIGRATE_STRICT_VERIFY value: {}", strict))?;
        }

        Ok(())
    }

    pub fn database(&self) -> &DatabaseConfig {
        &self.database
    }

    pub fn settings(&self) -> &SettingsConfig {
        &self.settings
    }
}

fn parse_database_config(config: Value) -> Result<DatabaseConfig> {
    let host = config
        .get("host")
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing or invalid host"))?
        .to_string();

    let port = config
        .get("port")
        .and_then(|value| value.as_integer())
        .ok_or_else(|| anyhow!("Missing or invalid port"))?
        .try_into()?;

    let username = config
        .get("username")
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing or invalid username"))?
        .to_string();

    let password = config
        .get("password")
        .and_then(|value| value.as_str())
        .unwrap_or_default()
        .to_string();

    let database = config
        .get("database")
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing or invalid database"))?
        .to_string();

    Ok(DatabaseConfig {
        host,
        port,
        username,
        password,
        database,
    })
}

fn parse_settings_config(config: Value) -> Result<SettingsConfig> {
    let defaults = SettingsConfig::default();

    let environment = match config.get("environment") {
        Some(value) => value
            .as_str()
            .ok_or_else(|| anyhow!("Invalid environment"))?
            .to_string(),
        None => defaults.environment,
    };

    let strict_verify = match config.get("strict_verify") {
        Some(value) => value
            .as_bool()
            .ok_or_else(|| anyhow!("Invalid strict_verify flag"))?,
        None => defaults.strict_verify,
    };

    let mut baseline_exclusions = defaults.baseline_exclusions;
    if let Some(value) = config.get("baseline_exclusions") {
        let extra = value
            .as_array()
            .ok_or_else(|| anyhow!("Invalid baseline exclusions"))?
            .iter()
            .filter_map(|value| value.as_str().map(|s| s.to_string()));

        for name in extra {
            if !baseline_exclusions.contains(&name) {
                baseline_exclusions.push(name);
            }
        }
    }

    Ok(SettingsConfig {
        environment,
        strict_verify,
        baseline_exclusions,
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const CONFIG: &str = r#"
        [database]
        host = "db.internal"
        port = 3307
        username = "migrator"
        password = "secret"
        database = "operations"

        [settings]
        environment = "staging"
        baseline_exclusions = ["20240301_create_invoices"]
    "#;

    #[test]
    fn parses_config_file() {
        let config = Config::from_toml(CONFIG.parse::<Value>().unwrap()).unwrap();

        assert_eq!(config.database().host, "db.internal");
        assert_eq!(config.database().port, 3307);
        assert_eq!(config.settings().environment, "staging");
        assert!(!config.settings().strict_verify);
        assert!(config
            .settings()
            .baseline_exclusions
            .contains(&"20240301_create_invoices".to_string()));
        assert!(config
            .settings()
            .baseline_exclusions
            .contains(&"20240205_create_staff_shifts".to_string()));
    }

    #[test]
    fn missing_database_section_is_an_error() {
        let value = "[settings]\nstrict_verify = true".parse::<Value>().unwrap();

        assert!(Config::from_toml(value).is_err());
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = Config::from_toml(CONFIG.parse::<Value>().unwrap()).unwrap();
        let env: HashMap<&str, &str> = [
            ("DB_HOST", "10.0.0.5"),
            ("DB_PORT", "3310"),
            ("MIGRATE_STRICT_VERIFY", "true"),
        ]
        .into_iter()
        .collect();

        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database().host, "10.0.0.5");
        assert_eq!(config.database().port, 3310);
        assert!(config.settings().strict_verify);
    }

    #[test]
    fn rejects_invalid_strict_flag() {
        let mut config = Config::from_toml(CONFIG.parse::<Value>().unwrap()).unwrap();

        let result = config.apply_overrides(|key| {
            (key == "MIGRATE_STRICT_VERIFY").then(|| "sometimes".to_string())
        });

        assert!(result.is_err());
    }
}
