//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::application::errors::ConfigError;

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub account: AccountConfig,
    pub console: ConsoleConfig,
    pub logging: LoggingConfig,
    pub plugins: PluginConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    pub database: PathBuf,
    /// Seconds to wait for the inbox worker on shutdown
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AccountConfig {
    pub address: Option<String>,
    pub display_name: Option<String>,
}

impl AccountConfig {
    /// Transport config entries this section pins, as `(key, value)`.
    pub fn overrides(&self) -> Vec<(&'static str, &str)> {
        let mut entries = Vec::new();
        if let Some(address) = &self.address {
            entries.push(("addr", address.as_str()));
        }
        if let Some(name) = &self.display_name {
            entries.push(("displayname", name.as_str()));
        }
        entries
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConsoleConfig {
    /// Address the console user sends messages as
    pub sender: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PluginConfig {
    /// Bundled plugins enabled without `plugin --add`
    pub enabled: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "plugbot".to_string(),
            database: PathBuf::from("plugbot.db"),
            shutdown_timeout_secs: 10,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            sender: "user@localhost".to_string(),
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: vec!["echo".to_string()],
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, else the defaults; then apply environment
    /// overrides.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        Ok(config.with_env())
    }

    fn with_env(mut self) -> Self {
        if let Ok(database) = std::env::var("BOT_DATABASE") {
            self.bot.database = PathBuf::from(database);
        }

        if let Ok(addr) = std::env::var("BOT_ADDR") {
            self.account.address = Some(addr);
        }

        if let Ok(level) = std::env::var("BOT_LOG") {
            self.logging.level = Some(level);
        }

        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.shutdown_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "bot.shutdown-timeout-secs must be positive".to_string(),
            ));
        }
        if self.console.sender.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "console.sender must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.bot.shutdown_timeout_secs)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            "bot:\n  name: testbot\n  shutdown-timeout-secs: 3\nplugins:\n  enabled: []\n",
        )
        .unwrap();
        assert_eq!(config.bot.name, "testbot");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(3));
        assert_eq!(config.bot.database, PathBuf::from("plugbot.db"));
        assert!(config.plugins.enabled.is_empty());
        assert_eq!(config.console.sender, "user@localhost");
    }

    #[test]
    fn test_load_rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "bot:\n  shutdown-timeout-secs: 0\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_yaml_round_trip_of_defaults() {
        let yaml = Config::default().to_yaml().unwrap();
        assert!(yaml.contains("shutdown-timeout-secs: 10"));
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.plugins.enabled, vec!["echo"]);
    }

    #[test]
    fn test_account_overrides() {
        assert!(AccountConfig::default().overrides().is_empty());
        let config: Config =
            serde_yaml::from_str("account:\n  address: bot@example.org\n  display-name: Bot\n")
                .unwrap();
        assert_eq!(
            config.account.overrides(),
            vec![("addr", "bot@example.org"), ("displayname", "Bot")]
        );
    }

    #[test]
    fn test_env_address_override() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("BOT_ADDR", "env@example.org");
        let config = Config::load_or_default(dir.path().join("absent.yaml")).unwrap();
        std::env::remove_var("BOT_ADDR");
        assert_eq!(config.account.address.as_deref(), Some("env@example.org"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.bot.name, "plugbot");
    }
}
