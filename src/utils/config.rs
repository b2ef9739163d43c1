// Centralized configuration for the logging bot

use anyhow::{bail, Context as _, Result};
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::env;

/// Config file used when `LOGGINGS_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Discord embed colors
pub mod colors {
    pub const MEMBER_JOIN: u32 = 0x00ff00;
    pub const SUCCESS: u32 = 0x2ecc71;
    pub const ERROR: u32 = 0xff0000;
}

/// Supported database drivers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Postgres,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct DiscordConfig {
    /// Bot token
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// SQLite file path (or `:memory:`), or a `postgres://` connection URL
    #[serde(default)]
    pub dsn: String,
}

/// Application configuration
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load `path` (optional) and apply environment overrides such as
    /// `DISCORD_TOKEN`, `DATABASE_DRIVER` and `DATABASE_DSN`.
    pub fn load(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::new(path, FileFormat::Yaml).required(false))
            .set_override_option("discord.token", env::var("DISCORD_TOKEN").ok())?
            .set_override_option("database.driver", env::var("DATABASE_DRIVER").ok())?
            .set_override_option("database.dsn", env::var("DATABASE_DSN").ok())?
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self> {
        let app_config = config
            .try_deserialize::<AppConfig>()
            .context("Failed to parse config")?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord.token.is_empty() {
            bail!("discord token is required (set DISCORD_TOKEN)");
        }
        if self.database.dsn.is_empty() {
            bail!("database dsn is required (set DATABASE_DSN)");
        }
        Ok(())
    }
}
