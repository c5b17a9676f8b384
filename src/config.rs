//! Layered settings for the dealership engine.
//!
//! Sources, lowest precedence first:
//! 1. Defaults in code
//! 2. An optional `dealerbook.toml` in the working directory
//! 3. Environment variables with the `DEALERBOOK__` prefix, e.g.
//!    `DEALERBOOK__AUTH__JWT_SECRET`

use config::{ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_DATABASE_PATH: &str = "dealerbook.db";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Path of the SQLite file
    pub path: String,

    /// Upper bound on pooled connections
    pub max_connections: u32,

    /// How long a writer waits on a locked database before giving up
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// HS256 signing secret for session tokens
    pub jwt_secret: String,

    pub token_ttl_hours: i64,

    /// bcrypt work factor for new password hashes
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Settings {
    /// Load settings from defaults, the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let settings = config::Config::builder()
            .set_default("database.path", defaults.database.path)?
            .set_default("database.max_connections", defaults.database.max_connections)?
            .set_default("database.busy_timeout_ms", defaults.database.busy_timeout_ms)?
            .set_default("auth.jwt_secret", defaults.auth.jwt_secret)?
            .set_default("auth.token_ttl_hours", defaults.auth.token_ttl_hours)?
            .set_default("auth.bcrypt_cost", defaults.auth.bcrypt_cost)?
            .set_default("log.filter", defaults.log.filter)?
            .add_source(File::with_name("dealerbook").required(false))
            .add_source(
                Environment::with_prefix("DEALERBOOK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn with_database_path(mut self, path: impl Into<String>) -> Self {
        self.database.path = path.into();
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            auth: AuthSettings::default(),
            log: LogSettings {
                filter: "dealerbook=info,sqlx=warn".to_string(),
            },
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: DEFAULT_DATABASE_PATH.to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production".to_string(),
            token_ttl_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.database.path, DEFAULT_DATABASE_PATH);
        assert_eq!(settings.auth.token_ttl_hours, 24);
        assert!(settings.database.busy_timeout_ms > 0);
    }

    #[test]
    fn test_with_database_path() {
        let settings = Settings::default().with_database_path("/tmp/other.db");
        assert_eq!(settings.database.path, "/tmp/other.db");
    }
}
