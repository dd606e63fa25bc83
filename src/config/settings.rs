//! Process settings from the environment.

use crate::error::ConfigError;
use std::path::PathBuf;

/// Which store backs the resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            _ => Err(ConfigError::Validation(format!(
                "invalid STORE: {} (expected postgres or memory)",
                s
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub model_config: PathBuf,
    pub bind_addr: String,
    pub store: StoreKind,
    pub max_connections: u32,
}

impl Settings {
    /// Read `DATABASE_URL`, `MODEL_CONFIG`, `BIND_ADDR`, `STORE`, `DB_MAX_CONNECTIONS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Like [`Settings::from_env`] after loading a `.env` file if one exists.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = match get("STORE") {
            Some(s) => s.parse()?,
            None => StoreKind::Postgres,
        };
        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(s) => s
                .parse()
                .map_err(|_| ConfigError::Validation(format!("invalid DB_MAX_CONNECTIONS: {}", s)))?,
            None => 5,
        };
        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/model_api".into()),
            model_config: get("MODEL_CONFIG").unwrap_or_else(|| "model.json".into()).into(),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            store,
            max_connections,
        })
    }
}
