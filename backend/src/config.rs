use anyhow::{Context, Result};

use crate::weather::OPEN_WEATHER_API_URL;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub port: u16,
    pub cors_allowed_origin: Option<String>,
    pub openweather_api_key: Option<String>,
    pub openweather_api_url: String,
}

impl Config {
    const DATABASE_URL_ENV_VAR: &'static str = "DATABASE_URL";
    const BIND_ADDRESS_ENV_VAR: &'static str = "BIND_ADDRESS";
    const PORT_ENV_VAR: &'static str = "PORT";
    const CORS_ALLOWED_ORIGIN_ENV_VAR: &'static str = "CORS_ALLOWED_ORIGIN";
    const OPENWEATHER_API_KEY_ENV_VAR: &'static str = "OPENWEATHER_API_KEY";
    const OPENWEATHER_API_URL_ENV_VAR: &'static str = "OPENWEATHER_API_URL";

    const DEFAULT_BIND_ADDRESS: &'static str = "127.0.0.1";
    const DEFAULT_PORT: u16 = 8081;

    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self> {
        if let Err(err) = dotenvy::dotenv() {
            log::debug!("No .env file loaded: {err}");
        }
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = var(Self::DATABASE_URL_ENV_VAR)
            .with_context(|| format!("{} must be set", Self::DATABASE_URL_ENV_VAR))?;

        let port = match var(Self::PORT_ENV_VAR) {
            Some(port) => port
                .trim()
                .parse()
                .with_context(|| format!("{} is not a valid port: `{port}`", Self::PORT_ENV_VAR))?,
            None => Self::DEFAULT_PORT,
        };

        Ok(Self {
            database_url,
            bind_address: var(Self::BIND_ADDRESS_ENV_VAR)
                .unwrap_or_else(|| Self::DEFAULT_BIND_ADDRESS.to_string()),
            port,
            cors_allowed_origin: var(Self::CORS_ALLOWED_ORIGIN_ENV_VAR),
            openweather_api_key: var(Self::OPENWEATHER_API_KEY_ENV_VAR),
            openweather_api_url: var(Self::OPENWEATHER_API_URL_ENV_VAR)
                .unwrap_or_else(|| OPEN_WEATHER_API_URL.to_string()),
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.openweather_api_key
            .as_deref()
            .with_context(|| format!("{} must be set", Self::OPENWEATHER_API_KEY_ENV_VAR))
    }
}
