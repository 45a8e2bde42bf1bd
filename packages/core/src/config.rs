use std::env;
use std::time::Duration;

use crate::cli::{ApiCli, WorkerCli};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://weather.db";
pub const DEFAULT_RABBITMQ_URL: &str = "amqp://rabbitmq:5672";
pub const DEFAULT_OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;
pub const DEFAULT_NOTIFICATION_DELAY_MS: u64 = 1000;

/// Settings for the `weather-api` binary.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub database_url: String,
    pub rabbitmq_url: String,
    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub cache_ttl: Duration,
    pub cache_max_entries: u64,
}

/// Settings for the `email-worker` binary.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub rabbitmq_url: String,
    pub notification_delay: Duration,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, String> {
        let openweather_api_key = env::var("OPENWEATHER_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or("OPENWEATHER_API_KEY is required")?;

        Ok(Self {
            port: parse_var("PORT", DEFAULT_PORT)?,
            database_url: var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            rabbitmq_url: var_or("RABBITMQ_URL", DEFAULT_RABBITMQ_URL),
            openweather_api_key,
            openweather_base_url: var_or("OPENWEATHER_API_BASE_URL", DEFAULT_OPENWEATHER_URL),
            cache_ttl: Duration::from_secs(parse_var(
                "CACHE_TTL_SECONDS",
                DEFAULT_CACHE_TTL_SECONDS,
            )?),
            cache_max_entries: parse_var("CACHE_MAX_ENTRIES", DEFAULT_CACHE_MAX_ENTRIES)?,
        })
    }

    /// Command-line flags win over the environment.
    pub fn with_cli(mut self, cli: &ApiCli) -> Self {
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(url) = &cli.database_url {
            self.database_url = url.clone();
        }
        if let Some(url) = &cli.rabbitmq_url {
            self.rabbitmq_url = url.clone();
        }
        self
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            rabbitmq_url: var_or("RABBITMQ_URL", DEFAULT_RABBITMQ_URL),
            notification_delay: Duration::from_millis(parse_var(
                "NOTIFICATION_DELAY_MS",
                DEFAULT_NOTIFICATION_DELAY_MS,
            )?),
        })
    }

    pub fn with_cli(mut self, cli: &WorkerCli) -> Self {
        if let Some(url) = &cli.rabbitmq_url {
            self.rabbitmq_url = url.clone();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize the tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const API_VARS: &[&str] = &[
        "OPENWEATHER_API_KEY",
        "PORT",
        "DATABASE_URL",
        "RABBITMQ_URL",
        "OPENWEATHER_API_BASE_URL",
        "CACHE_TTL_SECONDS",
        "CACHE_MAX_ENTRIES",
        "NOTIFICATION_DELAY_MS",
    ];

    fn clear_env() {
        for name in API_VARS {
            env::remove_var(name);
        }
    }

    #[test]
    fn api_config_requires_api_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        assert!(ApiConfig::from_env().unwrap_err().contains("OPENWEATHER_API_KEY"));

        env::set_var("OPENWEATHER_API_KEY", "   ");
        assert!(ApiConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    fn api_config_applies_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("OPENWEATHER_API_KEY", "secret");

        let config = ApiConfig::from_env().unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.openweather_base_url, DEFAULT_OPENWEATHER_URL);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.cache_max_entries, DEFAULT_CACHE_MAX_ENTRIES);
        clear_env();
    }

    #[test]
    fn api_config_rejects_non_numeric_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("OPENWEATHER_API_KEY", "secret");
        env::set_var("PORT", "eighty");

        assert_eq!(
            ApiConfig::from_env().unwrap_err(),
            "PORT must be a valid number"
        );
        clear_env();
    }

    #[test]
    fn cli_flags_override_environment() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("OPENWEATHER_API_KEY", "secret");
        env::set_var("PORT", "8080");

        let cli = ApiCli {
            port: Some(9090),
            database_url: Some("sqlite::memory:".into()),
            rabbitmq_url: None,
        };
        let config = ApiConfig::from_env().unwrap().with_cli(&cli);

        assert_eq!(config.port, 9090);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.rabbitmq_url, DEFAULT_RABBITMQ_URL);
        clear_env();
    }

    #[test]
    fn worker_config_reads_delay() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("NOTIFICATION_DELAY_MS", "250");

        let config = WorkerConfig::from_env().unwrap();

        assert_eq!(config.notification_delay, Duration::from_millis(250));
        assert_eq!(config.rabbitmq_url, DEFAULT_RABBITMQ_URL);
        clear_env();
    }
}
