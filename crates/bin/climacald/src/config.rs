//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `climacal.toml` in the working directory (or the path in
//! `CLIMACAL_CONFIG`). Every field has a default so the file is optional.
//! Environment variables take precedence over file values.

use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use climacal_app::coordinator::CoordinatorSettings;
use climacal_app::executor::RetryPolicy;
use climacal_domain::binding::Binding;
use climacal_domain::calendar_event::CalendarEvent;
use climacal_domain::id::DeviceId;
use climacal_domain::rules::RuleSet;
use climacal_domain::slot::Slot;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
    /// Global device pool.
    pub devices: Vec<DeviceId>,
    pub slots: Vec<Slot>,
    pub bindings: Vec<Binding>,
    /// Content of the virtual calendar.
    pub calendar: CalendarConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Evaluation loop settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll_interval_secs: u64,
    /// Log decisions instead of sending them to devices.
    pub dry_run: bool,
    /// IANA zone used to find local midnight for `skip_today`.
    pub timezone: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub events: Vec<CalendarEvent>,
}

impl Config {
    /// Load configuration from `climacal.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CLIMACAL_CONFIG").unwrap_or_else(|_| "climacal.toml".to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CLIMACAL_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("CLIMACAL_PORT")
            && let Ok(port) = val.parse()
        {
            self.server.port = port;
        }
        if let Ok(val) = std::env::var("CLIMACAL_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("CLIMACAL_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("CLIMACAL_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("CLIMACAL_DRY_RUN")
            && let Ok(dry_run) = val.parse()
        {
            self.engine.dry_run = dry_run;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.engine.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_secs must be non-zero".to_string(),
            ));
        }
        self.timezone()?;
        self.rules()
            .validate()
            .map_err(|err| ConfigError::Rules(err.to_string()))?;
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Parse the configured time zone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an unknown zone name.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.engine.timezone.parse::<Tz>().map_err(|err| {
            ConfigError::Validation(format!("unknown timezone `{}`: {err}", self.engine.timezone))
        })
    }

    /// Rule set built from the `devices`, `slots` and `bindings` sections.
    #[must_use]
    pub fn rules(&self) -> RuleSet {
        RuleSet {
            bindings: self.bindings.clone(),
            slots: self.slots.clone(),
            devices: self.devices.iter().cloned().collect(),
        }
    }

    /// Coordinator settings from the `[engine]` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an unknown time zone.
    pub fn coordinator_settings(&self) -> Result<CoordinatorSettings, ConfigError> {
        Ok(CoordinatorSettings {
            poll_interval: Duration::from_secs(self.engine.poll_interval_secs),
            dry_run: self.engine.dry_run,
            timezone: self.timezone()?,
            retry: RetryPolicy {
                max_retries: self.engine.max_retries,
                initial_delay: Duration::from_millis(self.engine.retry_delay_ms),
            },
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:climacal.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "climacald=info,climacal_app=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            dry_run: true,
            timezone: "UTC".to_string(),
            max_retries: 1,
            retry_delay_ms: 1000,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// Slots and bindings do not form a consistent rule set.
    #[error("invalid rules: {0}")]
    Rules(String),
}
