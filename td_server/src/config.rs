//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use std::time::Duration;
use tournament_director::events::DEFAULT_RETENTION;
use tournament_director::{LockOptions, db::DatabaseConfig};

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// HTTP bind address
    pub bind: SocketAddr,
    /// Durable store; `None` keeps snapshots in memory
    pub database: Option<DatabaseConfig>,
    /// Timer sweep configuration
    pub timer: TimerConfig,
    /// Lock settings for user operations
    pub locks: LockConfig,
    /// Table allocation configuration
    pub tables: TableConfig,
    /// Prometheus listener, disabled when `None`
    pub metrics_bind: Option<SocketAddr>,
    /// Envelopes the in-process bus keeps per topic for late consumer groups
    pub bus_retention: usize,
}

/// Timer sweep configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Period between sweeps
    pub tick_interval: Duration,
    /// Lease of the per-timer lock taken by each tick
    pub tick_lease: Duration,
}

/// Lock settings for user operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    pub lease: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
}

/// Table allocation configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    /// Delay between an unseat and the rebalance it triggers
    pub rebalance_debounce: Duration,
    /// TTL of the cached table list
    pub cache_ttl: Duration,
}

/// Values given on the command line, taking precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub tick_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database: None,
            timer: TimerConfig {
                tick_interval: Duration::from_millis(1000),
                tick_lease: Duration::from_millis(1000),
            },
            locks: LockConfig {
                lease: Duration::from_millis(2000),
                retry_count: 5,
                retry_delay: Duration::from_millis(100),
            },
            tables: TableConfig {
                rebalance_debounce: Duration::from_millis(100),
                cache_ttl: Duration::from_secs(600),
            },
            metrics_bind: None,
            bus_retention: DEFAULT_RETENTION,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `overrides` - Values from CLI args
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if a variable is unparsable, a required one is missing, or
    /// the combination is invalid
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), overrides)
    }

    /// Same as [`ServerConfig::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F, overrides: CliOverrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = ServerConfig::default();

        let bind = match overrides.bind {
            Some(bind) => bind,
            None => env.parse_or("SERVER_BIND", defaults.bind)?,
        };

        let database_url = overrides.database_url.or_else(|| env.get("DATABASE_URL"));
        let backend = env.get("STORE_BACKEND");
        let database = match (backend.as_deref(), database_url) {
            (Some("memory"), _) => None,
            (Some("postgres"), None) => {
                return Err(ConfigError::MissingRequired {
                    var: "DATABASE_URL".to_string(),
                    hint: "STORE_BACKEND=postgres needs a connection string".to_string(),
                });
            }
            (None | Some("postgres"), Some(url)) => {
                let pool = DatabaseConfig::with_url(url);
                Some(DatabaseConfig {
                    max_connections: env
                        .parse_or("DB_MAX_CONNECTIONS", pool.max_connections)?,
                    min_connections: env
                        .parse_or("DB_MIN_CONNECTIONS", pool.min_connections)?,
                    connection_timeout_secs: env.parse_or(
                        "DB_CONNECTION_TIMEOUT_SECS",
                        pool.connection_timeout_secs,
                    )?,
                    idle_timeout_secs: env
                        .parse_or("DB_IDLE_TIMEOUT_SECS", pool.idle_timeout_secs)?,
                    max_lifetime_secs: env
                        .parse_or("DB_MAX_LIFETIME_SECS", pool.max_lifetime_secs)?,
                    ..pool
                })
            }
            (None, None) => None,
            (Some(other), _) => {
                return Err(ConfigError::Invalid {
                    var: "STORE_BACKEND".to_string(),
                    reason: format!("Unknown backend '{other}', use memory or postgres"),
                });
            }
        };

        let tick_ms = match overrides.tick_ms {
            Some(ms) => ms,
            None => env.parse_or(
                "TIMER_TICK_INTERVAL_MS",
                defaults.timer.tick_interval.as_millis() as u64,
            )?,
        };

        let config = ServerConfig {
            bind,
            database,
            timer: TimerConfig {
                tick_interval: Duration::from_millis(tick_ms),
                tick_lease: env.millis_or("TIMER_TICK_LEASE_MS", defaults.timer.tick_lease)?,
            },
            locks: LockConfig {
                lease: env.millis_or("LOCK_LEASE_MS", defaults.locks.lease)?,
                retry_count: env.parse_or("LOCK_RETRY_COUNT", defaults.locks.retry_count)?,
                retry_delay: env.millis_or("LOCK_RETRY_DELAY_MS", defaults.locks.retry_delay)?,
            },
            tables: TableConfig {
                rebalance_debounce: env
                    .millis_or("REBALANCE_DEBOUNCE_MS", defaults.tables.rebalance_debounce)?,
                cache_ttl: Duration::from_secs(env.parse_or(
                    "TABLE_CACHE_TTL_SECS",
                    defaults.tables.cache_ttl.as_secs(),
                )?),
            },
            metrics_bind: env.parse_or("METRICS_BIND", None)?,
            bus_retention: env.parse_or("BUS_RETENTION", defaults.bus_retention)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timer.tick_interval.is_zero() {
            return Err(invalid("TIMER_TICK_INTERVAL_MS", "Must be greater than 0"));
        }

        if self.timer.tick_lease.is_zero() {
            return Err(invalid("TIMER_TICK_LEASE_MS", "Must be greater than 0"));
        }

        if self.timer.tick_lease > self.timer.tick_interval * 10 {
            return Err(ConfigError::Invalid {
                var: "TIMER_TICK_LEASE_MS".to_string(),
                reason: format!(
                    "Must be at most 10x the tick interval ({}ms)",
                    self.timer.tick_interval.as_millis()
                ),
            });
        }

        if self.locks.lease.is_zero() {
            return Err(invalid("LOCK_LEASE_MS", "Must be greater than 0"));
        }

        if self.locks.retry_count > 0 && self.locks.retry_delay.is_zero() {
            return Err(invalid(
                "LOCK_RETRY_DELAY_MS",
                "Must be greater than 0 when retries are enabled",
            ));
        }

        if self.bus_retention == 0 {
            return Err(invalid("BUS_RETENTION", "Must be greater than 0"));
        }

        if self.tables.cache_ttl.is_zero() {
            return Err(invalid("TABLE_CACHE_TTL_SECS", "Must be greater than 0"));
        }

        if let Some(db) = &self.database
            && db.min_connections > db.max_connections
        {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    db.max_connections
                ),
            });
        }

        Ok(())
    }

    /// Lease settings for timer ticks
    pub fn tick_lock(&self) -> LockOptions {
        LockOptions {
            lease: self.timer.tick_lease,
            ..LockOptions::tick()
        }
    }

    /// Lease settings for user operations and event handlers
    pub fn operation_lock(&self) -> LockOptions {
        LockOptions {
            lease: self.locks.lease,
            retry_count: self.locks.retry_count,
            retry_delay: self.locks.retry_delay,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Parse `key` if set, falling back to `default` when unset
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: ParseEnv,
    {
        match self.get(key) {
            Some(raw) => T::parse_env(raw.trim()).ok_or_else(|| ConfigError::Invalid {
                var: key.to_string(),
                reason: format!("Cannot parse '{raw}'"),
            }),
            None => Ok(default),
        }
    }

    fn millis_or(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let ms = self.parse_or(key, default.as_millis() as u64)?;
        Ok(Duration::from_millis(ms))
    }
}

/// Values readable from one environment variable. `Option<T>` parses to
/// `Some` so optional settings can share [`Env::parse_or`].
trait ParseEnv: Sized {
    fn parse_env(raw: &str) -> Option<Self>;
}

macro_rules! parse_env_via_from_str {
    ($($t:ty),*) => {
        $(impl ParseEnv for $t {
            fn parse_env(raw: &str) -> Option<Self> {
                raw.parse().ok()
            }
        })*
    };
}

parse_env_via_from_str!(u32, u64, usize, SocketAddr);

impl<T: ParseEnv> ParseEnv for Option<T> {
    fn parse_env(raw: &str) -> Option<Self> {
        T::parse_env(raw).map(Some)
    }
}
