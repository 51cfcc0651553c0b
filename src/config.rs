use std::{env, str::FromStr, time::Duration};

use crate::{error::ConfigError, password::WorkFactor};

const LOCAL_DEV_SECRET: &str = "local-development-secret-change-me";
const DEFAULT_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_AUTH_ATTEMPTS: u32 = 5;
const DEFAULT_AUTH_WINDOW_SECS: u64 = 15 * 60;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded
/// and pulled into handlers via `FromRef`.
#[derive(Clone)]
pub struct AppConfig {
    // Runtime environment marker.
    pub env: Env,
    // Postgres connection string. `None` in local mode selects the in-memory repository.
    pub db_url: Option<String>,
    // HS256 signing secret for session tokens.
    pub jwt_secret: String,
    // Session token lifetime in seconds.
    pub token_ttl_secs: i64,
    // Seconds a token is still accepted past `exp`.
    pub token_leeway_secs: u64,
    // Argon2id cost parameters.
    pub work_factor: WorkFactor,
    // Single allowed CORS origin; any origin when unset.
    pub cors_origin: Option<String>,
    pub bind_addr: String,
    // Seed demo accounts and articles at startup.
    pub seed_demo_data: bool,
    // Per-client budget for the register and login endpoints.
    pub auth_rate_limit: RateLimit,
}

/// RateLimit
///
/// `max_requests` per client IP within `window_secs`. The budget refills
/// gradually, one request every `window_secs / max_requests`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_AUTH_ATTEMPTS,
            window_secs: DEFAULT_AUTH_WINDOW_SECS,
        }
    }
}

impl RateLimit {
    /// Time to regain one request. Never zero.
    pub fn replenish_period(&self) -> Duration {
        let window_ms = self.window_secs.saturating_mul(1000);
        let per_request = window_ms / u64::from(self.max_requests.max(1));
        Duration::from_millis(per_request.max(1))
    }
}

/// Env
///
/// Local relaxes secret requirements and allows running without a database.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Test scaffolding: a fixed secret and a deliberately cheap work factor so
    /// suites can hash passwords without environment setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            token_ttl_secs: 3600,
            token_leeway_secs: 0,
            work_factor: WorkFactor {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            cors_origin: None,
            bind_addr: "127.0.0.1:0".to_string(),
            seed_demo_data: false,
            auth_rate_limit: RateLimit::default(),
        }
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables and fails fast on
    /// anything missing or unparsable. In production both `JWT_SECRET` and
    /// `DATABASE_URL` are mandatory.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match optional_var("APP_ENV").as_deref() {
            Some("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match (env, optional_var("JWT_SECRET")) {
            (_, Some(secret)) => secret,
            (Env::Production, None) => return Err(ConfigError::MissingSecret("JWT_SECRET")),
            (Env::Local, None) => LOCAL_DEV_SECRET.to_string(),
        };

        let db_url = optional_var("DATABASE_URL");
        if env == Env::Production && db_url.is_none() {
            return Err(ConfigError::Invalid {
                key: "DATABASE_URL",
                reason: "required in production".to_string(),
            });
        }

        let token_ttl_secs = parse_var("JWT_TTL_SECONDS", DEFAULT_TTL_SECS)?;
        if token_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_TTL_SECONDS",
                reason: "must be positive".to_string(),
            });
        }
        if chrono::Duration::try_seconds(token_ttl_secs).is_none() {
            return Err(ConfigError::Invalid {
                key: "JWT_TTL_SECONDS",
                reason: "out of range".to_string(),
            });
        }

        let auth_rate_limit = RateLimit {
            max_requests: parse_var("AUTH_RATE_LIMIT_MAX", DEFAULT_AUTH_ATTEMPTS)?,
            window_secs: parse_var("AUTH_RATE_LIMIT_WINDOW_SECONDS", DEFAULT_AUTH_WINDOW_SECS)?,
        };
        if auth_rate_limit.max_requests == 0 {
            return Err(ConfigError::Invalid {
                key: "AUTH_RATE_LIMIT_MAX",
                reason: "must be positive".to_string(),
            });
        }
        if auth_rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "AUTH_RATE_LIMIT_WINDOW_SECONDS",
                reason: "must be positive".to_string(),
            });
        }

        let defaults = WorkFactor::default();
        let work_factor = WorkFactor {
            memory_kib: parse_var("PASSWORD_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_var("PASSWORD_ITERATIONS", defaults.iterations)?,
            parallelism: parse_var("PASSWORD_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            env,
            db_url,
            jwt_secret,
            token_ttl_secs,
            token_leeway_secs: parse_var("JWT_LEEWAY_SECONDS", 0)?,
            work_factor,
            cors_origin: optional_var("CORS_ORIGIN"),
            bind_addr: optional_var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            seed_demo_data: parse_var("SEED_DEMO_DATA", false)?,
            auth_rate_limit,
        })
    }
}
