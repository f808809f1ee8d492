//! API server configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use carehub_core::auth::jwt::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS, resolve_jwt_secret,
};
use carehub_core::auth::lockout::{
    DEFAULT_LOCKOUT_MINUTES, DEFAULT_LOCKOUT_THRESHOLD, LockoutPolicy,
};
use carehub_core::auth::session::DEFAULT_SWEEP_INTERVAL;
use carehub_core::authz::permissions::PermissionConfigError;
use carehub_core::authz::{RolePermissions, ScopeFallback};
use chrono::Duration;
use thiserror::Error;

/// Configuration errors raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Permissions(#[from] PermissionConfigError),
}

/// Deployment mode. Development echoes password reset tokens in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub environment: Environment,
    pub lockout: LockoutPolicy,
    /// What to do when a non-administrator has no facility association.
    pub scope_fallback: ScopeFallback,
    pub session_sweep_interval: StdDuration,
    /// Immutable after startup.
    pub role_permissions: RolePermissions,
}

impl ApiConfig {
    /// Defaults for everything except the signing secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".into(),
            database_url: "postgres://localhost:5432/carehub".into(),
            jwt_secret: jwt_secret.into(),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
            environment: Environment::default(),
            lockout: LockoutPolicy::default(),
            scope_fallback: ScopeFallback::default(),
            session_sweep_interval: DEFAULT_SWEEP_INTERVAL,
            role_permissions: RolePermissions::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                      | Default                                |
    /// |-------------------------------|----------------------------------------|
    /// | `BIND_ADDR`                   | `127.0.0.1:3100`                       |
    /// | `DATABASE_URL`                | `postgres://localhost:5432/carehub`    |
    /// | `JWT_SECRET` / `AUTH_SECRET`  | generated & persisted to file          |
    /// | `ACCESS_TOKEN_TTL_SECS`       | `3600`                                 |
    /// | `REFRESH_TOKEN_TTL_SECS`      | `604800`                               |
    /// | `APP_ENV`                     | `production`                           |
    /// | `ROLE_PERMISSIONS`            | built-in map (JSON object)             |
    /// | `ROLE_PERMISSIONS_FILE`       | unset (path to the same JSON)          |
    /// | `FACILITY_SCOPE_FALLBACK`     | `allow`                                |
    /// | `SESSION_SWEEP_INTERVAL_SECS` | `3600`                                 |
    /// | `LOCKOUT_THRESHOLD`           | `5`                                    |
    /// | `LOCKOUT_MINUTES`             | `30`                                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), resolve_jwt_secret)
    }

    /// Build from an arbitrary key lookup. `secret` is only called when neither
    /// `JWT_SECRET` nor `AUTH_SECRET` is set.
    pub fn from_lookup<F, S>(lookup: F, secret: S) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
        S: FnOnce() -> String,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET")
            .or_else(|| get("AUTH_SECRET"))
            .unwrap_or_else(secret);
        let mut config = Self::with_secret(jwt_secret);

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(url) = get("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(secs) = parse::<i64>(&get, "ACCESS_TOKEN_TTL_SECS")? {
            config.access_token_ttl = positive_secs("ACCESS_TOKEN_TTL_SECS", secs)?;
        }
        if let Some(secs) = parse::<i64>(&get, "REFRESH_TOKEN_TTL_SECS")? {
            config.refresh_token_ttl = positive_secs("REFRESH_TOKEN_TTL_SECS", secs)?;
        }
        if let Some(env) = parse::<Environment>(&get, "APP_ENV")? {
            config.environment = env;
        }
        if let Some(fallback) = parse::<ScopeFallback>(&get, "FACILITY_SCOPE_FALLBACK")? {
            config.scope_fallback = fallback;
        }
        if let Some(secs) = parse::<u64>(&get, "SESSION_SWEEP_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(invalid("SESSION_SWEEP_INTERVAL_SECS", "must be positive"));
            }
            config.session_sweep_interval = StdDuration::from_secs(secs);
        }
        let threshold =
            parse::<u32>(&get, "LOCKOUT_THRESHOLD")?.unwrap_or(DEFAULT_LOCKOUT_THRESHOLD);
        if threshold == 0 {
            return Err(invalid("LOCKOUT_THRESHOLD", "must be positive"));
        }
        let minutes = parse::<i64>(&get, "LOCKOUT_MINUTES")?.unwrap_or(DEFAULT_LOCKOUT_MINUTES);
        if minutes <= 0 {
            return Err(invalid("LOCKOUT_MINUTES", "must be positive"));
        }
        config.lockout = LockoutPolicy {
            threshold,
            duration: Duration::minutes(minutes),
        };

        if let Some(json) = get("ROLE_PERMISSIONS") {
            config.role_permissions = RolePermissions::from_json(&json)?;
        } else if let Some(path) = get("ROLE_PERMISSIONS_FILE") {
            let path = PathBuf::from(path);
            let json = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Io { path, source })?;
            config.role_permissions = RolePermissions::from_json(&json)?;
        }

        Ok(config)
    }
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.into(),
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(var)
        .map(|raw| raw.trim().parse::<T>().map_err(|e| invalid(var, e.to_string())))
        .transpose()
}

fn positive_secs(var: &'static str, secs: i64) -> Result<Duration, ConfigError> {
    if secs <= 0 {
        return Err(invalid(var, "must be positive"));
    }
    Ok(Duration::seconds(secs))
}
