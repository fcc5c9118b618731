// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! validated [`AppConfig`] loaded once at startup. The binary loads a `.env`
//! file into the process environment before reading it.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_ENV` | Deployment mode (`production`, `development`, `test`) | `development` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `5003` |
//! | `SERVER_NAME` | Service name reported by `/` | Required |
//! | `JWT_ACCESS_TOKEN_SECRET` | HS256 secret for access tokens (>= 32 bytes) | Required |
//! | `JWT_ACCESS_TOKEN_EXPIRESIN` | Access token lifetime | `7d` |
//! | `JWT_REFRESH_TOKEN_SECRET` | HS256 secret for refresh tokens | Required |
//! | `JWT_REFRESH_TOKEN_EXPIRESIN` | Refresh token lifetime | `30d` |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated browser origins | Required |
//! | `CORS_ADMIN_ORIGINS` | Comma-separated origins for admin routes | Required |
//! | `RATE_LIMIT_WINDOW_SECS` | Rate limit window override | `300` |
//! | `RATE_LIMIT_MAX` | Requests per window override | `100` (production) / `500` |
//! | `TRUST_PROXY_HOPS` | Reverse proxies in front of the service (`X-Forwarded-For` entries to walk back) | `1` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! Durations accept `<n>s`, `<n>m`, `<n>h`, `<n>d` or bare seconds.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

pub const APP_ENV_ENV: &str = "APP_ENV";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const SERVER_NAME_ENV: &str = "SERVER_NAME";
pub const ACCESS_SECRET_ENV: &str = "JWT_ACCESS_TOKEN_SECRET";
pub const ACCESS_EXPIRES_ENV: &str = "JWT_ACCESS_TOKEN_EXPIRESIN";
pub const REFRESH_SECRET_ENV: &str = "JWT_REFRESH_TOKEN_SECRET";
pub const REFRESH_EXPIRES_ENV: &str = "JWT_REFRESH_TOKEN_EXPIRESIN";
pub const CORS_ALLOWED_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";
pub const CORS_ADMIN_ORIGINS_ENV: &str = "CORS_ADMIN_ORIGINS";
pub const RATE_LIMIT_WINDOW_ENV: &str = "RATE_LIMIT_WINDOW_SECS";
pub const RATE_LIMIT_MAX_ENV: &str = "RATE_LIMIT_MAX";
pub const TRUST_PROXY_HOPS_ENV: &str = "TRUST_PROXY_HOPS";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5003;
const DEFAULT_ACCESS_EXPIRES: &str = "7d";
const DEFAULT_REFRESH_EXPIRES: &str = "30d";

/// Minimum length of the access token secret in bytes.
pub const MIN_ACCESS_SECRET_LEN: usize = 32;

/// Rate limit window used in every deployment mode.
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(5 * 60);
pub const PRODUCTION_RATE_LIMIT: u32 = 100;
pub const NON_PRODUCTION_RATE_LIMIT: u32 = 500;
pub const DEFAULT_TRUST_PROXY_HOPS: usize = 1;

/// Identities that bypass rate limiting.
pub const DEFAULT_TRUSTED_IDENTITIES: [&str; 4] = ["127.0.0.1", "::1", "::ffff:127.0.0.1", "localhost"];

/// Startup configuration failure. Names the first invalid field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("\"{field}\" is required")]
    Missing { field: &'static str },
    #[error("\"{field}\" is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// The offending variable name.
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::Missing { field } | ConfigError::Invalid { field, .. } => field,
        }
    }
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentMode {
    #[default]
    Development,
    Production,
    Test,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Development => "development",
            DeploymentMode::Production => "production",
            DeploymentMode::Test => "test",
        }
    }
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" => Ok(DeploymentMode::Development),
            "production" => Ok(DeploymentMode::Production),
            "test" => Ok(DeploymentMode::Test),
            other => Err(format!(
                "must be one of [production, development, test], got \"{other}\""
            )),
        }
    }
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signing secret and lifetime for one token family.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub expires_in: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Browser origin allow-lists.
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub admin_origins: Vec<String>,
}

/// Rate limiter settings. Immutable after startup.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub limit: u32,
    pub trusted_identities: HashSet<String>,
    /// Proxy hops to walk back through `X-Forwarded-For`. Zero uses the
    /// socket peer.
    pub trust_proxy_hops: usize,
}

impl RateLimitConfig {
    /// Environment-dependent defaults.
    pub fn for_mode(mode: DeploymentMode) -> Self {
        let limit = match mode {
            DeploymentMode::Production => PRODUCTION_RATE_LIMIT,
            _ => NON_PRODUCTION_RATE_LIMIT,
        };

        Self {
            window: DEFAULT_RATE_LIMIT_WINDOW,
            limit,
            trusted_identities: DEFAULT_TRUSTED_IDENTITIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trust_proxy_hops: DEFAULT_TRUST_PROXY_HOPS,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_trust_proxy_hops(mut self, hops: usize) -> Self {
        self.trust_proxy_hops = hops;
        self
    }

    /// Replace the trusted identity set.
    pub fn with_trusted<I, S>(mut self, identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_identities = identities.into_iter().map(Into::into).collect();
        self
    }
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: DeploymentMode,
    pub host: String,
    pub port: u16,
    pub server_name: String,
    pub access_token: TokenConfig,
    pub refresh_token: TokenConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    ///
    /// Fields are validated in a fixed order; the first failure is returned.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get(PORT_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid(PORT_ENV, e.to_string()))?,
            None => DEFAULT_PORT,
        };

        let server_name = get(SERVER_NAME_ENV).ok_or(ConfigError::Missing {
            field: SERVER_NAME_ENV,
        })?;

        let mode = match get(APP_ENV_ENV) {
            Some(raw) => raw
                .parse::<DeploymentMode>()
                .map_err(|reason| ConfigError::invalid(APP_ENV_ENV, reason))?,
            None => DeploymentMode::default(),
        };

        let access_secret = get(ACCESS_SECRET_ENV).ok_or(ConfigError::Missing {
            field: ACCESS_SECRET_ENV,
        })?;
        if access_secret.len() < MIN_ACCESS_SECRET_LEN {
            return Err(ConfigError::invalid(
                ACCESS_SECRET_ENV,
                format!("length must be at least {MIN_ACCESS_SECRET_LEN} characters long"),
            ));
        }
        let access_expires = parse_duration(
            ACCESS_EXPIRES_ENV,
            &get(ACCESS_EXPIRES_ENV).unwrap_or_else(|| DEFAULT_ACCESS_EXPIRES.to_string()),
        )?;

        let refresh_secret = get(REFRESH_SECRET_ENV).ok_or(ConfigError::Missing {
            field: REFRESH_SECRET_ENV,
        })?;
        let refresh_expires = parse_duration(
            REFRESH_EXPIRES_ENV,
            &get(REFRESH_EXPIRES_ENV).unwrap_or_else(|| DEFAULT_REFRESH_EXPIRES.to_string()),
        )?;

        let allowed_origins = parse_origins(
            CORS_ALLOWED_ORIGINS_ENV,
            get(CORS_ALLOWED_ORIGINS_ENV).as_deref(),
        )?;
        let admin_origins =
            parse_origins(CORS_ADMIN_ORIGINS_ENV, get(CORS_ADMIN_ORIGINS_ENV).as_deref())?;

        let mut rate_limit = RateLimitConfig::for_mode(mode);
        if let Some(raw) = get(RATE_LIMIT_WINDOW_ENV) {
            let secs = parse_positive::<u64>(RATE_LIMIT_WINDOW_ENV, &raw)?;
            rate_limit = rate_limit.with_window(Duration::from_secs(secs));
        }
        if let Some(raw) = get(RATE_LIMIT_MAX_ENV) {
            let limit = parse_positive::<u32>(RATE_LIMIT_MAX_ENV, &raw)?;
            rate_limit = rate_limit.with_limit(limit);
        }
        if let Some(raw) = get(TRUST_PROXY_HOPS_ENV) {
            let hops = raw
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::invalid(TRUST_PROXY_HOPS_ENV, e.to_string()))?;
            rate_limit = rate_limit.with_trust_proxy_hops(hops);
        }

        Ok(Self {
            mode,
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            server_name,
            access_token: TokenConfig {
                secret: access_secret,
                expires_in: access_expires,
            },
            refresh_token: TokenConfig {
                secret: refresh_secret,
                expires_in: refresh_expires,
            },
            cors: CorsConfig {
                allowed_origins,
                admin_origins,
            },
            rate_limit,
        })
    }

    pub fn is_development(&self) -> bool {
        self.mode == DeploymentMode::Development
    }

    pub fn is_production(&self) -> bool {
        self.mode == DeploymentMode::Production
    }

    /// `host:port` string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_positive<T>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::invalid(field, e.to_string()))?;
    if value <= T::default() {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(value)
}

/// Parse `<n>s|m|h|d` or bare seconds.
pub fn parse_duration(field: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => raw.split_at(idx),
        None => (raw, "s"),
    };

    let amount: u64 = digits
        .parse()
        .map_err(|_| ConfigError::invalid(field, format!("\"{raw}\" is not a duration")))?;

    let multiplier = match unit.trim() {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => {
            return Err(ConfigError::invalid(
                field,
                format!("unknown duration unit \"{other}\""),
            ))
        }
    };

    if amount == 0 {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }

    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}

/// Parse a comma-separated origin list into serialized origins.
fn parse_origins(field: &'static str, raw: Option<&str>) -> Result<Vec<String>, ConfigError> {
    let raw = raw.ok_or(ConfigError::Missing { field })?;

    let mut origins = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let url = Url::parse(entry)
            .map_err(|e| ConfigError::invalid(field, format!("\"{entry}\": {e}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
            return Err(ConfigError::invalid(
                field,
                format!("\"{entry}\" is not an http(s) origin"),
            ));
        }
        origins.push(url.origin().ascii_serialization());
    }

    if origins.is_empty() {
        return Err(ConfigError::Missing { field });
    }
    Ok(origins)
}

/// Fully populated configuration for unit tests.
#[cfg(test)]
pub(crate) fn test_config(mode: DeploymentMode) -> AppConfig {
    AppConfig {
        mode,
        host: "127.0.0.1".to_string(),
        port: 0,
        server_name: "service-gate-test".to_string(),
        access_token: TokenConfig {
            secret: "access-secret-access-secret-access-secret".to_string(),
            expires_in: Duration::from_secs(3600),
        },
        refresh_token: TokenConfig {
            secret: "refresh-secret".to_string(),
            expires_in: Duration::from_secs(86_400),
        },
        cors: CorsConfig {
            allowed_origins: vec!["https://app.example.com".to_string()],
            admin_origins: vec!["https://admin.example.com".to_string()],
        },
        rate_limit: RateLimitConfig::for_mode(mode),
    }
}
