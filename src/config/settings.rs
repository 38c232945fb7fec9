use std::fmt;
use std::str::FromStr;

use crate::config::{EnvironmentProvider, SystemEnvironment};

/// Configuration error naming the offending setting
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Setting '{setting_name}' has invalid value '{value}': {reason}")]
    InvalidValue {
        setting_name: String,
        value: String,
        reason: String,
    },

    #[error("Setting '{setting_name}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        setting_name: String,
        min: u64,
        max: u64,
        actual: u64,
    },
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHashSettings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordHashSettings {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Non-secret runtime settings
#[derive(Clone)]
pub struct AppSettings {
    database_url: String,
    audit_database_url: String,
    server_host: String,
    server_port: u16,
    token_ttl_hours: i64,
    email_verification_ttl_hours: i64,
    password_reset_ttl_minutes: i64,
    password_hash: PasswordHashSettings,
    app_base_url: String,
    mail_from: String,
    smtp_url: Option<String>,
}

impl AppSettings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_provider(&SystemEnvironment)
    }

    /// Load settings from an environment provider, falling back to defaults
    pub fn from_env_provider(env: &dyn EnvironmentProvider) -> Result<Self, ConfigError> {
        let defaults = PasswordHashSettings::default();

        let password_hash = PasswordHashSettings {
            memory_kib: read_ranged(env, "PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib, 8, 4_194_304)?,
            iterations: read_ranged(env, "PASSWORD_HASH_ITERATIONS", defaults.iterations, 1, 64)?,
            parallelism: read_ranged(env, "PASSWORD_HASH_PARALLELISM", defaults.parallelism, 1, 64)?,
        };

        Ok(Self {
            database_url: read_string(env, "DATABASE_URL", "sqlite://council.db?mode=rwc"),
            audit_database_url: read_string(
                env,
                "AUDIT_DATABASE_URL",
                "sqlite://council_audit.db?mode=rwc",
            ),
            server_host: read_string(env, "HOST", "0.0.0.0"),
            server_port: read_ranged(env, "PORT", 3000u16, 1, 65535)?,
            token_ttl_hours: read_ranged(env, "TOKEN_TTL_HOURS", 24i64, 1, 24 * 30)?,
            email_verification_ttl_hours: read_ranged(
                env,
                "EMAIL_VERIFICATION_TTL_HOURS",
                24i64,
                1,
                24 * 30,
            )?,
            password_reset_ttl_minutes: read_ranged(
                env,
                "PASSWORD_RESET_TTL_MINUTES",
                60i64,
                1,
                24 * 60,
            )?,
            password_hash,
            app_base_url: read_string(env, "APP_BASE_URL", "http://localhost:3000"),
            mail_from: read_string(env, "MAIL_FROM", "no-reply@council.local"),
            smtp_url: env.get_non_empty("SMTP_URL"),
        })
    }

    /// Replace the password hashing cost, used to keep test suites fast
    pub fn with_password_hash(mut self, password_hash: PasswordHashSettings) -> Self {
        self.password_hash = password_hash;
        self
    }

    /// Replace both database URLs
    pub fn with_database_urls(mut self, database_url: &str, audit_database_url: &str) -> Self {
        self.database_url = database_url.to_string();
        self.audit_database_url = audit_database_url.to_string();
        self
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn audit_database_url(&self) -> &str {
        &self.audit_database_url
    }

    pub fn server_host(&self) -> &str {
        &self.server_host
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn token_ttl_hours(&self) -> i64 {
        self.token_ttl_hours
    }

    pub fn email_verification_ttl_hours(&self) -> i64 {
        self.email_verification_ttl_hours
    }

    pub fn password_reset_ttl_minutes(&self) -> i64 {
        self.password_reset_ttl_minutes
    }

    pub fn password_hash(&self) -> PasswordHashSettings {
        self.password_hash
    }

    pub fn app_base_url(&self) -> &str {
        &self.app_base_url
    }

    pub fn mail_from(&self) -> &str {
        &self.mail_from
    }

    pub fn smtp_url(&self) -> Option<&str> {
        self.smtp_url.as_deref()
    }
}

impl fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SMTP URLs routinely embed credentials
        f.debug_struct("AppSettings")
            .field("database_url", &self.database_url)
            .field("audit_database_url", &self.audit_database_url)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("email_verification_ttl_hours", &self.email_verification_ttl_hours)
            .field("password_reset_ttl_minutes", &self.password_reset_ttl_minutes)
            .field("password_hash", &self.password_hash)
            .field("app_base_url", &self.app_base_url)
            .field("mail_from", &self.mail_from)
            .field("smtp_url", &self.smtp_url.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn read_string(env: &dyn EnvironmentProvider, key: &str, default: &str) -> String {
    env.get_non_empty(key).unwrap_or_else(|| default.to_string())
}

fn read_ranged<T>(
    env: &dyn EnvironmentProvider,
    key: &str,
    default: T,
    min: T,
    max: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Copy + TryInto<u64>,
    T::Err: fmt::Display,
{
    let Some(raw) = env.get_non_empty(key) else {
        return Ok(default);
    };

    let value = raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        setting_name: key.to_string(),
        value: raw.clone(),
        reason: e.to_string(),
    })?;

    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            setting_name: key.to_string(),
            min: min.try_into().unwrap_or(0),
            max: max.try_into().unwrap_or(u64::MAX),
            actual: value.try_into().unwrap_or(0),
        });
    }

    Ok(value)
}
