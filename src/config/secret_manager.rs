use std::fmt;

use crate::config::{EnvironmentProvider, SystemEnvironment};

pub const JWT_SECRET: &str = "JWT_SECRET";
pub const PASSWORD_PEPPER: &str = "PASSWORD_PEPPER";
pub const TOKEN_HASH_SECRET: &str = "TOKEN_HASH_SECRET";

/// Environment variable and minimum length of one required secret
struct SecretRule {
    name: &'static str,
    min_length: usize,
}

const JWT_RULE: SecretRule = SecretRule {
    name: JWT_SECRET,
    min_length: 32,
};
const PEPPER_RULE: SecretRule = SecretRule {
    name: PASSWORD_PEPPER,
    min_length: 16,
};
const TOKEN_HASH_RULE: SecretRule = SecretRule {
    name: TOKEN_HASH_SECRET,
    min_length: 32,
};

/// Error raised while loading secrets at startup
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Required secret '{secret_name}' is missing")]
    Missing { secret_name: String },

    #[error("Secret '{secret_name}' must be at least {expected} characters, got {actual}")]
    InvalidLength {
        secret_name: String,
        expected: usize,
        actual: usize,
    },
}

impl SecretError {
    pub fn missing(secret_name: &str) -> Self {
        Self::Missing {
            secret_name: secret_name.to_string(),
        }
    }

    pub fn invalid_length(secret_name: &str, expected: usize, actual: usize) -> Self {
        Self::InvalidLength {
            secret_name: secret_name.to_string(),
            expected,
            actual,
        }
    }
}

/// Centralized holder for the process secrets
///
/// Loaded once at startup and handed to the providers that need them.
/// Nothing mutates a secret after construction.
pub struct SecretManager {
    jwt_secret: String,
    pepper: String,
    token_hash_secret: String,
}

impl SecretManager {
    /// Load and validate all secrets from the process environment
    pub fn init() -> Result<Self, SecretError> {
        Self::from_env_provider(&SystemEnvironment)
    }

    /// Load and validate all secrets from the given environment provider
    pub fn from_env_provider(env: &dyn EnvironmentProvider) -> Result<Self, SecretError> {
        let jwt_secret = Self::load_secret(env, &JWT_RULE)?;
        let pepper = Self::load_secret(env, &PEPPER_RULE)?;
        let token_hash_secret = Self::load_secret(env, &TOKEN_HASH_RULE)?;

        Ok(Self {
            jwt_secret,
            pepper,
            token_hash_secret,
        })
    }

    /// Build from literal values, applying the same length rules
    pub fn from_values(
        jwt_secret: &str,
        pepper: &str,
        token_hash_secret: &str,
    ) -> Result<Self, SecretError> {
        Self::check_length(&JWT_RULE, jwt_secret)?;
        Self::check_length(&PEPPER_RULE, pepper)?;
        Self::check_length(&TOKEN_HASH_RULE, token_hash_secret)?;

        Ok(Self {
            jwt_secret: jwt_secret.to_string(),
            pepper: pepper.to_string(),
            token_hash_secret: token_hash_secret.to_string(),
        })
    }

    /// HMAC key for bearer tokens
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    /// Argon2 secret parameter for password hashes
    pub fn pepper(&self) -> &str {
        &self.pepper
    }

    /// HMAC key for stored one-time token digests
    pub fn token_hash_secret(&self) -> &str {
        &self.token_hash_secret
    }

    fn load_secret(env: &dyn EnvironmentProvider, rule: &SecretRule) -> Result<String, SecretError> {
        let value = env
            .get_var(rule.name)
            .ok_or_else(|| SecretError::missing(rule.name))?;

        Self::check_length(rule, &value)?;
        Ok(value)
    }

    fn check_length(rule: &SecretRule, value: &str) -> Result<(), SecretError> {
        if value.len() < rule.min_length {
            return Err(SecretError::invalid_length(
                rule.name,
                rule.min_length,
                value.len(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for SecretManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretManager")
            .field("jwt_secret", &"<redacted>")
            .field("pepper", &"<redacted>")
            .field("token_hash_secret", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for SecretManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretManager {{ secrets_loaded: 3 }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockEnvironment;

    const JWT: &str = "this-is-a-valid-jwt-secret-with-32-characters";
    const PEPPER: &str = "valid-pepper-16ch";
    const TOKEN_HASH: &str = "token-hash-secret-at-least-32-characters";

    fn full_env() -> MockEnvironment {
        MockEnvironment::empty().with_vars(&[
            (JWT_SECRET, JWT),
            (PASSWORD_PEPPER, PEPPER),
            (TOKEN_HASH_SECRET, TOKEN_HASH),
        ])
    }

    #[test]
    fn test_successful_initialization_with_valid_secrets() {
        let manager = SecretManager::from_env_provider(&full_env()).unwrap();

        assert_eq!(manager.jwt_secret(), JWT);
        assert_eq!(manager.pepper(), PEPPER);
        assert_eq!(manager.token_hash_secret(), TOKEN_HASH);
    }

    #[test]
    fn test_missing_jwt_secret() {
        let env = MockEnvironment::empty()
            .with_vars(&[(PASSWORD_PEPPER, PEPPER), (TOKEN_HASH_SECRET, TOKEN_HASH)]);

        match SecretManager::from_env_provider(&env) {
            Err(SecretError::Missing { secret_name }) => assert_eq!(secret_name, JWT_SECRET),
            other => panic!("Expected Missing error, got: {:?}", other),
        }
    }

    #[test]
    fn test_missing_token_hash_secret() {
        let env = MockEnvironment::empty().with_vars(&[(JWT_SECRET, JWT), (PASSWORD_PEPPER, PEPPER)]);

        match SecretManager::from_env_provider(&env) {
            Err(SecretError::Missing { secret_name }) => assert_eq!(secret_name, TOKEN_HASH_SECRET),
            other => panic!("Expected Missing error, got: {:?}", other),
        }
    }

    #[test]
    fn test_short_pepper_is_rejected() {
        let env = full_env().with_var(PASSWORD_PEPPER, "short");

        match SecretManager::from_env_provider(&env) {
            Err(SecretError::InvalidLength {
                secret_name,
                expected,
                actual,
            }) => {
                assert_eq!(secret_name, PASSWORD_PEPPER);
                assert_eq!(expected, 16);
                assert_eq!(actual, 5);
            }
            other => panic!("Expected InvalidLength error, got: {:?}", other),
        }
    }

    #[test]
    fn test_from_values_applies_length_rules() {
        assert!(SecretManager::from_values(JWT, PEPPER, TOKEN_HASH).is_ok());
        assert!(matches!(
            SecretManager::from_values("too-short", PEPPER, TOKEN_HASH),
            Err(SecretError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_debug_and_display_redact_secrets() {
        let manager = SecretManager::from_env_provider(&full_env()).unwrap();

        let debug = format!("{:?}", manager);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(JWT));
        assert!(!debug.contains(PEPPER));
        assert!(!debug.contains(TOKEN_HASH));

        let display = format!("{}", manager);
        assert_eq!(display, "SecretManager { secrets_loaded: 3 }");
    }
}
