use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use crate::config::{PasswordHashSettings, SecretManager};
use crate::errors::InternalError;

type HmacSha256 = Hmac<Sha256>;

/// Password hashing, one-time token generation and token digests
///
/// Passwords are hashed with Argon2id using the pepper as the secret
/// parameter. One-time tokens are stored only as an HMAC-SHA256 digest.
pub struct CryptoProvider {
    pepper: String,
    token_hash_secret: String,
    params: Params,
    /// Hash verified when the username is unknown so both login failures
    /// cost the same
    dummy_hash: String,
}

impl CryptoProvider {
    pub fn new(
        secret_manager: &SecretManager,
        settings: PasswordHashSettings,
    ) -> Result<Self, InternalError> {
        let params = Params::new(
            settings.memory_kib,
            settings.iterations,
            settings.parallelism,
            None,
        )
        .map_err(|e| InternalError::crypto("argon2_params", e.to_string()))?;

        let mut provider = Self {
            pepper: secret_manager.pepper().to_string(),
            token_hash_secret: secret_manager.token_hash_secret().to_string(),
            params,
            dummy_hash: String::new(),
        };
        provider.dummy_hash = provider.hash_password(&provider.generate_secure_password())?;

        Ok(provider)
    }

    fn argon2(&self) -> Result<Argon2<'_>, InternalError> {
        Argon2::new_with_secret(
            self.pepper.as_bytes(),
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
        .map_err(|e| InternalError::crypto("argon2_init", e.to_string()))
    }

    /// Hash a password into a PHC string
    pub fn hash_password(&self, password: &str) -> Result<String, InternalError> {
        let salt = SaltString::generate(&mut rand_core::OsRng);
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| InternalError::crypto("argon2_hash", e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a password against a stored PHC string
    ///
    /// # Returns
    /// * `Ok(true)` / `Ok(false)` - match or mismatch
    /// * `Err` - the stored hash is unreadable
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> Result<bool, InternalError> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| InternalError::crypto("argon2_parse_hash", e.to_string()))?;

        match self.argon2()?.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(InternalError::crypto("argon2_verify", e.to_string())),
        }
    }

    /// Spend the same work as a real verification, for unknown usernames
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify_password(password, &self.dummy_hash);
    }

    /// New URL-safe one-time token (32 random bytes)
    pub fn generate_token(&self) -> String {
        let mut rng = rand::rng();
        let random_bytes: [u8; 32] = rng.random();
        URL_SAFE_NO_PAD.encode(random_bytes)
    }

    /// Digest of a one-time token as stored in the database
    pub fn hash_token(&self, token: &str) -> String {
        hmac_sha256_token(&self.token_hash_secret, token)
    }

    /// Generate a cryptographically secure random password
    ///
    /// 20 characters drawn from upper and lower case letters, digits and symbols.
    pub fn generate_secure_password(&self) -> String {
        const PASSWORD_LENGTH: usize = 20;
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                                 abcdefghijklmnopqrstuvwxyz\
                                 0123456789\
                                 !@#$%^&*()_+-=[]{}|;:,.<>?";

        let mut rng = rand::rng();
        (0..PASSWORD_LENGTH)
            .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
            .collect()
    }
}

/// HMAC-SHA256 of `token` under `key`, hex encoded
pub fn hmac_sha256_token(key: &str, token: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(token.as_bytes());
    format!("{:x}", mac.finalize().into_bytes())
}

impl std::fmt::Debug for CryptoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoProvider")
            .field("pepper", &"<redacted>")
            .field("token_hash_secret", &"<redacted>")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::utils::{fast_hash_settings, test_secrets};

    fn create_test_crypto_provider() -> CryptoProvider {
        CryptoProvider::new(&test_secrets(), fast_hash_settings()).unwrap()
    }

    #[test]
    fn test_hash_is_not_plaintext_and_verifies() {
        let crypto = create_test_crypto_provider();

        let hash = crypto.hash_password("pw12345678").unwrap();

        assert_ne!(hash, "pw12345678");
        assert!(hash.starts_with("$argon2id$"));
        assert!(crypto.verify_password("pw12345678", &hash).unwrap());
        assert!(!crypto.verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let crypto = create_test_crypto_provider();
        assert_ne!(
            crypto.hash_password("pw12345678").unwrap(),
            crypto.hash_password("pw12345678").unwrap()
        );
    }

    #[test]
    fn test_pepper_is_part_of_the_hash() {
        let crypto = create_test_crypto_provider();
        let hash = crypto.hash_password("pw12345678").unwrap();

        let other_secrets = SecretManager::from_values(
            "another-jwt-secret-that-is-32-chars-long",
            "a-different-pepper",
            "another-token-hash-secret-32-characters",
        )
        .unwrap();
        let other = CryptoProvider::new(&other_secrets, fast_hash_settings()).unwrap();

        assert!(!other.verify_password("pw12345678", &hash).unwrap());
    }

    #[test]
    fn test_unreadable_hash_is_an_error() {
        let crypto = create_test_crypto_provider();
        assert!(matches!(
            crypto.verify_password("x", "not-a-phc-string"),
            Err(InternalError::Crypto { .. })
        ));
    }

    #[test]
    fn test_generate_token_is_url_safe_and_unique() {
        let crypto = create_test_crypto_provider();
        let a = crypto.generate_token();
        let b = crypto.generate_token();

        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let crypto = create_test_crypto_provider();
        let digest = crypto.hash_token("token-1");

        assert_eq!(digest, crypto.hash_token("token-1"));
        assert_ne!(digest, crypto.hash_token("token-2"));
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hmac_different_keys_produce_different_hashes() {
        assert_ne!(
            hmac_sha256_token("key1", "token"),
            hmac_sha256_token("key2", "token")
        );
    }

    #[test]
    fn test_generate_secure_password() {
        let crypto = create_test_crypto_provider();
        let password = crypto.generate_secure_password();

        assert_eq!(password.len(), 20);
        assert!(password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!@#$%^&*()_+-=[]{}|;:,.<>?".contains(c)));
        assert_ne!(password, crypto.generate_secure_password());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let crypto = create_test_crypto_provider();
        let debug = format!("{:?}", crypto);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(test_secrets().pepper()));
    }
}
