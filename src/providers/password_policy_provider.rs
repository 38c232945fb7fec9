use thiserror::Error;

/// Passwords rejected outright regardless of length
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "12345678",
    "123456789",
    "1234567890",
    "qwerty123",
    "qwertyuiop",
    "iloveyou",
    "letmein123",
    "welcome123",
    "admin123",
    "council123",
    "changeme",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordValidationError {
    #[error("Password must be at least {0} characters long")]
    TooShort(usize),

    #[error("Password must not exceed {0} characters")]
    TooLong(usize),

    #[error("Password must contain at least one letter and one digit")]
    MissingCharacterClass,

    #[error("Password must not contain the username")]
    ContainsUsername,

    #[error("Password is too common")]
    CommonPassword,
}

/// Password rules applied on registration, reset and change
///
/// Rules are checked in order and the first failure is returned:
/// 1. Length (8-128 characters)
/// 2. At least one letter and one digit
/// 3. Username substring check (case-insensitive)
/// 4. Built-in common password list
pub struct PasswordPolicyProvider {
    min_length: usize,
    max_length: usize,
}

impl PasswordPolicyProvider {
    pub fn new() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
        }
    }

    pub fn validate(
        &self,
        password: &str,
        username: Option<&str>,
    ) -> Result<(), PasswordValidationError> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(PasswordValidationError::TooShort(self.min_length));
        }
        if length > self.max_length {
            return Err(PasswordValidationError::TooLong(self.max_length));
        }

        let has_letter = password.chars().any(char::is_alphabetic);
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        if !has_letter || !has_digit {
            return Err(PasswordValidationError::MissingCharacterClass);
        }

        if let Some(username) = username.filter(|u| !u.is_empty()) {
            if password.to_lowercase().contains(&username.to_lowercase()) {
                return Err(PasswordValidationError::ContainsUsername);
            }
        }

        let lowered = password.to_lowercase();
        if COMMON_PASSWORDS.iter().any(|common| *common == lowered) {
            return Err(PasswordValidationError::CommonPassword);
        }

        Ok(())
    }
}

impl Default for PasswordPolicyProvider {
    fn default() -> Self {
        Self::new()
    }
}
