// Providers layer - Work performers
//
// Providers hold the cryptographic and policy logic that coordinators
// compose. They keep no per-request state.

pub mod crypto_provider;
pub mod notification_provider;
pub mod password_policy_provider;
pub mod token_provider;

pub use crypto_provider::CryptoProvider;
pub use notification_provider::{InMemoryNotifier, LogNotifier, NotificationError, Notifier};
pub use password_policy_provider::{PasswordPolicyProvider, PasswordValidationError};
pub use token_provider::{TokenProvider, TokenRejection};
