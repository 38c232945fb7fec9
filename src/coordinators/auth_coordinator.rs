use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::app_data::AppData;
use crate::audit::AuditLogger;
use crate::coordinators::require_user_id;
use crate::errors::InternalError;
use crate::errors::internal::CredentialError;
use crate::providers::notification_provider::dispatch;
use crate::providers::{CryptoProvider, Notifier, PasswordPolicyProvider, TokenProvider};
use crate::stores::{CredentialStore, NewUser, UserUpdate};
use crate::types::CoordinatorResult;
use crate::types::db::user;
use crate::types::dto::auth::UserProfile;
use crate::types::internal::action_outcome::ActionOutcome;
use crate::types::internal::audit::AuditAction;
use crate::types::internal::auth::IssuedToken;
use crate::types::internal::context::RequestContext;
use crate::types::internal::notification::Notification;
use crate::types::internal::Role;

const VERIFICATION_TOKEN: &str = "verification";
const RESET_TOKEN: &str = "password_reset";

/// Registration input after JSON decoding
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

/// Successful login: the signed token plus the public user view
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: IssuedToken,
    pub user: UserProfile,
}

/// Auth coordinator that orchestrates the account lifecycle workflows
///
/// Registration, email verification, login, password reset and change, and
/// the caller's own profile. Every successful state transition writes one
/// audit entry; audit and notification failures are reported in the
/// returned `ActionOutcome` and never undo the transition.
pub struct AuthCoordinator {
    credential_store: Arc<CredentialStore>,
    crypto: Arc<CryptoProvider>,
    tokens: Arc<TokenProvider>,
    password_policy: Arc<PasswordPolicyProvider>,
    audit_logger: Arc<AuditLogger>,
    notifier: Arc<dyn Notifier>,
    email_verification_ttl_hours: i64,
    password_reset_ttl_minutes: i64,
}

impl AuthCoordinator {
    /// Create AuthCoordinator from AppData
    pub fn new(app_data: Arc<AppData>) -> Self {
        Self {
            credential_store: app_data.credential_store.clone(),
            crypto: app_data.crypto.clone(),
            tokens: app_data.tokens.clone(),
            password_policy: app_data.password_policy.clone(),
            audit_logger: app_data.audit_logger.clone(),
            notifier: app_data.notifier.clone(),
            email_verification_ttl_hours: app_data.settings.email_verification_ttl_hours(),
            password_reset_ttl_minutes: app_data.settings.password_reset_ttl_minutes(),
        }
    }

    /// Orchestrate account registration
    ///
    /// Coordinates the sequence of operations:
    /// 1. Validate username, email, role and password policy
    /// 2. Hash the password and generate a verification token
    /// 3. Insert the user unverified (unique indexes decide conflicts)
    /// 4. Send the verification message and record USER_REGISTERED
    ///
    /// # Returns
    /// * `Ok(outcome)` - the new account; never includes the hash or the token
    /// * `Err(CredentialError::DuplicateUsername | DuplicateEmail)` - conflict
    /// * `Err(InternalError::Validation | CredentialError::PasswordValidationFailed)` - bad input
    pub async fn register(
        &self,
        ctx: &RequestContext,
        input: RegisterInput,
    ) -> CoordinatorResult<UserProfile> {
        // Step 1: Validate input
        let username = validate_username(&input.username)?;
        let email = validate_email(&input.email)?;
        let role = input.role.unwrap_or(Role::DataEntry);
        if role == Role::SuperAdmin {
            return Err(InternalError::validation(
                "role",
                "SuperAdmin accounts cannot be self-registered",
            ));
        }
        self.check_password_policy(&input.password, &username)?;

        // Step 2: Hash password and create the verification token
        let password_hash = self.crypto.hash_password(&input.password)?;
        let token = self.crypto.generate_token();
        let expires_at = Utc::now().timestamp() + self.email_verification_ttl_hours * 3600;

        // Step 3: Insert; a concurrent duplicate fails on the unique index
        let user = self
            .credential_store
            .create_user(NewUser {
                username,
                email,
                password_hash,
                role,
                email_verified: false,
                verification_token_hash: Some(self.crypto.hash_token(&token)),
                verification_expires_at: Some(expires_at),
            })
            .await?;

        tracing::info!("User {} registered with role {}", user.id, user.role);

        // Step 4: Side effects
        let mut outcome = ActionOutcome::new(UserProfile::from(user.clone()));
        outcome.push(
            dispatch(
                self.notifier.as_ref(),
                &Notification::EmailVerification {
                    to: user.email.clone(),
                    username: user.username.clone(),
                    token,
                    expires_at,
                },
            )
            .await,
        );
        outcome.push(
            self.audit_logger
                .for_context(AuditAction::UserRegistered, ctx)
                .actor(user.id.clone())
                .details(format!("User {} registered", user.username))
                .target("users", user.id.clone())
                .new_values(json!({
                    "username": user.username,
                    "email": user.email,
                    "role": user.role,
                    "email_verified": false,
                }))
                .record()
                .await,
        );

        Ok(outcome)
    }

    /// Orchestrate email verification
    ///
    /// An expired token is cleared before `ExpiredToken` is returned, so it
    /// reads as invalid afterwards. Consumption is a conditional UPDATE on the
    /// token digest: of two concurrent calls with the same token one wins.
    pub async fn verify_email(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> CoordinatorResult<UserProfile> {
        let token_hash = self.hash_presented_token(token, VERIFICATION_TOKEN)?;

        let user = self
            .credential_store
            .find_by_verification_token(&token_hash)
            .await?
            .ok_or_else(|| CredentialError::invalid_token(VERIFICATION_TOKEN))?;

        if is_expired(user.verification_expires_at) {
            self.credential_store.clear_verification_token(&user.id).await?;
            tracing::debug!("Expired verification token presented for user {}", user.id);
            self.audit_logger
                .log_token_expired(
                    ctx,
                    AuditAction::VerificationTokenExpired,
                    &user,
                    user.verification_expires_at,
                )
                .await;
            return Err(CredentialError::expired_token(VERIFICATION_TOKEN).into());
        }

        if !self
            .credential_store
            .consume_verification_token(&user.id, &token_hash)
            .await?
        {
            return Err(CredentialError::invalid_token(VERIFICATION_TOKEN).into());
        }

        let verified = self.credential_store.get_user(&user.id).await?;
        tracing::info!("User {} verified their email", verified.id);

        let mut outcome = ActionOutcome::new(UserProfile::from(verified.clone()));
        outcome.push(
            self.audit_logger
                .for_context(AuditAction::EmailVerified, ctx)
                .actor(verified.id.clone())
                .details(format!("Email verified for {}", verified.username))
                .target("users", verified.id.clone())
                .old_values(json!({ "email_verified": false }))
                .new_values(json!({ "email_verified": true }))
                .record()
                .await,
        );
        outcome.push(
            dispatch(
                self.notifier.as_ref(),
                &Notification::Welcome {
                    to: verified.email.clone(),
                    username: verified.username.clone(),
                },
            )
            .await,
        );

        Ok(outcome)
    }

    /// Issue a fresh verification token for the authenticated caller
    ///
    /// The previous token stops working. Fails with a validation error when
    /// the address is already verified.
    pub async fn resend_verification(&self, ctx: &RequestContext) -> CoordinatorResult<()> {
        let user_id = require_user_id(ctx)?;
        let user = self.credential_store.get_user(user_id).await?;

        if user.email_verified {
            return Err(InternalError::validation(
                "email",
                "Email address is already verified",
            ));
        }

        let token = self.crypto.generate_token();
        let expires_at = Utc::now().timestamp() + self.email_verification_ttl_hours * 3600;
        self.credential_store
            .set_verification_token(&user.id, &self.crypto.hash_token(&token), expires_at)
            .await?;

        let mut outcome = ActionOutcome::new(());
        outcome.push(
            dispatch(
                self.notifier.as_ref(),
                &Notification::EmailVerification {
                    to: user.email.clone(),
                    username: user.username.clone(),
                    token,
                    expires_at,
                },
            )
            .await,
        );
        outcome.push(
            self.audit_logger
                .for_context(AuditAction::VerificationResent, ctx)
                .details(format!("Verification resent to {}", user.username))
                .target("users", user.id.clone())
                .record()
                .await,
        );

        Ok(outcome)
    }

    /// Orchestrate login
    ///
    /// Coordinates the sequence of operations:
    /// 1. Look up the user; unknown usernames still pay for one hash verification
    /// 2. Verify the password
    /// 3. Reject deactivated accounts
    /// 4. Issue a token and record the login time
    ///
    /// Unknown user and wrong password produce the same error. Login is
    /// allowed before email verification; the token carries the flag and the
    /// access gate enforces it.
    pub async fn login(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> CoordinatorResult<LoginResult> {
        let username = username.trim();

        // Step 1: Look up the user
        let Some(user) = self.credential_store.find_by_username(username).await? else {
            self.crypto.verify_dummy(password);
            self.audit_logger
                .log_login_failure(ctx, username, "unknown_user")
                .await;
            return Err(CredentialError::InvalidCredentials.into());
        };

        // Step 2: Verify the password
        if !self.crypto.verify_password(password, &user.password_hash)? {
            self.audit_logger
                .log_login_failure(ctx, username, "wrong_password")
                .await;
            return Err(CredentialError::InvalidCredentials.into());
        }

        // Step 3: Reject deactivated accounts
        if !user.is_active {
            self.audit_logger
                .log_login_failure(ctx, username, "account_deactivated")
                .await;
            return Err(CredentialError::AccountDeactivated.into());
        }

        // Step 4: Issue the token
        let token = self.tokens.issue(&user.id, user.role, user.email_verified)?;
        let now = Utc::now().timestamp();
        self.credential_store.record_login(&user.id, now).await?;

        let user = user::Model {
            last_login_at: Some(now),
            ..user
        };
        tracing::info!("User {} logged in", user.id);

        let report = self
            .audit_logger
            .log_login_success(ctx, &user, &token.jti)
            .await;

        Ok(ActionOutcome::new(LoginResult {
            token,
            user: UserProfile::from(user),
        })
        .with_report(report))
    }

    /// Start a password reset
    ///
    /// Always succeeds so callers cannot probe which addresses exist. For a
    /// known active account a reset token replaces any earlier one and is
    /// sent to the address.
    pub async fn request_password_reset(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> CoordinatorResult<()> {
        let email = email.trim().to_lowercase();

        let user = match self.credential_store.find_by_email(&email).await? {
            Some(user) if user.is_active => user,
            Some(user) => {
                tracing::debug!("Password reset requested for inactive user {}", user.id);
                return Ok(ActionOutcome::new(()));
            }
            None => {
                tracing::debug!("Password reset requested for unknown address");
                return Ok(ActionOutcome::new(()));
            }
        };

        let token = self.crypto.generate_token();
        let expires_at = Utc::now().timestamp() + self.password_reset_ttl_minutes * 60;
        self.credential_store
            .set_reset_token(&user.id, &self.crypto.hash_token(&token), expires_at)
            .await?;

        let mut outcome = ActionOutcome::new(());
        outcome.push(
            dispatch(
                self.notifier.as_ref(),
                &Notification::PasswordReset {
                    to: user.email.clone(),
                    username: user.username.clone(),
                    token,
                    expires_at,
                },
            )
            .await,
        );
        outcome.push(
            self.audit_logger
                .for_context(AuditAction::PasswordResetRequested, ctx)
                .actor(user.id.clone())
                .details("Password reset requested")
                .target("users", user.id.clone())
                .add_sensitive("email", &email)
                .record()
                .await,
        );

        Ok(outcome)
    }

    /// Complete a password reset with the emailed token
    ///
    /// The hash replacement is conditional on the token digest still being
    /// stored, so a token works once.
    pub async fn reset_password(
        &self,
        ctx: &RequestContext,
        token: &str,
        new_password: &str,
    ) -> CoordinatorResult<()> {
        let token_hash = self.hash_presented_token(token, RESET_TOKEN)?;

        let user = self
            .credential_store
            .find_by_reset_token(&token_hash)
            .await?
            .ok_or_else(|| CredentialError::invalid_token(RESET_TOKEN))?;

        if is_expired(user.reset_expires_at) {
            self.credential_store.clear_reset_token(&user.id).await?;
            self.audit_logger
                .log_token_expired(ctx, AuditAction::ResetTokenExpired, &user, user.reset_expires_at)
                .await;
            return Err(CredentialError::expired_token(RESET_TOKEN).into());
        }

        self.check_password_policy(new_password, &user.username)?;
        let password_hash = self.crypto.hash_password(new_password)?;

        if !self
            .credential_store
            .reset_password(&user.id, &token_hash, &password_hash)
            .await?
        {
            return Err(CredentialError::invalid_token(RESET_TOKEN).into());
        }

        tracing::info!("Password reset completed for user {}", user.id);

        let mut outcome = ActionOutcome::new(());
        outcome.push(
            self.audit_logger
                .for_context(AuditAction::PasswordReset, ctx)
                .actor(user.id.clone())
                .details(format!("Password reset for {}", user.username))
                .target("users", user.id.clone())
                .record()
                .await,
        );
        outcome.push(
            dispatch(
                self.notifier.as_ref(),
                &Notification::PasswordChanged {
                    to: user.email.clone(),
                    username: user.username.clone(),
                },
            )
            .await,
        );

        Ok(outcome)
    }

    /// Change the authenticated caller's password
    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        current_password: &str,
        new_password: &str,
    ) -> CoordinatorResult<()> {
        let user_id = require_user_id(ctx)?;
        let user = self.credential_store.get_user(user_id).await?;

        if !self.crypto.verify_password(current_password, &user.password_hash)? {
            return Err(CredentialError::IncorrectPassword.into());
        }
        if current_password == new_password {
            return Err(InternalError::validation(
                "new_password",
                "New password must differ from the current password",
            ));
        }
        self.check_password_policy(new_password, &user.username)?;

        let password_hash = self.crypto.hash_password(new_password)?;
        self.credential_store
            .set_password_hash(&user.id, &password_hash)
            .await?;

        tracing::info!("User {} changed their password", user.id);

        let mut outcome = ActionOutcome::new(());
        outcome.push(
            self.audit_logger
                .for_context(AuditAction::PasswordChanged, ctx)
                .details(format!("Password changed for {}", user.username))
                .target("users", user.id.clone())
                .record()
                .await,
        );
        outcome.push(
            dispatch(
                self.notifier.as_ref(),
                &Notification::PasswordChanged {
                    to: user.email.clone(),
                    username: user.username.clone(),
                },
            )
            .await,
        );

        Ok(outcome)
    }

    /// The authenticated caller's account
    pub async fn current_user(&self, ctx: &RequestContext) -> Result<UserProfile, InternalError> {
        let user_id = require_user_id(ctx)?;
        let user = self.credential_store.get_user(user_id).await?;
        Ok(UserProfile::from(user))
    }

    /// Update the caller's phone number, department or profile picture
    pub async fn update_profile(
        &self,
        ctx: &RequestContext,
        update: UserUpdate,
    ) -> CoordinatorResult<UserProfile> {
        let user_id = require_user_id(ctx)?;
        validate_profile_update(&update)?;

        let before = self.credential_store.get_user(user_id).await?;
        let after = self.credential_store.update_user(user_id, &update).await?;

        let report = self
            .audit_logger
            .for_context(AuditAction::ProfileUpdated, ctx)
            .details(format!("Profile updated for {}", after.username))
            .target("users", after.id.clone())
            .old_values(profile_snapshot(&before))
            .new_values(profile_snapshot(&after))
            .record()
            .await;

        Ok(ActionOutcome::new(UserProfile::from(after)).with_report(report))
    }

    fn check_password_policy(&self, password: &str, username: &str) -> Result<(), InternalError> {
        self.password_policy
            .validate(password, Some(username))
            .map_err(|e| CredentialError::PasswordValidationFailed(e.to_string()).into())
    }

    fn hash_presented_token(&self, token: &str, token_type: &str) -> Result<String, InternalError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CredentialError::invalid_token(token_type).into());
        }
        Ok(self.crypto.hash_token(token))
    }
}

fn is_expired(expires_at: Option<i64>) -> bool {
    expires_at.is_none_or(|at| at <= Utc::now().timestamp())
}

fn profile_snapshot(user: &user::Model) -> serde_json::Value {
    json!({
        "phone_number": user.phone_number,
        "department": user.department,
        "profile_picture": user.profile_picture,
    })
}

/// Trimmed username if it is 3-50 characters of `[A-Za-z0-9_.-]`
pub(crate) fn validate_username(username: &str) -> Result<String, InternalError> {
    let username = username.trim();
    let length = username.chars().count();
    if !(3..=50).contains(&length) {
        return Err(InternalError::validation(
            "username",
            "Username must be between 3 and 50 characters",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(InternalError::validation(
            "username",
            "Username may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(username.to_string())
}

/// Trimmed, lowercased email if it has the shape `local@domain.tld`
pub(crate) fn validate_email(email: &str) -> Result<String, InternalError> {
    let email = email.trim().to_lowercase();
    let invalid = || InternalError::validation("email", "Email address is not valid");

    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let Some((name, tld)) = domain.rsplit_once('.') else {
        return Err(invalid());
    };
    if name.is_empty() || tld.is_empty() || domain.starts_with('.') {
        return Err(invalid());
    }
    Ok(email)
}

fn validate_profile_update(update: &UserUpdate) -> Result<(), InternalError> {
    if update.is_empty() {
        return Err(InternalError::validation(
            "profile",
            "At least one field must be provided",
        ));
    }
    if let Some(phone) = &update.phone_number {
        let phone = phone.trim();
        if phone.len() > 32
            || !phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
        {
            return Err(InternalError::validation(
                "phone_number",
                "Phone number may contain digits, spaces, '+', '-' and parentheses",
            ));
        }
    }
    if update.department.as_ref().is_some_and(|d| d.trim().chars().count() > 100) {
        return Err(InternalError::validation(
            "department",
            "Department must not exceed 100 characters",
        ));
    }
    if update.profile_picture.as_ref().is_some_and(|p| p.trim().len() > 512) {
        return Err(InternalError::validation(
            "profile_picture",
            "Profile picture reference must not exceed 512 characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::api::ApiError;
    use crate::errors::internal::AuthorizationError;
    use crate::test::utils::{
        FailingNotifier, authenticated_context, setup_test_app_data, setup_test_app_data_with,
    };
    use crate::types::internal::action_outcome::SideChannel;
    use crate::types::internal::audit::AuditFilter;

    fn alice() -> RegisterInput {
        RegisterInput {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "pw12345678".to_string(),
            role: Some(Role::DataEntry),
        }
    }

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username("  bob.smith ").unwrap(), "bob.smith");
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());
        assert!(validate_username("bob smith").is_err());
        assert!(validate_username("bob@home").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(
            validate_email(" Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        for bad in ["alice", "@example.com", "alice@", "alice@example", "a b@example.com", "a@b@c.com", "alice@.com"] {
            assert!(validate_email(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[tokio::test]
    async fn test_register_stores_hash_and_future_verification_token() {
        let (app_data, notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data.clone());
        let ctx = RequestContext::for_api(None);

        let outcome = coordinator.register(&ctx, alice()).await.unwrap();
        assert!(outcome.side_effects_ok());
        assert_eq!(outcome.value.role, Role::DataEntry);
        assert!(!outcome.value.email_verified);

        let stored = app_data
            .credential_store
            .get_user(&outcome.value.id)
            .await
            .unwrap();
        assert_ne!(stored.password_hash, "pw12345678");
        assert!(stored.password_hash.starts_with("$argon2id$"));
        assert!(stored.verification_expires_at.unwrap() > Utc::now().timestamp());

        // Plaintext token only travels in the notification
        let token = notifier.last_verification_token("alice@example.com").unwrap();
        assert_ne!(stored.verification_token_hash.as_deref(), Some(token.as_str()));
    }

    #[tokio::test]
    async fn test_register_defaults_to_data_entry_and_rejects_super_admin() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data);
        let ctx = RequestContext::for_api(None);

        let mut input = alice();
        input.role = None;
        let profile = coordinator.register(&ctx, input).await.unwrap().value;
        assert_eq!(profile.role, Role::DataEntry);

        let mut input = alice();
        input.username = "mallory".to_string();
        input.email = "mallory@example.com".to_string();
        input.role = Some(Role::SuperAdmin);
        let err = coordinator.register(&ctx, input).await.unwrap_err();
        assert!(matches!(err, InternalError::Validation { ref field, .. } if field == "role"));
    }

    #[tokio::test]
    async fn test_register_duplicate_username_conflicts() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data);
        let ctx = RequestContext::for_api(None);

        coordinator.register(&ctx, alice()).await.unwrap();

        let mut again = alice();
        again.email = "other@example.com".to_string();
        let err = coordinator.register(&ctx, again).await.unwrap_err();
        assert!(matches!(
            err,
            InternalError::Credential(CredentialError::DuplicateUsername(_))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data);

        let mut input = alice();
        input.password = "short1".to_string();
        let err = coordinator
            .register(&RequestContext::for_api(None), input)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::Credential(CredentialError::PasswordValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_email_twice_fails_second_time() {
        let (app_data, notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data);
        let ctx = RequestContext::for_api(None);
        coordinator.register(&ctx, alice()).await.unwrap();
        let token = notifier.last_verification_token("alice@example.com").unwrap();

        let first = coordinator.verify_email(&ctx, &token).await.unwrap();
        assert!(first.value.email_verified);
        assert!(notifier
            .sent()
            .iter()
            .any(|n| matches!(n, Notification::Welcome { .. })));

        let err = coordinator.verify_email(&ctx, &token).await.unwrap_err();
        assert!(matches!(
            err,
            InternalError::Credential(CredentialError::InvalidToken { .. })
        ));
    }

    #[tokio::test]
    async fn test_verify_email_expired_token_is_cleared() {
        let (app_data, notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data.clone());
        let ctx = RequestContext::for_api(None);
        let profile = coordinator.register(&ctx, alice()).await.unwrap().value;
        let token = notifier.last_verification_token("alice@example.com").unwrap();

        let past = Utc::now().timestamp() - 60;
        app_data
            .credential_store
            .set_verification_token(&profile.id, &app_data.crypto.hash_token(&token), past)
            .await
            .unwrap();

        let err = coordinator.verify_email(&ctx, &token).await.unwrap_err();
        assert!(matches!(
            err,
            InternalError::Credential(CredentialError::ExpiredToken { .. })
        ));

        // Cleared on first sight, so the second attempt reads as unknown
        let err = coordinator.verify_email(&ctx, &token).await.unwrap_err();
        assert!(matches!(
            err,
            InternalError::Credential(CredentialError::InvalidToken { .. })
        ));

        let expired = AuditFilter {
            action: Some("VERIFICATION_TOKEN_EXPIRED".to_string()),
            ..Default::default()
        };
        let (entries, total) = app_data.audit_store.list(&expired, 1, 20).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].record_id.as_deref(), Some(profile.id.as_str()));
    }

    #[tokio::test]
    async fn test_login_unknown_user_and_wrong_password_are_identical() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data);
        let ctx = RequestContext::for_api(None);
        coordinator.register(&ctx, alice()).await.unwrap();

        let wrong_password = coordinator
            .login(&ctx, "alice", "not-the-password1")
            .await
            .unwrap_err();
        let unknown_user = coordinator
            .login(&ctx, "nobody", "pw12345678")
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert!(matches!(
            wrong_password,
            InternalError::Credential(CredentialError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_issues_token_with_stored_role() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data.clone());
        let ctx = RequestContext::for_api(None);
        coordinator.register(&ctx, alice()).await.unwrap();

        let outcome = coordinator.login(&ctx, "alice", "pw12345678").await.unwrap();
        let claims = app_data.tokens.verify(&outcome.value.token.token).unwrap();

        assert_eq!(claims.role, Role::DataEntry);
        assert_eq!(claims.sub, outcome.value.user.id);
        assert!(!claims.email_verified);
        assert!(outcome.value.user.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_login_deactivated_account() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data.clone());
        let ctx = RequestContext::for_api(None);
        let profile = coordinator.register(&ctx, alice()).await.unwrap().value;
        app_data
            .credential_store
            .set_active(&profile.id, false)
            .await
            .unwrap();

        let err = coordinator
            .login(&ctx, "alice", "pw12345678")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::Credential(CredentialError::AccountDeactivated)
        ));
    }

    #[tokio::test]
    async fn test_password_reset_flow_is_single_use() {
        let (app_data, notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data);
        let ctx = RequestContext::for_api(None);
        coordinator.register(&ctx, alice()).await.unwrap();

        coordinator
            .request_password_reset(&ctx, "ALICE@example.com")
            .await
            .unwrap();
        let token = notifier.last_reset_token("alice@example.com").unwrap();

        coordinator
            .reset_password(&ctx, &token, "fresh-pass-42")
            .await
            .unwrap();
        assert!(coordinator.login(&ctx, "alice", "fresh-pass-42").await.is_ok());

        let err = coordinator
            .reset_password(&ctx, &token, "another-pass-42")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::Credential(CredentialError::InvalidToken { .. })
        ));
    }

    #[tokio::test]
    async fn test_expired_reset_token_is_cleared_and_audited() {
        let (app_data, notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data.clone());
        let ctx = RequestContext::for_api(None);
        let profile = coordinator.register(&ctx, alice()).await.unwrap().value;

        coordinator
            .request_password_reset(&ctx, "alice@example.com")
            .await
            .unwrap();
        let token = notifier.last_reset_token("alice@example.com").unwrap();

        let past = Utc::now().timestamp() - 60;
        app_data
            .credential_store
            .set_reset_token(&profile.id, &app_data.crypto.hash_token(&token), past)
            .await
            .unwrap();

        let err = coordinator
            .reset_password(&ctx, &token, "fresh-pass-42")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::Credential(CredentialError::ExpiredToken { .. })
        ));
        assert_eq!(ApiError::from(err).status(), 410);

        let err = coordinator
            .reset_password(&ctx, &token, "fresh-pass-42")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::Credential(CredentialError::InvalidToken { .. })
        ));
        assert_eq!(ApiError::from(err).status(), 400);

        let stored = app_data.credential_store.get_user(&profile.id).await.unwrap();
        assert!(stored.reset_token_hash.is_none());
        assert!(stored.reset_expires_at.is_none());
        assert!(coordinator.login(&ctx, "alice", "fresh-pass-42").await.is_err());

        let expired = AuditFilter {
            action: Some("RESET_TOKEN_EXPIRED".to_string()),
            ..Default::default()
        };
        assert_eq!(app_data.audit_store.list(&expired, 1, 20).await.unwrap().1, 1);
    }

    #[tokio::test]
    async fn test_password_reset_for_unknown_email_sends_nothing() {
        let (app_data, notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data);

        let outcome = coordinator
            .request_password_reset(&RequestContext::for_api(None), "ghost@example.com")
            .await
            .unwrap();

        assert!(outcome.side_effects.is_empty());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_change_password_requires_current_password() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data);
        let anon = RequestContext::for_api(None);
        let profile = coordinator.register(&anon, alice()).await.unwrap().value;
        let ctx = authenticated_context(&profile.id, Role::DataEntry, true);

        let err = coordinator
            .change_password(&ctx, "wrong-current-1", "brand-new-pass-9")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::Credential(CredentialError::IncorrectPassword)
        ));

        coordinator
            .change_password(&ctx, "pw12345678", "brand-new-pass-9")
            .await
            .unwrap();
        assert!(coordinator.login(&anon, "alice", "brand-new-pass-9").await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_without_identity() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data);

        let err = coordinator
            .change_password(&RequestContext::for_api(None), "a", "b")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::Authorization(AuthorizationError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn test_resend_verification_replaces_token() {
        let (app_data, notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data);
        let anon = RequestContext::for_api(None);
        let profile = coordinator.register(&anon, alice()).await.unwrap().value;
        let first = notifier.last_verification_token("alice@example.com").unwrap();
        let ctx = authenticated_context(&profile.id, Role::DataEntry, false);

        coordinator.resend_verification(&ctx).await.unwrap();
        let second = notifier.last_verification_token("alice@example.com").unwrap();
        assert_ne!(first, second);

        assert!(coordinator.verify_email(&anon, &first).await.is_err());
        coordinator.verify_email(&anon, &second).await.unwrap();

        let err = coordinator.resend_verification(&ctx).await.unwrap_err();
        assert!(matches!(err, InternalError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_profile_records_before_and_after() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let coordinator = AuthCoordinator::new(app_data);
        let profile = coordinator
            .register(&RequestContext::for_api(None), alice())
            .await
            .unwrap()
            .value;
        let ctx = authenticated_context(&profile.id, Role::DataEntry, true);

        let updated = coordinator
            .update_profile(
                &ctx,
                UserUpdate {
                    department: Some("Finance".to_string()),
                    phone_number: Some("+63 912 345 6789".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.value.department.as_deref(), Some("Finance"));
        assert!(updated.side_effects_ok());

        let err = coordinator
            .update_profile(&ctx, UserUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InternalError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_undo_registration() {
        let app_data = setup_test_app_data_with(Arc::new(FailingNotifier)).await;
        let coordinator = AuthCoordinator::new(app_data.clone());

        let outcome = coordinator
            .register(&RequestContext::for_api(None), alice())
            .await
            .unwrap();

        assert!(!outcome.side_effects_ok());
        assert_eq!(outcome.reports(SideChannel::Notification).count(), 1);
        assert!(outcome.reports(SideChannel::Audit).all(|r| r.is_ok()));
        assert!(app_data
            .credential_store
            .find_by_username("alice")
            .await
            .unwrap()
            .is_some());
    }
}
