use std::sync::Arc;

use poem::Request;
use poem_openapi::{OpenApi, Tags, payload::Json};

use crate::api::guard::{ANY_ROLE, AccessGuard};
use crate::coordinators::{AuthCoordinator, RegisterInput};
use crate::errors::ApiError;
use crate::stores::UserUpdate;
use crate::types::dto::auth::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RegisterApiResponse, RegisterRequest,
    RequestPasswordResetRequest, ResetPasswordRequest, UpdateProfileRequest, UserProfile,
    VerifyEmailRequest,
};
use crate::types::dto::common::MessageResponse;
use crate::types::internal::context::RequestContext;

/// Authentication API endpoints
pub struct AuthApi {
    coordinator: Arc<AuthCoordinator>,
    guard: AccessGuard,
}

impl AuthApi {
    pub fn new(coordinator: Arc<AuthCoordinator>, guard: AccessGuard) -> Self {
        Self { coordinator, guard }
    }
}

/// API tags for authentication endpoints
#[derive(Tags)]
enum AuthTags {
    /// Registration, login and credential management
    Authentication,
}

#[OpenApi(prefix_path = "/auth")]
impl AuthApi {
    /// Register a new account
    ///
    /// The account starts unverified; a verification token is sent to the
    /// email address.
    #[oai(path = "/register", method = "post", tag = "AuthTags::Authentication")]
    async fn register(
        &self,
        req: &Request,
        body: Json<RegisterRequest>,
    ) -> Result<RegisterApiResponse, ApiError> {
        let ctx = RequestContext::from_request(req);
        let Json(body) = body;

        let outcome = self
            .coordinator
            .register(
                &ctx,
                RegisterInput {
                    username: body.username,
                    email: body.email,
                    password: body.password,
                    role: body.role,
                },
            )
            .await?;

        Ok(RegisterApiResponse::Created(Json(outcome.into_value())))
    }

    /// Login with username and password to receive a bearer token
    #[oai(path = "/login", method = "post", tag = "AuthTags::Authentication")]
    async fn login(
        &self,
        req: &Request,
        body: Json<LoginRequest>,
    ) -> Result<Json<LoginResponse>, ApiError> {
        let ctx = RequestContext::from_request(req);

        let result = self
            .coordinator
            .login(&ctx, &body.username, &body.password)
            .await?
            .into_value();

        Ok(Json(LoginResponse {
            token: result.token.token,
            token_type: "Bearer".to_string(),
            expires_at: result.token.expires_at,
            user: result.user,
        }))
    }

    /// Verify an email address with the emailed token
    #[oai(path = "/verify-email", method = "post", tag = "AuthTags::Authentication")]
    async fn verify_email(
        &self,
        req: &Request,
        body: Json<VerifyEmailRequest>,
    ) -> Result<Json<UserProfile>, ApiError> {
        let ctx = RequestContext::from_request(req);
        let outcome = self.coordinator.verify_email(&ctx, &body.token).await?;
        Ok(Json(outcome.into_value()))
    }

    /// Send a fresh verification token to the caller
    #[oai(path = "/resend-verification", method = "post", tag = "AuthTags::Authentication")]
    async fn resend_verification(&self, req: &Request) -> Result<Json<MessageResponse>, ApiError> {
        let ctx = self.guard.require_allow_unverified(req, ANY_ROLE)?;
        self.coordinator.resend_verification(&ctx).await?;
        Ok(Json(MessageResponse::ok("Verification email sent")))
    }

    /// Request a password reset email
    ///
    /// Always answers 200 whether or not the address is registered.
    #[oai(path = "/request-password-reset", method = "post", tag = "AuthTags::Authentication")]
    async fn request_password_reset(
        &self,
        req: &Request,
        body: Json<RequestPasswordResetRequest>,
    ) -> Result<Json<MessageResponse>, ApiError> {
        let ctx = RequestContext::from_request(req);
        self.coordinator
            .request_password_reset(&ctx, &body.email)
            .await?;
        Ok(Json(MessageResponse::ok(
            "If the address is registered, a reset link has been sent",
        )))
    }

    /// Set a new password with the emailed reset token
    #[oai(path = "/reset-password", method = "post", tag = "AuthTags::Authentication")]
    async fn reset_password(
        &self,
        req: &Request,
        body: Json<ResetPasswordRequest>,
    ) -> Result<Json<MessageResponse>, ApiError> {
        let ctx = RequestContext::from_request(req);
        self.coordinator
            .reset_password(&ctx, &body.token, &body.new_password)
            .await?;
        Ok(Json(MessageResponse::ok("Password has been reset")))
    }

    /// Change the caller's password
    #[oai(path = "/change-password", method = "put", tag = "AuthTags::Authentication")]
    async fn change_password(
        &self,
        req: &Request,
        body: Json<ChangePasswordRequest>,
    ) -> Result<Json<MessageResponse>, ApiError> {
        let ctx = self.guard.require(req, ANY_ROLE)?;
        self.coordinator
            .change_password(&ctx, &body.current_password, &body.new_password)
            .await?;
        Ok(Json(MessageResponse::ok("Password changed")))
    }

    /// Current user's account
    #[oai(path = "/whoami", method = "get", tag = "AuthTags::Authentication")]
    async fn whoami(&self, req: &Request) -> Result<Json<UserProfile>, ApiError> {
        let ctx = self.guard.require_allow_unverified(req, ANY_ROLE)?;
        Ok(Json(self.coordinator.current_user(&ctx).await?))
    }

    /// Update phone number, department or profile picture
    #[oai(path = "/profile", method = "put", tag = "AuthTags::Authentication")]
    async fn update_profile(
        &self,
        req: &Request,
        body: Json<UpdateProfileRequest>,
    ) -> Result<Json<UserProfile>, ApiError> {
        let ctx = self.guard.require(req, ANY_ROLE)?;
        let Json(body) = body;

        let outcome = self
            .coordinator
            .update_profile(
                &ctx,
                UserUpdate {
                    phone_number: body.phone_number,
                    department: body.department,
                    profile_picture: body.profile_picture,
                },
            )
            .await?;

        Ok(Json(outcome.into_value()))
    }
}
