use crate::types::internal::permission::{Permission, RequestStatus};

/// Outbound message handed to the notification collaborator.
///
/// Content and delivery are owned by the collaborator; this only carries
/// what it needs to render the message.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    EmailVerification {
        to: String,
        username: String,
        token: String,
        expires_at: i64,
    },
    Welcome {
        to: String,
        username: String,
    },
    PasswordReset {
        to: String,
        username: String,
        token: String,
        expires_at: i64,
    },
    PasswordChanged {
        to: String,
        username: String,
    },
    PermissionReviewed {
        to: String,
        username: String,
        permission: Permission,
        status: RequestStatus,
        comments: Option<String>,
    },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Notification::EmailVerification { to, .. }
            | Notification::Welcome { to, .. }
            | Notification::PasswordReset { to, .. }
            | Notification::PasswordChanged { to, .. }
            | Notification::PermissionReviewed { to, .. } => to,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::EmailVerification { .. } => "email_verification",
            Notification::Welcome { .. } => "welcome",
            Notification::PasswordReset { .. } => "password_reset",
            Notification::PasswordChanged { .. } => "password_changed",
            Notification::PermissionReviewed { .. } => "permission_reviewed",
        }
    }
}
