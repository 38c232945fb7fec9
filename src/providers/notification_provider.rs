use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::internal::action_outcome::{SideChannel, SideEffectReport};
use crate::types::internal::notification::Notification;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound message delivery
///
/// Delivery mechanics live outside this service. Callers treat delivery as
/// best-effort: a failure never undoes the state change that triggered it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Send and convert the outcome into a side effect report
pub async fn dispatch(notifier: &dyn Notifier, notification: &Notification) -> SideEffectReport {
    match notifier.send(notification).await {
        Ok(()) => SideEffectReport::succeeded(SideChannel::Notification),
        Err(e) => {
            tracing::error!(
                "Failed to send {} notification: {}",
                notification.kind(),
                e
            );
            SideEffectReport::failed(SideChannel::Notification, e.to_string())
        }
    }
}

/// Default notifier: writes the message to the log instead of sending mail
pub struct LogNotifier {
    app_base_url: String,
    mail_from: String,
}

impl LogNotifier {
    pub fn new(app_base_url: &str, mail_from: &str) -> Self {
        Self {
            app_base_url: app_base_url.trim_end_matches('/').to_string(),
            mail_from: mail_from.to_string(),
        }
    }

    /// Link the recipient would follow, for messages that carry a token
    pub fn link_for(&self, notification: &Notification) -> Option<String> {
        match notification {
            Notification::EmailVerification { token, .. } => {
                Some(format!("{}/verify-email?token={}", self.app_base_url, token))
            }
            Notification::PasswordReset { token, .. } => {
                Some(format!("{}/reset-password?token={}", self.app_base_url, token))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        tracing::info!(
            from = %self.mail_from,
            to = %notification.recipient(),
            kind = notification.kind(),
            "Notification queued"
        );
        if let Some(link) = self.link_for(notification) {
            tracing::debug!(to = %notification.recipient(), "Notification link: {}", link);
        }
        Ok(())
    }
}

/// Notifier that keeps every message in memory
///
/// Used by the test suites to read back the tokens a user would receive.
#[derive(Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every notification sent so far
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Token of the latest verification message for `email`
    pub fn last_verification_token(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|n| match n {
            Notification::EmailVerification { to, token, .. } if to == email => Some(token),
            _ => None,
        })
    }

    /// Token of the latest password reset message for `email`
    pub fn last_reset_token(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|n| match n {
            Notification::PasswordReset { to, token, .. } if to == email => Some(token),
            _ => None,
        })
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .map_err(|e| NotificationError::Delivery(e.to_string()))?
            .push(notification.clone());
        Ok(())
    }
}
