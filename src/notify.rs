//! Notification Seam
//!
//! The auth service only needs somewhere to hand a reset token; actual
//! delivery belongs to an external collaborator behind this trait.

use async_trait::async_trait;

/// Outbound notification sender
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a password-reset token to the address. Fire-and-forget:
    /// delivery failures must not surface to the requester, or the
    /// response would reveal whether the address is registered.
    async fn send_password_reset(&self, email: &str, token: &str);
}

/// Default sender that records the hand-off in the log instead of
/// delivering mail. Useful for development and tests.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, email: &str, _token: &str) {
        // The token itself stays out of the log.
        tracing::info!(email = %email, "Password reset token issued");
    }
}
