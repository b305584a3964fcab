//! Port trait for outbound mail.
//!
//! The domain layer composes messages; delivery is an infrastructure
//! concern behind this trait.

use async_trait::async_trait;
use tracing::info;

use crate::error::MailResult;

/// A composed email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Port trait for mail delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver the email.
    async fn send(&self, email: Email) -> MailResult<()>;
}

/// Mailer that logs messages instead of delivering them. Default for
/// development environments.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> MailResult<()> {
        info!(to = %email.to, subject = %email.subject, "📧 Mail (log only)");
        Ok(())
    }
}

/// Mailer that silently drops messages.
#[derive(Debug, Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, _email: Email) -> MailResult<()> {
        Ok(())
    }
}
