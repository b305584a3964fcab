//! Email notifications: confirmation and password-reset links.

use std::sync::Arc;

use tracing::instrument;
use url::Url;

use crate::error::{DomainError, DomainResult};
use crate::metrics::record_email_sent;
use crate::models::User;
use crate::ports::{Email, Mailer};

/// Sender address for transactional mail.
const INFO_EMAIL: &str = "StringSync <info@stringsync.com>";

/// Configuration for the notification service.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Origin of the web frontend, used to build links
    /// (e.g. `https://stringsync.com`).
    pub web_origin: String,
}

pub struct NotificationService {
    config: NotificationConfig,
    mailer: Arc<dyn Mailer>,
}

impl NotificationService {
    pub fn new(config: NotificationConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self { config, mailer }
    }

    /// Send the email-confirmation link to a freshly signed-up user.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn send_confirmation_email(&self, user: &User) -> DomainResult<()> {
        let token = user.confirmation_token.ok_or_else(|| {
            DomainError::Validation("user must have a confirmation token".into())
        })?;

        let href = self.link("confirm-email", "confirmation_token", &token.to_string())?;
        self.mailer
            .send(Email {
                from: INFO_EMAIL.into(),
                to: user.email.clone(),
                subject: "Confirm your email for StringSync".into(),
                html: format!(
                    r#"<p>Please confirm your email for <a href="{href}">StringSync</a></p>"#
                ),
            })
            .await?;

        record_email_sent("confirmation");
        Ok(())
    }

    /// Send the password-reset link to a user holding a reset token.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn send_reset_password_email(&self, user: &User) -> DomainResult<()> {
        let token = user.reset_password_token.ok_or_else(|| {
            DomainError::Validation("user must have a reset password token".into())
        })?;

        let href = self.link("reset-password", "reset_password_token", &token.to_string())?;
        self.mailer
            .send(Email {
                from: INFO_EMAIL.into(),
                to: user.email.clone(),
                subject: "Reset your password for StringSync".into(),
                html: format!(r#"<p>Reset your password at <a href="{href}">StringSync</a></p>"#),
            })
            .await?;

        record_email_sent("reset_password");
        Ok(())
    }

    fn link(&self, path: &str, param: &str, value: &str) -> DomainResult<String> {
        let mut url = Url::parse(&self.config.web_origin)
            .map_err(|e| DomainError::Internal(format!("invalid web origin: {e}")))?;
        url.set_path(path);
        url.query_pairs_mut().append_pair(param, value);
        Ok(url.to_string())
    }
}
