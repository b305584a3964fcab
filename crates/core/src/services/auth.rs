//! Authentication and session management.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::metrics::{record_session_created, record_user_signed_up};
use crate::models::{SessionUser, User, UserRole, UserSession};
use crate::ports::{NewUser, Repositories};

// =============================================================================
// Configuration
// =============================================================================

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 36;
const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 256;

/// Configuration for the auth service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// How long a login session stays valid.
    pub session_ttl: Duration,
    /// How long a reset-password token stays usable after it was sent.
    pub reset_password_token_max_age: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::days(14),
            reset_password_token_max_age: Duration::days(1),
        }
    }
}

// =============================================================================
// AuthService
// =============================================================================

/// Signup, login, email confirmation, and password reset flows.
///
/// Sessions are opaque bearer tokens persisted through the session
/// repository; the HTTP layer resolves them into a [`SessionUser`]
/// before query execution.
pub struct AuthService {
    config: AuthConfig,
    repos: Arc<dyn Repositories>,
}

impl AuthService {
    pub fn new(config: AuthConfig, repos: Arc<dyn Repositories>) -> Self {
        Self { config, repos }
    }

    // -------------------------------------------------------------------------
    // Signup & login
    // -------------------------------------------------------------------------

    /// Register a new student account and open a session for it.
    #[instrument(skip_all, fields(username = %username))]
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<(User, UserSession)> {
        validate_username(username)?;
        validate_email(email)?;
        validate_password(password)?;

        if self
            .repos
            .users()
            .find_by_username_or_email(username)
            .await?
            .is_some()
            || self.repos.users().find_by_email(email).await?.is_some()
        {
            return Err(DomainError::Validation(
                "username or email already taken".into(),
            ));
        }

        let user = self
            .repos
            .users()
            .create(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                encrypted_password: hash_password(password)?,
                role: UserRole::Student,
                confirmation_token: Some(Uuid::new_v4()),
                avatar_url: None,
            })
            .await?;

        record_user_signed_up();
        info!(user_id = %user.id, "🎸 User signed up");

        let session = self.create_session(user.id, now).await?;
        Ok((user, session))
    }

    /// Authenticate by username or email and open a session.
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<(User, UserSession)> {
        let user = self
            .get_authenticated_user(username_or_email, password)
            .await?
            .ok_or_else(|| {
                DomainError::Forbidden("wrong username, email, or password".into())
            })?;

        let session = self.create_session(user.id, now).await?;
        Ok((user, session))
    }

    /// Verify credentials without opening a session.
    pub async fn get_authenticated_user(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> DomainResult<Option<User>> {
        let user = self
            .repos
            .users()
            .find_by_username_or_email(username_or_email)
            .await?;

        Ok(user.filter(|u| verify_password(&u.encrypted_password, password)))
    }

    /// Close the session for the given token. Returns whether a session
    /// actually existed.
    pub async fn logout(&self, token: Uuid) -> DomainResult<bool> {
        Ok(self.repos.sessions().delete(token).await?)
    }

    // -------------------------------------------------------------------------
    // Session resolution
    // -------------------------------------------------------------------------

    /// Resolve a bearer token into the request's [`SessionUser`].
    ///
    /// Missing, expired, or dangling tokens resolve to the anonymous
    /// session user; only storage failures surface as errors.
    pub async fn session_user(
        &self,
        token: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> DomainResult<SessionUser> {
        let Some(token) = token else {
            return Ok(SessionUser::anonymous());
        };

        let Some(session) = self.repos.sessions().find_active(token, now).await? else {
            return Ok(SessionUser::anonymous());
        };

        let user = self.repos.users().find(session.user_id).await?;
        Ok(user
            .map(|u| SessionUser::from_user(&u))
            .unwrap_or_else(SessionUser::anonymous))
    }

    /// Get the full user behind a session id, if any.
    pub async fn whoami(&self, id: Option<Uuid>) -> DomainResult<Option<User>> {
        match id {
            Some(id) => Ok(self.repos.users().find(id).await?),
            None => Ok(None),
        }
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<UserSession> {
        let session = self
            .repos
            .sessions()
            .create(user_id, now, now + self.config.session_ttl)
            .await?;
        record_session_created();
        Ok(session)
    }

    // -------------------------------------------------------------------------
    // Email confirmation
    // -------------------------------------------------------------------------

    /// Confirm the user's email address with the token they were sent.
    #[instrument(skip(self, token))]
    pub async fn confirm_email(
        &self,
        id: Uuid,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<User> {
        let mut user = self
            .repos
            .users()
            .find(id)
            .await?
            .ok_or_else(|| DomainError::NotFound("user missing".into()))?;

        if user.is_confirmed() {
            return Err(DomainError::BadRequest("email already confirmed".into()));
        }
        match user.confirmation_token {
            None => return Err(DomainError::BadRequest("confirmation token missing".into())),
            Some(expected) if expected != token => {
                return Err(DomainError::BadRequest("invalid confirmation token".into()))
            }
            Some(_) => {}
        }

        user.confirmed_at = Some(now);
        user.confirmation_token = None;
        Ok(self.repos.users().update(&user).await?)
    }

    /// Issue a fresh confirmation token for an unconfirmed account.
    pub async fn reset_confirmation_token(&self, id: Uuid) -> DomainResult<User> {
        let mut user = self
            .repos
            .users()
            .find(id)
            .await?
            .ok_or_else(|| DomainError::NotFound("user missing".into()))?;

        if user.is_confirmed() {
            return Err(DomainError::BadRequest("email already confirmed".into()));
        }

        user.confirmation_token = Some(Uuid::new_v4());
        Ok(self.repos.users().update(&user).await?)
    }

    // -------------------------------------------------------------------------
    // Password reset
    // -------------------------------------------------------------------------

    /// Issue a fresh reset-password token for the account behind `email`.
    pub async fn refresh_reset_password_token(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<User> {
        let mut user = self
            .repos
            .users()
            .find_by_email(email)
            .await?
            .ok_or_else(|| DomainError::NotFound("user missing".into()))?;

        user.reset_password_token = Some(Uuid::new_v4());
        user.reset_password_token_sent_at = Some(now);
        Ok(self.repos.users().update(&user).await?)
    }

    /// Replace the password of the account holding the reset token.
    ///
    /// Invalidates every open session of the account, so a leaked
    /// password cannot keep riding an old login.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        token: Uuid,
        password: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut user = self
            .repos
            .users()
            .find_by_reset_password_token(token)
            .await?
            .ok_or_else(|| DomainError::BadRequest("invalid reset password token".into()))?;

        let sent_at = user
            .reset_password_token_sent_at
            .ok_or_else(|| DomainError::BadRequest("invalid reset password token".into()))?;
        if now - sent_at > self.config.reset_password_token_max_age {
            return Err(DomainError::BadRequest("reset password token expired".into()));
        }

        validate_password(password)?;
        user.encrypted_password = hash_password(password)?;
        user.reset_password_token = None;
        user.reset_password_token_sent_at = None;
        self.repos.users().update(&user).await?;
        self.repos.sessions().delete_all_for_user(user.id).await?;

        info!(user_id = %user.id, "🔑 Password reset");
        Ok(())
    }
}

// =============================================================================
// Validation & Hashing
// =============================================================================

fn validate_username(username: &str) -> DomainResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(DomainError::Validation(format!(
            "username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(DomainError::Validation(
            "username may only contain letters, numbers, '_', '-', and '.'".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> DomainResult<()> {
    let valid = email.len() <= 254
        && !email.contains(char::is_whitespace)
        && matches!(email.split_once('@'), Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'));

    if !valid {
        return Err(DomainError::Validation("email is invalid".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> DomainResult<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(DomainError::Validation(format!(
            "password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> DomainResult<String> {
    let salt: [u8; 16] = rand::random();
    argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
        .map_err(|e| DomainError::Internal(format!("password hashing failed: {e}")))
}

fn verify_password(encoded: &str, password: &str) -> bool {
    argon2::verify_encoded(encoded, password.as_bytes()).unwrap_or(false)
}
