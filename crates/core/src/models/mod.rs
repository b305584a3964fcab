//! Domain models for the StringSync lesson library.
//!
//! These models are storage-agnostic and represent the canonical
//! form of application data within the domain layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ports::PagingEntity;

// =============================================================================
// Users
// =============================================================================

/// Role assigned to a user account.
///
/// Roles are ordered: `Student < Teacher < Admin`. Authorization checks
/// compare roles, so a teacher can do anything a student can, and an
/// admin can do anything a teacher can.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl UserRole {
    /// Canonical lowercase name, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Admin => "admin",
        }
    }

    /// Parse from the canonical lowercase name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(UserRole::Student),
            "teacher" => Some(UserRole::Teacher),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Monotonic paging position, assigned by the store at creation.
    /// No two live rows share a value; ordering by it matches insertion order.
    pub cursor: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub username: String,
    pub email: String,
    pub encrypted_password: String,
    pub role: UserRole,
    pub confirmation_token: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub reset_password_token: Option<Uuid>,
    pub reset_password_token_sent_at: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
}

impl User {
    /// Whether the account's email address has been confirmed.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }
}

impl PagingEntity for User {
    fn cursor(&self) -> i64 {
        self.cursor
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// A persisted login session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    /// Opaque bearer token identifying the session.
    pub token: Uuid,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    /// Whether the session is still valid at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Request-scoped view of the caller.
///
/// Every request carries one of these; anonymous callers get the
/// logged-out default (no id, student role).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Option<Uuid>,
    pub role: UserRole,
    pub is_logged_in: bool,
}

impl SessionUser {
    /// The logged-out caller.
    pub fn anonymous() -> Self {
        Self {
            id: None,
            role: UserRole::Student,
            is_logged_in: false,
        }
    }

    /// The view of a logged-in user.
    pub fn from_user(user: &User) -> Self {
        Self {
            id: Some(user.id),
            role: user.role,
            is_logged_in: true,
        }
    }
}

impl Default for SessionUser {
    fn default() -> Self {
        Self::anonymous()
    }
}

// =============================================================================
// Notations
// =============================================================================

/// A transcribed lesson: tablature synced against a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notation {
    pub id: Uuid,
    /// Monotonic paging position, assigned by the store at creation.
    pub cursor: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub song_name: String,
    pub artist_name: String,
    /// Lead-in before the first playable note, in milliseconds.
    pub dead_time_ms: i64,
    pub duration_ms: i64,
    pub featured: bool,
    pub transcriber_id: Uuid,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
}

impl PagingEntity for Notation {
    fn cursor(&self) -> i64 {
        self.cursor
    }
}

// =============================================================================
// Tags
// =============================================================================

/// A browsable label attached to notations (e.g. "acoustic", "jazz").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

/// Join row linking a notation to a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tagging {
    pub id: Uuid,
    pub notation_id: Uuid,
    pub tag_id: Uuid,
}

// =============================================================================
// Tests
// =============================================================================
