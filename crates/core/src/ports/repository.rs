//! Port traits for data repositories.
//!
//! These traits define the storage interface used by the domain layer.
//! Implementations live in the infrastructure layer (`stringsync-storage`)
//! and in [`crate::testing`] for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::models::{Notation, Tag, User, UserRole, UserSession};

use super::paging::{Connection, ConnectionArgs};

/// Default page size for user listings.
pub const USER_PAGE_LIMIT: i64 = 20;

/// Default page size for notation listings.
pub const NOTATION_PAGE_LIMIT: i64 = 10;

// =============================================================================
// Filter & Creation Types
// =============================================================================

/// Filter options for notation page queries.
///
/// Both fields narrow the paged dataset, so the min/max bounds used for
/// page-info flags are bounds of the filtered set.
#[derive(Debug, Clone, Default)]
pub struct NotationPageFilter {
    /// Case-insensitive substring match against song or artist name.
    pub query: Option<String>,
    /// Restrict to notations carrying any of these tags.
    pub tag_ids: Option<Vec<Uuid>>,
}

/// Attributes for creating a user. The store assigns id, cursor, and
/// timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub encrypted_password: String,
    pub role: UserRole,
    pub confirmation_token: Option<Uuid>,
    pub avatar_url: Option<String>,
}

/// Attributes for creating a notation.
#[derive(Debug, Clone)]
pub struct NewNotation {
    pub song_name: String,
    pub artist_name: String,
    pub transcriber_id: Uuid,
    pub dead_time_ms: i64,
    pub duration_ms: i64,
    pub featured: bool,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
}

// =============================================================================
// Repository Traits
// =============================================================================

/// Repository for user accounts.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Get a user by id.
    async fn find(&self, id: Uuid) -> StorageResult<Option<User>>;

    /// Get a user whose username or email matches the given value.
    async fn find_by_username_or_email(&self, username_or_email: &str)
        -> StorageResult<Option<User>>;

    /// Get a user by email.
    async fn find_by_email(&self, email: &str) -> StorageResult<Option<User>>;

    /// Get a user holding the given reset-password token.
    async fn find_by_reset_password_token(&self, token: Uuid) -> StorageResult<Option<User>>;

    /// List all users, newest first.
    async fn find_all(&self) -> StorageResult<Vec<User>>;

    /// Count all users.
    async fn count(&self) -> StorageResult<i64>;

    /// Create a user.
    async fn create(&self, attrs: NewUser) -> StorageResult<User>;

    /// Persist all mutable columns of the given user. Returns the stored
    /// row (with a refreshed `updated_at`).
    async fn update(&self, user: &User) -> StorageResult<User>;

    /// Fetch one page of users ordered by cursor.
    async fn find_page(&self, args: &ConnectionArgs) -> StorageResult<Connection<User>>;
}

/// Repository for notations.
#[async_trait]
pub trait NotationRepo: Send + Sync {
    /// Get a notation by id.
    async fn find(&self, id: Uuid) -> StorageResult<Option<Notation>>;

    /// List notations transcribed by the given user.
    async fn find_all_by_transcriber_id(&self, transcriber_id: Uuid)
        -> StorageResult<Vec<Notation>>;

    /// List notations carrying the given tag.
    async fn find_all_by_tag_id(&self, tag_id: Uuid) -> StorageResult<Vec<Notation>>;

    /// Count all notations.
    async fn count(&self) -> StorageResult<i64>;

    /// Create a notation (without taggings - see
    /// [`Repositories::create_notation_with_tags`] for the atomic variant).
    async fn create(&self, attrs: NewNotation) -> StorageResult<Notation>;

    /// Persist all mutable columns of the given notation.
    async fn update(&self, notation: &Notation) -> StorageResult<Notation>;

    /// Fetch one page of notations matching the filter, ordered by cursor.
    async fn find_page(
        &self,
        args: &ConnectionArgs,
        filter: &NotationPageFilter,
    ) -> StorageResult<Connection<Notation>>;
}

/// Repository for tags.
#[async_trait]
pub trait TagRepo: Send + Sync {
    /// Get a tag by id.
    async fn find(&self, id: Uuid) -> StorageResult<Option<Tag>>;

    /// List all tags, ordered by name.
    async fn find_all(&self) -> StorageResult<Vec<Tag>>;

    /// List tags attached to the given notation.
    async fn find_all_by_notation_id(&self, notation_id: Uuid) -> StorageResult<Vec<Tag>>;

    /// Create a tag.
    async fn create(&self, name: &str) -> StorageResult<Tag>;
}

/// Repository for login sessions.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Create a session for the given user.
    async fn create(
        &self,
        user_id: Uuid,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<UserSession>;

    /// Get the session for a token if it has not expired at `now`.
    async fn find_active(&self, token: Uuid, now: DateTime<Utc>)
        -> StorageResult<Option<UserSession>>;

    /// Delete a session. Returns whether a session existed.
    async fn delete(&self, token: Uuid) -> StorageResult<bool>;

    /// Delete every session belonging to the given user.
    async fn delete_all_for_user(&self, user_id: Uuid) -> StorageResult<u64>;
}

// =============================================================================
// Composite Repository
// =============================================================================

/// Combined repository access for the application.
///
/// This trait provides access to all individual repositories and
/// atomic operations that span multiple tables.
#[async_trait]
pub trait Repositories: Send + Sync {
    /// Access the user repository.
    fn users(&self) -> &dyn UserRepo;

    /// Access the notation repository.
    fn notations(&self) -> &dyn NotationRepo;

    /// Access the tag repository.
    fn tags(&self) -> &dyn TagRepo;

    /// Access the session repository.
    fn sessions(&self) -> &dyn SessionRepo;

    /// Create a notation together with its taggings in a single
    /// transaction. If any tagging insert fails, the notation is rolled
    /// back with it.
    async fn create_notation_with_tags(
        &self,
        attrs: NewNotation,
        tag_ids: &[Uuid],
    ) -> StorageResult<Notation>;
}
