//! GraphQL schema definition.
//!
//! This module provides the GraphQL schema for the lesson library:
//! queries over users, notations, and tags, plus the auth and
//! publishing mutations.

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, Object, Result, Schema};
use chrono::{DateTime, Utc};
use tracing::error;
use uuid::Uuid;

use stringsync_core::models::SessionUser;
use stringsync_core::ports::{ConnectionArgs, NotationPageFilter};
use stringsync_core::services::{
    AuthService, CreateNotation, NotationService, NotificationService, TagService, UserService,
};

use crate::types::StringsyncSchema;

// -----------------------------------------------------------------------------
// Schema Configuration
// -----------------------------------------------------------------------------

/// Maximum query depth to prevent deeply nested queries (DoS protection).
/// Note: GraphQL introspection requires depth ~13, so we use 15 to allow it.
pub const MAX_QUERY_DEPTH: usize = 15;

/// Maximum query complexity score (DoS protection).
/// Each field has a default complexity of 1, nested objects multiply.
pub const MAX_QUERY_COMPLEXITY: usize = 500;

/// Maximum length for string filter parameters.
const MAX_FILTER_STRING_LENGTH: usize = 128;

// -----------------------------------------------------------------------------
// Services & Request Data
// -----------------------------------------------------------------------------

/// Service bundle stored in the schema's context data.
#[derive(Clone)]
pub struct StringsyncServices {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub notations: Arc<NotationService>,
    pub tags: Arc<TagService>,
    pub notifications: Arc<NotificationService>,
}

/// Raw bearer token of the request, if one was presented.
///
/// Injected per request by the HTTP layer alongside the resolved
/// [`SessionUser`]; mutations like `logout` need the token itself.
#[derive(Debug, Clone, Copy)]
pub struct SessionToken(pub Option<Uuid>);

// -----------------------------------------------------------------------------
// Schema Builder
// -----------------------------------------------------------------------------

/// Build the GraphQL schema.
///
/// Includes query depth and complexity limits for DoS protection.
pub fn build_schema(services: StringsyncServices) -> StringsyncSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(services)
        .limit_depth(MAX_QUERY_DEPTH)
        .limit_complexity(MAX_QUERY_COMPLEXITY)
        .finish()
}

// -----------------------------------------------------------------------------
// Auth Requirements
// -----------------------------------------------------------------------------

/// Authorization requirement guarding an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    None,
    LoggedIn,
    LoggedOut,
    LoggedInAsTeacher,
    LoggedInAsAdmin,
}

/// Check the caller against a requirement.
pub fn ensure_auth(session: &SessionUser, requirement: AuthRequirement) -> Result<()> {
    use stringsync_core::models::UserRole;

    let ok = match requirement {
        AuthRequirement::None => true,
        AuthRequirement::LoggedIn => session.is_logged_in,
        AuthRequirement::LoggedOut => !session.is_logged_in,
        AuthRequirement::LoggedInAsTeacher => {
            session.is_logged_in && session.role >= UserRole::Teacher
        }
        AuthRequirement::LoggedInAsAdmin => {
            session.is_logged_in && session.role >= UserRole::Admin
        }
    };

    if ok {
        Ok(())
    } else {
        Err(async_graphql::Error::new(match requirement {
            AuthRequirement::None => "unreachable",
            AuthRequirement::LoggedIn => "must be logged in",
            AuthRequirement::LoggedOut => "must be logged out",
            AuthRequirement::LoggedInAsTeacher => "must be logged in as a teacher",
            AuthRequirement::LoggedInAsAdmin => "must be logged in as an admin",
        }))
    }
}

fn session_user(ctx: &Context<'_>) -> SessionUser {
    ctx.data_opt::<SessionUser>().copied().unwrap_or_default()
}

fn session_token(ctx: &Context<'_>) -> Option<Uuid> {
    ctx.data_opt::<SessionToken>().and_then(|t| t.0)
}

fn services<'a>(ctx: &Context<'a>) -> Result<&'a StringsyncServices> {
    ctx.data::<StringsyncServices>()
}

// -----------------------------------------------------------------------------
// Query Root
// -----------------------------------------------------------------------------

/// Query root for the lesson library.
#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Get the user behind the current session, if any.
    async fn whoami<'ctx>(&self, ctx: &Context<'ctx>) -> Result<Option<User>> {
        let session = session_user(ctx);
        let user = services(ctx)?.auth.whoami(session.id).await?;
        Ok(user.map(User::from))
    }

    /// Get a user by id.
    async fn user<'ctx>(&self, ctx: &Context<'ctx>, id: Uuid) -> Result<Option<User>> {
        let user = services(ctx)?.users.find(id).await?;
        Ok(user.map(User::from))
    }

    /// List users with pagination. Admin only.
    async fn users<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        first: Option<i64>,
        after: Option<String>,
        last: Option<i64>,
        before: Option<String>,
    ) -> Result<UserConnection> {
        ensure_auth(&session_user(ctx), AuthRequirement::LoggedInAsAdmin)?;

        // Paging arguments go through verbatim; the pager owns
        // validation and the page-size ceiling.
        let args = ConnectionArgs {
            first,
            after,
            last,
            before,
        };
        let connection = services(ctx)?.users.find_page(&args).await?;
        Ok(UserConnection::from(connection))
    }

    /// Get a notation by id.
    async fn notation<'ctx>(&self, ctx: &Context<'ctx>, id: Uuid) -> Result<Option<Notation>> {
        let notation = services(ctx)?.notations.find(id).await?;
        Ok(notation.map(Notation::from))
    }

    /// List notations with pagination and filtering.
    #[allow(clippy::too_many_arguments)]
    async fn notations<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        first: Option<i64>,
        after: Option<String>,
        last: Option<i64>,
        before: Option<String>,
        query: Option<String>,
        tag_ids: Option<Vec<Uuid>>,
    ) -> Result<NotationConnection> {
        validate_filter_string(&query, "query")?;

        let args = ConnectionArgs {
            first,
            after,
            last,
            before,
        };
        let filter = NotationPageFilter { query, tag_ids };
        let connection = services(ctx)?.notations.find_page(&args, &filter).await?;
        Ok(NotationConnection::from(connection))
    }

    /// Get a tag by id.
    async fn tag<'ctx>(&self, ctx: &Context<'ctx>, id: Uuid) -> Result<Option<Tag>> {
        let tag = services(ctx)?.tags.find(id).await?;
        Ok(tag.map(Tag::from))
    }

    /// List all tags.
    async fn tags<'ctx>(&self, ctx: &Context<'ctx>) -> Result<Vec<Tag>> {
        let tags = services(ctx)?.tags.find_all().await?;
        Ok(tags.into_iter().map(Tag::from).collect())
    }
}

// -----------------------------------------------------------------------------
// Mutation Root
// -----------------------------------------------------------------------------

/// Mutation root for the lesson library.
#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Register a new account and open a session for it.
    async fn signup<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        input: SignupInput,
    ) -> Result<LoginPayload> {
        ensure_auth(&session_user(ctx), AuthRequirement::LoggedOut)?;
        let services = services(ctx)?;

        let (user, session) = services
            .auth
            .signup(&input.username, &input.email, &input.password, Utc::now())
            .await?;

        // Signup must not fail because mail delivery is down.
        if let Err(e) = services.notifications.send_confirmation_email(&user).await {
            error!(error = %e, user_id = %user.id, "❌ Failed to send confirmation email");
        }

        Ok(LoginPayload {
            token: session.token.to_string(),
            user: User::from(user),
        })
    }

    /// Authenticate and open a session.
    async fn login<'ctx>(&self, ctx: &Context<'ctx>, input: LoginInput) -> Result<LoginPayload> {
        ensure_auth(&session_user(ctx), AuthRequirement::LoggedOut)?;

        let (user, session) = services(ctx)?
            .auth
            .login(&input.username_or_email, &input.password, Utc::now())
            .await?;

        Ok(LoginPayload {
            token: session.token.to_string(),
            user: User::from(user),
        })
    }

    /// Close the current session. Returns whether a session was open.
    async fn logout<'ctx>(&self, ctx: &Context<'ctx>) -> Result<bool> {
        ensure_auth(&session_user(ctx), AuthRequirement::LoggedIn)?;

        let Some(token) = session_token(ctx) else {
            return Ok(false);
        };
        Ok(services(ctx)?.auth.logout(token).await?)
    }

    /// Confirm the current user's email address.
    async fn confirm_email<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        input: ConfirmEmailInput,
    ) -> Result<User> {
        let session = session_user(ctx);
        ensure_auth(&session, AuthRequirement::LoggedIn)?;
        let id = session
            .id
            .ok_or_else(|| async_graphql::Error::new("must be logged in"))?;

        let user = services(ctx)?
            .auth
            .confirm_email(id, input.confirmation_token, Utc::now())
            .await?;
        Ok(User::from(user))
    }

    /// Re-issue and re-send the confirmation email.
    ///
    /// Always reports success so callers cannot probe another account's
    /// confirmation state; failures are logged server-side.
    async fn resend_confirmation_email<'ctx>(&self, ctx: &Context<'ctx>) -> Result<bool> {
        let session = session_user(ctx);
        ensure_auth(&session, AuthRequirement::LoggedIn)?;
        let id = session
            .id
            .ok_or_else(|| async_graphql::Error::new("must be logged in"))?;
        let services = services(ctx)?;

        match services.auth.reset_confirmation_token(id).await {
            Ok(user) => {
                if let Err(e) = services.notifications.send_confirmation_email(&user).await {
                    error!(error = %e, user_id = %id, "❌ Failed to send confirmation email");
                }
            }
            Err(e) => {
                error!(error = %e, user_id = %id, "❌ Failed to reset confirmation token");
            }
        }

        Ok(true)
    }

    /// Send a password-reset link to the given email address.
    async fn send_reset_password_email<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        input: SendResetPasswordEmailInput,
    ) -> Result<bool> {
        let services = services(ctx)?;
        let user = services
            .auth
            .refresh_reset_password_token(&input.email, Utc::now())
            .await?;
        services.notifications.send_reset_password_email(&user).await?;
        Ok(true)
    }

    /// Replace a password using a reset token.
    async fn reset_password<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        input: ResetPasswordInput,
    ) -> Result<bool> {
        services(ctx)?
            .auth
            .reset_password(input.reset_password_token, &input.password, Utc::now())
            .await?;
        Ok(true)
    }

    /// Publish a new notation. Teachers only.
    async fn create_notation<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        input: CreateNotationInput,
    ) -> Result<Notation> {
        let session = session_user(ctx);
        ensure_auth(&session, AuthRequirement::LoggedInAsTeacher)?;
        let transcriber_id = session
            .id
            .ok_or_else(|| async_graphql::Error::new("must be logged in"))?;

        let notation = services(ctx)?
            .notations
            .create(CreateNotation {
                song_name: input.song_name,
                artist_name: input.artist_name,
                transcriber_id,
                tag_ids: input.tag_ids,
            })
            .await?;
        Ok(Notation::from(notation))
    }

    /// Update a notation. The transcriber (or an admin) only.
    async fn update_notation<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        id: Uuid,
        input: UpdateNotationInput,
    ) -> Result<Notation> {
        use stringsync_core::models::UserRole;

        let session = session_user(ctx);
        ensure_auth(&session, AuthRequirement::LoggedInAsTeacher)?;
        let services = services(ctx)?;

        let mut notation = services
            .notations
            .find(id)
            .await?
            .ok_or_else(|| async_graphql::Error::new("notation not found"))?;

        if session.role < UserRole::Admin && session.id != Some(notation.transcriber_id) {
            return Err(async_graphql::Error::new(
                "must be the notation's transcriber",
            ));
        }

        if let Some(song_name) = input.song_name {
            notation.song_name = song_name;
        }
        if let Some(artist_name) = input.artist_name {
            notation.artist_name = artist_name;
        }
        if let Some(dead_time_ms) = input.dead_time_ms {
            notation.dead_time_ms = dead_time_ms;
        }
        if let Some(duration_ms) = input.duration_ms {
            notation.duration_ms = duration_ms;
        }
        if let Some(featured) = input.featured {
            notation.featured = featured;
        }
        if let Some(thumbnail_url) = input.thumbnail_url {
            notation.thumbnail_url = Some(thumbnail_url);
        }
        if let Some(video_url) = input.video_url {
            notation.video_url = Some(video_url);
        }

        let updated = services.notations.update(&notation).await?;
        Ok(Notation::from(updated))
    }

    /// Change a user's role. Admin only.
    async fn update_user_role<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        id: Uuid,
        role: UserRole,
    ) -> Result<User> {
        ensure_auth(&session_user(ctx), AuthRequirement::LoggedInAsAdmin)?;

        let user = services(ctx)?.users.update_role(id, role.into()).await?;
        Ok(User::from(user))
    }
}

// -----------------------------------------------------------------------------
// Input Types
// -----------------------------------------------------------------------------

#[derive(async_graphql::InputObject)]
pub struct SignupInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(async_graphql::InputObject)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

#[derive(async_graphql::InputObject)]
pub struct ConfirmEmailInput {
    pub confirmation_token: Uuid,
}

#[derive(async_graphql::InputObject)]
pub struct SendResetPasswordEmailInput {
    pub email: String,
}

#[derive(async_graphql::InputObject)]
pub struct ResetPasswordInput {
    pub reset_password_token: Uuid,
    pub password: String,
}

#[derive(async_graphql::InputObject)]
pub struct CreateNotationInput {
    pub song_name: String,
    pub artist_name: String,
    #[graphql(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(async_graphql::InputObject, Default)]
pub struct UpdateNotationInput {
    pub song_name: Option<String>,
    pub artist_name: Option<String>,
    pub dead_time_ms: Option<i64>,
    pub duration_ms: Option<i64>,
    pub featured: Option<bool>,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
}

// -----------------------------------------------------------------------------
// GraphQL Types
// -----------------------------------------------------------------------------

/// User role.
#[derive(async_graphql::Enum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UserRole {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl From<stringsync_core::models::UserRole> for UserRole {
    fn from(role: stringsync_core::models::UserRole) -> Self {
        match role {
            stringsync_core::models::UserRole::Student => UserRole::Student,
            stringsync_core::models::UserRole::Teacher => UserRole::Teacher,
            stringsync_core::models::UserRole::Admin => UserRole::Admin,
        }
    }
}

impl From<UserRole> for stringsync_core::models::UserRole {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Student => stringsync_core::models::UserRole::Student,
            UserRole::Teacher => stringsync_core::models::UserRole::Teacher,
            UserRole::Admin => stringsync_core::models::UserRole::Admin,
        }
    }
}

/// User type. Credentials and tokens never leave the server.
#[derive(async_graphql::SimpleObject)]
#[graphql(complex)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
}

#[async_graphql::ComplexObject]
impl User {
    /// Notations transcribed by this user.
    async fn notations<'ctx>(&self, ctx: &Context<'ctx>) -> Result<Vec<Notation>> {
        let notations = services(ctx)?
            .notations
            .find_all_by_transcriber_id(self.id)
            .await?;
        Ok(notations.into_iter().map(Notation::from).collect())
    }
}

impl From<stringsync_core::models::User> for User {
    fn from(u: stringsync_core::models::User) -> Self {
        Self {
            id: u.id,
            created_at: u.created_at,
            updated_at: u.updated_at,
            username: u.username,
            email: u.email,
            role: u.role.into(),
            confirmed_at: u.confirmed_at,
            avatar_url: u.avatar_url,
        }
    }
}

/// Notation type.
#[derive(async_graphql::SimpleObject)]
#[graphql(complex)]
pub struct Notation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub song_name: String,
    pub artist_name: String,
    pub dead_time_ms: i64,
    pub duration_ms: i64,
    pub featured: bool,
    pub transcriber_id: Uuid,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
}

#[async_graphql::ComplexObject]
impl Notation {
    /// Tags attached to this notation.
    async fn tags<'ctx>(&self, ctx: &Context<'ctx>) -> Result<Vec<Tag>> {
        let tags = services(ctx)?.tags.find_all_by_notation_id(self.id).await?;
        Ok(tags.into_iter().map(Tag::from).collect())
    }
}

impl From<stringsync_core::models::Notation> for Notation {
    fn from(n: stringsync_core::models::Notation) -> Self {
        Self {
            id: n.id,
            created_at: n.created_at,
            updated_at: n.updated_at,
            song_name: n.song_name,
            artist_name: n.artist_name,
            dead_time_ms: n.dead_time_ms,
            duration_ms: n.duration_ms,
            featured: n.featured,
            transcriber_id: n.transcriber_id,
            thumbnail_url: n.thumbnail_url,
            video_url: n.video_url,
        }
    }
}

/// Tag type.
#[derive(async_graphql::SimpleObject)]
#[graphql(complex)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

#[async_graphql::ComplexObject]
impl Tag {
    /// Notations carrying this tag.
    async fn notations<'ctx>(&self, ctx: &Context<'ctx>) -> Result<Vec<Notation>> {
        let notations = services(ctx)?.notations.find_all_by_tag_id(self.id).await?;
        Ok(notations.into_iter().map(Notation::from).collect())
    }
}

impl From<stringsync_core::models::Tag> for Tag {
    fn from(t: stringsync_core::models::Tag) -> Self {
        Self {
            id: t.id,
            name: t.name,
        }
    }
}

/// Result of a successful signup or login.
#[derive(async_graphql::SimpleObject)]
pub struct LoginPayload {
    /// Bearer token for the opened session.
    pub token: String,
    pub user: User,
}

// -----------------------------------------------------------------------------
// Connection Types (Relay-style pagination)
// -----------------------------------------------------------------------------

#[derive(async_graphql::SimpleObject)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// Generate Relay-style connection types (Edge + Connection) with From impl.
macro_rules! define_connection {
    ($node:ty, $core_model:ty, $edge:ident, $connection:ident) => {
        #[derive(async_graphql::SimpleObject)]
        pub struct $edge {
            pub node: $node,
            pub cursor: String,
        }

        #[derive(async_graphql::SimpleObject)]
        pub struct $connection {
            pub edges: Vec<$edge>,
            pub page_info: PageInfo,
        }

        impl From<stringsync_core::ports::Connection<$core_model>> for $connection {
            fn from(conn: stringsync_core::ports::Connection<$core_model>) -> Self {
                Self {
                    edges: conn
                        .edges
                        .into_iter()
                        .map(|e| $edge {
                            node: <$node>::from(e.node),
                            cursor: e.cursor,
                        })
                        .collect(),
                    page_info: PageInfo {
                        has_next_page: conn.page_info.has_next_page,
                        has_previous_page: conn.page_info.has_previous_page,
                        start_cursor: conn.page_info.start_cursor,
                        end_cursor: conn.page_info.end_cursor,
                    },
                }
            }
        }
    };
}

define_connection!(User, stringsync_core::models::User, UserEdge, UserConnection);
define_connection!(Notation, stringsync_core::models::Notation, NotationEdge, NotationConnection);

// -----------------------------------------------------------------------------
// Helpers & Validation
// -----------------------------------------------------------------------------

/// Validate a filter string parameter.
fn validate_filter_string(s: &Option<String>, field_name: &str) -> Result<()> {
    if let Some(value) = s {
        if value.len() > MAX_FILTER_STRING_LENGTH {
            return Err(async_graphql::Error::new(format!(
                "{} too long: maximum {} characters allowed",
                field_name, MAX_FILTER_STRING_LENGTH
            )));
        }
        if value.is_empty() {
            return Err(async_graphql::Error::new(format!(
                "{} cannot be empty",
                field_name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_graphql::Request;
    use stringsync_core::models::{SessionUser, UserRole as DomainRole};
    use stringsync_core::ports::{NoopMailer, NotationRepo, Repositories, TagRepo, UserRepo};
    use stringsync_core::services::{AuthConfig, NotificationConfig};
    use stringsync_core::testing::{build_new_notation, build_new_user, MemRepositories};

    fn test_schema() -> (StringsyncSchema, Arc<MemRepositories>) {
        let repos = Arc::new(MemRepositories::new());
        let repos_dyn: Arc<dyn Repositories> = repos.clone();

        let services = StringsyncServices {
            auth: Arc::new(AuthService::new(AuthConfig::default(), repos_dyn.clone())),
            users: Arc::new(UserService::new(repos_dyn.clone())),
            notations: Arc::new(NotationService::new(repos_dyn.clone())),
            tags: Arc::new(TagService::new(repos_dyn.clone())),
            notifications: Arc::new(NotificationService::new(
                NotificationConfig {
                    web_origin: "https://stringsync.test".into(),
                },
                Arc::new(NoopMailer),
            )),
        };

        (build_schema(services), repos)
    }

    fn admin_session() -> SessionUser {
        SessionUser {
            id: Some(Uuid::new_v4()),
            role: DomainRole::Admin,
            is_logged_in: true,
        }
    }

    fn request(query: &str, session: SessionUser) -> Request {
        Request::new(query.to_string())
            .data(session)
            .data(SessionToken(None))
    }

    async fn seed_users(repos: &MemRepositories, count: usize) {
        for _ in 0..count {
            repos.users().create(build_new_user()).await.unwrap();
        }
    }

    // -------------------------------------------------------------------------
    // Validation tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_filter_string_boundaries() {
        // Vide = erreur (évite les requêtes inutiles)
        assert!(validate_filter_string(&Some("".into()), "query").is_err());
        // Trop long = erreur (DoS prevention)
        assert!(validate_filter_string(&Some("x".repeat(200)), "query").is_err());
        // None = OK (optionnel)
        assert!(validate_filter_string(&None, "query").is_ok());
    }

    #[test]
    fn test_auth_requirement_role_ordering() {
        let admin = admin_session();
        assert!(ensure_auth(&admin, AuthRequirement::LoggedInAsTeacher).is_ok());
        assert!(ensure_auth(&admin, AuthRequirement::LoggedInAsAdmin).is_ok());

        let anon = SessionUser::anonymous();
        assert!(ensure_auth(&anon, AuthRequirement::LoggedOut).is_ok());
        assert!(ensure_auth(&anon, AuthRequirement::LoggedIn).is_err());
        assert!(ensure_auth(&anon, AuthRequirement::LoggedInAsTeacher).is_err());
    }

    // -------------------------------------------------------------------------
    // Execution tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn users_connection_serves_the_default_page() {
        let (schema, repos) = test_schema();
        seed_users(&repos, 21).await;

        let resp = schema
            .execute(request(
                r#"{ users { edges { cursor } pageInfo { hasNextPage hasPreviousPage startCursor endCursor } } }"#,
                admin_session(),
            ))
            .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);

        let data = resp.data.into_json().unwrap();
        let edges = data["users"]["edges"].as_array().unwrap();
        assert_eq!(edges.len(), 20);
        assert_eq!(edges[0]["cursor"], "1");
        assert_eq!(edges[19]["cursor"], "20");
        assert_eq!(data["users"]["pageInfo"]["hasNextPage"], true);
        assert_eq!(data["users"]["pageInfo"]["hasPreviousPage"], false);
        assert_eq!(data["users"]["pageInfo"]["startCursor"], "1");
        assert_eq!(data["users"]["pageInfo"]["endCursor"], "20");
    }

    #[tokio::test]
    async fn users_connection_pages_after_a_cursor() {
        let (schema, repos) = test_schema();
        seed_users(&repos, 21).await;

        let resp = schema
            .execute(request(
                r#"{ users(first: 2, after: "1") { edges { cursor } } }"#,
                admin_session(),
            ))
            .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);

        let data = resp.data.into_json().unwrap();
        let edges = data["users"]["edges"].as_array().unwrap();
        let cursors: Vec<&str> = edges.iter().map(|e| e["cursor"].as_str().unwrap()).collect();
        assert_eq!(cursors, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn users_connection_requires_admin() {
        let (schema, repos) = test_schema();
        seed_users(&repos, 3).await;

        let resp = schema
            .execute(request(
                r#"{ users { edges { cursor } } }"#,
                SessionUser::anonymous(),
            ))
            .await;
        assert!(!resp.errors.is_empty());
        assert!(resp.errors[0].message.contains("admin"));
    }

    #[tokio::test]
    async fn users_connection_rejects_bad_paging_args() {
        let (schema, repos) = test_schema();
        seed_users(&repos, 3).await;

        // first ≤ 0 est une erreur de configuration, jamais corrigée en douce
        let resp = schema
            .execute(request(
                r#"{ users(first: 0) { edges { cursor } } }"#,
                admin_session(),
            ))
            .await;
        assert!(!resp.errors.is_empty());
        assert!(resp.errors[0].message.contains("positive"));

        let resp = schema
            .execute(request(
                r#"{ users(first: 2, last: 2) { edges { cursor } } }"#,
                admin_session(),
            ))
            .await;
        assert!(!resp.errors.is_empty());
        assert!(resp.errors[0].message.contains("forward"));
    }

    #[tokio::test]
    async fn users_connection_tolerates_malformed_cursors() {
        let (schema, repos) = test_schema();
        seed_users(&repos, 3).await;

        let resp = schema
            .execute(request(
                r#"{ users(first: 2, after: "stale-garbage") { edges { cursor } } }"#,
                admin_session(),
            ))
            .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);

        let data = resp.data.into_json().unwrap();
        assert_eq!(data["users"]["edges"][0]["cursor"], "1");
    }

    #[tokio::test]
    async fn signup_then_login_roundtrip() {
        let (schema, _repos) = test_schema();

        let resp = schema
            .execute(request(
                r#"mutation {
                    signup(input: { username: "django_r", email: "django@hotclub.fr", password: "minor swing!" }) {
                        token
                        user { username role }
                    }
                }"#,
                SessionUser::anonymous(),
            ))
            .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);

        let data = resp.data.into_json().unwrap();
        assert_eq!(data["signup"]["user"]["username"], "django_r");
        assert_eq!(data["signup"]["user"]["role"], "STUDENT");
        assert!(Uuid::parse_str(data["signup"]["token"].as_str().unwrap()).is_ok());

        let resp = schema
            .execute(request(
                r#"mutation {
                    login(input: { usernameOrEmail: "django_r", password: "minor swing!" }) {
                        user { username }
                    }
                }"#,
                SessionUser::anonymous(),
            ))
            .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);

        let resp = schema
            .execute(request(
                r#"mutation {
                    login(input: { usernameOrEmail: "django_r", password: "wrong" }) {
                        user { username }
                    }
                }"#,
                SessionUser::anonymous(),
            ))
            .await;
        assert!(!resp.errors.is_empty());
    }

    #[tokio::test]
    async fn whoami_resolves_the_session_user() {
        let (schema, repos) = test_schema();
        let user = repos.users().create(build_new_user()).await.unwrap();

        let session = SessionUser {
            id: Some(user.id),
            role: user.role,
            is_logged_in: true,
        };
        let resp = schema
            .execute(request(r#"{ whoami { username } }"#, session))
            .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);

        let data = resp.data.into_json().unwrap();
        assert_eq!(data["whoami"]["username"], user.username.as_str());

        // Anonymous callers get null, not an error.
        let resp = schema
            .execute(request(r#"{ whoami { username } }"#, SessionUser::anonymous()))
            .await;
        assert!(resp.errors.is_empty());
        assert_eq!(resp.data.into_json().unwrap()["whoami"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn create_notation_requires_a_teacher() {
        let (schema, repos) = test_schema();
        let mut attrs = build_new_user();
        attrs.role = DomainRole::Teacher;
        let teacher = repos.users().create(attrs).await.unwrap();
        let jazz = repos.tags().create("jazz").await.unwrap();

        let mutation = format!(
            r#"mutation {{
                createNotation(input: {{ songName: "Nuages", artistName: "Django Reinhardt", tagIds: ["{}"] }}) {{
                    songName
                    tags {{ name }}
                }}
            }}"#,
            jazz.id
        );

        // A student is turned away.
        let student = SessionUser {
            id: Some(Uuid::new_v4()),
            role: DomainRole::Student,
            is_logged_in: true,
        };
        let resp = schema.execute(request(&mutation, student)).await;
        assert!(!resp.errors.is_empty());

        // The teacher gets through, tags attached.
        let session = SessionUser {
            id: Some(teacher.id),
            role: teacher.role,
            is_logged_in: true,
        };
        let resp = schema.execute(request(&mutation, session)).await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);

        let data = resp.data.into_json().unwrap();
        assert_eq!(data["createNotation"]["songName"], "Nuages");
        assert_eq!(data["createNotation"]["tags"][0]["name"], "jazz");
    }

    #[tokio::test]
    async fn notations_filter_by_query_string() {
        let (schema, repos) = test_schema();
        let user = repos.users().create(build_new_user()).await.unwrap();

        let mut attrs = build_new_notation(user.id);
        attrs.song_name = "Little Wing".into();
        repos.notations().create(attrs).await.unwrap();
        repos
            .notations()
            .create(build_new_notation(user.id))
            .await
            .unwrap();

        let resp = schema
            .execute(request(
                r#"{ notations(query: "wing") { edges { node { songName } } pageInfo { hasNextPage } } }"#,
                SessionUser::anonymous(),
            ))
            .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);

        let data = resp.data.into_json().unwrap();
        let edges = data["notations"]["edges"].as_array().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0]["node"]["songName"], "Little Wing");
        assert_eq!(data["notations"]["pageInfo"]["hasNextPage"], false);
    }

    #[tokio::test]
    async fn update_notation_is_fenced_to_the_transcriber() {
        let (schema, repos) = test_schema();
        let mut attrs = build_new_user();
        attrs.role = DomainRole::Teacher;
        let owner = repos.users().create(attrs).await.unwrap();
        let mut attrs = build_new_user();
        attrs.role = DomainRole::Teacher;
        let other = repos.users().create(attrs).await.unwrap();

        let notation = repos
            .notations()
            .create(build_new_notation(owner.id))
            .await
            .unwrap();

        let mutation = format!(
            r#"mutation {{ updateNotation(id: "{}", input: {{ featured: true }}) {{ featured }} }}"#,
            notation.id
        );

        let intruder = SessionUser {
            id: Some(other.id),
            role: other.role,
            is_logged_in: true,
        };
        let resp = schema.execute(request(&mutation, intruder)).await;
        assert!(!resp.errors.is_empty());

        let session = SessionUser {
            id: Some(owner.id),
            role: owner.role,
            is_logged_in: true,
        };
        let resp = schema.execute(request(&mutation, session)).await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);
        assert_eq!(resp.data.into_json().unwrap()["updateNotation"]["featured"], true);
    }
}
