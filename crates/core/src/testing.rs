//! In-memory repositories and entity factories.
//!
//! [`MemRepositories`] implements the full [`Repositories`] contract over
//! process-local state. It backs service and schema tests, and doubles as
//! an executable model of the storage semantics: paging goes through the
//! same [`Pager`] as the PostgreSQL adapter.

use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use crate::error::{MailResult, StorageError, StorageResult};
use crate::models::{Notation, Tag, Tagging, User, UserSession};
use crate::ports::{
    Connection, ConnectionArgs, Email, Mailer, NewNotation, NewUser, NotationPageFilter,
    NotationRepo, PageRows, Pager, PagingCtx, PagingEntity, PagingType, Repositories, SessionRepo,
    TagRepo, UserRepo, NOTATION_PAGE_LIMIT, USER_PAGE_LIMIT,
};

// =============================================================================
// Shared State
// =============================================================================

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    notations: Vec<Notation>,
    tags: Vec<Tag>,
    taggings: Vec<Tagging>,
    sessions: Vec<UserSession>,
    next_user_cursor: i64,
    next_notation_cursor: i64,
}

type Shared = Arc<RwLock<State>>;

/// Emulate the store's page query: report bounds over the filtered set,
/// then apply the cursor predicate, order by direction, and limit.
fn page_rows<T: PagingEntity + Clone>(all: Vec<T>, ctx: PagingCtx) -> PageRows<T> {
    let min = all.iter().map(|row| row.cursor()).min().unwrap_or(0);
    let max = all.iter().map(|row| row.cursor()).max().unwrap_or(0);

    let mut rows: Vec<T> = all
        .into_iter()
        .filter(|row| match ctx.paging_type {
            PagingType::Forward => row.cursor() > ctx.cursor,
            PagingType::Backward => row.cursor() < ctx.cursor,
        })
        .collect();
    rows.sort_by_key(|row| row.cursor());
    if ctx.paging_type == PagingType::Backward {
        rows.reverse();
    }
    rows.truncate(ctx.limit as usize);

    PageRows { rows, min, max }
}

// =============================================================================
// In-memory Repositories
// =============================================================================

/// In-memory implementation of [`Repositories`].
pub struct MemRepositories {
    users: MemUserRepo,
    notations: MemNotationRepo,
    tags: MemTagRepo,
    sessions: MemSessionRepo,
    state: Shared,
}

impl MemRepositories {
    pub fn new() -> Self {
        let state: Shared = Arc::default();
        Self {
            users: MemUserRepo {
                state: state.clone(),
                pager: Pager::new(USER_PAGE_LIMIT),
            },
            notations: MemNotationRepo {
                state: state.clone(),
                pager: Pager::new(NOTATION_PAGE_LIMIT),
            },
            tags: MemTagRepo {
                state: state.clone(),
            },
            sessions: MemSessionRepo {
                state: state.clone(),
            },
            state,
        }
    }
}

impl Default for MemRepositories {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repositories for MemRepositories {
    fn users(&self) -> &dyn UserRepo {
        &self.users
    }

    fn notations(&self) -> &dyn NotationRepo {
        &self.notations
    }

    fn tags(&self) -> &dyn TagRepo {
        &self.tags
    }

    fn sessions(&self) -> &dyn SessionRepo {
        &self.sessions
    }

    async fn create_notation_with_tags(
        &self,
        attrs: NewNotation,
        tag_ids: &[Uuid],
    ) -> StorageResult<Notation> {
        let mut state = self.state.write().unwrap();

        for tag_id in tag_ids {
            if !state.tags.iter().any(|t| t.id == *tag_id) {
                return Err(StorageError::ConstraintViolation(format!(
                    "tag {tag_id} does not exist"
                )));
            }
        }

        let notation = insert_notation(&mut state, attrs);
        for tag_id in tag_ids {
            state.taggings.push(Tagging {
                id: Uuid::new_v4(),
                notation_id: notation.id,
                tag_id: *tag_id,
            });
        }

        Ok(notation)
    }
}

fn insert_notation(state: &mut State, attrs: NewNotation) -> Notation {
    state.next_notation_cursor += 1;
    let now = Utc::now();
    let notation = Notation {
        id: Uuid::new_v4(),
        cursor: state.next_notation_cursor,
        created_at: now,
        updated_at: now,
        song_name: attrs.song_name,
        artist_name: attrs.artist_name,
        dead_time_ms: attrs.dead_time_ms,
        duration_ms: attrs.duration_ms,
        featured: attrs.featured,
        transcriber_id: attrs.transcriber_id,
        thumbnail_url: attrs.thumbnail_url,
        video_url: attrs.video_url,
    };
    state.notations.push(notation.clone());
    notation
}

// -----------------------------------------------------------------------------
// Users
// -----------------------------------------------------------------------------

struct MemUserRepo {
    state: Shared,
    pager: Pager,
}

#[async_trait]
impl UserRepo for MemUserRepo {
    async fn find(&self, id: Uuid) -> StorageResult<Option<User>> {
        let state = self.state.read().unwrap();
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> StorageResult<Option<User>> {
        let state = self.state.read().unwrap();
        Ok(state
            .users
            .iter()
            .find(|u| u.username == username_or_email || u.email == username_or_email)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let state = self.state.read().unwrap();
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_reset_password_token(&self, token: Uuid) -> StorageResult<Option<User>> {
        let state = self.state.read().unwrap();
        Ok(state
            .users
            .iter()
            .find(|u| u.reset_password_token == Some(token))
            .cloned())
    }

    async fn find_all(&self) -> StorageResult<Vec<User>> {
        let state = self.state.read().unwrap();
        let mut users = state.users.clone();
        users.sort_by_key(|u| std::cmp::Reverse(u.cursor));
        Ok(users)
    }

    async fn count(&self) -> StorageResult<i64> {
        let state = self.state.read().unwrap();
        Ok(state.users.len() as i64)
    }

    async fn create(&self, attrs: NewUser) -> StorageResult<User> {
        let mut state = self.state.write().unwrap();

        if state
            .users
            .iter()
            .any(|u| u.username == attrs.username || u.email == attrs.email)
        {
            return Err(StorageError::ConstraintViolation(
                "username or email already taken".into(),
            ));
        }

        state.next_user_cursor += 1;
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            cursor: state.next_user_cursor,
            created_at: now,
            updated_at: now,
            username: attrs.username,
            email: attrs.email,
            encrypted_password: attrs.encrypted_password,
            role: attrs.role,
            confirmation_token: attrs.confirmation_token,
            confirmed_at: None,
            reset_password_token: None,
            reset_password_token_sent_at: None,
            avatar_url: attrs.avatar_url,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> StorageResult<User> {
        let mut state = self.state.write().unwrap();
        let slot = state
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| StorageError::NotFound(format!("user {}", user.id)))?;

        let mut updated = user.clone();
        updated.cursor = slot.cursor;
        updated.created_at = slot.created_at;
        updated.updated_at = Utc::now();
        *slot = updated.clone();
        Ok(updated)
    }

    async fn find_page(&self, args: &ConnectionArgs) -> StorageResult<Connection<User>> {
        self.pager
            .connect(args, |ctx| {
                let page = {
                    let state = self.state.read().unwrap();
                    page_rows(state.users.clone(), ctx)
                };
                async move { Ok(page) }
            })
            .await
    }
}

// -----------------------------------------------------------------------------
// Notations
// -----------------------------------------------------------------------------

struct MemNotationRepo {
    state: Shared,
    pager: Pager,
}

fn matches_filter(state: &State, notation: &Notation, filter: &NotationPageFilter) -> bool {
    if let Some(query) = &filter.query {
        let needle = query.to_lowercase();
        if !notation.song_name.to_lowercase().contains(&needle)
            && !notation.artist_name.to_lowercase().contains(&needle)
        {
            return false;
        }
    }
    if let Some(tag_ids) = &filter.tag_ids {
        let tagged = state
            .taggings
            .iter()
            .any(|t| t.notation_id == notation.id && tag_ids.contains(&t.tag_id));
        if !tagged {
            return false;
        }
    }
    true
}

#[async_trait]
impl NotationRepo for MemNotationRepo {
    async fn find(&self, id: Uuid) -> StorageResult<Option<Notation>> {
        let state = self.state.read().unwrap();
        Ok(state.notations.iter().find(|n| n.id == id).cloned())
    }

    async fn find_all_by_transcriber_id(
        &self,
        transcriber_id: Uuid,
    ) -> StorageResult<Vec<Notation>> {
        let state = self.state.read().unwrap();
        let mut notations: Vec<Notation> = state
            .notations
            .iter()
            .filter(|n| n.transcriber_id == transcriber_id)
            .cloned()
            .collect();
        notations.sort_by_key(|n| std::cmp::Reverse(n.cursor));
        Ok(notations)
    }

    async fn find_all_by_tag_id(&self, tag_id: Uuid) -> StorageResult<Vec<Notation>> {
        let state = self.state.read().unwrap();
        let mut notations: Vec<Notation> = state
            .notations
            .iter()
            .filter(|n| {
                state
                    .taggings
                    .iter()
                    .any(|t| t.notation_id == n.id && t.tag_id == tag_id)
            })
            .cloned()
            .collect();
        notations.sort_by_key(|n| std::cmp::Reverse(n.cursor));
        Ok(notations)
    }

    async fn count(&self) -> StorageResult<i64> {
        let state = self.state.read().unwrap();
        Ok(state.notations.len() as i64)
    }

    async fn create(&self, attrs: NewNotation) -> StorageResult<Notation> {
        let mut state = self.state.write().unwrap();
        Ok(insert_notation(&mut state, attrs))
    }

    async fn update(&self, notation: &Notation) -> StorageResult<Notation> {
        let mut state = self.state.write().unwrap();
        let slot = state
            .notations
            .iter_mut()
            .find(|n| n.id == notation.id)
            .ok_or_else(|| StorageError::NotFound(format!("notation {}", notation.id)))?;

        let mut updated = notation.clone();
        updated.cursor = slot.cursor;
        updated.created_at = slot.created_at;
        updated.updated_at = Utc::now();
        *slot = updated.clone();
        Ok(updated)
    }

    async fn find_page(
        &self,
        args: &ConnectionArgs,
        filter: &NotationPageFilter,
    ) -> StorageResult<Connection<Notation>> {
        self.pager
            .connect(args, |ctx| {
                let page = {
                    let state = self.state.read().unwrap();
                    let filtered: Vec<Notation> = state
                        .notations
                        .iter()
                        .filter(|n| matches_filter(&state, n, filter))
                        .cloned()
                        .collect();
                    page_rows(filtered, ctx)
                };
                async move { Ok(page) }
            })
            .await
    }
}

// -----------------------------------------------------------------------------
// Tags
// -----------------------------------------------------------------------------

struct MemTagRepo {
    state: Shared,
}

#[async_trait]
impl TagRepo for MemTagRepo {
    async fn find(&self, id: Uuid) -> StorageResult<Option<Tag>> {
        let state = self.state.read().unwrap();
        Ok(state.tags.iter().find(|t| t.id == id).cloned())
    }

    async fn find_all(&self) -> StorageResult<Vec<Tag>> {
        let state = self.state.read().unwrap();
        let mut tags = state.tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn find_all_by_notation_id(&self, notation_id: Uuid) -> StorageResult<Vec<Tag>> {
        let state = self.state.read().unwrap();
        let mut tags: Vec<Tag> = state
            .tags
            .iter()
            .filter(|tag| {
                state
                    .taggings
                    .iter()
                    .any(|t| t.tag_id == tag.id && t.notation_id == notation_id)
            })
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn create(&self, name: &str) -> StorageResult<Tag> {
        let mut state = self.state.write().unwrap();
        if state.tags.iter().any(|t| t.name == name) {
            return Err(StorageError::ConstraintViolation(format!(
                "tag '{name}' already exists"
            )));
        }
        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        state.tags.push(tag.clone());
        Ok(tag)
    }
}

// -----------------------------------------------------------------------------
// Sessions
// -----------------------------------------------------------------------------

struct MemSessionRepo {
    state: Shared,
}

#[async_trait]
impl SessionRepo for MemSessionRepo {
    async fn create(
        &self,
        user_id: Uuid,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<UserSession> {
        let mut state = self.state.write().unwrap();
        let session = UserSession {
            token: Uuid::new_v4(),
            user_id,
            issued_at,
            expires_at,
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_active(
        &self,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<UserSession>> {
        let state = self.state.read().unwrap();
        Ok(state
            .sessions
            .iter()
            .find(|s| s.token == token && s.is_active(now))
            .cloned())
    }

    async fn delete(&self, token: Uuid) -> StorageResult<bool> {
        let mut state = self.state.write().unwrap();
        let before = state.sessions.len();
        state.sessions.retain(|s| s.token != token);
        Ok(state.sessions.len() < before)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> StorageResult<u64> {
        let mut state = self.state.write().unwrap();
        let before = state.sessions.len();
        state.sessions.retain(|s| s.user_id != user_id);
        Ok((before - state.sessions.len()) as u64)
    }
}

// =============================================================================
// Factories
// =============================================================================

/// Random alphanumeric string of length `n`.
pub fn rand_str(n: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

/// Build creation attributes for a random student user.
pub fn build_new_user() -> NewUser {
    NewUser {
        username: format!("user_{}", rand_str(8)),
        email: format!("{}@{}.com", rand_str(8), rand_str(8)),
        encrypted_password: rand_str(32),
        role: crate::models::UserRole::Student,
        confirmation_token: Some(Uuid::new_v4()),
        avatar_url: None,
    }
}

/// Build creation attributes for a random notation.
pub fn build_new_notation(transcriber_id: Uuid) -> NewNotation {
    NewNotation {
        song_name: format!("song {}", rand_str(8)),
        artist_name: format!("artist {}", rand_str(8)),
        transcriber_id,
        dead_time_ms: 0,
        duration_ms: 60_000,
        featured: false,
        thumbnail_url: None,
        video_url: None,
    }
}

/// Mailer that records every message it is asked to deliver.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every email sent so far.
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> MailResult<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_notations(repos: &MemRepositories, count: usize) -> (Uuid, Vec<Notation>) {
        let user = repos.users().create(build_new_user()).await.unwrap();
        let mut notations = Vec::with_capacity(count);
        for _ in 0..count {
            notations.push(
                repos
                    .notations()
                    .create(build_new_notation(user.id))
                    .await
                    .unwrap(),
            );
        }
        (user.id, notations)
    }

    fn cursors(conn: &Connection<Notation>) -> Vec<i64> {
        conn.edges.iter().map(|e| e.node.cursor).collect()
    }

    #[tokio::test]
    async fn returns_the_default_page_limit_by_default() {
        let repos = MemRepositories::new();
        let (_, notations) = seed_notations(&repos, 11).await;

        let conn = repos
            .notations()
            .find_page(&ConnectionArgs::default(), &NotationPageFilter::default())
            .await
            .unwrap();

        assert_eq!(conn.edges.len(), NOTATION_PAGE_LIMIT as usize);
        assert_eq!(
            cursors(&conn),
            notations[..10].iter().map(|n| n.cursor).collect::<Vec<_>>()
        );
        assert!(conn.page_info.has_next_page);
        assert!(!conn.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn pages_forward_after_the_previous_end_cursor() {
        let repos = MemRepositories::new();
        seed_notations(&repos, 11).await;

        let first = repos
            .notations()
            .find_page(
                &ConnectionArgs {
                    first: Some(1),
                    ..Default::default()
                },
                &NotationPageFilter::default(),
            )
            .await
            .unwrap();

        let next = repos
            .notations()
            .find_page(
                &ConnectionArgs {
                    first: Some(2),
                    after: first.page_info.end_cursor.clone(),
                    ..Default::default()
                },
                &NotationPageFilter::default(),
            )
            .await
            .unwrap();

        assert_eq!(cursors(&next), vec![2, 3]);
    }

    #[tokio::test]
    async fn returns_the_last_records_in_ascending_order() {
        let repos = MemRepositories::new();
        seed_notations(&repos, 11).await;

        let conn = repos
            .notations()
            .find_page(
                &ConnectionArgs {
                    last: Some(5),
                    ..Default::default()
                },
                &NotationPageFilter::default(),
            )
            .await
            .unwrap();

        assert_eq!(cursors(&conn), vec![7, 8, 9, 10, 11]);
        assert!(!conn.page_info.has_next_page);
    }

    #[tokio::test]
    async fn returns_all_records_when_limit_exceeds_remaining() {
        let repos = MemRepositories::new();
        seed_notations(&repos, 4).await;

        let conn = repos
            .notations()
            .find_page(
                &ConnectionArgs {
                    first: Some(50),
                    ..Default::default()
                },
                &NotationPageFilter::default(),
            )
            .await
            .unwrap();

        assert_eq!(conn.edges.len(), 4);
        assert_eq!(repos.notations().count().await.unwrap(), 4);
        assert!(!conn.page_info.has_next_page);
    }

    #[tokio::test]
    async fn filters_by_song_or_artist_substring() {
        let repos = MemRepositories::new();
        let user = repos.users().create(build_new_user()).await.unwrap();

        let mut attrs = build_new_notation(user.id);
        attrs.song_name = "Little Wing".into();
        repos.notations().create(attrs).await.unwrap();

        let mut attrs = build_new_notation(user.id);
        attrs.artist_name = "Wingspan Quartet".into();
        repos.notations().create(attrs).await.unwrap();

        repos
            .notations()
            .create(build_new_notation(user.id))
            .await
            .unwrap();

        let filter = NotationPageFilter {
            query: Some("wing".into()),
            ..Default::default()
        };
        let conn = repos
            .notations()
            .find_page(&ConnectionArgs::default(), &filter)
            .await
            .unwrap();

        assert_eq!(conn.edges.len(), 2);
        // Bounds are bounds of the filtered set.
        assert!(!conn.page_info.has_next_page);
        assert!(!conn.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn filters_by_tag() {
        let repos = MemRepositories::new();
        let user = repos.users().create(build_new_user()).await.unwrap();
        let jazz = repos.tags().create("jazz").await.unwrap();

        let tagged = repos
            .create_notation_with_tags(build_new_notation(user.id), &[jazz.id])
            .await
            .unwrap();
        repos
            .notations()
            .create(build_new_notation(user.id))
            .await
            .unwrap();

        let filter = NotationPageFilter {
            tag_ids: Some(vec![jazz.id]),
            ..Default::default()
        };
        let conn = repos
            .notations()
            .find_page(&ConnectionArgs::default(), &filter)
            .await
            .unwrap();

        assert_eq!(conn.edges.len(), 1);
        assert_eq!(conn.edges[0].node.id, tagged.id);

        let tags = repos.tags().find_all_by_notation_id(tagged.id).await.unwrap();
        assert_eq!(tags, vec![jazz]);
    }

    #[tokio::test]
    async fn find_all_users_returns_newest_first() {
        let repos = MemRepositories::new();
        for _ in 0..3 {
            repos.users().create(build_new_user()).await.unwrap();
        }

        let users = repos.users().find_all().await.unwrap();
        assert_eq!(repos.users().count().await.unwrap(), 3);
        assert_eq!(
            users.iter().map(|u| u.cursor).collect::<Vec<_>>(),
            vec![3, 2, 1]
        );
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let repos = MemRepositories::new();
        let attrs = build_new_user();
        repos.users().create(attrs.clone()).await.unwrap();

        let result = repos.users().create(attrs).await;
        assert!(matches!(
            result,
            Err(StorageError::ConstraintViolation(_))
        ));
    }
}
