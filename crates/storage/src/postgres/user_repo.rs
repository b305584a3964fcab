//! User repository implementation for PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use stringsync_core::error::{StorageError, StorageResult};
use stringsync_core::models::User;
use stringsync_core::ports::{
    Connection, ConnectionArgs, NewUser, PageRows, Pager, PagingType, UserRepo, USER_PAGE_LIMIT,
};

use super::database::Database;
use super::helpers::{insert_err, query_err, role_from_str};

/// PostgreSQL implementation of UserRepo.
pub struct PgUserRepo {
    pool: PgPool,
    pager: Pager,
}

impl PgUserRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            pager: Pager::new(USER_PAGE_LIMIT),
        }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find(&self, id: Uuid) -> StorageResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, cursor, created_at, updated_at, username, email,
                   encrypted_password, role, confirmation_token, confirmed_at,
                   reset_password_token, reset_password_token_sent_at, avatar_url
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> StorageResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, cursor, created_at, updated_at, username, email,
                   encrypted_password, role, confirmation_token, confirmed_at,
                   reset_password_token, reset_password_token_sent_at, avatar_url
            FROM users
            WHERE username = $1 OR email = $1
            "#,
        )
        .bind(username_or_email)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, cursor, created_at, updated_at, username, email,
                   encrypted_password, role, confirmation_token, confirmed_at,
                   reset_password_token, reset_password_token_sent_at, avatar_url
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_reset_password_token(&self, token: Uuid) -> StorageResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, cursor, created_at, updated_at, username, email,
                   encrypted_password, role, confirmation_token, confirmed_at,
                   reset_password_token, reset_password_token_sent_at, avatar_url
            FROM users
            WHERE reset_password_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_all(&self) -> StorageResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, cursor, created_at, updated_at, username, email,
                   encrypted_password, role, confirmation_token, confirmed_at,
                   reset_password_token, reset_password_token_sent_at, avatar_url
            FROM users
            ORDER BY cursor DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn count(&self) -> StorageResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(query_err)?;

        Ok(row.0)
    }

    async fn create(&self, attrs: NewUser) -> StorageResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (
                id, created_at, updated_at, username, email,
                encrypted_password, role, confirmation_token, avatar_url
            )
            VALUES ($1, $2, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, cursor, created_at, updated_at, username, email,
                      encrypted_password, role, confirmation_token, confirmed_at,
                      reset_password_token, reset_password_token_sent_at, avatar_url
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .bind(&attrs.username)
        .bind(&attrs.email)
        .bind(&attrs.encrypted_password)
        .bind(attrs.role.as_str())
        .bind(attrs.confirmation_token)
        .bind(&attrs.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(insert_err)?;

        row.into_user()
    }

    async fn update(&self, user: &User) -> StorageResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET username = $2,
                email = $3,
                encrypted_password = $4,
                role = $5,
                confirmation_token = $6,
                confirmed_at = $7,
                reset_password_token = $8,
                reset_password_token_sent_at = $9,
                avatar_url = $10,
                updated_at = $11
            WHERE id = $1
            RETURNING id, cursor, created_at, updated_at, username, email,
                      encrypted_password, role, confirmation_token, confirmed_at,
                      reset_password_token, reset_password_token_sent_at, avatar_url
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.encrypted_password)
        .bind(user.role.as_str())
        .bind(user.confirmation_token)
        .bind(user.confirmed_at)
        .bind(user.reset_password_token)
        .bind(user.reset_password_token_sent_at)
        .bind(&user.avatar_url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        row.ok_or_else(|| StorageError::NotFound(format!("user {}", user.id)))?
            .into_user()
    }

    async fn find_page(&self, args: &ConnectionArgs) -> StorageResult<Connection<User>> {
        let pool = self.pool.clone();
        self.pager
            .connect(args, move |ctx| async move {
                let (cmp, order) = match ctx.paging_type {
                    PagingType::Forward => (">", "ASC"),
                    PagingType::Backward => ("<", "DESC"),
                };

                // Operators and ordering come from the enum above; the
                // cursor value is bound. LIMIT is the resolver's clamped
                // integer, never raw client input.
                let sql = format!(
                    r#"
                    SELECT id, cursor, created_at, updated_at, username, email,
                           encrypted_password, role, confirmation_token, confirmed_at,
                           reset_password_token, reset_password_token_sent_at, avatar_url
                    FROM users
                    WHERE cursor {cmp} $1
                    ORDER BY cursor {order}
                    LIMIT {limit}
                    "#,
                    limit = ctx.limit,
                );

                let rows_fut = sqlx::query_as::<_, UserRow>(&sql)
                    .bind(ctx.cursor)
                    .fetch_all(&pool);
                let bounds_fut = sqlx::query_as::<_, (i64, i64)>(
                    "SELECT COALESCE(MIN(cursor), 0), COALESCE(MAX(cursor), 0) FROM users",
                )
                .fetch_one(&pool);

                // Row fetch and bounds run concurrently (independent reads).
                let (rows, (min, max)) =
                    tokio::try_join!(rows_fut, bounds_fut).map_err(query_err)?;

                let users = rows
                    .into_iter()
                    .map(UserRow::into_user)
                    .collect::<StorageResult<Vec<_>>>()?;

                Ok(PageRows {
                    rows: users,
                    min,
                    max,
                })
            })
            .await
    }
}

/// Database row representation for User.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    cursor: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    username: String,
    email: String,
    encrypted_password: String,
    role: String,
    confirmation_token: Option<Uuid>,
    confirmed_at: Option<chrono::DateTime<chrono::Utc>>,
    reset_password_token: Option<Uuid>,
    reset_password_token_sent_at: Option<chrono::DateTime<chrono::Utc>>,
    avatar_url: Option<String>,
}

impl UserRow {
    fn into_user(self) -> StorageResult<User> {
        Ok(User {
            id: self.id,
            cursor: self.cursor,
            created_at: self.created_at,
            updated_at: self.updated_at,
            username: self.username,
            email: self.email,
            encrypted_password: self.encrypted_password,
            role: role_from_str(&self.role)?,
            confirmation_token: self.confirmation_token,
            confirmed_at: self.confirmed_at,
            reset_password_token: self.reset_password_token,
            reset_password_token_sent_at: self.reset_password_token_sent_at,
            avatar_url: self.avatar_url,
        })
    }
}
