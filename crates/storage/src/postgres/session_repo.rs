//! Session repository implementation for PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use stringsync_core::error::StorageResult;
use stringsync_core::models::UserSession;
use stringsync_core::ports::SessionRepo;

use super::database::Database;
use super::helpers::{insert_err, query_err};

/// PostgreSQL implementation of SessionRepo.
pub struct PgSessionRepo {
    pool: PgPool,
}

impl PgSessionRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl SessionRepo for PgSessionRepo {
    async fn create(
        &self,
        user_id: Uuid,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<UserSession> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (token, user_id, issued_at, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING token, user_id, issued_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(issued_at)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(insert_err)?;

        Ok(row.into_session())
    }

    async fn find_active(
        &self,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<UserSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT token, user_id, issued_at, expires_at
            FROM sessions
            WHERE token = $1 AND expires_at > $2
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(row.map(SessionRow::into_session))
    }

    async fn delete(&self, token: Uuid) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected())
    }
}

/// Database row representation for UserSession.
#[derive(sqlx::FromRow)]
struct SessionRow {
    token: Uuid,
    user_id: Uuid,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> UserSession {
        UserSession {
            token: self.token,
            user_id: self.user_id,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        }
    }
}
