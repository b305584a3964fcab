//! Tag repository implementation for PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use stringsync_core::error::StorageResult;
use stringsync_core::models::Tag;
use stringsync_core::ports::TagRepo;

use super::database::Database;
use super::helpers::{insert_err, query_err};

/// PostgreSQL implementation of TagRepo.
pub struct PgTagRepo {
    pool: PgPool,
}

impl PgTagRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl TagRepo for PgTagRepo {
    async fn find(&self, id: Uuid) -> StorageResult<Option<Tag>> {
        let row = sqlx::query_as::<_, TagRow>("SELECT id, name FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        Ok(row.map(TagRow::into_tag))
    }

    async fn find_all(&self) -> StorageResult<Vec<Tag>> {
        let rows = sqlx::query_as::<_, TagRow>("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;

        Ok(rows.into_iter().map(TagRow::into_tag).collect())
    }

    async fn find_all_by_notation_id(&self, notation_id: Uuid) -> StorageResult<Vec<Tag>> {
        let rows = sqlx::query_as::<_, TagRow>(
            r#"
            SELECT tags.id, tags.name
            FROM tags
            JOIN taggings t ON t.tag_id = tags.id
            WHERE t.notation_id = $1
            ORDER BY tags.name
            "#,
        )
        .bind(notation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(rows.into_iter().map(TagRow::into_tag).collect())
    }

    async fn create(&self, name: &str) -> StorageResult<Tag> {
        let row = sqlx::query_as::<_, TagRow>(
            "INSERT INTO tags (id, name) VALUES ($1, $2) RETURNING id, name",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(insert_err)?;

        Ok(row.into_tag())
    }
}

/// Database row representation for Tag.
#[derive(sqlx::FromRow)]
struct TagRow {
    id: Uuid,
    name: String,
}

impl TagRow {
    fn into_tag(self) -> Tag {
        Tag {
            id: self.id,
            name: self.name,
        }
    }
}
