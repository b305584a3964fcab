//! Notation repository implementation for PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use stringsync_core::error::{StorageError, StorageResult};
use stringsync_core::models::Notation;
use stringsync_core::ports::{
    Connection, ConnectionArgs, NewNotation, NotationPageFilter, NotationRepo, PageRows, Pager,
    PagingType, NOTATION_PAGE_LIMIT,
};

use super::database::Database;
use super::helpers::{insert_err, query_err};

/// PostgreSQL implementation of NotationRepo.
pub struct PgNotationRepo {
    pool: PgPool,
    pager: Pager,
}

impl PgNotationRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            pager: Pager::new(NOTATION_PAGE_LIMIT),
        }
    }
}

#[async_trait]
impl NotationRepo for PgNotationRepo {
    async fn find(&self, id: Uuid) -> StorageResult<Option<Notation>> {
        let row = sqlx::query_as::<_, NotationRow>(
            r#"
            SELECT id, cursor, created_at, updated_at, song_name, artist_name,
                   dead_time_ms, duration_ms, featured, transcriber_id,
                   thumbnail_url, video_url
            FROM notations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(row.map(NotationRow::into_notation))
    }

    async fn find_all_by_transcriber_id(
        &self,
        transcriber_id: Uuid,
    ) -> StorageResult<Vec<Notation>> {
        let rows = sqlx::query_as::<_, NotationRow>(
            r#"
            SELECT id, cursor, created_at, updated_at, song_name, artist_name,
                   dead_time_ms, duration_ms, featured, transcriber_id,
                   thumbnail_url, video_url
            FROM notations
            WHERE transcriber_id = $1
            ORDER BY cursor DESC
            "#,
        )
        .bind(transcriber_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(rows.into_iter().map(NotationRow::into_notation).collect())
    }

    async fn find_all_by_tag_id(&self, tag_id: Uuid) -> StorageResult<Vec<Notation>> {
        let rows = sqlx::query_as::<_, NotationRow>(
            r#"
            SELECT n.id, n.cursor, n.created_at, n.updated_at, n.song_name,
                   n.artist_name, n.dead_time_ms, n.duration_ms, n.featured,
                   n.transcriber_id, n.thumbnail_url, n.video_url
            FROM notations n
            JOIN taggings t ON t.notation_id = n.id
            WHERE t.tag_id = $1
            ORDER BY n.cursor DESC
            "#,
        )
        .bind(tag_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(rows.into_iter().map(NotationRow::into_notation).collect())
    }

    async fn count(&self) -> StorageResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notations")
            .fetch_one(&self.pool)
            .await
            .map_err(query_err)?;

        Ok(row.0)
    }

    async fn create(&self, attrs: NewNotation) -> StorageResult<Notation> {
        let row = insert_notation(&self.pool, &attrs).await?;
        Ok(row.into_notation())
    }

    async fn update(&self, notation: &Notation) -> StorageResult<Notation> {
        let row = sqlx::query_as::<_, NotationRow>(
            r#"
            UPDATE notations
            SET song_name = $2,
                artist_name = $3,
                dead_time_ms = $4,
                duration_ms = $5,
                featured = $6,
                thumbnail_url = $7,
                video_url = $8,
                updated_at = $9
            WHERE id = $1
            RETURNING id, cursor, created_at, updated_at, song_name, artist_name,
                      dead_time_ms, duration_ms, featured, transcriber_id,
                      thumbnail_url, video_url
            "#,
        )
        .bind(notation.id)
        .bind(&notation.song_name)
        .bind(&notation.artist_name)
        .bind(notation.dead_time_ms)
        .bind(notation.duration_ms)
        .bind(notation.featured)
        .bind(&notation.thumbnail_url)
        .bind(&notation.video_url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        row.map(NotationRow::into_notation)
            .ok_or_else(|| StorageError::NotFound(format!("notation {}", notation.id)))
    }

    async fn find_page(
        &self,
        args: &ConnectionArgs,
        filter: &NotationPageFilter,
    ) -> StorageResult<Connection<Notation>> {
        let pool = self.pool.clone();
        let filter = filter.clone();
        self.pager
            .connect(args, move |ctx| async move {
                let (cmp, order) = match ctx.paging_type {
                    PagingType::Forward => (">", "ASC"),
                    PagingType::Backward => ("<", "DESC"),
                };

                // Build WHERE clauses dynamically. Column names and
                // operators are hardcoded; every value is bound. The same
                // filter fragment goes into the bounds query, so the
                // min/max used for page-info flags are bounds of the
                // filtered set, not the whole table.
                let has_query = filter.query.is_some();
                let has_tags = filter.tag_ids.is_some();
                let tags_row_param = if has_query { 3 } else { 2 };
                let tags_bound_param = if has_query { 2 } else { 1 };

                let mut row_conds = vec![format!("cursor {cmp} $1")];
                let mut bound_conds: Vec<String> = Vec::new();
                if has_query {
                    row_conds.push("(song_name ILIKE $2 OR artist_name ILIKE $2)".to_string());
                    bound_conds.push("(song_name ILIKE $1 OR artist_name ILIKE $1)".to_string());
                }
                if has_tags {
                    row_conds.push(format!(
                        "id IN (SELECT notation_id FROM taggings WHERE tag_id = ANY(${tags_row_param}))"
                    ));
                    bound_conds.push(format!(
                        "id IN (SELECT notation_id FROM taggings WHERE tag_id = ANY(${tags_bound_param}))"
                    ));
                }

                let row_sql = format!(
                    r#"
                    SELECT id, cursor, created_at, updated_at, song_name, artist_name,
                           dead_time_ms, duration_ms, featured, transcriber_id,
                           thumbnail_url, video_url
                    FROM notations
                    WHERE {conds}
                    ORDER BY cursor {order}
                    LIMIT {limit}
                    "#,
                    conds = row_conds.join(" AND "),
                    limit = ctx.limit,
                );
                let bounds_sql = format!(
                    "SELECT COALESCE(MIN(cursor), 0), COALESCE(MAX(cursor), 0) FROM notations{where_clause}",
                    where_clause = if bound_conds.is_empty() {
                        String::new()
                    } else {
                        format!(" WHERE {}", bound_conds.join(" AND "))
                    },
                );

                let pattern = filter.query.as_ref().map(|q| format!("%{q}%"));

                let mut rows_query =
                    sqlx::query_as::<_, NotationRow>(&row_sql).bind(ctx.cursor);
                let mut bounds_query = sqlx::query_as::<_, (i64, i64)>(&bounds_sql);
                if let Some(pattern) = &pattern {
                    rows_query = rows_query.bind(pattern.clone());
                    bounds_query = bounds_query.bind(pattern.clone());
                }
                if let Some(tag_ids) = &filter.tag_ids {
                    rows_query = rows_query.bind(tag_ids.clone());
                    bounds_query = bounds_query.bind(tag_ids.clone());
                }

                // Row fetch and bounds run concurrently (independent reads).
                let (rows, (min, max)) = tokio::try_join!(
                    rows_query.fetch_all(&pool),
                    bounds_query.fetch_one(&pool)
                )
                .map_err(query_err)?;

                Ok(PageRows {
                    rows: rows.into_iter().map(NotationRow::into_notation).collect(),
                    min,
                    max,
                })
            })
            .await
    }
}

/// Insert a notation row. Shared with the composite repository so the
/// tagged create can run inside its own transaction.
pub(super) async fn insert_notation<'e, E>(
    executor: E,
    attrs: &NewNotation,
) -> StorageResult<NotationRow>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, NotationRow>(
        r#"
        INSERT INTO notations (
            id, created_at, updated_at, song_name, artist_name,
            dead_time_ms, duration_ms, featured, transcriber_id,
            thumbnail_url, video_url
        )
        VALUES ($1, $2, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, cursor, created_at, updated_at, song_name, artist_name,
                  dead_time_ms, duration_ms, featured, transcriber_id,
                  thumbnail_url, video_url
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(Utc::now())
    .bind(&attrs.song_name)
    .bind(&attrs.artist_name)
    .bind(attrs.dead_time_ms)
    .bind(attrs.duration_ms)
    .bind(attrs.featured)
    .bind(attrs.transcriber_id)
    .bind(&attrs.thumbnail_url)
    .bind(&attrs.video_url)
    .fetch_one(executor)
    .await
    .map_err(insert_err)
}

/// Database row representation for Notation.
#[derive(sqlx::FromRow)]
pub(super) struct NotationRow {
    id: Uuid,
    cursor: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    song_name: String,
    artist_name: String,
    dead_time_ms: i64,
    duration_ms: i64,
    featured: bool,
    transcriber_id: Uuid,
    thumbnail_url: Option<String>,
    video_url: Option<String>,
}

impl NotationRow {
    pub(super) fn into_notation(self) -> Notation {
        Notation {
            id: self.id,
            cursor: self.cursor,
            created_at: self.created_at,
            updated_at: self.updated_at,
            song_name: self.song_name,
            artist_name: self.artist_name,
            dead_time_ms: self.dead_time_ms,
            duration_ms: self.duration_ms,
            featured: self.featured,
            transcriber_id: self.transcriber_id,
            thumbnail_url: self.thumbnail_url,
            video_url: self.video_url,
        }
    }
}
