//! PostgreSQL storage adapter.
//!
//! This module implements the repository traits defined in
//! `stringsync-core` using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`PgRepositories`] - Composite repository implementing `Repositories`
//! - Individual repos: `PgUserRepo`, `PgNotationRepo`, etc.
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_server(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let repositories = PgRepositories::new(Arc::new(db));
//! ```

mod database;
mod helpers;
mod notation_repo;
mod session_repo;
mod tag_repo;
mod user_repo;

pub use database::{Database, DatabaseConfig, PurgeStats};
pub use notation_repo::PgNotationRepo;
pub use session_repo::PgSessionRepo;
pub use tag_repo::PgTagRepo;
pub use user_repo::PgUserRepo;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use stringsync_core::error::{StorageError, StorageResult};
use stringsync_core::models::Notation;
use stringsync_core::ports::{
    NewNotation, NotationRepo, Repositories, SessionRepo, TagRepo, UserRepo,
};

use helpers::insert_err;

// =============================================================================
// Composite Repository
// =============================================================================

/// Aggregated PostgreSQL repositories implementing the `Repositories` trait.
///
/// This provides a single entry point for all storage operations and
/// implements atomic transactions that span multiple tables.
pub struct PgRepositories {
    db: Arc<Database>,
    users: PgUserRepo,
    notations: PgNotationRepo,
    tags: PgTagRepo,
    sessions: PgSessionRepo,
}

impl PgRepositories {
    /// Create a new repository aggregate from a database connection.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            users: PgUserRepo::new(&db),
            notations: PgNotationRepo::new(&db),
            tags: PgTagRepo::new(&db),
            sessions: PgSessionRepo::new(&db),
            db,
        }
    }
}

#[async_trait]
impl Repositories for PgRepositories {
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
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        let row = notation_repo::insert_notation(&mut *tx, &attrs).await?;
        let notation = row.into_notation();

        // A bad tag id fails the whole create, rolling the notation back.
        for tag_id in tag_ids {
            sqlx::query("INSERT INTO taggings (id, notation_id, tag_id) VALUES ($1, $2, $3)")
                .bind(Uuid::new_v4())
                .bind(notation.id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .map_err(insert_err)?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        Ok(notation)
    }
}
