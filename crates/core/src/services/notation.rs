//! Notation catalog operations.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::metrics::{record_page_served, PageQueryTimer};
use crate::models::Notation;
use crate::ports::{Connection, ConnectionArgs, NewNotation, NotationPageFilter, Repositories};

const NAME_MAX_LEN: usize = 128;

/// Attributes for publishing a new notation.
#[derive(Debug, Clone)]
pub struct CreateNotation {
    pub song_name: String,
    pub artist_name: String,
    pub transcriber_id: Uuid,
    pub tag_ids: Vec<Uuid>,
}

pub struct NotationService {
    repos: Arc<dyn Repositories>,
}

impl NotationService {
    pub fn new(repos: Arc<dyn Repositories>) -> Self {
        Self { repos }
    }

    pub async fn find(&self, id: Uuid) -> DomainResult<Option<Notation>> {
        Ok(self.repos.notations().find(id).await?)
    }

    pub async fn find_all_by_transcriber_id(
        &self,
        transcriber_id: Uuid,
    ) -> DomainResult<Vec<Notation>> {
        Ok(self
            .repos
            .notations()
            .find_all_by_transcriber_id(transcriber_id)
            .await?)
    }

    pub async fn find_all_by_tag_id(&self, tag_id: Uuid) -> DomainResult<Vec<Notation>> {
        Ok(self.repos.notations().find_all_by_tag_id(tag_id).await?)
    }

    /// Fetch one page of notations matching the filter, ordered by cursor.
    pub async fn find_page(
        &self,
        args: &ConnectionArgs,
        filter: &NotationPageFilter,
    ) -> DomainResult<Connection<Notation>> {
        let _timer = PageQueryTimer::new();
        let connection = self.repos.notations().find_page(args, filter).await?;
        record_page_served("notations");
        Ok(connection)
    }

    /// Publish a notation with its tags in one atomic operation.
    pub async fn create(&self, attrs: CreateNotation) -> DomainResult<Notation> {
        validate_name(&attrs.song_name, "song name")?;
        validate_name(&attrs.artist_name, "artist name")?;

        let notation = self
            .repos
            .create_notation_with_tags(
                NewNotation {
                    song_name: attrs.song_name,
                    artist_name: attrs.artist_name,
                    transcriber_id: attrs.transcriber_id,
                    dead_time_ms: 0,
                    duration_ms: 0,
                    featured: false,
                    thumbnail_url: None,
                    video_url: None,
                },
                &attrs.tag_ids,
            )
            .await?;

        info!(notation_id = %notation.id, song = %notation.song_name, "🎼 Notation created");
        Ok(notation)
    }

    pub async fn update(&self, notation: &Notation) -> DomainResult<Notation> {
        validate_name(&notation.song_name, "song name")?;
        validate_name(&notation.artist_name, "artist name")?;
        Ok(self.repos.notations().update(notation).await?)
    }
}

fn validate_name(value: &str, field: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > NAME_MAX_LEN {
        return Err(DomainError::Validation(format!(
            "{field} must be at most {NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{TagRepo, UserRepo};
    use crate::testing::{build_new_user, MemRepositories};

    #[tokio::test]
    async fn create_attaches_tags_atomically() {
        let repos = Arc::new(MemRepositories::new());
        let user = repos.users().create(build_new_user()).await.unwrap();
        let jazz = repos.tags().create("jazz").await.unwrap();
        let service = NotationService::new(repos.clone());

        let notation = service
            .create(CreateNotation {
                song_name: "Stella by Starlight".into(),
                artist_name: "Victor Young".into(),
                transcriber_id: user.id,
                tag_ids: vec![jazz.id],
            })
            .await
            .unwrap();

        let tags = repos.tags().find_all_by_notation_id(notation.id).await.unwrap();
        assert_eq!(tags, vec![jazz]);
    }

    #[tokio::test]
    async fn create_rejects_unknown_tags_without_partial_writes() {
        let repos = Arc::new(MemRepositories::new());
        let user = repos.users().create(build_new_user()).await.unwrap();
        let service = NotationService::new(repos.clone());

        let result = service
            .create(CreateNotation {
                song_name: "Nowhere Man".into(),
                artist_name: "The Beatles".into(),
                transcriber_id: user.id,
                tag_ids: vec![Uuid::new_v4()],
            })
            .await;

        assert!(result.is_err());
        assert_eq!(service.find_all_by_transcriber_id(user.id).await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn create_rejects_blank_names() {
        let repos = Arc::new(MemRepositories::new());
        let user = repos.users().create(build_new_user()).await.unwrap();
        let service = NotationService::new(repos);

        let result = service
            .create(CreateNotation {
                song_name: "   ".into(),
                artist_name: "Somebody".into(),
                transcriber_id: user.id,
                tag_ids: vec![],
            })
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
