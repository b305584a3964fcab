//! Tag lookups.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::DomainResult;
use crate::models::Tag;
use crate::ports::Repositories;

pub struct TagService {
    repos: Arc<dyn Repositories>,
}

impl TagService {
    pub fn new(repos: Arc<dyn Repositories>) -> Self {
        Self { repos }
    }

    pub async fn find(&self, id: Uuid) -> DomainResult<Option<Tag>> {
        Ok(self.repos.tags().find(id).await?)
    }

    pub async fn find_all(&self) -> DomainResult<Vec<Tag>> {
        Ok(self.repos.tags().find_all().await?)
    }

    pub async fn find_all_by_notation_id(&self, notation_id: Uuid) -> DomainResult<Vec<Tag>> {
        Ok(self.repos.tags().find_all_by_notation_id(notation_id).await?)
    }
}
