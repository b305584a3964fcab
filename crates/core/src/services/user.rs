//! User lookup and administration.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::metrics::{record_page_served, PageQueryTimer};
use crate::models::{User, UserRole};
use crate::ports::{Connection, ConnectionArgs, Repositories};

pub struct UserService {
    repos: Arc<dyn Repositories>,
}

impl UserService {
    pub fn new(repos: Arc<dyn Repositories>) -> Self {
        Self { repos }
    }

    pub async fn find(&self, id: Uuid) -> DomainResult<Option<User>> {
        Ok(self.repos.users().find(id).await?)
    }

    pub async fn count(&self) -> DomainResult<i64> {
        Ok(self.repos.users().count().await?)
    }

    /// Fetch one page of users ordered by cursor.
    pub async fn find_page(&self, args: &ConnectionArgs) -> DomainResult<Connection<User>> {
        let _timer = PageQueryTimer::new();
        let connection = self.repos.users().find_page(args).await?;
        record_page_served("users");
        Ok(connection)
    }

    /// Change a user's role.
    pub async fn update_role(&self, id: Uuid, role: UserRole) -> DomainResult<User> {
        let mut user = self
            .repos
            .users()
            .find(id)
            .await?
            .ok_or_else(|| DomainError::NotFound("user missing".into()))?;

        user.role = role;
        Ok(self.repos.users().update(&user).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::UserRepo;
    use crate::testing::{build_new_user, MemRepositories};

    #[tokio::test]
    async fn update_role_promotes_user() {
        let repos = Arc::new(MemRepositories::new());
        let user = repos.users().create(build_new_user()).await.unwrap();
        let service = UserService::new(repos);

        let updated = service.update_role(user.id, UserRole::Teacher).await.unwrap();
        assert_eq!(updated.role, UserRole::Teacher);

        let missing = service.update_role(Uuid::new_v4(), UserRole::Admin).await;
        assert!(matches!(missing, Err(DomainError::NotFound(_))));
    }
}
