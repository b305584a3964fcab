//! GraphQL type definitions.

use async_graphql::{EmptySubscription, Schema};

use crate::schema::{MutationRoot, QueryRoot};

/// The StringSync GraphQL schema type.
pub type StringsyncSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;
