//! GraphQL API for the StringSync lesson library.
//!
//! Provides the GraphQL schema (queries, mutations, Relay-style
//! connections) and an axum HTTP server that resolves bearer session
//! tokens before query execution.
//!
//! # Building and serving a schema
//!
//! ```ignore
//! use stringsync_graphql::{build_schema, serve_with_shutdown, ServerConfig, StringsyncServices};
//!
//! let schema = build_schema(StringsyncServices {
//!     auth, users, notations, tags, notifications,
//! });
//!
//! serve_with_shutdown(schema, auth, ServerConfig::default(), shutdown).await?;
//! ```

mod schema;
mod server;
mod types;

pub use schema::{
    build_schema, ensure_auth, AuthRequirement, MutationRoot, QueryRoot, SessionToken,
    StringsyncServices, MAX_QUERY_COMPLEXITY, MAX_QUERY_DEPTH,
};
pub use server::{serve, serve_with_shutdown, ServerConfig};
pub use types::StringsyncSchema;
