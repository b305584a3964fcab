//! GraphQL HTTP server.
//!
//! Resolves the request's bearer session token into a [`SessionUser`]
//! before query execution, so resolvers never touch raw credentials.

use std::future::Future;
use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stringsync_core::models::SessionUser;
use stringsync_core::services::AuthService;

use crate::schema::SessionToken;
use crate::types::StringsyncSchema;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_playground: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            enable_playground: true,
        }
    }
}

#[derive(Clone)]
struct AppState {
    schema: StringsyncSchema,
    auth: Arc<AuthService>,
}

/// Start the GraphQL server.
pub async fn serve(
    schema: StringsyncSchema,
    auth: Arc<AuthService>,
    config: ServerConfig,
) -> Result<(), std::io::Error> {
    let app = router(schema, auth, &config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("⚡ GraphQL server listening on http://{}", addr);

    axum::serve(listener, app).await
}

/// Start the GraphQL server with graceful shutdown support.
pub async fn serve_with_shutdown<F>(
    schema: StringsyncSchema,
    auth: Arc<AuthService>,
    config: ServerConfig,
    shutdown_signal: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(schema, auth, &config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    debug!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
}

fn router(schema: StringsyncSchema, auth: Arc<AuthService>, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/graphql", get(graphql_playground).post(graphql_handler))
        .route("/health", get(health_check))
        .with_state(AppState { schema, auth });

    if config.enable_playground {
        app = app.route("/", get(graphql_playground));
    }

    app
}

/// GraphQL query handler.
///
/// A broken session lookup degrades the caller to anonymous rather
/// than failing the transport; any operation that actually needs auth
/// will then reject with a precise error.
async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let token = bearer_token(&headers);
    let session_user = match state.auth.session_user(token, Utc::now()).await {
        Ok(session_user) => session_user,
        Err(e) => {
            warn!(error = %e, "⚠️  Session lookup failed, treating caller as anonymous");
            SessionUser::anonymous()
        }
    };

    let req = req
        .into_inner()
        .data(session_user)
        .data(SessionToken(token));
    state.schema.execute(req).await.into()
}

/// Extract the session token from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| Uuid::parse_str(token.trim()).ok())
}

/// GraphQL Playground UI.
async fn graphql_playground() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parses_well_formed_headers() {
        let token = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(bearer_token(&headers), Some(token));
    }

    #[test]
    fn bearer_token_rejects_malformed_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-uuid"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(bearer_token(&headers), None);
    }
}
