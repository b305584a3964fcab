//! StringSync - guitar lesson library server.
//!
//! # Usage
//!
//! ```bash
//! # Start with default config
//! stringsync
//!
//! # Start with environment overrides
//! DATABASE_URL=postgres://localhost/stringsync WEB_ORIGIN=https://stringsync.com stringsync
//! ```

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use stringsync_core::metrics::init_metrics;
use stringsync_core::ports::{LogMailer, Mailer, NoopMailer, Repositories};
use stringsync_core::services::{
    AuthConfig, AuthService, NotationService, NotificationConfig, NotificationService, TagService,
    UserService,
};
use stringsync_graphql::{build_schema, serve_with_shutdown, ServerConfig, StringsyncServices};
use stringsync_storage::{Database, DatabaseConfig, PgRepositories};

/// StringSync CLI - lesson library server.
#[derive(Parser, Debug)]
#[command(name = "stringsync")]
#[command(about = "StringSync - guitar lesson library server")]
#[command(version)]
struct Cli {
    /// PostgreSQL database URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost/stringsync"
    )]
    database_url: String,

    /// GraphQL server port.
    #[arg(long, env = "GRAPHQL_PORT", default_value = "4000")]
    graphql_port: u16,

    /// Prometheus metrics port.
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,

    /// Origin of the web frontend, used in notification email links.
    #[arg(long, env = "WEB_ORIGIN", default_value = "http://localhost:3000")]
    web_origin: String,

    /// Mail transport: "log" prints messages, "noop" drops them.
    #[arg(long, env = "MAILER", default_value = "log", value_parser = parse_mailer_kind)]
    mailer: MailerKind,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Run database migrations and exit.
    #[arg(long)]
    migrate_only: bool,

    /// Purge all application data from the database and exit.
    ///
    /// This will delete all users, notations, taggings, tags, and
    /// sessions. Schema/migrations are preserved.
    #[arg(long)]
    purge: bool,

    /// Skip confirmation prompt for destructive operations (like --purge).
    #[arg(long, short = 'y')]
    yes: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy)]
enum MailerKind {
    Log,
    Noop,
}

/// Parse mailer kind from string.
fn parse_mailer_kind(s: &str) -> Result<MailerKind, String> {
    match s.to_lowercase().as_str() {
        "log" => Ok(MailerKind::Log),
        "noop" => Ok(MailerKind::Noop),
        _ => Err(format!("Invalid mailer '{}'. Use 'log' or 'noop'.", s)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    // Prometheus metrics exporter (optional - failures don't crash the app)
    let metrics_enabled = match format!("0.0.0.0:{}", cli.metrics_port)
        .parse::<std::net::SocketAddr>()
    {
        Ok(metrics_addr) => match PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
        {
            Ok(()) => {
                init_metrics();
                true
            }
            Err(e) => {
                warn!(
                    "⚠️  Failed to start metrics exporter: {}. Continuing without metrics.",
                    e
                );
                false
            }
        },
        Err(e) => {
            warn!("⚠️  Invalid metrics address: {}. Continuing without metrics.", e);
            false
        }
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 🚀 STARTUP
    // ─────────────────────────────────────────────────────────────────────────
    info!("🚀 Starting StringSync");
    debug!(database_url = %mask_password(&cli.database_url), "Database endpoint");
    debug!(web_origin = %cli.web_origin, "Web origin");

    // ─────────────────────────────────────────────────────────────────────────
    // 🗄️ DATABASE
    // ─────────────────────────────────────────────────────────────────────────
    let db_config = DatabaseConfig::for_server(&cli.database_url);

    info!("🗄️  Connecting to database...");
    let db = Database::connect(&db_config)
        .await
        .context("Failed to connect to database")?;

    db.migrate().await.context("Failed to run migrations")?;
    info!("🗄️  Database ready (migrations applied)");

    if cli.migrate_only {
        info!("🛑 --migrate-only flag set, exiting");
        return Ok(());
    }

    if cli.purge {
        return handle_purge(&db, cli.yes).await;
    }

    let db = Arc::new(db);
    let repositories: Arc<dyn Repositories> = Arc::new(PgRepositories::new(db.clone()));

    // ─────────────────────────────────────────────────────────────────────────
    // 🧩 SERVICES
    // ─────────────────────────────────────────────────────────────────────────
    let mailer: Arc<dyn Mailer> = match cli.mailer {
        MailerKind::Log => Arc::new(LogMailer),
        MailerKind::Noop => Arc::new(NoopMailer),
    };

    let auth = Arc::new(AuthService::new(
        AuthConfig::default(),
        repositories.clone(),
    ));
    let services = StringsyncServices {
        auth: auth.clone(),
        users: Arc::new(UserService::new(repositories.clone())),
        notations: Arc::new(NotationService::new(repositories.clone())),
        tags: Arc::new(TagService::new(repositories.clone())),
        notifications: Arc::new(NotificationService::new(
            NotificationConfig {
                web_origin: cli.web_origin.clone(),
            },
            mailer,
        )),
    };

    // Includes DoS protection: depth and complexity limits
    let schema = build_schema(services);

    let graphql_config = ServerConfig {
        host: "0.0.0.0".to_string(),
        port: cli.graphql_port,
        enable_playground: true,
    };

    // ─────────────────────────────────────────────────────────────────────────
    // ✅ READY
    // ─────────────────────────────────────────────────────────────────────────
    info!("✅ StringSync ready");
    info!("   ⚡ GraphQL:  http://localhost:{}/graphql", cli.graphql_port);
    if metrics_enabled {
        info!("   📊 Metrics:  http://localhost:{}/metrics", cli.metrics_port);
    } else {
        info!("   📊 Metrics:  disabled");
    }
    info!("   Press Ctrl+C to stop");

    serve_with_shutdown(schema, auth, graphql_config, shutdown_signal())
        .await
        .context("Server error")?;

    // ─────────────────────────────────────────────────────────────────────────
    // 🛑 SHUTDOWN
    // ─────────────────────────────────────────────────────────────────────────
    info!("🛑 Shutting down...");
    db.close().await;
    info!("🛑 Shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Mask password in database URL for logging.
fn mask_password(url_str: &str) -> String {
    match url::Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Handle the --purge command.
async fn handle_purge(db: &Database, skip_confirmation: bool) -> Result<()> {
    warn!("⚠️  PURGE MODE: This will delete ALL application data!");
    warn!("   - All users, notations, taggings, tags");
    warn!("   - All login sessions");
    warn!("   - Schema and migrations will be preserved");

    if !skip_confirmation {
        print!("\n🔴 Are you sure you want to purge all data? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            info!("❌ Purge cancelled");
            return Ok(());
        }
    }

    info!("🗑️  Purging database...");

    let stats = db.purge().await.context("Failed to purge database")?;

    info!("✅ Database purged successfully");
    info!("   👤 Users removed: {}", stats.users_removed);
    info!("   🎼 Notations removed: {}", stats.notations_removed);
    info!("   🏷️  Tags removed: {}", stats.tags_removed);

    Ok(())
}
