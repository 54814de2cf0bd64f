//! Paddock admin auth server.
//!
//! Serves the login endpoints and the gated admin API, and carries the
//! administrative commands that operate on the same database.

use anyhow::Context;
use clap::{Parser, Subcommand};
use paddock_auth::stores::postgres::{
    self, PostgresAccountStore, PostgresAttemptStore, PostgresSessionStore,
};
use paddock_auth::{AuthConfig, AuthService, CreateAccount, EventId, Role, SystemClock};
use paddock_web::{PgAppState, WebConfig, app_router};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the password for `create-account`.
const NEW_ACCOUNT_PASSWORD_VAR: &str = "PADDOCK_NEW_ACCOUNT_PASSWORD";

const DEFAULT_LOG_FILTER: &str = "info,paddock_auth=debug,sqlx=warn";

#[derive(Parser, Debug)]
#[command(name = "paddock-server")]
#[command(version)]
#[command(about = "Paddock admin authentication server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create an admin account. The password is read from
    /// `PADDOCK_NEW_ACCOUNT_PASSWORD`.
    CreateAccount {
        /// Login email
        #[arg(long)]
        email: String,
        /// Name shown in the dashboard
        #[arg(long)]
        display_name: String,
        /// Role, e.g. `super_admin` or `organizer`
        #[arg(long)]
        role: Role,
        /// Event the account is confined to (event-scoped roles only)
        #[arg(long)]
        event: Option<EventId>,
    },
    /// Clear the login lock of an account
    Unlock {
        /// Login email
        #[arg(long)]
        email: String,
    },
    /// Delete expired session rows and stale login attempt counters
    PurgeSessions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let web_config = WebConfig::from_env().context("invalid web configuration")?;
    let auth_config = AuthConfig::from_env().context("invalid auth configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(web_config.max_connections)
        .acquire_timeout(web_config.acquire_timeout)
        .connect(web_config.database_url.expose_secret())
        .await
        .context("failed to connect to the database")?;
    postgres::migrate(&pool).await?;
    info!("Database migrations applied");

    let service = AuthService::new(
        auth_config,
        PostgresAccountStore::new(pool.clone()),
        PostgresSessionStore::new(pool.clone()),
        PostgresAttemptStore::new(pool),
        Arc::new(SystemClock),
    )?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(web_config, service).await?,
        Command::CreateAccount {
            email,
            display_name,
            role,
            event,
        } => {
            let password = std::env::var(NEW_ACCOUNT_PASSWORD_VAR)
                .with_context(|| format!("{NEW_ACCOUNT_PASSWORD_VAR} must be set"))?;
            let account = service
                .create_account(CreateAccount {
                    email,
                    password,
                    display_name,
                    role,
                    assigned_event_id: event,
                })
                .await?;
            info!(account_id = %account.id, role = %account.role, "Account created");
        }
        Command::Unlock { email } => {
            service.unlock_account(&email).await?;
            info!(email = %email, "Account unlocked");
        }
        Command::PurgeSessions => {
            let sessions = service.purge_expired_sessions().await?;
            let attempts = service.purge_stale_attempts().await?;
            info!(sessions, attempts, "Purge finished");
        }
    }

    Ok(())
}

async fn serve(
    config: WebConfig,
    service: AuthService<PostgresAccountStore, PostgresSessionStore, PostgresAttemptStore>,
) -> anyhow::Result<()> {
    let state = PgAppState::new(service, config.cookies, &config.login_path)
        .with_trusted_proxies(config.trusted_proxies);
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(address = %config.bind_addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
