//! CareHub authentication API server binary.

use std::sync::Arc;

use carehub_api::config::ApiConfig;
use carehub_api::services::auth::bootstrap_admin;
use carehub_api::{AppState, router};
use carehub_core::auth::session::spawn_sweeper;
use carehub_core::clock::SystemClock;
use carehub_core::store::AuthStore;
use carehub_core::store::memory::MemoryAuthStore;
use carehub_core::store::postgres::PgAuthStore;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_LOG_FILTER: &str = "info,carehub_api=debug,carehub_core=debug";

/// CLI arguments. Everything else comes from the environment (see `ApiConfig::from_env`).
#[derive(Parser, Debug)]
#[command(name = "carehub_api_server", about = "CareHub authentication API server")]
struct Args {
    /// Address to listen on. Overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// PostgreSQL connection URL. Overrides `DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep identities and reset tokens in memory instead of PostgreSQL.
    /// Everything is lost on exit; development only.
    #[arg(long, default_value_t = false)]
    memory_store: bool,

    /// Create this administrator at startup if no administrator exists.
    #[arg(long, env = "CAREHUB_BOOTSTRAP_ADMIN_EMAIL")]
    bootstrap_admin_email: Option<String>,

    /// Password for the bootstrap administrator.
    #[arg(long, env = "CAREHUB_BOOTSTRAP_ADMIN_PASSWORD", hide_env_values = true)]
    bootstrap_admin_password: Option<String>,

    /// Display name for the bootstrap administrator.
    #[arg(long, default_value = "Administrator")]
    bootstrap_admin_name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    info!(
        bind_addr = %config.bind_addr,
        environment = ?config.environment,
        memory_store = args.memory_store,
        "starting carehub_api_server"
    );

    let store: Arc<dyn AuthStore> = if args.memory_store {
        warn!("using the in-memory store; nothing will be persisted");
        Arc::new(MemoryAuthStore::new())
    } else {
        info!(
            max_connections = args.max_connections,
            "configuring connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.database_url)
            .await?;

        info!("running database migrations");
        carehub_api::migrate(&pool).await?;
        Arc::new(PgAuthStore::new(pool))
    };

    let state = AppState::new(config.clone(), store, Arc::new(SystemClock));

    if let Some(email) = args.bootstrap_admin_email.as_deref() {
        let password = args
            .bootstrap_admin_password
            .as_deref()
            .ok_or("--bootstrap-admin-email requires CAREHUB_BOOTSTRAP_ADMIN_PASSWORD")?;
        bootstrap_admin(&state, email, password, &args.bootstrap_admin_name)
            .await
            .map_err(|e| format!("bootstrap administrator: {e}"))?;
    }

    let cancel = CancellationToken::new();
    let sweeper = spawn_sweeper(
        state.sessions.clone(),
        config.session_sweep_interval,
        cancel.clone(),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let shutdown = cancel.clone();
    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
                _ = shutdown.cancelled() => {}
            }
        })
        .await;

    cancel.cancel();
    let _ = sweeper.await;

    result?;
    Ok(())
}
