use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use folio::auth::LocalIdentityProvider;
use folio::config::{Cli, Config};
use folio::context::ClientContext;
use folio::db;
use folio::remote::sqlite::{SqliteDocumentStore, WriteRules};
use folio::routes;
use folio::site::Site;
use folio::state::{AppState, Shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let store = SqliteDocumentStore::new(
        pool.clone(),
        WriteRules {
            read_only: config.database.read_only,
        },
    );
    if config.database.read_only {
        tracing::warn!("Document store is read-only; every write will be rejected");
    }

    let ctx = ClientContext::new(Arc::new(store), &config.app.id);
    let site = Site::new(&ctx);
    let mut subscriptions = site.activate().await?;
    tracing::info!(
        app_id = %config.app.id,
        "Mirroring {} live subscriptions",
        subscriptions.len()
    );

    let identity = LocalIdentityProvider::new(pool, &config.auth);
    let purged = identity.purge_expired()?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }
    if config.auth.owner_password_hash.is_none() {
        tracing::warn!("No owner_password_hash configured; owner sign-in is disabled");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let shutdown = Shutdown::new();
    let state = AppState {
        config,
        identity,
        site,
        shutdown: shutdown.clone(),
    };
    let app = routes::router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    subscriptions.release();
    Ok(())
}

async fn shutdown_signal(shutdown: Shutdown) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down");
    // Ends open event streams so graceful shutdown can finish.
    shutdown.trigger();
}
