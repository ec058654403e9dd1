use anyhow::{Context, Result};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod password;
pub mod response;
pub mod routes;
pub mod routing;
pub mod session;
pub mod store;
pub mod utils;

use auth::TokenCodec;
use config::{Config, GATEWAY_PREFIX};
use context::AppContext;
use gateway::UpstreamClient;
use routing::PermissionResolver;
use session::AuthSessionService;
use store::{AccountStore, InMemoryStore, PostgresStore, TokenLedger};

/// Account and ledger backends, usually the same object behind two traits
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub ledger: Arc<dyn TokenLedger>,
}

impl Stores {
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            accounts: store.clone(),
            ledger: store,
        }
    }
}

/// Postgres when `DB`/`DATABASE_URL` is configured, otherwise an in-memory
/// store seeded from the `Accounts` section
pub async fn open_stores(config: &Config) -> Result<Stores> {
    match &config.database {
        Some(database) => {
            let pool = db::create_pool(database).await?;
            tracing::info!("Connected to database");

            tracing::info!("Applying database migrations...");
            db::migrate(&pool).await?;
            tracing::info!("Database migrations applied successfully.");

            let store = Arc::new(PostgresStore::new(pool));
            Ok(Stores {
                accounts: store.clone(),
                ledger: store,
            })
        }
        None => {
            tracing::warn!(
                accounts = config.seed_accounts.len(),
                "No database configured, tokens will not survive a restart"
            );
            let store = Arc::new(InMemoryStore::new());
            for seed in &config.seed_accounts {
                store
                    .create_account(&seed.username, &seed.password_hash, &seed.role)
                    .await
                    .with_context(|| format!("Failed to seed account {}", seed.username))?;
            }
            Ok(Stores::in_memory(store))
        }
    }
}

/// Wire the shared services together
pub fn build_context(config: Config, stores: Stores) -> Result<Arc<AppContext>> {
    let config = Arc::new(config);

    let codec = Arc::new(TokenCodec::new(&config.jwt));
    let sessions = Arc::new(AuthSessionService::new(
        stores.accounts,
        stores.ledger,
        codec,
        config.logging.clone(),
    ));
    let resolver = Arc::new(PermissionResolver::new(
        GATEWAY_PREFIX,
        config.routes.clone(),
    ));
    let upstream = Arc::new(UpstreamClient::new(&config.upstream)?);

    Ok(Arc::new(AppContext::new(
        config, sessions, resolver, upstream,
    )))
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received. Shutting down...");
}

pub async fn run() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("=== Cerberus Gateway Starting ===");
    tracing::info!("Port: {}", config.port);
    tracing::info!("Route groups: {}", config.routes.groups().len());
    if config.routes.is_empty() {
        tracing::warn!("Route table is empty, every /api/v1 request will be a 404");
    }

    let stores = open_stores(&config).await?;
    let bind_address = format!("0.0.0.0:{}", config.port);
    let app_context = build_context(config, stores)?;
    let app = routes::create_router(app_context);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    tracing::info!("Cerberus listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    Ok(())
}
