mod api;
mod middleware;
mod scheduler;

use std::net::SocketAddr;
use std::sync::Arc;

use folio_chat::ProviderRegistry;
use folio_db::{EntityStore, MemoryStore, PgStore};
use folio_sync::{LazyUpstream, SyncEngine};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::{OperatorAuth, RouteLimits},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = folio_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting folio-server");

    let store: Arc<dyn EntityStore> = match &config.database_url {
        Some(url) => {
            let pool_config = folio_db::PoolConfig::from_app_config(&config);
            let pool = folio_db::connect_pool(url, pool_config).await?;
            let applied = folio_db::run_migrations(&pool).await?;
            tracing::info!(applied, "database migrations complete");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory entity store");
            Arc::new(MemoryStore::new())
        }
    };

    // Upstream and chat configuration are read on first use, not here.
    let engine = Arc::new(SyncEngine::new(store, Arc::new(LazyUpstream::from_env())));
    let chat = Arc::new(ProviderRegistry::from_env());

    let _scheduler = scheduler::build_scheduler(Arc::clone(&engine), config.owner.clone()).await?;

    let auth = OperatorAuth::from_config(&config)?;
    let app = build_app(
        AppState { sync: engine, chat },
        auth,
        RouteLimits::from_config(&config),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
