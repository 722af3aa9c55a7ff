//! cartsync: keeps a shared shopping cart in sync across browsers.
//!
//! Clients connect to `/ws` and send cart updates; every frame is relayed to
//! all connected clients and `cartVersion` updates are stored in SQLite.
//! `/api/v1/carts` lists the latest versions, everything else is served from
//! the public directory.
//!
//! Run:
//!   cargo run -p cartsync-server -- --addr 127.0.0.1:8080 --db einkauf.db

use anyhow::Context;
use cartsync_server::config::Config;
use cartsync_server::http::{self, AppState};
use cartsync_server::hub::Hub;
use cartsync_store::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("cartsync=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let store = SqliteStore::open(&config.db)
        .with_context(|| format!("opening {}", config.db.display()))?;
    let history = SqliteStore::open_read_only(&config.db)
        .with_context(|| format!("opening {} for reading", config.db.display()))?;

    let (hub, handle) = Hub::new(store, config.queue_capacity);
    tokio::spawn(hub.run());

    let state = AppState::new(handle, history, config.keepalive())
        .with_max_message_size(config.max_message_size);
    let app = http::router(state, &config.public);

    let listener = TcpListener::bind(config.addr).await?;
    tracing::info!("Listening on http://{}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
