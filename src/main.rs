//! StashKV - A Namespaced, TTL-Bounded Key-Value Store
//!
//! This is the main entry point for the StashKV server.
//! It builds the store, starts the expiry sweeper and serves the HTTP API.

use clap::Parser;
use stashkv::server::{self, AppState};
use stashkv::storage::ExpirySweeper;
use stashkv::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn print_banner(config: &Config) {
    let storage = match &config.storage_uri {
        Some(_) => "durable (sqlite)",
        None => "in-memory",
    };
    let ttl = match config.storage_ttl() {
        Some(ttl) => format!("{} ms", ttl.as_millis()),
        None => "none".to_string(),
    };

    println!(
        r#"
  ____  _            _     _  ____     __
 / ___|| |_ __ _ ___| |__ | |/ /\ \   / /
 \___ \| __/ _` / __| '_ \| ' /  \ \ / /
  ___) | || (_| \__ \ | | | . \   \ V /
 |____/ \__\__,_|___/_| |_|_|\_\   \_/

StashKV v{} - Namespaced TTL Key-Value Store
──────────────────────────────────────────────────────────────
Server starting on http://{}/api/v2
Storage: {}   TTL: {}

Use Ctrl+C to shutdown gracefully.
"#,
        stashkv::VERSION,
        config.bind_address(),
        storage,
        ttl
    );
}

fn init_tracing(config: &Config) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments and environment
    let config = Config::parse();

    // Set up logging
    init_tracing(&config);

    if config.storage_uri.is_none() {
        warn!("STORAGE_URI is not set, records are kept in memory and lost on restart");
    }

    // Create the store (one shared connection across all namespaces)
    let store = Arc::new(config.store_builder().build().await);
    info!(
        durable = store.is_durable(),
        ttl = ?store.ttl(),
        sql_touch = config.enable_sql_touch,
        "Store initialized"
    );

    if config.sweep_once {
        let deleted = store.delete_expired_items().await;
        println!("{}", deleted);
        store.close().await;
        return Ok(());
    }

    // Start the scheduled expiry sweeper
    let sweeper = match (config.enable_ttl_sweeper, store.sweeper()) {
        (true, Some(sweeper)) => Some(ExpirySweeper::start(
            sweeper.clone(),
            config.sweep_schedule(),
        )),
        (true, None) => {
            error!("TTL sweeper enabled but no durable STORAGE_URI is configured, sweeper not started");
            None
        }
        (false, _) => None,
    };

    print_banner(&config);

    // Bind the listener and serve until shutdown
    let listener = TcpListener::bind(config.bind_address()).await?;
    let app = server::router(AppState::new(Arc::clone(&store)), config.max_payload_bytes);

    if let Err(e) = server::serve(listener, app).await {
        error!(error = %e, "Server error");
    }

    drop(sweeper);
    store.close().await;

    info!("Server shutdown complete");
    Ok(())
}
