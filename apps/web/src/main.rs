#![deny(warnings)]

//! Web front end server.

use anyhow::{Context, Result};
use circuit_web::{logging, router, AppState, Config};
use clap::Parser;
use persistence::{MemoryUserStore, SqliteUserStore, UserStore};
use sim_api::{HttpApi, SimulationApi};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    logging::init(config.log_file.as_deref())?;
    info!(
        api = %config.api_source,
        admin = %config.admin_user,
        listen = %config.listen,
        "starting front end"
    );

    let api: Arc<dyn SimulationApi> =
        Arc::new(HttpApi::new(config.api_config()).context("building http client")?);
    let store: Arc<dyn UserStore> = match config.sqlite_url() {
        Some(url) => Arc::new(
            SqliteUserStore::open(&url, true)
                .await
                .with_context(|| format!("opening user database {url}"))?,
        ),
        None => {
            info!("keeping registered users in memory");
            Arc::new(MemoryUserStore::default())
        }
    };

    let state = AppState::new(api, store, config.dump_dir.clone());
    match state.import_remote_users(&config.seed_password).await {
        Ok(added) => info!(added, "user list imported"),
        Err(e) => warn!(
            error = %e,
            "could not import the server's user list; continuing without it"
        ),
    }
    state.refresh_templates().await;

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    info!(addr = %config.listen, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
