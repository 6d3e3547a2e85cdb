// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

#[cfg(not(test))]
use tokio_util::sync::CancellationToken;
#[cfg(not(test))]
use tracing::{error, info};
#[cfg(not(test))]
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
#[cfg(not(test))]
use wallet_core::{
    api::router,
    config::{AppConfig, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    state::AppState,
};

#[cfg(not(test))]
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[cfg(not(test))]
#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let config = AppConfig::from_env();
    let state = AppState::from_config(&config)
        .await
        .expect("Failed to initialize wallet core");
    let app = router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind loopback address");
    info!(%addr, "Wallet core listening on http://{addr} (docs at /docs)");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .expect("HTTP server failed");
}
