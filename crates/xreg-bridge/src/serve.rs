//! Wires the startup state machine (spec §4.9) into a running Bridge: load
//! config, handshake, merge, build the routing table, then serve until
//! SIGINT/SIGTERM.

use axum::routing::{any, get};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::model::merge;
use crate::routes::{self, BridgeState};
use crate::routing::RoutingTable;
use crate::state::StartupState;

/// Runs `INIT -> LOADING_CONFIG -> HANDSHAKING -> READY` (or `EXIT` on
/// failure) and returns the state an axum router is built from. Does not
/// exit the process itself — callers (the binary's `main`) decide how a
/// fatal startup error is reported.
pub async fn bootstrap(config: BridgeConfig) -> Result<BridgeState, BridgeError> {
    info!(state = StartupState::LoadingConfig.label(), adapters = config.adapters.len(), "loading configuration");

    info!(state = StartupState::Handshaking.label(), "starting adapter handshake");
    let handshakes = crate::handshake::handshake_all(&config.adapters).await?;
    let merged = merge(&handshakes)?;
    let routing = RoutingTable::build(&merged.routes, &config.adapters);

    info!(
        state = StartupState::Ready.label(),
        group_types = merged.routes.keys().cloned().collect::<Vec<_>>().join(","),
        "bridge ready"
    );

    Ok(BridgeState {
        composite: std::sync::Arc::new(merged),
        routes: std::sync::Arc::new(routing),
        client: reqwest::Client::new(),
        base_url_fallback: config.http.base_url.clone(),
        api_key: config.http.api_key.clone(),
    })
}

pub fn router(state: BridgeState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/model", get(routes::model))
        .route("/capabilities", get(routes::capabilities))
        .route("/health", get(routes::health))
        .fallback(any(routes::forward))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bootstraps and serves the Bridge until SIGINT/SIGTERM. On a fatal
/// startup error (duplicate group-type, unreachable adapter), logs the
/// failure and returns the error so `main` can exit non-zero (spec §4.9
/// `EXIT` transitions).
pub async fn serve(config: BridgeConfig) -> Result<(), BridgeError> {
    info!(state = StartupState::Init.label(), "bridge starting");
    let state = match bootstrap(config.clone()).await {
        Ok(state) => state,
        Err(err) => {
            error!(state = StartupState::Exit.label(), error = %err, "bridge startup failed");
            return Err(err);
        }
    };

    let app = router(state);
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BridgeError::ServiceUnavailable(format!("failed to bind {addr}: {e}")))?;
    info!(%addr, "bridge listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| BridgeError::ServiceUnavailable(e.to_string()))?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };
    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
