//! Wires an `EcosystemAdapter` into a running HTTP server: route table,
//! middleware chain, and graceful shutdown on SIGINT/SIGTERM (spec §4.10).

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::AdapterConfig;
use crate::routes::{self, AdapterState};
use crate::trait_::EcosystemAdapter;

pub fn router(adapter: Arc<dyn EcosystemAdapter>, config: &AdapterConfig) -> Router {
    let group_type = adapter.group_type();
    let resource_type = adapter.resource_type();
    let state = AdapterState {
        adapter,
        base_url_fallback: config.http.base_url.clone(),
        api_key: config.http.api_key.clone(),
    };

    Router::new()
        .route("/", get(routes::root))
        .route("/model", get(routes::model))
        .route("/capabilities", get(routes::capabilities))
        .route("/health", get(routes::health))
        .route(&format!("/{group_type}"), get(routes::groups_collection))
        .route(&format!("/{group_type}/:groupid"), get(routes::group))
        .route(
            &format!("/{group_type}/:groupid/{resource_type}"),
            get(routes::resources_collection),
        )
        .route(
            &format!("/{group_type}/:groupid/{resource_type}/:resourceid"),
            get(routes::resource),
        )
        .route(
            &format!("/{group_type}/:groupid/{resource_type}/:resourceid/meta"),
            get(routes::meta),
        )
        .route(
            &format!("/{group_type}/:groupid/{resource_type}/:resourceid/versions"),
            get(routes::versions_collection),
        )
        .route(
            &format!("/{group_type}/:groupid/{resource_type}/:resourceid/versions/:versionid"),
            get(routes::version),
        )
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(crate::middleware::request_id_and_logging))
        .with_state(state)
}

/// Binds and serves the adapter's router until SIGINT/SIGTERM, per the
/// readiness contract of spec §4.4 ("adapters MUST serve `/model` and
/// `/capabilities` within their configured readiness window").
pub async fn serve(adapter: Arc<dyn EcosystemAdapter>, config: AdapterConfig) -> anyhow::Result<()> {
    let app = router(adapter, &config);
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "adapter listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
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
