//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::api;
use crate::config::TlsConfig;
use crate::state::AppState;

/// Routes for the REST tables, the admin API and the web bundle
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rest/v1/{table}", get(api::query_table))
        .route("/api/reload", post(api::reload))
        .route("/api/config", get(api::get_config))
        // Static files (WASM frontend) - must be fallback for root
        .fallback_service(ServeDir::new(&state.config.server.web_root))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the web server (HTTP or HTTPS depending on config)
pub async fn run(state: Arc<AppState>, bind: &str, tls: Option<&TlsConfig>) -> Result<()> {
    let app = router(state);

    if let Some(tls_config) = tls {
        run_https(app, bind, tls_config).await
    } else {
        run_http(app, bind).await
    }
}

async fn run_http(app: Router, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_https(app: Router, bind: &str, tls: &TlsConfig) -> Result<()> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::path::Path;

    for (what, path) in [("certificate", &tls.cert), ("key", &tls.key)] {
        if !Path::new(path).exists() {
            anyhow::bail!("TLS {} file not found: {}", what, path);
        }
    }

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
    let addr: std::net::SocketAddr = bind.parse()?;
    info!(address = %bind, protocol = "HTTPS", cert = %tls.cert, "Starting web server with TLS");

    axum_server::bind_rustls(addr, rustls_config)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
