//! REST API handlers

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use vuestock_core::{QueryError, TableNames, TableQuery};

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ApiError::new(msg))).into_response()
}

/// Read rows of one table, PostgREST style:
/// `GET /rest/v1/{table}?select=*&rack_id=eq.1&order=display_order.asc`
pub async fn query_table(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let query = match TableQuery::parse(&table, query.as_deref().unwrap_or_default()) {
        Ok(query) => query,
        Err(e) => {
            warn!(table = %table, error = %e, "Rejected query");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    match state.store.read().await.query(&query) {
        Ok(rows) => {
            debug!(table = %table, rows = rows.len(), "Query served");
            Json(rows).into_response()
        }
        Err(e @ QueryError::UnknownTable(_)) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// Row counts after a reload
#[derive(Serialize)]
pub struct ReloadSummary {
    pub racks: usize,
    pub levels: usize,
    pub slots: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Re-read the seed file
pub async fn reload(State(state): State<Arc<AppState>>) -> Response {
    if let Err(e) = state.reload().await {
        warn!(error = %e, "Reload failed");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Reload failed: {}", e));
    }

    let tables = &state.config.backend.tables;
    let store = state.store.read().await;
    Json(ReloadSummary {
        racks: store.row_count(&tables.racks),
        levels: store.row_count(&tables.levels),
        slots: store.row_count(&tables.slots),
        loaded_at: store.loaded_at(),
    })
    .into_response()
}

/// Backend settings the frontend needs
#[derive(Serialize)]
pub struct ConfigInfo {
    pub tables: TableNames,
    pub rest_prefix: &'static str,
}

/// Get current configuration
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ConfigInfo {
        tables: state.config.backend.tables.clone(),
        rest_prefix: "/rest/v1",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::router;
    use crate::store::TableStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    const SEED: &str = r#"
[[racks]]
id = 1
rack_code = "A1"

[[levels]]
id = 10
rack_id = 1
display_order = 1

[[levels]]
id = 11
rack_id = 1
display_order = 0
"#;

    fn test_state() -> Arc<AppState> {
        let config = Config::default();
        let store = TableStore::from_seed_str(&config.backend.tables, SEED).unwrap();
        Arc::new(AppState {
            config,
            store: RwLock::new(store),
        })
    }

    async fn get(uri: &str) -> (StatusCode, Value) {
        let response = router(test_state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_levels_endpoint() {
        let (status, body) = get(
            "/rest/v1/w_vuestock_levels?select=*&rack_id=eq.1&is_active=eq.true&order=display_order.asc",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![11, 10]);
    }

    #[tokio::test]
    async fn test_unknown_table_is_404() {
        let (status, body) = get("/rest/v1/users").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("users"));
    }

    #[tokio::test]
    async fn test_bad_query_is_400() {
        let (status, _) = get("/rest/v1/w_vuestock_racks?width=gt.3").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_config_endpoint() {
        let (status, body) = get("/api/config").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tables"]["racks"], "w_vuestock_racks");
    }
}
