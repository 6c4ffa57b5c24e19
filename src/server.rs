//! ==============================================================================
//! server.rs - ingestion hub http api
//! ==============================================================================
//!
//! routes:
//!     POST /api/sensor-data   device push  -> {"status": "success"}
//!     GET  /api/current-data  latest reading
//!     GET  /api/history       bounded history, oldest first
//!     GET  /health            liveness probe
//!
//! cors is fully permissive and there is no auth: the hub lives on the farm lan.
//!
//! ==============================================================================

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::domain::{Reading, SensorPayload};
use crate::error::IngestError;
use crate::history::History;
use crate::store::ReadingStore;

#[derive(Clone)]
pub struct ServerState {
    pub store: ReadingStore,
    /// log every accepted reading at info level
    pub show_sensor_data: bool,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/sensor-data", post(ingest_handler))
        .route("/api/current-data", get(current_handler))
        .route("/api/history", get(history_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// bind up front so a taken port fails startup instead of a background task
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind ingestion hub on {}", addr))
}

pub async fn run_server(state: ServerState, listener: TcpListener) -> Result<()> {
    info!("ingestion hub listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn ingest_handler(
    State(state): State<ServerState>,
    body: Result<Json<SensorPayload>, JsonRejection>,
) -> Result<Json<Value>, IngestError> {
    let Json(payload) = body.map_err(|rejection| {
        debug!("rejected push body: {}", rejection.body_text());
        IngestError::InvalidBody(rejection.body_text())
    })?;

    let reading = state.store.ingest(&payload).await.map_err(|e| {
        debug!("rejected push: {}", e);
        e
    })?;

    if state.show_sensor_data {
        info!(
            "received: temp {:.1}°C | humidity {:.1}% | soil {:.1}%",
            reading.temperature, reading.humidity, reading.soil_moisture
        );
    }
    Ok(Json(json!({ "status": "success" })))
}

async fn current_handler(State(state): State<ServerState>) -> Json<Reading> {
    Json(state.store.current().await)
}

async fn history_handler(State(state): State<ServerState>) -> Json<History> {
    Json(state.store.history().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(store: ReadingStore) -> Router {
        router(ServerState { store, show_sensor_data: false })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn push(body: Value) -> Request<Body> {
        push_raw(&body.to_string())
    }

    fn push_raw(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/sensor-data")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_push_then_read_back() {
        let store = ReadingStore::default();

        let (status, body) =
            send(app(store.clone()), push(json!({"temperature": 23.4, "humidity": 58, "soilMoisture": "74"})))
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success"}));

        let (status, current) = send(app(store.clone()), get_req("/api/current-data")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(current["temperature"], json!(23.4));
        assert_eq!(current["humidity"], json!(58.0));
        assert_eq!(current["soilMoisture"], json!(74.0));
        assert!(current["timestamp"].is_string());

        let (_, history) = send(app(store), get_req("/api/history")).await;
        assert_eq!(history.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_malformed_push_is_rejected() {
        let store = ReadingStore::default();

        let (status, body) =
            send(app(store.clone()), push(json!({"temperature": "abc", "humidity": 1, "soilMoisture": 2})))
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], json!("error"));

        let (status, _) = send(app(store.clone()), push(json!({"humidity": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, history) = send(app(store), get_req("/api/history")).await;
        assert_eq!(history, json!([]));
    }

    #[tokio::test]
    async fn test_non_object_bodies_get_json_400() {
        let store = ReadingStore::default();

        for body in ["[1,2,3]", "[21.0, 40.0, 66.0]", "null", "42", "{not json", ""] {
            let (status, reply) = send(app(store.clone()), push_raw(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", body);
            assert_eq!(reply["status"], json!("error"), "body {:?}", body);
            assert!(reply["message"].is_string());
        }

        let (_, history) = send(app(store.clone()), get_req("/api/history")).await;
        assert_eq!(history, json!([]));
        let (_, current) = send(app(store), get_req("/api/current-data")).await;
        assert_eq!(current["temperature"], json!(0.0));
    }

    #[tokio::test]
    async fn test_bind_reports_taken_port() {
        let first = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let taken = first.local_addr().unwrap();
        assert!(bind(taken).await.is_err());
    }

    #[tokio::test]
    async fn test_current_before_any_push_is_zeroed() {
        let (status, current) = send(app(ReadingStore::default()), get_req("/api/current-data")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(current["temperature"], json!(0.0));
        assert_eq!(current["soilMoisture"], json!(0.0));
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(ReadingStore::default()).oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
