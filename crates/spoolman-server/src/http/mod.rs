// SPDX-License-Identifier: Apache-2.0
//! Route table and the shared response/websocket plumbing.

mod coils;
mod filaments;
mod settings;
mod spools;
mod vendors;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use spoolman_api::{map_error_status, ApiError, ApiErrorCode, HealthDto, InfoDto};
use spoolman_model::ResourceKind;
use spoolman_store::StoreError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::{AppState, EventBus};

pub(crate) fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route(
            "/api/v1/vendor",
            get(vendors::list).post(vendors::create),
        )
        .route(
            "/api/v1/vendor/:id",
            get(vendors::get_one).patch(vendors::patch).delete(vendors::delete),
        )
        .route(
            "/api/v1/filament",
            get(filaments::list).post(filaments::create),
        )
        .route(
            "/api/v1/filament/:id",
            get(filaments::get_one)
                .patch(filaments::patch)
                .delete(filaments::delete),
        )
        .route("/api/v1/spool", get(spools::list).post(spools::create))
        .route(
            "/api/v1/spool/:id",
            get(spools::get_one).patch(spools::patch).delete(spools::delete),
        )
        .route("/api/v1/spool/:id/use", put(spools::use_weight))
        .route("/api/v1/spool/:id/measure", put(spools::measure))
        .route("/api/v1/coil", get(coils::list).post(coils::create))
        .route(
            "/api/v1/coil/:id",
            get(coils::get_one).patch(coils::patch).delete(coils::delete),
        )
        .route("/api/v1/setting", get(settings::list))
        .route(
            "/api/v1/setting/:key",
            get(settings::get_one)
                .post(settings::set)
                .delete(settings::unset),
        )
        .route("/api/v1/health", get(health))
        .route("/api/v1/info", get(info));
    let router = if state.config.client_dist.is_dir() {
        router.fallback_service(ServeDir::new(&state.config.client_dist))
    } else {
        router
    };
    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthDto> {
    Json(HealthDto {
        status: "healthy".to_string(),
    })
}

async fn info(State(state): State<AppState>) -> Json<InfoDto> {
    Json(InfoDto {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_commit: state.config.git_commit.clone(),
        build_date: state.config.build_date.clone(),
        db_type: "sqlite".to_string(),
        data_dir: state.config.data_dir.display().to_string(),
    })
}

pub(crate) fn error_response(err: ApiError) -> Response {
    let status = StatusCode::from_u16(map_error_status(&err))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err)).into_response()
}

pub(crate) fn store_error_response(err: StoreError) -> Response {
    let api = match err {
        StoreError::NotFound { kind, ident } => ApiError::not_found(kind, &ident),
        StoreError::Conflict(msg) => {
            ApiError::new(ApiErrorCode::DeleteConflict, msg, serde_json::json!({}))
        }
        StoreError::InvalidSort(msg) => ApiError::invalid_param("sort", &msg),
        StoreError::Invalid(msg) => ApiError::invalid_body(msg),
        StoreError::Sqlite(msg) | StoreError::Internal(msg) => {
            error!(error = %msg, "store failure");
            ApiError::internal("internal storage error")
        }
    };
    error_response(api)
}

/// Find responses report the pre-pagination match count in a header.
pub(crate) fn list_response<T: Serialize>(total: u64, items: &[T]) -> Response {
    let mut response = Json(items).into_response();
    if let Ok(value) = HeaderValue::from_str(&total.to_string()) {
        response.headers_mut().insert("x-total-count", value);
    }
    response
}

pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(
    body: serde_json::Value,
) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::invalid_body(e.to_string()))
}

/// Streams change events for one resource (optionally one record) to a
/// websocket client. Client text frames get a health reply.
pub(crate) async fn serve_subscription(
    socket: WebSocket,
    bus: EventBus,
    resource: ResourceKind,
    item: Option<String>,
) {
    let mut rx = bus.subscribe();
    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if event.resource != resource {
                        continue;
                    }
                    if let Some(item) = &item {
                        if &event.item_key != item {
                            continue;
                        }
                    }
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, resource = resource.as_str(), "websocket subscriber lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(_))) => {
                    let reply = Message::Text("{\"status\": \"healthy\"}".to_string());
                    if sender.send(reply).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
}
