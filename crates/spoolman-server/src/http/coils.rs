// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use std::collections::HashMap;

use spoolman_api::{parse_coil_find, parse_coil_patch, CoilCreate, CoilDto, Message};
use spoolman_model::{EventType, ResourceKind};
use spoolman_store::NewCoil;

use super::{error_response, list_response, parse_body, serve_subscription, store_error_response};
use crate::AppState;

pub(crate) async fn list(
    State(state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(ws) = ws {
        let events = state.events.clone();
        return ws
            .on_upgrade(move |socket| serve_subscription(socket, events, ResourceKind::Coil, None));
    }
    let query = match parse_coil_find(&params, state.config.max_find_limit) {
        Ok(query) => query,
        Err(e) => return error_response(e),
    };
    match state
        .store
        .find_coils(query.filter, query.sort, query.page)
        .await
    {
        Ok((coils, total)) => {
            let dtos: Vec<CoilDto> = coils.iter().map(CoilDto::from).collect();
            list_response(total, &dtos)
        }
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn create(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let create: CoilCreate = match parse_body(body) {
        Ok(create) => create,
        Err(e) => return error_response(e),
    };
    if let Err(e) = create.validate() {
        return error_response(e);
    }
    let new = NewCoil {
        name: create.name,
        vendor_id: Some(create.vendor_id),
        weight: create.weight,
        comment: create.comment,
        extra: create.extra,
    };
    match state.store.create_coil(new).await {
        Ok(coil) => {
            let dto = CoilDto::from(&coil);
            state
                .events
                .publish_record(EventType::Added, ResourceKind::Coil, coil.id.to_string(), &dto);
            Json(dto).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn get_one(
    State(state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
    Path(id): Path<i64>,
) -> Response {
    if let Some(ws) = ws {
        let events = state.events.clone();
        return ws.on_upgrade(move |socket| {
            serve_subscription(socket, events, ResourceKind::Coil, Some(id.to_string()))
        });
    }
    match state.store.get_coil(id).await {
        Ok(coil) => Json(CoilDto::from(&coil)).into_response(),
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn patch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let update = match parse_coil_patch(&body) {
        Ok(update) => update,
        Err(e) => return error_response(e),
    };
    match state.store.update_coil(id, update).await {
        Ok(coil) => {
            let dto = CoilDto::from(&coil);
            state
                .events
                .publish_record(EventType::Updated, ResourceKind::Coil, id.to_string(), &dto);
            Json(dto).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.delete_coil(id).await {
        Ok(coil) => {
            let dto = CoilDto::from(&coil);
            state
                .events
                .publish_record(EventType::Deleted, ResourceKind::Coil, id.to_string(), &dto);
            Json(Message::new("OK")).into_response()
        }
        Err(e) => store_error_response(e),
    }
}
