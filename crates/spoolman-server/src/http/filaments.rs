// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use std::collections::HashMap;

use spoolman_api::{
    parse_filament_find, parse_filament_patch, ApiError, FilamentCreate, FilamentDto, Message,
};
use spoolman_model::{parse_color_hex, EventType, ResourceKind};
use spoolman_store::{NewFilament, StoreError};

use super::{error_response, list_response, parse_body, serve_subscription, store_error_response};
use crate::AppState;

pub(crate) async fn list(
    State(state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(ws) = ws {
        let events = state.events.clone();
        return ws.on_upgrade(move |socket| {
            serve_subscription(socket, events, ResourceKind::Filament, None)
        });
    }
    let query = match parse_filament_find(&params, state.config.max_find_limit) {
        Ok(query) => query,
        Err(e) => return error_response(e),
    };
    match state
        .store
        .find_filaments(query.filter, query.sort, query.page)
        .await
    {
        Ok((filaments, total)) => {
            let dtos: Vec<FilamentDto> = filaments.iter().map(FilamentDto::from).collect();
            list_response(total, &dtos)
        }
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn create(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let create: FilamentCreate = match parse_body(body) {
        Ok(create) => create,
        Err(e) => return error_response(e),
    };
    if let Err(e) = create.validate() {
        return error_response(e);
    }
    // Stored in the canonical lowercase no-hash form.
    let color_hex = match create.color_hex.as_deref().map(parse_color_hex).transpose() {
        Ok(color_hex) => color_hex,
        Err(e) => return error_response(ApiError::validation_failed("color_hex", e.to_string())),
    };
    let new = NewFilament {
        name: create.name,
        vendor_id: create.vendor_id,
        material: create.material,
        price: create.price,
        density: create.density,
        diameter: create.diameter,
        weight: create.weight,
        spool_weight: create.spool_weight,
        article_number: create.article_number,
        comment: create.comment,
        settings_extruder_temp: create.settings_extruder_temp,
        settings_bed_temp: create.settings_bed_temp,
        color_hex,
        extra: create.extra,
    };
    match state.store.create_filament(new).await {
        Ok(filament) => {
            let dto = FilamentDto::from(&filament);
            state.events.publish_record(
                EventType::Added,
                ResourceKind::Filament,
                filament.id.to_string(),
                &dto,
            );
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
            serve_subscription(socket, events, ResourceKind::Filament, Some(id.to_string()))
        });
    }
    match state.store.get_filament(id).await {
        Ok(filament) => Json(FilamentDto::from(&filament)).into_response(),
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn patch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let update = match parse_filament_patch(&body) {
        Ok(update) => update,
        Err(e) => return error_response(e),
    };
    match state.store.update_filament(id, update).await {
        Ok(filament) => {
            let dto = FilamentDto::from(&filament);
            state
                .events
                .publish_record(EventType::Updated, ResourceKind::Filament, id.to_string(), &dto);
            Json(dto).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.delete_filament(id).await {
        Ok(filament) => {
            let dto = FilamentDto::from(&filament);
            state
                .events
                .publish_record(EventType::Deleted, ResourceKind::Filament, id.to_string(), &dto);
            Json(Message::new("OK")).into_response()
        }
        Err(StoreError::Conflict(_)) => {
            error_response(ApiError::delete_conflict("filament", &id.to_string()))
        }
        Err(e) => store_error_response(e),
    }
}
