// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use std::collections::HashMap;

use spoolman_api::{
    parse_spool_find, parse_spool_patch, ApiError, Message, SpoolCreate, SpoolDto, SpoolUseBody,
};
use spoolman_model::{EventType, ResourceKind};
use spoolman_store::NewSpool;

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
            serve_subscription(socket, events, ResourceKind::Spool, None)
        });
    }
    let query = match parse_spool_find(&params, state.config.max_find_limit) {
        Ok(query) => query,
        Err(e) => return error_response(e),
    };
    match state
        .store
        .find_spools(query.filter, query.sort, query.page)
        .await
    {
        Ok((spools, total)) => {
            let dtos: Vec<SpoolDto> = spools.iter().map(SpoolDto::from).collect();
            list_response(total, &dtos)
        }
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn create(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let create: SpoolCreate = match parse_body(body) {
        Ok(create) => create,
        Err(e) => return error_response(e),
    };
    if let Err(e) = create.validate() {
        return error_response(e);
    }
    let new = NewSpool {
        filament_id: create.filament_id,
        price: create.price,
        used_weight: create.used_weight,
        first_used: create.first_used,
        last_used: create.last_used,
        location: create.location,
        lot_nr: create.lot_nr,
        comment: create.comment,
        archived: create.archived,
        extra: create.extra,
    };
    match state.store.create_spool(new).await {
        Ok(spool) => {
            let dto = SpoolDto::from(&spool);
            state
                .events
                .publish_record(EventType::Added, ResourceKind::Spool, spool.id.to_string(), &dto);
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
            serve_subscription(socket, events, ResourceKind::Spool, Some(id.to_string()))
        });
    }
    match state.store.get_spool(id).await {
        Ok(spool) => Json(SpoolDto::from(&spool)).into_response(),
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn patch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let update = match parse_spool_patch(&body) {
        Ok(update) => update,
        Err(e) => return error_response(e),
    };
    match state.store.update_spool(id, update).await {
        Ok(spool) => {
            let dto = SpoolDto::from(&spool);
            state
                .events
                .publish_record(EventType::Updated, ResourceKind::Spool, id.to_string(), &dto);
            Json(dto).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.delete_spool(id).await {
        Ok(spool) => {
            let dto = SpoolDto::from(&spool);
            state
                .events
                .publish_record(EventType::Deleted, ResourceKind::Spool, id.to_string(), &dto);
            Json(Message::new("OK")).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

/// `PUT /spool/{id}/use`: report filament consumption, either as grams
/// used or as a fresh gross weight measurement.
pub(crate) async fn use_weight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let body: SpoolUseBody = match parse_body(body) {
        Ok(body) => body,
        Err(e) => return error_response(e),
    };
    if let Err(e) = body.validate() {
        return error_response(e);
    }
    let result = match (body.use_weight, body.weight) {
        (Some(use_weight), None) => state.store.use_spool_weight(id, use_weight).await,
        (None, Some(weight)) => state.store.measure_spool(id, weight).await,
        _ => return error_response(ApiError::invalid_body("either use_weight or weight is required")),
    };
    match result {
        Ok(spool) => {
            let dto = SpoolDto::from(&spool);
            state
                .events
                .publish_record(EventType::Updated, ResourceKind::Spool, id.to_string(), &dto);
            Json(dto).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MeasureBody {
    weight: f64,
}

/// `PUT /spool/{id}/measure`: dedicated gross-weight measurement endpoint.
pub(crate) async fn measure(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let body: MeasureBody = match parse_body(body) {
        Ok(body) => body,
        Err(e) => return error_response(e),
    };
    if !body.weight.is_finite() {
        return error_response(ApiError::validation_failed("weight", "must be finite"));
    }
    match state.store.measure_spool(id, body.weight).await {
        Ok(spool) => {
            let dto = SpoolDto::from(&spool);
            state
                .events
                .publish_record(EventType::Updated, ResourceKind::Spool, id.to_string(), &dto);
            Json(dto).into_response()
        }
        Err(e) => store_error_response(e),
    }
}
