// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use std::collections::HashMap;

use spoolman_api::{parse_vendor_find, parse_vendor_patch, ApiError, Message, VendorCreate, VendorDto};
use spoolman_model::{EventType, ResourceKind};
use spoolman_store::{NewVendor, StoreError};

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
            serve_subscription(socket, events, ResourceKind::Vendor, None)
        });
    }
    let query = match parse_vendor_find(&params, state.config.max_find_limit) {
        Ok(query) => query,
        Err(e) => return error_response(e),
    };
    match state
        .store
        .find_vendors(query.filter, query.sort, query.page)
        .await
    {
        Ok((vendors, total)) => {
            let dtos: Vec<VendorDto> = vendors.iter().map(VendorDto::from).collect();
            list_response(total, &dtos)
        }
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn create(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let create: VendorCreate = match parse_body(body) {
        Ok(create) => create,
        Err(e) => return error_response(e),
    };
    if let Err(e) = create.validate() {
        return error_response(e);
    }
    let new = NewVendor {
        name: create.name,
        comment: create.comment,
        extra: create.extra,
    };
    match state.store.create_vendor(new).await {
        Ok(vendor) => {
            let dto = VendorDto::from(&vendor);
            state
                .events
                .publish_record(EventType::Added, ResourceKind::Vendor, vendor.id.to_string(), &dto);
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
            serve_subscription(socket, events, ResourceKind::Vendor, Some(id.to_string()))
        });
    }
    match state.store.get_vendor(id).await {
        Ok(vendor) => Json(VendorDto::from(&vendor)).into_response(),
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn patch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let update = match parse_vendor_patch(&body) {
        Ok(update) => update,
        Err(e) => return error_response(e),
    };
    match state.store.update_vendor(id, update).await {
        Ok(vendor) => {
            let dto = VendorDto::from(&vendor);
            state
                .events
                .publish_record(EventType::Updated, ResourceKind::Vendor, id.to_string(), &dto);
            Json(dto).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.delete_vendor(id).await {
        Ok(vendor) => {
            let dto = VendorDto::from(&vendor);
            state
                .events
                .publish_record(EventType::Deleted, ResourceKind::Vendor, id.to_string(), &dto);
            Json(Message::new("OK")).into_response()
        }
        Err(StoreError::Conflict(_)) => {
            error_response(ApiError::delete_conflict("vendor", &id.to_string()))
        }
        Err(e) => store_error_response(e),
    }
}
