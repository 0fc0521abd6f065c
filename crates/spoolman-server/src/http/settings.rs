// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use spoolman_api::{ApiError, Message, SettingDto};
use spoolman_model::{parse_setting_key, EventType, ResourceKind};

use super::{error_response, serve_subscription, store_error_response};
use crate::AppState;

/// Values are opaque JSON documents; cap the serialized size rather than
/// interpret them.
const SETTING_VALUE_MAX_LEN: usize = 65_536;

pub(crate) async fn list(
    State(state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    if let Some(ws) = ws {
        let events = state.events.clone();
        return ws.on_upgrade(move |socket| {
            serve_subscription(socket, events, ResourceKind::Setting, None)
        });
    }
    match state.store.list_settings().await {
        Ok(settings) => {
            let dtos: Vec<SettingDto> = settings.iter().map(SettingDto::from).collect();
            Json(dtos).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn get_one(
    State(state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
    Path(key): Path<String>,
) -> Response {
    if let Err(e) = parse_setting_key(&key) {
        return error_response(ApiError::invalid_param("key", &e.to_string()));
    }
    if let Some(ws) = ws {
        let events = state.events.clone();
        return ws.on_upgrade(move |socket| {
            serve_subscription(socket, events, ResourceKind::Setting, Some(key))
        });
    }
    match state.store.get_setting(key).await {
        Ok(setting) => Json(SettingDto::from(&setting)).into_response(),
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn set(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(e) = parse_setting_key(&key) {
        return error_response(ApiError::invalid_param("key", &e.to_string()));
    }
    let value = match serde_json::to_string(&body) {
        Ok(value) => value,
        Err(e) => return error_response(ApiError::invalid_body(e.to_string())),
    };
    if value.len() > SETTING_VALUE_MAX_LEN {
        return error_response(ApiError::validation_failed(
            "value",
            format!("serialized value exceeds {SETTING_VALUE_MAX_LEN} bytes"),
        ));
    }
    match state.store.set_setting(key.clone(), value).await {
        Ok(setting) => {
            let dto = SettingDto::from(&setting);
            state
                .events
                .publish_record(EventType::Updated, ResourceKind::Setting, key, &dto);
            Json(dto).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn unset(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    if let Err(e) = parse_setting_key(&key) {
        return error_response(ApiError::invalid_param("key", &e.to_string()));
    }
    match state.store.unset_setting(key.clone()).await {
        Ok(()) => {
            state.events.publish_record(
                EventType::Deleted,
                ResourceKind::Setting,
                key.clone(),
                &serde_json::json!({ "key": key }),
            );
            Json(Message::new("OK")).into_response()
        }
        Err(e) => store_error_response(e),
    }
}
