#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::Router;
use spoolman_store::Store;

mod config;
mod events;
mod http;

pub use config::{validate_startup_config_contract, ServerConfig};
pub use events::EventBus;

pub const CRATE_NAME: &str = "spoolman-server";

/// Shared handler state. Clones are cheap; the store and event bus are
/// handles onto shared resources.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub events: EventBus,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Store, config: Arc<ServerConfig>) -> Self {
        Self {
            store,
            events: EventBus::new(256),
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    http::build_router(state)
}
