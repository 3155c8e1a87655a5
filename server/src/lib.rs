//! Real-time chat delivery server: presence, rooms, message fan-out and the
//! streaming assistant pipeline, behind one HTTP/WebSocket surface.

pub mod assistant;
pub mod auth;
pub mod config;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod models;
pub mod realtime;
pub mod store;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config, delivery::DeliveryService, realtime::GatewayState, store::ChatStore,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ChatStore>,
    pub gateway: Arc<GatewayState>,
    pub delivery: Arc<DeliveryService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(realtime::ws_handler))
        .route("/message/send", post(handlers::send_message))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}
