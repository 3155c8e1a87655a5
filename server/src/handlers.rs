//! HTTP handlers. The socket endpoint lives in `realtime::gateway`.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::{
    auth::AuthUser,
    delivery::{DeliveryService, SendMessageInput, SendMessageOutput},
    error::ApiResult,
};

/// `POST /message/send`. Returns once delivery (and the assistant reply,
/// for AI chats) has completed.
pub async fn send_message(
    State(delivery): State<Arc<DeliveryService>>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<SendMessageInput>,
) -> ApiResult<Json<SendMessageOutput>> {
    let output = delivery.send(&user_id, input).await?;
    Ok(Json(output))
}

pub async fn health() -> &'static str {
    "ok"
}
