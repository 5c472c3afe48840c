mod messages;
mod users;

use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/users/", post(users::register).get(users::list_users))
        .route("/token", post(users::login))
        .route("/messages/", post(messages::send_message))
        .route("/messages/inbox/", get(messages::inbox))
        .route("/messages/outbox/", get(messages::outbox))
        .route("/messages/{message_id}/read", put(messages::mark_read))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
