mod notifications;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(notifications::notifications_handler))
        .route("/ws/", get(notifications::notifications_handler))
}
