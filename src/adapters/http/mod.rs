pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use crate::adapters::http::state::HttpState;
use crate::adapters::http::ws::ws_handler;

pub fn router(state: HttpState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/config", get(routes::get_config))
        .route("/api/models/:task", get(routes::list_models))
        .route("/api/sessions", post(routes::create_session))
        .route(
            "/api/sessions/:id",
            get(routes::get_session).put(routes::update_session).delete(routes::delete_session),
        )
        .route("/api/sessions/:id/image", post(routes::detect_image))
        .route("/api/sessions/:id/video", post(routes::upload_video))
        .route("/ws/sessions/:id/stream", get(ws_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
