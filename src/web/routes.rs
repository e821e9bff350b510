use axum::{
    routing::{any, delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers;
use super::ws::ws_handler;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        // WebSocket endpoint for real-time events
        .route("/ws", any(ws_handler))
        // Camera registry
        .route("/cameras", get(handlers::list_cameras))
        .route("/camera/add", post(handlers::add_camera))
        .route("/camera/:name", delete(handlers::remove_camera))
        .route(
            "/camera/:name/settings",
            get(handlers::get_camera_settings).post(handlers::update_camera_settings),
        )
        .route("/camera_status", get(handlers::camera_status))
        .route("/motion_alerts", get(handlers::motion_alerts))
        // Recording flags and files
        // `:name` is a camera for GET and a recording file name for DELETE
        .route(
            "/recording/:name",
            get(handlers::recording_status).delete(handlers::delete_recording),
        )
        .route("/recording/:name/:action", post(handlers::control_recording))
        .route("/recordings", get(handlers::list_recordings))
        // Viewers and system
        .route("/stream/clients", get(handlers::stream_clients))
        .route("/system_stats", get(handlers::system_stats))
        .route("/system/restart", post(handlers::system_restart));

    Router::new()
        .nest("/api", api_routes)
        .route("/video_feed/:name", get(handlers::video_feed))
        .nest_service("/recordings", ServeDir::new(state.recordings_dir()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
