use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::{
    server::AppState,
    transport::{
        middleware::{add_response_headers, check_auth},
        routes,
        websocket_server::websocket_handler,
    },
};

const API_V1: &str = "/v1";

pub fn router(state: Arc<AppState>) -> Router {
    let v1_routes = Router::new()
        .route("/parties", post(routes::create_party))
        .route("/parties/{code}", get(routes::get_party))
        .route("/parties/{code}/ws", get(websocket_handler))
        .route(
            "/parties/{code}/members/{user_id}",
            delete(routes::remove_member),
        )
        .route("/info", get(routes::get_info))
        .route("/stats", get(routes::get_stats));

    Router::new()
        .nest(API_V1, v1_routes)
        .route("/version", get(routes::get_version))
        .layer(middleware::from_fn_with_state(state.clone(), check_auth))
        .layer(middleware::from_fn(add_response_headers))
        .with_state(state)
}
