use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{common::ApiError, server::AppState};

/// Shared-secret check on every route. An empty configured password disables it.
pub async fn check_auth(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let password = &state.config.server.password;
    if password.is_empty() {
        return next.run(req).await;
    }

    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header {
        Some(auth) if auth == password => next.run(req).await,
        Some(_) => {
            warn!("Authorization failed: invalid password for {}", req.uri().path());
            ApiError::unauthorized(req.uri().path()).into_response()
        }
        None => {
            warn!("Authorization failed: missing Authorization header for {}", req.uri().path());
            ApiError::unauthorized(req.uri().path()).into_response()
        }
    }
}

pub async fn add_response_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response.headers_mut().insert(
        "Watchparty-Version",
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}
