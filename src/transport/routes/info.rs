use std::sync::Arc;

use axum::{extract::State, response::Json};

use crate::{party::chat::REACTION_EMOJIS, protocol, server::AppState};

/// GET /v1/info
pub async fn get_info() -> Json<protocol::Info> {
    tracing::debug!("GET /v1/info");
    let version_str = env!("CARGO_PKG_VERSION");
    let (core, pre_release) = match version_str.split_once('-') {
        Some((core, pre)) => (core, Some(pre.to_string())),
        None => (version_str, None),
    };
    let mut parts = core.split('.').map(|s| s.parse().unwrap_or(0));

    Json(protocol::Info {
        version: protocol::Version {
            semver: version_str.to_string(),
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
            pre_release,
        },
        build_time: option_env!("BUILD_TIME")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        git: protocol::GitInfo {
            branch: option_env!("GIT_BRANCH").unwrap_or("unknown").to_string(),
            commit: option_env!("GIT_COMMIT").unwrap_or("unknown").to_string(),
        },
        content_refs: vec![
            "movie:<id>".to_string(),
            "series:<seriesId>:<episodeId>".to_string(),
        ],
        reactions: REACTION_EMOJIS.iter().map(|e| e.to_string()).collect(),
    })
}

/// GET /v1/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<protocol::Stats> {
    tracing::debug!("GET /v1/stats");
    Json(crate::monitoring::collect_stats(&state))
}

/// GET /version
pub async fn get_version() -> String {
    tracing::debug!("GET /version");
    env!("CARGO_PKG_VERSION").to_string()
}
