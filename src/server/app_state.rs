use std::time::Instant;

use crate::{configs::Config, server::directory::SessionDirectory};

/// Top-level application state.
pub struct AppState {
    pub directory: SessionDirectory,
    pub config: Config,
    pub start_time: Instant,
}
