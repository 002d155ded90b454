use std::sync::Arc;

use amend_core::engine::ChangeEngine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The batch change & revert engine, wired to its stores.
    pub engine: Arc<ChangeEngine>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
