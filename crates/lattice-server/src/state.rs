//! Shared application state for the HTTP server.

use std::sync::Arc;

use lattice_core::WorldRegistry;
use lattice_core::config::LimitsConfig;

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Every world in the process.
    pub registry: Arc<WorldRegistry>,
    /// Limits applied to world creation.
    pub limits: LimitsConfig,
}

impl AppState {
    /// Bundle a registry with creation limits.
    pub const fn new(registry: Arc<WorldRegistry>, limits: LimitsConfig) -> Self {
        Self { registry, limits }
    }
}
