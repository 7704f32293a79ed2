//! Application state for the API server

use crate::{Config, OutreachEngine};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the engine instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main OutreachEngine instance
    pub engine: Arc<OutreachEngine>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(engine: Arc<OutreachEngine>, config: Arc<Config>) -> Self {
        Self { engine, config }
    }
}
