//! Application state for the HTTP server.

use uuid::Uuid;

use crate::services::SiteSession;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Catalog, action controller and gateway
    pub session: SiteSession,
    /// Changes on every restart so pages can tell their indices are gone
    pub instance_id: Uuid,
}

impl AppState {
    /// Create a new application state around the given session.
    pub fn new(session: SiteSession) -> Self {
        Self {
            session,
            instance_id: Uuid::new_v4(),
        }
    }
}
