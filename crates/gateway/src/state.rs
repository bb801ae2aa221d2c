use std::sync::Arc;

use hm_connector::Connector;
use hm_domain::config::Config;
use hm_sessions::SessionStore;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    /// Opens one messaging connection per new session.
    pub connector: Arc<dyn Connector>,
}

impl AppState {
    pub fn new(config: Arc<Config>, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            sessions: Arc::new(SessionStore::new()),
            connector,
        }
    }
}
