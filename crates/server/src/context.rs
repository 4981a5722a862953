use std::sync::{Arc, OnceLock};

use serde::Serialize;

use restkit_observability::LogContext;

use crate::config::ServerConfig;

/// One row of the index listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub endpoint: String,
    pub methods: Vec<String>,
    pub url: String,
    pub docs: Option<String>,
}

/// State shared by a server's built-in endpoints and its router.
///
/// Cheap to clone. The route table is filled once, when the router is built.
#[derive(Debug, Clone)]
pub struct ServerContext {
    app_name: Arc<str>,
    config: Arc<ServerConfig>,
    logs: LogContext,
    routes: Arc<OnceLock<Vec<RouteInfo>>>,
}

impl ServerContext {
    pub fn new(app_name: impl Into<Arc<str>>, config: ServerConfig, logs: LogContext) -> Self {
        Self {
            app_name: app_name.into(),
            config: Arc::new(config),
            logs,
            routes: Arc::new(OnceLock::new()),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn logs(&self) -> &LogContext {
        &self.logs
    }

    /// Routes as published by the router; empty before it is built.
    pub fn routes(&self) -> &[RouteInfo] {
        self.routes.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn publish_routes(&self, routes: Vec<RouteInfo>) {
        if self.routes.set(routes).is_err() {
            tracing::warn!(app = %self.app_name, "route table already published");
        }
    }
}
