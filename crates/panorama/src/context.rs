//! Shared application context threaded through sync and import operations.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::gateway::ApiGateway;
use crate::jobs::JobQueue;
use crate::status::Broadcaster;
use crate::upstream::UpstreamConfig;

/// Everything a sync or import operation needs: the database, the external
/// API gateway, upstream routes, the work queue and the broadcaster. All
/// collaborators are injected; there is no ambient global state.
pub struct AppContext {
    pub db: DatabaseConnection,
    pub gateway: ApiGateway,
    pub upstream: UpstreamConfig,
    pub queue: Arc<dyn JobQueue>,
    pub broadcaster: Broadcaster,
}

impl AppContext {
    pub fn new(
        db: DatabaseConnection,
        gateway: ApiGateway,
        queue: Arc<dyn JobQueue>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            db,
            gateway,
            upstream: UpstreamConfig::default(),
            queue,
            broadcaster,
        }
    }

    /// Point the context at non-default upstream services (tests, staging).
    #[must_use]
    pub fn with_upstream(mut self, upstream: UpstreamConfig) -> Self {
        self.upstream = upstream;
        self
    }
}
