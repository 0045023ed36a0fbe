use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::EndpointRateLimiter;
use crate::recognition::RecognitionGateway;
use crate::store::ImageStore;

/// The shared application state.
///
/// Cloned into every handler by Axum. All fields are cheap handles to shared data.
#[derive(Clone)]
pub struct AppState {
    /// The image store.
    ///
    /// Mutations (register, rename, delete, delete-all) take the write lock; listing
    /// and recognition take the read lock, so a lookup never sees a half-applied
    /// mutation or an index invalidated underneath it.
    pub store: Arc<RwLock<ImageStore>>,
    /// Lookup front-end for the external recognition backend.
    pub gateway: Arc<RecognitionGateway>,
    /// The immutable application configuration.
    pub config: Arc<AppConfig>,
    /// Request counters.
    pub metrics: Metrics,
    /// Per-endpoint rate limits for the expensive routes.
    pub rate_limiter: EndpointRateLimiter,
}

impl AppState {
    pub fn new(store: ImageStore, gateway: RecognitionGateway, config: AppConfig) -> Self {
        let rate_limiter = EndpointRateLimiter::from_config(&config.rate_limit);
        Self {
            store: Arc::new(RwLock::new(store)),
            gateway: Arc::new(gateway),
            config: Arc::new(config),
            metrics: Metrics::new(),
            rate_limiter,
        }
    }
}
