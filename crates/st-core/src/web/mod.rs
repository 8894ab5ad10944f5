//! HTTP front: shared state, routing, and the `tiny_http` adapter.

pub mod routes;
pub mod server;

pub use routes::{handle_request, HttpRequest, HttpResponse, Route};
pub use server::{serve, spawn, RunningServer, MAX_BODY_BYTES};

use crate::isp::{HttpIspLookup, IspLookup, NoopIspLookup};
use crate::rate_limit::RateLimiter;
use st_config::{Config, DatabaseConfig, DatabaseModel, IspConfig};
use st_telemetry::{StoreError, TelemetryStore};
use tracing::info;

/// Everything a request handler needs. Built once at startup and shared
/// behind an `Arc`.
pub struct AppState {
    pub config: Config,
    /// `None` when telemetry is disabled.
    pub store: Option<TelemetryStore>,
    pub limiter: RateLimiter,
    pub lookup: Box<dyn IspLookup>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("limiter", &self.limiter)
            .field("lookup", &self.lookup.name())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: Config, store: Option<TelemetryStore>, lookup: Box<dyn IspLookup>) -> Self {
        let limiter = RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window());
        Self {
            config,
            store,
            limiter,
            lookup,
        }
    }

    /// Open the configured store and lookup provider.
    pub fn from_config(config: Config) -> Result<Self, StoreError> {
        let store = open_store(&config.database)?;
        let lookup = lookup_from_config(&config.isp);
        Ok(Self::new(config, store, lookup))
    }
}

/// Open the store selected by `[database]`; `None` for the disabled model.
pub fn open_store(database: &DatabaseConfig) -> Result<Option<TelemetryStore>, StoreError> {
    match database.model {
        DatabaseModel::Sqlite => TelemetryStore::open(&database.path).map(Some),
        DatabaseModel::Memory => TelemetryStore::open_in_memory().map(Some),
        DatabaseModel::None => {
            info!("telemetry storage disabled");
            Ok(None)
        }
    }
}

pub fn lookup_from_config(isp: &IspConfig) -> Box<dyn IspLookup> {
    if isp.enabled {
        Box::new(HttpIspLookup::new(isp.lookup_url.clone(), isp.timeout()))
    } else {
        Box::new(NoopIspLookup)
    }
}
