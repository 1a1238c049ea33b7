//! The root dependency-injection context (§9 Design Notes: "pass shared
//! services as explicit dependencies instead of module-level mutables").
//! Grounded on `state.rs` (`AppState { db, ws_state }`,
//! `Clone` + constructor), generalized here to the full set of services a
//! command/event handler needs.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheEngine, CacheLoader};
use crate::config::Config;
use crate::events::EventLocks;
use crate::reliability::{DegradationRegistry, RateLimiter};
use crate::scheduler::Scheduler;
use crate::store::StoreGateway;
use crate::translation::Bundle;

/// Bundles every shared service a command handler, reaction handler, or
/// scheduled callback needs. Cheap to `Clone` (everything inside is an
/// `Arc`), so handlers take `AppState` by value rather than threading
/// individual `Arc<T>` parameters.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<StoreGateway>,
    pub cache: Arc<CacheEngine>,
    pub loader: Arc<CacheLoader>,
    pub degradation: Arc<DegradationRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub event_locks: Arc<EventLocks>,
    pub translations: Arc<Bundle>,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<StoreGateway>,
        cache: Arc<CacheEngine>,
        loader: Arc<CacheLoader>,
        translations: Arc<Bundle>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute, Duration::from_secs(300)));
        Self {
            config,
            store,
            cache,
            loader,
            degradation: Arc::new(DegradationRegistry::new()),
            rate_limiter,
            event_locks: Arc::new(EventLocks::new()),
            translations,
            scheduler,
        }
    }
}
