//! Graceful degradation registry (§4.D): tracks a degraded flag per
//! service and dispatches to a fallback when the primary call fails or the
//! service has been explicitly degraded. Grounded on the
//! Redis-primary/in-memory-fallback shape of `rate_limit.rs`, generalized
//! from "one hardcoded fallback" into a named registry.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;

use tracing::warn;

#[derive(Default)]
pub struct DegradationRegistry {
    degraded: Mutex<HashSet<String>>,
}

impl DegradationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_degraded(&self, service: &str) {
        self.degraded.lock().expect("lock poisoned").insert(service.to_string());
    }

    pub fn mark_restored(&self, service: &str) {
        self.degraded.lock().expect("lock poisoned").remove(service);
    }

    pub fn is_degraded(&self, service: &str) -> bool {
        self.degraded.lock().expect("lock poisoned").contains(service)
    }

    /// Invokes `primary`; on failure (or if `service` is already marked
    /// degraded) falls back to `fallback` instead of propagating the error.
    pub async fn execute_with_fallback<T, E, P, PFut, F, FFut>(
        &self,
        service: &str,
        primary: P,
        fallback: F,
    ) -> Result<T, E>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, E>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, E>>,
    {
        if self.is_degraded(service) {
            return fallback().await;
        }
        match primary().await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(service, "primary call failed, invoking fallback");
                let _ = &err;
                fallback().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_when_service_is_marked_degraded() {
        let registry = DegradationRegistry::new();
        registry.mark_degraded("chat-platform");
        let result: Result<&str, &str> = registry
            .execute_with_fallback(
                "chat-platform",
                || async { Ok("primary") },
                || async { Ok("fallback") },
            )
            .await;
        assert_eq!(result, Ok("fallback"));
    }

    #[tokio::test]
    async fn falls_back_when_primary_errors() {
        let registry = DegradationRegistry::new();
        let result: Result<&str, &str> = registry
            .execute_with_fallback(
                "store",
                || async { Err("boom") },
                || async { Ok("fallback") },
            )
            .await;
        assert_eq!(result, Ok("fallback"));
    }

    #[tokio::test]
    async fn uses_primary_when_healthy() {
        let registry = DegradationRegistry::new();
        let result: Result<&str, &str> = registry
            .execute_with_fallback(
                "store",
                || async { Ok("primary") },
                || async { Ok("fallback") },
            )
            .await;
        assert_eq!(result, Ok("primary"));
    }

    #[test]
    fn mark_restored_clears_degraded_flag() {
        let registry = DegradationRegistry::new();
        registry.mark_degraded("store");
        assert!(registry.is_degraded("store"));
        registry.mark_restored("store");
        assert!(!registry.is_degraded("store"));
    }
}
