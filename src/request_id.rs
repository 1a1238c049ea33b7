//! Correlation ids (§9 Design Notes: every inbound command/reaction gets
//! one id threaded through its logs). Grounded on `request_id.rs`
//! (`RequestId` newtype + `X-Request-ID` propagation),
//! re-expressed here as a `tracing` span field since this process has no
//! HTTP request/response cycle to carry a header through — a gateway
//! event or slash command dispatch plays the same role a request did.

use std::fmt;

use tracing::Span;
use uuid::Uuid;

/// A per-dispatch correlation id, threaded through logs for one command
/// invocation or reaction event so its handling can be traced end to end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Opens a `tracing` span carrying this id as a field, entered for the
    /// duration of handling one dispatch.
    pub fn span(&self, name: &'static str) -> Span {
        tracing::info_span!("dispatch", dispatch_name = name, correlation_id = %self.0)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_dispatches_get_distinct_ids() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_matches_as_str() {
        let id = CorrelationId::new();
        assert_eq!(format!("{id}"), id.as_str());
    }
}
