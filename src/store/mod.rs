pub mod circuit_breaker;
pub mod gateway;
pub mod schema;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use gateway::{GatewayConfig, QueryKind, SqlParam, Statement, StoreGateway};
