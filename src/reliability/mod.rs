pub mod backup;
pub mod degradation;
pub mod rate_limit;
pub mod retry;

pub use backup::{BackupDocument, BackupManager};
pub use degradation::DegradationRegistry;
pub use rate_limit::{RateLimitOutcome, RateLimiter};
pub use retry::{with_retry, RetryConfig};
