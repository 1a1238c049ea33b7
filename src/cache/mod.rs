pub mod category;
pub mod engine;
pub mod entry;
pub mod loader;
pub mod metrics;

pub use category::Category;
pub use engine::{build_key, CacheEngine, PreloadSource};
pub use loader::{CacheLoader, LoadableCategory};
pub use metrics::MetricsSnapshot;
