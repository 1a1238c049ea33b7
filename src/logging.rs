//! Logging setup (§6 ambient stack): `tracing-subscriber` with an
//! `EnvFilter`, writing to a daily-rotated file via `tracing-appender` and,
//! in non-production runs, also to stdout in a human-readable format.
//! Grounded on `init_elk_logging` (registry + EnvFilter +
//! JSON layer), with the ELK/Logstash TCP writer dropped — this process
//! has no log-shipping sidecar to target — in favor of the rotating file
//! appender the rest of the pack uses.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes global tracing. Returns the `WorkerGuard` for the file
/// appender; it must be held for the process lifetime or buffered log
/// lines are dropped on exit.
pub fn init_logging(log_dir: &Path, production: bool) -> WorkerGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = tracing_appender::rolling::daily(log_dir, "guildhub-core.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer().json().with_writer(non_blocking);

    if production {
        tracing_subscriber::registry().with(env_filter).with(file_layer).init();
    } else {
        let stdout_layer = tracing_subscriber::fmt::layer().pretty();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stdout_layer)
            .init();
    }

    guard
}
