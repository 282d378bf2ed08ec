use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter directive used when `TAGALYST_LOG` is unset or invalid
const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber.
///
/// `TAGALYST_LOG` sets the stderr filter (default `warn`). When
/// `TAGALYST_LOG_FILE` names a path, a debug-level file layer is added.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("TAGALYST_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);
    let registry = tracing_subscriber::registry().with(stderr_layer);

    let Some(log_path) = std::env::var("TAGALYST_LOG_FILE").ok() else {
        registry.init();
        return;
    };
    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => {
            let file_layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);
            registry.with(file_layer).init();
            tracing::debug!("File logging enabled: {}", log_path);
        }
        Err(e) => {
            registry.init();
            tracing::warn!("Could not open log file {}: {}", log_path, e);
        }
    }
}
