// [libs/shared/observability/src/tracing_init.rs]
//! Structured logging setup and global panic capture.

use std::panic;

use tracing::{error, info, instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the process-wide tracing subscriber and installs a panic
/// hook that logs panics through the same pipeline instead of only
/// printing to stderr.
///
/// In debug builds this installs a compact, human-readable formatter;
/// in release builds it emits flattened JSON suitable for log
/// aggregation. The default filter directive can be overridden with
/// `RUST_LOG`.
///
/// # Panics
/// Panics if a global subscriber has already been installed.
#[instrument(skip_all)]
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cfg!(debug_assertions) { "debug" } else { "info" };
        format!("{service_name}={level},tower_http=warn,hyper=warn,libsql=error").into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    let service = service_name.to_string();
    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");

        error!(target: "panic", service = %service, location = %location, "panic: {payload}");
    }));

    info!("tracing initialized for {service_name}");
}
