use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the tracing subscriber with env-based filtering.
///
/// Reads `RUST_LOG` (or `LOG_LEVEL`) to set the filter and defaults to
/// `default_level` if neither is set. `LOG_FORMAT=json` switches to one JSON
/// object per line.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_requested(std::env::var("LOG_FORMAT").ok().as_deref()) {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }
}

fn json_requested(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}
