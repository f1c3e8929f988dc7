use tracing_subscriber::{fmt, EnvFilter};

/// Initializes tracing from `RUST_LOG` (default `info`). Setting
/// `NEXA_LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("NEXA_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
