use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TELEMETRY: OnceLock<()> = OnceLock::new();

/// JSON lines by default; `POA_LOG_FORMAT=compact` switches to the
/// human-readable formatter for local runs.
pub fn init() {
    TELEMETRY.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info"));
        let compact = matches!(std::env::var("POA_LOG_FORMAT").as_deref(), Ok("compact"));
        let registry = tracing_subscriber::registry().with(env_filter);
        if compact {
            registry.with(fmt::layer().compact().with_target(false)).init();
        } else {
            registry
                .with(fmt::layer().json().with_current_span(false).flatten_event(true))
                .init();
        }
    });
}
