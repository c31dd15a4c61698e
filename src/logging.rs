use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "YT_OPTIMIZE_LOG";
const DEFAULT_FILTER: &str = "warn";

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Filter directive from `YT_OPTIMIZE_LOG`, or `warn` when unset or blank.
pub fn filter_spec() -> String {
    std::env::var(LOG_ENV)
        .ok()
        .map(|spec| spec.trim().to_string())
        .filter(|spec| !spec.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Installs a stderr fmt subscriber. Calling it again is a no-op, and an
/// already-installed global subscriber is left in place.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_new(filter_spec())
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init();
    });
}
