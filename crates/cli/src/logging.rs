use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use lc_domain::config::LoggingConfig;

/// Install the global subscriber. Logs go to stderr so stdout carries only
/// the conversation. `RUST_LOG` wins over `[logging] filter`.
pub fn init_tracing(cfg: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.effective_filter()));

    let registry = tracing_subscriber::registry().with(env_filter);
    if cfg.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
