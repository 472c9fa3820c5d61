use crate::cli::TracingFormat;
use crate::config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Build the default filter: our own crate at `base_level`, HTTP plumbing quieter.
fn default_filter(base_level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "warn,relink={base_level},tower_http=info"
    ))
}

/// Configure and initialize logging for the application.
///
/// `RUST_LOG`, when set, replaces the default filter entirely.
pub fn setup_logging(config: &Config, tracing_format: TracingFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&config.log_level));

    match tracing_format {
        TracingFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true).compact())
                .init();
        }
        TracingFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .json()
                        .flatten_event(true)
                        .with_current_span(true),
                )
                .init();
        }
    }
}
