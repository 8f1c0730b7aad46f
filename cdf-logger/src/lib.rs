use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use tracing_subscriber::util::TryInitError;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set, otherwise `CDF_LOG_LEVEL` picks the filter.
/// Fails instead of panicking when a subscriber is already installed.
pub fn init() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(&cdf_config::CONFIG.log_level))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log_level.to_ascii_uppercase().as_str() {
            "ERROR" => "error",
            "WARN" => "warn",
            "DEBUG" => "debug",
            "TRACE" => "trace",
            _ => "info",
        };
        EnvFilter::new(level)
    })
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::*;

    #[test]
    fn second_init_reports_error() {
        let _ = init();
        assert!(init().is_err());
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert_eq!(env_filter("verbose").max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(env_filter("debug").max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
