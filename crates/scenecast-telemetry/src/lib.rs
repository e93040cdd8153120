mod metrics;

pub use metrics::*;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default filter directive (e.g. `info` or `scenecast_engine=debug`).
    /// Overridden by the `RUST_LOG` env var.
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// Build the filter: `RUST_LOG` first, then the configured directive, then `info`.
pub fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber. Call once at startup.
///
/// A second call leaves the first subscriber in place.
pub fn init_telemetry(config: &TelemetryConfig) {
    let (json_layer, text_layer) = if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true);
        (Some(layer), None)
    } else {
        let layer = tracing_subscriber::fmt::layer().with_target(true);
        (None, Some(layer))
    };

    let result = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(json_layer)
        .with(text_layer)
        .try_init();

    if let Err(e) = result {
        eprintln!("scenecast-telemetry: subscriber already installed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_directive_falls_back() {
        let config = TelemetryConfig {
            log_level: "not a [valid directive".into(),
            json: false,
        };
        // Must not panic regardless of RUST_LOG.
        let _ = env_filter(&config);
    }

    #[test]
    fn init_twice_does_not_panic() {
        let config = TelemetryConfig::default();
        init_telemetry(&config);
        init_telemetry(&TelemetryConfig {
            json: true,
            ..config
        });
        tracing::info!("telemetry initialized");
    }
}
