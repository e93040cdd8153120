//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Fails if a
/// recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket connections closed (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Connections closed because a reliable frame hit a full send queue (counter).
pub const WS_EVICTIONS_TOTAL: &str = "ws_evictions_total";
/// Live connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Inbound events handled by the engine (counter, labels: event).
pub const RELAY_EVENTS_TOTAL: &str = "relay_events_total";
/// Inbound frames dropped before reaching the engine (counter, labels: kind).
pub const RELAY_MALFORMED_TOTAL: &str = "relay_malformed_total";
/// Outbound events delivered to a send queue (counter, labels: event).
pub const RELAY_OUTBOUND_TOTAL: &str = "relay_outbound_total";
/// Outbound frames dropped because a send queue was full (counter).
pub const RELAY_DELIVERY_DROPS_TOTAL: &str = "relay_delivery_drops_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_names_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_EVICTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            RELAY_EVENTS_TOTAL,
            RELAY_MALFORMED_TOTAL,
            RELAY_OUTBOUND_TOTAL,
            RELAY_DELIVERY_DROPS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
