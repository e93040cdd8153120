use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use scenecast_server::ServerConfig;
use scenecast_telemetry::TelemetryConfig;

/// Scene-scoped presence relay for multiplayer clients.
#[derive(Debug, Parser)]
#[command(name = "scenecast", version)]
struct Cli {
    /// Settings file (defaults to ~/.scenecast/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address, overrides settings and environment
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides settings and environment
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => scenecast_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => scenecast_settings::load_settings().context("failed to load settings")?,
    };
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    scenecast_telemetry::init_telemetry(&TelemetryConfig {
        log_level: settings.logging.level.clone(),
        json: settings.logging.json,
    });

    let metrics = match scenecast_telemetry::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    let config = ServerConfig {
        host: settings.server.host,
        port: settings.server.port,
        max_send_queue: settings.server.max_send_queue,
        heartbeat_interval: Duration::from_millis(settings.server.heartbeat_interval_ms),
        disconnect_scope: settings.relay.disconnect_scope,
        metrics,
    };

    let handle = scenecast_server::start(config)
        .await
        .context("failed to start server")?;
    tracing::info!(addr = %handle.local_addr, "scenecast ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_overrides_parse() {
        let cli = Cli::parse_from(["scenecast", "--port", "5000", "--host", "127.0.0.1"]);
        assert_eq!(cli.port, Some(5000));
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        assert!(cli.config.is_none());
    }
}
