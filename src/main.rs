//! # signal-relay
//!
//! Signal relay binary: loads settings, starts the static host and
//! WebSocket relay, and runs until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relay_logging::{LogFormat, init_subscriber};
use relay_server::{RelayServer, ServerConfig};
use relay_settings::{RelaySettings, load_settings_from_path, settings_path};

/// Static asset host and WebSocket signaling relay.
#[derive(Parser, Debug)]
#[command(name = "signal-relay", version, about = "Static asset host and WebSocket signaling relay")]
struct Cli {
    /// Settings file (defaults to `./relay.json` when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Directory of static assets.
    #[arg(long)]
    public_dir: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Layer explicit flags over loaded settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = &self.public_dir {
            settings.server.public_dir = dir.display().to_string();
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(settings_path);
    let mut loaded = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut loaded.settings);

    init_subscriber(&loaded.settings.logging.level, loaded.settings.logging.format);
    loaded.log_rejected();
    tracing::debug!(settings = ?loaded.settings, "settings resolved");

    let server = RelayServer::new(ServerConfig::from_settings(&loaded.settings));
    let (_addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if !server.shutdown().graceful_shutdown(handle, None).await {
        tracing::warn!("some sessions did not close in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["signal-relay"]);
        let mut settings = RelaySettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.server.public_dir, "public");
        assert_eq!(settings.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn cli_flags_override_settings() {
        let cli = Cli::parse_from([
            "signal-relay",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--public-dir",
            "/srv/www",
            "--json-logs",
        ]);
        let mut settings = RelaySettings::default();
        settings.server.port = 4000;
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.public_dir, "/srv/www");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn cli_config_path() {
        let cli = Cli::parse_from(["signal-relay", "--config", "/etc/relay.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/relay.json")));
    }

    #[test]
    fn cli_rejects_bad_port() {
        assert!(Cli::try_parse_from(["signal-relay", "--port", "70000"]).is_err());
    }

    #[test]
    fn cli_debug_assert() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
