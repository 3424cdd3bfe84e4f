// MIT License - Copyright (c) 2026 Peter Wright
// ITv2 bridge daemon

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use dsc_tlink_bridge::{
    BridgeConfig, NotificationDispatcher, PanelServer, PanelStateStore, SessionRegistry, WsServer,
};

#[derive(Parser)]
#[command(name = "dsc-tlink-bridge")]
#[command(about = "Bridge between DSC PowerSeries NEO panels (ITv2/TLink) and a WebSocket UI")]
struct Cli {
    /// Path to the persisted JSON configuration file
    #[arg(long, default_value = "persist/config.json")]
    config: String,

    /// Override the panel-link listen port
    #[arg(long)]
    listen_port: Option<u16>,

    /// Override the WebSocket facade port
    #[arg(long)]
    ws_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dsc_tlink_bridge=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = BridgeConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;
    if let Some(port) = cli.listen_port {
        config.listen_port = port;
    }
    if let Some(port) = cli.ws_port {
        config.ws_port = port;
    }
    config
        .validate()
        .context("Configuration is incomplete; set integration_id and an access code")?;

    // Write the (possibly defaulted) config back so operators can edit it.
    if let Err(e) = config.save(&cli.config) {
        error!(error = %e, "Failed to persist configuration");
    }

    let config = Arc::new(config);
    let store = Arc::new(PanelStateStore::new());
    let registry = Arc::new(SessionRegistry::new(store.event_sender()));
    let dispatcher = Arc::new(NotificationDispatcher::new(store.clone()));

    let panel_server = PanelServer::new(config.clone(), registry.clone(), dispatcher);
    let ws_server = WsServer::new(config.clone(), registry.clone(), store.clone());

    info!(
        listen_port = config.listen_port,
        ws_port = config.ws_port,
        "Starting dsc-tlink-bridge"
    );

    tokio::select! {
        result = panel_server.run() => {
            error!("Panel server exited: {:?}", result);
            result.context("panel server failed")?;
        }
        result = ws_server.run() => {
            error!("WebSocket server exited: {:?}", result);
            result.context("websocket server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
