// MIT License - Copyright (c) 2026 Peter Wright
// Panel-link TCP accept loop

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::BridgeConfig;
use crate::dispatch::NotificationDispatcher;
use crate::error::{Result, TLinkError};
use crate::messages::verify_registry;
use crate::transport::registry::SessionRegistry;
use crate::transport::session::Session;

/// Accepts panel connections and runs one [`Session`] task per link.
/// Protocol-fatal errors close their own session; the server keeps
/// accepting.
pub struct PanelServer {
    config: Arc<BridgeConfig>,
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl PanelServer {
    pub fn new(
        config: Arc<BridgeConfig>,
        registry: Arc<SessionRegistry>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        // The catalogue is checked once, before the first byte arrives.
        verify_registry();
        Self {
            config,
            registry,
            dispatcher,
        }
    }

    /// Bind the configured port and serve until the task is cancelled.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.listen_port);
        let listener = TcpListener::bind(&addr).await?;
        info!(%addr, "Panel link listening");
        self.serve(listener).await
    }

    /// Accept loop over an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(%peer, error = %e, "Failed to set TCP_NODELAY");
                    }
                    let session = Session::new(
                        self.config.clone(),
                        self.registry.clone(),
                        self.dispatcher.clone(),
                    );
                    tokio::spawn(async move {
                        match session.run(stream).await {
                            Ok(()) | Err(TLinkError::Disconnected) => {
                                info!(%peer, "Panel disconnected");
                            }
                            Err(e) => warn!(%peer, error = %e, "Session ended with error"),
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                }
            }
        }
    }
}
