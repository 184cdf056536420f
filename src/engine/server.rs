//! Serves a [`SyncEngine`] over a side channel.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::engine::sync::SyncEngine;
use crate::transport::{SideChannel, TransportError};

/// Reads request frames and answers each one from its own task.
///
/// Reads proceed concurrently; writes to one namespace serialize inside
/// the store. A request that was read is always processed and answered,
/// even if shutdown arrives meanwhile.
pub struct ConfigServer {
    engine: Arc<SyncEngine>,
    channel: Arc<dyn SideChannel>,
}

impl ConfigServer {
    pub fn new(engine: Arc<SyncEngine>, channel: Arc<dyn SideChannel>) -> Self {
        Self { engine, channel }
    }

    /// Serve until shutdown or until the channel closes.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), TransportError> {
        tracing::info!("Config server starting");
        let mut in_flight = JoinSet::new();

        let result = loop {
            let frame = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer reading frames");
                    break Ok(());
                }
                frame = self.channel.receive() => frame,
            };

            match frame {
                Ok(frame) => {
                    let engine = Arc::clone(&self.engine);
                    let channel = Arc::clone(&self.channel);
                    in_flight.spawn(async move {
                        let reply = match engine.handle_frame(&frame) {
                            Ok(reply) => reply,
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to encode reply");
                                return;
                            }
                        };
                        if let Err(e) = channel.send(reply).await {
                            tracing::warn!(error = %e, "Failed to send reply");
                        }
                    });
                }
                Err(TransportError::Closed) => {
                    tracing::info!("Side channel closed by peer");
                    break Ok(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Side channel failed");
                    break Err(e);
                }
            }

            while let Some(done) = in_flight.try_join_next() {
                if let Err(e) = done {
                    tracing::error!(error = %e, "Request task failed");
                }
            }
        };

        let draining = in_flight.len();
        if draining > 0 {
            tracing::info!(in_flight = draining, "Draining in-flight requests");
        }
        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                tracing::error!(error = %e, "Request task failed");
            }
        }

        tracing::info!("Config server stopped");
        result
    }
}
