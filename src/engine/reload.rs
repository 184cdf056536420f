//! Applies reloaded overrides to a running engine.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ValueOverrides;
use crate::engine::sync::SyncEngine;
use crate::lifecycle::Shutdown;

/// Apply each overrides set from `updates` until shutdown or until the
/// sender goes away.
///
/// A rejected set is logged and skipped. Updates that arrive once shutdown
/// has started are dropped.
pub fn spawn_overrides_reloader(
    engine: Arc<SyncEngine>,
    mut updates: mpsc::UnboundedReceiver<ValueOverrides>,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            let overrides = tokio::select! {
                _ = stop.recv() => break,
                update = updates.recv() => match update {
                    Some(overrides) => overrides,
                    None => break,
                },
            };
            if shutdown.is_triggered() {
                tracing::debug!(keys = overrides.len(), "Dropping overrides received during shutdown");
                break;
            }
            match engine.apply_overrides(&overrides) {
                Ok(applied) => tracing::debug!(namespaces = applied.len(), "Reloaded overrides applied"),
                Err(e) => tracing::error!(error = %e, "Reloaded overrides rejected"),
            }
        }
        tracing::debug!("Overrides reloader stopped");
    })
}
