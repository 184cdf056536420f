//! Overrides file watcher for hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_overrides;
use crate::config::overrides::ValueOverrides;
use crate::schema::Schema;

/// Reloads the overrides file on change and forwards valid contents.
///
/// Invalid edits are logged and skipped; the last applied overrides stay in
/// effect.
pub struct OverridesWatcher {
    path: PathBuf,
    schema: Arc<Schema>,
    update_tx: mpsc::UnboundedSender<ValueOverrides>,
}

impl OverridesWatcher {
    pub fn new(
        path: &Path,
        schema: Arc<Schema>,
    ) -> (Self, mpsc::UnboundedReceiver<ValueOverrides>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                schema,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let schema = self.schema;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_overrides(&path, &schema) {
                        Ok(overrides) => {
                            tracing::info!(
                                path = %path.display(),
                                keys = overrides.len(),
                                "Overrides file changed, reapplying"
                            );
                            let _ = tx.send(overrides);
                        }
                        Err(e) => {
                            tracing::error!(
                                path = %path.display(),
                                error = %e,
                                "Failed to reload overrides; keeping current values"
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Overrides watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Overrides watcher started");
        Ok(watcher)
    }
}
