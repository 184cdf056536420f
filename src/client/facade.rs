//! Request/response client over a shared side channel.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::client::error::ClientError;
use crate::codec::{decode, encode, Message, Outcome, Request, RequestId, Response};
use crate::config::ClientConfig;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::schema::{ConfigKey, ConfigValue, Namespace};
use crate::store::{ConfigSnapshot, ConfigVersion, UpdateResult};
use crate::transport::SideChannel;

type Pending = DashMap<RequestId, oneshot::Sender<Response>>;

/// Removes a pending entry however the wait ends, including cancellation.
struct PendingGuard<'a> {
    pending: &'a Pending,
    request_id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.request_id);
    }
}

/// Async client for the configuration service.
///
/// Many calls may be in flight at once; a background task routes each
/// response to its caller by request id. Dropping a call's future only
/// stops waiting, the server still finishes the request.
pub struct ConfigClient {
    channel: Arc<dyn SideChannel>,
    pending: Arc<Pending>,
    closed: Arc<AtomicBool>,
    config: ClientConfig,
    retry: RetryPolicy,
    reader: JoinHandle<()>,
}

impl ConfigClient {
    /// Attach to a channel and start routing responses.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(channel: Arc<dyn SideChannel>, config: ClientConfig) -> Self {
        let pending = Arc::new(Pending::new());
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(route_responses(
            Arc::clone(&channel),
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));
        let retry = RetryPolicy::from_config(&config);
        Self {
            channel,
            pending,
            closed,
            config,
            retry,
            reader,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Read `keys`, which must share a namespace.
    pub async fn get(&self, keys: &[ConfigKey]) -> Result<ConfigSnapshot, ClientError> {
        self.get_with_timeout(keys, self.config.timeout()).await
    }

    pub async fn get_with_timeout(
        &self,
        keys: &[ConfigKey],
        timeout: Duration,
    ) -> Result<ConfigSnapshot, ClientError> {
        let namespace = namespace_of(keys.iter())?;
        let keys: BTreeSet<ConfigKey> = keys.iter().cloned().collect();
        self.read(namespace, keys, timeout).await
    }

    /// Read every key of `namespace`.
    pub async fn get_namespace(&self, namespace: &Namespace) -> Result<ConfigSnapshot, ClientError> {
        self.read(namespace.clone(), BTreeSet::new(), self.config.timeout())
            .await
    }

    /// Read `namespace` and decode it into a typed view.
    pub async fn get_as<T: DeserializeOwned>(&self, namespace: &Namespace) -> Result<T, ClientError> {
        let snapshot = self.get_namespace(namespace).await?;
        Ok(snapshot.decode_into()?)
    }

    /// GET is idempotent, so timeouts are retried with backoff.
    async fn read(
        &self,
        namespace: Namespace,
        keys: BTreeSet<ConfigKey>,
        timeout: Duration,
    ) -> Result<ConfigSnapshot, ClientError> {
        let mut attempt = 0;
        loop {
            let request = Request::get(namespace.clone(), keys.clone());
            let request_id = request.request_id;
            match self.exchange(request, timeout).await {
                Ok(response) => return into_snapshot(request_id, response),
                Err(ClientError::Timeout { .. }) if self.retry.allows(attempt + 1) => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        request_id = %request_id,
                        namespace = %namespace,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "GET timed out, retrying"
                    );
                    metrics::record_client_retry("get");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Write `values`, which must share a namespace.
    ///
    /// With `expected_version`, the write is rejected with
    /// [`ClientError::VersionConflict`] if the namespace moved on. Without
    /// it the last writer wins. Never retried: after a timeout the write may
    /// already be applied.
    pub async fn set(
        &self,
        values: BTreeMap<ConfigKey, ConfigValue>,
        expected_version: Option<ConfigVersion>,
    ) -> Result<UpdateResult, ClientError> {
        self.set_with_timeout(values, expected_version, self.config.timeout())
            .await
    }

    pub async fn set_with_timeout(
        &self,
        values: BTreeMap<ConfigKey, ConfigValue>,
        expected_version: Option<ConfigVersion>,
        timeout: Duration,
    ) -> Result<UpdateResult, ClientError> {
        let namespace = namespace_of(values.keys())?;
        let request = Request::set(namespace, values, expected_version);
        let request_id = request.request_id;
        let response = self.exchange(request, timeout).await?;
        let snapshot = into_snapshot(request_id, response)?;
        Ok(UpdateResult {
            version: snapshot.version,
            snapshot,
        })
    }

    /// Write the top-level fields of `value` as keys of `namespace`.
    ///
    /// A struct `{name, finish_line}` written to `track` sets `track.name`
    /// and `track.finish_line`.
    pub async fn set_as<T: Serialize>(
        &self,
        namespace: &Namespace,
        value: &T,
        expected_version: Option<ConfigVersion>,
    ) -> Result<UpdateResult, ClientError> {
        let values = match ConfigValue::from_serializable(value)? {
            ConfigValue::Record(fields) => fields
                .into_iter()
                .map(|(field, value)| {
                    let key = ConfigKey::parse(&format!("{namespace}.{field}")).map_err(|e| {
                        ClientError::Conversion(serde::ser::Error::custom(e.to_string()))
                    })?;
                    Ok::<_, ClientError>((key, value))
                })
                .collect::<Result<BTreeMap<_, _>, ClientError>>()?,
            other => {
                return Err(ClientError::Conversion(serde::ser::Error::custom(format!(
                    "expected a record, got {}",
                    other.kind_name()
                ))))
            }
        };
        self.set(values, expected_version).await
    }

    /// Read-modify-write of `namespace`.
    ///
    /// `modify` receives the current snapshot and returns the values to
    /// write. On a version conflict the snapshot is re-read and `modify` is
    /// called again, up to the configured retry limit. An empty result
    /// writes nothing.
    pub async fn update<F>(&self, namespace: &Namespace, mut modify: F) -> Result<UpdateResult, ClientError>
    where
        F: FnMut(&ConfigSnapshot) -> Result<BTreeMap<ConfigKey, ConfigValue>, ClientError>,
    {
        let mut attempt = 0;
        loop {
            let snapshot = self.get_namespace(namespace).await?;
            let values = modify(&snapshot)?;
            if values.is_empty() {
                return Ok(UpdateResult {
                    version: snapshot.version,
                    snapshot: snapshot.project(&BTreeSet::new()),
                });
            }

            match self.set(values, Some(snapshot.version)).await {
                Err(ClientError::VersionConflict {
                    request_id,
                    current,
                    ..
                }) if self.retry.allows(attempt + 1) => {
                    attempt += 1;
                    tracing::debug!(
                        request_id = %request_id,
                        namespace = %namespace,
                        based_on = %snapshot.version,
                        current = %current.version,
                        attempt,
                        "Update conflicted, retrying on fresh snapshot"
                    );
                    metrics::record_client_retry("update");
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                }
                result => return result,
            }
        }
    }

    async fn exchange(&self, request: Request, timeout: Duration) -> Result<Response, ClientError> {
        if self.is_closed() {
            return Err(ClientError::TransportFailure("client is closed".to_string()));
        }

        let request_id = request.request_id;
        let frame = encode(&Message::from(request))?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);
        let _guard = PendingGuard {
            pending: self.pending.as_ref(),
            request_id,
        };
        // The reader may have shut down between the check above and insert.
        if self.is_closed() {
            return Err(ClientError::TransportFailure("client is closed".to_string()));
        }

        if let Err(e) = self.channel.send(frame).await {
            tracing::error!(request_id = %request_id, error = %e, "Send failed, closing client");
            self.closed.store(true, Ordering::SeqCst);
            self.pending.clear();
            return Err(ClientError::TransportFailure(e.to_string()));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ClientError::TransportFailure(
                "channel closed while waiting for a response".to_string(),
            )),
            Err(_) => Err(ClientError::Timeout {
                request_id,
                timeout,
            }),
        }
    }
}

impl Drop for ConfigClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn route_responses(channel: Arc<dyn SideChannel>, pending: Arc<Pending>, closed: Arc<AtomicBool>) {
    loop {
        let frame = match channel.receive().await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, in_flight = pending.len(), "Side channel failed, closing client");
                closed.store(true, Ordering::SeqCst);
                // Dropping the senders fails every waiting call.
                pending.clear();
                return;
            }
        };

        match decode(&frame) {
            Ok(Message::Response(response)) => match response.request_id {
                Some(request_id) => match pending.remove(&request_id) {
                    Some((_, tx)) => {
                        let _ = tx.send(response);
                    }
                    None => tracing::debug!(
                        request_id = %request_id,
                        "Response for a request no longer waited on"
                    ),
                },
                None => tracing::warn!(
                    status = response.outcome.status(),
                    "Uncorrelated response from server"
                ),
            },
            Ok(Message::Request(request)) => tracing::warn!(
                request_id = %request.request_id,
                "Ignoring request frame sent to client"
            ),
            Err(e) => {
                metrics::record_decode_failure(e.kind());
                tracing::warn!(error = %e, "Undecodable frame from server");
            }
        }
    }
}

/// The single namespace shared by `keys`.
fn namespace_of<'a>(mut keys: impl Iterator<Item = &'a ConfigKey>) -> Result<Namespace, ClientError> {
    let first = keys.next().ok_or(ClientError::EmptyRequest)?.namespace();
    for key in keys {
        let namespace = key.namespace();
        if namespace != first {
            return Err(ClientError::MixedNamespaces {
                first,
                second: namespace,
            });
        }
    }
    Ok(first)
}

fn into_snapshot(request_id: RequestId, response: Response) -> Result<ConfigSnapshot, ClientError> {
    match response.outcome {
        Outcome::Ok { snapshot } => Ok(snapshot),
        Outcome::Conflict {
            expected_version,
            snapshot,
            conflicting_keys,
        } => Err(ClientError::VersionConflict {
            request_id,
            expected: expected_version,
            current: Box::new(snapshot),
            conflicting_keys,
        }),
        Outcome::Error(error) => Err(ClientError::Rejected { request_id, error }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> ConfigKey {
        ConfigKey::parse(raw).unwrap()
    }

    #[test]
    fn namespace_is_derived_from_keys() {
        let keys = [key("speed.max"), key("speed.min")];
        assert_eq!(namespace_of(keys.iter()).unwrap(), Namespace::parse("speed").unwrap());

        let mixed = [key("speed.max"), key("track.width")];
        assert!(matches!(
            namespace_of(mixed.iter()),
            Err(ClientError::MixedNamespaces { .. })
        ));

        assert!(matches!(
            namespace_of(std::iter::empty()),
            Err(ClientError::EmptyRequest)
        ));
    }
}
