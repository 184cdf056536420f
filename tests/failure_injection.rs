//! Failure injection tests: lost replies, dead channels and bad frames.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use env_config_sync::codec::{decode, encode, Message, Outcome, Request, RequestId};
use env_config_sync::transport::{MemoryChannel, SideChannel, TransportError};
use env_config_sync::{
    ClientError, ConfigClient, ConfigServer, ConfigSnapshot, ConfigValue, ConfigVersion, ErrorKind,
    Namespace, Shutdown, SyncEngine,
};

mod common;
use common::{fast_client_config, key, ok_response, speed_schema, start_programmable_server, TestService};

fn speed() -> Namespace {
    Namespace::parse("speed").unwrap()
}

fn speed_snapshot(version: u64) -> ConfigSnapshot {
    let values = BTreeMap::from([(key("speed.max"), ConfigValue::Float(5.0))]);
    ConfigSnapshot::new(speed(), ConfigVersion::new(version), values)
}

async fn receive_response(channel: &MemoryChannel) -> env_config_sync::Response {
    let frame = tokio::time::timeout(Duration::from_secs(2), channel.receive())
        .await
        .expect("no reply from server")
        .unwrap();
    match decode(&frame).unwrap() {
        Message::Response(response) => response,
        other => panic!("expected a response, got {other:?}"),
    }
}

fn error_kind(response: &env_config_sync::Response) -> Option<ErrorKind> {
    match &response.outcome {
        Outcome::Error(body) => Some(body.kind),
        _ => None,
    }
}

#[tokio::test]
async fn test_get_retries_after_lost_replies() {
    let (channel, calls) = start_programmable_server(|request, call| {
        // Drop the first two attempts.
        (call >= 2).then(|| ok_response(&request, speed_snapshot(0)))
    });
    let mut config = fast_client_config();
    config.timeout_ms = 50;
    let client = ConfigClient::connect(channel, config);

    let snapshot = client.get(&[key("speed.max")]).await.unwrap();
    assert_eq!(snapshot.get(&key("speed.max")), Some(&ConfigValue::Float(5.0)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_get_gives_up_after_retry_limit() {
    let (channel, calls) = start_programmable_server(|_, _| None);
    let mut config = fast_client_config();
    config.timeout_ms = 30;
    config.max_retry_attempts = 2;
    let client = ConfigClient::connect(channel, config);

    let err = client.get(&[key("speed.max")]).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { .. }));
    assert!(err.is_ambiguous());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_set_is_never_retried_after_timeout() {
    let (channel, calls) = start_programmable_server(|_, _| None);
    let mut config = fast_client_config();
    config.timeout_ms = 30;
    let client = ConfigClient::connect(channel, config);

    let values = BTreeMap::from([(key("speed.max"), ConfigValue::Float(6.0))]);
    let err = client.set(values, None).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { .. }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_late_reply_is_ignored() {
    let (client_end, server_end) = MemoryChannel::pair();
    tokio::spawn(async move {
        let mut version = 0;
        while let Ok(frame) = server_end.receive().await {
            let Ok(Message::Request(request)) = decode(&frame) else {
                continue;
            };
            if version == 0 {
                // Answer the first request only after the client gave up on it.
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let reply = ok_response(&request, speed_snapshot(version));
            version += 1;
            if server_end.send(encode(&Message::from(reply)).unwrap()).await.is_err() {
                break;
            }
        }
    });
    let mut config = fast_client_config();
    config.timeout_ms = 40;
    config.max_retry_attempts = 0;
    let channel: Arc<dyn SideChannel> = Arc::new(client_end);
    let client = ConfigClient::connect(channel, config);

    let first = client.get(&[key("speed.max")]).await;
    assert!(matches!(first, Err(ClientError::Timeout { .. })));

    let second = client
        .get_with_timeout(&[key("speed.max")], Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(second.version, ConfigVersion::new(1));
}

#[tokio::test]
async fn test_transport_failure_closes_client() {
    let (client_end, server_end) = MemoryChannel::pair();
    tokio::spawn(async move {
        // Accept one frame, then vanish.
        let _ = server_end.receive().await;
        drop(server_end);
    });
    let channel: Arc<dyn SideChannel> = Arc::new(client_end);
    let client = ConfigClient::connect(channel, fast_client_config());

    let err = client.get(&[key("speed.max")]).await.unwrap_err();
    assert!(matches!(err, ClientError::TransportFailure(_)), "got {err}");
    assert!(client.is_closed());

    let again = client.get(&[key("speed.max")]).await.unwrap_err();
    assert!(matches!(again, ClientError::TransportFailure(_)));
}

#[tokio::test]
async fn test_malformed_frame_gets_error_and_channel_survives() {
    let mut service = TestService::new(speed_schema());
    let channel = service.attach();

    channel.send(b"\x00\x01 definitely not json".to_vec()).await.unwrap();
    let response = receive_response(&channel).await;
    assert_eq!(response.request_id, None);
    assert_eq!(error_kind(&response), Some(ErrorKind::MalformedMessage));

    let request = Request::get(speed(), BTreeSet::from([key("speed.max")]));
    let request_id = request.request_id;
    channel
        .send(encode(&Message::from(request)).unwrap())
        .await
        .unwrap();
    let response = receive_response(&channel).await;
    assert_eq!(response.request_id, Some(request_id));
    assert!(matches!(response.outcome, Outcome::Ok { .. }));

    service.stop().await;
}

#[tokio::test]
async fn test_unsupported_version_is_addressed_to_sender() {
    let mut service = TestService::new(speed_schema());
    let channel = service.attach();

    let request_id = RequestId::new();
    let frame = serde_json::json!({
        "protocol_version": 99,
        "message": {"request": {
            "request_id": request_id.to_string(),
            "namespace": "speed",
            "GET": {"keys": ["speed.max"]}
        }}
    });
    channel.send(frame.to_string().into_bytes()).await.unwrap();

    let response = receive_response(&channel).await;
    assert_eq!(response.request_id, Some(request_id));
    assert_eq!(error_kind(&response), Some(ErrorKind::UnsupportedVersion));

    service.stop().await;
}

#[tokio::test]
async fn test_server_stops_when_peer_disconnects() {
    let mut service = TestService::new(speed_schema());
    let channel = service.attach();
    drop(channel);

    let server = service.servers.pop().unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .expect("server did not stop");
    assert!(result.unwrap().is_ok());
}

/// Reports every frame it reads and holds each reply back for `delay`.
struct SlowReplies {
    inner: MemoryChannel,
    frame_read: Arc<Notify>,
    delay: Duration,
}

#[async_trait]
impl SideChannel for SlowReplies {
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        tokio::time::sleep(self.delay).await;
        self.inner.send(frame).await
    }

    async fn receive(&self) -> Result<Vec<u8>, TransportError> {
        let frame = self.inner.receive().await?;
        self.frame_read.notify_one();
        Ok(frame)
    }
}

#[tokio::test]
async fn test_shutdown_drains_dispatched_set() {
    let engine = Arc::new(SyncEngine::new(speed_schema()));
    let shutdown = Shutdown::new();
    let frame_read = Arc::new(Notify::new());
    let (client_end, server_end) = MemoryChannel::pair();
    let channel = SlowReplies {
        inner: server_end,
        frame_read: Arc::clone(&frame_read),
        delay: Duration::from_millis(100),
    };
    let server = tokio::spawn(
        ConfigServer::new(Arc::clone(&engine), Arc::new(channel)).run(shutdown.subscribe()),
    );

    let values = BTreeMap::from([(key("speed.max"), ConfigValue::Float(7.0))]);
    let request = Request::set(speed(), values, None);
    let request_id = request.request_id;
    client_end
        .send(encode(&Message::from(request)).unwrap())
        .await
        .unwrap();

    // Stop while the reply is still being sent.
    tokio::time::timeout(Duration::from_secs(2), frame_read.notified())
        .await
        .expect("server never read the frame");
    shutdown.trigger();

    let stopped = tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .expect("server did not stop");
    assert!(stopped.unwrap().is_ok());

    let response = receive_response(&client_end).await;
    assert_eq!(response.request_id, Some(request_id));
    match response.outcome {
        Outcome::Ok { snapshot } => assert_eq!(snapshot.version, ConfigVersion::new(1)),
        other => panic!("expected OK, got {other:?}"),
    }
    assert_eq!(engine.version(&speed()), Some(ConfigVersion::new(1)));
}
