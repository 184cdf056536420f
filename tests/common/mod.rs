//! Shared utilities for integration, failure injection and load tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use env_config_sync::codec::{decode, encode, Message, Outcome, Request, Response};
use env_config_sync::config::ClientConfig;
use env_config_sync::transport::{MemoryChannel, SideChannel, TransportError};
use env_config_sync::{
    ConfigClient, ConfigKey, ConfigServer, ConfigSnapshot, Schema, Shutdown, SyncEngine, ValueType,
};

pub fn key(raw: &str) -> ConfigKey {
    ConfigKey::parse(raw).unwrap()
}

/// `speed.{max,min}` floats in [0, 10], `track.{width,name}` and an
/// integer lap counter.
pub fn speed_schema() -> Arc<Schema> {
    let schema = Schema::builder()
        .key("speed.max", ValueType::float_range(Some(0.0), Some(10.0)), 5.0)
        .key("speed.min", ValueType::float_range(Some(0.0), Some(10.0)), 0.5)
        .key("track.width", ValueType::float(), 1.07)
        .key("track.name", ValueType::string(), "oval")
        .key("race.laps", ValueType::integer_range(Some(0), None), 0i64)
        .build()
        .unwrap();
    Arc::new(schema)
}

/// Short deadlines so failure tests finish quickly.
pub fn fast_client_config() -> ClientConfig {
    ClientConfig {
        timeout_ms: 200,
        max_retry_attempts: 3,
        base_delay_ms: 10,
        max_delay_ms: 50,
    }
}

/// A running engine behind a [`ConfigServer`].
pub struct TestService {
    pub engine: Arc<SyncEngine>,
    pub shutdown: Shutdown,
    pub servers: Vec<JoinHandle<Result<(), TransportError>>>,
}

impl TestService {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            engine: Arc::new(SyncEngine::new(schema)),
            shutdown: Shutdown::new(),
            servers: Vec::new(),
        }
    }

    /// Serve one more channel and return the peer end.
    pub fn attach(&mut self) -> MemoryChannel {
        let (client_end, server_end) = MemoryChannel::pair();
        let server = ConfigServer::new(Arc::clone(&self.engine), Arc::new(server_end));
        self.servers
            .push(tokio::spawn(server.run(self.shutdown.subscribe())));
        client_end
    }

    /// Serve one more channel and connect a client to it.
    pub fn connect(&mut self, config: ClientConfig) -> ConfigClient {
        let channel: Arc<dyn SideChannel> = Arc::new(self.attach());
        ConfigClient::connect(channel, config)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        for server in self.servers {
            server.await.unwrap().unwrap();
        }
    }
}

/// Start a fake server that hands each request and its call number
/// (0-based) to `handler`. Returning `None` drops the request unanswered.
pub fn start_programmable_server<F>(handler: F) -> (Arc<dyn SideChannel>, Arc<AtomicU32>)
where
    F: Fn(Request, u32) -> Option<Response> + Send + Sync + 'static,
{
    let (client_end, server_end) = MemoryChannel::pair();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    tokio::spawn(async move {
        while let Ok(frame) = server_end.receive().await {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            let Ok(Message::Request(request)) = decode(&frame) else {
                continue;
            };
            if let Some(response) = handler(request, call) {
                let bytes = encode(&Message::from(response)).unwrap();
                if server_end.send(bytes).await.is_err() {
                    break;
                }
            }
        }
    });

    (Arc::new(client_end), calls)
}

/// OK response carrying `snapshot`.
pub fn ok_response(request: &Request, snapshot: ConfigSnapshot) -> Response {
    Response::new(Some(request.request_id), Outcome::Ok { snapshot })
}
