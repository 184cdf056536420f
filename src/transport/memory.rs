//! In-process channel pair, used when the controller and the environment
//! share a process, and throughout the tests.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::transport::{SideChannel, TransportError};

/// One end of an in-memory duplex channel.
#[derive(Debug)]
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryChannel {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Self { tx: a_tx, rx: Mutex::new(b_rx) },
            Self { tx: b_tx, rx: Mutex::new(a_rx) },
        )
    }
}

#[async_trait]
impl SideChannel for MemoryChannel {
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Result<Vec<u8>, TransportError> {
        self.rx.lock().await.recv().await.ok_or(TransportError::Closed)
    }
}
