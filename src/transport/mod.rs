//! Side-channel transport subsystem.
//!
//! # Data Flow
//! ```text
//! engine / client
//!     → SideChannel::send (one frame)
//!     → memory.rs (in-process pair) or stream.rs (length-prefixed pipe)
//!     → SideChannel::receive on the peer
//! ```
//!
//! # Design Decisions
//! - A channel moves whole frames; framing lives below the trait so the
//!   engine and client only ever see complete messages
//! - Both directions may be used from different tasks at once

pub mod memory;
pub mod stream;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryChannel;
pub use stream::StreamChannel;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer went away.
    #[error("side channel closed")]
    Closed,

    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bidirectional, frame-oriented message channel.
#[async_trait]
pub trait SideChannel: Send + Sync {
    /// Send one frame.
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Wait for the next frame.
    async fn receive(&self) -> Result<Vec<u8>, TransportError>;
}
