//! Length-prefixed framing over any async byte stream.
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes.
//! Used to serve the engine over stdin/stdout of a simulator process.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::transport::{SideChannel, TransportError};

pub struct StreamChannel<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
    max_frame_bytes: usize,
}

impl<R, W> StreamChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, max_frame_bytes: usize) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            max_frame_bytes,
        }
    }

    fn check_size(&self, size: usize) -> Result<(), TransportError> {
        if size > self.max_frame_bytes || u32::try_from(size).is_err() {
            return Err(TransportError::FrameTooLarge {
                size,
                limit: self.max_frame_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<R, W> SideChannel for StreamChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.check_size(frame.len())?;
        let len = frame.len() as u32;

        let mut writer = self.writer.lock().await;
        writer.write_all(&len.to_be_bytes()).await?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Vec<u8>, TransportError> {
        let mut reader = self.reader.lock().await;

        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(TransportError::Closed);
            }
            Err(e) => return Err(e.into()),
        }

        let size = u32::from_be_bytes(len_buf) as usize;
        self.check_size(size)?;

        let mut frame = vec![0u8; size];
        reader.read_exact(&mut frame).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::Closed
            } else {
                TransportError::Io(e)
            }
        })?;
        Ok(frame)
    }
}
