//! Packet framing over a byte stream.

use bytes::BytesMut;
use courier_core::{codec::Encoder, error::Error as CodecError};
use courier_packets::ControlPacket;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::Result;

/// Byte streams a broker connection can run over. Blanket-implemented
/// so plain TCP and TLS streams both qualify.
pub(crate) trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// A framed connection to an MQTT broker. The stream is boxed so the
/// connection task is the same type for TCP and TLS.
pub(crate) struct Connection {
    stream: Box<dyn Transport>,
    read_buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: impl Transport + 'static) -> Self {
        Self {
            stream: Box::new(stream),
            read_buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Write a control packet to the connection.
    pub async fn write_packet(&mut self, packet: &ControlPacket) -> Result<()> {
        let mut buffer = BytesMut::with_capacity(packet.encoded_size());
        packet.encode(&mut buffer);
        trace!(len = buffer.len(), "frame out");
        self.stream.write_all(&buffer).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one control packet. Returns `None` on a clean EOF at a
    /// frame boundary; EOF mid-frame is a protocol error.
    pub async fn read_packet(&mut self) -> Result<Option<ControlPacket>> {
        loop {
            match ControlPacket::check(&self.read_buffer) {
                Ok(()) => {
                    let packet = ControlPacket::parse(&mut self.read_buffer)?;
                    trace!(?packet, "frame in");
                    return Ok(Some(packet));
                }
                Err(CodecError::Incomplete) => {}
                Err(e) => return Err(e.into()),
            }

            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                if self.read_buffer.is_empty() {
                    return Ok(None);
                }
                return Err(CodecError::Incomplete.into());
            }
            self.read_buffer.extend_from_slice(&chunk[..n]);
        }
    }
}
