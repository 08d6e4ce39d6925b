//! Async frame I/O over any byte stream.
//!
//! The server and the client share these helpers so both sides read and
//! write frames identically, whether the stream is a real TCP socket or a
//! simulated one.
//!
//! # Invariants
//!
//! - A clean end of stream before the first header byte is `Ok(None)`.
//! - The header is validated before the payload is read, so an oversized
//!   announcement never allocates.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::frame::{Frame, FrameError, FrameHeader};

/// Errors from reading or writing frames on a stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes on the stream are not a valid frame.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Stream ended in the middle of a frame.
    #[error("stream closed mid-frame")]
    UnexpectedEof,
}

/// Read one frame. Returns `Ok(None)` if the peer closed the stream between
/// frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; FrameHeader::SIZE];
    let mut filled = 0;
    while filled < FrameHeader::SIZE {
        let read = reader.read(&mut header_buf[filled..]).await?;
        if read == 0 {
            return if filled == 0 { Ok(None) } else { Err(TransportError::UnexpectedEof) };
        }
        filled += read;
    }

    let header = FrameHeader::from_bytes(&header_buf)?;

    let mut payload = BytesMut::zeroed(header.payload_size());
    reader.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => TransportError::UnexpectedEof,
        _ => TransportError::Io(e),
    })?;

    Ok(Some(Frame::from_parts(header, payload.freeze())?))
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.to_vec()).await?;
    writer.flush().await?;
    Ok(())
}
