//! Length-prefixed frame codec.
//!
//! Layout: `u32` big-endian payload length, then that many bytes of UTF-8
//! JSON. Callers wrap every read/write in their own timeout; the codec
//! itself never blocks forever only because the socket does.

use crate::error::{Error, Result};
use crate::message::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame's payload. Large enough for a genesis
/// block with a few hundred reward transactions, small enough that a
/// hostile length header cannot balloon allocation.
pub const MAX_FRAME_LEN: usize = 256 * 1024;

/// Serialize `msg` and write it as one frame.
pub async fn write_frame<W>(writer: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(msg)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and decode it.
pub async fn read_frame<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len == 0 {
        return Err(Error::EmptyFrame);
    }
    if len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(serde_json::from_slice(&payload)?)
}
