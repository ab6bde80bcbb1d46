//! Length-prefixed framing for both links.
//!
//! A frame is a big-endian `u32` length followed by a bincode encoded
//! [`Packet`]. Frames are kept as raw bytes until a handler needs the decoded
//! packet so untouched traffic is forwarded bit for bit.

use crate::error::{ProxyError, Result};
use bincode::{deserialize, serialize};
use shared::{Packet, MAX_FRAME_SIZE};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>> {
    Ok(serialize(packet)?)
}

pub fn decode_packet(body: &[u8]) -> Result<Packet> {
    Ok(deserialize(body)?)
}

/// Reads one frame body. Returns `Ok(None)` when the peer closed cleanly between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > MAX_FRAME_SIZE {
        return Err(ProxyError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<()> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(ProxyError::FrameTooLarge(body.len()));
    }
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(body).await?;
    Ok(())
}

pub async fn write_packet<W: AsyncWrite + Unpin>(writer: &mut W, packet: &Packet) -> Result<()> {
    let body = encode_packet(packet)?;
    write_frame(writer, &body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads frames until one decodes. Used by tools and tests that only care about packets.
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Packet>> {
    match read_frame(reader).await? {
        Some(body) => Ok(Some(decode_packet(&body)?)),
        None => Ok(None),
    }
}
