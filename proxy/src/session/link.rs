//! Byte streams on either side of a session.

use crate::codec::{write_frame, write_packet};
use crate::error::Result;
use shared::Packet;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;

/// Anything a session can speak frames over: TCP sockets in production,
/// in-memory duplex pipes in tests.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Stream for T {}

pub type Link = Box<dyn Stream>;
pub type LinkReader = ReadHalf<Link>;
pub type LinkWriter = WriteHalf<Link>;

pub type DialFuture = Pin<Box<dyn Future<Output = io::Result<Link>> + Send>>;

/// Opens a link to an upstream address.
pub type Dialer = Arc<dyn Fn(String) -> DialFuture + Send + Sync>;

pub fn tcp_dialer() -> Dialer {
    Arc::new(|address: String| {
        Box::pin(async move {
            let stream = TcpStream::connect(&address).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as Link)
        })
    })
}

pub fn split(link: Link) -> (LinkReader, LinkWriter) {
    tokio::io::split(link)
}

/// Writes an untouched frame body.
pub async fn send_raw(writer: &mut LinkWriter, body: &[u8]) -> Result<()> {
    write_frame(writer, body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn send_all(writer: &mut LinkWriter, packets: &[Packet]) -> Result<()> {
    for packet in packets {
        write_packet(writer, packet).await?;
    }
    Ok(())
}
