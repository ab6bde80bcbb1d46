//! TCP listener handing each accepted client to its own session task.

use crate::codec::write_packet;
use crate::error::Result;
use crate::session::link::Link;
use crate::session::{run_session, ProxyContext};
use log::{debug, error, info, warn};
use shared::Packet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

pub struct ProxyServer {
    listener: TcpListener,
    ctx: Arc<ProxyContext>,
    slots: Arc<Semaphore>,
}

impl ProxyServer {
    pub async fn bind(ctx: Arc<ProxyContext>) -> Result<Self> {
        let listener = TcpListener::bind(&ctx.config.proxy.listen).await?;
        info!(
            "Proxy listening on {} for upstream {} ({} sessions max)",
            listener.local_addr()?,
            ctx.config.proxy.upstream,
            ctx.config.proxy.max_sessions
        );
        let slots = Arc::new(Semaphore::new(ctx.config.proxy.max_sessions));
        Ok(Self { listener, ctx, slots })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts clients forever. Each session runs in its own task, so a
    /// failing or panicking session never reaches the others.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Could not disable Nagle for {}: {}", addr, e);
            }

            let permit = match Arc::clone(&self.slots).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Refusing {}: proxy full", addr);
                    tokio::spawn(refuse_full(stream));
                    continue;
                }
            };

            let ctx = Arc::clone(&self.ctx);
            let session = tokio::spawn(async move {
                let _permit = permit;
                debug!("Accepted {}", addr);
                run_session(Box::new(stream) as Link, ctx).await
            });
            tokio::spawn(async move {
                match session.await {
                    Ok(Ok(())) => debug!("Session from {} closed", addr),
                    Ok(Err(e)) => debug!("Session from {} ended: {}", addr, e),
                    Err(e) => error!("Session from {} panicked: {}", addr, e),
                }
            });
        }
    }
}

async fn refuse_full(mut stream: TcpStream) {
    let packet = Packet::Disconnect {
        message: "proxy full".to_string(),
    };
    if let Err(e) = write_packet(&mut stream, &packet).await {
        debug!("Refusal not delivered: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::read_packet;
    use crate::config::Config;
    use crate::session::link::Dialer;
    use std::io;

    fn refusing() -> Dialer {
        Arc::new(|_address: String| {
            Box::pin(async { Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")) })
        })
    }

    #[tokio::test]
    async fn test_excess_client_refused() {
        let mut config = Config::default();
        config.proxy.listen = "127.0.0.1:0".to_string();
        config.proxy.max_sessions = 1;
        let server = ProxyServer::bind(Arc::new(ProxyContext::new(config, refusing())))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        // holds the only slot while waiting for its login
        let _first = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut second = TcpStream::connect(addr).await.unwrap();
        let packet = tokio::time::timeout(Duration::from_secs(5), read_packet(&mut second))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            packet,
            Some(Packet::Disconnect {
                message: "proxy full".to_string()
            })
        );
    }
}
