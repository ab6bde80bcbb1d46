use super::link::{Dialer, Link};
use crate::error::{ProxyError, Result};
use std::time::Duration;
use tokio::time::timeout;

/// Longest an upstream dial may take, for the first upstream and for transfers.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Dials `address`; every failure is reported as [`ProxyError::Upstream`] so a
/// transfer can fall back to the upstream it already has.
pub async fn dial(dialer: &Dialer, address: &str) -> Result<Link> {
    match timeout(DIAL_TIMEOUT, dialer(address.to_string())).await {
        Ok(Ok(link)) => Ok(link),
        Ok(Err(e)) => Err(ProxyError::Upstream(format!("dial {} failed: {}", address, e))),
        Err(_) => Err(ProxyError::Upstream(format!("dial {} timed out", address))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorPolicy;
    use std::io;
    use std::sync::Arc;

    fn refusing() -> Dialer {
        Arc::new(|_address: String| {
            Box::pin(async { Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")) })
        })
    }

    fn loopback() -> Dialer {
        Arc::new(|_address: String| {
            Box::pin(async {
                let (near, _far) = tokio::io::duplex(64);
                Ok(Box::new(near) as Link)
            })
        })
    }

    #[tokio::test]
    async fn test_refused_dial_keeps_upstream() {
        let err = match dial(&refusing(), "10.0.0.2:19132").await {
            Ok(_) => panic!("dial should fail"),
            Err(e) => e,
        };
        assert_eq!(err.policy(), ErrorPolicy::KeepUpstream);
        assert!(err.to_string().contains("10.0.0.2:19132"));
    }

    #[tokio::test]
    async fn test_successful_dial() {
        assert!(dial(&loopback(), "10.0.0.2:19132").await.is_ok());
    }
}
