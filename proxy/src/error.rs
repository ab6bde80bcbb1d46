//! Error taxonomy for a proxied session.
//!
//! Every failure a handler can raise is a [`ProxyError`]. The session does not
//! inspect variants directly; it asks [`ProxyError::policy`] whether the packet
//! should be dropped, local state reset, or the whole session torn down.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("packet codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("frame of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("too many undecodable packets")]
    DecodeBudgetExceeded,

    #[error("chunk decode failed: {0}")]
    ChunkDecode(String),

    #[error("simulation state diverged: {0}")]
    StateDivergence(String),

    #[error("network timeout")]
    NetworkTimeout,

    #[error("{0}")]
    Punished(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("connection closed")]
    Closed,
}

/// What the session does with a failed handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Disconnect the client with this reason and close both links.
    Terminate(String),
    /// Log (rate limited) and drop the offending packet.
    DropPacket,
    /// Log, reset local simulation state and force-teleport the client.
    ResetState,
    /// Abort the pending operation and keep the existing upstream.
    KeepUpstream,
}

impl ProxyError {
    pub fn policy(&self) -> ErrorPolicy {
        match self {
            ProxyError::Io(_) | ProxyError::Closed => {
                ErrorPolicy::Terminate("connection closed".to_string())
            }
            ProxyError::Codec(_) | ProxyError::Malformed(_) | ProxyError::ChunkDecode(_) => {
                ErrorPolicy::DropPacket
            }
            ProxyError::StateDivergence(_) => ErrorPolicy::ResetState,
            ProxyError::Upstream(_) => ErrorPolicy::KeepUpstream,
            ProxyError::NetworkTimeout => ErrorPolicy::Terminate("network timeout".to_string()),
            ProxyError::Punished(message) => ErrorPolicy::Terminate(message.clone()),
            ProxyError::FrameTooLarge(_) | ProxyError::DecodeBudgetExceeded => {
                ErrorPolicy::Terminate("invalid packet stream".to_string())
            }
            ProxyError::Config(e) => ErrorPolicy::Terminate(format!("configuration: {}", e)),
            ProxyError::Internal(e) => ErrorPolicy::Terminate(format!("internal error: {}", e)),
        }
    }
}
