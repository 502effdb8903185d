//! Core error types shared by every crate in the workspace

/// Reason a session ended, carried through the close path and into the
/// reconnect decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// User called disconnect()
    Requested,

    /// Server sent DISCONNECT_MESSAGE with this text
    ServerMessage(String),

    /// Socket error or remote close
    ConnectionLost,

    /// No NEW_WORLD_TIME for longer than the keepalive window
    KeepaliveTimeout,

    /// Login was rejected during the handshake
    LoginRejected(String),
}

impl DisconnectReason {
    /// Transient reasons are eligible for the reconnect policy.
    /// Auth failures and explicit user disconnects never reconnect.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionLost | Self::KeepaliveTimeout)
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "disconnect requested"),
            Self::ServerMessage(msg) => write!(f, "server message: {}", msg),
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::KeepaliveTimeout => write!(f, "keepalive timeout"),
            Self::LoginRejected(msg) => write!(f, "login rejected: {}", msg),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RebornError {
    #[error("transport I/O error: {0}")]
    TransportIo(#[from] std::io::Error),

    /// Frame shorter than its length header claimed. Fails the session.
    #[error("truncated frame: expected {expected} bytes, got {got}")]
    TransportTruncated { expected: usize, got: usize },

    /// Decrypt/decompress produced garbage. Fails the session.
    #[error("corrupt frame: {0}")]
    TransportCorrupt(String),

    /// Packet that is not legal in the current session state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// Field could not be decoded from a sub-packet. Drops the sub-packet.
    #[error("malformed sub-packet: {0}")]
    SubpacketMalformed(String),

    /// Update that would break a world-state invariant. Dropped at warn.
    #[error("world invariant violated: {0}")]
    WorldInvariant(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// Writer refused a value outside its wire encoding range.
    #[error("value out of encoding range: {0}")]
    ValueOutOfRange(String),

    #[error("not connected")]
    NotConnected,

    #[error("disconnected: {0}")]
    Disconnected(DisconnectReason),
}

pub type Result<T> = std::result::Result<T, RebornError>;
