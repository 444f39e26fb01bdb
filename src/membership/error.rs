//! Error types for the membership subsystem.

use std::net::SocketAddr;
use std::time::Duration;

/// Errors produced by the membership engine and its transports.
///
/// Only [`MembershipError::Bind`] is fatal to a node. Everything else is
/// contained in the loop or request that produced it.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    /// The datagram socket or the control listener could not be opened.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A send or dial to a chosen peer failed.
    #[error("peer {0} unreachable: {1}")]
    PeerUnreachable(SocketAddr, String),

    /// An inbound message could not be decoded.
    #[error("malformed message from {0}: {1}")]
    MalformedMessage(SocketAddr, String),

    /// The introducer did not answer within the bootstrap deadline.
    #[error("join timed out after {0:?} waiting for introducer {1}")]
    JoinTimeout(Duration, SocketAddr),

    /// The introducer answered, but not with a membership list.
    #[error("join rejected by introducer {0}: {1}")]
    JoinRejected(SocketAddr, String),

    /// Outbound serialization failure.
    #[error("encode error: {0}")]
    Encode(String),

    #[error("control surface error: {0}")]
    Control(String),
}

pub type Result<T> = std::result::Result<T, MembershipError>;
