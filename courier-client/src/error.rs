use courier_core::{returncode::ConnectReturnCode, topic::TopicError};
use thiserror::Error;

use crate::event::DisconnectReason;

/// Errors surfaced by the MQTT client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame failed to decode. Fatal to the connection it arrived on.
    #[error("protocol error: {0}")]
    Packet(#[from] courier_core::error::Error),

    /// The broker violated the protocol at the packet-sequence level.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The broker rejected the CONNECT. Not retried.
    #[error("connection refused: {0}")]
    ConnectionRefused(ConnectReturnCode),

    #[error("operation timed out")]
    Timeout,

    /// The transport dropped or the keepalive grace window elapsed while
    /// connected. Reconnection is the caller's responsibility.
    #[error("connection lost: {0}")]
    ConnectionLost(DisconnectReason),

    /// Rejected before any I/O took place.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("TLS error: {0}")]
    Tls(String),
}

impl From<TopicError> for ClientError {
    fn from(err: TopicError) -> Self {
        ClientError::InvalidArgument(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
