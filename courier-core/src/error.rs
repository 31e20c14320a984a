use thiserror::Error;

/// Errors produced while encoding or decoding MQTT frames.
///
/// `Incomplete` is recoverable: the reader should buffer more bytes and
/// retry. `Malformed` is fatal to the connection that produced the frame.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("frame is incomplete")]
    Incomplete,

    #[error("malformed packet: {0}")]
    Malformed(&'static str),
}
