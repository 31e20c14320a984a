pub mod codec;
pub mod error;
pub mod message;
pub mod protocol;
pub mod qos;
pub mod returncode;
pub mod topic;

/// A specialized `Result` type for codec operations.
pub type Result<T> = std::result::Result<T, crate::error::Error>;
