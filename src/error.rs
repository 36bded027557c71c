//! # Error Types
//!
//! Error handling for the cipher stack, packet framing and socket descriptors.
//!
//! ## Error Categories
//! - **Argument Errors**: absent or wrong-sized values, non-positive pad lengths
//! - **Range Errors**: strings that do not fit their wire field
//! - **Builder Errors**: writes to a released packet builder
//! - **Socket Errors**: faults reported by a completed socket operation
//! - **Cancellation**: locally aborted operations (expected, never a fault)
//! - **Framing Errors**: bad headers, oversized or truncated packets
//!
//! Argument, range and builder errors are raised synchronously and end the call
//! that raised them. Socket faults are routed through the descriptor that owns the
//! operation. `Aborted` is the only variant callers are expected to swallow.
//!
//! ## Example Usage
//! ```rust
//! use gamewire::core::builder::PacketBuilder;
//! use gamewire::error::{ProtocolError, Result};
//!
//! fn name_field(name: &str) -> Result<Vec<u8>> {
//!     let mut builder = PacketBuilder::new();
//!     builder.write_padded_string(name, 13)?;
//!     builder.to_bytes()
//! }
//!
//! assert!(name_field("short").is_ok());
//! assert!(matches!(
//!     name_field("much-too-long-name"),
//!     Err(ProtocolError::OutOfRange(_))
//! ));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Cipher argument errors
    pub const ERR_IV_LENGTH: &str = "IV must be exactly 4 bytes long";
    pub const ERR_IV_MISSING: &str = "IV seed is missing";
    pub const ERR_SEGMENT_BOUNDS: &str = "Segment bounds fall outside the data buffer";
    pub const ERR_TABLE_NOT_PERMUTATION: &str = "Substitution table is not a permutation";

    /// Packet builder errors
    pub const ERR_PAD_LENGTH: &str = "The pad length must be a positive number";
    pub const ERR_PADDED_TOO_LONG: &str = "The string is not shorter than the pad length";
    pub const ERR_LENGTH_STRING_TOO_LONG: &str = "The string does not fit a 16-bit length field";

    /// Packet reader errors
    pub const ERR_INCOMPLETE_PACKET: &str = "Packet ended before the field was complete";
    pub const ERR_INVALID_UTF8: &str = "String field is not valid UTF-8";

    /// Descriptor state errors
    pub const ERR_OPERATION_PENDING: &str = "An operation is already pending on this descriptor";

    /// Connection errors
    pub const ERR_HANDSHAKE_TIMEOUT: &str = "Handshake timed out";
}

/// ProtocolError is the primary error type for all wire-core operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Packet builder used after release")]
    UseAfterRelease,

    #[error("Socket fault: {0:?}")]
    SocketFault(io::ErrorKind),

    #[error("Operation aborted")]
    Aborted,

    #[error("Invalid packet header")]
    InvalidHeader,

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Incomplete packet: {0}")]
    IncompletePacket(String),

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Whether this error is a locally initiated cancellation
    pub fn is_aborted(&self) -> bool {
        matches!(self, ProtocolError::Aborted)
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let err: ProtocolError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, ProtocolError::Io(_)));
        assert!(!err.is_aborted());
    }

    #[test]
    fn aborted_is_recognised() {
        assert!(ProtocolError::Aborted.is_aborted());
        assert_eq!(ProtocolError::Aborted.to_string(), "Operation aborted");
    }
}
