//! # Protocol Layer
//!
//! Connection setup ahead of the encrypted packet stream.
//!
//! ## Components
//! - **Handshake**: the clear-text hello carrying the protocol version and both IV seeds

pub mod handshake;
