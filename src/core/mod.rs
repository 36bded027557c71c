//! # Core Packet Components
//!
//! Packet construction, parsing and framing.
//!
//! ## Components
//! - **Builder**: big-endian, append-only field serialization
//! - **Reader**: the matching field parser for received packets
//! - **Codec**: Tokio codec halves that add the rolling-IV header and encrypt
//!
//! ## Wire Format
//! ```text
//! [Header(4)] [Payload(N)]
//! ```
//!
//! ## Security
//! - Maximum payload: 65535 bytes (16-bit header length)
//! - Header checked against the direction's IV before any allocation
//! - The declared length is authoritative; there is no terminator

pub mod builder;
pub mod codec;
pub mod reader;
