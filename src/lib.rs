//! # gamewire
//!
//! Wire core for game-server connections: a table-substitution rolling cipher
//! with per-packet IV diffusion, an optional six-round byte cipher, 4-byte
//! rolling-IV packet headers, a big-endian packet builder, and async socket
//! descriptors that close a connection exactly once.
//!
//! ## Layout
//! - [`crypto`]: byte rotation, both ciphers, rolling IVs and endpoint crypto
//! - [`core`]: packet builder, packet reader and the frame codec
//! - [`protocol`]: the plaintext hello that carries the IV seeds
//! - [`transport`]: send/receive descriptors and the session that owns them
//! - [`service`]: keep-alive pings
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics
//!
//! ## Example
//! ```rust
//! use gamewire::crypto::endpoint::{client_crypto, server_crypto};
//! use gamewire::config::NetworkConfig;
//!
//! let factory = NetworkConfig::default().crypto.factory();
//! let mut client = client_crypto(&factory, &[1, 2, 3, 4], &[5, 6, 7, 8]).unwrap();
//! let mut server = server_crypto(&factory, &[1, 2, 3, 4], &[5, 6, 7, 8]).unwrap();
//!
//! let mut packet = b"hello".to_vec();
//! client.encrypt(&mut packet).unwrap();
//! server.decrypt(&mut packet).unwrap();
//! assert_eq!(packet, b"hello");
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::builder::PacketBuilder;
pub use crate::core::reader::PacketReader;
pub use crate::error::{ProtocolError, Result};
pub use crate::transport::Session;
