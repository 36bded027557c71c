//! # Cipher Stack
//!
//! Byte-level transforms applied to every packet body.
//!
//! ## Components
//! - **Bits**: circular byte rotation shared by both ciphers
//! - **Custom**: six-round, length-keyed feedback cipher
//! - **Transform**: substitution table and the table-substitution rolling cipher
//! - **Rolling IV**: per-direction IV state, version masking and packet headers
//! - **Endpoint**: the encrypt/decrypt IV pair of one connection
//!
//! ## Ordering
//! A rolling IV depends on every packet before it in its direction, so each
//! direction must be driven by exactly one caller at a time. The two directions
//! of a connection share nothing mutable.

pub mod bits;
pub mod custom;
pub mod endpoint;
pub mod rolling_iv;
pub mod transform;

pub use custom::CustomCrypto;
pub use endpoint::{client_crypto, server_crypto, EndpointCrypto};
pub use rolling_iv::{RollingIv, RollingIvFactory, VersionMask};
pub use transform::{CryptoTransform, KmstDecryptor, KmstEncryptor, SubstitutionTable};
