//! # Rolling IV
//!
//! Per-direction IV state. A [`RollingIv`] transforms one packet and then
//! advances its IV in the same call, so callers never see a half-advanced
//! state. Instances are created by a [`RollingIvFactory`] and are never shared
//! between directions or connections.
//!
//! ## Header Format
//! ```text
//! [Version ^ IV(2)] [Version ^ IV ^ Length(2)]   (big-endian)
//! ```

use std::sync::Arc;

use tracing::trace;

use crate::crypto::transform::{
    CryptoTransform, KmstDecryptor, KmstEncryptor, SubstitutionTable, IV_LENGTH,
};
use crate::error::{constants, ProtocolError, Result};

/// Length of the header produced by [`RollingIv::construct_header`]
pub const HEADER_LENGTH: usize = 4;

/// Seed byte flipped by [`VersionMask::Complement`]
pub const VERSION_BYTE_INDEX: usize = 0;

/// One-time transform applied to a raw seed when a [`RollingIv`] is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMask {
    None,
    Complement,
}

impl VersionMask {
    /// Derive the usable IV from a raw seed.
    pub fn apply_to_seed(self, mut seed: [u8; IV_LENGTH]) -> [u8; IV_LENGTH] {
        if self == VersionMask::Complement {
            seed[VERSION_BYTE_INDEX] = !seed[VERSION_BYTE_INDEX];
        }
        seed
    }

    /// Derive the header version mask from the protocol version.
    pub fn apply_to_version(self, version: u16) -> u16 {
        match self {
            VersionMask::None => version,
            VersionMask::Complement => !version,
        }
    }
}

/// A 4-byte IV together with the transform that consumes and advances it.
#[derive(Debug)]
pub struct RollingIv {
    algorithm: Arc<dyn CryptoTransform>,
    iv: [u8; IV_LENGTH],
    version_mask: u16,
}

impl RollingIv {
    fn new(
        algorithm: Arc<dyn CryptoTransform>,
        seed: &[u8],
        mask: VersionMask,
        version: u16,
    ) -> Result<Self> {
        if seed.is_empty() {
            return Err(ProtocolError::InvalidArgument(constants::ERR_IV_MISSING.into()));
        }
        let seed = <[u8; IV_LENGTH]>::try_from(seed)
            .map_err(|_| ProtocolError::InvalidArgument(constants::ERR_IV_LENGTH.into()))?;

        Ok(Self {
            algorithm,
            iv: mask.apply_to_seed(seed),
            version_mask: mask.apply_to_version(version),
        })
    }

    /// Transform `data` in place with the current IV, then advance the IV.
    pub fn transform(&mut self, data: &mut [u8]) -> Result<()> {
        self.algorithm.transform(data, &self.iv)?;
        self.algorithm.shuffle_iv(&mut self.iv);
        trace!(bytes = data.len(), "Rolling IV advanced");
        Ok(())
    }

    /// Current IV value
    pub fn iv(&self) -> [u8; IV_LENGTH] {
        self.iv
    }

    /// Build the header announcing a payload of `length` bytes.
    ///
    /// # Errors
    /// `OversizedPacket` when `length` does not fit the 16-bit length field.
    pub fn construct_header(&self, length: usize) -> Result<[u8; HEADER_LENGTH]> {
        let length = u16::try_from(length).map_err(|_| ProtocolError::OversizedPacket(length))?;

        let encoded_version = self.iv_high() ^ self.version_mask;
        let encoded_length = encoded_version ^ length;

        let [v0, v1] = encoded_version.to_be_bytes();
        let [l0, l1] = encoded_length.to_be_bytes();
        Ok([v0, v1, l0, l1])
    }

    /// Whether `header` was produced for the current IV and version.
    pub fn validate_header(&self, header: &[u8]) -> bool {
        if header.len() < HEADER_LENGTH {
            return false;
        }
        let encoded_version = u16::from_be_bytes([header[0], header[1]]);
        encoded_version ^ self.version_mask == self.iv_high()
    }

    /// Payload length announced by `header`.
    pub fn packet_length(header: &[u8]) -> Result<usize> {
        if header.len() < HEADER_LENGTH {
            return Err(ProtocolError::InvalidHeader);
        }
        let encoded_version = u16::from_be_bytes([header[0], header[1]]);
        let encoded_length = u16::from_be_bytes([header[2], header[3]]);
        Ok(usize::from(encoded_version ^ encoded_length))
    }

    fn iv_high(&self) -> u16 {
        u16::from_be_bytes([self.iv[2], self.iv[3]])
    }
}

/// Creates the encryption-side and decryption-side [`RollingIv`]s of a connection.
#[derive(Debug, Clone)]
pub struct RollingIvFactory {
    encrypt_algorithm: Arc<dyn CryptoTransform>,
    decrypt_algorithm: Arc<dyn CryptoTransform>,
    version: u16,
}

impl RollingIvFactory {
    pub fn new(
        encrypt_algorithm: Arc<dyn CryptoTransform>,
        decrypt_algorithm: Arc<dyn CryptoTransform>,
        version: u16,
    ) -> Self {
        Self {
            encrypt_algorithm,
            decrypt_algorithm,
            version,
        }
    }

    /// Factory over the table-substitution cipher pair.
    pub fn kmst(table: SubstitutionTable, initial_iv: [u8; IV_LENGTH], version: u16) -> Self {
        Self::new(
            Arc::new(KmstEncryptor::new(table.clone(), initial_iv)),
            Arc::new(KmstDecryptor::new(table, initial_iv)),
            version,
        )
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    /// # Errors
    /// `InvalidArgument` when the seed is missing or not 4 bytes.
    pub fn create_encrypt_iv(&self, seed: &[u8], mask: VersionMask) -> Result<RollingIv> {
        RollingIv::new(self.encrypt_algorithm.clone(), seed, mask, self.version)
    }

    /// # Errors
    /// `InvalidArgument` when the seed is missing or not 4 bytes.
    pub fn create_decrypt_iv(&self, seed: &[u8], mask: VersionMask) -> Result<RollingIv> {
        RollingIv::new(self.decrypt_algorithm.clone(), seed, mask, self.version)
    }
}
