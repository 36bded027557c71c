//! # Endpoint Crypto
//!
//! Pairs the two rolling IVs of one connection. The encryptor always carries
//! the local direction and the decryptor the remote one; neither operation
//! touches the other IV.
//!
//! Values are only obtainable through [`client_crypto`] and [`server_crypto`],
//! which validate every input.
//!
//! | side   | encryptor (local)       | decryptor (remote)      |
//! |--------|-------------------------|-------------------------|
//! | client | client seed, unmasked   | server seed, complement |
//! | server | server seed, complement | client seed, unmasked   |

use tracing::debug;

use crate::crypto::rolling_iv::{RollingIv, RollingIvFactory, VersionMask};
use crate::error::{ProtocolError, Result};

/// The encrypt/decrypt IV pair of a single connection.
#[derive(Debug)]
pub struct EndpointCrypto {
    encryptor: RollingIv,
    decryptor: RollingIv,
}

/// Crypto for the client end of a connection.
///
/// # Errors
/// `InvalidArgument` when either seed is missing or not 4 bytes long.
pub fn client_crypto(
    factory: &RollingIvFactory,
    client_iv: &[u8],
    server_iv: &[u8],
) -> Result<EndpointCrypto> {
    check_seed("client_iv", client_iv)?;
    check_seed("server_iv", server_iv)?;

    let encryptor = factory.create_encrypt_iv(client_iv, VersionMask::None)?;
    let decryptor = factory.create_decrypt_iv(server_iv, VersionMask::Complement)?;
    debug!(version = factory.version(), "Client crypto created");
    Ok(EndpointCrypto {
        encryptor,
        decryptor,
    })
}

/// Crypto for the server end of a connection.
///
/// # Errors
/// `InvalidArgument` when either seed is missing or not 4 bytes long.
pub fn server_crypto(
    factory: &RollingIvFactory,
    client_iv: &[u8],
    server_iv: &[u8],
) -> Result<EndpointCrypto> {
    check_seed("client_iv", client_iv)?;
    check_seed("server_iv", server_iv)?;

    let encryptor = factory.create_encrypt_iv(server_iv, VersionMask::Complement)?;
    let decryptor = factory.create_decrypt_iv(client_iv, VersionMask::None)?;
    debug!(version = factory.version(), "Server crypto created");
    Ok(EndpointCrypto {
        encryptor,
        decryptor,
    })
}

fn check_seed(name: &str, seed: &[u8]) -> Result<()> {
    if seed.is_empty() {
        return Err(ProtocolError::InvalidArgument(format!("{name} is missing")));
    }
    Ok(())
}

impl EndpointCrypto {
    /// Encrypt an outgoing buffer and advance the local IV.
    pub fn encrypt(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.encryptor.transform(buffer)
    }

    /// Decrypt an incoming buffer and advance the remote IV.
    pub fn decrypt(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.decryptor.transform(buffer)
    }

    pub fn encryptor(&self) -> &RollingIv {
        &self.encryptor
    }

    pub fn decryptor(&self) -> &RollingIv {
        &self.decryptor
    }

    /// Split into `(encryptor, decryptor)` for independent send and receive paths.
    pub fn into_parts(self) -> (RollingIv, RollingIv) {
        (self.encryptor, self.decryptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::transform::{SubstitutionTable, DEFAULT_INITIAL_IV};

    const CLIENT_IV: [u8; 4] = [0x11, 0x22, 0x33, 0x44];
    const SERVER_IV: [u8; 4] = [0xA1, 0xB2, 0xC3, 0xD4];

    fn factory() -> RollingIvFactory {
        RollingIvFactory::kmst(SubstitutionTable::standard(), DEFAULT_INITIAL_IV, 62)
    }

    #[test]
    fn client_and_server_interoperate() {
        let f = factory();
        let mut client = client_crypto(&f, &CLIENT_IV, &SERVER_IV).unwrap();
        let mut server = server_crypto(&f, &CLIENT_IV, &SERVER_IV).unwrap();

        for i in 0..4u8 {
            let request = vec![i; 20];
            let mut wire = request.clone();
            client.encrypt(&mut wire).unwrap();
            server.decrypt(&mut wire).unwrap();
            assert_eq!(wire, request);

            let reply = vec![i.wrapping_mul(3); 9];
            let mut wire = reply.clone();
            server.encrypt(&mut wire).unwrap();
            client.decrypt(&mut wire).unwrap();
            assert_eq!(wire, reply);
        }
    }

    #[test]
    fn directions_are_independent() {
        let f = factory();
        let mut client = client_crypto(&f, &CLIENT_IV, &SERVER_IV).unwrap();
        let before = client.decryptor().iv();
        client.encrypt(&mut [1, 2, 3]).unwrap();
        client.encrypt(&mut [4, 5, 6]).unwrap();
        assert_eq!(client.decryptor().iv(), before);

        let before = client.encryptor().iv();
        client.decrypt(&mut [7, 8]).unwrap();
        assert_eq!(client.encryptor().iv(), before);
    }

    #[test]
    fn masks_follow_the_side() {
        let f = factory();
        let client = client_crypto(&f, &CLIENT_IV, &SERVER_IV).unwrap();
        assert_eq!(client.encryptor().iv(), CLIENT_IV);
        assert_eq!(client.decryptor().iv(), [!0xA1, 0xB2, 0xC3, 0xD4]);

        let server = server_crypto(&f, &CLIENT_IV, &SERVER_IV).unwrap();
        assert_eq!(server.encryptor().iv(), [!0xA1, 0xB2, 0xC3, 0xD4]);
        assert_eq!(server.decryptor().iv(), CLIENT_IV);
    }

    #[test]
    fn missing_or_short_seeds_rejected() {
        let f = factory();
        assert!(matches!(
            client_crypto(&f, &[], &SERVER_IV),
            Err(ProtocolError::InvalidArgument(_))
        ));
        assert!(matches!(
            server_crypto(&f, &CLIENT_IV, &[]),
            Err(ProtocolError::InvalidArgument(_))
        ));
        assert!(matches!(
            client_crypto(&f, &CLIENT_IV, &[1, 2]),
            Err(ProtocolError::InvalidArgument(_))
        ));
    }
}
