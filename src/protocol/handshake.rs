//! Connection hello exchanged in clear before any packet is encrypted.
//!
//! The server draws both IV seeds, announces them with its protocol version,
//! and both ends build their [`EndpointCrypto`](crate::crypto::EndpointCrypto)
//! from the same pair.
//!
//! ## Wire Format
//! ```text
//! [BodyLength(2)] [Version(2)] [PatchLength(2)] [Patch(N)] [ClientIv(4)] [ServerIv(4)] [Locale(1)]
//! ```

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};

use crate::core::builder::PacketBuilder;
use crate::core::reader::PacketReader;
use crate::crypto::transform::IV_LENGTH;
use crate::error::{ProtocolError, Result};

/// Upper bound on a hello body; anything larger is not a hello
pub const MAX_HELLO_LENGTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub version: u16,
    pub patch_location: String,
    pub client_iv: [u8; IV_LENGTH],
    pub server_iv: [u8; IV_LENGTH],
    pub locale: u8,
}

/// Draw a fresh IV seed from the operating system RNG.
pub fn generate_seed() -> Result<[u8; IV_LENGTH]> {
    let mut seed = [0u8; IV_LENGTH];
    getrandom::fill(&mut seed)
        .map_err(|e| ProtocolError::Io(io::Error::other(e.to_string())))?;
    Ok(seed)
}

impl Hello {
    /// A hello with freshly drawn seeds for both directions.
    pub fn generate(version: u16, patch_location: impl Into<String>, locale: u8) -> Result<Self> {
        Ok(Self {
            version,
            patch_location: patch_location.into(),
            client_iv: generate_seed()?,
            server_iv: generate_seed()?,
            locale,
        })
    }

    /// Serialize including the leading body length.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut body = PacketBuilder::new();
        body.write_u16(self.version)?;
        body.write_length_string(&self.patch_location)?;
        body.write_bytes(&self.client_iv)?;
        body.write_bytes(&self.server_iv)?;
        body.write_byte(self.locale)?;
        let body = body.finish()?;

        if body.len() > MAX_HELLO_LENGTH {
            return Err(ProtocolError::OversizedPacket(body.len()));
        }

        let mut framed = PacketBuilder::with_capacity(body.len() + 2);
        framed.write_u16(body.len() as u16)?;
        framed.write_bytes(&body)?;
        framed.to_bytes()
    }

    /// Parse a hello body (without the length prefix).
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut reader = PacketReader::new(body);
        let version = reader.read_u16()?;
        let patch_location = reader.read_length_string()?;

        let mut client_iv = [0u8; IV_LENGTH];
        client_iv.copy_from_slice(reader.read_bytes(IV_LENGTH)?);
        let mut server_iv = [0u8; IV_LENGTH];
        server_iv.copy_from_slice(reader.read_bytes(IV_LENGTH)?);
        let locale = reader.read_byte()?;

        Ok(Self {
            version,
            patch_location,
            client_iv,
            server_iv,
            locale,
        })
    }
}

#[instrument(skip_all, fields(version = hello.version))]
pub async fn write_hello<W>(writer: &mut W, hello: &Hello) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&hello.to_bytes()?).await?;
    writer.flush().await?;
    debug!("Hello sent");
    Ok(())
}

/// Read a hello and check it announces `expected_version`.
#[instrument(skip(reader))]
pub async fn read_hello<R>(reader: &mut R, expected_version: u16) -> Result<Hello>
where
    R: AsyncRead + Unpin,
{
    let length = usize::from(reader.read_u16().await?);
    if length > MAX_HELLO_LENGTH {
        return Err(ProtocolError::OversizedPacket(length));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    let hello = Hello::parse(&body)?;

    if hello.version != expected_version {
        warn!(announced = hello.version, "Peer speaks another protocol version");
        return Err(ProtocolError::UnsupportedVersion(hello.version));
    }
    debug!("Hello received");
    Ok(hello)
}
