//! # Frame Codec
//!
//! Tokio codec halves that frame and encrypt packets with a [`RollingIv`].
//!
//! ## Wire Format
//! ```text
//! [Header(4)] [Encrypted payload(N)]
//! ```
//! The header is produced and checked by the rolling IV of the direction. The
//! payload is passed through the six-round cipher first when enabled, then the
//! rolling cipher; decoding reverses that order.
//!
//! Encoder and decoder are separate types so the send and receive paths of a
//! connection each own their direction's IV outright.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::crypto::custom::CustomCrypto;
use crate::crypto::rolling_iv::{RollingIv, HEADER_LENGTH};
use crate::error::{ProtocolError, Result};

/// Largest payload a 16-bit header length can announce
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// Encrypting half of the frame codec.
#[derive(Debug)]
pub struct FrameEncoder {
    iv: RollingIv,
    custom_crypto: bool,
    max_payload: usize,
}

impl FrameEncoder {
    pub fn new(iv: RollingIv, custom_crypto: bool) -> Self {
        Self {
            iv,
            custom_crypto,
            max_payload: MAX_FRAME_PAYLOAD,
        }
    }

    /// Reject payloads above `max_payload` (never above [`MAX_FRAME_PAYLOAD`]).
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.min(MAX_FRAME_PAYLOAD);
        self
    }

    pub fn iv(&self) -> &RollingIv {
        &self.iv
    }
}

impl Encoder<Bytes> for FrameEncoder {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_payload {
            return Err(ProtocolError::OversizedPacket(item.len()));
        }

        let header = self.iv.construct_header(item.len())?;
        dst.reserve(HEADER_LENGTH + item.len());
        dst.put_slice(&header);

        let start = dst.len();
        dst.put_slice(&item);
        let body = &mut dst[start..];
        if self.custom_crypto {
            CustomCrypto::encrypt(body);
        }
        self.iv.transform(body)
    }
}

/// Decrypting half of the frame codec.
#[derive(Debug)]
pub struct FrameDecoder {
    iv: RollingIv,
    custom_crypto: bool,
    max_payload: usize,
}

impl FrameDecoder {
    pub fn new(iv: RollingIv, custom_crypto: bool) -> Self {
        Self {
            iv,
            custom_crypto,
            max_payload: MAX_FRAME_PAYLOAD,
        }
    }

    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.min(MAX_FRAME_PAYLOAD);
        self
    }

    pub fn iv(&self) -> &RollingIv {
        &self.iv
    }
}

impl Decoder for FrameDecoder {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>> {
        if src.len() < HEADER_LENGTH {
            return Ok(None);
        }

        if !self.iv.validate_header(&src[..HEADER_LENGTH]) {
            warn!("Rejected packet header for the current IV");
            return Err(ProtocolError::InvalidHeader);
        }

        let length = RollingIv::packet_length(&src[..HEADER_LENGTH])?;
        if length > self.max_payload {
            return Err(ProtocolError::OversizedPacket(length));
        }

        let total = HEADER_LENGTH + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LENGTH);
        let mut body = src.split_to(length);
        self.iv.transform(&mut body)?;
        if self.custom_crypto {
            CustomCrypto::decrypt(&mut body);
        }
        Ok(Some(body))
    }
}
