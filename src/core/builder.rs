//! # Packet Builder
//!
//! Append-only, big-endian serialization of packet fields.
//!
//! A builder is created per outgoing packet. Once [`PacketBuilder::release`]d
//! every further call fails with `UseAfterRelease`.
//!
//! ## Example
//! ```rust
//! use gamewire::core::builder::PacketBuilder;
//!
//! let mut builder = PacketBuilder::new();
//! builder.write_i32(1).unwrap();
//! builder.write_byte(2).unwrap();
//! assert_eq!(builder.to_bytes().unwrap(), vec![0, 0, 0, 1, 2]);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{constants, ProtocolError, Result};

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct PacketBuilder {
    buffer: Option<BytesMut>,
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Some(BytesMut::with_capacity(capacity)),
        }
    }

    fn buffer(&mut self) -> Result<&mut BytesMut> {
        self.buffer.as_mut().ok_or(ProtocolError::UseAfterRelease)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.buffer()?.put_i64(value);
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.buffer()?.put_i32(value);
        Ok(())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.buffer()?.put_i16(value);
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.buffer()?.put_u16(value);
        Ok(())
    }

    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        self.buffer()?.put_u8(value);
        Ok(())
    }

    /// Writes `1` for true and `0` for false.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.buffer()?.put_u8(u8::from(value));
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer()?.put_slice(bytes);
        Ok(())
    }

    /// Writes a 2-byte big-endian byte length followed by the UTF-8 bytes.
    ///
    /// # Errors
    /// `OutOfRange` when the encoded string is longer than `u16::MAX` bytes.
    pub fn write_length_string(&mut self, value: &str) -> Result<()> {
        let buffer = self.buffer()?;
        let length = u16::try_from(value.len()).map_err(|_| {
            ProtocolError::OutOfRange(constants::ERR_LENGTH_STRING_TOO_LONG.into())
        })?;
        buffer.put_u16(length);
        buffer.put_slice(value.as_bytes());
        Ok(())
    }

    /// Writes exactly `pad_length` bytes: the UTF-8 string, then zeros.
    ///
    /// At least one zero byte always follows the string.
    ///
    /// # Errors
    /// - `InvalidArgument` when `pad_length` is not positive
    /// - `OutOfRange` when the encoded string is not shorter than `pad_length`
    pub fn write_padded_string(&mut self, value: &str, pad_length: i32) -> Result<()> {
        let buffer = self.buffer()?;
        if pad_length <= 0 {
            return Err(ProtocolError::InvalidArgument(format!(
                "{}: {pad_length}",
                constants::ERR_PAD_LENGTH
            )));
        }
        let pad_length = pad_length as usize;
        if value.len() >= pad_length {
            return Err(ProtocolError::OutOfRange(
                constants::ERR_PADDED_TOO_LONG.into(),
            ));
        }

        buffer.put_slice(value.as_bytes());
        buffer.put_bytes(0, pad_length - value.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.as_ref().map_or(0, BytesMut::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact-length copy of everything written so far.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.buffer
            .as_ref()
            .map(|buffer| buffer.to_vec())
            .ok_or(ProtocolError::UseAfterRelease)
    }

    /// Consume the builder and hand its buffer over without copying.
    pub fn finish(mut self) -> Result<Bytes> {
        self.buffer
            .take()
            .map(BytesMut::freeze)
            .ok_or(ProtocolError::UseAfterRelease)
    }

    /// Drop the buffer. The builder is unusable afterwards.
    pub fn release(&mut self) {
        self.buffer = None;
    }

    pub fn is_released(&self) -> bool {
        self.buffer.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut builder = PacketBuilder::new();
        builder.write_i64(0x0102_0304_0506_0708).unwrap();
        builder.write_i16(-2).unwrap();
        builder.write_bool(true).unwrap();
        builder.write_bool(false).unwrap();
        assert_eq!(
            builder.to_bytes().unwrap(),
            vec![1, 2, 3, 4, 5, 6, 7, 8, 0xFF, 0xFE, 1, 0]
        );
    }

    #[test]
    fn snapshot_has_no_slack() {
        let mut builder = PacketBuilder::with_capacity(1024);
        builder.write_i32(1).unwrap();
        builder.write_byte(2).unwrap();
        let bytes = builder.to_bytes().unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x01, 0x02]);
        assert_eq!(bytes.len(), 5);
    }

    #[test]
    fn length_string_counts_utf8_bytes() {
        let mut builder = PacketBuilder::new();
        builder.write_length_string("hé").unwrap();
        assert_eq!(builder.to_bytes().unwrap(), vec![0, 3, b'h', 0xC3, 0xA9]);
    }

    #[test]
    fn overlong_length_string_fails_without_writing() {
        let mut builder = PacketBuilder::new();
        let long = "x".repeat(usize::from(u16::MAX) + 1);
        assert!(matches!(
            builder.write_length_string(&long),
            Err(ProtocolError::OutOfRange(_))
        ));
        assert!(builder.is_empty());
    }

    #[test]
    fn padded_string_rules() {
        let mut builder = PacketBuilder::new();
        assert!(matches!(
            builder.write_padded_string("abc", 3),
            Err(ProtocolError::OutOfRange(_))
        ));
        assert!(matches!(
            builder.write_padded_string("abc", 0),
            Err(ProtocolError::InvalidArgument(_))
        ));
        assert!(matches!(
            builder.write_padded_string("abc", -1),
            Err(ProtocolError::InvalidArgument(_))
        ));
        builder.write_padded_string("abc", 4).unwrap();
        assert_eq!(builder.to_bytes().unwrap(), vec![b'a', b'b', b'c', 0]);
    }

    #[test]
    fn released_builder_rejects_everything() {
        let mut builder = PacketBuilder::new();
        builder.write_byte(1).unwrap();
        builder.release();
        assert!(builder.is_released());
        assert!(matches!(builder.write_byte(1), Err(ProtocolError::UseAfterRelease)));
        assert!(matches!(builder.write_i64(1), Err(ProtocolError::UseAfterRelease)));
        assert!(matches!(
            builder.write_padded_string("a", 0),
            Err(ProtocolError::UseAfterRelease)
        ));
        assert!(matches!(builder.to_bytes(), Err(ProtocolError::UseAfterRelease)));
        assert!(matches!(builder.finish(), Err(ProtocolError::UseAfterRelease)));
    }
}
