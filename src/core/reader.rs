//! # Packet Reader
//!
//! Cursor over a received packet body, the read-side mirror of
//! [`PacketBuilder`](crate::core::builder::PacketBuilder).

use crate::error::{constants, ProtocolError, Result};

#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Borrow the next `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(ProtocolError::IncompletePacket(format!(
                "{} (wanted {count}, {} left)",
                constants::ERR_INCOMPLETE_PACKET,
                self.remaining()
            )));
        }
        let data = self.data;
        let start = self.position;
        self.position += count;
        Ok(&data[start..self.position])
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.take::<8>().map(i64::from_be_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.take::<4>().map(i32::from_be_bytes)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.take::<2>().map(i16::from_be_bytes)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.take::<2>().map(u16::from_be_bytes)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        self.take::<1>().map(|[b]| b)
    }

    /// Any non-zero byte reads as true.
    pub fn read_bool(&mut self) -> Result<bool> {
        self.read_byte().map(|b| b != 0)
    }

    pub fn read_length_string(&mut self) -> Result<String> {
        let length = usize::from(self.read_u16()?);
        let bytes = self.read_bytes(length)?;
        decode_utf8(bytes)
    }

    /// Read a `pad_length`-byte field and cut it at the first zero byte.
    pub fn read_padded_string(&mut self, pad_length: usize) -> Result<String> {
        let field = self.read_bytes(pad_length)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        decode_utf8(&field[..end])
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| ProtocolError::IncompletePacket(constants::ERR_INVALID_UTF8.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::PacketBuilder;

    #[test]
    fn reads_what_the_builder_wrote() {
        let mut builder = PacketBuilder::new();
        builder.write_i64(-5).unwrap();
        builder.write_i32(70_000).unwrap();
        builder.write_i16(-300).unwrap();
        builder.write_bool(true).unwrap();
        builder.write_length_string("hello").unwrap();
        builder.write_padded_string("name", 13).unwrap();
        let bytes = builder.to_bytes().unwrap();

        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_i64().unwrap(), -5);
        assert_eq!(reader.read_i32().unwrap(), 70_000);
        assert_eq!(reader.read_i16().unwrap(), -300);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_length_string().unwrap(), "hello");
        assert_eq!(reader.read_padded_string(13).unwrap(), "name");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn short_input_is_incomplete() {
        let mut reader = PacketReader::new(&[0, 5, b'a']);
        assert!(matches!(
            reader.read_length_string(),
            Err(ProtocolError::IncompletePacket(_))
        ));
        let mut reader = PacketReader::new(&[1, 2, 3]);
        assert!(reader.read_i32().is_err());
        assert_eq!(reader.position(), 0);
    }
}
