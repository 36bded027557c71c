//! # Table-Substitution Rolling Cipher
//!
//! A 256-entry substitution table combined with a 4-byte IV. Every transformed
//! byte advances a private working copy of the IV, so the output of one byte
//! keys the next. The caller's IV is never touched by a segment transform;
//! advancing the per-packet IV is a separate [`CryptoTransform::shuffle_iv`] step.
//!
//! The table is reference counted and never mutated, so one table serves every
//! direction of every connection.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::{constants, ProtocolError, Result};

/// Length of every IV handled by the rolling ciphers
pub const IV_LENGTH: usize = 4;

/// IV the per-packet shuffle starts from before mixing in the previous IV
pub const DEFAULT_INITIAL_IV: [u8; IV_LENGTH] = [0xF2, 0x53, 0x50, 0xC6];

static STANDARD_TABLE: Lazy<SubstitutionTable> =
    Lazy::new(|| SubstitutionTable(Arc::new(build_standard_table())));

// Affine step, rotation and xor are each bijective on a byte, so the result is a permutation.
const fn build_standard_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let affine = (i as u8).wrapping_mul(0xA7).wrapping_add(0x3B);
        table[i] = affine.rotate_left(3) ^ 0x5C;
        i += 1;
    }
    table
}

/// Immutable 256-byte permutation shared by reference.
#[derive(Clone, PartialEq, Eq)]
pub struct SubstitutionTable(Arc<[u8; 256]>);

impl SubstitutionTable {
    /// Wrap a table, rejecting anything that is not a permutation of `0..=255`.
    pub fn new(table: [u8; 256]) -> Result<Self> {
        let mut seen = [false; 256];
        for &entry in table.iter() {
            if seen[entry as usize] {
                return Err(ProtocolError::InvalidArgument(
                    constants::ERR_TABLE_NOT_PERMUTATION.into(),
                ));
            }
            seen[entry as usize] = true;
        }
        Ok(Self(Arc::new(table)))
    }

    /// The built-in table. Every call shares the same allocation.
    pub fn standard() -> Self {
        STANDARD_TABLE.clone()
    }

    #[inline]
    pub fn get(&self, index: u8) -> u8 {
        self.0[index as usize]
    }

    pub fn as_bytes(&self) -> &[u8; 256] {
        &self.0
    }

    /// Whether both handles point at the same table allocation
    pub fn shares_storage(&self, other: &SubstitutionTable) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SubstitutionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubstitutionTable")
            .field("head", &&self.0[..8])
            .finish_non_exhaustive()
    }
}

/// A byte transform keyed by a rolling 4-byte IV.
pub trait CryptoTransform: Send + Sync + fmt::Debug {
    /// Transform `data[start..end]` in place using a working copy of `iv`.
    ///
    /// # Errors
    /// `InvalidArgument` when `iv` is not exactly [`IV_LENGTH`] bytes or the
    /// bounds do not fit `data`.
    fn transform_segment(
        &self,
        data: &mut [u8],
        iv: &[u8],
        start: usize,
        end: usize,
    ) -> Result<()>;

    /// Advance a per-packet IV to its next value.
    fn shuffle_iv(&self, iv: &mut [u8; IV_LENGTH]);

    /// Transform the whole buffer.
    fn transform(&self, data: &mut [u8], iv: &[u8]) -> Result<()> {
        let end = data.len();
        self.transform_segment(data, iv, 0, end)
    }
}

/// Shared state of the table-driven transforms: the table and the IV that
/// seeds every per-packet shuffle.
#[derive(Debug, Clone)]
pub struct TableCipher {
    table: SubstitutionTable,
    initial_iv: [u8; IV_LENGTH],
}

impl TableCipher {
    pub fn new(table: SubstitutionTable, initial_iv: [u8; IV_LENGTH]) -> Self {
        Self { table, initial_iv }
    }

    pub fn table(&self) -> &SubstitutionTable {
        &self.table
    }

    /// One diffusion step: a pure function of the current IV, `input` and the table.
    pub fn shuffle_iv_step(&self, iv: &mut [u8; IV_LENGTH], input: u8) {
        let table = &self.table;

        let mut a = iv[1];
        let mut b = table.get(a).wrapping_sub(input);
        iv[0] = iv[0].wrapping_add(b);

        b = iv[2] ^ table.get(input);
        a = a.wrapping_sub(b);
        iv[1] = a;

        a = iv[3];
        b = table.get(a).wrapping_add(input) ^ iv[2];
        a = a.wrapping_sub(iv[0]);
        iv[2] = b;
        iv[3] = a.wrapping_add(table.get(input));

        let mixed = u32::from_le_bytes(*iv).rotate_left(3);
        *iv = mixed.to_le_bytes();
    }

    /// Rebuild `iv` from the initial IV fed with the four bytes of the old one.
    pub fn shuffle_iv(&self, iv: &mut [u8; IV_LENGTH]) {
        let mut shuffled = self.initial_iv;
        for &byte in iv.iter() {
            self.shuffle_iv_step(&mut shuffled, byte);
        }
        *iv = shuffled;
    }

    fn working_iv(iv: &[u8], start: usize, end: usize, len: usize) -> Result<[u8; IV_LENGTH]> {
        let working = <[u8; IV_LENGTH]>::try_from(iv)
            .map_err(|_| ProtocolError::InvalidArgument(constants::ERR_IV_LENGTH.into()))?;
        if start > end || end > len {
            return Err(ProtocolError::InvalidArgument(
                constants::ERR_SEGMENT_BOUNDS.into(),
            ));
        }
        Ok(working)
    }
}

// Swaps each adjacent bit pair; an involution.
#[inline]
fn pair_swap(x: u8) -> u8 {
    let b = (x >> 1) & 0x55;
    let a = (x & 0xD5) << 1;
    a | b
}

/// Decrypting side of the table-substitution cipher.
#[derive(Debug, Clone)]
pub struct KmstDecryptor {
    cipher: TableCipher,
}

impl KmstDecryptor {
    pub fn new(table: SubstitutionTable, initial_iv: [u8; IV_LENGTH]) -> Self {
        Self {
            cipher: TableCipher::new(table, initial_iv),
        }
    }
}

impl CryptoTransform for KmstDecryptor {
    fn transform_segment(
        &self,
        data: &mut [u8],
        iv: &[u8],
        start: usize,
        end: usize,
    ) -> Result<()> {
        let mut step_iv = TableCipher::working_iv(iv, start, end, data.len())?;
        for byte in &mut data[start..end] {
            let x = *byte ^ self.cipher.table.get(step_iv[0]);
            *byte = pair_swap(x).rotate_left(4);

            // the transformed byte drives the next step
            self.cipher.shuffle_iv_step(&mut step_iv, *byte);
        }
        Ok(())
    }

    fn shuffle_iv(&self, iv: &mut [u8; IV_LENGTH]) {
        self.cipher.shuffle_iv(iv);
    }
}

/// Encrypting side, the exact inverse of [`KmstDecryptor`].
///
/// The working IV advances with the plaintext byte, which is the byte the
/// peer's decryptor outputs, so both ends walk the same IV sequence.
#[derive(Debug, Clone)]
pub struct KmstEncryptor {
    cipher: TableCipher,
}

impl KmstEncryptor {
    pub fn new(table: SubstitutionTable, initial_iv: [u8; IV_LENGTH]) -> Self {
        Self {
            cipher: TableCipher::new(table, initial_iv),
        }
    }
}

impl CryptoTransform for KmstEncryptor {
    fn transform_segment(
        &self,
        data: &mut [u8],
        iv: &[u8],
        start: usize,
        end: usize,
    ) -> Result<()> {
        let mut step_iv = TableCipher::working_iv(iv, start, end, data.len())?;
        for byte in &mut data[start..end] {
            let plain = *byte;
            *byte = pair_swap(plain.rotate_left(4)) ^ self.cipher.table.get(step_iv[0]);

            self.cipher.shuffle_iv_step(&mut step_iv, plain);
        }
        Ok(())
    }

    fn shuffle_iv(&self, iv: &mut [u8; IV_LENGTH]) {
        self.cipher.shuffle_iv(iv);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decryptor() -> KmstDecryptor {
        KmstDecryptor::new(SubstitutionTable::standard(), DEFAULT_INITIAL_IV)
    }

    fn encryptor() -> KmstEncryptor {
        KmstEncryptor::new(SubstitutionTable::standard(), DEFAULT_INITIAL_IV)
    }

    #[test]
    fn standard_table_is_permutation() {
        let table = SubstitutionTable::standard();
        assert!(SubstitutionTable::new(*table.as_bytes()).is_ok());
        assert!(table.shares_storage(&SubstitutionTable::standard()));
    }

    #[test]
    fn duplicate_entries_rejected() {
        let mut raw = *SubstitutionTable::standard().as_bytes();
        raw[1] = raw[0];
        assert!(matches!(
            SubstitutionTable::new(raw),
            Err(ProtocolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn pair_swap_is_involution() {
        for x in 0..=u8::MAX {
            assert_eq!(pair_swap(pair_swap(x)), x);
        }
        assert_eq!(pair_swap(0b1000_0000), 0b0100_0000);
        assert_eq!(pair_swap(0b0000_0001), 0b0000_0010);
    }

    #[test]
    fn decrypt_first_byte_matches_bit_sequence() {
        let iv = [0x10, 0x20, 0x30, 0x40];
        let mut data = [0xABu8];
        decryptor().transform(&mut data, &iv).unwrap();

        let x = 0xAB ^ SubstitutionTable::standard().get(0x10);
        let b = (x >> 1) & 0x55;
        let a = (x & 0xD5) << 1;
        let r = a | b;
        assert_eq!(data[0], (r >> 4) | (r << 4));
    }

    #[test]
    fn wrong_iv_length_rejected() {
        let mut data = [1u8, 2, 3];
        for iv in [&[][..], &[1, 2, 3][..], &[1, 2, 3, 4, 5][..]] {
            assert!(matches!(
                decryptor().transform_segment(&mut data, iv, 0, 3),
                Err(ProtocolError::InvalidArgument(_))
            ));
            assert!(matches!(
                encryptor().transform_segment(&mut data, iv, 5, 1),
                Err(ProtocolError::InvalidArgument(_))
            ));
        }
        assert_eq!(data, [1, 2, 3]);
    }

    #[test]
    fn bad_bounds_rejected() {
        let mut data = [0u8; 4];
        let iv = [1, 2, 3, 4];
        assert!(decryptor().transform_segment(&mut data, &iv, 3, 2).is_err());
        assert!(decryptor().transform_segment(&mut data, &iv, 0, 5).is_err());
    }

    #[test]
    fn caller_iv_untouched_and_segment_respected() {
        let iv = [9u8, 8, 7, 6];
        let mut data = [0x55u8; 8];
        decryptor().transform_segment(&mut data, &iv, 2, 6).unwrap();
        assert_eq!(iv, [9, 8, 7, 6]);
        assert_eq!(&data[..2], &[0x55, 0x55]);
        assert_eq!(&data[6..], &[0x55, 0x55]);
    }

    #[test]
    fn encrypt_then_decrypt_restores() {
        let iv = [0xDE, 0xAD, 0xBE, 0xEF];
        let original: Vec<u8> = (0..=255u8).collect();
        let mut data = original.clone();
        encryptor().transform(&mut data, &iv).unwrap();
        assert_ne!(data, original);
        decryptor().transform(&mut data, &iv).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn shuffle_is_deterministic_and_moves() {
        let cipher = TableCipher::new(SubstitutionTable::standard(), DEFAULT_INITIAL_IV);
        let mut a = [1u8, 2, 3, 4];
        let mut b = [1u8, 2, 3, 4];
        cipher.shuffle_iv(&mut a);
        cipher.shuffle_iv(&mut b);
        assert_eq!(a, b);
        assert_ne!(a, [1, 2, 3, 4]);
    }
}
