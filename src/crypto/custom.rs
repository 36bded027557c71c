//! # Six-Round Feedback Cipher
//!
//! A length-keyed, feedback-chained byte transform applied in place.
//!
//! Encryption runs six rounds numbered `0..6`: even rounds walk the buffer
//! forward, odd rounds walk it backward. Decryption numbers its rounds `1..=6`,
//! so it begins with the inverse of the last (odd) encryption round and the
//! parity of every round is offset by one. That offset is part of the wire
//! format.
//!
//! Each round starts from the buffer length truncated to a byte and decrements
//! it (wrapping) after every processed byte.

use crate::crypto::bits::{roll_left, roll_right};

const EVEN_ADDEND: u8 = 0x48;
const ODD_MASK: u8 = 0x13;
const ROUNDS: usize = 6;

/// Stateless six-round cipher.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomCrypto;

impl CustomCrypto {
    /// Encrypts `data` in place. An empty buffer is left untouched.
    pub fn encrypt(data: &mut [u8]) {
        let length_byte = data.len() as u8;
        for round in 0..ROUNDS {
            if round & 1 != 0 {
                odd_encrypt(data, length_byte);
            } else {
                even_encrypt(data, length_byte);
            }
        }
    }

    /// Decrypts `data` in place. An empty buffer is left untouched.
    pub fn decrypt(data: &mut [u8]) {
        let length_byte = data.len() as u8;
        for round in 1..=ROUNDS {
            if round & 1 != 0 {
                odd_decrypt(data, length_byte);
            } else {
                even_decrypt(data, length_byte);
            }
        }
    }
}

fn even_encrypt(data: &mut [u8], mut length_byte: u8) {
    let mut remember = 0u8;
    for byte in data.iter_mut() {
        let mut current = roll_left(*byte, 3).wrapping_add(length_byte);
        current ^= remember;
        remember = current;

        current = roll_right(current, u32::from(length_byte));
        current = !current;
        *byte = current.wrapping_add(EVEN_ADDEND);

        length_byte = length_byte.wrapping_sub(1);
    }
}

fn odd_encrypt(data: &mut [u8], mut length_byte: u8) {
    let mut remember = 0u8;
    for byte in data.iter_mut().rev() {
        let mut current = roll_left(*byte, 4).wrapping_add(length_byte);
        current ^= remember;
        remember = current;

        current ^= ODD_MASK;
        *byte = roll_right(current, 3);

        length_byte = length_byte.wrapping_sub(1);
    }
}

fn even_decrypt(data: &mut [u8], mut length_byte: u8) {
    let mut remember = 0u8;
    for byte in data.iter_mut() {
        let mut current = !byte.wrapping_sub(EVEN_ADDEND);
        current = roll_left(current, u32::from(length_byte));

        let chained = current;
        current ^= remember;
        remember = chained;

        current = current.wrapping_sub(length_byte);
        *byte = roll_right(current, 3);

        length_byte = length_byte.wrapping_sub(1);
    }
}

fn odd_decrypt(data: &mut [u8], mut length_byte: u8) {
    let mut remember = 0u8;
    for byte in data.iter_mut().rev() {
        let mut current = roll_left(*byte, 3) ^ ODD_MASK;

        let chained = current;
        current ^= remember;
        remember = chained;

        current = current.wrapping_sub(length_byte);
        *byte = roll_right(current, 4);

        length_byte = length_byte.wrapping_sub(1);
    }
}
