//! Circular bit rotation on single bytes.
//!
//! Both ciphers in this crate are built from these two primitives. The shift
//! count is always taken modulo 8, so every `(byte, count)` pair is valid input.

/// Rotates `value` left by `count mod 8` bit positions.
#[inline]
pub fn roll_left(value: u8, count: u32) -> u8 {
    value.rotate_left(count & 7)
}

/// Rotates `value` right by `count mod 8` bit positions.
#[inline]
pub fn roll_right(value: u8, count: u32) -> u8 {
    value.rotate_right(count & 7)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations_are_inverse() {
        for value in 0..=u8::MAX {
            for count in 0..8 {
                assert_eq!(roll_right(roll_left(value, count), count), value);
                assert_eq!(roll_left(roll_right(value, count), count), value);
            }
        }
    }

    #[test]
    fn known_rotations() {
        assert_eq!(roll_left(0b1000_0001, 1), 0b0000_0011);
        assert_eq!(roll_right(0b1000_0001, 1), 0b1100_0000);
        assert_eq!(roll_left(0x12, 4), 0x21);
    }

    #[test]
    fn count_wraps_modulo_eight() {
        assert_eq!(roll_left(0x5A, 11), roll_left(0x5A, 3));
        assert_eq!(roll_right(0x5A, 255), roll_right(0x5A, 7));
        assert_eq!(roll_left(0x5A, 8), 0x5A);
    }
}
