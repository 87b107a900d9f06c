//! Provides a little-endian uint -> bytes conversion, as used when computing
//! seeds, domains and shuffling positions.

use bytes::{BufMut, BytesMut};

/// Returns `int` as little-endian bytes with a length of 4.
pub fn int_to_bytes4(int: u32) -> [u8; 4] {
    int.to_le_bytes()
}

/// Returns `int` as little-endian bytes with a length of 8.
pub fn int_to_bytes8(int: u64) -> Vec<u8> {
    let mut bytes = BytesMut::with_capacity(8);
    bytes.put_u64_le(int);
    bytes.to_vec()
}

/// Returns `int` as little-endian bytes with a length of 32.
pub fn int_to_bytes32(int: u64) -> Vec<u8> {
    let mut bytes = BytesMut::with_capacity(32);
    bytes.put_u64_le(int);
    bytes.resize(32, 0);
    bytes.to_vec()
}

/// Returns `int` as little-endian bytes with a length of 32, as a fixed array.
pub fn int_to_fixed_bytes32(int: u64) -> [u8; 32] {
    let mut bytes = [0; 32];
    bytes[0..8].copy_from_slice(&int.to_le_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_to_bytes4_le() {
        assert_eq!(int_to_bytes4(0x01020304), [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn int_to_bytes8_le() {
        assert_eq!(
            int_to_bytes8(0x0102030405060708),
            vec![0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn int_to_bytes32_pads_with_zeroes() {
        let bytes = int_to_bytes32(1);
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[0], 1);
        assert!(bytes[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn fixed_bytes32_matches_vec_form() {
        for int in [0, 1, u64::MAX, 0xdead_beef] {
            assert_eq!(int_to_bytes32(int), int_to_fixed_bytes32(int).to_vec());
        }
    }
}
