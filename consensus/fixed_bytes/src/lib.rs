use alloy_primitives::FixedBytes;
use safe_arith::SafeArith;

pub type Hash64 = alloy_primitives::B64;
pub type Hash256 = alloy_primitives::B256;
pub type Uint256 = alloy_primitives::U256;
pub type Address = alloy_primitives::Address;

/// Extension trait providing the conversions that `ethereum-types` offered and
/// `alloy_primitives` does not.
pub trait FixedBytesExtended {
    fn from_low_u64_be(value: u64) -> Self;
    fn from_low_u64_le(value: u64) -> Self;
    fn zero() -> Self;
}

impl<const N: usize> FixedBytesExtended for FixedBytes<N> {
    fn from_low_u64_be(value: u64) -> Self {
        let value_bytes = value.to_be_bytes();
        let mut buffer = [0x0; N];
        let bytes_to_copy = value_bytes.len().min(N);
        // Panic-free because bytes_to_copy <= buffer.len()
        let start_index = buffer
            .len()
            .safe_sub(bytes_to_copy)
            .expect("bytes_to_copy <= buffer.len()");
        // Panic-free because start_index <= buffer.len()
        // and bytes_to_copy <= value_bytes.len()
        buffer
            .get_mut(start_index..)
            .expect("start_index <= buffer.len()")
            .copy_from_slice(
                value_bytes
                    .get(value_bytes.len().safe_sub(bytes_to_copy).expect(
                        "bytes_to_copy <= value_bytes.len()",
                    )..)
                    .expect("always in bounds"),
            );
        Self::from(buffer)
    }

    fn from_low_u64_le(value: u64) -> Self {
        let value_bytes = value.to_le_bytes();
        let mut buffer = [0x0; N];
        let bytes_to_copy = value_bytes.len().min(N);
        buffer
            .get_mut(..bytes_to_copy)
            .expect("bytes_to_copy <= buffer.len()")
            .copy_from_slice(value_bytes.get(..bytes_to_copy).expect("always in bounds"));
        Self::from(buffer)
    }

    fn zero() -> Self {
        Self::ZERO
    }
}

impl FixedBytesExtended for alloy_primitives::Address {
    fn from_low_u64_be(value: u64) -> Self {
        FixedBytes::<20>::from_low_u64_be(value).into()
    }

    fn from_low_u64_le(value: u64) -> Self {
        FixedBytes::<20>::from_low_u64_le(value).into()
    }

    fn zero() -> Self {
        FixedBytes::<20>::zero().into()
    }
}

/// Extension trait for `Uint256`, matching the `primitive-types` API.
pub trait UintExtended {
    fn to_i64(self) -> i64;
}

impl UintExtended for Uint256 {
    /// Trims the `Uint256` to its lowest 8 bytes and interprets them as an `i64`.
    fn to_i64(self) -> i64 {
        i64::from_le_bytes(self.to_le_bytes::<32>()[0..8].try_into().expect("8 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_low_u64_be_uses_lowest_bytes() {
        let hash = Hash256::from_low_u64_be(0x0102_0304_0506_0708);
        assert_eq!(&hash.as_slice()[24..], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(hash.as_slice()[..24].iter().all(|b| *b == 0));
    }

    #[test]
    fn from_low_u64_le_uses_lowest_bytes() {
        let hash = Hash256::from_low_u64_le(0x0102_0304_0506_0708);
        assert_eq!(&hash.as_slice()[..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert!(hash.as_slice()[8..].iter().all(|b| *b == 0));
    }

    #[test]
    fn zero_is_all_zeroes() {
        assert_eq!(Hash256::zero(), Hash256::default());
        assert_eq!(Address::zero(), Address::default());
    }

    #[test]
    fn uint256_to_i64_round_trip() {
        assert_eq!(Uint256::from(1234u64).to_i64(), 1234);
        assert_eq!(Uint256::ZERO.to_i64(), 0);
    }
}
