//! Unsigned LEB128 varints as used by multiformats and protobuf.

/// Maximum number of bytes a `u64` varint can occupy.
pub(crate) const MAX_VARINT_BYTES: usize = 10;

/// Appends `value` to `buf` as an unsigned LEB128 varint.
pub(crate) fn push_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Returns the number of bytes `value` occupies once encoded.
pub(crate) fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Why a varint could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintError {
    /// More than ten bytes without a terminating byte.
    TooLong,
    /// The input ended while the continuation bit was still set.
    UnexpectedEof,
}

/// Decodes an unsigned LEB128 varint from the start of `buf`.
///
/// Returns the value and the number of bytes consumed.
pub(crate) fn decode_varint(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_VARINT_BYTES {
            return Err(VarintError::TooLong);
        }

        result |= u64::from(byte & 0x7F) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(VarintError::UnexpectedEof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, &[0x00])]
    #[case(1, &[0x01])]
    #[case(127, &[0x7F])]
    #[case(128, &[0x80, 0x01])]
    #[case(300, &[0xAC, 0x02])]
    #[case(16384, &[0x80, 0x80, 0x01])]
    fn test_encode(#[case] value: u64, #[case] expected: &[u8]) {
        let mut buf = Vec::new();
        push_varint(&mut buf, value);
        assert_eq!(buf, expected);
        assert_eq!(varint_len(value), expected.len());
        assert_eq!(decode_varint(expected), Ok((value, expected.len())));
    }

    #[test]
    fn test_max_value_fits_in_ten_bytes() {
        let mut buf = Vec::new();
        push_varint(&mut buf, u64::MAX);
        assert_eq!(buf.len(), MAX_VARINT_BYTES);
        assert_eq!(varint_len(u64::MAX), MAX_VARINT_BYTES);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode_varint(&[0x80, 0x80]), Err(VarintError::UnexpectedEof));
        assert_eq!(decode_varint(&[]), Err(VarintError::UnexpectedEof));
        assert_eq!(decode_varint(&[0xFF; 11]), Err(VarintError::TooLong));
    }
}
