//! 256-bit private-key scalars and keyspace bounds

use primitive_types::U256;
use thiserror::Error;

/// secp256k1 group order N (little-endian limbs)
pub const CURVE_ORDER: U256 = U256([
    0xBFD2_5E8C_D036_4141,
    0xBAAE_DCE6_AF48_A03B,
    0xFFFF_FFFF_FFFF_FFFE,
    0xFFFF_FFFF_FFFF_FFFF,
]);

/// Largest valid private key, N - 1
pub const MAX_SCALAR: U256 = U256([
    0xBFD2_5E8C_D036_4140,
    0xBAAE_DCE6_AF48_A03B,
    0xFFFF_FFFF_FFFF_FFFE,
    0xFFFF_FFFF_FFFF_FFFF,
]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScalarError {
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Bit length must be in 1..=256, got {0}")]
    InvalidBits(u32),
    #[error("Invalid bit range: {0}")]
    InvalidRange(String),
}

/// Whether `value` is a usable private key, i.e. in `[1, N-1]`.
#[inline]
pub fn is_valid_scalar(value: &U256) -> bool {
    !value.is_zero() && *value <= MAX_SCALAR
}

/// Clamp into `[1, N-1]`.
pub fn clamp_scalar(value: U256) -> U256 {
    if value.is_zero() {
        U256::one()
    } else if value > MAX_SCALAR {
        MAX_SCALAR
    } else {
        value
    }
}

/// Big-endian 32-byte encoding written into a reusable buffer
#[inline]
pub fn write_be_bytes(value: &U256, out: &mut [u8; 32]) {
    value.to_big_endian(out);
}

pub fn to_be_bytes(value: &U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

/// Zero-padded 64-char lowercase hex, the canonical key representation
pub fn to_hex64(value: &U256) -> String {
    rangescan_crypto::hex::encode(to_be_bytes(value))
}

/// `2^(bits-1)`, the smallest integer with exactly `bits` bits.
pub fn bit_floor(bits: u32) -> Result<U256, ScalarError> {
    if !(1..=256).contains(&bits) {
        return Err(ScalarError::InvalidBits(bits));
    }
    Ok(U256::one() << (bits as usize - 1))
}

/// `2^bits - 1`, the largest integer with at most `bits` bits.
pub fn bit_ceiling(bits: u32) -> Result<U256, ScalarError> {
    if !(1..=256).contains(&bits) {
        return Err(ScalarError::InvalidBits(bits));
    }
    if bits == 256 {
        return Ok(U256::MAX);
    }
    Ok((U256::one() << bits as usize) - U256::one())
}

/// Parse a bit range: `"66"` is `[2^65, 2^66-1]`, `"10:20"` is `[2^9, 2^20-1]`.
///
/// The result is clamped into the valid keyspace.
pub fn parse_bit_range(input: &str) -> Result<(U256, U256), ScalarError> {
    let input = input.trim();
    let parse_bits = |s: &str| -> Result<u32, ScalarError> {
        s.trim()
            .parse::<u32>()
            .map_err(|_| ScalarError::InvalidRange(input.to_string()))
    };

    let (low_bits, high_bits) = match input.split_once(':') {
        Some((low, high)) => (parse_bits(low)?, parse_bits(high)?),
        None => {
            let bits = parse_bits(input)?;
            (bits, bits)
        }
    };
    if low_bits > high_bits {
        return Err(ScalarError::InvalidRange(input.to_string()));
    }

    let start = clamp_scalar(bit_floor(low_bits)?);
    let end = clamp_scalar(bit_ceiling(high_bits)?);
    Ok((start, end))
}

/// Parse a decimal or `0x`-prefixed hex scalar.
pub fn parse_scalar(input: &str) -> Result<U256, ScalarError> {
    let input = input.trim();
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_dec_str(input).ok(),
    };
    parsed.ok_or_else(|| ScalarError::InvalidNumber(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_order_constant() {
        assert_eq!(
            to_hex64(&CURVE_ORDER),
            "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141"
        );
        assert_eq!(MAX_SCALAR + U256::one(), CURVE_ORDER);
    }

    #[test]
    fn test_validity() {
        assert!(!is_valid_scalar(&U256::zero()));
        assert!(is_valid_scalar(&U256::one()));
        assert!(is_valid_scalar(&MAX_SCALAR));
        assert!(!is_valid_scalar(&CURVE_ORDER));
        assert_eq!(clamp_scalar(U256::zero()), U256::one());
        assert_eq!(clamp_scalar(U256::MAX), MAX_SCALAR);
    }

    #[test]
    fn test_bit_range() {
        let (start, end) = parse_bit_range("66").unwrap();
        assert_eq!(start, U256::one() << 65usize);
        assert_eq!(end, (U256::one() << 66usize) - U256::one());

        let (start, end) = parse_bit_range("10:20").unwrap();
        assert_eq!(start, U256::from(512u64));
        assert_eq!(end, U256::from(1_048_575u64));

        let (start, end) = parse_bit_range("1:256").unwrap();
        assert_eq!(start, U256::one());
        assert_eq!(end, MAX_SCALAR);

        assert!(parse_bit_range("20:10").is_err());
        assert!(parse_bit_range("0").is_err());
        assert!(parse_bit_range("abc").is_err());
    }

    #[test]
    fn test_parse_scalar() {
        assert_eq!(parse_scalar("255").unwrap(), U256::from(255u64));
        assert_eq!(parse_scalar("0xff").unwrap(), U256::from(255u64));
        assert!(parse_scalar("zz").is_err());
    }

    #[test]
    fn test_hex64() {
        let hex = to_hex64(&U256::one());
        assert_eq!(hex.len(), 64);
        assert!(hex.ends_with("01"));
    }
}
