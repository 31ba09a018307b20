//! RangeScan Crypto Primitives
//!
//! Narrow secp256k1, hash160 and Base58Check capabilities used by the scan engine.

pub mod secp256k1;
pub mod hash;
pub mod encoding;

use thiserror::Error;

pub use self::secp256k1::{Secp256k1Keypair, Secp256k1Error};
pub use self::hash::{hash160, Hash160};

// Re-export dependencies for use by other crates
pub use bs58;
pub use hex;

/// A startup self-test did not reproduce a known vector
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("secp256k1 self-test failed: {0}")]
    Curve(&'static str),
    #[error("hash160 self-test failed")]
    Hash,
    #[error("Base58Check self-test failed")]
    Encoding,
}

const KEY_ONE_COMPRESSED_H160: &str = "751e76e8199196d454941c45d1b3a323f1433bd6";
const KEY_ONE_ADDRESS: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";
const KEY_ONE_WIF: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";

/// Verify that the curve, hash and encoding backends produce known vectors.
pub fn self_test() -> Result<(), CryptoError> {
    let mut key = [0u8; 32];
    key[31] = 1;

    let keypair = Secp256k1Keypair::from_bytes(&key)
        .map_err(|_| CryptoError::Curve("private key 1 rejected"))?;
    if Secp256k1Keypair::from_bytes(&[0u8; 32]).is_ok() {
        return Err(CryptoError::Curve("zero scalar accepted"));
    }

    let fingerprint = keypair.fingerprint_compressed();
    if hex::encode(fingerprint) != KEY_ONE_COMPRESSED_H160 {
        return Err(CryptoError::Hash);
    }

    if encoding::p2pkh_address(&fingerprint) != KEY_ONE_ADDRESS
        || encoding::wif_encode(&key, true, true) != KEY_ONE_WIF
    {
        return Err(CryptoError::Encoding);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_test_passes() {
        self_test().unwrap();
    }
}
