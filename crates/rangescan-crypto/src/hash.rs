//! Hash functions for fingerprint derivation

use sha2::{Digest, Sha256};
use ripemd::Ripemd160;

/// 20-byte RIPEMD160(SHA256(x)) digest
pub type Hash160 = [u8; 20];

/// SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Double SHA-256 (Base58Check checksums)
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160 hash
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash160: SHA256 then RIPEMD160
pub fn hash160(data: &[u8]) -> Hash160 {
    ripemd160(&sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let result = sha256(b"hello");
        assert_eq!(
            hex::encode(result),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_ripemd160_empty() {
        assert_eq!(
            hex::encode(ripemd160(b"")),
            "9c1185a5c5e9fc54612808977ee8f548b2258d31"
        );
    }

    #[test]
    fn test_hash160() {
        let pubkey = hex::decode("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798").unwrap();
        let h160 = hash160(&pubkey);
        assert_eq!(
            hex::encode(h160),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }
}
