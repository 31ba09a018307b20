//! secp256k1 key derivation and SEC1 public-key encodings

use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand::rngs::OsRng;
use thiserror::Error;

use crate::hash::{hash160, Hash160};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secp256k1Error {
    /// Scalar is zero or not below the group order
    #[error("Invalid private key")]
    InvalidPrivateKey,
}

/// Length of a compressed SEC1 public key (0x02/0x03 || x)
pub const COMPRESSED_LEN: usize = 33;
/// Length of an uncompressed SEC1 public key (0x04 || x || y)
pub const UNCOMPRESSED_LEN: usize = 65;

/// A secp256k1 keypair derived from a 32-byte big-endian scalar
#[derive(Clone)]
pub struct Secp256k1Keypair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Secp256k1Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let secret_key = SecretKey::random(&mut OsRng);
        let public_key = secret_key.public_key();
        Self { secret_key, public_key }
    }

    /// Derive from a raw 32-byte private key.
    ///
    /// Fails for zero and for values at or above the group order.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, Secp256k1Error> {
        let secret_key = SecretKey::from_bytes(bytes.into())
            .map_err(|_| Secp256k1Error::InvalidPrivateKey)?;
        let public_key = secret_key.public_key();
        Ok(Self { secret_key, public_key })
    }

    /// Get the private key as bytes
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.secret_key.to_bytes().into()
    }

    /// Get the uncompressed public key (65 bytes: 0x04 || x || y)
    pub fn public_key_uncompressed(&self) -> [u8; UNCOMPRESSED_LEN] {
        let point = self.public_key.to_encoded_point(false);
        let mut result = [0u8; UNCOMPRESSED_LEN];
        result.copy_from_slice(point.as_bytes());
        result
    }

    /// Get the compressed public key (33 bytes: 0x02/0x03 || x)
    pub fn public_key_compressed(&self) -> [u8; COMPRESSED_LEN] {
        let point = self.public_key.to_encoded_point(true);
        let mut result = [0u8; COMPRESSED_LEN];
        result.copy_from_slice(point.as_bytes());
        result
    }

    /// hash160 of the compressed encoding
    pub fn fingerprint_compressed(&self) -> Hash160 {
        hash160(self.public_key.to_encoded_point(true).as_bytes())
    }

    /// hash160 of the uncompressed encoding
    pub fn fingerprint_uncompressed(&self) -> Hash160 {
        hash160(self.public_key.to_encoded_point(false).as_bytes())
    }
}

/// Check that `bytes` parses as a SEC1 public key of either encoding.
pub fn is_valid_public_key(bytes: &[u8]) -> bool {
    match bytes.len() {
        COMPRESSED_LEN if bytes[0] == 0x02 || bytes[0] == 0x03 => {}
        UNCOMPRESSED_LEN if bytes[0] == 0x04 => {}
        _ => return false,
    }
    PublicKey::from_sec1_bytes(bytes).is_ok()
}
