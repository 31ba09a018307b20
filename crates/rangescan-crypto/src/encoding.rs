//! Base58Check, WIF and P2PKH address encoding

use thiserror::Error;

use crate::hash::{double_sha256, Hash160};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid checksum")]
    InvalidChecksum,
    #[error("Invalid character in input")]
    InvalidCharacter,
    #[error("Invalid length")]
    InvalidLength,
}

/// Mainnet P2PKH version byte
pub const P2PKH_VERSION: u8 = 0x00;
/// Mainnet WIF version byte
pub const WIF_VERSION: u8 = 0x80;
/// Testnet WIF version byte
pub const WIF_TESTNET_VERSION: u8 = 0xEF;

/// Base58Check encode (Bitcoin-style with 4-byte checksum)
pub fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len() + 4);
    data.push(version);
    data.extend_from_slice(payload);

    let checksum = double_sha256(&data);
    data.extend_from_slice(&checksum[..4]);

    bs58::encode(data).into_string()
}

/// Base58Check decode, returns (version, payload)
pub fn base58check_decode(input: &str) -> Result<(u8, Vec<u8>), EncodingError> {
    let data = bs58::decode(input)
        .into_vec()
        .map_err(|_| EncodingError::InvalidCharacter)?;

    if data.len() < 5 {
        return Err(EncodingError::InvalidLength);
    }

    let (payload_with_version, checksum) = data.split_at(data.len() - 4);
    let computed_checksum = &double_sha256(payload_with_version)[..4];

    if checksum != computed_checksum {
        return Err(EncodingError::InvalidChecksum);
    }

    let version = payload_with_version[0];
    let payload = payload_with_version[1..].to_vec();

    Ok((version, payload))
}

/// Encode WIF (Wallet Import Format) for private key
pub fn wif_encode(private_key: &[u8; 32], compressed: bool, mainnet: bool) -> String {
    let version = if mainnet { WIF_VERSION } else { WIF_TESTNET_VERSION };

    if compressed {
        let mut payload = [0u8; 33];
        payload[..32].copy_from_slice(private_key);
        payload[32] = 0x01;
        base58check_encode(version, &payload)
    } else {
        base58check_encode(version, private_key)
    }
}

/// Mainnet P2PKH address for a hash160
pub fn p2pkh_address(fingerprint: &Hash160) -> String {
    base58check_encode(P2PKH_VERSION, fingerprint)
}

/// Decode a Base58Check address into its 20-byte hash, dropping the version.
pub fn address_to_hash160(address: &str) -> Result<Hash160, EncodingError> {
    let (_version, payload) = base58check_decode(address)?;
    payload
        .as_slice()
        .try_into()
        .map_err(|_| EncodingError::InvalidLength)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_one() -> [u8; 32] {
        let mut pk = [0u8; 32];
        pk[31] = 1;
        pk
    }

    #[test]
    fn test_base58check_detects_corruption() {
        let encoded = base58check_encode(0x00, &[7u8; 20]);
        let mut chars: Vec<char> = encoded.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '2' { '3' } else { '2' };
        let corrupted: String = chars.into_iter().collect();
        assert_eq!(
            base58check_decode(&corrupted),
            Err(EncodingError::InvalidChecksum)
        );
        assert_eq!(base58check_decode("0OIl"), Err(EncodingError::InvalidCharacter));
        assert_eq!(base58check_decode("1"), Err(EncodingError::InvalidLength));
    }

    #[test]
    fn test_wif_encode() {
        assert_eq!(
            wif_encode(&key_one(), true, true),
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"
        );
        assert_eq!(
            wif_encode(&key_one(), false, true),
            "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf"
        );
    }

    #[test]
    fn test_p2pkh_address() {
        let mut h160 = [0u8; 20];
        hex::decode_to_slice("751e76e8199196d454941c45d1b3a323f1433bd6", &mut h160).unwrap();
        assert_eq!(p2pkh_address(&h160), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert_eq!(
            address_to_hash160("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH").unwrap(),
            h160
        );
    }

    #[test]
    fn test_address_wrong_payload_length() {
        let encoded = base58check_encode(0x00, &[1u8; 19]);
        assert_eq!(address_to_hash160(&encoded), Err(EncodingError::InvalidLength));
    }
}
