use secp256k1::PublicKey;
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

use crate::derivation::ExtendedKey;
use crate::error::WalletError;

/// Mainnet BIP32 version bytes for extended private keys (`xprv`).
const XPRV_VERSION: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4];
/// Mainnet BIP32 version bytes for extended public keys (`xpub`).
const XPUB_VERSION: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];

/// A 20-byte Ethereum-style account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Renders the address in EIP-55 mixed-case checksum form.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = Keccak256::digest(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            // High nibble for even positions, low nibble for odd ones
            let nibble = if i % 2 == 0 { hash[i / 2] >> 4 } else { hash[i / 2] & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = WalletError;

    /// Accepts 40 hex digits with an optional `0x` prefix, in any letter case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != 40 {
            return Err(WalletError::InvalidAddress(s.to_string()));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| WalletError::InvalidAddress(s.to_string()))?;
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

/// Keccak-256 of the uncompressed public key without its `0x04` prefix,
/// keeping the last 20 bytes.
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let key_bytes = public_key.serialize_uncompressed();
    let hash = Keccak256::digest(&key_bytes[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    Address(address)
}

impl ExtendedKey {
    /// Serialize extended private key (xprv)
    pub fn to_xprv(&self) -> String {
        let mut key_data = [0u8; 33];
        key_data[1..].copy_from_slice(&self.private_key.secret_bytes());
        self.serialize(XPRV_VERSION, &key_data)
    }

    /// Serialize extended public key (xpub)
    pub fn to_xpub(&self) -> String {
        self.serialize(XPUB_VERSION, &self.public_key.serialize())
    }

    fn serialize(&self, version: [u8; 4], key_data: &[u8; 33]) -> String {
        let mut data = Vec::with_capacity(78);
        data.extend_from_slice(&version);
        data.push(self.depth);
        data.extend_from_slice(&self.parent_fingerprint);
        data.extend_from_slice(&self.child_number.to_be_bytes());
        data.extend_from_slice(&self.chain_code);
        data.extend_from_slice(key_data);

        bs58::encode(&data).with_check().into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::HARDENED_BIT;
    use secp256k1::{Secp256k1, SecretKey};

    #[test]
    fn test_address_from_known_private_key() {
        // Private key 1 maps to the generator point
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let secret = SecretKey::from_slice(&secret).unwrap();
        let public = PublicKey::from_secret_key(&Secp256k1::new(), &secret);

        assert_eq!(
            public_key_to_address(&public).to_string(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn test_checksum_vectors() {
        // EIP-55 reference addresses
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let address: Address = expected.to_lowercase().parse().unwrap();
            assert_eq!(address.to_string(), expected);
        }
    }

    #[test]
    fn test_address_parsing() {
        let with_prefix: Address = "0x532147F0c3d63c66cB57B0bc6d552F1c2Ff68BeF".parse().unwrap();
        let without_prefix: Address = "532147f0c3d63c66cb57b0bc6d552f1c2ff68bef".parse().unwrap();
        assert_eq!(with_prefix, without_prefix);

        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz2147F0c3d63c66cB57B0bc6d552F1c2Ff68BeF".parse::<Address>().is_err());
    }

    #[test]
    fn test_extended_key_serialization() {
        // BIP32 test vector 1
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let master = ExtendedKey::from_seed(&seed).unwrap();

        assert_eq!(
            master.to_xprv(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(
            master.to_xpub(),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );

        let child = master.derive_child(HARDENED_BIT).unwrap();
        assert_eq!(
            child.to_xprv(),
            "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7"
        );
    }
}
