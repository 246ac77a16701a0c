use bitcoin_hashes::{hash160, Hash};
use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::Sha512;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::keys::{public_key_to_address, Address};

/// First hardened child index (2^31).
pub const HARDENED_BIT: u32 = 0x80000000;

/// BIP44 purpose segment.
pub const BIP44_PURPOSE: u32 = 44;

/// Ethereum coin type (SLIP-0044).
pub const ETHEREUM_COIN_TYPE: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("invalid derivation path: {0}")]
    InvalidPath(String),
    #[error("invalid seed length {0}: expected 16 to 64 bytes")]
    InvalidSeedLength(usize),
    #[error("derived key is not a valid secp256k1 private key")]
    InvalidChildKey,
    #[error("HMAC operation failed")]
    HmacError,
}

/// Splits a combined index into (hardened, plain index).
pub fn split_index(combined: u32) -> (bool, u32) {
    if combined >= HARDENED_BIT {
        (true, combined - HARDENED_BIT)
    } else {
        (false, combined)
    }
}

/// Which child derivation routine to run for a given parent key.
///
/// `Legacy` reproduces the behaviour of older BIP32 implementations that fed
/// the parent private key into the hardened HMAC input without its leading
/// zero bytes. It only differs from `Standard` for parents whose private key
/// starts with `0x00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationScheme {
    Standard,
    Legacy,
}

/// Represents a BIP32 extended key, containing both private and public components
#[derive(Clone)]
pub struct ExtendedKey {
    pub private_key: SecretKey,
    pub public_key: PublicKey,
    pub chain_code: [u8; 32],
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_number: u32,
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("public_key", &self.public_key)
            .field("depth", &self.depth)
            .field("parent_fingerprint", &hex::encode(self.parent_fingerprint))
            .field("child_number", &self.child_number)
            .finish_non_exhaustive()
    }
}

impl ExtendedKey {
    /// Creates a new master key from a seed
    pub fn from_seed(seed: &[u8]) -> Result<Self, DerivationError> {
        if seed.len() < 16 || seed.len() > 64 {
            return Err(DerivationError::InvalidSeedLength(seed.len()));
        }

        let secp = Secp256k1::new();

        // HMAC-SHA512 with key "Bitcoin seed"
        let mut hmac = Hmac::<Sha512>::new_from_slice(b"Bitcoin seed")
            .map_err(|_| DerivationError::HmacError)?;

        hmac.update(seed);
        let result = hmac.finalize().into_bytes();

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&result[32..64]);

        let private_key = SecretKey::from_slice(&result[0..32])
            .map_err(|_| DerivationError::InvalidChildKey)?;

        let public_key = PublicKey::from_secret_key(&secp, &private_key);

        Ok(ExtendedKey {
            private_key,
            public_key,
            chain_code,
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_number: 0,
        })
    }

    /// Whether this key's private key serializes to fewer than 32 significant
    /// bytes, which is the condition under which legacy hardened derivation
    /// diverges from BIP32.
    pub fn has_short_private_key(&self) -> bool {
        self.private_key.secret_bytes()[0] == 0
    }

    /// Picks the derivation routine for children of this key.
    ///
    /// Short keys take the standard routine; every other key takes the legacy
    /// one, which is byte-for-byte identical to BIP32 for full-length keys.
    pub fn compatible_scheme(&self) -> DerivationScheme {
        if self.has_short_private_key() {
            DerivationScheme::Standard
        } else {
            DerivationScheme::Legacy
        }
    }

    /// Derives a child key based on the provided index
    pub fn derive_child(&self, index: u32) -> Result<Self, DerivationError> {
        self.derive_child_with(index, DerivationScheme::Standard)
    }

    /// Derives a child key, laying out the hardened HMAC input per `scheme`.
    pub fn derive_child_with(
        &self,
        index: u32,
        scheme: DerivationScheme,
    ) -> Result<Self, DerivationError> {
        let secp = Secp256k1::new();

        // 33 bytes of key material followed by the big-endian index
        let mut data = [0u8; 37];

        if index & HARDENED_BIT != 0 {
            let secret = self.private_key.secret_bytes();
            match scheme {
                DerivationScheme::Standard => data[1..33].copy_from_slice(&secret),
                DerivationScheme::Legacy => {
                    let significant = secret
                        .iter()
                        .position(|b| *b != 0)
                        .map_or(&secret[32..], |start| &secret[start..]);
                    data[1..1 + significant.len()].copy_from_slice(significant);
                }
            }
        } else {
            data[0..33].copy_from_slice(&self.public_key.serialize());
        }

        data[33..37].copy_from_slice(&index.to_be_bytes());

        let mut hmac = Hmac::<Sha512>::new_from_slice(&self.chain_code)
            .map_err(|_| DerivationError::HmacError)?;

        hmac.update(&data);
        let result = hmac.finalize().into_bytes();

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&result[32..64]);

        // IL must be a valid scalar, and parent + IL must not be zero
        let tweak = SecretKey::from_slice(&result[0..32])
            .map_err(|_| DerivationError::InvalidChildKey)?;
        let child_private_key = self
            .private_key
            .add_tweak(&Scalar::from(tweak))
            .map_err(|_| DerivationError::InvalidChildKey)?;

        let child_public_key = PublicKey::from_secret_key(&secp, &child_private_key);

        Ok(ExtendedKey {
            private_key: child_private_key,
            public_key: child_public_key,
            chain_code,
            depth: self.depth.saturating_add(1),
            parent_fingerprint: self.fingerprint(),
            child_number: index,
        })
    }

    /// Calculates the fingerprint of this key
    pub fn fingerprint(&self) -> [u8; 4] {
        let mut result = [0u8; 4];
        let hash = hash160::Hash::hash(&self.public_key.serialize());
        result.copy_from_slice(&hash.to_byte_array()[0..4]);
        result
    }
}

/// Represents a BIP32 derivation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    indices: Vec<u32>,
}

impl DerivationPath {
    pub fn from_indices(indices: Vec<u32>) -> Self {
        DerivationPath { indices }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Derives a key following this path, choosing the derivation routine
    /// separately for every parent along the way.
    pub fn derive(&self, root: &ExtendedKey) -> Result<ExtendedKey, DerivationError> {
        let mut key = root.clone();

        for &index in &self.indices {
            key = key.derive_child_with(index, key.compatible_scheme())?;
        }

        Ok(key)
    }
}

impl FromStr for DerivationPath {
    type Err = DerivationError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let invalid = || DerivationError::InvalidPath(path.to_string());

        let mut components = path.split('/');
        if components.next() != Some("m") {
            return Err(invalid());
        }

        let indices = components
            .map(|component| {
                let (index_str, hardened) = match component
                    .strip_suffix('\'')
                    .or_else(|| component.strip_suffix('h'))
                {
                    Some(stripped) => (stripped, true),
                    None => (component, false),
                };

                if index_str.is_empty() || !index_str.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }

                match index_str.parse::<u32>() {
                    Ok(index) if index < HARDENED_BIT => {
                        Ok(if hardened { index | HARDENED_BIT } else { index })
                    }
                    _ => Err(invalid()),
                }
            })
            .collect::<Result<Vec<u32>, _>>()?;

        Ok(DerivationPath { indices })
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for &index in &self.indices {
            match split_index(index) {
                (true, plain) => write!(f, "/{}'", plain)?,
                (false, plain) => write!(f, "/{}", plain)?,
            }
        }
        Ok(())
    }
}

/// Builds `m/44'/60'/{account}'/0/{address}[']` for a combined address index.
///
/// # Panics
///
/// If `account_index` is itself in the hardened range, the path cannot be
/// represented and this panics.
pub fn address_derivation_path(account_index: u32, combined_index: u32) -> DerivationPath {
    let (hardened, plain) = split_index(combined_index);
    let path = format!(
        "m/{}'/{}'/{}'/0/{}{}",
        BIP44_PURPOSE,
        ETHEREUM_COIN_TYPE,
        account_index,
        plain,
        if hardened { "'" } else { "" }
    );
    match path.parse() {
        Ok(parsed) => parsed,
        Err(err) => panic!("internally built derivation path must parse: {}", err),
    }
}

/// The key material of a freshly derived child, before it is wrapped into an
/// address entity.
#[derive(Clone)]
pub struct RawDerived {
    pub address: Address,
    pub private_key: SecretKey,
    pub public_key: PublicKey,
}

/// Walks the address path for `combined_index` starting at `account_key`.
pub fn derive_address_key(
    account_key: &ExtendedKey,
    account_index: u32,
    combined_index: u32,
) -> Result<RawDerived, DerivationError> {
    let path = address_derivation_path(account_index, combined_index);
    debug!(path = %path, "deriving child key");

    let derived = path.derive(account_key)?;

    Ok(RawDerived {
        address: public_key_to_address(&derived.public_key),
        private_key: derived.private_key,
        public_key: derived.public_key,
    })
}
