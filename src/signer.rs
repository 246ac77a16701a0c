use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::fmt;

use crate::error::{Result, WalletError};
use crate::keys::{public_key_to_address, Address};

/// Largest chain id whose EIP-155 `v` fits in a `u64` for every recovery
/// id (0 to 3).
const MAX_CHAIN_ID: u64 = (u64::MAX - 38) / 2;

/// A recoverable ECDSA signature with an EIP-155 `v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u64,
}

/// Signing context binding a private key to one chain id.
pub struct ChainSigner {
    secret_key: SecretKey,
    address: Address,
    chain_id: u64,
}

impl ChainSigner {
    pub fn new(secret_key: SecretKey, chain_id: u64) -> Result<Self> {
        if chain_id == 0 || chain_id > MAX_CHAIN_ID {
            return Err(WalletError::SignerConstructionFailed(format!(
                "unsupported chain id {}",
                chain_id
            )));
        }

        let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);

        Ok(ChainSigner {
            secret_key,
            address: public_key_to_address(&public_key),
            chain_id,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs a 32-byte digest, e.g. the Keccak-256 hash of an RLP-encoded
    /// transaction.
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<Signature> {
        let secp = Secp256k1::new();
        let message = Message::from_slice(hash)
            .map_err(|e| WalletError::SignerConstructionFailed(e.to_string()))?;

        let (recovery_id, compact) = secp
            .sign_ecdsa_recoverable(&message, &self.secret_key)
            .serialize_compact();

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        s.copy_from_slice(&compact[32..]);

        Ok(Signature {
            r,
            s,
            v: recovery_id.to_i32() as u64 + 35 + self.chain_id * 2,
        })
    }
}

impl fmt::Debug for ChainSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainSigner")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

/// Builds signing contexts for addresses.
pub trait SignerFactory {
    fn create(&self, secret_key: &SecretKey, chain_id: u64) -> Result<ChainSigner>;
}

/// Default factory producing EIP-155 signers.
#[derive(Debug, Default, Clone, Copy)]
pub struct Eip155SignerFactory;

impl SignerFactory for Eip155SignerFactory {
    fn create(&self, secret_key: &SecretKey, chain_id: u64) -> Result<ChainSigner> {
        ChainSigner::new(*secret_key, chain_id)
    }
}
