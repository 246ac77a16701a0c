use secp256k1::{PublicKey, SecretKey};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::derivation::{address_derivation_path, split_index, RawDerived, HARDENED_BIT};
use crate::error::Result;
use crate::keys::Address;
use crate::signer::{ChainSigner, Eip155SignerFactory, SignerFactory};

/// A derived key pair together with its chain address and position in the
/// account tree.
///
/// The derivation index is stored in its plain form alongside a separate
/// hardened flag; the combined form is recomputed on demand.
pub struct HdWalletAddress {
    address: Address,
    private_key: SecretKey,
    public_key: PublicKey,
    account_index: u32,
    derivation_index: u32,
    hardened: bool,
    signers: Mutex<HashMap<u64, Arc<ChainSigner>>>,
}

impl HdWalletAddress {
    pub fn new(
        private_key: SecretKey,
        public_key: PublicKey,
        address: Address,
        account_index: u32,
        combined_index: u32,
    ) -> Self {
        let (hardened, derivation_index) = split_index(combined_index);

        HdWalletAddress {
            address,
            private_key,
            public_key,
            account_index,
            derivation_index,
            hardened,
            signers: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn from_raw(raw: RawDerived, account_index: u32, combined_index: u32) -> Self {
        Self::new(raw.private_key, raw.public_key, raw.address, account_index, combined_index)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn private_key(&self) -> &SecretKey {
        &self.private_key
    }

    /// Lowercase hex of the 32-byte private key, without `0x`.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.private_key.secret_bytes())
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Lowercase hex of the uncompressed public key with its `0x04` format
    /// byte removed (64 bytes, 128 digits).
    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key.serialize_uncompressed()[1..])
    }

    pub fn account_index(&self) -> u32 {
        self.account_index
    }

    /// Index within the hardened or non-hardened range, always below 2^31.
    pub fn derivation_index(&self) -> u32 {
        self.derivation_index
    }

    /// The index as passed to BIP32, offset by 2^31 when hardened.
    pub fn hardened_derivation_index(&self) -> u32 {
        if self.hardened {
            HARDENED_BIT + self.derivation_index
        } else {
            self.derivation_index
        }
    }

    pub fn derivation_path(&self) -> String {
        address_derivation_path(self.account_index, self.hardened_derivation_index()).to_string()
    }

    pub fn hardened(&self) -> bool {
        self.hardened
    }

    /// Returns the signing context for `chain_id`, building it on first use.
    pub fn signer_for(&self, chain_id: u64) -> Result<Arc<ChainSigner>> {
        self.signer_for_with(chain_id, &Eip155SignerFactory)
    }

    /// Like [`signer_for`](Self::signer_for) with a caller-supplied factory.
    ///
    /// The cache lock is held across construction, so at most one signer is
    /// ever built per chain id.
    pub fn signer_for_with<F>(&self, chain_id: u64, factory: &F) -> Result<Arc<ChainSigner>>
    where
        F: SignerFactory + ?Sized,
    {
        let mut signers = self.signers.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = signers.get(&chain_id) {
            return Ok(Arc::clone(existing));
        }

        debug!(address = %self.address, chain_id, "building signer");
        let signer = Arc::new(factory.create(&self.private_key, chain_id)?);
        signers.insert(chain_id, Arc::clone(&signer));

        Ok(signer)
    }
}

impl fmt::Debug for HdWalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdWalletAddress")
            .field("address", &self.address)
            .field("path", &self.derivation_path())
            .finish_non_exhaustive()
    }
}
