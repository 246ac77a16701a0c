use rand::rngs::OsRng;
use rand_core::CryptoRngCore;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::account::Account;
use crate::address::HdWalletAddress;
use crate::config::{EntropyBits, WalletConfig};
use crate::derivation::ExtendedKey;
use crate::error::{Result, WalletError};
use crate::keys::Address;
use crate::mnemonic::make_seed_material;

/// The account every wallet derives from.
const DEFAULT_ACCOUNT_INDEX: u32 = 0;

/// A BIP32/BIP39/BIP44 hierarchical deterministic wallet with a single
/// active account.
///
/// Derivation methods take `&self`; the account's counters and address list
/// sit behind a mutex, so concurrent callers never share an index.
pub struct HdWallet {
    master_key: ExtendedKey,
    seed: Option<Zeroizing<Vec<u8>>>,
    entropy: Option<Zeroizing<Vec<u8>>>,
    mnemonic: Zeroizing<Vec<String>>,
    entropy_bits: EntropyBits,
    account: Mutex<Account>,
}

impl HdWallet {
    /// Builds a wallet, drawing any needed entropy from the operating system.
    pub fn new(config: WalletConfig) -> Result<Self> {
        Self::with_rng(config, &mut OsRng)
    }

    /// Builds a wallet, drawing any needed entropy from `rng`.
    ///
    /// The configuration is consumed; everything the wallet needs is copied
    /// out of it first.
    pub fn with_rng<R>(config: WalletConfig, rng: &mut R) -> Result<Self>
    where
        R: CryptoRngCore + ?Sized,
    {
        let material = make_seed_material(&config, rng)?;

        let master_key = ExtendedKey::from_seed(&material.seed)
            .map_err(|e| WalletError::MasterKeyConstructionFailed(e.to_string()))?;

        let account = Account::new(
            &master_key,
            DEFAULT_ACCOUNT_INDEX,
            config.derive_new_account_key(),
        )?;

        let mnemonic: Vec<String> = material.mnemonic.split(' ').map(str::to_string).collect();

        info!(
            entropy_bits = config.entropy_bits().bits(),
            words = mnemonic.len(),
            derive_new_account_key = config.derive_new_account_key(),
            "initialized HD wallet"
        );

        Ok(HdWallet {
            master_key,
            seed: Some(material.seed),
            entropy: Some(material.entropy),
            mnemonic: Zeroizing::new(mnemonic),
            entropy_bits: config.entropy_bits(),
            account: Mutex::new(account),
        })
    }

    fn account(&self) -> MutexGuard<'_, Account> {
        self.account.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Derives the next non-hardened address.
    pub fn derive_address(&self) -> Result<Arc<HdWalletAddress>> {
        self.derive_next(false)
    }

    /// Derives the next hardened address.
    pub fn derive_hardened_address(&self) -> Result<Arc<HdWalletAddress>> {
        self.derive_next(true)
    }

    pub fn derive_next(&self, hardened: bool) -> Result<Arc<HdWalletAddress>> {
        self.account().derive_next(hardened)
    }

    /// Derives at a combined index; indices of 2^31 and above are hardened.
    pub fn derive_at(&self, index: u32) -> Result<Arc<HdWalletAddress>> {
        self.account().derive_at(index)
    }

    pub fn master_key(&self) -> &ExtendedKey {
        &self.master_key
    }

    /// The mnemonic as a single space-separated phrase.
    pub fn mnemonic(&self) -> String {
        self.mnemonic.join(" ")
    }

    pub fn mnemonic_words(&self) -> &[String] {
        &self.mnemonic
    }

    pub fn seed(&self) -> Option<&[u8]> {
        self.seed.as_ref().map(|seed| seed.as_slice())
    }

    /// The entropy that was supplied or generated. If an explicit mnemonic
    /// was configured this does not correspond to [`mnemonic`](Self::mnemonic).
    pub fn entropy(&self) -> Option<&[u8]> {
        self.entropy.as_ref().map(|entropy| entropy.as_slice())
    }

    pub fn entropy_bits(&self) -> EntropyBits {
        self.entropy_bits
    }

    pub fn account_index(&self) -> u32 {
        self.account().account_index()
    }

    /// Every address derived so far, in derivation order.
    pub fn derived_addresses(&self) -> Vec<Arc<HdWalletAddress>> {
        self.account().derived_addresses().to_vec()
    }
}

/// Observable initialization state of a [`LazyWallet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    /// Not initialized yet, or initialization is running on another thread.
    Pending,
    Ready,
    Failed,
}

type PendingInit = (WalletConfig, Option<Box<dyn CryptoRngCore + Send>>);

/// A wallet that runs its seed pipeline on first use, exactly once.
///
/// Concurrent first callers block until the single initialization finishes;
/// all callers then observe the same wallet or the same error.
///
/// The configuration is handed to the first initialization attempt. If that
/// attempt panics, nothing is cached and the configuration is gone, so later
/// calls fail with [`WalletError::InitializationAbandoned`].
pub struct LazyWallet {
    pending: Mutex<Option<PendingInit>>,
    wallet: OnceLock<Result<HdWallet>>,
}

impl LazyWallet {
    pub fn new(config: WalletConfig) -> Self {
        LazyWallet {
            pending: Mutex::new(Some((config, None))),
            wallet: OnceLock::new(),
        }
    }

    pub fn with_rng<R>(config: WalletConfig, rng: R) -> Self
    where
        R: CryptoRngCore + Send + 'static,
    {
        let rng: Box<dyn CryptoRngCore + Send> = Box::new(rng);
        LazyWallet {
            pending: Mutex::new(Some((config, Some(rng)))),
            wallet: OnceLock::new(),
        }
    }

    /// Returns the wallet, initializing it if this is the first call.
    pub fn initialize(&self) -> Result<&HdWallet> {
        self.wallet
            .get_or_init(|| {
                let pending = self
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();

                match pending {
                    Some((config, Some(mut rng))) => HdWallet::with_rng(config, &mut *rng),
                    Some((config, None)) => HdWallet::new(config),
                    None => Err(WalletError::InitializationAbandoned),
                }
            })
            .as_ref()
            .map_err(|err| err.clone())
    }

    pub fn state(&self) -> InitState {
        match self.wallet.get() {
            None => InitState::Pending,
            Some(Ok(_)) => InitState::Ready,
            Some(Err(_)) => InitState::Failed,
        }
    }
}

/// Rebuilds the wallet for `mnemonic` and `passphrase` and scans the
/// non-hardened indices `0..max_index` for `address_hex`.
///
/// Returns the matching address, or `None` if no index in range produces it.
pub fn mnemonic_has_address(
    address_hex: &str,
    mnemonic: &str,
    passphrase: &str,
    max_index: u32,
) -> Result<Option<Address>> {
    let target: Address = address_hex.parse()?;

    let config = WalletConfig::builder()
        .passphrase(passphrase)
        .mnemonic(mnemonic)
        .build()?;
    let wallet = HdWallet::new(config)?;

    for _ in 0..max_index {
        let candidate = wallet.derive_address()?;
        if candidate.address() == target {
            debug!(path = %candidate.derivation_path(), "found address");
            return Ok(Some(candidate.address()));
        }
    }

    Ok(None)
}
