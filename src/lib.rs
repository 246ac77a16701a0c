//! A BIP32/BIP39/BIP44 hierarchical deterministic wallet.
//!
//! A [`HdWallet`] is built from a [`WalletConfig`]: it generates or accepts a
//! mnemonic, stretches it into a seed, and derives Ethereum-style addresses
//! under `m/44'/60'/0'/0/i`.
//!
//! ```no_run
//! use hd_wallet::{HdWallet, WalletConfig};
//!
//! let wallet = HdWallet::new(WalletConfig::builder().entropy_bits(128).build()?)?;
//! let first = wallet.derive_address()?;
//! println!("{} at {}", first.address(), first.derivation_path());
//! # Ok::<(), hd_wallet::WalletError>(())
//! ```

pub mod account;
pub mod address;
pub mod config;
pub mod derivation;
pub mod error;
pub mod keys;
pub mod mnemonic;
pub mod signer;
pub mod wallet;

pub use address::HdWalletAddress;
pub use config::{entropy_from_str, EntropyBits, WalletConfig, WalletConfigBuilder, WalletOptions};
pub use derivation::{DerivationPath, ExtendedKey, HARDENED_BIT};
pub use error::{Result, WalletError};
pub use keys::Address;
pub use signer::{ChainSigner, Eip155SignerFactory, Signature, SignerFactory};
pub use wallet::{mnemonic_has_address, HdWallet, InitState, LazyWallet};
