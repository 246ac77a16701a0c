use thiserror::Error;

use crate::derivation::DerivationError;

/// Every failure a wallet operation can report.
///
/// All variants are deterministic given their inputs, so none of them is
/// retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("invalid entropy length {bits}: expected one of 128, 160, 192, 224 or 256 bits")]
    InvalidEntropyLength { bits: usize },

    #[error("explicit entropy and explicit mnemonic are mutually exclusive")]
    ConflictingSeedSources,

    #[error("invalid wallet options: {0}")]
    InvalidOptions(String),

    #[error("failed to generate mnemonic: {0}")]
    MnemonicGenerationFailed(String),

    #[error("failed to generate seed: {0}")]
    SeedGenerationFailed(String),

    #[error("failed to construct master extended key: {0}")]
    MasterKeyConstructionFailed(String),

    #[error("wallet initialization was abandoned by a panic; its configuration is gone")]
    InitializationAbandoned,

    #[error("child key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("derivation index space exhausted (hardened: {hardened})")]
    IndexSpaceExhausted { hardened: bool },

    #[error("invalid derivation path: {0}")]
    PathParseFailed(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("failed to construct signer: {0}")]
    SignerConstructionFailed(String),
}

impl From<DerivationError> for WalletError {
    fn from(err: DerivationError) -> Self {
        match err {
            DerivationError::InvalidPath(path) => WalletError::PathParseFailed(path),
            other => WalletError::DerivationFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;
