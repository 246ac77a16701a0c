//! Wallet construction options.
//!
//! A [`WalletConfig`] can only be obtained through [`WalletConfigBuilder::build`],
//! which rejects invalid entropy sizes and conflicting seed sources up front.

use serde::Deserialize;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, WalletError};

/// Entropy sizes permitted by BIP39.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntropyBits {
    /// 12-word mnemonic
    Bits128,
    /// 15-word mnemonic
    Bits160,
    /// 18-word mnemonic
    Bits192,
    /// 21-word mnemonic
    Bits224,
    /// 24-word mnemonic
    #[default]
    Bits256,
}

impl EntropyBits {
    pub fn bits(self) -> usize {
        match self {
            EntropyBits::Bits128 => 128,
            EntropyBits::Bits160 => 160,
            EntropyBits::Bits192 => 192,
            EntropyBits::Bits224 => 224,
            EntropyBits::Bits256 => 256,
        }
    }

    pub fn byte_len(self) -> usize {
        self.bits() / 8
    }

    pub fn word_count(self) -> usize {
        // 11 bits per word over entropy + entropy/32 checksum bits
        (self.bits() + self.bits() / 32) / 11
    }
}

impl TryFrom<usize> for EntropyBits {
    type Error = WalletError;

    fn try_from(bits: usize) -> Result<Self> {
        match bits {
            128 => Ok(EntropyBits::Bits128),
            160 => Ok(EntropyBits::Bits160),
            192 => Ok(EntropyBits::Bits192),
            224 => Ok(EntropyBits::Bits224),
            256 => Ok(EntropyBits::Bits256),
            _ => Err(WalletError::InvalidEntropyLength { bits }),
        }
    }
}

/// Validated construction options for a wallet.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct WalletConfig {
    passphrase: String,
    #[zeroize(skip)]
    entropy_bits: EntropyBits,
    mnemonic: Option<String>,
    entropy: Option<Vec<u8>>,
    derive_new_account_key: bool,
}

impl WalletConfig {
    pub fn builder() -> WalletConfigBuilder {
        WalletConfigBuilder::default()
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn entropy_bits(&self) -> EntropyBits {
        self.entropy_bits
    }

    pub fn mnemonic(&self) -> Option<&str> {
        self.mnemonic.as_deref()
    }

    pub fn entropy(&self) -> Option<&[u8]> {
        self.entropy.as_deref()
    }

    /// Whether the account key is re-derived from the master key instead of
    /// being the master key itself.
    pub fn derive_new_account_key(&self) -> bool {
        self.derive_new_account_key
    }
}

#[derive(Default)]
pub struct WalletConfigBuilder {
    passphrase: String,
    entropy_bits: Option<usize>,
    mnemonic: Option<String>,
    entropy: Option<Vec<u8>>,
    derive_new_account_key: bool,
}

impl WalletConfigBuilder {
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = passphrase.into();
        self
    }

    pub fn entropy_bits(mut self, bits: usize) -> Self {
        self.entropy_bits = Some(bits);
        self
    }

    /// An empty phrase is treated as "no mnemonic".
    pub fn mnemonic(mut self, mnemonic: impl Into<String>) -> Self {
        let mnemonic = mnemonic.into();
        self.mnemonic = (!mnemonic.is_empty()).then_some(mnemonic);
        self
    }

    pub fn entropy(mut self, entropy: impl Into<Vec<u8>>) -> Self {
        self.entropy = Some(entropy.into());
        self
    }

    pub fn derive_new_account_key(mut self, derive: bool) -> Self {
        self.derive_new_account_key = derive;
        self
    }

    pub fn build(mut self) -> Result<WalletConfig> {
        let entropy_bits = match self.entropy_bits {
            Some(bits) => EntropyBits::try_from(bits)?,
            None => EntropyBits::default(),
        };

        if self.entropy.is_some() && self.mnemonic.is_some() {
            return Err(WalletError::ConflictingSeedSources);
        }

        Ok(WalletConfig {
            passphrase: std::mem::take(&mut self.passphrase),
            entropy_bits,
            mnemonic: self.mnemonic.take(),
            entropy: self.entropy.take(),
            derive_new_account_key: self.derive_new_account_key,
        })
    }
}

/// The recognised wallet options as a serializable document.
///
/// ```json
/// { "passphrase": "", "entropyBits": 256, "mnemonic": "...", "entropy": "0x...", "deriveNewAccountKey": false }
/// ```
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct WalletOptions {
    pub passphrase: String,
    pub entropy_bits: Option<usize>,
    pub mnemonic: Option<String>,
    /// Hex text, decoded with [`entropy_from_str`].
    pub entropy: Option<String>,
    pub derive_new_account_key: bool,
}

impl WalletOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| WalletError::InvalidOptions(e.to_string()))
    }

    pub fn into_config(self) -> Result<WalletConfig> {
        let mut builder = WalletConfig::builder()
            .passphrase(self.passphrase)
            .derive_new_account_key(self.derive_new_account_key);

        if let Some(bits) = self.entropy_bits {
            builder = builder.entropy_bits(bits);
        }
        if let Some(mnemonic) = self.mnemonic {
            builder = builder.mnemonic(mnemonic);
        }
        if let Some(entropy) = self.entropy {
            builder = builder.entropy(entropy_from_str(&entropy));
        }

        builder.build()
    }
}

/// Decodes hex entropy text with an optional `0x` prefix.
///
/// Invalid hex decodes to empty entropy rather than an error; the empty value
/// is then rejected later by mnemonic generation.
pub fn entropy_from_str(entropy: &str) -> Vec<u8> {
    let digits = entropy.strip_prefix("0x").unwrap_or(entropy);
    match hex::decode(digits) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "discarding entropy text that is not valid hex");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTROPY_HEX: &str = "b689a63adcc87720ebf67d8e4b9e8dd9156b1dab182665b904959f0ef9f9873f";

    #[test]
    fn test_defaults() {
        let config = WalletConfig::builder().build().unwrap();
        assert_eq!(config.passphrase(), "");
        assert_eq!(config.entropy_bits(), EntropyBits::Bits256);
        assert!(config.mnemonic().is_none());
        assert!(config.entropy().is_none());
        assert!(!config.derive_new_account_key());
    }

    #[test]
    fn test_entropy_bits() {
        for (bits, words) in [(128, 12), (160, 15), (192, 18), (224, 21), (256, 24)] {
            let entropy_bits = EntropyBits::try_from(bits).unwrap();
            assert_eq!(entropy_bits.bits(), bits);
            assert_eq!(entropy_bits.byte_len() * 8, bits);
            assert_eq!(entropy_bits.word_count(), words);
        }

        for bits in [0, 64, 127, 129, 255, 512] {
            assert_eq!(
                EntropyBits::try_from(bits).unwrap_err(),
                WalletError::InvalidEntropyLength { bits }
            );
        }
    }

    #[test]
    fn test_invalid_entropy_bits_rejected_by_builder() {
        let err = WalletConfig::builder().entropy_bits(100).build().err();
        assert_eq!(err, Some(WalletError::InvalidEntropyLength { bits: 100 }));
    }

    #[test]
    fn test_conflicting_seed_sources() {
        let err = WalletConfig::builder()
            .mnemonic("abandon abandon abandon")
            .entropy(vec![0u8; 16])
            .build()
            .err();
        assert_eq!(err, Some(WalletError::ConflictingSeedSources));
    }

    #[test]
    fn test_empty_mnemonic_is_ignored() {
        let config = WalletConfig::builder()
            .mnemonic("")
            .entropy(vec![0u8; 16])
            .build()
            .unwrap();
        assert!(config.mnemonic().is_none());
    }

    #[test]
    fn test_entropy_text_round_trip() {
        assert_eq!(hex::encode(entropy_from_str(ENTROPY_HEX)), ENTROPY_HEX);
        assert_eq!(
            hex::encode(entropy_from_str(&format!("0x{}", ENTROPY_HEX))),
            ENTROPY_HEX
        );
    }

    #[test]
    fn test_invalid_entropy_text_is_empty() {
        assert!(entropy_from_str("0xnot-hex").is_empty());
        assert!(entropy_from_str("abc").is_empty());
    }

    #[test]
    fn test_options_from_json() {
        let json = format!(
            r#"{{"passphrase":"hello","entropyBits":128,"entropy":"0x{}","deriveNewAccountKey":true}}"#,
            ENTROPY_HEX
        );
        let config = WalletOptions::from_json(&json).unwrap().into_config().unwrap();
        assert_eq!(config.passphrase(), "hello");
        assert_eq!(config.entropy_bits(), EntropyBits::Bits128);
        assert_eq!(config.entropy().map(hex::encode).as_deref(), Some(ENTROPY_HEX));
        assert!(config.derive_new_account_key());

        let config = WalletOptions::from_json("{}").unwrap().into_config().unwrap();
        assert_eq!(config.entropy_bits(), EntropyBits::Bits256);
    }

    #[test]
    fn test_options_reject_unknown_fields() {
        assert!(matches!(
            WalletOptions::from_json(r#"{"seed":"00"}"#),
            Err(WalletError::InvalidOptions(_))
        ));
        assert_eq!(
            WalletOptions::from_json(r#"{"entropyBits":42}"#)
                .unwrap()
                .into_config()
                .err(),
            Some(WalletError::InvalidEntropyLength { bits: 42 })
        );
    }
}
