use bip39::Mnemonic;
use rand_core::CryptoRngCore;
use tracing::warn;
use zeroize::Zeroizing;

use crate::config::{EntropyBits, WalletConfig};
use crate::error::{Result, WalletError};

/// Mnemonic, entropy and seed produced for a new wallet.
pub struct SeedMaterial {
    /// The phrase the seed was actually derived from.
    pub mnemonic: Zeroizing<String>,
    /// The supplied or generated entropy. When an explicit mnemonic overrides
    /// the generated one, this is unrelated to `mnemonic`.
    pub entropy: Zeroizing<Vec<u8>>,
    pub seed: Zeroizing<Vec<u8>>,
}

/// Draws fresh entropy of the requested size from `rng`.
pub fn generate_entropy<R>(rng: &mut R, bits: EntropyBits) -> Result<Zeroizing<Vec<u8>>>
where
    R: CryptoRngCore + ?Sized,
{
    let mut bytes = Zeroizing::new(vec![0u8; bits.byte_len()]);
    rng.try_fill_bytes(&mut bytes[..])
        .map_err(|e| WalletError::MnemonicGenerationFailed(format!("entropy source failed: {}", e)))?;
    Ok(bytes)
}

pub fn mnemonic_from_entropy(entropy: &[u8]) -> Result<Zeroizing<String>> {
    Mnemonic::from_entropy(entropy)
        .map(|mnemonic| Zeroizing::new(mnemonic.to_string()))
        .map_err(|e| WalletError::MnemonicGenerationFailed(e.to_string()))
}

/// Validates `phrase` and stretches it with `passphrase` into a 64-byte seed.
pub fn seed_from_mnemonic(phrase: &str, passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
    let mnemonic = Mnemonic::parse_normalized(phrase)
        .map_err(|e| WalletError::SeedGenerationFailed(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_seed(passphrase).to_vec()))
}

/// Runs the seed pipeline for `config`.
///
/// Explicit entropy yields its own mnemonic. Otherwise fresh entropy is drawn,
/// and an explicit mnemonic, if configured, replaces the one generated from
/// that entropy while the entropy itself is still reported.
pub fn make_seed_material<R>(config: &WalletConfig, rng: &mut R) -> Result<SeedMaterial>
where
    R: CryptoRngCore + ?Sized,
{
    let (entropy, mnemonic) = match config.entropy() {
        Some(entropy) => {
            let entropy = Zeroizing::new(entropy.to_vec());
            let mnemonic = mnemonic_from_entropy(&entropy)?;
            (entropy, mnemonic)
        }
        None => {
            let entropy = generate_entropy(rng, config.entropy_bits())?;
            let mnemonic = match config.mnemonic() {
                Some(phrase) => {
                    warn!("explicit mnemonic overrides the generated one; reported entropy will not match it");
                    Zeroizing::new(phrase.to_string())
                }
                None => mnemonic_from_entropy(&entropy)?,
            };
            (entropy, mnemonic)
        }
    };

    let seed = seed_from_mnemonic(&mnemonic, config.passphrase())?;

    Ok(SeedMaterial {
        mnemonic,
        entropy,
        seed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon \
                          abandon abandon abandon abandon abandon about";

    #[test]
    fn test_word_counts() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for (bits, words) in [(128, 12), (160, 15), (192, 18), (224, 21), (256, 24)] {
            let config = WalletConfig::builder().entropy_bits(bits).build().unwrap();
            let material = make_seed_material(&config, &mut rng).unwrap();

            assert_eq!(material.mnemonic.split(' ').count(), words);
            assert_eq!(material.entropy.len() * 8, bits);
            assert_eq!(material.seed.len(), 64);
        }
    }

    #[test]
    fn test_explicit_entropy_is_echoed() {
        let config = WalletConfig::builder().entropy(vec![0u8; 16]).build().unwrap();
        let material = make_seed_material(&config, &mut ChaCha20Rng::seed_from_u64(1)).unwrap();

        assert_eq!(material.entropy.as_slice(), &[0u8; 16]);
        assert_eq!(material.mnemonic.as_str(), PHRASE.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn test_seed_vector() {
        // BIP39 reference vector with passphrase "TREZOR"
        let seed = seed_from_mnemonic(
            &PHRASE.split_whitespace().collect::<Vec<_>>().join(" "),
            "TREZOR",
        )
        .unwrap();
        assert_eq!(
            hex::encode(seed.as_slice()),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    #[test]
    fn test_explicit_mnemonic_keeps_generated_entropy() {
        let phrase = PHRASE.split_whitespace().collect::<Vec<_>>().join(" ");
        let config = WalletConfig::builder().mnemonic(phrase.clone()).build().unwrap();
        let material = make_seed_material(&config, &mut ChaCha20Rng::seed_from_u64(3)).unwrap();

        assert_eq!(material.mnemonic.as_str(), phrase);
        assert_eq!(material.entropy.len(), 32);
        assert_ne!(material.entropy.as_slice(), &[0u8; 32]);
        assert_eq!(material.seed, seed_from_mnemonic(&phrase, "").unwrap());
    }

    #[test]
    fn test_failures() {
        let config = WalletConfig::builder().entropy(vec![1u8; 15]).build().unwrap();
        assert!(matches!(
            make_seed_material(&config, &mut ChaCha20Rng::seed_from_u64(0)),
            Err(WalletError::MnemonicGenerationFailed(_))
        ));

        let config = WalletConfig::builder().entropy(Vec::new()).build().unwrap();
        assert!(matches!(
            make_seed_material(&config, &mut ChaCha20Rng::seed_from_u64(0)),
            Err(WalletError::MnemonicGenerationFailed(_))
        ));

        let config = WalletConfig::builder().mnemonic("not a real mnemonic").build().unwrap();
        assert!(matches!(
            make_seed_material(&config, &mut ChaCha20Rng::seed_from_u64(0)),
            Err(WalletError::SeedGenerationFailed(_))
        ));
    }
}
