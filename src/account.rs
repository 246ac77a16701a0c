use std::sync::Arc;
use tracing::debug;

use crate::address::HdWalletAddress;
use crate::derivation::{address_derivation_path, derive_address_key, ExtendedKey, HARDENED_BIT};
use crate::error::{Result, WalletError};

/// Tracks the next free hardened and non-hardened indices of one account and
/// records every address derived from it.
pub struct Account {
    account_key: ExtendedKey,
    account_index: u32,
    next_index: u32,
    last_hardened_index: u32,
    derived: Vec<Arc<HdWalletAddress>>,
}

impl Account {
    /// Creates the account. With `derive_new_account_key` the account key is
    /// the master key's child at the account's first address path; otherwise
    /// it is the master key itself.
    pub fn new(
        master_key: &ExtendedKey,
        account_index: u32,
        derive_new_account_key: bool,
    ) -> Result<Self> {
        let account_key = if derive_new_account_key {
            address_derivation_path(account_index, 0).derive(master_key)?
        } else {
            master_key.clone()
        };

        Ok(Account {
            account_key,
            account_index,
            next_index: 0,
            last_hardened_index: HARDENED_BIT,
            derived: Vec::new(),
        })
    }

    pub fn account_key(&self) -> &ExtendedKey {
        &self.account_key
    }

    pub fn account_index(&self) -> u32 {
        self.account_index
    }

    /// The non-hardened index the next automatic derivation will use.
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// The most recently consumed hardened index; starts at 2^31 so the first
    /// automatic hardened derivation uses 2^31 + 1.
    pub fn last_hardened_index(&self) -> u32 {
        self.last_hardened_index
    }

    pub fn derived_addresses(&self) -> &[Arc<HdWalletAddress>] {
        &self.derived
    }

    /// Derives at the next automatic index of the requested kind.
    ///
    /// Non-hardened derivation uses the counter and then advances it;
    /// hardened derivation advances first and uses the new value. Counters
    /// are left untouched when derivation fails.
    pub fn derive_next(&mut self, hardened: bool) -> Result<Arc<HdWalletAddress>> {
        if hardened {
            let index = self.last_hardened_index + 1;
            if index == u32::MAX {
                return Err(WalletError::IndexSpaceExhausted { hardened: true });
            }

            let address = self.derive_at(index)?;
            self.last_hardened_index = index;
            Ok(address)
        } else {
            if self.next_index == HARDENED_BIT {
                return Err(WalletError::IndexSpaceExhausted { hardened: false });
            }

            let address = self.derive_at(self.next_index)?;
            self.next_index += 1;
            Ok(address)
        }
    }

    /// Derives at an explicit combined index without touching either counter.
    /// Values of 2^31 and above request a hardened key.
    pub fn derive_at(&mut self, combined_index: u32) -> Result<Arc<HdWalletAddress>> {
        let hardened = combined_index >= HARDENED_BIT;
        debug!(account = self.account_index, index = combined_index, hardened, "deriving address");

        let raw = derive_address_key(&self.account_key, self.account_index, combined_index)?;
        let address = Arc::new(HdWalletAddress::from_raw(raw, self.account_index, combined_index));
        self.derived.push(Arc::clone(&address));

        Ok(address)
    }

    #[cfg(test)]
    pub(crate) fn set_counters(&mut self, next_index: u32, last_hardened_index: u32) {
        self.next_index = next_index;
        self.last_hardened_index = last_hardened_index;
    }
}
