//! Per-account address derivation and usage tracking.
//!
//! A [`Keychain`] binds an account-level [`ExtendedKey`] to the node/address
//! slice of a [`DerivationScheme`] and derives addresses on demand through an
//! injected [`AddressEncoder`]. Address usage drives a persisted gap-limit
//! state machine: marking an index used advances or parks the per-purpose
//! counters and eagerly derives the next observable window so an external
//! explorer can keep scanning past the last used address.
//!
//! Keychain reads are safe from any thread; mutation is not locked
//! internally and callers must serialize writes to one instance.

pub mod state;

pub use state::{KeyPurpose, KeychainState};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keys::address::{Address, AddressEncoder};
use crate::keys::extended::{ExtendedKey, KeyError};
use crate::keys::path::{DerivationPath, PathError};
use crate::keys::scheme::{DerivationScheme, SchemeLevel};
use crate::store::{PreferenceStore, StoreError};

/// Observable addresses kept derivable past the last used index.
pub const DEFAULT_GAP_LIMIT: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum KeychainError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("preference store error: {0}")]
    Store(#[from] StoreError),

    #[error("corrupt persisted keychain state: {0}")]
    CorruptState(String),
}

/// Persisted bidirectional association between derivation paths and the
/// addresses rendered at them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AddressPathCache {
    path_to_address: HashMap<String, Address>,
    address_to_path: HashMap<String, String>,
}

pub struct Keychain {
    account_key: ExtendedKey,
    local_scheme: DerivationScheme,
    store: Arc<dyn PreferenceStore>,
    encoder: Box<dyn AddressEncoder>,
    gap_limit: u32,
    state: KeychainState,
    cache: AddressPathCache,
    state_key: String,
    cache_key: String,
}

impl Keychain {
    /// Build a keychain from an account-level key and its bound scheme.
    ///
    /// Persisted state and the path cache are restored from the store when
    /// present; otherwise the keychain starts empty.
    pub fn new(
        account_key: ExtendedKey,
        scheme: &DerivationScheme,
        store: Arc<dyn PreferenceStore>,
        encoder: Box<dyn AddressEncoder>,
        gap_limit: u32,
    ) -> Result<Self, KeychainError> {
        let local_scheme = scheme.scheme_from(SchemeLevel::Node);
        let namespace = format!("keychain.{:08x}", account_key.fingerprint());
        let state_key = format!("{namespace}.state");
        let cache_key = format!("{namespace}.cache");

        let state = match store.get(&state_key) {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| KeychainError::CorruptState(e.to_string()))?,
            None => KeychainState::default(),
        };
        let cache = match store.get(&cache_key) {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| KeychainError::CorruptState(e.to_string()))?,
            None => AddressPathCache::default(),
        };

        Ok(Self {
            account_key,
            local_scheme,
            store,
            encoder,
            gap_limit,
            state,
            cache,
            state_key,
            cache_key,
        })
    }

    pub fn gap_limit(&self) -> u32 {
        self.gap_limit
    }

    pub fn state(&self) -> &KeychainState {
        &self.state
    }

    /// Whether any address of this keychain has ever been marked used.
    pub fn is_empty(&self) -> bool {
        self.state.empty
    }

    /// Next unused address for `purpose`.
    pub fn fresh_address(&mut self, purpose: KeyPurpose) -> Result<Address, KeychainError> {
        let address = self.derive(purpose, self.state.max_consecutive_index(purpose))?;
        self.save_cache()?;
        Ok(address)
    }

    /// `count` consecutive addresses starting at the current fresh index.
    pub fn fresh_addresses(
        &mut self,
        purpose: KeyPurpose,
        count: u32,
    ) -> Result<Vec<Address>, KeychainError> {
        let start = self.state.max_consecutive_index(purpose);
        let mut addresses = Vec::with_capacity(count as usize);
        for index in start..start.saturating_add(count) {
            addresses.push(self.derive(purpose, index)?);
        }
        self.save_cache()?;
        Ok(addresses)
    }

    /// Contiguous window of addresses for `purpose`, inclusive on both ends,
    /// derived eagerly for gap-limit scanning.
    pub fn observable_addresses(
        &mut self,
        purpose: KeyPurpose,
        from: u32,
        to: u32,
    ) -> Result<Vec<Address>, KeychainError> {
        let mut addresses = Vec::new();
        for index in from..=to {
            addresses.push(self.derive(purpose, index)?);
        }
        self.save_cache()?;
        Ok(addresses)
    }

    /// Observable window across both purposes.
    pub fn all_observable_addresses(
        &mut self,
        from: u32,
        to: u32,
    ) -> Result<Vec<Address>, KeychainError> {
        let mut addresses = self.observable_addresses(KeyPurpose::Receive, from, to)?;
        addresses.extend(self.observable_addresses(KeyPurpose::Change, from, to)?);
        Ok(addresses)
    }

    /// Record the address at `path` as used.
    ///
    /// Returns `false` when the index was already known used. On a state
    /// change the new state is persisted and the observable window above the
    /// index is pre-derived out to the gap limit.
    pub fn mark_path_as_used(&mut self, path: &DerivationPath) -> Result<bool, KeychainError> {
        let depth = path.depth();
        if depth < 2 {
            return Err(KeychainError::Path(PathError::IndexOutOfRange {
                index: 1,
                depth,
            }));
        }
        let purpose = KeyPurpose::from_node_value(path.value_at(depth - 2)?);
        let index = path.value_at(depth - 1)?;

        if !self.state.mark_used(purpose, index) {
            return Ok(false);
        }
        debug!(
            "Marked {:?} index {} as used, max consecutive now {}",
            purpose,
            index,
            self.state.max_consecutive_index(purpose)
        );

        self.save_state_and_cache()?;
        let window_end = index.saturating_add(self.gap_limit);
        for i in index..=window_end {
            self.derive(purpose, i)?;
        }
        self.save_cache()?;
        Ok(true)
    }

    /// Reverse lookup: the derivation path an address was rendered at.
    pub fn address_derivation_path(&self, address: &str) -> Option<String> {
        self.cache.address_to_path.get(address).cloned()
    }

    /// Reverse lookup: the compressed public key behind an address.
    pub fn public_key_for_address(&self, address: &str) -> Option<[u8; 33]> {
        let path_string = self.cache.address_to_path.get(address)?;
        let path = DerivationPath::parse(path_string).ok()?;
        self.account_key
            .derive_path(&path)
            .ok()
            .map(|key| key.public_key())
    }

    fn derive(&mut self, purpose: KeyPurpose, index: u32) -> Result<Address, KeychainError> {
        let mut bound = self.local_scheme.clone();
        bound
            .set_node(purpose.node_value())
            .set_address_index(index);
        let local_path = bound.to_path();
        let path_string = local_path.to_string();

        if let Some(address) = self.cache.path_to_address.get(&path_string) {
            return Ok(address.clone());
        }

        let child = self.account_key.derive_path(&local_path)?;
        let address = self
            .encoder
            .render(&child.public_key(), self.account_key.network())?
            .with_derivation_path(path_string.clone());

        self.cache
            .address_to_path
            .insert(address.to_string(), path_string.clone());
        self.cache
            .path_to_address
            .insert(path_string, address.clone());
        Ok(address)
    }

    fn save_state_and_cache(&self) -> Result<(), KeychainError> {
        let state_bytes = bincode::serialize(&self.state)
            .map_err(|e| KeychainError::CorruptState(e.to_string()))?;
        let cache_bytes = bincode::serialize(&self.cache)
            .map_err(|e| KeychainError::CorruptState(e.to_string()))?;
        let mut editor = self.store.edit();
        editor.put(&self.state_key, state_bytes);
        editor.put(&self.cache_key, cache_bytes);
        editor.commit()?;
        Ok(())
    }

    fn save_cache(&self) -> Result<(), KeychainError> {
        let cache_bytes = bincode::serialize(&self.cache)
            .map_err(|e| KeychainError::CorruptState(e.to_string()))?;
        let mut editor = self.store.edit();
        editor.put(&self.cache_key, cache_bytes);
        editor.commit()?;
        Ok(())
    }
}
