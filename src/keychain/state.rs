//! Persisted address-usage state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The role of a derived key: external receive chain or internal change
/// chain. Encoded as the node-level path segment (0 = receive, else change).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPurpose {
    Receive,
    Change,
}

impl KeyPurpose {
    pub fn node_value(self) -> u32 {
        match self {
            KeyPurpose::Receive => 0,
            KeyPurpose::Change => 1,
        }
    }

    pub fn from_node_value(value: u32) -> Self {
        if value == 0 {
            KeyPurpose::Receive
        } else {
            KeyPurpose::Change
        }
    }
}

/// Foldable index-usage tracking for one keychain.
///
/// Every index below the max-consecutive counter of a purpose is implicitly
/// used; indexes at or above it that were reported used out of order sit in
/// the non-consecutive set until the counter catches up and folds them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeychainState {
    pub max_consecutive_receive_index: u32,
    pub max_consecutive_change_index: u32,
    pub non_consecutive_receive_indexes: BTreeSet<u32>,
    pub non_consecutive_change_indexes: BTreeSet<u32>,
    pub empty: bool,
}

impl Default for KeychainState {
    fn default() -> Self {
        Self {
            max_consecutive_receive_index: 0,
            max_consecutive_change_index: 0,
            non_consecutive_receive_indexes: BTreeSet::new(),
            non_consecutive_change_indexes: BTreeSet::new(),
            empty: true,
        }
    }
}

impl KeychainState {
    pub fn max_consecutive_index(&self, purpose: KeyPurpose) -> u32 {
        match purpose {
            KeyPurpose::Receive => self.max_consecutive_receive_index,
            KeyPurpose::Change => self.max_consecutive_change_index,
        }
    }

    /// Record `index` as used for `purpose`. Returns `false` when the index
    /// was already known used (idempotent no-op).
    pub(crate) fn mark_used(&mut self, purpose: KeyPurpose, index: u32) -> bool {
        let (max, pending) = match purpose {
            KeyPurpose::Receive => (
                &mut self.max_consecutive_receive_index,
                &mut self.non_consecutive_receive_indexes,
            ),
            KeyPurpose::Change => (
                &mut self.max_consecutive_change_index,
                &mut self.non_consecutive_change_indexes,
            ),
        };

        if index < *max || pending.contains(&index) {
            return false;
        }

        if index == *max {
            *max += 1;
            // Fold in any out-of-order indexes that are now consecutive.
            while pending.remove(&*max) {
                *max += 1;
            }
        } else {
            pending.insert(index);
        }

        self.empty = false;
        true
    }
}
