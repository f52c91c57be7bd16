//! Registry datastore
//!
//! One flat table shared by every registry instance on a chain:
//! ```text
//! (registry address, canonical id) -> RegistryEntry
//! ```
//! The datastore performs no authorization and no eviction. Expiry is a
//! derived predicate evaluated by readers.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use namechain_core::name::canonical_id;
use serde::{Deserialize, Serialize};

/// Entry has been explicitly given up by its holder
pub const FLAG_RELINQUISHED: u32 = 1 << 0;

/// Lifecycle state of a name, derived from its entry and the current time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameState {
    Unregistered,
    Active,
    Expired,
    Relinquished,
}

/// Per-name record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub subregistry: Address,
    pub resolver: Address,
    pub expiry: u64,
    /// Generation of the current token, the low 32 bits of its token id
    pub token_version: u32,
    pub flags: u32,
}

impl RegistryEntry {
    pub fn is_relinquished(&self) -> bool {
        self.flags & FLAG_RELINQUISHED != 0
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expiry
    }

    pub fn is_active(&self, now: u64) -> bool {
        self.expiry != 0 && !self.is_relinquished() && !self.is_expired(now)
    }

    pub fn state(&self, now: u64) -> NameState {
        if self.is_relinquished() {
            NameState::Relinquished
        } else if *self == RegistryEntry::default() {
            NameState::Unregistered
        } else if self.is_active(now) {
            NameState::Active
        } else {
            NameState::Expired
        }
    }

    /// Full token id of the current generation
    pub fn token_id(&self, canonical: U256) -> U256 {
        canonical_id(canonical) | U256::from(self.token_version)
    }
}

/// Shared name storage
#[derive(Debug, Clone, Default)]
pub struct RegistryDatastore {
    entries: HashMap<(Address, U256), RegistryEntry>,
}

impl RegistryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an entry. Any generation of `id` addresses the same entry.
    pub fn get(&self, registry: Address, id: U256) -> RegistryEntry {
        self.entries
            .get(&(registry, canonical_id(id)))
            .copied()
            .unwrap_or_default()
    }

    /// Overwrite an entry unconditionally.
    pub fn set(&mut self, registry: Address, id: U256, entry: RegistryEntry) {
        self.entries.insert((registry, canonical_id(id)), entry);
    }

    /// Read-modify-write helper
    pub fn update(&mut self, registry: Address, id: U256, f: impl FnOnce(&mut RegistryEntry)) {
        let slot = self
            .entries
            .entry((registry, canonical_id(id)))
            .or_default();
        f(slot);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
