//! Permissioned registry
//!
//! A registry instance is a handle around its address. Its name records live
//! in the shared datastore; ownership, approvals, roles and token observers
//! live in per-registry `RegistryTables`.
//!
//! ## Name lifecycle
//!
//! ```text
//! UNREGISTERED --register--> ACTIVE --time--> EXPIRED --register--> ACTIVE (generation + 1)
//!                              |
//!                              +--relinquish--> RELINQUISHED --register--> ACTIVE (generation + 1)
//! ```
//!
//! Role grants on a token are scoped to its versioned token id, so a new
//! generation always starts without the previous holder's roles.

use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, U256};
use namechain_core::name::{canonical_id, generation_of, label_to_token_id, validate_label};
use namechain_core::roles::roles;
use namechain_core::{RoleBitmap, ROOT_RESOURCE};

use crate::access::AccessControl;
use crate::error::{RegistryError, Result};
use crate::events::Event;
use crate::hooks::EjectionRequest;
use crate::state::ChainState;
use crate::store::{NameState, RegistryEntry, FLAG_RELINQUISHED};

/// Ownership and permission tables of one registry instance
#[derive(Debug, Clone, Default)]
pub struct RegistryTables {
    pub(crate) access: AccessControl,
    /// canonical id -> holder
    owners: HashMap<U256, Address>,
    /// (owner, operator)
    approvals: HashSet<(Address, Address)>,
    /// canonical id -> observer address
    observers: HashMap<U256, Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionedRegistry {
    address: Address,
}

impl PermissionedRegistry {
    /// Handle for a registry already deployed at `address`
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    /// Create a registry at `address`, granting `admin` the given root roles.
    pub fn deploy(
        state: &mut ChainState,
        address: Address,
        admin: Address,
        admin_roles: RoleBitmap,
    ) -> Result<Self> {
        if state.is_registry(address) {
            return Err(RegistryError::InvalidConfig(format!(
                "registry already deployed at {}",
                address
            )));
        }

        let mut tables = RegistryTables::default();
        tables.access.grant(ROOT_RESOURCE, admin, admin_roles);
        state.registries.insert(address, tables);

        tracing::debug!(registry = %address, admin = %admin, roles = %admin_roles, "Deployed registry");
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Raw datastore entry for `label`
    pub fn entry(&self, state: &ChainState, label: &str) -> RegistryEntry {
        state.datastore.get(self.address, label_to_token_id(label, 0))
    }

    /// Token id of the current generation of `label`
    pub fn token_id(&self, state: &ChainState, label: &str) -> U256 {
        let canonical = label_to_token_id(label, 0);
        state.datastore.get(self.address, canonical).token_id(canonical)
    }

    pub fn name_state(&self, state: &ChainState, label: &str) -> NameState {
        self.entry(state, label).state(state.now())
    }

    /// Subregistry of an active name, zero otherwise
    pub fn get_subregistry(&self, state: &ChainState, label: &str) -> Address {
        let entry = self.entry(state, label);
        if entry.is_active(state.now()) {
            entry.subregistry
        } else {
            Address::ZERO
        }
    }

    /// Resolver of an active name, zero otherwise
    pub fn get_resolver(&self, state: &ChainState, label: &str) -> Address {
        let entry = self.entry(state, label);
        if entry.is_active(state.now()) {
            entry.resolver
        } else {
            Address::ZERO
        }
    }

    pub fn get_expiry(&self, state: &ChainState, token_id: U256) -> u64 {
        state.datastore.get(self.address, token_id).expiry
    }

    /// Holder of `token_id`, or zero if the token is expired, relinquished or
    /// of an older generation.
    pub fn owner_of(&self, state: &ChainState, token_id: U256) -> Address {
        let entry = state.datastore.get(self.address, token_id);
        if entry.token_version != generation_of(token_id) || !entry.is_active(state.now()) {
            return Address::ZERO;
        }
        state
            .tables(self.address)
            .ok()
            .and_then(|t| t.owners.get(&canonical_id(token_id)).copied())
            .unwrap_or(Address::ZERO)
    }

    pub fn token_observer(&self, state: &ChainState, token_id: U256) -> Address {
        state
            .tables(self.address)
            .ok()
            .and_then(|t| t.observers.get(&canonical_id(token_id)).copied())
            .unwrap_or(Address::ZERO)
    }

    /// Roles granted at exactly `resource`
    pub fn roles(&self, state: &ChainState, resource: U256, account: Address) -> RoleBitmap {
        state
            .tables(self.address)
            .map(|t| t.access.roles(resource, account))
            .unwrap_or_default()
    }

    /// Whether `account` holds `required` at `resource` or at root
    pub fn has_roles(
        &self,
        state: &ChainState,
        resource: U256,
        required: RoleBitmap,
        account: Address,
    ) -> bool {
        state
            .tables(self.address)
            .map(|t| t.access.has_roles(resource, required, account))
            .unwrap_or(false)
    }

    pub fn is_approved_for_all(&self, state: &ChainState, owner: Address, operator: Address) -> bool {
        state
            .tables(self.address)
            .map(|t| t.approvals.contains(&(owner, operator)))
            .unwrap_or(false)
    }

    /// Entry behind `token_id` if it is the current generation and active.
    fn live_entry(&self, state: &ChainState, token_id: U256) -> Result<RegistryEntry> {
        let entry = state.datastore.get(self.address, token_id);
        if entry.token_version != generation_of(token_id) || !entry.is_active(state.now()) {
            return Err(RegistryError::NameExpired { token_id });
        }
        Ok(entry)
    }

    fn check_roles(
        &self,
        state: &ChainState,
        resource: U256,
        required: RoleBitmap,
        account: Address,
    ) -> Result<()> {
        state
            .tables(self.address)?
            .access
            .check_roles(resource, required, account)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Register `label`, returning its new token id.
    ///
    /// Requires `REGISTRAR` at root. The previous generation's roles,
    /// ownership and observer are discarded.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &self,
        state: &mut ChainState,
        caller: Address,
        label: &str,
        owner: Address,
        subregistry: Address,
        resolver: Address,
        role_bitmap: RoleBitmap,
        expiry: u64,
    ) -> Result<U256> {
        validate_label(label)?;
        self.check_roles(state, ROOT_RESOURCE, roles::REGISTRAR, caller)?;
        if owner == Address::ZERO {
            return Err(RegistryError::InvalidReceiver { account: owner });
        }

        let now = state.now();
        if expiry <= now {
            return Err(RegistryError::CannotSetPastExpiration { expiry, now });
        }

        let canonical = label_to_token_id(label, 0);
        let previous = state.datastore.get(self.address, canonical);
        if previous.is_active(now) {
            return Err(RegistryError::NameAlreadyRegistered {
                label: label.to_string(),
            });
        }

        let token_version = if previous == RegistryEntry::default() {
            0
        } else {
            previous
                .token_version
                .checked_add(1)
                .ok_or_else(|| RegistryError::GenerationExhausted {
                    label: label.to_string(),
                })?
        };
        let entry = RegistryEntry {
            subregistry,
            resolver,
            expiry,
            token_version,
            flags: 0,
        };
        let token_id = entry.token_id(canonical);
        let previous_token = previous.token_id(canonical);

        state.datastore.set(self.address, canonical, entry);
        let tables = state.tables_mut(self.address)?;
        tables.access.clear_resource(previous_token);
        tables.owners.insert(canonical, owner);
        tables.observers.remove(&canonical);
        if !role_bitmap.is_empty() {
            tables.access.grant(token_id, owner, role_bitmap);
        }

        state.emit(Event::TransferSingle {
            registry: self.address,
            operator: caller,
            from: Address::ZERO,
            to: owner,
            token_id,
        });
        state.emit(Event::NameRegistered {
            registry: self.address,
            token_id,
            label: label.to_string(),
            owner,
            subregistry,
            resolver,
            expiry,
        });

        tracing::debug!(
            registry = %self.address,
            label,
            token_id = %token_id,
            owner = %owner,
            expiry,
            "Registered name"
        );
        Ok(token_id)
    }

    /// Extend the expiry of an active name.
    ///
    /// Requires `RENEW` on the token or at root. The token observer, if any,
    /// is notified after the new expiry is stored.
    pub fn renew(
        &self,
        state: &mut ChainState,
        caller: Address,
        token_id: U256,
        new_expiry: u64,
    ) -> Result<()> {
        let entry = self.live_entry(state, token_id)?;
        self.check_roles(state, token_id, roles::RENEW, caller)?;
        if new_expiry <= entry.expiry {
            return Err(RegistryError::CannotReduceExpiration {
                token_id,
                current: entry.expiry,
                requested: new_expiry,
            });
        }

        state
            .datastore
            .update(self.address, token_id, |e| e.expiry = new_expiry);
        state.emit(Event::ExpiryUpdated {
            registry: self.address,
            token_id,
            new_expiry,
            renewed_by: caller,
        });
        tracing::debug!(registry = %self.address, token_id = %token_id, new_expiry, "Renewed name");

        let observer = self.token_observer(state, token_id);
        if let Some(hook) = state.token_observer(observer) {
            hook.on_renew(state, self.address, token_id, new_expiry, caller)?;
        }
        Ok(())
    }

    /// Point an active name at a new subregistry. Unchanged values are a no-op.
    pub fn set_subregistry(
        &self,
        state: &mut ChainState,
        caller: Address,
        token_id: U256,
        subregistry: Address,
    ) -> Result<()> {
        let entry = self.live_entry(state, token_id)?;
        self.check_roles(state, token_id, roles::SET_SUBREGISTRY, caller)?;
        if entry.subregistry == subregistry {
            return Ok(());
        }

        state
            .datastore
            .update(self.address, token_id, |e| e.subregistry = subregistry);
        state.emit(Event::SubregistryUpdated {
            registry: self.address,
            token_id,
            subregistry,
        });
        tracing::debug!(registry = %self.address, token_id = %token_id, subregistry = %subregistry, "Set subregistry");
        Ok(())
    }

    /// Point an active name at a new resolver. Unchanged values are a no-op.
    pub fn set_resolver(
        &self,
        state: &mut ChainState,
        caller: Address,
        token_id: U256,
        resolver: Address,
    ) -> Result<()> {
        let entry = self.live_entry(state, token_id)?;
        self.check_roles(state, token_id, roles::SET_RESOLVER, caller)?;
        if entry.resolver == resolver {
            return Ok(());
        }

        state
            .datastore
            .update(self.address, token_id, |e| e.resolver = resolver);
        state.emit(Event::ResolverUpdated {
            registry: self.address,
            token_id,
            resolver,
        });
        tracing::debug!(registry = %self.address, token_id = %token_id, resolver = %resolver, "Set resolver");
        Ok(())
    }

    /// Install (or clear, with the zero address) the observer of a token.
    pub fn set_token_observer(
        &self,
        state: &mut ChainState,
        caller: Address,
        token_id: U256,
        observer: Address,
    ) -> Result<()> {
        self.live_entry(state, token_id)?;
        self.check_roles(state, token_id, roles::SET_TOKEN_OBSERVER, caller)?;

        let canonical = canonical_id(token_id);
        let tables = state.tables_mut(self.address)?;
        if observer == Address::ZERO {
            tables.observers.remove(&canonical);
        } else {
            tables.observers.insert(canonical, observer);
        }

        state.emit(Event::TokenObserverUpdated {
            registry: self.address,
            token_id,
            observer,
        });
        Ok(())
    }

    /// Give up an active name.
    ///
    /// Callable by the holder or by an account with `UNREGISTER`. Clears
    /// subregistry, resolver, holder, roles and observer; the observer is
    /// told afterwards.
    pub fn relinquish(&self, state: &mut ChainState, caller: Address, token_id: U256) -> Result<()> {
        self.live_entry(state, token_id)?;
        let owner = self.owner_of(state, token_id);
        if caller != owner && !self.has_roles(state, token_id, roles::UNREGISTER, caller) {
            return Err(RegistryError::UnauthorizedAccountRoles {
                resource: token_id,
                roles: roles::UNREGISTER,
                account: caller,
            });
        }

        let canonical = canonical_id(token_id);
        let observer = self.token_observer(state, token_id);

        state.datastore.update(self.address, token_id, |e| {
            e.subregistry = Address::ZERO;
            e.resolver = Address::ZERO;
            e.expiry = 0;
            e.flags |= FLAG_RELINQUISHED;
        });
        let tables = state.tables_mut(self.address)?;
        tables.owners.remove(&canonical);
        tables.observers.remove(&canonical);
        tables.access.clear_resource(token_id);

        state.emit(Event::TransferSingle {
            registry: self.address,
            operator: caller,
            from: owner,
            to: Address::ZERO,
            token_id,
        });
        state.emit(Event::NameRelinquished {
            registry: self.address,
            token_id,
            relinquished_by: caller,
        });
        tracing::debug!(registry = %self.address, token_id = %token_id, by = %caller, "Relinquished name");

        if let Some(hook) = state.token_observer(observer) {
            hook.on_relinquish(state, self.address, token_id, caller)?;
        }
        Ok(())
    }

    pub fn set_approval_for_all(
        &self,
        state: &mut ChainState,
        owner: Address,
        operator: Address,
        approved: bool,
    ) -> Result<()> {
        let tables = state.tables_mut(self.address)?;
        if approved {
            tables.approvals.insert((owner, operator));
        } else {
            tables.approvals.remove(&(owner, operator));
        }
        state.emit(Event::ApprovalForAll {
            registry: self.address,
            owner,
            operator,
            approved,
        });
        Ok(())
    }

    /// Transfer a token, moving the holder's token roles with it.
    ///
    /// When `to` has an ejection sink installed, the sink runs inside the same
    /// operation and its failure fails the transfer.
    pub fn safe_transfer_from(
        &self,
        state: &mut ChainState,
        operator: Address,
        from: Address,
        to: Address,
        token_id: U256,
        data: &[u8],
    ) -> Result<()> {
        if to == Address::ZERO {
            return Err(RegistryError::InvalidReceiver { account: to });
        }
        self.live_entry(state, token_id)?;
        if self.owner_of(state, token_id) != from {
            return Err(RegistryError::NotTokenOwner {
                token_id,
                account: from,
            });
        }
        if operator != from && !self.is_approved_for_all(state, from, operator) {
            return Err(RegistryError::TransferNotApproved {
                operator,
                owner: from,
            });
        }
        let sink = state.ejection_sink(to);
        let request = EjectionRequest {
            registry: self.address,
            operator,
            from,
            token_id,
            data,
        };
        if let Some(sink) = &sink {
            sink.check_eject(state, request)?;
        }

        let tables = state.tables_mut(self.address)?;
        tables.owners.insert(canonical_id(token_id), to);
        tables.access.transfer(token_id, from, to);

        state.emit(Event::TransferSingle {
            registry: self.address,
            operator,
            from,
            to,
            token_id,
        });
        tracing::debug!(registry = %self.address, token_id = %token_id, from = %from, to = %to, "Transferred token");

        if let Some(sink) = sink {
            sink.on_eject(state, request)?;
        }
        Ok(())
    }

    /// Grant roles at `resource`. The caller needs the admin bits of every
    /// granted role at that resource or at root. Returns the newly added bits.
    pub fn grant_roles(
        &self,
        state: &mut ChainState,
        caller: Address,
        resource: U256,
        account: Address,
        roles: RoleBitmap,
    ) -> Result<RoleBitmap> {
        self.check_roles(state, resource, AccessControl::admin_required(roles), caller)?;

        let added = state.tables_mut(self.address)?.access.grant(resource, account, roles);
        if !added.is_empty() {
            state.emit(Event::RolesGranted {
                registry: self.address,
                resource,
                account,
                roles: added,
                granted_by: caller,
            });
            tracing::debug!(registry = %self.address, resource = %resource, account = %account, roles = %added, "Granted roles");
        }
        Ok(added)
    }

    /// Revoke roles at `resource`, with the same admin requirement as
    /// `grant_roles`. Returns the removed bits.
    pub fn revoke_roles(
        &self,
        state: &mut ChainState,
        caller: Address,
        resource: U256,
        account: Address,
        roles: RoleBitmap,
    ) -> Result<RoleBitmap> {
        self.check_roles(state, resource, AccessControl::admin_required(roles), caller)?;

        let removed = state
            .tables_mut(self.address)?
            .access
            .revoke(resource, account, roles);
        if !removed.is_empty() {
            state.emit(Event::RolesRevoked {
                registry: self.address,
                resource,
                account,
                roles: removed,
                revoked_by: caller,
            });
            tracing::debug!(registry = %self.address, resource = %resource, account = %account, roles = %removed, "Revoked roles");
        }
        Ok(removed)
    }
}
