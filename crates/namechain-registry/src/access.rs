//! Role grants per (resource, account)
//!
//! A check at a token resource also honours grants made at `ROOT_RESOURCE`,
//! so root roles apply to every token of the registry.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use namechain_core::roles::roles::ADMIN_ALL;
use namechain_core::{RoleBitmap, ROOT_RESOURCE};

use crate::error::{RegistryError, Result};

#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    grants: HashMap<(U256, Address), RoleBitmap>,
}

impl AccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roles granted at exactly `resource`
    pub fn roles(&self, resource: U256, account: Address) -> RoleBitmap {
        self.grants
            .get(&(resource, account))
            .copied()
            .unwrap_or_default()
    }

    /// Roles effective at `resource`: its own grants plus root grants
    pub fn effective_roles(&self, resource: U256, account: Address) -> RoleBitmap {
        let root = self.roles(ROOT_RESOURCE, account);
        if resource == ROOT_RESOURCE {
            root
        } else {
            root | self.roles(resource, account)
        }
    }

    pub fn has_roles(&self, resource: U256, required: RoleBitmap, account: Address) -> bool {
        self.effective_roles(resource, account).has_all(required)
    }

    pub fn check_roles(&self, resource: U256, required: RoleBitmap, account: Address) -> Result<()> {
        if self.has_roles(resource, required, account) {
            Ok(())
        } else {
            Err(RegistryError::UnauthorizedAccountRoles {
                resource,
                roles: required,
                account,
            })
        }
    }

    /// Admin bits `caller` must hold to grant or revoke `roles`.
    ///
    /// Base roles need their admin counterpart; admin roles need themselves.
    pub fn admin_required(roles: RoleBitmap) -> RoleBitmap {
        roles.admin() | (roles & ADMIN_ALL)
    }

    /// Grant without an authorization check. Returns the newly added bits.
    pub fn grant(&mut self, resource: U256, account: Address, roles: RoleBitmap) -> RoleBitmap {
        let slot = self.grants.entry((resource, account)).or_default();
        let added = roles.without(*slot);
        *slot |= roles;
        added
    }

    /// Revoke without an authorization check. Returns the removed bits.
    pub fn revoke(&mut self, resource: U256, account: Address, roles: RoleBitmap) -> RoleBitmap {
        let Some(slot) = self.grants.get_mut(&(resource, account)) else {
            return RoleBitmap::EMPTY;
        };
        let removed = *slot & roles;
        *slot = slot.without(roles);
        if slot.is_empty() {
            self.grants.remove(&(resource, account));
        }
        removed
    }

    /// Move every grant `from` holds at `resource` to `to`.
    pub fn transfer(&mut self, resource: U256, from: Address, to: Address) -> RoleBitmap {
        let moved = self
            .grants
            .remove(&(resource, from))
            .unwrap_or_default();
        if !moved.is_empty() {
            self.grant(resource, to, moved);
        }
        moved
    }

    /// Drop every grant at `resource`.
    pub fn clear_resource(&mut self, resource: U256) {
        self.grants.retain(|(r, _), _| *r != resource);
    }
}
