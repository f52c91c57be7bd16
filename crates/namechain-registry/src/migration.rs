//! Legacy name importer
//!
//! Runs on L1 next to the ejection controller. Each imported name produces
//! exactly one MIGRATION message. Names bound for L2 pass through the ejection
//! controller so the local copy ends up held by it, but because the migration
//! controller carries `MIGRATION_CONTROLLER` that transfer sends nothing.

use alloy_primitives::{Address, Bytes, U256};
use namechain_core::message::{encode_migration, encode_transfer_data};
use namechain_core::name;
use namechain_core::roles::roles;
use namechain_core::{BridgeConfig, MigrationData, RoleBitmap, TransferData, Validate, ROOT_RESOURCE};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::events::Event;
use crate::registry::PermissionedRegistry;
use crate::state::ChainState;

/// A name from the legacy registry, already validated by the importer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyName {
    pub label: String,
    pub owner: Address,
    pub resolver: Address,
    pub expiry: u64,
}

#[derive(Debug, Clone)]
pub struct MigrationController {
    address: Address,
    registry: PermissionedRegistry,
    ejection: Address,
    config: BridgeConfig,
    owner_roles: RoleBitmap,
}

impl MigrationController {
    /// Root roles the controller needs on its registry
    pub const REQUIRED_ROLES: RoleBitmap = roles::REGISTRAR.union(roles::MIGRATION_CONTROLLER);

    pub fn new(
        address: Address,
        registry: PermissionedRegistry,
        ejection: Address,
        config: BridgeConfig,
    ) -> Result<Self> {
        config.validate().map_err(RegistryError::InvalidConfig)?;
        if ejection == Address::ZERO {
            return Err(RegistryError::InvalidConfig(
                "ejection controller address must be set".into(),
            ));
        }
        Ok(Self {
            address,
            registry,
            ejection,
            config,
            owner_roles: roles::OWNER_DEFAULT,
        })
    }

    /// Roles granted to the owner of every imported name
    pub fn with_owner_roles(mut self, owner_roles: RoleBitmap) -> Self {
        self.owner_roles = owner_roles;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn registry(&self) -> PermissionedRegistry {
        self.registry
    }

    /// Import `legacy`, keeping it on L1 if `to_l1` is set and sending it to
    /// L2 otherwise. Returns the local token id.
    ///
    /// The caller is the legacy importer and needs `MIGRATION_CONTROLLER` at
    /// root.
    pub fn migrate(
        &self,
        state: &mut ChainState,
        caller: Address,
        legacy: &LegacyName,
        to_l1: bool,
        data: Bytes,
    ) -> Result<U256> {
        if !self
            .registry
            .has_roles(state, ROOT_RESOURCE, roles::MIGRATION_CONTROLLER, caller)
        {
            return Err(RegistryError::UnauthorizedAccountRoles {
                resource: ROOT_RESOURCE,
                roles: roles::MIGRATION_CONTROLLER,
                account: caller,
            });
        }
        if legacy.owner == Address::ZERO {
            return Err(RegistryError::InvalidReceiver {
                account: legacy.owner,
            });
        }

        let transfer = TransferData {
            label: legacy.label.clone(),
            owner: legacy.owner,
            subregistry: Address::ZERO,
            resolver: legacy.resolver,
            expires: legacy.expiry,
            role_bitmap: self.owner_roles,
        };

        let token_id = if to_l1 {
            self.registry.register(
                state,
                self.address,
                &legacy.label,
                legacy.owner,
                Address::ZERO,
                legacy.resolver,
                self.owner_roles,
                legacy.expiry,
            )?
        } else {
            let token_id = self.registry.register(
                state,
                self.address,
                &legacy.label,
                self.address,
                Address::ZERO,
                legacy.resolver,
                RoleBitmap::default(),
                legacy.expiry,
            )?;
            let payload = encode_transfer_data(&transfer)?;
            self.registry.safe_transfer_from(
                state,
                self.address,
                self.address,
                self.ejection,
                token_id,
                &payload,
            )?;
            token_id
        };

        let dns_name = name::encode(&[legacy.label.as_str(), self.config.tld.as_str()])?;
        let migration = MigrationData {
            transfer,
            to_l1,
            data,
        };
        let sequence = state.send_message(token_id, encode_migration(&dns_name, &migration)?);

        state.emit(Event::MigrationSent {
            controller: self.address,
            token_id,
            label: legacy.label.clone(),
            owner: legacy.owner,
            to_l1,
        });
        tracing::info!(
            label = %legacy.label,
            token_id = %token_id,
            owner = %legacy.owner,
            to_l1,
            sequence,
            "Migrated legacy name"
        );
        Ok(token_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ejection::EjectionController;
    use namechain_core::message::decode_migration;
    use namechain_core::roles::roles::*;
    use namechain_core::Side;

    const NOW: u64 = 1_700_000_000;
    const YEAR: u64 = 365 * 86_400;

    fn admin() -> Address {
        Address::repeat_byte(0xad)
    }

    fn importer() -> Address {
        Address::repeat_byte(0x1e)
    }

    fn legacy(label: &str) -> LegacyName {
        LegacyName {
            label: label.to_string(),
            owner: Address::repeat_byte(0x0e),
            resolver: Address::repeat_byte(0x7e),
            expiry: NOW + YEAR,
        }
    }

    fn setup() -> (ChainState, PermissionedRegistry, EjectionController, MigrationController) {
        let mut state = ChainState::new(Side::L1, NOW);
        let registry =
            PermissionedRegistry::deploy(&mut state, Address::repeat_byte(0xee), admin(), ALL | ADMIN_ALL)
                .unwrap();

        let ejection =
            EjectionController::new(Address::repeat_byte(0xc1), registry, BridgeConfig::new(Side::L1)).unwrap();
        registry
            .grant_roles(&mut state, admin(), ROOT_RESOURCE, ejection.address(), EjectionController::REQUIRED_ROLES)
            .unwrap();
        ejection.install(&mut state);

        let migration = MigrationController::new(
            Address::repeat_byte(0xc2),
            registry,
            ejection.address(),
            BridgeConfig::new(Side::L1),
        )
        .unwrap();
        registry
            .grant_roles(&mut state, admin(), ROOT_RESOURCE, migration.address(), MigrationController::REQUIRED_ROLES)
            .unwrap();
        registry
            .grant_roles(&mut state, admin(), ROOT_RESOURCE, importer(), MIGRATION_CONTROLLER)
            .unwrap();

        (state, registry, ejection, migration)
    }

    #[test]
    fn test_migrate_to_l1_registers_to_owner() {
        let (mut state, registry, _, migration) = setup();
        let token_id = migration
            .migrate(&mut state, importer(), &legacy("test"), true, Bytes::new())
            .unwrap();

        assert_eq!(registry.owner_of(&state, token_id), Address::repeat_byte(0x0e));
        assert_eq!(registry.get_resolver(&state, "test"), Address::repeat_byte(0x7e));
        assert_eq!(state.outbox().len(), 1);

        let (dns, data) = decode_migration(&state.outbox()[0].payload).unwrap();
        assert_eq!(name::decode(&dns).unwrap(), vec!["test", "eth"]);
        assert!(data.to_l1);
        assert_eq!(data.transfer.owner, Address::repeat_byte(0x0e));
    }

    #[test]
    fn test_migrate_to_l2_sends_exactly_one_message() {
        let (mut state, registry, ejection, migration) = setup();
        let token_id = migration
            .migrate(&mut state, importer(), &legacy("test"), false, Bytes::from_static(b"extra"))
            .unwrap();

        assert_eq!(registry.owner_of(&state, token_id), ejection.address());
        assert_eq!(registry.token_observer(&state, token_id), ejection.address());
        assert_eq!(state.outbox().len(), 1);
        assert!(!state.events().iter().any(|e| matches!(e, Event::NameEjected { .. })));

        let (_, data) = decode_migration(&state.outbox()[0].payload).unwrap();
        assert!(!data.to_l1);
        assert_eq!(data.data.as_ref(), b"extra");
    }

    #[test]
    fn test_migrate_requires_role() {
        let (mut state, _, _, migration) = setup();
        let err = migration
            .migrate(&mut state, Address::repeat_byte(0x99), &legacy("test"), true, Bytes::new())
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED_ACCOUNT_ROLES");
    }

    #[test]
    fn test_migrate_rejects_expired_legacy_name() {
        let (mut state, _, _, migration) = setup();
        let mut name = legacy("test");
        name.expiry = NOW - 1;
        let err = migration
            .migrate(&mut state, importer(), &name, true, Bytes::new())
            .unwrap_err();
        assert_eq!(err.code(), "CANNOT_SET_PAST_EXPIRATION");
    }

    #[test]
    fn test_new_requires_ejection_address() {
        let registry = PermissionedRegistry::at(Address::repeat_byte(0xee));
        let result = MigrationController::new(
            Address::repeat_byte(0xc2),
            registry,
            Address::ZERO,
            BridgeConfig::new(Side::L1),
        );
        assert!(matches!(result, Err(RegistryError::InvalidConfig(_))));
    }
}
