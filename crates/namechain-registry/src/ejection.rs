//! Ejection controller
//!
//! One controller per side manages the names of the TLD registry on that side.
//! A name is either LOCAL (held by an ordinary account) or EJECTED (held by
//! the controller, meaning control lives on the other side).
//!
//! ```text
//!            transfer into controller
//!   LOCAL  --------------------------->  EJECTED     outbound EJECTION
//!          <---------------------------              inbound EJECTION
//!            inbound ejection restores
//! ```
//!
//! Renewals propagate from the side whose controller holds the token to the
//! side where an account holds it. Transfers by an account holding
//! `MIGRATION_CONTROLLER` are ejected silently, because the migration flow
//! sends its own message.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use namechain_core::message::{decode_transfer_data, encode_ejection, encode_renewal};
use namechain_core::name::{self, canonical_id};
use namechain_core::roles::roles;
use namechain_core::{
    BridgeConfig, BridgeMessage, MigrationData, RoleBitmap, TransferData, Validate, ROOT_RESOURCE,
};

use crate::error::{RegistryError, Result};
use crate::events::Event;
use crate::hooks::{EjectionRequest, EjectionSink, TokenObserver};
use crate::lookup::NameLookup;
use crate::registry::PermissionedRegistry;
use crate::sequencing::BridgeEnvelope;
use crate::state::ChainState;

#[derive(Debug, Clone)]
pub struct EjectionController {
    address: Address,
    registry: PermissionedRegistry,
    config: BridgeConfig,
}

impl EjectionController {
    /// Root roles the controller needs on its registry
    pub const REQUIRED_ROLES: RoleBitmap = roles::REGISTRAR
        .union(roles::RENEW)
        .union(roles::SET_SUBREGISTRY)
        .union(roles::SET_RESOLVER)
        .union(roles::SET_TOKEN_OBSERVER);

    pub fn new(address: Address, registry: PermissionedRegistry, config: BridgeConfig) -> Result<Self> {
        config.validate().map_err(RegistryError::InvalidConfig)?;
        Ok(Self {
            address,
            registry,
            config,
        })
    }

    /// Install the controller's hooks so transfers and renewals reach it.
    pub fn install(&self, state: &mut ChainState) {
        let hooks = Arc::new(self.clone());
        state.install_ejection_sink(self.address, hooks.clone());
        state.install_token_observer(self.address, hooks);
        tracing::debug!(controller = %self.address, registry = %self.registry.address(), side = %self.config.side, "Installed ejection controller");
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn registry(&self) -> PermissionedRegistry {
        self.registry
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn dns_name(&self, label: &str) -> Result<Vec<u8>> {
        Ok(name::encode(&[label, self.config.tld.as_str()])?)
    }

    fn check_bridge(&self, state: &ChainState, relayer: Address) -> Result<()> {
        if self
            .registry
            .has_roles(state, ROOT_RESOURCE, roles::BRIDGE, relayer)
        {
            Ok(())
        } else {
            Err(RegistryError::UnauthorizedAccountRoles {
                resource: ROOT_RESOURCE,
                roles: roles::BRIDGE,
                account: relayer,
            })
        }
    }

    /// Lookup over the names below the managed TLD
    pub fn lookup(&self) -> NameLookup {
        NameLookup::new(self.registry, self.config.tld.clone())
    }

    /// Registry that holds `label`, which must be the first label of
    /// `dns_name`.
    fn locate(&self, state: &ChainState, dns_name: &[u8], label: &str) -> Result<PermissionedRegistry> {
        let labels = name::decode(dns_name)?;
        let lookup = self.lookup();

        lookup.check_tld(&labels)?;
        if labels.len() < 2 || labels[0] != label {
            return Err(RegistryError::LabelNotFound {
                label: label.to_string(),
            });
        }
        lookup.parent_registry(state, &labels)
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Apply one envelope from the other side, in per-name order.
    ///
    /// Returns how many messages were applied: zero if the envelope was
    /// parked behind a gap, more than one if it released parked successors.
    /// Payloads that do not decode are rejected before they can be parked. A
    /// released successor that fails to apply is left parked for redelivery
    /// and does not undo the envelope that released it.
    pub fn deliver(&self, state: &mut ChainState, relayer: Address, envelope: BridgeEnvelope) -> Result<usize> {
        self.check_bridge(state, relayer)?;
        let expected_origin = state.side().remote();
        if envelope.origin != expected_origin {
            return Err(RegistryError::UnexpectedOrigin {
                origin: envelope.origin,
            });
        }
        BridgeMessage::decode(&envelope.payload)?;

        let token = envelope.token;
        let Some(envelope) = state.receiver.admit(envelope)? else {
            return Ok(0);
        };
        self.apply_isolated(state, &envelope.payload)?;

        let mut applied = 1;
        let mut ready = state.receiver.complete(token);
        while let Some(parked) = ready {
            if let Err(err) = self.apply_isolated(state, &parked.payload) {
                tracing::warn!(
                    side = %state.side(),
                    token = %canonical_id(token),
                    sequence = parked.sequence,
                    error = %err,
                    "Parked bridge message failed, awaiting redelivery"
                );
                break;
            }
            applied += 1;
            ready = state.receiver.complete(token);
        }
        Ok(applied)
    }

    /// Apply a payload, leaving `state` untouched if it fails.
    fn apply_isolated(&self, state: &mut ChainState, payload: &[u8]) -> Result<()> {
        let snapshot = state.clone();
        let result = self.apply(state, payload);
        if result.is_err() {
            *state = snapshot;
        }
        result
    }

    /// Apply a raw message without sequencing.
    pub fn receive_message(&self, state: &mut ChainState, relayer: Address, payload: &[u8]) -> Result<()> {
        self.check_bridge(state, relayer)?;
        self.apply(state, payload)
    }

    fn apply(&self, state: &mut ChainState, payload: &[u8]) -> Result<()> {
        match BridgeMessage::decode(payload)? {
            BridgeMessage::Ejection { dns_name, transfer } => {
                self.complete_ejection(state, &dns_name, transfer)
            }
            BridgeMessage::Migration {
                dns_name,
                migration,
            } => self.complete_migration(state, &dns_name, migration),
            BridgeMessage::Renewal {
                token_id,
                new_expiry,
            } => self.sync_renewal(state, token_id, new_expiry),
        }
    }

    /// A name ejected on the other side arrives here.
    ///
    /// If the controller holds the local copy it is handed back to the
    /// message's owner; a name nobody holds is registered fresh; a name held
    /// by anyone else is a conflict.
    fn complete_ejection(&self, state: &mut ChainState, dns_name: &[u8], transfer: TransferData) -> Result<()> {
        let registry = self.locate(state, dns_name, &transfer.label)?;
        let entry = registry.entry(state, &transfer.label);
        let token_id = entry.token_id(transfer.canonical_id());

        let token_id = if entry.is_active(state.now()) {
            if registry.owner_of(state, token_id) != self.address {
                return Err(RegistryError::NotTokenOwner {
                    token_id,
                    account: self.address,
                });
            }

            registry.set_subregistry(state, self.address, token_id, transfer.subregistry)?;
            registry.set_resolver(state, self.address, token_id, transfer.resolver)?;
            if transfer.expires > entry.expiry {
                registry.renew(state, self.address, token_id, transfer.expires)?;
            }
            registry.safe_transfer_from(state, self.address, self.address, transfer.owner, token_id, &[])?;
            token_id
        } else {
            let token_id = registry.register(
                state,
                self.address,
                &transfer.label,
                transfer.owner,
                transfer.subregistry,
                transfer.resolver,
                transfer.role_bitmap,
                transfer.expires,
            )?;
            registry.set_token_observer(state, self.address, token_id, self.address)?;
            token_id
        };

        state.emit(Event::NameMigrated {
            controller: self.address,
            token_id,
            owner: transfer.owner,
            subregistry: transfer.subregistry,
            resolver: transfer.resolver,
        });
        tracing::info!(
            side = %state.side(),
            label = %transfer.label,
            token_id = %token_id,
            owner = %transfer.owner,
            "Completed inbound ejection"
        );
        Ok(())
    }

    /// A legacy name migrated on the other side arrives here.
    ///
    /// Names staying on the other side are held by the controller; the rest
    /// are registered to their owner.
    fn complete_migration(&self, state: &mut ChainState, dns_name: &[u8], migration: MigrationData) -> Result<()> {
        let transfer = &migration.transfer;
        let registry = self.locate(state, dns_name, &transfer.label)?;

        let (owner, subregistry) = if migration.to_l1 {
            (self.address, Address::ZERO)
        } else {
            (transfer.owner, transfer.subregistry)
        };
        let token_id = registry.register(
            state,
            self.address,
            &transfer.label,
            owner,
            subregistry,
            transfer.resolver,
            transfer.role_bitmap,
            transfer.expires,
        )?;
        if registry == self.registry {
            registry.set_token_observer(state, self.address, token_id, self.address)?;
        }

        state.emit(Event::MigrationCompleted {
            controller: self.address,
            registry: registry.address(),
            token_id,
            owner,
            to_l1: migration.to_l1,
        });
        tracing::info!(
            side = %state.side(),
            label = %transfer.label,
            token_id = %token_id,
            owner = %owner,
            to_l1 = migration.to_l1,
            "Completed inbound migration"
        );
        Ok(())
    }

    /// Mirror a renewal made on the other side.
    ///
    /// Applies only to an active local copy held by an account. A copy held by
    /// the controller has moved on since the renewal was sent, and a renewal
    /// that does not extend the local expiry was already applied; both are
    /// ignored without error.
    fn sync_renewal(&self, state: &mut ChainState, token_id: U256, new_expiry: u64) -> Result<()> {
        let canonical = canonical_id(token_id);
        let entry = state.datastore().get(self.registry.address(), canonical);
        let local_token = entry.token_id(canonical);

        if !entry.is_active(state.now()) {
            tracing::debug!(token_id = %local_token, "Renewal for inactive name ignored");
            return Ok(());
        }
        if self.registry.owner_of(state, local_token) == self.address {
            tracing::debug!(token_id = %local_token, "Renewal for ejected name ignored");
            return Ok(());
        }
        if new_expiry <= entry.expiry {
            tracing::debug!(token_id = %local_token, new_expiry, current = entry.expiry, "Renewal already applied");
            return Ok(());
        }

        self.registry.renew(state, self.address, local_token, new_expiry)?;
        state.emit(Event::RenewalSynced {
            controller: self.address,
            token_id: local_token,
            new_expiry,
        });
        tracing::info!(side = %state.side(), token_id = %local_token, new_expiry, "Synced renewal");
        Ok(())
    }
}

impl EjectionController {
    /// Transfer data of an ejection, checked against the transferred token
    fn read_transfer(&self, request: &EjectionRequest<'_>) -> Result<TransferData> {
        if request.registry != self.registry.address() {
            return Err(RegistryError::ForeignRegistry {
                registry: request.registry,
                token_id: request.token_id,
            });
        }

        let transfer = decode_transfer_data(request.data)?;
        if transfer.canonical_id() != canonical_id(request.token_id) {
            return Err(RegistryError::LabelMismatch {
                token_id: request.token_id,
                label: transfer.label,
            });
        }
        Ok(transfer)
    }
}

impl EjectionSink for EjectionController {
    fn check_eject(&self, _state: &ChainState, request: EjectionRequest<'_>) -> Result<()> {
        self.read_transfer(&request).map(|_| ())
    }

    /// A holder transferred a token into the controller.
    fn on_eject(&self, state: &mut ChainState, request: EjectionRequest<'_>) -> Result<()> {
        let mut transfer = self.read_transfer(&request)?;
        // the remote copy never outlives the local one
        transfer.expires = self.registry.get_expiry(state, request.token_id);

        self.registry
            .set_subregistry(state, self.address, request.token_id, Address::ZERO)?;
        self.registry
            .set_token_observer(state, self.address, request.token_id, self.address)?;

        let migrating = [request.operator, request.from].into_iter().any(|account| {
            self.registry
                .has_roles(state, ROOT_RESOURCE, roles::MIGRATION_CONTROLLER, account)
        });
        if migrating {
            tracing::debug!(token_id = %request.token_id, from = %request.from, "Ejection by migration controller, no message");
            return Ok(());
        }

        let dns_name = self.dns_name(&transfer.label)?;
        let payload = encode_ejection(&dns_name, &transfer)?;
        let sequence = state.send_message(request.token_id, payload);

        tracing::info!(
            side = %state.side(),
            label = %transfer.label,
            token_id = %request.token_id,
            owner = %transfer.owner,
            sequence,
            "Ejected name"
        );
        state.emit(Event::NameEjected {
            controller: self.address,
            token_id: request.token_id,
            dns_name: dns_name.into(),
            transfer,
        });
        Ok(())
    }
}

impl TokenObserver for EjectionController {
    /// Forward renewals of names the controller holds.
    fn on_renew(
        &self,
        state: &mut ChainState,
        registry: Address,
        token_id: U256,
        new_expiry: u64,
        renewed_by: Address,
    ) -> Result<()> {
        if registry != self.registry.address() || renewed_by == self.address {
            return Ok(());
        }
        if self.registry.owner_of(state, token_id) != self.address {
            return Ok(());
        }

        let sequence = state.send_message(token_id, encode_renewal(token_id, new_expiry));
        tracing::info!(side = %state.side(), token_id = %token_id, new_expiry, sequence, "Forwarded renewal");
        Ok(())
    }

    fn on_relinquish(
        &self,
        _state: &mut ChainState,
        _registry: Address,
        token_id: U256,
        relinquished_by: Address,
    ) -> Result<()> {
        tracing::debug!(token_id = %token_id, by = %relinquished_by, "Relinquish has no cross-chain effect");
        Ok(())
    }
}
