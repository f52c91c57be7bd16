//! Events emitted by registries, controllers and the registrar

use alloy_primitives::{Address, Bytes, B256, U256};
use namechain_core::{RoleBitmap, TransferData};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    NameRegistered {
        registry: Address,
        token_id: U256,
        label: String,
        owner: Address,
        subregistry: Address,
        resolver: Address,
        expiry: u64,
    },
    ExpiryUpdated {
        registry: Address,
        token_id: U256,
        new_expiry: u64,
        renewed_by: Address,
    },
    SubregistryUpdated {
        registry: Address,
        token_id: U256,
        subregistry: Address,
    },
    ResolverUpdated {
        registry: Address,
        token_id: U256,
        resolver: Address,
    },
    TokenObserverUpdated {
        registry: Address,
        token_id: U256,
        observer: Address,
    },
    NameRelinquished {
        registry: Address,
        token_id: U256,
        relinquished_by: Address,
    },
    TransferSingle {
        registry: Address,
        operator: Address,
        from: Address,
        to: Address,
        token_id: U256,
    },
    ApprovalForAll {
        registry: Address,
        owner: Address,
        operator: Address,
        approved: bool,
    },
    RolesGranted {
        registry: Address,
        resource: U256,
        account: Address,
        roles: RoleBitmap,
        granted_by: Address,
    },
    RolesRevoked {
        registry: Address,
        resource: U256,
        account: Address,
        roles: RoleBitmap,
        revoked_by: Address,
    },
    NameEjected {
        controller: Address,
        token_id: U256,
        dns_name: Bytes,
        transfer: TransferData,
    },
    NameMigrated {
        controller: Address,
        token_id: U256,
        owner: Address,
        subregistry: Address,
        resolver: Address,
    },
    RenewalSynced {
        controller: Address,
        token_id: U256,
        new_expiry: u64,
    },
    MigrationSent {
        controller: Address,
        token_id: U256,
        label: String,
        owner: Address,
        to_l1: bool,
    },
    MigrationCompleted {
        controller: Address,
        registry: Address,
        token_id: U256,
        owner: Address,
        to_l1: bool,
    },
    CommitmentMade {
        registrar: Address,
        commitment: B256,
    },
    NameBought {
        registrar: Address,
        label: String,
        owner: Address,
        token_id: U256,
        payment_token: Address,
        base: U256,
        premium: U256,
        amount: U256,
        referrer: B256,
    },
    NameRenewed {
        registrar: Address,
        label: String,
        token_id: U256,
        duration: u64,
        new_expiry: u64,
        payment_token: Address,
        amount: U256,
    },
}
