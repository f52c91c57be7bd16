//! All mutable state of one side of the bridge
//!
//! Every operation takes `&mut ChainState`. `Chain::execute` snapshots the
//! state before running an operation and restores the snapshot if it fails,
//! which gives each operation all-or-nothing semantics including nested hook
//! calls, emitted events and queued bridge messages.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use namechain_core::name::canonical_id;
use namechain_core::Side;

use crate::error::{RegistryError, Result};
use crate::events::Event;
use crate::hooks::{EjectionSink, TokenObserver};
use crate::registry::RegistryTables;
use crate::sequencing::{BridgeEnvelope, BridgeReceiver, BridgeSender};
use crate::store::RegistryDatastore;
use crate::token::Erc20Ledger;

#[derive(Clone)]
pub struct ChainState {
    side: Side,
    now: u64,
    pub(crate) datastore: RegistryDatastore,
    pub(crate) registries: HashMap<Address, RegistryTables>,
    pub(crate) sinks: HashMap<Address, Arc<dyn EjectionSink>>,
    pub(crate) observers: HashMap<Address, Arc<dyn TokenObserver>>,
    /// (registrar, commitment) -> commit time
    pub(crate) commitments: HashMap<(Address, B256), u64>,
    tokens: HashMap<Address, Erc20Ledger>,
    pub(crate) sender: BridgeSender,
    pub(crate) receiver: BridgeReceiver,
    events: Vec<Event>,
    outbox: Vec<BridgeEnvelope>,
}

impl ChainState {
    pub fn new(side: Side, now: u64) -> Self {
        Self {
            side,
            now,
            datastore: RegistryDatastore::new(),
            registries: HashMap::new(),
            sinks: HashMap::new(),
            observers: HashMap::new(),
            commitments: HashMap::new(),
            tokens: HashMap::new(),
            sender: BridgeSender::default(),
            receiver: BridgeReceiver::default(),
            events: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Current block time
    pub fn now(&self) -> u64 {
        self.now
    }

    pub(crate) fn set_now(&mut self, now: u64) {
        self.now = now;
    }

    pub fn datastore(&self) -> &RegistryDatastore {
        &self.datastore
    }

    pub(crate) fn tables(&self, registry: Address) -> Result<&RegistryTables> {
        self.registries
            .get(&registry)
            .ok_or(RegistryError::RegistryNotDeployed { registry })
    }

    pub(crate) fn tables_mut(&mut self, registry: Address) -> Result<&mut RegistryTables> {
        self.registries
            .get_mut(&registry)
            .ok_or(RegistryError::RegistryNotDeployed { registry })
    }

    pub fn is_registry(&self, address: Address) -> bool {
        self.registries.contains_key(&address)
    }

    pub fn install_ejection_sink(&mut self, address: Address, sink: Arc<dyn EjectionSink>) {
        self.sinks.insert(address, sink);
    }

    pub fn install_token_observer(&mut self, address: Address, observer: Arc<dyn TokenObserver>) {
        self.observers.insert(address, observer);
    }

    pub(crate) fn ejection_sink(&self, address: Address) -> Option<Arc<dyn EjectionSink>> {
        self.sinks.get(&address).cloned()
    }

    pub(crate) fn token_observer(&self, address: Address) -> Option<Arc<dyn TokenObserver>> {
        self.observers.get(&address).cloned()
    }

    pub fn deploy_token(&mut self, address: Address, ledger: Erc20Ledger) {
        self.tokens.insert(address, ledger);
    }

    pub fn token(&self, address: Address) -> Option<&Erc20Ledger> {
        self.tokens.get(&address)
    }

    pub fn token_mut(&mut self, address: Address) -> Option<&mut Erc20Ledger> {
        self.tokens.get_mut(&address)
    }

    /// Commit time of a registrar commitment
    pub fn commitment(&self, registrar: Address, commitment: B256) -> Option<u64> {
        self.commitments.get(&(registrar, commitment)).copied()
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Queue an encoded message for publication when the transaction commits.
    ///
    /// Returns the sequence number assigned to it.
    pub fn send_message(&mut self, token: U256, payload: Vec<u8>) -> u64 {
        let token = canonical_id(token);
        let sequence = self.sender.next_sequence(token);
        self.outbox.push(BridgeEnvelope {
            origin: self.side,
            token,
            sequence,
            payload: Bytes::from(payload),
        });
        sequence
    }

    pub fn outbox(&self) -> &[BridgeEnvelope] {
        &self.outbox
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<BridgeEnvelope> {
        std::mem::take(&mut self.outbox)
    }

    pub fn receiver(&self) -> &BridgeReceiver {
        &self.receiver
    }
}
