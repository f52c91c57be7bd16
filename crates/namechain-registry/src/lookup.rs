//! Hierarchical name lookup
//!
//! Full names are resolved by walking subregistries from the TLD registry
//! towards the leftmost label:
//!
//! ```text
//! sub.test.eth   eth registry --"test"--> subregistry --"sub"--> entry
//! ```
//!
//! An inactive ancestor or one without a subregistry ends the walk.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use namechain_core::name;

use crate::error::{RegistryError, Result};
use crate::registry::PermissionedRegistry;
use crate::state::ChainState;
use crate::store::NameState;

/// Registry record of a full name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameInfo {
    /// Dotted name
    pub name: String,
    /// Registry holding the leftmost label
    pub registry: Address,
    pub token_id: U256,
    /// Zero unless the name is active
    pub owner: Address,
    pub subregistry: Address,
    pub resolver: Address,
    pub expiry: u64,
    pub state: NameState,
}

/// Resolver that applies to a name and the ancestor it is set on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverMatch {
    pub resolver: Address,
    /// Dotted name the resolver was found on, empty if none was found
    pub name: String,
}

/// Walks names below one TLD registry
#[derive(Debug, Clone)]
pub struct NameLookup {
    registry: PermissionedRegistry,
    tld: String,
}

impl NameLookup {
    pub fn new(registry: PermissionedRegistry, tld: impl Into<String>) -> Self {
        Self {
            registry,
            tld: tld.into(),
        }
    }

    pub fn registry(&self) -> PermissionedRegistry {
        self.registry
    }

    pub fn tld(&self) -> &str {
        &self.tld
    }

    pub(crate) fn check_tld(&self, labels: &[String]) -> Result<()> {
        let tld = labels.last().map(String::as_str).unwrap_or_default();
        if tld != self.tld {
            return Err(RegistryError::InvalidTLD {
                tld: tld.to_string(),
            });
        }
        Ok(())
    }

    /// Registry that holds `labels[0]`.
    ///
    /// Every ancestor between the TLD and the leftmost label must be active
    /// with a subregistry, otherwise `ParentNotMigrated` names the first
    /// ancestor that is not.
    pub fn parent_registry(&self, state: &ChainState, labels: &[String]) -> Result<PermissionedRegistry> {
        self.check_tld(labels)?;
        if labels.len() < 2 {
            return Err(RegistryError::LabelNotFound {
                label: labels.first().cloned().unwrap_or_default(),
            });
        }

        let mut registry = self.registry;
        for depth in (1..labels.len() - 1).rev() {
            let subregistry = registry.get_subregistry(state, &labels[depth]);
            if subregistry == Address::ZERO {
                return Err(RegistryError::ParentNotMigrated {
                    name: name::to_dotted(&labels[depth..]),
                });
            }
            registry = PermissionedRegistry::at(subregistry);
        }
        Ok(registry)
    }

    /// Record of a DNS-encoded name.
    pub fn get_info(&self, state: &ChainState, dns_name: &[u8]) -> Result<NameInfo> {
        let labels = name::decode(dns_name)?;
        self.info(state, &labels)
    }

    /// Record of a dotted name such as `sub.test.eth`.
    pub fn get_info_dotted(&self, state: &ChainState, dotted: &str) -> Result<NameInfo> {
        let labels = name::parse_dotted(dotted)?;
        self.info(state, &labels)
    }

    fn info(&self, state: &ChainState, labels: &[String]) -> Result<NameInfo> {
        let registry = self.parent_registry(state, labels)?;
        let label = &labels[0];
        let entry = registry.entry(state, label);
        let token_id = registry.token_id(state, label);

        Ok(NameInfo {
            name: name::to_dotted(labels),
            registry: registry.address(),
            token_id,
            owner: registry.owner_of(state, token_id),
            subregistry: registry.get_subregistry(state, label),
            resolver: registry.get_resolver(state, label),
            expiry: entry.expiry,
            state: entry.state(state.now()),
        })
    }

    /// Deepest resolver set on `dns_name` or one of its ancestors.
    ///
    /// Unlike `get_info`, a broken hierarchy is not an error: the walk stops
    /// and the deepest resolver seen so far applies.
    pub fn find_resolver(&self, state: &ChainState, dns_name: &[u8]) -> Result<ResolverMatch> {
        let labels = name::decode(dns_name)?;
        self.check_tld(&labels)?;

        let mut found = ResolverMatch {
            resolver: Address::ZERO,
            name: String::new(),
        };
        let mut registry = self.registry;
        for depth in (0..labels.len().saturating_sub(1)).rev() {
            let label = &labels[depth];
            let resolver = registry.get_resolver(state, label);
            if resolver != Address::ZERO {
                found = ResolverMatch {
                    resolver,
                    name: name::to_dotted(&labels[depth..]),
                };
            }

            let subregistry = registry.get_subregistry(state, label);
            if subregistry == Address::ZERO {
                break;
            }
            registry = PermissionedRegistry::at(subregistry);
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use namechain_core::roles::roles::*;
    use namechain_core::Side;

    const NOW: u64 = 1_700_000_000;
    const YEAR: u64 = 365 * 86_400;

    fn admin() -> Address {
        Address::repeat_byte(0xad)
    }

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    fn resolver() -> Address {
        Address::repeat_byte(0x7e)
    }

    fn sub_address() -> Address {
        Address::repeat_byte(0x5b)
    }

    /// eth registry with test.eth (resolver set) pointing at a subregistry
    /// that holds sub.test.eth (no resolver).
    fn setup() -> (ChainState, NameLookup, PermissionedRegistry) {
        let mut state = ChainState::new(Side::L1, NOW);
        let eth = PermissionedRegistry::deploy(&mut state, Address::repeat_byte(0xee), admin(), ALL | ADMIN_ALL)
            .unwrap();
        let sub = PermissionedRegistry::deploy(&mut state, sub_address(), admin(), ALL | ADMIN_ALL).unwrap();

        eth.register(&mut state, admin(), "test", alice(), sub_address(), resolver(), OWNER_DEFAULT, NOW + YEAR)
            .unwrap();
        sub.register(&mut state, admin(), "sub", alice(), Address::ZERO, Address::ZERO, OWNER_DEFAULT, NOW + 2 * YEAR)
            .unwrap();
        (state, NameLookup::new(eth, "eth"), sub)
    }

    #[test]
    fn test_info_walks_subregistries() {
        let (state, lookup, sub) = setup();

        let info = lookup.get_info_dotted(&state, "sub.test.eth").unwrap();
        assert_eq!(info.name, "sub.test.eth");
        assert_eq!(info.registry, sub.address());
        assert_eq!(info.token_id, sub.token_id(&state, "sub"));
        assert_eq!(info.owner, alice());
        assert_eq!(info.expiry, NOW + 2 * YEAR);
        assert_eq!(info.state, NameState::Active);

        let dns = name::encode(&["test", "eth"]).unwrap();
        let info = lookup.get_info(&state, &dns).unwrap();
        assert_eq!(info.subregistry, sub_address());
        assert_eq!(info.resolver, resolver());
    }

    #[test]
    fn test_info_of_unknown_and_expired_names() {
        let (mut state, lookup, _) = setup();

        let info = lookup.get_info_dotted(&state, "nobody.eth").unwrap();
        assert_eq!(info.state, NameState::Unregistered);
        assert_eq!(info.owner, Address::ZERO);

        state.set_now(NOW + YEAR + 1);
        let info = lookup.get_info_dotted(&state, "test.eth").unwrap();
        assert_eq!(info.state, NameState::Expired);
        assert_eq!(info.owner, Address::ZERO);
        assert_eq!(info.resolver, Address::ZERO);

        // an expired parent cuts off its children
        let err = lookup.get_info_dotted(&state, "sub.test.eth").unwrap_err();
        assert_eq!(err, RegistryError::ParentNotMigrated { name: "test.eth".into() });
    }

    #[test]
    fn test_info_rejects_foreign_tld() {
        let (state, lookup, _) = setup();
        let err = lookup.get_info_dotted(&state, "test.com").unwrap_err();
        assert_eq!(err, RegistryError::InvalidTLD { tld: "com".into() });

        let err = lookup.get_info_dotted(&state, "eth").unwrap_err();
        assert_eq!(err, RegistryError::LabelNotFound { label: "eth".into() });
    }

    #[test]
    fn test_find_resolver_uses_deepest_ancestor() {
        let (mut state, lookup, sub) = setup();

        let dns = name::encode(&["deep", "sub", "test", "eth"]).unwrap();
        let found = lookup.find_resolver(&state, &dns).unwrap();
        assert_eq!(found.resolver, resolver());
        assert_eq!(found.name, "test.eth");

        let own = Address::repeat_byte(0x99);
        let token_id = sub.token_id(&state, "sub");
        sub.set_resolver(&mut state, admin(), token_id, own).unwrap();
        let found = lookup.find_resolver(&state, &dns).unwrap();
        assert_eq!(found.resolver, own);
        assert_eq!(found.name, "sub.test.eth");

        let dns = name::encode(&["nobody", "eth"]).unwrap();
        let found = lookup.find_resolver(&state, &dns).unwrap();
        assert_eq!(found.resolver, Address::ZERO);
        assert!(found.name.is_empty());
    }
}
