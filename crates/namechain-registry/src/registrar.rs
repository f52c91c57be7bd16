//! Commit-reveal registrar
//!
//! ```text
//! NONE --commit--> COMMITTED --register (min_age <= age <= max_age)--> CONSUMED
//!                      |
//!                      +--age > max_age--> EXPIRED (recommit to retry)
//! ```
//!
//! Payment is quoted in the pricing config's internal unit and converted to
//! the payment token's decimals (rounding up) before it is collected. Every
//! check the registry would run happens before payment, so a rejected
//! registration or renewal never charges the caller.

use alloy_primitives::{Address, B256, U256};
use namechain_core::name::{keccak256, label_hash, validate_label};
use namechain_core::roles::roles;
use namechain_core::{
    convert_decimals, PriceCurve, PriceQuote, PricingConfig, RegistrarConfig, RoleBitmap, Validate,
    ROOT_RESOURCE,
};

use crate::error::{RegistryError, Result};
use crate::events::Event;
use crate::registry::PermissionedRegistry;
use crate::state::ChainState;
use crate::store::NameState;
use crate::token::safe_transfer_from;

/// Reveal of a prior commitment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub label: String,
    pub owner: Address,
    pub secret: B256,
    pub subregistry: Address,
    pub resolver: Address,
    pub duration: u64,
    pub payment_token: Address,
    pub referrer: B256,
}

impl RegisterRequest {
    pub fn commitment(&self) -> B256 {
        Registrar::make_commitment(
            &self.label,
            self.owner,
            self.secret,
            self.subregistry,
            self.resolver,
            self.duration,
        )
    }
}

#[derive(Debug, Clone)]
pub struct Registrar {
    address: Address,
    registry: PermissionedRegistry,
    config: RegistrarConfig,
    curve: PriceCurve,
    payment_tokens: Vec<Address>,
}

impl Registrar {
    /// Root roles the registrar needs on its registry
    pub const REQUIRED_ROLES: RoleBitmap = roles::REGISTRAR.union(roles::RENEW);

    pub fn new(
        address: Address,
        registry: PermissionedRegistry,
        config: RegistrarConfig,
        pricing: PricingConfig,
    ) -> Result<Self> {
        config.validate().map_err(RegistryError::InvalidConfig)?;
        let curve = PriceCurve::new(pricing)?;
        Ok(Self {
            address,
            registry,
            config,
            curve,
            payment_tokens: Vec::new(),
        })
    }

    /// Accept payment in `token`.
    pub fn with_payment_token(mut self, token: Address) -> Self {
        if !self.payment_tokens.contains(&token) {
            self.payment_tokens.push(token);
        }
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn registry(&self) -> PermissionedRegistry {
        self.registry
    }

    pub fn config(&self) -> &RegistrarConfig {
        &self.config
    }

    pub fn curve(&self) -> &PriceCurve {
        &self.curve
    }

    pub fn payment_tokens(&self) -> &[Address] {
        &self.payment_tokens
    }

    /// Hash binding a registration to its parameters.
    ///
    /// Keccak-256 over six 32-byte words: label hash, owner, secret,
    /// subregistry, resolver, duration. Addresses and the duration are
    /// left-padded.
    pub fn make_commitment(
        label: &str,
        owner: Address,
        secret: B256,
        subregistry: Address,
        resolver: Address,
        duration: u64,
    ) -> B256 {
        let mut buf = [0u8; 6 * 32];
        buf[0..32].copy_from_slice(label_hash(label).as_slice());
        buf[44..64].copy_from_slice(owner.as_slice());
        buf[64..96].copy_from_slice(secret.as_slice());
        buf[108..128].copy_from_slice(subregistry.as_slice());
        buf[140..160].copy_from_slice(resolver.as_slice());
        buf[184..192].copy_from_slice(&duration.to_be_bytes());
        keccak256(buf)
    }

    /// Record `commitment` at the current time. Recommitting resets the clock.
    pub fn commit(&self, state: &mut ChainState, caller: Address, commitment: B256) -> Result<()> {
        let now = state.now();
        state.commitments.insert((self.address, commitment), now);
        state.emit(Event::CommitmentMade {
            registrar: self.address,
            commitment,
        });
        tracing::debug!(registrar = %self.address, commitment = %commitment, by = %caller, "Committed");
        Ok(())
    }

    pub fn is_available(&self, state: &ChainState, label: &str) -> bool {
        self.registry.name_state(state, label) != NameState::Active
    }

    /// Price of `label` for `duration` in the internal unit, against its
    /// current expiry (0 if never registered).
    pub fn quote(&self, state: &ChainState, label: &str, duration: u64) -> Result<PriceQuote> {
        let expiry = self.registry.entry(state, label).expiry;
        Ok(self.curve.price(label, expiry, duration, state.now())?)
    }

    /// What `register` or `renew` would charge in `payment_token`.
    pub fn check_price(
        &self,
        state: &ChainState,
        label: &str,
        duration: u64,
        payment_token: Address,
    ) -> Result<U256> {
        let quote = self.quote(state, label, duration)?;
        self.token_amount(state, &quote, payment_token)
    }

    fn token_amount(&self, state: &ChainState, quote: &PriceQuote, payment_token: Address) -> Result<U256> {
        if !self.payment_tokens.contains(&payment_token) {
            return Err(RegistryError::UnsupportedPaymentToken {
                token: payment_token,
            });
        }
        let decimals = state
            .token(payment_token)
            .map(|t| t.decimals())
            .ok_or(RegistryError::UnsupportedPaymentToken {
                token: payment_token,
            })?;
        Ok(convert_decimals(
            quote.total()?,
            self.curve.config().price_decimals,
            decimals,
        )?)
    }

    /// The registry call made after payment must not fail on missing roles.
    fn check_granted(&self, state: &ChainState, required: RoleBitmap) -> Result<()> {
        if self
            .registry
            .has_roles(state, ROOT_RESOURCE, required, self.address)
        {
            Ok(())
        } else {
            Err(RegistryError::UnauthorizedAccountRoles {
                resource: ROOT_RESOURCE,
                roles: required,
                account: self.address,
            })
        }
    }

    fn check_commitment(&self, state: &ChainState, commitment: B256) -> Result<()> {
        let committed_at = state
            .commitment(self.address, commitment)
            .ok_or(RegistryError::CommitmentNotFound { commitment })?;
        let age = state.now().saturating_sub(committed_at);

        if age < self.config.min_commitment_age {
            return Err(RegistryError::CommitmentTooNew {
                commitment,
                age,
                min_age: self.config.min_commitment_age,
            });
        }
        if age > self.config.max_commitment_age {
            return Err(RegistryError::CommitmentTooOld {
                commitment,
                age,
                max_age: self.config.max_commitment_age,
            });
        }
        Ok(())
    }

    /// Reveal a commitment, collect payment from `caller` and register.
    pub fn register(
        &self,
        state: &mut ChainState,
        caller: Address,
        request: &RegisterRequest,
    ) -> Result<U256> {
        let commitment = request.commitment();
        self.check_commitment(state, commitment)?;

        if request.duration < self.config.min_registration_duration {
            return Err(RegistryError::DurationTooShort {
                duration: request.duration,
                minimum: self.config.min_registration_duration,
            });
        }
        validate_label(&request.label)?;
        if request.owner == Address::ZERO {
            return Err(RegistryError::InvalidReceiver {
                account: request.owner,
            });
        }
        if !self.is_available(state, &request.label) {
            return Err(RegistryError::NameAlreadyRegistered {
                label: request.label.clone(),
            });
        }
        let now = state.now();
        let expiry = now
            .checked_add(request.duration)
            .ok_or(RegistryError::ExpiryOverflow {
                duration: request.duration,
            })?;
        if expiry <= now {
            return Err(RegistryError::CannotSetPastExpiration { expiry, now });
        }
        self.check_granted(state, roles::REGISTRAR)?;

        let quote = self.quote(state, &request.label, request.duration)?;
        let amount = self.token_amount(state, &quote, request.payment_token)?;
        safe_transfer_from(
            state,
            request.payment_token,
            self.address,
            caller,
            self.config.beneficiary,
            amount,
        )?;

        let token_id = self.registry.register(
            state,
            self.address,
            &request.label,
            request.owner,
            request.subregistry,
            request.resolver,
            self.config.owner_roles,
            expiry,
        )?;
        state.commitments.remove(&(self.address, commitment));

        state.emit(Event::NameBought {
            registrar: self.address,
            label: request.label.clone(),
            owner: request.owner,
            token_id,
            payment_token: request.payment_token,
            base: quote.base,
            premium: quote.premium,
            amount,
            referrer: request.referrer,
        });
        tracing::info!(
            label = %request.label,
            token_id = %token_id,
            owner = %request.owner,
            amount = %amount,
            expiry,
            "Registered name"
        );
        Ok(token_id)
    }

    /// Extend `label` by `duration`, paid by `caller`. Returns the new expiry.
    pub fn renew(
        &self,
        state: &mut ChainState,
        caller: Address,
        label: &str,
        duration: u64,
        payment_token: Address,
    ) -> Result<u64> {
        let entry = self.registry.entry(state, label);
        let token_id = self.registry.token_id(state, label);
        if !entry.is_active(state.now()) {
            return Err(RegistryError::NameExpired { token_id });
        }

        let new_expiry = entry
            .expiry
            .checked_add(duration)
            .ok_or(RegistryError::ExpiryOverflow { duration })?;
        if new_expiry <= entry.expiry {
            return Err(RegistryError::CannotReduceExpiration {
                token_id,
                current: entry.expiry,
                requested: new_expiry,
            });
        }
        self.check_granted(state, roles::RENEW)?;

        let quote = self.quote(state, label, duration)?;
        let amount = self.token_amount(state, &quote, payment_token)?;
        safe_transfer_from(
            state,
            payment_token,
            self.address,
            caller,
            self.config.beneficiary,
            amount,
        )?;

        self.registry.renew(state, self.address, token_id, new_expiry)?;

        state.emit(Event::NameRenewed {
            registrar: self.address,
            label: label.to_string(),
            token_id,
            duration,
            new_expiry,
            payment_token,
            amount,
        });
        tracing::info!(label, token_id = %token_id, new_expiry, amount = %amount, "Renewed name");
        Ok(new_expiry)
    }
}
