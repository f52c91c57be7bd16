//! Fungible payment tokens
//!
//! `Erc20Ledger` keeps balances and allowances for one token and can be told
//! to mimic the return conventions found in deployed tokens. Payment code goes
//! through `safe_transfer_from`, which accepts both a `true` return and an
//! empty return as success and rejects an explicit `false`.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::state::ChainState;

/// How `transfer_from` reports its outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnBehavior {
    /// Returns `true`, reverts on insufficient funds
    #[default]
    Standard,
    /// Returns nothing, reverts on insufficient funds
    NoReturnData,
    /// Returns `false` instead of moving funds
    ReturnsFalse,
    /// Always reverts
    Reverts,
}

/// Raw result of a `transfer_from` call that did not revert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallReturn {
    Bool(bool),
    Empty,
}

#[derive(Debug, Clone)]
pub struct Erc20Ledger {
    symbol: String,
    decimals: u8,
    behavior: ReturnBehavior,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl Erc20Ledger {
    pub fn new(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            behavior: ReturnBehavior::Standard,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    pub fn with_behavior(mut self, behavior: ReturnBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn mint(&mut self, to: Address, amount: U256) {
        let balance = self.balances.entry(to).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((owner, spender), amount);
    }

    /// Move `amount` from `from` to `to` on behalf of `spender`.
    ///
    /// `Err` is a revert; `Ok` carries whatever the token returned.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> std::result::Result<CallReturn, String> {
        match self.behavior {
            ReturnBehavior::Reverts => return Err("transfers disabled".to_string()),
            ReturnBehavior::ReturnsFalse => return Ok(CallReturn::Bool(false)),
            ReturnBehavior::Standard | ReturnBehavior::NoReturnData => {}
        }

        let allowance = self.allowance(from, spender);
        if spender != from && allowance < amount {
            return Err(format!("insufficient allowance: {} < {}", allowance, amount));
        }
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(format!("insufficient balance: {} < {}", balance, amount));
        }

        if spender != from {
            self.allowances.insert((from, spender), allowance - amount);
        }
        self.balances.insert(from, balance - amount);
        let credited = self.balance_of(to).saturating_add(amount);
        self.balances.insert(to, credited);

        Ok(match self.behavior {
            ReturnBehavior::NoReturnData => CallReturn::Empty,
            _ => CallReturn::Bool(true),
        })
    }
}

/// Collect `amount` of `token` from `from`, treating an empty return as
/// success and an explicit `false` as failure.
pub fn safe_transfer_from(
    state: &mut ChainState,
    token: Address,
    spender: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<()> {
    let ledger = state
        .token_mut(token)
        .ok_or(RegistryError::UnsupportedPaymentToken { token })?;

    match ledger.transfer_from(spender, from, to, amount) {
        Ok(CallReturn::Bool(true)) | Ok(CallReturn::Empty) => {
            tracing::debug!(token = %token, from = %from, to = %to, amount = %amount, "Payment collected");
            Ok(())
        }
        Ok(CallReturn::Bool(false)) => Err(RegistryError::TransferFailed {
            token,
            from,
            to,
            amount,
        }),
        Err(reason) => Err(RegistryError::TokenReverted { token, reason }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use namechain_core::Side;

    fn payer() -> Address {
        Address::repeat_byte(0x01)
    }

    fn spender() -> Address {
        Address::repeat_byte(0x02)
    }

    fn payee() -> Address {
        Address::repeat_byte(0x03)
    }

    fn funded(behavior: ReturnBehavior) -> Erc20Ledger {
        let mut ledger = Erc20Ledger::new("USDC", 6).with_behavior(behavior);
        ledger.mint(payer(), U256::from(1000u64));
        ledger.approve(payer(), spender(), U256::from(600u64));
        ledger
    }

    #[test]
    fn test_standard_transfer() {
        let mut ledger = funded(ReturnBehavior::Standard);
        let result = ledger.transfer_from(spender(), payer(), payee(), U256::from(500u64));
        assert_eq!(result, Ok(CallReturn::Bool(true)));
        assert_eq!(ledger.balance_of(payer()), U256::from(500u64));
        assert_eq!(ledger.balance_of(payee()), U256::from(500u64));
        assert_eq!(ledger.allowance(payer(), spender()), U256::from(100u64));
    }

    #[test]
    fn test_insufficient_allowance_reverts() {
        let mut ledger = funded(ReturnBehavior::Standard);
        let result = ledger.transfer_from(spender(), payer(), payee(), U256::from(700u64));
        assert!(result.is_err());
        assert_eq!(ledger.balance_of(payer()), U256::from(1000u64));
    }

    #[test]
    fn test_safe_transfer_conventions() {
        let token = Address::repeat_byte(0x70);
        let amount = U256::from(10u8);

        for (behavior, expect_ok) in [
            (ReturnBehavior::Standard, true),
            (ReturnBehavior::NoReturnData, true),
            (ReturnBehavior::ReturnsFalse, false),
            (ReturnBehavior::Reverts, false),
        ] {
            let mut state = ChainState::new(Side::L2, 1);
            state.deploy_token(token, funded(behavior));

            let result = safe_transfer_from(&mut state, token, spender(), payer(), payee(), amount);
            assert_eq!(result.is_ok(), expect_ok, "behavior {:?}", behavior);

            let credited = state.token(token).unwrap().balance_of(payee());
            assert_eq!(credited == amount, expect_ok, "behavior {:?}", behavior);
        }
    }

    #[test]
    fn test_explicit_false_error() {
        let token = Address::repeat_byte(0x70);
        let mut state = ChainState::new(Side::L2, 1);
        state.deploy_token(token, funded(ReturnBehavior::ReturnsFalse));

        let err = safe_transfer_from(&mut state, token, spender(), payer(), payee(), U256::from(1u8))
            .unwrap_err();
        assert_eq!(err.code(), "TRANSFER_FAILED");
    }

    #[test]
    fn test_unknown_token() {
        let mut state = ChainState::new(Side::L2, 1);
        let err = safe_transfer_from(
            &mut state,
            Address::repeat_byte(0x99),
            spender(),
            payer(),
            payee(),
            U256::from(1u8),
        )
        .unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_PAYMENT_TOKEN");
    }
}
