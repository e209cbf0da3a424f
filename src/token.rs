//! Token custody boundary
//!
//! The pool never holds balances itself: every movement goes through a
//! [`TokenLedger`]. Production deployments plug in whatever fungible token
//! backs the pool; [`MemoryToken`] is a complete in-memory implementation
//! with approve/transfer-from semantics, used by tests and the CLI.

use alloc::collections::BTreeMap;
use core::fmt;

use crate::Address;

/// Failure reported by the token collaborator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenError {
    /// Sender does not hold enough tokens
    InsufficientBalance,

    /// Spender was not approved for enough tokens
    InsufficientAllowance,

    /// Balance arithmetic overflowed
    Overflow,

    /// Token refused the transfer for its own reasons
    Rejected,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::InsufficientBalance => write!(f, "transfer amount exceeds balance"),
            TokenError::InsufficientAllowance => write!(f, "insufficient allowance"),
            TokenError::Overflow => write!(f, "token balance overflow"),
            TokenError::Rejected => write!(f, "transfer rejected by token"),
        }
    }
}

impl core::error::Error for TokenError {}

/// Trait for the fungible token the pool takes custody through
///
/// Implementations must be atomic: a call either moves exactly `amount`
/// or returns an error and moves nothing.
pub trait TokenLedger {
    /// Balance held by `owner`
    fn balance_of(&self, owner: &Address) -> u128;

    /// Push `amount` from `from` to `to`
    ///
    /// `from` is the party whose custody is being spent (the pool, when the
    /// pool pays out).
    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError>;

    /// Pull `amount` from `from` to `to` on behalf of `spender`
    ///
    /// Requires `from` to have approved `spender` for at least `amount`.
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError>;
}

/// In-memory fungible token
///
/// Fixed supply minted to the deployer at construction. Allowances are
/// consumed by `transfer_from`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryToken {
    /// Total tokens in existence
    pub total_supply: u128,

    /// Balance per holder (holders with zero balance may be absent)
    pub balances: BTreeMap<Address, u128>,

    /// Remaining allowance per (owner, spender)
    pub allowances: BTreeMap<(Address, Address), u128>,
}

impl MemoryToken {
    /// Deploy a token and mint `total_supply` to `deployer`
    pub fn new(deployer: Address, total_supply: u128) -> Self {
        let mut balances = BTreeMap::new();
        if total_supply > 0 {
            balances.insert(deployer, total_supply);
        }
        Self {
            total_supply,
            balances,
            allowances: BTreeMap::new(),
        }
    }

    /// Set the allowance `spender` may pull from `owner`
    ///
    /// Overwrites any previous allowance, as ERC-20 `approve` does.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) {
        if amount == 0 {
            self.allowances.remove(&(*owner, *spender));
        } else {
            self.allowances.insert((*owner, *spender), amount);
        }
    }

    /// Remaining allowance of `spender` over `owner`'s tokens
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all balances (equals `total_supply` unless the maps were edited by hand)
    pub fn circulating(&self) -> u128 {
        self.balances.values().fold(0u128, |acc, b| acc.saturating_add(*b))
    }

    fn move_balance(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance);
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;

        let remaining = from_balance - amount;
        if remaining == 0 {
            self.balances.remove(from);
        } else {
            self.balances.insert(*from, remaining);
        }
        self.balances.insert(*to, to_balance);
        Ok(())
    }
}

impl TokenLedger for MemoryToken {
    fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        self.move_balance(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance);
        }
        self.move_balance(from, to, amount)?;
        self.approve(from, spender, allowed - amount);
        Ok(())
    }
}
