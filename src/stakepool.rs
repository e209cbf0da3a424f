//! Token Staking Pool Ledger
//!
//! Depositors lock a fungible token in the pool, the pool receives reward
//! deposits that are shared pro rata between current depositors, and
//! depositors withdraw part or all of their claim.
//!
//! The engine guarantees:
//! 1. Reward distribution is O(1) in the number of depositors (lazy
//!    settlement against a scaled cumulative index)
//! 2. Custody conservation: tokens held == settled balances + unallocated reward
//! 3. At most one active stake per depositor
//! 4. Failed calls leave no trace: ledger effects are rolled back when a
//!    later effect or the token transfer fails
//!
//! All state lives in an explicit [`StakingPool`] value. Token movement goes
//! through a caller-supplied [`TokenLedger`].

#![no_std]
#![forbid(unsafe_code)]

#[cfg(kani)]
extern crate kani;

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

pub mod math;
pub mod token;

mod custody;
mod distributor;
mod ledger;

pub use custody::CustodyViolation;
pub use math::ACC_SCALE;
pub use primitive_types::U256;
pub use token::{MemoryToken, TokenError, TokenLedger};

// ============================================================================
// Core Data Structures
// ============================================================================

/// Depositor / pool identity (32 bytes, like a public key)
pub type Address = [u8; 32];

/// Base58 form of an address for log lines
pub(crate) struct DisplayAddress<'a>(pub &'a Address);

impl fmt::Display for DisplayAddress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

/// Per-depositor ledger record
///
/// Records are never removed: a drained account stays in the table with
/// zero balances and is reactivated by a later stake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Account {
    /// Amount currently staked, excluding reward
    pub principal: u128,

    /// Accumulator value at the last settlement (scaled by `ACC_SCALE`)
    pub reward_debt: U256,

    /// Principal plus reward credited at the last settlement
    pub settled_balance: u128,
}

impl Account {
    /// An account is active iff it has principal at stake
    pub fn is_active(&self) -> bool {
        self.principal > 0
    }
}

/// Event emitted by a successful pool call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Stake { staker: Address, amount: u128 },
    Unstake { staker: Address, amount: u128 },
    /// Settled reward paid out when an unstake drains the principal
    RewardPaid { staker: Address, amount: u128 },
    Distribute { amount: u128 },
}

/// Pool state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakingPool {
    /// The pool's own identity at the token (custody address)
    pub address: Address,

    /// All accounts ever created, keyed by depositor
    pub accounts: BTreeMap<Address, Account>,

    /// Sum of principal over active accounts
    pub total_principal: u128,

    /// Cumulative reward per unit of principal (scaled by `ACC_SCALE`)
    /// Never decreases
    pub accumulator: U256,

    /// Scaled remainder of the last accumulator division
    pub reward_carry: u128,

    /// Distributed reward not yet credited to any settled balance
    pub reward_reserve: u128,

    /// Tokens the pool holds at the token ledger
    pub custody_balance: u128,

    /// Emitted events, oldest first
    pub events: Vec<Event>,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakingError {
    /// Amount must be non-zero
    ZeroAmount,

    /// Caller already has an active stake
    AlreadyStaked,

    /// Caller has no active stake, or the pool has no principal at all
    NoActiveStake,

    /// Requested more than the staked principal
    InsufficientBalance,

    /// Arithmetic overflow
    Overflow,

    /// Token collaborator refused the transfer
    Token(TokenError),
}

impl StakingError {
    /// Revert reason as reported to the depositor
    pub fn reason(&self) -> &'static str {
        match self {
            StakingError::ZeroAmount => "Amount should be not zero",
            StakingError::AlreadyStaked => "Staker already exist",
            StakingError::NoActiveStake => "You need at least one stake",
            StakingError::InsufficientBalance => "Not enough to unstake",
            StakingError::Overflow => "Arithmetic overflow",
            StakingError::Token(_) => "Token transfer failed",
        }
    }
}

impl fmt::Display for StakingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakingError::Token(inner) => write!(f, "{}: {}", self.reason(), inner),
            _ => f.write_str(self.reason()),
        }
    }
}

impl core::error::Error for StakingError {}

impl From<TokenError> for StakingError {
    fn from(err: TokenError) -> Self {
        StakingError::Token(err)
    }
}

pub type Result<T> = core::result::Result<T, StakingError>;

// ============================================================================
// Construction and Queries
// ============================================================================

impl StakingPool {
    /// Create an empty pool taking custody at `address`
    pub fn new(address: Address) -> Self {
        Self {
            address,
            accounts: BTreeMap::new(),
            total_principal: 0,
            accumulator: U256::zero(),
            reward_carry: 0,
            reward_reserve: 0,
            custody_balance: 0,
            events: Vec::new(),
        }
    }

    /// Ledger record for `staker`, if one was ever created
    pub fn account(&self, staker: &Address) -> Option<&Account> {
        self.accounts.get(staker)
    }

    /// Iterate all account records in address order
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    /// Whether `staker` currently has an active stake
    pub fn is_active(&self, staker: &Address) -> bool {
        self.account(staker).map(Account::is_active).unwrap_or(false)
    }

    /// Number of accounts with an active stake
    pub fn staker_count(&self) -> usize {
        self.accounts.values().filter(|a| a.is_active()).count()
    }

    /// Sum of settled balances over all accounts
    pub fn total_settled(&self) -> u128 {
        self.accounts
            .values()
            .fold(0u128, |acc, a| acc.saturating_add(a.settled_balance))
    }

    /// Remove and return all events emitted so far
    pub fn drain_events(&mut self) -> Vec<Event> {
        core::mem::take(&mut self.events)
    }
}
