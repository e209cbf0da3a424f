//! Custody guard
//!
//! All token movement goes through here. Pool operations follow
//! checks-effects-interactions: validate, bring the ledger to its final
//! state, then call the token last. Because effects land before the
//! transfer, a failing transfer (or failing effect) must be undone; every
//! operation therefore runs inside [`StakingPool::atomic`], which restores a
//! checkpoint of everything the call can touch.
//!
//! Re-entry is ruled out by the signatures: the pool is borrowed mutably for
//! the whole call and the token only ever sees its own `&mut self`.

use core::fmt;

use log::warn;

use crate::{Account, Address, Result, StakingError, StakingPool, TokenLedger, U256};

/// Everything a single pool call may modify
#[derive(Clone, Debug, PartialEq, Eq)]
struct Checkpoint {
    /// Touched account and its record before the call (`None` = absent)
    account: Option<(Address, Option<Account>)>,
    total_principal: u128,
    accumulator: U256,
    reward_carry: u128,
    reward_reserve: u128,
    custody_balance: u128,
    events_len: usize,
}

impl Checkpoint {
    fn capture(pool: &StakingPool, staker: Option<&Address>) -> Self {
        Self {
            account: staker.map(|s| (*s, pool.accounts.get(s).copied())),
            total_principal: pool.total_principal,
            accumulator: pool.accumulator,
            reward_carry: pool.reward_carry,
            reward_reserve: pool.reward_reserve,
            custody_balance: pool.custody_balance,
            events_len: pool.events.len(),
        }
    }

    fn restore(self, pool: &mut StakingPool) {
        match self.account {
            Some((staker, Some(record))) => {
                pool.accounts.insert(staker, record);
            }
            Some((staker, None)) => {
                pool.accounts.remove(&staker);
            }
            None => {}
        }
        pool.total_principal = self.total_principal;
        pool.accumulator = self.accumulator;
        pool.reward_carry = self.reward_carry;
        pool.reward_reserve = self.reward_reserve;
        pool.custody_balance = self.custody_balance;
        pool.events.truncate(self.events_len);
    }
}

/// Custody invariant that failed an audit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustodyViolation {
    /// custody_balance != Σ settled_balance + reward_reserve
    LedgerMismatch {
        custody_balance: u128,
        total_settled: u128,
        reward_reserve: u128,
    },

    /// Token reports a different pool balance than the ledger
    TokenMismatch {
        custody_balance: u128,
        token_balance: u128,
    },

    /// Pending reward exceeds what is left in the reserve
    ReserveShortfall {
        reward_reserve: u128,
        total_pending: u128,
    },

    /// total_principal != Σ principal
    PrincipalMismatch {
        total_principal: u128,
        sum_principal: u128,
    },
}

impl fmt::Display for CustodyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustodyViolation::LedgerMismatch { custody_balance, total_settled, reward_reserve } => write!(
                f,
                "custody {} != settled {} + reserve {}",
                custody_balance, total_settled, reward_reserve
            ),
            CustodyViolation::TokenMismatch { custody_balance, token_balance } => write!(
                f,
                "ledger custody {} != token balance {}",
                custody_balance, token_balance
            ),
            CustodyViolation::ReserveShortfall { reward_reserve, total_pending } => write!(
                f,
                "pending reward {} exceeds reserve {}",
                total_pending, reward_reserve
            ),
            CustodyViolation::PrincipalMismatch { total_principal, sum_principal } => write!(
                f,
                "total principal {} != sum of principals {}",
                total_principal, sum_principal
            ),
        }
    }
}

impl core::error::Error for CustodyViolation {}

impl StakingPool {
    /// Run `op` as one all-or-nothing pool call
    ///
    /// `staker` names the only account `op` may modify. On `Err` the pool is
    /// restored to exactly its state before the call.
    pub(crate) fn atomic<R>(
        &mut self,
        staker: Option<&Address>,
        op: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let checkpoint = Checkpoint::capture(self, staker);
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!("rolled back pool call: {}", err);
                checkpoint.restore(self);
                Err(err)
            }
        }
    }

    /// Pull `amount` from `from` into pool custody (needs prior approval)
    pub(crate) fn pull<T: TokenLedger>(&self, token: &mut T, from: &Address, amount: u128) -> Result<()> {
        token
            .transfer_from(&self.address, from, &self.address, amount)
            .map_err(StakingError::from)
    }

    /// Push `amount` out of pool custody to `to`
    pub(crate) fn push<T: TokenLedger>(&self, token: &mut T, to: &Address, amount: u128) -> Result<()> {
        token
            .transfer(&self.address, to, amount)
            .map_err(StakingError::from)
    }

    /// Audit the custody invariants against the live token
    ///
    /// O(n) in the number of accounts. Checks, in order:
    /// 1. total_principal == Σ principal
    /// 2. custody_balance == Σ settled_balance + reward_reserve
    /// 3. Σ pending_reward <= reward_reserve
    /// 4. token.balance_of(pool) == custody_balance
    ///
    /// # Returns
    /// * `Ok(())` if every invariant holds
    /// * `Err(violation)` for the first one that does not
    pub fn check_custody<T: TokenLedger>(&self, token: &T) -> core::result::Result<(), CustodyViolation> {
        let mut sum_principal = 0u128;
        let mut total_pending = 0u128;
        for (staker, account) in self.accounts.iter() {
            sum_principal = sum_principal.saturating_add(account.principal);
            total_pending = total_pending.saturating_add(self.pending_reward(staker));
        }

        if sum_principal != self.total_principal {
            return Err(CustodyViolation::PrincipalMismatch {
                total_principal: self.total_principal,
                sum_principal,
            });
        }

        let total_settled = self.total_settled();
        if self.custody_balance != total_settled.saturating_add(self.reward_reserve) {
            return Err(CustodyViolation::LedgerMismatch {
                custody_balance: self.custody_balance,
                total_settled,
                reward_reserve: self.reward_reserve,
            });
        }

        if total_pending > self.reward_reserve {
            return Err(CustodyViolation::ReserveShortfall {
                reward_reserve: self.reward_reserve,
                total_pending,
            });
        }

        let token_balance = token.balance_of(&self.address);
        if token_balance != self.custody_balance {
            return Err(CustodyViolation::TokenMismatch {
                custody_balance: self.custody_balance,
                token_balance,
            });
        }

        Ok(())
    }
}
