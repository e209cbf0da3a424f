//! Accounting ledger: stake, unstake and lazy reward settlement
//!
//! An account's reward share is never pushed to it when a distribution
//! happens. Instead the account remembers the accumulator value it was last
//! settled at (`reward_debt`) and collects `principal × Δaccumulator` the
//! next time it is touched. Every operation that reads or changes an
//! account's principal or settled balance settles it first.

use log::{debug, info};

use crate::{math, Account, Address, DisplayAddress, Event, Result, StakingError, StakingPool, TokenLedger};

impl StakingPool {
    /// Settle pending reward into a detached account record
    ///
    /// Moves the pending share out of `reward_reserve` into the record's
    /// settled balance and advances its `reward_debt` to the current
    /// accumulator. No-op for zero principal apart from the debt reset.
    ///
    /// # Returns
    /// * `Ok(pending)` - Amount credited
    /// * `Err(Overflow)` - Would credit more than the reserve holds
    fn settle_record(&mut self, account: &mut Account) -> Result<u128> {
        let pending = math::accrued_share(account.principal, self.accumulator, account.reward_debt)?;

        if pending > 0 {
            let settled = math::add(account.settled_balance, pending)?;
            let reserve = math::sub(self.reward_reserve, pending)?;
            account.settled_balance = settled;
            self.reward_reserve = reserve;
        }

        account.reward_debt = self.accumulator;
        Ok(pending)
    }

    /// Settle a depositor's pending reward (lazy update)
    ///
    /// Has no observable effect on `unstakeable_amount`; it only moves the
    /// share from the reserve into the account's settled balance.
    ///
    /// # Returns
    /// * `Ok(pending)` - Amount credited (0 for unknown or idle accounts)
    pub fn touch(&mut self, staker: &Address) -> Result<u128> {
        let Some(mut account) = self.accounts.get(staker).copied() else {
            return Ok(0);
        };

        self.atomic(Some(staker), |pool| {
            let pending = pool.settle_record(&mut account)?;
            pool.accounts.insert(*staker, account);
            Ok(pending)
        })
        .inspect(|pending| {
            if *pending > 0 {
                debug!("settle: staker={} credited={}", DisplayAddress(staker), pending);
            }
        })
    }

    /// Settle every account
    ///
    /// O(n) in the number of accounts. Not used by any pool operation; it
    /// exists for audits, where the custody invariant is easiest to read
    /// with nothing pending.
    pub fn settle_all(&mut self) -> Result<()> {
        let stakers: alloc::vec::Vec<Address> = self
            .accounts
            .iter()
            .filter(|(_, a)| a.principal > 0)
            .map(|(k, _)| *k)
            .collect();

        for staker in stakers.iter() {
            self.touch(staker)?;
        }
        Ok(())
    }

    /// Reward accrued by `staker` since its last settlement
    ///
    /// The product is taken in 256 bits. The result cannot exceed
    /// `reward_reserve` while the custody invariant holds; a corrupted
    /// record that would overflow `u128` reads as `u128::MAX` here and makes
    /// the next settlement fail with `Overflow`.
    pub fn pending_reward(&self, staker: &Address) -> u128 {
        self.accounts
            .get(staker)
            .map(|a| {
                math::accrued_share(a.principal, self.accumulator, a.reward_debt).unwrap_or(u128::MAX)
            })
            .unwrap_or(0)
    }

    /// Amount `staker` would receive by unstaking all principal right now
    ///
    /// Settled balance plus pending reward, i.e. what the settled balance
    /// would be after a settlement. Never mutates the pool.
    pub fn unstakeable_amount(&self, staker: &Address) -> u128 {
        self.accounts
            .get(staker)
            .map(|a| a.settled_balance.saturating_add(self.pending_reward(staker)))
            .unwrap_or(0)
    }

    /// Open a stake
    ///
    /// # Arguments
    /// * `token` - Token collaborator; `caller` must have approved the pool
    /// * `caller` - Depositor
    /// * `amount` - Tokens to lock (must be > 0)
    ///
    /// # Errors
    /// * `ZeroAmount` - `amount == 0`
    /// * `AlreadyStaked` - `caller` already has an active stake
    /// * `Token(_)` - The pull failed; nothing changed
    ///
    /// # Invariants
    /// * Emits `Event::Stake { staker: caller, amount }`
    /// * `total_principal` and `custody_balance` grow by exactly `amount`
    pub fn stake<T: TokenLedger>(
        &mut self,
        token: &mut T,
        caller: &Address,
        amount: u128,
    ) -> Result<()> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        if self.is_active(caller) {
            return Err(StakingError::AlreadyStaked);
        }

        // A drained account restarts from an empty record
        let mut account = self.accounts.get(caller).copied().unwrap_or_default();

        self.atomic(Some(caller), |pool| {
            pool.settle_record(&mut account)?;

            account.principal = math::add(account.principal, amount)?;
            account.settled_balance = math::add(account.settled_balance, amount)?;
            account.reward_debt = pool.accumulator;

            pool.total_principal = math::add(pool.total_principal, amount)?;
            pool.custody_balance = math::add(pool.custody_balance, amount)?;
            pool.accounts.insert(*caller, account);
            pool.events.push(Event::Stake { staker: *caller, amount });

            pool.pull(token, caller, amount)
        })?;

        info!("stake: staker={} amount={}", DisplayAddress(caller), amount);
        Ok(())
    }

    /// Withdraw principal
    ///
    /// `amount` is principal. A partial unstake leaves settled reward in the
    /// account. The unstake that drains principal to zero also pays out all
    /// settled reward and deactivates the account, leaving it with nothing.
    ///
    /// # Arguments
    /// * `token` - Token collaborator
    /// * `caller` - Depositor
    /// * `amount` - Principal to withdraw (must be > 0)
    ///
    /// # Errors
    /// * `ZeroAmount` - `amount == 0`
    /// * `NoActiveStake` - `caller` has no active stake
    /// * `InsufficientBalance` - `amount` exceeds the staked principal
    /// * `Token(_)` - The push failed; nothing changed
    ///
    /// # Invariants
    /// * Emits `Event::Unstake { staker: caller, amount }`, followed by
    ///   `Event::RewardPaid` when reward leaves with the last principal
    /// * `total_principal` shrinks by exactly `amount`
    /// * `custody_balance` shrinks by exactly the tokens pushed
    pub fn unstake<T: TokenLedger>(
        &mut self,
        token: &mut T,
        caller: &Address,
        amount: u128,
    ) -> Result<()> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        let mut account = self
            .accounts
            .get(caller)
            .copied()
            .filter(Account::is_active)
            .ok_or(StakingError::NoActiveStake)?;
        if amount > account.principal {
            return Err(StakingError::InsufficientBalance);
        }

        let payout = self.atomic(Some(caller), |pool| {
            pool.settle_record(&mut account)?;

            account.principal = math::sub(account.principal, amount)?;
            let payout = if account.is_active() {
                amount
            } else {
                account.settled_balance
            };
            account.settled_balance = math::sub(account.settled_balance, payout)?;

            pool.total_principal = math::sub(pool.total_principal, amount)?;
            pool.custody_balance = math::sub(pool.custody_balance, payout)?;
            pool.accounts.insert(*caller, account);
            pool.events.push(Event::Unstake { staker: *caller, amount });
            if payout > amount {
                pool.events.push(Event::RewardPaid { staker: *caller, amount: payout - amount });
            }

            pool.push(token, caller, payout)?;
            Ok(payout)
        })?;

        info!(
            "unstake: staker={} amount={} paid={} active={}",
            DisplayAddress(caller),
            amount,
            payout,
            account.is_active()
        );
        Ok(())
    }
}
