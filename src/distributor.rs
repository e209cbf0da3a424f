//! Reward distribution in O(1)
//!
//! A reward deposit raises the global accumulator by
//! `amount × ACC_SCALE / total_principal` and nothing else; accounts pick up
//! their share lazily on their next settlement. The division remainder is
//! carried into the next deposit rather than dropped.

use log::info;

use crate::{math, Address, DisplayAddress, Event, Result, StakingError, StakingPool, TokenLedger};

impl StakingPool {
    /// Distribute a reward deposit over all active stakes
    ///
    /// Permissionless: any holder that approved the pool may fund rewards.
    ///
    /// # Arguments
    /// * `token` - Token collaborator; `caller` must have approved the pool
    /// * `caller` - Party funding the reward
    /// * `amount` - Reward tokens (must be > 0)
    ///
    /// # Errors
    /// * `ZeroAmount` - `amount == 0`
    /// * `NoActiveStake` - `total_principal == 0`
    /// * `Token(_)` - The pull failed; nothing changed
    ///
    /// # Invariants
    /// * Emits `Event::Distribute { amount }`
    /// * `accumulator` never decreases
    /// * Touches no account record
    pub fn distribute<T: TokenLedger>(
        &mut self,
        token: &mut T,
        caller: &Address,
        amount: u128,
    ) -> Result<()> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        if self.total_principal == 0 {
            return Err(StakingError::NoActiveStake);
        }

        self.atomic(None, |pool| {
            let (delta, carry) = math::index_delta(amount, pool.reward_carry, pool.total_principal)?;

            pool.accumulator = math::add_wide(pool.accumulator, delta)?;
            pool.reward_carry = carry;
            pool.reward_reserve = math::add(pool.reward_reserve, amount)?;
            pool.custody_balance = math::add(pool.custody_balance, amount)?;
            pool.events.push(Event::Distribute { amount });

            pool.pull(token, caller, amount)
        })?;

        info!(
            "distribute: from={} amount={} accumulator={}",
            DisplayAddress(caller),
            amount,
            self.accumulator
        );
        Ok(())
    }
}
