//! Fixed-point helpers for the reward accumulator
//!
//! Token amounts are `u128`; the accumulator and every product that feeds
//! it are `U256`, so `amount × ACC_SCALE` and `principal × Δaccumulator`
//! cannot overflow for any pair of `u128` inputs. Results are narrowed back
//! to `u128` with a check.
//!
//! Every helper is checked: overflow surfaces as `StakingError::Overflow`
//! instead of wrapping or saturating, so a bad input can never silently
//! mint or burn reward.

use primitive_types::U256;

use crate::{Result, StakingError};

/// Accumulator precision (18 decimals)
pub const ACC_SCALE: u128 = 1_000_000_000_000_000_000;

#[inline]
pub fn add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(StakingError::Overflow)
}

#[inline]
pub fn sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(StakingError::Overflow)
}

#[inline]
pub fn add_wide(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or(StakingError::Overflow)
}

/// Narrow a wide intermediate back to a token amount
#[inline]
pub fn narrow(value: U256) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(StakingError::Overflow);
    }
    Ok(value.low_u128())
}

/// floor(a × b / denominator) with a 256-bit product
///
/// Division by zero is reported as `Overflow`, matching the rest of the
/// engine.
pub fn mul_div_floor(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(StakingError::Overflow);
    }
    let product = a.checked_mul(b).ok_or(StakingError::Overflow)?;
    Ok(product / denominator)
}

/// Share of `principal` over an accumulator delta, rounded down
///
/// share = principal × (index_now − index_then) / ACC_SCALE
///
/// # Arguments
/// * `principal` - Staked amount the share is computed for
/// * `index_now` - Current accumulator value
/// * `index_then` - Accumulator value at the last settlement
///
/// # Returns
/// * `Ok(share)` in token units
/// * `Err(Overflow)` if `index_then > index_now` or the share exceeds `u128`
pub fn accrued_share(principal: u128, index_now: U256, index_then: U256) -> Result<u128> {
    let delta = index_now.checked_sub(index_then).ok_or(StakingError::Overflow)?;
    if delta.is_zero() || principal == 0 {
        return Ok(0);
    }
    narrow(mul_div_floor(U256::from(principal), delta, U256::from(ACC_SCALE))?)
}

/// Accumulator increment for a reward deposit
///
/// Folds the previous division remainder (`carry`) back in so that
/// `amount × ACC_SCALE` is fully accounted for across distributions.
///
/// # Returns
/// `(index_delta, new_carry)` with `new_carry < total_principal`
pub fn index_delta(amount: u128, carry: u128, total_principal: u128) -> Result<(U256, u128)> {
    if total_principal == 0 {
        return Err(StakingError::Overflow);
    }
    let scaled = U256::from(amount)
        .checked_mul(U256::from(ACC_SCALE))
        .ok_or(StakingError::Overflow)?;
    let scaled = add_wide(scaled, U256::from(carry))?;
    let (delta, carry) = scaled.div_mod(U256::from(total_principal));
    Ok((delta, narrow(carry)?))
}
