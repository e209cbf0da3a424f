//! Fast unit tests for the staking pool
//! Run with: cargo test

use stakepool::*;

const TOTAL_SUPPLY: u128 = 1_000_000;

const POOL: Address = [0xAA; 32];
const OWNER: Address = [1u8; 32];
const BOB: Address = [2u8; 32];
const CAROL: Address = [3u8; 32];

/// Fresh pool plus a token whose whole supply belongs to OWNER,
/// already approved for the pool
fn deploy() -> (StakingPool, MemoryToken) {
    let mut token = MemoryToken::new(OWNER, TOTAL_SUPPLY);
    token.approve(&OWNER, &POOL, TOTAL_SUPPLY);
    (StakingPool::new(POOL), token)
}

/// Hand `amount` tokens to `who` and approve the pool for all of it
fn fund(token: &mut MemoryToken, who: &Address, amount: u128) {
    token.transfer(&OWNER, who, amount).unwrap();
    token.approve(who, &POOL, amount);
}

fn assert_custody(pool: &StakingPool, token: &MemoryToken) {
    if let Err(violation) = pool.check_custody(token) {
        panic!("custody invariant violated: {}", violation);
    }
}

/// Token wrapper that can be told to refuse pulls or pushes
struct FlakyToken {
    inner: MemoryToken,
    refuse_pull: bool,
    refuse_push: bool,
}

impl TokenLedger for FlakyToken {
    fn balance_of(&self, owner: &Address) -> u128 {
        self.inner.balance_of(owner)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> std::result::Result<(), TokenError> {
        if self.refuse_push {
            return Err(TokenError::Rejected);
        }
        self.inner.transfer(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> std::result::Result<(), TokenError> {
        if self.refuse_pull {
            return Err(TokenError::Rejected);
        }
        self.inner.transfer_from(spender, from, to, amount)
    }
}

// ============================================================================
// Reference walkthrough
// ============================================================================

#[test]
fn test_reference_walkthrough() {
    let (mut pool, mut token) = deploy();

    // 1. stake
    pool.stake(&mut token, &OWNER, 1000).unwrap();
    assert_eq!(pool.events.last(), Some(&Event::Stake { staker: OWNER, amount: 1000 }));
    assert_eq!(token.balance_of(&POOL), 1000);
    assert_eq!(token.balance_of(&OWNER), TOTAL_SUPPLY - 1000);

    // 2. no double stake
    assert_eq!(pool.stake(&mut token, &OWNER, 1000), Err(StakingError::AlreadyStaked));

    // 3. no zero stake
    assert_eq!(pool.stake(&mut token, &OWNER, 0), Err(StakingError::ZeroAmount));

    // 4. unstake, then stake again
    pool.unstake(&mut token, &OWNER, 1000).unwrap();
    assert!(!pool.is_active(&OWNER));
    pool.stake(&mut token, &OWNER, 1000).unwrap();
    assert_eq!(pool.events.last(), Some(&Event::Stake { staker: OWNER, amount: 1000 }));
    assert_eq!(token.balance_of(&POOL), 1000);
    assert_eq!(token.balance_of(&OWNER), TOTAL_SUPPLY - 1000);

    // 5. distribute, then drain: the reward leaves with the principal
    pool.distribute(&mut token, &OWNER, 200).unwrap();
    assert_eq!(pool.events.last(), Some(&Event::Distribute { amount: 200 }));
    assert_eq!(token.balance_of(&POOL), 1200);
    assert_eq!(token.balance_of(&OWNER), TOTAL_SUPPLY - 1200);
    assert_custody(&pool, &token);

    pool.drain_events();
    pool.unstake(&mut token, &OWNER, 1000).unwrap();
    assert_eq!(
        pool.drain_events(),
        vec![
            Event::Unstake { staker: OWNER, amount: 1000 },
            Event::RewardPaid { staker: OWNER, amount: 200 },
        ]
    );
    assert_eq!(token.balance_of(&POOL), 0);
    assert_eq!(token.balance_of(&OWNER), TOTAL_SUPPLY);
    assert_eq!(pool.distribute(&mut token, &OWNER, 200), Err(StakingError::NoActiveStake));

    // 6. partial unstake on the same pool
    pool.stake(&mut token, &OWNER, 1000).unwrap();
    pool.unstake(&mut token, &OWNER, 500).unwrap();
    assert_eq!(pool.events.last(), Some(&Event::Unstake { staker: OWNER, amount: 500 }));
    assert_eq!(token.balance_of(&POOL), 500);
    assert_eq!(token.balance_of(&OWNER), TOTAL_SUPPLY - 500);
    assert_eq!(pool.unstakeable_amount(&OWNER), 500);
    assert!(pool.is_active(&OWNER));
    assert_eq!(pool.unstake(&mut token, &OWNER, 1000), Err(StakingError::InsufficientBalance));
    assert_custody(&pool, &token);
}

#[test]
fn test_draining_principal_pays_out_reward() {
    let (mut pool, mut token) = deploy();

    pool.stake(&mut token, &OWNER, 1000).unwrap();
    pool.distribute(&mut token, &OWNER, 200).unwrap();
    pool.unstake(&mut token, &OWNER, 1000).unwrap();

    assert_eq!(pool.events.last(), Some(&Event::RewardPaid { staker: OWNER, amount: 200 }));
    assert_eq!(*pool.account(&OWNER).unwrap(), Account { reward_debt: pool.accumulator, ..Account::default() });
    assert_eq!(pool.unstakeable_amount(&OWNER), 0);
    assert_eq!(pool.reward_reserve, 0);
    assert_eq!(token.balance_of(&OWNER), TOTAL_SUPPLY);
    assert_eq!(pool.unstake(&mut token, &OWNER, 200), Err(StakingError::NoActiveStake));

    // re-staking starts from an empty record
    pool.stake(&mut token, &OWNER, 1000).unwrap();
    assert_eq!(pool.unstakeable_amount(&OWNER), 1000);
    assert_custody(&pool, &token);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_zero_amount_rejected_in_every_state() {
    let (mut pool, mut token) = deploy();

    assert_eq!(pool.stake(&mut token, &OWNER, 0), Err(StakingError::ZeroAmount));
    assert_eq!(pool.distribute(&mut token, &OWNER, 0), Err(StakingError::ZeroAmount));
    assert_eq!(pool.unstake(&mut token, &OWNER, 0), Err(StakingError::ZeroAmount));

    pool.stake(&mut token, &OWNER, 10).unwrap();
    assert_eq!(pool.stake(&mut token, &OWNER, 0), Err(StakingError::ZeroAmount));
    assert_eq!(pool.distribute(&mut token, &OWNER, 0), Err(StakingError::ZeroAmount));
    assert_eq!(pool.unstake(&mut token, &OWNER, 0), Err(StakingError::ZeroAmount));
    assert_eq!(pool.events.len(), 1);
}

#[test]
fn test_second_stake_always_rejected() {
    let (mut pool, mut token) = deploy();
    fund(&mut token, &BOB, 100);

    pool.stake(&mut token, &BOB, 10).unwrap();
    for amount in [1u128, 10, 90] {
        assert_eq!(pool.stake(&mut token, &BOB, amount), Err(StakingError::AlreadyStaked));
    }
    pool.unstake(&mut token, &BOB, 5).unwrap();
    assert_eq!(pool.stake(&mut token, &BOB, 5), Err(StakingError::AlreadyStaked));
    assert_eq!(pool.account(&BOB).unwrap().principal, 5);
}

#[test]
fn test_distribute_requires_principal() {
    let (mut pool, mut token) = deploy();
    assert_eq!(pool.distribute(&mut token, &OWNER, 1), Err(StakingError::NoActiveStake));
    assert!(pool.events.is_empty());
    assert_eq!(token.balance_of(&POOL), 0);
}

#[test]
fn test_unstake_without_stake() {
    let (mut pool, mut token) = deploy();
    assert_eq!(pool.unstake(&mut token, &BOB, 1), Err(StakingError::NoActiveStake));
    assert!(pool.account(&BOB).is_none());
}

#[test]
fn test_unstake_more_than_balance() {
    let (mut pool, mut token) = deploy();
    pool.stake(&mut token, &OWNER, 1000).unwrap();
    pool.unstake(&mut token, &OWNER, 500).unwrap();

    assert_eq!(pool.unstake(&mut token, &OWNER, 1000), Err(StakingError::InsufficientBalance));
    assert_eq!(pool.unstakeable_amount(&OWNER), 500);
}

#[test]
fn test_error_reasons() {
    assert_eq!(StakingError::ZeroAmount.reason(), "Amount should be not zero");
    assert_eq!(StakingError::AlreadyStaked.reason(), "Staker already exist");
    assert_eq!(StakingError::NoActiveStake.reason(), "You need at least one stake");
    assert_eq!(StakingError::InsufficientBalance.reason(), "Not enough to unstake");
    assert_eq!(
        StakingError::Token(TokenError::InsufficientAllowance).to_string(),
        "Token transfer failed: insufficient allowance"
    );
}

// ============================================================================
// Distribution
// ============================================================================

#[test]
fn test_pro_rata_two_to_one() {
    let (mut pool, mut token) = deploy();
    fund(&mut token, &BOB, 10_000);
    fund(&mut token, &CAROL, 10_000);

    pool.stake(&mut token, &BOB, 2000).unwrap();
    pool.stake(&mut token, &CAROL, 1000).unwrap();

    pool.distribute(&mut token, &OWNER, 300).unwrap();
    assert_eq!(pool.pending_reward(&BOB), 200);
    assert_eq!(pool.pending_reward(&CAROL), 100);

    // 100 does not split evenly three ways
    pool.distribute(&mut token, &OWNER, 100).unwrap();
    let bob_gain = pool.unstakeable_amount(&BOB) - 2000;
    let carol_gain = pool.unstakeable_amount(&CAROL) - 1000;
    assert_eq!(bob_gain, 200 + 66);
    assert_eq!(carol_gain, 100 + 33);
    assert!(bob_gain + carol_gain <= 400);

    pool.settle_all().unwrap();
    assert_eq!(pool.reward_reserve, 1);
    assert_custody(&pool, &token);
}

#[test]
fn test_late_joiner_gets_no_earlier_reward() {
    let (mut pool, mut token) = deploy();
    fund(&mut token, &BOB, 1000);
    fund(&mut token, &CAROL, 1000);

    pool.stake(&mut token, &BOB, 500).unwrap();
    pool.distribute(&mut token, &OWNER, 100).unwrap();
    pool.stake(&mut token, &CAROL, 500).unwrap();

    assert_eq!(pool.pending_reward(&CAROL), 0);
    assert_eq!(pool.pending_reward(&BOB), 100);

    pool.distribute(&mut token, &OWNER, 100).unwrap();
    assert_eq!(pool.unstakeable_amount(&BOB), 650);
    assert_eq!(pool.unstakeable_amount(&CAROL), 550);
    assert_custody(&pool, &token);
}

#[test]
fn test_partial_unstake_shrinks_future_share() {
    let (mut pool, mut token) = deploy();
    fund(&mut token, &BOB, 1000);
    fund(&mut token, &CAROL, 1000);

    pool.stake(&mut token, &BOB, 1000).unwrap();
    pool.stake(&mut token, &CAROL, 1000).unwrap();
    pool.unstake(&mut token, &BOB, 500).unwrap();
    assert_eq!(pool.total_principal, 1500);

    pool.distribute(&mut token, &OWNER, 300).unwrap();
    assert_eq!(pool.pending_reward(&BOB), 100);
    assert_eq!(pool.pending_reward(&CAROL), 200);
}

#[test]
fn test_unstake_is_bounded_by_principal() {
    let (mut pool, mut token) = deploy();
    pool.stake(&mut token, &OWNER, 1000).unwrap();
    pool.distribute(&mut token, &OWNER, 200).unwrap();

    // reward does not count towards what may be unstaked
    assert_eq!(pool.unstakeable_amount(&OWNER), 1200);
    assert_eq!(pool.unstake(&mut token, &OWNER, 1100), Err(StakingError::InsufficientBalance));

    pool.unstake(&mut token, &OWNER, 600).unwrap();
    let record = *pool.account(&OWNER).unwrap();
    assert_eq!(record.principal, 400);
    assert_eq!(record.settled_balance, 600);
    assert_eq!(pool.total_principal, 400);
    assert_eq!(pool.events.last(), Some(&Event::Unstake { staker: OWNER, amount: 600 }));
    assert_custody(&pool, &token);
}

#[test]
fn test_small_rewards_are_carried_not_lost() {
    let (mut pool, mut token) = deploy();
    fund(&mut token, &BOB, 10_000);
    pool.stake(&mut token, &BOB, 7).unwrap();

    for _ in 0..7 {
        pool.distribute(&mut token, &OWNER, 1).unwrap();
    }
    // 7 tokens over 7 units of principal, one distribution at a time
    assert_eq!(pool.pending_reward(&BOB), 7);
    assert_eq!(pool.reward_carry, 0);

    pool.settle_all().unwrap();
    assert_eq!(pool.reward_reserve, 0);
    assert_eq!(pool.custody_balance, pool.total_settled());
}

#[test]
fn test_accumulator_never_decreases() {
    let (mut pool, mut token) = deploy();
    fund(&mut token, &BOB, 1000);

    let mut last = pool.accumulator;
    pool.stake(&mut token, &BOB, 300).unwrap();
    assert!(pool.accumulator >= last);
    last = pool.accumulator;

    pool.distribute(&mut token, &OWNER, 50).unwrap();
    assert!(pool.accumulator > last);
    last = pool.accumulator;

    pool.unstake(&mut token, &BOB, 300).unwrap();
    assert!(pool.accumulator >= last);
    last = pool.accumulator;

    let _ = pool.distribute(&mut token, &OWNER, 50);
    assert_eq!(pool.accumulator, last);
}

// ============================================================================
// 18-decimal amounts
// ============================================================================

/// One token at 18 decimals
const TOKEN: u128 = 1_000_000_000_000_000_000;

fn deploy_with_supply(supply: u128) -> (StakingPool, MemoryToken) {
    let mut token = MemoryToken::new(OWNER, supply);
    token.approve(&OWNER, &POOL, supply);
    (StakingPool::new(POOL), token)
}

#[test]
fn test_large_stake_collects_reward_and_exits() {
    let whale = 100_000_000 * TOKEN;
    let (mut pool, mut token) = deploy_with_supply(whale + 400 * TOKEN);
    fund(&mut token, &BOB, whale);

    pool.stake(&mut token, &BOB, whale).unwrap();
    for _ in 0..4 {
        pool.distribute(&mut token, &OWNER, 100 * TOKEN).unwrap();
    }
    assert_eq!(pool.pending_reward(&BOB), 400 * TOKEN);
    assert_eq!(pool.unstakeable_amount(&BOB), whale + 400 * TOKEN);

    pool.unstake(&mut token, &BOB, 1).unwrap();
    assert_eq!(token.balance_of(&BOB), 1);
    assert_eq!(pool.unstakeable_amount(&BOB), whale - 1 + 400 * TOKEN);
    assert_custody(&pool, &token);

    pool.unstake(&mut token, &BOB, whale - 1).unwrap();
    assert_eq!(token.balance_of(&BOB), whale + 400 * TOKEN);
    assert_eq!(token.balance_of(&POOL), 0);
    assert_custody(&pool, &token);
}

#[test]
fn test_reward_equal_to_stake_at_token_scale() {
    let (mut pool, mut token) = deploy_with_supply(2_000 * TOKEN);

    pool.stake(&mut token, &OWNER, 1_000 * TOKEN).unwrap();
    // 1000 tokens × 1e18 no longer fits in u128
    pool.distribute(&mut token, &OWNER, 1_000 * TOKEN).unwrap();
    assert_eq!(pool.accumulator, U256::from(ACC_SCALE));
    assert_eq!(pool.unstakeable_amount(&OWNER), 2_000 * TOKEN);

    pool.unstake(&mut token, &OWNER, 1_000 * TOKEN).unwrap();
    assert_eq!(token.balance_of(&OWNER), 2_000 * TOKEN);
    assert_custody(&pool, &token);
}

#[test]
fn test_reward_spread_over_dust_and_whale() {
    let (mut pool, mut token) = deploy_with_supply(u128::MAX / 2);
    fund(&mut token, &BOB, 1);
    fund(&mut token, &CAROL, 10_000_000 * TOKEN);

    pool.stake(&mut token, &BOB, 1).unwrap();
    pool.stake(&mut token, &CAROL, 10_000_000 * TOKEN).unwrap();
    pool.distribute(&mut token, &OWNER, 1_000_000 * TOKEN).unwrap();

    let total = pool.unstakeable_amount(&BOB) + pool.unstakeable_amount(&CAROL);
    assert!(total <= 1 + 11_000_000 * TOKEN);
    // the dust stake rounds to nothing; the whale loses only rounding
    assert_eq!(pool.pending_reward(&BOB), 0);
    assert!(pool.pending_reward(&CAROL) > 999_999 * TOKEN);
    pool.settle_all().unwrap();
    assert_custody(&pool, &token);
}

// ============================================================================
// Custody
// ============================================================================

#[test]
fn test_round_trip_restores_balances() {
    let (mut pool, mut token) = deploy();
    fund(&mut token, &BOB, 5000);
    let owner_before = token.balance_of(&OWNER);

    pool.stake(&mut token, &BOB, 1234).unwrap();
    pool.unstake(&mut token, &BOB, 1234).unwrap();

    assert_eq!(token.balance_of(&BOB), 5000);
    assert_eq!(token.balance_of(&OWNER), owner_before);
    assert_eq!(token.balance_of(&POOL), 0);
    assert!(!pool.is_active(&BOB));
    assert_eq!(pool.account(&BOB).unwrap().settled_balance, 0);
    assert_eq!(pool.total_principal, 0);
    assert_eq!(pool.custody_balance, 0);
}

#[test]
fn test_custody_holds_after_every_call() {
    let (mut pool, mut token) = deploy();
    fund(&mut token, &BOB, 50_000);
    fund(&mut token, &CAROL, 50_000);

    pool.stake(&mut token, &BOB, 1_111).unwrap();
    assert_custody(&pool, &token);
    pool.stake(&mut token, &CAROL, 2_222).unwrap();
    assert_custody(&pool, &token);
    pool.distribute(&mut token, &OWNER, 1_001).unwrap();
    assert_custody(&pool, &token);
    pool.unstake(&mut token, &BOB, 700).unwrap();
    assert_custody(&pool, &token);
    pool.distribute(&mut token, &CAROL, 13).unwrap();
    assert_custody(&pool, &token);
    let carol_principal = pool.account(&CAROL).unwrap().principal;
    pool.unstake(&mut token, &CAROL, carol_principal).unwrap();
    assert_custody(&pool, &token);
    pool.touch(&BOB).unwrap();
    assert_custody(&pool, &token);
}

#[test]
fn test_failed_pull_leaves_no_trace() {
    let (mut pool, mut token) = deploy();
    token.transfer(&OWNER, &BOB, 100).unwrap();
    // BOB never approved the pool

    let pool_before = pool.clone();
    let token_before = token.clone();
    assert_eq!(
        pool.stake(&mut token, &BOB, 50),
        Err(StakingError::Token(TokenError::InsufficientAllowance))
    );
    assert_eq!(pool, pool_before);
    assert_eq!(token, token_before);
}

#[test]
fn test_rejected_push_rolls_back_unstake() {
    let (mut pool, token) = deploy();
    let mut flaky = FlakyToken { inner: token, refuse_pull: false, refuse_push: false };

    pool.stake(&mut flaky, &OWNER, 1000).unwrap();
    pool.distribute(&mut flaky, &OWNER, 100).unwrap();

    let pool_before = pool.clone();
    flaky.refuse_push = true;
    assert_eq!(
        pool.unstake(&mut flaky, &OWNER, 1000),
        Err(StakingError::Token(TokenError::Rejected))
    );
    // not even the settlement survived
    assert_eq!(pool, pool_before);
    assert_eq!(pool.account(&OWNER).unwrap().settled_balance, 1000);

    flaky.refuse_push = false;
    pool.unstake(&mut flaky, &OWNER, 1000).unwrap();
    assert_eq!(flaky.balance_of(&POOL), 0);
    assert_eq!(flaky.balance_of(&OWNER), TOTAL_SUPPLY);
}

#[test]
fn test_rejected_pull_rolls_back_distribute() {
    let (mut pool, token) = deploy();
    let mut flaky = FlakyToken { inner: token, refuse_pull: false, refuse_push: false };
    pool.stake(&mut flaky, &OWNER, 10).unwrap();

    let pool_before = pool.clone();
    flaky.refuse_pull = true;
    assert_eq!(
        pool.distribute(&mut flaky, &OWNER, 3),
        Err(StakingError::Token(TokenError::Rejected))
    );
    assert_eq!(pool, pool_before);
}

#[test]
fn test_drain_events() {
    let (mut pool, mut token) = deploy();
    pool.stake(&mut token, &OWNER, 5).unwrap();
    pool.distribute(&mut token, &OWNER, 5).unwrap();

    let events = pool.drain_events();
    assert_eq!(
        events,
        vec![
            Event::Stake { staker: OWNER, amount: 5 },
            Event::Distribute { amount: 5 },
        ]
    );
    assert!(pool.events.is_empty());
}

#[test]
fn test_staker_count() {
    let (mut pool, mut token) = deploy();
    fund(&mut token, &BOB, 100);
    pool.stake(&mut token, &OWNER, 10).unwrap();
    pool.stake(&mut token, &BOB, 10).unwrap();
    assert_eq!(pool.staker_count(), 2);
    pool.unstake(&mut token, &BOB, 10).unwrap();
    assert_eq!(pool.staker_count(), 1);
    assert_eq!(pool.accounts().count(), 2);
}
