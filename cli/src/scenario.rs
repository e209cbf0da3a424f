//! Reference walkthrough
//!
//! Replays the single-depositor walkthrough against a throwaway in-memory
//! pool and reports each expectation as a pass/fail line. Nothing is read
//! from or written to the state file.

use anyhow::Result;
use colored::Colorize;
use log::info;

use stakepool::{Address, Event, MemoryToken, StakingError, StakingPool, TokenLedger};

use crate::identity::{name_address, pool_address};

pub struct Check {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

struct Walkthrough {
    pool: StakingPool,
    token: MemoryToken,
    depositor: Address,
    checks: Vec<Check>,
}

impl Walkthrough {
    fn new(supply: u128) -> Result<Self> {
        let depositor = name_address("depositor")?;
        let mut token = MemoryToken::new(depositor, supply);
        token.approve(&depositor, &pool_address(), supply);
        Ok(Self {
            pool: StakingPool::new(pool_address()),
            token,
            depositor,
            checks: Vec::new(),
        })
    }

    fn check(&mut self, name: &str, passed: bool, detail: String) {
        self.checks.push(Check { name: name.to_string(), passed, detail });
    }

    /// Expect success and exactly `events` emitted by the call
    fn expect_ok(&mut self, name: &str, result: stakepool::Result<()>, events: &[Event]) {
        let emitted = self.pool.drain_events();
        let passed = result.is_ok() && emitted == events;
        let detail = match result {
            Ok(()) => format!("{} event(s)", emitted.len()),
            Err(e) => format!("unexpected revert: {}", e),
        };
        self.check(name, passed, detail);
    }

    fn expect_err(&mut self, name: &str, result: stakepool::Result<()>, expected: StakingError) {
        let detail = match &result {
            Ok(()) => "call succeeded".to_string(),
            Err(e) => format!("reverted: {}", e),
        };
        self.check(name, result == Err(expected), detail);
    }

    fn expect_balances(&mut self, name: &str, pool: u128, depositor: u128) {
        let got_pool = self.token.balance_of(&self.pool.address);
        let got_depositor = self.token.balance_of(&self.depositor);
        let detail = format!("pool {} depositor {}", got_pool, got_depositor);
        self.check(name, got_pool == pool && got_depositor == depositor, detail);
    }

    fn stake(&mut self, amount: u128) -> stakepool::Result<()> {
        self.pool.stake(&mut self.token, &self.depositor, amount)
    }

    fn unstake(&mut self, amount: u128) -> stakepool::Result<()> {
        self.pool.unstake(&mut self.token, &self.depositor, amount)
    }

    fn distribute(&mut self, amount: u128) -> stakepool::Result<()> {
        self.pool.distribute(&mut self.token, &self.depositor, amount)
    }
}

/// Run every step and return the checks in order
pub fn run(supply: u128) -> Result<Vec<Check>> {
    anyhow::ensure!(supply >= 1_200, "scenario needs a supply of at least 1200");

    let mut w = Walkthrough::new(supply)?;
    let d = w.depositor;

    let r = w.stake(1_000);
    w.expect_ok("stake 1000", r, &[Event::Stake { staker: d, amount: 1_000 }]);
    w.expect_balances("  balances after stake", 1_000, supply - 1_000);

    let r = w.stake(1_000);
    w.expect_err("second stake is refused", r, StakingError::AlreadyStaked);

    let r = w.unstake(1_000);
    w.expect_ok("unstake 1000", r, &[Event::Unstake { staker: d, amount: 1_000 }]);
    let r = w.stake(1_000);
    w.expect_ok("stake again after full unstake", r, &[Event::Stake { staker: d, amount: 1_000 }]);
    w.expect_balances("  balances after restake", 1_000, supply - 1_000);

    let r = w.distribute(200);
    w.expect_ok("distribute 200", r, &[Event::Distribute { amount: 200 }]);
    w.expect_balances("  balances after distribute", 1_200, supply - 1_200);

    let r = w.unstake(1_000);
    w.expect_ok(
        "unstake principal, reward paid with it",
        r,
        &[Event::Unstake { staker: d, amount: 1_000 }, Event::RewardPaid { staker: d, amount: 200 }],
    );
    w.expect_balances("  balances after full exit", 0, supply);
    let r = w.distribute(200);
    w.expect_err("distribute to an empty pool is refused", r, StakingError::NoActiveStake);

    let r = w.stake(0);
    w.expect_err("zero stake is refused", r, StakingError::ZeroAmount);

    let r = w.stake(1_000);
    w.expect_ok("stake 1000", r, &[Event::Stake { staker: d, amount: 1_000 }]);
    let r = w.unstake(500);
    w.expect_ok("unstake 500", r, &[Event::Unstake { staker: d, amount: 500 }]);
    w.expect_balances("  balances after partial unstake", 500, supply - 500);
    let left = w.pool.unstakeable_amount(&d);
    w.check("  unstakeable is 500", left == 500, format!("unstakeable {}", left));
    let r = w.unstake(1_000);
    w.expect_err("unstake beyond principal is refused", r, StakingError::InsufficientBalance);

    let custody = w.pool.check_custody(&w.token);
    w.check("custody invariant", custody.is_ok(), format!("{:?}", custody));

    Ok(w.checks)
}

pub fn run_scenario(supply: u128) -> Result<()> {
    println!("{}", "=== Reference Walkthrough ===".bright_green().bold());
    println!("{} {}\n", "Supply:".bright_cyan(), supply);

    let checks = run(supply)?;
    for check in &checks {
        if check.passed {
            println!("{} {} {}", "✓".bright_green(), check.name, check.detail.dimmed());
        } else {
            println!("{} {} {}", "✗".bright_red(), check.name.bright_red(), check.detail);
        }
    }

    let failed = checks.iter().filter(|c| !c.passed).count();
    info!("scenario: {} checks, {} failed", checks.len(), failed);
    println!();
    if failed > 0 {
        anyhow::bail!("{} of {} checks failed", failed, checks.len());
    }
    println!("{} {}", "All checks passed".bright_green().bold(), "✓".bright_green());
    Ok(())
}
