//! Pool operations: init, stake, unstake, distribute, unstakeable

use anyhow::{Context, Result};
use colored::Colorize;

use stakepool::{MemoryToken, StakingPool};

use crate::config::CliConfig;
use crate::error::CliError;
use crate::identity::{self, label, pool_address};
use crate::state::{EventKind, State};

/// Create a fresh state file with a new pool and token
///
/// The whole supply is minted to `owner`, who approves the pool for all of
/// it so the reference walkthrough can be replayed without extra steps.
pub fn initialize(config: &CliConfig, supply: Option<u128>, owner: Option<String>, force: bool) -> Result<()> {
    println!("{}", "=== Initialize Staking Pool ===".bright_green().bold());

    if config.state_path.exists() && !force {
        return Err(CliError::StateExists(config.state_path.clone()).into());
    }

    let owner_name = owner.unwrap_or_else(|| config.identity.clone());
    let owner = identity::resolve_caller(&owner_name)?;
    let supply = supply.unwrap_or(config.default_supply);

    let pool_addr = pool_address();
    let mut token = MemoryToken::new(owner, supply);
    token.approve(&owner, &pool_addr, supply);

    let mut state = State::new(StakingPool::new(pool_addr), token);
    state.save(&config.state_path)?;

    println!("{} {}", "State file:".bright_cyan(), config.state_path.display());
    println!("{} {}", "Pool:".bright_cyan(), identity::to_base58(&pool_addr));
    println!("{} {} ({})", "Owner:".bright_cyan(), owner_name, identity::to_base58(&owner));
    println!("{} {}", "Supply:".bright_cyan(), supply);
    println!("\n{} {}", "Success!".bright_green().bold(), "✓".bright_green());
    Ok(())
}

pub fn stake(config: &CliConfig, amount: u128) -> Result<()> {
    println!("{}", "=== Stake ===".bright_green().bold());
    let caller = config.caller()?;
    let mut state = State::load(&config.state_path)?;

    state
        .pool
        .stake(&mut state.token, &caller, amount)
        .with_context(|| format!("stake {} as {}", amount, config.identity))?;

    finish(config, &mut state)?;
    print_position(&state, &caller);
    Ok(())
}

pub fn unstake(config: &CliConfig, amount: u128) -> Result<()> {
    println!("{}", "=== Unstake ===".bright_green().bold());
    let caller = config.caller()?;
    let mut state = State::load(&config.state_path)?;

    state
        .pool
        .unstake(&mut state.token, &caller, amount)
        .with_context(|| format!("unstake {} as {}", amount, config.identity))?;

    finish(config, &mut state)?;
    print_position(&state, &caller);
    Ok(())
}

pub fn distribute(config: &CliConfig, amount: u128) -> Result<()> {
    println!("{}", "=== Distribute Reward ===".bright_green().bold());
    let caller = config.caller()?;
    let mut state = State::load(&config.state_path)?;

    state
        .pool
        .distribute(&mut state.token, &caller, amount)
        .with_context(|| format!("distribute {} as {}", amount, config.identity))?;

    finish(config, &mut state)?;
    println!("{} {}", "Stakers:".bright_cyan(), state.pool.staker_count());
    println!("{} {}", "Total principal:".bright_cyan(), state.pool.total_principal);
    println!("{} {}", "Accumulator:".bright_cyan(), state.pool.accumulator);
    Ok(())
}

pub fn show_unstakeable(config: &CliConfig, staker: Option<String>) -> Result<()> {
    let name = staker.unwrap_or_else(|| config.identity.clone());
    let addr = identity::resolve(&name)?;
    let state = State::load(&config.state_path)?;

    println!("{}", "=== Unstakeable Amount ===".bright_green().bold());
    println!("{} {}", "Staker:".bright_cyan(), label(&addr));
    println!("{} {}", "Unstakeable:".bright_cyan(), state.pool.unstakeable_amount(&addr));
    if !state.pool.is_active(&addr) {
        println!("{}", "No active stake".dimmed());
    }
    Ok(())
}

/// Persist the state and echo the events the call emitted
fn finish(config: &CliConfig, state: &mut State) -> Result<()> {
    let fresh = state.record_events();
    state.save(&config.state_path)?;

    for record in fresh {
        let line = match record.kind {
            EventKind::Stake { staker, amount } => format!("Stake({}, {})", short(&staker), amount),
            EventKind::Unstake { staker, amount } => format!("Unstake({}, {})", short(&staker), amount),
            EventKind::RewardPaid { staker, amount } => format!("RewardPaid({}, {})", short(&staker), amount),
            EventKind::Distribute { amount } => format!("Distribute({})", amount),
        };
        println!("{} {}", "Event:".bright_cyan(), line.yellow());
    }
    println!("\n{} {}", "Success!".bright_green().bold(), "✓".bright_green());
    Ok(())
}

fn print_position(state: &State, staker: &stakepool::Address) {
    let (principal, settled) = state
        .pool
        .account(staker)
        .map(|a| (a.principal, a.settled_balance))
        .unwrap_or((0, 0));
    println!("{} {}", "Principal:".bright_cyan(), principal);
    println!("{} {}", "Settled balance:".bright_cyan(), settled);
    println!("{} {}", "Unstakeable:".bright_cyan(), state.pool.unstakeable_amount(staker));
    println!("{} {}", "Wallet:".bright_cyan(), stakepool::TokenLedger::balance_of(&state.token, staker));
    println!("{} {}", "Pool custody:".bright_cyan(), state.pool.custody_balance);
}

/// Render a base58 event address back as a label
pub fn short(encoded: &str) -> String {
    identity::from_base58(encoded)
        .map(|addr| label(&addr))
        .unwrap_or_else(|_| encoded.to_string())
}
