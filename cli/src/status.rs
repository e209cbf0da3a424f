//! Pool status and event history

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use stakepool::TokenLedger;

use crate::config::CliConfig;
use crate::identity::{label, to_base58};
use crate::staking::short;
use crate::state::{EventKind, State};

#[derive(Debug, Serialize)]
struct StakerStatus {
    address: String,
    label: String,
    active: bool,
    principal: String,
    settled_balance: String,
    pending_reward: String,
    unstakeable: String,
}

#[derive(Debug, Serialize)]
struct PoolStatus {
    address: String,
    staker_count: usize,
    total_principal: String,
    accumulator: String,
    reward_carry: String,
    reward_reserve: String,
    custody_balance: String,
    token_balance: String,
    invariant: Option<String>,
    stakers: Vec<StakerStatus>,
}

fn collect(state: &State) -> PoolStatus {
    let pool = &state.pool;
    let stakers = pool
        .accounts()
        .map(|(addr, account)| StakerStatus {
            address: to_base58(addr),
            label: label(addr),
            active: account.is_active(),
            principal: account.principal.to_string(),
            settled_balance: account.settled_balance.to_string(),
            pending_reward: pool.pending_reward(addr).to_string(),
            unstakeable: pool.unstakeable_amount(addr).to_string(),
        })
        .collect();

    PoolStatus {
        address: to_base58(&pool.address),
        staker_count: pool.staker_count(),
        total_principal: pool.total_principal.to_string(),
        accumulator: pool.accumulator.to_string(),
        reward_carry: pool.reward_carry.to_string(),
        reward_reserve: pool.reward_reserve.to_string(),
        custody_balance: pool.custody_balance.to_string(),
        token_balance: state.token.balance_of(&pool.address).to_string(),
        invariant: state.verify().err().map(|e| e.to_string()),
        stakers,
    }
}

/// Print pool globals, the per-staker table and the invariant check
///
/// Exits with an error when the invariant does not hold so scripts can
/// detect a corrupted ledger.
pub fn show_status(config: &CliConfig, json: bool) -> Result<()> {
    let state = State::load(&config.state_path)?;
    let status = collect(&state);

    if json {
        let out = serde_json::to_string_pretty(&status).context("Failed to serialize status")?;
        println!("{}", out);
    } else {
        print_human(&status);
    }

    state.verify()?;
    Ok(())
}

fn print_human(status: &PoolStatus) {
    println!("{}", "=== Staking Pool Status ===".bright_green().bold());
    println!("{} {}", "Pool:".bright_cyan(), status.address);
    println!("{} {}", "Active stakers:".bright_cyan(), status.staker_count);
    println!("{} {}", "Total principal:".bright_cyan(), status.total_principal);
    println!("{} {}", "Accumulator:".bright_cyan(), status.accumulator);
    println!("{} {}", "Reward carry:".bright_cyan(), status.reward_carry);
    println!("{} {}", "Reward reserve:".bright_cyan(), status.reward_reserve);
    println!("{} {}", "Custody balance:".bright_cyan(), status.custody_balance);
    println!("{} {}", "Token balance:".bright_cyan(), status.token_balance);

    if !status.stakers.is_empty() {
        println!("\n{}", "Stakers".bright_yellow().bold());
        println!(
            "  {:<20} {:>8} {:>14} {:>14} {:>14} {:>14}",
            "Staker", "Active", "Principal", "Settled", "Pending", "Unstakeable"
        );
        for s in &status.stakers {
            let active = if s.active { "yes".green() } else { "no".dimmed() };
            println!(
                "  {:<20} {:>8} {:>14} {:>14} {:>14} {:>14}",
                truncate(&s.label, 20),
                active,
                s.principal,
                s.settled_balance,
                s.pending_reward,
                s.unstakeable
            );
        }
    }

    println!();
    match &status.invariant {
        None => println!("{} {}", "Custody invariant:".bright_cyan(), "✓ holds".bright_green()),
        Some(violation) => println!("{} {}", "Custody invariant:".bright_cyan(), format!("✗ {}", violation).bright_red()),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 2).collect();
        format!("{}..", head)
    }
}

pub fn show_events(config: &CliConfig, limit: Option<usize>) -> Result<()> {
    let state = State::load(&config.state_path)?;
    println!("{}", "=== Event History ===".bright_green().bold());

    if state.history.is_empty() {
        println!("{}", "No events recorded".dimmed());
        return Ok(());
    }

    let skip = limit.map(|n| state.history.len().saturating_sub(n)).unwrap_or(0);
    for record in state.history.iter().skip(skip) {
        let line = match &record.kind {
            EventKind::Stake { staker, amount } => format!("{} {} {}", "Stake".green(), short(staker), amount),
            EventKind::Unstake { staker, amount } => format!("{} {} {}", "Unstake".yellow(), short(staker), amount),
            EventKind::RewardPaid { staker, amount } => {
                format!("{} {} {}", "RewardPaid".bright_yellow(), short(staker), amount)
            }
            EventKind::Distribute { amount } => format!("{} {}", "Distribute".bright_magenta(), amount),
        };
        println!("{}  {}", record.at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(), line);
    }
    Ok(())
}
