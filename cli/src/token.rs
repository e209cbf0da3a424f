//! Token operations against the in-memory token

use anyhow::{Context, Result};
use colored::Colorize;

use stakepool::TokenLedger;

use crate::config::CliConfig;
use crate::identity::{self, label, pool_address};
use crate::state::State;

/// Approve the pool to pull `amount` from the caller
pub fn approve(config: &CliConfig, amount: u128) -> Result<()> {
    println!("{}", "=== Approve Pool ===".bright_green().bold());
    let caller = config.caller()?;
    let mut state = State::load(&config.state_path)?;

    state.token.approve(&caller, &pool_address(), amount);
    state.save(&config.state_path)?;

    println!("{} {}", "Owner:".bright_cyan(), label(&caller));
    println!("{} {}", "Allowance:".bright_cyan(), state.token.allowance(&caller, &pool_address()));
    println!("\n{} {}", "Success!".bright_green().bold(), "✓".bright_green());
    Ok(())
}

pub fn transfer(config: &CliConfig, to: String, amount: u128) -> Result<()> {
    println!("{}", "=== Transfer ===".bright_green().bold());
    let caller = config.caller()?;
    let recipient = identity::resolve_caller(&to)?;
    let mut state = State::load(&config.state_path)?;

    state
        .token
        .transfer(&caller, &recipient, amount)
        .with_context(|| format!("transfer {} from {} to {}", amount, config.identity, to))?;
    state.save(&config.state_path)?;

    println!("{} {} -> {}", "Route:".bright_cyan(), label(&caller), label(&recipient));
    println!("{} {}", "Amount:".bright_cyan(), amount);
    println!("\n{} {}", "Success!".bright_green().bold(), "✓".bright_green());
    Ok(())
}

pub fn show_balance(config: &CliConfig, who: Option<String>) -> Result<()> {
    let name = who.unwrap_or_else(|| config.identity.clone());
    let addr = identity::resolve(&name)?;
    let state = State::load(&config.state_path)?;

    println!("{}", "=== Token Balance ===".bright_green().bold());
    println!("{} {}", "Holder:".bright_cyan(), label(&addr));
    println!("{} {}", "Balance:".bright_cyan(), state.token.balance_of(&addr));
    if addr != pool_address() {
        println!(
            "{} {}",
            "Pool allowance:".bright_cyan(),
            state.token.allowance(&addr, &pool_address())
        );
    }
    Ok(())
}
