//! Stakepool CLI - operate a token staking pool from the command line
//!
//! The pool and its token live in a JSON state file between invocations.
//! Each command loads the file, applies one call as the chosen identity and
//! writes the file back only if the call succeeded.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod config;
mod error;
mod identity;
mod scenario;
mod staking;
mod state;
mod status;
mod token;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "stakepool")]
#[command(about = "Stakepool CLI - Stake tokens and share rewards pro rata", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file (default: ./stakepool.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to state file (overrides config)
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Identity to act as: a name (max 32 bytes) or a base58 address
    #[arg(long = "as", value_name = "IDENTITY")]
    identity: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh pool and token
    Init {
        /// Total token supply minted to the owner
        #[arg(long)]
        supply: Option<u128>,

        /// Identity receiving the supply (default: --as)
        #[arg(long)]
        owner: Option<String>,

        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },

    /// Approve the pool to pull tokens from the caller
    Approve {
        /// Allowance (replaces any previous one)
        amount: u128,
    },

    /// Transfer tokens to another identity
    Transfer {
        /// Recipient identity
        to: String,

        /// Amount to transfer
        amount: u128,
    },

    /// Open a stake
    Stake {
        /// Amount to stake
        amount: u128,
    },

    /// Withdraw principal; draining it also pays out the settled reward
    Unstake {
        /// Principal to withdraw
        amount: u128,
    },

    /// Distribute a reward over all active stakes
    Distribute {
        /// Reward amount
        amount: u128,
    },

    /// Show what a full unstake would pay a staker
    Unstakeable {
        /// Staker identity (default: caller)
        staker: Option<String>,
    },

    /// Show a token balance
    Balance {
        /// Holder identity, or "pool" (default: caller)
        who: Option<String>,
    },

    /// Show pool state and check the custody invariant
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show recorded events
    Events {
        /// Show only the last N events
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Run the reference walkthrough in memory
    Scenario {
        /// Token supply for the walkthrough
        #[arg(long, default_value = "1000000")]
        supply: u128,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = CliConfig::new(cli.config.clone(), cli.state.clone(), cli.identity.clone())?;

    if cli.verbose {
        if let Some(path) = &config.config_path {
            println!("{} {}", "Config:".bright_cyan(), path.display());
        }
        println!("{} {}", "State:".bright_cyan(), config.state_path.display());
        println!("{} {}", "Identity:".bright_cyan(), config.identity);
    }

    match cli.command {
        Commands::Init { supply, owner, force } => {
            staking::initialize(&config, supply, owner, force)?;
        }
        Commands::Approve { amount } => {
            token::approve(&config, amount)?;
        }
        Commands::Transfer { to, amount } => {
            token::transfer(&config, to, amount)?;
        }
        Commands::Stake { amount } => {
            staking::stake(&config, amount)?;
        }
        Commands::Unstake { amount } => {
            staking::unstake(&config, amount)?;
        }
        Commands::Distribute { amount } => {
            staking::distribute(&config, amount)?;
        }
        Commands::Unstakeable { staker } => {
            staking::show_unstakeable(&config, staker)?;
        }
        Commands::Balance { who } => {
            token::show_balance(&config, who)?;
        }
        Commands::Status { json } => {
            status::show_status(&config, json)?;
        }
        Commands::Events { limit } => {
            status::show_events(&config, limit)?;
        }
        Commands::Scenario { supply } => {
            scenario::run_scenario(supply)?;
        }
    }

    Ok(())
}
