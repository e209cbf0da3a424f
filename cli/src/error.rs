//! CLI-specific failure modes
//!
//! Pool and token errors pass through unchanged (their `Display` already
//! carries the revert reason); these cover what only the CLI can get wrong.

use std::path::PathBuf;

use stakepool::CustodyViolation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("No state file at {}\nCreate one with: stakepool init --supply <N>", .0.display())]
    Uninitialised(PathBuf),

    #[error("State file already exists: {} (use --force to overwrite)", .0.display())]
    StateExists(PathBuf),

    #[error("Unsupported state file version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Unknown identity '{0}': not a name of at most 32 bytes nor a base58 address")]
    UnknownIdentity(String),

    #[error("Invalid identity encoding '{0}': {1}")]
    InvalidIdentity(String, String),

    #[error("'{0}' is the pool's own identity and cannot act as a caller")]
    ReservedIdentity(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(CustodyViolation),
}
