//! Identity resolution
//!
//! Callers are named on the command line either by a short name (at most
//! 32 bytes, zero-padded into an address) or by a base58-encoded 32-byte
//! address. The pool itself answers to the reserved name `pool`.

use stakepool::Address;

use crate::error::CliError;

/// Name the pool's custody address is derived from
pub const POOL_NAME: &str = "pool";

/// Address derived from a short name
pub fn name_address(name: &str) -> Result<Address, CliError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() {
        return Err(CliError::InvalidIdentity(name.to_string(), "empty name".to_string()));
    }
    if bytes.len() > 32 {
        return Err(CliError::UnknownIdentity(name.to_string()));
    }
    if bytes.contains(&0) {
        return Err(CliError::InvalidIdentity(name.to_string(), "name contains NUL".to_string()));
    }
    let mut addr = [0u8; 32];
    addr[..bytes.len()].copy_from_slice(bytes);
    Ok(addr)
}

pub fn pool_address() -> Address {
    let mut addr = [0u8; 32];
    addr[..POOL_NAME.len()].copy_from_slice(POOL_NAME.as_bytes());
    addr
}

/// Resolve a command-line identity to an address
///
/// Anything that fits in 32 bytes is a name. Longer strings must be base58
/// encodings of exactly 32 bytes. Raw addresses whose base58 form is 32
/// characters or shorter are therefore only reachable through the name they
/// spell.
pub fn resolve(identity: &str) -> Result<Address, CliError> {
    if identity.len() <= 32 {
        return name_address(identity);
    }
    bs58::decode(identity)
        .into_vec()
        .ok()
        .and_then(|bytes| <Address>::try_from(bytes.as_slice()).ok())
        .ok_or_else(|| CliError::UnknownIdentity(identity.to_string()))
}

/// Resolve an identity that will sign a pool or token call
pub fn resolve_caller(identity: &str) -> Result<Address, CliError> {
    let addr = resolve(identity)?;
    if addr == pool_address() {
        return Err(CliError::ReservedIdentity(identity.to_string()));
    }
    Ok(addr)
}

pub fn to_base58(addr: &Address) -> String {
    bs58::encode(addr).into_string()
}

/// Parse a base58 address as stored in the state file
pub fn from_base58(encoded: &str) -> Result<Address, CliError> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| CliError::InvalidIdentity(encoded.to_string(), e.to_string()))?;
    <Address>::try_from(bytes.as_slice()).map_err(|_| {
        CliError::InvalidIdentity(encoded.to_string(), format!("expected 32 bytes, got {}", bytes.len()))
    })
}

/// Human label: the name for name-derived addresses, base58 otherwise
pub fn label(addr: &Address) -> String {
    let end = addr.iter().position(|b| *b == 0).unwrap_or(addr.len());
    let (name, padding) = addr.split_at(end);
    let printable = !name.is_empty()
        && padding.iter().all(|b| *b == 0)
        && name.iter().all(|b| b.is_ascii_graphic());
    match std::str::from_utf8(name) {
        Ok(s) if printable => s.to_string(),
        _ => to_base58(addr),
    }
}
