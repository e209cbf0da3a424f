//! Persistent state file
//!
//! Between invocations the pool, the token and the event history live in a
//! single JSON document (`StateFileV1`). Amounts are stored as decimal
//! strings so that values beyond 2^53 survive JSON tooling, addresses as
//! base58. Every mutating command loads the file, applies one call, checks
//! the custody invariant and writes the file back.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use stakepool::{Account, Event, MemoryToken, StakingPool, U256};

use crate::error::CliError;
use crate::identity::{from_base58, to_base58};

pub const STATE_VERSION: u32 = 1;

// ============================================================================
// Wire format
// ============================================================================

/// u128 as a decimal string
mod amount {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// U256 accumulator values as a decimal string
mod wide {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use stakepool::U256;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(|e| de::Error::custom(format!("invalid index {:?}: {:?}", s, e)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateFileV1 {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pool: PoolRecord,
    pub token: TokenRecord,
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolRecord {
    pub address: String,
    #[serde(with = "amount")]
    pub total_principal: u128,
    #[serde(with = "wide")]
    pub accumulator: U256,
    #[serde(with = "amount")]
    pub reward_carry: u128,
    #[serde(with = "amount")]
    pub reward_reserve: u128,
    #[serde(with = "amount")]
    pub custody_balance: u128,
    pub accounts: Vec<AccountRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountRecord {
    pub address: String,
    #[serde(with = "amount")]
    pub principal: u128,
    #[serde(with = "wide")]
    pub reward_debt: U256,
    #[serde(with = "amount")]
    pub settled_balance: u128,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenRecord {
    #[serde(with = "amount")]
    pub total_supply: u128,
    pub balances: Vec<BalanceRecord>,
    pub allowances: Vec<AllowanceRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalanceRecord {
    pub owner: String,
    #[serde(with = "amount")]
    pub amount: u128,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllowanceRecord {
    pub owner: String,
    pub spender: String,
    #[serde(with = "amount")]
    pub amount: u128,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Stake {
        staker: String,
        #[serde(with = "amount")]
        amount: u128,
    },
    Unstake {
        staker: String,
        #[serde(with = "amount")]
        amount: u128,
    },
    RewardPaid {
        staker: String,
        #[serde(with = "amount")]
        amount: u128,
    },
    Distribute {
        #[serde(with = "amount")]
        amount: u128,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl From<&Event> for EventKind {
    fn from(event: &Event) -> Self {
        match *event {
            Event::Stake { staker, amount } => EventKind::Stake { staker: to_base58(&staker), amount },
            Event::Unstake { staker, amount } => EventKind::Unstake { staker: to_base58(&staker), amount },
            Event::RewardPaid { staker, amount } => EventKind::RewardPaid { staker: to_base58(&staker), amount },
            Event::Distribute { amount } => EventKind::Distribute { amount },
        }
    }
}

// ============================================================================
// In-memory state
// ============================================================================

/// Loaded state: live pool and token plus the recorded history
pub struct State {
    pub pool: StakingPool,
    pub token: MemoryToken,
    pub history: Vec<EventRecord>,
    pub created_at: DateTime<Utc>,
}

impl State {
    pub fn new(pool: StakingPool, token: MemoryToken) -> Self {
        Self {
            pool,
            token,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Move events emitted by the pool into the timestamped history
    pub fn record_events(&mut self) -> Vec<EventRecord> {
        let at = Utc::now();
        let fresh: Vec<EventRecord> = self
            .pool
            .drain_events()
            .iter()
            .map(|e| EventRecord { at, kind: e.into() })
            .collect();
        self.history.extend(fresh.iter().cloned());
        fresh
    }

    /// Fail if pool books and token custody disagree
    pub fn verify(&self) -> Result<(), CliError> {
        self.pool
            .check_custody(&self.token)
            .map_err(CliError::InvariantViolation)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CliError::Uninitialised(path.to_path_buf()).into());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let file: StateFileV1 = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        debug!("loaded state from {} ({} events)", path.display(), file.events.len());
        Self::from_file(file).with_context(|| format!("Corrupt state file: {}", path.display()))
    }

    /// Write the state, replacing any previous file atomically
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.record_events();
        self.verify()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.to_file()).context("Failed to serialize state")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
        debug!("saved state to {}", path.display());
        Ok(())
    }

    fn to_file(&self) -> StateFileV1 {
        let pool = &self.pool;
        StateFileV1 {
            version: STATE_VERSION,
            created_at: self.created_at,
            updated_at: Utc::now(),
            pool: PoolRecord {
                address: to_base58(&pool.address),
                total_principal: pool.total_principal,
                accumulator: pool.accumulator,
                reward_carry: pool.reward_carry,
                reward_reserve: pool.reward_reserve,
                custody_balance: pool.custody_balance,
                accounts: pool
                    .accounts()
                    .map(|(addr, a)| AccountRecord {
                        address: to_base58(addr),
                        principal: a.principal,
                        reward_debt: a.reward_debt,
                        settled_balance: a.settled_balance,
                    })
                    .collect(),
            },
            token: TokenRecord {
                total_supply: self.token.total_supply,
                balances: self
                    .token
                    .balances
                    .iter()
                    .map(|(owner, amount)| BalanceRecord { owner: to_base58(owner), amount: *amount })
                    .collect(),
                allowances: self
                    .token
                    .allowances
                    .iter()
                    .map(|((owner, spender), amount)| AllowanceRecord {
                        owner: to_base58(owner),
                        spender: to_base58(spender),
                        amount: *amount,
                    })
                    .collect(),
            },
            events: self.history.clone(),
        }
    }

    fn from_file(file: StateFileV1) -> Result<Self> {
        if file.version != STATE_VERSION {
            return Err(CliError::UnsupportedVersion { found: file.version, expected: STATE_VERSION }.into());
        }

        let mut pool = StakingPool::new(from_base58(&file.pool.address)?);
        pool.total_principal = file.pool.total_principal;
        pool.accumulator = file.pool.accumulator;
        pool.reward_carry = file.pool.reward_carry;
        pool.reward_reserve = file.pool.reward_reserve;
        pool.custody_balance = file.pool.custody_balance;
        for record in file.pool.accounts {
            let account = Account {
                principal: record.principal,
                reward_debt: record.reward_debt,
                settled_balance: record.settled_balance,
            };
            pool.accounts.insert(from_base58(&record.address)?, account);
        }

        let mut token = MemoryToken {
            total_supply: file.token.total_supply,
            ..MemoryToken::default()
        };
        for record in file.token.balances {
            token.balances.insert(from_base58(&record.owner)?, record.amount);
        }
        for record in file.token.allowances {
            let key = (from_base58(&record.owner)?, from_base58(&record.spender)?);
            token.allowances.insert(key, record.amount);
        }

        Ok(Self {
            pool,
            token,
            history: file.events,
            created_at: file.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{pool_address, resolve};

    fn sample() -> State {
        let owner = resolve("owner").unwrap();
        let mut token = MemoryToken::new(owner, 1_000_000);
        token.approve(&owner, &pool_address(), 1_000_000);
        let mut pool = StakingPool::new(pool_address());
        pool.stake(&mut token, &owner, 1_000).unwrap();
        pool.distribute(&mut token, &owner, 7).unwrap();
        State::new(pool, token)
    }

    #[test]
    fn test_save_then_load_restores_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = sample();
        state.save(&path).unwrap();
        assert_eq!(state.history.len(), 2);

        let loaded = State::load(&path).unwrap();
        assert_eq!(loaded.pool, state.pool);
        assert_eq!(loaded.token, state.token);
        assert_eq!(loaded.history.len(), 2);
        assert_eq!(loaded.history[1].kind, EventKind::Distribute { amount: 7 });
        assert!(loaded.verify().is_ok());
    }

    #[test]
    fn test_amounts_are_strings() {
        let mut state = sample();
        state.record_events();
        let json = serde_json::to_value(state.to_file()).unwrap();
        assert_eq!(json["pool"]["custody_balance"], "1007");
        assert_eq!(json["events"][0]["kind"], "stake");
    }

    #[test]
    fn test_missing_file_is_uninitialised() {
        let dir = tempfile::tempdir().unwrap();
        let err = State::load(&dir.path().join("none.json")).err().unwrap();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::Uninitialised(_))));
    }

    #[test]
    fn test_rejects_unknown_fields_and_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = sample();
        state.save(&path).unwrap();

        let mut json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        json["version"] = 2.into();
        fs::write(&path, json.to_string()).unwrap();
        assert!(State::load(&path).is_err());

        json["version"] = 1.into();
        json["slab"] = "x".into();
        fs::write(&path, json.to_string()).unwrap();
        assert!(State::load(&path).is_err());
    }

    #[test]
    fn test_tampered_ledger_fails_verification() {
        let mut state = sample();
        state.pool.custody_balance += 1;
        assert!(matches!(state.verify(), Err(CliError::InvariantViolation(_))));
    }

    #[test]
    fn test_accumulator_beyond_u128_survives_a_save() {
        const TOKEN: u128 = 1_000_000_000_000_000_000;
        let owner = resolve("owner").unwrap();
        let mut token = MemoryToken::new(owner, 2_000 * TOKEN);
        token.approve(&owner, &pool_address(), 2_000 * TOKEN);
        let mut pool = StakingPool::new(pool_address());
        pool.stake(&mut token, &owner, 1).unwrap();
        pool.distribute(&mut token, &owner, 1_000 * TOKEN).unwrap();
        pool.unstake(&mut token, &owner, 1).unwrap();
        assert!(pool.accumulator > U256::from(u128::MAX));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = State::new(pool, token);
        state.save(&path).unwrap();

        let loaded = State::load(&path).unwrap();
        assert_eq!(loaded.pool, state.pool);
        assert_eq!(
            loaded.history.last().map(|r| r.kind.clone()),
            Some(EventKind::RewardPaid { staker: to_base58(&owner), amount: 1_000 * TOKEN })
        );

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["pool"]["accumulator"], state.pool.accumulator.to_string());
        assert_eq!(json["events"][3]["kind"], "reward_paid");
    }
}
