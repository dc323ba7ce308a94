//! Runtime that owns every ledger plus the clock and runs entry points
//! one at a time.
//!
//! Each entry point executes against a checkpoint of the ledger; if it
//! returns an error the checkpoint is restored, so a failed call leaves no
//! trace.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::{
    config::ProtocolConfig,
    constants::PROGRAM_ID,
    error::GravityError,
    exchange::Exchange,
    farm::RewardFarm,
    incinerator::Incinerator,
    interfaces::PriceOracle,
    oracle::ManualOracle,
    policy::{CreationPolicy, OpenPolicy},
    token::TokenBank,
    vault::{CompoundingVault, VaultDeps},
    Result,
};

/// Current block height and unix time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    pub block: u64,
    pub timestamp: u64,
}

/// All mutable protocol state; cloned as the checkpoint of every call.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub bank: TokenBank,
    pub exchange: Exchange,
    pub farms: BTreeMap<Pubkey, RewardFarm>,
    pub vaults: BTreeMap<Pubkey, CompoundingVault>,
    pub incinerator: Incinerator,
    /// Last sequence index used per (staked, reward)
    pub(crate) farm_index: BTreeMap<(Pubkey, Pubkey), u64>,
    pub(crate) vault_by_farm: BTreeMap<Pubkey, Pubkey>,
}

/// Read-only context handed to an entry point body.
pub(crate) struct Tx<'a> {
    pub env: Env,
    pub program_id: Pubkey,
    pub config: &'a ProtocolConfig,
    pub oracle: &'a dyn PriceOracle,
    pub policy: &'a dyn CreationPolicy,
}

impl Ledger {
    fn new(program_id: &Pubkey, config: &ProtocolConfig) -> Self {
        Self {
            bank: TokenBank::new(),
            exchange: Exchange::new(*program_id, config.exchange.clone()),
            farms: BTreeMap::new(),
            vaults: BTreeMap::new(),
            incinerator: Incinerator::new(program_id),
            farm_index: BTreeMap::new(),
            vault_by_farm: BTreeMap::new(),
        }
    }

    pub fn vault_address(&self, farm: &Pubkey) -> Result<Pubkey> {
        self.vault_by_farm
            .get(farm)
            .copied()
            .ok_or(GravityError::NotFound { kind: "vault", address: *farm })
    }

    pub fn vault_for(&self, farm: &Pubkey) -> Result<&CompoundingVault> {
        let address = self.vault_address(farm)?;
        self.vaults
            .get(&address)
            .ok_or(GravityError::NotFound { kind: "vault", address })
    }

    pub fn farm(&self, farm: &Pubkey) -> Result<&RewardFarm> {
        self.farms
            .get(farm)
            .ok_or(GravityError::NotFound { kind: "farm", address: *farm })
    }

    pub(crate) fn vault_mut(&mut self, farm: &Pubkey) -> Result<&mut CompoundingVault> {
        let address = self.vault_address(farm)?;
        self.vaults
            .get_mut(&address)
            .ok_or(GravityError::NotFound { kind: "vault", address })
    }

    /// Run `f` against the vault over `farm` with its dependencies wired.
    pub(crate) fn with_vault<T>(
        &mut self,
        farm: &Pubkey,
        tx: &Tx<'_>,
        f: impl FnOnce(&mut CompoundingVault, &mut VaultDeps<'_>) -> Result<T>,
    ) -> Result<T> {
        let vault_address = self.vault_address(farm)?;
        let Ledger { bank, exchange, farms, vaults, incinerator, .. } = self;
        let vault = vaults.get_mut(&vault_address).ok_or(GravityError::NotFound {
            kind: "vault",
            address: vault_address,
        })?;
        let farm_state = farms
            .get_mut(farm)
            .ok_or(GravityError::NotFound { kind: "farm", address: *farm })?;
        let mut deps = VaultDeps {
            bank,
            farm: farm_state,
            venue: exchange,
            oracle: tx.oracle,
            sink: incinerator,
            block: tx.env.block,
            now: tx.env.timestamp,
        };
        f(vault, &mut deps)
    }
}

pub struct Protocol<O: PriceOracle = ManualOracle> {
    program_id: Pubkey,
    config: ProtocolConfig,
    env: Env,
    ledger: Ledger,
    oracle: O,
    policy: Box<dyn CreationPolicy>,
}

impl Protocol<ManualOracle> {
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        let oracle = ManualOracle::new(config.oracle_max_age());
        Self::with_oracle(config, oracle)
    }

    /// Record the current spot price of the `a`/`b` pair in the oracle.
    pub fn observe_price(&mut self, a: &Pubkey, b: &Pubkey) -> Result<u128> {
        let pair = self.ledger.exchange.require_pair(a, b)?;
        self.oracle.observe(pair, self.env.timestamp)
    }
}

impl<O: PriceOracle> Protocol<O> {
    pub fn with_oracle(config: ProtocolConfig, oracle: O) -> Result<Self> {
        config.validate()?;
        let program_id = PROGRAM_ID;
        Ok(Self {
            ledger: Ledger::new(&program_id, &config),
            program_id,
            config,
            env: Env::default(),
            oracle,
            policy: Box::new(OpenPolicy),
        })
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn set_policy(&mut self, policy: impl CreationPolicy + 'static) {
        self.policy = Box::new(policy);
    }

    // ─── Clock ──────────────────────────────────────────────────────────────

    pub fn env(&self) -> Env {
        self.env
    }

    pub fn set_env(&mut self, env: Env) {
        self.env = env;
    }

    pub fn advance_blocks(&mut self, blocks: u64) {
        self.env.block += blocks;
    }

    pub fn advance_time(&mut self, seconds: u64) {
        self.env.timestamp += seconds;
    }

    // ─── Tokens ─────────────────────────────────────────────────────────────

    /// Issue `amount` of `mint` to `to` out of thin air (test and scenario
    /// faucet).
    pub fn mint_tokens(&mut self, mint: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        self.transact("mint_tokens", |ledger, _| ledger.bank.mint_to(mint, to, amount))
    }

    pub fn transfer_tokens(&mut self, mint: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        self.transact("transfer_tokens", |ledger, _| {
            ledger.bank.transfer(mint, from, to, amount)
        })
    }

    pub fn balance_of(&self, mint: &Pubkey, owner: &Pubkey) -> u64 {
        self.ledger.bank.balance_of(mint, owner)
    }

    pub fn total_supply(&self, mint: &Pubkey) -> u64 {
        self.ledger.bank.total_supply(mint)
    }

    // ─── Execution ──────────────────────────────────────────────────────────

    /// Run `f` all-or-nothing.
    pub(crate) fn transact<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut Ledger, Tx<'_>) -> Result<T>,
    ) -> Result<T> {
        let checkpoint = self.ledger.clone();
        let tx = Tx {
            env: self.env,
            program_id: self.program_id,
            config: &self.config,
            oracle: &self.oracle,
            policy: self.policy.as_ref(),
        };
        let result = f(&mut self.ledger, tx);
        match &result {
            Ok(_) => debug!(op, block = self.env.block, "committed"),
            Err(err) => {
                self.ledger = checkpoint;
                debug!(op, %err, "reverted");
            }
        }
        result
    }
}
