//! JSON scenario files: a config plus an ordered list of steps replayed
//! against a fresh `Protocol`.
//!
//! Names are resolved to addresses as follows:
//!   `LP:A/B`   the LP mint (pair address) of the A/B pair
//!   farm ids   the address of the farm created under that id
//!   anything   sha256 of the name, so "alice" and "GFI" are stable keys

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, bail, Context, Result};
use gravity_core::{
    AddLiquidityParams, Env, FarmParams, Protocol, ProtocolConfig, RemoveLiquidityParams,
    StakingFarm, SwapExactInParams,
};
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::{hash::hash, pubkey::Pubkey};
use tracing::{debug, info};

/// Seconds a block advances the clock by when a step does not say.
pub const BLOCK_SECS: u64 = 13;

fn genesis() -> Env {
    Env { block: 1, timestamp: 1_000_000 }
}

fn one() -> u64 {
    1
}

/// Stable address for a name.
pub fn actor(name: &str) -> Pubkey {
    Pubkey::new_from_array(hash(name.as_bytes()).to_bytes())
}

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: ProtocolConfig,
    /// Name of the governance token worth is reported in, e.g. "GFI"
    #[serde(default)]
    pub governance: Option<String>,
    #[serde(default = "genesis")]
    pub start: Env,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    /// The step must fail; the error is recorded instead of aborting the run
    #[serde(default)]
    pub expect_error: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Mint { token: String, to: String, amount: u64 },
    CreatePair { creator: String, a: String, b: String },
    AddLiquidity {
        who: String,
        a: String,
        b: String,
        amount_a: u64,
        amount_b: u64,
        #[serde(default)]
        min_a: u64,
        #[serde(default)]
        min_b: u64,
    },
    RemoveLiquidity {
        who: String,
        a: String,
        b: String,
        liquidity: u64,
        #[serde(default)]
        min_a: u64,
        #[serde(default)]
        min_b: u64,
    },
    Swap {
        who: String,
        path: Vec<String>,
        amount_in: u64,
        #[serde(default)]
        min_out: u64,
    },
    Pause { paused: bool },
    WithdrawOnly { a: String, b: String, enabled: bool },
    SetFeeTo { to: Option<String> },
    Observe { a: String, b: String },
    CreateFarm {
        id: String,
        creator: String,
        staked: String,
        reward: String,
        reward_per_block: u64,
        start_block: u64,
        end_block: u64,
        /// Defaults to what the window pays out, bonus blocks included
        #[serde(default)]
        budget: Option<u64>,
        #[serde(default)]
        bonus_end_block: Option<u64>,
        #[serde(default = "one")]
        bonus: u64,
    },
    FarmDeposit { who: String, farm: String, amount: u64 },
    FarmWithdraw { who: String, farm: String, amount: u64 },
    EmergencyWithdraw { who: String, farm: String },
    CreateVault {
        creator: String,
        farm: String,
        #[serde(default)]
        routes: Vec<Vec<String>>,
    },
    VaultDeposit { who: String, farm: String, amount: u64 },
    VaultWithdraw { who: String, farm: String, shares: u64 },
    Harvest {
        who: String,
        farm: String,
        #[serde(default)]
        min_amounts_out: Vec<u64>,
    },
    Snapshot { who: String, farm: String, holder: String },
    TransferShares { from: String, farm: String, to: String, amount: u64 },
    Advance {
        blocks: u64,
        /// Defaults to `blocks * BLOCK_SECS`
        #[serde(default)]
        seconds: Option<u64>,
    },
}

impl Action {
    pub fn op(&self) -> &'static str {
        match self {
            Action::Mint { .. } => "mint",
            Action::CreatePair { .. } => "create_pair",
            Action::AddLiquidity { .. } => "add_liquidity",
            Action::RemoveLiquidity { .. } => "remove_liquidity",
            Action::Swap { .. } => "swap",
            Action::Pause { .. } => "pause",
            Action::WithdrawOnly { .. } => "withdraw_only",
            Action::SetFeeTo { .. } => "set_fee_to",
            Action::Observe { .. } => "observe",
            Action::CreateFarm { .. } => "create_farm",
            Action::FarmDeposit { .. } => "farm_deposit",
            Action::FarmWithdraw { .. } => "farm_withdraw",
            Action::EmergencyWithdraw { .. } => "emergency_withdraw",
            Action::CreateVault { .. } => "create_vault",
            Action::VaultDeposit { .. } => "vault_deposit",
            Action::VaultWithdraw { .. } => "vault_withdraw",
            Action::Harvest { .. } => "harvest",
            Action::Snapshot { .. } => "snapshot",
            Action::TransferShares { .. } => "transfer_shares",
            Action::Advance { .. } => "advance",
        }
    }
}

#[derive(Debug)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub env: Env,
    /// false when the step failed as expected
    pub ok: bool,
    pub detail: Value,
}

pub struct Runner {
    protocol: Protocol,
    farms: BTreeMap<String, Pubkey>,
    names: BTreeMap<Pubkey, String>,
    tokens: BTreeSet<Pubkey>,
}

impl Runner {
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let mut config = scenario.config.clone();
        if let Some(symbol) = &scenario.governance {
            config.governance_token = Some(actor(symbol));
        }
        let mut protocol = Protocol::new(config).context("invalid scenario config")?;
        protocol.set_env(scenario.start);
        let mut runner = Self {
            protocol,
            farms: BTreeMap::new(),
            names: BTreeMap::new(),
            tokens: BTreeSet::new(),
        };
        if let Some(symbol) = &scenario.governance {
            runner.token(symbol)?;
        }
        Ok(runner)
    }

    #[cfg(test)]
    fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    // ─── Names ──────────────────────────────────────────────────────────────

    fn resolve(&mut self, name: &str) -> Result<Pubkey> {
        if let Some(legs) = name.strip_prefix("LP:") {
            let (a, b) = legs
                .split_once('/')
                .ok_or_else(|| anyhow!("LP name '{name}' must look like LP:A/B"))?;
            let (a, b) = (self.resolve(a)?, self.resolve(b)?);
            let pair = self
                .protocol
                .ledger()
                .exchange
                .get_pair(&a, &b)
                .ok_or_else(|| anyhow!("no pair for '{name}'"))?;
            self.names.insert(pair, name.to_string());
            return Ok(pair);
        }
        if let Some(farm) = self.farms.get(name) {
            return Ok(*farm);
        }
        let key = actor(name);
        self.names.entry(key).or_insert_with(|| name.to_string());
        Ok(key)
    }

    /// Resolve a name used as an asset and remember it for the report.
    fn token(&mut self, name: &str) -> Result<Pubkey> {
        let key = self.resolve(name)?;
        self.tokens.insert(key);
        Ok(key)
    }

    fn farm(&self, id: &str) -> Result<Pubkey> {
        self.farms
            .get(id)
            .copied()
            .ok_or_else(|| anyhow!("unknown farm id '{id}'"))
    }

    pub fn label(&self, key: &Pubkey) -> String {
        match self.names.get(key) {
            Some(name) => name.clone(),
            None => {
                let s = key.to_string();
                format!("{}…{}", &s[..4], &s[s.len() - 4..])
            }
        }
    }

    // ─── Execution ──────────────────────────────────────────────────────────

    pub fn run(&mut self, steps: &[Step]) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let op = step.action.op();
            let result = self.apply(&step.action);
            let env = self.protocol.env();
            match (result, step.expect_error) {
                (Ok(detail), false) => {
                    debug!(index, op, %detail, "step ok");
                    reports.push(StepReport { index, op, env, ok: true, detail });
                }
                (Err(err), true) => {
                    debug!(index, op, %err, "step failed as expected");
                    reports.push(StepReport {
                        index,
                        op,
                        env,
                        ok: false,
                        detail: json!(format!("{err:#}")),
                    });
                }
                (Ok(_), true) => bail!("step {index} ({op}) was expected to fail but succeeded"),
                (Err(err), false) => return Err(err.context(format!("step {index} ({op})"))),
            }
        }
        info!(steps = reports.len(), "scenario complete");
        Ok(reports)
    }

    fn apply(&mut self, action: &Action) -> Result<Value> {
        let deadline = u64::MAX;
        let value = match action {
            Action::Mint { token, to, amount } => {
                let (token, to) = (self.token(token)?, self.resolve(to)?);
                self.protocol.mint_tokens(&token, &to, *amount)?;
                json!({ "minted": amount })
            }
            Action::CreatePair { creator, a, b } => {
                let (creator, a_key, b_key) = (self.resolve(creator)?, self.token(a)?, self.token(b)?);
                let pair = self.protocol.create_pair(&creator, &a_key, &b_key)?;
                self.names.insert(pair, format!("LP:{a}/{b}"));
                self.tokens.insert(pair);
                json!({ "pair": pair.to_string() })
            }
            Action::AddLiquidity { who, a, b, amount_a, amount_b, min_a, min_b } => {
                let who = self.resolve(who)?;
                let params = AddLiquidityParams {
                    token_a: self.token(a)?,
                    token_b: self.token(b)?,
                    amount_a_desired: *amount_a,
                    amount_b_desired: *amount_b,
                    amount_a_min: *min_a,
                    amount_b_min: *min_b,
                    to: who,
                    deadline,
                };
                serde_json::to_value(self.protocol.add_liquidity(&who, &params)?)?
            }
            Action::RemoveLiquidity { who, a, b, liquidity, min_a, min_b } => {
                let who = self.resolve(who)?;
                let params = RemoveLiquidityParams {
                    token_a: self.token(a)?,
                    token_b: self.token(b)?,
                    liquidity: *liquidity,
                    amount_a_min: *min_a,
                    amount_b_min: *min_b,
                    to: who,
                    deadline,
                };
                let (out_a, out_b) = self.protocol.remove_liquidity(&who, &params)?;
                json!({ "amount_a": out_a, "amount_b": out_b })
            }
            Action::Swap { who, path, amount_in, min_out } => {
                let who = self.resolve(who)?;
                let path = path
                    .iter()
                    .map(|name| self.token(name))
                    .collect::<Result<Vec<_>>>()?;
                let params = SwapExactInParams {
                    amount_in: *amount_in,
                    amount_out_min: *min_out,
                    path,
                    to: who,
                    deadline,
                };
                json!({ "amounts": self.protocol.swap_exact_tokens_for_tokens(&who, &params)? })
            }
            Action::Pause { paused } => {
                self.protocol.set_paused(*paused)?;
                json!({ "paused": paused })
            }
            Action::WithdrawOnly { a, b, enabled } => {
                let (a, b) = (self.token(a)?, self.token(b)?);
                let pair = self
                    .protocol
                    .ledger()
                    .exchange
                    .get_pair(&a, &b)
                    .ok_or_else(|| anyhow!("no such pair"))?;
                self.protocol.set_withdraw_only(&pair, *enabled)?;
                json!({ "withdraw_only": enabled })
            }
            Action::SetFeeTo { to } => {
                let to = to.as_deref().map(|name| self.resolve(name)).transpose()?;
                self.protocol.set_fee_to(to)?;
                json!({ "fee_to": to.map(|k| self.label(&k)) })
            }
            Action::Observe { a, b } => {
                let (a, b) = (self.token(a)?, self.token(b)?);
                let price = self.protocol.observe_price(&a, &b)?;
                json!({ "price_q64": price.to_string() })
            }
            Action::CreateFarm {
                id,
                creator,
                staked,
                reward,
                reward_per_block,
                start_block,
                end_block,
                budget,
                bonus_end_block,
                bonus,
            } => {
                if self.farms.contains_key(id) {
                    bail!("farm id '{id}' already used");
                }
                let creator = self.resolve(creator)?;
                let (staked, reward) = (self.token(staked)?, self.token(reward)?);
                let mut params =
                    FarmParams::new(staked, reward, 0, *reward_per_block, *start_block, *end_block)
                        .with_bonus(bonus_end_block.unwrap_or(*start_block), *bonus);
                params.reward_budget = match budget {
                    Some(budget) => *budget,
                    None => params.full_budget().context("reward budget overflows u64")?,
                };
                let farm = self.protocol.create_farm(&creator, params)?;
                self.farms.insert(id.clone(), farm);
                self.names.insert(farm, id.clone());
                json!({ "farm": farm.to_string() })
            }
            Action::FarmDeposit { who, farm, amount } => {
                let (who, farm) = (self.resolve(who)?, self.farm(farm)?);
                serde_json::to_value(self.protocol.farm_deposit(&who, &farm, *amount)?)?
            }
            Action::FarmWithdraw { who, farm, amount } => {
                let (who, farm) = (self.resolve(who)?, self.farm(farm)?);
                serde_json::to_value(self.protocol.farm_withdraw(&who, &farm, *amount)?)?
            }
            Action::EmergencyWithdraw { who, farm } => {
                let (who, farm) = (self.resolve(who)?, self.farm(farm)?);
                json!({ "returned": self.protocol.emergency_withdraw(&who, &farm)? })
            }
            Action::CreateVault { creator, farm, routes } => {
                let (creator, farm_key) = (self.resolve(creator)?, self.farm(farm)?);
                let routes = routes
                    .iter()
                    .map(|route| route.iter().map(|name| self.token(name)).collect::<Result<Vec<_>>>())
                    .collect::<Result<Vec<_>>>()?;
                let vault = self.protocol.create_vault(&creator, &farm_key, routes)?;
                self.names.insert(vault, format!("vault:{farm}"));
                json!({ "vault": vault.to_string() })
            }
            Action::VaultDeposit { who, farm, amount } => {
                let (who, farm) = (self.resolve(who)?, self.farm(farm)?);
                json!({ "shares": self.protocol.deposit_compounding(&who, &farm, *amount)? })
            }
            Action::VaultWithdraw { who, farm, shares } => {
                let (who, farm) = (self.resolve(who)?, self.farm(farm)?);
                json!({ "amount": self.protocol.withdraw_compounding(&who, &farm, *shares)? })
            }
            Action::Harvest { who, farm, min_amounts_out } => {
                let (who, farm) = (self.resolve(who)?, self.farm(farm)?);
                serde_json::to_value(self.protocol.harvest_compounding(&who, &farm, min_amounts_out)?)?
            }
            Action::Snapshot { who, farm, holder } => {
                let (who, farm, holder) = (self.resolve(who)?, self.farm(farm)?, self.resolve(holder)?);
                serde_json::to_value(self.protocol.take_snapshot(&who, &farm, &holder)?)?
            }
            Action::TransferShares { from, farm, to, amount } => {
                let (from, farm, to) = (self.resolve(from)?, self.farm(farm)?, self.resolve(to)?);
                self.protocol.transfer_shares(&from, &farm, &to, *amount)?;
                json!({ "transferred": amount })
            }
            Action::Advance { blocks, seconds } => {
                self.protocol.advance_blocks(*blocks);
                self.protocol.advance_time(seconds.unwrap_or(blocks.saturating_mul(BLOCK_SECS)));
                serde_json::to_value(self.protocol.env())?
            }
        };
        Ok(value)
    }

    // ─── Report ─────────────────────────────────────────────────────────────

    /// End state: non-zero balances per asset, pair reserves, farms and
    /// vaults.
    pub fn summary(&self) -> Result<Value> {
        let ledger = self.protocol.ledger();
        let balances: BTreeMap<String, BTreeMap<String, u64>> = self
            .tokens
            .iter()
            .map(|mint| {
                let holders = ledger
                    .bank
                    .holders(mint)
                    .into_iter()
                    .map(|(owner, amount)| (self.label(&owner), amount))
                    .collect();
                (self.label(mint), holders)
            })
            .collect();

        let pairs: Vec<Value> = ledger
            .exchange
            .pairs()
            .map(|p| {
                json!({
                    "pair": self.label(&p.address),
                    "token_a": self.label(&p.token_a),
                    "token_b": self.label(&p.token_b),
                    "reserve_a": p.reserve_a,
                    "reserve_b": p.reserve_b,
                    "lp_supply": p.lp_supply,
                    "withdraw_only": p.withdraw_only,
                })
            })
            .collect();

        let mut farms = Vec::new();
        let mut vaults = Vec::new();
        for (id, address) in &self.farms {
            let farm = ledger.farm(address)?;
            farms.push(json!({
                "id": id,
                "index": farm.index(),
                "total_staked": farm.total_staked(),
                "reward_remaining": farm.reward_remaining(),
                "acc_reward_per_share": farm.acc_reward_per_share().to_string(),
            }));
            if let Ok(vault) = ledger.vault_for(address) {
                vaults.push(json!({
                    "farm": id,
                    "kind": format!("{:?}", vault.kind()),
                    "share_supply": vault.share().total_supply(),
                    "total_value": vault.total_value(farm),
                    "staked_in_farm": farm.staked_balance(&vault.address()),
                    "idle_stake": vault.idle_stake(),
                    "reward_balance": vault.reward_balance(),
                    "carried_dust": vault.carried_dust(),
                    "harvests": vault.harvests(),
                }));
            }
        }

        Ok(json!({
            "env": self.protocol.env(),
            "balances": balances,
            "pairs": pairs,
            "farms": farms,
            "vaults": vaults,
            "burned": self
                .tokens
                .iter()
                .filter_map(|mint| {
                    let burned = ledger.incinerator.burned(mint);
                    (burned > 0).then(|| (self.label(mint), burned))
                })
                .collect::<BTreeMap<_, _>>(),
        }))
    }
}
