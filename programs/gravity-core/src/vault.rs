//! Auto-compounding vault over one farm pool.
//!
//! Depositors receive shares; the vault stakes everything in the farm.
//! Anyone may call `harvest_compounding`, which claims the farm reward,
//! converts it back into the staked asset and re-stakes it, so each share
//! redeems for more of the staked asset over time.

use std::collections::BTreeSet;

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, warn};

use crate::{
    config::{display, VaultConfig},
    constants::*,
    error::GravityError,
    farm::FarmPhase,
    interfaces::{FeeSink, PriceOracle, StakingFarm, SwapVenue},
    math,
    oracle::oracle_amount_out,
    require,
    share::{ShareToken, ShareValuation, Snapshot},
    token::TokenBank,
    types::{AddLiquidityParams, SwapExactInParams},
    Result,
};

/// What the farm stakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultKind {
    SingleAsset,
    /// LP of `pair`, whose legs are `token_a` and `token_b`
    LiquidityPair {
        pair: Pubkey,
        token_a: Pubkey,
        token_b: Pubkey,
    },
}

impl VaultKind {
    /// Classify `staked` as a plain asset or an LP mint on `venue`.
    pub fn detect(venue: &dyn SwapVenue, staked: &Pubkey) -> Self {
        match venue.pair_by_address(staked) {
            Some(p) => VaultKind::LiquidityPair {
                pair: p.address,
                token_a: p.token_a,
                token_b: p.token_b,
            },
            None => VaultKind::SingleAsset,
        }
    }
}

/// Everything a vault entry point touches outside its own state.
pub struct VaultDeps<'a> {
    pub bank: &'a mut TokenBank,
    pub farm: &'a mut dyn StakingFarm,
    pub venue: &'a mut dyn SwapVenue,
    pub oracle: &'a dyn PriceOracle,
    pub sink: &'a mut dyn FeeSink,
    pub block: u64,
    pub now: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    /// Reward taken out of the vault's balance for this harvest
    pub reward_claimed: u64,
    pub fee_burned: u64,
    /// Part of `reward_claimed` converted this harvest; the remainder
    /// would have left the oracle slippage band
    pub reward_converted: u64,
    /// Reward left unconverted (too small to swap, or over the band)
    pub reward_carried: u64,
    /// Staked units added (LP for pair vaults)
    pub staked_added: u64,
    pub rebalance_rounds: usize,
    /// Leg leftovers kept for the next harvest
    pub dust_carried: Vec<u64>,
    /// Leg leftovers sent to the dust pan
    pub dust_swept: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HarvestOutcome {
    CoolingDown { valid_after: u64 },
    NothingToHarvest { claimable: u64 },
    OracleStale {
        #[serde(serialize_with = "display")]
        pair: Pubkey,
    },
    Harvested(HarvestReport),
}

pub fn derive_vault_address(program_id: &Pubkey, farm: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[VAULT_SEED, farm.as_ref()], program_id).0
}

#[derive(Debug, Clone)]
pub struct CompoundingVault {
    address: Pubkey,
    farm: Pubkey,
    staked_asset: Pubkey,
    reward_asset: Pubkey,
    kind: VaultKind,
    /// One route per target asset, each starting at the reward asset
    routes: Vec<Vec<Pubkey>>,
    config: VaultConfig,
    governance_token: Option<Pubkey>,
    share: ShareToken,
    last_harvest_valid_after: u64,
    /// Reward claimed from the farm and not yet converted
    reward_balance: u64,
    /// Staked units held by the vault itself once the farm is dead
    idle_stake: u64,
    /// Leg leftovers per target, below `dust_cap` unless no dust pan is set
    carry: Vec<u64>,
    harvests: u64,
}

impl CompoundingVault {
    /// Build a vault over `farm`, validating every conversion route.
    ///
    /// A missing or empty route is accepted only when the reward asset is
    /// the target itself.
    pub fn new(
        address: Pubkey,
        share_mint: Pubkey,
        farm: &dyn StakingFarm,
        venue: &dyn SwapVenue,
        routes: Vec<Vec<Pubkey>>,
        config: VaultConfig,
        governance_token: Option<Pubkey>,
    ) -> Result<Self> {
        config.validate()?;
        let staked_asset = farm.staked_asset();
        let reward_asset = farm.reward_asset();
        let kind = VaultKind::detect(venue, &staked_asset);
        let mut vault = Self {
            address,
            farm: farm.address(),
            staked_asset,
            reward_asset,
            kind,
            routes: Vec::new(),
            config,
            governance_token,
            share: ShareToken::new(share_mint, address),
            last_harvest_valid_after: 0,
            reward_balance: 0,
            idle_stake: 0,
            carry: Vec::new(),
            harvests: 0,
        };
        let targets = vault.targets();
        require!(
            routes.len() <= targets.len(),
            GravityError::InvalidArgument(format!(
                "{} routes given for {} targets",
                routes.len(),
                targets.len()
            ))
        );
        vault.routes = (0..targets.len())
            .map(|i| match routes.get(i) {
                Some(r) if !r.is_empty() => r.clone(),
                _ => vec![reward_asset],
            })
            .collect();
        vault.carry = vec![0; targets.len()];
        vault.validate_routes(venue)?;
        Ok(vault)
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn farm(&self) -> Pubkey {
        self.farm
    }

    pub fn kind(&self) -> &VaultKind {
        &self.kind
    }

    pub fn routes(&self) -> &[Vec<Pubkey>] {
        &self.routes
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn share(&self) -> &ShareToken {
        &self.share
    }

    pub fn reward_balance(&self) -> u64 {
        self.reward_balance
    }

    pub fn idle_stake(&self) -> u64 {
        self.idle_stake
    }

    pub fn carried_dust(&self) -> &[u64] {
        &self.carry
    }

    pub fn last_harvest_valid_after(&self) -> u64 {
        self.last_harvest_valid_after
    }

    pub fn harvests(&self) -> u64 {
        self.harvests
    }

    /// Assets the reward is converted into.
    pub fn targets(&self) -> Vec<Pubkey> {
        match &self.kind {
            VaultKind::SingleAsset => vec![self.staked_asset],
            VaultKind::LiquidityPair { token_a, token_b, .. } => vec![*token_a, *token_b],
        }
    }

    fn validate_routes(&self, venue: &dyn SwapVenue) -> Result<()> {
        for (route, target) in self.routes.iter().zip(self.targets()) {
            let no_path = GravityError::NoConversionPath {
                from: self.reward_asset,
                to: target,
            };
            require!(
                route.first() == Some(&self.reward_asset) && route.last() == Some(&target),
                no_path
            );
            let mut seen = BTreeSet::new();
            for hop in route.windows(2) {
                match venue.pair_of(&hop[0], &hop[1]) {
                    Some(p) if seen.insert(p.address) => {}
                    _ => return Err(no_path),
                }
            }
        }
        Ok(())
    }

    /// Pairs whose prices the next harvest depends on.
    fn priced_pairs(&self, venue: &dyn SwapVenue) -> Vec<Pubkey> {
        let mut pairs = BTreeSet::new();
        for route in &self.routes {
            for hop in route.windows(2) {
                if let Some(p) = venue.pair_of(&hop[0], &hop[1]) {
                    pairs.insert(p.address);
                }
            }
        }
        if let VaultKind::LiquidityPair { pair, .. } = &self.kind {
            pairs.insert(*pair);
        }
        pairs.into_iter().collect()
    }

    // ─── Valuation ──────────────────────────────────────────────────────────

    /// Staked units backing all shares: farm stake plus idle stake.
    pub fn total_value(&self, farm: &dyn StakingFarm) -> u64 {
        farm.staked_balance(&self.address)
            .saturating_add(self.idle_stake)
    }

    /// Share supply valued in governance-token units: the staked units
    /// themselves when the governance token is staked, the governance side
    /// of the LP claim for pairs containing it, zero otherwise.
    pub fn valuation(&self, farm: &dyn StakingFarm, venue: &dyn SwapVenue) -> Result<ShareValuation> {
        let staked = self.total_value(farm);
        let total_value = match (self.governance_token, &self.kind) {
            (Some(gov), VaultKind::SingleAsset) if gov == self.staked_asset => staked,
            (Some(gov), VaultKind::LiquidityPair { pair, .. }) => {
                match venue.pair_by_address(pair) {
                    Some(p) if p.lp_supply > 0 => match p.reserve_of(&gov) {
                        Some(reserve) => math::mul_div_u64(staked, reserve, p.lp_supply)?,
                        None => 0,
                    },
                    _ => 0,
                }
            }
            _ => 0,
        };
        Ok(ShareValuation {
            total_value,
            total_shares: self.share.total_supply(),
        })
    }

    pub fn take_snapshot(
        &mut self,
        caller: &Pubkey,
        holder: &Pubkey,
        valuation: ShareValuation,
        now: u64,
    ) -> Result<Snapshot> {
        self.share.take_snapshot(caller, holder, valuation, now)
    }

    pub fn transfer_shares(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        self.share.transfer(from, to, amount)
    }

    // ─── Farm touch ─────────────────────────────────────────────────────────

    /// Claim whatever the farm owes the vault into `reward_balance`.
    fn claim(&mut self, deps: &mut VaultDeps<'_>) -> Result<u64> {
        let receipt = if deps.farm.phase(deps.block) == FarmPhase::Dead {
            deps.farm
                .withdraw(deps.bank, deps.sink, deps.block, &self.address, 0)?
        } else {
            deps.farm
                .deposit(deps.bank, deps.sink, deps.block, &self.address, 0)?
        };
        self.reward_balance = self
            .reward_balance
            .checked_add(receipt.reward_paid)
            .ok_or(GravityError::MathOverflow)?;
        Ok(receipt.reward_paid)
    }

    fn stake(&mut self, deps: &mut VaultDeps<'_>, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        if deps.farm.phase(deps.block) == FarmPhase::Dead {
            self.idle_stake = self
                .idle_stake
                .checked_add(amount)
                .ok_or(GravityError::MathOverflow)?;
            return Ok(());
        }
        let receipt = deps
            .farm
            .deposit(deps.bank, deps.sink, deps.block, &self.address, amount)?;
        self.reward_balance = self
            .reward_balance
            .checked_add(receipt.reward_paid)
            .ok_or(GravityError::MathOverflow)?;
        Ok(())
    }

    // ─── Deposit / withdraw ─────────────────────────────────────────────────

    /// Stake `amount` on behalf of `user` and mint shares.
    ///
    /// A zero amount mints nothing and never fails; if `user` already holds
    /// shares it still touches the farm so the vault's reward is claimed.
    pub fn deposit_compounding(
        &mut self,
        deps: &mut VaultDeps<'_>,
        user: &Pubkey,
        amount: u64,
    ) -> Result<u64> {
        if amount == 0 {
            if self.share.balance_of(user) > 0 {
                let claimed = self.claim(deps)?;
                debug!(vault = %self.address, %user, claimed, "zero deposit touch");
            }
            return Ok(0);
        }
        require!(
            deps.farm.phase(deps.block) != FarmPhase::Dead,
            GravityError::FarmDead { end_block: deps.farm.end_block() }
        );
        deps.bank.ensure_balance(&self.staked_asset, user, amount)?;

        let total_value = self.total_value(&*deps.farm);
        let supply = self.share.total_supply();
        let shares = if supply == 0 || total_value == 0 {
            amount
        } else {
            math::mul_div_u64(amount, supply, total_value)?
        };
        require!(shares > 0, GravityError::InsufficientLiquidityMinted);

        self.share.mint(&self.address, user, shares)?;
        deps.bank
            .transfer(&self.staked_asset, user, &self.address, amount)?;
        self.stake(deps, amount)?;

        debug!(vault = %self.address, %user, amount, shares, "vault deposit");
        Ok(shares)
    }

    /// Burn `shares` and pay out their claim on the staked asset.
    pub fn withdraw_compounding(
        &mut self,
        deps: &mut VaultDeps<'_>,
        user: &Pubkey,
        shares: u64,
    ) -> Result<u64> {
        require!(shares > 0, GravityError::ZeroAmount);
        let supply = self.share.total_supply();
        let total_value = self.total_value(&*deps.farm);
        let amount = if supply == 0 {
            0
        } else {
            math::mul_div_u64(shares, total_value, supply)?
        };

        self.share.burn(&self.address, user, shares)?;
        let from_idle = amount.min(self.idle_stake);
        self.idle_stake -= from_idle;
        let from_farm = amount - from_idle;
        if from_farm > 0 {
            let receipt = deps
                .farm
                .withdraw(deps.bank, deps.sink, deps.block, &self.address, from_farm)?;
            self.reward_balance = self
                .reward_balance
                .checked_add(receipt.reward_paid)
                .ok_or(GravityError::MathOverflow)?;
        }
        deps.bank
            .transfer(&self.staked_asset, &self.address, user, amount)?;

        debug!(vault = %self.address, %user, shares, amount, "vault withdraw");
        Ok(amount)
    }

    // ─── Harvest ────────────────────────────────────────────────────────────

    /// Claim, convert and re-stake the farm reward. Permissionless.
    ///
    /// Returns without touching any state while cooling down, when nothing
    /// (or less than `min_harvest`) is claimable, or when a price the
    /// conversion depends on is stale. `min_amounts_out[i]` is the caller's
    /// floor for the conversion into the i-th target asset. Only as much
    /// reward as converts inside the oracle slippage band is converted per
    /// call; the remainder is carried in `reward_balance`.
    pub fn harvest_compounding(
        &mut self,
        deps: &mut VaultDeps<'_>,
        caller: &Pubkey,
        min_amounts_out: &[u64],
    ) -> Result<HarvestOutcome> {
        if deps.now < self.last_harvest_valid_after {
            return Ok(HarvestOutcome::CoolingDown {
                valid_after: self.last_harvest_valid_after,
            });
        }
        let pending = deps.farm.pending_reward(&self.address, deps.block)?;
        let claimable = pending.saturating_add(self.reward_balance);
        if claimable == 0 || claimable < self.config.min_harvest {
            return Ok(HarvestOutcome::NothingToHarvest { claimable });
        }
        self.validate_routes(&*deps.venue)?;
        for pair in self.priced_pairs(&*deps.venue) {
            if deps.oracle.is_stale(&pair, deps.now) {
                warn!(vault = %self.address, %pair, "harvest declined: stale price");
                return Ok(HarvestOutcome::OracleStale { pair });
            }
        }

        if pending > 0 {
            self.claim(deps)?;
        }
        let reward = std::mem::take(&mut self.reward_balance);
        if reward == 0 {
            return Ok(HarvestOutcome::NothingToHarvest { claimable: 0 });
        }

        let tranche = self.convertible(deps, reward)?;
        let held_back = reward - tranche;
        if held_back > 0 {
            warn!(vault = %self.address, reward, tranche, "conversion capped by slippage band");
        }

        let fee_burned = math::to_u64(
            tranche as u128 * self.config.vault_fee_bps as u128 / BPS_DENOMINATOR,
        )?;
        deps.sink
            .receive_and_burn(deps.bank, &self.reward_asset, &self.address, fee_burned)?;
        let reward_net = tranche - fee_burned;

        let mut report = HarvestReport {
            reward_claimed: reward,
            reward_converted: tranche,
            fee_burned,
            ..HarvestReport::default()
        };
        match self.kind.clone() {
            VaultKind::SingleAsset => {
                self.convert_single(deps, reward_net, min_amounts_out, &mut report)?
            }
            VaultKind::LiquidityPair { token_a, token_b, .. } => self.convert_pair(
                deps,
                (token_a, token_b),
                reward_net,
                min_amounts_out,
                &mut report,
            )?,
        }
        report.reward_carried = report
            .reward_carried
            .checked_add(held_back)
            .ok_or(GravityError::MathOverflow)?;
        self.reward_balance = report.reward_carried;
        self.stake(deps, report.staked_added)?;

        self.last_harvest_valid_after = deps.now.saturating_add(self.config.cooldown_secs);
        self.harvests += 1;
        info!(
            vault = %self.address, %caller,
            reward, fee_burned, staked_added = report.staked_added,
            valid_after = self.last_harvest_valid_after,
            "harvested"
        );
        Ok(HarvestOutcome::Harvested(report))
    }

    /// Output of `path` for `amount`, or 0 when the amount is too small to
    /// produce anything.
    fn quote_out(venue: &dyn SwapVenue, amount: u64, path: &[Pubkey]) -> Result<u64> {
        if path.len() < 2 {
            return Ok(amount);
        }
        match venue.get_amounts_out(amount, path) {
            Ok(amounts) => Ok(amounts.last().copied().unwrap_or(0)),
            Err(GravityError::ZeroAmount | GravityError::InsufficientOutputAmount { .. }) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Largest part of `reward` whose conversion stays inside the oracle
    /// slippage band on every leg. The rest stays in `reward_balance` for
    /// later harvests.
    fn convertible(&self, deps: &VaultDeps<'_>, reward: u64) -> Result<u64> {
        if self.within_band(deps, reward)? {
            return Ok(reward);
        }
        // Price impact grows with the input: the band holds up to a threshold.
        let (mut lo, mut hi) = (0u64, reward);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.within_band(deps, mid)? {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Whether converting `amount` of reward clears the oracle floor on
    /// every routed leg, with legs sized as the conversion sizes them.
    fn within_band(&self, deps: &VaultDeps<'_>, amount: u64) -> Result<bool> {
        let legs = match &self.kind {
            VaultKind::SingleAsset => vec![amount],
            VaultKind::LiquidityPair { .. } => {
                let half = amount / 2;
                vec![half, amount - half]
            }
        };
        for (leg, route) in legs.into_iter().zip(&self.routes) {
            if route.len() < 2 || leg == 0 {
                continue;
            }
            let out = Self::quote_out(&*deps.venue, leg, route)?;
            if out < self.min_out(deps, leg, route, 0)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `max(caller_min, oracle_expected * slippage_pct / 100)`
    fn min_out(&self, deps: &VaultDeps<'_>, amount: u64, path: &[Pubkey], caller_min: u64) -> Result<u64> {
        let expected = oracle_amount_out(deps.oracle, &*deps.venue, amount, path)?;
        let floor = math::mul_div_u64(expected, self.config.slippage_pct as u64, 100)?;
        Ok(floor.max(caller_min))
    }

    /// Swap `amount` along `path` into the vault. A single-element path is
    /// the identity.
    fn swap_leg(&self, deps: &mut VaultDeps<'_>, amount: u64, path: &[Pubkey], caller_min: u64) -> Result<u64> {
        if path.len() < 2 || amount == 0 {
            return Ok(amount);
        }
        let amount_out_min = self.min_out(deps, amount, path, caller_min)?;
        let params = SwapExactInParams {
            amount_in: amount,
            amount_out_min,
            path: path.to_vec(),
            to: self.address,
            deadline: deps.now,
        };
        let amounts = deps
            .venue
            .swap_exact_tokens_for_tokens(deps.bank, deps.now, &self.address, &params)?;
        Ok(amounts.last().copied().unwrap_or(0))
    }

    fn convert_single(
        &mut self,
        deps: &mut VaultDeps<'_>,
        reward: u64,
        min_amounts_out: &[u64],
        report: &mut HarvestReport,
    ) -> Result<()> {
        let route = self.routes[0].clone();
        if Self::quote_out(&*deps.venue, reward, &route)? == 0 {
            report.reward_carried = reward;
            return Ok(());
        }
        let caller_min = min_amounts_out.first().copied().unwrap_or(0);
        report.staked_added = self.swap_leg(deps, reward, &route, caller_min)?;
        Ok(())
    }

    /// Add as much of `legs` as the pair's ratio allows; returns the LP
    /// minted and subtracts the used amounts from `legs`.
    fn add_legs(&self, deps: &mut VaultDeps<'_>, tokens: (Pubkey, Pubkey), legs: &mut [u64; 2]) -> Result<u64> {
        if legs[0] == 0 || legs[1] == 0 {
            return Ok(0);
        }
        let params = AddLiquidityParams {
            token_a: tokens.0,
            token_b: tokens.1,
            amount_a_desired: legs[0],
            amount_b_desired: legs[1],
            amount_a_min: 0,
            amount_b_min: 0,
            to: self.address,
            deadline: deps.now,
        };
        if deps.venue.preview_add_liquidity(&params)?.liquidity == 0 {
            return Ok(0);
        }
        let added = deps
            .venue
            .add_liquidity(deps.bank, deps.now, &self.address, &params)?;
        legs[0] -= added.amount_a;
        legs[1] -= added.amount_b;
        Ok(added.liquidity)
    }

    fn convert_pair(
        &mut self,
        deps: &mut VaultDeps<'_>,
        tokens: (Pubkey, Pubkey),
        reward: u64,
        min_amounts_out: &[u64],
        report: &mut HarvestReport,
    ) -> Result<()> {
        let half = reward / 2;
        let halves = [half, reward - half];
        let routes = [self.routes[0].clone(), self.routes[1].clone()];
        for (amount, route) in halves.iter().zip(&routes) {
            if Self::quote_out(&*deps.venue, *amount, route)? == 0 {
                report.reward_carried = reward;
                report.dust_carried = self.carry.clone();
                return Ok(());
            }
        }

        let mut legs = [0u64; 2];
        for i in 0..2 {
            let caller_min = min_amounts_out.get(i).copied().unwrap_or(0);
            let out = self.swap_leg(deps, halves[i], &routes[i], caller_min)?;
            legs[i] = out
                .checked_add(self.carry[i])
                .ok_or(GravityError::MathOverflow)?;
        }

        let mut liquidity = self.add_legs(deps, tokens, &mut legs)?;

        // Swap half of whichever leg is left over across the pair and add
        // again until both leftovers are dust.
        let targets = [tokens.0, tokens.1];
        for _ in 0..MAX_REBALANCE_ROUNDS {
            let (from, to) = if legs[0] > self.config.dust_cap {
                (0, 1)
            } else if legs[1] > self.config.dust_cap {
                (1, 0)
            } else {
                break;
            };
            let amount = legs[from] / 2;
            let path = [targets[from], targets[to]];
            if Self::quote_out(&*deps.venue, amount, &path)? == 0 {
                break;
            }
            let out = self.swap_leg(deps, amount, &path, 0)?;
            legs[from] -= amount;
            legs[to] = legs[to].checked_add(out).ok_or(GravityError::MathOverflow)?;
            liquidity = liquidity
                .checked_add(self.add_legs(deps, tokens, &mut legs)?)
                .ok_or(GravityError::MathOverflow)?;
            report.rebalance_rounds += 1;
        }

        let mut swept = vec![0u64; 2];
        if let Some(pan) = self.config.dust_pan {
            for i in 0..2 {
                if legs[i] > self.config.dust_cap {
                    deps.bank.transfer(&targets[i], &self.address, &pan, legs[i])?;
                    warn!(vault = %self.address, asset = %targets[i], amount = legs[i], "dust swept");
                    swept[i] = legs[i];
                    legs[i] = 0;
                }
            }
        }
        self.carry = legs.to_vec();
        report.staked_added = liquidity;
        report.dust_carried = legs.to_vec();
        report.dust_swept = swept;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{
        farm::FarmReceipt,
        incinerator::Incinerator,
        interfaces::PairView,
        oracle::ManualOracle,
        types::LiquidityAdded,
    };

    /// Farm whose owed reward is set by hand.
    #[derive(Default)]
    struct FakeFarm {
        address: Pubkey,
        staked_asset: Pubkey,
        reward_asset: Pubkey,
        dead_after: u64,
        stakes: BTreeMap<Pubkey, u64>,
        owed: BTreeMap<Pubkey, u64>,
    }

    impl StakingFarm for FakeFarm {
        fn address(&self) -> Pubkey {
            self.address
        }
        fn staked_asset(&self) -> Pubkey {
            self.staked_asset
        }
        fn reward_asset(&self) -> Pubkey {
            self.reward_asset
        }
        fn end_block(&self) -> u64 {
            self.dead_after
        }
        fn phase(&self, block: u64) -> FarmPhase {
            if block > self.dead_after {
                FarmPhase::Dead
            } else {
                FarmPhase::Active
            }
        }
        fn staked_balance(&self, user: &Pubkey) -> u64 {
            self.stakes.get(user).copied().unwrap_or(0)
        }
        fn pending_reward(&self, user: &Pubkey, _block: u64) -> Result<u64> {
            Ok(self.owed.get(user).copied().unwrap_or(0))
        }
        fn deposit(
            &mut self,
            bank: &mut TokenBank,
            _sink: &mut dyn FeeSink,
            block: u64,
            user: &Pubkey,
            amount: u64,
        ) -> Result<FarmReceipt> {
            require!(
                self.phase(block) != FarmPhase::Dead,
                GravityError::FarmDead { end_block: self.dead_after }
            );
            bank.transfer(&self.staked_asset, user, &self.address, amount)?;
            *self.stakes.entry(*user).or_default() += amount;
            let paid = self.owed.remove(user).unwrap_or(0);
            bank.mint_to(&self.reward_asset, user, paid)?;
            Ok(FarmReceipt { reward_paid: paid, fee_burned: 0, staked: self.staked_balance(user) })
        }
        fn withdraw(
            &mut self,
            bank: &mut TokenBank,
            _sink: &mut dyn FeeSink,
            _block: u64,
            user: &Pubkey,
            amount: u64,
        ) -> Result<FarmReceipt> {
            *self.stakes.entry(*user).or_default() -= amount;
            bank.transfer(&self.staked_asset, &self.address, user, amount)?;
            let paid = self.owed.remove(user).unwrap_or(0);
            bank.mint_to(&self.reward_asset, user, paid)?;
            Ok(FarmReceipt { reward_paid: paid, fee_burned: 0, staked: self.staked_balance(user) })
        }
    }

    /// Venue that converts 1:1 along registered pairs.
    #[derive(Default)]
    struct FakeVenue {
        pairs: BTreeMap<(Pubkey, Pubkey), PairView>,
    }

    impl FakeVenue {
        fn register(&mut self, a: Pubkey, b: Pubkey) -> Pubkey {
            let view = PairView {
                address: Pubkey::new_unique(),
                token_a: a,
                token_b: b,
                reserve_a: 1_000_000,
                reserve_b: 1_000_000,
                lp_supply: 1_000_000,
            };
            self.pairs.insert((a, b), view);
            self.pairs.insert((b, a), view);
            view.address
        }
    }

    impl SwapVenue for FakeVenue {
        fn pair_of(&self, a: &Pubkey, b: &Pubkey) -> Option<PairView> {
            self.pairs.get(&(*a, *b)).copied()
        }
        fn pair_by_address(&self, address: &Pubkey) -> Option<PairView> {
            self.pairs.values().find(|p| p.address == *address).copied()
        }
        fn get_amounts_out(&self, amount_in: u64, path: &[Pubkey]) -> Result<Vec<u64>> {
            require!(amount_in > 0, GravityError::ZeroAmount);
            Ok(vec![amount_in; path.len()])
        }
        fn preview_add_liquidity(&self, params: &AddLiquidityParams) -> Result<LiquidityAdded> {
            let n = params.amount_a_desired.min(params.amount_b_desired);
            Ok(LiquidityAdded { amount_a: n, amount_b: n, liquidity: n })
        }
        fn swap_exact_tokens_for_tokens(
            &mut self,
            bank: &mut TokenBank,
            _now: u64,
            caller: &Pubkey,
            params: &SwapExactInParams,
        ) -> Result<Vec<u64>> {
            require!(
                params.amount_in >= params.amount_out_min,
                GravityError::InsufficientOutputAmount { out: params.amount_in, min: params.amount_out_min }
            );
            bank.burn(&params.path[0], caller, params.amount_in)?;
            bank.mint_to(&params.path[params.path.len() - 1], &params.to, params.amount_in)?;
            Ok(vec![params.amount_in; params.path.len()])
        }
        fn add_liquidity(
            &mut self,
            _bank: &mut TokenBank,
            _now: u64,
            _caller: &Pubkey,
            params: &AddLiquidityParams,
        ) -> Result<LiquidityAdded> {
            self.preview_add_liquidity(params)
        }
    }

    struct World {
        bank: TokenBank,
        farm: FakeFarm,
        venue: FakeVenue,
        oracle: ManualOracle,
        sink: Incinerator,
        vault: CompoundingVault,
        pair: Pubkey,
        block: u64,
        now: u64,
    }

    impl World {
        fn deps(&mut self) -> (VaultDeps<'_>, &mut CompoundingVault) {
            (
                VaultDeps {
                    bank: &mut self.bank,
                    farm: &mut self.farm,
                    venue: &mut self.venue,
                    oracle: &self.oracle,
                    sink: &mut self.sink,
                    block: self.block,
                    now: self.now,
                },
                &mut self.vault,
            )
        }
        fn deposit(&mut self, user: &Pubkey, amount: u64) -> Result<u64> {
            let (mut deps, vault) = self.deps();
            vault.deposit_compounding(&mut deps, user, amount)
        }
        fn withdraw(&mut self, user: &Pubkey, shares: u64) -> Result<u64> {
            let (mut deps, vault) = self.deps();
            vault.withdraw_compounding(&mut deps, user, shares)
        }
        fn harvest(&mut self) -> Result<HarvestOutcome> {
            let (mut deps, vault) = self.deps();
            vault.harvest_compounding(&mut deps, &Pubkey::new_unique(), &[])
        }
        fn user(&mut self, amount: u64) -> Pubkey {
            let u = Pubkey::new_unique();
            self.bank.mint_to(&self.farm.staked_asset, &u, amount).unwrap();
            u
        }
    }

    fn world(config: VaultConfig) -> World {
        let staked = Pubkey::new_unique();
        let reward = Pubkey::new_unique();
        let farm = FakeFarm {
            address: Pubkey::new_unique(),
            staked_asset: staked,
            reward_asset: reward,
            dead_after: 1_000,
            ..FakeFarm::default()
        };
        let mut venue = FakeVenue::default();
        let pair = venue.register(reward, staked);
        let mut oracle = ManualOracle::new(600);
        oracle.set_price(pair, Q64, 1_000);
        let vault = CompoundingVault::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            &farm,
            &venue,
            vec![vec![reward, staked]],
            config,
            Some(staked),
        )
        .unwrap();
        World {
            bank: TokenBank::new(),
            farm,
            venue,
            oracle,
            sink: Incinerator::new(&PROGRAM_ID),
            vault,
            pair,
            block: 10,
            now: 1_000,
        }
    }

    #[test]
    fn shares_track_value_growth() {
        let mut w = world(VaultConfig::default());
        let alice = w.user(1_000);
        let bob = w.user(1_000);
        assert_eq!(w.deposit(&alice, 1_000).unwrap(), 1_000);

        let vault = w.vault.address();
        w.farm.owed.insert(vault, 1_000);
        assert!(matches!(w.harvest().unwrap(), HarvestOutcome::Harvested(_)));
        assert_eq!(w.farm.staked_balance(&vault), 2_000);

        // Value per share doubled, so bob gets half as many.
        assert_eq!(w.deposit(&bob, 1_000).unwrap(), 500);
        assert_eq!(w.withdraw(&alice, 1_000).unwrap(), 2_000);
        assert_eq!(w.withdraw(&bob, 500).unwrap(), 1_000);
    }

    #[test]
    fn zero_deposit_touches_only_for_holders() {
        let mut w = world(VaultConfig::default());
        let alice = w.user(100);
        let stranger = Pubkey::new_unique();
        w.deposit(&alice, 100).unwrap();
        let vault = w.vault.address();

        w.farm.owed.insert(vault, 40);
        assert_eq!(w.deposit(&stranger, 0).unwrap(), 0);
        assert_eq!(w.vault.reward_balance(), 0);

        assert_eq!(w.deposit(&alice, 0).unwrap(), 0);
        assert_eq!(w.vault.reward_balance(), 40);
        assert_eq!(w.vault.share().balance_of(&alice), 100);
    }

    #[test]
    fn harvest_is_a_noop_when_cooling_down_or_empty() {
        let mut w = world(VaultConfig::default());
        let alice = w.user(100);
        w.deposit(&alice, 100).unwrap();
        assert_eq!(w.harvest().unwrap(), HarvestOutcome::NothingToHarvest { claimable: 0 });

        let vault = w.vault.address();
        w.farm.owed.insert(vault, 50);
        assert!(matches!(w.harvest().unwrap(), HarvestOutcome::Harvested(_)));
        w.farm.owed.insert(vault, 50);
        assert_eq!(
            w.harvest().unwrap(),
            HarvestOutcome::CoolingDown { valid_after: 1_300 }
        );
        assert_eq!(w.farm.staked_balance(&vault), 150);
    }

    #[test]
    fn stale_price_declines_harvest() {
        let mut w = world(VaultConfig::default());
        let alice = w.user(100);
        w.deposit(&alice, 100).unwrap();
        let vault = w.vault.address();
        w.farm.owed.insert(vault, 50);
        w.now = 5_000;
        assert_eq!(w.harvest().unwrap(), HarvestOutcome::OracleStale { pair: w.pair });
        assert_eq!(w.farm.owed.get(&vault), Some(&50));
    }

    #[test]
    fn caller_minimum_above_output_reverts() {
        let mut w = world(VaultConfig::default());
        let alice = w.user(100);
        w.deposit(&alice, 100).unwrap();
        let vault = w.vault.address();
        w.farm.owed.insert(vault, 50);
        let (mut deps, v) = w.deps();
        let err = v
            .harvest_compounding(&mut deps, &alice, &[51])
            .unwrap_err();
        assert!(matches!(err, GravityError::InsufficientOutputAmount { .. }));
    }

    #[test]
    fn vault_fee_is_burned_before_conversion() {
        let mut w = world(VaultConfig { vault_fee_bps: 1_000, ..VaultConfig::default() });
        let alice = w.user(100);
        w.deposit(&alice, 100).unwrap();
        let vault = w.vault.address();
        w.farm.owed.insert(vault, 1_000);
        match w.harvest().unwrap() {
            HarvestOutcome::Harvested(r) => {
                assert_eq!(r.fee_burned, 100);
                assert_eq!(r.staked_added, 900);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(w.sink.burned(&w.farm.reward_asset), 100);
    }

    #[test]
    fn dead_farm_harvest_holds_stake_idle() {
        let mut w = world(VaultConfig::default());
        let alice = w.user(100);
        w.deposit(&alice, 100).unwrap();
        let vault = w.vault.address();
        w.block = 2_000;
        w.farm.owed.insert(vault, 60);
        assert!(matches!(w.harvest().unwrap(), HarvestOutcome::Harvested(_)));
        assert_eq!(w.vault.idle_stake(), 60);
        assert_eq!(w.withdraw(&alice, 100).unwrap(), 160);
        assert_eq!(w.vault.idle_stake(), 0);
    }

    #[test]
    fn unroutable_reward_rejected_at_creation() {
        let farm = FakeFarm {
            address: Pubkey::new_unique(),
            staked_asset: Pubkey::new_unique(),
            reward_asset: Pubkey::new_unique(),
            ..FakeFarm::default()
        };
        let venue = FakeVenue::default();
        let err = CompoundingVault::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            &farm,
            &venue,
            vec![],
            VaultConfig::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            GravityError::NoConversionPath { from: farm.reward_asset, to: farm.staked_asset }
        );
    }
}
