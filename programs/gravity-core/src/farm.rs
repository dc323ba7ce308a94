//! Per-pool reward ledger (MasterChef style).
//!
//! `acc_reward_per_share` is Q64.64 reward per staked unit and only ever
//! grows. A user's claimable reward is
//! `amount * acc >> 64 - reward_debt`, and `reward_debt` is reset to
//! `amount * acc >> 64` whenever the stake changes.

use std::collections::BTreeMap;

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::{
    constants::*,
    error::GravityError,
    interfaces::{FeeSink, StakingFarm},
    math::{self, div_q64, mul_q64},
    require,
    token::TokenBank,
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FarmPhase {
    /// Before `start_block`: deposits accepted, nothing accrues
    Pending,
    /// `start_block..=end_block`
    Active,
    /// After `end_block`: deposits refused, withdrawals allowed
    Dead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmParams {
    pub staked_asset: Pubkey,
    pub reward_asset: Pubkey,
    /// Reward tokens the creator funds the farm with
    pub reward_budget: u64,
    pub reward_per_block: u64,
    pub start_block: u64,
    pub end_block: u64,
    /// Blocks before this earn `bonus` times the base rate
    pub bonus_end_block: u64,
    pub bonus: u64,
}

impl FarmParams {
    pub fn new(
        staked_asset: Pubkey,
        reward_asset: Pubkey,
        reward_budget: u64,
        reward_per_block: u64,
        start_block: u64,
        end_block: u64,
    ) -> Self {
        Self {
            staked_asset,
            reward_asset,
            reward_budget,
            reward_per_block,
            start_block,
            end_block,
            bonus_end_block: start_block,
            bonus: 1,
        }
    }

    pub fn with_bonus(mut self, bonus_end_block: u64, bonus: u64) -> Self {
        self.bonus_end_block = bonus_end_block;
        self.bonus = bonus;
        self
    }

    /// Reward-weighted block count in `[from, to)`, clamped to
    /// `[start_block, end_block)`.
    pub fn multiplier(&self, from: u64, to: u64) -> u128 {
        let from = from.max(self.start_block);
        let to = to.min(self.end_block);
        if to <= from {
            return 0;
        }
        let bonus = self.bonus as u128;
        if to <= self.bonus_end_block {
            (to - from) as u128 * bonus
        } else if from >= self.bonus_end_block {
            (to - from) as u128
        } else {
            (self.bonus_end_block - from) as u128 * bonus + (to - self.bonus_end_block) as u128
        }
    }

    /// Reward the whole window pays out: the budget that funds it exactly.
    pub fn full_budget(&self) -> Result<u64> {
        let total = self
            .multiplier(self.start_block, self.end_block)
            .checked_mul(self.reward_per_block as u128)
            .ok_or(GravityError::MathOverflow)?;
        math::to_u64(total)
    }

    pub fn validate(&self) -> Result<()> {
        require!(
            self.start_block < self.end_block,
            GravityError::InvalidArgument(format!(
                "start_block {} must precede end_block {}",
                self.start_block, self.end_block
            ))
        );
        require!(
            self.reward_per_block > 0,
            GravityError::InvalidArgument("reward_per_block must be > 0".into())
        );
        require!(
            self.bonus >= 1,
            GravityError::InvalidArgument("bonus multiplier must be >= 1".into())
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStake {
    pub amount: u64,
    pub reward_debt: u128,
}

/// Outcome of a deposit or withdraw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FarmReceipt {
    /// Reward delivered to the user, net of the harvest fee
    pub reward_paid: u64,
    pub fee_burned: u64,
    /// User's stake after the call
    pub staked: u64,
}

/// PDA for the `index`-th farm over `(staked, reward)`.
pub fn derive_farm_address(
    program_id: &Pubkey,
    staked: &Pubkey,
    reward: &Pubkey,
    index: u64,
) -> Pubkey {
    Pubkey::find_program_address(
        &[FARM_SEED, staked.as_ref(), reward.as_ref(), &index.to_le_bytes()],
        program_id,
    )
    .0
}

#[derive(Debug, Clone)]
pub struct RewardFarm {
    address: Pubkey,
    index: u64,
    params: FarmParams,
    harvest_fee_bps: u16,
    acc_reward_per_share: u128,
    last_reward_block: u64,
    total_staked: u64,
    reward_remaining: u64,
    users: BTreeMap<Pubkey, UserStake>,
}

impl RewardFarm {
    /// A farm whose reward budget has already been moved to `address`.
    pub fn new(
        address: Pubkey,
        index: u64,
        params: FarmParams,
        harvest_fee_bps: u16,
        block: u64,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            address,
            index,
            last_reward_block: block.max(params.start_block),
            reward_remaining: params.reward_budget,
            params,
            harvest_fee_bps,
            acc_reward_per_share: 0,
            total_staked: 0,
            users: BTreeMap::new(),
        })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn params(&self) -> &FarmParams {
        &self.params
    }

    pub fn acc_reward_per_share(&self) -> u128 {
        self.acc_reward_per_share
    }

    pub fn last_reward_block(&self) -> u64 {
        self.last_reward_block
    }

    pub fn total_staked(&self) -> u64 {
        self.total_staked
    }

    pub fn reward_remaining(&self) -> u64 {
        self.reward_remaining
    }

    pub fn user(&self, user: &Pubkey) -> UserStake {
        self.users.get(user).copied().unwrap_or_default()
    }

    /// Reward-weighted block count in `[from, to)`, clamped to the farm
    /// window.
    pub fn get_multiplier(&self, from: u64, to: u64) -> u128 {
        self.params.multiplier(from, to)
    }

    /// Accumulator as it would stand after `update_pool(block)`.
    fn projected_acc(&self, block: u64) -> Result<u128> {
        if block <= self.last_reward_block || self.total_staked == 0 {
            return Ok(self.acc_reward_per_share);
        }
        let reward = self
            .get_multiplier(self.last_reward_block, block)
            .checked_mul(self.params.reward_per_block as u128)
            .ok_or(GravityError::MathOverflow)?;
        self.acc_reward_per_share
            .checked_add(div_q64(reward, self.total_staked)?)
            .ok_or(GravityError::MathOverflow)
    }

    pub fn update_pool(&mut self, block: u64) -> Result<()> {
        if block <= self.last_reward_block {
            return Ok(());
        }
        self.acc_reward_per_share = self.projected_acc(block)?;
        self.last_reward_block = block;
        Ok(())
    }

    fn owed(stake: &UserStake, acc: u128) -> Result<u64> {
        math::to_u64(mul_q64(stake.amount, acc)?.saturating_sub(stake.reward_debt))
    }

    fn set_stake(&mut self, user: &Pubkey, amount: u64) -> Result<()> {
        if amount == 0 {
            self.users.remove(user);
        } else {
            let reward_debt = mul_q64(amount, self.acc_reward_per_share)?;
            self.users.insert(*user, UserStake { amount, reward_debt });
        }
        Ok(())
    }

    /// Pay `pending` (capped by the remaining budget), minus the harvest
    /// fee which goes to `sink`.
    fn pay_reward(
        &mut self,
        bank: &mut TokenBank,
        sink: &mut dyn FeeSink,
        user: &Pubkey,
        pending: u64,
    ) -> Result<(u64, u64)> {
        let payout = pending.min(self.reward_remaining);
        if payout < pending {
            warn!(farm = %self.address, pending, payout, "reward budget exhausted");
        }
        if payout == 0 {
            return Ok((0, 0));
        }
        self.reward_remaining -= payout;
        let fee = math::to_u64(
            payout as u128 * self.harvest_fee_bps as u128 / BPS_DENOMINATOR,
        )?;
        let net = payout - fee;
        bank.transfer(&self.params.reward_asset, &self.address, user, net)?;
        sink.receive_and_burn(bank, &self.params.reward_asset, &self.address, fee)?;
        Ok((net, fee))
    }

    /// Return principal only; pending reward is forfeited. Idempotent.
    pub fn emergency_withdraw(&mut self, bank: &mut TokenBank, user: &Pubkey) -> Result<u64> {
        let Some(stake) = self.users.remove(user) else {
            return Ok(0);
        };
        self.total_staked -= stake.amount;
        bank.transfer(&self.params.staked_asset, &self.address, user, stake.amount)?;
        warn!(farm = %self.address, %user, amount = stake.amount, "emergency withdraw");
        Ok(stake.amount)
    }
}

impl StakingFarm for RewardFarm {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn staked_asset(&self) -> Pubkey {
        self.params.staked_asset
    }

    fn reward_asset(&self) -> Pubkey {
        self.params.reward_asset
    }

    fn end_block(&self) -> u64 {
        self.params.end_block
    }

    fn phase(&self, block: u64) -> FarmPhase {
        if block < self.params.start_block {
            FarmPhase::Pending
        } else if block <= self.params.end_block {
            FarmPhase::Active
        } else {
            FarmPhase::Dead
        }
    }

    fn staked_balance(&self, user: &Pubkey) -> u64 {
        self.user(user).amount
    }

    fn pending_reward(&self, user: &Pubkey, block: u64) -> Result<u64> {
        Self::owed(&self.user(user), self.projected_acc(block)?)
    }

    /// Accrue, pay pending reward, add `amount` to the stake. A zero amount
    /// is a pure harvest.
    fn deposit(
        &mut self,
        bank: &mut TokenBank,
        sink: &mut dyn FeeSink,
        block: u64,
        user: &Pubkey,
        amount: u64,
    ) -> Result<FarmReceipt> {
        require!(
            self.phase(block) != FarmPhase::Dead,
            GravityError::FarmDead { end_block: self.params.end_block }
        );
        bank.ensure_balance(&self.params.staked_asset, user, amount)?;

        self.update_pool(block)?;
        let stake = self.user(user);
        let pending = Self::owed(&stake, self.acc_reward_per_share)?;
        let staked = stake
            .amount
            .checked_add(amount)
            .ok_or(GravityError::MathOverflow)?;
        self.total_staked = self
            .total_staked
            .checked_add(amount)
            .ok_or(GravityError::MathOverflow)?;
        self.set_stake(user, staked)?;

        bank.transfer(&self.params.staked_asset, user, &self.address, amount)?;
        let (reward_paid, fee_burned) = self.pay_reward(bank, sink, user, pending)?;

        debug!(farm = %self.address, %user, amount, reward_paid, fee_burned, block, "farm deposit");
        Ok(FarmReceipt { reward_paid, fee_burned, staked })
    }

    fn withdraw(
        &mut self,
        bank: &mut TokenBank,
        sink: &mut dyn FeeSink,
        block: u64,
        user: &Pubkey,
        amount: u64,
    ) -> Result<FarmReceipt> {
        let stake = self.user(user);
        require!(
            amount <= stake.amount,
            GravityError::WithdrawExceedsStake { requested: amount, staked: stake.amount }
        );

        self.update_pool(block)?;
        let pending = Self::owed(&stake, self.acc_reward_per_share)?;
        let staked = stake.amount - amount;
        self.total_staked -= amount;
        self.set_stake(user, staked)?;

        bank.transfer(&self.params.staked_asset, &self.address, user, amount)?;
        let (reward_paid, fee_burned) = self.pay_reward(bank, sink, user, pending)?;

        debug!(farm = %self.address, %user, amount, reward_paid, fee_burned, block, "farm withdraw");
        Ok(FarmReceipt { reward_paid, fee_burned, staked })
    }
}
