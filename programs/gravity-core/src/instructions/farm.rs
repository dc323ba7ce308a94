use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::{
    error::GravityError,
    farm::{derive_farm_address, FarmParams, FarmReceipt, RewardFarm},
    interfaces::{PriceOracle, StakingFarm},
    protocol::{Ledger, Protocol},
    require,
    Result,
};

impl<O: PriceOracle> Protocol<O> {
    /// Create and fund a farm over `(staked_asset, reward_asset)`.
    ///
    /// The full `reward_budget` moves from `creator` to the farm. Farms over
    /// the same asset pair get sequence indices 1, 2, ... and distinct
    /// addresses.
    pub fn create_farm(&mut self, creator: &Pubkey, params: FarmParams) -> Result<Pubkey> {
        self.transact("create_farm", |ledger, tx| {
            require!(
                tx.policy
                    .allows(creator, &params.staked_asset, &params.reward_asset),
                GravityError::Unauthorized
            );
            params.validate()?;

            let key = (params.staked_asset, params.reward_asset);
            let index = ledger.farm_index.get(&key).copied().unwrap_or(0) + 1;
            let address = derive_farm_address(&tx.program_id, &key.0, &key.1, index);
            require!(
                !ledger.farms.contains_key(&address),
                GravityError::AlreadyExists { kind: "farm", address }
            );

            ledger
                .bank
                .transfer(&params.reward_asset, creator, &address, params.reward_budget)?;
            let farm = RewardFarm::new(
                address,
                index,
                params,
                tx.config.farm.harvest_fee_bps,
                tx.env.block,
            )?;
            info!(
                farm = %address,
                index,
                staked = %key.0,
                reward = %key.1,
                budget = farm.reward_remaining(),
                "farm created"
            );
            ledger.farm_index.insert(key, index);
            ledger.farms.insert(address, farm);
            Ok(address)
        })
    }

    pub fn farm_deposit(&mut self, caller: &Pubkey, farm: &Pubkey, amount: u64) -> Result<FarmReceipt> {
        self.transact("farm_deposit", |ledger, tx| {
            let Ledger { bank, farms, incinerator, .. } = ledger;
            let pool = farms
                .get_mut(farm)
                .ok_or(GravityError::NotFound { kind: "farm", address: *farm })?;
            pool.deposit(bank, incinerator, tx.env.block, caller, amount)
        })
    }

    pub fn farm_withdraw(&mut self, caller: &Pubkey, farm: &Pubkey, amount: u64) -> Result<FarmReceipt> {
        self.transact("farm_withdraw", |ledger, tx| {
            let Ledger { bank, farms, incinerator, .. } = ledger;
            let pool = farms
                .get_mut(farm)
                .ok_or(GravityError::NotFound { kind: "farm", address: *farm })?;
            pool.withdraw(bank, incinerator, tx.env.block, caller, amount)
        })
    }

    /// Return principal, forfeiting pending reward.
    pub fn emergency_withdraw(&mut self, caller: &Pubkey, farm: &Pubkey) -> Result<u64> {
        self.transact("emergency_withdraw", |ledger, _| {
            let Ledger { bank, farms, .. } = ledger;
            let pool = farms
                .get_mut(farm)
                .ok_or(GravityError::NotFound { kind: "farm", address: *farm })?;
            pool.emergency_withdraw(bank, caller)
        })
    }

    /// Gross reward `user` could claim at the current block.
    pub fn pending_reward(&self, farm: &Pubkey, user: &Pubkey) -> Result<u64> {
        self.ledger().farm(farm)?.pending_reward(user, self.env().block)
    }

    pub fn staked_balance(&self, farm: &Pubkey, user: &Pubkey) -> Result<u64> {
        Ok(self.ledger().farm(farm)?.staked_balance(user))
    }

    /// Addresses of every farm over `(staked, reward)`, oldest first.
    pub fn farms_for(&self, staked: &Pubkey, reward: &Pubkey) -> Vec<Pubkey> {
        let last = self
            .ledger()
            .farm_index
            .get(&(*staked, *reward))
            .copied()
            .unwrap_or(0);
        (1..=last)
            .map(|index| derive_farm_address(self.program_id(), staked, reward, index))
            .collect()
    }
}
