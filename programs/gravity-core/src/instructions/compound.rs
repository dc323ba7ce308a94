use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::{
    config::VaultConfig,
    error::GravityError,
    interfaces::PriceOracle,
    math,
    protocol::Protocol,
    require,
    share::derive_share_mint,
    vault::{derive_vault_address, CompoundingVault, HarvestOutcome},
    Result,
};

impl<O: PriceOracle> Protocol<O> {
    /// Create the compounding vault over `farm` with the configured defaults.
    ///
    /// `routes[i]` converts the reward asset into the i-th target asset: the
    /// staked asset for single-asset farms, `token_a` then `token_b` of the
    /// pair for LP farms. An empty route means the reward asset is the target.
    pub fn create_vault(&mut self, creator: &Pubkey, farm: &Pubkey, routes: Vec<Vec<Pubkey>>) -> Result<Pubkey> {
        let config = self.config().vault.clone();
        self.create_vault_with_config(creator, farm, routes, config)
    }

    pub fn create_vault_with_config(
        &mut self,
        creator: &Pubkey,
        farm: &Pubkey,
        routes: Vec<Vec<Pubkey>>,
        config: VaultConfig,
    ) -> Result<Pubkey> {
        self.transact("create_vault", |ledger, tx| {
            let pool = ledger.farm(farm)?;
            require!(
                tx.policy.allows(creator, &pool.params().staked_asset, &pool.params().reward_asset),
                GravityError::Unauthorized
            );
            let address = derive_vault_address(&tx.program_id, farm);
            require!(
                !ledger.vault_by_farm.contains_key(farm),
                GravityError::AlreadyExists { kind: "vault", address }
            );

            let share_mint = derive_share_mint(&tx.program_id, &address);
            let vault = CompoundingVault::new(
                address,
                share_mint,
                pool,
                &ledger.exchange,
                routes,
                config,
                tx.config.governance_token,
            )?;
            info!(vault = %address, farm = %farm, kind = ?vault.kind(), "vault created");
            ledger.vault_by_farm.insert(*farm, address);
            ledger.vaults.insert(address, vault);
            Ok(address)
        })
    }

    /// Stake `amount` through the vault over `farm`; returns shares minted.
    pub fn deposit_compounding(&mut self, caller: &Pubkey, farm: &Pubkey, amount: u64) -> Result<u64> {
        self.transact("deposit_compounding", |ledger, tx| {
            ledger.with_vault(farm, &tx, |vault, deps| {
                vault.deposit_compounding(deps, caller, amount)
            })
        })
    }

    /// Burn `shares`; returns the staked units paid out.
    pub fn withdraw_compounding(&mut self, caller: &Pubkey, farm: &Pubkey, shares: u64) -> Result<u64> {
        self.transact("withdraw_compounding", |ledger, tx| {
            ledger.with_vault(farm, &tx, |vault, deps| {
                vault.withdraw_compounding(deps, caller, shares)
            })
        })
    }

    pub fn harvest_compounding(
        &mut self,
        caller: &Pubkey,
        farm: &Pubkey,
        min_amounts_out: &[u64],
    ) -> Result<HarvestOutcome> {
        self.transact("harvest_compounding", |ledger, tx| {
            ledger.with_vault(farm, &tx, |vault, deps| {
                vault.harvest_compounding(deps, caller, min_amounts_out)
            })
        })
    }

    /// Reward the vault over `farm` has claimed and not yet converted.
    pub fn reward_balance(&self, farm: &Pubkey) -> Result<u64> {
        Ok(self.ledger().vault_for(farm)?.reward_balance())
    }

    pub fn vault_for(&self, farm: &Pubkey) -> Result<&CompoundingVault> {
        self.ledger().vault_for(farm)
    }

    /// Staked units one share currently redeems for, scaled by `scale`.
    pub fn share_price(&self, farm: &Pubkey, scale: u64) -> Result<u64> {
        let ledger = self.ledger();
        let vault = ledger.vault_for(farm)?;
        let supply = vault.share().total_supply();
        if supply == 0 {
            return Ok(scale);
        }
        let value = vault.total_value(ledger.farm(farm)?);
        math::mul_div_u64(scale, value, supply)
    }
}
