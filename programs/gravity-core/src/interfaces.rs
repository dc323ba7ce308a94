//! Seams between components. The vault only sees farms, venues, oracles and
//! fee sinks through these traits, so each can be swapped for a fake.

use solana_sdk::pubkey::Pubkey;

use crate::{
    exchange::Exchange,
    farm::{FarmPhase, FarmReceipt},
    token::TokenBank,
    types::{AddLiquidityParams, LiquidityAdded, SwapExactInParams},
    Result,
};

/// Per-block reward ledger a vault can stake into.
pub trait StakingFarm {
    fn address(&self) -> Pubkey;
    fn staked_asset(&self) -> Pubkey;
    fn reward_asset(&self) -> Pubkey;
    fn end_block(&self) -> u64;
    fn phase(&self, block: u64) -> FarmPhase;
    fn staked_balance(&self, user: &Pubkey) -> u64;
    /// Gross reward `user` could claim at `block`.
    fn pending_reward(&self, user: &Pubkey, block: u64) -> Result<u64>;
    fn deposit(
        &mut self,
        bank: &mut TokenBank,
        sink: &mut dyn FeeSink,
        block: u64,
        user: &Pubkey,
        amount: u64,
    ) -> Result<FarmReceipt>;
    fn withdraw(
        &mut self,
        bank: &mut TokenBank,
        sink: &mut dyn FeeSink,
        block: u64,
        user: &Pubkey,
        amount: u64,
    ) -> Result<FarmReceipt>;
}

/// Reserves snapshot of one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairView {
    pub address: Pubkey,
    pub token_a: Pubkey,
    pub token_b: Pubkey,
    pub reserve_a: u64,
    pub reserve_b: u64,
    pub lp_supply: u64,
}

impl PairView {
    pub fn reserve_of(&self, token: &Pubkey) -> Option<u64> {
        if *token == self.token_a {
            Some(self.reserve_a)
        } else if *token == self.token_b {
            Some(self.reserve_b)
        } else {
            None
        }
    }
}

/// Where a vault converts rewards and mints LP.
pub trait SwapVenue {
    fn pair_of(&self, a: &Pubkey, b: &Pubkey) -> Option<PairView>;
    fn pair_by_address(&self, address: &Pubkey) -> Option<PairView>;
    fn get_amounts_out(&self, amount_in: u64, path: &[Pubkey]) -> Result<Vec<u64>>;
    fn preview_add_liquidity(&self, params: &AddLiquidityParams) -> Result<LiquidityAdded>;
    fn swap_exact_tokens_for_tokens(
        &mut self,
        bank: &mut TokenBank,
        now: u64,
        caller: &Pubkey,
        params: &SwapExactInParams,
    ) -> Result<Vec<u64>>;
    fn add_liquidity(
        &mut self,
        bank: &mut TokenBank,
        now: u64,
        caller: &Pubkey,
        params: &AddLiquidityParams,
    ) -> Result<LiquidityAdded>;
}

/// Black-box price feed.
pub trait PriceOracle {
    /// Q64.64 price of the pair's `token_a` in `token_b`.
    fn get_price(&self, pair: &Pubkey) -> Result<u128>;
    fn is_stale(&self, pair: &Pubkey, now: u64) -> bool;
}

/// Destination for protocol fees.
pub trait FeeSink {
    fn address(&self) -> Pubkey;
    /// Pull `amount` of `asset` from `from` and destroy it.
    fn receive_and_burn(
        &mut self,
        bank: &mut TokenBank,
        asset: &Pubkey,
        from: &Pubkey,
        amount: u64,
    ) -> Result<()>;
}

fn view(p: &crate::pair::Pair) -> PairView {
    PairView {
        address: p.address,
        token_a: p.token_a,
        token_b: p.token_b,
        reserve_a: p.reserve_a,
        reserve_b: p.reserve_b,
        lp_supply: p.lp_supply,
    }
}

impl SwapVenue for Exchange {
    fn pair_of(&self, a: &Pubkey, b: &Pubkey) -> Option<PairView> {
        self.pair_for(a, b).map(view)
    }

    fn pair_by_address(&self, address: &Pubkey) -> Option<PairView> {
        self.pair(address).map(view)
    }

    fn get_amounts_out(&self, amount_in: u64, path: &[Pubkey]) -> Result<Vec<u64>> {
        Exchange::get_amounts_out(self, amount_in, path)
    }

    fn preview_add_liquidity(&self, params: &AddLiquidityParams) -> Result<LiquidityAdded> {
        Exchange::preview_add_liquidity(self, params)
    }

    fn swap_exact_tokens_for_tokens(
        &mut self,
        bank: &mut TokenBank,
        now: u64,
        caller: &Pubkey,
        params: &SwapExactInParams,
    ) -> Result<Vec<u64>> {
        Exchange::swap_exact_tokens_for_tokens(self, bank, now, caller, params)
    }

    fn add_liquidity(
        &mut self,
        bank: &mut TokenBank,
        now: u64,
        caller: &Pubkey,
        params: &AddLiquidityParams,
    ) -> Result<LiquidityAdded> {
        Exchange::add_liquidity(self, bank, now, caller, params)
    }
}
