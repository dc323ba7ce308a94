use solana_sdk::pubkey::Pubkey;

use crate::{
    interfaces::PriceOracle,
    protocol::Protocol,
    types::{AddLiquidityParams, LiquidityAdded, RemoveLiquidityParams},
    Result,
};

impl<O: PriceOracle> Protocol<O> {
    /// Register the pair for `a`/`b`; returns its address (also its LP mint).
    pub fn create_pair(&mut self, creator: &Pubkey, a: &Pubkey, b: &Pubkey) -> Result<Pubkey> {
        self.transact("create_pair", |ledger, tx| {
            ledger
                .exchange
                .create_pair(tx.policy, creator, a, b, tx.env.timestamp)
        })
    }

    pub fn add_liquidity(&mut self, caller: &Pubkey, params: &AddLiquidityParams) -> Result<LiquidityAdded> {
        self.transact("add_liquidity", |ledger, tx| {
            ledger
                .exchange
                .add_liquidity(&mut ledger.bank, tx.env.timestamp, caller, params)
        })
    }

    /// Burn LP; allowed even while the exchange or pair is paused.
    pub fn remove_liquidity(&mut self, caller: &Pubkey, params: &RemoveLiquidityParams) -> Result<(u64, u64)> {
        self.transact("remove_liquidity", |ledger, tx| {
            ledger
                .exchange
                .remove_liquidity(&mut ledger.bank, tx.env.timestamp, caller, params)
        })
    }

    pub fn set_paused(&mut self, paused: bool) -> Result<()> {
        self.transact("set_paused", |ledger, _| {
            ledger.exchange.set_paused(paused);
            Ok(())
        })
    }

    pub fn set_withdraw_only(&mut self, pair: &Pubkey, withdraw_only: bool) -> Result<()> {
        self.transact("set_withdraw_only", |ledger, _| {
            ledger.exchange.set_withdraw_only(pair, withdraw_only)
        })
    }

    /// Route the protocol share of fee growth to `fee_to`, or switch it off.
    pub fn set_fee_to(&mut self, fee_to: Option<Pubkey>) -> Result<()> {
        self.transact("set_fee_to", |ledger, _| {
            ledger.exchange.set_fee_to(fee_to);
            Ok(())
        })
    }

    /// Reserves of the `a`/`b` pair in the caller's order.
    pub fn get_reserves(&self, a: &Pubkey, b: &Pubkey) -> Result<(u64, u64)> {
        let pair = self.ledger().exchange.require_pair(a, b)?;
        pair.reserves_for(a)
    }
}
