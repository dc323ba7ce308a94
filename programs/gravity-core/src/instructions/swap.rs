use solana_sdk::pubkey::Pubkey;

use crate::{interfaces::PriceOracle, protocol::Protocol, types::SwapExactInParams, Result};

impl<O: PriceOracle> Protocol<O> {
    /// Sell exactly `params.amount_in` along `params.path`; returns the amount
    /// out at every hop.
    pub fn swap_exact_tokens_for_tokens(
        &mut self,
        caller: &Pubkey,
        params: &SwapExactInParams,
    ) -> Result<Vec<u64>> {
        self.transact("swap_exact_tokens_for_tokens", |ledger, tx| {
            ledger
                .exchange
                .swap_exact_tokens_for_tokens(&mut ledger.bank, tx.env.timestamp, caller, params)
        })
    }

    pub fn get_amounts_out(&self, amount_in: u64, path: &[Pubkey]) -> Result<Vec<u64>> {
        self.ledger().exchange.get_amounts_out(amount_in, path)
    }

    pub fn quote(&self, amount_a: u64, token_a: &Pubkey, token_b: &Pubkey) -> Result<u64> {
        self.ledger().exchange.quote(amount_a, token_a, token_b)
    }
}
