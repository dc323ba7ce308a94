//! Multi-hop swaps and ratio-preserving liquidity helpers.
//!
//! Thin over `Pair`: every amount is computed up front against current
//! reserves, all guards run before the first transfer, then hops execute in
//! order.

use std::collections::BTreeSet;

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::{
    error::GravityError,
    exchange::Exchange,
    math,
    require,
    token::TokenBank,
    types::{AddLiquidityParams, LiquidityAdded, RemoveLiquidityParams, SwapExactInParams},
    Result,
};

fn ensure_deadline(deadline: u64, now: u64) -> Result<()> {
    require!(now <= deadline, GravityError::Expired { deadline, now });
    Ok(())
}

impl Exchange {
    /// Equivalent amount of `token_b` for `amount_a` of `token_a`.
    pub fn quote(&self, amount_a: u64, token_a: &Pubkey, token_b: &Pubkey) -> Result<u64> {
        let (ra, rb) = self.require_pair(token_a, token_b)?.reserves_for(token_a)?;
        math::quote(amount_a, ra, rb)
    }

    /// Output of every hop along `path` for `amount_in` at current reserves.
    ///
    /// A path may not visit the same pair twice.
    pub fn get_amounts_out(&self, amount_in: u64, path: &[Pubkey]) -> Result<Vec<u64>> {
        require!(path.len() >= 2, GravityError::InvalidPath);
        let mut seen = BTreeSet::new();
        let mut amounts = Vec::with_capacity(path.len());
        amounts.push(amount_in);
        let mut current = amount_in;
        for hop in path.windows(2) {
            let pair = self.require_pair(&hop[0], &hop[1])?;
            require!(seen.insert(pair.address), GravityError::InvalidPath);
            let (r_in, r_out) = pair.reserves_for(&hop[0])?;
            current = math::get_amount_out(current, r_in, r_out, self.config.swap_fee_bps)?;
            amounts.push(current);
        }
        Ok(amounts)
    }

    pub fn swap_exact_tokens_for_tokens(
        &mut self,
        bank: &mut TokenBank,
        now: u64,
        caller: &Pubkey,
        params: &SwapExactInParams,
    ) -> Result<Vec<u64>> {
        ensure_deadline(params.deadline, now)?;
        let amounts = self.get_amounts_out(params.amount_in, &params.path)?;
        let out = amounts.last().copied().ok_or(GravityError::InvalidPath)?;
        require!(
            out >= params.amount_out_min,
            GravityError::InsufficientOutputAmount { out, min: params.amount_out_min }
        );
        for hop in params.path.windows(2) {
            self.require_pair(&hop[0], &hop[1])?
                .ensure_tradable(&self.config)?;
        }
        bank.ensure_balance(&params.path[0], caller, params.amount_in)?;

        let router = self.router_address();
        let hops = params.path.len() - 1;
        for (i, hop) in params.path.windows(2).enumerate() {
            let payer = if i == 0 { *caller } else { router };
            let to = if i + 1 == hops { params.to } else { router };
            let (amount_in, amount_out) = (amounts[i], amounts[i + 1]);
            self.with_pair(bank, now, &hop[0], &hop[1], |pair, env| {
                pair.swap(env, &payer, &hop[0], amount_in, amount_out, &to)
            })?;
        }

        debug!(%caller, amount_in = params.amount_in, out, hops, "routed swap");
        Ok(amounts)
    }

    /// Amounts `add_liquidity` would deposit and the LP it would mint.
    pub fn preview_add_liquidity(&self, params: &AddLiquidityParams) -> Result<LiquidityAdded> {
        let pair = self.require_pair(&params.token_a, &params.token_b)?;
        let (ra, rb) = pair.reserves_for(&params.token_a)?;
        let (amount_a, amount_b) = if ra == 0 && rb == 0 {
            (params.amount_a_desired, params.amount_b_desired)
        } else {
            let b_optimal = math::quote(params.amount_a_desired, ra, rb)?;
            if b_optimal <= params.amount_b_desired {
                require!(
                    b_optimal >= params.amount_b_min,
                    GravityError::SlippageExceeded { out: b_optimal, min: params.amount_b_min }
                );
                (params.amount_a_desired, b_optimal)
            } else {
                let a_optimal = math::quote(params.amount_b_desired, rb, ra)?;
                require!(
                    a_optimal <= params.amount_a_desired && a_optimal >= params.amount_a_min,
                    GravityError::SlippageExceeded { out: a_optimal, min: params.amount_a_min }
                );
                (a_optimal, params.amount_b_desired)
            }
        };
        let (x, y) = if pair.token_a == params.token_a {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        };
        let liquidity = pair.preview_mint(&self.config, x, y)?;
        Ok(LiquidityAdded { amount_a, amount_b, liquidity })
    }

    pub fn add_liquidity(
        &mut self,
        bank: &mut TokenBank,
        now: u64,
        caller: &Pubkey,
        params: &AddLiquidityParams,
    ) -> Result<LiquidityAdded> {
        ensure_deadline(params.deadline, now)?;
        let planned = self.preview_add_liquidity(params)?;
        require!(planned.liquidity > 0, GravityError::InsufficientLiquidityMinted);

        let token_a = params.token_a;
        let liquidity = self.with_pair(bank, now, &params.token_a, &params.token_b, |pair, env| {
            let (x, y) = if pair.token_a == token_a {
                (planned.amount_a, planned.amount_b)
            } else {
                (planned.amount_b, planned.amount_a)
            };
            pair.add_liquidity(env, caller, x, y, &params.to)
        })?;
        Ok(LiquidityAdded { liquidity, ..planned })
    }

    /// Burn LP and return `(amount_a, amount_b)` in the caller's token order.
    pub fn remove_liquidity(
        &mut self,
        bank: &mut TokenBank,
        now: u64,
        caller: &Pubkey,
        params: &RemoveLiquidityParams,
    ) -> Result<(u64, u64)> {
        ensure_deadline(params.deadline, now)?;
        let pair = self.require_pair(&params.token_a, &params.token_b)?;
        let flip = pair.token_a != params.token_a;
        let order = |(x, y): (u64, u64)| if flip { (y, x) } else { (x, y) };

        let (amount_a, amount_b) = order(pair.preview_burn(&self.config, params.liquidity)?);
        require!(
            amount_a >= params.amount_a_min,
            GravityError::SlippageExceeded { out: amount_a, min: params.amount_a_min }
        );
        require!(
            amount_b >= params.amount_b_min,
            GravityError::SlippageExceeded { out: amount_b, min: params.amount_b_min }
        );

        let out = self.with_pair(bank, now, &params.token_a, &params.token_b, |pair, env| {
            pair.remove_liquidity(env, caller, params.liquidity, &params.to)
        })?;
        Ok(order(out))
    }
}
