//! Constant-product reserve pair.
//!
//! Every state-changing call refreshes the price accumulators first, then
//! settles the protocol fee (add/remove only), then moves tokens.

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::{
    constants::*,
    error::GravityError,
    exchange::ExchangeConfig,
    math::{self, isqrt},
    require,
    token::TokenBank,
    Result,
};

/// Mutable context a pair operation runs against.
pub struct PairEnv<'a> {
    pub bank: &'a mut TokenBank,
    pub config: &'a ExchangeConfig,
    pub now: u64,
}

#[derive(Debug, Clone)]
pub struct Pair {
    /// Pair address; doubles as the LP mint.
    pub address: Pubkey,
    pub token_a: Pubkey,
    pub token_b: Pubkey,
    pub reserve_a: u64,
    pub reserve_b: u64,
    pub lp_supply: u64,
    /// Q64.64 price of A in B, times seconds (wrapping)
    pub price_cumulative_a: u128,
    /// Q64.64 price of B in A, times seconds (wrapping)
    pub price_cumulative_b: u128,
    pub block_timestamp_last: u64,
    /// reserve_a * reserve_b after the last liquidity event, 0 while fees are off
    pub k_last: u128,
    /// Swaps and deposits refused; withdrawals still allowed
    pub withdraw_only: bool,
}

impl Pair {
    pub fn new(address: Pubkey, token_a: Pubkey, token_b: Pubkey, now: u64) -> Self {
        Self {
            address,
            token_a,
            token_b,
            reserve_a: 0,
            reserve_b: 0,
            lp_supply: 0,
            price_cumulative_a: 0,
            price_cumulative_b: 0,
            block_timestamp_last: now,
            k_last: 0,
            withdraw_only: false,
        }
    }

    pub fn lp_mint(&self) -> Pubkey {
        self.address
    }

    pub fn contains(&self, token: &Pubkey) -> bool {
        *token == self.token_a || *token == self.token_b
    }

    /// `(reserve_in, reserve_out)` for a swap selling `token_in`.
    pub fn reserves_for(&self, token_in: &Pubkey) -> Result<(u64, u64)> {
        if *token_in == self.token_a {
            Ok((self.reserve_a, self.reserve_b))
        } else if *token_in == self.token_b {
            Ok((self.reserve_b, self.reserve_a))
        } else {
            Err(GravityError::InvalidPath)
        }
    }

    pub fn other(&self, token: &Pubkey) -> Result<Pubkey> {
        if *token == self.token_a {
            Ok(self.token_b)
        } else if *token == self.token_b {
            Ok(self.token_a)
        } else {
            Err(GravityError::InvalidPath)
        }
    }

    /// Spot price of `base` quoted in the other asset, Q64.64.
    pub fn spot_price_q64(&self, base: &Pubkey) -> Result<u128> {
        let (r_base, r_quote) = self.reserves_for(base)?;
        math::spot_price_q64(r_base, r_quote).ok_or(GravityError::InsufficientLiquidity)
    }

    pub fn ensure_tradable(&self, config: &ExchangeConfig) -> Result<()> {
        require!(!config.paused && !self.withdraw_only, GravityError::Paused);
        Ok(())
    }

    /// Reserves of both assets redeemable for `liquidity` LP units.
    pub fn lp_claim(&self, liquidity: u64) -> Result<(u64, u64)> {
        if self.lp_supply == 0 {
            return Ok((0, 0));
        }
        Ok((
            math::mul_div_u64(liquidity, self.reserve_a, self.lp_supply)?,
            math::mul_div_u64(liquidity, self.reserve_b, self.lp_supply)?,
        ))
    }

    // ─── Price accumulators ─────────────────────────────────────────────────

    fn update_cumulatives(&mut self, now: u64) {
        let elapsed = now.saturating_sub(self.block_timestamp_last);
        if elapsed > 0 && self.reserve_a > 0 && self.reserve_b > 0 {
            if let Some(p) = math::spot_price_q64(self.reserve_a, self.reserve_b) {
                self.price_cumulative_a = self
                    .price_cumulative_a
                    .wrapping_add(p.wrapping_mul(elapsed as u128));
            }
            if let Some(p) = math::spot_price_q64(self.reserve_b, self.reserve_a) {
                self.price_cumulative_b = self
                    .price_cumulative_b
                    .wrapping_add(p.wrapping_mul(elapsed as u128));
            }
        }
        if now > self.block_timestamp_last {
            self.block_timestamp_last = now;
        }
    }

    // ─── Protocol fee ───────────────────────────────────────────────────────

    /// LP units owed to the fee recipient for growth in sqrt(k) since the
    /// last liquidity event.
    pub fn pending_fee_liquidity(&self, config: &ExchangeConfig) -> Result<u64> {
        if config.fee_to.is_none() || self.k_last == 0 {
            return Ok(0);
        }
        let root_k = isqrt(self.reserve_a as u128 * self.reserve_b as u128);
        let root_k_last = isqrt(self.k_last);
        if root_k <= root_k_last {
            return Ok(0);
        }
        let numerator = (self.lp_supply as u128)
            .checked_mul(root_k - root_k_last)
            .ok_or(GravityError::MathOverflow)?;
        let denominator = root_k
            .checked_mul(config.protocol_fee_divisor.saturating_sub(1) as u128)
            .ok_or(GravityError::MathOverflow)?
            .checked_add(root_k_last)
            .ok_or(GravityError::MathOverflow)?;
        math::to_u64(numerator / denominator)
    }

    fn mint_fee(&mut self, env: &mut PairEnv<'_>) -> Result<()> {
        let fee_liquidity = self.pending_fee_liquidity(env.config)?;
        if fee_liquidity == 0 {
            return Ok(());
        }
        if let Some(fee_to) = env.config.fee_to {
            env.bank.mint_to(&self.address, &fee_to, fee_liquidity)?;
            self.lp_supply += fee_liquidity;
            debug!(pair = %self.address, fee_liquidity, "protocol fee minted");
        }
        Ok(())
    }

    fn sync_k_last(&mut self, config: &ExchangeConfig) {
        self.k_last = if config.fee_to.is_some() {
            self.reserve_a as u128 * self.reserve_b as u128
        } else {
            0
        };
    }

    // ─── Liquidity ──────────────────────────────────────────────────────────

    /// LP units `add_liquidity` would mint for these exact amounts.
    pub fn preview_mint(&self, config: &ExchangeConfig, amount_a: u64, amount_b: u64) -> Result<u64> {
        let supply = self
            .lp_supply
            .checked_add(self.pending_fee_liquidity(config)?)
            .ok_or(GravityError::MathOverflow)?;
        let liquidity = if supply == 0 {
            let root = math::to_u64(isqrt(amount_a as u128 * amount_b as u128))?;
            root.saturating_sub(MINIMUM_LIQUIDITY)
        } else if self.reserve_a == 0 || self.reserve_b == 0 {
            0
        } else {
            math::mul_div_u64(amount_a, supply, self.reserve_a)?
                .min(math::mul_div_u64(amount_b, supply, self.reserve_b)?)
        };
        Ok(liquidity)
    }

    /// Deposit both assets and mint LP to `to`.
    ///
    /// The first deposit mints `isqrt(a*b) - MINIMUM_LIQUIDITY`; the minimum
    /// is locked at the zero address forever. Refused with `Paused` while the
    /// exchange is paused or the pair is withdraw-only; only removal stays open.
    pub fn add_liquidity(
        &mut self,
        env: &mut PairEnv<'_>,
        provider: &Pubkey,
        amount_a: u64,
        amount_b: u64,
        to: &Pubkey,
    ) -> Result<u64> {
        self.ensure_tradable(env.config)?;
        env.bank.ensure_balance(&self.token_a, provider, amount_a)?;
        env.bank.ensure_balance(&self.token_b, provider, amount_b)?;

        let first = self.lp_supply == 0;
        let liquidity = self.preview_mint(env.config, amount_a, amount_b)?;
        require!(liquidity > 0, GravityError::InsufficientLiquidityMinted);
        let reserve_a = self
            .reserve_a
            .checked_add(amount_a)
            .ok_or(GravityError::MathOverflow)?;
        let reserve_b = self
            .reserve_b
            .checked_add(amount_b)
            .ok_or(GravityError::MathOverflow)?;

        self.update_cumulatives(env.now);
        self.mint_fee(env)?;
        if first {
            env.bank
                .mint_to(&self.address, &Pubkey::default(), MINIMUM_LIQUIDITY)?;
            self.lp_supply += MINIMUM_LIQUIDITY;
        }
        self.reserve_a = reserve_a;
        self.reserve_b = reserve_b;
        self.lp_supply = self
            .lp_supply
            .checked_add(liquidity)
            .ok_or(GravityError::MathOverflow)?;
        self.sync_k_last(env.config);

        env.bank
            .transfer(&self.token_a, provider, &self.address, amount_a)?;
        env.bank
            .transfer(&self.token_b, provider, &self.address, amount_b)?;
        env.bank.mint_to(&self.address, to, liquidity)?;

        debug!(
            pair = %self.address, amount_a, amount_b, liquidity,
            reserve_a = self.reserve_a, reserve_b = self.reserve_b,
            "liquidity added"
        );
        Ok(liquidity)
    }

    /// Amounts `remove_liquidity` would return for `liquidity` LP units.
    pub fn preview_burn(&self, config: &ExchangeConfig, liquidity: u64) -> Result<(u64, u64)> {
        let supply = self
            .lp_supply
            .checked_add(self.pending_fee_liquidity(config)?)
            .ok_or(GravityError::MathOverflow)?;
        require!(supply > 0, GravityError::InsufficientLiquidity);
        Ok((
            math::mul_div_u64(liquidity, self.reserve_a, supply)?,
            math::mul_div_u64(liquidity, self.reserve_b, supply)?,
        ))
    }

    /// Burn `liquidity` LP units held by `owner` and send both assets to
    /// `to`. Permitted while paused.
    pub fn remove_liquidity(
        &mut self,
        env: &mut PairEnv<'_>,
        owner: &Pubkey,
        liquidity: u64,
        to: &Pubkey,
    ) -> Result<(u64, u64)> {
        require!(liquidity > 0, GravityError::ZeroAmount);
        env.bank.ensure_balance(&self.address, owner, liquidity)?;
        let (amount_a, amount_b) = self.preview_burn(env.config, liquidity)?;
        require!(
            amount_a > 0 && amount_b > 0,
            GravityError::InsufficientLiquidity
        );

        self.update_cumulatives(env.now);
        self.mint_fee(env)?;
        self.lp_supply -= liquidity;
        self.reserve_a -= amount_a;
        self.reserve_b -= amount_b;
        self.sync_k_last(env.config);

        env.bank.burn(&self.address, owner, liquidity)?;
        env.bank.transfer(&self.token_a, &self.address, to, amount_a)?;
        env.bank.transfer(&self.token_b, &self.address, to, amount_b)?;

        debug!(pair = %self.address, liquidity, amount_a, amount_b, "liquidity removed");
        Ok((amount_a, amount_b))
    }

    // ─── Swap ───────────────────────────────────────────────────────────────

    /// Exact-in swap: sell `amount_in` of `token_in`, receive at least
    /// `min_amount_out` of the other asset at `to`.
    pub fn swap(
        &mut self,
        env: &mut PairEnv<'_>,
        payer: &Pubkey,
        token_in: &Pubkey,
        amount_in: u64,
        min_amount_out: u64,
        to: &Pubkey,
    ) -> Result<u64> {
        self.ensure_tradable(env.config)?;
        let (reserve_in, reserve_out) = self.reserves_for(token_in)?;
        let s = math::compute_swap(
            amount_in,
            env.config.swap_fee_bps,
            reserve_in,
            reserve_out,
            min_amount_out,
        )?;
        self.swap_exact(env, payer, token_in, amount_in, s.amount_out, to)?;
        Ok(s.amount_out)
    }

    /// Low-level swap: pay exactly `amount_in`, take exactly `amount_out`.
    /// Fails with `KInvariantViolation` if the fee-adjusted product would
    /// drop.
    pub fn swap_exact(
        &mut self,
        env: &mut PairEnv<'_>,
        payer: &Pubkey,
        token_in: &Pubkey,
        amount_in: u64,
        amount_out: u64,
        to: &Pubkey,
    ) -> Result<()> {
        self.ensure_tradable(env.config)?;
        require!(amount_in > 0, GravityError::ZeroAmount);
        require!(
            amount_out > 0,
            GravityError::InsufficientOutputAmount { out: 0, min: 1 }
        );
        let token_out = self.other(token_in)?;
        let (reserve_in, reserve_out) = self.reserves_for(token_in)?;
        let fee = amount_in as u128 * env.config.swap_fee_bps as u128 / BPS_DENOMINATOR;
        math::check_k(reserve_in, reserve_out, amount_in as u128 - fee, amount_out)?;
        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or(GravityError::MathOverflow)?;
        env.bank.ensure_balance(token_in, payer, amount_in)?;

        self.update_cumulatives(env.now);
        if *token_in == self.token_a {
            self.reserve_a = new_in;
            self.reserve_b = reserve_out - amount_out;
        } else {
            self.reserve_b = new_in;
            self.reserve_a = reserve_out - amount_out;
        }

        env.bank.transfer(token_in, payer, &self.address, amount_in)?;
        env.bank.transfer(&token_out, &self.address, to, amount_out)?;

        debug!(
            pair = %self.address, %token_in, amount_in, amount_out,
            reserve_a = self.reserve_a, reserve_b = self.reserve_b,
            "swap"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        bank: TokenBank,
        config: ExchangeConfig,
        pair: Pair,
        lp: Pubkey,
    }

    fn fixture(config: ExchangeConfig) -> Fixture {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let lp = Pubkey::new_unique();
        let mut bank = TokenBank::new();
        bank.mint_to(&a, &lp, 1_000_000_000).unwrap();
        bank.mint_to(&b, &lp, 1_000_000_000).unwrap();
        Fixture {
            bank,
            config,
            pair: Pair::new(Pubkey::new_unique(), a, b, 0),
            lp,
        }
    }

    impl Fixture {
        fn env(&mut self, now: u64) -> PairEnv<'_> {
            PairEnv { bank: &mut self.bank, config: &self.config, now }
        }
    }

    #[test]
    fn first_mint_locks_minimum_liquidity() {
        let mut f = fixture(ExchangeConfig::default());
        let lp = f.lp;
        let mut pair = f.pair.clone();
        let minted = pair
            .add_liquidity(&mut f.env(0), &lp, 1_000_000, 4_000_000, &lp)
            .unwrap();
        assert_eq!(minted, 2_000_000 - MINIMUM_LIQUIDITY);
        assert_eq!(pair.lp_supply, 2_000_000);
        assert_eq!(f.bank.balance_of(&pair.address, &Pubkey::default()), MINIMUM_LIQUIDITY);
    }

    #[test]
    fn tiny_first_deposit_mints_nothing() {
        let mut f = fixture(ExchangeConfig::default());
        let lp = f.lp;
        let mut pair = f.pair.clone();
        let err = pair.add_liquidity(&mut f.env(0), &lp, 10, 10, &lp).unwrap_err();
        assert_eq!(err, GravityError::InsufficientLiquidityMinted);
        assert_eq!(pair.reserve_a, 0);
    }

    #[test]
    fn swap_respects_k_and_pause() {
        let mut f = fixture(ExchangeConfig::default());
        let lp = f.lp;
        let mut pair = f.pair.clone();
        let token_a = pair.token_a;
        pair.add_liquidity(&mut f.env(0), &lp, 1_000_000, 1_000_000, &lp).unwrap();

        let k0 = pair.reserve_a as u128 * pair.reserve_b as u128;
        let out = pair.swap(&mut f.env(10), &lp, &token_a, 1_000, 0, &lp).unwrap();
        assert_eq!(out, 996);
        assert!(pair.reserve_a as u128 * pair.reserve_b as u128 > k0);

        // One unit more than the formula gives breaks the invariant.
        let (r_in, r_out) = pair.reserves_for(&token_a).unwrap();
        let max_out = math::get_amount_out(1_000, r_in, r_out, 30).unwrap();
        let err = pair
            .swap_exact(&mut f.env(10), &lp, &token_a, 1_000, max_out + 1, &lp)
            .unwrap_err();
        assert_eq!(err, GravityError::KInvariantViolation);

        pair.withdraw_only = true;
        let err = pair.swap(&mut f.env(11), &lp, &token_a, 1_000, 0, &lp).unwrap_err();
        assert_eq!(err, GravityError::Paused);
    }

    #[test]
    fn remove_allowed_while_paused() {
        let mut f = fixture(ExchangeConfig::default());
        let lp = f.lp;
        let mut pair = f.pair.clone();
        let minted = pair.add_liquidity(&mut f.env(0), &lp, 1_000_000, 1_000_000, &lp).unwrap();
        f.config.paused = true;
        let (a, b) = pair.remove_liquidity(&mut f.env(5), &lp, minted, &lp).unwrap();
        assert_eq!((a, b), (999_000, 999_000));
        assert_eq!(pair.lp_supply, MINIMUM_LIQUIDITY);
    }

    #[test]
    fn cumulative_price_advances_with_time() {
        let mut f = fixture(ExchangeConfig::default());
        let lp = f.lp;
        let mut pair = f.pair.clone();
        let token_a = pair.token_a;
        pair.add_liquidity(&mut f.env(100), &lp, 1_000_000, 2_000_000, &lp).unwrap();
        assert_eq!(pair.price_cumulative_a, 0);
        pair.swap(&mut f.env(110), &lp, &token_a, 10, 0, &lp).unwrap();
        // price of A = 2.0 for 10 seconds
        assert_eq!(pair.price_cumulative_a, 20 * Q64);
        assert_eq!(pair.price_cumulative_b, 5 * Q64);
        assert_eq!(pair.block_timestamp_last, 110);
    }

    #[test]
    fn fee_recipient_earns_sixth_of_growth() {
        let fee_to = Pubkey::new_unique();
        let config = ExchangeConfig { fee_to: Some(fee_to), ..ExchangeConfig::default() };
        let mut f = fixture(config);
        let lp = f.lp;
        let mut pair = f.pair.clone();
        let token_a = pair.token_a;
        let token_b = pair.token_b;
        pair.add_liquidity(&mut f.env(0), &lp, 10_000_000, 10_000_000, &lp).unwrap();
        for i in 0..20 {
            pair.swap(&mut f.env(i), &lp, &token_a, 100_000, 0, &lp).unwrap();
            pair.swap(&mut f.env(i), &lp, &token_b, 100_000, 0, &lp).unwrap();
        }
        let owed = pair.pending_fee_liquidity(&f.config).unwrap();
        assert!(owed > 0);
        pair.add_liquidity(&mut f.env(30), &lp, 1_000, 1_000, &lp).unwrap();
        assert_eq!(f.bank.balance_of(&pair.address, &fee_to), owed);
        assert_eq!(pair.pending_fee_liquidity(&f.config).unwrap(), 0);
    }
}
