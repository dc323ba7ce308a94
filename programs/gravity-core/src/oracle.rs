//! Price observations and oracle-derived conversion floors.

use std::collections::BTreeMap;

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::{
    constants::*,
    error::GravityError,
    interfaces::{PriceOracle, SwapVenue},
    math,
    pair::Pair,
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub price_q64: u128,
    pub observed_at: u64,
}

/// Oracle fed by explicit observations; a price older than `max_age`
/// seconds is stale.
#[derive(Debug, Clone)]
pub struct ManualOracle {
    max_age: u64,
    observations: BTreeMap<Pubkey, Observation>,
}

impl Default for ManualOracle {
    fn default() -> Self {
        Self::new(DEFAULT_ORACLE_MAX_AGE_SECS)
    }
}

impl ManualOracle {
    pub fn new(max_age: u64) -> Self {
        Self {
            max_age,
            observations: BTreeMap::new(),
        }
    }

    pub fn max_age(&self) -> u64 {
        self.max_age
    }

    pub fn set_price(&mut self, pair: Pubkey, price_q64: u128, now: u64) {
        self.observations.insert(
            pair,
            Observation {
                price_q64,
                observed_at: now,
            },
        );
    }

    /// Record the pair's current spot price of `token_a`.
    pub fn observe(&mut self, pair: &Pair, now: u64) -> Result<u128> {
        let price = pair.spot_price_q64(&pair.token_a)?;
        self.set_price(pair.address, price, now);
        debug!(pair = %pair.address, price_q64 = price, now, "price observed");
        Ok(price)
    }

    pub fn observation(&self, pair: &Pubkey) -> Option<&Observation> {
        self.observations.get(pair)
    }
}

impl PriceOracle for ManualOracle {
    fn get_price(&self, pair: &Pubkey) -> Result<u128> {
        self.observations
            .get(pair)
            .map(|o| o.price_q64)
            .ok_or(GravityError::NotFound {
                kind: "price",
                address: *pair,
            })
    }

    fn is_stale(&self, pair: &Pubkey, now: u64) -> bool {
        match self.observations.get(pair) {
            Some(o) => now.saturating_sub(o.observed_at) > self.max_age,
            None => true,
        }
    }
}

/// Convert `amount` along `path` at oracle prices.
pub fn oracle_amount_out(
    oracle: &dyn PriceOracle,
    venue: &dyn SwapVenue,
    amount: u64,
    path: &[Pubkey],
) -> Result<u64> {
    let mut current = amount as u128;
    for hop in path.windows(2) {
        let pair = venue
            .pair_of(&hop[0], &hop[1])
            .ok_or(GravityError::NoConversionPath { from: hop[0], to: hop[1] })?;
        let price = oracle.get_price(&pair.address)?;
        current = if hop[0] == pair.token_a {
            math::mul_q64(math::to_u64(current)?, price)?
        } else {
            require_price(price)?;
            math::mul_div(current, Q64, price)?
        };
    }
    math::to_u64(current)
}

fn require_price(price: u128) -> Result<()> {
    if price == 0 {
        return Err(GravityError::InsufficientLiquidity);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_follows_max_age() {
        let pair = Pubkey::new_unique();
        let mut oracle = ManualOracle::new(600);
        assert!(oracle.is_stale(&pair, 0));
        oracle.set_price(pair, 2 * Q64, 1_000);
        assert!(!oracle.is_stale(&pair, 1_600));
        assert!(oracle.is_stale(&pair, 1_601));
        assert_eq!(oracle.get_price(&pair).unwrap(), 2 * Q64);
    }

    #[test]
    fn observe_reads_spot_price() {
        let mut pair = Pair::new(Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique(), 0);
        pair.reserve_a = 1_000;
        pair.reserve_b = 3_000;
        let mut oracle = ManualOracle::default();
        assert_eq!(oracle.observe(&pair, 5).unwrap(), 3 * Q64);
        assert_eq!(oracle.observation(&pair.address).unwrap().observed_at, 5);
    }
}
