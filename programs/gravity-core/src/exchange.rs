//! Pair registry: one pair per unordered asset pair, never destroyed.

use std::collections::BTreeMap;

use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::{
    constants::*,
    error::GravityError,
    pair::{Pair, PairEnv},
    policy::CreationPolicy,
    require,
    token::TokenBank,
    Result,
};

pub use crate::config::ExchangeConfig;

#[derive(Debug, Clone)]
pub struct Exchange {
    program_id: Pubkey,
    pub config: ExchangeConfig,
    pairs: BTreeMap<Pubkey, Pair>,
    by_tokens: BTreeMap<(Pubkey, Pubkey), Pubkey>,
}

/// Order two distinct, non-default assets the way pairs store them.
pub fn sort_tokens(a: &Pubkey, b: &Pubkey) -> Result<(Pubkey, Pubkey)> {
    require!(
        a != b,
        GravityError::InvalidArgument(format!("identical assets {a}"))
    );
    require!(
        *a != Pubkey::default() && *b != Pubkey::default(),
        GravityError::InvalidArgument("zero address is not an asset".into())
    );
    Ok(if a < b { (*a, *b) } else { (*b, *a) })
}

/// PDA for the pair of `a` and `b`, in either order.
pub fn derive_pair_address(program_id: &Pubkey, a: &Pubkey, b: &Pubkey) -> Result<Pubkey> {
    let (t0, t1) = sort_tokens(a, b)?;
    let (pda, _) =
        Pubkey::find_program_address(&[PAIR_SEED, t0.as_ref(), t1.as_ref()], program_id);
    Ok(pda)
}

impl Exchange {
    pub fn new(program_id: Pubkey, config: ExchangeConfig) -> Self {
        Self {
            program_id,
            config,
            pairs: BTreeMap::new(),
            by_tokens: BTreeMap::new(),
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Address that holds intermediate hop outputs during multi-hop swaps.
    pub fn router_address(&self) -> Pubkey {
        Pubkey::find_program_address(&[ROUTER_SEED], &self.program_id).0
    }

    pub fn create_pair(
        &mut self,
        policy: &dyn CreationPolicy,
        creator: &Pubkey,
        a: &Pubkey,
        b: &Pubkey,
        now: u64,
    ) -> Result<Pubkey> {
        let (token_a, token_b) = sort_tokens(a, b)?;
        require!(
            policy.allows(creator, &token_a, &token_b),
            GravityError::Unauthorized
        );
        let address = derive_pair_address(&self.program_id, &token_a, &token_b)?;
        require!(
            !self.pairs.contains_key(&address),
            GravityError::AlreadyExists { kind: "pair", address }
        );

        self.pairs
            .insert(address, Pair::new(address, token_a, token_b, now));
        self.by_tokens.insert((token_a, token_b), address);
        info!(pair = %address, %token_a, %token_b, %creator, "pair created");
        Ok(address)
    }

    pub fn pair(&self, address: &Pubkey) -> Option<&Pair> {
        self.pairs.get(address)
    }

    pub fn get_pair(&self, a: &Pubkey, b: &Pubkey) -> Option<Pubkey> {
        let key = sort_tokens(a, b).ok()?;
        self.by_tokens.get(&key).copied()
    }

    pub fn pair_for(&self, a: &Pubkey, b: &Pubkey) -> Option<&Pair> {
        self.get_pair(a, b).and_then(|addr| self.pairs.get(&addr))
    }

    /// Pair for `a`/`b` or `NotFound` carrying the address it would have.
    pub fn require_pair(&self, a: &Pubkey, b: &Pubkey) -> Result<&Pair> {
        match self.pair_for(a, b) {
            Some(p) => Ok(p),
            None => Err(GravityError::NotFound {
                kind: "pair",
                address: derive_pair_address(&self.program_id, a, b)?,
            }),
        }
    }

    pub fn pairs(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.values()
    }

    /// Is `mint` the LP mint of a registered pair?
    pub fn is_lp_mint(&self, mint: &Pubkey) -> bool {
        self.pairs.contains_key(mint)
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.config.paused = paused;
        info!(paused, "exchange pause toggled");
    }

    pub fn set_fee_to(&mut self, fee_to: Option<Pubkey>) {
        self.config.fee_to = fee_to;
    }

    pub fn set_withdraw_only(&mut self, pair: &Pubkey, withdraw_only: bool) -> Result<()> {
        let p = self.pairs.get_mut(pair).ok_or(GravityError::NotFound {
            kind: "pair",
            address: *pair,
        })?;
        p.withdraw_only = withdraw_only;
        info!(pair = %pair, withdraw_only, "pair mode changed");
        Ok(())
    }

    /// Run `f` against the pair for `a`/`b` with a fresh `PairEnv`.
    pub(crate) fn with_pair<T>(
        &mut self,
        bank: &mut TokenBank,
        now: u64,
        a: &Pubkey,
        b: &Pubkey,
        f: impl FnOnce(&mut Pair, &mut PairEnv<'_>) -> Result<T>,
    ) -> Result<T> {
        let address = self.require_pair(a, b)?.address;
        let Self { pairs, config, .. } = self;
        let pair = pairs.get_mut(&address).ok_or(GravityError::NotFound {
            kind: "pair",
            address,
        })?;
        let mut env = PairEnv { bank, config: &*config, now };
        f(pair, &mut env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{OpenPolicy, Whitelist};

    #[test]
    fn one_pair_per_unordered_asset_pair() {
        let mut ex = Exchange::new(PROGRAM_ID, ExchangeConfig::default());
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let addr = ex.create_pair(&OpenPolicy, &c, &a, &b, 0).unwrap();
        assert_eq!(ex.get_pair(&b, &a), Some(addr));
        assert_eq!(addr, derive_pair_address(&PROGRAM_ID, &b, &a).unwrap());

        let err = ex.create_pair(&OpenPolicy, &c, &b, &a, 0).unwrap_err();
        assert_eq!(err, GravityError::AlreadyExists { kind: "pair", address: addr });
        assert!(ex.create_pair(&OpenPolicy, &c, &a, &a, 0).is_err());
    }

    #[test]
    fn whitelist_gates_creation() {
        let mut ex = Exchange::new(PROGRAM_ID, ExchangeConfig::default());
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let mut wl = Whitelist::new();
        assert_eq!(ex.create_pair(&wl, &c, &a, &b, 0), Err(GravityError::Unauthorized));
        wl.approve(c, a, b);
        assert!(ex.create_pair(&wl, &c, &a, &b, 0).is_ok());
    }
}
