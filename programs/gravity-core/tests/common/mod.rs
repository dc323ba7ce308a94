//! Shared world builder for the integration suites.

#![allow(dead_code)]

use gravity_core::{
    AddLiquidityParams, Env, FarmParams, Protocol, ProtocolConfig, RemoveLiquidityParams,
    Result, SwapExactInParams,
};
use solana_sdk::{hash::hash, pubkey::Pubkey};

pub const BLOCK_SECS: u64 = 13;
pub const GENESIS: Env = Env { block: 1, timestamp: 1_000_000 };

/// Deterministic address for a human-readable name.
pub fn actor(name: &str) -> Pubkey {
    Pubkey::new_from_array(hash(name.as_bytes()).to_bytes())
}

pub struct World {
    pub p: Protocol,
    pub admin: Pubkey,
    pub gfi: Pubkey,
    pub weth: Pubkey,
    pub usdc: Pubkey,
    pub wbtc: Pubkey,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// World with GFI as governance token and `tweak` applied to the config.
    pub fn with_config(tweak: impl FnOnce(&mut ProtocolConfig)) -> Self {
        let gfi = actor("GFI");
        let mut config = ProtocolConfig {
            governance_token: Some(gfi),
            ..ProtocolConfig::default()
        };
        tweak(&mut config);
        let mut p = Protocol::new(config).expect("valid config");
        p.set_env(GENESIS);
        Self {
            p,
            admin: actor("admin"),
            gfi,
            weth: actor("WETH"),
            usdc: actor("USDC"),
            wbtc: actor("WBTC"),
        }
    }

    pub fn fund(&mut self, who: &Pubkey, token: &Pubkey, amount: u64) {
        self.p.mint_tokens(token, who, amount).expect("faucet");
    }

    pub fn user(&mut self, name: &str, holdings: &[(Pubkey, u64)]) -> Pubkey {
        let who = actor(name);
        for (token, amount) in holdings {
            self.fund(&who, token, *amount);
        }
        who
    }

    pub fn balance(&self, token: &Pubkey, who: &Pubkey) -> u64 {
        self.p.balance_of(token, who)
    }

    /// Create the `a`/`b` pair and seed it from the admin account.
    pub fn seed_pair(&mut self, a: Pubkey, b: Pubkey, amount_a: u64, amount_b: u64) -> Pubkey {
        let admin = self.admin;
        let pair = self.p.create_pair(&admin, &a, &b).expect("create pair");
        self.fund(&admin, &a, amount_a);
        self.fund(&admin, &b, amount_b);
        self.p
            .add_liquidity(&admin, &add_params(a, b, amount_a, amount_b, admin))
            .expect("seed liquidity");
        pair
    }

    pub fn swap(&mut self, who: &Pubkey, path: &[Pubkey], amount_in: u64) -> Result<Vec<u64>> {
        let params = SwapExactInParams {
            amount_in,
            amount_out_min: 0,
            path: path.to_vec(),
            to: *who,
            deadline: u64::MAX,
        };
        self.p.swap_exact_tokens_for_tokens(who, &params)
    }

    /// Funded farm paying `reward_per_block` over `[start, end]`.
    pub fn farm(&mut self, staked: Pubkey, reward: Pubkey, reward_per_block: u64, start: u64, end: u64) -> Pubkey {
        let admin = self.admin;
        let budget = reward_per_block * (end - start);
        self.fund(&admin, &reward, budget);
        let params = FarmParams::new(staked, reward, budget, reward_per_block, start, end);
        self.p.create_farm(&admin, params).expect("create farm")
    }

    /// Mine `blocks` blocks at `BLOCK_SECS` each.
    pub fn step(&mut self, blocks: u64) {
        self.p.advance_blocks(blocks);
        self.p.advance_time(blocks * BLOCK_SECS);
    }

    pub fn block(&self) -> u64 {
        self.p.env().block
    }

    /// Refresh the oracle for every pair that has liquidity.
    pub fn observe_all(&mut self) {
        let pairs: Vec<(Pubkey, Pubkey)> = self
            .p
            .ledger()
            .exchange
            .pairs()
            .filter(|pair| pair.lp_supply > 0)
            .map(|pair| (pair.token_a, pair.token_b))
            .collect();
        for (a, b) in pairs {
            self.p.observe_price(&a, &b).expect("observe");
        }
    }

    /// Vault routes from `reward` into each leg of the `a`/`b` pair, in the
    /// pair's token order.
    pub fn lp_routes(&self, reward: Pubkey, a: &Pubkey, b: &Pubkey) -> Vec<Vec<Pubkey>> {
        let pair = self.p.ledger().exchange.require_pair(a, b).expect("pair");
        [pair.token_a, pair.token_b]
            .into_iter()
            .map(|leg| if leg == reward { Vec::new() } else { vec![reward, leg] })
            .collect()
    }

    /// Fund `name` with `amount` of both assets and add them as liquidity;
    /// returns the user and the LP minted.
    pub fn lp_position(&mut self, name: &str, a: Pubkey, b: Pubkey, amount: u64) -> (Pubkey, u64) {
        let who = self.user(name, &[(a, amount), (b, amount)]);
        let added = self
            .p
            .add_liquidity(&who, &add_params(a, b, amount, amount, who))
            .expect("add liquidity");
        (who, added.liquidity)
    }

    pub fn k(&self, a: &Pubkey, b: &Pubkey) -> u128 {
        let pair = self.p.ledger().exchange.require_pair(a, b).expect("pair");
        pair.reserve_a as u128 * pair.reserve_b as u128
    }

    pub fn lp_supply(&self, a: &Pubkey, b: &Pubkey) -> u64 {
        self.p.ledger().exchange.require_pair(a, b).expect("pair").lp_supply
    }
}

pub fn add_params(a: Pubkey, b: Pubkey, amount_a: u64, amount_b: u64, to: Pubkey) -> AddLiquidityParams {
    AddLiquidityParams {
        token_a: a,
        token_b: b,
        amount_a_desired: amount_a,
        amount_b_desired: amount_b,
        amount_a_min: 0,
        amount_b_min: 0,
        to,
        deadline: u64::MAX,
    }
}

pub fn remove_params(a: Pubkey, b: Pubkey, liquidity: u64, to: Pubkey) -> RemoveLiquidityParams {
    RemoveLiquidityParams {
        token_a: a,
        token_b: b,
        liquidity,
        amount_a_min: 0,
        amount_b_min: 0,
        to,
        deadline: u64::MAX,
    }
}
