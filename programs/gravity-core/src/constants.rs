use solana_sdk::{pubkey, pubkey::Pubkey};

/// Program id every derived address is rooted at
pub const PROGRAM_ID: Pubkey = pubkey!("9uBFhnnevhZKyUh7Hu9Tr6qxe9XS1NX7jJHPiCHQgRit");

/// PDA seeds
pub const PAIR_SEED: &[u8] = b"pair";
pub const FARM_SEED: &[u8] = b"farm";
pub const VAULT_SEED: &[u8] = b"vault";
pub const SHARE_SEED: &[u8] = b"share";
pub const ROUTER_SEED: &[u8] = b"router";
pub const INCINERATOR_SEED: &[u8] = b"incinerator";

/// Default swap fee: 0.30 %
pub const DEFAULT_SWAP_FEE_BPS: u16 = 30;
pub const MAX_SWAP_FEE_BPS: u16 = 100;

/// Denominator for basis-point math (u128 to avoid up-cast noise)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Protocol fee recipient earns 1/6 of the growth in sqrt(k)
pub const DEFAULT_PROTOCOL_FEE_DIVISOR: u64 = 6;

/// LP units locked at the zero address on a pair's first mint
pub const MINIMUM_LIQUIDITY: u64 = 1_000;

/// Q64.64 fixed-point scale (reward accumulators, oracle prices)
pub const Q64: u128 = 1u128 << 64;

/// Vault defaults
pub const DEFAULT_HARVEST_COOLDOWN_SECS: u64 = 300;
pub const DEFAULT_SLIPPAGE_PCT: u8 = 95;
pub const DEFAULT_DUST_CAP: u64 = 100;

/// Excess-leg swaps attempted after the first add_liquidity of a harvest
pub const MAX_REBALANCE_ROUNDS: usize = 4;

/// Oracle observations older than this are stale
pub const DEFAULT_ORACLE_MAX_AGE_SECS: u64 = 600;
