//! Parameter and result types for router entry points.

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

/// Exact-in multi-hop swap along `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapExactInParams {
    pub amount_in: u64,
    /// Final output below this fails with `InsufficientOutputAmount`
    pub amount_out_min: u64,
    /// `[token_in, hop_1, ..., token_out]`
    pub path: Vec<Pubkey>,
    pub to: Pubkey,
    /// Unix seconds; the call fails with `Expired` once passed
    pub deadline: u64,
}

/// Liquidity deposit at the pair's current ratio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddLiquidityParams {
    pub token_a: Pubkey,
    pub token_b: Pubkey,
    pub amount_a_desired: u64,
    pub amount_b_desired: u64,
    pub amount_a_min: u64,
    pub amount_b_min: u64,
    pub to: Pubkey,
    pub deadline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveLiquidityParams {
    pub token_a: Pubkey,
    pub token_b: Pubkey,
    pub liquidity: u64,
    pub amount_a_min: u64,
    pub amount_b_min: u64,
    pub to: Pubkey,
    pub deadline: u64,
}

/// Amounts actually deposited, in the caller's token order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LiquidityAdded {
    pub amount_a: u64,
    pub amount_b: u64,
    pub liquidity: u64,
}
