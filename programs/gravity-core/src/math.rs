//! Fixed-point and constant-product arithmetic.
//!
//! Amounts are `u64`; every product is formed in checked `u128`.

use crate::{constants::*, error::GravityError, require, Result};

// ─── Integer square root (Babylonian method) ──────────────────────────────
pub fn isqrt(n: u128) -> u128 {
    if n == 0 {
        return 0;
    }
    let mut x = n;
    let mut y = (x + 1) >> 1;
    while y < x {
        x = y;
        y = (y + n / y) >> 1;
    }
    x
}

/// `a * b / d`, floored.
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128> {
    require!(d > 0, GravityError::MathOverflow);
    Ok(a.checked_mul(b).ok_or(GravityError::MathOverflow)? / d)
}

/// `mul_div` narrowed back to a token amount.
pub fn mul_div_u64(a: u64, b: u64, d: u64) -> Result<u64> {
    to_u64(mul_div(a as u128, b as u128, d as u128)?)
}

pub fn to_u64(v: u128) -> Result<u64> {
    u64::try_from(v).map_err(|_| GravityError::MathOverflow)
}

/// `num * Q64 / den` as a Q64.64 value.
///
/// Divide-first to avoid u128 overflow: q * Q64 + r * Q64 / den
pub fn div_q64(num: u128, den: u64) -> Result<u128> {
    require!(den > 0, GravityError::MathOverflow);
    let den = den as u128;
    let q = num / den;
    let r = num % den;
    q.checked_mul(Q64)
        .ok_or(GravityError::MathOverflow)?
        .checked_add(r * Q64 / den)
        .ok_or(GravityError::MathOverflow)
}

/// `amount * acc >> 64` without forming the full 192-bit product.
pub fn mul_q64(amount: u64, acc: u128) -> Result<u128> {
    let amount = amount as u128;
    let hi = (acc >> 64)
        .checked_mul(amount)
        .ok_or(GravityError::MathOverflow)?;
    let lo = ((acc & (Q64 - 1)) * amount) >> 64;
    hi.checked_add(lo).ok_or(GravityError::MathOverflow)
}

/// Result of fee and output calculations for a single pair hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapAmounts {
    /// Fee retained in the reserves (raises k).
    pub fee: u64,
    /// Portion of amount_in used in the constant-product formula.
    pub amount_in_after_fee: u128,
    /// Tokens leaving the output reserve.
    pub amount_out: u64,
}

/// Compute the fee and constant-product output of a swap.
///
/// * `amount_in`      – raw token amount being sold
/// * `fee_bps`        – pair swap fee in basis points
/// * `reserve_in`     – reserve of the input token
/// * `reserve_out`    – reserve of the output token
/// * `min_amount_out` – slippage guard; returns `SlippageExceeded` if violated
pub fn compute_swap(
    amount_in: u64,
    fee_bps: u16,
    reserve_in: u64,
    reserve_out: u64,
    min_amount_out: u64,
) -> Result<SwapAmounts> {
    require!(amount_in > 0, GravityError::ZeroAmount);
    require!(
        reserve_in > 0 && reserve_out > 0,
        GravityError::InsufficientLiquidity
    );

    let in_u128 = amount_in as u128;
    let fee = in_u128
        .checked_mul(fee_bps as u128)
        .ok_or(GravityError::MathOverflow)?
        / BPS_DENOMINATOR;
    let after_fee = in_u128 - fee;

    // ── Constant-product output: dy = y * dx_net / (x + dx_net) ─────────────
    let amount_out = (reserve_out as u128)
        .checked_mul(after_fee)
        .ok_or(GravityError::MathOverflow)?
        / (reserve_in as u128)
            .checked_add(after_fee)
            .ok_or(GravityError::MathOverflow)?;
    let amount_out = to_u64(amount_out)?;

    require!(
        amount_out >= min_amount_out,
        GravityError::SlippageExceeded { out: amount_out, min: min_amount_out }
    );
    require!(
        amount_out > 0,
        GravityError::InsufficientOutputAmount { out: 0, min: min_amount_out }
    );

    Ok(SwapAmounts {
        fee: fee as u64,
        amount_in_after_fee: after_fee,
        amount_out,
    })
}

/// Output of a single hop with no slippage floor.
pub fn get_amount_out(amount_in: u64, reserve_in: u64, reserve_out: u64, fee_bps: u16) -> Result<u64> {
    compute_swap(amount_in, fee_bps, reserve_in, reserve_out, 0).map(|s| s.amount_out)
}

/// `(r_in + in_after_fee) * (r_out - out) >= r_in * r_out`
pub fn check_k(reserve_in: u64, reserve_out: u64, in_after_fee: u128, amount_out: u64) -> Result<()> {
    require!(amount_out < reserve_out, GravityError::InsufficientLiquidity);
    let before = (reserve_in as u128)
        .checked_mul(reserve_out as u128)
        .ok_or(GravityError::MathOverflow)?;
    let after = (reserve_in as u128)
        .checked_add(in_after_fee)
        .ok_or(GravityError::MathOverflow)?
        .checked_mul((reserve_out - amount_out) as u128)
        .ok_or(GravityError::MathOverflow)?;
    require!(after >= before, GravityError::KInvariantViolation);
    Ok(())
}

/// Equivalent amount of the other asset at the current reserve ratio.
pub fn quote(amount_a: u64, reserve_a: u64, reserve_b: u64) -> Result<u64> {
    require!(amount_a > 0, GravityError::ZeroAmount);
    require!(
        reserve_a > 0 && reserve_b > 0,
        GravityError::InsufficientLiquidity
    );
    mul_div_u64(amount_a, reserve_b, reserve_a)
}

/// Q64.64 price of `base` in units of `quote_reserve`'s asset.
pub fn spot_price_q64(reserve_base: u64, reserve_quote: u64) -> Option<u128> {
    if reserve_base == 0 {
        return None;
    }
    div_q64(reserve_quote as u128, reserve_base).ok()
}
