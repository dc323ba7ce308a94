//! Error type shared by every ledger component.

use solana_sdk::pubkey::Pubkey;

/// All errors returned by the exchange, farms and vaults.
///
/// Any error aborts the whole entry point; the runtime restores the ledger
/// to its state before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GravityError {
    // ── Exchange ────────────────────────────────────────────────────────────
    #[error("Insufficient liquidity minted")]
    InsufficientLiquidityMinted,

    #[error("Constant-product invariant violated")]
    KInvariantViolation,

    #[error("Slippage exceeded: out={out}, min={min}")]
    SlippageExceeded { out: u64, min: u64 },

    #[error("Deadline {deadline} passed (now={now})")]
    Expired { deadline: u64, now: u64 },

    #[error("Insufficient output amount: out={out}, min={min}")]
    InsufficientOutputAmount { out: u64, min: u64 },

    #[error("Pair has insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Trading is paused")]
    Paused,

    #[error("Invalid swap path")]
    InvalidPath,

    // ── Farms and vaults ────────────────────────────────────────────────────
    #[error("Farm ended at block {end_block}")]
    FarmDead { end_block: u64 },

    #[error("Withdraw of {requested} exceeds stake of {staked}")]
    WithdrawExceedsStake { requested: u64, staked: u64 },

    #[error("No conversion path from {from} to {to}")]
    NoConversionPath { from: Pubkey, to: Pubkey },

    #[error("Caller is not authorized")]
    Unauthorized,

    // ── Ledger ──────────────────────────────────────────────────────────────
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Insufficient balance of {mint} for {owner}: needed {needed}, available {available}")]
    InsufficientBalance {
        mint: Pubkey,
        owner: Pubkey,
        needed: u64,
        available: u64,
    },

    #[error("Math overflow")]
    MathOverflow,

    #[error("{kind} not found: {address}")]
    NotFound { kind: &'static str, address: Pubkey },

    #[error("{kind} already exists: {address}")]
    AlreadyExists { kind: &'static str, address: Pubkey },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience alias so every module can write `Result<T>`.
pub type Result<T> = std::result::Result<T, GravityError>;

/// Early-return `Err($err)` unless `$cond` holds.
#[macro_export]
macro_rules! require {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}
