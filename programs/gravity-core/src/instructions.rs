//! Entry points of the `Protocol` runtime, grouped by component.
//!
//!   liquidity  create_pair, add/remove liquidity, pause and fee switches
//!   swap       routed exact-input swaps and quotes
//!   farm       create_farm, deposit/withdraw/emergency_withdraw, pending_reward
//!   compound   create_vault, deposit/withdraw/harvest_compounding
//!   share      snapshots, share transfers and GFI worth views

pub mod compound;
pub mod farm;
pub mod liquidity;
pub mod share;
pub mod swap;
