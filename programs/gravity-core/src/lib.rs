//! Gravity core: constant-product exchange, reward farms and auto-compounding
//! vaults over one shared token ledger.
//!
//! Components:
//!   pair / exchange / router   x * y = k pairs, factory and multi-hop router
//!   farm                       per-block reward accrual (MasterChef style)
//!   vault / share              compounding vault and its share token
//!   oracle / incinerator       price feed and fee burner used by harvests
//!   protocol                   runtime owning all state; every entry point
//!                              commits fully or not at all

pub mod config;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod farm;
pub mod incinerator;
pub mod instructions;
pub mod interfaces;
pub mod math;
pub mod oracle;
pub mod pair;
pub mod policy;
pub mod protocol;
pub mod router;
pub mod share;
pub mod token;
pub mod types;
pub mod vault;

pub use config::{ExchangeConfig, FarmConfig, ProtocolConfig, VaultConfig};
pub use constants::*;
pub use error::{GravityError, Result};
pub use farm::{FarmParams, FarmPhase, FarmReceipt};
pub use interfaces::{FeeSink, PriceOracle, StakingFarm, SwapVenue};
pub use oracle::ManualOracle;
pub use policy::{CreationPolicy, OpenPolicy, Whitelist};
pub use protocol::{Env, Ledger, Protocol};
pub use share::{ShareValuation, Snapshot};
pub use types::*;
pub use vault::{HarvestOutcome, HarvestReport, VaultKind};
