//! Runtime configuration.
//!
//! Every section has serde defaults so a scenario file only needs to name
//! the values it changes.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::{constants::*, error::GravityError, require, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub exchange: ExchangeConfig,
    pub farm: FarmConfig,
    pub vault: VaultConfig,
    /// Governance token that share worth is denominated in
    #[serde(with = "pubkey_opt")]
    pub governance_token: Option<Pubkey>,
    pub oracle_max_age_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub swap_fee_bps: u16,
    /// Fee recipient earns `1 / protocol_fee_divisor` of sqrt(k) growth
    pub protocol_fee_divisor: u64,
    #[serde(with = "pubkey_opt")]
    pub fee_to: Option<Pubkey>,
    pub paused: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
            protocol_fee_divisor: DEFAULT_PROTOCOL_FEE_DIVISOR,
            fee_to: None,
            paused: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    /// Share of every reward payout sent to the fee sink
    pub harvest_fee_bps: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub cooldown_secs: u64,
    /// Conversion minimums are `expected * slippage_pct / 100`
    pub slippage_pct: u8,
    /// Leftover leg balance carried into the next harvest
    pub dust_cap: u64,
    pub vault_fee_bps: u16,
    /// Claimable reward below this is left for a later harvest
    pub min_harvest: u64,
    /// Receives leftovers above `dust_cap`
    #[serde(with = "pubkey_opt")]
    pub dust_pan: Option<Pubkey>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_HARVEST_COOLDOWN_SECS,
            slippage_pct: DEFAULT_SLIPPAGE_PCT,
            dust_cap: DEFAULT_DUST_CAP,
            vault_fee_bps: 0,
            min_harvest: 0,
            dust_pan: None,
        }
    }
}

impl ProtocolConfig {
    pub fn validate(&self) -> Result<()> {
        self.exchange.validate()?;
        require!(
            self.farm.harvest_fee_bps as u128 <= BPS_DENOMINATOR,
            GravityError::InvalidArgument(format!(
                "harvest_fee_bps {} exceeds 10000",
                self.farm.harvest_fee_bps
            ))
        );
        self.vault.validate()
    }

    pub fn oracle_max_age(&self) -> u64 {
        self.oracle_max_age_secs.unwrap_or(DEFAULT_ORACLE_MAX_AGE_SECS)
    }
}

impl ExchangeConfig {
    pub fn validate(&self) -> Result<()> {
        require!(
            self.swap_fee_bps <= MAX_SWAP_FEE_BPS,
            GravityError::InvalidArgument(format!(
                "swap_fee_bps {} is out of range 0–{MAX_SWAP_FEE_BPS}",
                self.swap_fee_bps
            ))
        );
        require!(
            self.protocol_fee_divisor >= 2,
            GravityError::InvalidArgument("protocol_fee_divisor must be at least 2".into())
        );
        Ok(())
    }
}

impl VaultConfig {
    pub fn validate(&self) -> Result<()> {
        require!(
            (1..=100).contains(&self.slippage_pct),
            GravityError::InvalidArgument(format!(
                "slippage_pct {} is out of range 1–100",
                self.slippage_pct
            ))
        );
        require!(
            self.vault_fee_bps as u128 <= BPS_DENOMINATOR,
            GravityError::InvalidArgument(format!(
                "vault_fee_bps {} exceeds 10000",
                self.vault_fee_bps
            ))
        );
        Ok(())
    }
}

/// Optional base-58 address field.
pub mod pubkey_opt {
    use std::str::FromStr;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;

    pub fn serialize<S: Serializer>(key: &Option<Pubkey>, s: S) -> Result<S::Ok, S::Error> {
        match key {
            Some(k) => s.serialize_some(&k.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Pubkey>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| Pubkey::from_str(&s).map_err(D::Error::custom))
            .transpose()
    }
}

/// Serialize any `Display` value (addresses) as a string.
pub fn display<T: std::fmt::Display, S: serde::Serializer>(v: &T, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(v)
}
