//! Vault ownership token with frozen per-holder worth snapshots.

use std::collections::BTreeMap;

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::{constants::SHARE_SEED, error::GravityError, math, require, Result};

/// Worth of the whole share supply at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShareValuation {
    /// Value backing all outstanding shares, in the reporting unit
    pub total_value: u64,
    pub total_shares: u64,
}

impl ShareValuation {
    pub fn worth(&self, shares: u64) -> Result<u64> {
        if self.total_shares == 0 {
            return Ok(0);
        }
        math::mul_div_u64(shares, self.total_value, self.total_shares)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub shares: u64,
    pub worth: u64,
    pub taken_at: u64,
}

pub fn derive_share_mint(program_id: &Pubkey, vault: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[SHARE_SEED, vault.as_ref()], program_id).0
}

#[derive(Debug, Clone)]
pub struct ShareToken {
    mint: Pubkey,
    minter: Pubkey,
    balances: BTreeMap<Pubkey, u64>,
    total_supply: u64,
    snapshots: BTreeMap<Pubkey, Snapshot>,
}

impl ShareToken {
    pub fn new(mint: Pubkey, minter: Pubkey) -> Self {
        Self {
            mint,
            minter,
            balances: BTreeMap::new(),
            total_supply: 0,
            snapshots: BTreeMap::new(),
        }
    }

    pub fn mint_address(&self) -> Pubkey {
        self.mint
    }

    pub fn minter(&self) -> Pubkey {
        self.minter
    }

    pub fn balance_of(&self, holder: &Pubkey) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    pub fn mint(&mut self, caller: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        require!(*caller == self.minter, GravityError::Unauthorized);
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(GravityError::MathOverflow)?;
        *self.balances.entry(*to).or_default() += amount;
        Ok(())
    }

    pub fn burn(&mut self, caller: &Pubkey, from: &Pubkey, amount: u64) -> Result<()> {
        require!(*caller == self.minter, GravityError::Unauthorized);
        self.debit(from, amount)?;
        self.total_supply -= amount;
        Ok(())
    }

    /// Move shares between holders. Snapshots stay with their holder.
    pub fn transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        self.debit(from, amount)?;
        *self.balances.entry(*to).or_default() += amount;
        debug!(share = %self.mint, %from, %to, amount, "shares transferred");
        Ok(())
    }

    fn debit(&mut self, from: &Pubkey, amount: u64) -> Result<()> {
        let available = self.balance_of(from);
        require!(
            available >= amount,
            GravityError::InsufficientBalance {
                mint: self.mint,
                owner: *from,
                needed: amount,
                available,
            }
        );
        if available == amount {
            self.balances.remove(from);
        } else if let Some(bal) = self.balances.get_mut(from) {
            *bal -= amount;
        }
        Ok(())
    }

    /// Freeze `holder`'s current worth, overwriting any earlier snapshot.
    /// Any caller except the minter may take one.
    pub fn take_snapshot(
        &mut self,
        caller: &Pubkey,
        holder: &Pubkey,
        valuation: ShareValuation,
        now: u64,
    ) -> Result<Snapshot> {
        require!(*caller != self.minter, GravityError::Unauthorized);
        let shares = self.balance_of(holder);
        let snapshot = Snapshot {
            shares,
            worth: valuation.worth(shares)?,
            taken_at: now,
        };
        self.snapshots.insert(*holder, snapshot);
        debug!(share = %self.mint, %holder, shares, worth = snapshot.worth, "snapshot taken");
        Ok(snapshot)
    }

    pub fn snapshot(&self, holder: &Pubkey) -> Option<&Snapshot> {
        self.snapshots.get(holder)
    }

    pub fn current_worth(&self, holder: &Pubkey, valuation: ShareValuation) -> Result<u64> {
        valuation.worth(self.balance_of(holder))
    }

    pub fn worth_at_last_snapshot(&self, holder: &Pubkey) -> u64 {
        self.snapshots.get(holder).map(|s| s.worth).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> (ShareToken, Pubkey) {
        let vault = Pubkey::new_unique();
        (ShareToken::new(Pubkey::new_unique(), vault), vault)
    }

    #[test]
    fn only_minter_mints_and_burns() {
        let (mut t, vault) = token();
        let alice = Pubkey::new_unique();
        assert_eq!(t.mint(&alice, &alice, 10), Err(GravityError::Unauthorized));
        t.mint(&vault, &alice, 10).unwrap();
        assert_eq!(t.burn(&alice, &alice, 1), Err(GravityError::Unauthorized));
        t.burn(&vault, &alice, 4).unwrap();
        assert_eq!(t.balance_of(&alice), 6);
        assert_eq!(t.total_supply(), 6);
    }

    #[test]
    fn snapshot_is_idempotent_and_minter_cannot_snapshot() {
        let (mut t, vault) = token();
        let alice = Pubkey::new_unique();
        t.mint(&vault, &alice, 100).unwrap();
        let v = ShareValuation { total_value: 300, total_shares: 100 };

        assert_eq!(t.take_snapshot(&vault, &alice, v, 1), Err(GravityError::Unauthorized));
        let first = t.take_snapshot(&alice, &alice, v, 1).unwrap();
        let second = t.take_snapshot(&alice, &alice, v, 1).unwrap();
        assert_eq!(first, second);
        assert_eq!(t.worth_at_last_snapshot(&alice), 300);
    }

    #[test]
    fn snapshots_do_not_follow_transfers() {
        let (mut t, vault) = token();
        let (alice, bob) = (Pubkey::new_unique(), Pubkey::new_unique());
        t.mint(&vault, &alice, 100).unwrap();
        let v = ShareValuation { total_value: 100, total_shares: 100 };
        t.take_snapshot(&alice, &alice, v, 1).unwrap();
        t.transfer(&alice, &bob, 100).unwrap();

        assert_eq!(t.worth_at_last_snapshot(&alice), 100);
        assert_eq!(t.worth_at_last_snapshot(&bob), 0);
        assert_eq!(t.current_worth(&alice, v).unwrap(), 0);
        assert_eq!(t.current_worth(&bob, v).unwrap(), 100);
    }
}
