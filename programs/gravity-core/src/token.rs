//! Balance and supply ledger for every fungible asset in the system.
//!
//! Pairs, farms, vaults and the incinerator hold tokens in the bank under
//! their own derived addresses, exactly like any user.

use std::collections::HashMap;

use solana_sdk::pubkey::Pubkey;

use crate::{error::GravityError, require, Result};

#[derive(Debug, Clone, Default)]
pub struct TokenBank {
    balances: HashMap<(Pubkey, Pubkey), u64>,
    supply: HashMap<Pubkey, u64>,
}

impl TokenBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, mint: &Pubkey, owner: &Pubkey) -> u64 {
        self.balances.get(&(*mint, *owner)).copied().unwrap_or(0)
    }

    pub fn total_supply(&self, mint: &Pubkey) -> u64 {
        self.supply.get(mint).copied().unwrap_or(0)
    }

    /// Fail with `InsufficientBalance` unless `owner` holds `amount`.
    pub fn ensure_balance(&self, mint: &Pubkey, owner: &Pubkey, amount: u64) -> Result<()> {
        let available = self.balance_of(mint, owner);
        require!(
            available >= amount,
            GravityError::InsufficientBalance {
                mint: *mint,
                owner: *owner,
                needed: amount,
                available,
            }
        );
        Ok(())
    }

    pub fn mint_to(&mut self, mint: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let supply = self.supply.entry(*mint).or_default();
        *supply = supply.checked_add(amount).ok_or(GravityError::MathOverflow)?;
        let bal = self.balances.entry((*mint, *to)).or_default();
        *bal = bal.checked_add(amount).ok_or(GravityError::MathOverflow)?;
        Ok(())
    }

    pub fn burn(&mut self, mint: &Pubkey, from: &Pubkey, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        self.ensure_balance(mint, from, amount)?;
        self.debit(mint, from, amount);
        if let Some(supply) = self.supply.get_mut(mint) {
            *supply -= amount;
        }
        Ok(())
    }

    pub fn transfer(&mut self, mint: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        if amount == 0 || from == to {
            return self.ensure_balance(mint, from, amount);
        }
        self.ensure_balance(mint, from, amount)?;
        let bal = self.balances.entry((*mint, *to)).or_default();
        *bal = bal.checked_add(amount).ok_or(GravityError::MathOverflow)?;
        self.debit(mint, from, amount);
        Ok(())
    }

    /// Non-zero holders of `mint`, for reports.
    pub fn holders(&self, mint: &Pubkey) -> Vec<(Pubkey, u64)> {
        let mut out: Vec<_> = self
            .balances
            .iter()
            .filter(|((m, _), bal)| m == mint && **bal > 0)
            .map(|((_, owner), bal)| (*owner, *bal))
            .collect();
        out.sort();
        out
    }

    // Caller has already checked the balance.
    fn debit(&mut self, mint: &Pubkey, from: &Pubkey, amount: u64) {
        let key = (*mint, *from);
        if let Some(bal) = self.balances.get_mut(&key) {
            *bal -= amount;
            if *bal == 0 {
                self.balances.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_transfer_burn_track_supply() {
        let mint = Pubkey::new_unique();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let mut bank = TokenBank::new();

        bank.mint_to(&mint, &alice, 100).unwrap();
        bank.transfer(&mint, &alice, &bob, 40).unwrap();
        bank.burn(&mint, &bob, 15).unwrap();

        assert_eq!(bank.balance_of(&mint, &alice), 60);
        assert_eq!(bank.balance_of(&mint, &bob), 25);
        assert_eq!(bank.total_supply(&mint), 85);
    }

    #[test]
    fn overdraft_is_rejected_without_side_effects() {
        let mint = Pubkey::new_unique();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let mut bank = TokenBank::new();
        bank.mint_to(&mint, &alice, 10).unwrap();

        let err = bank.transfer(&mint, &alice, &bob, 11).unwrap_err();
        assert!(matches!(err, GravityError::InsufficientBalance { needed: 11, available: 10, .. }));
        assert_eq!(bank.balance_of(&mint, &alice), 10);
        assert_eq!(bank.balance_of(&mint, &bob), 0);
    }
}
