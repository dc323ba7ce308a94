//! Fee sink that destroys whatever it receives.

use std::collections::BTreeMap;

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::{constants::INCINERATOR_SEED, interfaces::FeeSink, token::TokenBank, Result};

#[derive(Debug, Clone)]
pub struct Incinerator {
    address: Pubkey,
    burned: BTreeMap<Pubkey, u64>,
}

impl Incinerator {
    pub fn new(program_id: &Pubkey) -> Self {
        Self {
            address: Pubkey::find_program_address(&[INCINERATOR_SEED], program_id).0,
            burned: BTreeMap::new(),
        }
    }

    pub fn burned(&self, asset: &Pubkey) -> u64 {
        self.burned.get(asset).copied().unwrap_or(0)
    }
}

impl FeeSink for Incinerator {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn receive_and_burn(
        &mut self,
        bank: &mut TokenBank,
        asset: &Pubkey,
        from: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        bank.transfer(asset, from, &self.address, amount)?;
        bank.burn(asset, &self.address, amount)?;
        let total = self.burned.entry(*asset).or_default();
        *total = total.saturating_add(amount);
        debug!(%asset, %from, amount, "fee burned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROGRAM_ID;

    #[test]
    fn burns_reduce_supply_and_tally() {
        let asset = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let mut bank = TokenBank::new();
        bank.mint_to(&asset, &payer, 1_000).unwrap();
        let mut inc = Incinerator::new(&PROGRAM_ID);

        inc.receive_and_burn(&mut bank, &asset, &payer, 300).unwrap();
        inc.receive_and_burn(&mut bank, &asset, &payer, 0).unwrap();

        assert_eq!(bank.total_supply(&asset), 700);
        assert_eq!(bank.balance_of(&asset, &inc.address()), 0);
        assert_eq!(inc.burned(&asset), 300);
    }
}
