use solana_sdk::pubkey::Pubkey;

use crate::{
    interfaces::PriceOracle,
    protocol::{Ledger, Protocol},
    share::{ShareValuation, Snapshot},
    Result,
};

fn gfi_valuation(ledger: &Ledger, farm: &Pubkey) -> Result<ShareValuation> {
    let vault = ledger.vault_for(farm)?;
    vault.valuation(ledger.farm(farm)?, &ledger.exchange)
}

impl<O: PriceOracle> Protocol<O> {
    /// Freeze `holder`'s share count and GFI worth; overwrites any earlier
    /// snapshot. The vault itself may not snapshot.
    pub fn take_snapshot(&mut self, caller: &Pubkey, farm: &Pubkey, holder: &Pubkey) -> Result<Snapshot> {
        self.transact("take_snapshot", |ledger, tx| {
            let valuation = gfi_valuation(ledger, farm)?;
            ledger
                .vault_mut(farm)?
                .take_snapshot(caller, holder, valuation, tx.env.timestamp)
        })
    }

    /// Move shares between holders; snapshots stay with their holder.
    pub fn transfer_shares(&mut self, from: &Pubkey, farm: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        self.transact("transfer_shares", |ledger, _| {
            ledger.vault_mut(farm)?.transfer_shares(from, to, amount)
        })
    }

    pub fn share_balance(&self, farm: &Pubkey, holder: &Pubkey) -> Result<u64> {
        Ok(self.ledger().vault_for(farm)?.share().balance_of(holder))
    }

    /// Live GFI worth of `holder`'s shares.
    pub fn shares_gfi_current_worth(&self, farm: &Pubkey, holder: &Pubkey) -> Result<u64> {
        let ledger = self.ledger();
        let valuation = gfi_valuation(ledger, farm)?;
        ledger.vault_for(farm)?.share().current_worth(holder, valuation)
    }

    /// GFI worth frozen at `holder`'s last snapshot, zero without one.
    pub fn shares_gfi_worth_at_last_snapshot(&self, farm: &Pubkey, holder: &Pubkey) -> Result<u64> {
        Ok(self
            .ledger()
            .vault_for(farm)?
            .share()
            .worth_at_last_snapshot(holder))
    }
}
