//! Creation gate for pairs, farms and vaults.

use std::collections::BTreeSet;

use solana_sdk::pubkey::Pubkey;

/// Allow/deny decision for `(creator, asset pair)`.
pub trait CreationPolicy {
    fn allows(&self, creator: &Pubkey, asset_a: &Pubkey, asset_b: &Pubkey) -> bool;
}

/// Anyone may create anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenPolicy;

impl CreationPolicy for OpenPolicy {
    fn allows(&self, _creator: &Pubkey, _asset_a: &Pubkey, _asset_b: &Pubkey) -> bool {
        true
    }
}

/// Explicit approvals. A creator may be approved for every pair or for
/// individual unordered asset pairs.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    creators: BTreeSet<Pubkey>,
    pairs: BTreeSet<(Pubkey, Pubkey, Pubkey)>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approve_creator(&mut self, creator: Pubkey) {
        self.creators.insert(creator);
    }

    pub fn approve(&mut self, creator: Pubkey, asset_a: Pubkey, asset_b: Pubkey) {
        self.pairs.insert(key(creator, asset_a, asset_b));
    }

    pub fn revoke(&mut self, creator: Pubkey, asset_a: Pubkey, asset_b: Pubkey) {
        self.pairs.remove(&key(creator, asset_a, asset_b));
    }
}

fn key(creator: Pubkey, a: Pubkey, b: Pubkey) -> (Pubkey, Pubkey, Pubkey) {
    if a <= b {
        (creator, a, b)
    } else {
        (creator, b, a)
    }
}

impl CreationPolicy for Whitelist {
    fn allows(&self, creator: &Pubkey, asset_a: &Pubkey, asset_b: &Pubkey) -> bool {
        self.creators.contains(creator)
            || self.pairs.contains(&key(*creator, *asset_a, *asset_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_is_order_insensitive_and_revocable() {
        let (c, a, b) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let mut wl = Whitelist::new();
        assert!(!wl.allows(&c, &a, &b));
        wl.approve(c, b, a);
        assert!(wl.allows(&c, &a, &b));
        assert!(!wl.allows(&Pubkey::new_unique(), &a, &b));
        wl.revoke(c, a, b);
        assert!(!wl.allows(&c, &a, &b));
        wl.approve_creator(c);
        assert!(wl.allows(&c, &a, &Pubkey::new_unique()));
    }
}
