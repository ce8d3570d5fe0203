use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    common::{Word, account::Account, address::Address},
    decoder::Program,
};

/// Snapshot of all accounts. An address is active iff it has an account entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<Address, Account>",
    into = "BTreeMap<Address, Account>"
)]
pub struct WorldState {
    active: BTreeSet<Address>,
    accounts: BTreeMap<Address, Account>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, address: Address, account: Account) -> Self {
        self.insert(address, account);
        self
    }

    pub fn insert(&mut self, address: Address, account: Account) {
        self.active.insert(address);
        self.accounts.insert(address, account);
    }

    pub fn remove(&mut self, address: &Address) -> Option<Account> {
        self.active.remove(address);
        self.accounts.remove(address)
    }

    pub fn exists(&self, address: &Address) -> bool {
        self.active.contains(address)
    }

    pub fn get(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub(crate) fn get_mut(&mut self, address: &Address) -> Option<&mut Account> {
        self.accounts.get_mut(address)
    }

    /// The account at `address`, created empty if missing. The flag tells if it was.
    pub(crate) fn entry(&mut self, address: Address) -> (&mut Account, bool) {
        let created = self.active.insert(address);
        (self.accounts.entry(address).or_default(), created)
    }

    pub fn balance(&self, address: &Address) -> Word {
        self.get(address)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    pub fn nonce(&self, address: &Address) -> Word {
        self.get(address)
            .map(|account| account.nonce)
            .unwrap_or_default()
    }

    pub fn code(&self, address: &Address) -> Program {
        self.get(address)
            .map(|account| account.code.clone())
            .unwrap_or_default()
    }

    pub fn storage(&self, address: &Address, key: &Word) -> Word {
        self.get(address)
            .map(|account| account.get(key))
            .unwrap_or_default()
    }

    pub fn active(&self) -> impl Iterator<Item = &Address> {
        self.active.iter()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl From<BTreeMap<Address, Account>> for WorldState {
    fn from(accounts: BTreeMap<Address, Account>) -> Self {
        Self {
            active: accounts.keys().copied().collect(),
            accounts,
        }
    }
}

impl From<WorldState> for BTreeMap<Address, Account> {
    fn from(world: WorldState) -> Self {
        world.accounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::address::addr;

    #[test]
    fn test_active_set_follows_accounts() {
        let a = addr("0x0a");
        let b = addr("0x0b");
        let mut world = WorldState::new().with_account(a, Account::default());
        assert!(world.exists(&a));
        assert!(!world.exists(&b));

        let (_, created) = world.entry(b);
        assert!(created);
        let (_, created) = world.entry(b);
        assert!(!created);
        assert_eq!(world.active().collect::<Vec<_>>(), vec![&a, &b]);

        world.remove(&a);
        assert!(!world.exists(&a));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_missing_account_reads_as_empty() {
        let world = WorldState::new();
        let a = addr("0x0a");
        assert_eq!(world.balance(&a), Word::zero());
        assert_eq!(world.storage(&a, &Word::one()), Word::zero());
        assert!(world.code(&a).is_empty());
        assert!(!world.exists(&a));
    }

    #[test]
    fn test_json() {
        let json = r#"{"0x000000000000000000000000000000000000000a":{"balance":"0x2a"}}"#;
        let world: WorldState = serde_json::from_str(json).unwrap();
        let a = addr("0x0a");
        assert!(world.exists(&a));
        assert_eq!(world.balance(&a), Word::from(42));
    }
}
