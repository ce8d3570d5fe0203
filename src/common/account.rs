use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{common::Word, decoder::Program};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub balance: Word,
    #[serde(default)]
    pub nonce: Word,
    #[serde(default)]
    pub code: Program,
    #[serde(default, deserialize_with = "nonzero")]
    pub storage: BTreeMap<Word, Word>,
}

impl Account {
    pub fn with_balance(mut self, balance: Word) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_code(mut self, code: Program) -> Self {
        self.code = code;
        self
    }

    pub fn with_storage(mut self, key: Word, val: Word) -> Self {
        self.put(key, val);
        self
    }

    /// Absent keys read as zero.
    pub fn get(&self, key: &Word) -> Word {
        self.storage.get(key).copied().unwrap_or_default()
    }

    /// Writing zero deletes the key, storage never holds an explicit zero.
    pub fn put(&mut self, key: Word, val: Word) {
        if val.is_zero() {
            self.storage.remove(&key);
        } else {
            self.storage.insert(key, val);
        }
    }
}

fn nonzero<'de, D>(deserializer: D) -> Result<BTreeMap<Word, Word>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mut storage: BTreeMap<Word, Word> = Deserialize::deserialize(deserializer)?;
    storage.retain(|_, val| !val.is_zero());
    Ok(storage)
}
