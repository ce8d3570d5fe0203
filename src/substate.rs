use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::common::{Hex, Word, address::Address};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Word>,
    pub data: Hex,
}

/// Effects accumulated over one top-level invocation and applied once at the end.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Substate {
    pub destroyed: BTreeSet<Address>,
    pub logs: Vec<Log>,
    /// Refund counter per credited account.
    pub refunds: BTreeMap<Address, Word>,
}

impl Substate {
    pub fn refund(&self, address: &Address) -> Word {
        self.refunds.get(address).copied().unwrap_or_default()
    }

    pub fn total_refund(&self) -> Word {
        self.refunds
            .values()
            .fold(Word::zero(), |acc, refund| acc.saturating_add(*refund))
    }
}
