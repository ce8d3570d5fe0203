use serde::{Deserialize, Serialize};

use crate::common::{address::Address, hash::HashFn, word::Word};

/// Block and transaction level values readable by the executing program.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct Env {
    #[serde(rename = "currentCoinbase", default)]
    pub coinbase: Address,
    #[serde(rename = "currentTimestamp", default)]
    pub timestamp: Word,
    #[serde(rename = "currentNumber", default)]
    pub number: Word,
    #[serde(rename = "currentDifficulty", default)]
    pub difficulty: Word,
    #[serde(rename = "currentGasLimit", default)]
    pub gas_limit: Word,
    #[serde(rename = "gasPrice", default)]
    pub gas_price: Word,
}

const BLOCK_HASH_WINDOW: u64 = 256;

impl Env {
    /// Only the 256 blocks preceding the current one have a hash.
    pub fn block_hash(&self, number: &Word, hash: HashFn) -> Word {
        if *number >= self.number {
            return Word::zero();
        }
        if self.number.wrapping_sub(*number) > Word::from(BLOCK_HASH_WINDOW) {
            return Word::zero();
        }
        Word::from_bytes(&hash(&number.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::hash::keccak256;

    #[test]
    fn test_block_hash_window() {
        let env = Env {
            number: Word::from(300),
            ..Env::default()
        };
        assert_eq!(env.block_hash(&Word::from(300), keccak256), Word::zero());
        assert_eq!(env.block_hash(&Word::from(43), keccak256), Word::zero());
        assert_eq!(
            env.block_hash(&Word::from(44), keccak256),
            Word::from_bytes(&keccak256(&Word::from(44).into_bytes()))
        );
        assert_ne!(env.block_hash(&Word::from(299), keccak256), Word::zero());
    }
}
