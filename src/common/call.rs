use serde::{Deserialize, Serialize};

use crate::common::{Hex, address::Address, word::Word};

/// Context of the top-level invocation.
#[derive(Clone, Debug, Default)]
pub struct Call {
    pub data: Vec<u8>,
    pub value: Word,
    pub origin: Address,
    pub from: Address,
    pub to: Address,
    pub gas: Word,
}

/// Audit record of an attempted call or create, kept whether or not it ran.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub target: Address,
    pub value: Word,
    pub data: Hex,
}
