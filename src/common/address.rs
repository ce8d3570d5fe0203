use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::common::{decode, hash::HashFn, word::Word};

#[derive(Clone, Copy, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn zero() -> Self {
        Self([0u8; 20])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|byte| byte == &0)
    }

    /// Address of the account created by `self` with creation counter `nonce`.
    pub fn create(&self, nonce: Word, hash: HashFn) -> Address {
        // address = hash(rlp([sender_address, sender_nonce]))[12:]
        //   0xc0 + len = list prefix
        //   0x94       = 20-byte string prefix
        //   nonce      = single byte below 0x80 as is, otherwise 0x80 + len prefix
        let address_bytes = self.0.to_vec();
        let nonce_bytes = nonce
            .into_bytes()
            .into_iter()
            .skip_while(|byte| byte == &0)
            .collect::<Vec<_>>();

        let mut nonce_rlp = Vec::with_capacity(nonce_bytes.len() + 1);
        if nonce_bytes.len() == 1 && nonce_bytes[0] < 0x80 {
            nonce_rlp.push(nonce_bytes[0]);
        } else {
            nonce_rlp.push(0x80u8 + nonce_bytes.len() as u8);
            nonce_rlp.extend_from_slice(&nonce_bytes);
        }

        let mut buffer = Vec::new();
        buffer.push(0xc0u8 + (1 + address_bytes.len() + nonce_rlp.len()) as u8);
        buffer.push(0x80u8 + address_bytes.len() as u8);
        buffer.extend_from_slice(&address_bytes);
        buffer.extend_from_slice(&nonce_rlp);

        let hash = hash(&buffer);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash[12..32]);
        Address(addr)
    }

    pub fn as_word(&self) -> Word {
        Word::from_bytes(&self.0)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl From<&Address> for Word {
    fn from(value: &Address) -> Self {
        value.as_word()
    }
}

/// Any word used as an account reference is reduced to its low 160 bits.
impl From<&Word> for Address {
    fn from(value: &Word) -> Self {
        let bytes: [u8; 32] = value.into_bytes();
        let mut ret = Address::default();
        ret.0[..].copy_from_slice(&bytes[12..]);
        ret
    }
}

impl From<[u8; 20]> for Address {
    fn from(value: [u8; 20]) -> Self {
        Self(value)
    }
}

impl TryFrom<&str> for Address {
    type Error = eyre::Report;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let hex = value.trim_start_matches("0x");
        if hex.len() != 40 {
            return Err(eyre::eyre!("Invalid address: '{value}'."));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex, &mut bytes)
            .map_err(|_| eyre::eyre!("Invalid address: '{value}'."))?;
        Ok(Address(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex = hex::encode(self.0);
        let hex = format!("0x{hex}");
        serializer.serialize_str(&hex)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Address, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let hex: String = Deserialize::deserialize(deserializer)?;
        Address::try_from(hex.as_str()).map_err(|_| {
            D::Error::invalid_value(serde::de::Unexpected::Str(&hex), &"Invalid hex length")
        })
    }
}

pub const fn addr(s: &str) -> Address {
    Address(decode(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::hash::keccak256;

    #[test]
    fn test_create_address() {
        assert_eq!(
            addr("0x5bc1c1942f2333acb9ce156525bc079fad983f13")
                .create(Word::from_hex("0x065b").unwrap(), keccak256),
            addr("0xe77afefd5b7beb79d1843e65a0fd54963abc742f")
        );
    }

    #[test]
    fn test_create_address_small_nonce() {
        let sender = addr("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0");
        assert_eq!(
            sender.create(Word::zero(), keccak256),
            addr("0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d")
        );
        assert_eq!(
            sender.create(Word::one(), keccak256),
            addr("0x343c43a37d37dff08ae8c4a11544c718abb4fcf8")
        );
    }

    #[test]
    fn test_word_normalization() {
        let word = Word::max();
        let address = Address::from(&word);
        assert_eq!(address, Address([0xff; 20]));
        assert_eq!(address.as_word(), Word::from_bytes(&[0xff; 20]));
    }
}
