use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{
    common::Word,
    opcodes::{self, get_opcode},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecoderError {
    #[error("Unexpected end of bytecode after {0} instruction at position {1}")]
    UnexpectedEndOfBytecode(String, usize),
    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// One decoded instruction. Immediate data of PUSH is carried inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    Stop,
    Add,
    Mul,
    Sub,
    Div,
    SDiv,
    Mod,
    SMod,
    AddMod,
    MulMod,
    Exp,
    SignExtend,
    Lt,
    Gt,
    SLt,
    SGt,
    Eq,
    IsZero,
    And,
    Or,
    Xor,
    Not,
    Byte,
    Sha3,
    Address,
    Balance,
    Origin,
    Caller,
    CallValue,
    CallDataLoad,
    CallDataSize,
    CallDataCopy,
    CodeSize,
    CodeCopy,
    GasPrice,
    ExtCodeSize,
    ExtCodeCopy,
    BlockHash,
    Coinbase,
    Timestamp,
    Number,
    Difficulty,
    GasLimit,
    Pop,
    MLoad,
    MStore,
    MStore8,
    SLoad,
    SStore,
    Jump,
    JumpI,
    Pc,
    MSize,
    Gas,
    JumpDest,
    Push(u8, Word),
    Dup(u8),
    Swap(u8),
    Log(u8),
    Create,
    Call,
    CallCode,
    Return,
    DelegateCall,
    SelfDestruct,
    /// The designated INVALID opcode or any byte without a definition.
    Invalid(u8),
}

impl Instruction {
    pub fn from_opcode(code: u8, data: Word) -> Self {
        match code {
            0x00 => Self::Stop,
            0x01 => Self::Add,
            0x02 => Self::Mul,
            0x03 => Self::Sub,
            0x04 => Self::Div,
            0x05 => Self::SDiv,
            0x06 => Self::Mod,
            0x07 => Self::SMod,
            0x08 => Self::AddMod,
            0x09 => Self::MulMod,
            0x0a => Self::Exp,
            0x0b => Self::SignExtend,
            0x10 => Self::Lt,
            0x11 => Self::Gt,
            0x12 => Self::SLt,
            0x13 => Self::SGt,
            0x14 => Self::Eq,
            0x15 => Self::IsZero,
            0x16 => Self::And,
            0x17 => Self::Or,
            0x18 => Self::Xor,
            0x19 => Self::Not,
            0x1a => Self::Byte,
            0x20 => Self::Sha3,
            0x30 => Self::Address,
            0x31 => Self::Balance,
            0x32 => Self::Origin,
            0x33 => Self::Caller,
            0x34 => Self::CallValue,
            0x35 => Self::CallDataLoad,
            0x36 => Self::CallDataSize,
            0x37 => Self::CallDataCopy,
            0x38 => Self::CodeSize,
            0x39 => Self::CodeCopy,
            0x3a => Self::GasPrice,
            0x3b => Self::ExtCodeSize,
            0x3c => Self::ExtCodeCopy,
            0x40 => Self::BlockHash,
            0x41 => Self::Coinbase,
            0x42 => Self::Timestamp,
            0x43 => Self::Number,
            0x44 => Self::Difficulty,
            0x45 => Self::GasLimit,
            0x50 => Self::Pop,
            0x51 => Self::MLoad,
            0x52 => Self::MStore,
            0x53 => Self::MStore8,
            0x54 => Self::SLoad,
            0x55 => Self::SStore,
            0x56 => Self::Jump,
            0x57 => Self::JumpI,
            0x58 => Self::Pc,
            0x59 => Self::MSize,
            0x5a => Self::Gas,
            0x5b => Self::JumpDest,
            0x60..=0x7f => Self::Push(code - opcodes::PUSH1 + 1, data),
            0x80..=0x8f => Self::Dup(code - opcodes::DUP1 + 1),
            0x90..=0x9f => Self::Swap(code - opcodes::SWAP1 + 1),
            0xa0..=0xa4 => Self::Log(code - opcodes::LOG0),
            0xf0 => Self::Create,
            0xf1 => Self::Call,
            0xf2 => Self::CallCode,
            0xf3 => Self::Return,
            0xf4 => Self::DelegateCall,
            0xff => Self::SelfDestruct,
            other => Self::Invalid(other),
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            Self::Stop => 0x00,
            Self::Add => 0x01,
            Self::Mul => 0x02,
            Self::Sub => 0x03,
            Self::Div => 0x04,
            Self::SDiv => 0x05,
            Self::Mod => 0x06,
            Self::SMod => 0x07,
            Self::AddMod => 0x08,
            Self::MulMod => 0x09,
            Self::Exp => 0x0a,
            Self::SignExtend => 0x0b,
            Self::Lt => 0x10,
            Self::Gt => 0x11,
            Self::SLt => 0x12,
            Self::SGt => 0x13,
            Self::Eq => 0x14,
            Self::IsZero => 0x15,
            Self::And => 0x16,
            Self::Or => 0x17,
            Self::Xor => 0x18,
            Self::Not => 0x19,
            Self::Byte => 0x1a,
            Self::Sha3 => 0x20,
            Self::Address => 0x30,
            Self::Balance => 0x31,
            Self::Origin => 0x32,
            Self::Caller => 0x33,
            Self::CallValue => 0x34,
            Self::CallDataLoad => 0x35,
            Self::CallDataSize => 0x36,
            Self::CallDataCopy => 0x37,
            Self::CodeSize => 0x38,
            Self::CodeCopy => 0x39,
            Self::GasPrice => 0x3a,
            Self::ExtCodeSize => 0x3b,
            Self::ExtCodeCopy => 0x3c,
            Self::BlockHash => 0x40,
            Self::Coinbase => 0x41,
            Self::Timestamp => 0x42,
            Self::Number => 0x43,
            Self::Difficulty => 0x44,
            Self::GasLimit => 0x45,
            Self::Pop => 0x50,
            Self::MLoad => 0x51,
            Self::MStore => 0x52,
            Self::MStore8 => 0x53,
            Self::SLoad => 0x54,
            Self::SStore => 0x55,
            Self::Jump => 0x56,
            Self::JumpI => 0x57,
            Self::Pc => 0x58,
            Self::MSize => 0x59,
            Self::Gas => 0x5a,
            Self::JumpDest => opcodes::JUMPDEST,
            Self::Push(n, _) => opcodes::PUSH1 + n - 1,
            Self::Dup(n) => opcodes::DUP1 + n - 1,
            Self::Swap(n) => opcodes::SWAP1 + n - 1,
            Self::Log(n) => opcodes::LOG0 + n,
            Self::Create => 0xf0,
            Self::Call => 0xf1,
            Self::CallCode => 0xf2,
            Self::Return => 0xf3,
            Self::DelegateCall => 0xf4,
            Self::SelfDestruct => 0xff,
            Self::Invalid(code) => *code,
        }
    }

    pub fn name(&self) -> String {
        get_opcode(self.opcode()).name()
    }

    /// Number of code bytes the instruction occupies.
    pub fn width(&self) -> usize {
        match self {
            Self::Push(n, _) => 1 + *n as usize,
            _ => 1,
        }
    }

    /// Number of stack words consumed.
    pub fn arity(&self) -> usize {
        match self {
            Self::Stop
            | Self::JumpDest
            | Self::Invalid(_)
            | Self::Push(..)
            | Self::Address
            | Self::Origin
            | Self::Caller
            | Self::CallValue
            | Self::CallDataSize
            | Self::CodeSize
            | Self::GasPrice
            | Self::Coinbase
            | Self::Timestamp
            | Self::Number
            | Self::Difficulty
            | Self::GasLimit
            | Self::Pc
            | Self::MSize
            | Self::Gas => 0,
            Self::IsZero
            | Self::Not
            | Self::Balance
            | Self::CallDataLoad
            | Self::ExtCodeSize
            | Self::BlockHash
            | Self::Pop
            | Self::MLoad
            | Self::SLoad
            | Self::Jump
            | Self::SelfDestruct => 1,
            Self::Add
            | Self::Mul
            | Self::Sub
            | Self::Div
            | Self::SDiv
            | Self::Mod
            | Self::SMod
            | Self::Exp
            | Self::SignExtend
            | Self::Lt
            | Self::Gt
            | Self::SLt
            | Self::SGt
            | Self::Eq
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::Byte
            | Self::Sha3
            | Self::MStore
            | Self::MStore8
            | Self::SStore
            | Self::JumpI
            | Self::Return => 2,
            Self::AddMod | Self::MulMod | Self::CallDataCopy | Self::CodeCopy | Self::Create => 3,
            Self::ExtCodeCopy => 4,
            Self::DelegateCall => 6,
            Self::Call | Self::CallCode => 7,
            Self::Dup(n) => *n as usize,
            Self::Swap(n) => *n as usize + 1,
            Self::Log(n) => *n as usize + 2,
        }
    }

    /// Number of stack words pushed back.
    pub fn produces(&self) -> usize {
        match self {
            Self::Dup(n) | Self::Swap(n) => *n as usize + 1,
            Self::Stop
            | Self::JumpDest
            | Self::Invalid(_)
            | Self::Pop
            | Self::MStore
            | Self::MStore8
            | Self::SStore
            | Self::Jump
            | Self::JumpI
            | Self::Return
            | Self::SelfDestruct
            | Self::CallDataCopy
            | Self::CodeCopy
            | Self::ExtCodeCopy
            | Self::Log(_) => 0,
            _ => 1,
        }
    }

    /// Appends the byte code. PUSH data is written as its low `n` bytes,
    /// wider data is truncated to fit.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode());
        if let Self::Push(n, data) = self {
            let bytes = data.into_bytes();
            out.extend_from_slice(&bytes[32 - *n as usize..]);
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Push(n, data) => {
                let bytes = data.into_bytes();
                write!(f, "{} 0x{}", self.name(), hex::encode(&bytes[32 - *n as usize..]))
            }
            Self::Invalid(code) if *code != opcodes::INVALID => write!(f, "INVALID({code:#04x})"),
            _ => f.write_str(&self.name()),
        }
    }
}

#[derive(Default)]
struct Inner {
    code: Vec<u8>,
    instructions: BTreeMap<usize, Instruction>,
}

/// Decoded program: instruction offset to instruction. Offsets inside
/// PUSH immediate data are unmapped. Cheap to clone.
#[derive(Clone, Default)]
pub struct Program(Arc<Inner>);

impl Program {
    /// Assemble a program. Decoding its code gives back `instructions` as long
    /// as every PUSH immediate fits in the PUSH width, see [`Instruction::encode`].
    pub fn from_instructions(instructions: &[Instruction]) -> Self {
        let mut code = Vec::new();
        for instruction in instructions {
            instruction.encode(&mut code);
        }
        Decoder::decode_padded(&code)
    }

    pub fn code(&self) -> &[u8] {
        &self.0.code
    }

    pub fn len(&self) -> usize {
        self.0.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.code.is_empty()
    }

    pub fn get(&self, offset: usize) -> Option<&Instruction> {
        self.0.instructions.get(&offset)
    }

    pub fn instructions(&self) -> impl Iterator<Item = (usize, &Instruction)> {
        self.0.instructions.iter().map(|(offset, i)| (*offset, i))
    }

    pub fn is_jumpdest(&self, offset: &Word) -> bool {
        offset
            .to_usize()
            .and_then(|offset| self.get(offset))
            .is_some_and(|instruction| matches!(instruction, Instruction::JumpDest))
    }
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.0.code == other.0.code
    }
}

impl Eq for Program {}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Program(0x{})", hex::encode(&self.0.code))
    }
}

impl Serialize for Program {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex = format!("0x{}", hex::encode(&self.0.code));
        serializer.serialize_str(&hex)
    }
}

impl<'de> Deserialize<'de> for Program {
    fn deserialize<D>(deserializer: D) -> Result<Program, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let hex: String = Deserialize::deserialize(deserializer)?;
        let code = hex::decode(hex.trim_start_matches("0x")).map_err(|_| {
            D::Error::invalid_value(serde::de::Unexpected::Str(&hex), &"Invalid hex string")
        })?;
        Ok(Decoder::decode_padded(&code))
    }
}

pub struct Decoder;

impl Decoder {
    /// Strict decoding, a PUSH running past the end of code is an error.
    pub fn decode(code: &[u8]) -> Result<Program, DecoderError> {
        Self::decode_with(code, true)
    }

    /// Missing PUSH immediate bytes at the end of code read as zero.
    pub fn decode_padded(code: &[u8]) -> Program {
        Self::decode_with(code, false).unwrap_or_default()
    }

    pub fn decode_hex(hex: &str) -> Result<Program, DecoderError> {
        let code = hex::decode(hex.trim().trim_start_matches("0x"))?;
        Self::decode(&code)
    }

    fn decode_with(code: &[u8], strict: bool) -> Result<Program, DecoderError> {
        let mut instructions = BTreeMap::new();

        let mut pos = 0;
        while pos < code.len() {
            let opcode = get_opcode(code[pos]);
            let offset = pos;
            pos += 1; // Move past the opcode byte

            let push_bytes = opcode.push_len();
            let mut data = Word::zero();
            if push_bytes > 0 {
                let end = pos + push_bytes;
                if end > code.len() && strict {
                    return Err(DecoderError::UnexpectedEndOfBytecode(opcode.name(), pos));
                }
                let mut argument = code[pos..end.min(code.len())].to_vec();
                argument.resize(push_bytes, 0);
                data = Word::from_bytes(&argument);
                pos = end;
            }

            instructions.insert(offset, Instruction::from_opcode(opcode.code, data));
        }

        Ok(Program(Arc::new(Inner {
            code: code.to_vec(),
            instructions,
        })))
    }
}
