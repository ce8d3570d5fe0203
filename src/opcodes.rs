use once_cell::sync::Lazy;

/// Static description of one opcode byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub code: u8,
    pub name: String,
    /// Bytes of immediate data following the opcode, nonzero for PUSH only.
    pub immediate: usize,
}

impl Opcode {
    pub fn name(&self) -> String {
        self.name.clone()
    }

    pub fn is_defined(&self) -> bool {
        self.name != UNDEFINED
    }

    pub(crate) fn push_len(&self) -> usize {
        self.immediate
    }
}

pub const STOP: u8 = 0x00;
pub const JUMPDEST: u8 = 0x5b;
pub const PUSH1: u8 = 0x60;
pub const DUP1: u8 = 0x80;
pub const SWAP1: u8 = 0x90;
pub const LOG0: u8 = 0xa0;
pub const INVALID: u8 = 0xfe;

const UNDEFINED: &str = "undefined";

/// Contiguous runs of named opcodes, keyed by the first code of the run.
const RUNS: &[(u8, &[&str])] = &[
    (
        STOP,
        &[
            "STOP", "ADD", "MUL", "SUB", "DIV", "SDIV", "MOD", "SMOD", "ADDMOD", "MULMOD", "EXP",
            "SIGNEXTEND",
        ],
    ),
    (
        0x10,
        &[
            "LT", "GT", "SLT", "SGT", "EQ", "ISZERO", "AND", "OR", "XOR", "NOT", "BYTE",
        ],
    ),
    (0x20, &["SHA3"]),
    (
        0x30,
        &[
            "ADDRESS",
            "BALANCE",
            "ORIGIN",
            "CALLER",
            "CALLVALUE",
            "CALLDATALOAD",
            "CALLDATASIZE",
            "CALLDATACOPY",
            "CODESIZE",
            "CODECOPY",
            "GASPRICE",
            "EXTCODESIZE",
            "EXTCODECOPY",
        ],
    ),
    (
        0x40,
        &[
            "BLOCKHASH",
            "COINBASE",
            "TIMESTAMP",
            "NUMBER",
            "DIFFICULTY",
            "GASLIMIT",
        ],
    ),
    (
        0x50,
        &[
            "POP", "MLOAD", "MSTORE", "MSTORE8", "SLOAD", "SSTORE", "JUMP", "JUMPI", "PC",
            "MSIZE", "GAS", "JUMPDEST",
        ],
    ),
    (
        0xf0,
        &["CREATE", "CALL", "CALLCODE", "RETURN", "DELEGATECALL"],
    ),
    (INVALID, &["INVALID", "SELFDESTRUCT"]),
];

/// Numbered families: first code, name prefix, size, number of the first member.
const FAMILIES: &[(u8, &str, u8, u8)] = &[
    (PUSH1, "PUSH", 32, 1),
    (DUP1, "DUP", 16, 1),
    (SWAP1, "SWAP", 16, 1),
    (LOG0, "LOG", 5, 0),
];

static OPCODES: Lazy<Vec<Opcode>> = Lazy::new(|| {
    let mut table = (0..=u8::MAX)
        .map(|code| Opcode {
            code,
            name: UNDEFINED.to_string(),
            immediate: 0,
        })
        .collect::<Vec<_>>();

    for (first, names) in RUNS {
        for (i, name) in names.iter().enumerate() {
            table[*first as usize + i].name = name.to_string();
        }
    }

    for (first, prefix, size, base) in FAMILIES {
        for i in 0..*size {
            let opcode = &mut table[(*first + i) as usize];
            opcode.name = format!("{prefix}{}", base + i);
            if *first == PUSH1 {
                opcode.immediate = i as usize + 1;
            }
        }
    }

    table
});

pub fn get_opcode(value: u8) -> &'static Opcode {
    &OPCODES[value as usize]
}
