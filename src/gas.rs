use crate::{
    common::{Word, address::Address},
    decoder::Instruction,
    ext::Ext,
    frame::{Frame, Stack},
};

/// Fee schedule. Flat costs are in gas units, the `*_word` and `*_byte`
/// entries are charged per 32-byte word or per byte of the operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub zero: u64,
    pub base: u64,
    pub very_low: u64,
    pub low: u64,
    pub mid: u64,
    pub jumpi: u64,
    pub jumpdest: u64,
    pub exp: u64,
    pub exp_byte: u64,
    pub sha3: u64,
    pub sha3_word: u64,
    pub copy: u64,
    pub extcodecopy: u64,
    pub copy_word: u64,
    pub log: u64,
    pub log_topic: u64,
    pub log_byte: u64,
    pub balance: u64,
    pub extcode: u64,
    pub sload: u64,
    pub blockhash: u64,
    pub create: u64,
    pub sstore_set: u64,
    pub sstore_reset: u64,
    pub sstore_refund: u64,
    pub call: u64,
    pub call_value: u64,
    pub call_new_account: u64,
    pub call_stipend: u64,
    pub selfdestruct: u64,
    pub selfdestruct_new_account: u64,
    pub selfdestruct_refund: u64,
    pub code_deposit: u64,
    /// Charge for memory growth (`3a + a²/512` for `a` words).
    pub memory: bool,
    /// Cap forwarded gas at all but one 64th of what is left.
    pub all_but_one_64th: bool,
}

impl Schedule {
    /// EIP-150 fee schedule.
    pub const fn tangerine() -> Self {
        Self {
            zero: 0,
            base: 2,
            very_low: 3,
            low: 5,
            mid: 8,
            jumpi: 10,
            jumpdest: 1,
            exp: 10,
            exp_byte: 10,
            sha3: 30,
            sha3_word: 6,
            copy: 3,
            extcodecopy: 700,
            copy_word: 3,
            log: 375,
            log_topic: 375,
            log_byte: 8,
            balance: 400,
            extcode: 700,
            sload: 200,
            blockhash: 20,
            create: 32000,
            sstore_set: 20000,
            sstore_reset: 5000,
            sstore_refund: 15000,
            call: 700,
            call_value: 9000,
            call_new_account: 25000,
            call_stipend: 2300,
            selfdestruct: 5000,
            selfdestruct_new_account: 25000,
            selfdestruct_refund: 24000,
            code_deposit: 200,
            memory: true,
            all_but_one_64th: true,
        }
    }

    /// Flat costs of [`Schedule::reference`] with every surcharge taken from
    /// [`Schedule::tangerine`]: per-word and per-byte costs, memory growth,
    /// call and self-destruct costs, code deposit and 1/64 forwarding.
    pub const fn standard() -> Self {
        let eip150 = Self::tangerine();
        Self {
            exp_byte: eip150.exp_byte,
            sha3_word: eip150.sha3_word,
            copy_word: eip150.copy_word,
            log_byte: eip150.log_byte,
            call: eip150.call,
            call_value: eip150.call_value,
            call_new_account: eip150.call_new_account,
            call_stipend: eip150.call_stipend,
            selfdestruct: eip150.selfdestruct,
            selfdestruct_new_account: eip150.selfdestruct_new_account,
            code_deposit: eip150.code_deposit,
            memory: eip150.memory,
            all_but_one_64th: eip150.all_but_one_64th,
            ..Self::reference()
        }
    }

    /// Flat costs only: per-unit surcharges, call and self-destruct costs
    /// and memory growth are free.
    pub const fn reference() -> Self {
        Self {
            zero: 0,
            base: 2,
            very_low: 3,
            low: 5,
            mid: 8,
            jumpi: 8,
            jumpdest: 1,
            exp: 10,
            exp_byte: 0,
            sha3: 30,
            sha3_word: 0,
            copy: 6,
            extcodecopy: 703,
            copy_word: 0,
            log: 375,
            log_topic: 8,
            log_byte: 0,
            balance: 400,
            extcode: 700,
            sload: 200,
            blockhash: 20,
            create: 32000,
            sstore_set: 20000,
            sstore_reset: 5000,
            sstore_refund: 15000,
            call: 0,
            call_value: 0,
            call_new_account: 0,
            call_stipend: 0,
            selfdestruct: 0,
            selfdestruct_new_account: 0,
            selfdestruct_refund: 24000,
            code_deposit: 0,
            memory: false,
            all_but_one_64th: false,
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::standard()
    }
}

/// Price of one instruction: `gas` is spent by the instruction itself,
/// `forward` is handed over to the callee of CALL-family and CREATE.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Charge {
    pub gas: Word,
    pub forward: Word,
}

impl Charge {
    pub fn total(&self) -> Word {
        self.gas.saturating_add(self.forward)
    }
}

fn arg(stack: &Stack, n: usize) -> Word {
    stack.peek(n).copied().unwrap_or_default()
}

/// Memory ranges `(offset, len)` an instruction reads or writes, from its stack arguments.
pub fn memory_ranges(instruction: &Instruction, stack: &Stack) -> Vec<(Word, Word)> {
    let range = |offset: usize, len: usize| (arg(stack, offset), arg(stack, len));
    match instruction {
        Instruction::Sha3 | Instruction::Log(_) | Instruction::Return => vec![range(0, 1)],
        Instruction::CallDataCopy | Instruction::CodeCopy => vec![range(0, 2)],
        Instruction::ExtCodeCopy => vec![range(1, 3)],
        Instruction::MLoad | Instruction::MStore => vec![(arg(stack, 0), Word::from(32))],
        Instruction::MStore8 => vec![(arg(stack, 0), Word::one())],
        Instruction::Create => vec![range(1, 2)],
        Instruction::Call | Instruction::CallCode => vec![range(3, 4), range(5, 6)],
        Instruction::DelegateCall => vec![range(2, 3), range(4, 5)],
        _ => vec![],
    }
}

const MEMORY_WORDS_CAP: u64 = 0xffff_ffff;

/// Total cost of `words` words of memory.
fn memory_fee(words: &Word) -> Word {
    let words = words.low_u64();
    let linear = words * 3;
    let quadratic = words * words / 512;
    Word::from(linear + quadratic)
}

impl Schedule {
    /// Memory growth surcharge for an instruction touching `ranges`.
    pub fn memory_cost(&self, frame: &Frame, ranges: &[(Word, Word)]) -> Word {
        if !self.memory {
            return Word::zero();
        }
        let words = ranges
            .iter()
            .map(|(offset, len)| frame.memory.expanded(offset, len))
            .max()
            .unwrap_or_default();
        let current = frame.memory.words();
        if words <= current {
            return Word::zero();
        }
        if words > Word::from(MEMORY_WORDS_CAP) {
            return Word::max();
        }
        memory_fee(&words).saturating_sub(memory_fee(&current))
    }

    /// At most `requested` out of `available`, keeping one 64th back when enabled.
    pub fn callee_gas(&self, requested: Word, available: Word) -> Word {
        let cap = if self.all_but_one_64th {
            available.wrapping_sub(available.div(Word::from(64)))
        } else {
            available
        };
        requested.min(cap)
    }

    /// Cost of executing `instruction` in `frame`, the stack holds at least its arity.
    pub fn cost(&self, instruction: &Instruction, frame: &Frame, ext: &Ext) -> Charge {
        let stack = &frame.stack;
        let flat = |gas: u64| Word::from(gas);
        let per = |unit: u64, n: Word| Word::from(unit).saturating_mul(n);

        let gas = match instruction {
            Instruction::Stop | Instruction::Return | Instruction::Invalid(_) => flat(self.zero),
            Instruction::Address
            | Instruction::Origin
            | Instruction::Caller
            | Instruction::CallValue
            | Instruction::CallDataSize
            | Instruction::CodeSize
            | Instruction::GasPrice
            | Instruction::Coinbase
            | Instruction::Timestamp
            | Instruction::Number
            | Instruction::Difficulty
            | Instruction::GasLimit
            | Instruction::Pop
            | Instruction::Pc
            | Instruction::MSize
            | Instruction::Gas => flat(self.base),
            Instruction::Add
            | Instruction::Sub
            | Instruction::Not
            | Instruction::Lt
            | Instruction::Gt
            | Instruction::SLt
            | Instruction::SGt
            | Instruction::Eq
            | Instruction::IsZero
            | Instruction::And
            | Instruction::Or
            | Instruction::Xor
            | Instruction::Byte
            | Instruction::CallDataLoad
            | Instruction::MLoad
            | Instruction::MStore
            | Instruction::MStore8
            | Instruction::Push(..)
            | Instruction::Dup(_)
            | Instruction::Swap(_) => flat(self.very_low),
            Instruction::Mul
            | Instruction::Div
            | Instruction::SDiv
            | Instruction::Mod
            | Instruction::SMod
            | Instruction::SignExtend => flat(self.low),
            Instruction::AddMod | Instruction::MulMod | Instruction::Jump => flat(self.mid),
            Instruction::JumpI => flat(self.jumpi),
            Instruction::JumpDest => flat(self.jumpdest),
            Instruction::Exp => {
                let bytes = Word::from(arg(stack, 1).byte_len());
                flat(self.exp).saturating_add(per(self.exp_byte, bytes))
            }
            Instruction::Sha3 => {
                flat(self.sha3).saturating_add(per(self.sha3_word, arg(stack, 1).words()))
            }
            Instruction::CallDataCopy | Instruction::CodeCopy => {
                flat(self.copy).saturating_add(per(self.copy_word, arg(stack, 2).words()))
            }
            Instruction::ExtCodeCopy => {
                flat(self.extcodecopy).saturating_add(per(self.copy_word, arg(stack, 3).words()))
            }
            Instruction::Balance => flat(self.balance),
            Instruction::ExtCodeSize => flat(self.extcode),
            Instruction::BlockHash => flat(self.blockhash),
            Instruction::SLoad => flat(self.sload),
            Instruction::SStore => {
                let current = ext.storage(&frame.id, &arg(stack, 0));
                if current.is_zero() && !arg(stack, 1).is_zero() {
                    flat(self.sstore_set)
                } else {
                    flat(self.sstore_reset)
                }
            }
            Instruction::Log(n) => flat(self.log)
                .saturating_add(per(self.log_topic, Word::from(*n)))
                .saturating_add(per(self.log_byte, arg(stack, 1))),
            Instruction::Create => flat(self.create),
            Instruction::Call | Instruction::CallCode | Instruction::DelegateCall => {
                let target = Address::from(&arg(stack, 1));
                let transfers = !matches!(instruction, Instruction::DelegateCall)
                    && !arg(stack, 2).is_zero();
                let mut gas = flat(self.call);
                if transfers {
                    gas = gas.saturating_add(flat(self.call_value));
                }
                if matches!(instruction, Instruction::Call) && !ext.exists(&target) {
                    gas = gas.saturating_add(flat(self.call_new_account));
                }
                gas
            }
            Instruction::SelfDestruct => {
                let beneficiary = Address::from(&arg(stack, 0));
                if ext.exists(&beneficiary) {
                    flat(self.selfdestruct)
                } else {
                    flat(self.selfdestruct).saturating_add(flat(self.selfdestruct_new_account))
                }
            }
        };

        let ranges = memory_ranges(instruction, stack);
        let gas = gas.saturating_add(self.memory_cost(frame, &ranges));

        let forward = match instruction {
            Instruction::Call | Instruction::CallCode | Instruction::DelegateCall => {
                self.callee_gas(arg(stack, 0), frame.gas.remaining().saturating_sub(gas))
            }
            Instruction::Create => {
                let available = frame.gas.remaining().saturating_sub(gas);
                self.callee_gas(available, available)
            }
            _ => Word::zero(),
        };

        Charge { gas, forward }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::account::Account,
        decoder::Program,
        world::WorldState,
    };

    fn frame(stack: &[u64], gas: u64) -> Frame {
        let mut frame = Frame::new(Program::default(), Word::from(gas));
        for value in stack.iter().rev() {
            frame.stack.push(Word::from(*value)).unwrap();
        }
        frame
    }

    #[test]
    fn test_sstore() {
        let schedule = Schedule::reference();
        let ext = Ext::new(WorldState::new());
        // SSTORE(key=5, value=0) and SSTORE(key=5, value=7) on an absent key
        let clear = schedule.cost(&Instruction::SStore, &frame(&[5, 0], 100000), &ext);
        assert_eq!(clear.gas, Word::from(5000));
        let set = schedule.cost(&Instruction::SStore, &frame(&[5, 7], 100000), &ext);
        assert_eq!(set.gas, Word::from(20000));

        let ext = Ext::new(WorldState::new().with_account(
            Address::zero(),
            Account::default().with_storage(Word::from(5), Word::one()),
        ));
        let reset = schedule.cost(&Instruction::SStore, &frame(&[5, 7], 100000), &ext);
        assert_eq!(reset.gas, Word::from(5000));
    }

    #[test]
    fn test_dynamic_costs() {
        let ext = Ext::new(WorldState::new());
        let tangerine = Schedule::tangerine();
        let reference = Schedule::reference();

        let exp = frame(&[2, 0x1234], 100);
        assert_eq!(tangerine.cost(&Instruction::Exp, &exp, &ext).gas, Word::from(30));
        assert_eq!(reference.cost(&Instruction::Exp, &exp, &ext).gas, Word::from(10));

        let log = frame(&[0, 0, 1, 2], 10000);
        assert_eq!(tangerine.cost(&Instruction::Log(2), &log, &ext).gas, Word::from(1125));
        assert_eq!(reference.cost(&Instruction::Log(2), &log, &ext).gas, Word::from(391));

        let copy = frame(&[0, 0, 0], 100);
        assert_eq!(reference.cost(&Instruction::CodeCopy, &copy, &ext).gas, Word::from(6));
        assert_eq!(tangerine.cost(&Instruction::CodeCopy, &copy, &ext).gas, Word::from(3));
        assert_eq!(reference.cost(&Instruction::JumpI, &copy, &ext).gas, Word::from(8));
    }

    #[test]
    fn test_standard_keeps_flat_costs() {
        let ext = Ext::new(WorldState::new());
        let standard = Schedule::standard();
        assert_eq!(Schedule::default(), standard);

        let jumpi = frame(&[7, 1], 100);
        assert_eq!(standard.cost(&Instruction::JumpI, &jumpi, &ext).gas, Word::from(8));
        assert_eq!(
            Schedule::tangerine().cost(&Instruction::JumpI, &jumpi, &ext).gas,
            Word::from(10)
        );

        let log = frame(&[0, 0, 1, 2], 10000);
        assert_eq!(standard.cost(&Instruction::Log(2), &log, &ext).gas, Word::from(391));
        // 4 bytes of data, one word of memory
        let log = frame(&[0, 4, 1, 2], 10000);
        assert_eq!(
            standard.cost(&Instruction::Log(2), &log, &ext).gas,
            Word::from(391 + 32 + 3)
        );

        let copy = frame(&[0, 0, 64], 100);
        assert_eq!(
            standard.cost(&Instruction::CodeCopy, &copy, &ext).gas,
            Word::from(6 + 2 * 3 + 2 * 3)
        );
        let exp = frame(&[2, 0x1234], 100);
        assert_eq!(standard.cost(&Instruction::Exp, &exp, &ext).gas, Word::from(30));

        let call = frame(&[1000, 0x0a, 1, 0, 0, 0, 0], 100_000);
        let charge = standard.cost(&Instruction::Call, &call, &ext);
        assert_eq!(charge.gas, Word::from(700 + 9000 + 25000));
        assert_eq!(charge.forward, Word::from(1000));
    }

    #[test]
    fn test_memory_growth() {
        let ext = Ext::new(WorldState::new());
        let tangerine = Schedule::tangerine();

        // MSTORE at 0: one word, 3 + 3
        let mstore = frame(&[0, 1], 100);
        assert_eq!(tangerine.cost(&Instruction::MStore, &mstore, &ext).gas, Word::from(6));
        assert_eq!(
            Schedule::reference().cost(&Instruction::MStore, &mstore, &ext).gas,
            Word::from(3)
        );

        // 1024 words: 3 * 1024 + 1024 * 1024 / 512
        let far = frame(&[32 * 1023, 1], 100000);
        assert_eq!(
            tangerine.cost(&Instruction::MStore, &far, &ext).gas,
            Word::from(3 + 3 * 1024 + 2048)
        );

        let mut huge = frame(&[0, 1], 100);
        huge.stack = Stack::default();
        huge.stack.push(Word::one()).unwrap();
        huge.stack.push(Word::max()).unwrap();
        assert_eq!(tangerine.cost(&Instruction::MStore, &huge, &ext).gas, Word::max());
    }

    #[test]
    fn test_zero_length_access_is_free() {
        let ext = Ext::new(WorldState::new());
        let sha3 = frame(&[1 << 40, 0], 100);
        assert_eq!(
            Schedule::tangerine().cost(&Instruction::Sha3, &sha3, &ext).gas,
            Word::from(30)
        );
    }

    #[test]
    fn test_call_forwarding() {
        let ext = Ext::new(WorldState::new());
        let tangerine = Schedule::tangerine();

        // gas, target, value, in offset, in len, out offset, out len
        let call = frame(&[1_000_000, 0x0a, 0, 0, 0, 0, 0], 100_000);
        let charge = tangerine.cost(&Instruction::Call, &call, &ext);
        assert_eq!(charge.gas, Word::from(700 + 25000));
        let available = 100_000 - 700 - 25000;
        assert_eq!(charge.forward, Word::from(available - available / 64));

        let call = frame(&[1000, 0x0a, 1, 0, 0, 0, 0], 100_000);
        let charge = tangerine.cost(&Instruction::CallCode, &call, &ext);
        assert_eq!(charge.gas, Word::from(700 + 9000));
        assert_eq!(charge.forward, Word::from(1000));

        let create = frame(&[0, 0, 0], 100_000);
        let charge = tangerine.cost(&Instruction::Create, &create, &ext);
        assert_eq!(charge.gas, Word::from(32000));
        assert_eq!(charge.forward, Word::from(68000 - 68000 / 64));

        let charge = Schedule::reference().cost(&Instruction::Create, &create, &ext);
        assert_eq!(charge.forward, Word::from(68000));
    }
}
