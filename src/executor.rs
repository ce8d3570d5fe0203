use std::cmp::Ordering;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    common::{
        Hex, Word,
        address::Address,
        block::Env,
        call::{Attempt, Call},
    },
    config::{CallMode, Config},
    decoder::{Decoder, Instruction, Program},
    ext::{Ext, Finalized},
    frame::{Frame, MEMORY_LIMIT, STACK_LIMIT, padded},
    gas::{Charge, memory_ranges},
    substate::Log,
    tracer::{CallType, Event, EventData, EventTracer, NoopTracer},
    world::WorldState,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),
    #[error("No instruction at offset {0}")]
    MissingInstruction(usize),
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Invalid jump destination: {0:#x}")]
    InvalidJump(Word),
    #[error("Out of memory: {0} bytes requested")]
    OutOfMemory(Word),
    #[error("Out of gas")]
    OutOfGas,
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: Word, need: Word },
    #[error("Call depth limit reached")]
    CallDepthLimitReached,
}

pub const CALL_DEPTH_LIMIT: usize = 1024;

/// Result of a step that did not halt exceptionally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The current frame halted normally (STOP, RETURN, SELFDESTRUCT or end of code).
    Halt,
}

enum Effect {
    Next,
    Jump(usize),
    Halt,
    Enter(Box<Suspended>),
}

/// A frame waiting for its callee to halt.
#[derive(Debug)]
pub struct Suspended {
    pub frame: Frame,
    pub kind: CallType,
    /// Memory range `(offset, width)` receiving the callee output.
    ret: (Word, Word),
    /// Journal position to roll back to if the callee fails.
    checkpoint: usize,
    /// Address being deployed by CREATE.
    created: Option<Address>,
}

/// Complete state of one top-level invocation.
#[derive(Debug)]
pub struct Evm {
    pub frame: Frame,
    pub calls: Vec<Suspended>,
    pub ext: Ext,
    pub origin: Address,
    pub call_log: Vec<Attempt>,
}

impl Evm {
    pub fn new(program: Program, call: &Call, world: WorldState) -> Self {
        let frame = Frame::new(program, call.gas).with_context(
            call.to,
            call.from,
            call.value,
            call.data.clone(),
        );
        Self {
            frame,
            calls: Vec::new(),
            ext: Ext::new(world),
            origin: call.origin,
            call_log: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.calls.len()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub output: Hex,
    /// Gas left in the top-level frame, zero after an exceptional halt.
    pub gas: Word,
    pub refund: Word,
    pub logs: Vec<Log>,
    pub calls: Vec<Attempt>,
    pub world: WorldState,
    #[serde(skip)]
    pub error: Option<ExecutorError>,
}

fn size(len: &Word) -> Result<usize, ExecutorError> {
    len.to_usize()
        .filter(|len| *len <= MEMORY_LIMIT)
        .ok_or(ExecutorError::OutOfMemory(*len))
}

pub struct Executor<T: EventTracer = NoopTracer> {
    config: Config,
    env: Env,
    tracer: T,
    forks: Vec<T>,
}

impl Executor<NoopTracer> {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            env: Env::default(),
            tracer: NoopTracer,
            forks: Vec::new(),
        }
    }
}

impl<T: EventTracer> Executor<T> {
    pub fn with_env(self, env: Env) -> Self {
        Self { env, ..self }
    }

    pub fn with_tracer<G: EventTracer>(self, tracer: G) -> Executor<G> {
        Executor {
            config: self.config,
            env: self.env,
            tracer,
            forks: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> Vec<Event> {
        self.tracer.get()
    }

    pub fn execute(&mut self, program: Program, call: &Call, world: WorldState) -> Outcome {
        self.run(Evm::new(program, call, world))
    }

    /// Steps until the top-level frame halts, then finalizes.
    pub fn run(&mut self, mut evm: Evm) -> Outcome {
        debug!(
            to = %evm.frame.id,
            from = %evm.frame.caller,
            gas = %evm.frame.gas.limit,
            "execute"
        );
        let mut pending = None;
        let result = loop {
            let halt = match pending.take() {
                Some(halt) => halt,
                None => match self.step(&mut evm) {
                    Ok(Flow::Continue) => continue,
                    Ok(Flow::Halt) => Ok(()),
                    Err(e) => Err(e),
                },
            };
            if evm.calls.is_empty() {
                break halt;
            }
            if let Err(e) = self.leave(&mut evm, halt) {
                pending = Some(Err(e));
            }
        };
        self.finalize(evm, result)
    }

    /// Retires one instruction of the current frame. An error is an
    /// exceptional halt of that frame and leaves it untouched.
    pub fn step(&mut self, evm: &mut Evm) -> Result<Flow, ExecutorError> {
        let pc = evm.frame.pc;
        if pc >= evm.frame.program.len() {
            return Ok(Flow::Halt);
        }
        let instruction = *evm
            .frame
            .program
            .get(pc)
            .ok_or(ExecutorError::MissingInstruction(pc))?;

        let charge = self.check(evm, &instruction)?;
        let gas = evm.frame.gas.remaining();
        evm.frame.gas.sub(charge.total())?;
        let args = evm.frame.stack.pop_n(instruction.arity())?;

        let depth = evm.depth();
        trace!(depth, pc, gas = %gas, cost = %charge.total(), "{instruction}");
        if self.tracer.enabled() {
            self.tracer.add(Event {
                data: EventData::OpCode {
                    pc,
                    op: instruction.opcode(),
                    name: instruction.name(),
                    gas,
                    cost: charge.total(),
                },
                depth,
                reverted: false,
            });
        }

        match self.execute_instruction(evm, &instruction, &args, charge)? {
            Effect::Next => {
                evm.frame.pc += instruction.width();
                Ok(Flow::Continue)
            }
            Effect::Jump(dest) => {
                evm.frame.pc = dest;
                Ok(Flow::Continue)
            }
            Effect::Halt => Ok(Flow::Halt),
            Effect::Enter(entry) => {
                evm.frame.pc += instruction.width();
                self.enter(evm, *entry);
                Ok(Flow::Continue)
            }
        }
    }

    /// The exceptional-halt predicate, returns the price of the instruction if it may run.
    pub fn check(&self, evm: &Evm, instruction: &Instruction) -> Result<Charge, ExecutorError> {
        let frame = &evm.frame;
        let stack = &frame.stack;
        let arg = |n: usize| stack.peek(n).copied().unwrap_or_default();

        if let Instruction::Invalid(code) = instruction {
            return Err(ExecutorError::InvalidOpcode(*code));
        }

        let arity = instruction.arity();
        if stack.len() < arity {
            return Err(ExecutorError::StackUnderflow);
        }
        if stack.len() - arity + instruction.produces() > STACK_LIMIT {
            return Err(ExecutorError::StackOverflow);
        }

        let jump = match instruction {
            Instruction::Jump => Some(arg(0)),
            Instruction::JumpI if !arg(1).is_zero() => Some(arg(0)),
            _ => None,
        };
        if let Some(dest) = jump {
            if !frame.program.is_jumpdest(&dest) {
                return Err(ExecutorError::InvalidJump(dest));
            }
        }

        for (_, len) in memory_ranges(instruction, stack) {
            size(&len)?;
        }

        let mut charge = self.config.schedule.cost(instruction, frame, &evm.ext);
        if self.config.call_mode == CallMode::Synchronous {
            charge.forward = Word::zero();
        }
        if charge.total() > frame.gas.remaining() {
            return Err(ExecutorError::OutOfGas);
        }

        if self.config.call_mode == CallMode::Synchronous {
            let need = match instruction {
                Instruction::Call | Instruction::CallCode => Some(arg(2)),
                Instruction::DelegateCall => Some(Word::zero()),
                Instruction::Create => Some(arg(0)),
                _ => None,
            };
            if let Some(need) = need {
                if evm.depth() >= CALL_DEPTH_LIMIT {
                    return Err(ExecutorError::CallDepthLimitReached);
                }
                let have = evm.ext.balance(&frame.id);
                if have < need {
                    return Err(ExecutorError::InsufficientFunds { have, need });
                }
            }
        }

        Ok(charge)
    }

    fn execute_instruction(
        &mut self,
        evm: &mut Evm,
        instruction: &Instruction,
        args: &[Word],
        charge: Charge,
    ) -> Result<Effect, ExecutorError> {
        let a = |i: usize| args[i];
        let value = match instruction {
            Instruction::Add => a(0).wrapping_add(a(1)),
            Instruction::Mul => a(0).wrapping_mul(a(1)),
            Instruction::Sub => a(0).wrapping_sub(a(1)),
            Instruction::Div => a(0).div(a(1)),
            Instruction::SDiv => a(0).sdiv(a(1)),
            Instruction::Mod => a(0).rem(a(1)),
            Instruction::SMod => a(0).smod(a(1)),
            Instruction::AddMod => a(0).add_modulo(&a(1), &a(2)),
            Instruction::MulMod => a(0).mul_modulo(&a(1), &a(2)),
            Instruction::Exp => a(0).pow(a(1)),
            Instruction::SignExtend => a(1).sign_extend(a(0)),
            Instruction::Lt => Word::from(a(0) < a(1)),
            Instruction::Gt => Word::from(a(0) > a(1)),
            Instruction::SLt => Word::from(a(0).signed_cmp(&a(1)) == Ordering::Less),
            Instruction::SGt => Word::from(a(0).signed_cmp(&a(1)) == Ordering::Greater),
            Instruction::Eq => Word::from(a(0) == a(1)),
            Instruction::IsZero => Word::from(a(0).is_zero()),
            Instruction::And => a(0) & a(1),
            Instruction::Or => a(0) | a(1),
            Instruction::Xor => a(0) ^ a(1),
            Instruction::Not => !a(0),
            Instruction::Byte => a(1).byte(a(0)),
            Instruction::Sha3 => {
                let data = evm.frame.memory.load(&a(0), size(&a(1))?);
                Word::from_bytes(&(self.config.hash)(&data))
            }
            Instruction::Address => evm.frame.id.as_word(),
            Instruction::Balance => {
                let address = Address::from(&a(0));
                evm.ext.touch(&address);
                evm.ext.balance(&address)
            }
            Instruction::Origin => evm.origin.as_word(),
            Instruction::Caller => evm.frame.caller.as_word(),
            Instruction::CallValue => evm.frame.value,
            Instruction::CallDataLoad => Word::from_bytes(&padded(&evm.frame.data, &a(0), 32)),
            Instruction::CallDataSize => Word::from(evm.frame.data.len()),
            Instruction::CodeSize => Word::from(evm.frame.program.len()),
            Instruction::GasPrice => self.env.gas_price,
            Instruction::ExtCodeSize => {
                let address = Address::from(&a(0));
                evm.ext.touch(&address);
                Word::from(evm.ext.code(&address).len())
            }
            Instruction::BlockHash => self.env.block_hash(&a(0), self.config.hash),
            Instruction::Coinbase => self.env.coinbase.as_word(),
            Instruction::Timestamp => self.env.timestamp,
            Instruction::Number => self.env.number,
            Instruction::Difficulty => self.env.difficulty,
            Instruction::GasLimit => self.env.gas_limit,
            Instruction::MLoad => Word::from_bytes(&evm.frame.memory.load(&a(0), 32)),
            Instruction::SLoad => evm.ext.storage(&evm.frame.id, &a(0)),
            Instruction::Pc => Word::from(evm.frame.pc),
            Instruction::MSize => evm.frame.memory.size(),
            Instruction::Gas => evm.frame.gas.remaining(),
            Instruction::Push(_, data) => *data,
            _ => return self.apply(evm, instruction, args, charge),
        };
        evm.frame.stack.push(value)?;
        Ok(Effect::Next)
    }

    /// Instructions with an effect other than pushing a single word.
    fn apply(
        &mut self,
        evm: &mut Evm,
        instruction: &Instruction,
        args: &[Word],
        charge: Charge,
    ) -> Result<Effect, ExecutorError> {
        let schedule = self.config.schedule;
        match instruction {
            Instruction::Stop => {
                evm.frame.output.clear();
                Ok(Effect::Halt)
            }
            Instruction::CallDataCopy => {
                let frame = &mut evm.frame;
                frame
                    .memory
                    .copy(&args[0], &frame.data, &args[1], size(&args[2])?);
                Ok(Effect::Next)
            }
            Instruction::CodeCopy => {
                let program = evm.frame.program.clone();
                evm.frame
                    .memory
                    .copy(&args[0], program.code(), &args[1], size(&args[2])?);
                Ok(Effect::Next)
            }
            Instruction::ExtCodeCopy => {
                let address = Address::from(&args[0]);
                evm.ext.touch(&address);
                let program = evm.ext.code(&address);
                evm.frame
                    .memory
                    .copy(&args[1], program.code(), &args[2], size(&args[3])?);
                Ok(Effect::Next)
            }
            Instruction::Pop | Instruction::JumpDest => Ok(Effect::Next),
            Instruction::MStore => {
                evm.frame.memory.store(&args[0], &args[1].into_bytes());
                Ok(Effect::Next)
            }
            Instruction::MStore8 => {
                evm.frame
                    .memory
                    .store(&args[0], &[args[1].low_u64() as u8]);
                Ok(Effect::Next)
            }
            Instruction::SStore => {
                let id = evm.frame.id;
                let current = evm.ext.storage(&id, &args[0]);
                if !current.is_zero() && args[1].is_zero() {
                    evm.ext
                        .refund(&evm.origin, Word::from(schedule.sstore_refund));
                }
                evm.ext.set_storage(&id, args[0], args[1]);
                Ok(Effect::Next)
            }
            Instruction::Jump => self.jump(&args[0]),
            Instruction::JumpI => {
                if args[1].is_zero() {
                    Ok(Effect::Next)
                } else {
                    self.jump(&args[0])
                }
            }
            Instruction::Dup(n) => {
                for word in args.iter().rev() {
                    evm.frame.stack.push(*word)?;
                }
                evm.frame.stack.push(args[*n as usize - 1])?;
                Ok(Effect::Next)
            }
            Instruction::Swap(n) => {
                let mut words = args.to_vec();
                words.swap(0, *n as usize);
                for word in words.iter().rev() {
                    evm.frame.stack.push(*word)?;
                }
                Ok(Effect::Next)
            }
            Instruction::Log(_) => {
                let data = evm.frame.memory.load(&args[0], size(&args[1])?);
                evm.ext.log(Log {
                    address: evm.frame.id,
                    topics: args[2..].to_vec(),
                    data: data.into(),
                });
                Ok(Effect::Next)
            }
            Instruction::Create => self.create(evm, args, charge.forward),
            Instruction::Call | Instruction::CallCode | Instruction::DelegateCall => {
                self.call(evm, instruction, args, charge.forward)
            }
            Instruction::Return => {
                evm.frame.output = evm.frame.memory.load(&args[0], size(&args[1])?);
                Ok(Effect::Halt)
            }
            Instruction::SelfDestruct => {
                let id = evm.frame.id;
                let beneficiary = Address::from(&args[0]);
                let balance = evm.ext.balance(&id);
                if beneficiary != id {
                    let have = evm.ext.balance(&beneficiary);
                    evm.ext
                        .set_balance(&beneficiary, have.saturating_add(balance));
                }
                evm.ext.set_balance(&id, Word::zero());
                if evm.ext.destroy(&id) {
                    evm.ext
                        .refund(&evm.origin, Word::from(schedule.selfdestruct_refund));
                }
                evm.frame.output.clear();
                Ok(Effect::Halt)
            }
            Instruction::Invalid(code) => Err(ExecutorError::InvalidOpcode(*code)),
            // single-word results are handled by the caller
            _ => Ok(Effect::Next),
        }
    }

    fn jump(&self, dest: &Word) -> Result<Effect, ExecutorError> {
        dest.to_usize()
            .map(Effect::Jump)
            .ok_or(ExecutorError::InvalidJump(*dest))
    }

    fn call(
        &mut self,
        evm: &mut Evm,
        instruction: &Instruction,
        args: &[Word],
        forward: Word,
    ) -> Result<Effect, ExecutorError> {
        let (kind, value, input, ret) = match instruction {
            Instruction::Call => (CallType::Call, args[2], (args[3], args[4]), (args[5], args[6])),
            Instruction::CallCode => (CallType::Code, args[2], (args[3], args[4]), (args[5], args[6])),
            _ => (CallType::Delegate, evm.frame.value, (args[2], args[3]), (args[4], args[5])),
        };
        let target = Address::from(&args[1]);

        let data = evm.frame.memory.load(&input.0, size(&input.1)?);
        evm.frame.memory.touch(&ret.0, &ret.1);
        evm.call_log.push(Attempt {
            target,
            value,
            data: data.clone().into(),
        });

        if self.config.call_mode == CallMode::Synchronous {
            let width = size(&ret.1)?.min(evm.frame.output.len());
            let output = evm.frame.output[..width].to_vec();
            evm.frame.memory.store(&ret.0, &output);
            evm.frame.stack.push(Word::one())?;
            return Ok(Effect::Next);
        }

        let id = evm.frame.id;
        let transfers = kind != CallType::Delegate && !value.is_zero();
        if evm.depth() >= CALL_DEPTH_LIMIT || (transfers && evm.ext.balance(&id) < value) {
            debug!(depth = evm.depth(), %target, %value, "call rejected");
            evm.frame.gas.add(forward);
            evm.frame.stack.push(Word::zero())?;
            return Ok(Effect::Next);
        }

        let gas = if transfers {
            forward.saturating_add(Word::from(self.config.schedule.call_stipend))
        } else {
            forward
        };
        let (callee, caller) = match kind {
            CallType::Call => (target, id),
            CallType::Code => (id, id),
            _ => (id, evm.frame.caller),
        };

        let checkpoint = evm.ext.checkpoint();
        if kind == CallType::Call {
            evm.ext.touch(&target);
        }
        if transfers {
            evm.ext.transfer(&id, &callee, value)?;
        }

        let frame =
            Frame::new(evm.ext.code(&target), gas).with_context(callee, caller, value, data);
        Ok(Effect::Enter(Box::new(Suspended {
            frame,
            kind,
            ret,
            checkpoint,
            created: None,
        })))
    }

    fn create(&mut self, evm: &mut Evm, args: &[Word], forward: Word) -> Result<Effect, ExecutorError> {
        let value = args[0];
        let init = evm.frame.memory.load(&args[1], size(&args[2])?);

        let id = evm.frame.id;
        let address = id.create(evm.ext.nonce(&id), self.config.hash);
        evm.call_log.push(Attempt {
            target: address,
            value,
            data: init.clone().into(),
        });

        if self.config.call_mode == CallMode::Synchronous {
            let have = evm.ext.balance(&id);
            evm.ext.set_balance(&id, have.saturating_sub(value));
            evm.ext.bump_nonce(&id);
            evm.frame.stack.push(Word::one())?;
            return Ok(Effect::Next);
        }

        if evm.depth() >= CALL_DEPTH_LIMIT || evm.ext.balance(&id) < value {
            debug!(depth = evm.depth(), %address, %value, "create rejected");
            evm.frame.gas.add(forward);
            evm.frame.stack.push(Word::zero())?;
            return Ok(Effect::Next);
        }

        evm.ext.bump_nonce(&id);
        if !evm.ext.code(&address).is_empty() || !evm.ext.nonce(&address).is_zero() {
            debug!(%address, "create collision");
            evm.frame.stack.push(Word::zero())?;
            return Ok(Effect::Next);
        }

        let checkpoint = evm.ext.checkpoint();
        evm.ext.touch(&address);
        evm.ext.transfer(&id, &address, value)?;

        let frame = Frame::new(Decoder::decode_padded(&init), forward)
            .with_context(address, id, value, Vec::new());
        Ok(Effect::Enter(Box::new(Suspended {
            frame,
            kind: CallType::Create,
            ret: (Word::zero(), Word::zero()),
            checkpoint,
            created: Some(address),
        })))
    }

    /// Suspends the current frame and makes the callee current.
    fn enter(&mut self, evm: &mut Evm, mut entry: Suspended) {
        let depth = evm.depth() + 1;
        debug!(
            depth,
            kind = ?entry.kind,
            from = %entry.frame.caller,
            to = %entry.frame.id,
            gas = %entry.frame.gas.limit,
            "enter"
        );
        if self.tracer.enabled() {
            self.tracer.add(Event {
                data: EventData::Call {
                    kind: entry.kind,
                    from: entry.frame.caller,
                    to: entry.frame.id,
                    value: entry.frame.value,
                    data: entry.frame.data.clone().into(),
                    gas: entry.frame.gas.limit,
                },
                depth,
                reverted: false,
            });
        }
        let child = self.tracer.fork();
        self.forks.push(std::mem::replace(&mut self.tracer, child));

        std::mem::swap(&mut evm.frame, &mut entry.frame);
        evm.calls.push(entry);
    }

    /// Resumes the suspended caller of a halted frame and hands it the result.
    fn leave(&mut self, evm: &mut Evm, halt: Result<(), ExecutorError>) -> Result<(), ExecutorError> {
        let depth = evm.depth();
        let Some(mut entry) = evm.calls.pop() else {
            return Ok(());
        };
        std::mem::swap(&mut evm.frame, &mut entry.frame);
        let callee = entry.frame;

        let mut result = halt;
        let mut gas = callee.gas.remaining();
        if let (Ok(()), Some(address)) = (&result, entry.created) {
            let deposit = Word::from(self.config.schedule.code_deposit)
                .saturating_mul(Word::from(callee.output.len()));
            if deposit > gas {
                result = Err(ExecutorError::OutOfGas);
            } else {
                gas = gas.wrapping_sub(deposit);
                evm.ext
                    .set_code(&address, Decoder::decode_padded(&callee.output));
            }
        }

        match &result {
            Ok(()) => {
                debug!(depth, gas = %gas, output = callee.output.len(), "leave");
                if self.tracer.enabled() {
                    self.tracer.add(Event {
                        data: EventData::Return {
                            data: callee.output.clone().into(),
                            gas,
                        },
                        depth,
                        reverted: false,
                    });
                }
                evm.frame.gas.add(gas);
            }
            Err(e) => {
                debug!(depth, pc = callee.pc, "leave: {e}");
                if self.tracer.enabled() {
                    self.tracer.add(Event {
                        data: EventData::Halt {
                            reason: e.to_string(),
                        },
                        depth,
                        reverted: true,
                    });
                }
                evm.ext.revert(entry.checkpoint);
            }
        }
        if let Some(parent) = self.forks.pop() {
            let child = std::mem::replace(&mut self.tracer, parent);
            self.tracer.join(child, result.is_err());
        }

        match (result, entry.created) {
            (Ok(()), Some(address)) => evm.frame.stack.push(address.as_word()),
            (Ok(()), None) => {
                let (offset, width) = entry.ret;
                let width = size(&width)?.min(callee.output.len());
                evm.frame.memory.store(&offset, &callee.output[..width]);
                evm.frame.stack.push(Word::one())
            }
            (Err(_), _) => evm.frame.stack.push(Word::zero()),
        }
    }

    fn finalize(&mut self, evm: Evm, result: Result<(), ExecutorError>) -> Outcome {
        let Evm {
            frame,
            mut ext,
            call_log,
            ..
        } = evm;

        let (success, output, gas, error) = match result {
            Ok(()) => (true, frame.output, frame.gas.remaining(), None),
            Err(e) => {
                warn!(pc = frame.pc, id = %frame.id, "exceptional halt: {e}");
                if self.tracer.enabled() {
                    self.tracer.add(Event {
                        data: EventData::Halt {
                            reason: e.to_string(),
                        },
                        depth: 0,
                        reverted: true,
                    });
                }
                ext.revert(0);
                (false, Vec::new(), Word::zero(), Some(e))
            }
        };

        let Finalized {
            world,
            logs,
            refund,
        } = ext.finalize();
        debug!(success, gas = %gas, refund = %refund, logs = logs.len(), "finalized");

        Outcome {
            success,
            output: output.into(),
            gas,
            refund,
            logs,
            calls: call_log,
            world,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::address::addr, tracer::LoggingTracer};

    fn evm(instructions: &[Instruction], gas: u64) -> Evm {
        let call = Call {
            to: addr("0x0a"),
            gas: Word::from(gas),
            ..Default::default()
        };
        Evm::new(Program::from_instructions(instructions), &call, WorldState::new())
    }

    fn push(n: u64) -> Instruction {
        Instruction::Push(1, Word::from(n))
    }

    #[test]
    fn test_step_retires_one_instruction() {
        let mut executor = Executor::new(Config::default());
        let mut evm = evm(&[push(1), push(2), Instruction::Add], 100);

        assert_eq!(executor.step(&mut evm), Ok(Flow::Continue));
        assert_eq!(evm.frame.pc, 2);
        assert_eq!(evm.frame.gas.remaining(), Word::from(97));

        executor.step(&mut evm).unwrap();
        executor.step(&mut evm).unwrap();
        assert_eq!(evm.frame.stack.as_slice(), &[Word::from(3)]);
        assert_eq!(evm.frame.pc, 5);

        assert_eq!(executor.step(&mut evm), Ok(Flow::Halt));
    }

    #[test]
    fn test_failed_step_mutates_nothing() {
        let mut executor = Executor::new(Config::default());
        let mut evm = evm(&[push(1), Instruction::Add], 100);
        executor.step(&mut evm).unwrap();
        let frame = evm.frame.clone();

        assert_eq!(executor.step(&mut evm), Err(ExecutorError::StackUnderflow));
        assert_eq!(evm.frame, frame);
    }

    #[test]
    fn test_out_of_gas_step_mutates_nothing() {
        let mut executor = Executor::new(Config::default());

        // PUSH1 7, PUSH1 1, SSTORE with gas for the pushes only
        let mut evm = evm(&[push(7), push(1), Instruction::SStore], 6);
        executor.step(&mut evm).unwrap();
        executor.step(&mut evm).unwrap();
        let frame = evm.frame.clone();
        let world = evm.ext.world().clone();

        assert_eq!(executor.step(&mut evm), Err(ExecutorError::OutOfGas));
        assert_eq!(evm.frame, frame);
        assert_eq!(evm.ext.world(), &world);
        assert_eq!(evm.ext.checkpoint(), 0);

        // PUSH1 1, PUSH1 64, MSTORE: 3 plus 9 for three words of memory, 5 left
        let mut evm = self::evm(&[push(1), push(64), Instruction::MStore], 11);
        executor.step(&mut evm).unwrap();
        executor.step(&mut evm).unwrap();
        let frame = evm.frame.clone();

        assert_eq!(executor.step(&mut evm), Err(ExecutorError::OutOfGas));
        assert_eq!(evm.frame, frame);
        assert_eq!(evm.frame.memory.words(), Word::zero());
        assert_eq!(evm.frame.gas.remaining(), Word::from(5));
        assert_eq!(evm.frame.pc, 4);
    }

    #[test]
    fn test_only_recording_tracers_get_events() {
        let mut executor = Executor::new(Config::default()).with_tracer(LoggingTracer::default());
        let outcome = executor.run(evm(&[push(1), push(2), Instruction::Add], 100));
        assert!(outcome.success);
        let ops = executor
            .events()
            .into_iter()
            .map(|event| match event.data {
                EventData::OpCode { name, .. } => name,
                other => format!("{other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(ops, vec!["PUSH1", "PUSH1", "ADD"]);

        let mut executor = Executor::new(Config::default());
        executor.run(evm(&[push(1)], 100));
        assert!(executor.events().is_empty());
    }

    #[test]
    fn test_predicate_order() {
        let executor = Executor::new(Config::default());

        // underflow wins over out of gas
        let evm = evm(&[Instruction::Add], 0);
        assert_eq!(
            executor.check(&evm, &Instruction::Add),
            Err(ExecutorError::StackUnderflow)
        );
        assert_eq!(
            executor.check(&evm, &Instruction::Invalid(0xfe)),
            Err(ExecutorError::InvalidOpcode(0xfe))
        );
        assert_eq!(
            executor.check(&evm, &Instruction::Pc),
            Err(ExecutorError::OutOfGas)
        );
    }

    #[test]
    fn test_overflow() {
        let executor = Executor::new(Config::default());
        let mut evm = evm(&[], 100);
        for _ in 0..STACK_LIMIT {
            evm.frame.stack.push(Word::one()).unwrap();
        }
        assert_eq!(
            executor.check(&evm, &Instruction::Dup(1)),
            Err(ExecutorError::StackOverflow)
        );
        assert_eq!(
            executor.check(&evm, &Instruction::Swap(1)),
            Ok(Charge {
                gas: Word::from(3),
                forward: Word::zero()
            })
        );
    }

    #[test]
    fn test_jumpi_checks_destination_only_when_taken() {
        let mut executor = Executor::new(Config::default());
        // PUSH1 0, PUSH1 7, JUMPI, STOP
        let mut evm = evm(&[push(0), push(7), Instruction::JumpI, Instruction::Stop], 100);
        executor.step(&mut evm).unwrap();
        executor.step(&mut evm).unwrap();
        assert_eq!(executor.step(&mut evm), Ok(Flow::Continue));
        assert_eq!(evm.frame.pc, 5);

        let mut evm = self::evm(&[push(1), push(7), Instruction::JumpI], 100);
        executor.step(&mut evm).unwrap();
        executor.step(&mut evm).unwrap();
        assert_eq!(
            executor.step(&mut evm),
            Err(ExecutorError::InvalidJump(Word::from(7)))
        );
    }

    #[test]
    fn test_dup_and_swap() {
        let mut executor = Executor::new(Config::default());
        let mut evm = evm(
            &[push(1), push(2), push(3), Instruction::Dup(3), Instruction::Swap(2)],
            100,
        );
        for _ in 0..4 {
            executor.step(&mut evm).unwrap();
        }
        let words = |v: &[u64]| v.iter().map(|n| Word::from(*n)).collect::<Vec<_>>();
        assert_eq!(evm.frame.stack.as_slice(), words(&[1, 2, 3, 1]).as_slice());
        executor.step(&mut evm).unwrap();
        assert_eq!(evm.frame.stack.as_slice(), words(&[1, 1, 3, 2]).as_slice());
    }

    #[test]
    fn test_memory_access_limit() {
        let mut executor = Executor::new(Config::legacy());
        // PUSH4 0x02000001, PUSH1 0, RETURN
        let mut evm = evm(
            &[
                Instruction::Push(4, Word::from(MEMORY_LIMIT + 1)),
                push(0),
                Instruction::Return,
            ],
            100,
        );
        executor.step(&mut evm).unwrap();
        executor.step(&mut evm).unwrap();
        assert_eq!(
            executor.step(&mut evm),
            Err(ExecutorError::OutOfMemory(Word::from(MEMORY_LIMIT + 1)))
        );
    }

    #[test]
    fn test_empty_program_halts_normally() {
        let mut executor = Executor::new(Config::default());
        let outcome = executor.run(evm(&[], 100));
        assert!(outcome.success);
        assert_eq!(outcome.gas, Word::from(100));
        assert!(outcome.output.as_slice().is_empty());
    }
}
