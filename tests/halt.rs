use gasket::{
    Config, Executor, ExecutorError, Outcome,
    common::{Word, account::Account, address::addr, call::Call},
    decoder::{Decoder, DecoderError},
    world::WorldState,
};
use pretty_assertions::assert_eq;

fn run(code: &str, gas: u64, world: WorldState) -> eyre::Result<Outcome> {
    let program = Decoder::decode_hex(code)?;
    let call = Call {
        data: Vec::new(),
        value: Word::zero(),
        origin: addr("0x0b"),
        from: addr("0x0b"),
        to: addr("0x0a"),
        gas: Word::from(gas),
    };
    Ok(Executor::new(Config::default()).execute(program, &call, world))
}

fn failed(code: &str) -> eyre::Result<ExecutorError> {
    let outcome = run(code, 100_000, WorldState::new())?;
    assert!(!outcome.success);
    assert_eq!(outcome.gas, Word::zero());
    assert!(outcome.output.as_slice().is_empty());
    outcome
        .error
        .ok_or_else(|| eyre::eyre!("exceptional halt without a cause"))
}

#[test]
fn test_jump_to_push() -> eyre::Result<()> {
    // PUSH1 0, JUMP
    assert_eq!(failed("600056")?, ExecutorError::InvalidJump(Word::zero()));
    Ok(())
}

#[test]
fn test_jump_into_push_data() -> eyre::Result<()> {
    // PUSH1 0x5b, PUSH1 1, JUMP: offset 1 holds the JUMPDEST byte as data
    assert_eq!(failed("605b600156")?, ExecutorError::InvalidJump(Word::one()));
    Ok(())
}

#[test]
fn test_jump_to_jumpdest() -> eyre::Result<()> {
    // PUSH1 4, JUMP, INVALID, JUMPDEST, STOP
    let outcome = run("600456fe5b00", 100_000, WorldState::new())?;
    assert!(outcome.success);
    assert_eq!(outcome.gas, Word::from(100_000 - 3 - 8 - 1));
    Ok(())
}

#[test]
fn test_running_off_the_end_is_a_stop() -> eyre::Result<()> {
    let outcome = run("6001", 100_000, WorldState::new())?;
    assert!(outcome.success);
    assert_eq!(outcome.gas, Word::from(100_000 - 3));
    Ok(())
}

#[test]
fn test_invalid_opcodes() -> eyre::Result<()> {
    assert_eq!(failed("fe")?, ExecutorError::InvalidOpcode(0xfe));
    assert_eq!(failed("0c")?, ExecutorError::InvalidOpcode(0x0c));
    // REVERT is not part of this instruction set
    assert_eq!(failed("60006000fd")?, ExecutorError::InvalidOpcode(0xfd));
    Ok(())
}

#[test]
fn test_stack_underflow() -> eyre::Result<()> {
    assert_eq!(failed("600101")?, ExecutorError::StackUnderflow);
    Ok(())
}

#[test]
fn test_stack_overflow() -> eyre::Result<()> {
    let code = "58".repeat(1025);
    assert_eq!(failed(&code)?, ExecutorError::StackOverflow);
    Ok(())
}

#[test]
fn test_out_of_gas() -> eyre::Result<()> {
    let outcome = run("6001", 2, WorldState::new())?;
    assert!(!outcome.success);
    assert_eq!(outcome.error, Some(ExecutorError::OutOfGas));
    assert_eq!(outcome.gas, Word::zero());
    Ok(())
}

#[test]
fn test_failure_commits_nothing() -> eyre::Result<()> {
    let world = WorldState::new().with_account(
        addr("0x0a"),
        Account::default()
            .with_balance(Word::from(5))
            .with_storage(Word::one(), Word::from(9)),
    );
    // SSTORE(1, 0), LOG0(0, 0), INVALID
    let outcome = run("600060015560006000a0fe", 100_000, world.clone())?;
    assert!(!outcome.success);
    assert_eq!(outcome.world, world);
    assert!(outcome.logs.is_empty());
    assert_eq!(outcome.refund, Word::zero());
    Ok(())
}

#[test]
fn test_truncated_push_is_rejected_by_strict_decoding() {
    assert_eq!(
        Decoder::decode_hex("61ab").unwrap_err(),
        DecoderError::UnexpectedEndOfBytecode("PUSH2".to_string(), 1)
    );
}
