use gasket::{
    Config, Executor,
    common::{Word, address::addr, call::Call},
    decoder::{Decoder, Program},
    tracer::LoggingTracer,
    world::WorldState,
};

const DEFAULT_GAS: u64 = 10_000_000;

fn dump(program: &Program) {
    println!("{:<6} {:<15} Argument", "PC", "OpCode");
    println!("{}", "─".repeat(40));

    for (offset, instruction) in program.instructions() {
        let pc = format!("{offset:#06x}");
        let name = instruction.name();
        let text = instruction.to_string();
        let argument = text.strip_prefix(&name).unwrap_or_default().trim();
        println!("{pc:<6} {name:<15} {argument}");
    }
}

fn main() -> eyre::Result<()> {
    dotenv::dotenv().ok();
    #[cfg(feature = "tracing-subscriber")]
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <bytecode> <input>", args[0]);
        std::process::exit(1);
    }

    let program = Decoder::decode_hex(&args[1])?;
    let data = hex::decode(args[2].trim_start_matches("0x"))?;
    dump(&program);

    let gas = match std::env::var("GAS") {
        Ok(gas) => Word::from(gas.parse::<u64>()?),
        Err(_) => Word::from(DEFAULT_GAS),
    };
    let from = addr("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    let to = addr("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");
    let call = Call {
        data,
        value: Word::zero(),
        origin: from,
        from,
        to,
        gas,
    };

    let config = Config::from_env()?;
    let mut executor = Executor::new(config).with_tracer(LoggingTracer::default());

    println!("\nEXECUTION:");
    let outcome = executor.execute(program, &call, WorldState::new());

    if std::env::var("TRACE").is_ok_and(|trace| trace == "1") {
        for event in executor.events() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    match &outcome.error {
        None => println!("\nOK: 0x{}", outcome.output),
        Some(e) => println!("\nFAILED: {e}"),
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
