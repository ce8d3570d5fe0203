pub mod common;
pub mod config;
pub mod decoder;
pub mod executor;
pub mod ext;
pub mod frame;
pub mod gas;
pub mod opcodes;
pub mod substate;
pub mod tracer;
pub mod world;

pub use config::{CallMode, Config};
pub use executor::{Evm, Executor, ExecutorError, Outcome};
