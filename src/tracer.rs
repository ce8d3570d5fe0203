use serde::Serialize;

use crate::common::{Hex, Word, address::Address};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum CallType {
    #[default]
    Call,
    Code,
    Delegate,
    Create,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventData {
    OpCode {
        pc: usize,
        op: u8,
        name: String,
        gas: Word,
        cost: Word,
    },
    Call {
        kind: CallType,
        from: Address,
        to: Address,
        value: Word,
        data: Hex,
        gas: Word,
    },
    Return {
        data: Hex,
        gas: Word,
    },
    Halt {
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Event {
    pub data: EventData,
    pub depth: usize,
    pub reverted: bool,
}

#[allow(unused_variables)] // default impl ignores all arguments
pub trait EventTracer: Default {
    /// False when events are dropped anyway, so callers can skip building them.
    fn enabled(&self) -> bool {
        true
    }
    fn get(&self) -> Vec<Event> {
        vec![]
    }
    fn add(&mut self, event: Event) {}
    fn fork(&self) -> Self {
        Self::default()
    }
    /// Takes over the events of a finished callee.
    fn join(&mut self, other: Self, reverted: bool) {
        for mut event in other.get() {
            event.reverted |= reverted;
            self.add(event);
        }
    }
}

#[derive(Default)]
pub struct NoopTracer;

impl EventTracer for NoopTracer {
    fn enabled(&self) -> bool {
        false
    }
}

#[derive(Default)]
pub struct LoggingTracer(Vec<Event>);

impl EventTracer for LoggingTracer {
    fn get(&self) -> Vec<Event> {
        self.0.clone()
    }

    fn add(&mut self, event: Event) {
        self.0.push(event);
    }
}
