use crate::{
    common::hash::{HashFn, keccak256},
    gas::Schedule,
};

/// How CALL-family and CREATE instructions are carried out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CallMode {
    /// The callee runs in its own frame until it halts.
    #[default]
    Recursive,
    /// Attempts are only recorded in the call log, no callee code runs.
    Synchronous,
}

#[derive(Clone, Copy)]
pub struct Config {
    pub schedule: Schedule,
    pub call_mode: CallMode,
    pub hash: HashFn,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schedule: Schedule::standard(),
            call_mode: CallMode::Recursive,
            hash: keccak256,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("schedule", &self.schedule)
            .field("call_mode", &self.call_mode)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Flat fee schedule with synchronous calls, for legacy vectors.
    pub fn legacy() -> Self {
        Self {
            schedule: Schedule::reference(),
            call_mode: CallMode::Synchronous,
            ..Default::default()
        }
    }

    pub fn with_hash(self, hash: HashFn) -> Self {
        Self { hash, ..self }
    }

    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `GASKET_SCHEDULE` and `GASKET_CALL_MODE` through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let mut config = Self::default();

        if let Some(schedule) = lookup("GASKET_SCHEDULE") {
            config.schedule = match schedule.to_lowercase().as_str() {
                "standard" => Schedule::standard(),
                "tangerine" => Schedule::tangerine(),
                "reference" => Schedule::reference(),
                other => eyre::bail!("Unknown fee schedule: '{other}'."),
            };
        }

        if let Some(mode) = lookup("GASKET_CALL_MODE") {
            config.call_mode = match mode.to_lowercase().as_str() {
                "recursive" => CallMode::Recursive,
                "synchronous" => CallMode::Synchronous,
                other => eyre::bail!("Unknown call mode: '{other}'."),
            };
        }

        Ok(config)
    }
}
