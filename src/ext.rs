use crate::{
    common::{Word, account::Account, address::Address},
    decoder::Program,
    executor::ExecutorError,
    substate::{Log, Substate},
    world::WorldState,
};

/// Undo record of a single mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Touch {
    Created(Address),
    Balance(Address, Word),
    Nonce(Address, Word),
    Code(Address, Program),
    Storage(Address, Word, Word),
    Destroyed(Address),
    Refund(Address, Word),
    Log,
}

/// World state and substate of one invocation, with every mutation journaled
/// so that a failed frame can be rolled back to its checkpoint.
#[derive(Debug, Default)]
pub struct Ext {
    world: WorldState,
    substate: Substate,
    journal: Vec<Touch>,
}

pub struct Finalized {
    pub world: WorldState,
    pub logs: Vec<Log>,
    pub refund: Word,
}

impl Ext {
    pub fn new(world: WorldState) -> Self {
        Self {
            world,
            ..Default::default()
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn substate(&self) -> &Substate {
        &self.substate
    }

    pub fn checkpoint(&self) -> usize {
        self.journal.len()
    }

    /// Undo everything recorded after `checkpoint`, latest first.
    pub fn revert(&mut self, checkpoint: usize) {
        while self.journal.len() > checkpoint {
            let Some(touch) = self.journal.pop() else {
                break;
            };
            match touch {
                Touch::Created(address) => {
                    self.world.remove(&address);
                }
                Touch::Balance(address, old) => {
                    if let Some(account) = self.world.get_mut(&address) {
                        account.balance = old;
                    }
                }
                Touch::Nonce(address, old) => {
                    if let Some(account) = self.world.get_mut(&address) {
                        account.nonce = old;
                    }
                }
                Touch::Code(address, old) => {
                    if let Some(account) = self.world.get_mut(&address) {
                        account.code = old;
                    }
                }
                Touch::Storage(address, key, old) => {
                    if let Some(account) = self.world.get_mut(&address) {
                        account.put(key, old);
                    }
                }
                Touch::Destroyed(address) => {
                    self.substate.destroyed.remove(&address);
                }
                Touch::Refund(address, old) => {
                    if old.is_zero() {
                        self.substate.refunds.remove(&address);
                    } else {
                        self.substate.refunds.insert(address, old);
                    }
                }
                Touch::Log => {
                    self.substate.logs.pop();
                }
            }
        }
    }

    fn account_mut(&mut self, address: &Address) -> &mut Account {
        let (account, created) = self.world.entry(*address);
        if created {
            self.journal.push(Touch::Created(*address));
        }
        account
    }

    pub fn exists(&self, address: &Address) -> bool {
        self.world.exists(address)
    }

    /// Materializes an empty account at `address` if there is none.
    pub fn touch(&mut self, address: &Address) {
        self.account_mut(address);
    }

    pub fn balance(&self, address: &Address) -> Word {
        self.world.balance(address)
    }

    pub fn nonce(&self, address: &Address) -> Word {
        self.world.nonce(address)
    }

    pub fn code(&self, address: &Address) -> Program {
        self.world.code(address)
    }

    pub fn storage(&self, address: &Address, key: &Word) -> Word {
        self.world.storage(address, key)
    }

    pub fn set_balance(&mut self, address: &Address, balance: Word) {
        let account = self.account_mut(address);
        let old = account.balance;
        account.balance = balance;
        self.journal.push(Touch::Balance(*address, old));
    }

    pub fn transfer(&mut self, from: &Address, to: &Address, value: Word) -> Result<(), ExecutorError> {
        let have = self.balance(from);
        if have < value {
            return Err(ExecutorError::InsufficientFunds { have, need: value });
        }
        self.set_balance(from, have.wrapping_sub(value));
        let dst = self.balance(to);
        self.set_balance(to, dst.wrapping_add(value));
        Ok(())
    }

    /// Returns the nonce before the increment.
    pub fn bump_nonce(&mut self, address: &Address) -> Word {
        let account = self.account_mut(address);
        let old = account.nonce;
        account.nonce = old.saturating_add(Word::one());
        self.journal.push(Touch::Nonce(*address, old));
        old
    }

    pub fn set_code(&mut self, address: &Address, code: Program) {
        let account = self.account_mut(address);
        let old = std::mem::replace(&mut account.code, code);
        self.journal.push(Touch::Code(*address, old));
    }

    pub fn set_storage(&mut self, address: &Address, key: Word, val: Word) {
        let account = self.account_mut(address);
        let old = account.get(&key);
        account.put(key, val);
        self.journal.push(Touch::Storage(*address, key, old));
    }

    pub fn log(&mut self, log: Log) {
        self.substate.logs.push(log);
        self.journal.push(Touch::Log);
    }

    pub fn refund(&mut self, address: &Address, amount: Word) {
        let old = self.substate.refund(address);
        self.substate
            .refunds
            .insert(*address, old.saturating_add(amount));
        self.journal.push(Touch::Refund(*address, old));
    }

    /// Schedules `address` for removal, false if it already was.
    pub fn destroy(&mut self, address: &Address) -> bool {
        let inserted = self.substate.destroyed.insert(*address);
        if inserted {
            self.journal.push(Touch::Destroyed(*address));
        }
        inserted
    }

    /// Credits refunds, then removes self-destructed accounts.
    pub fn finalize(self) -> Finalized {
        let Self {
            mut world,
            substate,
            ..
        } = self;

        let refund = substate.total_refund();
        for (address, amount) in substate.refunds {
            if amount.is_zero() {
                continue;
            }
            let (account, _) = world.entry(address);
            account.balance = account.balance.saturating_add(amount);
        }
        for address in &substate.destroyed {
            world.remove(address);
        }

        Finalized {
            world,
            logs: substate.logs,
            refund,
        }
    }
}
