use crate::etherbone::Bus;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusAccess {
    Read(u32, u32),
    Write(u32, u32),
}

/// Word-addressed memory that logs every access. Unwritten words read as 0.
#[derive(Clone, Debug, Default)]
pub struct RecordingBus {
    memory: HashMap<u32, u32>,
    accesses: Vec<BusAccess>,
}

impl RecordingBus {
    pub fn new() -> Self {
        RecordingBus::default()
    }

    /// Sets a word without logging an access.
    pub fn poke(&mut self, addr: u32, value: u32) {
        self.memory.insert(addr, value);
    }

    pub fn peek(&self, addr: u32) -> u32 {
        self.memory.get(&addr).copied().unwrap_or(0)
    }

    pub fn accesses(&self) -> &[BusAccess] {
        &self.accesses
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.accesses
            .iter()
            .filter_map(|access| match access {
                BusAccess::Write(addr, value) => Some((*addr, *value)),
                BusAccess::Read(..) => None,
            })
            .collect()
    }
}

impl Bus for RecordingBus {
    fn read(&mut self, addr: u32) -> u32 {
        let value = self.peek(addr);
        self.accesses.push(BusAccess::Read(addr, value));
        value
    }

    fn write(&mut self, addr: u32, value: u32) {
        self.memory.insert(addr, value);
        self.accesses.push(BusAccess::Write(addr, value));
    }
}
