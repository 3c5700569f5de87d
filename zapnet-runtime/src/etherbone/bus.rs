use core::ops::Range;
use core::ptr::{read_volatile, write_volatile};
use log::trace;

/// 32-bit register space the Etherbone executor reads and writes.
pub trait Bus {
    fn read(&mut self, addr: u32) -> u32;
    fn write(&mut self, addr: u32, value: u32);
}

impl<B: Bus + ?Sized> Bus for &mut B {
    fn read(&mut self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u32, value: u32) {
        (**self).write(addr, value)
    }
}

/// The CPU's own address space, accessed with volatile word loads and stores.
///
/// Without a window every address a peer sends is dereferenced as is. With one, accesses
/// outside it are dropped: writes are ignored and reads return 0.
pub struct MmioBus {
    window: Option<Range<u32>>,
}

impl MmioBus {
    /// # Safety
    ///
    /// Any word-aligned address a peer names will be dereferenced. Only use on a link where
    /// every peer may touch all of memory.
    pub unsafe fn new() -> Self {
        MmioBus { window: None }
    }

    /// # Safety
    ///
    /// Every word-aligned address inside `window` must be valid for volatile access.
    pub unsafe fn with_window(window: Range<u32>) -> Self {
        MmioBus {
            window: Some(window),
        }
    }

    fn allows(&self, addr: u32) -> bool {
        if addr % 4 != 0 {
            return false;
        }
        match &self.window {
            None => true,
            Some(window) => {
                addr >= window.start && addr.checked_add(4).map_or(false, |end| end <= window.end)
            }
        }
    }
}

impl Bus for MmioBus {
    fn read(&mut self, addr: u32) -> u32 {
        if !self.allows(addr) {
            trace!("etherbone read outside window: {:#010x}", addr);
            return 0;
        }
        unsafe { read_volatile(addr as usize as *const u32) }
    }

    fn write(&mut self, addr: u32, value: u32) {
        if !self.allows(addr) {
            trace!("etherbone write outside window: {:#010x}", addr);
            return;
        }
        unsafe { write_volatile(addr as usize as *mut u32, value) }
    }
}
