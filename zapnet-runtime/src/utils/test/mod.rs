//! Host-side doubles for exercising a link without hardware.

pub mod bus;
pub mod sim;

use crate::hal::ETHMAC_SLOT_SIZE;
use crate::ring::FrameSink;

/// A TX slot that keeps a copy of every frame sent out of it.
pub struct VecSink {
    slot: Vec<u8>,
    pub sent: Vec<Vec<u8>>,
}

impl Default for VecSink {
    fn default() -> Self {
        VecSink::new()
    }
}

impl VecSink {
    pub fn new() -> Self {
        VecSink {
            slot: vec![0; ETHMAC_SLOT_SIZE],
            sent: vec![],
        }
    }
}

impl FrameSink for VecSink {
    fn buffer(&mut self) -> &mut [u8] {
        &mut self.slot
    }

    fn transmit(&mut self, len: usize) -> bool {
        if len > self.slot.len() {
            return false;
        }
        self.sent.push(self.slot[..len].to_vec());
        true
    }
}
