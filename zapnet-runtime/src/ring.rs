use crate::hal::{Csr, EthmacRegisters, SlotMemory, ETHMAC_EV_SRAM_READER, ETHMAC_EV_SRAM_WRITER};
use core::slice;
use log::{debug, warn};
use zapnet_packets::append_fcs;

/// A frame the MAC has written into an RX slot. Only `SlotRing::poll_receive` creates these,
/// so slot and length are always inside the slot memory.
#[derive(Debug, PartialEq, Eq)]
pub struct Received {
    slot: usize,
    len: usize,
}

impl Received {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Somewhere to build and send one outbound frame at a time.
pub trait FrameSink {
    /// The whole current TX slot, starting at the slot's first byte.
    fn buffer(&mut self) -> &mut [u8];

    /// Hands the first `len` bytes of the current slot to the MAC and moves on to the next
    /// slot. Returns false if the frame could not be sent.
    fn transmit(&mut self, len: usize) -> bool;
}

/// The RX/TX slot ring of the MAC. RX slots are chosen by the hardware, TX slots round-robin
/// starting from 0.
pub struct SlotRing<R: EthmacRegisters> {
    regs: R,
    memory: SlotMemory,
    tx_slot: usize,
    transmitted: u32,
    software_fcs: bool,
}

impl<R: EthmacRegisters> SlotRing<R> {
    pub fn new(regs: R, memory: SlotMemory, hw_preamble_crc: bool) -> Self {
        SlotRing {
            regs,
            memory,
            tx_slot: 0,
            transmitted: 0,
            software_fcs: !hw_preamble_crc,
        }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn memory(&self) -> &SlotMemory {
        &self.memory
    }

    pub fn tx_slot(&self) -> usize {
        self.tx_slot
    }

    /// Frames handed to the MAC since the ring was built.
    pub fn transmitted(&self) -> u32 {
        self.transmitted
    }

    /// Clears stale events on both directions and rewinds TX to slot 0.
    pub fn start(&mut self) {
        self.regs
            .write_reg(Csr::ReaderEvPending, ETHMAC_EV_SRAM_READER);
        self.regs
            .write_reg(Csr::WriterEvPending, ETHMAC_EV_SRAM_WRITER);
        self.tx_slot = 0;
        self.regs.write_reg(Csr::ReaderSlot, 0);
    }

    pub fn acquire_tx_slot(&mut self) -> &mut [u8] {
        unsafe {
            slice::from_raw_parts_mut(
                self.memory.tx_slot_ptr(self.tx_slot),
                self.memory.slot_size(),
            )
        }
    }

    pub fn transmit(&mut self, len: usize) -> bool {
        self.tx_port().transmit(len)
    }

    pub fn tx_port(&mut self) -> TxPort<'_, R> {
        TxPort {
            regs: &self.regs,
            memory: self.memory,
            tx_slot: &mut self.tx_slot,
            transmitted: &mut self.transmitted,
            software_fcs: self.software_fcs,
        }
    }

    /// Checks for a frame written by the MAC. The slot stays owned by software until
    /// `release` acknowledges the event.
    pub fn poll_receive(&mut self) -> Option<Received> {
        if self.regs.read_reg(Csr::WriterEvPending) & ETHMAC_EV_SRAM_WRITER == 0 {
            return None;
        }
        let slot = self.regs.read_reg(Csr::WriterSlot) as usize;
        let len = self.regs.read_reg(Csr::WriterLength) as usize;
        if slot >= self.memory.rx_slots() || len > self.memory.slot_size() {
            debug!("ethmac reported slot {} length {}, dropping", slot, len);
            self.acknowledge();
            return None;
        }
        Some(Received { slot, len })
    }

    /// Returns the slot to the MAC.
    pub fn release(&mut self, _received: Received) {
        self.acknowledge();
    }

    /// Received bytes and a transmit handle at once; RX and TX slots never overlap.
    pub fn split(&mut self, received: &Received) -> (&[u8], TxPort<'_, R>) {
        let frame = unsafe {
            slice::from_raw_parts(self.memory.rx_slot_ptr(received.slot), received.len)
        };
        let port = TxPort {
            regs: &self.regs,
            memory: self.memory,
            tx_slot: &mut self.tx_slot,
            transmitted: &mut self.transmitted,
            software_fcs: self.software_fcs,
        };
        (frame, port)
    }

    fn acknowledge(&self) {
        self.regs
            .write_reg(Csr::WriterEvPending, ETHMAC_EV_SRAM_WRITER);
    }
}

/// Exclusive handle on the current TX slot.
pub struct TxPort<'a, R: EthmacRegisters> {
    regs: &'a R,
    memory: SlotMemory,
    tx_slot: &'a mut usize,
    transmitted: &'a mut u32,
    software_fcs: bool,
}

impl<R: EthmacRegisters> FrameSink for TxPort<'_, R> {
    fn buffer(&mut self) -> &mut [u8] {
        unsafe {
            slice::from_raw_parts_mut(
                self.memory.tx_slot_ptr(*self.tx_slot),
                self.memory.slot_size(),
            )
        }
    }

    fn transmit(&mut self, len: usize) -> bool {
        let mut len = len;
        if self.software_fcs {
            match append_fcs(self.buffer(), len) {
                Ok(with_fcs) => len = with_fcs,
                Err(e) => {
                    warn!("not sending {} byte frame: {}", len, e);
                    return false;
                }
            }
        }
        if len > self.memory.slot_size() {
            warn!("not sending {} byte frame: larger than a slot", len);
            return false;
        }

        while !self.regs.is_ready() {
            core::hint::spin_loop();
        }
        self.regs.write_reg(Csr::ReaderSlot, *self.tx_slot as u32);
        self.regs.write_reg(Csr::ReaderLength, len as u32);
        self.regs.write_reg(Csr::ReaderStart, 1);
        *self.tx_slot = (*self.tx_slot + 1) % self.memory.tx_slots();
        *self.transmitted = self.transmitted.wrapping_add(1);
        true
    }
}
