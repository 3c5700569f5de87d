use crate::hal::{
    Csr, EthPhy, EthmacRegisters, PhyMode, SlotMemory, ETHMAC_RX_SLOTS, ETHMAC_SLOT_SIZE, ETHMAC_TX_SLOTS,
};
use crossbeam::crossbeam_channel::{unbounded, Receiver, Sender};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// A frame the simulated MAC read out of a TX slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentFrame {
    pub slot: usize,
    pub bytes: Vec<u8>,
}

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>>>;

/// In-memory stand-in for the ethmac: a CSR file plus the slot SRAM.
///
/// Frames handed to `inject` are "DMA'd" into the next RX slot when software polls the
/// writer event and no earlier frame is still unacknowledged. Every frame software starts
/// on the reader side is copied out and pushed to a channel drained by `transmitted`. An
/// optional responder plays the peer: it sees each transmitted frame and may queue an answer.
///
/// Handles are cheap clones sharing the same device.
#[derive(Clone)]
pub struct SimEthmac {
    inner: Rc<SimState>,
}

struct SimState {
    sram: Box<[Cell<u8>]>,
    slot_size: usize,
    rx_slots: usize,
    tx_slots: usize,

    rx_queue: RefCell<VecDeque<Vec<u8>>>,
    next_rx_slot: Cell<usize>,
    writer_slot: Cell<u32>,
    writer_length: Cell<u32>,
    writer_pending: Cell<u32>,

    reader_slot: Cell<u32>,
    reader_length: Cell<u32>,
    reader_pending: Cell<u32>,
    busy_polls: Cell<u32>,
    ready_polls: Cell<u32>,

    packet_dump: Sender<SentFrame>,
    sent: Receiver<SentFrame>,
    responder: RefCell<Option<Responder>>,
}

impl Default for SimEthmac {
    fn default() -> Self {
        SimEthmac::new()
    }
}

impl SimEthmac {
    pub fn new() -> Self {
        SimEthmac::with_geometry(ETHMAC_SLOT_SIZE, ETHMAC_RX_SLOTS, ETHMAC_TX_SLOTS)
    }

    pub fn with_geometry(slot_size: usize, rx_slots: usize, tx_slots: usize) -> Self {
        let (packet_dump, sent) = unbounded();
        let sram = (0..slot_size * (rx_slots + tx_slots))
            .map(|_| Cell::new(0u8))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        SimEthmac {
            inner: Rc::new(SimState {
                sram,
                slot_size,
                rx_slots,
                tx_slots,
                rx_queue: RefCell::new(VecDeque::new()),
                next_rx_slot: Cell::new(0),
                writer_slot: Cell::new(0),
                writer_length: Cell::new(0),
                writer_pending: Cell::new(0),
                reader_slot: Cell::new(0),
                reader_length: Cell::new(0),
                reader_pending: Cell::new(0),
                busy_polls: Cell::new(0),
                ready_polls: Cell::new(0),
                packet_dump,
                sent,
                responder: RefCell::new(None),
            }),
        }
    }

    /// Slot memory backed by this device's SRAM. Valid as long as any handle is alive.
    pub fn memory(&self) -> SlotMemory {
        let state = &self.inner;
        let base = state.sram.as_ptr() as *mut u8;
        unsafe { SlotMemory::new(base, state.slot_size, state.rx_slots, state.tx_slots) }
            .expect("simulated slot geometry")
    }

    /// Queues a frame on the wire towards the device.
    pub fn inject(&self, frame: &[u8]) {
        assert!(
            frame.len() <= self.inner.slot_size,
            "injected frame larger than a slot"
        );
        self.inner.rx_queue.borrow_mut().push_back(frame.to_vec());
    }

    /// Raises the writer event with arbitrary slot and length registers.
    pub fn inject_raw(&self, slot: u32, length: u32) {
        self.inner.writer_slot.set(slot);
        self.inner.writer_length.set(length);
        self.inner.writer_pending.set(1);
    }

    /// Frames transmitted since the last call.
    pub fn transmitted(&self) -> Vec<SentFrame> {
        self.inner.sent.try_iter().collect()
    }

    pub fn pending_rx(&self) -> usize {
        self.inner.rx_queue.borrow().len() + self.inner.writer_pending.get() as usize
    }

    /// Makes the reader report busy for the next `polls` readiness checks.
    pub fn set_busy_polls(&self, polls: u32) {
        self.inner.busy_polls.set(polls);
    }

    pub fn ready_polls(&self) -> u32 {
        self.inner.ready_polls.get()
    }

    pub fn writer_pending(&self) -> u32 {
        self.inner.writer_pending.get()
    }

    pub fn reader_pending(&self) -> u32 {
        self.inner.reader_pending.get()
    }

    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + 'static,
    {
        *self.inner.responder.borrow_mut() = Some(Box::new(responder));
    }

    fn dma_next_frame(&self) {
        let state = &self.inner;
        if state.writer_pending.get() != 0 {
            return;
        }
        let frame = match state.rx_queue.borrow_mut().pop_front() {
            Some(frame) => frame,
            None => return,
        };
        let slot = state.next_rx_slot.get();
        let start = slot * state.slot_size;
        for (cell, byte) in state.sram[start..start + frame.len()].iter().zip(&frame) {
            cell.set(*byte);
        }
        state.writer_slot.set(slot as u32);
        state.writer_length.set(frame.len() as u32);
        state.writer_pending.set(1);
        state.next_rx_slot.set((slot + 1) % state.rx_slots);
    }

    fn start_reader(&self) {
        let state = &self.inner;
        let slot = state.reader_slot.get() as usize;
        let length = state.reader_length.get() as usize;
        assert!(slot < state.tx_slots, "reader started on slot {}", slot);
        assert!(length <= state.slot_size, "reader length {}", length);

        let start = (state.rx_slots + slot) * state.slot_size;
        let bytes: Vec<u8> = state.sram[start..start + length]
            .iter()
            .map(Cell::get)
            .collect();
        state.reader_pending.set(1);

        if let Some(responder) = state.responder.borrow_mut().as_mut() {
            if let Some(answer) = responder(&bytes) {
                state.rx_queue.borrow_mut().push_back(answer);
            }
        }
        state
            .packet_dump
            .try_send(SentFrame { slot, bytes })
            .expect("SimEthmac: Error sending to packet dump");
    }
}

impl EthmacRegisters for SimEthmac {
    fn read_reg(&self, reg: Csr) -> u32 {
        let state = &self.inner;
        match reg {
            Csr::WriterEvPending => {
                self.dma_next_frame();
                state.writer_pending.get()
            }
            Csr::WriterSlot => state.writer_slot.get(),
            Csr::WriterLength => state.writer_length.get(),
            Csr::ReaderReady => {
                state.ready_polls.set(state.ready_polls.get() + 1);
                match state.busy_polls.get() {
                    0 => 1,
                    n => {
                        state.busy_polls.set(n - 1);
                        0
                    }
                }
            }
            Csr::ReaderSlot => state.reader_slot.get(),
            Csr::ReaderLength => state.reader_length.get(),
            Csr::ReaderEvPending => state.reader_pending.get(),
            Csr::ReaderStart => 0,
        }
    }

    fn write_reg(&self, reg: Csr, value: u32) {
        let state = &self.inner;
        match reg {
            Csr::WriterEvPending => state.writer_pending.set(state.writer_pending.get() & !value),
            Csr::ReaderEvPending => state.reader_pending.set(state.reader_pending.get() & !value),
            Csr::ReaderSlot => state.reader_slot.set(value),
            Csr::ReaderLength => state.reader_length.set(value),
            Csr::ReaderStart if value != 0 => self.start_reader(),
            _ => {}
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhyEvent {
    Reset(bool),
    Delay(u32),
}

/// Simulated ethphy CRG and mode detector. Reset writes and delays land in one event log so
/// tests can check their order.
pub struct SimPhy {
    has_reset: bool,
    mode: Option<PhyMode>,
    events: RefCell<Vec<PhyEvent>>,
}

impl SimPhy {
    pub fn new(mode: Option<PhyMode>) -> Self {
        SimPhy {
            has_reset: true,
            mode,
            events: RefCell::new(vec![]),
        }
    }

    pub fn without_reset(mode: Option<PhyMode>) -> Self {
        SimPhy {
            has_reset: false,
            ..SimPhy::new(mode)
        }
    }

    /// Delay callback for `bring_up_phy`.
    pub fn record_delay(&self, ms: u32) {
        self.events.borrow_mut().push(PhyEvent::Delay(ms));
    }

    pub fn events(&self) -> Vec<PhyEvent> {
        self.events.borrow().clone()
    }
}

impl EthPhy for SimPhy {
    fn set_reset(&self, asserted: bool) -> bool {
        if self.has_reset {
            self.events.borrow_mut().push(PhyEvent::Reset(asserted));
        }
        self.has_reset
    }

    fn mode(&self) -> Option<PhyMode> {
        self.mode
    }
}
