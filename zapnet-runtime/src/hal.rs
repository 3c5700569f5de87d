//! Register and SRAM access for a LiteEth-style MAC.
//!
//! The MAC exposes a writer (RX: it writes received frames into slots) and a reader (TX: it
//! reads frames out of slots) through a handful of CSRs. Everything above this module talks
//! to the hardware through `EthmacRegisters`, so host tests can swap in a simulated MAC.

use core::ptr::{read_volatile, write_volatile, NonNull};
use log::info;
use zapnet_packets::MTU;

pub const ETHMAC_SLOT_SIZE: usize = 2048;
pub const ETHMAC_RX_SLOTS: usize = 2;
pub const ETHMAC_TX_SLOTS: usize = 2;

/// Writer event bit in `WriterEvPending`.
pub const ETHMAC_EV_SRAM_WRITER: u32 = 0x1;
/// Reader event bit in `ReaderEvPending`.
pub const ETHMAC_EV_SRAM_READER: u32 = 0x1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Csr {
    WriterSlot,
    WriterLength,
    WriterEvPending,
    ReaderStart,
    ReaderReady,
    ReaderSlot,
    ReaderLength,
    ReaderEvPending,
}

pub trait EthmacRegisters {
    fn read_reg(&self, reg: Csr) -> u32;
    fn write_reg(&self, reg: Csr, value: u32);

    /// The reader can accept another frame.
    fn is_ready(&self) -> bool {
        self.read_reg(Csr::ReaderReady) != 0
    }
}

/// Byte offsets of the ethmac CSRs from the CSR bank base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CsrMap {
    pub writer_slot: usize,
    pub writer_length: usize,
    pub writer_ev_pending: usize,
    pub reader_start: usize,
    pub reader_ready: usize,
    pub reader_slot: usize,
    pub reader_length: usize,
    pub reader_ev_pending: usize,
}

impl Default for CsrMap {
    /// LiteX bank order with 32-bit CSR data width.
    fn default() -> Self {
        CsrMap {
            writer_slot: 0x00,
            writer_length: 0x04,
            writer_ev_pending: 0x10,
            reader_start: 0x18,
            reader_ready: 0x1c,
            reader_slot: 0x24,
            reader_length: 0x28,
            reader_ev_pending: 0x30,
        }
    }
}

impl CsrMap {
    pub fn offset(&self, reg: Csr) -> usize {
        match reg {
            Csr::WriterSlot => self.writer_slot,
            Csr::WriterLength => self.writer_length,
            Csr::WriterEvPending => self.writer_ev_pending,
            Csr::ReaderStart => self.reader_start,
            Csr::ReaderReady => self.reader_ready,
            Csr::ReaderSlot => self.reader_slot,
            Csr::ReaderLength => self.reader_length,
            Csr::ReaderEvPending => self.reader_ev_pending,
        }
    }
}

/// Memory-mapped ethmac CSR bank.
pub struct MmioEthmac {
    base: usize,
    map: CsrMap,
}

impl MmioEthmac {
    /// # Safety
    ///
    /// `base` must be the address of the ethmac CSR bank and `map` must describe it; nothing
    /// else may drive those registers while this value exists.
    pub const unsafe fn new(base: usize, map: CsrMap) -> Self {
        MmioEthmac { base, map }
    }
}

impl EthmacRegisters for MmioEthmac {
    fn read_reg(&self, reg: Csr) -> u32 {
        unsafe {
            let ptr = (self.base + self.map.offset(reg)) as *const u32;
            read_volatile(ptr)
        }
    }

    fn write_reg(&self, reg: Csr, value: u32) {
        unsafe {
            let ptr = (self.base + self.map.offset(reg)) as *mut u32;
            write_volatile(ptr, value);
        }
    }
}

/// The SRAM window shared with the MAC: `rx_slots` receive slots followed by `tx_slots`
/// transmit slots, each `slot_size` bytes.
#[derive(Clone, Copy, Debug)]
pub struct SlotMemory {
    base: NonNull<u8>,
    slot_size: usize,
    rx_slots: usize,
    tx_slots: usize,
}

impl SlotMemory {
    /// # Safety
    ///
    /// `base` must point to `slot_size * (rx_slots + tx_slots)` bytes that stay valid for the
    /// lifetime of every `SlotRing` built on this value, and that only the MAC and that ring
    /// access.
    pub unsafe fn new(
        base: *mut u8,
        slot_size: usize,
        rx_slots: usize,
        tx_slots: usize,
    ) -> Result<Self, &'static str> {
        let base = NonNull::new(base).ok_or("Slot memory base is null")?;
        if slot_size < MTU {
            return Err("Slots must hold a full MTU frame");
        }
        if rx_slots == 0 || tx_slots == 0 {
            return Err("Need at least one RX and one TX slot");
        }
        Ok(SlotMemory {
            base,
            slot_size,
            rx_slots,
            tx_slots,
        })
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn rx_slots(&self) -> usize {
        self.rx_slots
    }

    pub fn tx_slots(&self) -> usize {
        self.tx_slots
    }

    pub fn len(&self) -> usize {
        self.slot_size * (self.rx_slots + self.tx_slots)
    }

    pub(crate) fn rx_slot_ptr(&self, slot: usize) -> *mut u8 {
        debug_assert!(slot < self.rx_slots);
        unsafe { self.base.as_ptr().add(self.slot_size * slot) }
    }

    pub(crate) fn tx_slot_ptr(&self, slot: usize) -> *mut u8 {
        debug_assert!(slot < self.tx_slots);
        unsafe { self.base.as_ptr().add(self.slot_size * (self.rx_slots + slot)) }
    }
}

/// How long the PHY reset is held, and how long to wait after releasing it.
pub const PHY_RESET_DELAY_MS: u32 = 200;

/// Interface the PHY negotiated with the MAC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhyMode {
    Mii,
    Gmii,
}

/// The PHY's clock/reset generator and mode detector. Both blocks are optional in the gateware;
/// a missing one is a no-op.
pub trait EthPhy {
    /// Drives the CRG reset line. Returns false when the PHY has no reset CSR.
    fn set_reset(&self, asserted: bool) -> bool;

    /// `None` when the gateware has no mode detector.
    fn mode(&self) -> Option<PhyMode>;
}

/// Pulses the PHY reset, waiting `PHY_RESET_DELAY_MS` after each edge, then logs and returns
/// the detected mode. Call once at boot, before the MAC is used.
pub fn bring_up_phy<P, D>(phy: &P, mut delay_ms: D) -> Option<PhyMode>
where
    P: EthPhy + ?Sized,
    D: FnMut(u32),
{
    if phy.set_reset(true) {
        delay_ms(PHY_RESET_DELAY_MS);
        phy.set_reset(false);
        delay_ms(PHY_RESET_DELAY_MS);
    }
    let mode = phy.mode();
    match mode {
        Some(mode) => info!("Ethernet phy mode: {:?}", mode),
        None => info!("Ethernet phy mode: unknown"),
    }
    mode
}

/// Memory-mapped ethphy CSRs. Either address may be absent.
pub struct MmioEthPhy {
    crg_reset: Option<usize>,
    mode_detection: Option<usize>,
}

impl MmioEthPhy {
    /// # Safety
    ///
    /// Each present address must be the matching ethphy CSR.
    pub const unsafe fn new(crg_reset: Option<usize>, mode_detection: Option<usize>) -> Self {
        MmioEthPhy {
            crg_reset,
            mode_detection,
        }
    }
}

impl EthPhy for MmioEthPhy {
    fn set_reset(&self, asserted: bool) -> bool {
        match self.crg_reset {
            Some(addr) => {
                unsafe { write_volatile(addr as *mut u32, asserted as u32) };
                true
            }
            None => false,
        }
    }

    fn mode(&self) -> Option<PhyMode> {
        let addr = self.mode_detection?;
        // The detector reads 1 for MII.
        match unsafe { read_volatile(addr as *const u32) } {
            0 => Some(PhyMode::Gmii),
            _ => Some(PhyMode::Mii),
        }
    }
}
