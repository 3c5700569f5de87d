//! Etherbone, the Wishbone-over-UDP register access protocol.
//!
//! A packet is a 12-byte header (8 bytes of packet header, 4 bytes of record header) followed
//! by an optional write block and an optional read block:
//!
//! ```text
//! 0        2         3          4         8       9          10       11       12
//! | magic  | ver/flg | sizes    | padding | flags | byte_en  | wcount | rcount |
//! [ base_write_addr, write_value * wcount ]   present when wcount > 0
//! [ base_ret_addr,   read_addr   * rcount ]   present when rcount > 0
//! ```
//!
//! All multi-byte fields are big-endian. Only one record per packet is supported.

use crate::types::{read_u32, write_u16, write_u32};

pub const MAGIC: u16 = 0x4e6f;
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 12;

/// Address and port width in bytes; the only combination the executor accepts.
pub const BUS_WIDTH: u8 = 4;

const MAGIC_OFFSET: usize = 0;
const PACKET_FLAGS_OFFSET: usize = 2;
const SIZES_OFFSET: usize = 3;
const RECORD_FLAGS_OFFSET: usize = 8;
const BYTE_ENABLE_OFFSET: usize = 9;
const WCOUNT_OFFSET: usize = 10;
const RCOUNT_OFFSET: usize = 11;

/// Byte 2 of the packet header: version in the high nibble, then a reserved bit and the
/// no-reads, probe-response and probe flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacketFlags {
    pub version: u8,
    pub no_reads: bool,
    pub probe_response: bool,
    pub probe: bool,
}

impl PacketFlags {
    /// Flags of every reply the executor sends (`0x14`).
    pub const REPLY: PacketFlags = PacketFlags {
        version: VERSION,
        no_reads: true,
        probe_response: false,
        probe: false,
    };

    pub const REQUEST: PacketFlags = PacketFlags {
        version: VERSION,
        no_reads: false,
        probe_response: false,
        probe: false,
    };

    pub fn pack(&self) -> u8 {
        (self.version & 0x0f) << 4
            | (self.no_reads as u8) << 2
            | (self.probe_response as u8) << 1
            | self.probe as u8
    }

    pub fn unpack(byte: u8) -> Self {
        PacketFlags {
            version: byte >> 4,
            no_reads: byte & 0x04 != 0,
            probe_response: byte & 0x02 != 0,
            probe: byte & 0x01 != 0,
        }
    }
}

/// Byte 8, the record flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordFlags {
    pub bca: bool,
    pub rca: bool,
    pub rff: bool,
    pub cyc: bool,
    pub wca: bool,
    pub wff: bool,
}

impl RecordFlags {
    pub fn pack(&self) -> u8 {
        self.bca as u8
            | (self.rca as u8) << 1
            | (self.rff as u8) << 2
            | (self.cyc as u8) << 4
            | (self.wca as u8) << 5
            | (self.wff as u8) << 6
    }

    pub fn unpack(byte: u8) -> Self {
        RecordFlags {
            bca: byte & 0x01 != 0,
            rca: byte & 0x02 != 0,
            rff: byte & 0x04 != 0,
            cyc: byte & 0x10 != 0,
            wca: byte & 0x20 != 0,
            wff: byte & 0x40 != 0,
        }
    }
}

/// Byte 3: address size in the high nibble, port size in the low nibble.
pub fn pack_sizes(addr_size: u8, port_size: u8) -> u8 {
    (addr_size & 0x0f) << 4 | (port_size & 0x0f)
}

pub fn unpack_sizes(byte: u8) -> (u8, u8) {
    (byte >> 4, byte & 0x0f)
}

fn block_len(count: u8) -> usize {
    match count {
        0 => 0,
        n => 4 * (1 + usize::from(n)),
    }
}

/// Total packet length implied by the record counts.
pub fn packet_length(wcount: u8, rcount: u8) -> usize {
    HEADER_LEN + block_len(wcount) + block_len(rcount)
}

/// Packet length announced by a buffer holding at least a full header.
pub fn peek_packet_length(buffer: &[u8]) -> Option<usize> {
    if buffer.len() < HEADER_LEN {
        return None;
    }
    Some(packet_length(buffer[WCOUNT_OFFSET], buffer[RCOUNT_OFFSET]))
}

#[derive(Clone, Debug)]
pub struct EtherbonePacket<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> EtherbonePacket<T> {
    pub fn new_unchecked(buffer: T) -> Self {
        EtherbonePacket { buffer }
    }

    /// Checks the buffer holds the whole packet its counts announce. Magic and bus widths
    /// are left to the caller.
    pub fn new_checked(buffer: T) -> Result<Self, &'static str> {
        match peek_packet_length(buffer.as_ref()) {
            None => Err("Buffer too short to contain an Etherbone header"),
            Some(length) if buffer.as_ref().len() < length => {
                Err("Buffer shorter than the Etherbone record it announces")
            }
            Some(_) => Ok(EtherbonePacket { buffer }),
        }
    }

    pub fn magic(&self) -> u16 {
        let data = self.buffer.as_ref();
        u16::from_be_bytes([data[MAGIC_OFFSET], data[MAGIC_OFFSET + 1]])
    }

    pub fn packet_flags(&self) -> PacketFlags {
        PacketFlags::unpack(self.buffer.as_ref()[PACKET_FLAGS_OFFSET])
    }

    pub fn addr_size(&self) -> u8 {
        unpack_sizes(self.buffer.as_ref()[SIZES_OFFSET]).0
    }

    pub fn port_size(&self) -> u8 {
        unpack_sizes(self.buffer.as_ref()[SIZES_OFFSET]).1
    }

    pub fn record_flags(&self) -> RecordFlags {
        RecordFlags::unpack(self.buffer.as_ref()[RECORD_FLAGS_OFFSET])
    }

    pub fn byte_enable(&self) -> u8 {
        self.buffer.as_ref()[BYTE_ENABLE_OFFSET]
    }

    pub fn wcount(&self) -> u8 {
        self.buffer.as_ref()[WCOUNT_OFFSET]
    }

    pub fn rcount(&self) -> u8 {
        self.buffer.as_ref()[RCOUNT_OFFSET]
    }

    pub fn packet_len(&self) -> usize {
        packet_length(self.wcount(), self.rcount())
    }

    /// Magic and bus widths the executor understands.
    pub fn is_supported(&self) -> bool {
        self.magic() == MAGIC && self.addr_size() == BUS_WIDTH && self.port_size() == BUS_WIDTH
    }

    pub fn base_write_addr(&self) -> u32 {
        read_u32(self.buffer.as_ref(), HEADER_LEN)
    }

    pub fn write_value(&self, index: usize) -> u32 {
        read_u32(self.buffer.as_ref(), HEADER_LEN + 4 + 4 * index)
    }

    pub fn base_ret_addr(&self) -> u32 {
        read_u32(self.buffer.as_ref(), self.read_block_offset())
    }

    pub fn read_addr(&self, index: usize) -> u32 {
        read_u32(self.buffer.as_ref(), self.read_block_offset() + 4 + 4 * index)
    }

    fn read_block_offset(&self) -> usize {
        HEADER_LEN + block_len(self.wcount())
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> EtherbonePacket<T> {
    /// Writes both headers. Counts must be set before the blocks are filled because they
    /// locate the read block.
    pub fn fill_header(
        &mut self,
        flags: PacketFlags,
        record: RecordFlags,
        byte_enable: u8,
        wcount: u8,
        rcount: u8,
    ) {
        let data = self.buffer.as_mut();
        write_u16(data, MAGIC_OFFSET, MAGIC);
        data[PACKET_FLAGS_OFFSET] = flags.pack();
        data[SIZES_OFFSET] = pack_sizes(BUS_WIDTH, BUS_WIDTH);
        data[4..8].copy_from_slice(&[0; 4]);
        data[RECORD_FLAGS_OFFSET] = record.pack();
        data[BYTE_ENABLE_OFFSET] = byte_enable;
        data[WCOUNT_OFFSET] = wcount;
        data[RCOUNT_OFFSET] = rcount;
    }

    pub fn set_base_write_addr(&mut self, addr: u32) {
        write_u32(self.buffer.as_mut(), HEADER_LEN, addr);
    }

    pub fn set_write_value(&mut self, index: usize, value: u32) {
        write_u32(self.buffer.as_mut(), HEADER_LEN + 4 + 4 * index, value);
    }

    pub fn set_base_ret_addr(&mut self, addr: u32) {
        let offset = self.read_block_offset();
        write_u32(self.buffer.as_mut(), offset, addr);
    }

    pub fn set_read_addr(&mut self, index: usize, addr: u32) {
        let offset = self.read_block_offset() + 4 + 4 * index;
        write_u32(self.buffer.as_mut(), offset, addr);
    }
}

fn check_block(buffer: &[u8], count: usize, length: usize) -> Result<u8, &'static str> {
    if count == 0 || count > usize::from(u8::MAX) {
        return Err("Etherbone records carry between 1 and 255 words");
    }
    if buffer.len() < length {
        return Err("Buffer too small for the Etherbone packet");
    }
    Ok(count as u8)
}

/// Builds a write request storing `values` at consecutive words from `base_addr`.
pub fn fill_write_request(
    buffer: &mut [u8],
    base_addr: u32,
    values: &[u32],
) -> Result<usize, &'static str> {
    let wcount = check_block(buffer, values.len(), HEADER_LEN + 4 * (1 + values.len()))?;
    let mut packet = EtherbonePacket::new_unchecked(&mut buffer[..]);
    packet.fill_header(PacketFlags::REQUEST, RecordFlags::default(), 0x0f, wcount, 0);
    packet.set_base_write_addr(base_addr);
    for (index, value) in values.iter().enumerate() {
        packet.set_write_value(index, *value);
    }
    Ok(packet.packet_len())
}

/// Builds a read request for `addrs`; the reply writes the values back starting at
/// `base_ret_addr`.
pub fn fill_read_request(
    buffer: &mut [u8],
    base_ret_addr: u32,
    addrs: &[u32],
) -> Result<usize, &'static str> {
    let rcount = check_block(buffer, addrs.len(), HEADER_LEN + 4 * (1 + addrs.len()))?;
    let mut packet = EtherbonePacket::new_unchecked(&mut buffer[..]);
    packet.fill_header(PacketFlags::REQUEST, RecordFlags::default(), 0x0f, 0, rcount);
    packet.set_base_ret_addr(base_ret_addr);
    for (index, addr) in addrs.iter().enumerate() {
        packet.set_read_addr(index, *addr);
    }
    Ok(packet.packet_len())
}

/// Builds the answer to a read: a write record of `values` to `base_ret_addr`.
pub fn fill_read_reply(
    buffer: &mut [u8],
    byte_enable: u8,
    base_ret_addr: u32,
    values: &[u32],
) -> Result<usize, &'static str> {
    let wcount = check_block(buffer, values.len(), HEADER_LEN + 4 * (1 + values.len()))?;
    let mut packet = EtherbonePacket::new_unchecked(&mut buffer[..]);
    packet.fill_header(
        PacketFlags::REPLY,
        RecordFlags::default(),
        byte_enable,
        wcount,
        0,
    );
    packet.set_base_write_addr(base_ret_addr);
    for (index, value) in values.iter().enumerate() {
        packet.set_write_value(index, *value);
    }
    Ok(packet.packet_len())
}
