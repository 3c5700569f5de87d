use crate::types::{read_u16, write_u16};
use crate::{checksum16, verify_checksum, IpProtocol, Ipv4Addr};

/// Header length without options. Options are never emitted and frames carrying them are
/// not for us.
pub const IPV4_HEADER_LEN: usize = 20;

/// Version 4, IHL 5.
pub const IPV4_VERSION_IHL: u8 = 0x45;
pub const IPV4_DONT_FRAGMENT: u16 = 0x4000;
pub const IPV4_DEFAULT_TTL: u8 = 64;

const VERSION_IHL_OFFSET: usize = 0;
const DSCP_ECN_OFFSET: usize = 1;
const TOTAL_LEN_OFFSET: usize = 2;
const IDENTIFICATION_OFFSET: usize = 4;
const FLAGS_FRAGMENT_OFFSET: usize = 6;
const TTL_OFFSET: usize = 8;
const PROTOCOL_OFFSET: usize = 9;
const CHECKSUM_OFFSET: usize = 10;
const SRC_ADDR_RANGE: (usize, usize) = (12, 16);
const DEST_ADDR_RANGE: (usize, usize) = (16, 20);

#[derive(Clone, Debug)]
pub struct Ipv4Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Ipv4Packet<T> {
    pub fn new_unchecked(buffer: T) -> Self {
        Ipv4Packet { buffer }
    }

    /// Accepts only option-less IPv4 headers whose buffer holds at least the full header.
    pub fn new_checked(buffer: T) -> Result<Self, &'static str> {
        if buffer.as_ref().len() < IPV4_HEADER_LEN {
            return Err("Packet too short to contain valid IP Header");
        }
        let packet = Ipv4Packet { buffer };
        if packet.version_ihl() != IPV4_VERSION_IHL {
            return Err("Not an option-less IPv4 header");
        }
        Ok(packet)
    }

    pub fn version_ihl(&self) -> u8 {
        self.buffer.as_ref()[VERSION_IHL_OFFSET]
    }

    pub fn dscp(&self) -> u8 {
        self.buffer.as_ref()[DSCP_ECN_OFFSET] >> 2
    }

    pub fn total_len(&self) -> u16 {
        read_u16(self.buffer.as_ref(), TOTAL_LEN_OFFSET)
    }

    pub fn identification(&self) -> u16 {
        read_u16(self.buffer.as_ref(), IDENTIFICATION_OFFSET)
    }

    pub fn flags_fragment(&self) -> u16 {
        read_u16(self.buffer.as_ref(), FLAGS_FRAGMENT_OFFSET)
    }

    pub fn ttl(&self) -> u8 {
        self.buffer.as_ref()[TTL_OFFSET]
    }

    pub fn protocol(&self) -> IpProtocol {
        IpProtocol::from(self.buffer.as_ref()[PROTOCOL_OFFSET])
    }

    pub fn checksum(&self) -> u16 {
        read_u16(self.buffer.as_ref(), CHECKSUM_OFFSET)
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        self.addr(SRC_ADDR_RANGE)
    }

    pub fn dest_addr(&self) -> Ipv4Addr {
        self.addr(DEST_ADDR_RANGE)
    }

    /// Verifies the header checksum.
    pub fn validate_checksum(&self) -> bool {
        verify_checksum(&self.buffer.as_ref()[..IPV4_HEADER_LEN], 0)
    }

    /// Bytes after the header, up to the end of the buffer (not trimmed to `total_len`).
    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[IPV4_HEADER_LEN..]
    }

    fn addr(&self, (start, end): (usize, usize)) -> Ipv4Addr {
        let mut octets = [0u8; 4];
        octets.copy_from_slice(&self.buffer.as_ref()[start..end]);
        Ipv4Addr::from(octets)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Ipv4Packet<T> {
    /// Writes a 20-byte header with DF set, TTL 64, identification 0 and a valid checksum.
    /// `total_len` covers header and payload.
    pub fn fill_header(
        &mut self,
        src: Ipv4Addr,
        dest: Ipv4Addr,
        protocol: IpProtocol,
        total_len: u16,
    ) {
        let data = self.buffer.as_mut();
        data[VERSION_IHL_OFFSET] = IPV4_VERSION_IHL;
        data[DSCP_ECN_OFFSET] = 0;
        write_u16(data, TOTAL_LEN_OFFSET, total_len);
        write_u16(data, IDENTIFICATION_OFFSET, 0);
        write_u16(data, FLAGS_FRAGMENT_OFFSET, IPV4_DONT_FRAGMENT);
        data[TTL_OFFSET] = IPV4_DEFAULT_TTL;
        data[PROTOCOL_OFFSET] = protocol.into();
        data[SRC_ADDR_RANGE.0..SRC_ADDR_RANGE.1].copy_from_slice(&src.octets());
        data[DEST_ADDR_RANGE.0..DEST_ADDR_RANGE.1].copy_from_slice(&dest.octets());
        self.set_checksum();
    }

    /// Sets checksum field to valid value
    pub fn set_checksum(&mut self) {
        let data = self.buffer.as_mut();
        write_u16(data, CHECKSUM_OFFSET, 0);
        let checksum = checksum16(&data[..IPV4_HEADER_LEN], 0, true);
        write_u16(data, CHECKSUM_OFFSET, checksum);
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut()[IPV4_HEADER_LEN..]
    }
}
