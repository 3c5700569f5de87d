use crate::types::{read_u16, write_u16};
use crate::{checksum16, pseudo_header_sum, IpProtocol, Ipv4Addr};

pub const UDP_HEADER_LEN: usize = 8;

const SRC_PORT_OFFSET: usize = 0;
const DEST_PORT_OFFSET: usize = 2;
const LENGTH_OFFSET: usize = 4;
const CHECKSUM_OFFSET: usize = 6;

#[derive(Clone, Debug)]
pub struct UdpPacket<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> UdpPacket<T> {
    pub fn new_unchecked(buffer: T) -> Self {
        UdpPacket { buffer }
    }

    pub fn new_checked(buffer: T) -> Result<Self, &'static str> {
        if buffer.as_ref().len() < UDP_HEADER_LEN {
            return Err("Segment too short to contain valid UDP Header");
        }
        let packet = UdpPacket { buffer };
        if usize::from(packet.length()) < UDP_HEADER_LEN {
            return Err("UDP length field is smaller than the header");
        }
        Ok(packet)
    }

    pub fn src_port(&self) -> u16 {
        read_u16(self.buffer.as_ref(), SRC_PORT_OFFSET)
    }

    pub fn dest_port(&self) -> u16 {
        read_u16(self.buffer.as_ref(), DEST_PORT_OFFSET)
    }

    /// Header plus payload, as claimed by the sender.
    pub fn length(&self) -> u16 {
        read_u16(self.buffer.as_ref(), LENGTH_OFFSET)
    }

    pub fn checksum(&self) -> u16 {
        read_u16(self.buffer.as_ref(), CHECKSUM_OFFSET)
    }

    /// Payload as claimed by the length field, clipped to the bytes actually present.
    pub fn payload(&self) -> &[u8] {
        let data = self.buffer.as_ref();
        let claimed = usize::from(self.length()).max(UDP_HEADER_LEN);
        &data[UDP_HEADER_LEN..claimed.min(data.len())]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> UdpPacket<T> {
    /// Writes the header for `payload_len` bytes of payload already in place, then the
    /// checksum over pseudo-header, header and payload.
    pub fn fill_header(
        &mut self,
        src: (Ipv4Addr, u16),
        dest: (Ipv4Addr, u16),
        payload_len: usize,
    ) {
        let length = (UDP_HEADER_LEN + payload_len) as u16;
        let data = self.buffer.as_mut();
        write_u16(data, SRC_PORT_OFFSET, src.1);
        write_u16(data, DEST_PORT_OFFSET, dest.1);
        write_u16(data, LENGTH_OFFSET, length);
        write_u16(data, CHECKSUM_OFFSET, 0);

        let seed = pseudo_header_sum(src.0, dest.0, IpProtocol::UDP.into(), length);
        let checksum = checksum16(&data[..usize::from(length)], seed, true);
        write_u16(data, CHECKSUM_OFFSET, checksum);
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut()[UDP_HEADER_LEN..]
    }
}

/// Verifies a UDP checksum against the pseudo-header. A zero checksum means none was sent.
pub fn validate_udp_checksum(segment: &[u8], src: Ipv4Addr, dest: Ipv4Addr) -> bool {
    if segment.len() < UDP_HEADER_LEN {
        return false;
    }
    if read_u16(segment, CHECKSUM_OFFSET) == 0 {
        return true;
    }
    let length = read_u16(segment, LENGTH_OFFSET);
    let end = usize::from(length).min(segment.len());
    let seed = pseudo_header_sum(src, dest, IpProtocol::UDP.into(), length);
    crate::verify_checksum(&segment[..end], seed)
}
