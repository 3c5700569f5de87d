use crate::types::{read_u16, write_u16};
use crate::{checksum16, verify_checksum, Ipv4Addr};

pub const ICMP_HEADER_LEN: usize = 8;

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_DEST_UNREACHABLE: u8 = 3;
pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_TIMESTAMP_REQUEST: u8 = 13;

const TYPE_OFFSET: usize = 0;
const CODE_OFFSET: usize = 1;
const CHECKSUM_OFFSET: usize = 2;
const IDENTIFIER_OFFSET: usize = 4;
const SEQUENCE_OFFSET: usize = 6;
const GATEWAY_RANGE: (usize, usize) = (4, 8);
const MTU_OFFSET: usize = 6;

/// ICMP message view. The four bytes after the checksum are interpreted per message type:
/// echo identifier and sequence, redirect gateway, or unused + next-hop MTU.
#[derive(Clone, Debug)]
pub struct IcmpPacket<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> IcmpPacket<T> {
    pub fn new_unchecked(buffer: T) -> Self {
        IcmpPacket { buffer }
    }

    pub fn new_checked(buffer: T) -> Result<Self, &'static str> {
        if buffer.as_ref().len() < ICMP_HEADER_LEN {
            return Err("Message too short to contain an ICMP header");
        }
        Ok(IcmpPacket { buffer })
    }

    pub fn msg_type(&self) -> u8 {
        self.buffer.as_ref()[TYPE_OFFSET]
    }

    pub fn code(&self) -> u8 {
        self.buffer.as_ref()[CODE_OFFSET]
    }

    pub fn checksum(&self) -> u16 {
        read_u16(self.buffer.as_ref(), CHECKSUM_OFFSET)
    }

    pub fn echo_identifier(&self) -> u16 {
        read_u16(self.buffer.as_ref(), IDENTIFIER_OFFSET)
    }

    pub fn echo_sequence(&self) -> u16 {
        read_u16(self.buffer.as_ref(), SEQUENCE_OFFSET)
    }

    pub fn gateway(&self) -> Ipv4Addr {
        let (start, end) = GATEWAY_RANGE;
        let mut octets = [0u8; 4];
        octets.copy_from_slice(&self.buffer.as_ref()[start..end]);
        Ipv4Addr::from(octets)
    }

    pub fn next_hop_mtu(&self) -> u16 {
        read_u16(self.buffer.as_ref(), MTU_OFFSET)
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[ICMP_HEADER_LEN..]
    }

    /// Verifies the checksum over the header and `payload_len` payload bytes.
    pub fn validate_checksum(&self, payload_len: usize) -> bool {
        verify_checksum(&self.buffer.as_ref()[..ICMP_HEADER_LEN + payload_len], 0)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> IcmpPacket<T> {
    /// Turns the message into an echo reply for `payload_len` payload bytes already in
    /// place, keeping identifier and sequence.
    pub fn fill_echo_reply(&mut self, identifier: u16, sequence: u16, payload_len: usize) {
        let data = self.buffer.as_mut();
        data[TYPE_OFFSET] = ICMP_ECHO_REPLY;
        data[CODE_OFFSET] = 0;
        write_u16(data, IDENTIFIER_OFFSET, identifier);
        write_u16(data, SEQUENCE_OFFSET, sequence);
        self.set_checksum(payload_len);
    }

    pub fn set_checksum(&mut self, payload_len: usize) {
        let data = self.buffer.as_mut();
        write_u16(data, CHECKSUM_OFFSET, 0);
        let checksum = checksum16(&data[..ICMP_HEADER_LEN + payload_len], 0, true);
        write_u16(data, CHECKSUM_OFFSET, checksum);
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut()[ICMP_HEADER_LEN..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_request_fields() {
        let data: Vec<u8> = vec![0x08, 0x00, 0x00, 0x00, 0x12, 0x34, 0x00, 0x01, b'P', b'I'];
        let packet = IcmpPacket::new_checked(&data[..]).unwrap();
        assert_eq!(packet.msg_type(), ICMP_ECHO_REQUEST);
        assert_eq!(packet.code(), 0);
        assert_eq!(packet.echo_identifier(), 0x1234);
        assert_eq!(packet.echo_sequence(), 1);
        assert_eq!(packet.payload(), b"PI");
    }

    #[test]
    fn union_views() {
        let data: Vec<u8> = vec![0x03, 0x04, 0x00, 0x00, 0x0a, 0x00, 0x05, 0xdc];
        let packet = IcmpPacket::new_checked(&data[..]).unwrap();
        assert_eq!(packet.gateway(), Ipv4Addr::new(10, 0, 5, 220));
        assert_eq!(packet.next_hop_mtu(), 1500);
    }

    #[test]
    fn echo_reply_checksum_verifies() {
        let mut data: Vec<u8> = vec![0x08, 0x00, 0xaa, 0xbb, 0x00, 0x00, 0x00, 0x00];
        data.extend_from_slice(b"PING");
        let mut packet = IcmpPacket::new_checked(&mut data[..]).unwrap();
        packet.fill_echo_reply(0x1234, 1, 4);
        assert_eq!(packet.msg_type(), ICMP_ECHO_REPLY);
        assert!(packet.validate_checksum(4));
        assert_eq!(&data[4..], &[0x12, 0x34, 0x00, 0x01, b'P', b'I', b'N', b'G']);
    }

    #[test]
    fn short_message_is_rejected() {
        assert!(IcmpPacket::new_checked(&[0u8; 7][..]).is_err());
    }
}
