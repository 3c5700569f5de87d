use crate::types::{read_u16, write_u16};
use crate::{Ipv4Addr, MacAddr, IPV4_ETHER_TYPE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

pub enum ArpHardwareType {
    Ethernet = 1,
}

/// Size of an Ethernet/IPv4 ARP body.
pub const ARP_LEN: usize = 28;

const HARDWARE_TYPE_OFFSET: usize = 0;
const PROTOCOL_TYPE_OFFSET: usize = 2;
const HARDWARE_ADDR_LEN_OFFSET: usize = 4;
const PROTOCOL_ADDR_LEN_OFFSET: usize = 5;
const OPCODE_OFFSET: usize = 6;
const SENDER_MAC_RANGE: (usize, usize) = (8, 14);
const SENDER_IP_RANGE: (usize, usize) = (14, 18);
const TARGET_MAC_RANGE: (usize, usize) = (18, 24);
const TARGET_IP_RANGE: (usize, usize) = (24, 28);

///
/// View over the ARP body of an Ethernet frame, fixed to the Ethernet/IPv4 flavour of
/// RFC 826 (6-byte hardware and 4-byte protocol addresses).
/// https://tools.ietf.org/html/rfc826
///
#[derive(Clone, Debug)]
pub struct ArpPacket<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> ArpPacket<T> {
    pub fn new_unchecked(buffer: T) -> Self {
        ArpPacket { buffer }
    }

    ///
    /// Validates
    /// - The body is long enough for all Ethernet/IPv4 fields
    /// - Hardware type Ethernet, protocol type IPv4, address sizes 6 and 4
    ///
    pub fn new_checked(buffer: T) -> Result<Self, &'static str> {
        if buffer.as_ref().len() < ARP_LEN {
            return Err("ARP body is too small");
        }
        let packet = ArpPacket { buffer };
        if packet.hardware_type() != ArpHardwareType::Ethernet as u16 {
            return Err("ARP hardware type is not Ethernet");
        }
        if packet.protocol_type() != IPV4_ETHER_TYPE {
            return Err("ARP protocol type is not IPv4");
        }
        if packet.hardware_addr_len() != 6 || packet.protocol_addr_len() != 4 {
            return Err("ARP address sizes are not Ethernet/IPv4");
        }
        Ok(packet)
    }

    pub fn hardware_type(&self) -> u16 {
        read_u16(self.buffer.as_ref(), HARDWARE_TYPE_OFFSET)
    }

    pub fn protocol_type(&self) -> u16 {
        read_u16(self.buffer.as_ref(), PROTOCOL_TYPE_OFFSET)
    }

    pub fn hardware_addr_len(&self) -> u8 {
        self.buffer.as_ref()[HARDWARE_ADDR_LEN_OFFSET]
    }

    pub fn protocol_addr_len(&self) -> u8 {
        self.buffer.as_ref()[PROTOCOL_ADDR_LEN_OFFSET]
    }

    pub fn opcode(&self) -> u16 {
        read_u16(self.buffer.as_ref(), OPCODE_OFFSET)
    }

    pub fn sender_mac(&self) -> MacAddr {
        self.mac(SENDER_MAC_RANGE)
    }

    pub fn sender_ip(&self) -> Ipv4Addr {
        self.ip(SENDER_IP_RANGE)
    }

    pub fn target_mac(&self) -> MacAddr {
        self.mac(TARGET_MAC_RANGE)
    }

    pub fn target_ip(&self) -> Ipv4Addr {
        self.ip(TARGET_IP_RANGE)
    }

    fn mac(&self, (start, end): (usize, usize)) -> MacAddr {
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&self.buffer.as_ref()[start..end]);
        MacAddr::new(bytes)
    }

    fn ip(&self, (start, end): (usize, usize)) -> Ipv4Addr {
        let mut octets = [0u8; 4];
        octets.copy_from_slice(&self.buffer.as_ref()[start..end]);
        Ipv4Addr::from(octets)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> ArpPacket<T> {
    pub fn set_opcode(&mut self, op: ArpOp) {
        write_u16(self.buffer.as_mut(), OPCODE_OFFSET, op as u16);
    }

    pub fn set_sender(&mut self, mac: MacAddr, ip: Ipv4Addr) {
        self.set_bytes(SENDER_MAC_RANGE, &mac.bytes);
        self.set_bytes(SENDER_IP_RANGE, &ip.octets());
    }

    pub fn set_target(&mut self, mac: MacAddr, ip: Ipv4Addr) {
        self.set_bytes(TARGET_MAC_RANGE, &mac.bytes);
        self.set_bytes(TARGET_IP_RANGE, &ip.octets());
    }

    /// Writes a complete Ethernet/IPv4 ARP body.
    pub fn fill(
        &mut self,
        op: ArpOp,
        sender: (MacAddr, Ipv4Addr),
        target: (MacAddr, Ipv4Addr),
    ) {
        let data = self.buffer.as_mut();
        write_u16(data, HARDWARE_TYPE_OFFSET, ArpHardwareType::Ethernet as u16);
        write_u16(data, PROTOCOL_TYPE_OFFSET, IPV4_ETHER_TYPE);
        data[HARDWARE_ADDR_LEN_OFFSET] = 6;
        data[PROTOCOL_ADDR_LEN_OFFSET] = 4;
        self.set_opcode(op);
        self.set_sender(sender.0, sender.1);
        self.set_target(target.0, target.1);
    }

    fn set_bytes(&mut self, (start, end): (usize, usize), bytes: &[u8]) {
        self.buffer.as_mut()[start..end].copy_from_slice(bytes);
    }
}
