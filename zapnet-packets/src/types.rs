use core::fmt;

pub use core::net::Ipv4Addr;

/// A 48-bit Ethernet hardware address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MacAddr {
    pub bytes: [u8; 6],
}

impl MacAddr {
    pub const ZERO: MacAddr = MacAddr { bytes: [0; 6] };
    pub const BROADCAST: MacAddr = MacAddr { bytes: [0xff; 6] };

    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddr { bytes }
    }

    /// The all-zero address marks an unresolved ARP entry.
    pub fn is_zero(&self) -> bool {
        self.bytes == [0; 6]
    }

    pub fn is_broadcast(&self) -> bool {
        self.bytes == [0xff; 6]
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddr::new(bytes)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.bytes;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpProtocol {
    ICMP,
    TCP,
    UDP,
    Unknown(u8),
}

impl From<u8> for IpProtocol {
    fn from(value: u8) -> Self {
        match value {
            0x01 => IpProtocol::ICMP,
            0x06 => IpProtocol::TCP,
            0x11 => IpProtocol::UDP,
            other => IpProtocol::Unknown(other),
        }
    }
}

impl From<IpProtocol> for u8 {
    fn from(protocol: IpProtocol) -> Self {
        match protocol {
            IpProtocol::ICMP => 0x01,
            IpProtocol::TCP => 0x06,
            IpProtocol::UDP => 0x11,
            IpProtocol::Unknown(other) => other,
        }
    }
}

#[inline]
pub(crate) fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

#[inline]
pub(crate) fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[inline]
pub(crate) fn write_u16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_be_bytes());
}

#[inline]
pub(crate) fn write_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_display() {
        let mac = MacAddr::new([0x13, 0x37, 0x32, 0x0d, 0xba, 0xbe]);
        assert_eq!(mac.to_string(), "13:37:32:0d:ba:be");
    }

    #[test]
    fn zero_and_broadcast() {
        assert!(MacAddr::ZERO.is_zero());
        assert!(MacAddr::BROADCAST.is_broadcast());
        assert!(!MacAddr::new([0, 0, 0, 0, 0, 1]).is_zero());
    }

    #[test]
    fn protocol_numbers() {
        assert_eq!(IpProtocol::from(0x11), IpProtocol::UDP);
        assert_eq!(IpProtocol::from(0x01), IpProtocol::ICMP);
        assert_eq!(IpProtocol::from(0x06), IpProtocol::TCP);
        assert_eq!(u8::from(IpProtocol::Unknown(0x2f)), 0x2f);
    }
}
